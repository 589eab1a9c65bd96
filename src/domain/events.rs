//! Stack events.
//!
//! The service keeps an append-only log of per-resource status transitions
//! for every stack. Listings are newest-first, within a page and across
//! pages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::status::ResourceStatus;

/// Resource type of a stack itself (and of nested stacks)
pub const STACK_RESOURCE_TYPE: &str = "ALIYUN::ROS::Stack";

/// A single entry in a stack's event log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackEvent {
    /// Logical id of the resource within the template
    pub logical_resource_id: String,

    /// Resource type tag, e.g. `ALIYUN::FC::Function`
    pub resource_type: String,

    /// Status the resource transitioned into
    pub status: ResourceStatus,

    /// Failure or progress explanation from the service
    #[serde(default)]
    pub status_reason: Option<String>,

    /// When the transition happened (if reported)
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl StackEvent {
    pub fn new(
        logical_resource_id: impl Into<String>,
        resource_type: impl Into<String>,
        status: ResourceStatus,
    ) -> Self {
        Self {
            logical_resource_id: logical_resource_id.into(),
            resource_type: resource_type.into(),
            status,
            status_reason: None,
            created_at: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.status_reason = Some(reason.into());
        self
    }

    /// Event of a stack resource (the deployed stack or a nested one)
    pub fn is_stack_level(&self) -> bool {
        self.resource_type == STACK_RESOURCE_TYPE
    }

    /// Marks the start of an operation on a stack.
    ///
    /// Everything newer than this event in the log belongs to that operation.
    pub fn is_boundary(&self) -> bool {
        self.is_stack_level() && self.status.is_in_progress()
    }
}
