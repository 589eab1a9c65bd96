//! Stacks as seen by the orchestration service.

use serde::{Deserialize, Serialize};

use super::status::ResourceStatus;

/// Entry in a stack listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackSummary {
    pub stack_id: String,
    pub stack_name: String,
    pub status: ResourceStatus,
}

/// Result of a successful stack lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatedStack {
    pub stack_id: String,
    pub status: ResourceStatus,
}

/// Current state of a stack, including outputs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackDetails {
    pub stack_id: String,
    pub stack_name: String,
    pub status: ResourceStatus,
    #[serde(default)]
    pub status_reason: Option<String>,
    #[serde(default)]
    pub outputs: Vec<StackOutput>,
}

/// A declared template output with its resolved value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackOutput {
    pub key: String,
    pub value: serde_json::Value,
    #[serde(default)]
    pub description: Option<String>,
}

/// One page of a paged listing
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    /// Page number echoed back by the service (1-indexed)
    pub page_number: u32,
}

impl<T> Page<T> {
    /// Whether a further page exists after this one.
    ///
    /// A zero total or zero page number means the service gave no paging
    /// information, so there is nothing more to fetch. A zero page size
    /// never advances, so it ends paging too.
    pub fn has_more(&self, page_size: u32) -> bool {
        self.total_count > 0
            && self.page_number > 0
            && page_size > 0
            && u64::from(self.page_number) * u64::from(page_size) < self.total_count
    }
}
