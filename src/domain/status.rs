//! Status values reported by the orchestration service.
//!
//! The service reports statuses as upper-case strings. Known values get a
//! variant; anything else is carried through verbatim in `Other` so a new
//! status never breaks a deployment.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Status of a stack, a stack resource, or a change set
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResourceStatus {
    CreateInProgress,
    CreateComplete,
    CreateFailed,
    CreateRollbackInProgress,
    CreateRollbackComplete,
    CreateRollbackFailed,
    UpdateInProgress,
    UpdateComplete,
    UpdateFailed,
    DeleteInProgress,
    DeleteComplete,
    DeleteFailed,
    CheckInProgress,
    CheckComplete,
    CheckFailed,
    RollbackInProgress,
    RollbackComplete,
    RollbackFailed,
    /// Status string this client does not know about
    Other(String),
}

impl ResourceStatus {
    /// Wire representation
    pub fn as_str(&self) -> &str {
        match self {
            Self::CreateInProgress => "CREATE_IN_PROGRESS",
            Self::CreateComplete => "CREATE_COMPLETE",
            Self::CreateFailed => "CREATE_FAILED",
            Self::CreateRollbackInProgress => "CREATE_ROLLBACK_IN_PROGRESS",
            Self::CreateRollbackComplete => "CREATE_ROLLBACK_COMPLETE",
            Self::CreateRollbackFailed => "CREATE_ROLLBACK_FAILED",
            Self::UpdateInProgress => "UPDATE_IN_PROGRESS",
            Self::UpdateComplete => "UPDATE_COMPLETE",
            Self::UpdateFailed => "UPDATE_FAILED",
            Self::DeleteInProgress => "DELETE_IN_PROGRESS",
            Self::DeleteComplete => "DELETE_COMPLETE",
            Self::DeleteFailed => "DELETE_FAILED",
            Self::CheckInProgress => "CHECK_IN_PROGRESS",
            Self::CheckComplete => "CHECK_COMPLETE",
            Self::CheckFailed => "CHECK_FAILED",
            Self::RollbackInProgress => "ROLLBACK_IN_PROGRESS",
            Self::RollbackComplete => "ROLLBACK_COMPLETE",
            Self::RollbackFailed => "ROLLBACK_FAILED",
            Self::Other(s) => s,
        }
    }

    /// An operation on the resource is still running.
    ///
    /// Only the four primary in-progress values count; rollback progress is
    /// not a boundary marker.
    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            Self::CreateInProgress
                | Self::UpdateInProgress
                | Self::DeleteInProgress
                | Self::CheckInProgress
        )
    }

    /// The create or update reached its goal state
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::CreateComplete | Self::UpdateComplete)
    }

    /// Aborts a deployment as soon as it is observed
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UpdateFailed
                | Self::CreateFailed
                | Self::DeleteFailed
                | Self::RollbackFailed
                | Self::CheckFailed
        )
    }

    /// The previous deployment left a stack that can only be recreated
    pub fn is_dead(&self) -> bool {
        matches!(self, Self::CreateRollbackComplete | Self::CreateFailed)
    }

    /// Change set statuses from which the change set may be deleted
    pub fn allows_change_set_delete(&self) -> bool {
        matches!(
            self,
            Self::CreateComplete | Self::CreateFailed | Self::DeleteFailed
        )
    }
}

impl From<&str> for ResourceStatus {
    fn from(s: &str) -> Self {
        match s {
            "CREATE_IN_PROGRESS" => Self::CreateInProgress,
            "CREATE_COMPLETE" => Self::CreateComplete,
            "CREATE_FAILED" => Self::CreateFailed,
            "CREATE_ROLLBACK_IN_PROGRESS" => Self::CreateRollbackInProgress,
            "CREATE_ROLLBACK_COMPLETE" => Self::CreateRollbackComplete,
            "CREATE_ROLLBACK_FAILED" => Self::CreateRollbackFailed,
            "UPDATE_IN_PROGRESS" => Self::UpdateInProgress,
            "UPDATE_COMPLETE" => Self::UpdateComplete,
            "UPDATE_FAILED" => Self::UpdateFailed,
            "DELETE_IN_PROGRESS" => Self::DeleteInProgress,
            "DELETE_COMPLETE" => Self::DeleteComplete,
            "DELETE_FAILED" => Self::DeleteFailed,
            "CHECK_IN_PROGRESS" => Self::CheckInProgress,
            "CHECK_COMPLETE" => Self::CheckComplete,
            "CHECK_FAILED" => Self::CheckFailed,
            "ROLLBACK_IN_PROGRESS" => Self::RollbackInProgress,
            "ROLLBACK_COMPLETE" => Self::RollbackComplete,
            "ROLLBACK_FAILED" => Self::RollbackFailed,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for ResourceStatus {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<ResourceStatus> for String {
    fn from(status: ResourceStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Execution status of a change set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ExecutionStatus {
    Unavailable,
    Available,
    ExecuteInProgress,
    ExecuteComplete,
    ExecuteFailed,
    Obsolete,
    Other(String),
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Unavailable => "UNAVAILABLE",
            Self::Available => "AVAILABLE",
            Self::ExecuteInProgress => "EXECUTE_IN_PROGRESS",
            Self::ExecuteComplete => "EXECUTE_COMPLETE",
            Self::ExecuteFailed => "EXECUTE_FAILED",
            Self::Obsolete => "OBSOLETE",
            Self::Other(s) => s,
        }
    }

    /// Not yet executing, so deletion cannot race an execution
    pub fn allows_delete(&self) -> bool {
        matches!(self, Self::Unavailable | Self::Available)
    }
}

impl From<&str> for ExecutionStatus {
    fn from(s: &str) -> Self {
        match s {
            "UNAVAILABLE" => Self::Unavailable,
            "AVAILABLE" => Self::Available,
            "EXECUTE_IN_PROGRESS" => Self::ExecuteInProgress,
            "EXECUTE_COMPLETE" => Self::ExecuteComplete,
            "EXECUTE_FAILED" => Self::ExecuteFailed,
            "OBSOLETE" => Self::Obsolete,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for ExecutionStatus {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<ExecutionStatus> for String {
    fn from(status: ExecutionStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}
