//! Domain types for the stack deployer.
//!
//! This module contains the core data structures:
//! - Status: Stack, resource and change set statuses
//! - Stack: Stack summaries, details and paging
//! - ChangeSet: Computed diffs and their grouping
//! - Events: Stack event log entries
//! - Template: In-memory templates and parameters

pub mod change_set;
pub mod events;
pub mod stack;
pub mod status;
pub mod template;

// Re-export commonly used types
pub use change_set::{
    group_changes, Change, ChangeAction, ChangeGroup, ChangeKey, ChangeSetSnapshot,
    ChangeSetType, ComputedChangeSet, CreatedChangeSet,
};
pub use events::{StackEvent, STACK_RESOURCE_TYPE};
pub use stack::{LocatedStack, Page, StackDetails, StackOutput, StackSummary};
pub use status::{ExecutionStatus, ResourceStatus};
pub use template::{Parameter, Template};
