//! Core deployment logic.
//!
//! This module contains:
//! - Locator: Lookup of an existing stack by name
//! - Parameters: Reconciliation of overrides with template declarations
//! - Transform: Template rewrites and code packaging
//! - ChangeSet: Change set lifecycle
//! - Events: Event log polling
//! - Orchestrator: Main deployment state machine

pub mod change_set;
pub mod error;
pub mod events;
pub mod locator;
pub mod orchestrator;
pub mod parameters;
pub mod retry;
pub mod settings;
pub mod transform;
pub mod triggers;

// Re-export commonly used types
pub use change_set::{generate_change_set_name, ChangeSetManager};
pub use error::DeployError;
pub use events::{EventPoller, PollRound};
pub use locator::locate;
pub use orchestrator::{AbortReason, DeployOutcome, DeployRequest, DeploymentReport, Orchestrator};
pub use parameters::{reconcile, ParameterOverrides};
pub use retry::{retry, RetryPolicy};
pub use settings::DeploySettings;
pub use transform::{interpolate_async_destinations, qualify_destination, ResourceTransformer};
pub use triggers::{detect_triggers, TriggerBinding};
