//! Deployment errors.

use std::time::Duration;

use thiserror::Error;

use crate::adapters::ServiceError;

/// Everything that can stop a deployment
#[derive(Debug, Error)]
pub enum DeployError {
    /// An override names a parameter the template does not declare
    #[error("Incorrect parameters: '{key}' is not defined in the template")]
    Validation { key: String },

    /// The submitted template matches the deployed stack exactly
    #[error("No need to update, stack '{stack_name}' is already up to date")]
    NoOpUpdate { stack_name: String },

    /// A resource reached a fatal status while the operation was running
    #[error("Deploy failed: {reason}. Visit {console_url} to see deploy logs")]
    DeploymentFailed { reason: String, console_url: String },

    /// A destination needs the profile's region or account, which is unset
    #[error("Cannot qualify destination '{destination}': profile {field} is not configured")]
    IncompleteProfile {
        field: &'static str,
        destination: String,
    },

    /// Function source could not be packaged or uploaded
    #[error("Packaging failed: {message}")]
    Packaging { message: String },

    /// A transient service condition outlasted the retry budget
    #[error("Gave up after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: ServiceError,
    },

    /// The service never finished computing the change set diff
    #[error("Change set {change_set_id} was not computed after {attempts} polls")]
    ChangeSetTimeout { change_set_id: String, attempts: u32 },

    /// Event polling exceeded the configured limit
    #[error("Stack '{stack_name}' did not finish within {elapsed:?}")]
    PollTimeout { stack_name: String, elapsed: Duration },

    /// Delete-and-redeploy kept finding a dead stack
    #[error("Stack '{stack_name}' was recreated {attempts} times and is still unusable")]
    RedeployLimit { stack_name: String, attempts: u32 },

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
