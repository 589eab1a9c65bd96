//! Adapter interfaces for external systems.
//!
//! The deployer talks to the outside world through these traits:
//! - `StackService`: the remote orchestration control plane
//! - `CodePackager`: packaging and upload of function source
//! - `Prompter`: yes/no confirmation from the user
//! - `DeployReporter`: rendering of changes, events and results

pub mod console;
pub mod http;
pub mod packager;
pub mod prompt;

use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

use crate::core::triggers::TriggerBinding;
use crate::domain::{
    ChangeGroup, ChangeSetSnapshot, ChangeSetType, CreatedChangeSet, Page, Parameter,
    StackDetails, StackEvent, StackOutput, StackSummary,
};

pub use console::ConsoleReporter;
pub use http::HttpStackService;
pub use packager::{CommandPackager, UnconfiguredPackager};
pub use prompt::TerminalPrompter;

/// Errors reported at the control plane boundary
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The service rejected the request
    #[error("{code}: {message}")]
    Api {
        code: String,
        message: String,
        request_id: Option<String>,
    },

    /// The request never produced a service response
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with something we could not read
    #[error("invalid service response: {0}")]
    Decode(String),
}

impl ServiceError {
    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            code: code.into(),
            message: message.into(),
            request_id: None,
        }
    }

    fn api_parts(&self) -> Option<(&str, &str)> {
        match self {
            Self::Api { code, message, .. } => Some((code, message)),
            _ => None,
        }
    }

    /// The update would leave the stack exactly as it is
    pub fn is_same_stack_update(&self) -> bool {
        self.api_parts().map_or(false, |(code, message)| {
            code.starts_with("NotSupported") && message.contains("Update the completely same stack")
        })
    }

    /// Execution was requested while the change set's stack is still being
    /// created; the service accepts it once creation settles.
    pub fn is_execute_race(&self) -> bool {
        self.api_parts().map_or(false, |(code, message)| {
            code.starts_with("NotSupported")
                && message.contains("StatusEnum.CREATE_IN_PROGRESS is not supported")
        })
    }

    pub fn is_stack_not_found(&self) -> bool {
        self.api_parts()
            .map_or(false, |(code, _)| code == "StackNotFound")
    }
}

/// Which stack a change set applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeSetTarget {
    /// A stack that does not exist yet
    StackName(String),
    /// An existing stack
    StackId(String),
}

/// Everything needed to submit a change set
#[derive(Debug, Clone)]
pub struct ChangeSetRequest {
    pub change_set_name: String,
    pub change_set_type: ChangeSetType,
    pub target: ChangeSetTarget,
    pub description: String,
    pub template_body: String,
    pub disable_rollback: bool,
    pub timeout_in_minutes: u32,
    pub use_previous_parameters: bool,
    pub parameters: Vec<Parameter>,
}

/// Remote orchestration control plane, bound to one region
#[async_trait]
pub trait StackService: Send + Sync {
    /// List stacks whose name matches `stack_name`
    async fn list_stacks(
        &self,
        stack_name: &str,
        page_number: u32,
        page_size: u32,
    ) -> Result<Page<StackSummary>, ServiceError>;

    async fn create_change_set(
        &self,
        request: &ChangeSetRequest,
    ) -> Result<CreatedChangeSet, ServiceError>;

    async fn get_change_set(&self, change_set_id: &str) -> Result<ChangeSetSnapshot, ServiceError>;

    async fn execute_change_set(&self, change_set_id: &str) -> Result<(), ServiceError>;

    async fn delete_change_set(&self, change_set_id: &str) -> Result<(), ServiceError>;

    /// Page through a stack's event log, newest first
    async fn list_stack_events(
        &self,
        stack_id: &str,
        page_number: u32,
        page_size: u32,
    ) -> Result<Page<StackEvent>, ServiceError>;

    /// Current template body of a stack
    async fn get_template(&self, stack_id: &str) -> Result<String, ServiceError>;

    async fn get_stack(&self, stack_id: &str) -> Result<StackDetails, ServiceError>;

    async fn delete_stack(&self, stack_id: &str) -> Result<(), ServiceError>;
}

/// Input for packaging one function's source
#[derive(Debug, Clone)]
pub struct PackageRequest {
    /// Directory relative paths are resolved against
    pub base_dir: PathBuf,
    /// Template the function was declared in (if loaded from disk)
    pub template_path: Option<PathBuf>,
    /// Declared source location
    pub code_uri: String,
    pub runtime: Option<String>,
}

/// Where packaged source ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagedCode {
    pub bucket: String,
    /// Missing when the upload did not produce an object
    pub object_name: Option<String>,
}

/// Packages a local source directory into remote object storage
#[async_trait]
pub trait CodePackager: Send + Sync {
    async fn package(&self, request: &PackageRequest) -> Result<PackagedCode>;
}

/// Yes/no confirmation from whoever runs the deployment
#[async_trait]
pub trait Prompter: Send + Sync {
    async fn confirm(&self, message: &str) -> Result<bool>;
}

/// Renders deployment progress.
///
/// Every method defaults to doing nothing so implementations only render
/// what they care about.
pub trait DeployReporter: Send + Sync {
    fn changes(&self, _groups: &[ChangeGroup]) {}

    fn parameters(&self, _parameters: &[Parameter]) {}

    /// Progress snapshot for one poll round
    fn events(&self, _stack_name: &str, _events: &[StackEvent]) {}

    fn triggers(&self, _bindings: &[TriggerBinding]) {}

    fn outputs(&self, _outputs: &[StackOutput]) {}

    fn success(&self, _console_url: &str) {}
}
