//! stackdeploy - Change-set driven stack deployer
//!
//! Deploys declarative resource templates to a remote orchestration
//! service through previewable change sets.
//!
//! # Architecture
//!
//! A deployment is a state machine driven by the orchestrator:
//! - The stack is located by name (and recreated if a previous deploy left
//!   it unusable)
//! - A CREATE or UPDATE change set is submitted and its diff awaited
//! - After confirmation the change set is executed and the stack's event
//!   log is tailed until the stack completes or a resource fails
//!
//! # Modules
//!
//! - `adapters`: External system integrations (control plane, packager,
//!   prompt, console)
//! - `core`: Deployment logic (Locator, ChangeSet, Events, Orchestrator)
//! - `domain`: Data structures (Stack, StackEvent, ChangeSet, Template)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Deploy a template
//! stackdeploy deploy --stack-name demo --template template.yml
//!
//! # Check stack status
//! stackdeploy status --stack-name demo
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use core::{DeployError, DeployOutcome, DeployRequest, Orchestrator};
pub use domain::{ResourceStatus, StackEvent, Template};
