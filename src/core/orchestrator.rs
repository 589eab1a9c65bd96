//! Main orchestrator for stack deployment.
//!
//! Coordinates stack lookup, change set submission, confirmation,
//! execution, event polling and result extraction.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::adapters::{CodePackager, DeployReporter, Prompter, StackService};
use crate::config::Profile;
use crate::domain::{
    group_changes, ChangeSetType, ComputedChangeSet, LocatedStack, ResourceStatus, StackEvent,
    StackOutput, Template,
};

use super::change_set::ChangeSetManager;
use super::error::DeployError;
use super::events::EventPoller;
use super::locator::locate;
use super::parameters::{reconcile, ParameterOverrides};
use super::settings::DeploySettings;
use super::transform::ResourceTransformer;
use super::triggers::{detect_triggers, TriggerBinding};

/// One deployment to perform
#[derive(Debug, Clone)]
pub struct DeployRequest {
    pub stack_name: String,
    pub template: Template,
    /// Template file the template was loaded from, if any
    pub template_path: Option<PathBuf>,
    /// Directory relative code locations resolve against
    pub base_dir: PathBuf,
    pub parameter_overrides: ParameterOverrides,
    /// Skip every confirmation prompt
    pub assume_yes: bool,
    pub profile: Profile,
    pub packaged_template_path: PathBuf,
    /// Where the deployed template snapshot is written
    pub remote_template_path: PathBuf,
}

/// Why a deployment stopped without changing anything
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// The user kept a stack left unusable by an earlier deployment
    DeclinedCleanup { status: ResourceStatus },
    /// The user rejected the computed change set
    DeclinedChangeSet,
}

/// What a successful deployment produced
#[derive(Debug, Clone)]
pub struct DeploymentReport {
    pub stack_id: String,
    pub stack_name: String,
    pub change_set_id: String,
    pub change_set_type: ChangeSetType,
    /// Resources the operation completed
    pub events: Vec<StackEvent>,
    pub outputs: Vec<StackOutput>,
    pub triggers: Vec<TriggerBinding>,
    pub remote_template_path: PathBuf,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// How a deployment ended, short of an error
#[derive(Debug, Clone)]
pub enum DeployOutcome {
    Deployed(DeploymentReport),
    /// The template matches what is already deployed
    UpToDate { stack_name: String },
    Aborted(AbortReason),
}

/// Main deployment orchestrator
pub struct Orchestrator {
    service: Arc<dyn StackService>,
    packager: Arc<dyn CodePackager>,
    prompter: Arc<dyn Prompter>,
    reporter: Arc<dyn DeployReporter>,
    settings: DeploySettings,
}

impl Orchestrator {
    pub fn new(
        service: Arc<dyn StackService>,
        packager: Arc<dyn CodePackager>,
        prompter: Arc<dyn Prompter>,
        reporter: Arc<dyn DeployReporter>,
        settings: DeploySettings,
    ) -> Self {
        Self {
            service,
            packager,
            prompter,
            reporter,
            settings,
        }
    }

    /// Deploy a template to a stack
    #[instrument(skip(self, request), fields(stack = %request.stack_name))]
    pub async fn deploy(&self, request: DeployRequest) -> Result<DeployOutcome, DeployError> {
        let started_at = Utc::now();
        let DeployRequest {
            stack_name,
            mut template,
            template_path,
            base_dir,
            parameter_overrides,
            assume_yes,
            profile,
            packaged_template_path,
            remote_template_path,
        } = request;
        let console_url = self.settings.console_url_for(&profile.region);

        // Nothing remote happens before overrides check out
        let parameters = reconcile(&template.parameter_keys(), &parameter_overrides)?;

        ResourceTransformer::new(self.packager.as_ref(), packaged_template_path)
            .transform(&mut template, &profile, &base_dir, template_path.as_deref())
            .await?;

        let located = self
            .locate_live_stack(&stack_name, assume_yes, &console_url)
            .await?;
        let existing = match located {
            Ok(existing) => existing,
            Err(reason) => return Ok(DeployOutcome::Aborted(reason)),
        };

        let manager = ChangeSetManager::new(self.service.as_ref(), &self.settings);
        let (change_set_type, change_set_id, stack_id) = match existing {
            None => {
                info!("Stack does not exist, creating");
                let created = manager.create(&stack_name, &template, &parameters).await?;
                (ChangeSetType::Create, created.change_set_id, created.stack_id)
            }
            Some(stack) => {
                info!(stack_id = %stack.stack_id, status = %stack.status, "Updating existing stack");
                match manager
                    .update(&stack_name, &stack.stack_id, &template, &parameters)
                    .await
                {
                    Ok(change_set_id) => (ChangeSetType::Update, change_set_id, stack.stack_id),
                    Err(DeployError::NoOpUpdate { stack_name }) => {
                        info!("Template unchanged, nothing to deploy");
                        return Ok(DeployOutcome::UpToDate { stack_name });
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        let computed = manager.await_computed_diff(&change_set_id).await?;

        if !assume_yes && !self.confirm_change_set(&computed).await? {
            self.discard(&manager, change_set_type, &change_set_id, &stack_id, &computed)
                .await?;
            return Ok(DeployOutcome::Aborted(AbortReason::DeclinedChangeSet));
        }

        manager.execute(&change_set_id).await?;

        let events = self
            .poll_until_complete(&stack_id, &stack_name, &console_url)
            .await?;

        let triggers = self
            .save_remote_template(&stack_id, &remote_template_path)
            .await?;
        if !triggers.is_empty() {
            self.reporter.triggers(&triggers);
        }

        let details = self.service.get_stack(&stack_id).await?;
        if !details.outputs.is_empty() {
            self.reporter.outputs(&details.outputs);
        }
        self.reporter.success(&console_url);
        info!(%stack_id, "Deployment complete");

        Ok(DeployOutcome::Deployed(DeploymentReport {
            stack_id,
            stack_name,
            change_set_id,
            change_set_type,
            events,
            outputs: details.outputs,
            triggers,
            remote_template_path,
            started_at,
            completed_at: Utc::now(),
        }))
    }

    /// Find the stack, replacing it first if an earlier deployment left it
    /// unusable.
    ///
    /// The inner `Err` is a user decision to stop.
    async fn locate_live_stack(
        &self,
        stack_name: &str,
        assume_yes: bool,
        console_url: &str,
    ) -> Result<Result<Option<LocatedStack>, AbortReason>, DeployError> {
        let mut redeploys = 0u32;

        loop {
            let located = locate(self.service.as_ref(), stack_name, self.settings.stack_page_size)
                .await?;

            let stack = match located {
                Some(stack) if stack.status.is_dead() => stack,
                other => return Ok(Ok(other)),
            };

            if redeploys >= self.settings.max_redeploys {
                return Err(DeployError::RedeployLimit {
                    stack_name: stack_name.to_string(),
                    attempts: redeploys,
                });
            }

            warn!(stack_id = %stack.stack_id, status = %stack.status, "Stack is unusable");
            let message = format!(
                "Stack '{}' is in status {} and cannot be updated. Delete it and deploy again?",
                stack_name, stack.status
            );
            if !assume_yes && !self.prompter.confirm(&message).await? {
                info!("Keeping the existing stack, deployment aborted");
                return Ok(Err(AbortReason::DeclinedCleanup {
                    status: stack.status,
                }));
            }

            self.service.delete_stack(&stack.stack_id).await?;
            self.wait_stack_deleted(&stack.stack_id, console_url).await?;
            redeploys += 1;
        }
    }

    /// Poll the stack until the service reports it gone
    #[instrument(skip(self, console_url))]
    async fn wait_stack_deleted(&self, stack_id: &str, console_url: &str) -> Result<(), DeployError> {
        loop {
            tokio::time::sleep(self.settings.delete_poll_interval()).await;

            let details = match self.service.get_stack(stack_id).await {
                Ok(details) => details,
                Err(e) if e.is_stack_not_found() => {
                    debug!("Stack no longer listed");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };

            info!(status = %details.status, "Waiting for stack deletion");
            match details.status {
                ResourceStatus::DeleteComplete => return Ok(()),
                ResourceStatus::DeleteFailed => {
                    return Err(DeployError::DeploymentFailed {
                        reason: details
                            .status_reason
                            .unwrap_or_else(|| "stack deletion failed".to_string()),
                        console_url: console_url.to_string(),
                    })
                }
                _ => {}
            }
        }
    }

    async fn confirm_change_set(&self, computed: &ComputedChangeSet) -> Result<bool, DeployError> {
        self.reporter.changes(&group_changes(&computed.changes));
        self.reporter.parameters(&computed.parameters);

        Ok(self.prompter.confirm("Please confirm to continue.").await?)
    }

    /// Clean up after a declined change set
    async fn discard(
        &self,
        manager: &ChangeSetManager<'_>,
        change_set_type: ChangeSetType,
        change_set_id: &str,
        stack_id: &str,
        computed: &ComputedChangeSet,
    ) -> Result<(), DeployError> {
        manager.delete(change_set_id, computed).await?;

        // A CREATE change set leaves an empty stack behind
        if change_set_type == ChangeSetType::Create
            && computed.status == ResourceStatus::CreateComplete
        {
            self.service.delete_stack(stack_id).await?;
            info!(%stack_id, "Deleted stack created for the declined change set");
        }
        Ok(())
    }

    /// Tail the event log until the stack completes.
    ///
    /// Returns the resources the operation completed.
    #[instrument(skip(self, console_url))]
    async fn poll_until_complete(
        &self,
        stack_id: &str,
        stack_name: &str,
        console_url: &str,
    ) -> Result<Vec<StackEvent>, DeployError> {
        let poller = EventPoller::new(
            self.service.as_ref(),
            stack_id,
            stack_name,
            self.settings.event_page_size,
            console_url,
        );
        let started = Instant::now();

        loop {
            let round = poller.poll().await?;
            if !round.events.is_empty() {
                self.reporter.events(stack_name, &round.events);
            }
            if round.completed {
                return Ok(round.events);
            }

            if let Some(limit) = self.settings.poll_timeout() {
                let elapsed = started.elapsed();
                if elapsed >= limit {
                    return Err(DeployError::PollTimeout {
                        stack_name: stack_name.to_string(),
                        elapsed,
                    });
                }
            }

            tokio::time::sleep(self.settings.event_poll_interval()).await;
        }
    }

    /// Fetch the deployed template, keep a snapshot and find its triggers
    async fn save_remote_template(
        &self,
        stack_id: &str,
        path: &Path,
    ) -> Result<Vec<TriggerBinding>, DeployError> {
        let body = self.service.get_template(stack_id).await?;

        let parsed = serde_json::from_str::<Value>(&body);
        let contents = match &parsed {
            Ok(value) => pretty_json(value)?,
            Err(e) => {
                warn!(error = %e, "Remote template is not valid JSON, saving it verbatim");
                body.clone()
            }
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write remote template: {}", path.display()))?;
        debug!(path = %path.display(), "Saved remote template");

        let triggers = parsed
            .ok()
            .as_ref()
            .and_then(|v| v.get("Resources"))
            .and_then(Value::as_object)
            .map(detect_triggers)
            .unwrap_or_default();
        Ok(triggers)
    }
}

/// JSON with 4-space indentation
fn pretty_json(value: &Value) -> anyhow::Result<String> {
    use serde::Serialize;

    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value
        .serialize(&mut serializer)
        .context("Failed to format remote template")?;
    String::from_utf8(out).context("Formatted template is not UTF-8")
}
