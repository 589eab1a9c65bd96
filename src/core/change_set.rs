//! Change set lifecycle: submit, wait for the diff, execute, delete.

use std::time::Duration;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::error::DeployError;
use super::retry::retry;
use super::settings::DeploySettings;
use crate::adapters::{ChangeSetRequest, ChangeSetTarget, ServiceError, StackService};
use crate::domain::{ChangeSetType, ComputedChangeSet, CreatedChangeSet, Parameter, Template};

const CHANGE_SET_DESCRIPTION: &str = "generated by stackdeploy";

/// Fresh, unique change set name
pub fn generate_change_set_name() -> String {
    format!("stackdeploy-{}", Uuid::new_v4())
}

/// Drives change sets for one deployment
pub struct ChangeSetManager<'a> {
    service: &'a dyn StackService,
    settings: &'a DeploySettings,
}

impl<'a> ChangeSetManager<'a> {
    pub fn new(service: &'a dyn StackService, settings: &'a DeploySettings) -> Self {
        Self { service, settings }
    }

    fn request(
        &self,
        change_set_type: ChangeSetType,
        target: ChangeSetTarget,
        template: &Template,
        parameters: &[Parameter],
    ) -> Result<ChangeSetRequest, DeployError> {
        let update = change_set_type == ChangeSetType::Update;
        Ok(ChangeSetRequest {
            change_set_name: generate_change_set_name(),
            change_set_type,
            target,
            description: CHANGE_SET_DESCRIPTION.to_string(),
            template_body: template.to_body()?,
            // a failed create stays around for inspection
            disable_rollback: !update,
            timeout_in_minutes: self.settings.timeout_in_minutes,
            use_previous_parameters: update,
            parameters: parameters.to_vec(),
        })
    }

    /// Submit a CREATE change set for a stack that does not exist yet
    #[instrument(skip(self, template, parameters))]
    pub async fn create(
        &self,
        stack_name: &str,
        template: &Template,
        parameters: &[Parameter],
    ) -> Result<CreatedChangeSet, DeployError> {
        let request = self.request(
            ChangeSetType::Create,
            ChangeSetTarget::StackName(stack_name.to_string()),
            template,
            parameters,
        )?;
        debug!(change_set_name = %request.change_set_name, "Creating CREATE change set");

        let created = self.service.create_change_set(&request).await?;
        info!(change_set_id = %created.change_set_id, stack_id = %created.stack_id, "Change set submitted");
        Ok(created)
    }

    /// Submit an UPDATE change set against an existing stack.
    ///
    /// A service rejection for an identical template becomes
    /// `DeployError::NoOpUpdate`; any other error propagates unchanged.
    #[instrument(skip(self, template, parameters))]
    pub async fn update(
        &self,
        stack_name: &str,
        stack_id: &str,
        template: &Template,
        parameters: &[Parameter],
    ) -> Result<String, DeployError> {
        let request = self.request(
            ChangeSetType::Update,
            ChangeSetTarget::StackId(stack_id.to_string()),
            template,
            parameters,
        )?;
        debug!(change_set_name = %request.change_set_name, "Creating UPDATE change set");

        match self.service.create_change_set(&request).await {
            Ok(created) => {
                info!(change_set_id = %created.change_set_id, "Change set submitted");
                Ok(created.change_set_id)
            }
            Err(e) if e.is_same_stack_update() => Err(DeployError::NoOpUpdate {
                stack_name: stack_name.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Poll until the service has computed the change set's diff
    #[instrument(skip(self))]
    pub async fn await_computed_diff(
        &self,
        change_set_id: &str,
    ) -> Result<ComputedChangeSet, DeployError> {
        let interval = Duration::from_millis(self.settings.change_set_poll_interval_ms);
        let max_polls = self.settings.change_set_max_polls.max(1);

        for attempt in 1..=max_polls {
            tokio::time::sleep(interval).await;

            let snapshot = self.service.get_change_set(change_set_id).await?;
            if let Some(changes) = snapshot.changes {
                debug!(attempt, changes = changes.len(), status = %snapshot.status, "Change set computed");
                return Ok(ComputedChangeSet {
                    changes,
                    parameters: snapshot.parameters,
                    status: snapshot.status,
                    execution_status: snapshot.execution_status,
                });
            }
        }

        Err(DeployError::ChangeSetTimeout {
            change_set_id: change_set_id.to_string(),
            attempts: max_polls,
        })
    }

    /// Execute the change set, retrying while its stack is still being created
    #[instrument(skip(self))]
    pub async fn execute(&self, change_set_id: &str) -> Result<(), DeployError> {
        retry(
            &self.settings.execute_retry,
            |attempt| {
                debug!(attempt, "Executing change set");
                self.service.execute_change_set(change_set_id)
            },
            ServiceError::is_execute_race,
        )
        .await?;

        info!("Change set execution started");
        Ok(())
    }

    /// Delete the change set if it is in a safely deletable state.
    ///
    /// Returns whether a delete was issued.
    #[instrument(skip(self, computed))]
    pub async fn delete(
        &self,
        change_set_id: &str,
        computed: &ComputedChangeSet,
    ) -> Result<bool, DeployError> {
        if !computed.can_delete() {
            warn!(
                status = %computed.status,
                execution_status = %computed.execution_status,
                "Change set is not in a deletable state, leaving it in place"
            );
            return Ok(false);
        }

        self.service.delete_change_set(change_set_id).await?;
        info!("Deleted change set");
        Ok(true)
    }
}
