//! Scripted in-memory collaborators for integration tests.

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;

use stackdeploy::adapters::{
    ChangeSetRequest, CodePackager, DeployReporter, PackageRequest, PackagedCode, Prompter,
    ServiceError, StackService,
};
use stackdeploy::config::Profile;
use stackdeploy::core::{DeployRequest, DeploySettings, Orchestrator, ParameterOverrides, TriggerBinding};
use stackdeploy::domain::{
    Change, ChangeAction, ChangeGroup, ChangeSetSnapshot, CreatedChangeSet, ExecutionStatus, Page,
    Parameter, ResourceStatus, StackDetails, StackEvent, StackOutput, StackSummary, Template,
    STACK_RESOURCE_TYPE,
};

pub const STACK_NAME: &str = "demo";
pub const NEW_STACK_ID: &str = "stack-new";
pub const CHANGE_SET_ID: &str = "cs-1";
pub const FUNCTION: &str = "ALIYUN::FC::Function";

/// A remote call observed by the fake
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ListStacks { page_number: u32 },
    CreateChangeSet,
    GetChangeSet(String),
    ExecuteChangeSet(String),
    DeleteChangeSet(String),
    ListStackEvents { page_number: u32 },
    GetTemplate(String),
    GetStack(String),
    DeleteStack(String),
}

/// Control plane fake.
///
/// Event logs and change set snapshots are scripted per round: the n-th
/// first-page event listing sees the n-th log, and the last entry repeats
/// once the script runs out.
#[derive(Default)]
pub struct FakeStackService {
    pub stacks: Mutex<Vec<StackSummary>>,
    pub create_results: Mutex<VecDeque<Result<CreatedChangeSet, ServiceError>>>,
    pub change_sets: Mutex<Vec<ChangeSetSnapshot>>,
    pub execute_results: Mutex<VecDeque<Result<(), ServiceError>>>,
    pub event_logs: Mutex<Vec<Vec<StackEvent>>>,
    pub template_body: Mutex<String>,
    pub outputs: Mutex<Vec<StackOutput>>,
    /// Statuses reported for a deleted stack before it disappears
    pub deleting: Mutex<VecDeque<ResourceStatus>>,
    pub requests: Mutex<Vec<ChangeSetRequest>>,
    pub calls: Mutex<Vec<Call>>,
    deleted: Mutex<HashSet<String>>,
    change_set_polls: Mutex<usize>,
    event_rounds: Mutex<usize>,
}

fn scripted<T: Clone>(items: &[T], index: usize) -> Option<T> {
    items.get(index.min(items.len().saturating_sub(1))).cloned()
}

fn paged<T: Clone>(items: &[T], page_number: u32, page_size: u32) -> Page<T> {
    let start = ((page_number.max(1) - 1) * page_size) as usize;
    let end = (start + page_size as usize).min(items.len());
    Page {
        items: items.get(start..end).map(<[T]>::to_vec).unwrap_or_default(),
        total_count: items.len() as u64,
        page_number,
    }
}

impl FakeStackService {
    pub fn new() -> Self {
        let fake = Self::default();
        *fake.template_body.lock().unwrap() =
            r#"{"ROSTemplateFormatVersion":"2015-09-01","Resources":{}}"#.to_string();
        fake
    }

    pub fn with_stack(self, stack_id: &str, stack_name: &str, status: ResourceStatus) -> Self {
        self.stacks.lock().unwrap().push(StackSummary {
            stack_id: stack_id.to_string(),
            stack_name: stack_name.to_string(),
            status,
        });
        self
    }

    pub fn with_change_set(self, snapshot: ChangeSetSnapshot) -> Self {
        self.change_sets.lock().unwrap().push(snapshot);
        self
    }

    pub fn with_create_result(self, result: Result<CreatedChangeSet, ServiceError>) -> Self {
        self.create_results.lock().unwrap().push_back(result);
        self
    }

    pub fn with_execute_result(self, result: Result<(), ServiceError>) -> Self {
        self.execute_results.lock().unwrap().push_back(result);
        self
    }

    /// Add the next snapshot of the event log (newest first)
    pub fn with_event_log(self, log: Vec<StackEvent>) -> Self {
        self.event_logs.lock().unwrap().push(log);
        self
    }

    pub fn with_template(self, body: &str) -> Self {
        *self.template_body.lock().unwrap() = body.to_string();
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| matches(c)).count()
    }

    pub fn requests(&self) -> Vec<ChangeSetRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl StackService for FakeStackService {
    async fn list_stacks(
        &self,
        _stack_name: &str,
        page_number: u32,
        page_size: u32,
    ) -> Result<Page<StackSummary>, ServiceError> {
        self.record(Call::ListStacks { page_number });
        Ok(paged(&self.stacks.lock().unwrap(), page_number, page_size))
    }

    async fn create_change_set(
        &self,
        request: &ChangeSetRequest,
    ) -> Result<CreatedChangeSet, ServiceError> {
        self.record(Call::CreateChangeSet);
        self.requests.lock().unwrap().push(request.clone());

        self.create_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(CreatedChangeSet {
                    change_set_id: CHANGE_SET_ID.to_string(),
                    stack_id: NEW_STACK_ID.to_string(),
                })
            })
    }

    async fn get_change_set(&self, change_set_id: &str) -> Result<ChangeSetSnapshot, ServiceError> {
        self.record(Call::GetChangeSet(change_set_id.to_string()));

        let mut polls = self.change_set_polls.lock().unwrap();
        let snapshot = scripted(&self.change_sets.lock().unwrap(), *polls);
        *polls += 1;
        snapshot.ok_or_else(|| ServiceError::api("ChangeSetNotFound", "no scripted change set"))
    }

    async fn execute_change_set(&self, change_set_id: &str) -> Result<(), ServiceError> {
        self.record(Call::ExecuteChangeSet(change_set_id.to_string()));
        self.execute_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }

    async fn delete_change_set(&self, change_set_id: &str) -> Result<(), ServiceError> {
        self.record(Call::DeleteChangeSet(change_set_id.to_string()));
        Ok(())
    }

    async fn list_stack_events(
        &self,
        _stack_id: &str,
        page_number: u32,
        page_size: u32,
    ) -> Result<Page<StackEvent>, ServiceError> {
        self.record(Call::ListStackEvents { page_number });

        let mut rounds = self.event_rounds.lock().unwrap();
        if page_number == 1 {
            *rounds += 1;
        }
        let log = scripted(&self.event_logs.lock().unwrap(), rounds.saturating_sub(1))
            .unwrap_or_default();
        Ok(paged(&log, page_number, page_size))
    }

    async fn get_template(&self, stack_id: &str) -> Result<String, ServiceError> {
        self.record(Call::GetTemplate(stack_id.to_string()));
        Ok(self.template_body.lock().unwrap().clone())
    }

    async fn get_stack(&self, stack_id: &str) -> Result<StackDetails, ServiceError> {
        self.record(Call::GetStack(stack_id.to_string()));

        if self.deleted.lock().unwrap().contains(stack_id) {
            return match self.deleting.lock().unwrap().pop_front() {
                Some(status) => Ok(StackDetails {
                    stack_id: stack_id.to_string(),
                    stack_name: STACK_NAME.to_string(),
                    status,
                    status_reason: None,
                    outputs: Vec::new(),
                }),
                None => Err(ServiceError::api("StackNotFound", "stack does not exist")),
            };
        }

        Ok(StackDetails {
            stack_id: stack_id.to_string(),
            stack_name: STACK_NAME.to_string(),
            status: ResourceStatus::CreateComplete,
            status_reason: None,
            outputs: self.outputs.lock().unwrap().clone(),
        })
    }

    async fn delete_stack(&self, stack_id: &str) -> Result<(), ServiceError> {
        self.record(Call::DeleteStack(stack_id.to_string()));
        self.stacks.lock().unwrap().retain(|s| s.stack_id != stack_id);
        self.deleted.lock().unwrap().insert(stack_id.to_string());
        Ok(())
    }
}

/// Answers prompts from a script; an exhausted script declines
#[derive(Default)]
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<bool>>,
    pub asked: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn answering(answers: &[bool]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().copied().collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn confirm(&self, message: &str) -> Result<bool> {
        self.asked.lock().unwrap().push(message.to_string());
        Ok(self.answers.lock().unwrap().pop_front().unwrap_or(false))
    }
}

/// Packager that pretends every upload lands in one bucket
#[derive(Default)]
pub struct FakePackager {
    pub requests: Mutex<Vec<String>>,
    /// Report uploads without an object name
    pub drops_object: Mutex<bool>,
}

#[async_trait]
impl CodePackager for FakePackager {
    async fn package(&self, request: &PackageRequest) -> Result<PackagedCode> {
        self.requests.lock().unwrap().push(request.code_uri.clone());
        let object_name = if *self.drops_object.lock().unwrap() {
            None
        } else {
            Some(format!("{}.zip", request.code_uri.trim_start_matches("./")))
        };
        Ok(PackagedCode {
            bucket: "code-bucket".to_string(),
            object_name,
        })
    }
}

/// Keeps everything it was asked to render
#[derive(Default)]
pub struct RecordingReporter {
    pub changes: Mutex<Vec<ChangeGroup>>,
    pub parameters: Mutex<Vec<Parameter>>,
    pub rounds: Mutex<Vec<Vec<StackEvent>>>,
    pub triggers: Mutex<Vec<TriggerBinding>>,
    pub outputs: Mutex<Vec<StackOutput>>,
    pub successes: Mutex<Vec<String>>,
}

impl DeployReporter for RecordingReporter {
    fn changes(&self, groups: &[ChangeGroup]) {
        self.changes.lock().unwrap().extend_from_slice(groups);
    }

    fn parameters(&self, parameters: &[Parameter]) {
        self.parameters.lock().unwrap().extend_from_slice(parameters);
    }

    fn events(&self, _stack_name: &str, events: &[StackEvent]) {
        self.rounds.lock().unwrap().push(events.to_vec());
    }

    fn triggers(&self, bindings: &[TriggerBinding]) {
        self.triggers.lock().unwrap().extend_from_slice(bindings);
    }

    fn outputs(&self, outputs: &[StackOutput]) {
        self.outputs.lock().unwrap().extend_from_slice(outputs);
    }

    fn success(&self, console_url: &str) {
        self.successes.lock().unwrap().push(console_url.to_string());
    }
}

/// Collaborators wired into one orchestrator
pub struct Harness {
    pub service: Arc<FakeStackService>,
    pub prompter: Arc<ScriptedPrompter>,
    pub packager: Arc<FakePackager>,
    pub reporter: Arc<RecordingReporter>,
    pub orchestrator: Orchestrator,
}

impl Harness {
    pub fn new(service: FakeStackService, prompter: ScriptedPrompter) -> Self {
        Self::with_settings(service, prompter, DeploySettings::immediate())
    }

    pub fn with_settings(
        service: FakeStackService,
        prompter: ScriptedPrompter,
        settings: DeploySettings,
    ) -> Self {
        let service = Arc::new(service);
        let prompter = Arc::new(prompter);
        let packager = Arc::new(FakePackager::default());
        let reporter = Arc::new(RecordingReporter::default());

        let orchestrator = Orchestrator::new(
            service.clone(),
            packager.clone(),
            prompter.clone(),
            reporter.clone(),
            settings,
        );

        Self {
            service,
            prompter,
            packager,
            reporter,
            orchestrator,
        }
    }
}

pub fn stack_event(status: ResourceStatus) -> StackEvent {
    StackEvent::new(STACK_NAME, STACK_RESOURCE_TYPE, status)
}

pub fn resource_event(logical_id: &str, status: ResourceStatus) -> StackEvent {
    StackEvent::new(logical_id, FUNCTION, status)
}

pub fn computed_change_set(status: ResourceStatus) -> ChangeSetSnapshot {
    ChangeSetSnapshot {
        changes: Some(vec![Change {
            logical_resource_id: "web".to_string(),
            resource_type: FUNCTION.to_string(),
            action: ChangeAction::Add,
            properties: Vec::new(),
        }]),
        parameters: vec![Parameter::new("baz", "qux")],
        status,
        execution_status: ExecutionStatus::Available,
    }
}

pub fn pending_change_set() -> ChangeSetSnapshot {
    ChangeSetSnapshot {
        changes: None,
        parameters: Vec::new(),
        status: ResourceStatus::CreateInProgress,
        execution_status: ExecutionStatus::Unavailable,
    }
}

/// Event log of a CREATE that finished
pub fn completed_create_log() -> Vec<StackEvent> {
    vec![
        stack_event(ResourceStatus::CreateComplete),
        resource_event("web", ResourceStatus::CreateComplete),
        resource_event("web", ResourceStatus::CreateInProgress),
        stack_event(ResourceStatus::CreateInProgress),
    ]
}

pub fn template() -> Template {
    Template::from_yaml(
        r#"
ROSTemplateFormatVersion: '2015-09-01'
Parameters:
  baz:
    Type: String
Resources:
  web:
    Type: ALIYUN::FC::Function
    Properties:
      ServiceName: svc
      FunctionName: web
      Handler: index.handler
      Runtime: python3
      Code:
        OssBucketName: code-bucket
        OssObjectName: web.zip
"#,
    )
    .unwrap()
}

/// Template whose single function still points at local source
pub fn local_code_template() -> Template {
    Template::from_yaml(
        r#"
Resources:
  web:
    Type: ALIYUN::FC::Function
    Properties:
      ServiceName: svc
      FunctionName: web
      Runtime: python3
      CodeUri: ./src
      AsyncConfiguration:
        Destination:
          OnFailure: "acs:fc:::services/svc/functions/dlq"
"#,
    )
    .unwrap()
}

pub fn profile() -> Profile {
    Profile {
        region: "cn-hangzhou".to_string(),
        account_id: "1234567890".to_string(),
    }
}

pub fn request(work_dir: &Path, template: Template, assume_yes: bool) -> DeployRequest {
    DeployRequest {
        stack_name: STACK_NAME.to_string(),
        template,
        template_path: None,
        base_dir: work_dir.to_path_buf(),
        parameter_overrides: ParameterOverrides::new(),
        assume_yes,
        profile: profile(),
        packaged_template_path: work_dir.join("template.packaged.yml"),
        remote_template_path: work_dir.join("tmp").join("remote_template.json"),
    }
}
