//! HTTP client for the orchestration control plane.
//!
//! Requests are RPC-style form posts (`Action=<Operation>` plus flattened
//! parameters) answered with JSON. Request signing is left to the gateway in
//! front of `endpoint`; an optional bearer token is forwarded as-is.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::{ChangeSetRequest, ChangeSetTarget, ServiceError, StackService};
use crate::domain::{
    Change, ChangeAction, ChangeSetSnapshot, CreatedChangeSet, Page, Parameter, StackDetails,
    StackEvent, StackOutput, StackSummary,
};

/// Control plane client bound to one region
pub struct HttpStackService {
    /// HTTP client
    client: reqwest::Client,
    /// Gateway URL all actions are posted to
    endpoint: String,
    region: String,
    /// Bearer token for the gateway
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
    request_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListStacksResponse {
    #[serde(default)]
    total_count: u64,
    #[serde(default)]
    page_number: u32,
    #[serde(default)]
    stacks: Vec<WireStack>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireStack {
    stack_id: String,
    stack_name: String,
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateChangeSetResponse {
    change_set_id: String,
    #[serde(default)]
    stack_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetChangeSetResponse {
    #[serde(default)]
    changes: Option<Vec<WireChange>>,
    #[serde(default)]
    parameters: Option<Vec<WireParameter>>,
    status: String,
    #[serde(default)]
    execution_status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireChange {
    resource_change: WireResourceChange,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireResourceChange {
    logical_resource_id: String,
    #[serde(default)]
    resource_type: String,
    action: String,
    #[serde(default)]
    details: Vec<WireDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireDetail {
    target: WireTarget,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireTarget {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireParameter {
    parameter_key: String,
    #[serde(default)]
    parameter_value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListStackEventsResponse {
    #[serde(default)]
    total_count: u64,
    #[serde(default)]
    page_number: u32,
    #[serde(default)]
    events: Vec<WireEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireEvent {
    logical_resource_id: String,
    #[serde(default)]
    resource_type: String,
    status: String,
    #[serde(default)]
    status_reason: Option<String>,
    #[serde(default)]
    create_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetTemplateResponse {
    template_body: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetStackResponse {
    stack_id: String,
    #[serde(default)]
    stack_name: String,
    status: String,
    #[serde(default)]
    status_reason: Option<String>,
    #[serde(default)]
    outputs: Option<Vec<WireOutput>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireOutput {
    output_key: String,
    #[serde(default)]
    output_value: serde_json::Value,
    #[serde(default)]
    description: Option<String>,
}

impl From<WireChange> for Change {
    fn from(wire: WireChange) -> Self {
        let rc = wire.resource_change;
        Self {
            logical_resource_id: rc.logical_resource_id,
            resource_type: rc.resource_type,
            action: ChangeAction::from(rc.action),
            properties: rc
                .details
                .into_iter()
                .filter_map(|d| d.target.name)
                .collect(),
        }
    }
}

impl From<WireEvent> for StackEvent {
    fn from(wire: WireEvent) -> Self {
        let created_at = wire
            .create_time
            .as_deref()
            .and_then(|t| chrono::DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&chrono::Utc));

        Self {
            logical_resource_id: wire.logical_resource_id,
            resource_type: wire.resource_type,
            status: wire.status.into(),
            status_reason: wire.status_reason,
            created_at,
        }
    }
}

/// Flatten parameters into `Parameters.<n>.ParameterKey/Value` pairs (1-indexed)
pub fn flatten_parameters(parameters: &[Parameter]) -> Vec<(String, String)> {
    parameters
        .iter()
        .enumerate()
        .flat_map(|(idx, p)| {
            let n = idx + 1;
            [
                (format!("Parameters.{}.ParameterKey", n), p.key.clone()),
                (format!("Parameters.{}.ParameterValue", n), p.value.clone()),
            ]
        })
        .collect()
}

/// Form parameters for `CreateChangeSet`
pub fn change_set_form(request: &ChangeSetRequest) -> Vec<(String, String)> {
    let mut form = vec![
        ("ChangeSetName".to_string(), request.change_set_name.clone()),
        (
            "ChangeSetType".to_string(),
            request.change_set_type.as_str().to_string(),
        ),
        ("Description".to_string(), request.description.clone()),
        ("TemplateBody".to_string(), request.template_body.clone()),
        (
            "DisableRollback".to_string(),
            request.disable_rollback.to_string(),
        ),
        (
            "TimeoutInMinutes".to_string(),
            request.timeout_in_minutes.to_string(),
        ),
    ];

    match &request.target {
        ChangeSetTarget::StackName(name) => form.push(("StackName".to_string(), name.clone())),
        ChangeSetTarget::StackId(id) => form.push(("StackId".to_string(), id.clone())),
    }

    if request.use_previous_parameters {
        form.push(("UsePreviousParameters".to_string(), "true".to_string()));
    }

    form.extend(flatten_parameters(&request.parameters));
    form
}

impl HttpStackService {
    /// Create a client for `region` behind `endpoint`
    pub fn new(endpoint: impl Into<String>, region: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            region: region.into(),
            token,
        }
    }

    /// Post one action and decode its JSON answer
    async fn call<T: DeserializeOwned>(
        &self,
        action: &str,
        mut params: Vec<(String, String)>,
    ) -> Result<T, ServiceError> {
        params.push(("Action".to_string(), action.to_string()));
        params.push(("RegionId".to_string(), self.region.clone()));

        debug!(action, region = %self.region, "Sending control plane request");

        let mut request = self.client.post(&self.endpoint).form(&params);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(decode_error(status, &body));
        }

        serde_json::from_str(&body)
            .map_err(|e| ServiceError::Decode(format!("{} response: {}", action, e)))
    }
}

fn decode_error(status: StatusCode, body: &str) -> ServiceError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(err) => ServiceError::Api {
            code: err.code.unwrap_or_else(|| status.as_str().to_string()),
            message: err.message.unwrap_or_default(),
            request_id: err.request_id,
        },
        Err(_) => ServiceError::Api {
            code: status.as_str().to_string(),
            message: body.trim().to_string(),
            request_id: None,
        },
    }
}

fn pair(key: &str, value: impl ToString) -> (String, String) {
    (key.to_string(), value.to_string())
}

#[derive(Debug, Deserialize)]
struct Ignored {}

#[async_trait]
impl StackService for HttpStackService {
    async fn list_stacks(
        &self,
        stack_name: &str,
        page_number: u32,
        page_size: u32,
    ) -> Result<Page<StackSummary>, ServiceError> {
        let rs: ListStacksResponse = self
            .call(
                "ListStacks",
                vec![
                    pair("StackName.1", stack_name),
                    pair("PageSize", page_size),
                    pair("PageNumber", page_number),
                    pair("ShowNestedStack", false),
                ],
            )
            .await?;

        Ok(Page {
            items: rs
                .stacks
                .into_iter()
                .map(|s| StackSummary {
                    stack_id: s.stack_id,
                    stack_name: s.stack_name,
                    status: s.status.into(),
                })
                .collect(),
            total_count: rs.total_count,
            page_number: rs.page_number,
        })
    }

    async fn create_change_set(
        &self,
        request: &ChangeSetRequest,
    ) -> Result<CreatedChangeSet, ServiceError> {
        let rs: CreateChangeSetResponse =
            self.call("CreateChangeSet", change_set_form(request)).await?;

        let stack_id = match (&request.target, rs.stack_id) {
            (_, Some(id)) => id,
            (ChangeSetTarget::StackId(id), None) => id.clone(),
            (ChangeSetTarget::StackName(_), None) => {
                return Err(ServiceError::Decode(
                    "CreateChangeSet response is missing StackId".to_string(),
                ))
            }
        };

        Ok(CreatedChangeSet {
            change_set_id: rs.change_set_id,
            stack_id,
        })
    }

    async fn get_change_set(&self, change_set_id: &str) -> Result<ChangeSetSnapshot, ServiceError> {
        let rs: GetChangeSetResponse = self
            .call(
                "GetChangeSet",
                vec![pair("ChangeSetId", change_set_id), pair("ShowTemplate", true)],
            )
            .await?;

        Ok(ChangeSetSnapshot {
            changes: rs
                .changes
                .map(|changes| changes.into_iter().map(Change::from).collect()),
            parameters: rs
                .parameters
                .unwrap_or_default()
                .into_iter()
                .map(|p| Parameter::new(p.parameter_key, p.parameter_value))
                .collect(),
            status: rs.status.into(),
            execution_status: rs.execution_status.into(),
        })
    }

    async fn execute_change_set(&self, change_set_id: &str) -> Result<(), ServiceError> {
        let _: Ignored = self
            .call("ExecuteChangeSet", vec![pair("ChangeSetId", change_set_id)])
            .await?;
        Ok(())
    }

    async fn delete_change_set(&self, change_set_id: &str) -> Result<(), ServiceError> {
        let _: Ignored = self
            .call("DeleteChangeSet", vec![pair("ChangeSetId", change_set_id)])
            .await?;
        Ok(())
    }

    async fn list_stack_events(
        &self,
        stack_id: &str,
        page_number: u32,
        page_size: u32,
    ) -> Result<Page<StackEvent>, ServiceError> {
        let rs: ListStackEventsResponse = self
            .call(
                "ListStackEvents",
                vec![
                    pair("StackId", stack_id),
                    pair("PageSize", page_size),
                    pair("PageNumber", page_number),
                ],
            )
            .await?;

        Ok(Page {
            items: rs.events.into_iter().map(StackEvent::from).collect(),
            total_count: rs.total_count,
            page_number: rs.page_number,
        })
    }

    async fn get_template(&self, stack_id: &str) -> Result<String, ServiceError> {
        let rs: GetTemplateResponse = self
            .call("GetTemplate", vec![pair("StackId", stack_id)])
            .await?;

        Ok(match rs.template_body {
            serde_json::Value::String(body) => body,
            other => other.to_string(),
        })
    }

    async fn get_stack(&self, stack_id: &str) -> Result<StackDetails, ServiceError> {
        let rs: GetStackResponse = self.call("GetStack", vec![pair("StackId", stack_id)]).await?;

        Ok(StackDetails {
            stack_id: rs.stack_id,
            stack_name: rs.stack_name,
            status: rs.status.into(),
            status_reason: rs.status_reason,
            outputs: rs
                .outputs
                .unwrap_or_default()
                .into_iter()
                .map(|o| StackOutput {
                    key: o.output_key,
                    value: o.output_value,
                    description: o.description,
                })
                .collect(),
        })
    }

    async fn delete_stack(&self, stack_id: &str) -> Result<(), ServiceError> {
        let _: Ignored = self.call("DeleteStack", vec![pair("StackId", stack_id)]).await?;
        Ok(())
    }
}
