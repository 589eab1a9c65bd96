//! Change sets: previewable diffs between a stack and a proposed template.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::status::{ExecutionStatus, ResourceStatus};
use super::template::Parameter;

/// Whether a change set creates a new stack or updates an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeSetType {
    Create,
    Update,
}

impl ChangeSetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
        }
    }
}

impl fmt::Display for ChangeSetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Action the service will take on a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ChangeAction {
    Add,
    Modify,
    Remove,
    Other(String),
}

impl ChangeAction {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Add => "Add",
            Self::Modify => "Modify",
            Self::Remove => "Remove",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for ChangeAction {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Add" => Self::Add,
            "Modify" => Self::Modify,
            "Remove" => Self::Remove,
            _ => Self::Other(s),
        }
    }
}

impl From<ChangeAction> for String {
    fn from(action: ChangeAction) -> Self {
        action.as_str().to_string()
    }
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A single resource-level change computed by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub logical_resource_id: String,
    pub resource_type: String,
    pub action: ChangeAction,
    /// Names of the affected properties, in service order
    #[serde(default)]
    pub properties: Vec<String>,
}

/// Change set as returned once its diff has been computed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputedChangeSet {
    pub changes: Vec<Change>,
    pub parameters: Vec<Parameter>,
    pub status: ResourceStatus,
    pub execution_status: ExecutionStatus,
}

impl ComputedChangeSet {
    /// Deleting now cannot interfere with an execution
    pub fn can_delete(&self) -> bool {
        self.status.allows_change_set_delete() && self.execution_status.allows_delete()
    }
}

/// Change set as returned by a single `GetChangeSet` call.
///
/// `changes` stays `None` while the service is still computing the diff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeSetSnapshot {
    pub changes: Option<Vec<Change>>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    pub status: ResourceStatus,
    pub execution_status: ExecutionStatus,
}

/// Identifiers returned when a CREATE change set is submitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedChangeSet {
    pub change_set_id: String,
    pub stack_id: String,
}

/// Composite key used to group changes for display
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChangeKey {
    pub logical_resource_id: String,
    pub resource_type: String,
    pub action: ChangeAction,
}

/// All affected properties for one (resource, type, action) triple
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeGroup {
    pub key: ChangeKey,
    pub properties: Vec<String>,
}

/// Group changes by resource, type and action, keeping first-seen order.
///
/// Changes sharing a key have their property lists concatenated.
pub fn group_changes(changes: &[Change]) -> Vec<ChangeGroup> {
    let mut groups: Vec<ChangeGroup> = Vec::new();
    let mut index: HashMap<ChangeKey, usize> = HashMap::new();

    for change in changes {
        let key = ChangeKey {
            logical_resource_id: change.logical_resource_id.clone(),
            resource_type: change.resource_type.clone(),
            action: change.action.clone(),
        };

        match index.get(&key) {
            Some(&i) => groups[i].properties.extend(change.properties.iter().cloned()),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(ChangeGroup {
                    key,
                    properties: change.properties.clone(),
                });
            }
        }
    }

    groups
}
