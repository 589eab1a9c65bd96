//! In-memory resource templates and parameters.
//!
//! Templates are kept as a JSON object tree so they can be rewritten before
//! submission without a schema for every resource type.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const FUNCTION_RESOURCE_TYPE: &str = "ALIYUN::FC::Function";
pub const TRIGGER_RESOURCE_TYPE: &str = "ALIYUN::FC::Trigger";
pub const CUSTOM_DOMAIN_RESOURCE_TYPE: &str = "ALIYUN::FC::CustomDomain";

/// A template parameter with the value submitted for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub key: String,
    pub value: String,
}

impl Parameter {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A declarative resource template
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Template {
    root: Map<String, Value>,
}

impl Template {
    /// Load a template from a YAML or JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read template file: {}", path.display()))?;

        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse template file: {}", path.display()))
    }

    /// Parse a template from YAML (JSON is accepted as a YAML subset)
    pub fn from_yaml(content: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(content).context("Failed to parse template")?;
        Self::from_value(value)
    }

    /// Wrap a JSON value, which must be an object
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(root) => Ok(Self { root }),
            other => anyhow::bail!("Template must be a mapping, got: {}", other),
        }
    }

    pub fn as_value(&self) -> Value {
        Value::Object(self.root.clone())
    }

    /// Names of the parameters the template declares
    pub fn parameter_keys(&self) -> Vec<String> {
        self.root
            .get("Parameters")
            .and_then(Value::as_object)
            .map(|params| params.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Template is processed server-side by a transform macro
    pub fn has_transform(&self) -> bool {
        self.root.get("Transform").map_or(false, |t| !t.is_null())
    }

    pub fn resources(&self) -> Option<&Map<String, Value>> {
        self.root.get("Resources").and_then(Value::as_object)
    }

    pub fn resources_mut(&mut self) -> Option<&mut Map<String, Value>> {
        self.root.get_mut("Resources").and_then(Value::as_object_mut)
    }

    /// Serialized body for submission
    pub fn to_body(&self) -> Result<String> {
        serde_json::to_string(&self.root).context("Failed to serialize template")
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&self.root).context("Failed to serialize template as YAML")
    }
}

/// Type tag of a resource definition
pub fn resource_type(resource: &Value) -> Option<&str> {
    resource.get("Type").and_then(Value::as_str)
}
