//! Reconciliation of parameter overrides against template declarations.

use anyhow::Result;
use tracing::warn;

use super::error::DeployError;
use crate::domain::Parameter;

/// Parameter values supplied at deploy time, in the order given
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterOverrides {
    entries: Vec<(String, String)>,
}

impl ParameterOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value; a repeated key keeps its first position and takes the
    /// new value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `k1=v1, k2=v2`
    pub fn display_pairs(&self) -> String {
        self.iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Parse `key=value` strings as given on the command line
    pub fn parse_all<'a>(items: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let mut overrides = Self::new();
        for item in items {
            let (key, value) = parse_pair(item)?;
            overrides.insert(key, value);
        }
        Ok(overrides)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ParameterOverrides {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut overrides = Self::new();
        for (k, v) in iter {
            overrides.insert(k, v);
        }
        overrides
    }
}

fn parse_pair(item: &str) -> Result<(String, String)> {
    match item.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => anyhow::bail!("Invalid parameter override '{}', expected key=value", item),
    }
}

/// Shape overrides into the parameter list submitted with a change set.
///
/// - No overrides: nothing is submitted (an update reuses prior values).
/// - Template declares no parameters: overrides are ignored with a warning.
/// - Otherwise every key must be declared; the first unknown key fails.
pub fn reconcile(
    declared_keys: &[String],
    overrides: &ParameterOverrides,
) -> Result<Vec<Parameter>, DeployError> {
    if overrides.is_empty() {
        return Ok(Vec::new());
    }

    if declared_keys.is_empty() {
        warn!(
            ignored = %overrides.display_pairs(),
            "Parameter overrides are not declared in the template and will be ignored"
        );
        return Ok(Vec::new());
    }

    if let Some((key, _)) = overrides
        .iter()
        .find(|(key, _)| !declared_keys.iter().any(|d| d == key))
    {
        return Err(DeployError::Validation {
            key: key.to_string(),
        });
    }

    Ok(overrides
        .iter()
        .map(|(key, value)| Parameter::new(key, value))
        .collect())
}
