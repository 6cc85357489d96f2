//! Read-only context shared with validators and the critic.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key/value context for a validation or critique run.
///
/// Shared between concurrently running validators behind an `Arc`; nothing
/// in the pipeline mutates it after construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationContext {
    /// Path of the document being validated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,

    /// Document family, used to select family-specific overrides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,

    /// Arbitrary additional values.
    #[serde(default)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ValidationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_family(mut self, family: impl Into<String>) -> Self {
        self.family = Some(family.into());
        self
    }

    pub fn with_value(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.extra.get(key)
    }
}
