//! Tool input types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Arguments the model supplied for one tool invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInput {
    pub name: String,
    pub params: HashMap<String, serde_json::Value>,
}

impl ToolInput {
    /// Create a new ToolInput with no parameters
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: HashMap::new(),
        }
    }

    /// Build an input from the raw JSON argument string sent by the model.
    ///
    /// Anything that is not a JSON object (malformed text, arrays, null)
    /// yields an empty parameter set so the tool can report what is missing.
    pub fn from_arguments(name: impl Into<String>, arguments_json: &str) -> Self {
        let params = match serde_json::from_str::<serde_json::Value>(arguments_json) {
            Ok(serde_json::Value::Object(map)) => map.into_iter().collect(),
            _ => HashMap::new(),
        };
        Self {
            name: name.into(),
            params,
        }
    }

    /// Add a parameter
    pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Get a string parameter
    pub fn param_str(&self, key: &str) -> Result<String, ToolError> {
        self.params
            .get(key)
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| ToolError::MissingParameter(key.to_string()))
    }

    /// Get an i64 parameter
    pub fn param_i64(&self, key: &str) -> Result<i64, ToolError> {
        self.params
            .get(key)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| ToolError::MissingParameter(key.to_string()))
    }

    /// Get a non-negative integer parameter
    pub fn param_u64(&self, key: &str) -> Result<u64, ToolError> {
        let value = self
            .params
            .get(key)
            .ok_or_else(|| ToolError::MissingParameter(key.to_string()))?;
        value
            .as_u64()
            .ok_or_else(|| {
                ToolError::InvalidParameter(format!("{} must be a non-negative integer", key))
            })
    }

    /// Get a list of non-negative integers.
    ///
    /// Entries that are not non-negative integers are skipped; a missing key
    /// or a non-array value is an error.
    pub fn param_u64_list(&self, key: &str) -> Result<Vec<u64>, ToolError> {
        let value = self
            .params
            .get(key)
            .ok_or_else(|| ToolError::MissingParameter(key.to_string()))?;
        let items = value
            .as_array()
            .ok_or_else(|| ToolError::InvalidParameter(format!("{} must be an array", key)))?;
        Ok(items.iter().filter_map(|v| v.as_u64()).collect())
    }

    /// Get an optional string parameter
    pub fn param_str_opt(&self, key: &str) -> Option<String> {
        self.params
            .get(key)
            .and_then(|v| v.as_str())
            .map(String::from)
    }
}

/// Tool-specific errors
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}
