// ── Addressed state values ──

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The two-part address of one attribute on a device.
///
/// `function_instance: None` addresses the unqualified ("primary")
/// instance only; it never acts as a wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateKey {
    pub function_class: String,
    pub function_instance: Option<String>,
}

impl StateKey {
    pub fn new(function_class: impl Into<String>, function_instance: Option<&str>) -> Self {
        Self {
            function_class: function_class.into(),
            function_instance: function_instance.map(str::to_owned),
        }
    }

    /// Exact match on both parts.
    pub fn matches(&self, function_class: &str, function_instance: Option<&str>) -> bool {
        self.function_class == function_class
            && self.function_instance.as_deref() == function_instance
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.function_instance {
            Some(instance) => write!(f, "{}/{instance}", self.function_class),
            None => f.write_str(&self.function_class),
        }
    }
}

/// One state value as last reported by (or optimistically written to) the cloud.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateValue {
    pub function_class: String,
    pub function_instance: Option<String>,
    pub value: Value,
    /// Epoch milliseconds.
    pub last_update_time: i64,
}

impl StateValue {
    pub fn key(&self) -> StateKey {
        StateKey {
            function_class: self.function_class.clone(),
            function_instance: self.function_instance.clone(),
        }
    }

    pub fn matches(&self, function_class: &str, function_instance: Option<&str>) -> bool {
        self.function_class == function_class
            && self.function_instance.as_deref() == function_instance
    }
}
