//! Opaque script values.

use serde::{Deserialize, Serialize};

/// A value produced or consumed by the script runtime.
///
/// The core forwards these without looking inside. The representation is a
/// JSON document because that is what the wire codec produces; workers are
/// free to interpret it as tables, arrays or scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScriptValue(serde_json::Value);

impl ScriptValue {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// The nil value.
    pub fn nil() -> Self {
        Self(serde_json::Value::Null)
    }

    pub fn as_json(&self) -> &serde_json::Value {
        &self.0
    }

    /// Looks up a field if this value is a table.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }
}

impl From<serde_json::Value> for ScriptValue {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for ScriptValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
