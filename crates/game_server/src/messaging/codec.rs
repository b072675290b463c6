//! Wire codec: one text frame <-> one script value.

use super::value::ScriptValue;
use crate::error::CodecError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Converts between wire text and script values.
///
/// Implementations must be pure and cheap enough to run on a handler worker.
pub trait MessageCodec: Send + Sync + std::fmt::Debug {
    /// Decodes one inbound text frame.
    fn decode(&self, text: &str) -> Result<ScriptValue, CodecError>;

    /// Encodes one outbound value as a text frame.
    fn encode(&self, value: &ScriptValue) -> Result<String, CodecError>;
}

/// Size and shape limits applied by [`JsonCodec`] in both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecLimits {
    /// Maximum message size in bytes
    pub max_message_size: usize,

    /// Maximum allowed nesting depth of arrays and objects
    pub max_json_depth: usize,
}

impl Default for CodecLimits {
    fn default() -> Self {
        Self {
            max_message_size: 64 * 1024, // 64KB
            max_json_depth: 32,
        }
    }
}

/// JSON codec: each frame is one JSON document.
#[derive(Debug, Clone, Default)]
pub struct JsonCodec {
    limits: CodecLimits,
}

impl JsonCodec {
    pub fn new(limits: CodecLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> CodecLimits {
        self.limits
    }

    fn check_size(&self, size: usize) -> Result<(), CodecError> {
        if size > self.limits.max_message_size {
            return Err(CodecError::TooLarge {
                size,
                limit: self.limits.max_message_size,
            });
        }
        Ok(())
    }

    fn check_depth(&self, value: &Value) -> Result<(), CodecError> {
        if depth(value) > self.limits.max_json_depth {
            return Err(CodecError::TooDeep {
                limit: self.limits.max_json_depth,
            });
        }
        Ok(())
    }
}

impl MessageCodec for JsonCodec {
    fn decode(&self, text: &str) -> Result<ScriptValue, CodecError> {
        self.check_size(text.len())?;
        let value: Value = serde_json::from_str(text)?;
        self.check_depth(&value)?;
        Ok(ScriptValue::new(value))
    }

    fn encode(&self, value: &ScriptValue) -> Result<String, CodecError> {
        self.check_depth(value.as_json())?;
        let text = serde_json::to_string(value.as_json())?;
        self.check_size(text.len())?;
        Ok(text)
    }
}

/// Nesting depth of a JSON value; scalars have depth 0.
fn depth(value: &Value) -> usize {
    match value {
        Value::Array(items) => 1 + items.iter().map(depth).max().unwrap_or(0),
        Value::Object(fields) => 1 + fields.values().map(depth).max().unwrap_or(0),
        _ => 0,
    }
}
