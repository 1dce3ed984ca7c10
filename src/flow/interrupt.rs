// SPDX-License-Identifier: MIT

//! Interrupt payloads and resume values
//!
//! A stage that needs an external decision returns an [`InterruptPayload`]
//! describing what must be approved. The caller later answers with a
//! [`Resume`] value, which the engine hands verbatim back to the same stage.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Data shown to the approver when a run pauses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterruptPayload {
    /// Checkpoint tag (e.g. "budget_allocation")
    pub checkpoint: String,
    /// Human-readable prompt
    pub message: String,
    /// Projection of the state being approved
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl InterruptPayload {
    pub fn new(checkpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            checkpoint: checkpoint.into(),
            message: message.into(),
            data: Map::new(),
        }
    }

    /// Attach a data entry; values that fail to serialize become `null`
    pub fn with(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.data.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }
}

/// Answer supplied by the caller when resuming a suspended run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resume(Value);

impl Resume {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Plain "proceed" answer
    pub fn approve() -> Self {
        Self(Value::Bool(true))
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    /// True for scalar or null answers, which carry no override
    pub fn is_acknowledgement(&self) -> bool {
        !matches!(self.0, Value::Object(_) | Value::Array(_))
    }

    /// Interpret a structured answer as an override of type `T`
    ///
    /// Returns `None` for acknowledgements and for values whose shape does not
    /// match, so callers fall back to defaults instead of failing.
    pub fn override_as<T: DeserializeOwned>(&self) -> Option<T> {
        if self.is_acknowledgement() {
            return None;
        }
        serde_json::from_value(self.0.clone()).ok()
    }
}

impl From<Value> for Resume {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
