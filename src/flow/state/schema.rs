// SPDX-License-Identifier: MIT

//! State schema definitions

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::flow::error::FlowError;

/// How a partial update for a field combines with the stored value
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MergeRule {
    /// New value overwrites the old one (default)
    #[default]
    Replace,
    /// New list items are concatenated, order preserved, duplicates kept
    Append,
}

/// Field name to merge rule mapping for a shared state type
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct StateSchema {
    #[serde(flatten)]
    pub fields: HashMap<String, MergeRule>,
}

impl StateSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field; redeclaring keeps the first rule
    pub fn field(mut self, name: &str, rule: MergeRule) -> Self {
        self.fields.entry(name.to_string()).or_insert(rule);
        self
    }

    /// Merge rule declared for a field
    pub fn rule(&self, name: &str) -> Option<MergeRule> {
        self.fields.get(name).copied()
    }

    /// Names of all fields declared `append`, sorted
    pub fn append_fields(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .fields
            .iter()
            .filter(|(_, rule)| **rule == MergeRule::Append)
            .map(|(name, _)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    /// Check a JSON-shaped partial update against the declared fields
    pub fn check_update(&self, update: &Value) -> Result<(), FlowError> {
        let obj = update.as_object().ok_or_else(|| {
            FlowError::schema_mismatch(format!("partial update must be an object, got {}", update))
        })?;

        for (key, value) in obj {
            match self.rule(key) {
                None => {
                    return Err(FlowError::schema_mismatch(format!(
                        "undeclared field '{}'",
                        key
                    )))
                }
                Some(MergeRule::Append) if !value.is_array() && !value.is_null() => {
                    return Err(FlowError::schema_mismatch(format!(
                        "append field '{}' requires a list",
                        key
                    )))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}
