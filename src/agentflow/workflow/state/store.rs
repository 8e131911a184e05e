// SPDX-License-Identifier: MIT

//! Runtime state storage for workflow execution

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::adk::error::StateError;

/// Key every graph state must carry at construction and on completion
pub const FINAL_OUTPUT: &str = "final_output";

/// Shared state record for a single workflow run.
///
/// Values are dynamically typed JSON; nothing is coerced on read or write.
/// Keys that no node touches are carried through unchanged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphState {
    data: HashMap<String, Value>,
}

impl GraphState {
    /// Create a state from initial values, failing if `final_output` is absent
    pub fn new<I, K>(initial: I) -> Result<Self, StateError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let state = Self {
            data: initial.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        };
        state.validate()?;
        Ok(state)
    }

    /// Create a state from a JSON object
    pub fn from_json(value: Value) -> Result<Self, StateError> {
        match value {
            Value::Object(map) => Self::new(map),
            other => Err(StateError::InvalidShape(format!(
                "expected a JSON object, got {}",
                json_type(&other)
            ))),
        }
    }

    /// Get a field value
    pub fn get(&self, key: &str) -> Result<&Value, StateError> {
        self.data
            .get(key)
            .ok_or_else(|| StateError::MissingKey(key.to_string()))
    }

    /// Get a nested field value using dot notation (e.g., "result.intent")
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.data.get(parts.next()?)?;
        for part in parts {
            current = match current {
                Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                other => other.get(part)?,
            };
        }
        Some(current)
    }

    /// Replace or create a binding, returning the previous value
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.data.insert(key.into(), value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// The required output field
    pub fn final_output(&self) -> Result<&Value, StateError> {
        self.data
            .get(FINAL_OUTPUT)
            .ok_or_else(|| StateError::MissingRequiredKey(FINAL_OUTPUT.to_string()))
    }

    /// Check the invariants a state must satisfy before and after a run
    pub fn validate(&self) -> Result<(), StateError> {
        self.final_output().map(|_| ())
    }

    /// Immutable copy of the current values
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            data: self.data.clone(),
        }
    }

    /// Get all field names
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.data.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.data.iter()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Convert state to JSON object
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.data
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<Map<String, Value>>(),
        )
    }
}

/// Read-only copy of a `GraphState` taken at a point in time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSnapshot {
    data: HashMap<String, Value>,
}

impl StateSnapshot {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.data
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<Map<String, Value>>(),
        )
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
