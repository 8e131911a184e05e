// SPDX-License-Identifier: MIT

use super::builtin;
use super::{Behavior, CallContext};
use crate::adk::error::ExecutionError;
use crate::agentflow::workflow::state::GraphState;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// An agent's private copy of the graph state keys it works on.
///
/// Only keys written since the last `pull` are pushed back. Local values
/// live for one run: the first `pull` of a new run starts from an empty
/// slice.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateSlice {
    values: Map<String, Value>,
    dirty: BTreeSet<String>,
    run: Option<Uuid>,
}

impl StateSlice {
    /// Copy `keys` (every key when empty) from `state` for `run`.
    ///
    /// Within a run, keys absent from the state keep their local values.
    pub fn pull(&mut self, state: &GraphState, keys: &[String], run: Uuid) -> usize {
        self.dirty.clear();
        if self.run != Some(run) {
            self.values.clear();
            self.run = Some(run);
        }

        let mut pulled = 0;
        if keys.is_empty() {
            for (key, value) in state.iter() {
                self.values.insert(key.clone(), value.clone());
                pulled += 1;
            }
        } else {
            for key in keys {
                if let Ok(value) = state.get(key) {
                    self.values.insert(key.clone(), value.clone());
                    pulled += 1;
                }
            }
        }
        pulled
    }

    pub fn apply(&mut self, updates: Map<String, Value>) {
        for (key, value) in updates {
            self.dirty.insert(key.clone());
            self.values.insert(key, value);
        }
    }

    /// Write dirty keys into `state`, returning how many were written
    pub fn push(&mut self, state: &mut GraphState) -> usize {
        let dirty = std::mem::take(&mut self.dirty);
        let mut written = 0;
        for key in dirty {
            if let Some(value) = self.values.get(&key) {
                state.set(key, value.clone());
                written += 1;
            }
        }
        written
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn is_dirty(&self, key: &str) -> bool {
        self.dirty.contains(key)
    }

    /// Run that last filled the slice
    pub fn run(&self) -> Option<Uuid> {
        self.run
    }
}

/// Per-agent binding of function names to behavior
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<dyn Behavior>>,
    state_variables: Mutex<StateSlice>,
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.names())
            .finish_non_exhaustive()
    }
}

impl FunctionRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self {
            functions: HashMap::new(),
            state_variables: Mutex::new(StateSlice::default()),
        }
    }

    /// A registry with the built-in query behaviors registered
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for (name, behavior) in builtin::builtins() {
            registry.register(name, behavior);
        }
        registry
    }

    /// Bind `behavior` to `name`, replacing and returning any previous binding
    pub fn register(
        &mut self,
        name: impl Into<String>,
        behavior: Arc<dyn Behavior>,
    ) -> Option<Arc<dyn Behavior>> {
        let name = name.into();
        let previous = self.functions.insert(name.clone(), behavior);
        if previous.is_some() {
            log::debug!("Function '{}' re-registered", name);
        }
        previous
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Behavior>, ExecutionError> {
        self.functions
            .get(name)
            .cloned()
            .ok_or_else(|| ExecutionError::UnknownFunction(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.keys().cloned().collect();
        names.sort();
        names
    }

    /// Pull `keys` (all when empty) from graph state into the private slice
    pub async fn sync_from(&self, state: &GraphState, keys: &[String], run: Uuid) {
        let mut slice = self.state_variables.lock().await;
        let pulled = slice.pull(state, keys, run);
        log::debug!("Pulled {} state keys into registry", pulled);
    }

    /// Push keys changed since the last `sync_from` back into graph state
    pub async fn sync_to(&self, state: &mut GraphState) {
        let mut slice = self.state_variables.lock().await;
        let written = slice.push(state);
        log::debug!("Pushed {} state keys from registry", written);
    }

    /// Copy of the private slice
    pub async fn state_variables(&self) -> StateSlice {
        self.state_variables.lock().await.clone()
    }

    /// Write one slice key; it reaches graph state on the next `sync_to`
    pub async fn update(&self, key: impl Into<String>, value: Value) {
        let mut updates = Map::new();
        updates.insert(key.into(), value);
        self.state_variables.lock().await.apply(updates);
    }

    /// Call a registered function against the private slice and apply its updates.
    ///
    /// The behavior sees a copy of the slice; the lock is not held while it
    /// runs, so it may use the registry itself.
    pub async fn call(
        &self,
        name: &str,
        params: &Value,
        cx: &CallContext<'_>,
    ) -> Result<Value, ExecutionError> {
        let behavior = self.get(name)?;
        let values = self.state_variables.lock().await.values().clone();

        let output = behavior
            .call(&values, params, &cx.for_function(name))
            .await?;
        self.state_variables.lock().await.apply(output.updates);
        Ok(output.value)
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
