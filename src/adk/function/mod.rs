// SPDX-License-Identifier: MIT

//! Function module - executable behavior bound to an agent's declared functions
//!
//! A [`Behavior`] accepts the agent's current state slice plus call-specific
//! parameters and returns a value with optional slice updates. Behaviors are
//! values resolved when the agent is built; nothing is evaluated from
//! definition text at call time.

pub mod builtin;
pub mod registry;

pub use registry::{FunctionRegistry, StateSlice};

use crate::adk::context::ExecutionContext;
use crate::adk::error::ExecutionError;
use crate::agentflow::workflow::types::MemoryDefinition;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Maximum nesting of behaviors calling other behaviors
pub const MAX_CALL_DEPTH: usize = 16;

/// Result of a behavior call
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BehaviorOutput {
    pub value: Value,
    /// Slice keys to write back; they reach graph state on `sync_to`
    pub updates: Map<String, Value>,
}

impl BehaviorOutput {
    pub fn value(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            updates: Map::new(),
        }
    }

    pub fn with_update(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.updates.insert(key.into(), value.into());
        self
    }
}

/// Everything a behavior may use besides its slice and parameters
#[derive(Clone, Copy)]
pub struct CallContext<'a> {
    pub agent: &'a str,
    pub function: &'a str,
    pub model: &'a str,
    pub memory: &'a [MemoryDefinition],
    pub registry: &'a FunctionRegistry,
    pub execution: &'a ExecutionContext,
    depth: usize,
}

impl<'a> CallContext<'a> {
    pub fn new(
        agent: &'a str,
        model: &'a str,
        memory: &'a [MemoryDefinition],
        registry: &'a FunctionRegistry,
        execution: &'a ExecutionContext,
    ) -> Self {
        Self {
            agent,
            function: "",
            model,
            memory,
            registry,
            execution,
            depth: 0,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) fn for_function(&self, function: &'a str) -> Self {
        Self { function, ..*self }
    }

    /// Context for a call made from inside another behavior
    pub fn nested(&self, function: &'a str) -> Result<Self, ExecutionError> {
        let depth = self.depth + 1;
        if depth > MAX_CALL_DEPTH {
            return Err(ExecutionError::CallDepthExceeded(MAX_CALL_DEPTH));
        }
        Ok(Self {
            function,
            depth,
            ..*self
        })
    }

    /// Call another registered function against an explicit slice.
    ///
    /// The registry's own slice is locked for the outer call, so nested calls
    /// pass the caller's working copy instead.
    pub async fn invoke(
        &self,
        function: &'a str,
        slice: &Map<String, Value>,
        params: &Value,
    ) -> Result<BehaviorOutput, ExecutionError> {
        let cx = self.nested(function)?;
        let behavior = self.registry.get(function)?;
        behavior.call(slice, params, &cx).await
    }

    /// Complete a prompt with this agent's model
    pub async fn complete(&self, prompt: &str) -> Result<String, ExecutionError> {
        self.execution.complete(prompt, self.model).await
    }
}

/// Executable behavior bound to a function name
#[async_trait]
pub trait Behavior: Send + Sync {
    async fn call(
        &self,
        slice: &Map<String, Value>,
        params: &Value,
        cx: &CallContext<'_>,
    ) -> Result<BehaviorOutput, ExecutionError>;
}

/// Adapter for synchronous closures
pub struct FnBehavior<F>(F);

#[async_trait]
impl<F> Behavior for FnBehavior<F>
where
    F: Fn(&Map<String, Value>, &Value) -> Result<BehaviorOutput, ExecutionError> + Send + Sync,
{
    async fn call(
        &self,
        slice: &Map<String, Value>,
        params: &Value,
        _cx: &CallContext<'_>,
    ) -> Result<BehaviorOutput, ExecutionError> {
        (self.0)(slice, params)
    }
}

/// Wrap a closure as a shareable behavior
pub fn behavior_fn<F>(f: F) -> Arc<dyn Behavior>
where
    F: Fn(&Map<String, Value>, &Value) -> Result<BehaviorOutput, ExecutionError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(FnBehavior(f))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_fn_behavior_sees_slice_and_params() {
        let registry = FunctionRegistry::new();
        let ctx = ExecutionContext::new();
        let cx = CallContext::new("agent", "model", &[], &registry, &ctx);

        let behavior = behavior_fn(|slice, params| {
            let name = slice["name"].as_str().unwrap_or_default();
            let greeting = params["greeting"].as_str().unwrap_or("hello");
            Ok(BehaviorOutput::value(format!("{} {}", greeting, name)).with_update("greeted", true))
        });

        let mut slice = Map::new();
        slice.insert("name".to_string(), json!("ada"));

        let output = behavior
            .call(&slice, &json!({"greeting": "hi"}), &cx)
            .await
            .unwrap();
        assert_eq!(output.value, json!("hi ada"));
        assert_eq!(output.updates["greeted"], json!(true));
    }

    #[test]
    fn test_nested_depth_is_bounded() {
        let registry = FunctionRegistry::new();
        let ctx = ExecutionContext::new();
        let mut cx = CallContext::new("agent", "model", &[], &registry, &ctx);

        for _ in 0..MAX_CALL_DEPTH {
            cx = cx.nested("inner").unwrap();
        }
        assert_eq!(cx.depth(), MAX_CALL_DEPTH);
        assert!(matches!(
            cx.nested("inner"),
            Err(ExecutionError::CallDepthExceeded(MAX_CALL_DEPTH))
        ));
    }
}
