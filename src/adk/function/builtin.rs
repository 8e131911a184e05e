// SPDX-License-Identifier: MIT

//! Built-in behaviors
//!
//! Every registry starts with the query helpers registered under their
//! well-known names:
//! - `_parse_query` - render a template against the slice and ask the model
//! - `_summarize_query` - the same with a summarization template
//! - `_augment_query` - combine a query with retrieved documents
//! - `_generate_final_query` - join the original and augmented queries
//!
//! Declared functions can also be bound to `state_value` and `sequence`
//! behaviors, which are defined here as well.

use super::{Behavior, BehaviorOutput, CallContext};
use crate::adk::error::{ExecutionError, StateError};
use crate::agentflow::workflow::types::{BehaviorSpec, MemoryDefinition, StepDefinition};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

pub const PARSE_QUERY: &str = "_parse_query";
pub const SUMMARIZE_QUERY: &str = "_summarize_query";
pub const AUGMENT_QUERY: &str = "_augment_query";
pub const COMPOSE_FINAL_QUERY: &str = "_generate_final_query";

pub const DEFAULT_SUMMARY_TEMPLATE: &str =
    "Summarize the following query in one or two sentences:\n{query}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinKind {
    ParseQuery,
    SummarizeQuery,
    AugmentQuery,
    ComposeFinalQuery,
}

impl BuiltinKind {
    pub const ALL: [BuiltinKind; 4] = [
        BuiltinKind::ParseQuery,
        BuiltinKind::SummarizeQuery,
        BuiltinKind::AugmentQuery,
        BuiltinKind::ComposeFinalQuery,
    ];

    /// Name the kind is registered under
    pub fn function_name(&self) -> &'static str {
        match self {
            BuiltinKind::ParseQuery => PARSE_QUERY,
            BuiltinKind::SummarizeQuery => SUMMARIZE_QUERY,
            BuiltinKind::AugmentQuery => AUGMENT_QUERY,
            BuiltinKind::ComposeFinalQuery => COMPOSE_FINAL_QUERY,
        }
    }
}

/// Built-in behaviors keyed by their registered names
pub fn builtins() -> Vec<(&'static str, Arc<dyn Behavior>)> {
    BuiltinKind::ALL
        .iter()
        .map(|kind| {
            let behavior: Arc<dyn Behavior> = Arc::new(BuiltinBehavior::new(*kind));
            (kind.function_name(), behavior)
        })
        .collect()
}

/// Concrete behavior for a declared `BehaviorSpec`.
///
/// Returns `None` for `reference` and `extension`, which bind to behavior
/// registered elsewhere.
pub fn behavior_for(spec: &BehaviorSpec) -> Option<Arc<dyn Behavior>> {
    let behavior: Arc<dyn Behavior> = match spec {
        BehaviorSpec::ParseQuery { template } => {
            Arc::new(BuiltinBehavior::new(BuiltinKind::ParseQuery).with_template(template.as_deref()))
        }
        BehaviorSpec::SummarizeQuery { template } => Arc::new(
            BuiltinBehavior::new(BuiltinKind::SummarizeQuery).with_template(template.as_deref()),
        ),
        BehaviorSpec::AugmentQuery => Arc::new(BuiltinBehavior::new(BuiltinKind::AugmentQuery)),
        BehaviorSpec::ComposeFinalQuery => {
            Arc::new(BuiltinBehavior::new(BuiltinKind::ComposeFinalQuery))
        }
        BehaviorSpec::StateValue { key } => Arc::new(StateValue { key: key.clone() }),
        BehaviorSpec::Sequence { steps } => Arc::new(Sequence {
            steps: steps.clone(),
        }),
        BehaviorSpec::Reference { .. } | BehaviorSpec::Extension => return None,
    };
    Some(behavior)
}

/// A built-in kind with optional parameters fixed when it was bound.
///
/// Call parameters override bound ones.
#[derive(Debug, Clone)]
pub struct BuiltinBehavior {
    kind: BuiltinKind,
    bound: Map<String, Value>,
}

impl BuiltinBehavior {
    pub fn new(kind: BuiltinKind) -> Self {
        Self {
            kind,
            bound: Map::new(),
        }
    }

    pub fn with_template(mut self, template: Option<&str>) -> Self {
        if let Some(template) = template {
            self.bound
                .insert("template".to_string(), Value::String(template.to_string()));
        }
        self
    }

    pub fn kind(&self) -> BuiltinKind {
        self.kind
    }

    /// Argument from call params, then bound params
    fn arg<'v>(&'v self, params: &'v Value, key: &str) -> Option<&'v Value> {
        params.get(key).or_else(|| self.bound.get(key))
    }

    /// Argument from call params, bound params, then the slice
    fn input<'v>(
        &'v self,
        params: &'v Value,
        slice: &'v Map<String, Value>,
        key: &str,
    ) -> Option<&'v Value> {
        self.arg(params, key).or_else(|| slice.get(key))
    }

    async fn prompt_model(
        &self,
        template: &str,
        slice: &Map<String, Value>,
        params: &Value,
        cx: &CallContext<'_>,
    ) -> Result<BehaviorOutput, ExecutionError> {
        let mut values = slice.clone();
        if let Value::Object(overrides) = params {
            for (key, value) in overrides {
                if key != "template" {
                    values.insert(key.clone(), value.clone());
                }
            }
        }

        let prompt = render_template(template, &values, cx.memory)?;
        let response = cx.complete(&prompt).await?;
        Ok(BehaviorOutput::value(response))
    }
}

#[async_trait]
impl Behavior for BuiltinBehavior {
    async fn call(
        &self,
        slice: &Map<String, Value>,
        params: &Value,
        cx: &CallContext<'_>,
    ) -> Result<BehaviorOutput, ExecutionError> {
        let function = self.kind.function_name();

        match self.kind {
            BuiltinKind::ParseQuery => {
                let template = match self.arg(params, "template") {
                    Some(value) => expect_str(function, "template", value)?,
                    None => {
                        let query = slice
                            .get("query")
                            .ok_or_else(|| missing_input(function, "template' or 'query"))?;
                        expect_str(function, "query", query)?
                    }
                };
                self.prompt_model(template, slice, params, cx).await
            }
            BuiltinKind::SummarizeQuery => {
                let template = match self.arg(params, "template") {
                    Some(value) => expect_str(function, "template", value)?,
                    None => DEFAULT_SUMMARY_TEMPLATE,
                };
                self.prompt_model(template, slice, params, cx).await
            }
            BuiltinKind::AugmentQuery => {
                let query = self
                    .input(params, slice, "query")
                    .ok_or_else(|| missing_input(function, "query"))?;
                let query = expect_str(function, "query", query)?;

                let documents = self
                    .input(params, slice, "documents")
                    .ok_or_else(|| missing_input(function, "documents"))?;
                let documents = expect_str_array(function, "documents", documents)?;

                Ok(BehaviorOutput::value(format!(
                    "Query: {}\nContext:\n{}\nAnswer:",
                    query,
                    documents.join("\n")
                )))
            }
            BuiltinKind::ComposeFinalQuery => {
                let original = self
                    .input(params, slice, "original_query")
                    .or_else(|| slice.get("query"))
                    .ok_or_else(|| missing_input(function, "original_query"))?;
                let original = expect_str(function, "original_query", original)?;

                let augmented = self
                    .input(params, slice, "augmented_query")
                    .ok_or_else(|| missing_input(function, "augmented_query"))?;
                let augmented = expect_str(function, "augmented_query", augmented)?;

                Ok(BehaviorOutput::value(format!("{}\n{}", original, augmented)))
            }
        }
    }
}

/// Returns a value from the agent's slice
#[derive(Debug, Clone)]
pub struct StateValue {
    key: String,
}

impl StateValue {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

#[async_trait]
impl Behavior for StateValue {
    async fn call(
        &self,
        slice: &Map<String, Value>,
        _params: &Value,
        _cx: &CallContext<'_>,
    ) -> Result<BehaviorOutput, ExecutionError> {
        slice
            .get(&self.key)
            .cloned()
            .map(BehaviorOutput::value)
            .ok_or_else(|| StateError::MissingKey(self.key.clone()).into())
    }
}

/// Calls registered functions in order.
///
/// Each step sees the updates and outputs of the steps before it. The
/// result is the last step's value.
#[derive(Debug, Clone)]
pub struct Sequence {
    steps: Vec<StepDefinition>,
}

impl Sequence {
    pub fn new(steps: Vec<StepDefinition>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }
}

#[async_trait]
impl Behavior for Sequence {
    async fn call(
        &self,
        slice: &Map<String, Value>,
        _params: &Value,
        cx: &CallContext<'_>,
    ) -> Result<BehaviorOutput, ExecutionError> {
        let mut working = slice.clone();
        let mut updates = Map::new();
        let mut last = Value::Null;

        for step in &self.steps {
            let output = cx.invoke(&step.call, &working, &step.params).await?;

            for (key, value) in output.updates {
                working.insert(key.clone(), value.clone());
                updates.insert(key, value);
            }
            if let Some(key) = &step.output {
                working.insert(key.clone(), output.value.clone());
                updates.insert(key.clone(), output.value.clone());
            }
            last = output.value;
        }

        Ok(BehaviorOutput {
            value: last,
            updates,
        })
    }
}

/// Render `{key}` placeholders from `values`.
///
/// `{{` and `}}` produce literal braces. `{memory}` renders the agent's
/// memory notes unless the values carry their own `memory` key. Strings are
/// inserted as-is, other values as JSON.
pub fn render_template(
    template: &str,
    values: &Map<String, Value>,
    memory: &[MemoryDefinition],
) -> Result<String, ExecutionError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => name.push(ch),
                        None => {
                            return Err(ExecutionError::Template(format!(
                                "unclosed placeholder '{{{}'",
                                name
                            )))
                        }
                    }
                }

                let name = name.trim();
                if name.is_empty() {
                    return Err(ExecutionError::Template("empty placeholder".to_string()));
                }
                match values.get(name) {
                    Some(Value::String(s)) => out.push_str(s),
                    Some(other) => out.push_str(&other.to_string()),
                    None if name == "memory" => out.push_str(&render_memory(memory)),
                    None => {
                        return Err(ExecutionError::Template(format!(
                            "no value for placeholder '{}'",
                            name
                        )))
                    }
                }
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => return Err(ExecutionError::Template("unmatched '}'".to_string())),
            other => out.push(other),
        }
    }

    Ok(out)
}

fn render_memory(memory: &[MemoryDefinition]) -> String {
    memory
        .iter()
        .map(|note| format!("- {}: {}", note.memory_type, note.content))
        .collect::<Vec<_>>()
        .join("\n")
}

fn missing_input(function: &str, key: &str) -> ExecutionError {
    ExecutionError::behavior(function, format!("missing input '{}'", key))
}

fn expect_str<'v>(function: &str, key: &str, value: &'v Value) -> Result<&'v str, ExecutionError> {
    value.as_str().ok_or_else(|| {
        ExecutionError::behavior(function, format!("'{}' must be a string, got {}", key, value))
    })
}

fn expect_str_array<'v>(
    function: &str,
    key: &str,
    value: &'v Value,
) -> Result<Vec<&'v str>, ExecutionError> {
    let items = value.as_array().ok_or_else(|| {
        ExecutionError::behavior(
            function,
            format!("'{}' must be an array of strings, got {}", key, value),
        )
    })?;

    items
        .iter()
        .map(|item| expect_str(function, key, item))
        .collect()
}
