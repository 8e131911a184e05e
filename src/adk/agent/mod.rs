// SPDX-License-Identifier: MIT

//! Agent module - the graph's node payload
//!
//! An `Agent` wraps a [`FunctionRegistry`] built from its definition and
//! exposes a single entry point, [`Agent::run`], which the executor calls
//! with the graph state.

use crate::adk::context::ExecutionContext;
use crate::adk::error::{ConfigurationError, ExecutionError};
use crate::adk::function::builtin::behavior_for;
use crate::adk::function::{Behavior, CallContext, FunctionRegistry};
use crate::agentflow::workflow::config::DEFAULT_MODEL;
use crate::agentflow::workflow::state::GraphState;
use crate::agentflow::workflow::types::{AgentDefinition, BehaviorSpec};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug)]
pub struct Agent {
    definition: AgentDefinition,
    model: String,
    registry: FunctionRegistry,
    /// Serializes runs so a sync-in, call, sync-out pass is never interleaved
    run_lock: Mutex<()>,
}

impl Agent {
    /// Name of the function the executor invokes
    pub const RUN: &'static str = "run";

    /// Build an agent whose extension functions are bound later
    pub fn new(definition: AgentDefinition) -> Result<Self, ConfigurationError> {
        Self::with_extensions(definition, HashMap::new())
    }

    /// Build an agent, binding declared extension functions from `extensions`.
    ///
    /// Fails when no `run` function is declared or when a reference or
    /// sequence step names a function that does not resolve.
    pub fn with_extensions(
        definition: AgentDefinition,
        extensions: HashMap<String, Arc<dyn Behavior>>,
    ) -> Result<Self, ConfigurationError> {
        Self::with_bindings(definition, extensions, HashMap::new())
    }

    /// Like [`Agent::with_extensions`], also replacing non-extension
    /// functions from `overrides`.
    ///
    /// Overrides are bound before references resolve, so a reference to an
    /// overridden function reaches the override.
    pub fn with_bindings(
        definition: AgentDefinition,
        extensions: HashMap<String, Arc<dyn Behavior>>,
        overrides: HashMap<String, Arc<dyn Behavior>>,
    ) -> Result<Self, ConfigurationError> {
        if definition.function(Self::RUN).is_none() {
            return Err(ConfigurationError::MissingRunFunction {
                agent: definition.name.clone(),
            });
        }

        let mut registry = FunctionRegistry::with_builtins();
        let mut references = Vec::new();

        for function in &definition.functions {
            match &function.behavior {
                BehaviorSpec::Reference { target } => {
                    references.push((function.name.as_str(), target.as_str()));
                }
                BehaviorSpec::Extension => match extensions.get(&function.name) {
                    Some(behavior) => {
                        registry.register(function.name.clone(), behavior.clone());
                    }
                    None => log::debug!(
                        "Agent '{}': extension '{}' left unbound",
                        definition.name,
                        function.name
                    ),
                },
                spec => {
                    if let Some(behavior) = behavior_for(spec) {
                        registry.register(function.name.clone(), behavior);
                    }
                }
            }
        }

        for (name, behavior) in overrides {
            log::debug!("Agent '{}': overriding function '{}'", definition.name, name);
            references.retain(|(function, _)| *function != name);
            registry.register(name, behavior);
        }

        // References may point at other references; resolve until stable
        while !references.is_empty() {
            let before = references.len();
            let mut pending = Vec::new();
            for (name, target) in references {
                match registry.get(target) {
                    Ok(behavior) => {
                        registry.register(name, behavior);
                    }
                    Err(_) => pending.push((name, target)),
                }
            }

            if pending.len() == before {
                if let Some(&(function, target)) = pending.first() {
                    return Err(ConfigurationError::UnresolvedReference {
                        agent: definition.name.clone(),
                        function: function.to_string(),
                        target: target.to_string(),
                    });
                }
            }
            references = pending;
        }

        Self::check_sequences(&definition, &registry)?;

        let model = definition
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        Ok(Self {
            definition,
            model,
            registry,
            run_lock: Mutex::new(()),
        })
    }

    /// Sequence steps must name registered functions or declared extensions
    fn check_sequences(
        definition: &AgentDefinition,
        registry: &FunctionRegistry,
    ) -> Result<(), ConfigurationError> {
        for function in &definition.functions {
            let BehaviorSpec::Sequence { steps } = &function.behavior else {
                continue;
            };
            for step in steps {
                let declared_extension = definition
                    .function(&step.call)
                    .map(|f| f.behavior == BehaviorSpec::Extension)
                    .unwrap_or(false);
                if !registry.contains(&step.call) && !declared_extension {
                    return Err(ConfigurationError::UnresolvedReference {
                        agent: definition.name.clone(),
                        function: function.name.clone(),
                        target: step.call.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn description(&self) -> &str {
        &self.definition.description
    }

    pub fn definition(&self) -> &AgentDefinition {
        &self.definition
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Bind or replace a function; last write wins.
    ///
    /// References were resolved at construction and keep their earlier
    /// binding; use [`Agent::with_bindings`] to override a reference target.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        behavior: Arc<dyn Behavior>,
    ) -> Option<Arc<dyn Behavior>> {
        self.registry.register(name, behavior)
    }

    /// Whether `run` is bound to behavior
    pub fn is_runnable(&self) -> bool {
        self.registry.contains(Self::RUN)
    }

    /// Run the agent against `state` and hand the updated state back.
    ///
    /// Pulls the agent's state keys into its registry, calls `run`, stores the
    /// result under `output_key` when one is declared and pushes changed keys
    /// back into the state.
    pub async fn run(
        &self,
        mut state: GraphState,
        ctx: &ExecutionContext,
    ) -> Result<GraphState, ExecutionError> {
        let _guard = self.run_lock.lock().await;

        self.registry
            .sync_from(&state, &self.definition.state_keys, ctx.run_id())
            .await;

        let cx = CallContext::new(
            &self.definition.name,
            &self.model,
            &self.definition.memory,
            &self.registry,
            ctx,
        );
        let value = self.registry.call(Self::RUN, &Value::Null, &cx).await?;

        if let Some(key) = &self.definition.output_key {
            self.registry.update(key.clone(), value).await;
        }

        self.registry.sync_to(&mut state).await;
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::function::builtin::{AUGMENT_QUERY, PARSE_QUERY};
    use crate::adk::function::{behavior_fn, BehaviorOutput};
    use crate::agentflow::workflow::types::{FunctionDefinition, StepDefinition};
    use serde_json::json;

    fn reference(name: &str, target: &str) -> FunctionDefinition {
        FunctionDefinition::new(
            name,
            BehaviorSpec::Reference {
                target: target.to_string(),
            },
        )
    }

    fn state(pairs: Value) -> GraphState {
        GraphState::from_json(pairs).unwrap()
    }

    #[test]
    fn test_missing_run_fails_at_construction() {
        let def = AgentDefinition::new("lonely").with_function(reference("helper", PARSE_QUERY));

        let err = Agent::new(def).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::MissingRunFunction {
                agent: "lonely".to_string()
            }
        );
    }

    #[test]
    fn test_references_resolve_through_chains() {
        let def = AgentDefinition::new("chain")
            .with_function(reference("run", "middle"))
            .with_function(reference("middle", AUGMENT_QUERY));

        let agent = Agent::new(def).unwrap();
        assert!(agent.is_runnable());
        assert!(agent.registry().contains("middle"));
    }

    #[test]
    fn test_unresolved_reference_is_error() {
        let def = AgentDefinition::new("broken").with_function(reference("run", "nowhere"));

        assert_eq!(
            Agent::new(def).unwrap_err(),
            ConfigurationError::UnresolvedReference {
                agent: "broken".to_string(),
                function: "run".to_string(),
                target: "nowhere".to_string(),
            }
        );
    }

    #[test]
    fn test_reference_cycle_is_error() {
        let def = AgentDefinition::new("cycle")
            .with_function(reference("run", "other"))
            .with_function(reference("other", "run"));

        assert!(matches!(
            Agent::new(def),
            Err(ConfigurationError::UnresolvedReference { .. })
        ));
    }

    #[test]
    fn test_sequence_step_must_resolve() {
        let def = AgentDefinition::new("pipeline").with_function(FunctionDefinition::new(
            "run",
            BehaviorSpec::Sequence {
                steps: vec![StepDefinition {
                    call: "undeclared".to_string(),
                    params: Value::Null,
                    output: None,
                }],
            },
        ));

        assert!(matches!(
            Agent::new(def),
            Err(ConfigurationError::UnresolvedReference { ref target, .. }) if target == "undeclared"
        ));
    }

    #[test]
    fn test_unbound_extension_run_is_not_runnable() {
        let def = AgentDefinition::new("greeter").with_function(FunctionDefinition::extension("run"));

        let mut agent = Agent::new(def).unwrap();
        assert!(!agent.is_runnable());
        assert_eq!(agent.model(), DEFAULT_MODEL);

        agent.register(
            Agent::RUN,
            behavior_fn(|_, _| Ok(BehaviorOutput::value("hello"))),
        );
        assert!(agent.is_runnable());
    }

    #[tokio::test]
    async fn test_run_stores_output_key() {
        let def = AgentDefinition::new("greeter")
            .with_function(FunctionDefinition::extension("run"))
            .with_output_key("final_output");
        let mut extensions: HashMap<String, Arc<dyn Behavior>> = HashMap::new();
        extensions.insert(
            "run".to_string(),
            behavior_fn(|slice, _| {
                let name = slice["name"].as_str().unwrap_or("world");
                Ok(BehaviorOutput::value(format!("hello {}", name)))
            }),
        );
        let agent = Agent::with_extensions(def, extensions).unwrap();

        let result = agent
            .run(
                state(json!({"final_output": "", "name": "ada"})),
                &ExecutionContext::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.final_output().unwrap(), &json!("hello ada"));
        assert_eq!(result.get("name").unwrap(), &json!("ada"));
    }

    #[tokio::test]
    async fn test_run_builtin_with_state_keys() {
        let def = AgentDefinition::new("augmenter")
            .with_function(reference("run", AUGMENT_QUERY))
            .with_state_keys(["query", "documents"])
            .with_output_key("augmented_query");
        let agent = Agent::new(def).unwrap();

        let result = agent
            .run(
                state(json!({
                    "final_output": "",
                    "query": "q",
                    "documents": ["a", "b"],
                    "untouched": 1
                })),
                &ExecutionContext::new(),
            )
            .await
            .unwrap();

        assert_eq!(
            result.get("augmented_query").unwrap(),
            &json!("Query: q\nContext:\na\nb\nAnswer:")
        );
        assert_eq!(result.get("untouched").unwrap(), &json!(1));
    }

    #[tokio::test]
    async fn test_run_failure_propagates() {
        let def = AgentDefinition::new("augmenter").with_function(reference("run", AUGMENT_QUERY));
        let agent = Agent::new(def).unwrap();

        let err = agent
            .run(state(json!({"final_output": ""})), &ExecutionContext::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::Behavior { .. }));
    }
}
