//! Agent factory - constructs agents from definitions
//!
//! This module binds caller-supplied extension behavior to the functions an
//! agent declares and applies engine defaults such as the model name.

use crate::adk::agent::Agent;
use crate::adk::error::ConfigurationError;
use crate::adk::function::Behavior;
use crate::agentflow::workflow::config::EngineConfig;
use crate::agentflow::workflow::types::{AgentDefinition, BehaviorSpec};

use std::collections::HashMap;
use std::sync::Arc;

/// Caller-supplied behaviors for extension functions
#[derive(Clone, Default)]
pub struct Extensions {
    shared: HashMap<String, Arc<dyn Behavior>>,
    per_agent: HashMap<String, HashMap<String, Arc<dyn Behavior>>>,
}

impl std::fmt::Debug for Extensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut shared: Vec<&String> = self.shared.keys().collect();
        shared.sort();
        f.debug_struct("Extensions")
            .field("shared", &shared)
            .field("agents", &self.per_agent.len())
            .finish()
    }
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `function` in every agent that declares it as an extension
    pub fn register(
        &mut self,
        function: impl Into<String>,
        behavior: Arc<dyn Behavior>,
    ) -> &mut Self {
        self.shared.insert(function.into(), behavior);
        self
    }

    /// Bind `function` in one agent, replacing whatever it was bound to.
    ///
    /// Functions that reference `function` resolve to the replacement.
    pub fn register_for(
        &mut self,
        agent: impl Into<String>,
        function: impl Into<String>,
        behavior: Arc<dyn Behavior>,
    ) -> &mut Self {
        self.per_agent
            .entry(agent.into())
            .or_default()
            .insert(function.into(), behavior);
        self
    }

    /// Per-agent replacements for functions that are not extensions
    fn overrides_for(&self, def: &AgentDefinition) -> HashMap<String, Arc<dyn Behavior>> {
        let Some(own) = self.per_agent.get(&def.name) else {
            return HashMap::new();
        };
        own.iter()
            .filter(|(name, _)| {
                def.function(name)
                    .map(|f| f.behavior != BehaviorSpec::Extension)
                    .unwrap_or(true)
            })
            .map(|(name, behavior)| (name.clone(), behavior.clone()))
            .collect()
    }

    /// Bindings for the extension functions `def` declares
    fn bindings_for(&self, def: &AgentDefinition) -> HashMap<String, Arc<dyn Behavior>> {
        let own = self.per_agent.get(&def.name);
        def.functions
            .iter()
            .filter(|f| f.behavior == BehaviorSpec::Extension)
            .filter_map(|f| {
                own.and_then(|m| m.get(&f.name))
                    .or_else(|| self.shared.get(&f.name))
                    .map(|b| (f.name.clone(), b.clone()))
            })
            .collect()
    }
}

/// Factory for creating Agent instances from definitions
pub struct AgentFactory<'a> {
    extensions: &'a Extensions,
    config: &'a EngineConfig,
}

impl<'a> AgentFactory<'a> {
    pub fn new(extensions: &'a Extensions, config: &'a EngineConfig) -> Self {
        Self { extensions, config }
    }

    /// Build an agent from an AgentDefinition
    pub fn build(&self, def: &AgentDefinition) -> Result<Agent, ConfigurationError> {
        let mut agent = Agent::with_bindings(
            def.clone(),
            self.extensions.bindings_for(def),
            self.extensions.overrides_for(def),
        )?;

        if def.model.is_none() {
            agent = agent.with_model(self.config.default_model.clone());
        }

        log::info!(
            "Built agent '{}' with model '{}' and {} functions",
            agent.name(),
            agent.model(),
            def.functions.len()
        );
        Ok(agent)
    }
}
