// SPDX-License-Identifier: MIT

//! Workflow compiler - definition records to a runnable graph
//!
//! `graph_logic` keys are source nodes, except the reserved `ENTRY_POINT`
//! (its value is the first node) and `END_POINT` (its value finishes the
//! run). Conditional edge groups are added in ascending index order, which
//! is also the order they are evaluated in.

use super::agent_factory::{AgentFactory, Extensions};
use super::config::EngineConfig;
use super::graph::{execute_with, Predicate, WorkflowBuilder, WorkflowGraph, END_POINT, ENTRY_POINT};
use super::state::GraphState;
use super::types::{ConditionalEdgeDefinition, WorkflowDefinition};
use crate::adk::context::ExecutionContext;
use crate::adk::error::{AgentFlowError, ConfigurationError, ExecutionError};

/// A built graph with the initial state its definition declares
#[derive(Debug)]
pub struct CompiledWorkflow {
    pub graph: WorkflowGraph,
    pub initial_state: GraphState,
    pub step_limit: usize,
}

impl CompiledWorkflow {
    /// Run the graph from its declared initial state
    pub async fn run(&self, ctx: &ExecutionContext) -> Result<GraphState, ExecutionError> {
        execute_with(&self.graph, self.initial_state.clone(), self.step_limit, ctx).await
    }
}

#[derive(Debug, Default)]
pub struct WorkflowCompiler {
    config: EngineConfig,
    extensions: Extensions,
}

impl WorkflowCompiler {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            extensions: Extensions::new(),
        }
    }

    pub fn with_extensions(mut self, extensions: Extensions) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn compile(&self, def: &WorkflowDefinition) -> Result<CompiledWorkflow, AgentFlowError> {
        // State first so a missing final_output is reported before anything is built
        let initial_state = GraphState::new(def.state_info.clone())?;

        let factory = AgentFactory::new(&self.extensions, &self.config);
        let mut builder = WorkflowBuilder::new(def.name.clone());

        for agent_def in &def.agents {
            let agent = factory.build(agent_def)?;
            builder.add_node(agent_def.name.clone(), agent)?;
        }

        for (key, targets) in &def.workflow_graph.graph_logic {
            for target in targets.to_vec() {
                match key.as_str() {
                    ENTRY_POINT => builder.add_edge(ENTRY_POINT, target)?,
                    END_POINT => builder.add_edge(target, END_POINT)?,
                    from => builder.add_edge(from, target)?,
                };
            }
        }

        for (index, edge) in &def.workflow_graph.conditional_edges {
            let predicate = conditional_predicate(*index, edge)?;
            builder.add_conditional_edge(edge.from_node.clone(), predicate, edge.to_nodes.to_vec())?;
        }

        let graph = builder.build()?;
        Ok(CompiledWorkflow {
            graph,
            initial_state,
            step_limit: self.config.step_limit,
        })
    }
}

fn conditional_predicate(
    index: u32,
    edge: &ConditionalEdgeDefinition,
) -> Result<Predicate, ConfigurationError> {
    let invalid = |message: &str| ConfigurationError::InvalidConditionalEdge {
        index,
        from: edge.from_node.clone(),
        message: message.to_string(),
    };

    match (&edge.condition, &edge.route_on) {
        (Some(condition), None) => Predicate::condition(condition),
        (None, Some(key)) => Ok(Predicate::state_key(key.clone())),
        (Some(_), Some(_)) => Err(invalid("set either 'condition' or 'route_on', not both")),
        (None, None) => Err(invalid("one of 'condition' or 'route_on' is required")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::error::StateError;
    use crate::adk::function::{behavior_fn, BehaviorOutput};
    use crate::agentflow::workflow::loader::DefinitionLoader;
    use serde_json::json;

    const ROUTER_YAML: &str = r#"
name: router
state_info:
  final_output: ""
  intent: code
agents:
  - name: classify
    functions:
      - name: run
        behavior:
          kind: state_value
          key: intent
  - name: search
    functions:
      - name: run
        behavior: {kind: state_value, key: intent}
    output_key: final_output
  - name: code
    functions:
      - name: run
    output_key: final_output
workflow_graph:
  graph_logic:
    ENTRY_POINT: classify
    END_POINT: [search, code]
  conditional_edges:
    1:
      from_node: classify
      route_on: intent
      to_nodes: [search, code]
"#;

    fn compiler() -> WorkflowCompiler {
        let mut extensions = Extensions::new();
        extensions.register(
            "run",
            behavior_fn(|_, _| Ok(BehaviorOutput::value("generated code"))),
        );
        WorkflowCompiler::new(EngineConfig::default()).with_extensions(extensions)
    }

    #[tokio::test]
    async fn test_compile_and_run_route_on() {
        let def = DefinitionLoader::parse_yaml(ROUTER_YAML).unwrap();
        let compiled = compiler().compile(&def).unwrap();

        assert_eq!(compiled.graph.entry(), "classify");
        assert_eq!(compiled.step_limit, 25);

        let state = compiled.run(&ExecutionContext::new()).await.unwrap();
        assert_eq!(state.final_output().unwrap(), &json!("generated code"));
    }

    #[test]
    fn test_missing_final_output_fails_before_build() {
        let mut def = DefinitionLoader::parse_yaml(ROUTER_YAML).unwrap();
        def.state_info.remove("final_output");
        // An unresolvable agent must not be reached
        def.agents[0].functions.clear();

        let err = compiler().compile(&def).unwrap_err();
        assert!(matches!(
            err,
            AgentFlowError::State(StateError::MissingRequiredKey(ref key)) if key == "final_output"
        ));
    }

    #[test]
    fn test_conditional_edge_needs_exactly_one_predicate() {
        let mut def = DefinitionLoader::parse_yaml(ROUTER_YAML).unwrap();
        if let Some(edge) = def.workflow_graph.conditional_edges.get_mut(&1) {
            edge.condition = Some("intent == 'code'".to_string());
        }

        let err = compiler().compile(&def).unwrap_err();
        assert!(matches!(
            err,
            AgentFlowError::Configuration(ConfigurationError::InvalidConditionalEdge { index: 1, .. })
        ));
    }

    #[test]
    fn test_missing_run_is_configuration_error() {
        let mut def = DefinitionLoader::parse_yaml(ROUTER_YAML).unwrap();
        def.agents[1].functions[0].name = "walk".to_string();

        let err = compiler().compile(&def).unwrap_err();
        assert!(matches!(
            err,
            AgentFlowError::Configuration(ConfigurationError::MissingRunFunction { ref agent }) if agent == "search"
        ));
    }

    #[test]
    fn test_unknown_edge_target() {
        let yaml = r#"
name: dangling
state_info: {final_output: ""}
agents:
  - name: a
    functions: [{name: run, behavior: {kind: augment_query}}]
workflow_graph:
  graph_logic:
    ENTRY_POINT: a
    a: ghost
"#;
        let def = DefinitionLoader::parse_yaml(yaml).unwrap();
        let err = WorkflowCompiler::default().compile(&def).unwrap_err();
        assert!(matches!(
            err,
            AgentFlowError::Configuration(ConfigurationError::UnknownNode(ref name)) if name == "ghost"
        ));
    }

    #[test]
    fn test_condition_parse_error_is_configuration_error() {
        let yaml = r#"
name: bad-condition
state_info: {final_output: ""}
agents:
  - name: a
    functions: [{name: run, behavior: {kind: augment_query}}]
workflow_graph:
  graph_logic:
    ENTRY_POINT: a
  conditional_edges:
    1: {from_node: a, condition: "score >", to_nodes: END_POINT}
"#;
        let def = DefinitionLoader::parse_yaml(yaml).unwrap();
        let err = WorkflowCompiler::default().compile(&def).unwrap_err();
        assert!(matches!(
            err,
            AgentFlowError::Configuration(ConfigurationError::InvalidCondition { .. })
        ));
    }

    #[test]
    fn test_record_round_trips_definitions() {
        let def = DefinitionLoader::parse_yaml(ROUTER_YAML).unwrap();
        let compiled = compiler().compile(&def).unwrap();
        let record = compiled.graph.record();

        assert_eq!(record.entry_point, "classify");
        assert_eq!(record.agents.len(), 3);
        assert_eq!(record.agents[0].definition, def.agents[0]);
        assert_eq!(record.agents[0].model, "gpt-4o-mini");
        assert_eq!(record.conditional_edges[0].predicate, "route_on intent");

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["agents"][1]["node"], "search");
        assert_eq!(json["edges"].as_array().map(Vec::len), Some(2));
    }
}
