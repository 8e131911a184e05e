//! Definition loader - YAML/JSON file loading and parsing
//!
//! Files ending in `.json` are parsed as JSON; everything else as YAML.

use super::types::WorkflowDefinition;
use crate::adk::error::AgentFlowError;
use std::fs;
use std::path::Path;

/// Loads workflow definitions from files
pub struct DefinitionLoader;

impl DefinitionLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load a workflow definition from a YAML or JSON file
    pub fn load_workflow<P: AsRef<Path>>(&self, path: P) -> Result<WorkflowDefinition, AgentFlowError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        log::debug!("Loading workflow definition from {}", path.display());
        if is_json {
            Self::parse_json(&content)
        } else {
            Self::parse_yaml(&content)
        }
    }

    /// Parse a workflow definition from a YAML string
    pub fn parse_yaml(content: &str) -> Result<WorkflowDefinition, AgentFlowError> {
        let def: WorkflowDefinition = serde_yaml::from_str(content)?;
        Ok(def)
    }

    /// Parse a workflow definition from a JSON string
    pub fn parse_json(content: &str) -> Result<WorkflowDefinition, AgentFlowError> {
        let def: WorkflowDefinition = serde_json::from_str(content)?;
        Ok(def)
    }
}

impl Default for DefinitionLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agentflow::workflow::types::{BehaviorSpec, NodeTargets};

    const RAG_YAML: &str = r#"
name: rag
description: "Retrieve, augment, answer"
state_info:
  query: "What is Rust?"
  documents: []
  final_output: ""
agents:
  - name: augmenter
    description: "Builds the augmented prompt"
    functions:
      - name: run
        behavior:
          kind: augment_query
    output_key: augmented_query
  - name: composer
    functions:
      - name: run
        behavior:
          kind: reference
          target: _generate_final_query
    memory:
      - memory_type: style
        content: "Answer briefly"
    output_key: final_output
workflow_graph:
  graph_logic:
    ENTRY_POINT: augmenter
    augmenter: composer
    END_POINT: composer
"#;

    #[test]
    fn test_parse_yaml_workflow() {
        let def = DefinitionLoader::parse_yaml(RAG_YAML).unwrap();

        assert_eq!(def.name, "rag");
        assert_eq!(def.agents.len(), 2);
        assert_eq!(def.state_info["query"], "What is Rust?");
        assert_eq!(def.agents[0].functions[0].behavior, BehaviorSpec::AugmentQuery);
        assert_eq!(def.agents[1].memory[0].content, "Answer briefly");
        assert_eq!(
            def.workflow_graph.graph_logic["ENTRY_POINT"],
            NodeTargets::Single("augmenter".to_string())
        );
        assert!(def.workflow_graph.conditional_edges.is_empty());
    }

    #[test]
    fn test_parse_conditional_edges() {
        let yaml = r#"
name: router
agents: []
workflow_graph:
  graph_logic:
    ENTRY_POINT: classify
  conditional_edges:
    2:
      from_node: classify
      route_on: intent
      to_nodes: [search, code]
    1:
      from_node: classify
      condition: "confidence < 0.5"
      to_nodes: clarify
"#;
        let def = DefinitionLoader::parse_yaml(yaml).unwrap();
        let indices: Vec<u32> = def.workflow_graph.conditional_edges.keys().copied().collect();
        assert_eq!(indices, vec![1, 2]);

        let first = &def.workflow_graph.conditional_edges[&1];
        assert_eq!(first.condition.as_deref(), Some("confidence < 0.5"));
        assert_eq!(first.to_nodes.to_vec(), vec!["clarify"]);

        let second = &def.workflow_graph.conditional_edges[&2];
        assert_eq!(second.route_on.as_deref(), Some("intent"));
        assert_eq!(second.to_nodes.to_vec(), vec!["search", "code"]);
    }

    #[test]
    fn test_parse_json_workflow() {
        let json = r#"{
            "name": "greeting",
            "state_info": {"final_output": ""},
            "agents": [{"name": "greeter", "functions": [{"name": "run"}]}],
            "workflow_graph": {
                "graph_logic": {"ENTRY_POINT": "greeter", "END_POINT": "greeter"},
                "conditional_edges": {"1": {"from_node": "greeter", "condition": "true", "to_nodes": ["greeter"]}}
            }
        }"#;
        let def = DefinitionLoader::parse_json(json).unwrap();
        assert_eq!(def.agents[0].functions[0].behavior, BehaviorSpec::Extension);
        assert!(def.workflow_graph.conditional_edges.contains_key(&1));
    }

    #[test]
    fn test_parse_rejects_malformed_input() {
        assert!(matches!(
            DefinitionLoader::parse_yaml("name: [unterminated"),
            Err(AgentFlowError::Yaml(_))
        ));
        assert!(matches!(
            DefinitionLoader::parse_json("{\"name\": \"x\"}"),
            Err(AgentFlowError::Json(_))
        ));
    }

    #[test]
    fn test_load_workflow_missing_file() {
        let err = DefinitionLoader::new()
            .load_workflow("/nonexistent/workflow.yaml")
            .unwrap_err();
        assert!(matches!(err, AgentFlowError::Io(_)));
    }
}
