// SPDX-License-Identifier: MIT

//! Definition records for workflows and agents
//!
//! These are the validated inputs the engine is built from. They deserialize
//! from YAML or JSON and serialize back unchanged, so a built workflow can
//! hand its definitions to a persistence layer.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Top-level workflow definition
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct WorkflowDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Initial graph state; must carry `final_output`
    #[serde(default)]
    pub state_info: Map<String, Value>,
    pub agents: Vec<AgentDefinition>,
    pub workflow_graph: WorkflowGraphDefinition,
}

/// Edges of a workflow graph
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct WorkflowGraphDefinition {
    /// Plain edges: node -> next node(s).
    ///
    /// The reserved key `ENTRY_POINT` names the first node and `END_POINT`
    /// names the node that finishes the run.
    #[serde(default)]
    pub graph_logic: BTreeMap<String, NodeTargets>,
    /// Conditional edge groups, applied in ascending index order
    #[serde(default)]
    pub conditional_edges: BTreeMap<u32, ConditionalEdgeDefinition>,
}

/// One node name or a list of them
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
#[serde(untagged)]
pub enum NodeTargets {
    #[default]
    None,
    Single(String),
    Multiple(Vec<String>),
}

impl NodeTargets {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            NodeTargets::None => vec![],
            NodeTargets::Single(s) => vec![s.clone()],
            NodeTargets::Multiple(v) => v.clone(),
        }
    }
}

/// A conditional edge group.
///
/// Exactly one of `condition` (a boolean expression, one target) or
/// `route_on` (a state key whose value names the target) must be set.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ConditionalEdgeDefinition {
    pub from_node: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_on: Option<String>,
    pub to_nodes: NodeTargets,
}

/// Agent definition
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AgentDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub functions: Vec<FunctionDefinition>,
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
    #[serde(default)]
    pub memory: Vec<MemoryDefinition>,
    /// Model identifier; the engine default applies when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Graph state keys pulled into the agent before each run (all when empty)
    #[serde(default)]
    pub state_keys: Vec<String>,
    /// Graph state key that receives the `run` function's return value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_key: Option<String>,
}

impl AgentDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            functions: Vec::new(),
            tools: Vec::new(),
            memory: Vec::new(),
            model: None,
            state_keys: Vec::new(),
            output_key: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_function(mut self, function: FunctionDefinition) -> Self {
        self.functions.push(function);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_state_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self
    }

    pub fn with_memory(mut self, memory: MemoryDefinition) -> Self {
        self.memory.push(memory);
        self
    }

    /// The declared function with the given name
    pub fn function(&self, name: &str) -> Option<&FunctionDefinition> {
        self.functions.iter().find(|f| f.name == name)
    }
}

/// A function an agent declares
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FunctionDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub behavior: BehaviorSpec,
}

impl FunctionDefinition {
    pub fn new(name: impl Into<String>, behavior: BehaviorSpec) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            behavior,
        }
    }

    /// A function whose behavior is supplied by the caller
    pub fn extension(name: impl Into<String>) -> Self {
        Self::new(name, BehaviorSpec::Extension)
    }
}

/// Closed set of behaviors a declared function can be bound to
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BehaviorSpec {
    /// Render a template against the state slice and ask the model
    ParseQuery {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        template: Option<String>,
    },
    SummarizeQuery {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        template: Option<String>,
    },
    AugmentQuery,
    ComposeFinalQuery,
    /// Alias for another registered function
    Reference { target: String },
    /// Return a value from the agent's state slice
    StateValue { key: String },
    Sequence { steps: Vec<StepDefinition> },
    /// Bound by the caller through `Extensions`
    #[default]
    Extension,
}

/// One call inside a `sequence` behavior
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StepDefinition {
    pub call: String,
    #[serde(default)]
    pub params: Value,
    /// Slice key receiving the step result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// Tool metadata
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// A memory note available to the agent's templates
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MemoryDefinition {
    pub memory_type: String,
    #[serde(alias = "description")]
    pub content: String,
}
