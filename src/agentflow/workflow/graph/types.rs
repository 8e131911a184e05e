//! Graph types
//!
//! A built [`WorkflowGraph`] is immutable: nodes are shared agents, plain
//! edges map a node to its single successor and conditional edge groups are
//! evaluated in the order they were added.

use crate::adk::agent::Agent;
use crate::adk::error::{ConfigurationError, ExecutionError};
use crate::agentflow::workflow::condition::{self, Expression};
use crate::agentflow::workflow::state::GraphState;
use crate::agentflow::workflow::types::AgentDefinition;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Marker naming the first node
pub const ENTRY_POINT: &str = "ENTRY_POINT";
/// Marker that finishes a run
pub const END_POINT: &str = "END_POINT";

pub fn is_marker(name: &str) -> bool {
    name == ENTRY_POINT || name == END_POINT
}

pub type WhenFn = dyn Fn(&GraphState) -> bool + Send + Sync;
pub type RouteFn = dyn Fn(&GraphState) -> Option<String> + Send + Sync;

/// Pure function of graph state choosing among a conditional group's targets
#[derive(Clone)]
pub enum Predicate {
    /// Selects the group's single target when it holds
    When(Arc<WhenFn>),
    /// Names one of the group's targets, or declines with `None`
    Route(Arc<RouteFn>),
    /// Parsed condition expression; behaves like `When`
    Condition { source: String, expression: Expression },
    /// Routes to the target named by a string state value
    StateKey(String),
}

impl Predicate {
    pub fn when<F>(f: F) -> Self
    where
        F: Fn(&GraphState) -> bool + Send + Sync + 'static,
    {
        Self::When(Arc::new(f))
    }

    pub fn route<F>(f: F) -> Self
    where
        F: Fn(&GraphState) -> Option<String> + Send + Sync + 'static,
    {
        Self::Route(Arc::new(f))
    }

    /// Parse a condition expression such as `intent == 'search'`
    pub fn condition(source: &str) -> Result<Self, ConfigurationError> {
        let expression =
            condition::parse(source).map_err(|e| ConfigurationError::InvalidCondition {
                condition: source.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self::Condition {
            source: source.to_string(),
            expression,
        })
    }

    pub fn state_key(key: impl Into<String>) -> Self {
        Self::StateKey(key.into())
    }

    /// Boolean predicates select their group's only target
    pub fn is_boolean(&self) -> bool {
        matches!(self, Self::When(_) | Self::Condition { .. })
    }

    pub fn describe(&self) -> String {
        match self {
            Self::When(_) => "<predicate>".to_string(),
            Self::Route(_) => "<router>".to_string(),
            Self::Condition { source, .. } => source.clone(),
            Self::StateKey(key) => format!("route_on {}", key),
        }
    }

    /// The target this predicate picks for `state`, if any
    pub fn select(&self, state: &GraphState, targets: &[String]) -> Option<String> {
        match self {
            Self::When(f) => f(state).then(|| targets.first().cloned()).flatten(),
            Self::Condition { expression, .. } => condition::evaluate(expression, state)
                .then(|| targets.first().cloned())
                .flatten(),
            Self::Route(f) => f(state),
            Self::StateKey(key) => match state.get_path(key) {
                Some(Value::String(target)) => Some(target.clone()),
                _ => None,
            },
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Predicate({})", self.describe())
    }
}

/// Opaque handle of a conditional edge group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EdgeGroupId(pub(crate) usize);

#[derive(Debug, Clone)]
pub struct ConditionalEdge {
    pub id: EdgeGroupId,
    pub from: String,
    pub predicate: Predicate,
    pub targets: Vec<String>,
}

/// How a node picks its successor
#[derive(Debug, Clone)]
pub(crate) enum Outgoing {
    Direct(String),
    /// Indices into the graph's conditional edges, in evaluation order
    Conditional(Vec<usize>),
}

/// Immutable, validated workflow graph
#[derive(Debug)]
pub struct WorkflowGraph {
    pub(crate) name: String,
    pub(crate) entry: String,
    pub(crate) nodes: HashMap<String, Arc<Agent>>,
    pub(crate) node_order: Vec<String>,
    pub(crate) outgoing: HashMap<String, Outgoing>,
    pub(crate) edges: Vec<(String, String)>,
    pub(crate) conditional_edges: Vec<ConditionalEdge>,
}

impl WorkflowGraph {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The node execution starts at
    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn node(&self, name: &str) -> Option<&Arc<Agent>> {
        self.nodes.get(name)
    }

    /// Node names in insertion order
    pub fn node_names(&self) -> &[String] {
        &self.node_order
    }

    pub fn edges(&self) -> &[(String, String)] {
        &self.edges
    }

    pub fn conditional_edges(&self) -> &[ConditionalEdge] {
        &self.conditional_edges
    }

    /// Successor of `from` given the current state.
    ///
    /// Conditional groups are tried in order and the first that selects a
    /// target wins.
    pub fn next_node(&self, from: &str, state: &GraphState) -> Result<String, ExecutionError> {
        match self.outgoing.get(from) {
            None => Err(ExecutionError::UnknownNode(from.to_string())),
            Some(Outgoing::Direct(to)) => Ok(to.clone()),
            Some(Outgoing::Conditional(groups)) => {
                for edge in groups.iter().filter_map(|i| self.conditional_edges.get(*i)) {
                    let Some(target) = edge.predicate.select(state, &edge.targets) else {
                        continue;
                    };
                    if !edge.targets.contains(&target) {
                        return Err(ExecutionError::InvalidRoute {
                            node: from.to_string(),
                            target,
                        });
                    }
                    log::debug!(
                        "Conditional edge {} from '{}' selected '{}'",
                        edge.predicate.describe(),
                        from,
                        target
                    );
                    return Ok(target);
                }
                Err(ExecutionError::NoMatchingCondition {
                    node: from.to_string(),
                })
            }
        }
    }

    /// Serializable description of the graph and its agent definitions
    pub fn record(&self) -> WorkflowRecord {
        WorkflowRecord {
            name: self.name.clone(),
            entry_point: self.entry.clone(),
            agents: self
                .node_order
                .iter()
                .filter_map(|name| {
                    self.nodes.get(name).map(|agent| AgentRecord {
                        node: name.clone(),
                        model: agent.model().to_string(),
                        definition: agent.definition().clone(),
                    })
                })
                .collect(),
            edges: self
                .edges
                .iter()
                .map(|(from, to)| EdgeRecord {
                    from: from.clone(),
                    to: to.clone(),
                })
                .collect(),
            conditional_edges: self
                .conditional_edges
                .iter()
                .map(|edge| ConditionalEdgeRecord {
                    id: edge.id.0,
                    from: edge.from.clone(),
                    predicate: edge.predicate.describe(),
                    targets: edge.targets.clone(),
                })
                .collect(),
        }
    }
}

/// Persistence record for a built workflow
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowRecord {
    pub name: String,
    pub entry_point: String,
    pub agents: Vec<AgentRecord>,
    pub edges: Vec<EdgeRecord>,
    pub conditional_edges: Vec<ConditionalEdgeRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentRecord {
    pub node: String,
    pub model: String,
    pub definition: AgentDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeRecord {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionalEdgeRecord {
    pub id: usize,
    pub from: String,
    pub predicate: String,
    pub targets: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state(value: Value) -> GraphState {
        GraphState::from_json(value).unwrap()
    }

    fn targets(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_when_selects_single_target() {
        let predicate = Predicate::when(|s| s.get_path("ready") == Some(&json!(true)));
        let t = targets(&["next"]);

        assert_eq!(
            predicate.select(&state(json!({"final_output": "", "ready": true})), &t),
            Some("next".to_string())
        );
        assert_eq!(
            predicate.select(&state(json!({"final_output": "", "ready": false})), &t),
            None
        );
        assert!(predicate.is_boolean());
    }

    #[test]
    fn test_condition_predicate() {
        let predicate = Predicate::condition("score > 0.5").unwrap();
        let t = targets(&["accept"]);

        assert_eq!(
            predicate.select(&state(json!({"final_output": "", "score": 0.9})), &t),
            Some("accept".to_string())
        );
        assert_eq!(
            predicate.select(&state(json!({"final_output": "", "score": 0.1})), &t),
            None
        );
        assert_eq!(predicate.describe(), "score > 0.5");
    }

    #[test]
    fn test_invalid_condition_is_configuration_error() {
        assert!(matches!(
            Predicate::condition("score >"),
            Err(ConfigurationError::InvalidCondition { ref condition, .. }) if condition == "score >"
        ));
    }

    #[test]
    fn test_state_key_routes_on_string_value() {
        let predicate = Predicate::state_key("intent");
        let t = targets(&["search", "code"]);

        assert_eq!(
            predicate.select(&state(json!({"final_output": "", "intent": "code"})), &t),
            Some("code".to_string())
        );
        assert_eq!(
            predicate.select(&state(json!({"final_output": "", "intent": 3})), &t),
            None
        );
        assert!(!predicate.is_boolean());
        assert_eq!(format!("{:?}", predicate), "Predicate(route_on intent)");
    }

    #[test]
    fn test_is_marker() {
        assert!(is_marker(ENTRY_POINT));
        assert!(is_marker(END_POINT));
        assert!(!is_marker("greeter"));
    }
}
