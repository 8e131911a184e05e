// SPDX-License-Identifier: MIT

//! Typed error handling for agentflow-rs
//!
//! Errors are grouped by the phase in which they can occur:
//! - `ConfigurationError` - building agents and workflow graphs
//! - `StateError` - constructing, reading or validating `GraphState`
//! - `ExecutionError` - running a built graph
//! - `ServiceError` - the language model service
//!
//! `AgentFlowError` wraps all of them for callers that load, compile and run
//! workflows in one go.

use std::time::Duration;
use thiserror::Error;

/// Top-level error type for agentflow-rs
#[derive(Debug, Error)]
pub enum AgentFlowError {
    /// The workflow or one of its agents is malformed
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// The graph state is missing required data or has the wrong shape
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// A workflow run failed
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors raised while constructing agents and graphs.
///
/// These never reach execution: a workflow that produces one is rejected
/// before any node runs.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigurationError {
    /// Agent does not declare a function named `run`
    #[error("Agent '{agent}' does not declare a 'run' function")]
    MissingRunFunction { agent: String },

    /// Agent declares `run` as an extension but nothing was bound to it
    #[error("Agent '{agent}' declares 'run' but no behavior is bound to it")]
    UnboundRunFunction { agent: String },

    /// A `reference` function points at a name that is not registered
    #[error("Function '{function}' of agent '{agent}' references unknown function '{target}'")]
    UnresolvedReference {
        agent: String,
        function: String,
        target: String,
    },

    #[error("Node '{0}' already exists")]
    DuplicateNode(String),

    #[error("Unknown node: {0}")]
    UnknownNode(String),

    /// `ENTRY_POINT` / `END_POINT` used where a real node is required
    #[error("'{0}' is a reserved marker and cannot be used here")]
    ReservedName(String),

    #[error("Workflow entry point not set")]
    NoEntryPoint,

    #[error("Workflow has more than one entry point: {0:?}")]
    MultipleEntryPoints(Vec<String>),

    #[error("END_POINT cannot have outgoing edges (found edge to '{0}')")]
    EndPointHasOutgoingEdge(String),

    #[error("Node '{0}' has an edge into ENTRY_POINT")]
    EdgeIntoEntryPoint(String),

    /// Plain fan-out: a node with more than one plain successor
    #[error("Node '{node}' has more than one plain outgoing edge: {targets:?}")]
    AmbiguousEdges { node: String, targets: Vec<String> },

    #[error("Node '{0}' mixes plain and conditional outgoing edges")]
    MixedEdges(String),

    #[error("Conditional edge from '{0}' has no targets")]
    EmptyTargets(String),

    /// Boolean predicates select a single target
    #[error("Boolean condition on edge from '{node}' needs exactly one target, got {count}")]
    PredicateTargets { node: String, count: usize },

    /// A node reachable from the entry point with nowhere to go
    #[error("Node '{0}' is reachable but has no outgoing edge")]
    DeadEnd(String),

    #[error("Invalid condition '{condition}': {message}")]
    InvalidCondition { condition: String, message: String },

    #[error("Conditional edge {index} from '{from}': {message}")]
    InvalidConditionalEdge {
        index: u32,
        from: String,
        message: String,
    },

    /// Malformed engine setting (environment variable or config file)
    #[error("Invalid value for {key}: {message}")]
    InvalidSetting { key: String, message: String },
}

/// Errors raised by `GraphState`
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StateError {
    /// A key the engine depends on is absent
    #[error("Required key '{0}' is missing from graph state")]
    MissingRequiredKey(String),

    #[error("Key '{0}' not found in graph state")]
    MissingKey(String),

    #[error("Invalid state shape: {0}")]
    InvalidShape(String),
}

/// Errors returned by a language model service.
///
/// A failed completion is always an error; it is never turned into an empty
/// response.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ServiceError {
    /// Upstream answered with a non-success status
    #[error("Model service returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// The request never produced a response
    #[error("Model service request failed: {0}")]
    Transport(String),

    #[error("Invalid response from model service: {0}")]
    InvalidResponse(String),

    #[error("API key not configured for provider: {0}")]
    MissingApiKey(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::Status {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None => Self::Transport(err.to_string()),
        }
    }
}

/// Errors that abort a workflow run.
///
/// The caller may retry the whole run; the engine itself never retries.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Lookup of a name nothing was registered under
    #[error("Function '{0}' is not registered")]
    UnknownFunction(String),

    #[error("Node '{0}' is not part of the graph")]
    UnknownNode(String),

    /// Every conditional group of a node declined to route
    #[error("No conditional edge matched at node '{node}'")]
    NoMatchingCondition { node: String },

    /// Step/recursion limit reached before the end marker
    #[error("Execution limit of {limit} node executions exceeded")]
    ExecutionLimitExceeded { limit: usize },

    /// A routing predicate picked a node outside its declared targets
    #[error("Route from '{node}' selected '{target}', which is not one of its targets")]
    InvalidRoute { node: String, target: String },

    /// A behavior rejected its input
    #[error("Function '{function}' failed: {message}")]
    Behavior { function: String, message: String },

    #[error("Template error: {0}")]
    Template(String),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("Model call timed out after {0:?}")]
    ModelTimeout(Duration),

    #[error("No language model configured for this run")]
    ModelUnavailable,

    #[error("Call depth limit of {0} exceeded")]
    CallDepthExceeded(usize),

    #[error("Workflow run was cancelled")]
    Cancelled,

    #[error(transparent)]
    State(#[from] StateError),

    /// Failure inside a node, tagged with the node name
    #[error("Node '{node}' failed: {source}")]
    Node {
        node: String,
        #[source]
        source: Box<ExecutionError>,
    },
}

impl ExecutionError {
    /// Create a behavior error
    pub fn behavior(function: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Behavior {
            function: function.into(),
            message: message.into(),
        }
    }

    /// Name of the node that failed, if the error happened inside one
    pub fn node(&self) -> Option<&str> {
        match self {
            Self::Node { node, .. } => Some(node),
            Self::NoMatchingCondition { node } | Self::InvalidRoute { node, .. } => Some(node),
            _ => None,
        }
    }

    /// The underlying error with node wrappers removed
    pub fn root(&self) -> &ExecutionError {
        match self {
            Self::Node { source, .. } => source.root(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_error_reports_node_and_root() {
        let err = ExecutionError::Node {
            node: "summarizer".to_string(),
            source: Box::new(ExecutionError::UnknownFunction("_missing".to_string())),
        };

        assert_eq!(err.node(), Some("summarizer"));
        assert!(matches!(err.root(), ExecutionError::UnknownFunction(name) if name == "_missing"));
        assert!(err.to_string().contains("summarizer"));
        assert!(err.to_string().contains("_missing"));
    }

    #[test]
    fn test_service_error_propagates_into_execution_error() {
        let service = ServiceError::Status {
            status: 429,
            message: "rate limited".to_string(),
        };
        let err: ExecutionError = service.clone().into();

        assert!(matches!(err, ExecutionError::Service(ref s) if *s == service));
        assert!(err.to_string().contains("429"));
    }

    #[test]
    fn test_configuration_error_wraps_into_top_level() {
        let err: AgentFlowError = ConfigurationError::NoEntryPoint.into();
        assert!(err.to_string().contains("entry point"));
    }

    #[test]
    fn test_state_error_wraps_into_execution_error() {
        let err: ExecutionError = StateError::MissingRequiredKey("final_output".to_string()).into();
        assert!(matches!(
            err,
            ExecutionError::State(StateError::MissingRequiredKey(ref key)) if key == "final_output"
        ));
    }
}
