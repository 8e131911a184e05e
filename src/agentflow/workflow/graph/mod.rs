// SPDX-License-Identifier: MIT

//! Workflow graphs
//!
//! [`WorkflowBuilder`] assembles nodes and edges into an immutable
//! [`WorkflowGraph`]; [`GraphExecutor`] runs it against a `GraphState`.

pub mod builder;
pub mod executor;
pub mod types;

pub use builder::WorkflowBuilder;
pub use executor::{execute, execute_with, GraphExecutor, NodeExecution};
pub use types::{
    ConditionalEdge, EdgeGroupId, Predicate, WorkflowGraph, WorkflowRecord, END_POINT, ENTRY_POINT,
};
