//! Graph workflow executor
//!
//! Walks a built graph from its entry node, one node at a time, until the
//! end marker is reached or the step limit runs out. The executor owns the
//! graph state for the whole run and hands it to each node in turn.

use super::types::{WorkflowGraph, END_POINT};
use crate::adk::context::{ExecutionContext, ExecutionEvent, ExecutionStatus};
use crate::adk::error::ExecutionError;
use crate::agentflow::workflow::state::GraphState;
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// One completed node execution
#[derive(Debug, Clone, PartialEq)]
pub struct NodeExecution {
    /// 1-based position in the run
    pub step: usize,
    pub node: String,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

#[derive(Debug)]
pub struct GraphExecutor<'g> {
    graph: &'g WorkflowGraph,
    status: ExecutionStatus,
    history: Vec<NodeExecution>,
    run_id: Option<Uuid>,
}

impl<'g> GraphExecutor<'g> {
    pub fn new(graph: &'g WorkflowGraph) -> Self {
        Self {
            graph,
            status: ExecutionStatus::NotStarted,
            history: Vec::new(),
            run_id: None,
        }
    }

    pub fn status(&self) -> ExecutionStatus {
        self.status
    }

    /// Completed node executions of the latest run, in order
    pub fn history(&self) -> &[NodeExecution] {
        &self.history
    }

    /// Id of the latest run
    pub fn run_id(&self) -> Option<Uuid> {
        self.run_id
    }

    pub fn steps(&self) -> usize {
        self.history.len()
    }

    /// Node names in visiting order
    pub fn visited(&self) -> Vec<&str> {
        self.history.iter().map(|h| h.node.as_str()).collect()
    }

    /// Run the graph against `state`, allowing at most `step_limit` node executions.
    ///
    /// Every call is a new run with its own run id, so no agent sees values
    /// left over from an earlier run.
    pub async fn execute(
        &mut self,
        state: GraphState,
        step_limit: usize,
        ctx: &ExecutionContext,
    ) -> Result<GraphState, ExecutionError> {
        let ctx = &ctx.new_run();
        let run_id = ctx.run_id();
        self.run_id = Some(run_id);
        self.status = ExecutionStatus::Running;
        self.history.clear();

        log::info!(
            "[{}] Starting workflow '{}' at '{}' (step limit {})",
            run_id,
            self.graph.name(),
            self.graph.entry(),
            step_limit
        );
        ctx.notify(ExecutionEvent::RunStarted {
            entry: self.graph.entry().to_string(),
        });

        let result = self.walk(state, step_limit, ctx).await;

        self.status = match &result {
            Ok(_) => {
                log::info!(
                    "[{}] Workflow '{}' completed after {} steps",
                    run_id,
                    self.graph.name(),
                    self.history.len()
                );
                ExecutionStatus::Completed
            }
            Err(e) => {
                log::error!(
                    "[{}] Workflow '{}' aborted after {} steps: {}",
                    run_id,
                    self.graph.name(),
                    self.history.len(),
                    e
                );
                ExecutionStatus::Aborted
            }
        };
        ctx.notify(ExecutionEvent::RunFinished {
            status: self.status,
            steps: self.history.len(),
        });

        result
    }

    async fn walk(
        &mut self,
        mut state: GraphState,
        step_limit: usize,
        ctx: &ExecutionContext,
    ) -> Result<GraphState, ExecutionError> {
        let graph = self.graph;
        state.validate()?;
        let mut current = graph.entry().to_string();

        loop {
            if current == END_POINT {
                state.validate()?;
                return Ok(state);
            }
            if ctx.is_cancelled() {
                return Err(ExecutionError::Cancelled);
            }
            if self.history.len() >= step_limit {
                return Err(ExecutionError::ExecutionLimitExceeded { limit: step_limit });
            }

            let agent = graph
                .node(&current)
                .ok_or_else(|| ExecutionError::UnknownNode(current.clone()))?;
            let step = self.history.len() + 1;

            log::info!("[{}] Step {}: running node '{}'", ctx.run_id(), step, current);
            ctx.notify(ExecutionEvent::NodeStarted {
                node: current.clone(),
                step,
            });

            let started_at = Utc::now();
            let timer = Instant::now();
            state = agent
                .run(state, ctx)
                .await
                .map_err(|e| ExecutionError::Node {
                    node: current.clone(),
                    source: Box::new(e),
                })?;
            let elapsed = timer.elapsed();

            self.history.push(NodeExecution {
                step,
                node: current.clone(),
                started_at,
                elapsed,
            });
            ctx.notify(ExecutionEvent::NodeFinished {
                node: current.clone(),
                step,
                elapsed,
            });

            let next = graph.next_node(&current, &state)?;
            log::debug!("[{}] Transition '{}' -> '{}'", ctx.run_id(), current, next);
            ctx.notify(ExecutionEvent::Transition {
                from: current.clone(),
                to: next.clone(),
            });
            current = next;
        }
    }
}

/// Run `graph` from its entry with a fresh execution context
pub async fn execute(
    graph: &WorkflowGraph,
    initial_state: GraphState,
    step_limit: usize,
) -> Result<GraphState, ExecutionError> {
    execute_with(graph, initial_state, step_limit, &ExecutionContext::new()).await
}

/// Run `graph` from its entry with the given execution context
pub async fn execute_with(
    graph: &WorkflowGraph,
    initial_state: GraphState,
    step_limit: usize,
    ctx: &ExecutionContext,
) -> Result<GraphState, ExecutionError> {
    GraphExecutor::new(graph)
        .execute(initial_state, step_limit, ctx)
        .await
}
