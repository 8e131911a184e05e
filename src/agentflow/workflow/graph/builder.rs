// SPDX-License-Identifier: MIT

//! Incremental workflow graph construction
//!
//! Calls may come in any order as long as edge endpoints are added first.
//! Whole-graph invariants are checked by [`WorkflowBuilder::build`].

use super::types::{
    is_marker, ConditionalEdge, EdgeGroupId, Outgoing, Predicate, WorkflowGraph, END_POINT,
    ENTRY_POINT,
};
use crate::adk::agent::Agent;
use crate::adk::error::ConfigurationError;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

#[derive(Debug)]
pub struct WorkflowBuilder {
    name: String,
    nodes: HashMap<String, Arc<Agent>>,
    node_order: Vec<String>,
    entry_point: Option<String>,
    end_point: Option<String>,
    edges: Vec<(String, String)>,
    conditional_edges: Vec<ConditionalEdge>,
}

impl WorkflowBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: HashMap::new(),
            node_order: Vec::new(),
            entry_point: None,
            end_point: None,
            edges: Vec::new(),
            conditional_edges: Vec::new(),
        }
    }

    /// Register `agent` under a unique node name
    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        agent: Agent,
    ) -> Result<&mut Self, ConfigurationError> {
        let name = name.into();
        if is_marker(&name) {
            return Err(ConfigurationError::ReservedName(name));
        }
        if self.nodes.contains_key(&name) {
            return Err(ConfigurationError::DuplicateNode(name));
        }

        self.node_order.push(name.clone());
        self.nodes.insert(name, Arc::new(agent));
        Ok(self)
    }

    /// Designate the first node; a later call replaces an earlier one
    pub fn set_entry_point(&mut self, name: impl Into<String>) -> &mut Self {
        self.entry_point = Some(name.into());
        self
    }

    /// Designate the node that finishes the run; a later call replaces an earlier one
    pub fn set_end_point(&mut self, name: impl Into<String>) -> &mut Self {
        self.end_point = Some(name.into());
        self
    }

    pub fn add_edge(
        &mut self,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Result<&mut Self, ConfigurationError> {
        let from = from.into();
        let to = to.into();
        self.ensure_known(&from)?;
        self.ensure_known(&to)?;

        self.edges.push((from, to));
        Ok(self)
    }

    /// Add a conditional edge group leaving `from`.
    ///
    /// Groups on the same node are evaluated in the order they were added.
    pub fn add_conditional_edge<I, S>(
        &mut self,
        from: impl Into<String>,
        predicate: Predicate,
        targets: I,
    ) -> Result<EdgeGroupId, ConfigurationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let from = from.into();
        if is_marker(&from) {
            return Err(ConfigurationError::ReservedName(from));
        }
        self.ensure_known(&from)?;

        let targets: Vec<String> = targets.into_iter().map(Into::into).collect();
        if targets.is_empty() {
            return Err(ConfigurationError::EmptyTargets(from));
        }
        for target in &targets {
            if target == ENTRY_POINT {
                return Err(ConfigurationError::EdgeIntoEntryPoint(from));
            }
            self.ensure_known(target)?;
        }
        if predicate.is_boolean() && targets.len() != 1 {
            return Err(ConfigurationError::PredicateTargets {
                node: from,
                count: targets.len(),
            });
        }

        let id = EdgeGroupId(self.conditional_edges.len());
        self.conditional_edges.push(ConditionalEdge {
            id,
            from,
            predicate,
            targets,
        });
        Ok(id)
    }

    fn ensure_known(&self, name: &str) -> Result<(), ConfigurationError> {
        if is_marker(name) || self.nodes.contains_key(name) {
            Ok(())
        } else {
            Err(ConfigurationError::UnknownNode(name.to_string()))
        }
    }

    fn ensure_node(&self, name: &str) -> Result<(), ConfigurationError> {
        if is_marker(name) {
            return Err(ConfigurationError::ReservedName(name.to_string()));
        }
        self.ensure_known(name)
    }

    /// Check whole-graph invariants and produce the immutable graph
    pub fn build(&self) -> Result<WorkflowGraph, ConfigurationError> {
        let entry = self.resolve_entry()?;

        let mut edges: Vec<(String, String)> = Vec::new();
        for (from, to) in &self.edges {
            if from == ENTRY_POINT {
                continue;
            }
            if from == END_POINT {
                return Err(ConfigurationError::EndPointHasOutgoingEdge(to.clone()));
            }
            if to == ENTRY_POINT {
                return Err(ConfigurationError::EdgeIntoEntryPoint(from.clone()));
            }
            if !edges.iter().any(|(f, t)| f == from && t == to) {
                edges.push((from.clone(), to.clone()));
            }
        }

        if let Some(end) = &self.end_point {
            self.ensure_node(end)?;
            if !edges.iter().any(|(f, t)| f == end && t == END_POINT) {
                edges.push((end.clone(), END_POINT.to_string()));
            }
        }

        let outgoing = self.resolve_outgoing(&edges)?;

        for name in &self.node_order {
            if let Some(agent) = self.nodes.get(name) {
                if !agent.is_runnable() {
                    return Err(ConfigurationError::UnboundRunFunction {
                        agent: agent.name().to_string(),
                    });
                }
            }
        }

        self.check_reachability(&entry, &outgoing)?;

        log::info!(
            "Built workflow '{}': {} nodes, {} edges, {} conditional groups, entry '{}'",
            self.name,
            self.node_order.len(),
            edges.len(),
            self.conditional_edges.len(),
            entry
        );

        Ok(WorkflowGraph {
            name: self.name.clone(),
            entry,
            nodes: self.nodes.clone(),
            node_order: self.node_order.clone(),
            outgoing,
            edges,
            conditional_edges: self.conditional_edges.clone(),
        })
    }

    /// Exactly one effective entry: the designated node plus ENTRY_POINT edges
    fn resolve_entry(&self) -> Result<String, ConfigurationError> {
        let mut entries: Vec<String> = self
            .edges
            .iter()
            .filter(|(from, _)| from == ENTRY_POINT)
            .map(|(_, to)| to.clone())
            .chain(self.entry_point.iter().cloned())
            .collect();
        entries.sort();
        entries.dedup();

        match entries.len() {
            0 => Err(ConfigurationError::NoEntryPoint),
            1 => {
                let entry = entries.remove(0);
                self.ensure_node(&entry)?;
                Ok(entry)
            }
            _ => Err(ConfigurationError::MultipleEntryPoints(entries)),
        }
    }

    fn resolve_outgoing(
        &self,
        edges: &[(String, String)],
    ) -> Result<HashMap<String, Outgoing>, ConfigurationError> {
        let mut plain: HashMap<&str, Vec<String>> = HashMap::new();
        for (from, to) in edges {
            plain.entry(from.as_str()).or_default().push(to.clone());
        }

        let mut conditional: HashMap<&str, Vec<usize>> = HashMap::new();
        for (index, edge) in self.conditional_edges.iter().enumerate() {
            conditional.entry(edge.from.as_str()).or_default().push(index);
        }

        let mut outgoing = HashMap::new();
        for name in &self.node_order {
            match (plain.remove(name.as_str()), conditional.remove(name.as_str())) {
                (Some(_), Some(_)) => return Err(ConfigurationError::MixedEdges(name.clone())),
                (Some(mut targets), None) => {
                    if targets.len() > 1 {
                        targets.sort();
                        return Err(ConfigurationError::AmbiguousEdges {
                            node: name.clone(),
                            targets,
                        });
                    }
                    let target = targets.remove(0);
                    outgoing.insert(name.clone(), Outgoing::Direct(target));
                }
                (None, Some(groups)) => {
                    outgoing.insert(name.clone(), Outgoing::Conditional(groups));
                }
                (None, None) => {}
            }
        }
        Ok(outgoing)
    }

    /// Reachable nodes need a way out; unreachable ones are only reported
    fn check_reachability(
        &self,
        entry: &str,
        outgoing: &HashMap<String, Outgoing>,
    ) -> Result<(), ConfigurationError> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        seen.insert(entry);
        queue.push_back(entry);

        while let Some(node) = queue.pop_front() {
            let successors: Vec<&str> = match outgoing.get(node) {
                None => return Err(ConfigurationError::DeadEnd(node.to_string())),
                Some(Outgoing::Direct(to)) => vec![to.as_str()],
                Some(Outgoing::Conditional(groups)) => groups
                    .iter()
                    .filter_map(|i| self.conditional_edges.get(*i))
                    .flat_map(|edge| edge.targets.iter().map(String::as_str))
                    .collect(),
            };

            for next in successors {
                if next != END_POINT && seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }

        for name in &self.node_order {
            if !seen.contains(name.as_str()) {
                log::warn!(
                    "Workflow '{}': node '{}' is not reachable from '{}'",
                    self.name,
                    name,
                    entry
                );
            }
        }
        Ok(())
    }
}
