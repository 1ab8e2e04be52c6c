//! Execution graph: adjacency, parent map, and deterministic topological order.
//!
//! The order is computed with Kahn's algorithm over a FIFO queue seeded in
//! declaration order, so independent steps always run in the order they were
//! authored. When the order comes up short, `petgraph` strongly connected
//! components name the steps that sit on a cycle.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::algo::tarjan_scc;
use petgraph::graph::DiGraph;
use stepwise_types::workflow::{Transition, WorkflowDefinition};

use super::definition::{validate_definition, WorkflowError};

// ---------------------------------------------------------------------------
// ExecutionGraph
// ---------------------------------------------------------------------------

/// The validated, ordered shape of one workflow definition.
#[derive(Debug, Clone, Default)]
pub struct ExecutionGraph {
    /// Step ids in execution order.
    pub order: Vec<String>,
    /// Step id -> direct children, in transition declaration order.
    pub children: HashMap<String, Vec<String>>,
    /// Step id -> direct parents, in transition declaration order.
    pub parents: HashMap<String, Vec<String>>,
    /// Transitions ignored because an endpoint is not a defined step.
    pub dropped_edges: Vec<Transition>,
}

impl ExecutionGraph {
    /// Validate `def` and compute its execution order.
    ///
    /// Fails with `WorkflowError::CycleDetected` when the transitions contain
    /// a cycle; nothing may execute in that case.
    pub fn build(def: &WorkflowDefinition, strict_edges: bool) -> Result<Self, WorkflowError> {
        validate_definition(def, strict_edges)?;

        let known: HashSet<&str> = def.nodes.iter().map(|s| s.id.as_str()).collect();
        let mut children: HashMap<String, Vec<String>> = def
            .nodes
            .iter()
            .map(|s| (s.id.clone(), Vec::new()))
            .collect();
        let mut parents = children.clone();
        let mut in_degree: HashMap<&str, usize> =
            def.nodes.iter().map(|s| (s.id.as_str(), 0)).collect();
        let mut dropped_edges = Vec::new();

        for edge in &def.edges {
            if !known.contains(edge.from.as_str()) || !known.contains(edge.to.as_str()) {
                tracing::debug!(from = %edge.from, to = %edge.to, "dropping transition with unknown endpoint");
                dropped_edges.push(edge.clone());
                continue;
            }
            if let Some(list) = children.get_mut(&edge.from) {
                list.push(edge.to.clone());
            }
            if let Some(list) = parents.get_mut(&edge.to) {
                list.push(edge.from.clone());
            }
            if let Some(count) = in_degree.get_mut(edge.to.as_str()) {
                *count += 1;
            }
        }

        // Kahn's algorithm, FIFO by enqueue time
        let mut queue: VecDeque<&str> = def
            .nodes
            .iter()
            .map(|s| s.id.as_str())
            .filter(|id| in_degree.get(id).copied() == Some(0))
            .collect();
        let mut order = Vec::with_capacity(def.nodes.len());

        while let Some(id) = queue.pop_front() {
            order.push(id.to_string());
            for child in children.get(id).map(Vec::as_slice).unwrap_or_default() {
                if let Some(count) = in_degree.get_mut(child.as_str()) {
                    *count -= 1;
                    if *count == 0 {
                        queue.push_back(child.as_str());
                    }
                }
            }
        }

        if order.len() < def.nodes.len() {
            return Err(WorkflowError::CycleDetected(cycle_members(def, &children)));
        }

        Ok(Self {
            order,
            children,
            parents,
            dropped_edges,
        })
    }

    /// Direct parents of a step (empty for roots and unknown ids).
    pub fn parents_of(&self, step_id: &str) -> &[String] {
        self.parents.get(step_id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Direct children of a step (empty for leaves and unknown ids).
    pub fn children_of(&self, step_id: &str) -> &[String] {
        self.children.get(step_id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Every step reachable from `step_id` through its children, in execution
    /// order. The step itself is not included.
    pub fn descendants_of(&self, step_id: &str) -> Vec<&str> {
        let mut reachable: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::from([step_id]);
        while let Some(id) = queue.pop_front() {
            for child in self.children_of(id) {
                if reachable.insert(child.as_str()) {
                    queue.push_back(child.as_str());
                }
            }
        }
        self.order
            .iter()
            .map(String::as_str)
            .filter(|id| reachable.contains(id))
            .collect()
    }
}

/// Steps that lie on at least one cycle, in declaration order.
fn cycle_members(def: &WorkflowDefinition, children: &HashMap<String, Vec<String>>) -> Vec<String> {
    let mut graph = DiGraph::<&str, ()>::new();
    let indices: HashMap<&str, _> = def
        .nodes
        .iter()
        .map(|s| (s.id.as_str(), graph.add_node(s.id.as_str())))
        .collect();

    for (from, targets) in children {
        for to in targets {
            if let (Some(&a), Some(&b)) = (indices.get(from.as_str()), indices.get(to.as_str())) {
                graph.add_edge(a, b, ());
            }
        }
    }

    let mut on_cycle: HashSet<&str> = HashSet::new();
    for component in tarjan_scc(&graph) {
        let self_loop = component.len() == 1 && graph.contains_edge(component[0], component[0]);
        if component.len() > 1 || self_loop {
            on_cycle.extend(component.iter().map(|&idx| graph[idx]));
        }
    }

    def.nodes
        .iter()
        .filter(|s| on_cycle.contains(s.id.as_str()))
        .map(|s| s.id.clone())
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
