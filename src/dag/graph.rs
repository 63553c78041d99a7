// src/dag/graph.rs

use std::collections::{HashMap, HashSet};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::dag::task::TaskSpec;
use crate::errors::{BuildError, Result};
use crate::types::TaskId;

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone, Default)]
struct DagNode {
    deps: Vec<TaskId>,
    dependents: Vec<TaskId>,
}

/// In-memory dependency graph keyed by task id.
///
/// Keeps adjacency in both directions so that failure propagation
/// (dependents of a failed task) and readiness (dependencies of a pending
/// task) are both cheap lookups.
#[derive(Debug, Clone)]
pub struct DagGraph {
    order: Vec<TaskId>,
    nodes: HashMap<TaskId, DagNode>,
}

impl DagGraph {
    /// Build a graph from task specs, in the given (registration) order.
    pub fn from_specs<'a>(specs: impl IntoIterator<Item = &'a TaskSpec>) -> Self {
        let mut order = Vec::new();
        let mut nodes: HashMap<TaskId, DagNode> = HashMap::new();

        for spec in specs {
            order.push(spec.id.clone());
            nodes.entry(spec.id.clone()).or_default().deps = spec.deps.clone();
        }

        for id in &order {
            let deps = nodes.get(id).map(|n| n.deps.clone()).unwrap_or_default();
            for dep in deps {
                if let Some(dep_node) = nodes.get_mut(&dep) {
                    dep_node.dependents.push(id.clone());
                }
            }
        }

        Self { order, nodes }
    }

    pub fn dependencies_of(&self, id: &str) -> &[TaskId] {
        self.nodes.get(id).map(|n| n.deps.as_slice()).unwrap_or(&[])
    }

    pub fn dependents_of(&self, id: &str) -> &[TaskId] {
        self.nodes
            .get(id)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Every task reachable downstream of `id` (not including `id`).
    pub fn transitive_dependents(&self, id: &str) -> Vec<TaskId> {
        let mut stack: Vec<&str> = self.dependents_of(id).iter().map(|s| s.as_str()).collect();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut out = Vec::new();

        while let Some(name) = stack.pop() {
            if !seen.insert(name) {
                continue;
            }
            out.push(name.to_string());
            stack.extend(self.dependents_of(name).iter().map(|s| s.as_str()));
        }

        out
    }

    /// Check that every dependency refers to a known task, that no task
    /// depends on itself and that there are no cycles.
    pub fn validate(&self) -> Result<()> {
        for id in &self.order {
            for dep in self.dependencies_of(id) {
                if dep == id {
                    return Err(BuildError::CyclicDependency(format!(
                        "task '{id}' depends on itself"
                    )));
                }
                if !self.nodes.contains_key(dep) {
                    return Err(BuildError::UnknownTask(format!(
                        "{dep} (dependency of '{id}')"
                    )));
                }
            }
        }
        self.topological_order().map(|_| ())
    }

    /// Topological order of the tasks (dependencies first).
    ///
    /// Edge direction is dep -> task: `B after A` adds edge `A -> B`.
    pub fn topological_order(&self) -> Result<Vec<TaskId>> {
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

        for id in &self.order {
            graph.add_node(id.as_str());
        }
        for id in &self.order {
            for dep in self.dependencies_of(id) {
                graph.add_edge(dep.as_str(), id.as_str(), ());
            }
        }

        match toposort(&graph, None) {
            Ok(order) => Ok(order.into_iter().map(str::to_string).collect()),
            Err(cycle) => Err(BuildError::CyclicDependency(format!(
                "cycle detected in task graph involving task '{}'",
                cycle.node_id()
            ))),
        }
    }
}
