//! Dependency graph (C5): forward/reverse edges over bank file names, cycle
//! detection, topological order, reachability.
//!
//! Directly grounded on the corpus's `analysis/dependency.rs` `DependencyGraph`
//! (`petgraph::graph::DiGraph`, a `HashMap<PathBuf, NodeIndex>` index,
//! `toposort`, `tarjan_scc`, `is_cyclic_directed`), generalized from source
//! modules to bank file names and from import edges to link/transclusion edges.

pub mod model;

use petgraph::algo::{is_cyclic_directed, tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};

pub use model::{DependencyEdge, FileNode};

/// Directed multigraph of bank file references, kept so forward and reverse
/// indices are always updated atomically by a single mutation path.
#[derive(Default)]
pub struct DependencyGraph {
    graph: DiGraph<FileNode, DependencyEdge>,
    index_of: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn node_for(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.index_of.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(FileNode {
            name: name.to_string(),
        });
        self.index_of.insert(name.to_string(), idx);
        idx
    }

    /// Add edge `a -> b`. Ensures both endpoints exist as nodes.
    pub fn add_edge(&mut self, a: &str, b: &str, edge: DependencyEdge) {
        let na = self.node_for(a);
        let nb = self.node_for(b);
        self.graph.add_edge(na, nb, edge);
    }

    /// Remove every outgoing edge from `a`, leaving the node itself in place.
    pub fn remove_edges_from(&mut self, a: &str) {
        let Some(&idx) = self.index_of.get(a) else {
            return;
        };
        let outgoing: Vec<_> = self
            .graph
            .edges_directed(idx, petgraph::Direction::Outgoing)
            .map(|e| e.id())
            .collect();
        for edge_id in outgoing {
            self.graph.remove_edge(edge_id);
        }
    }

    /// Ensure `name` exists as a node even with no edges (e.g. on first write).
    pub fn ensure_node(&mut self, name: &str) {
        self.node_for(name);
    }

    /// Direct or transitive dependencies of `name` (files it references).
    pub fn dependencies(&self, name: &str, transitive: bool) -> Vec<String> {
        self.reachable(name, petgraph::Direction::Outgoing, transitive)
    }

    /// Direct or transitive dependents of `name` (files that reference it).
    pub fn dependents(&self, name: &str, transitive: bool) -> Vec<String> {
        self.reachable(name, petgraph::Direction::Incoming, transitive)
    }

    fn reachable(&self, name: &str, dir: petgraph::Direction, transitive: bool) -> Vec<String> {
        let Some(&start) = self.index_of.get(name) else {
            return Vec::new();
        };
        if !transitive {
            return self
                .graph
                .neighbors_directed(start, dir)
                .map(|idx| self.graph[idx].name.clone())
                .collect();
        }
        let mut seen = HashSet::new();
        let mut stack = vec![start];
        let mut out = Vec::new();
        while let Some(current) = stack.pop() {
            for neighbor in self.graph.neighbors_directed(current, dir) {
                if seen.insert(neighbor) {
                    out.push(self.graph[neighbor].name.clone());
                    stack.push(neighbor);
                }
            }
        }
        out
    }

    /// Kahn's-algorithm topological order; `Err` with the cyclic node set if
    /// the graph has a cycle.
    pub fn topological_order(&self) -> Result<Vec<String>, Vec<String>> {
        match toposort(&self.graph, None) {
            Ok(order) => Ok(order.into_iter().map(|idx| self.graph[idx].name.clone()).collect()),
            Err(_) => {
                let cyclic = self
                    .cycles()
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>();
                Err(cyclic)
            }
        }
    }

    /// True if the graph currently contains a cycle.
    pub fn has_cycle(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Strongly connected components with more than one member, via Tarjan's algorithm.
    pub fn cycles(&self) -> Vec<Vec<String>> {
        tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| scc.len() > 1)
            .map(|scc| scc.into_iter().map(|idx| self.graph[idx].name.clone()).collect())
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata_index::model::LinkTargetKind;

    fn edge(line: usize) -> DependencyEdge {
        DependencyEdge {
            kind: LinkTargetKind::Markdown,
            source_line: line,
        }
    }

    #[test]
    fn forward_and_reverse_indices_stay_consistent() {
        let mut g = DependencyGraph::new();
        g.add_edge("a", "b", edge(1));
        assert_eq!(g.dependencies("a", false), vec!["b".to_string()]);
        assert_eq!(g.dependents("b", false), vec!["a".to_string()]);
    }

    #[test]
    fn transitive_dependencies_follow_chains() {
        let mut g = DependencyGraph::new();
        g.add_edge("x", "y", edge(1));
        g.add_edge("y", "z", edge(1));
        let mut deps = g.dependencies("x", true);
        deps.sort();
        assert_eq!(deps, vec!["y".to_string(), "z".to_string()]);
    }

    #[test]
    fn detects_cycles_via_tarjan() {
        let mut g = DependencyGraph::new();
        g.add_edge("a", "b", edge(1));
        g.add_edge("b", "a", edge(1));
        assert!(g.has_cycle());
        assert_eq!(g.cycles().len(), 1);
        assert!(g.topological_order().is_err());
    }

    #[test]
    fn acyclic_graph_has_well_defined_topo_order() {
        let mut g = DependencyGraph::new();
        g.add_edge("a", "b", edge(1));
        g.add_edge("b", "c", edge(1));
        let order = g.topological_order().unwrap();
        let pos = |n: &str| order.iter().position(|x| x == n).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("b") < pos("c"));
    }

    #[test]
    fn remove_edges_from_clears_only_outgoing() {
        let mut g = DependencyGraph::new();
        g.add_edge("a", "b", edge(1));
        g.add_edge("c", "a", edge(1));
        g.remove_edges_from("a");
        assert!(g.dependencies("a", false).is_empty());
        assert_eq!(g.dependents("a", false), vec!["c".to_string()]);
    }
}
