//! The combined cross-pipeline execution graph.
//!
//! Nodes are addressed by IRI and carry a [`NodeKind`]; edges carry the
//! dependency relation that produced them. [`normalize`] collapses variables
//! that refer to the same dataset; [`builder`] assembles the graph from
//! Turtle plan descriptions.

pub mod builder;
pub mod dot;
pub mod normalize;

use std::collections::HashMap;
use std::fmt;

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::error::GraphError;

/// Kind of a graph node, as extracted by the semantic queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Step,
    Variable,
    Plugin,
    Dataset,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Step => "Step",
            Self::Variable => "Variable",
            Self::Plugin => "Plugin",
            Self::Dataset => "Dataset",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Labelled dependency relation between two nodes.
///
/// Directions are dependency-ordered: `Input` runs Variable → Step, `Output`
/// runs Step → Variable, `Uses` runs Step → Plugin, `Precedes` runs earlier
/// Step → later Step, and `InstanceOf` runs Variable → Dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeLabel {
    Input,
    Output,
    Uses,
    Precedes,
    InstanceOf,
}

impl fmt::Display for EdgeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Input => "input",
            Self::Output => "output",
            Self::Uses => "uses",
            Self::Precedes => "precedes",
            Self::InstanceOf => "is_instance_of",
        };
        f.write_str(s)
    }
}

/// Payload of one graph node.
#[derive(Debug, Clone)]
pub struct NodeData {
    pub iri: String,
    pub label: String,
    pub kind: NodeKind,
    /// Distribution endpoints (Dataset/Plugin only); first-seen order,
    /// deduplicated.
    pub access_urls: Vec<String>,
}

/// Directed multigraph over IRIs with stable node ids.
///
/// `StableDiGraph` keeps indices valid across removals, which normalization
/// relies on: a trial merge on a clone can be replayed on the original with
/// the same indices.
#[derive(Debug, Clone, Default)]
pub struct WorkflowGraph {
    graph: StableDiGraph<NodeData, EdgeLabel>,
    by_iri: HashMap<String, NodeIndex>,
}

impl WorkflowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node unless the IRI is already present. Re-observation never
    /// overwrites label or kind; new access URLs are appended.
    pub fn add_node(&mut self, data: NodeData) -> NodeIndex {
        if let Some(&idx) = self.by_iri.get(&data.iri) {
            let urls = data.access_urls;
            self.extend_access_urls(idx, urls);
            return idx;
        }
        let iri = data.iri.clone();
        let idx = self.graph.add_node(data);
        self.by_iri.insert(iri, idx);
        idx
    }

    /// Append access URLs not yet recorded for the node.
    pub fn extend_access_urls(&mut self, idx: NodeIndex, urls: Vec<String>) {
        let node = &mut self.graph[idx];
        for url in urls {
            if !node.access_urls.contains(&url) {
                node.access_urls.push(url);
            }
        }
    }

    /// Insert an edge between two known IRIs. Duplicate (source, target,
    /// label) triples and edges to unextracted nodes are dropped.
    pub fn add_edge(&mut self, source_iri: &str, target_iri: &str, label: EdgeLabel) -> bool {
        let (Some(&src), Some(&dst)) = (self.by_iri.get(source_iri), self.by_iri.get(target_iri))
        else {
            return false;
        };
        if self.has_edge(src, dst, label) {
            return false;
        }
        self.graph.add_edge(src, dst, label);
        true
    }

    pub fn has_edge(&self, src: NodeIndex, dst: NodeIndex, label: EdgeLabel) -> bool {
        self.graph
            .edges_connecting(src, dst)
            .any(|e| *e.weight() == label)
    }

    pub fn node(&self, idx: NodeIndex) -> &NodeData {
        &self.graph[idx]
    }

    pub fn index_of(&self, iri: &str) -> Option<NodeIndex> {
        self.by_iri.get(iri).copied()
    }

    pub fn contains(&self, iri: &str) -> bool {
        self.by_iri.contains_key(iri)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// All nodes, in ascending IRI order for deterministic walks.
    pub fn nodes_sorted(&self) -> Vec<NodeIndex> {
        let mut indices: Vec<_> = self.graph.node_indices().collect();
        indices.sort_by(|a, b| self.graph[*a].iri.cmp(&self.graph[*b].iri));
        indices
    }

    /// Neighbors reached by incoming edges with the given label, IRI-sorted.
    pub fn incoming(&self, idx: NodeIndex, label: EdgeLabel) -> Vec<NodeIndex> {
        let mut found: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .filter(|e| *e.weight() == label)
            .map(|e| e.source())
            .collect();
        found.sort_by(|a, b| self.graph[*a].iri.cmp(&self.graph[*b].iri));
        found.dedup();
        found
    }

    /// Neighbors reached by outgoing edges with the given label, IRI-sorted.
    pub fn outgoing(&self, idx: NodeIndex, label: EdgeLabel) -> Vec<NodeIndex> {
        let mut found: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .filter(|e| *e.weight() == label)
            .map(|e| e.target())
            .collect();
        found.sort_by(|a, b| self.graph[*a].iri.cmp(&self.graph[*b].iri));
        found.dedup();
        found
    }

    pub fn out_degree(&self, idx: NodeIndex) -> usize {
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .count()
    }

    /// Steps that produce the given variable via an `output` edge.
    pub fn producing_steps(&self, var: NodeIndex) -> Vec<NodeIndex> {
        self.incoming(var, EdgeLabel::Output)
            .into_iter()
            .filter(|&s| self.graph[s].kind == NodeKind::Step)
            .collect()
    }

    /// Topological order over all nodes; edge direction is the dependency
    /// direction, so predecessors come first.
    pub fn topo_order(&self) -> Result<Vec<NodeIndex>, GraphError> {
        petgraph::algo::toposort(&self.graph, None)
            .map_err(|cycle| GraphError::Cycle(self.graph[cycle.node_id()].iri.clone()))
    }

    /// Move every edge incident to `from` onto `into`, then delete `from`.
    /// Self-loops and duplicate edges are dropped in the process.
    pub fn merge_node_into(&mut self, from: NodeIndex, into: NodeIndex) {
        if from == into {
            return;
        }
        let incoming: Vec<_> = self
            .graph
            .edges_directed(from, Direction::Incoming)
            .map(|e| (e.source(), *e.weight()))
            .collect();
        let outgoing: Vec<_> = self
            .graph
            .edges_directed(from, Direction::Outgoing)
            .map(|e| (e.target(), *e.weight()))
            .collect();

        let iri = self.graph[from].iri.clone();
        self.graph.remove_node(from);
        self.by_iri.remove(&iri);

        for (src, label) in incoming {
            if src != into && !self.has_edge(src, into, label) {
                self.graph.add_edge(src, into, label);
            }
        }
        for (dst, label) in outgoing {
            if dst != into && !self.has_edge(into, dst, label) {
                self.graph.add_edge(into, dst, label);
            }
        }
    }

    /// Delete a node and all incident edges.
    pub fn remove_node(&mut self, idx: NodeIndex) {
        let iri = self.graph[idx].iri.clone();
        self.graph.remove_node(idx);
        self.by_iri.remove(&iri);
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::node;
    use super::*;

    #[test]
    fn re_observation_does_not_overwrite() {
        let mut g = WorkflowGraph::new();
        let idx = g.add_node(node("urn:v1", "First", NodeKind::Variable));
        let again = g.add_node(node("urn:v1", "Second", NodeKind::Dataset));

        assert_eq!(idx, again);
        assert_eq!(g.node(idx).label, "First");
        assert_eq!(g.node(idx).kind, NodeKind::Variable);
    }

    #[test]
    fn re_observation_accumulates_urls() {
        let mut g = WorkflowGraph::new();
        let idx = g.add_node(test_support::node_with_urls(
            "urn:d",
            "D",
            NodeKind::Dataset,
            &["http://repo/a"],
        ));
        g.add_node(test_support::node_with_urls(
            "urn:d",
            "D",
            NodeKind::Dataset,
            &["http://repo/a", "http://repo/b"],
        ));

        assert_eq!(
            g.node(idx).access_urls,
            vec!["http://repo/a".to_string(), "http://repo/b".to_string()]
        );
    }

    #[test]
    fn duplicate_edges_are_dropped() {
        let mut g = WorkflowGraph::new();
        g.add_node(node("urn:v", "V", NodeKind::Variable));
        g.add_node(node("urn:s", "S", NodeKind::Step));

        assert!(g.add_edge("urn:v", "urn:s", EdgeLabel::Input));
        assert!(!g.add_edge("urn:v", "urn:s", EdgeLabel::Input));
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn edges_to_unknown_nodes_are_dropped() {
        let mut g = WorkflowGraph::new();
        g.add_node(node("urn:v", "V", NodeKind::Variable));
        assert!(!g.add_edge("urn:v", "urn:ghost", EdgeLabel::Input));
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn merge_moves_edges_and_deletes() {
        let mut g = WorkflowGraph::new();
        let v1 = g.add_node(node("urn:v1", "V1", NodeKind::Variable));
        g.add_node(node("urn:v2", "V2", NodeKind::Variable));
        g.add_node(node("urn:s1", "S1", NodeKind::Step));
        g.add_node(node("urn:s2", "S2", NodeKind::Step));
        g.add_edge("urn:s1", "urn:v1", EdgeLabel::Output);
        g.add_edge("urn:v2", "urn:s2", EdgeLabel::Input);

        let v2 = g.index_of("urn:v2").unwrap();
        g.merge_node_into(v2, v1);

        assert!(!g.contains("urn:v2"));
        let s2 = g.index_of("urn:s2").unwrap();
        assert_eq!(g.incoming(s2, EdgeLabel::Input), vec![v1]);
        assert_eq!(g.producing_steps(v1), vec![g.index_of("urn:s1").unwrap()]);
    }

    #[test]
    fn topo_order_detects_cycles() {
        let mut g = WorkflowGraph::new();
        g.add_node(node("urn:a", "A", NodeKind::Step));
        g.add_node(node("urn:b", "B", NodeKind::Step));
        g.add_edge("urn:a", "urn:b", EdgeLabel::Precedes);
        g.add_edge("urn:b", "urn:a", EdgeLabel::Precedes);

        assert!(matches!(g.topo_order(), Err(GraphError::Cycle(_))));
    }

    #[test]
    fn topo_order_respects_dependencies() {
        let mut g = WorkflowGraph::new();
        g.add_node(node("urn:v", "V", NodeKind::Variable));
        g.add_node(node("urn:s", "S", NodeKind::Step));
        g.add_node(node("urn:out", "Out", NodeKind::Variable));
        g.add_edge("urn:v", "urn:s", EdgeLabel::Input);
        g.add_edge("urn:s", "urn:out", EdgeLabel::Output);

        let order = g.topo_order().unwrap();
        let pos = |iri: &str| {
            order
                .iter()
                .position(|&i| g.node(i).iri == iri)
                .unwrap()
        };
        assert!(pos("urn:v") < pos("urn:s"));
        assert!(pos("urn:s") < pos("urn:out"));
    }
}
