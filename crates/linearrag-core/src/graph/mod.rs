//! The heterogeneous entity/passage graph: construction, GraphML persistence,
//! and Personalized PageRank.

pub mod builder;
pub mod graphml;
pub mod ppr;

use std::collections::HashMap;

use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;

/// An undirected, weighted graph whose nodes are the union of entity and
/// passage hashes (spec.md §4.3: sentences live only in adjacency maps).
pub struct HeteroGraph {
    pub(crate) graph: UnGraph<String, f32>,
    pub(crate) node_index: HashMap<String, NodeIndex>,
    pub(crate) passage_nodes: Vec<NodeIndex>,
}

impl HeteroGraph {
    pub fn empty() -> Self {
        Self {
            graph: UnGraph::new_undirected(),
            node_index: HashMap::new(),
            passage_nodes: Vec::new(),
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn index_of(&self, node_name: &str) -> Option<NodeIndex> {
        self.node_index.get(node_name).copied()
    }

    pub fn name_of(&self, idx: NodeIndex) -> &str {
        &self.graph[idx]
    }

    pub fn passage_indices(&self) -> &[NodeIndex] {
        &self.passage_nodes
    }

    pub fn neighbors_weighted(&self, idx: NodeIndex) -> Vec<(NodeIndex, f32)> {
        self.graph
            .edges(idx)
            .map(|edge| {
                let other = if edge.source() == idx {
                    edge.target()
                } else {
                    edge.source()
                };
                (other, *edge.weight())
            })
            .collect()
    }

    pub fn edge_weight(&self, a: &str, b: &str) -> Option<f32> {
        let ai = self.index_of(a)?;
        let bi = self.index_of(b)?;
        self.graph.find_edge(ai, bi).map(|e| self.graph[e])
    }

    /// Sum of weights on edges incident to `p` whose other endpoint is an
    /// entity node (used by the testable-property: per-passage weight sum).
    pub fn passage_entity_weight_sum(&self, passage_idx: NodeIndex) -> f32 {
        self.neighbors_weighted(passage_idx)
            .into_iter()
            .map(|(_, w)| w)
            .sum()
    }

    pub fn all_node_names(&self) -> impl Iterator<Item = &str> {
        self.graph.node_weights().map(String::as_str)
    }
}
