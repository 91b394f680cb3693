//! Assembles the heterogeneous graph from NER output and passage adjacency.
//!
//! Grounded on `original_source/src/LinearRAG.py`'s `add_entity_to_passage_edges`
//! and `add_adjacent_passage_edges`, rearchitected per SPEC_FULL.md Design Notes:
//! edges are built into a staging map keyed by unordered pair and flushed into
//! an immutable `petgraph` graph once, rather than mutated incrementally.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::graph::HeteroGraph;
use crate::models::{hash_for, Entity, Namespace};

static PASSAGE_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+):").unwrap());

pub struct GraphBuilder;

impl GraphBuilder {
    /// Builds the graph from the corpus's passages and NER-derived entity sets.
    ///
    /// `passages` is `(hash_id, text)` in insertion order; `passage_entities`
    /// maps passage hash to its (already-filtered) raw entity mentions.
    pub fn build(
        passages: &[(String, String)],
        passage_entities: &HashMap<String, HashSet<String>>,
    ) -> HeteroGraph {
        // Staging structure: unordered (a, b) -> weight, a < b lexicographically.
        let mut staging: HashMap<(String, String), f32> = HashMap::new();
        let mut node_names: HashSet<String> = HashSet::new();

        for (passage_hash, passage_text) in passages {
            node_names.insert(passage_hash.clone());
            let Some(entities) = passage_entities.get(passage_hash) else {
                continue;
            };
            if entities.is_empty() {
                continue;
            }

            let lowered_passage = passage_text.to_lowercase();
            let mut counts: Vec<(String, usize)> = Vec::new();
            for raw_entity in entities {
                let canon = Entity::canonicalize(raw_entity);
                if canon.is_empty() {
                    continue;
                }
                let count = lowered_passage.matches(canon.as_str()).count();
                if count > 0 {
                    counts.push((canon, count));
                }
            }

            let total: usize = counts.iter().map(|(_, c)| c).sum();
            if total == 0 {
                continue;
            }

            for (canon, count) in counts {
                let entity_hash = hash_for(Namespace::Entity, &canon);
                node_names.insert(entity_hash.clone());
                let weight = count as f32 / total as f32;
                insert_staged_edge(&mut staging, passage_hash, &entity_hash, weight);
            }
        }

        // Passage <-> passage sequential adjacency, by literal integer+1.
        let mut by_index: HashMap<u64, &String> = HashMap::new();
        for (hash, text) in passages {
            if let Some(caps) = PASSAGE_PREFIX.captures(text) {
                if let Ok(n) = caps[1].parse::<u64>() {
                    by_index.insert(n, hash);
                }
            }
        }
        let mut sorted_indices: Vec<u64> = by_index.keys().copied().collect();
        sorted_indices.sort_unstable();
        for n in sorted_indices {
            if let (Some(&a), Some(&b)) = (by_index.get(&n), by_index.get(&(n + 1))) {
                insert_staged_edge(&mut staging, a, b, 1.0);
            }
        }

        flush(node_names, staging)
    }
}

fn insert_staged_edge(
    staging: &mut HashMap<(String, String), f32>,
    a: &str,
    b: &str,
    weight: f32,
) {
    if a == b {
        // No self-loops, per invariant 4.
        return;
    }
    let key = if a < b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    };
    staging.insert(key, weight);
}

fn flush(node_names: HashSet<String>, staging: HashMap<(String, String), f32>) -> HeteroGraph {
    let mut graph = HeteroGraph::empty();
    let mut names: Vec<String> = node_names.into_iter().collect();
    names.sort();
    for name in names {
        let idx = graph.graph.add_node(name.clone());
        graph.node_index.insert(name, idx);
    }

    let mut edges: Vec<((String, String), f32)> = staging.into_iter().collect();
    edges.sort_by(|a, b| a.0.cmp(&b.0));
    for ((a, b), weight) in edges {
        if let (Some(&ai), Some(&bi)) = (graph.node_index.get(&a), graph.node_index.get(&b)) {
            graph.graph.add_edge(ai, bi, weight);
        }
    }

    graph.passage_nodes = graph
        .node_index
        .iter()
        .filter(|(name, _)| name.starts_with("passage-"))
        .map(|(_, &idx)| idx)
        .collect();

    graph
}
