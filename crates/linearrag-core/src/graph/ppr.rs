//! Personalized PageRank over the heterogeneous graph, by power iteration.
//!
//! Grounded on `original_source/src/LinearRAG.py`'s use of
//! `networkx.pagerank(personalization=...)`, reimplemented as a hand-rolled
//! weighted power iteration in the style of
//! `other_examples/62165eae_oneiron-dev-oneiron-helix...ppr.rs.rs`: an explicit
//! reset vector, damping factor, and a fixed iteration budget with an early-exit
//! on convergence.

use std::collections::HashMap;

use petgraph::graph::NodeIndex;

use crate::graph::HeteroGraph;

const DEFAULT_MAX_ITERATIONS: usize = 50;
const CONVERGENCE_EPSILON: f32 = 1e-6;

pub struct PersonalizedPageRank {
    pub damping: f32,
}

impl PersonalizedPageRank {
    pub fn new(damping: f32) -> Self {
        Self { damping }
    }

    /// Runs PPR with `reset` as the (unnormalized) personalization vector,
    /// keyed by node name. Entries that are NaN or negative are clamped to
    /// zero before normalization. Nodes absent from `reset` start at zero.
    ///
    /// Returns scores for every node in the graph, keyed by node name.
    pub fn run(&self, graph: &HeteroGraph, reset: &HashMap<String, f32>) -> HashMap<String, f32> {
        let n = graph.node_count();
        if n == 0 {
            return HashMap::new();
        }

        let mut reset_vec = vec![0.0f32; n];
        for (name, &value) in reset {
            if let Some(idx) = graph.index_of(name) {
                let sanitized = if value.is_nan() || value < 0.0 {
                    0.0
                } else {
                    value
                };
                reset_vec[idx.index()] = sanitized;
            }
        }
        let reset_sum: f32 = reset_vec.iter().sum();
        if reset_sum > 0.0 {
            for v in reset_vec.iter_mut() {
                *v /= reset_sum;
            }
        } else {
            // No seeded mass: PPR over an unseeded graph contributes nothing.
            let zero: HashMap<String, f32> = graph
                .all_node_names()
                .map(|name| (name.to_string(), 0.0))
                .collect();
            return zero;
        }

        let degree: Vec<f32> = (0..n)
            .map(|i| {
                graph
                    .neighbors_weighted(NodeIndex::new(i))
                    .iter()
                    .map(|(_, w)| w)
                    .sum()
            })
            .collect();

        let mut scores = reset_vec.clone();
        for _ in 0..DEFAULT_MAX_ITERATIONS {
            let mut next = vec![0.0f32; n];
            for i in 0..n {
                if scores[i] == 0.0 {
                    continue;
                }
                let deg = degree[i];
                if deg <= 0.0 {
                    continue;
                }
                for (neighbor, weight) in graph.neighbors_weighted(NodeIndex::new(i)) {
                    next[neighbor.index()] += self.damping * scores[i] * (weight / deg);
                }
            }
            for i in 0..n {
                next[i] += (1.0 - self.damping) * reset_vec[i];
            }

            let delta: f32 = next
                .iter()
                .zip(scores.iter())
                .map(|(a, b)| (a - b).abs())
                .sum();
            scores = next;
            if delta < CONVERGENCE_EPSILON {
                break;
            }
        }

        graph
            .all_node_names()
            .enumerate()
            .map(|(i, name)| (name.to_string(), scores[i]))
            .collect()
    }

    /// Convenience wrapper that extracts scores at passage vertices only,
    /// as `retrieve()` needs (spec.md §4.8).
    pub fn run_for_passages(
        &self,
        graph: &HeteroGraph,
        reset: &HashMap<String, f32>,
    ) -> HashMap<String, f32> {
        let all = self.run(graph, reset);
        graph
            .passage_indices()
            .iter()
            .filter_map(|&idx| {
                let name = graph.name_of(idx).to_string();
                all.get(&name).map(|&score| (name, score))
            })
            .collect()
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::graph::builder::GraphBuilder;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn sample_graph() -> HeteroGraph {
        let passages = vec![
            ("passage-a".to_string(), "0: aspirin treats headache".to_string()),
            ("passage-b".to_string(), "1: ibuprofen treats pain".to_string()),
        ];
        let mut entities = HashMap::new();
        entities.insert("passage-a".to_string(), HashSet::from(["aspirin".to_string()]));
        entities.insert("passage-b".to_string(), HashSet::from(["ibuprofen".to_string()]));
        GraphBuilder::build(&passages, &entities)
    }

    proptest! {
        /// An empty (or entirely absent) reset vector contributes no mass at
        /// any damping factor: there is nothing to teleport back to.
        #[test]
        fn prop_empty_reset_yields_all_zero(damping in 0.05f32..0.95) {
            let graph = sample_graph();
            let ppr = PersonalizedPageRank::new(damping);
            let scores = ppr.run(&graph, &HashMap::new());
            prop_assert!(scores.values().all(|&v| v == 0.0));
        }

        /// A single positive seed never produces NaN/negative scores and the
        /// seed node itself ends up with at least as much mass as any other
        /// node, for any seed weight or damping factor.
        #[test]
        fn prop_single_seed_dominates_and_stays_finite(
            seed_weight in 0.01f32..50.0,
            damping in 0.05f32..0.95,
        ) {
            let graph = sample_graph();
            let ppr = PersonalizedPageRank::new(damping);
            let entity_hash = crate::models::hash_for(crate::models::Namespace::Entity, "aspirin");
            let mut reset = HashMap::new();
            reset.insert(entity_hash.clone(), seed_weight);

            let scores = ppr.run(&graph, &reset);
            let seed_score = scores[&entity_hash];
            prop_assert!(seed_score.is_finite());
            for (name, &score) in &scores {
                prop_assert!(score.is_finite());
                prop_assert!(score >= 0.0);
                if name != &entity_hash {
                    prop_assert!(seed_score >= score);
                }
            }
        }
    }
}
