//! The hybrid retriever: wires seed selection, activation, PPR, and
//! hypergraph re-ranking into a single `retrieve()` call (SPEC_FULL.md §4.9).

use std::collections::HashMap;

use crate::config::RetrievalConfig;
use crate::embedding::{EmbeddingGenerator, ResilientEmbeddings};
use crate::embedding_store::EmbeddingStores;
use crate::error::{LinearRagError, Result};
use crate::graph::ppr::PersonalizedPageRank;
use crate::graph::HeteroGraph;
use crate::hypergraph::{HyperedgeEmbeddings, HypergraphStore};
use crate::models::{hash_for, Embedding, Namespace};
use crate::ner::{NerAdapter, NerResult};
use crate::retrieval::activation::{ActivationConfig, ActivationEngine};
use crate::retrieval::scorer::{PassageScorer, PassageView, ScorerConfig};
use crate::retrieval::seed::{Seed, SeedSelector};

const FACTS_PREAMBLE_MAX_EDGES: usize = 5;
const FACTS_TRUNCATE_CHARS: usize = 200;
/// Flat score assigned to a hyperedge pulled in only via seed-entity
/// expansion (i.e. it never cleared the cosine/confidence threshold itself).
const SEED_EXPANSION_FALLBACK_SCORE: f32 = 0.5;

#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub question: String,
    pub sorted_passages: Vec<String>,
    pub sorted_scores: Vec<f32>,
    pub has_entities: bool,
    pub has_hyperedge_context: bool,
}

pub struct HybridRetriever;

impl HybridRetriever {
    #[allow(clippy::too_many_arguments)]
    pub async fn retrieve<G: EmbeddingGenerator>(
        question: &str,
        config: &RetrievalConfig,
        stores: &EmbeddingStores,
        ner: &NerResult,
        graph: &HeteroGraph,
        hypergraph: &HypergraphStore,
        hyperedge_embeddings: &HyperedgeEmbeddings,
        generator: &ResilientEmbeddings<G>,
        ner_adapter: &dyn NerAdapter,
    ) -> Result<RetrievalResult> {
        if stores.passage.is_empty() {
            return Err(LinearRagError::NoPassagesLoaded);
        }

        let mut question_vector = generator
            .encode_batch_with_oom_fallback(&[question.to_string()])
            .await
            .map_err(|e| LinearRagError::EmbeddingFailed(e.to_string()))?
            .into_iter()
            .next()
            .unwrap_or_else(|| Embedding::new(vec![]));
        question_vector.normalize();

        let question_entities: Vec<String> = ner_adapter
            .question_ner(question)
            .await
            .unwrap_or_default()
            .into_iter()
            .collect();

        let seeds = SeedSelector::select(&question_entities, &stores.entity, generator).await;
        let has_entities = !seeds.is_empty();

        let ranked = if has_entities {
            Self::seeded_ranking(
                &seeds,
                config,
                stores,
                ner,
                graph,
                &question_vector,
            )
        } else {
            Self::dense_only_ranking(stores, &question_vector)
        };

        let (ranked, has_hyperedge_context, preamble) = if config.use_hypergraph {
            Self::apply_hypergraph_boost(
                ranked,
                &question_vector,
                config,
                stores,
                hypergraph,
                hyperedge_embeddings,
                &seeds,
            )
        } else {
            (ranked, false, None)
        };

        let top_n = config.retrieval_top_k.min(ranked.len());
        let mut sorted_passages: Vec<String> = Vec::with_capacity(top_n);
        let mut sorted_scores: Vec<f32> = Vec::with_capacity(top_n);
        for (passage_hash, score) in ranked.into_iter().take(top_n) {
            let text = stores
                .passage
                .text_for_hash(&passage_hash)
                .unwrap_or("")
                .to_string();
            sorted_passages.push(text);
            sorted_scores.push(score);
        }

        if let Some(preamble) = preamble {
            if let Some(first) = sorted_passages.first_mut() {
                *first = format!("{preamble}\n\n{first}");
            }
        }

        Ok(RetrievalResult {
            question: question.to_string(),
            sorted_passages,
            sorted_scores,
            has_entities,
            has_hyperedge_context,
        })
    }

    fn seeded_ranking(
        seeds: &[crate::retrieval::seed::Seed],
        config: &RetrievalConfig,
        stores: &EmbeddingStores,
        ner: &NerResult,
        graph: &HeteroGraph,
        question_vector: &Embedding,
    ) -> Vec<(String, f32)> {
        let activation_seeds: Vec<(String, f32)> = seeds
            .iter()
            .map(|s| (s.entity_text.clone(), s.similarity))
            .collect();

        let activation = ActivationEngine::run(
            &activation_seeds,
            ner,
            &stores.sentence,
            question_vector,
            &ActivationConfig {
                max_iterations: config.max_iterations,
                iteration_threshold: config.iteration_threshold,
                top_k_sentence: config.top_k_sentence,
            },
        );

        let candidates: Vec<PassageView> = stores
            .passage
            .rows()
            .iter()
            .map(|row| PassageView {
                hash_id: &row.hash_id,
                text: &row.text,
                dense_score: row.embedding.cosine(question_vector),
            })
            .collect();
        let scorer_config = ScorerConfig {
            candidate_pool_size: config.candidate_pool_size,
            use_candidate_filtering: config.use_candidate_filtering,
            passage_ratio: config.passage_ratio,
            passage_node_weight: config.passage_node_weight,
        };
        let candidates = PassageScorer::candidates(candidates, &scorer_config);
        let passage_weights = PassageScorer::score(&candidates, &activation, &scorer_config);

        let mut reset: HashMap<String, f32> = activation.to_hashed_weights();
        reset.extend(passage_weights);

        let ppr = PersonalizedPageRank::new(config.damping);
        let scores = ppr.run_for_passages(graph, &reset);

        let mut ranked: Vec<(String, f32)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    }

    fn dense_only_ranking(
        stores: &EmbeddingStores,
        question_vector: &Embedding,
    ) -> Vec<(String, f32)> {
        let mut ranked: Vec<(String, f32)> = stores
            .passage
            .rows()
            .iter()
            .map(|row| (row.hash_id.clone(), row.embedding.cosine(question_vector)))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_hypergraph_boost(
        ranked: Vec<(String, f32)>,
        question_vector: &Embedding,
        config: &RetrievalConfig,
        stores: &EmbeddingStores,
        hypergraph: &HypergraphStore,
        hyperedge_embeddings: &HyperedgeEmbeddings,
        seeds: &[Seed],
    ) -> (Vec<(String, f32)>, bool, Option<String>) {
        if hypergraph.is_empty() {
            return (ranked, false, None);
        }

        let mut scored_edges: Vec<(&str, f32)> = hypergraph
            .all()
            .filter_map(|edge| {
                hyperedge_embeddings
                    .get(&edge.hash_id)
                    .map(|emb| (edge.hash_id.as_str(), emb.cosine(question_vector) * edge.score))
            })
            .filter(|(_, score)| *score >= config.hyperedge_retrieval_threshold)
            .collect();
        scored_edges.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored_edges.truncate(config.hyperedge_top_k);

        // Bidirectional expansion: every seed entity's *other* hyperedges join the
        // facts preamble at a flat fallback score, even when they never clear the
        // cosine/confidence threshold above. They feed the preamble text only —
        // never the expanded entity set used for passage-score boosting below.
        let top_ids: std::collections::HashSet<&str> =
            scored_edges.iter().map(|(id, _)| *id).collect();
        let mut seen_expanded: std::collections::HashSet<&str> = std::collections::HashSet::new();
        let mut expanded_edges: Vec<(&str, f32)> = Vec::new();
        for seed in seeds {
            let entity_hash = hash_for(Namespace::Entity, &seed.entity_text);
            for edge in hypergraph.hyperedges_for_entity(&entity_hash) {
                let id = edge.hash_id.as_str();
                if top_ids.contains(id) || !seen_expanded.insert(id) {
                    continue;
                }
                expanded_edges.push((id, SEED_EXPANSION_FALLBACK_SCORE));
            }
        }

        if scored_edges.is_empty() && expanded_edges.is_empty() {
            return (ranked, false, None);
        }

        let mut expanded_entities: std::collections::HashSet<String> =
            std::collections::HashSet::new();
        for (hash_id, _) in &scored_edges {
            if let Some(edge) = hypergraph.hyperedges.get(*hash_id) {
                expanded_entities.extend(edge.entities.iter().cloned());
            }
        }

        let boosted: Vec<(String, f32)> = ranked
            .into_iter()
            .map(|(passage_hash, score)| {
                let text = stores.passage.text_for_hash(&passage_hash).unwrap_or("");
                let lowered = text.to_lowercase();
                let matches = expanded_entities
                    .iter()
                    .filter(|e| lowered.contains(e.as_str()))
                    .count()
                    .min(3);
                let boosted_score = score
                    * (1.0 + (config.hyperedge_entity_boost - 1.0) * matches as f32 / 3.0);
                (passage_hash, boosted_score)
            })
            .collect();

        let mut boosted = boosted;
        boosted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let preamble_edges: Vec<&str> = scored_edges
            .iter()
            .chain(expanded_edges.iter())
            .take(FACTS_PREAMBLE_MAX_EDGES)
            .filter_map(|(hash_id, _)| hypergraph.hyperedges.get(*hash_id).map(|e| e.text.as_str()))
            .collect();
        let preamble = if preamble_edges.is_empty() {
            None
        } else {
            let facts = preamble_edges
                .iter()
                .map(|t| truncate(t, FACTS_TRUNCATE_CHARS))
                .collect::<Vec<_>>()
                .join("\n- ");
            Some(format!("[Medical Knowledge Facts]\n- {facts}"))
        };

        (boosted, true, preamble)
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        s.chars().take(max_chars).collect()
    }
}
