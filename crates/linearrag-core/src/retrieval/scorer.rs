//! Candidate pre-filter and passage scorer (SPEC_FULL.md §4.7).

use std::collections::HashMap;

use crate::retrieval::activation::ActivationResult;

/// `(passage_hash, text, embedding_row_index)` view the scorer needs; the
/// caller (the hybrid retriever) owns the actual passage store.
pub struct PassageView<'a> {
    pub hash_id: &'a str,
    pub text: &'a str,
    pub dense_score: f32,
}

pub struct ScorerConfig {
    pub candidate_pool_size: usize,
    pub use_candidate_filtering: bool,
    pub passage_ratio: f32,
    pub passage_node_weight: f32,
}

pub struct PassageScorer;

impl PassageScorer {
    /// Selects the candidate set: top `candidate_pool_size` passages by dense
    /// cosine, or the full set when filtering is disabled. Returned in
    /// descending dense-score order.
    pub fn candidates<'a>(
        passages: Vec<PassageView<'a>>,
        config: &ScorerConfig,
    ) -> Vec<PassageView<'a>> {
        let mut sorted = passages;
        sorted.sort_by(|a, b| {
            b.dense_score
                .partial_cmp(&a.dense_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        if config.use_candidate_filtering {
            sorted.truncate(config.candidate_pool_size);
        }
        sorted
    }

    /// Computes `passage_weight[v(p)]` for every candidate passage. Passages
    /// never passed in (outside the candidate set) implicitly get weight 0.
    pub fn score(
        candidates: &[PassageView],
        activation: &ActivationResult,
        config: &ScorerConfig,
    ) -> HashMap<String, f32> {
        if candidates.is_empty() {
            return HashMap::new();
        }

        let min = candidates
            .iter()
            .map(|p| p.dense_score)
            .fold(f32::INFINITY, f32::min);
        let max = candidates
            .iter()
            .map(|p| p.dense_score)
            .fold(f32::NEG_INFINITY, f32::max);
        let range = (max - min).max(1e-9);

        let mut out = HashMap::with_capacity(candidates.len());
        for passage in candidates {
            let d_p = (passage.dense_score - min) / range;
            let lowered_passage = passage.text.to_lowercase();

            let mut bonus_p = 0.0f32;
            for entity_text in activation.activated_entities() {
                let score = activation.entity_weights[entity_text];
                let tier = activation.entity_tier.get(entity_text).copied().unwrap_or(1).max(1);
                let occurrences = lowered_passage.matches(entity_text.as_str()).count();
                if occurrences == 0 {
                    continue;
                }
                bonus_p += score * (1.0 + occurrences as f32).ln() / tier as f32;
            }

            let weight = config.passage_node_weight
                * (config.passage_ratio * d_p + (1.0 + bonus_p).ln());
            out.insert(passage.hash_id.to_string(), weight);
        }
        out
    }
}
