//! Tiered spreading-activation engine (SPEC_FULL.md §4.6).
//!
//! Grounded on `original_source/src/LinearRAG.py`'s activation spreading pass,
//! reimplemented as explicit frontier bookkeeping instead of recursion so the
//! iteration bound and the used-sentence set are easy to reason about.
//!
//! Entities are keyed by their canonicalized (lowercased) text rather than
//! their store hash throughout this module, since the scorer needs the text
//! to count occurrences in passages. Callers convert to the graph's hash
//! namespace only when building the PPR reset vector.

use std::collections::{HashMap, HashSet};

use crate::embedding_store::EmbeddingStore;
use crate::models::{hash_for, Embedding, Entity, Namespace};
use crate::ner::NerResult;

const DISTANCE_DECAY: f32 = 0.7;
const SENTENCE_NOISE_FLOOR: f32 = 0.25;

pub struct ActivationConfig {
    pub max_iterations: usize,
    pub iteration_threshold: f32,
    pub top_k_sentence: usize,
}

/// Output of a spreading-activation run: additive per-entity reset weights
/// and the tier at which each entity was first reached (seeds are tier 1),
/// both keyed by canonicalized entity text.
#[derive(Debug, Default)]
pub struct ActivationResult {
    pub entity_weights: HashMap<String, f32>,
    pub entity_tier: HashMap<String, u32>,
}

impl ActivationResult {
    pub fn activated_entities(&self) -> impl Iterator<Item = &String> {
        self.entity_weights.keys()
    }

    /// Reset-vector contribution keyed by the graph's entity hash namespace.
    pub fn to_hashed_weights(&self) -> HashMap<String, f32> {
        self.entity_weights
            .iter()
            .map(|(text, &score)| (hash_for(Namespace::Entity, text), score))
            .collect()
    }
}

pub struct ActivationEngine;

impl ActivationEngine {
    /// `seeds` are (canonical entity text, similarity). `ner` supplies the
    /// sentence→entities map used to spread activation.
    pub fn run(
        seeds: &[(String, f32)],
        ner: &NerResult,
        sentence_store: &EmbeddingStore,
        question_vector: &Embedding,
        config: &ActivationConfig,
    ) -> ActivationResult {
        let mut result = ActivationResult::default();
        if seeds.is_empty() {
            return result;
        }

        let entity_to_sentences = build_entity_to_sentences(ner);

        let mut frontier: HashMap<String, (f32, u32)> = HashMap::new();
        for (text, score) in seeds {
            let canon = Entity::canonicalize(text);
            frontier.insert(canon.clone(), (*score, 1));
            result.entity_tier.insert(canon.clone(), 1);
            *result.entity_weights.entry(canon).or_insert(0.0) += *score;
        }

        let mut used_sentences: HashSet<String> = HashSet::new();

        // The original's `while iteration < max_iterations` starts counting at
        // 1 (seeds already occupy tier 1), so it re-spreads exactly
        // `max_iterations - 1` times, not `max_iterations`.
        for _ in 0..config.max_iterations.saturating_sub(1) {
            let mut next_frontier: HashMap<String, (f32, u32)> = HashMap::new();

            for (entity_text, (score, tier)) in frontier.iter() {
                if *score < config.iteration_threshold {
                    continue;
                }
                let Some(sentences) = entity_to_sentences.get(entity_text) else {
                    continue;
                };

                let mut ranked: Vec<(String, f32)> = sentences
                    .iter()
                    .filter(|s| !used_sentences.contains(*s))
                    .filter_map(|s| {
                        sentence_store
                            .embedding_for_hash(&hash_for(Namespace::Sentence, s))
                            .map(|emb| (s.clone(), emb.cosine(question_vector)))
                    })
                    .collect();
                ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
                ranked.truncate(config.top_k_sentence);

                for (sentence, sigma) in ranked {
                    if sigma < SENTENCE_NOISE_FLOOR {
                        continue;
                    }
                    used_sentences.insert(sentence.clone());

                    let Some(entities_in_sentence) = ner.sentence_to_entities.get(&sentence)
                    else {
                        continue;
                    };

                    let decay = if *tier > 1 { DISTANCE_DECAY } else { 1.0 };
                    let propagated = score * sigma * decay;
                    if propagated < config.iteration_threshold {
                        continue;
                    }

                    for mention in entities_in_sentence {
                        let canon = Entity::canonicalize(mention);
                        if canon.is_empty() {
                            continue;
                        }
                        *result.entity_weights.entry(canon.clone()).or_insert(0.0) += propagated;
                        let next_tier = tier + 1;
                        result
                            .entity_tier
                            .entry(canon.clone())
                            .and_modify(|t| *t = (*t).min(next_tier))
                            .or_insert(next_tier);
                        next_frontier
                            .entry(canon)
                            .and_modify(|(s, t)| {
                                if propagated > *s {
                                    *s = propagated;
                                }
                                *t = next_tier;
                            })
                            .or_insert((propagated, next_tier));
                    }
                }
            }

            if next_frontier.is_empty() {
                break;
            }
            frontier = next_frontier;
        }

        result
    }
}

fn build_entity_to_sentences(ner: &NerResult) -> HashMap<String, Vec<String>> {
    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    for (sentence, entities) in &ner.sentence_to_entities {
        for mention in entities {
            let canon = Entity::canonicalize(mention);
            if canon.is_empty() {
                continue;
            }
            map.entry(canon).or_default().push(sentence.clone());
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Namespace;

    #[test]
    fn seed_with_no_matching_sentences_only_seeds_itself() {
        let mut ner = NerResult::default();
        ner.sentence_to_entities.insert(
            "irrelevant sentence".to_string(),
            HashSet::from(["ibuprofen".to_string()]),
        );
        let dir = tempfile::tempdir().unwrap();
        let sentence_store = EmbeddingStore::open(Namespace::Sentence, dir.path().join("s.parquet"), 8);
        let question_vector = Embedding::new(vec![1.0, 0.0]);

        let seeds = vec![("aspirin".to_string(), 0.9)];
        let config = ActivationConfig {
            max_iterations: 2,
            iteration_threshold: 0.3,
            top_k_sentence: 5,
        };
        let result = ActivationEngine::run(&seeds, &ner, &sentence_store, &question_vector, &config);
        assert_eq!(result.entity_weights.len(), 1);
        assert_eq!(result.entity_weights["aspirin"], 0.9);
    }

    #[test]
    fn empty_seeds_yields_empty_result() {
        let ner = NerResult::default();
        let dir = tempfile::tempdir().unwrap();
        let sentence_store = EmbeddingStore::open(Namespace::Sentence, dir.path().join("s.parquet"), 8);
        let question_vector = Embedding::new(vec![1.0, 0.0]);
        let config = ActivationConfig {
            max_iterations: 2,
            iteration_threshold: 0.3,
            top_k_sentence: 5,
        };
        let result = ActivationEngine::run(&[], &ner, &sentence_store, &question_vector, &config);
        assert!(result.entity_weights.is_empty());
    }

    #[test]
    fn activation_spreads_to_co_mentioned_entities_above_noise_floor() {
        let mut ner = NerResult::default();
        ner.sentence_to_entities.insert(
            "aspirin and ibuprofen both reduce headache".to_string(),
            HashSet::from(["aspirin".to_string(), "ibuprofen".to_string()]),
        );
        let dir = tempfile::tempdir().unwrap();
        let mut sentence_store =
            EmbeddingStore::open(Namespace::Sentence, dir.path().join("s.parquet"), 8);
        // Manually insert a sentence embedding identical to the question vector
        // so cosine similarity is 1.0, well above the noise floor.
        let generator = crate::embedding::ResilientEmbeddings::new(
            crate::embedding::DeterministicEmbeddings::new(4),
        );
        tokio_test::block_on(sentence_store.insert_text(
            &["aspirin and ibuprofen both reduce headache".to_string()],
            &generator,
        ))
        .unwrap();
        let question_vector = sentence_store
            .embedding_for_hash(&hash_for(
                Namespace::Sentence,
                "aspirin and ibuprofen both reduce headache",
            ))
            .unwrap()
            .clone();

        let seeds = vec![("aspirin".to_string(), 0.9)];
        let config = ActivationConfig {
            max_iterations: 2,
            iteration_threshold: 0.3,
            top_k_sentence: 5,
        };
        let result = ActivationEngine::run(&seeds, &ner, &sentence_store, &question_vector, &config);
        assert!(result.entity_weights.contains_key("ibuprofen"));
    }
}
