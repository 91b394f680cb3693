//! Builds co-occurrence hyperedges from the sentence→entities map and applies
//! medical-domain score enhancement.
//!
//! Grounded on `original_source/src/hypergraph/cooccurrence_hyperedge.py`: the
//! acceptance window, the base-score formula, and both fixed pattern tables are
//! carried over verbatim (SPEC_FULL.md §4.4.1 says not to tune them).

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;

use crate::models::{Entity, Hyperedge};

pub const MIN_SENTENCE_LENGTH: usize = 20;
pub const MAX_SENTENCE_LENGTH: usize = 500;

/// `{ type-set, boost }`, first matching subset of a hyperedge's inferred
/// types wins the largest boost. Order matters only in that all matches are
/// considered and the maximum is taken, per spec.md §4.4.
static MEDICAL_RELATION_PATTERNS: Lazy<Vec<(Vec<&'static str>, f32)>> = Lazy::new(|| {
    vec![
        (vec!["SYMPTOM", "DISEASE"], 1.2),
        (vec!["SIGN", "DISEASE"], 1.2),
        (vec!["DISEASE", "CHEMICAL"], 1.3),
        (vec!["DISEASE", "DRUG"], 1.3),
        (vec!["DISEASE", "TREATMENT"], 1.3),
        (vec!["LAB", "VALUE", "DIAGNOSIS"], 1.5),
        (vec!["LAB_TEST", "DISEASE"], 1.3),
        (vec!["DIAGNOSTIC_PROCEDURE", "DISEASE"], 1.3),
        (vec!["CHEMICAL", "GENE"], 1.2),
        (vec!["DRUG", "PROTEIN"], 1.2),
        (vec!["CHEMICAL", "PATHWAY"], 1.2),
        (vec!["ANATOMY", "DISEASE"], 1.1),
        (vec!["BODY_PART", "SYMPTOM"], 1.1),
        (vec!["RISK_FACTOR", "DISEASE"], 1.2),
        (vec!["PROCEDURE", "DISEASE"], 1.2),
        (vec!["SURGICAL_PROCEDURE", "ANATOMY"], 1.2),
    ]
});

/// Substring match (lowercased entity text) → inferred type. First category
/// hit wins, in the order listed in spec.md §4.4.1.
static TYPE_INFERENCE_KEYWORDS: Lazy<Vec<(&'static str, Vec<&'static str>)>> = Lazy::new(|| {
    vec![
        (
            "SYMPTOM",
            vec![
                "pain", "ache", "fever", "fatigue", "nausea", "vomiting", "cough", "dyspnea",
                "diarrhea", "headache", "weakness",
            ],
        ),
        (
            "DISEASE",
            vec![
                "disease", "syndrome", "disorder", "cancer", "carcinoma", "infection", "itis",
                "osis", "pathy",
            ],
        ),
        (
            "CHEMICAL",
            vec![
                "drug", "medication", "therapy", "treatment", "cillin", "mycin", "zole",
                "prazole", "sartan", "olol",
            ],
        ),
        (
            "ANATOMY",
            vec![
                "kidney", "heart", "liver", "lung", "brain", "bone", "artery", "vein", "nerve",
                "muscle",
            ],
        ),
        (
            "LAB_TEST",
            vec!["level", "count", "test", "assay", "measurement"],
        ),
    ]
});

/// Infers a single type for an entity by first-hit substring match against
/// [`TYPE_INFERENCE_KEYWORDS`]. Returns `None` if no keyword matches.
fn infer_type(entity_lower: &str) -> Option<&'static str> {
    for (category, keywords) in TYPE_INFERENCE_KEYWORDS.iter() {
        if keywords.iter().any(|kw| entity_lower.contains(kw)) {
            return Some(category);
        }
    }
    None
}

/// Largest boost among patterns whose type-set is a subset of the hyperedge's
/// inferred type set. `1.0` (no boost) if nothing matches.
fn medical_boost(entity_types: &HashSet<&'static str>) -> f32 {
    MEDICAL_RELATION_PATTERNS
        .iter()
        .filter(|(pattern, _)| pattern.iter().all(|t| entity_types.contains(t)))
        .map(|(_, boost)| *boost)
        .fold(1.0_f32, f32::max)
}

pub struct CooccurrenceHyperedgeBuilder {
    pub min_entities: usize,
    pub max_entities: usize,
    pub max_boost: f32,
}

impl CooccurrenceHyperedgeBuilder {
    pub fn new(min_entities: usize, max_entities: usize, max_boost: f32) -> Self {
        Self {
            min_entities,
            max_entities,
            max_boost,
        }
    }

    /// Builds one hyperedge per accepted sentence. `sentence_to_entities`
    /// keys are raw sentence text; values are raw (not-yet-canonicalized)
    /// entity mentions found in that sentence.
    pub fn build(
        &self,
        sentence_to_entities: &HashMap<String, HashSet<String>>,
    ) -> Vec<Hyperedge> {
        let mut accepted: Vec<(String, Vec<String>)> = Vec::new();
        for (sentence, entities) in sentence_to_entities {
            if sentence.len() < MIN_SENTENCE_LENGTH || sentence.len() > MAX_SENTENCE_LENGTH {
                continue;
            }
            let canon: HashSet<String> = entities
                .iter()
                .map(|e| Entity::canonicalize(e))
                .filter(|e| !e.is_empty())
                .collect();
            if canon.len() < self.min_entities || canon.len() > self.max_entities {
                continue;
            }
            let mut list: Vec<String> = canon.into_iter().collect();
            list.sort();
            accepted.push((sentence.clone(), list));
        }

        let max_entity_count_seen = accepted
            .iter()
            .map(|(_, entities)| entities.len())
            .max()
            .unwrap_or(1)
            .max(1);

        accepted
            .into_iter()
            .map(|(sentence, entities)| {
                let base_score = entities.len() as f32 / max_entity_count_seen as f32;
                let types: HashSet<&'static str> = entities
                    .iter()
                    .filter_map(|e| infer_type(e))
                    .collect();
                let boost = medical_boost(&types);
                let score = (base_score * boost).min(self.max_boost);
                let hash_id = Hyperedge::hash_id_for(&sentence, &entities);
                Hyperedge {
                    hash_id,
                    text: sentence,
                    entities,
                    score,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entities(words: &[&str]) -> HashSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn rejects_sentences_outside_length_window() {
        let builder = CooccurrenceHyperedgeBuilder::new(2, 10, 1.5);
        let mut map = HashMap::new();
        map.insert("too short".to_string(), entities(&["aspirin", "headache"]));
        let edges = builder.build(&map);
        assert!(edges.is_empty());
    }

    #[test]
    fn rejects_sentences_with_too_few_entities() {
        let builder = CooccurrenceHyperedgeBuilder::new(2, 10, 1.5);
        let mut map = HashMap::new();
        map.insert(
            "A sentence long enough to pass the length window easily".to_string(),
            entities(&["aspirin"]),
        );
        let edges = builder.build(&map);
        assert!(edges.is_empty());
    }

    #[test]
    fn medical_pattern_boosts_symptom_disease_pair() {
        let builder = CooccurrenceHyperedgeBuilder::new(2, 10, 1.5);
        let mut map = HashMap::new();
        map.insert(
            "Patients reporting persistent headache often have an underlying disease process"
                .to_string(),
            entities(&["headache", "chronic kidney disease"]),
        );
        let edges = builder.build(&map);
        assert_eq!(edges.len(), 1);
        assert!(edges[0].score > edges[0].entity_count() as f32 / edges[0].entity_count() as f32);
    }

    #[test]
    fn score_is_capped_at_max_boost() {
        let builder = CooccurrenceHyperedgeBuilder::new(2, 10, 1.5);
        let mut map = HashMap::new();
        map.insert(
            "Lab count level test assay measurement confirms the diagnosis of the disease"
                .to_string(),
            entities(&["lab count", "level test", "disease"]),
        );
        let edges = builder.build(&map);
        assert!(edges[0].score <= 1.5);
    }

    #[test]
    fn hash_id_matches_model_helper() {
        let builder = CooccurrenceHyperedgeBuilder::new(2, 10, 1.5);
        let sentence = "Aspirin and ibuprofen both reduce headache and fever in adult patients";
        let mut map = HashMap::new();
        map.insert(sentence.to_string(), entities(&["aspirin", "ibuprofen"]));
        let edges = builder.build(&map);
        let expected = Hyperedge::hash_id_for(sentence, &["aspirin".to_string(), "ibuprofen".to_string()]);
        assert_eq!(edges[0].hash_id, expected);
    }
}
