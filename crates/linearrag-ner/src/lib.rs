//! A deterministic, dictionary-and-regex `NerAdapter` reference implementation.
//!
//! `original_source/src/ner.py`'s `SpacyNER` chains three strategies: a
//! BC5CDR spaCy model (CHEMICAL/DISEASE entities), a HuggingFace biomedical
//! NER pipeline as a supplement, and a regex keyword list as the last-resort
//! fallback when both models come back empty. None of the model-backed
//! strategies are reproducible without the weights they were trained on, so
//! this crate keeps only the one strategy that already is: the fallback
//! keyword patterns from `_extract_medical_keywords`, plus the drug/disease
//! suffix patterns from `__init__`'s `medical_patterns`. Lowercasing and the
//! length-3 floor mirror the Python's own `len(entity_text) > 2` checks.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use linearrag_core::ner::{NerAdapter, NerResult};
use once_cell::sync::Lazy;
use regex::Regex;

const MIN_SENTENCE_CHARS: usize = 10;

/// Regex patterns over lowercased text. Each capture group (or, for patterns
/// with none, the whole match) becomes a candidate entity mention.
static MEDICAL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // Diseases
        r"\b(?:infection|syndrome|disease|disorder|cancer|tumor|carcinoma|adenocarcinoma|sarcoma)\b",
        r"\b(?:fever|pain|cough|nausea|vomiting|diarrhea|headache|fatigue|weakness)\b",
        r"\b(?:diabetes|hypertension|asthma|pneumonia|hepatitis|tuberculosis|meningitis)\b",
        r"\b(?:arthritis|dermatitis|nephritis|bronchitis|colitis|gastritis)\b",
        // Medications
        r"\b(?:cisplatin|carboplatin|azithromycin|metformin|insulin|aspirin|ibuprofen)\b",
        r"\b(?:drug|medication|therapy|treatment|antibiotic|chemotherapy|analgesic)\b",
        // Pathogens
        r"\b(?:virus|bacteria|bacterial|viral|fungal|parasitic|pathogen)\b",
        // Medical terms
        r"\b(?:cardiac|pulmonary|renal|hepatic|neurological|respiratory|gastrointestinal)\b",
        // Drug name suffixes (case folded, pattern below assumes lowercase input)
        r"\b[a-z]+(?:cillin|mycin|oxacin|zole|prazole|sartan|olol)\b",
        // Malignancy terms from __init__'s disease pattern
        r"\b(?:carcinoma|adenocarcinoma|lymphoma|leukemia|sarcoma)\b",
        // Lab values
        r"\b(?:hemoglobin|leukocyte|platelet|glucose|creatinine)\s+(?:count|level)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static pattern is valid"))
    .collect()
});

fn extract_entities(text: &str) -> HashSet<String> {
    let lowered = text.to_lowercase();
    let mut entities = HashSet::new();
    for pattern in MEDICAL_PATTERNS.iter() {
        for m in pattern.find_iter(&lowered) {
            let candidate = m.as_str().trim();
            if candidate.len() > 2 {
                entities.insert(candidate.to_string());
            }
        }
    }
    entities
}

/// Splits on sentence-ending punctuation, discarding fragments shorter than
/// `MIN_SENTENCE_CHARS` the way the Python's `len(sent_text) < 10` check does.
fn split_sentences(text: &str) -> Vec<String> {
    text.split(['.', '!', '?'])
        .map(|s| s.trim().to_string())
        .filter(|s| s.len() >= MIN_SENTENCE_CHARS)
        .collect()
}

/// The fallback-keyword strategy from `original_source/src/ner.py`, run
/// unconditionally rather than only when the model-backed strategies are
/// unavailable.
#[derive(Debug, Default, Clone, Copy)]
pub struct DictionaryNer;

impl DictionaryNer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NerAdapter for DictionaryNer {
    async fn batch_ner(&self, hash_id_to_text: &HashMap<String, String>) -> anyhow::Result<NerResult> {
        let mut result = NerResult::default();
        for (hash_id, text) in hash_id_to_text {
            let passage_entities = extract_entities(text);
            if !passage_entities.is_empty() {
                result
                    .passage_hash_id_to_entities
                    .insert(hash_id.clone(), passage_entities);
            }
            for sentence in split_sentences(text) {
                let sentence_entities = extract_entities(&sentence);
                if !sentence_entities.is_empty() {
                    result
                        .sentence_to_entities
                        .entry(sentence)
                        .or_default()
                        .extend(sentence_entities);
                }
            }
        }
        tracing::debug!(
            passages = result.passage_hash_id_to_entities.len(),
            sentences = result.sentence_to_entities.len(),
            "dictionary NER pass complete"
        );
        Ok(result)
    }

    async fn question_ner(&self, question: &str) -> anyhow::Result<HashSet<String>> {
        Ok(extract_entities(question))
    }
}
