//! The NER adapter contract (external collaborator) and its on-disk cache.
//!
//! Grounded on `original_source/src/ner.py`'s black-box shape
//! (`batch_ner(hash_id_to_text) -> (passage_hash_id_to_entities, sentence_to_entities)`)
//! and the teacher's async-trait idiom. The core depends only on
//! [`NerAdapter`]; `linearrag-ner` supplies a concrete, non-scored reference
//! implementation.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{LinearRagError, Result};

/// Minimum length (after lowercasing) for an entity mention to be kept.
/// "Filtered out by convention of the provider", per spec.md §4.2 — enforced
/// here so every adapter behaves identically regardless of implementation.
pub const MIN_ENTITY_LEN: usize = 3;

#[async_trait]
pub trait NerAdapter: Send + Sync {
    /// Extracts entities per passage and per sentence in one pass.
    async fn batch_ner(
        &self,
        hash_id_to_text: &HashMap<String, String>,
    ) -> anyhow::Result<NerResult>;

    /// Extracts entities from a single question string (used by the seed selector).
    async fn question_ner(&self, question: &str) -> anyhow::Result<HashSet<String>>;
}

/// Output of a NER pass: passage→entities and sentence→entities maps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NerResult {
    pub passage_hash_id_to_entities: HashMap<String, HashSet<String>>,
    pub sentence_to_entities: HashMap<String, HashSet<String>>,
}

impl NerResult {
    pub fn merge(&mut self, other: NerResult) {
        for (k, v) in other.passage_hash_id_to_entities {
            self.passage_hash_id_to_entities.entry(k).or_default().extend(v);
        }
        for (k, v) in other.sentence_to_entities {
            self.sentence_to_entities.entry(k).or_default().extend(v);
        }
    }

    /// Applies the minimum-entity-length filtering convention uniformly.
    pub fn filter_short_entities(&mut self) {
        for set in self.passage_hash_id_to_entities.values_mut() {
            set.retain(|e| e.len() >= MIN_ENTITY_LEN);
        }
        for set in self.sentence_to_entities.values_mut() {
            set.retain(|e| e.len() >= MIN_ENTITY_LEN);
        }
    }
}

/// `ner_results.json`, keyed exactly as spec.md §6 describes.
pub struct NerCache {
    path: PathBuf,
}

impl NerCache {
    pub fn new(namespace_dir: impl AsRef<Path>) -> Self {
        Self {
            path: namespace_dir.as_ref().join("ner_results.json"),
        }
    }

    pub fn load(&self) -> NerResult {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "corrupt ner_results.json, starting empty");
                NerResult::default()
            }),
            Err(_) => NerResult::default(),
        }
    }

    pub fn save(&self, result: &NerResult) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LinearRagError::NamespaceWriteFailed {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        let json = serde_json::to_string_pretty(result)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}
