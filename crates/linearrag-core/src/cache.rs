//! The optional multi-level JSON cache (`enable_multi_level_cache`).
//!
//! Grounded on `original_source/src/cache_manager.py`'s three named levels
//! (NER, embedding, hypergraph), reimplemented as plain JSON maps rather than
//! the original's pickle/pyarrow hybrid — this implementation carries no
//! pickle analog (see SPEC_FULL.md §9's resolved Open Questions).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LinearRagError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CacheLevel<V> {
    entries: HashMap<String, V>,
}

/// A single JSON-backed key/value level, loaded eagerly and flushed on every
/// write (the corpus is rebuilt once per `index()` run, not under load).
struct JsonCache<V> {
    path: PathBuf,
    level: CacheLevel<V>,
}

impl<V> JsonCache<V>
where
    V: Clone + Serialize + for<'de> Deserialize<'de>,
{
    fn open(path: PathBuf) -> Self {
        let level = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!(error = %e, path = %path.display(), "corrupt cache level, starting empty");
                CacheLevel::default()
            }),
            Err(_) => CacheLevel::default(),
        };
        Self { path, level }
    }

    fn get(&self, key: &str) -> Option<&V> {
        self.level.entries.get(key)
    }

    fn put(&mut self, key: String, value: V) -> Result<()> {
        self.level.entries.insert(key, value);
        self.flush()
    }

    fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LinearRagError::NamespaceWriteFailed {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&self.level)?)?;
        Ok(())
    }

    fn len(&self) -> usize {
        self.level.entries.len()
    }
}

/// The three cache levels `index()` consults before calling out to the NER
/// adapter, the embedding generator, or the hypergraph builder.
pub struct CacheManager {
    ner: JsonCache<Vec<String>>,
    embedding: JsonCache<Vec<f32>>,
    hypergraph: JsonCache<serde_json::Value>,
}

impl CacheManager {
    pub fn open(cache_dir: impl AsRef<Path>) -> Self {
        let dir = cache_dir.as_ref();
        Self {
            ner: JsonCache::open(dir.join("ner_cache.json")),
            embedding: JsonCache::open(dir.join("embedding_cache.json")),
            hypergraph: JsonCache::open(dir.join("hypergraph_cache.json")),
        }
    }

    pub fn cached_entities(&self, text: &str) -> Option<&Vec<String>> {
        self.ner.get(text)
    }

    pub fn cache_entities(&mut self, text: String, entities: Vec<String>) -> Result<()> {
        self.ner.put(text, entities)
    }

    pub fn cached_embedding(&self, text: &str) -> Option<&Vec<f32>> {
        self.embedding.get(text)
    }

    pub fn cache_embedding(&mut self, text: String, vector: Vec<f32>) -> Result<()> {
        self.embedding.put(text, vector)
    }

    pub fn cached_hypergraph_value(&self, key: &str) -> Option<&serde_json::Value> {
        self.hypergraph.get(key)
    }

    pub fn cache_hypergraph_value(&mut self, key: String, value: serde_json::Value) -> Result<()> {
        self.hypergraph.put(key, value)
    }

    pub fn embedding_cache_len(&self) -> usize {
        self.embedding.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_cache_round_trips_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut cache = CacheManager::open(dir.path());
            cache
                .cache_embedding("aspirin".to_string(), vec![0.1, 0.2, 0.3])
                .unwrap();
        }
        let reloaded = CacheManager::open(dir.path());
        assert_eq!(
            reloaded.cached_embedding("aspirin"),
            Some(&vec![0.1, 0.2, 0.3])
        );
    }

    #[test]
    fn missing_cache_files_start_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheManager::open(dir.path());
        assert_eq!(cache.embedding_cache_len(), 0);
        assert!(cache.cached_entities("x").is_none());
    }
}
