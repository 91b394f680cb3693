//! Validated, serializable configuration surface.
//!
//! Defaults mirror the original `LinearRAGConfig` one-for-one (see
//! `SPEC_FULL.md` §6 and DESIGN.md). Unlike the source, construction never
//! panics: [`RetrievalConfig::validate`] is called explicitly and returns a
//! `Result`, per the teacher's "explicit configuration struct" design note.

use serde::{Deserialize, Serialize};

use crate::error::{LinearRagError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    // ---- I/O ----
    pub working_dir: String,
    pub dataset_name: String,
    pub batch_size: usize,
    pub max_workers: usize,

    // ---- Retrieval ----
    pub retrieval_top_k: usize,
    pub max_iterations: usize,
    pub iteration_threshold: f32,
    pub top_k_sentence: usize,
    pub use_candidate_filtering: bool,
    pub candidate_pool_size: usize,
    pub passage_ratio: f32,
    pub passage_node_weight: f32,
    pub damping: f32,

    // ---- Hypergraph ----
    pub use_hypergraph: bool,
    pub min_entities_per_hyperedge: usize,
    pub max_entities_per_hyperedge: usize,
    pub max_hyperedge_score_boost: f32,
    pub hyperedge_top_k: usize,
    pub hyperedge_node_weight: f32,
    pub hyperedge_retrieval_threshold: f32,
    pub hyperedge_entity_boost: f32,

    // ---- Incremental indexing / caching ----
    pub enable_incremental_index: bool,
    pub enable_multi_level_cache: bool,
    pub cache_dir: String,

    // ---- LM driver (ambient, used only by linearrag-bin) ----
    pub lm_timeout_secs: u64,
    pub lm_worker_cap: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            working_dir: "import".to_string(),
            dataset_name: "default".to_string(),
            batch_size: 32,
            max_workers: 4,

            retrieval_top_k: 3,
            max_iterations: 2,
            iteration_threshold: 0.3,
            top_k_sentence: 5,
            use_candidate_filtering: true,
            candidate_pool_size: 500,
            passage_ratio: 0.7,
            passage_node_weight: 1.0,
            damping: 0.85,

            use_hypergraph: true,
            min_entities_per_hyperedge: 2,
            max_entities_per_hyperedge: 10,
            max_hyperedge_score_boost: 1.5,
            hyperedge_top_k: 30,
            hyperedge_node_weight: 1.2,
            hyperedge_retrieval_threshold: 0.3,
            hyperedge_entity_boost: 1.2,

            enable_incremental_index: true,
            enable_multi_level_cache: true,
            cache_dir: "cache".to_string(),

            lm_timeout_secs: 60,
            lm_worker_cap: 2,
        }
    }
}

impl RetrievalConfig {
    /// Validates the tunables that have a semantically required range.
    /// Called explicitly by `Indexer`/`HybridRetriever` constructors rather
    /// than at deserialization time, so partially-built configs can still be
    /// mutated before use.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.damping) {
            return Err(LinearRagError::InvalidConfig(format!(
                "damping must be in (0,1), got {}",
                self.damping
            )));
        }
        if !(0.0..=1.0).contains(&self.passage_ratio) {
            return Err(LinearRagError::InvalidConfig(format!(
                "passage_ratio must be in [0,1], got {}",
                self.passage_ratio
            )));
        }
        if self.max_iterations == 0 {
            return Err(LinearRagError::InvalidConfig(
                "max_iterations must be >= 1".to_string(),
            ));
        }
        if self.retrieval_top_k == 0 {
            return Err(LinearRagError::InvalidConfig(
                "retrieval_top_k must be >= 1".to_string(),
            ));
        }
        if self.min_entities_per_hyperedge < 2 {
            return Err(LinearRagError::InvalidConfig(
                "min_entities_per_hyperedge must be >= 2".to_string(),
            ));
        }
        if self.min_entities_per_hyperedge > self.max_entities_per_hyperedge {
            return Err(LinearRagError::InvalidConfig(
                "min_entities_per_hyperedge must be <= max_entities_per_hyperedge".to_string(),
            ));
        }
        if self.max_hyperedge_score_boost < 1.0 {
            return Err(LinearRagError::InvalidConfig(
                "max_hyperedge_score_boost must be >= 1.0".to_string(),
            ));
        }
        if self.max_workers == 0 {
            return Err(LinearRagError::InvalidConfig(
                "max_workers must be >= 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The worker cap for the LM caller pool: `min(2, max_workers)`.
    pub fn lm_pool_size(&self) -> usize {
        self.lm_worker_cap.min(self.max_workers)
    }

    /// Root directory for this config's namespace: `<working_dir>/<dataset_name>`.
    pub fn namespace_dir(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.working_dir).join(&self.dataset_name)
    }
}
