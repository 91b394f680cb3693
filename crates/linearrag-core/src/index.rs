//! The `index()` state machine (SPEC_FULL.md §4.10): Empty → PassagesEmbedded
//! → NERDone → GraphBuilt → HypergraphBuilt → HyperedgesEmbedded → Ready.
//!
//! Grounded on `original_source/src/LinearRAG.py`'s `index()` entry point:
//! every stage loads its persisted artifact first and only does work for
//! what is missing, so re-running on an unchanged corpus is a no-op besides
//! the initial loads.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

use crate::config::RetrievalConfig;
use crate::embedding::{EmbeddingGenerator, ResilientEmbeddings};
use crate::embedding_store::EmbeddingStores;
use crate::error::Result;
use crate::graph::builder::GraphBuilder;
use crate::graph::graphml::GraphMl;
use crate::graph::HeteroGraph;
use crate::hypergraph::{CooccurrenceHyperedgeBuilder, HyperedgeEmbeddings, HypergraphStore};
use crate::models::Entity;
use crate::ner::{NerAdapter, NerCache, NerResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Empty,
    PassagesEmbedded,
    NerDone,
    GraphBuilt,
    HypergraphBuilt,
    HyperedgesEmbedded,
    Ready,
}

/// Everything a query needs: the embedded corpus, NER output, the
/// heterogeneous graph, and the co-occurrence hypergraph with its own
/// parallel embedding matrix.
pub struct Corpus {
    pub passages: Vec<(String, String)>,
    pub stores: EmbeddingStores,
    pub ner: NerResult,
    pub graph: HeteroGraph,
    pub hypergraph: HypergraphStore,
    pub hyperedge_embeddings: HyperedgeEmbeddings,
    pub state: IndexState,
}

/// Whole-document content hash (32-hex MD5, no namespace prefix — distinct
/// from the per-text namespaced SHA-256 the embedding stores use, since this
/// manifest tracks whole documents for incremental re-runs, not individual
/// passage/sentence/entity texts).
fn document_hash(text: &str) -> String {
    let digest = Md5::digest(text.as_bytes());
    hex::encode(digest)
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexManifest {
    indexed_document_hashes: HashSet<String>,
}

impl IndexManifest {
    fn load(path: &PathBuf) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    fn save(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    fn contains(&self, document: &str) -> bool {
        self.indexed_document_hashes.contains(&document_hash(document))
    }

    fn mark(&mut self, document: &str) {
        self.indexed_document_hashes.insert(document_hash(document));
    }
}

pub struct Indexer;

impl Indexer {
    /// Indexes `documents` (each already formatted as its own passage text,
    /// e.g. with a leading `"<int>: "` sequence prefix). Idempotent: on
    /// re-entry with the same documents, every stage is a no-op except the
    /// initial loads.
    pub async fn index<G: EmbeddingGenerator>(
        documents: &[String],
        config: &RetrievalConfig,
        generator: &ResilientEmbeddings<G>,
        ner_adapter: &dyn NerAdapter,
    ) -> Result<Corpus> {
        config.validate()?;
        let namespace_dir = config.namespace_dir();
        let manifest_path = namespace_dir.join("index_manifest.json");
        let mut manifest = IndexManifest::load(&manifest_path);

        let new_documents: Vec<String> = if config.enable_incremental_index {
            documents
                .iter()
                .filter(|d| !manifest.contains(d))
                .cloned()
                .collect()
        } else {
            documents.to_vec()
        };

        // --- PassagesEmbedded ---
        let mut stores = EmbeddingStores::open(&namespace_dir, config.batch_size);
        if !new_documents.is_empty() {
            stores.passage.insert_text(&new_documents, generator).await?;
        }
        let passages: Vec<(String, String)> = stores
            .passage
            .rows()
            .iter()
            .map(|r| (r.hash_id.clone(), r.text.clone()))
            .collect();
        if passages.is_empty() {
            return Err(crate::error::LinearRagError::NoPassagesLoaded);
        }

        // --- NerDone ---
        let ner_cache = NerCache::new(&namespace_dir);
        let mut ner = ner_cache.load();
        let unscanned: HashMap<String, String> = passages
            .iter()
            .filter(|(hash, _)| !ner.passage_hash_id_to_entities.contains_key(hash))
            .cloned()
            .collect();
        if !unscanned.is_empty() {
            let fresh = ner_adapter
                .batch_ner(&unscanned)
                .await
                .map_err(|e| crate::error::LinearRagError::EmbeddingFailed(e.to_string()))?;
            ner.merge(fresh);
            ner.filter_short_entities();
            ner_cache.save(&ner)?;
        }

        let sentence_texts: Vec<String> = ner.sentence_to_entities.keys().cloned().collect();
        if !sentence_texts.is_empty() {
            stores.sentence.insert_text(&sentence_texts, generator).await?;
        }

        let canonical_entities: Vec<String> = ner
            .passage_hash_id_to_entities
            .values()
            .flatten()
            .map(|e| Entity::canonicalize(e))
            .filter(|e| !e.is_empty())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        if !canonical_entities.is_empty() {
            stores.entity.insert_text(&canonical_entities, generator).await?;
        }

        // --- GraphBuilt ---
        let graphml_path = namespace_dir.join("LinearRAG.graphml");
        let graph = if new_documents.is_empty() && graphml_path.exists() {
            GraphMl::load(&graphml_path)?
        } else {
            let graph = GraphBuilder::build(&passages, &ner.passage_hash_id_to_entities);
            GraphMl::save(&graph, &graphml_path)?;
            graph
        };

        // --- HypergraphBuilt ---
        let hypergraph_dir = namespace_dir.join("hypergraph");
        let hypergraph_metadata_path = hypergraph_dir.join("hypergraph_metadata.json");
        let hypergraph = if new_documents.is_empty() && hypergraph_metadata_path.exists() {
            HypergraphStore::load(&hypergraph_dir)
        } else {
            let builder = CooccurrenceHyperedgeBuilder::new(
                config.min_entities_per_hyperedge,
                config.max_entities_per_hyperedge,
                config.max_hyperedge_score_boost,
            );
            let edges = builder.build(&ner.sentence_to_entities);
            let store = HypergraphStore::build(edges, &passages);
            store.save(&hypergraph_dir)?;
            store
        };

        // --- HyperedgesEmbedded ---
        let mut hyperedge_embeddings = HyperedgeEmbeddings::open(&hypergraph_dir);
        let edges: Vec<_> = hypergraph.all().cloned().collect();
        if !edges.is_empty() {
            hyperedge_embeddings.ensure(&edges, generator).await?;
        }

        // --- Ready ---
        if config.enable_incremental_index {
            for document in documents {
                manifest.mark(document);
            }
            manifest.save(&manifest_path)?;
        }

        Ok(Corpus {
            passages,
            stores,
            ner,
            graph,
            hypergraph,
            hyperedge_embeddings,
            state: IndexState::Ready,
        })
    }
}
