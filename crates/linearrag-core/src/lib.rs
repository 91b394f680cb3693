//! The hybrid retrieval core: dense passage similarity, entity-centric
//! spreading activation with Personalized PageRank, and a medical
//! co-occurrence hypergraph used for re-ranking and context injection.
//!
//! Grounded throughout on `beagle-hypergraph`'s crate shape (async-trait
//! collaborators at every I/O boundary, a `thiserror` error enum, Parquet
//! persistence, a resilience layer wrapping external calls) — see
//! `DESIGN.md` for the full ledger.

pub mod cache;
pub mod config;
pub mod embedding;
pub mod embedding_store;
pub mod error;
pub mod graph;
pub mod hypergraph;
pub mod index;
pub mod models;
pub mod ner;
pub mod resilience;
pub mod retrieval;

pub mod prelude {
    pub use crate::cache::CacheManager;
    pub use crate::config::RetrievalConfig;
    pub use crate::embedding::{DeterministicEmbeddings, EmbeddingGenerator, ResilientEmbeddings};
    pub use crate::embedding_store::{EmbeddingStore, EmbeddingStores};
    pub use crate::error::{LinearRagError, Result};
    pub use crate::graph::HeteroGraph;
    pub use crate::hypergraph::{CooccurrenceHyperedgeBuilder, HyperedgeEmbeddings, HypergraphStore};
    pub use crate::index::{Corpus, IndexState, Indexer};
    pub use crate::models::{Embedding, Entity, Hyperedge, Namespace, Passage, Sentence};
    pub use crate::ner::{NerAdapter, NerCache, NerResult};
    pub use crate::retrieval::answer::{parse_answer, AnswerFormat, INVALID};
    pub use crate::retrieval::{HybridRetriever, RetrievalResult};
}
