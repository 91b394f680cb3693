//! Query-time retrieval: seed selection, spreading activation, passage
//! scoring, the hybrid glue, and the ambient answer-parsing contract.

pub mod activation;
pub mod answer;
pub mod hybrid;
pub mod scorer;
pub mod seed;

pub use hybrid::{HybridRetriever, RetrievalResult};
