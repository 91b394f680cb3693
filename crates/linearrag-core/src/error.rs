//! Error hierarchy for the retrieval core.
//!
//! Mirrors the disposition table in the error-handling design: most failures are
//! logged and treated as empty state so indexing can keep making progress, a
//! narrow set are transient and worth retrying, and a handful are fatal and must
//! propagate to the caller.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, LinearRagError>;

#[derive(Debug, Error)]
pub enum LinearRagError {
    /// The embedding backend rejected a batch for a reason the caller can retry
    /// (typically an out-of-memory condition during encoding).
    #[error("embedding backend transient failure: {0}")]
    EmbeddingTransient(String),

    /// The embedding backend failed for a reason retrying will not fix.
    #[error("embedding backend failure: {0}")]
    EmbeddingFailed(String),

    /// A store's backing file was missing or unreadable; callers should treat
    /// the store as empty rather than fail indexing outright.
    #[error("store file unreadable, starting empty: {0}")]
    StoreUnreadable(String),

    /// Serialization/deserialization of a JSON artifact failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Parquet/Arrow I/O failed.
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Arrow array construction failed.
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Generic filesystem I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// GraphML (de)serialization failed.
    #[error("graphml error: {0}")]
    GraphMl(String),

    /// No passages were loaded before a query or index operation that requires them.
    #[error("no passages loaded")]
    NoPassagesLoaded,

    /// The embedding model could not be constructed/loaded at all.
    #[error("embedding model unavailable: {0}")]
    EmbeddingModelUnavailable(String),

    /// Writing into the namespaced working directory failed.
    #[error("failed to write namespace directory {path}: {source}")]
    NamespaceWriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A configuration value failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl LinearRagError {
    /// Whether the caller should retry the operation (possibly with reduced
    /// batch size), rather than give up.
    pub fn is_transient(&self) -> bool {
        matches!(self, LinearRagError::EmbeddingTransient(_))
    }

    /// Whether the failure must propagate and abort the current operation,
    /// as opposed to being logged and absorbed as empty state.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LinearRagError::NoPassagesLoaded
                | LinearRagError::EmbeddingModelUnavailable(_)
                | LinearRagError::NamespaceWriteFailed { .. }
                | LinearRagError::InvalidConfig(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_is_exactly_embedding_oom() {
        assert!(LinearRagError::EmbeddingTransient("oom".into()).is_transient());
        assert!(!LinearRagError::EmbeddingFailed("bad request".into()).is_transient());
        assert!(!LinearRagError::NoPassagesLoaded.is_transient());
    }

    #[test]
    fn fatal_covers_load_bearing_failures() {
        assert!(LinearRagError::NoPassagesLoaded.is_fatal());
        assert!(LinearRagError::EmbeddingModelUnavailable("missing".into()).is_fatal());
        assert!(LinearRagError::InvalidConfig("damping".into()).is_fatal());
        assert!(!LinearRagError::StoreUnreadable("x".into()).is_fatal());
    }

    #[test]
    fn transient_and_fatal_are_disjoint() {
        let variants = [
            LinearRagError::EmbeddingTransient("a".into()),
            LinearRagError::EmbeddingFailed("b".into()),
            LinearRagError::StoreUnreadable("c".into()),
            LinearRagError::NoPassagesLoaded,
        ];
        for v in variants {
            assert!(!(v.is_transient() && v.is_fatal()));
        }
    }
}
