//! The embedding-generator contract and a resilience wrapper around it.
//!
//! Grounded on `beagle-hypergraph::embeddings`: an async trait the rest of
//! the crate depends on only abstractly, plus a deterministic mock used in
//! tests and by the reference CLI driver when no real model is configured.

use async_trait::async_trait;
use std::time::Duration;

use crate::models::Embedding;
use crate::resilience::{CircuitBreaker, CircuitBreakerConfig};

#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("upstream embedding call failed: {0}")]
    Upstream(String),
    #[error("embedding backend out of memory")]
    OutOfMemory,
    #[error("circuit open, retry after {remaining:?}")]
    CircuitOpen { remaining: Duration },
}

impl EmbeddingError {
    pub fn is_transient(&self) -> bool {
        matches!(self, EmbeddingError::OutOfMemory | EmbeddingError::Upstream(_))
    }
}

/// Contract for turning text into unit-norm vectors. The core never assumes
/// a concrete backend; `linearrag-bin` wires in whatever model is configured.
#[async_trait]
pub trait EmbeddingGenerator: Send + Sync {
    async fn generate(&self, text: &str) -> Result<Embedding, EmbeddingError>;

    /// Default batch implementation calls `generate` sequentially; backends
    /// with a real batching API should override this.
    async fn batch_generate(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        let mut out = Vec::with_capacity(texts.len());
        for t in texts {
            out.push(self.generate(t).await?);
        }
        Ok(out)
    }

    fn dimension(&self) -> usize;
}

/// Deterministic, hash-derived embedding generator for tests and offline runs.
/// Mirrors `beagle_hypergraph::embeddings::MockEmbeddingGenerator`.
pub struct DeterministicEmbeddings {
    dimension: usize,
}

impl DeterministicEmbeddings {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl EmbeddingGenerator for DeterministicEmbeddings {
    async fn generate(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        use sha2::{Digest, Sha256};
        let digest = Sha256::digest(text.as_bytes());
        let mut values = Vec::with_capacity(self.dimension);
        for i in 0..self.dimension {
            let byte = digest[i % digest.len()];
            values.push((byte as f32 / 255.0) * 2.0 - 1.0);
        }
        let mut embedding = Embedding::new(values);
        embedding.normalize();
        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Wraps a primary generator with optional fallback and a circuit breaker,
/// halving the requested batch on transient failure down to per-item calls
/// (the OOM-retry behavior the embedding store relies on).
pub struct ResilientEmbeddings<G: EmbeddingGenerator> {
    inner: G,
    breaker: CircuitBreaker,
}

impl<G: EmbeddingGenerator> ResilientEmbeddings<G> {
    pub fn new(inner: G) -> Self {
        Self {
            inner,
            breaker: CircuitBreaker::new(CircuitBreakerConfig::default()),
        }
    }

    /// Encodes a batch, halving on transient failure until single-item
    /// granularity, per the error-handling design's OOM disposition.
    pub async fn encode_batch_with_oom_fallback(
        &self,
        texts: &[String],
    ) -> Result<Vec<Embedding>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.len() == 1 {
            self.breaker.can_execute().await.map_err(|remaining| {
                EmbeddingError::CircuitOpen { remaining }
            })?;
            let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
            return match self.inner.batch_generate(&refs).await {
                Ok(v) => {
                    self.breaker.record_success().await;
                    Ok(v)
                }
                Err(e) => {
                    self.breaker.record_failure().await;
                    Err(e)
                }
            };
        }

        self.breaker.can_execute().await.map_err(|remaining| {
            EmbeddingError::CircuitOpen { remaining }
        })?;
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        match self.inner.batch_generate(&refs).await {
            Ok(v) => {
                self.breaker.record_success().await;
                Ok(v)
            }
            Err(e) if e.is_transient() => {
                self.breaker.record_failure().await;
                tracing::warn!(batch_size = texts.len(), "embedding batch failed transiently, halving");
                let mid = texts.len() / 2;
                let (left, right) = texts.split_at(mid);
                let mut result = Box::pin(self.encode_batch_with_oom_fallback(left)).await?;
                let mut right_result = Box::pin(self.encode_batch_with_oom_fallback(right)).await?;
                result.append(&mut right_result);
                Ok(result)
            }
            Err(e) => {
                self.breaker.record_failure().await;
                Err(e)
            }
        }
    }

    pub fn dimension(&self) -> usize {
        self.inner.dimension()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deterministic_embeddings_are_unit_norm_and_reproducible() {
        let gen = DeterministicEmbeddings::new(16);
        let a = gen.generate("aspirin").await.unwrap();
        let b = gen.generate("aspirin").await.unwrap();
        assert_eq!(a, b);
        assert!((a.norm() - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn resilient_wrapper_succeeds_on_healthy_backend() {
        let resilient = ResilientEmbeddings::new(DeterministicEmbeddings::new(8));
        let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let out = resilient.encode_batch_with_oom_fallback(&texts).await.unwrap();
        assert_eq!(out.len(), 3);
    }

    struct FlakyOnBatch {
        threshold: usize,
    }

    #[async_trait]
    impl EmbeddingGenerator for FlakyOnBatch {
        async fn generate(&self, text: &str) -> Result<Embedding, EmbeddingError> {
            let mut e = Embedding::new(vec![text.len() as f32, 1.0]);
            e.normalize();
            Ok(e)
        }

        async fn batch_generate(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
            if texts.len() > self.threshold {
                return Err(EmbeddingError::OutOfMemory);
            }
            let mut out = Vec::with_capacity(texts.len());
            for t in texts {
                out.push(self.generate(t).await?);
            }
            Ok(out)
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    #[tokio::test]
    async fn halves_batch_on_oom_until_it_succeeds() {
        let resilient = ResilientEmbeddings::new(FlakyOnBatch { threshold: 1 });
        let texts: Vec<String> = (0..8).map(|i| format!("text-{i}")).collect();
        let out = resilient.encode_batch_with_oom_fallback(&texts).await.unwrap();
        assert_eq!(out.len(), 8);
    }
}
