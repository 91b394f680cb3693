//! Maps question entities onto the nearest stored entity (SPEC_FULL.md §4.5).

use crate::embedding::{EmbeddingGenerator, ResilientEmbeddings};
use crate::embedding_store::EmbeddingStore;
use crate::models::Embedding;

/// One seed: the stored entity's hash id and canonical text, and its cosine
/// similarity to the question's extracted entity mention. `entity_text` is
/// what the activation engine keys on internally; `entity_hash` is what the
/// PPR reset vector (and the graph) key on.
#[derive(Debug, Clone, PartialEq)]
pub struct Seed {
    pub entity_hash: String,
    pub entity_text: String,
    pub similarity: f32,
}

pub struct SeedSelector;

impl SeedSelector {
    /// For each extracted question entity, encode it and pick the stored
    /// entity with maximum cosine similarity (ties go to the first-seen row).
    /// Returns an empty vec — "no seeds" — if `question_entities` is empty,
    /// which callers treat as a signal to fall back to dense-only retrieval.
    pub async fn select<G: EmbeddingGenerator>(
        question_entities: &[String],
        entity_store: &EmbeddingStore,
        generator: &ResilientEmbeddings<G>,
    ) -> Vec<Seed> {
        if question_entities.is_empty() || entity_store.is_empty() {
            return Vec::new();
        }

        let mut seeds = Vec::with_capacity(question_entities.len());
        for mention in question_entities {
            let Ok(vectors) = generator
                .encode_batch_with_oom_fallback(&[mention.clone()])
                .await
            else {
                continue;
            };
            let Some(mut query) = vectors.into_iter().next() else {
                continue;
            };
            query.normalize();
            if let Some(seed) = Self::nearest(&query, entity_store) {
                seeds.push(seed);
            }
        }
        seeds
    }

    fn nearest(query: &Embedding, entity_store: &EmbeddingStore) -> Option<Seed> {
        let mut best: Option<(usize, f32)> = None;
        for (idx, row) in entity_store.rows().iter().enumerate() {
            let similarity = query.cosine(&row.embedding);
            match best {
                Some((_, best_sim)) if similarity <= best_sim => {}
                _ => best = Some((idx, similarity)),
            }
        }
        best.map(|(idx, similarity)| Seed {
            entity_hash: entity_store.rows()[idx].hash_id.clone(),
            entity_text: entity_store.rows()[idx].text.clone(),
            similarity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::DeterministicEmbeddings;
    use crate::models::Namespace;

    #[tokio::test]
    async fn no_question_entities_yields_no_seeds() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = EmbeddingStore::open(Namespace::Entity, dir.path().join("e.parquet"), 8);
        let generator = ResilientEmbeddings::new(DeterministicEmbeddings::new(8));
        store
            .insert_text(&["aspirin".to_string()], &generator)
            .await
            .unwrap();

        let seeds = SeedSelector::select(&[], &store, &generator).await;
        assert!(seeds.is_empty());
    }

    #[tokio::test]
    async fn picks_nearest_stored_entity() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = EmbeddingStore::open(Namespace::Entity, dir.path().join("e.parquet"), 8);
        let generator = ResilientEmbeddings::new(DeterministicEmbeddings::new(8));
        store
            .insert_text(
                &["aspirin".to_string(), "ibuprofen".to_string()],
                &generator,
            )
            .await
            .unwrap();

        let seeds = SeedSelector::select(&["aspirin".to_string()], &store, &generator).await;
        assert_eq!(seeds.len(), 1);
        let expected_hash = crate::models::hash_for(Namespace::Entity, "aspirin");
        assert_eq!(seeds[0].entity_hash, expected_hash);
        assert!((seeds[0].similarity - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn empty_store_yields_no_seeds() {
        let dir = tempfile::tempdir().unwrap();
        let store = EmbeddingStore::open(Namespace::Entity, dir.path().join("e.parquet"), 8);
        let generator = ResilientEmbeddings::new(DeterministicEmbeddings::new(8));
        let seeds = SeedSelector::select(&["aspirin".to_string()], &store, &generator).await;
        assert!(seeds.is_empty());
    }
}
