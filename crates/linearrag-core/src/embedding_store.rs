//! Persisted hash→(text, vector) store, backed by Parquet.
//!
//! Grounded on `original_source/src/embedding_store.py`'s `EmbeddingStore`:
//! same dedup-on-insert, mini-batch encoding, namespaced hashing, and
//! "corrupt file → start empty and log" load policy, reimplemented over
//! `arrow`/`parquet` instead of pandas.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Float32Array, ListArray, StringArray};
use arrow::buffer::OffsetBuffer;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;

use crate::embedding::{EmbeddingGenerator, ResilientEmbeddings};
use crate::error::{LinearRagError, Result};
use crate::models::{hash_for, Embedding, Namespace};

/// One row of the store: a stable hash, the source text, and its vector.
#[derive(Debug, Clone)]
pub struct StoredRow {
    pub hash_id: String,
    pub text: String,
    pub embedding: Embedding,
}

/// A namespaced, Parquet-persisted table of (text, hash_id, embedding) rows.
/// Three instances exist per corpus: passage, sentence, entity.
pub struct EmbeddingStore {
    namespace: Namespace,
    path: PathBuf,
    batch_size: usize,
    rows: Vec<StoredRow>,
    text_to_hash: HashMap<String, String>,
    hash_to_idx: HashMap<String, usize>,
}

impl EmbeddingStore {
    /// Opens (and, if present, loads) the store at `path`.
    pub fn open(namespace: Namespace, path: impl Into<PathBuf>, batch_size: usize) -> Self {
        let path = path.into();
        let mut store = Self {
            namespace,
            path,
            batch_size,
            rows: Vec::new(),
            text_to_hash: HashMap::new(),
            hash_to_idx: HashMap::new(),
        };
        if let Err(e) = store.load() {
            tracing::warn!(namespace = namespace.as_str(), error = %e, "failed to load embedding store, starting empty");
            store.rows.clear();
            store.text_to_hash.clear();
            store.hash_to_idx.clear();
        }
        store
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn hash_id_for_text(&self, text: &str) -> Option<&str> {
        self.text_to_hash.get(text).map(String::as_str)
    }

    pub fn text_for_hash(&self, hash_id: &str) -> Option<&str> {
        self.hash_to_idx
            .get(hash_id)
            .map(|&i| self.rows[i].text.as_str())
    }

    pub fn embedding_for_hash(&self, hash_id: &str) -> Option<&Embedding> {
        self.hash_to_idx
            .get(hash_id)
            .map(|&i| &self.rows[i].embedding)
    }

    pub fn row_index(&self, hash_id: &str) -> Option<usize> {
        self.hash_to_idx.get(hash_id).copied()
    }

    pub fn rows(&self) -> &[StoredRow] {
        &self.rows
    }

    /// Deduplicates against existing texts, encodes the remainder in
    /// mini-batches (halving on OOM), appends rows and persists.
    pub async fn insert_text<G: EmbeddingGenerator>(
        &mut self,
        texts: &[String],
        generator: &ResilientEmbeddings<G>,
    ) -> Result<usize> {
        let new_texts: Vec<String> = texts
            .iter()
            .filter(|t| !self.text_to_hash.contains_key(*t))
            .cloned()
            .collect();
        if new_texts.is_empty() {
            return Ok(0);
        }

        let mut all_embeddings = Vec::with_capacity(new_texts.len());
        for chunk in new_texts.chunks(self.batch_size.max(1)) {
            let encoded = generator
                .encode_batch_with_oom_fallback(chunk)
                .await
                .map_err(|e| LinearRagError::EmbeddingFailed(e.to_string()))?;
            all_embeddings.extend(encoded);
        }

        let start_idx = self.rows.len();
        for (i, (text, mut embedding)) in new_texts.into_iter().zip(all_embeddings).enumerate() {
            embedding.normalize();
            let hash_id = hash_for(self.namespace, &text);
            self.text_to_hash.insert(text.clone(), hash_id.clone());
            self.hash_to_idx.insert(hash_id.clone(), start_idx + i);
            self.rows.push(StoredRow {
                hash_id,
                text,
                embedding,
            });
        }

        self.save()?;
        Ok(self.rows.len() - start_idx)
    }

    fn schema() -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("text", DataType::Utf8, false),
            Field::new("hash_id", DataType::Utf8, false),
            Field::new(
                "embedding",
                DataType::List(Arc::new(Field::new("item", DataType::Float32, true))),
                false,
            ),
        ]))
    }

    fn load(&mut self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        let file = File::open(&self.path)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(LinearRagError::Parquet)?
            .build()
            .map_err(LinearRagError::Parquet)?;

        let mut rows = Vec::new();
        for batch in reader {
            let batch = batch.map_err(LinearRagError::Arrow)?;
            let texts = batch
                .column_by_name("text")
                .and_then(|c| c.as_any().downcast_ref::<StringArray>())
                .ok_or_else(|| LinearRagError::StoreUnreadable("missing text column".into()))?;
            let hashes = batch
                .column_by_name("hash_id")
                .and_then(|c| c.as_any().downcast_ref::<StringArray>())
                .ok_or_else(|| LinearRagError::StoreUnreadable("missing hash_id column".into()))?;
            let embeddings = batch
                .column_by_name("embedding")
                .and_then(|c| c.as_any().downcast_ref::<ListArray>())
                .ok_or_else(|| LinearRagError::StoreUnreadable("missing embedding column".into()))?;

            for i in 0..batch.num_rows() {
                let text = texts.value(i).to_string();
                let hash_id = hashes.value(i).to_string();
                let values = embeddings.value(i);
                let floats = values
                    .as_any()
                    .downcast_ref::<Float32Array>()
                    .ok_or_else(|| LinearRagError::StoreUnreadable("embedding not f32".into()))?;
                let vector: Vec<f32> = floats.iter().map(|v| v.unwrap_or(0.0)).collect();
                rows.push(StoredRow {
                    hash_id,
                    text,
                    embedding: Embedding::new(vector),
                });
            }
        }

        self.text_to_hash.clear();
        self.hash_to_idx.clear();
        for (i, row) in rows.iter().enumerate() {
            self.text_to_hash.insert(row.text.clone(), row.hash_id.clone());
            self.hash_to_idx.insert(row.hash_id.clone(), i);
        }
        self.rows = rows;
        Ok(())
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LinearRagError::NamespaceWriteFailed {
                path: parent.display().to_string(),
                source: e,
            })?;
        }

        let texts: Vec<&str> = self.rows.iter().map(|r| r.text.as_str()).collect();
        let hashes: Vec<&str> = self.rows.iter().map(|r| r.hash_id.as_str()).collect();

        let dim = self.rows.first().map(|r| r.embedding.dimension()).unwrap_or(0);
        let flat: Vec<f32> = self
            .rows
            .iter()
            .flat_map(|r| r.embedding.as_slice().iter().copied())
            .collect();
        let offsets: Vec<i32> = (0..=self.rows.len())
            .map(|i| (i * dim) as i32)
            .collect();
        let values = Float32Array::from(flat);
        let embedding_field = Arc::new(Field::new("item", DataType::Float32, true));
        let list_array = ListArray::try_new(
            embedding_field,
            OffsetBuffer::new(offsets.into()),
            Arc::new(values),
            None,
        )
        .map_err(LinearRagError::Arrow)?;

        let batch = RecordBatch::try_new(
            Self::schema(),
            vec![
                Arc::new(StringArray::from(texts)),
                Arc::new(StringArray::from(hashes)),
                Arc::new(list_array),
            ],
        )
        .map_err(LinearRagError::Arrow)?;

        let file = File::create(&self.path)?;
        let mut writer = ArrowWriter::try_new(file, Self::schema(), None).map_err(LinearRagError::Parquet)?;
        writer.write(&batch).map_err(LinearRagError::Parquet)?;
        writer.close().map_err(LinearRagError::Parquet)?;
        Ok(())
    }
}

/// Convenience bundle of the three namespaced stores for a corpus.
pub struct EmbeddingStores {
    pub passage: EmbeddingStore,
    pub sentence: EmbeddingStore,
    pub entity: EmbeddingStore,
}

impl EmbeddingStores {
    pub fn open(namespace_dir: impl AsRef<Path>, batch_size: usize) -> Self {
        let dir = namespace_dir.as_ref();
        Self {
            passage: EmbeddingStore::open(Namespace::Passage, dir.join("passage_embedding.parquet"), batch_size),
            sentence: EmbeddingStore::open(Namespace::Sentence, dir.join("sentence_embedding.parquet"), batch_size),
            entity: EmbeddingStore::open(Namespace::Entity, dir.join("entity_embedding.parquet"), batch_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::DeterministicEmbeddings;

    #[tokio::test]
    async fn insert_then_reload_round_trips_vectors_and_hashes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entity_embedding.parquet");
        let generator = ResilientEmbeddings::new(DeterministicEmbeddings::new(8));

        {
            let mut store = EmbeddingStore::open(Namespace::Entity, &path, 4);
            let inserted = store
                .insert_text(&["aspirin".to_string(), "ibuprofen".to_string()], &generator)
                .await
                .unwrap();
            assert_eq!(inserted, 2);
        }

        let store = EmbeddingStore::open(Namespace::Entity, &path, 4);
        assert_eq!(store.len(), 2);
        let hash = hash_for(Namespace::Entity, "aspirin");
        assert_eq!(store.text_for_hash(&hash), Some("aspirin"));
        let emb = store.embedding_for_hash(&hash).unwrap();
        assert!((emb.norm() - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn insert_skips_already_stored_texts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("passage_embedding.parquet");
        let generator = ResilientEmbeddings::new(DeterministicEmbeddings::new(4));
        let mut store = EmbeddingStore::open(Namespace::Passage, &path, 8);

        let first = store.insert_text(&["0: hello".to_string()], &generator).await.unwrap();
        assert_eq!(first, 1);
        let second = store
            .insert_text(&["0: hello".to_string(), "1: world".to_string()], &generator)
            .await
            .unwrap();
        assert_eq!(second, 1);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn batch_insert_a_then_b_matches_batch_insert_union() {
        let generator = ResilientEmbeddings::new(DeterministicEmbeddings::new(4));
        let dir_split = tempfile::tempdir().unwrap();
        let mut split = EmbeddingStore::open(Namespace::Entity, dir_split.path().join("e.parquet"), 8);
        split.insert_text(&["a".to_string(), "b".to_string()], &generator).await.unwrap();
        split.insert_text(&["c".to_string()], &generator).await.unwrap();

        let dir_union = tempfile::tempdir().unwrap();
        let mut union = EmbeddingStore::open(Namespace::Entity, dir_union.path().join("e.parquet"), 8);
        union
            .insert_text(&["a".to_string(), "b".to_string(), "c".to_string()], &generator)
            .await
            .unwrap();

        let mut split_hashes: Vec<&str> = split.rows().iter().map(|r| r.hash_id.as_str()).collect();
        let mut union_hashes: Vec<&str> = union.rows().iter().map(|r| r.hash_id.as_str()).collect();
        split_hashes.sort();
        union_hashes.sort();
        assert_eq!(split_hashes, union_hashes);
    }
}
