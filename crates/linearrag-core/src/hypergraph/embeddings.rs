//! Parallel embedding matrix for hyperedge texts (SPEC_FULL.md §4.4: "each
//! hyperedge's text is encoded via the shared embedding model... stored in a
//! parallel matrix with its own hash list"). Structurally a leaner sibling of
//! [`crate::embedding_store::EmbeddingStore`]: keyed directly by the
//! hyperedge's own 16-hex-MD5 id rather than a re-derived namespaced hash,
//! since hyperedges are not graph nodes.

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
use crate::models::{Embedding, Hyperedge};

pub struct HyperedgeEmbeddings {
    path: PathBuf,
    vectors: HashMap<String, Embedding>,
}

impl HyperedgeEmbeddings {
    pub fn open(hypergraph_dir: impl AsRef<Path>) -> Self {
        let path = hypergraph_dir.as_ref().join("hyperedge_embedding.parquet");
        let mut store = Self {
            path,
            vectors: HashMap::new(),
        };
        if let Err(e) = store.load() {
            tracing::warn!(error = %e, "failed to load hyperedge embeddings, starting empty");
            store.vectors.clear();
        }
        store
    }

    pub fn get(&self, hyperedge_hash_id: &str) -> Option<&Embedding> {
        self.vectors.get(hyperedge_hash_id)
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Encodes and stores embeddings for any hyperedges not already present.
    pub async fn ensure<G: EmbeddingGenerator>(
        &mut self,
        hyperedges: &[Hyperedge],
        generator: &ResilientEmbeddings<G>,
    ) -> Result<()> {
        let missing: Vec<&Hyperedge> = hyperedges
            .iter()
            .filter(|e| !self.vectors.contains_key(&e.hash_id))
            .collect();
        if missing.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = missing.iter().map(|e| e.text.clone()).collect();
        let encoded = generator
            .encode_batch_with_oom_fallback(&texts)
            .await
            .map_err(|e| LinearRagError::EmbeddingFailed(e.to_string()))?;

        for (edge, mut embedding) in missing.into_iter().zip(encoded) {
            embedding.normalize();
            self.vectors.insert(edge.hash_id.clone(), embedding);
        }
        self.save()
    }

    fn schema() -> Arc<Schema> {
        Arc::new(Schema::new(vec![
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

        let mut vectors = HashMap::new();
        for batch in reader {
            let batch = batch.map_err(LinearRagError::Arrow)?;
            let hashes = batch
                .column_by_name("hash_id")
                .and_then(|c| c.as_any().downcast_ref::<StringArray>())
                .ok_or_else(|| LinearRagError::StoreUnreadable("missing hash_id column".into()))?;
            let embeddings = batch
                .column_by_name("embedding")
                .and_then(|c| c.as_any().downcast_ref::<ListArray>())
                .ok_or_else(|| LinearRagError::StoreUnreadable("missing embedding column".into()))?;

            for i in 0..batch.num_rows() {
                let hash_id = hashes.value(i).to_string();
                let values = embeddings.value(i);
                let floats = values
                    .as_any()
                    .downcast_ref::<Float32Array>()
                    .ok_or_else(|| LinearRagError::StoreUnreadable("embedding not f32".into()))?;
                let vector: Vec<f32> = floats.iter().map(|v| v.unwrap_or(0.0)).collect();
                vectors.insert(hash_id, Embedding::new(vector));
            }
        }
        self.vectors = vectors;
        Ok(())
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LinearRagError::NamespaceWriteFailed {
                path: parent.display().to_string(),
                source: e,
            })?;
        }

        let mut hashes: Vec<&str> = Vec::with_capacity(self.vectors.len());
        let mut rows: Vec<&Embedding> = Vec::with_capacity(self.vectors.len());
        for (hash_id, embedding) in &self.vectors {
            hashes.push(hash_id.as_str());
            rows.push(embedding);
        }

        let dim = rows.first().map(|e| e.dimension()).unwrap_or(0);
        let flat: Vec<f32> = rows.iter().flat_map(|e| e.as_slice().iter().copied()).collect();
        let offsets: Vec<i32> = (0..=rows.len()).map(|i| (i * dim) as i32).collect();
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
            vec![Arc::new(StringArray::from(hashes)), Arc::new(list_array)],
        )
        .map_err(LinearRagError::Arrow)?;

        let file = File::create(&self.path)?;
        let mut writer =
            ArrowWriter::try_new(file, Self::schema(), None).map_err(LinearRagError::Parquet)?;
        writer.write(&batch).map_err(LinearRagError::Parquet)?;
        writer.close().map_err(LinearRagError::Parquet)?;
        Ok(())
    }
}
