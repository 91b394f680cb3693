//! Domain model: the vector newtype and the four node kinds the spec defines
//! (`Passage`, `Sentence`, `Entity`, `Hyperedge`).

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A dense embedding vector. Always expected to be unit-norm once it leaves
/// an [`crate::embedding::EmbeddingGenerator`]; callers that build one from
/// raw floats should call [`Embedding::normalize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding(pub Vec<f32>);

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn norm(&self) -> f32 {
        self.0.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    /// Scales the vector to unit length in place. A zero vector is left
    /// unchanged rather than producing NaNs.
    pub fn normalize(&mut self) {
        let n = self.norm();
        if n > 0.0 {
            for x in self.0.iter_mut() {
                *x /= n;
            }
        }
    }

    pub fn cosine(&self, other: &Embedding) -> f32 {
        debug_assert_eq!(self.0.len(), other.0.len());
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| a * b)
            .sum()
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

impl From<Embedding> for Vec<f32> {
    fn from(embedding: Embedding) -> Self {
        embedding.0
    }
}

/// The namespaces an embedding store / hash can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Namespace {
    Passage,
    Sentence,
    Entity,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Passage => "passage",
            Namespace::Sentence => "sentence",
            Namespace::Entity => "entity",
        }
    }
}

/// `"<namespace>-" + sha256("<namespace>-" + text)`, the single hashing
/// scheme used for passages, sentences and entities (see SPEC_FULL.md
/// Data Model invariant 7 for why entities do not get a second scheme).
pub fn hash_for(namespace: Namespace, text: &str) -> String {
    let ns = namespace.as_str();
    let mut hasher = Sha256::new();
    hasher.update(format!("{ns}-{text}"));
    let digest = hasher.finalize();
    format!("{ns}-{}", hex::encode(digest))
}

/// A stored passage: immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    pub hash_id: String,
    pub text: String,
    pub embedding: Embedding,
}

/// A stored sentence, derived from NER output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sentence {
    pub hash_id: String,
    pub text: String,
    pub embedding: Embedding,
}

/// A stored entity: canonical text is always lowercased.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub hash_id: String,
    pub text: String,
    pub embedding: Embedding,
}

impl Entity {
    /// Builds the canonical (lowercased) form of an entity mention.
    pub fn canonicalize(raw: &str) -> String {
        raw.trim().to_lowercase()
    }
}

/// An n-ary co-occurrence fact extracted from a single sentence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hyperedge {
    pub hash_id: String,
    pub text: String,
    pub entities: Vec<String>,
    pub score: f32,
}

impl Hyperedge {
    /// 16-hex-md5 of `"<text>|<sorted entity list joined by |>"`.
    pub fn hash_id_for(text: &str, entities: &[String]) -> String {
        let mut sorted = entities.to_vec();
        sorted.sort();
        let content = format!("{text}|{}", sorted.join("|"));
        let digest = md5::Md5::digest(content.as_bytes());
        hex::encode(digest)[..16].to_string()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }
}
