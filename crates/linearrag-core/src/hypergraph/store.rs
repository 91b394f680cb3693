//! Persisted hypergraph state: hyperedge metadata, the entity↔hyperedge
//! bipartite adjacency, and the passage↔hyperedge substring-match index.
//!
//! Grounded on `original_source/src/hypergraph/hypergraph_store.py`. Per the
//! resolved Data Model invariant 7 (SPEC_FULL.md §3), the bipartite adjacency
//! keys entities by the *same* namespaced SHA-256 hash the entity embedding
//! store uses, not a second ad hoc hash — the original's two divergent
//! entity-hashing schemes are unified here.

use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LinearRagError, Result};
use crate::models::{hash_for, Hyperedge, Namespace};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct HyperedgeMetadata {
    text: String,
    entities: Vec<String>,
    score: f32,
}

pub struct HypergraphStore {
    pub hyperedges: HashMap<String, Hyperedge>,
    pub entity_to_hyperedges: HashMap<String, HashSet<String>>,
    pub passage_to_hyperedges: HashMap<String, Vec<String>>,
}

impl HypergraphStore {
    pub fn empty() -> Self {
        Self {
            hyperedges: HashMap::new(),
            entity_to_hyperedges: HashMap::new(),
            passage_to_hyperedges: HashMap::new(),
        }
    }

    /// Builds the bipartite adjacency and the passage substring-match index
    /// from a freshly-built set of hyperedges.
    pub fn build(hyperedges: Vec<Hyperedge>, passages: &[(String, String)]) -> Self {
        let mut entity_to_hyperedges: HashMap<String, HashSet<String>> = HashMap::new();
        for edge in &hyperedges {
            for entity in &edge.entities {
                let entity_hash = hash_for(Namespace::Entity, entity);
                entity_to_hyperedges
                    .entry(entity_hash)
                    .or_default()
                    .insert(edge.hash_id.clone());
            }
        }

        let mut passage_to_hyperedges: HashMap<String, Vec<String>> = HashMap::new();
        for (passage_hash, passage_text) in passages {
            let mut matches = Vec::new();
            for edge in &hyperedges {
                if passage_text.contains(edge.text.as_str()) {
                    matches.push(edge.hash_id.clone());
                }
            }
            if !matches.is_empty() {
                passage_to_hyperedges.insert(passage_hash.clone(), matches);
            }
        }

        let by_id = hyperedges.into_iter().map(|e| (e.hash_id.clone(), e)).collect();

        Self {
            hyperedges: by_id,
            entity_to_hyperedges,
            passage_to_hyperedges,
        }
    }

    pub fn hyperedges_for_entity(&self, entity_hash: &str) -> Vec<&Hyperedge> {
        self.entity_to_hyperedges
            .get(entity_hash)
            .into_iter()
            .flatten()
            .filter_map(|id| self.hyperedges.get(id))
            .collect()
    }

    pub fn hyperedges_for_passage(&self, passage_hash: &str) -> Vec<&Hyperedge> {
        self.passage_to_hyperedges
            .get(passage_hash)
            .into_iter()
            .flatten()
            .filter_map(|id| self.hyperedges.get(id))
            .collect()
    }

    pub fn all(&self) -> impl Iterator<Item = &Hyperedge> {
        self.hyperedges.values()
    }

    pub fn is_empty(&self) -> bool {
        self.hyperedges.is_empty()
    }

    pub fn save(&self, hypergraph_dir: impl AsRef<Path>) -> Result<()> {
        let dir = hypergraph_dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| LinearRagError::NamespaceWriteFailed {
            path: dir.display().to_string(),
            source: e,
        })?;

        let metadata: HashMap<String, HyperedgeMetadata> = self
            .hyperedges
            .iter()
            .map(|(id, edge)| {
                (
                    id.clone(),
                    HyperedgeMetadata {
                        text: edge.text.clone(),
                        entities: edge.entities.clone(),
                        score: edge.score,
                    },
                )
            })
            .collect();
        std::fs::write(
            dir.join("hypergraph_metadata.json"),
            serde_json::to_string_pretty(&metadata)?,
        )?;

        std::fs::write(
            dir.join("passage_to_hyperedge.json"),
            serde_json::to_string_pretty(&self.passage_to_hyperedges)?,
        )?;

        write_adjacency_bin(&dir.join("hypergraph_adjacency.bin"), &self.entity_to_hyperedges)?;

        Ok(())
    }

    pub fn load(hypergraph_dir: impl AsRef<Path>) -> Self {
        let dir = hypergraph_dir.as_ref();
        let metadata: HashMap<String, HyperedgeMetadata> =
            read_json_or_default(&dir.join("hypergraph_metadata.json"));
        let passage_to_hyperedges: HashMap<String, Vec<String>> =
            read_json_or_default(&dir.join("passage_to_hyperedge.json"));
        let entity_to_hyperedges = read_adjacency_bin(&dir.join("hypergraph_adjacency.bin"));

        let hyperedges = metadata
            .into_iter()
            .map(|(id, m)| {
                let edge = Hyperedge {
                    hash_id: id.clone(),
                    text: m.text,
                    entities: m.entities,
                    score: m.score,
                };
                (id, edge)
            })
            .collect();

        Self {
            hyperedges,
            entity_to_hyperedges,
            passage_to_hyperedges,
        }
    }
}

fn read_json_or_default<T: Default + for<'de> Deserialize<'de>>(path: &PathBuf) -> T {
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
            tracing::warn!(error = %e, path = %path.display(), "corrupt hypergraph json, starting empty");
            T::default()
        }),
        Err(_) => T::default(),
    }
}

/// A deliberately simple length-prefixed binary format: u32 entity count,
/// then per entity a u32-length hash string followed by a u32 edge count and
/// that many u32-length hyperedge id strings.
fn write_adjacency_bin(path: &Path, adjacency: &HashMap<String, HashSet<String>>) -> Result<()> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&(adjacency.len() as u32).to_le_bytes());
    let mut entities: Vec<&String> = adjacency.keys().collect();
    entities.sort();
    for entity_hash in entities {
        write_string(&mut buf, entity_hash);
        let edges = &adjacency[entity_hash];
        let mut ids: Vec<&String> = edges.iter().collect();
        ids.sort();
        buf.extend_from_slice(&(ids.len() as u32).to_le_bytes());
        for id in ids {
            write_string(&mut buf, id);
        }
    }
    std::fs::write(path, buf)?;
    Ok(())
}

fn read_adjacency_bin(path: &Path) -> HashMap<String, HashSet<String>> {
    let mut result = HashMap::new();
    let Ok(mut file) = std::fs::File::open(path) else {
        return result;
    };
    let mut buf = Vec::new();
    if file.read_to_end(&mut buf).is_err() {
        return result;
    }
    let mut cursor = 0usize;
    let Some(entity_count) = read_u32(&buf, &mut cursor) else {
        return result;
    };
    for _ in 0..entity_count {
        let Some(entity_hash) = read_string(&buf, &mut cursor) else {
            break;
        };
        let Some(edge_count) = read_u32(&buf, &mut cursor) else {
            break;
        };
        let mut ids = HashSet::new();
        for _ in 0..edge_count {
            let Some(id) = read_string(&buf, &mut cursor) else {
                break;
            };
            ids.insert(id);
        }
        result.insert(entity_hash, ids);
    }
    result
}

fn write_string(buf: &mut Vec<u8>, s: &str) {
    let bytes = s.as_bytes();
    buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    buf.extend_from_slice(bytes);
}

fn read_u32(buf: &[u8], cursor: &mut usize) -> Option<u32> {
    if *cursor + 4 > buf.len() {
        return None;
    }
    let value = u32::from_le_bytes(buf[*cursor..*cursor + 4].try_into().unwrap());
    *cursor += 4;
    Some(value)
}

fn read_string(buf: &[u8], cursor: &mut usize) -> Option<String> {
    let len = read_u32(buf, cursor)? as usize;
    if *cursor + len > buf.len() {
        return None;
    }
    let s = String::from_utf8_lossy(&buf[*cursor..*cursor + len]).into_owned();
    *cursor += len;
    Some(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_edges() -> Vec<Hyperedge> {
        let entities = vec!["aspirin".to_string(), "headache".to_string()];
        let text = "Aspirin relieves headache in most adult patients".to_string();
        let hash_id = Hyperedge::hash_id_for(&text, &entities);
        vec![Hyperedge {
            hash_id,
            text,
            entities,
            score: 1.1,
        }]
    }

    #[test]
    fn build_indexes_entities_by_unified_hash() {
        let store = HypergraphStore::build(sample_edges(), &[]);
        let entity_hash = hash_for(Namespace::Entity, "aspirin");
        assert_eq!(store.hyperedges_for_entity(&entity_hash).len(), 1);
    }

    #[test]
    fn build_matches_passages_by_substring() {
        let passages = vec![(
            "passage-1".to_string(),
            "Aspirin relieves headache in most adult patients, per guidelines.".to_string(),
        )];
        let store = HypergraphStore::build(sample_edges(), &passages);
        assert_eq!(store.hyperedges_for_passage("passage-1").len(), 1);
    }

    #[test]
    fn round_trips_through_save_and_load() {
        let passages = vec![(
            "passage-1".to_string(),
            "Aspirin relieves headache in most adult patients, per guidelines.".to_string(),
        )];
        let store = HypergraphStore::build(sample_edges(), &passages);
        let dir = tempfile::tempdir().unwrap();
        store.save(dir.path()).unwrap();
        let loaded = HypergraphStore::load(dir.path());

        assert_eq!(loaded.hyperedges.len(), store.hyperedges.len());
        assert_eq!(
            loaded.entity_to_hyperedges.len(),
            store.entity_to_hyperedges.len()
        );
        assert_eq!(loaded.hyperedges_for_passage("passage-1").len(), 1);
    }

    #[test]
    fn missing_files_load_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = HypergraphStore::load(dir.path());
        assert!(loaded.is_empty());
    }
}
