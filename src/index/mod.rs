//! Local vector store with upsert-by-URL semantics
//!
//! Thin wrapper over an HNSW index that enforces the history contract: the
//! URL is the sole deduplication key, so adding a batch first tombstones any
//! existing entries with the same URLs, then inserts the new ones. HNSW has
//! no hard delete, so replaced slots are tombstoned and filtered at query
//! time; live documents are snapshotted to JSON so the index survives
//! restarts (the graph is rebuilt on load).
//!
//! Mutating operations take `&mut self`; callers that share the store across
//! tasks wrap it in a `RwLock`, which makes each upsert atomic from the
//! point of view of concurrent queries.

use crate::history::DocMetadata;
use ahash::{AHashMap, AHashSet};
use hnsw_rs::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Invalid dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Batch length mismatch: {documents} documents, {embeddings} embeddings, {metadatas} metadatas")]
    BatchMismatch {
        documents: usize,
        embeddings: usize,
        metadatas: usize,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Snapshot error: {0}")]
    SnapshotError(String),
}

/// A stored document: text, metadata and its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub text: String,
    pub metadata: DocMetadata,
    pub embedding: Vec<f32>,
}

/// A nearest-neighbor hit. Smaller distance means more similar.
#[derive(Debug, Clone)]
pub struct QueryHit {
    pub text: String,
    pub metadata: DocMetadata,
    pub distance: f32,
}

const HNSW_MAX_ELEMENTS: usize = 100_000;
const HNSW_MAX_LAYER: usize = 16;
const DEFAULT_EF_SEARCH: usize = 200;

/// Vector store keyed by URL.
pub struct VectorStore {
    index: Hnsw<'static, f32, DistCosine>,
    dimension: usize,
    ef_construction: usize,
    hnsw_m: usize,
    /// Slot id -> document; slots are never reused
    entries: Vec<IndexedDocument>,
    /// URL -> live slot id
    live: AHashMap<String, usize>,
    /// Tombstoned slot ids, filtered out of query results
    dead: AHashSet<usize>,
    /// JSON snapshot location; `None` keeps the store memory-only
    snapshot_path: Option<PathBuf>,
}

impl VectorStore {
    /// Create a store, loading the snapshot at `snapshot_path` if one exists.
    pub fn new(
        dimension: usize,
        ef_construction: usize,
        hnsw_m: usize,
        snapshot_path: Option<PathBuf>,
    ) -> Result<Self, IndexError> {
        let mut store = Self {
            index: Self::fresh_index(hnsw_m, ef_construction),
            dimension,
            ef_construction,
            hnsw_m,
            entries: Vec::new(),
            live: AHashMap::new(),
            dead: AHashSet::new(),
            snapshot_path,
        };

        if let Some(path) = store.snapshot_path.clone() {
            if path.exists() {
                store.load_snapshot(&path)?;
            }
        }

        Ok(store)
    }

    /// Memory-only store, mainly for tests.
    pub fn in_memory(dimension: usize) -> Result<Self, IndexError> {
        Self::new(dimension, 200, 16, None)
    }

    fn fresh_index(hnsw_m: usize, ef_construction: usize) -> Hnsw<'static, f32, DistCosine> {
        Hnsw::<f32, DistCosine>::new(
            hnsw_m,
            HNSW_MAX_ELEMENTS,
            HNSW_MAX_LAYER,
            ef_construction,
            DistCosine,
        )
    }

    /// Upsert a batch of documents keyed by URL.
    ///
    /// Existing entries with the same URLs are tombstoned before the new
    /// batch is inserted; within a batch, a repeated URL keeps the last
    /// occurrence.
    pub fn add(
        &mut self,
        documents: Vec<String>,
        embeddings: Vec<Vec<f32>>,
        metadatas: Vec<DocMetadata>,
    ) -> Result<(), IndexError> {
        if documents.len() != embeddings.len() || documents.len() != metadatas.len() {
            return Err(IndexError::BatchMismatch {
                documents: documents.len(),
                embeddings: embeddings.len(),
                metadatas: metadatas.len(),
            });
        }

        for embedding in &embeddings {
            if embedding.len() != self.dimension {
                return Err(IndexError::InvalidDimension {
                    expected: self.dimension,
                    actual: embedding.len(),
                });
            }
        }

        for ((text, embedding), metadata) in documents
            .into_iter()
            .zip(embeddings.into_iter())
            .zip(metadatas.into_iter())
        {
            self.insert_document(IndexedDocument {
                text,
                metadata,
                embedding,
            });
        }

        self.persist()?;
        Ok(())
    }

    fn insert_document(&mut self, doc: IndexedDocument) {
        if let Some(old_slot) = self.live.remove(&doc.metadata.url) {
            self.dead.insert(old_slot);
        }

        let slot = self.entries.len();
        self.index.insert((&doc.embedding, slot));
        self.live.insert(doc.metadata.url.clone(), slot);
        self.entries.push(doc);
    }

    /// Top-k nearest neighbors by cosine distance, live entries only.
    pub fn query(&self, embedding: &[f32], top_k: usize) -> Result<Vec<QueryHit>, IndexError> {
        if embedding.len() != self.dimension {
            return Err(IndexError::InvalidDimension {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        if self.live.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        // Over-ask so tombstoned slots do not eat into the requested count
        let fetch = (top_k + self.dead.len()).min(self.entries.len());
        let neighbours = self.index.search(embedding, fetch, DEFAULT_EF_SEARCH);

        let hits = neighbours
            .into_iter()
            .filter(|n| !self.dead.contains(&n.d_id))
            .filter_map(|n| {
                self.entries.get(n.d_id).map(|entry| QueryHit {
                    text: entry.text.clone(),
                    metadata: entry.metadata.clone(),
                    distance: n.distance,
                })
            })
            .take(top_k)
            .collect();

        Ok(hits)
    }

    /// Delete documents by URL. Unknown URLs are ignored.
    pub fn delete_by_urls(&mut self, urls: &[String]) -> Result<(), IndexError> {
        for url in urls {
            if let Some(slot) = self.live.remove(url) {
                self.dead.insert(slot);
            }
        }
        self.persist()
    }

    /// Remove all documents. Safe to call on an empty store.
    pub fn clear(&mut self) -> Result<(), IndexError> {
        self.index = Self::fresh_index(self.hnsw_m, self.ef_construction);
        self.entries.clear();
        self.live.clear();
        self.dead.clear();
        self.persist()
    }

    /// Number of live documents.
    pub fn count(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Live documents in insertion order, for administrative listings.
    pub fn live_documents(&self) -> Vec<(&str, &DocMetadata)> {
        let mut slots: Vec<usize> = self.live.values().copied().collect();
        slots.sort_unstable();
        slots
            .into_iter()
            .filter_map(|slot| {
                self.entries
                    .get(slot)
                    .map(|e| (e.text.as_str(), &e.metadata))
            })
            .collect()
    }

    fn persist(&self) -> Result<(), IndexError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut slots: Vec<usize> = self.live.values().copied().collect();
        slots.sort_unstable();
        let live_docs: Vec<&IndexedDocument> =
            slots.iter().filter_map(|s| self.entries.get(*s)).collect();

        let json = serde_json::to_vec(&live_docs)
            .map_err(|e| IndexError::SnapshotError(e.to_string()))?;

        // Write-then-rename so a crash never leaves a truncated snapshot
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;

        tracing::debug!(
            "Persisted {} documents to {}",
            live_docs.len(),
            path.display()
        );
        Ok(())
    }

    fn load_snapshot(&mut self, path: &PathBuf) -> Result<(), IndexError> {
        let data = std::fs::read(path)?;
        let docs: Vec<IndexedDocument> =
            serde_json::from_slice(&data).map_err(|e| IndexError::SnapshotError(e.to_string()))?;

        for doc in docs {
            if doc.embedding.len() != self.dimension {
                return Err(IndexError::InvalidDimension {
                    expected: self.dimension,
                    actual: doc.embedding.len(),
                });
            }
            self.insert_document(doc);
        }

        tracing::info!(
            "Loaded {} documents from {}",
            self.live.len(),
            path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn meta(url: &str, visits: i64) -> DocMetadata {
        DocMetadata {
            url: url.to_string(),
            title: String::new(),
            domain: String::new(),
            visit_count: visits,
            visit_time: String::new(),
        }
    }

    fn unit_vec(dim: usize, hot: usize) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[hot] = 1.0;
        v
    }

    #[test]
    fn test_add_and_query() {
        let mut store = VectorStore::in_memory(8).unwrap();
        store
            .add(
                vec!["doc a".to_string(), "doc b".to_string()],
                vec![unit_vec(8, 0), unit_vec(8, 1)],
                vec![meta("https://a.com", 1), meta("https://b.com", 1)],
            )
            .unwrap();

        assert_eq!(store.count(), 2);

        let hits = store.query(&unit_vec(8, 0), 1).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].metadata.url, "https://a.com");
        assert!(hits[0].distance < 0.01);
    }

    #[test]
    fn test_upsert_same_url_leaves_one_live_entry() {
        let mut store = VectorStore::in_memory(8).unwrap();
        store
            .add(
                vec!["old text".to_string()],
                vec![unit_vec(8, 0)],
                vec![meta("https://a.com", 1)],
            )
            .unwrap();
        store
            .add(
                vec!["new text".to_string()],
                vec![unit_vec(8, 0)],
                vec![meta("https://a.com", 5)],
            )
            .unwrap();

        assert_eq!(store.count(), 1);

        let hits = store.query(&unit_vec(8, 0), 5).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "new text");
        assert_eq!(hits[0].metadata.visit_count, 5);
    }

    #[test]
    fn test_delete_by_urls() {
        let mut store = VectorStore::in_memory(8).unwrap();
        store
            .add(
                vec!["a".to_string(), "b".to_string()],
                vec![unit_vec(8, 0), unit_vec(8, 1)],
                vec![meta("https://a.com", 1), meta("https://b.com", 1)],
            )
            .unwrap();

        store
            .delete_by_urls(&["https://a.com".to_string(), "https://missing.com".to_string()])
            .unwrap();

        assert_eq!(store.count(), 1);
        let hits = store.query(&unit_vec(8, 0), 2).unwrap();
        assert!(hits.iter().all(|h| h.metadata.url != "https://a.com"));
    }

    #[test]
    fn test_clear_is_safe_on_empty_store() {
        let mut store = VectorStore::in_memory(8).unwrap();
        store.clear().unwrap();
        assert_eq!(store.count(), 0);

        store
            .add(
                vec!["a".to_string()],
                vec![unit_vec(8, 0)],
                vec![meta("https://a.com", 1)],
            )
            .unwrap();
        store.clear().unwrap();
        assert!(store.is_empty());
        assert!(store.query(&unit_vec(8, 0), 3).unwrap().is_empty());
    }

    #[test]
    fn test_dimension_validation() {
        let mut store = VectorStore::in_memory(8).unwrap();
        let result = store.add(
            vec!["a".to_string()],
            vec![vec![1.0; 4]],
            vec![meta("https://a.com", 1)],
        );
        assert!(matches!(result, Err(IndexError::InvalidDimension { .. })));

        assert!(store.query(&[1.0; 4], 1).is_err());
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("history.json");

        {
            let mut store = VectorStore::new(8, 200, 16, Some(path.clone())).unwrap();
            store
                .add(
                    vec!["doc a".to_string()],
                    vec![unit_vec(8, 0)],
                    vec![meta("https://a.com", 3)],
                )
                .unwrap();
        }

        let store = VectorStore::new(8, 200, 16, Some(path)).unwrap();
        assert_eq!(store.count(), 1);
        let hits = store.query(&unit_vec(8, 0), 1).unwrap();
        assert_eq!(hits[0].metadata.url, "https://a.com");
        assert_eq!(hits[0].metadata.visit_count, 3);
    }

    #[test]
    fn test_snapshot_drops_tombstones() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("history.json");

        {
            let mut store = VectorStore::new(8, 200, 16, Some(path.clone())).unwrap();
            store
                .add(
                    vec!["old".to_string()],
                    vec![unit_vec(8, 0)],
                    vec![meta("https://a.com", 1)],
                )
                .unwrap();
            store
                .add(
                    vec!["new".to_string()],
                    vec![unit_vec(8, 1)],
                    vec![meta("https://a.com", 2)],
                )
                .unwrap();
        }

        let store = VectorStore::new(8, 200, 16, Some(path)).unwrap();
        assert_eq!(store.count(), 1);
        let hits = store.query(&unit_vec(8, 1), 2).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "new");
    }
}
