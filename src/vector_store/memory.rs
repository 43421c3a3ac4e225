//! Brute-force fallback backend.
//!
//! Vectors live in one in-process table per namespace, guarded by a
//! `tokio::sync::RwLock`. A query takes a read lock, loads the candidate set
//! matching the filter, computes cosine similarity against every candidate,
//! and returns the top K, at O(N·D) per query.
//!
//! Scaling ceiling: this backend is intended for a single-tenant or
//! small-tenant corpus. Past low tens of thousands of vectors per namespace
//! it needs a redesign (sharding or an approximate nearest-neighbor index);
//! at that point the indexed backend should be the primary and this one only
//! a degrade target.
//!
//! Contents can optionally be snapshotted to a JSON file and reloaded, so a
//! deployment without a dedicated vector service still survives restarts.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::similarity::{self, Candidate};
use crate::vector_store::types::{
    Namespace, QueryRequest, SimilarityHit, VectorRecord, VectorStoreError, VectorStoreResult,
};
use crate::vector_store::VectorStore;

/// A stored row: the record plus a monotonically increasing insertion
/// sequence. The sequence keeps tie-breaking stable by first-insertion order
/// even though rows live in a hash map; an upsert of an existing id keeps
/// its original sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRow {
    seq: u64,
    record: VectorRecord,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct NamespaceTable {
    rows: HashMap<String, StoredRow>,
    next_seq: u64,
    /// Dimensionality pinned by the first record upserted, enforced on
    /// every subsequent upsert and query.
    dimension: Option<usize>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Tables {
    profiles: NamespaceTable,
    jobs: NamespaceTable,
    skills: NamespaceTable,
}

impl Tables {
    fn table(&self, namespace: Namespace) -> &NamespaceTable {
        match namespace {
            Namespace::Profiles => &self.profiles,
            Namespace::Jobs => &self.jobs,
            Namespace::Skills => &self.skills,
        }
    }

    fn table_mut(&mut self, namespace: Namespace) -> &mut NamespaceTable {
        match namespace {
            Namespace::Profiles => &mut self.profiles,
            Namespace::Jobs => &mut self.jobs,
            Namespace::Skills => &mut self.skills,
        }
    }
}

/// In-memory brute-force vector store.
#[derive(Debug, Default, Clone)]
pub struct MemoryVectorStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently stored in a namespace.
    pub async fn len(&self, namespace: Namespace) -> usize {
        self.tables.read().await.table(namespace).rows.len()
    }

    pub async fn is_empty(&self, namespace: Namespace) -> bool {
        self.len(namespace).await == 0
    }

    /// Write all namespaces to a JSON snapshot file.
    pub async fn save_snapshot(&self, path: &Path) -> VectorStoreResult<()> {
        let tables = self.tables.read().await;
        let json = serde_json::to_vec_pretty(&*tables)?;
        std::fs::write(path, json).map_err(|e| VectorStoreError::Storage {
            message: format!("failed to write snapshot {}: {}", path.display(), e),
        })
    }

    /// Replace all namespaces with the contents of a JSON snapshot file.
    pub async fn load_snapshot(&self, path: &Path) -> VectorStoreResult<()> {
        let bytes = std::fs::read(path).map_err(|e| VectorStoreError::Storage {
            message: format!("failed to read snapshot {}: {}", path.display(), e),
        })?;
        let loaded: Tables = serde_json::from_slice(&bytes)?;
        *self.tables.write().await = loaded;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert(&self, namespace: Namespace, record: VectorRecord) -> VectorStoreResult<()> {
        record.validate()?;
        if !record.metadata.belongs_to(namespace) {
            return Err(VectorStoreError::NamespaceMismatch {
                namespace,
                kind: record.metadata.kind(),
            });
        }

        let mut tables = self.tables.write().await;
        let table = tables.table_mut(namespace);

        match table.dimension {
            Some(expected) if expected != record.values.len() => {
                return Err(VectorStoreError::DimensionMismatch {
                    namespace,
                    expected,
                    actual: record.values.len(),
                });
            }
            None => table.dimension = Some(record.values.len()),
            _ => {}
        }

        // Last write wins; an existing row keeps its insertion sequence so
        // equal-score tie ordering stays stable across re-upserts.
        let seq = match table.rows.get(&record.id) {
            Some(existing) => existing.seq,
            None => {
                let seq = table.next_seq;
                table.next_seq += 1;
                seq
            }
        };
        table.rows.insert(record.id.clone(), StoredRow { seq, record });
        Ok(())
    }

    async fn fetch(
        &self,
        namespace: Namespace,
        id: &str,
    ) -> VectorStoreResult<Option<VectorRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .table(namespace)
            .rows
            .get(id)
            .map(|row| row.record.clone()))
    }

    async fn query(
        &self,
        namespace: Namespace,
        request: QueryRequest,
    ) -> VectorStoreResult<Vec<SimilarityHit>> {
        request.filter.validate_for(namespace)?;

        // Read lock only: the full-namespace scan must not block concurrent
        // upserts beyond the lock's writer queueing.
        let tables = self.tables.read().await;
        let table = tables.table(namespace);

        if let Some(expected) = table.dimension {
            if expected != request.vector.len() {
                return Err(VectorStoreError::DimensionMismatch {
                    namespace,
                    expected,
                    actual: request.vector.len(),
                });
            }
        }

        // Filter before ranking, in stable first-insertion order.
        let mut rows: Vec<&StoredRow> = table
            .rows
            .values()
            .filter(|row| request.filter.matches(&row.record.metadata))
            .collect();
        rows.sort_by_key(|row| row.seq);

        let candidates: Vec<Candidate<'_>> = rows
            .iter()
            .map(|row| Candidate {
                id: row.record.id.as_str(),
                values: row.record.values.as_slice(),
            })
            .collect();

        let scored = similarity::top_k(
            &request.vector,
            &candidates,
            request.top_k,
            request.min_score,
            &request.filter.exclude_ids,
        )?;

        let hits = scored
            .into_iter()
            .map(|s| {
                // top_k only returns ids taken from the candidate set.
                let row = &table.rows[&s.id];
                SimilarityHit {
                    id: s.id,
                    score: s.score,
                    metadata: row.record.metadata.clone(),
                }
            })
            .collect();
        Ok(hits)
    }

    async fn delete(&self, namespace: Namespace, id: &str) -> VectorStoreResult<()> {
        // Idempotent: deleting a missing id is not an error.
        let mut tables = self.tables.write().await;
        let table = tables.table_mut(namespace);
        table.rows.remove(id);
        if table.rows.is_empty() {
            // An emptied namespace may be re-populated with vectors from a
            // different embedding model.
            table.dimension = None;
        }
        Ok(())
    }
}
