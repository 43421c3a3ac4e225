//! Vector persistence and nearest-neighbor query layer.
//!
//! One contract, two backends:
//!
//! - [`IndexedVectorStore`] delegates to a dedicated vector-search service.
//! - [`MemoryVectorStore`] is the brute-force fallback: a full-namespace
//!   scan over an in-process table.
//!
//! [`DegradingVectorStore`] composes the two: reads go primary-first and
//! degrade to the fallback when the indexed backend is unreachable, because
//! availability is prioritized over latency. Every degrade event is logged
//! and never surfaces as an error to the caller; only when all backends fail
//! does the error propagate (an empty result must mean "zero matches", never
//! "the search broke").

pub mod indexed;
pub mod memory;
pub mod types;

use std::sync::Arc;

use async_trait::async_trait;

pub use indexed::{IndexedStoreConfig, IndexedVectorStore};
pub use memory::MemoryVectorStore;
pub use types::{
    FieldCondition, JobMetadata, Namespace, ProfileMetadata, QueryFilter, QueryRequest,
    RecordMetadata, SimilarityHit, SkillMetadata, VectorRecord, VectorStoreError,
    VectorStoreResult,
};

/// Persistence and nearest-neighbor query contract shared by all backends.
///
/// Invariants every implementation upholds:
/// - `upsert` replaces the record with the same id within the namespace
///   (idempotent, last write wins) and rejects metadata whose variant does
///   not belong to the namespace.
/// - `query` applies the filter *before* ranking, honors the id exclusion
///   set, treats `top_k` as a hard cap, and returns hits in descending
///   score order.
/// - `delete` of a non-existent id succeeds.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert(&self, namespace: Namespace, record: VectorRecord) -> VectorStoreResult<()>;

    async fn fetch(&self, namespace: Namespace, id: &str)
        -> VectorStoreResult<Option<VectorRecord>>;

    async fn query(
        &self,
        namespace: Namespace,
        request: QueryRequest,
    ) -> VectorStoreResult<Vec<SimilarityHit>>;

    async fn delete(&self, namespace: Namespace, id: &str) -> VectorStoreResult<()>;
}

/// Store wrapper that degrades from the indexed backend to the brute-force
/// fallback instead of failing the request.
///
/// Writes are mirrored: the fallback is written first (it is the
/// availability floor and must stay authoritative), then the indexed backend
/// best-effort. Reads try the indexed backend first and fall back on any
/// failure. With no primary configured, the wrapper is a plain pass-through
/// to the fallback.
pub struct DegradingVectorStore {
    primary: Option<Arc<dyn VectorStore>>,
    fallback: Arc<dyn VectorStore>,
}

impl DegradingVectorStore {
    pub fn new(primary: Option<Arc<dyn VectorStore>>, fallback: Arc<dyn VectorStore>) -> Self {
        Self { primary, fallback }
    }

    /// Fallback-only construction for deployments without a vector service.
    pub fn fallback_only(fallback: Arc<dyn VectorStore>) -> Self {
        Self {
            primary: None,
            fallback,
        }
    }
}

#[async_trait]
impl VectorStore for DegradingVectorStore {
    async fn upsert(&self, namespace: Namespace, record: VectorRecord) -> VectorStoreResult<()> {
        // The fallback write is the one that must succeed; a failure here
        // propagates because a half-written vector is worse than a failed
        // write.
        self.fallback.upsert(namespace, record.clone()).await?;

        if let Some(primary) = &self.primary {
            if let Err(err) = primary.upsert(namespace, record).await {
                log::warn!(
                    "indexed backend upsert failed in namespace {namespace}, fallback holds the record: {err}"
                );
            }
        }
        Ok(())
    }

    async fn fetch(
        &self,
        namespace: Namespace,
        id: &str,
    ) -> VectorStoreResult<Option<VectorRecord>> {
        if let Some(primary) = &self.primary {
            match primary.fetch(namespace, id).await {
                Ok(found) => return Ok(found),
                Err(err) => {
                    log::warn!(
                        "indexed backend fetch failed in namespace {namespace}, degrading to fallback: {err}"
                    );
                }
            }
        }
        self.fallback.fetch(namespace, id).await
    }

    async fn query(
        &self,
        namespace: Namespace,
        request: QueryRequest,
    ) -> VectorStoreResult<Vec<SimilarityHit>> {
        // Invalid filters are caller bugs, not availability problems, so
        // they are rejected before touching either backend.
        request.filter.validate_for(namespace)?;

        if let Some(primary) = &self.primary {
            match primary.query(namespace, request.clone()).await {
                Ok(hits) => return Ok(hits),
                Err(err) => {
                    log::warn!(
                        "indexed backend query failed in namespace {namespace}, degrading to fallback: {err}"
                    );
                }
            }
        }
        self.fallback.query(namespace, request).await
    }

    async fn delete(&self, namespace: Namespace, id: &str) -> VectorStoreResult<()> {
        self.fallback.delete(namespace, id).await?;
        if let Some(primary) = &self.primary {
            if let Err(err) = primary.delete(namespace, id).await {
                log::warn!(
                    "indexed backend delete failed in namespace {namespace} for {id}: {err}"
                );
            }
        }
        Ok(())
    }
}
