//! Indexed backend: a thin client for a dedicated vector-search service.
//!
//! All four store operations delegate to the remote service over HTTP. The
//! client's single responsibility beyond transport is translating the
//! generic [`QueryFilter`] language into the service's native filter syntax
//! (`$eq` / `$ne` per field plus an `excludeIds` list).
//!
//! Any transport or server-side failure maps to
//! [`VectorStoreError::BackendUnavailable`]; the degrading store wrapper
//! turns that into a logged fallback rather than a caller-visible error.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::vector_store::types::{
    FieldCondition, Namespace, QueryFilter, QueryRequest, SimilarityHit, VectorRecord,
    VectorStoreError, VectorStoreResult,
};
use crate::vector_store::VectorStore;

/// Connection settings for the vector-search service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedStoreConfig {
    pub base_url: String,
    /// Hard per-request timeout; a stuck service fails rather than hangs.
    pub timeout_ms: u64,
}

impl Default for IndexedStoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:6333".to_string(),
            timeout_ms: 5_000,
        }
    }
}

/// HTTP client for the indexed vector-search backend.
#[derive(Debug, Clone)]
pub struct IndexedVectorStore {
    config: IndexedStoreConfig,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    matches: Vec<SimilarityHit>,
}

impl IndexedVectorStore {
    pub fn new(config: IndexedStoreConfig) -> VectorStoreResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| VectorStoreError::BackendUnavailable {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { config, client })
    }

    fn url(&self, namespace: Namespace, tail: &str) -> String {
        format!(
            "{}/namespaces/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            namespace.as_str(),
            tail
        )
    }

    /// Translate the generic filter into the service's native syntax.
    ///
    /// A `BTreeMap` keeps field order deterministic in the request body,
    /// which keeps wiremock expectations and request logs reproducible.
    fn translate_filter(filter: &QueryFilter) -> serde_json::Value {
        let mut fields = BTreeMap::new();
        for (field, condition) in &filter.conditions {
            let clause = match condition {
                FieldCondition::Equals(v) => json!({ "$eq": v }),
                FieldCondition::NotEquals(v) => json!({ "$ne": v }),
            };
            fields.insert(field.clone(), clause);
        }

        let mut exclude: Vec<&String> = filter.exclude_ids.iter().collect();
        exclude.sort();

        json!({
            "fields": fields,
            "excludeIds": exclude,
        })
    }

    fn unavailable(context: &str, err: impl std::fmt::Display) -> VectorStoreError {
        VectorStoreError::BackendUnavailable {
            message: format!("{context}: {err}"),
        }
    }

    fn check_status(context: &str, status: StatusCode) -> VectorStoreResult<()> {
        if status.is_success() {
            Ok(())
        } else {
            Err(VectorStoreError::BackendUnavailable {
                message: format!("{context}: HTTP {status}"),
            })
        }
    }
}

#[async_trait]
impl VectorStore for IndexedVectorStore {
    async fn upsert(&self, namespace: Namespace, record: VectorRecord) -> VectorStoreResult<()> {
        record.validate()?;
        if !record.metadata.belongs_to(namespace) {
            return Err(VectorStoreError::NamespaceMismatch {
                namespace,
                kind: record.metadata.kind(),
            });
        }

        let response = self
            .client
            .post(self.url(namespace, "upsert"))
            .json(&json!({ "vectors": [record] }))
            .send()
            .await
            .map_err(|e| Self::unavailable("upsert", e))?;
        Self::check_status("upsert", response.status())
    }

    async fn fetch(
        &self,
        namespace: Namespace,
        id: &str,
    ) -> VectorStoreResult<Option<VectorRecord>> {
        let response = self
            .client
            .get(self.url(namespace, &format!("vectors/{id}")))
            .send()
            .await
            .map_err(|e| Self::unavailable("fetch", e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::check_status("fetch", response.status())?;

        let record = response
            .json::<VectorRecord>()
            .await
            .map_err(|e| Self::unavailable("fetch decode", e))?;
        Ok(Some(record))
    }

    async fn query(
        &self,
        namespace: Namespace,
        request: QueryRequest,
    ) -> VectorStoreResult<Vec<SimilarityHit>> {
        // Validate locally before spending a network round trip.
        request.filter.validate_for(namespace)?;

        let body = json!({
            "vector": request.vector,
            "topK": request.top_k,
            "minScore": request.min_score,
            "filter": Self::translate_filter(&request.filter),
        });

        let response = self
            .client
            .post(self.url(namespace, "query"))
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::unavailable("query", e))?;
        Self::check_status("query", response.status())?;

        let parsed = response
            .json::<QueryResponse>()
            .await
            .map_err(|e| Self::unavailable("query decode", e))?;
        Ok(parsed.matches)
    }

    async fn delete(&self, namespace: Namespace, id: &str) -> VectorStoreResult<()> {
        let response = self
            .client
            .delete(self.url(namespace, &format!("vectors/{id}")))
            .send()
            .await
            .map_err(|e| Self::unavailable("delete", e))?;

        // Deleting a missing id is not an error.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::check_status("delete", response.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_translation_emits_native_operators() {
        let filter = QueryFilter::new()
            .field_equals("location", "Remote")
            .field_not_equals("experience_level", "Intern")
            .exclude_id("job_3");

        let translated = IndexedVectorStore::translate_filter(&filter);
        assert_eq!(translated["fields"]["location"]["$eq"], "Remote");
        assert_eq!(translated["fields"]["experience_level"]["$ne"], "Intern");
        assert_eq!(translated["excludeIds"][0], "job_3");
    }

    #[test]
    fn empty_filter_translates_to_empty_clauses() {
        let translated = IndexedVectorStore::translate_filter(&QueryFilter::new());
        assert!(translated["fields"].as_object().unwrap().is_empty());
        assert!(translated["excludeIds"].as_array().unwrap().is_empty());
    }

    #[test]
    fn urls_are_namespaced() {
        let store = IndexedVectorStore::new(IndexedStoreConfig {
            base_url: "http://vectors.internal:6333/".to_string(),
            timeout_ms: 1_000,
        })
        .unwrap();
        assert_eq!(
            store.url(Namespace::Jobs, "query"),
            "http://vectors.internal:6333/namespaces/jobs/query"
        );
    }
}
