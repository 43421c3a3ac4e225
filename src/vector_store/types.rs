//! Core types shared by every vector store backend: namespaces, records,
//! per-namespace metadata variants, the query filter language, and the store
//! error taxonomy.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::similarity::SimilarityError;

/// Errors that can occur during vector store operations.
#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Similarity(#[from] SimilarityError),

    /// A record's metadata variant does not match the target namespace
    /// (for example a job record upserted into the "profiles" namespace).
    #[error("metadata kind {kind} does not belong to namespace {namespace}")]
    NamespaceMismatch {
        namespace: Namespace,
        kind: &'static str,
    },

    /// A stored or incoming vector disagrees with the namespace's
    /// dimensionality. Indicates model-version skew; never silently ignored.
    #[error("namespace {namespace} holds {expected}-dimensional vectors, got {actual}")]
    DimensionMismatch {
        namespace: Namespace,
        expected: usize,
        actual: usize,
    },

    /// The query filter references a field or operator the namespace does
    /// not support. Rejected before any scan or remote call executes.
    #[error("invalid filter: field '{field}' is not filterable in namespace {namespace}")]
    InvalidFilter { namespace: Namespace, field: String },

    #[error("invalid record: {reason}")]
    InvalidRecord { reason: String },

    #[error("storage error: {message}")]
    Storage { message: String },

    /// The indexed backend could not serve the request. The degrading store
    /// converts this into a logged fallback; it only reaches callers when no
    /// fallback is configured.
    #[error("indexed backend unavailable: {message}")]
    BackendUnavailable { message: String },
}

pub type VectorStoreResult<T> = Result<T, VectorStoreError>;

/// A logical partition of the vector store. Queries never cross namespaces:
/// a query against `Profiles` can never return a `Jobs` vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    Profiles,
    Jobs,
    Skills,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Profiles => "profiles",
            Namespace::Jobs => "jobs",
            Namespace::Skills => "skills",
        }
    }

    /// Metadata fields that may appear in a query filter for this namespace.
    pub fn filterable_fields(&self) -> &'static [&'static str] {
        match self {
            Namespace::Profiles => &["user_id", "location", "current_role", "target_role"],
            Namespace::Jobs => &[
                "location",
                "experience_level",
                "company",
                "source",
                "salary_range",
            ],
            Namespace::Skills => &["category", "industry_relevance"],
        }
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata stored alongside a profile vector: a snapshot of the profile at
/// embed time, not a live reference to the system of record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileMetadata {
    pub user_id: String,
    pub current_role: Option<String>,
    pub target_role: Option<String>,
    pub skills: Vec<String>,
    pub location: Option<String>,
    pub experience_years: Option<f32>,
    /// Role titles along the user's career path, already in chronological
    /// order (the profile vector manager sorts before upserting).
    pub career_path: Vec<String>,
    pub updated_at: DateTime<Utc>,
    /// SHA-256 of the canonical description this vector was embedded from.
    /// Rebuilds with an unchanged description skip the embedding call.
    pub description_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMetadata {
    pub title: String,
    pub company: Option<String>,
    pub required_skills: Vec<String>,
    pub location: Option<String>,
    pub experience_level: Option<String>,
    pub salary_range: Option<String>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillMetadata {
    pub name: String,
    pub category: Option<String>,
    pub related_skills: Vec<String>,
    pub industry_relevance: Option<String>,
}

/// Tagged metadata variant, one shape per namespace. Replaces free-form
/// duck-typed payloads with fixed, validated shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordMetadata {
    Profile(ProfileMetadata),
    Job(JobMetadata),
    Skill(SkillMetadata),
}

impl RecordMetadata {
    pub fn kind(&self) -> &'static str {
        match self {
            RecordMetadata::Profile(_) => "profile",
            RecordMetadata::Job(_) => "job",
            RecordMetadata::Skill(_) => "skill",
        }
    }

    /// Whether this metadata variant belongs in the given namespace.
    pub fn belongs_to(&self, namespace: Namespace) -> bool {
        matches!(
            (self, namespace),
            (RecordMetadata::Profile(_), Namespace::Profiles)
                | (RecordMetadata::Job(_), Namespace::Jobs)
                | (RecordMetadata::Skill(_), Namespace::Skills)
        )
    }

    /// Look up a filterable field value by name. Fields are stringly-keyed
    /// because that is what the filter language and the indexed backend's
    /// native syntax operate on. `None` for fields absent on this record.
    pub fn field(&self, name: &str) -> Option<String> {
        match self {
            RecordMetadata::Profile(p) => match name {
                "user_id" => Some(p.user_id.clone()),
                "location" => p.location.clone(),
                "current_role" => p.current_role.clone(),
                "target_role" => p.target_role.clone(),
                _ => None,
            },
            RecordMetadata::Job(j) => match name {
                "location" => j.location.clone(),
                "experience_level" => j.experience_level.clone(),
                "company" => j.company.clone(),
                "source" => j.source.clone(),
                "salary_range" => j.salary_range.clone(),
                _ => None,
            },
            RecordMetadata::Skill(s) => match name {
                "category" => s.category.clone(),
                "industry_relevance" => s.industry_relevance.clone(),
                _ => None,
            },
        }
    }
}

/// One stored vector with its metadata snapshot. At most one record per id
/// within a namespace; upsert semantics are last-write-wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: RecordMetadata,
}

impl VectorRecord {
    pub fn new(id: impl Into<String>, values: Vec<f32>, metadata: RecordMetadata) -> Self {
        Self {
            id: id.into(),
            values,
            metadata,
        }
    }

    /// Validate the record independent of any namespace: non-empty id,
    /// non-empty vector, finite components.
    pub fn validate(&self) -> VectorStoreResult<()> {
        if self.id.trim().is_empty() {
            return Err(VectorStoreError::InvalidRecord {
                reason: "record id is empty".to_string(),
            });
        }
        if self.values.is_empty() {
            return Err(VectorStoreError::InvalidRecord {
                reason: format!("record {} has an empty vector", self.id),
            });
        }
        if self.values.iter().any(|v| !v.is_finite()) {
            return Err(VectorStoreError::InvalidRecord {
                reason: format!("record {} contains non-finite components", self.id),
            });
        }
        Ok(())
    }
}

/// A single nearest-neighbor hit: id, cosine score, and a metadata snapshot
/// taken at query time. Mutating the source record later does not change a
/// hit already returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityHit {
    pub id: String,
    pub score: f32,
    pub metadata: RecordMetadata,
}

/// Equality / inequality condition over one metadata field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldCondition {
    Equals(String),
    NotEquals(String),
}

/// The generic filter language shared by both backends: per-field
/// equality/inequality predicates plus an explicit id exclusion set (used
/// for self-exclusion and "skills the user already has").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryFilter {
    #[serde(default)]
    pub conditions: HashMap<String, FieldCondition>,
    #[serde(default)]
    pub exclude_ids: HashSet<String>,
}

impl QueryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exclude_id(mut self, id: impl Into<String>) -> Self {
        self.exclude_ids.insert(id.into());
        self
    }

    pub fn field_equals(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions
            .insert(field.into(), FieldCondition::Equals(value.into()));
        self
    }

    pub fn field_not_equals(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions
            .insert(field.into(), FieldCondition::NotEquals(value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty() && self.exclude_ids.is_empty()
    }

    /// Reject filters naming fields the namespace does not support, before
    /// any scan or remote call executes.
    pub fn validate_for(&self, namespace: Namespace) -> VectorStoreResult<()> {
        for field in self.conditions.keys() {
            if !namespace.filterable_fields().contains(&field.as_str()) {
                return Err(VectorStoreError::InvalidFilter {
                    namespace,
                    field: field.clone(),
                });
            }
        }
        Ok(())
    }

    /// Whether a record's metadata satisfies every field condition. Fields
    /// absent on the record never satisfy an `Equals` condition and always
    /// satisfy a `NotEquals` condition.
    pub fn matches(&self, metadata: &RecordMetadata) -> bool {
        self.conditions.iter().all(|(field, condition)| {
            let value = metadata.field(field);
            match condition {
                FieldCondition::Equals(expected) => value.as_deref() == Some(expected.as_str()),
                FieldCondition::NotEquals(expected) => value.as_deref() != Some(expected.as_str()),
            }
        })
    }
}

/// A nearest-neighbor query: vector, hard result cap, optional score floor,
/// and the filter applied *before* ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub vector: Vec<f32>,
    pub top_k: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f32>,
    #[serde(default)]
    pub filter: QueryFilter,
}

impl QueryRequest {
    pub fn new(vector: Vec<f32>, top_k: usize) -> Self {
        Self {
            vector,
            top_k,
            min_score: None,
            filter: QueryFilter::default(),
        }
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = Some(min_score);
        self
    }

    pub fn with_filter(mut self, filter: QueryFilter) -> Self {
        self.filter = filter;
        self
    }
}
