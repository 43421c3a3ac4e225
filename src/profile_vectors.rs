//! Profile vector lifecycle.
//!
//! [`ProfileVectorManager`] owns *when* a user's profile vector is
//! (re)computed: it loads the profile from the system of record, serializes
//! it into a canonical textual description, embeds it, and upserts the
//! result into the `profiles` namespace. It does not own storage and it does
//! not watch for mutations. `rebuild` is the single explicit hook point the
//! profile/skill/career-path write paths must invoke after a mutation, and
//! `remove` must be invoked on account deletion or the vector is a leaked
//! resource.
//!
//! A failed embed never upserts: a stale vector that still reflects the last
//! successful rebuild is preferable to a half-written one.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::embedding::{EmbeddingClient, EmbeddingError, EmbeddingResult};
use crate::vector_store::{
    Namespace, ProfileMetadata, RecordMetadata, VectorRecord, VectorStore, VectorStoreError,
};

/// Errors raised along the profile vector write path. Everything here
/// propagates to the caller; rebuild failures are never best-effort.
#[derive(Error, Debug)]
pub enum ProfileVectorError {
    #[error("unknown user: {user_id}")]
    UnknownUser { user_id: String },

    /// The profile has no embeddable content at all (every field missing or
    /// blank). Embedding an empty string would pollute the namespace with a
    /// meaningless vector.
    #[error("profile for user {user_id} has no content to embed")]
    EmptyProfile { user_id: String },

    #[error("profile directory error: {message}")]
    Directory { message: String },

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Store(#[from] VectorStoreError),
}

pub type ProfileVectorResult<T> = Result<T, ProfileVectorError>;

/// A user's profile as read from the system of record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub current_role: Option<String>,
    pub target_role: Option<String>,
    pub experience_years: Option<f32>,
    pub education: Option<String>,
    pub location: Option<String>,
}

/// One step along a user's career path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CareerPathEntry {
    pub role_title: String,
    pub started_at: DateTime<Utc>,
}

/// Read access to the profile system of record (implemented elsewhere;
/// this core only ever reads).
#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    async fn load_profile(&self, user_id: &str) -> ProfileVectorResult<Option<UserProfile>>;
    async fn load_skills(&self, user_id: &str) -> ProfileVectorResult<Vec<String>>;
    async fn load_career_paths(&self, user_id: &str) -> ProfileVectorResult<Vec<CareerPathEntry>>;
}

/// Embedding seam, satisfied by [`EmbeddingClient`] in production and by
/// in-memory fakes in tests.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>>;
}

#[async_trait]
impl EmbeddingProvider for EmbeddingClient {
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        EmbeddingClient::embed(self, text).await
    }
}

/// What a rebuild actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebuildOutcome {
    /// The description changed (or no vector existed); a new vector was
    /// embedded and upserted.
    Rebuilt,
    /// The canonical description is identical to the stored one; the
    /// embedding call was skipped entirely.
    Unchanged,
}

/// Stable vector id for a user's profile; exactly one per user.
pub fn profile_vector_id(user_id: &str) -> String {
    format!("profile_{user_id}")
}

const SKILL_DELIMITER: &str = ", ";
const CAREER_PATH_SEPARATOR: &str = " -> ";

/// Owns the build-description → embed → upsert pipeline for profile vectors.
pub struct ProfileVectorManager {
    directory: Arc<dyn ProfileDirectory>,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
}

impl ProfileVectorManager {
    pub fn new(
        directory: Arc<dyn ProfileDirectory>,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            directory,
            embedder,
            store,
        }
    }

    /// Rebuild the vector for one user. The only write path to profile
    /// vectors; call it after every profile, skill, or career-path mutation.
    pub async fn rebuild(&self, user_id: &str) -> ProfileVectorResult<RebuildOutcome> {
        let profile = self
            .directory
            .load_profile(user_id)
            .await?
            .ok_or_else(|| ProfileVectorError::UnknownUser {
                user_id: user_id.to_string(),
            })?;
        let skills = self.directory.load_skills(user_id).await?;
        let mut career_paths = self.directory.load_career_paths(user_id).await?;
        career_paths.sort_by_key(|entry| entry.started_at);

        let description = build_description(&profile, &skills, &career_paths);
        if description.is_empty() {
            return Err(ProfileVectorError::EmptyProfile {
                user_id: user_id.to_string(),
            });
        }
        let description_hash = hash_description(&description);

        let id = profile_vector_id(user_id);
        if let Some(existing) = self.store.fetch(Namespace::Profiles, &id).await? {
            if let RecordMetadata::Profile(meta) = &existing.metadata {
                if meta.description_hash == description_hash {
                    log::debug!("profile vector for {user_id} unchanged, skipping embed");
                    return Ok(RebuildOutcome::Unchanged);
                }
            }
        }

        // Suspension point: a failure here propagates and nothing is
        // upserted.
        let values = self.embedder.embed(&description).await?;

        let metadata = RecordMetadata::Profile(ProfileMetadata {
            user_id: user_id.to_string(),
            current_role: profile.current_role.clone(),
            target_role: profile.target_role.clone(),
            skills,
            location: profile.location.clone(),
            experience_years: profile.experience_years,
            career_path: career_paths
                .iter()
                .map(|e| e.role_title.clone())
                .collect(),
            updated_at: Utc::now(),
            description_hash,
        });

        self.store
            .upsert(Namespace::Profiles, VectorRecord::new(id, values, metadata))
            .await?;
        log::info!("rebuilt profile vector for user {user_id}");
        Ok(RebuildOutcome::Rebuilt)
    }

    /// Delete the user's profile vector. Idempotent; must be invoked when
    /// the account is deleted.
    pub async fn remove(&self, user_id: &str) -> ProfileVectorResult<()> {
        self.store
            .delete(Namespace::Profiles, &profile_vector_id(user_id))
            .await?;
        Ok(())
    }
}

/// Serialize a profile into its canonical description: deterministic field
/// order, missing fields omitted rather than zero-filled so placeholder
/// tokens never pollute the embedding.
pub fn build_description(
    profile: &UserProfile,
    skills: &[String],
    career_paths_chronological: &[CareerPathEntry],
) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(role) = non_blank(&profile.current_role) {
        parts.push(format!("Current role: {role}"));
    }
    if let Some(target) = non_blank(&profile.target_role) {
        parts.push(format!("Target role: {target}"));
    }
    if let Some(years) = profile.experience_years {
        parts.push(format!("Experience: {} years", format_years(years)));
    }
    if let Some(education) = non_blank(&profile.education) {
        parts.push(format!("Education: {education}"));
    }
    let skills: Vec<&str> = skills
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if !skills.is_empty() {
        parts.push(format!("Skills: {}", skills.join(SKILL_DELIMITER)));
    }
    if let Some(location) = non_blank(&profile.location) {
        parts.push(format!("Location: {location}"));
    }
    let path: Vec<&str> = career_paths_chronological
        .iter()
        .map(|e| e.role_title.trim())
        .filter(|t| !t.is_empty())
        .collect();
    if !path.is_empty() {
        parts.push(format!("Career path: {}", path.join(CAREER_PATH_SEPARATOR)));
    }

    parts.join(". ")
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn format_years(years: f32) -> String {
    if years.fract() == 0.0 {
        format!("{}", years as i64)
    } else {
        format!("{years:.1}")
    }
}

fn hash_description(description: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(description.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::MemoryVectorStore;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use chrono::TimeZone;

    struct FakeDirectory {
        profiles: HashMap<String, UserProfile>,
        skills: HashMap<String, Vec<String>>,
        paths: HashMap<String, Vec<CareerPathEntry>>,
    }

    #[async_trait]
    impl ProfileDirectory for FakeDirectory {
        async fn load_profile(&self, user_id: &str) -> ProfileVectorResult<Option<UserProfile>> {
            Ok(self.profiles.get(user_id).cloned())
        }

        async fn load_skills(&self, user_id: &str) -> ProfileVectorResult<Vec<String>> {
            Ok(self.skills.get(user_id).cloned().unwrap_or_default())
        }

        async fn load_career_paths(
            &self,
            user_id: &str,
        ) -> ProfileVectorResult<Vec<CareerPathEntry>> {
            Ok(self.paths.get(user_id).cloned().unwrap_or_default())
        }
    }

    struct CountingEmbedder {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingEmbedder {
        async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(EmbeddingError::ProviderUnavailable {
                    message: "down".to_string(),
                });
            }
            // Deterministic fake vector derived from the text length.
            Ok(vec![text.len() as f32, 1.0, 0.0])
        }
    }

    fn sample_profile(user_id: &str) -> UserProfile {
        UserProfile {
            user_id: user_id.to_string(),
            current_role: Some("Data Analyst".to_string()),
            target_role: Some("Data Scientist".to_string()),
            experience_years: Some(4.0),
            education: Some("BSc Statistics".to_string()),
            location: Some("Remote".to_string()),
        }
    }

    fn directory_with(user_id: &str) -> FakeDirectory {
        let mut profiles = HashMap::new();
        profiles.insert(user_id.to_string(), sample_profile(user_id));
        let mut skills = HashMap::new();
        skills.insert(
            user_id.to_string(),
            vec!["SQL".to_string(), "Python".to_string()],
        );
        let mut paths = HashMap::new();
        paths.insert(
            user_id.to_string(),
            vec![
                CareerPathEntry {
                    role_title: "Data Analyst".to_string(),
                    started_at: Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap(),
                },
                CareerPathEntry {
                    role_title: "Intern".to_string(),
                    started_at: Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap(),
                },
            ],
        );
        FakeDirectory {
            profiles,
            skills,
            paths,
        }
    }

    #[test]
    fn description_has_deterministic_field_order() {
        let profile = sample_profile("u1");
        let skills = vec!["SQL".to_string(), "Python".to_string()];
        let paths = vec![
            CareerPathEntry {
                role_title: "Intern".to_string(),
                started_at: Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap(),
            },
            CareerPathEntry {
                role_title: "Data Analyst".to_string(),
                started_at: Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap(),
            },
        ];

        let description = build_description(&profile, &skills, &paths);
        assert_eq!(
            description,
            "Current role: Data Analyst. Target role: Data Scientist. \
             Experience: 4 years. Education: BSc Statistics. \
             Skills: SQL, Python. Location: Remote. \
             Career path: Intern -> Data Analyst"
        );
    }

    #[test]
    fn missing_fields_are_omitted_not_zero_filled() {
        let profile = UserProfile {
            user_id: "u1".to_string(),
            current_role: Some("Engineer".to_string()),
            target_role: None,
            experience_years: None,
            education: Some("  ".to_string()),
            location: None,
        };
        let description = build_description(&profile, &[], &[]);
        assert_eq!(description, "Current role: Engineer");
    }

    #[tokio::test]
    async fn rebuild_embeds_and_upserts() {
        let store = Arc::new(MemoryVectorStore::new());
        let embedder = Arc::new(CountingEmbedder {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let manager = ProfileVectorManager::new(
            Arc::new(directory_with("u1")),
            embedder.clone(),
            store.clone(),
        );

        let outcome = manager.rebuild("u1").await.unwrap();
        assert_eq!(outcome, RebuildOutcome::Rebuilt);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);

        let record = store
            .fetch(Namespace::Profiles, "profile_u1")
            .await
            .unwrap()
            .expect("vector should exist");
        match record.metadata {
            RecordMetadata::Profile(meta) => {
                assert_eq!(meta.user_id, "u1");
                // Career path sorted chronologically before upsert.
                assert_eq!(meta.career_path, vec!["Intern", "Data Analyst"]);
            }
            other => panic!("unexpected metadata: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unchanged_description_skips_the_embed_call() {
        let store = Arc::new(MemoryVectorStore::new());
        let embedder = Arc::new(CountingEmbedder {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let manager = ProfileVectorManager::new(
            Arc::new(directory_with("u1")),
            embedder.clone(),
            store,
        );

        assert_eq!(manager.rebuild("u1").await.unwrap(), RebuildOutcome::Rebuilt);
        assert_eq!(
            manager.rebuild("u1").await.unwrap(),
            RebuildOutcome::Unchanged
        );
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_embed_upserts_nothing() {
        let store = Arc::new(MemoryVectorStore::new());
        let embedder = Arc::new(CountingEmbedder {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let manager = ProfileVectorManager::new(
            Arc::new(directory_with("u1")),
            embedder,
            store.clone(),
        );

        let result = manager.rebuild("u1").await;
        assert!(matches!(result, Err(ProfileVectorError::Embedding(_))));
        assert!(store
            .fetch(Namespace::Profiles, "profile_u1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn unknown_user_is_an_error() {
        let manager = ProfileVectorManager::new(
            Arc::new(FakeDirectory {
                profiles: HashMap::new(),
                skills: HashMap::new(),
                paths: HashMap::new(),
            }),
            Arc::new(CountingEmbedder {
                calls: AtomicUsize::new(0),
                fail: false,
            }),
            Arc::new(MemoryVectorStore::new()),
        );
        let result = manager.rebuild("ghost").await;
        assert!(matches!(result, Err(ProfileVectorError::UnknownUser { .. })));
    }

    #[tokio::test]
    async fn empty_profile_is_rejected() {
        let mut profiles = HashMap::new();
        profiles.insert("blank".to_string(), UserProfile {
            user_id: "blank".to_string(),
            ..UserProfile::default()
        });
        let manager = ProfileVectorManager::new(
            Arc::new(FakeDirectory {
                profiles,
                skills: HashMap::new(),
                paths: HashMap::new(),
            }),
            Arc::new(CountingEmbedder {
                calls: AtomicUsize::new(0),
                fail: false,
            }),
            Arc::new(MemoryVectorStore::new()),
        );
        let result = manager.rebuild("blank").await;
        assert!(matches!(result, Err(ProfileVectorError::EmptyProfile { .. })));
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let store = Arc::new(MemoryVectorStore::new());
        let manager = ProfileVectorManager::new(
            Arc::new(directory_with("u1")),
            Arc::new(CountingEmbedder {
                calls: AtomicUsize::new(0),
                fail: false,
            }),
            store.clone(),
        );

        manager.rebuild("u1").await.unwrap();
        manager.remove("u1").await.unwrap();
        manager.remove("u1").await.unwrap();
        assert!(store
            .fetch(Namespace::Profiles, "profile_u1")
            .await
            .unwrap()
            .is_none());
    }
}
