//! Doppelgänger and match finding.
//!
//! [`MatchFinder`] answers "top-K similar entities to user X" for three
//! entity classes (other user profiles, job postings, and skills) by
//! querying the vector store with the caller's stored profile vector and
//! mapping each hit into a JSON-serializable display shape.
//!
//! A user without an indexed profile gets [`MatchError::ProfileNotIndexed`],
//! never an empty list: "build your profile first" and "no matches found"
//! are different answers and the caller must be able to tell them apart.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::profile_vectors::profile_vector_id;
use crate::vector_store::{
    Namespace, QueryFilter, QueryRequest, RecordMetadata, SimilarityHit, VectorStore,
    VectorStoreError,
};

#[derive(Error, Debug)]
pub enum MatchError {
    /// No vector exists for the subject profile. Actionable: the profile
    /// must be rebuilt before similarity queries can run.
    #[error("profile for user {user_id} is not indexed yet; rebuild it before searching")]
    ProfileNotIndexed { user_id: String },

    #[error(transparent)]
    Store(#[from] VectorStoreError),
}

pub type MatchResult<T> = Result<T, MatchError>;

const CAREER_PATH_SEPARATOR: &str = " -> ";

/// Another user whose embedded profile is close to the caller's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarProfile {
    pub user_id: String,
    pub similarity: f32,
    pub current_role: Option<String>,
    pub target_role: Option<String>,
    pub skills: Vec<String>,
    pub location: Option<String>,
    /// Role titles along the matched user's path, chronological, joined
    /// with a directional separator ("Intern -> Analyst -> Lead").
    pub career_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMatch {
    pub job_id: String,
    pub similarity: f32,
    pub title: String,
    pub company: Option<String>,
    pub location: Option<String>,
    pub experience_level: Option<String>,
    pub salary_range: Option<String>,
    pub required_skills: Vec<String>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillSuggestion {
    pub skill_id: String,
    pub similarity: f32,
    pub name: String,
    pub category: Option<String>,
    pub related_skills: Vec<String>,
}

/// Metadata filters for job matching, translated into store filter
/// conditions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobSearchFilter {
    pub location: Option<String>,
    pub experience_level: Option<String>,
    /// Salary band label as stored on the posting (e.g. "120k-150k").
    pub salary_range: Option<String>,
}

/// Stable vector id for a skill, derived from its name.
pub fn skill_vector_id(name: &str) -> String {
    let slug: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    format!("skill_{slug}")
}

/// Queries the vector store for career doppelgängers, matching jobs, and
/// related skills.
pub struct MatchFinder {
    store: Arc<dyn VectorStore>,
}

impl MatchFinder {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }

    /// Fetch the caller's own profile vector or fail with
    /// `ProfileNotIndexed`.
    async fn own_vector(
        &self,
        user_id: &str,
    ) -> MatchResult<crate::vector_store::VectorRecord> {
        self.store
            .fetch(Namespace::Profiles, &profile_vector_id(user_id))
            .await?
            .ok_or_else(|| MatchError::ProfileNotIndexed {
                user_id: user_id.to_string(),
            })
    }

    /// Top-K profiles most similar to the caller's, excluding the caller,
    /// in descending similarity order (the ordering is a correctness
    /// property: it drives the "top match" display).
    pub async fn find_similar_profiles(
        &self,
        user_id: &str,
        limit: usize,
        min_score: Option<f32>,
    ) -> MatchResult<Vec<SimilarProfile>> {
        let own = self.own_vector(user_id).await?;

        let mut request = QueryRequest::new(own.values, limit)
            .with_filter(QueryFilter::new().exclude_id(own.id));
        request.min_score = min_score;

        let hits = self.store.query(Namespace::Profiles, request).await?;
        Ok(hits.into_iter().filter_map(map_profile_hit).collect())
    }

    /// Top-K job postings for the caller's profile, with optional metadata
    /// filters applied before ranking.
    pub async fn find_matching_jobs(
        &self,
        user_id: &str,
        limit: usize,
        min_score: Option<f32>,
        search: &JobSearchFilter,
    ) -> MatchResult<Vec<JobMatch>> {
        let own = self.own_vector(user_id).await?;

        let mut filter = QueryFilter::new();
        if let Some(location) = &search.location {
            filter = filter.field_equals("location", location.clone());
        }
        if let Some(level) = &search.experience_level {
            filter = filter.field_equals("experience_level", level.clone());
        }
        if let Some(band) = &search.salary_range {
            filter = filter.field_equals("salary_range", band.clone());
        }

        let mut request = QueryRequest::new(own.values, limit).with_filter(filter);
        request.min_score = min_score;

        let hits = self.store.query(Namespace::Jobs, request).await?;
        Ok(hits.into_iter().filter_map(map_job_hit).collect())
    }

    /// Top-K skills related to the caller's profile, excluding skills the
    /// caller already has (by derived skill vector id).
    pub async fn find_related_skills(
        &self,
        user_id: &str,
        limit: usize,
        min_score: Option<f32>,
    ) -> MatchResult<Vec<SkillSuggestion>> {
        let own = self.own_vector(user_id).await?;

        let mut filter = QueryFilter::new();
        if let RecordMetadata::Profile(meta) = &own.metadata {
            for skill in &meta.skills {
                filter = filter.exclude_id(skill_vector_id(skill));
            }
        }

        let mut request = QueryRequest::new(own.values, limit).with_filter(filter);
        request.min_score = min_score;

        let hits = self.store.query(Namespace::Skills, request).await?;
        Ok(hits.into_iter().filter_map(map_skill_hit).collect())
    }
}

fn map_profile_hit(hit: SimilarityHit) -> Option<SimilarProfile> {
    match hit.metadata {
        RecordMetadata::Profile(meta) => Some(SimilarProfile {
            user_id: meta.user_id,
            similarity: hit.score,
            current_role: meta.current_role,
            target_role: meta.target_role,
            skills: meta.skills,
            location: meta.location,
            career_path: meta.career_path.join(CAREER_PATH_SEPARATOR),
        }),
        other => {
            // The store contract forbids cross-namespace hits; if one slips
            // through, dropping it beats rendering a nonsense match.
            log::warn!(
                "dropping non-profile hit {} ({}) from profiles query",
                hit.id,
                other.kind()
            );
            None
        }
    }
}

fn map_job_hit(hit: SimilarityHit) -> Option<JobMatch> {
    match hit.metadata {
        RecordMetadata::Job(meta) => Some(JobMatch {
            job_id: hit.id,
            similarity: hit.score,
            title: meta.title,
            company: meta.company,
            location: meta.location,
            experience_level: meta.experience_level,
            salary_range: meta.salary_range,
            required_skills: meta.required_skills,
            source: meta.source,
        }),
        other => {
            log::warn!(
                "dropping non-job hit {} ({}) from jobs query",
                hit.id,
                other.kind()
            );
            None
        }
    }
}

fn map_skill_hit(hit: SimilarityHit) -> Option<SkillSuggestion> {
    match hit.metadata {
        RecordMetadata::Skill(meta) => Some(SkillSuggestion {
            skill_id: hit.id,
            similarity: hit.score,
            name: meta.name,
            category: meta.category,
            related_skills: meta.related_skills,
        }),
        other => {
            log::warn!(
                "dropping non-skill hit {} ({}) from skills query",
                hit.id,
                other.kind()
            );
            None
        }
    }
}
