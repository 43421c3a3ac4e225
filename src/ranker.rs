//! Rule-based relevance ranking.
//!
//! Vector similarity alone cannot encode "prioritize content that closes a
//! missing skill over a skill the user already has", so class candidates are
//! re-scored with a transparent additive function over the user's skill-gap
//! record. Deliberately simple and rule-based: its value is debuggable
//! ranking, not predictive accuracy.
//!
//! The ranker is a pure function of (candidate, user skills, skill gap):
//! no hidden state, no randomness, equal inputs always produce equal
//! ordering. Weights are configurable but must preserve the qualitative
//! ordering: missing-skill match > improvement-skill match > existing-skill
//! overlap > availability bonus.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the read-only collaborators feeding the ranker.
#[derive(Error, Debug)]
pub enum RecommendError {
    #[error("skill gap source error: {message}")]
    SkillGapSource { message: String },

    #[error("class catalog error: {message}")]
    Catalog { message: String },
}

pub type RecommendResult<T> = Result<T, RecommendError>;

/// Scoring weights. Defaults encode the qualitative priority order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankerConfig {
    /// Per candidate tag matching one of the user's missing skills.
    pub missing_skill_bonus: f64,
    /// Per candidate tag matching an improvement skill (only applied when
    /// the tag did not already earn the missing-skill bonus).
    pub improvement_skill_bonus: f64,
    /// Per candidate tag overlapping a skill the user already has; rewards
    /// depth/advancement content without overwhelming the missing-skill
    /// bonus.
    pub existing_skill_bonus: f64,
    /// Availability bonus is `min(available_capacity / divisor, cap)` so
    /// fill-state nudges ranking without dominating it.
    pub availability_divisor: f64,
    pub availability_cap: f64,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            missing_skill_bonus: 10.0,
            improvement_skill_bonus: 5.0,
            existing_skill_bonus: 2.0,
            availability_divisor: 5.0,
            availability_cap: 3.0,
        }
    }
}

/// The user's skill gap toward a target role. Consumed, never written, by
/// this core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillGap {
    pub target_role: String,
    pub missing_skills: Vec<String>,
    pub improvement_skills: Vec<String>,
    pub strong_skills: Vec<String>,
}

/// A rankable class/course candidate as supplied by the domain object store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassCandidate {
    pub id: String,
    pub title: String,
    pub skill_tags: Vec<String>,
    pub capacity: u32,
    pub enrolled: u32,
    pub rating: f64,
}

impl ClassCandidate {
    fn available_capacity(&self) -> u32 {
        self.capacity.saturating_sub(self.enrolled)
    }
}

/// A candidate annotated with its relevance score, returned in descending
/// score order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    #[serde(flatten)]
    pub candidate: ClassCandidate,
    pub relevance_score: f64,
}

/// Bidirectional case-insensitive containment: "python" matches
/// "Python for Data Science" and vice versa.
fn skills_match(a: &str, b: &str) -> bool {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(&b) || b.contains(&a)
}

fn matches_any(tag: &str, skills: &[String]) -> bool {
    skills.iter().any(|skill| skills_match(tag, skill))
}

/// Stateless relevance scoring engine.
#[derive(Debug, Clone, Default)]
pub struct RelevanceRanker {
    config: RankerConfig,
}

impl RelevanceRanker {
    pub fn new(config: RankerConfig) -> Self {
        Self { config }
    }

    /// Score one candidate against the user's skills and skill gap. All
    /// factors are computed and summed; none short-circuits another.
    pub fn score(
        &self,
        candidate: &ClassCandidate,
        user_skills: &[String],
        gap: &SkillGap,
    ) -> f64 {
        let mut score = 0.0;

        for tag in &candidate.skill_tags {
            if matches_any(tag, &gap.missing_skills) {
                score += self.config.missing_skill_bonus;
            } else if matches_any(tag, &gap.improvement_skills) {
                score += self.config.improvement_skill_bonus;
            }
            if matches_any(tag, user_skills) {
                score += self.config.existing_skill_bonus;
            }
        }

        let availability = candidate.available_capacity() as f64 / self.config.availability_divisor;
        score += availability.min(self.config.availability_cap);

        score
    }

    /// Rank candidates descending by relevance score; ties broken by the
    /// candidate's own rating, descending. The sort is stable, so fully
    /// equal candidates keep their input order.
    pub fn rank(
        &self,
        candidates: Vec<ClassCandidate>,
        user_skills: &[String],
        gap: &SkillGap,
    ) -> Vec<RankedCandidate> {
        let mut ranked: Vec<RankedCandidate> = candidates
            .into_iter()
            .map(|candidate| {
                let relevance_score = self.score(&candidate, user_skills, gap);
                RankedCandidate {
                    candidate,
                    relevance_score,
                }
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    b.candidate
                        .rating
                        .partial_cmp(&a.candidate.rating)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
        });
        ranked
    }
}

/// Read access to a user's skill-gap record. Consumed, never written, by
/// this core; `None` means no gap analysis exists yet for the user.
#[async_trait]
pub trait SkillGapSource: Send + Sync {
    async fn load_skill_gap(&self, user_id: &str) -> RecommendResult<Option<SkillGap>>;
}

/// Read access to the rankable class/course catalog.
#[async_trait]
pub trait ClassCatalog: Send + Sync {
    async fn load_candidates(&self) -> RecommendResult<Vec<ClassCandidate>>;
}

/// Composes the skill-gap record and the class catalog with the ranker:
/// load both, score, return the sorted list. A user without a gap record
/// still gets a ranking (existing-skill and availability factors only).
pub struct ClassRecommender {
    gaps: Arc<dyn SkillGapSource>,
    catalog: Arc<dyn ClassCatalog>,
    ranker: RelevanceRanker,
}

impl ClassRecommender {
    pub fn new(
        gaps: Arc<dyn SkillGapSource>,
        catalog: Arc<dyn ClassCatalog>,
        ranker: RelevanceRanker,
    ) -> Self {
        Self {
            gaps,
            catalog,
            ranker,
        }
    }

    pub async fn recommend(
        &self,
        user_id: &str,
        user_skills: &[String],
    ) -> RecommendResult<Vec<RankedCandidate>> {
        let gap = self
            .gaps
            .load_skill_gap(user_id)
            .await?
            .unwrap_or_default();
        let candidates = self.catalog.load_candidates().await?;
        Ok(self.ranker.rank(candidates, user_skills, &gap))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn candidate(id: &str, tags: Vec<&str>, rating: f64) -> ClassCandidate {
        ClassCandidate {
            id: id.to_string(),
            title: format!("Class {id}"),
            skill_tags: tags.into_iter().map(String::from).collect(),
            capacity: 30,
            enrolled: 30, // no availability bonus unless a test overrides
            rating,
        }
    }

    fn gap(missing: Vec<&str>, improvement: Vec<&str>) -> SkillGap {
        SkillGap {
            target_role: "Data Scientist".to_string(),
            missing_skills: missing.into_iter().map(String::from).collect(),
            improvement_skills: improvement.into_iter().map(String::from).collect(),
            strong_skills: vec![],
        }
    }

    #[test]
    fn skill_matching_is_bidirectional_and_case_insensitive() {
        assert!(skills_match("Python", "python"));
        assert!(skills_match("python", "Python for Data Science"));
        assert!(skills_match("Python for Data Science", "python"));
        assert!(!skills_match("Python", "Excel"));
        assert!(!skills_match("", "Excel"));
    }

    #[test]
    fn missing_skill_match_places_candidate_first() {
        let ranker = RelevanceRanker::default();
        let g = gap(vec!["python"], vec![]);
        let ranked = ranker.rank(
            vec![
                candidate("y", vec!["Excel"], 4.5),
                candidate("x", vec!["Python"], 4.5),
            ],
            &[],
            &g,
        );
        assert_eq!(ranked[0].candidate.id, "x");
        assert_eq!(ranked[0].relevance_score, 10.0);
        assert_eq!(ranked[1].relevance_score, 0.0);
    }

    #[test]
    fn qualitative_weight_ordering_holds() {
        let ranker = RelevanceRanker::default();
        let g = gap(vec!["rust"], vec!["sql"]);
        let user_skills = vec!["excel".to_string()];

        let missing = ranker.score(&candidate("m", vec!["Rust"], 0.0), &user_skills, &g);
        let improvement = ranker.score(&candidate("i", vec!["SQL"], 0.0), &user_skills, &g);
        let existing = ranker.score(&candidate("e", vec!["Excel"], 0.0), &user_skills, &g);
        let mut open = candidate("a", vec![], 0.0);
        open.enrolled = 15; // 15 free seats, capped availability bonus
        let availability = ranker.score(&open, &user_skills, &g);

        assert!(missing > improvement);
        assert!(improvement > existing);
        assert!(existing > availability);
        assert_eq!(availability, 3.0);
    }

    #[test]
    fn adding_a_missing_skill_tag_never_decreases_the_score() {
        let ranker = RelevanceRanker::default();
        let g = gap(vec!["python"], vec![]);

        let before = ranker.score(&candidate("c", vec!["Excel"], 4.0), &[], &g);
        let after = ranker.score(&candidate("c", vec!["Excel", "Python"], 4.0), &[], &g);
        assert!(after >= before);
        assert_eq!(after - before, 10.0);
    }

    #[test]
    fn availability_bonus_is_capped() {
        let ranker = RelevanceRanker::default();
        let g = gap(vec![], vec![]);

        let mut nearly_full = candidate("a", vec![], 0.0);
        nearly_full.enrolled = 25; // 5 free seats -> bonus 1.0
        let mut wide_open = candidate("b", vec![], 0.0);
        wide_open.capacity = 500;
        wide_open.enrolled = 0; // 500 free seats -> capped at 3.0

        assert_eq!(ranker.score(&nearly_full, &[], &g), 1.0);
        assert_eq!(ranker.score(&wide_open, &[], &g), 3.0);
    }

    #[test]
    fn overenrolled_class_gets_no_availability_bonus() {
        let ranker = RelevanceRanker::default();
        let mut c = candidate("a", vec![], 0.0);
        c.capacity = 10;
        c.enrolled = 12;
        assert_eq!(ranker.score(&c, &[], &gap(vec![], vec![])), 0.0);
    }

    #[test]
    fn equal_scores_break_ties_by_rating() {
        let ranker = RelevanceRanker::default();
        let g = gap(vec!["python"], vec![]);
        let ranked = ranker.rank(
            vec![
                candidate("low", vec!["Python"], 3.2),
                candidate("high", vec!["Python"], 4.8),
            ],
            &[],
            &g,
        );
        assert_eq!(ranked[0].candidate.id, "high");
        assert_eq!(ranked[1].candidate.id, "low");
        assert_eq!(ranked[0].relevance_score, ranked[1].relevance_score);
    }

    #[test]
    fn existing_skill_overlap_stacks_with_gap_bonuses() {
        let ranker = RelevanceRanker::default();
        let g = gap(vec!["python"], vec![]);
        // Tag matches both a missing skill and a skill the user already has
        // (advanced course on a skill being re-learned toward the target
        // role): both factors are computed and summed.
        let score = ranker.score(
            &candidate("c", vec!["Python"], 0.0),
            &["python".to_string()],
            &g,
        );
        assert_eq!(score, 12.0);
    }

    #[test]
    fn ranking_is_deterministic() {
        let ranker = RelevanceRanker::default();
        let g = gap(vec!["python", "sql"], vec!["excel"]);
        let user_skills = vec!["git".to_string()];
        let candidates = vec![
            candidate("a", vec!["Python", "Git"], 4.1),
            candidate("b", vec!["SQL"], 4.9),
            candidate("c", vec!["Excel"], 4.5),
        ];

        let first = ranker.rank(candidates.clone(), &user_skills, &g);
        let second = ranker.rank(candidates, &user_skills, &g);
        assert_eq!(first, second);
    }

    #[test]
    fn ranked_output_serializes_flat() {
        let ranker = RelevanceRanker::default();
        let ranked = ranker.rank(
            vec![candidate("a", vec!["Python"], 4.0)],
            &[],
            &gap(vec!["python"], vec![]),
        );
        let json = serde_json::to_value(&ranked[0]).unwrap();
        assert_eq!(json["id"], "a");
        assert_eq!(json["relevance_score"], 10.0);
    }

    struct FakeGaps {
        gaps: HashMap<String, SkillGap>,
    }

    #[async_trait]
    impl SkillGapSource for FakeGaps {
        async fn load_skill_gap(&self, user_id: &str) -> RecommendResult<Option<SkillGap>> {
            Ok(self.gaps.get(user_id).cloned())
        }
    }

    struct FakeCatalog {
        candidates: Vec<ClassCandidate>,
    }

    #[async_trait]
    impl ClassCatalog for FakeCatalog {
        async fn load_candidates(&self) -> RecommendResult<Vec<ClassCandidate>> {
            Ok(self.candidates.clone())
        }
    }

    #[tokio::test]
    async fn recommender_ranks_catalog_against_the_gap() {
        let mut gaps = HashMap::new();
        gaps.insert("u1".to_string(), gap(vec!["python"], vec![]));
        let recommender = ClassRecommender::new(
            Arc::new(FakeGaps { gaps }),
            Arc::new(FakeCatalog {
                candidates: vec![
                    candidate("excel-101", vec!["Excel"], 4.9),
                    candidate("python-101", vec!["Python"], 4.1),
                ],
            }),
            RelevanceRanker::default(),
        );

        let ranked = recommender.recommend("u1", &[]).await.unwrap();
        assert_eq!(ranked[0].candidate.id, "python-101");
    }

    #[tokio::test]
    async fn user_without_a_gap_record_still_gets_a_ranking() {
        let recommender = ClassRecommender::new(
            Arc::new(FakeGaps {
                gaps: HashMap::new(),
            }),
            Arc::new(FakeCatalog {
                candidates: vec![
                    candidate("a", vec!["Git"], 4.0),
                    candidate("b", vec!["SQL"], 4.0),
                ],
            }),
            RelevanceRanker::default(),
        );

        // No gap bonuses apply; existing-skill overlap still orders.
        let ranked = recommender
            .recommend("u2", &["git".to_string()])
            .await
            .unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].candidate.id, "a");
        assert!(ranked[0].relevance_score > ranked[1].relevance_score);
    }
}
