//! Similarity math for the CareerMatch vector core.
//!
//! This module implements the pure numeric layer shared by every vector store
//! backend: cosine similarity, vector normalization, and top-K nearest
//! neighbor selection over an in-memory candidate set.
//!
//! ## Cosine Similarity
//!
//! ```text
//! cosine_similarity(A, B) = (A · B) / (||A|| * ||B||)
//! ```
//!
//! Properties relied on elsewhere in the crate:
//! - Range: [-1, 1]; for the normalized embeddings produced by the embedding
//!   provider the practical range is [0, 1].
//! - Symmetric: `sim(A, B) == sim(B, A)`.
//! - `sim(A, A) == 1` for any non-zero A (within floating-point epsilon).
//!
//! Vectors are stored as `f32` (embedding models emit single precision), but
//! all accumulation happens in `f64` so that long vectors do not lose
//! precision in the dot product.
//!
//! ## Top-K selection
//!
//! `top_k` scores every candidate and keeps the K best. The sort is *stable*:
//! candidates with equal scores keep their input order, so repeated queries
//! over an unchanged store return identical orderings. This is O(N·D + N log N)
//! per query, which is the documented ceiling of the brute-force fallback
//! backend (low tens of thousands of vectors per namespace).

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced by the similarity math layer.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimilarityError {
    /// The two vectors have different dimensionality. This usually means a
    /// model-version skew: old vectors embedded with a different model than
    /// new ones. It is surfaced loudly rather than silently treated as zero
    /// similarity, which would corrupt rankings without any operator signal.
    #[error("vector dimension mismatch: query has {query_dim} dimensions, candidate has {candidate_dim}")]
    DimensionMismatch {
        query_dim: usize,
        candidate_dim: usize,
    },

    #[error("empty vector provided: {which}")]
    EmptyVector { which: String },

    #[error("vector contains non-finite values")]
    NonFiniteComponent,

    /// A zero-magnitude vector has no direction, so cosine similarity is
    /// undefined for it.
    #[error("zero magnitude vector")]
    ZeroMagnitude,

    #[error("invalid top-k: k must be greater than 0")]
    InvalidK,

    #[error("minimum score out of range: {min_score} (must be within [-1, 1])")]
    InvalidMinScore { min_score: f32 },
}

pub type SimilarityResult<T> = Result<T, SimilarityError>;

/// A candidate vector offered to `top_k`, carried by id so callers can map
/// hits back onto their own records.
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    pub id: &'a str,
    pub values: &'a [f32],
}

/// One scored entry out of `top_k`, ordered descending by score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub id: String,
    pub score: f32,
}

fn validate_components(values: &[f32]) -> SimilarityResult<()> {
    if values.iter().any(|v| !v.is_finite()) {
        return Err(SimilarityError::NonFiniteComponent);
    }
    Ok(())
}

/// Calculate cosine similarity between two vectors.
///
/// Accumulates dot product and squared magnitudes in a single pass using
/// `f64`, then clamps the result to [-1, 1] to absorb floating-point drift.
///
/// # Errors
///
/// * `EmptyVector`: either input is empty.
/// * `DimensionMismatch`: inputs differ in length.
/// * `NonFiniteComponent`: a NaN or infinity was found.
/// * `ZeroMagnitude`: either vector has zero Euclidean norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> SimilarityResult<f32> {
    if a.is_empty() {
        return Err(SimilarityError::EmptyVector {
            which: "left".to_string(),
        });
    }
    if b.is_empty() {
        return Err(SimilarityError::EmptyVector {
            which: "right".to_string(),
        });
    }
    if a.len() != b.len() {
        return Err(SimilarityError::DimensionMismatch {
            query_dim: a.len(),
            candidate_dim: b.len(),
        });
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (&x, &y) in a.iter().zip(b.iter()) {
        if !x.is_finite() || !y.is_finite() {
            return Err(SimilarityError::NonFiniteComponent);
        }
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let magnitude = norm_a.sqrt() * norm_b.sqrt();
    if magnitude == 0.0 {
        return Err(SimilarityError::ZeroMagnitude);
    }

    Ok((dot / magnitude).clamp(-1.0, 1.0) as f32)
}

/// Normalize a vector to unit length, preserving direction.
pub fn normalize(values: &[f32]) -> SimilarityResult<Vec<f32>> {
    if values.is_empty() {
        return Err(SimilarityError::EmptyVector {
            which: "input".to_string(),
        });
    }
    validate_components(values)?;

    let magnitude = values
        .iter()
        .map(|&v| (v as f64) * (v as f64))
        .sum::<f64>()
        .sqrt();
    if magnitude == 0.0 {
        return Err(SimilarityError::ZeroMagnitude);
    }

    Ok(values.iter().map(|&v| (v as f64 / magnitude) as f32).collect())
}

/// Select the `k` candidates most similar to `query` by cosine similarity.
///
/// Candidates whose id appears in `exclude` are skipped before any scoring
/// (this is how self-exclusion is enforced store-side). Candidates scoring
/// below `min_score` are dropped. Zero-magnitude candidates carry no
/// direction and are excluded rather than failing the whole query; a
/// dimension mismatch, by contrast, propagates because it signals corrupt or
/// skewed data in the namespace.
///
/// Ordering is descending by score with stable ties: equal scores keep the
/// candidates' input order, so results are deterministic across repeated
/// runs on identical inputs.
pub fn top_k(
    query: &[f32],
    candidates: &[Candidate<'_>],
    k: usize,
    min_score: Option<f32>,
    exclude: &HashSet<String>,
) -> SimilarityResult<Vec<ScoredCandidate>> {
    if k == 0 {
        return Err(SimilarityError::InvalidK);
    }
    if let Some(min) = min_score {
        if !(-1.0..=1.0).contains(&min) {
            return Err(SimilarityError::InvalidMinScore { min_score: min });
        }
    }
    if query.is_empty() {
        return Err(SimilarityError::EmptyVector {
            which: "query".to_string(),
        });
    }
    validate_components(query)?;

    let mut scored: Vec<ScoredCandidate> = Vec::new();
    for candidate in candidates {
        if exclude.contains(candidate.id) {
            continue;
        }
        let score = match cosine_similarity(query, candidate.values) {
            Ok(score) => score,
            Err(SimilarityError::ZeroMagnitude) => {
                log::debug!(
                    "skipping zero-magnitude candidate {} in similarity scan",
                    candidate.id
                );
                continue;
            }
            Err(err) => return Err(err),
        };
        if let Some(min) = min_score {
            if score < min {
                continue;
            }
        }
        scored.push(ScoredCandidate {
            id: candidate.id.to_string(),
            score,
        });
    }

    // Stable sort: equal scores keep insertion order.
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(k);
    Ok(scored)
}
