//! CareerMatch core: embedding-based profile similarity search.
//!
//! Turns free-text user profiles into vectors and finds nearest neighbors
//! ("career doppelgängers") plus profile-to-job and profile-to-skill
//! matches, with a rule-based relevance ranker layered on top for
//! skill-gap-aware ordering of domain candidates.
//!
//! Components, leaf first:
//!
//! - [`similarity`]: pure math (cosine similarity, normalization, stable
//!   top-K selection).
//! - [`embedding`]: remote embedding provider client with an ordered
//!   model-fallback list and bounded per-attempt timeouts.
//! - [`vector_store`]: namespaced persistence + nearest-neighbor queries;
//!   an indexed backend, a brute-force in-memory fallback, and a degrading
//!   wrapper that prefers the indexed backend and falls back transparently.
//! - [`profile_vectors`]: the lifecycle of one vector per user profile:
//!   build description → embed → upsert, with explicit rebuild/remove
//!   triggers.
//! - [`matcher`]: orchestrates the store to answer "top-K similar entities
//!   to user X" for profiles, jobs, and skills.
//! - [`ranker`]: skill-gap-aware additive scoring of class candidates,
//!   independent of the vector layer.
//!
//! All components are constructed explicitly and passed in where needed
//! (no module-level singletons), so tests substitute the in-memory backend
//! and fake collaborators freely.

pub mod embedding;
pub mod matcher;
pub mod profile_vectors;
pub mod ranker;
pub mod similarity;
pub mod vector_store;

pub use embedding::{EmbeddingClient, EmbeddingConfig, EmbeddingError};
pub use matcher::{
    JobMatch, JobSearchFilter, MatchError, MatchFinder, SimilarProfile, SkillSuggestion,
};
pub use profile_vectors::{
    CareerPathEntry, EmbeddingProvider, ProfileDirectory, ProfileVectorError,
    ProfileVectorManager, RebuildOutcome, UserProfile,
};
pub use ranker::{
    ClassCandidate, ClassCatalog, ClassRecommender, RankedCandidate, RankerConfig,
    RecommendError, RelevanceRanker, SkillGap, SkillGapSource,
};
pub use similarity::{cosine_similarity, normalize, SimilarityError};
pub use vector_store::{
    DegradingVectorStore, IndexedStoreConfig, IndexedVectorStore, MemoryVectorStore, Namespace,
    QueryFilter, QueryRequest, RecordMetadata, SimilarityHit, VectorRecord, VectorStore,
    VectorStoreError,
};
