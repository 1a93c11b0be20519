//! Shared domain types

pub mod concept;
pub mod context;
pub mod retrieval;

pub use concept::{Concept, ConceptPath, ConceptSummary, RelationKind};
pub use context::{RequestContext, Role};
pub use retrieval::{
    clamp_depth, clamp_limit, DocumentInput, MatchSource, RankedDocument, SearchOptions,
    SimilarityResult, MAX_DEPTH, MAX_LIMIT, MIN_DEPTH, MIN_LIMIT,
};

/// UUID type alias used across Mentora
pub type UUID = uuid::Uuid;
