//! Retrieval result types and query bounds

use serde::{Deserialize, Serialize};

/// Traversal depth bounds for neighborhood/path queries
pub const MIN_DEPTH: i64 = 1;
/// Maximum traversal depth
pub const MAX_DEPTH: i64 = 5;

/// Result-count bounds for listing/search queries
pub const MIN_LIMIT: i64 = 1;
/// Maximum result count
pub const MAX_LIMIT: i64 = 200;

/// Clamp a caller-supplied traversal depth into `[1, 5]`
pub fn clamp_depth(depth: i64) -> i64 {
    depth.clamp(MIN_DEPTH, MAX_DEPTH)
}

/// Clamp a caller-supplied result limit into `[1, 200]`
pub fn clamp_limit(limit: i64) -> i64 {
    limit.clamp(MIN_LIMIT, MAX_LIMIT)
}

/// Options for hybrid multi-signal search
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOptions {
    /// Number of fused results to return
    pub top_k: usize,

    /// Weight applied to the semantic (vector) channel score
    pub semantic_weight: f64,

    /// Weight applied to the keyword (full-text) channel score
    pub keyword_weight: f64,

    /// Per-channel candidate count fetched before fusion
    pub rerank_top_k: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            top_k: 10,
            semantic_weight: 0.7,
            keyword_weight: 0.3,
            rerank_top_k: 20,
        }
    }
}

/// A fused, ranked document from hybrid search
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedDocument {
    /// Document id, unique within one result set
    pub id: String,

    /// Document text
    pub content: String,

    /// Arbitrary document metadata
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,

    /// Vector-channel score (`1 - cosine distance`), 0 when absent
    pub semantic_score: f64,

    /// Full-text-channel score, 0 when absent
    pub keyword_score: f64,

    /// Weighted fusion of both channel scores
    pub combined_score: f64,

    /// 1-indexed, contiguous rank assigned after the final sort
    pub rank: usize,
}

/// Which channel produced a facade similarity result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchSource {
    /// Embedding vector similarity
    Vector,
    /// Substring fallback when the provider is unavailable
    Keyword,
    /// Concept name/definition text match
    Concept,
}

/// A facade-level similarity match
///
/// Unlike [`RankedDocument`], no rank field is assigned on this path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityResult {
    /// Document or concept id
    pub id: String,

    /// Matched text
    pub content: String,

    /// Similarity score in `[0, 1]`
    pub similarity: f64,

    /// Producing channel
    pub source: MatchSource,
}

/// A document to be indexed into the retrieval corpus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInput {
    /// Document id
    pub id: String,

    /// Document text
    pub content: String,

    /// Arbitrary document metadata
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_clamping() {
        assert_eq!(clamp_depth(0), 1);
        assert_eq!(clamp_depth(-3), 1);
        assert_eq!(clamp_depth(3), 3);
        assert_eq!(clamp_depth(7), 5);
    }

    #[test]
    fn test_limit_clamping() {
        assert_eq!(clamp_limit(0), 1);
        assert_eq!(clamp_limit(50), 50);
        assert_eq!(clamp_limit(10_000), 200);
    }

    #[test]
    fn test_default_search_options() {
        let opts = SearchOptions::default();
        assert_eq!(opts.top_k, 10);
        assert_eq!(opts.rerank_top_k, 20);
        assert!((opts.semantic_weight + opts.keyword_weight - 1.0).abs() < f64::EPSILON);
    }
}
