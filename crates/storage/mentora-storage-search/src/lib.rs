//! Document corpus access for Mentora retrieval
//!
//! One seam, [`DocumentChannels`], exposes the independent relevance channels
//! the hybrid retriever fuses: vector cosine similarity (pgvector), full-text
//! ranking, and the `ILIKE` substring fallback used when no embedding is
//! available, plus concept text lookup and document indexing.

#![warn(clippy::all)]

pub mod channels;

pub use channels::PgDocumentChannels;

use async_trait::async_trait;
use mentora_core::types::DocumentInput;
use mentora_core::Result;
use serde::{Deserialize, Serialize};

/// A single-channel document match
///
/// `score` carries the producing channel's native relevance value: cosine
/// similarity for the semantic channel, full-text rank for the keyword
/// channel, and 0 for the substring channel (its fixed score is assigned by
/// the caller).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentHit {
    /// Document id
    pub id: String,

    /// Document text
    pub content: String,

    /// Arbitrary document metadata
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,

    /// Channel-native relevance score
    pub score: f64,
}

/// A concept row matched by name/definition text
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptTextHit {
    /// Concept id
    pub id: String,

    /// Concept name
    pub name: String,

    /// Definition text
    pub definition: String,
}

/// Relevance channels over the tenant's document corpus
///
/// Every method binds the tenant id; limits are clamped to `[1, 200]` inside
/// each implementation. Channel failures propagate — a failed search has no
/// safe empty-result default.
#[async_trait]
pub trait DocumentChannels: Send + Sync {
    /// Vector cosine-similarity channel; `score = 1 - cosine distance`
    async fn semantic_channel(
        &self,
        embedding: Vec<f32>,
        tenant_id: &str,
        limit: i64,
    ) -> Result<Vec<DocumentHit>>;

    /// Full-text relevance channel
    async fn keyword_channel(
        &self,
        query: &str,
        tenant_id: &str,
        limit: i64,
    ) -> Result<Vec<DocumentHit>>;

    /// Substring containment channel (`ILIKE`); hit scores are 0
    async fn substring_channel(
        &self,
        query: &str,
        tenant_id: &str,
        limit: i64,
    ) -> Result<Vec<DocumentHit>>;

    /// Concepts whose name or definition contains the query text
    async fn concepts_by_text(
        &self,
        query: &str,
        tenant_id: &str,
        limit: i64,
    ) -> Result<Vec<ConceptTextHit>>;

    /// Upsert documents into the corpus; `None` embeddings index keyword-only
    async fn index_documents(
        &self,
        documents: Vec<(DocumentInput, Option<Vec<f32>>)>,
        tenant_id: &str,
    ) -> Result<usize>;
}

/// Configuration for the document store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchStoreConfig {
    /// Per-query timeout in seconds
    pub query_timeout_secs: u64,

    /// Dimension of stored embedding vectors
    pub embedding_dimension: usize,
}

impl Default for SearchStoreConfig {
    fn default() -> Self {
        Self {
            query_timeout_secs: 10,
            embedding_dimension: 1536,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = SearchStoreConfig::default();
        assert_eq!(config.query_timeout_secs, 10);
        assert_eq!(config.embedding_dimension, 1536);
    }
}
