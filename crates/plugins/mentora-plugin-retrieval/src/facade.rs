//! Retrieval facade
//!
//! The single entry point callers use. Decides whether semantic search is
//! possible and falls back to keyword matching otherwise; all other
//! operations pass through to the graph store, the hybrid retriever, or the
//! embedding cache. Fallback decisions live here and only here - the lower
//! layers propagate provider failures unchanged.

use crate::embedding::EmbeddingCache;
use crate::retrieval::HybridSearch;
use mentora_core::types::{
    clamp_limit, Concept, ConceptPath, ConceptSummary, DocumentInput, MatchSource, RankedDocument,
    RelationKind, SearchOptions, SimilarityResult,
};
use mentora_core::Result;
use mentora_storage_graph::GraphStore;
use mentora_storage_search::DocumentChannels;
use std::sync::Arc;
use tracing::{debug, warn};

/// Fixed similarity assigned to every substring-fallback match
///
/// A deliberate simplification kept for behavioral compatibility, not a
/// computed relevance score.
const FALLBACK_SIMILARITY: f64 = 0.75;

/// Concept matches are fetched at a quarter of the requested limit
const CONCEPT_BLEND_DIVISOR: i64 = 4;

const EXACT_MATCH_SCORE: f64 = 1.0;
const CONTAINMENT_SCORE: f64 = 0.85;
const WORD_OVERLAP_BASE: f64 = 0.5;
const WORD_OVERLAP_SPAN: f64 = 0.35;

/// The public contract of the retrieval core
pub struct KnowledgeRetriever {
    embedder: Arc<EmbeddingCache>,
    channels: Arc<dyn DocumentChannels>,
    graph: Arc<GraphStore>,
    hybrid: HybridSearch,
}

impl KnowledgeRetriever {
    /// Compose the facade from its injected parts
    pub fn new(
        embedder: Arc<EmbeddingCache>,
        channels: Arc<dyn DocumentChannels>,
        graph: Arc<GraphStore>,
    ) -> Self {
        let hybrid = HybridSearch::new(channels.clone(), embedder.clone(), graph.clone());
        Self {
            embedder,
            channels,
            graph,
            hybrid,
        }
    }

    /// Similarity search with keyword fallback
    ///
    /// Attempts embedding plus the vector channel; when the provider is
    /// unconfigured or fails, every `ILIKE` substring match gets the fixed
    /// fallback similarity instead. A lightweight concept name/definition
    /// match is blended in at a quarter of the requested limit. The merged
    /// set is sorted by similarity and truncated; no rank field is assigned
    /// on this path.
    pub async fn semantic_search(
        &self,
        query: &str,
        tenant_id: &str,
        limit: i64,
    ) -> Result<Vec<SimilarityResult>> {
        let limit = clamp_limit(limit);
        let mut results: Vec<SimilarityResult> = Vec::new();

        let embedding = if self.embedder.has_provider() {
            match self.embedder.embed_query(query).await {
                Ok(vector) => Some(vector),
                Err(err) if err.is_provider_error() => {
                    warn!(
                        "Embedding provider unavailable, using keyword fallback: {}",
                        err
                    );
                    None
                }
                Err(err) => return Err(err),
            }
        } else {
            debug!("No embedding provider configured, using keyword fallback");
            None
        };

        match embedding {
            Some(vector) => {
                let hits = self
                    .channels
                    .semantic_channel(vector, tenant_id, limit)
                    .await?;
                results.extend(hits.into_iter().map(|hit| SimilarityResult {
                    id: hit.id,
                    content: hit.content,
                    similarity: hit.score,
                    source: MatchSource::Vector,
                }));
            }
            None => {
                let hits = self
                    .channels
                    .substring_channel(query, tenant_id, limit)
                    .await?;
                results.extend(hits.into_iter().map(|hit| SimilarityResult {
                    id: hit.id,
                    content: hit.content,
                    similarity: FALLBACK_SIMILARITY,
                    source: MatchSource::Keyword,
                }));
            }
        }

        let concept_limit = (limit / CONCEPT_BLEND_DIVISOR).max(1);
        let concepts = self
            .channels
            .concepts_by_text(query, tenant_id, concept_limit)
            .await?;
        results.extend(concepts.into_iter().map(|concept| {
            let similarity = text_similarity(query, &concept.name);
            let content = if concept.definition.is_empty() {
                concept.name
            } else {
                format!("{}: {}", concept.name, concept.definition)
            };
            SimilarityResult {
                id: concept.id,
                content,
                similarity,
                source: MatchSource::Concept,
            }
        }));

        results.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(limit as usize);
        Ok(results)
    }

    /// Fused multi-signal search (see [`HybridSearch::search`])
    pub async fn search(
        &self,
        query: &str,
        tenant_id: &str,
        options: SearchOptions,
    ) -> Result<Vec<RankedDocument>> {
        self.hybrid.search(query, tenant_id, options).await
    }

    /// Fused search with graph-neighborhood augmentation
    pub async fn search_with_graph(
        &self,
        query: &str,
        tenant_id: &str,
        options: SearchOptions,
    ) -> Result<Vec<RankedDocument>> {
        self.hybrid.search_with_graph(query, tenant_id, options).await
    }

    /// Shortest path between two named concepts
    pub async fn shortest_path(
        &self,
        from_name: &str,
        to_name: &str,
        tenant_id: &str,
    ) -> Result<Option<ConceptPath>> {
        self.graph.shortest_path(from_name, to_name, tenant_id).await
    }

    /// Distinct related concepts up to a clamped depth
    pub async fn collect_related(
        &self,
        concept_name: &str,
        depth: i64,
        tenant_id: &str,
    ) -> Result<Vec<ConceptSummary>> {
        self.graph.collect_related(concept_name, depth, tenant_id).await
    }

    /// Deepest prerequisite chain into the named concept
    pub async fn prerequisite_chain(
        &self,
        concept_name: &str,
        tenant_id: &str,
    ) -> Result<Vec<ConceptSummary>> {
        self.graph.prerequisite_chain(concept_name, tenant_id).await
    }

    /// Create or update a concept node
    pub async fn upsert_concept(&self, concept: &Concept) -> Result<ConceptSummary> {
        self.graph.upsert_concept(concept).await
    }

    /// Create a typed edge between two named concepts
    pub async fn link_concepts(
        &self,
        from_name: &str,
        to_name: &str,
        kind: &RelationKind,
        strength: f64,
        description: Option<&str>,
        tenant_id: &str,
    ) -> Result<bool> {
        self.graph
            .link_concepts(from_name, to_name, kind, strength, description, tenant_id)
            .await
    }

    /// Embed and index documents into the corpus
    ///
    /// Without a provider, documents are indexed keyword-only (no embedding
    /// column); indexing failures propagate.
    pub async fn ingest_documents(
        &self,
        documents: Vec<DocumentInput>,
        tenant_id: &str,
    ) -> Result<usize> {
        if documents.is_empty() {
            return Ok(0);
        }

        let embeddings: Vec<Option<Vec<f32>>> = if self.embedder.has_provider() {
            let texts: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
            self.embedder
                .embed_documents(texts)
                .await?
                .into_iter()
                .map(Some)
                .collect()
        } else {
            debug!("Indexing {} documents without embeddings", documents.len());
            vec![None; documents.len()]
        };

        let paired: Vec<(DocumentInput, Option<Vec<f32>>)> =
            documents.into_iter().zip(embeddings).collect();
        self.channels.index_documents(paired, tenant_id).await
    }

    /// Embed one text through the cache
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embedder.embed_query(text).await
    }

    /// Embed a batch of texts through the cache
    pub async fn embed_documents(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        self.embedder.embed_documents(texts).await
    }

    /// Delete all cached embeddings
    pub async fn clear_cache(&self) -> Result<()> {
        self.embedder.clear_cache().await
    }

    /// Whether an embedding provider is configured
    pub fn has_provider(&self) -> bool {
        self.embedder.has_provider()
    }
}

/// Deterministic text-similarity heuristic for concept matches
///
/// Exact match scores 1.0, substring containment (either direction) 0.85,
/// anything else `0.5 + 0.35 x` the fraction of query words present in the
/// candidate.
pub(crate) fn text_similarity(query: &str, candidate: &str) -> f64 {
    let query_lower = query.to_lowercase();
    let candidate_lower = candidate.to_lowercase();

    if query_lower == candidate_lower {
        return EXACT_MATCH_SCORE;
    }
    if candidate_lower.contains(&query_lower) || query_lower.contains(&candidate_lower) {
        return CONTAINMENT_SCORE;
    }

    let query_words: Vec<&str> = query_lower.split_whitespace().collect();
    if query_words.is_empty() {
        return WORD_OVERLAP_BASE;
    }
    let candidate_words: Vec<&str> = candidate_lower.split_whitespace().collect();
    let matched = query_words
        .iter()
        .filter(|qw| candidate_words.iter().any(|cw| cw == *qw))
        .count();

    WORD_OVERLAP_BASE + WORD_OVERLAP_SPAN * (matched as f64 / query_words.len() as f64)
}
