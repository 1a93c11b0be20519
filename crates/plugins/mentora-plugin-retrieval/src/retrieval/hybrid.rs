//! Score fusion over the semantic and keyword channels

use crate::embedding::EmbeddingCache;
use mentora_core::types::{clamp_limit, RankedDocument, SearchOptions};
use mentora_core::Result;
use mentora_storage_graph::GraphStore;
use mentora_storage_search::{DocumentChannels, DocumentHit};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Neighborhood depth used when augmenting results from the graph
const GRAPH_NEIGHBOR_DEPTH: i64 = 2;
/// Cap on related concepts considered during augmentation
const MAX_GRAPH_CONCEPTS: usize = 5;
/// Documents fetched per related concept
const GRAPH_DOCS_PER_CONCEPT: i64 = 5;
/// Graph-derived documents enter at half their fused score
const GRAPH_WEIGHT_FACTOR: f64 = 0.5;

/// Hybrid multi-signal retriever
pub struct HybridSearch {
    channels: Arc<dyn DocumentChannels>,
    embedder: Arc<EmbeddingCache>,
    graph: Arc<GraphStore>,
}

impl HybridSearch {
    /// Create a retriever over the injected channels, embedder, and graph
    pub fn new(
        channels: Arc<dyn DocumentChannels>,
        embedder: Arc<EmbeddingCache>,
        graph: Arc<GraphStore>,
    ) -> Self {
        Self {
            channels,
            embedder,
            graph,
        }
    }

    /// Fused, ranked search over the tenant's document corpus
    ///
    /// Embeds the query, runs both channels up to `rerank_top_k` candidates
    /// each, fuses scores once per document id over the union, then sorts and
    /// assigns contiguous 1-indexed ranks over the top `top_k`. Channel and
    /// embedding failures propagate — an empty result would mislead the
    /// caller about relevance.
    pub async fn search(
        &self,
        query: &str,
        tenant_id: &str,
        options: SearchOptions,
    ) -> Result<Vec<RankedDocument>> {
        let options = normalize(options);
        let embedding = self.embedder.embed_query(query).await?;

        let semantic = self
            .channels
            .semantic_channel(embedding, tenant_id, options.rerank_top_k as i64)
            .await?;
        let keyword = self
            .channels
            .keyword_channel(query, tenant_id, options.rerank_top_k as i64)
            .await?;

        debug!(
            "Hybrid search '{}': {} semantic, {} keyword candidates",
            query,
            semantic.len(),
            keyword.len()
        );

        let fused = fuse_channels(
            semantic,
            keyword,
            options.semantic_weight,
            options.keyword_weight,
        );
        Ok(rank_documents(fused, options.top_k))
    }

    /// Search, then layer in graph-neighborhood documents
    ///
    /// Documents reached through related concepts enter at half the weight of
    /// their fused score and never overwrite an existing entry; the merged
    /// set is re-sorted and re-ranked contiguously.
    pub async fn search_with_graph(
        &self,
        query: &str,
        tenant_id: &str,
        options: SearchOptions,
    ) -> Result<Vec<RankedDocument>> {
        let keyword_weight = options.keyword_weight;
        let mut merged = self.search(query, tenant_id, options).await?;
        let mut seen: HashSet<String> = merged.iter().map(|d| d.id.clone()).collect();

        // Augmentation is additive; its failures downgrade to the base results.
        let anchors = match self.channels.concepts_by_text(query, tenant_id, 1).await {
            Ok(anchors) => anchors,
            Err(err) => {
                warn!("Concept anchor lookup failed, skipping graph augmentation: {}", err);
                Vec::new()
            }
        };

        if let Some(anchor) = anchors.first() {
            let related = self
                .graph
                .collect_related(&anchor.name, GRAPH_NEIGHBOR_DEPTH, tenant_id)
                .await?;

            for concept in related.iter().take(MAX_GRAPH_CONCEPTS) {
                let hits = match self
                    .channels
                    .keyword_channel(&concept.name, tenant_id, GRAPH_DOCS_PER_CONCEPT)
                    .await
                {
                    Ok(hits) => hits,
                    Err(err) => {
                        warn!(
                            "Graph augmentation lookup failed for '{}': {}",
                            concept.name, err
                        );
                        continue;
                    }
                };

                for hit in hits {
                    if seen.insert(hit.id.clone()) {
                        let combined = hit.score * keyword_weight * GRAPH_WEIGHT_FACTOR;
                        merged.push(RankedDocument {
                            id: hit.id,
                            content: hit.content,
                            metadata: hit.metadata,
                            semantic_score: 0.0,
                            keyword_score: hit.score,
                            combined_score: combined,
                            rank: 0,
                        });
                    }
                }
            }
        }

        let total = merged.len();
        Ok(rank_documents(merged, total))
    }
}

fn normalize(options: SearchOptions) -> SearchOptions {
    SearchOptions {
        top_k: clamp_limit(options.top_k as i64) as usize,
        rerank_top_k: clamp_limit(options.rerank_top_k as i64) as usize,
        ..options
    }
}

/// Fuse both channels once per document id over their union
///
/// A document absent from a channel contributes 0 for that channel's score;
/// a document present in both is merged into a single entry before ranking.
pub fn fuse_channels(
    semantic: Vec<DocumentHit>,
    keyword: Vec<DocumentHit>,
    semantic_weight: f64,
    keyword_weight: f64,
) -> Vec<RankedDocument> {
    let mut order: Vec<String> = Vec::new();
    let mut merged: HashMap<String, RankedDocument> = HashMap::new();

    for hit in semantic {
        order.push(hit.id.clone());
        merged.insert(
            hit.id.clone(),
            RankedDocument {
                id: hit.id,
                content: hit.content,
                metadata: hit.metadata,
                semantic_score: hit.score,
                keyword_score: 0.0,
                combined_score: 0.0,
                rank: 0,
            },
        );
    }

    for hit in keyword {
        match merged.get_mut(&hit.id) {
            Some(existing) => existing.keyword_score = hit.score,
            None => {
                order.push(hit.id.clone());
                merged.insert(
                    hit.id.clone(),
                    RankedDocument {
                        id: hit.id,
                        content: hit.content,
                        metadata: hit.metadata,
                        semantic_score: 0.0,
                        keyword_score: hit.score,
                        combined_score: 0.0,
                        rank: 0,
                    },
                );
            }
        }
    }

    order
        .into_iter()
        .filter_map(|id| merged.remove(&id))
        .map(|mut doc| {
            doc.combined_score =
                doc.semantic_score * semantic_weight + doc.keyword_score * keyword_weight;
            doc
        })
        .collect()
}

/// Sort by combined score, truncate, and assign contiguous 1-indexed ranks
pub fn rank_documents(mut documents: Vec<RankedDocument>, top_k: usize) -> Vec<RankedDocument> {
    documents.sort_by(|a, b| {
        b.combined_score
            .partial_cmp(&a.combined_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    documents.truncate(top_k);
    for (index, document) in documents.iter_mut().enumerate() {
        document.rank = index + 1;
    }
    documents
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{concept_row, embedder_with, hit, MockChannels, StubGraphTransport};
    use mentora_storage_search::ConceptTextHit;

    fn retriever(channels: MockChannels) -> HybridSearch {
        retriever_with_graph(channels, StubGraphTransport::default())
    }

    fn retriever_with_graph(channels: MockChannels, transport: StubGraphTransport) -> HybridSearch {
        HybridSearch::new(
            Arc::new(channels),
            Arc::new(embedder_with(vec![0.1, 0.2, 0.3])),
            Arc::new(GraphStore::new(Arc::new(transport))),
        )
    }

    #[test]
    fn test_fusion_weighted_sum_exact() {
        let fused = fuse_channels(
            vec![hit("doc", "text", 0.80)],
            vec![hit("doc", "text", 0.60)],
            0.7,
            0.3,
        );
        assert_eq!(fused.len(), 1);
        assert!((fused[0].combined_score - 0.74).abs() < 1e-9);
        assert_eq!(fused[0].semantic_score, 0.80);
        assert_eq!(fused[0].keyword_score, 0.60);
    }

    #[test]
    fn test_fusion_absent_channel_contributes_zero() {
        let fused = fuse_channels(
            vec![hit("high", "a", 0.95), hit("low", "b", 0.60)],
            vec![],
            0.7,
            0.3,
        );
        assert_eq!(fused.len(), 2);
        let high = fused.iter().find(|d| d.id == "high").unwrap();
        assert!((high.combined_score - 0.665).abs() < 1e-9);
        assert_eq!(high.keyword_score, 0.0);
    }

    #[test]
    fn test_fusion_dedupes_by_id() {
        let fused = fuse_channels(
            vec![hit("doc", "text", 0.9)],
            vec![hit("doc", "text", 0.5), hit("other", "text2", 0.4)],
            0.7,
            0.3,
        );
        let ids: HashSet<&str> = fused.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids.len(), fused.len());
        assert_eq!(fused.len(), 2);
    }

    #[test]
    fn test_rank_contiguous_from_one() {
        let docs = fuse_channels(
            vec![hit("a", "", 0.2), hit("b", "", 0.9), hit("c", "", 0.5)],
            vec![],
            1.0,
            0.0,
        );
        let ranked = rank_documents(docs, 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].id, "b");
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[1].id, "c");
        assert_eq!(ranked[1].rank, 2);
    }

    #[tokio::test]
    async fn test_search_orders_by_combined_score() {
        let mut channels = MockChannels::new();
        channels
            .expect_semantic_channel()
            .times(1)
            .returning(|_, _, _| Ok(vec![hit("high", "a", 0.95), hit("low", "b", 0.60)]));
        channels
            .expect_keyword_channel()
            .times(1)
            .returning(|_, _, _| Ok(vec![]));

        let results = retriever(channels)
            .search("derivatives", "acme", SearchOptions::default())
            .await
            .unwrap();

        assert_eq!(results[0].id, "high");
        assert!((results[0].combined_score - 0.665).abs() < 1e-9);
        assert_eq!(results[1].id, "low");
        assert_eq!(results[0].rank, 1);
        assert_eq!(results[1].rank, 2);
    }

    #[tokio::test]
    async fn test_search_clamps_rerank_limit() {
        let mut channels = MockChannels::new();
        channels
            .expect_semantic_channel()
            .times(1)
            .withf(|_, _, limit| *limit == 200)
            .returning(|_, _, _| Ok(vec![]));
        channels
            .expect_keyword_channel()
            .times(1)
            .withf(|_, _, limit| *limit == 200)
            .returning(|_, _, _| Ok(vec![]));

        let options = SearchOptions {
            rerank_top_k: 5_000,
            ..Default::default()
        };
        let results = retriever(channels)
            .search("q", "acme", options)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_search_propagates_channel_errors() {
        let mut channels = MockChannels::new();
        channels
            .expect_semantic_channel()
            .times(1)
            .returning(|_, _, _| Err(mentora_core::MentoraError::database("corpus offline")));

        let result = retriever(channels)
            .search("q", "acme", SearchOptions::default())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_graph_augmentation_never_overwrites() {
        let mut channels = MockChannels::new();
        channels
            .expect_semantic_channel()
            .times(1)
            .returning(|_, _, _| Ok(vec![hit("doc-1", "base", 0.9)]));
        channels
            .expect_keyword_channel()
            .times(1)
            .withf(|query, _, _| query == "q")
            .returning(|_, _, _| Ok(vec![]));
        channels
            .expect_concepts_by_text()
            .times(1)
            .returning(|_, _, _| {
                Ok(vec![ConceptTextHit {
                    id: "c-1".to_string(),
                    name: "Algebra".to_string(),
                    definition: String::new(),
                }])
            });
        // Graph neighbors resolve to documents; doc-1 already exists and
        // keeps its original score, doc-2 enters at half weight.
        channels
            .expect_keyword_channel()
            .withf(|query, _, _| query == "Polynomials")
            .returning(|_, _, _| Ok(vec![hit("doc-1", "dupe", 0.99), hit("doc-2", "new", 0.8)]));

        let transport = StubGraphTransport {
            rows: vec![concept_row("9", "Polynomials")],
        };
        let results = retriever_with_graph(channels, transport)
            .search_with_graph("q", "acme", SearchOptions::default())
            .await
            .unwrap();

        let base = results.iter().find(|d| d.id == "doc-1").unwrap();
        assert!((base.combined_score - 0.9 * 0.7).abs() < 1e-9);

        let added = results.iter().find(|d| d.id == "doc-2").unwrap();
        assert!((added.combined_score - 0.8 * 0.3 * 0.5).abs() < 1e-9);

        // Contiguous re-rank over the merged set
        let mut ranks: Vec<usize> = results.iter().map(|d| d.rank).collect();
        ranks.sort_unstable();
        assert_eq!(ranks, (1..=results.len()).collect::<Vec<_>>());
    }
}
