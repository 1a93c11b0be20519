/*!
# Retrieval Plugin for Mentora

The tenant-isolated retrieval core of the platform:

- **Embedding Cache**: content-addressed cache in front of the HTTP embedding
  provider
- **Hybrid Retrieval**: vector + keyword score fusion with optional
  graph-neighborhood augmentation
- **Retrieval Facade**: the contract callers consume, including the keyword
  fallback used when no embedding provider is reachable

## Example Usage

```rust,no_run
use std::sync::Arc;
use mentora_core::types::SearchOptions;
use mentora_plugin_retrieval::{
    EmbeddingCache, EmbeddingConfig, HttpEmbeddingClient, KnowledgeRetriever, MemoryCache,
};
use mentora_storage_graph::{GraphStore, GraphStoreConfig, PgCypherTransport};
use mentora_storage_search::{PgDocumentChannels, SearchStoreConfig};

# async fn run(pool: sqlx::PgPool) -> mentora_core::Result<()> {
let embedding_config = EmbeddingConfig::from_env();
let provider = HttpEmbeddingClient::from_config(&embedding_config)
    .map(|client| Arc::new(client) as Arc<dyn mentora_plugin_retrieval::EmbeddingBackend>);
let embedder = Arc::new(EmbeddingCache::new(
    provider,
    Some(Arc::new(MemoryCache::new())),
    embedding_config.cache_ttl_secs,
));

let graph_config = GraphStoreConfig::from_env();
let transport = PgCypherTransport::new(pool.clone(), &graph_config)?;
let graph = Arc::new(GraphStore::new(Arc::new(transport)));

let channels = Arc::new(PgDocumentChannels::new(pool, &SearchStoreConfig::default()));

let retriever = KnowledgeRetriever::new(embedder, channels, graph);
let results = retriever
    .search("what is a derivative", "acme", SearchOptions::default())
    .await?;
# Ok(())
# }
```
*/

#![warn(clippy::all)]

pub mod embedding;
pub mod facade;
pub mod retrieval;

pub use embedding::{
    CacheStore, EmbeddingBackend, EmbeddingCache, EmbeddingConfig, HttpEmbeddingClient,
    MemoryCache,
};
pub use facade::KnowledgeRetriever;
pub use retrieval::HybridSearch;

#[cfg(test)]
pub(crate) mod test_support {
    use crate::embedding::{EmbeddingCache, MockEmbeddingBackend};
    use async_trait::async_trait;
    use mentora_core::types::DocumentInput;
    use mentora_core::Result;
    use mentora_storage_graph::{AgValue, CypherRow, CypherTransport};
    use mentora_storage_search::{ConceptTextHit, DocumentChannels, DocumentHit};
    use std::sync::Arc;

    mockall::mock! {
        pub Channels {}

        #[async_trait]
        impl DocumentChannels for Channels {
            async fn semantic_channel(
                &self,
                embedding: Vec<f32>,
                tenant_id: &str,
                limit: i64,
            ) -> Result<Vec<DocumentHit>>;

            async fn keyword_channel(
                &self,
                query: &str,
                tenant_id: &str,
                limit: i64,
            ) -> Result<Vec<DocumentHit>>;

            async fn substring_channel(
                &self,
                query: &str,
                tenant_id: &str,
                limit: i64,
            ) -> Result<Vec<DocumentHit>>;

            async fn concepts_by_text(
                &self,
                query: &str,
                tenant_id: &str,
                limit: i64,
            ) -> Result<Vec<ConceptTextHit>>;

            async fn index_documents(
                &self,
                documents: Vec<(DocumentInput, Option<Vec<f32>>)>,
                tenant_id: &str,
            ) -> Result<usize>;
        }
    }

    /// Transport stub answering every traversal with the same rows
    #[derive(Default)]
    pub struct StubGraphTransport {
        pub rows: Vec<CypherRow>,
    }

    #[async_trait]
    impl CypherTransport for StubGraphTransport {
        async fn run_bound(
            &self,
            _tenant_id: &str,
            _query: &str,
            _params: serde_json::Value,
            _columns: Vec<String>,
        ) -> Result<Vec<CypherRow>> {
            Ok(self.rows.clone())
        }

        async fn run_literal(
            &self,
            _tenant_id: &str,
            _query: &str,
            _columns: Vec<String>,
        ) -> Result<Vec<CypherRow>> {
            Ok(self.rows.clone())
        }
    }

    pub fn hit(id: &str, content: &str, score: f64) -> DocumentHit {
        DocumentHit {
            id: id.to_string(),
            content: content.to_string(),
            metadata: Default::default(),
            score,
        }
    }

    pub fn concept_row(id: &str, name: &str) -> CypherRow {
        [
            ("id".to_string(), AgValue::Text(id.to_string())),
            ("name".to_string(), AgValue::Text(name.to_string())),
        ]
        .into_iter()
        .collect()
    }

    pub fn embedder_with(vector: Vec<f32>) -> EmbeddingCache {
        let mut backend = MockEmbeddingBackend::new();
        backend
            .expect_embed()
            .returning(move |texts| Ok(texts.iter().map(|_| vector.clone()).collect()));
        EmbeddingCache::new(Some(Arc::new(backend)), None, 3600)
    }

    pub fn embedder_failing() -> EmbeddingCache {
        let mut backend = MockEmbeddingBackend::new();
        backend
            .expect_embed()
            .returning(|_| Err(mentora_core::MentoraError::provider("provider down")));
        EmbeddingCache::new(Some(Arc::new(backend)), None, 3600)
    }

    pub fn embedder_absent() -> EmbeddingCache {
        EmbeddingCache::new(None, None, 3600)
    }
}
