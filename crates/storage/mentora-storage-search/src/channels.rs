//! PostgreSQL document channels (pgvector + full-text search)

use crate::{ConceptTextHit, DocumentChannels, DocumentHit, SearchStoreConfig};
use async_trait::async_trait;
use mentora_core::types::{clamp_limit, DocumentInput};
use mentora_core::{MentoraError, Result};
use sqlx::{PgPool, Row};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

/// PostgreSQL-backed document channels
pub struct PgDocumentChannels {
    pool: PgPool,
    query_timeout: Duration,
    embedding_dimension: usize,
}

impl PgDocumentChannels {
    /// Create channels over an injected pool
    pub fn new(pool: PgPool, config: &SearchStoreConfig) -> Self {
        Self {
            pool,
            query_timeout: Duration::from_secs(config.query_timeout_secs),
            embedding_dimension: config.embedding_dimension,
        }
    }

    /// Initialize the corpus schema
    pub async fn init_schema(&self) -> Result<()> {
        debug!("Initializing document corpus schema...");

        // Ignore error if the extension already exists or can't be created
        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&self.pool)
            .await
            .ok();

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS knowledge_documents (
                id TEXT NOT NULL,
                tenant_id TEXT NOT NULL,
                content TEXT NOT NULL,
                metadata JSONB NOT NULL DEFAULT '{{}}',
                embedding vector({}),
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                PRIMARY KEY (tenant_id, id)
            )
        "#,
            self.embedding_dimension
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS concepts (
                id UUID NOT NULL,
                tenant_id TEXT NOT NULL,
                name TEXT NOT NULL,
                definition TEXT NOT NULL DEFAULT '',
                PRIMARY KEY (tenant_id, id)
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS knowledge_documents_embedding_idx
             ON knowledge_documents USING hnsw (embedding vector_cosine_ops)",
        )
        .execute(&self.pool)
        .await
        .ok();

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS knowledge_documents_content_fts_idx
             ON knowledge_documents USING gin (to_tsvector('english', content))",
        )
        .execute(&self.pool)
        .await?;

        info!("Document corpus schema ready");
        Ok(())
    }

    async fn timed<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, sqlx::Error>>,
    {
        tokio::time::timeout(self.query_timeout, fut)
            .await
            .map_err(|_| {
                MentoraError::timeout(format!(
                    "document query exceeded {}s",
                    self.query_timeout.as_secs()
                ))
            })?
            .map_err(MentoraError::from)
    }
}

fn hit_from_row(row: &sqlx::postgres::PgRow, with_score: bool) -> Result<DocumentHit> {
    let metadata = row
        .try_get::<Option<serde_json::Value>, _>("metadata")?
        .and_then(|v| match v {
            serde_json::Value::Object(map) => Some(map),
            _ => None,
        })
        .unwrap_or_default();

    Ok(DocumentHit {
        id: row.try_get("id")?,
        content: row.try_get("content")?,
        metadata,
        score: if with_score {
            row.try_get::<f64, _>("score").or_else(|_| {
                // ts_rank reports REAL; similarity reports DOUBLE PRECISION
                row.try_get::<f32, _>("score").map(f64::from)
            })?
        } else {
            0.0
        },
    })
}

#[async_trait]
impl DocumentChannels for PgDocumentChannels {
    async fn semantic_channel(
        &self,
        embedding: Vec<f32>,
        tenant_id: &str,
        limit: i64,
    ) -> Result<Vec<DocumentHit>> {
        if embedding.len() != self.embedding_dimension {
            return Err(MentoraError::validation(format!(
                "Embedding dimension mismatch: expected {}, got {}",
                self.embedding_dimension,
                embedding.len()
            )));
        }
        let limit = clamp_limit(limit);
        let embedding_json = serde_json::to_string(&embedding)?;

        let rows = self
            .timed(
                sqlx::query(
                    "SELECT id, content, metadata,
                            1 - (embedding <=> $1::vector) AS score
                     FROM knowledge_documents
                     WHERE tenant_id = $2 AND embedding IS NOT NULL
                     ORDER BY embedding <=> $1::vector
                     LIMIT $3",
                )
                .bind(&embedding_json)
                .bind(tenant_id)
                .bind(limit)
                .fetch_all(&self.pool),
            )
            .await?;

        rows.iter().map(|row| hit_from_row(row, true)).collect()
    }

    async fn keyword_channel(
        &self,
        query: &str,
        tenant_id: &str,
        limit: i64,
    ) -> Result<Vec<DocumentHit>> {
        let limit = clamp_limit(limit);

        let rows = self
            .timed(
                sqlx::query(
                    "SELECT id, content, metadata,
                            ts_rank(to_tsvector('english', content),
                                    plainto_tsquery('english', $1)) AS score
                     FROM knowledge_documents
                     WHERE tenant_id = $2
                       AND to_tsvector('english', content) @@ plainto_tsquery('english', $1)
                     ORDER BY score DESC
                     LIMIT $3",
                )
                .bind(query)
                .bind(tenant_id)
                .bind(limit)
                .fetch_all(&self.pool),
            )
            .await?;

        rows.iter().map(|row| hit_from_row(row, true)).collect()
    }

    async fn substring_channel(
        &self,
        query: &str,
        tenant_id: &str,
        limit: i64,
    ) -> Result<Vec<DocumentHit>> {
        let limit = clamp_limit(limit);
        let pattern = format!("%{}%", query);

        let rows = self
            .timed(
                sqlx::query(
                    "SELECT id, content, metadata
                     FROM knowledge_documents
                     WHERE tenant_id = $1 AND content ILIKE $2
                     LIMIT $3",
                )
                .bind(tenant_id)
                .bind(&pattern)
                .bind(limit)
                .fetch_all(&self.pool),
            )
            .await?;

        rows.iter().map(|row| hit_from_row(row, false)).collect()
    }

    async fn concepts_by_text(
        &self,
        query: &str,
        tenant_id: &str,
        limit: i64,
    ) -> Result<Vec<ConceptTextHit>> {
        let limit = clamp_limit(limit);
        let pattern = format!("%{}%", query);

        let rows = self
            .timed(
                sqlx::query(
                    "SELECT id, name, definition
                     FROM concepts
                     WHERE tenant_id = $1 AND (name ILIKE $2 OR definition ILIKE $2)
                     LIMIT $3",
                )
                .bind(tenant_id)
                .bind(&pattern)
                .bind(limit)
                .fetch_all(&self.pool),
            )
            .await?;

        rows.iter()
            .map(|row| {
                Ok(ConceptTextHit {
                    id: row.try_get::<uuid::Uuid, _>("id")?.to_string(),
                    name: row.try_get("name")?,
                    definition: row.try_get("definition")?,
                })
            })
            .collect()
    }

    async fn index_documents(
        &self,
        documents: Vec<(DocumentInput, Option<Vec<f32>>)>,
        tenant_id: &str,
    ) -> Result<usize> {
        if documents.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let count = documents.len();

        for (document, embedding) in documents {
            let embedding_json = embedding.map(|e| serde_json::to_string(&e)).transpose()?;

            sqlx::query(
                "INSERT INTO knowledge_documents (id, tenant_id, content, metadata, embedding)
                 VALUES ($1, $2, $3, $4, $5::vector)
                 ON CONFLICT (tenant_id, id) DO UPDATE
                 SET content = EXCLUDED.content,
                     metadata = EXCLUDED.metadata,
                     embedding = EXCLUDED.embedding,
                     updated_at = now()",
            )
            .bind(&document.id)
            .bind(tenant_id)
            .bind(&document.content)
            .bind(serde_json::Value::Object(document.metadata))
            .bind(embedding_json)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!("Indexed {} documents for tenant {}", count, tenant_id);
        Ok(count)
    }
}
