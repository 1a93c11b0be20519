/*!
# Embedding Provider

HTTP client for the upstream text-embedding service, behind the
[`EmbeddingBackend`] seam. The provider may be entirely absent (no URL
configured), which is a valid, detectable state handled by the retrieval
facade.
*/

pub mod cache;

pub use cache::{CacheStore, EmbeddingCache, MemoryCache};

use async_trait::async_trait;
use mentora_core::{MentoraError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Shared HTTP client for connection pooling
static HTTP_CLIENT: OnceLock<Client> = OnceLock::new();

/// Get or initialize the shared HTTP client
fn get_http_client() -> Client {
    HTTP_CLIENT
        .get_or_init(|| {
            Client::builder()
                .pool_max_idle_per_host(50)
                .pool_idle_timeout(std::time::Duration::from_secs(300))
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to create HTTP client")
        })
        .clone()
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider endpoint; `None` means no provider is configured
    pub api_url: Option<String>,

    /// Embedding model identifier
    pub model: String,

    /// Optional bearer token
    pub api_key: Option<String>,

    /// Cache TTL in seconds
    pub cache_ttl_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            model: "text-embedding-3-small".to_string(),
            api_key: None,
            cache_ttl_secs: 86_400,
        }
    }
}

impl EmbeddingConfig {
    /// Build from `EMBEDDING_API_URL` / `EMBEDDING_MODEL` / `EMBEDDING_API_KEY`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_url: std::env::var("EMBEDDING_API_URL").ok(),
            model: std::env::var("EMBEDDING_MODEL").unwrap_or(defaults.model),
            api_key: std::env::var("EMBEDDING_API_KEY").ok(),
            cache_ttl_secs: std::env::var("EMBEDDING_CACHE_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.cache_ttl_secs),
        }
    }
}

/// Upstream embedding call
///
/// One batched request embeds any number of texts; the response vector order
/// matches the input order.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embed a batch of texts
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embeddings: Vec<Vec<f32>>,
}

/// HTTP embedding provider client
pub struct HttpEmbeddingClient {
    client: Client,
    api_url: String,
    model: String,
    api_key: Option<String>,
}

impl HttpEmbeddingClient {
    /// Create a client when a provider URL is configured
    pub fn from_config(config: &EmbeddingConfig) -> Option<Self> {
        config.api_url.as_ref().map(|api_url| Self {
            client: get_http_client(),
            api_url: api_url.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl EmbeddingBackend for HttpEmbeddingClient {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: &texts,
        };

        let mut builder = self.client.post(&self.api_url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| MentoraError::provider(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MentoraError::provider(format!(
                "Embedding API error ({}): {}",
                status, body
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| MentoraError::provider(format!("Malformed embedding response: {}", e)))?;

        if parsed.embeddings.len() != texts.len() {
            return Err(MentoraError::provider(format!(
                "Embedding count mismatch: sent {}, got {}",
                texts.len(),
                parsed.embeddings.len()
            )));
        }

        Ok(parsed.embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_provider_when_url_missing() {
        let config = EmbeddingConfig::default();
        assert!(HttpEmbeddingClient::from_config(&config).is_none());
    }

    #[test]
    fn test_client_built_when_url_present() {
        let config = EmbeddingConfig {
            api_url: Some("http://localhost:8100/embeddings".to_string()),
            ..Default::default()
        };
        let client = HttpEmbeddingClient::from_config(&config).unwrap();
        assert_eq!(client.model, "text-embedding-3-small");
    }
}
