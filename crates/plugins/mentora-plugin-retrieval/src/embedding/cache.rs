/*!
# Embedding Cache

Content-addressed cache in front of the embedding provider. Keys are a
SHA-256 hash of the exact input text under a fixed namespace; within one TTL
window the provider is called at most once per distinct text, across both the
single and the batch entry point.

Running without a cache backend is a valid, supported mode: every call then
passes straight through to the provider.
*/

use super::EmbeddingBackend;
use async_trait::async_trait;
use mentora_core::{MentoraError, Result};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Namespace prefix for every embedding cache key
const CACHE_NAMESPACE: &str = "mentora:embed:";

/// Key/value cache backend seam
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a value
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a value with a TTL
    async fn set_ex(&self, key: &str, value: String, ttl_secs: u64) -> Result<()>;

    /// List live keys under a prefix
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;

    /// Delete a set of keys
    async fn delete_many(&self, keys: Vec<String>) -> Result<()>;
}

/// In-process TTL cache
///
/// Entries are immutable once written; a race between two concurrent misses
/// for the same text costs at most one redundant provider call and one
/// redundant write.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some((value, expires_at)) if *expires_at > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: String, ttl_secs: u64) -> Result<()> {
        let expires_at = Instant::now() + Duration::from_secs(ttl_secs);
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value, expires_at));
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let now = Instant::now();
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(key, (_, expires_at))| key.starts_with(prefix) && *expires_at > now)
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn delete_many(&self, keys: Vec<String>) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        for key in keys {
            entries.remove(&key);
        }
        Ok(())
    }
}

/// Content-addressed embedding cache
pub struct EmbeddingCache {
    backend: Option<Arc<dyn EmbeddingBackend>>,
    cache: Option<Arc<dyn CacheStore>>,
    ttl_secs: u64,
}

impl EmbeddingCache {
    /// Create a cache over an optional provider and optional cache backend
    pub fn new(
        backend: Option<Arc<dyn EmbeddingBackend>>,
        cache: Option<Arc<dyn CacheStore>>,
        ttl_secs: u64,
    ) -> Self {
        Self {
            backend,
            cache,
            ttl_secs,
        }
    }

    /// Whether an embedding provider is configured
    pub fn has_provider(&self) -> bool {
        self.backend.is_some()
    }

    fn backend(&self) -> Result<&Arc<dyn EmbeddingBackend>> {
        self.backend
            .as_ref()
            .ok_or_else(|| MentoraError::provider("no embedding provider configured"))
    }

    fn cache_key(text: &str) -> String {
        let digest = Sha256::digest(text.as_bytes());
        format!("{}{}", CACHE_NAMESPACE, hex::encode(digest))
    }

    /// Embed one text, consulting the cache first
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let backend = self.backend()?;

        let Some(cache) = &self.cache else {
            let mut vectors = backend.embed(vec![text.to_string()]).await?;
            return vectors
                .pop()
                .ok_or_else(|| MentoraError::provider("provider returned no embedding"));
        };

        let key = Self::cache_key(text);
        if let Some(cached) = cache.get(&key).await? {
            match serde_json::from_str(&cached) {
                Ok(vector) => {
                    debug!("Embedding cache hit");
                    return Ok(vector);
                }
                Err(e) => warn!("Discarding corrupt cached embedding: {}", e),
            }
        }

        let mut vectors = backend.embed(vec![text.to_string()]).await?;
        let vector: Vec<f32> = vectors
            .pop()
            .ok_or_else(|| MentoraError::provider("provider returned no embedding"))?;

        cache
            .set_ex(&key, serde_json::to_string(&vector)?, self.ttl_secs)
            .await?;
        Ok(vector)
    }

    /// Embed a batch of texts
    ///
    /// Only texts missing from the cache are sent upstream, in a single
    /// batched call; results come back in the original input order. Duplicate
    /// input texts are embedded once.
    pub async fn embed_documents(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let backend = self.backend()?;

        let Some(cache) = &self.cache else {
            return backend.embed(texts).await;
        };

        let mut resolved: HashMap<String, Vec<f32>> = HashMap::new();
        let mut missing: Vec<String> = Vec::new();

        for text in &texts {
            if resolved.contains_key(text) || missing.contains(text) {
                continue;
            }
            let key = Self::cache_key(text);
            match cache.get(&key).await? {
                Some(cached) => match serde_json::from_str(&cached) {
                    Ok(vector) => {
                        resolved.insert(text.clone(), vector);
                    }
                    Err(e) => {
                        warn!("Discarding corrupt cached embedding: {}", e);
                        missing.push(text.clone());
                    }
                },
                None => missing.push(text.clone()),
            }
        }

        if !missing.is_empty() {
            let fresh = backend.embed(missing.clone()).await?;
            if fresh.len() != missing.len() {
                return Err(MentoraError::provider(format!(
                    "Embedding count mismatch: sent {}, got {}",
                    missing.len(),
                    fresh.len()
                )));
            }
            for (text, vector) in missing.into_iter().zip(fresh) {
                let key = Self::cache_key(&text);
                cache
                    .set_ex(&key, serde_json::to_string(&vector)?, self.ttl_secs)
                    .await?;
                resolved.insert(text, vector);
            }
        }

        texts
            .iter()
            .map(|text| {
                resolved
                    .get(text)
                    .cloned()
                    .ok_or_else(|| MentoraError::provider("provider returned no embedding"))
            })
            .collect()
    }

    /// Delete every key under the cache namespace
    ///
    /// A no-op when no cache backend is configured.
    pub async fn clear_cache(&self) -> Result<()> {
        let Some(cache) = &self.cache else {
            return Ok(());
        };

        let keys = cache.keys_with_prefix(CACHE_NAMESPACE).await?;
        if keys.is_empty() {
            return Ok(());
        }
        debug!("Clearing {} cached embeddings", keys.len());
        cache.delete_many(keys).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::MockEmbeddingBackend;

    fn vector(seed: f32) -> Vec<f32> {
        vec![seed, seed + 0.5, seed + 1.0]
    }

    #[tokio::test]
    async fn test_provider_called_once_within_ttl() {
        let mut backend = MockEmbeddingBackend::new();
        backend
            .expect_embed()
            .times(1)
            .returning(|_| Ok(vec![vector(0.1)]));

        let cache = EmbeddingCache::new(
            Some(Arc::new(backend)),
            Some(Arc::new(MemoryCache::new())),
            3600,
        );

        let first = cache.embed_query("what is algebra").await.unwrap();
        let second = cache.embed_query("what is algebra").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_distinct_texts_each_embed() {
        let mut backend = MockEmbeddingBackend::new();
        backend
            .expect_embed()
            .times(2)
            .returning(|texts| Ok(texts.iter().map(|_| vector(0.2)).collect()));

        let cache = EmbeddingCache::new(
            Some(Arc::new(backend)),
            Some(Arc::new(MemoryCache::new())),
            3600,
        );

        cache.embed_query("algebra").await.unwrap();
        cache.embed_query("calculus").await.unwrap();
    }

    #[tokio::test]
    async fn test_batch_only_sends_misses() {
        let mut backend = MockEmbeddingBackend::new();
        backend
            .expect_embed()
            .times(1)
            .withf(|texts| *texts == ["algebra".to_string()])
            .returning(|_| Ok(vec![vector(0.3)]));
        backend
            .expect_embed()
            .times(1)
            .withf(|texts| *texts == ["calculus".to_string()])
            .returning(|_| Ok(vec![vector(0.4)]));

        let cache = EmbeddingCache::new(
            Some(Arc::new(backend)),
            Some(Arc::new(MemoryCache::new())),
            3600,
        );

        cache.embed_query("algebra").await.unwrap();

        // "algebra" is already cached; only "calculus" goes upstream
        let vectors = cache
            .embed_documents(vec!["algebra".to_string(), "calculus".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0], vector(0.3));
        assert_eq!(vectors[1], vector(0.4));
    }

    #[tokio::test]
    async fn test_batch_preserves_input_order_and_dedupes() {
        let mut backend = MockEmbeddingBackend::new();
        backend
            .expect_embed()
            .times(1)
            .withf(|texts| texts.len() == 2)
            .returning(|_| Ok(vec![vector(0.5), vector(0.6)]));

        let cache = EmbeddingCache::new(
            Some(Arc::new(backend)),
            Some(Arc::new(MemoryCache::new())),
            3600,
        );

        let vectors = cache
            .embed_documents(vec![
                "sets".to_string(),
                "logic".to_string(),
                "sets".to_string(),
            ])
            .await
            .unwrap();
        assert_eq!(vectors.len(), 3);
        assert_eq!(vectors[0], vectors[2]);
    }

    #[tokio::test]
    async fn test_passthrough_without_cache_backend() {
        let mut backend = MockEmbeddingBackend::new();
        backend
            .expect_embed()
            .times(2)
            .returning(|_| Ok(vec![vector(0.7)]));

        let cache = EmbeddingCache::new(Some(Arc::new(backend)), None, 3600);

        cache.embed_query("algebra").await.unwrap();
        cache.embed_query("algebra").await.unwrap();
    }

    #[tokio::test]
    async fn test_no_provider_is_a_provider_error() {
        let cache = EmbeddingCache::new(None, Some(Arc::new(MemoryCache::new())), 3600);
        assert!(!cache.has_provider());

        let err = cache.embed_query("algebra").await.unwrap_err();
        assert!(err.is_provider_error());
    }

    #[tokio::test]
    async fn test_clear_cache_removes_namespace_keys() {
        let mut backend = MockEmbeddingBackend::new();
        backend
            .expect_embed()
            .times(2)
            .returning(|_| Ok(vec![vector(0.8)]));

        let store = Arc::new(MemoryCache::new());
        store
            .set_ex("other:key", "kept".to_string(), 3600)
            .await
            .unwrap();

        let cache = EmbeddingCache::new(Some(Arc::new(backend)), Some(store.clone()), 3600);

        cache.embed_query("algebra").await.unwrap();
        assert_eq!(
            store.keys_with_prefix(CACHE_NAMESPACE).await.unwrap().len(),
            1
        );

        cache.clear_cache().await.unwrap();
        assert!(store
            .keys_with_prefix(CACHE_NAMESPACE)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(store.get("other:key").await.unwrap().unwrap(), "kept");

        // Entry is gone, so the provider is consulted again
        cache.embed_query("algebra").await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_cache_expiry() {
        let store = MemoryCache::new();
        store.set_ex("k", "v".to_string(), 0).await.unwrap();
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_cache_without_backend_is_noop() {
        let cache = EmbeddingCache::new(None, None, 3600);
        cache.clear_cache().await.unwrap();
    }
}
