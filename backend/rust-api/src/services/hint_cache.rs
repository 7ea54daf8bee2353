//! Two-tier storage for session hint sets.
//!
//! The volatile tier is an in-process map and is authoritative for the life of
//! the process. The durable tier is a namespaced string key/value surface
//! (Redis in production) whose failures are logged and swallowed.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tokio::sync::RwLock;

use crate::error::{HintError, HintResult};
use crate::metrics::{record_cache_hit, record_cache_miss, track_cache_operation};
use crate::models::{HintKey, SessionHintSet};
use crate::utils::retry::{retry_async_with_config, RetryConfig};

pub const DEFAULT_CACHE_NAMESPACE: &str = "mathpractice:hints:";
const KEY_SEPARATOR: char = '_';
const SCAN_BATCH: usize = 100;

/// Builds the namespaced store key of a question's hint set.
pub fn cache_key(namespace: &str, key: &HintKey) -> String {
    format!(
        "{namespace}{}{sep}{}{sep}{}",
        key.topic_id,
        key.category_id,
        key.question_id,
        sep = KEY_SEPARATOR
    )
}

/// String-keyed persistence with no transactional guarantees.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> HintResult<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> HintResult<()>;
    async fn delete(&self, key: &str) -> HintResult<()>;
    /// Deletes every key starting with `prefix`, returning how many went.
    async fn delete_prefix(&self, prefix: &str) -> HintResult<u64>;
}

pub struct RedisKeyValueStore {
    redis: ConnectionManager,
}

impl RedisKeyValueStore {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl KeyValueStore for RedisKeyValueStore {
    async fn get(&self, key: &str) -> HintResult<Option<String>> {
        let mut conn = self.redis.clone();
        redis::cmd("GET")
            .arg(key)
            .query_async::<Option<String>>(&mut conn)
            .await
            .map_err(HintError::store)
    }

    async fn set(&self, key: &str, value: &str) -> HintResult<()> {
        let mut conn = self.redis.clone();
        // No TTL: hint sets only go away through an explicit regenerate.
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .query_async::<()>(&mut conn)
            .await
            .map_err(HintError::store)
    }

    async fn delete(&self, key: &str) -> HintResult<()> {
        let mut conn = self.redis.clone();
        redis::cmd("DEL")
            .arg(key)
            .query_async::<()>(&mut conn)
            .await
            .map_err(HintError::store)
    }

    async fn delete_prefix(&self, prefix: &str) -> HintResult<u64> {
        let mut conn = self.redis.clone();
        let pattern = format!("{}*", prefix);
        let mut cursor: u64 = 0;
        let mut deleted: u64 = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(HintError::store)?;

            if !keys.is_empty() {
                let removed: u64 = redis::cmd("DEL")
                    .arg(&keys)
                    .query_async(&mut conn)
                    .await
                    .map_err(HintError::store)?;
                deleted += removed;
            }

            if next == 0 {
                return Ok(deleted);
            }
            cursor = next;
        }
    }
}

/// Process-local key/value store, used when Redis is disabled and in tests.
#[derive(Default)]
pub struct InMemoryKeyValueStore {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> HintResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> HintResult<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> HintResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> HintResult<u64> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok((before - entries.len()) as u64)
    }
}

/// Typed hint-set storage keyed by the namespaced cache key.
#[async_trait]
pub trait HintStore: Send + Sync {
    async fn load(&self, key: &str) -> HintResult<Option<SessionHintSet>>;
    async fn store(&self, key: &str, set: &SessionHintSet) -> HintResult<()>;
    async fn remove(&self, key: &str) -> HintResult<()>;
    async fn clear(&self) -> HintResult<()>;
}

#[derive(Default)]
pub struct MemoryHintStore {
    sets: RwLock<HashMap<String, SessionHintSet>>,
}

impl MemoryHintStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HintStore for MemoryHintStore {
    async fn load(&self, key: &str) -> HintResult<Option<SessionHintSet>> {
        Ok(self.sets.read().await.get(key).cloned())
    }

    async fn store(&self, key: &str, set: &SessionHintSet) -> HintResult<()> {
        self.sets.write().await.insert(key.to_string(), set.clone());
        Ok(())
    }

    async fn remove(&self, key: &str) -> HintResult<()> {
        self.sets.write().await.remove(key);
        Ok(())
    }

    async fn clear(&self) -> HintResult<()> {
        self.sets.write().await.clear();
        Ok(())
    }
}

/// Hint sets serialized as JSON over a [`KeyValueStore`].
pub struct DurableHintStore {
    kv: Arc<dyn KeyValueStore>,
    namespace: String,
}

impl DurableHintStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, namespace: impl Into<String>) -> Self {
        Self {
            kv,
            namespace: namespace.into(),
        }
    }
}

#[async_trait]
impl HintStore for DurableHintStore {
    async fn load(&self, key: &str) -> HintResult<Option<SessionHintSet>> {
        match self.kv.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn store(&self, key: &str, set: &SessionHintSet) -> HintResult<()> {
        let raw = serde_json::to_string(set)?;
        self.kv.set(key, &raw).await
    }

    async fn remove(&self, key: &str) -> HintResult<()> {
        self.kv.delete(key).await
    }

    async fn clear(&self) -> HintResult<()> {
        let deleted = self.kv.delete_prefix(&self.namespace).await?;
        tracing::info!("Cleared {} durable hint sets under {}", deleted, self.namespace);
        Ok(())
    }
}

/// Read-through / write-through composition of a volatile and a durable store.
pub struct TieredHintCache {
    namespace: String,
    volatile: Arc<dyn HintStore>,
    durable: Arc<dyn HintStore>,
    write_retry: RetryConfig,
}

impl TieredHintCache {
    pub fn new(namespace: impl Into<String>, durable_kv: Arc<dyn KeyValueStore>) -> Self {
        let namespace = namespace.into();
        let durable = Arc::new(DurableHintStore::new(durable_kv, namespace.clone()));
        Self::with_stores(namespace, Arc::new(MemoryHintStore::new()), durable)
    }

    pub fn with_stores(
        namespace: impl Into<String>,
        volatile: Arc<dyn HintStore>,
        durable: Arc<dyn HintStore>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            volatile,
            durable,
            write_retry: RetryConfig::durable_write(),
        }
    }

    pub fn with_write_retry(mut self, retry: RetryConfig) -> Self {
        self.write_retry = retry;
        self
    }

    pub fn key_for(&self, key: &HintKey) -> String {
        cache_key(&self.namespace, key)
    }

    pub async fn get(&self, key: &HintKey) -> Option<SessionHintSet> {
        let cache_key = self.key_for(key);

        match self.volatile.load(&cache_key).await {
            Ok(Some(set)) => {
                record_cache_hit("volatile");
                tracing::debug!("Hint set found in volatile cache for {}", key);
                return Some(set);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Volatile hint cache read failed for {}: {}", key, e),
        }

        let loaded = track_cache_operation("load", self.durable.load(&cache_key)).await;
        match loaded {
            Ok(Some(set)) => {
                record_cache_hit("durable");
                tracing::debug!("Hint set promoted from durable store for {}", key);
                if let Err(e) = self.volatile.store(&cache_key, &set).await {
                    tracing::warn!("Failed to promote hint set for {}: {}", key, e);
                }
                Some(set)
            }
            Ok(None) => {
                record_cache_miss();
                None
            }
            Err(e) => {
                tracing::warn!("Durable hint store read failed for {}: {}", key, e);
                record_cache_miss();
                None
            }
        }
    }

    pub async fn put(&self, set: &SessionHintSet) {
        let key = set.key();
        let cache_key = self.key_for(&key);

        if let Err(e) = self.volatile.store(&cache_key, set).await {
            tracing::warn!("Volatile hint cache write failed for {}: {}", key, e);
        }

        let written = track_cache_operation(
            "store",
            retry_async_with_config(self.write_retry.clone(), "durable hint write", || {
                self.durable.store(&cache_key, set)
            }),
        )
        .await;
        if let Err(e) = written {
            tracing::warn!(
                "Durable hint store write failed for {}, keeping in-process copy: {}",
                key,
                e
            );
        }
    }

    /// Drops one question's hint set, or every hint set when `key` is `None`.
    pub async fn clear(&self, key: Option<&HintKey>) {
        match key {
            Some(key) => {
                let cache_key = self.key_for(key);
                if let Err(e) = self.volatile.remove(&cache_key).await {
                    tracing::warn!("Volatile hint cache delete failed for {}: {}", key, e);
                }
                if let Err(e) = track_cache_operation("remove", self.durable.remove(&cache_key)).await
                {
                    tracing::warn!("Durable hint store delete failed for {}: {}", key, e);
                }
                tracing::info!("Hint cache cleared for {}", key);
            }
            None => {
                if let Err(e) = self.volatile.clear().await {
                    tracing::warn!("Volatile hint cache clear failed: {}", e);
                }
                if let Err(e) = track_cache_operation("clear", self.durable.clear()).await {
                    tracing::warn!("Durable hint store clear failed: {}", e);
                }
                tracing::info!("Hint cache cleared under {}", self.namespace);
            }
        }
    }
}
