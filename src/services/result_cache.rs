//! Query result cache with per-data-source invalidation.
//!
//! The cache is strictly best-effort: a failing or absent backing store
//! degrades to "always recompute" and is never surfaced to callers.
//! Keys digest the trimmed query text, the canonical parameter object and
//! the sorted data-source-id list; a reverse index maps each data-source id
//! to the keys depending on it so writes can invalidate precisely.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use crate::config::CacheConfig;
use crate::models::Row;

/// Backing store seam. A shared store (multi-process deployment) implements
/// this with native TTL and set operations; the in-process fallback below is
/// used when none is configured. Implementations swallow their own failures
/// and answer as a miss.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<Vec<Row>>;
    async fn set(&self, key: &str, rows: Vec<Row>, ttl: Duration);
    async fn delete(&self, key: &str);

    async fn set_add(&self, set_key: &str, member: &str);
    async fn set_members(&self, set_key: &str) -> Vec<String>;
    async fn set_delete(&self, set_key: &str);

    async fn clear(&self);
    async fn entry_count(&self) -> usize;
    async fn memory_usage(&self) -> Option<usize>;
    fn backing_type(&self) -> &'static str;
}

type Clock = Arc<dyn Fn() -> Instant + Send + Sync>;

struct LocalEntry {
    rows: Vec<Row>,
    inserted_at: Instant,
    expires_at: Instant,
    approx_bytes: usize,
}

/// Process-local bounded fallback store. Expired entries are evicted lazily
/// on write; overflow evicts the oldest tenth of the map.
pub struct LocalCacheStore {
    entries: DashMap<String, LocalEntry>,
    sets: DashMap<String, HashSet<String>>,
    max_entries: usize,
    clock: Clock,
}

impl LocalCacheStore {
    pub fn new(max_entries: usize) -> Self {
        Self::with_clock(max_entries, Arc::new(Instant::now))
    }

    /// Injectable clock so TTL expiry is testable without sleeping.
    pub fn with_clock(max_entries: usize, clock: Clock) -> Self {
        Self {
            entries: DashMap::new(),
            sets: DashMap::new(),
            max_entries: max_entries.max(1),
            clock,
        }
    }

    // Evicted keys must also leave every reverse-index set, or the index
    // grows without bound and invalidation counts stale members.
    fn forget_key(&self, key: &str) {
        self.sets.retain(|_, members| {
            members.remove(key);
            !members.is_empty()
        });
    }

    fn evict_expired(&self, now: Instant) {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.value().expires_at <= now)
            .map(|e| e.key().clone())
            .collect();
        for key in expired {
            self.entries.remove(&key);
            self.forget_key(&key);
        }
    }

    fn evict_oldest_overflow(&self) {
        if self.entries.len() < self.max_entries {
            return;
        }
        let batch = (self.max_entries / 10).max(1);
        let mut by_age: Vec<(String, Instant)> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().inserted_at))
            .collect();
        by_age.sort_by_key(|(_, inserted_at)| *inserted_at);
        for (key, _) in by_age.into_iter().take(batch) {
            self.entries.remove(&key);
            self.forget_key(&key);
        }
        tracing::debug!("Local cache overflow, evicted {} oldest entries", batch);
    }
}

#[async_trait]
impl CacheStore for LocalCacheStore {
    async fn get(&self, key: &str) -> Option<Vec<Row>> {
        let now = (self.clock)();
        let entry = self.entries.get(key)?;
        if entry.expires_at <= now {
            drop(entry);
            self.entries.remove(key);
            self.forget_key(key);
            return None;
        }
        Some(entry.rows.clone())
    }

    async fn set(&self, key: &str, rows: Vec<Row>, ttl: Duration) {
        let now = (self.clock)();
        self.evict_expired(now);
        self.evict_oldest_overflow();

        let approx_bytes = rows
            .iter()
            .map(|row| serde_json::to_string(row).map(|s| s.len()).unwrap_or(0))
            .sum::<usize>()
            + key.len();

        self.entries.insert(
            key.to_string(),
            LocalEntry { rows, inserted_at: now, expires_at: now + ttl, approx_bytes },
        );
    }

    async fn delete(&self, key: &str) {
        self.entries.remove(key);
        self.forget_key(key);
    }

    async fn set_add(&self, set_key: &str, member: &str) {
        self.sets
            .entry(set_key.to_string())
            .or_default()
            .insert(member.to_string());
    }

    async fn set_members(&self, set_key: &str) -> Vec<String> {
        self.sets
            .get(set_key)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    async fn set_delete(&self, set_key: &str) {
        self.sets.remove(set_key);
    }

    async fn clear(&self) {
        self.entries.clear();
        self.sets.clear();
    }

    async fn entry_count(&self) -> usize {
        self.entries.len()
    }

    async fn memory_usage(&self) -> Option<usize> {
        Some(self.entries.iter().map(|e| e.value().approx_bytes).sum())
    }

    fn backing_type(&self) -> &'static str {
        "local"
    }
}

/// Cache admin stats for the operational surface.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub enabled: bool,
    pub backing_type: &'static str,
    pub entry_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_usage: Option<usize>,
}

/// The cache service value. Constructed once at startup and passed by
/// reference into the router and every invalidation call site.
pub struct ResultCache {
    store: Arc<dyn CacheStore>,
    enabled: bool,
    default_ttl: Duration,
}

impl ResultCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_store(
            Arc::new(LocalCacheStore::new(config.max_entries)),
            config.enabled,
            Duration::from_secs(config.ttl_default_secs),
        )
    }

    pub fn with_store(store: Arc<dyn CacheStore>, enabled: bool, default_ttl: Duration) -> Self {
        Self { store, enabled, default_ttl }
    }

    /// SHA-256 digest over the canonicalized key material.
    pub fn cache_key(query: &str, params: &serde_json::Value, data_source_ids: &[String]) -> String {
        let mut ids: Vec<&str> = data_source_ids.iter().map(String::as_str).collect();
        ids.sort_unstable();

        let mut hasher = Sha256::new();
        hasher.update(query.trim().as_bytes());
        hasher.update(b"\n");
        hasher.update(params.to_string().as_bytes());
        hasher.update(b"\n");
        hasher.update(ids.join(",").as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub async fn get(
        &self,
        query: &str,
        params: &serde_json::Value,
        data_source_ids: &[String],
    ) -> Option<Vec<Row>> {
        if !self.enabled {
            return None;
        }
        let key = Self::cache_key(query, params, data_source_ids);
        let hit = self.store.get(&key).await;
        if hit.is_some() {
            tracing::debug!("Cache hit for key {}", &key[..12]);
        }
        hit
    }

    pub async fn set(
        &self,
        query: &str,
        params: &serde_json::Value,
        data_source_ids: &[String],
        rows: Vec<Row>,
        ttl: Option<Duration>,
    ) {
        if !self.enabled {
            return;
        }
        let key = Self::cache_key(query, params, data_source_ids);
        self.store
            .set(&key, rows, ttl.unwrap_or(self.default_ttl))
            .await;
        for id in data_source_ids {
            self.store.set_add(&index_key(id), &key).await;
        }
    }

    /// Delete every cached key depending on the data source, then the index
    /// itself. The only correct invalidation path; the write layer must call
    /// it whenever underlying data changes.
    pub async fn invalidate_data_source(&self, data_source_id: &str) -> usize {
        let index = index_key(data_source_id);
        let keys = self.store.set_members(&index).await;
        let count = keys.len();
        for key in keys {
            self.store.delete(&key).await;
        }
        self.store.set_delete(&index).await;
        tracing::info!(
            "Invalidated {} cached result(s) for data source {}",
            count,
            data_source_id
        );
        count
    }

    pub async fn clear(&self) {
        self.store.clear().await;
        tracing::info!("Result cache cleared");
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            enabled: self.enabled,
            backing_type: self.store.backing_type(),
            entry_count: self.store.entry_count().await,
            memory_usage: self.store.memory_usage().await,
        }
    }
}

fn index_key(data_source_id: &str) -> String {
    format!("src:{}", data_source_id)
}
