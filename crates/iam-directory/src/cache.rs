//! TTL cache in front of a directory.
//!
//! Analyses fetch the same groups and policies many times (a policy bound to
//! ten groups is fetched ten times by a group matrix). `CachedDirectory`
//! remembers successful responses for a time-to-live, in a bounded LRU. The
//! cache is an explicit handle: whoever builds the analysis decides whether
//! to wrap the directory, and can inspect or clear it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::num::NonZeroUsize;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

use crate::directory::Directory;
use crate::error::{DirectoryError, DirectoryResult};
use crate::types::{
    Binding, EffectivePermissionsPage, EffectivePermissionsQuery, Group, Policy, User,
};

/// Entries kept when no capacity is given.
pub const DEFAULT_CAPACITY: usize = 1024;

/// A cached response.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: serde_json::Value,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl CacheEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

struct CacheState {
    entries: LruCache<String, CacheEntry>,
    hits: u64,
    misses: u64,
}

/// Cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups served from the cache
    pub hits: u64,
    /// Lookups that went to the directory
    pub misses: u64,
    /// Entries currently stored (including expired ones not yet evicted)
    pub entries: usize,
    /// Maximum number of entries
    pub capacity: usize,
    /// Creation time of the oldest stored entry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_entry: Option<DateTime<Utc>>,
}

impl CacheStats {
    /// Fraction of lookups served from the cache.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// A directory wrapper that caches successful reads.
///
/// Errors are never cached. Effective-permission pages are passed through
/// uncached. Expired entries are dropped when a read finds them; the least
/// recently used entry is dropped when the cache is full.
pub struct CachedDirectory<D> {
    inner: D,
    ttl: chrono::Duration,
    state: Mutex<CacheState>,
}

impl<D> std::fmt::Debug for CachedDirectory<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedDirectory")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl<D: Directory> CachedDirectory<D> {
    /// Wrap a directory with the given time-to-live and [`DEFAULT_CAPACITY`].
    pub fn new(inner: D, ttl: Duration) -> Self {
        Self::with_capacity(inner, ttl, DEFAULT_CAPACITY)
    }

    /// Wrap a directory keeping at most `capacity` entries (at least one).
    pub fn with_capacity(inner: D, ttl: Duration, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::zero()),
            state: Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                hits: 0,
                misses: 0,
            }),
        }
    }

    /// The wrapped directory.
    pub fn inner(&self) -> &D {
        &self.inner
    }

    /// Current statistics.
    pub async fn stats(&self) -> CacheStats {
        let state = self.state.lock().await;
        CacheStats {
            hits: state.hits,
            misses: state.misses,
            entries: state.entries.len(),
            capacity: state.entries.cap().get(),
            oldest_entry: state.entries.iter().map(|(_, e)| e.created_at).min(),
        }
    }

    /// Drop every entry. Returns the number of entries removed.
    pub async fn clear(&self) -> usize {
        let mut state = self.state.lock().await;
        let count = state.entries.len();
        state.entries.clear();
        count
    }

    /// Drop entries whose key starts with `prefix` (e.g. `"policy:"`).
    pub async fn invalidate_prefix(&self, prefix: &str) -> usize {
        self.remove_where(|key, _| key.starts_with(prefix)).await
    }

    /// Evict expired entries. Returns the number of entries removed.
    pub async fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        self.remove_where(|_, entry| entry.is_expired(now)).await
    }

    async fn remove_where(&self, predicate: impl Fn(&str, &CacheEntry) -> bool) -> usize {
        let mut state = self.state.lock().await;
        let doomed: Vec<String> = state
            .entries
            .iter()
            .filter(|(key, entry)| predicate(key, entry))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            state.entries.pop(key);
        }
        doomed.len()
    }

    async fn cached<T, F, Fut>(&self, key: String, fetch: F) -> DirectoryResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = DirectoryResult<T>>,
    {
        let hit = {
            let now = Utc::now();
            let mut state = self.state.lock().await;
            let found = state
                .entries
                .get(&key)
                .map(|entry| (entry.is_expired(now), entry.value.clone()));
            let cached = match found {
                Some((true, _)) => {
                    state.entries.pop(&key);
                    None
                }
                Some((false, value)) => Some(value),
                None => None,
            };
            match cached {
                Some(_) => state.hits += 1,
                None => state.misses += 1,
            }
            cached
        };

        if let Some(value) = hit {
            debug!(key = %key, "Cache hit");
            return serde_json::from_value(value)
                .map_err(|e| DirectoryError::InvalidResponse(e.to_string()));
        }

        let value = fetch().await?;

        let json = serde_json::to_value(&value)
            .map_err(|e| DirectoryError::InvalidResponse(e.to_string()))?;
        let created_at = Utc::now();
        self.state.lock().await.entries.put(
            key,
            CacheEntry {
                value: json,
                created_at,
                expires_at: created_at + self.ttl,
            },
        );

        Ok(value)
    }
}

#[async_trait]
impl<D: Directory> Directory for CachedDirectory<D> {
    fn account_uuid(&self) -> &str {
        self.inner.account_uuid()
    }

    async fn list_groups(&self) -> DirectoryResult<Vec<Group>> {
        self.cached("groups".to_string(), || self.inner.list_groups())
            .await
    }

    async fn get_group(&self, uuid: &str) -> DirectoryResult<Group> {
        self.cached(format!("group:{}", uuid), || self.inner.get_group(uuid))
            .await
    }

    async fn list_users(&self) -> DirectoryResult<Vec<User>> {
        self.cached("users".to_string(), || self.inner.list_users())
            .await
    }

    async fn get_user(&self, uid: &str) -> DirectoryResult<User> {
        self.cached(format!("user:{}", uid), || self.inner.get_user(uid))
            .await
    }

    async fn get_user_groups(&self, uid: &str) -> DirectoryResult<Vec<Group>> {
        self.cached(format!("user-groups:{}", uid), || {
            self.inner.get_user_groups(uid)
        })
        .await
    }

    async fn list_bindings(&self) -> DirectoryResult<Vec<Binding>> {
        self.cached("bindings".to_string(), || self.inner.list_bindings())
            .await
    }

    async fn list_bindings_for_group(&self, group_uuid: &str) -> DirectoryResult<Vec<Binding>> {
        self.cached(format!("group-bindings:{}", group_uuid), || {
            self.inner.list_bindings_for_group(group_uuid)
        })
        .await
    }

    async fn list_policies(&self) -> DirectoryResult<Vec<Policy>> {
        self.cached("policies".to_string(), || self.inner.list_policies())
            .await
    }

    async fn get_policy(&self, uuid: &str) -> DirectoryResult<Policy> {
        self.cached(format!("policy:{}", uuid), || self.inner.get_policy(uuid))
            .await
    }

    async fn get_effective_permissions(
        &self,
        query: &EffectivePermissionsQuery,
        page: u32,
        size: u32,
    ) -> DirectoryResult<EffectivePermissionsPage> {
        self.inner.get_effective_permissions(query, page, size).await
    }
}
