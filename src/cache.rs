//! # Read Caches
//!
//! Small in-process LRU caches for tenant settings and leaderboard pages.
//! Entries are dropped by enumerating their exact keys at each mutation
//! point. There is no prefix or pattern eviction.

use std::num::NonZeroUsize;
use std::sync::Arc;

use chrono::NaiveDate;
use lru::LruCache;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{leaderboard_entry, metric_definition};
use crate::period::PeriodType;

/// Page sizes the leaderboard read path serves and caches.
pub const LEADERBOARD_PAGE_LIMITS: [u64; 4] = [5, 10, 20, 50];

/// Cache key builders. Every key a mutation may stale is derivable here.
pub struct CacheKey;

impl CacheKey {
    pub fn metric_catalog(tenant_id: Uuid) -> String {
        format!("metric_catalog:{tenant_id}")
    }

    pub fn leaderboard_page(
        tenant_id: Uuid,
        period_type: PeriodType,
        period_start: NaiveDate,
        limit: u64,
    ) -> String {
        format!("leaderboard:{tenant_id}:{period_type}:{period_start}:{limit}")
    }

    /// Every cached page of one leaderboard.
    pub fn leaderboard_pages(
        tenant_id: Uuid,
        period_type: PeriodType,
        period_start: NaiveDate,
    ) -> Vec<String> {
        LEADERBOARD_PAGE_LIMITS
            .iter()
            .map(|limit| Self::leaderboard_page(tenant_id, period_type, period_start, *limit))
            .collect()
    }
}

/// String-keyed LRU behind an async lock.
pub struct KeyedCache<V> {
    inner: Arc<RwLock<LruCache<String, V>>>,
}

impl<V> Clone for KeyedCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: Clone> KeyedCache<V> {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(RwLock::new(LruCache::new(capacity))),
        }
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        // LruCache::get promotes the entry, so it needs the write lock
        let mut cache = self.inner.write().await;
        cache.get(key).cloned()
    }

    pub async fn put(&self, key: String, value: V) {
        let mut cache = self.inner.write().await;
        cache.put(key, value);
    }

    pub async fn invalidate(&self, keys: &[String]) {
        let mut cache = self.inner.write().await;
        for key in keys {
            cache.pop(key);
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}

/// The caches shared by the engine components.
#[derive(Clone)]
pub struct EngineCache {
    pub metric_catalog: KeyedCache<Vec<metric_definition::Model>>,
    pub leaderboard_pages: KeyedCache<Vec<leaderboard_entry::Model>>,
}

impl EngineCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            metric_catalog: KeyedCache::new(capacity),
            leaderboard_pages: KeyedCache::new(capacity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaderboard_page_keys_cover_every_limit() {
        let tenant = Uuid::nil();
        let start = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let keys = CacheKey::leaderboard_pages(tenant, PeriodType::Monthly, start);

        assert_eq!(keys.len(), LEADERBOARD_PAGE_LIMITS.len());
        assert_eq!(
            keys[1],
            format!("leaderboard:{tenant}:monthly:2026-03-01:10")
        );
    }

    #[tokio::test]
    async fn test_invalidate_removes_only_listed_keys() {
        let cache: KeyedCache<u32> = KeyedCache::new(8);
        cache.put("a".to_string(), 1).await;
        cache.put("b".to_string(), 2).await;

        cache.invalidate(&["a".to_string(), "missing".to_string()]).await;

        assert_eq!(cache.get("a").await, None);
        assert_eq!(cache.get("b").await, Some(2));
        assert_eq!(cache.len().await, 1);
    }
}
