//! In-memory cache implementation using moka
//!
//! Every entry carries its own TTL, enforced through a moka `Expiry` policy.
//! Values are kept as serialized JSON.

use super::CacheLayer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default maximum cache capacity (number of entries)
const DEFAULT_MAX_CAPACITY: u64 = 10_000;

/// Default TTL for cache entries
const DEFAULT_TTL: Duration = Duration::from_secs(600);

#[derive(Clone)]
struct CacheEntry {
    data: Arc<String>,
    ttl: Duration,
}

impl CacheEntry {
    fn new<T: Serialize>(value: &T, ttl: Duration) -> Result<Self> {
        let json = serde_json::to_string(value).context("Failed to serialize cache value")?;
        Ok(Self {
            data: Arc::new(json),
            ttl,
        })
    }

    fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.data).context("Failed to deserialize cache value")
    }
}

/// Expiry policy reading the TTL stored on each entry
struct EntryExpiry;

impl Expiry<String, CacheEntry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-memory cache backed by moka
pub struct MemoryCache {
    cache: Cache<String, CacheEntry>,
    default_ttl: Duration,
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entry_count", &self.cache.entry_count())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl MemoryCache {
    /// Create a cache with default capacity and TTL
    pub fn new() -> Self {
        Self::with_capacity_and_ttl(DEFAULT_MAX_CAPACITY, DEFAULT_TTL)
    }

    /// Create a cache with a custom capacity and default TTL
    pub fn with_capacity_and_ttl(max_capacity: u64, default_ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(EntryExpiry)
            .build();

        Self { cache, default_ttl }
    }

    /// TTL services use when they have no better value
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Approximate number of live entries
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Glob match supporting `*` (any run of characters) and `?` (one character).
    ///
    /// Greedy two-pointer walk with backtracking to the most recent `*`.
    fn pattern_matches(pattern: &str, key: &str) -> bool {
        let p: Vec<char> = pattern.chars().collect();
        let k: Vec<char> = key.chars().collect();
        let (mut pi, mut ki) = (0usize, 0usize);
        let mut star: Option<(usize, usize)> = None;

        while ki < k.len() {
            if pi < p.len() && (p[pi] == '?' || p[pi] == k[ki]) {
                pi += 1;
                ki += 1;
            } else if pi < p.len() && p[pi] == '*' {
                star = Some((pi, ki));
                pi += 1;
            } else if let Some((sp, sk)) = star {
                pi = sp + 1;
                ki = sk + 1;
                star = Some((sp, sk + 1));
            } else {
                return false;
            }
        }

        p[pi..].iter().all(|c| *c == '*')
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheLayer for MemoryCache {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        match self.cache.get(key).await {
            Some(entry) => Ok(Some(entry.deserialize()?)),
            None => Ok(None),
        }
    }

    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        let entry = CacheEntry::new(value, ttl)?;
        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<()> {
        let matching: Vec<String> = self
            .cache
            .iter()
            .filter(|(key, _)| Self::pattern_matches(pattern, key.as_str()))
            .map(|(key, _)| key.to_string())
            .collect();

        tracing::debug!("Invalidating {} cache key(s) matching '{}'", matching.len(), pattern);
        for key in matching {
            self.cache.invalidate(&key).await;
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Listing {
        ids: Vec<i64>,
        total: i64,
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = MemoryCache::new();
        cache
            .set("key1", &"value1".to_string(), Duration::from_secs(60))
            .await
            .unwrap();

        let result: Option<String> = cache.get("key1").await.unwrap();
        assert_eq!(result, Some("value1".to_string()));
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let cache = MemoryCache::new();
        let result: Option<String> = cache.get("missing").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_struct_values() {
        let cache = MemoryCache::new();
        let listing = Listing {
            ids: vec![3, 2, 1],
            total: 3,
        };
        cache
            .set("courses:list:1", &listing, Duration::from_secs(60))
            .await
            .unwrap();

        let cached: Option<Listing> = cache.get("courses:list:1").await.unwrap();
        assert_eq!(cached, Some(listing));
    }

    #[tokio::test]
    async fn test_entry_expires_after_its_own_ttl() {
        let cache = MemoryCache::with_capacity_and_ttl(100, Duration::from_secs(3600));
        cache
            .set("short", &1i64, Duration::from_millis(50))
            .await
            .unwrap();
        cache
            .set("long", &2i64, Duration::from_secs(60))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;

        let short: Option<i64> = cache.get("short").await.unwrap();
        let long: Option<i64> = cache.get("long").await.unwrap();
        assert!(short.is_none());
        assert_eq!(long, Some(2));
    }

    #[tokio::test]
    async fn test_overwrite_existing_key() {
        let cache = MemoryCache::new();
        cache.set("k", &1i64, Duration::from_secs(60)).await.unwrap();
        cache.set("k", &2i64, Duration::from_secs(60)).await.unwrap();

        let value: Option<i64> = cache.get("k").await.unwrap();
        assert_eq!(value, Some(2));
    }

    #[tokio::test]
    async fn test_delete() {
        let cache = MemoryCache::new();
        cache.set("k", &1i64, Duration::from_secs(60)).await.unwrap();
        cache.delete("k").await.unwrap();

        let value: Option<i64> = cache.get("k").await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_delete_pattern_keeps_other_namespaces() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(60);
        cache.set("courses:list:a", &1i64, ttl).await.unwrap();
        cache.set("courses:list:b", &2i64, ttl).await.unwrap();
        cache.set("blog:trending:5:30", &3i64, ttl).await.unwrap();

        cache.delete_pattern("courses:*").await.unwrap();

        let a: Option<i64> = cache.get("courses:list:a").await.unwrap();
        let b: Option<i64> = cache.get("courses:list:b").await.unwrap();
        let t: Option<i64> = cache.get("blog:trending:5:30").await.unwrap();
        assert!(a.is_none());
        assert!(b.is_none());
        assert_eq!(t, Some(3));
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = MemoryCache::new();
        cache.set("a", &1i64, Duration::from_secs(60)).await.unwrap();
        cache.set("b", &2i64, Duration::from_secs(60)).await.unwrap();
        cache.clear().await.unwrap();

        let a: Option<i64> = cache.get("a").await.unwrap();
        assert!(a.is_none());
        assert_eq!(cache.entry_count(), 0);
    }

    #[test]
    fn test_pattern_matches() {
        assert!(MemoryCache::pattern_matches("courses:*", "courses:list:1"));
        assert!(MemoryCache::pattern_matches("*", ""));
        assert!(MemoryCache::pattern_matches("blog:?", "blog:1"));
        assert!(!MemoryCache::pattern_matches("blog:?", "blog:12"));
        assert!(MemoryCache::pattern_matches("a*b*c", "aXXbYYc"));
        assert!(!MemoryCache::pattern_matches("a*b*c", "aXXbYY"));
        assert!(!MemoryCache::pattern_matches("courses:*", "blog:courses:1"));
        assert!(MemoryCache::pattern_matches("exact", "exact"));
        assert!(!MemoryCache::pattern_matches("exact", "exactly"));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(64))]

            /// A key always matches itself and any `prefix*` pattern built from it.
            #[test]
            fn key_matches_own_prefix(key in "[a-z:0-9]{0,24}", cut in 0usize..24) {
                let cut = cut.min(key.len());
                let pattern = format!("{}*", &key[..cut]);
                prop_assert!(MemoryCache::pattern_matches(&key, &key));
                prop_assert!(MemoryCache::pattern_matches(&pattern, &key));
            }

            /// `?` patterns only match keys of exactly the same length.
            #[test]
            fn question_marks_match_length(key in "[a-z]{0,12}", n in 0usize..12) {
                let pattern = "?".repeat(n);
                prop_assert_eq!(MemoryCache::pattern_matches(&pattern, &key), key.len() == n);
            }
        }
    }
}
