//! Cache layer
//!
//! In-process caching of hot read paths (the public course catalogue and the
//! trending blog list). Values are stored as JSON so any serializable type can
//! be cached under a string key; keys are namespaced with `:` and can be
//! dropped in bulk with glob patterns such as `courses:*`.
//!
//! ```rust,ignore
//! use learnhub::cache::{create_cache, CacheLayer};
//! use learnhub::config::CacheConfig;
//!
//! let cache = create_cache(&CacheConfig::default()).await?;
//! cache.set("courses:list:p1", &page, Duration::from_secs(60)).await?;
//! cache.delete_pattern("courses:*").await?;
//! ```

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::CacheConfig;

/// Cache layer trait
///
/// The generic methods make this trait unusable as `dyn CacheLayer`;
/// services hold the concrete [`Cache`] type instead.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    /// Get a value from cache
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;

    /// Set a value in cache with TTL
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration)
        -> Result<()>;

    /// Delete a value from cache
    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete all values whose key matches a glob pattern
    async fn delete_pattern(&self, pattern: &str) -> Result<()>;

    /// Clear all cache entries
    async fn clear(&self) -> Result<()>;
}

pub use memory::MemoryCache;

/// The cache implementation shared by all services
pub type Cache = MemoryCache;

/// Create the shared cache from configuration
pub async fn create_cache(config: &CacheConfig) -> Result<Arc<Cache>> {
    let ttl = Duration::from_secs(config.ttl_seconds);
    tracing::debug!(
        "Creating in-memory cache (capacity {}, ttl {:?})",
        config.max_entries,
        ttl
    );
    Ok(Arc::new(MemoryCache::with_capacity_and_ttl(
        config.max_entries,
        ttl,
    )))
}
