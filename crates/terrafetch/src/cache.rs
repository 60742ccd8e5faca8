//! Content cache abstractions.
//!
//! This module provides a [`ContentCache`] trait keyed by resolved reference,
//! an in-memory implementation, and the hit/lookup counters the fetcher
//! keeps for observability.
//!
//! # Implementations
//!
//! - [`MemoryContentCache`]: In-memory cache with optional size limits
//!
//! Having no cache at all is expressed by leaving
//! [`Services::content_cache`](crate::Services::content_cache) unset.

use std::{
    collections::{HashMap, VecDeque},
    future::Future,
    pin::Pin,
    sync::{
        Arc, PoisonError, RwLock,
        atomic::{AtomicU64, Ordering},
    },
    time::SystemTime,
};

use crate::{content::Content, error::Result, policy::CachePolicy};

/// Future type for cache get operations.
pub type GetFuture<'a> = Pin<Box<dyn Future<Output = Result<Option<CacheEntry>>> + Send + 'a>>;

/// Future type for cache put/remove operations.
pub type CacheFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Future type for cache contains operations.
pub type ContainsFuture<'a> = Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>>;

/// A cached record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// The cached content.
    pub content: Content,
    /// When the content was fetched and stored.
    pub last_modified: SystemTime,
}

impl CacheEntry {
    /// Whether this record is too old under `policy`.
    #[must_use]
    pub fn is_expired(&self, policy: &CachePolicy) -> bool {
        policy.is_expired(self.last_modified)
    }
}

/// A cache for fetched content.
///
/// The cache is keyed by the resolved reference. Implementations must be
/// safe for concurrent use across keys; the fetcher never assumes exclusive
/// access.
pub trait ContentCache: Send + Sync {
    /// Get a record from the cache.
    ///
    /// Returns `Ok(Some(entry))` if cached, `Ok(None)` if not cached, or an
    /// error if the cache operation failed.
    fn get(&self, key: &str) -> GetFuture<'_>;

    /// Store content, replacing any existing record for `key`.
    fn put(&self, key: &str, content: Content) -> CacheFuture<'_>;

    /// Check if a record exists without retrieving it.
    fn contains(&self, key: &str) -> ContainsFuture<'_>;

    /// Remove a record.
    fn remove(&self, key: &str) -> CacheFuture<'_>;

    /// Clear all cached records.
    fn clear(&self) -> CacheFuture<'_>;
}

/// Cumulative cache lookup counters.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    gets: AtomicU64,
}

impl CacheStats {
    /// Record one lookup and whether it hit.
    pub fn record(&self, hit: bool) {
        self.gets.fetch_add(1, Ordering::Relaxed);
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Number of lookups that returned a record.
    #[must_use]
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Number of lookups attempted.
    #[must_use]
    pub fn gets(&self) -> u64 {
        self.gets.load(Ordering::Relaxed)
    }

    /// Fraction of lookups that hit, 0 when nothing was looked up.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_ratio(&self) -> f64 {
        let gets = self.gets();
        if gets == 0 {
            0.0
        } else {
            self.hits() as f64 / gets as f64
        }
    }
}

/// An in-memory content cache.
///
/// Records live in a `HashMap` protected by a `RwLock`; clones share the
/// same storage. With a maximum size in bytes, the oldest records are
/// evicted when the limit is exceeded.
#[derive(Debug, Clone)]
pub struct MemoryContentCache {
    data: Arc<RwLock<MemoryCacheInner>>,
    max_size: Option<usize>,
}

#[derive(Debug, Default)]
struct MemoryCacheInner {
    entries: HashMap<String, CacheEntry>,
    /// Insertion order for eviction.
    order: VecDeque<String>,
    current_size: usize,
}

impl MemoryCacheInner {
    fn remove(&mut self, key: &str) {
        if let Some(old) = self.entries.remove(key) {
            self.current_size -= old.content.len();
            self.order.retain(|k| k != key);
        }
    }
}

impl MemoryContentCache {
    /// Create a new memory cache with no size limit.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(MemoryCacheInner::default())),
            max_size: None,
        }
    }

    /// Create a new memory cache with a maximum size in bytes.
    #[must_use]
    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            data: Arc::new(RwLock::new(MemoryCacheInner::default())),
            max_size: Some(max_size),
        }
    }

    /// Get the current size of cached payloads in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.read().current_size
    }

    /// Get the number of cached records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    /// Check if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store a record with an explicit timestamp.
    pub fn insert(&self, key: &str, entry: CacheEntry) {
        let mut cache = self.write();
        cache.remove(key);

        let entry_size = entry.content.len();
        if let Some(max_size) = self.max_size {
            while cache.current_size + entry_size > max_size {
                let Some(oldest) = cache.order.pop_front() else {
                    break;
                };
                if let Some(old) = cache.entries.remove(&oldest) {
                    cache.current_size -= old.content.len();
                }
            }
        }

        cache.entries.insert(key.to_string(), entry);
        cache.order.push_back(key.to_string());
        cache.current_size += entry_size;
    }

    /// Drop every record that is expired under `policy`, returning how many
    /// were removed.
    pub fn purge_expired(&self, policy: &CachePolicy) -> usize {
        let mut cache = self.write();
        let expired: Vec<String> = cache
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(policy))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            cache.remove(key);
        }
        expired.len()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, MemoryCacheInner> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, MemoryCacheInner> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryContentCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentCache for MemoryContentCache {
    fn get(&self, key: &str) -> GetFuture<'_> {
        let result = self.read().entries.get(key).cloned();
        Box::pin(async move { Ok(result) })
    }

    fn put(&self, key: &str, content: Content) -> CacheFuture<'_> {
        self.insert(
            key,
            CacheEntry {
                content,
                last_modified: SystemTime::now(),
            },
        );
        Box::pin(async { Ok(()) })
    }

    fn contains(&self, key: &str) -> ContainsFuture<'_> {
        let result = self.read().entries.contains_key(key);
        Box::pin(async move { Ok(result) })
    }

    fn remove(&self, key: &str) -> CacheFuture<'_> {
        self.write().remove(key);
        Box::pin(async { Ok(()) })
    }

    fn clear(&self) -> CacheFuture<'_> {
        let mut cache = self.write();
        cache.entries.clear();
        cache.order.clear();
        cache.current_size = 0;
        Box::pin(async { Ok(()) })
    }
}
