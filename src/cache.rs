//! Memoization for metadata and base URL lookups.
//!
//! Fetching an image's metadata from the host media system is the expensive
//! part of a render: a `<picture>` with four breakpoints touches the primary
//! image's metadata up to five times. This module lets every lookup after the
//! first one for a given image id come from memory.
//!
//! # Design
//!
//! Both caches sit on top of the [`MemoCache`] abstraction (`get_or_compute`
//! semantics), so callers can swap the storage:
//!
//! - [`ProcessCache`]: a `RwLock<HashMap>` that lives as long as the value
//!   holding it. The default.
//! - [`NoCache`]: computes every time. Useful in tests and for hosts that do
//!   their own caching.
//!
//! ## No invalidation
//!
//! Entries are never evicted or refreshed. An image whose generated sizes
//! change after its first lookup keeps its old metadata until the cache is
//! dropped. Failed lookups are memoized too (as `None`), so a missing image is
//! fetched once, not once per breakpoint.
//!
//! ## Concurrent population
//!
//! The compute closure runs outside the lock. Two resolution calls that miss
//! on the same key at the same time both compute, and the second insert
//! replaces the first. Both computations read the same host data, so the
//! value is the same either way.
//!
//! ## Scheme upgrade
//!
//! [`BaseUrlCache`] memoizes the base URL as the host reports it and applies
//! the `http` → `https` upgrade on every read, against the caller's
//! [`RenderContext`]. The upgrade depends on the request, the cached value
//! must not.

use crate::media::{ImageId, MediaRepository, Metadata, RenderContext};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use url::Url;

/// Get-or-compute storage keyed by `K`.
pub trait MemoCache<K, V>: Send + Sync {
    /// Return the stored value for `key`, computing and storing it on a miss.
    fn get_or_compute(&self, key: K, compute: &dyn Fn() -> V) -> V;

    /// Hit/miss counters since construction.
    fn stats(&self) -> CacheStats {
        CacheStats::default()
    }
}

/// Summary of cache performance.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn total(&self) -> u32 {
        self.hits + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} fetched ({} total)",
                self.hits,
                self.misses,
                self.total()
            )
        } else {
            write!(f, "{} fetched", self.misses)
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU32,
    misses: AtomicU32,
}

impl Counters {
    fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// In-memory cache that keeps every entry for its own lifetime.
#[derive(Debug)]
pub struct ProcessCache<K, V> {
    entries: RwLock<HashMap<K, V>>,
    counters: Counters,
}

impl<K, V> ProcessCache<K, V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            counters: Counters::default(),
        }
    }
}

impl<K, V> Default for ProcessCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> MemoCache<K, V> for ProcessCache<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get_or_compute(&self, key: K, compute: &dyn Fn() -> V) -> V {
        let cached = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned();
        if let Some(value) = cached {
            self.counters.hit();
            return value;
        }

        self.counters.miss();
        let value = compute();
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value.clone());
        value
    }

    fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }
}

/// A cache that never stores anything.
#[derive(Debug, Default)]
pub struct NoCache {
    counters: Counters,
}

impl<K, V> MemoCache<K, V> for NoCache {
    fn get_or_compute(&self, _key: K, compute: &dyn Fn() -> V) -> V {
        self.counters.miss();
        compute()
    }

    fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }
}

/// Per-image metadata, fetched once per id.
pub struct MetadataCache {
    store: Box<dyn MemoCache<ImageId, Option<Arc<Metadata>>>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::with_store(Box::new(ProcessCache::new()))
    }

    pub fn uncached() -> Self {
        Self::with_store(Box::new(NoCache::default()))
    }

    pub fn with_store(store: Box<dyn MemoCache<ImageId, Option<Arc<Metadata>>>>) -> Self {
        Self { store }
    }

    /// Metadata for `id`, or `None` when the host has none.
    pub fn get(&self, media: &dyn MediaRepository, id: ImageId) -> Option<Arc<Metadata>> {
        self.store.get_or_compute(id, &|| {
            tracing::trace!(id, "fetching image metadata");
            match media.metadata(id) {
                Ok(metadata) => Some(Arc::new(metadata)),
                Err(err) => {
                    tracing::debug!(id, %err, "no metadata for image");
                    None
                }
            }
        })
    }

    pub fn stats(&self) -> CacheStats {
        self.store.stats()
    }
}

impl Default for MetadataCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-image base URL: upload base URL plus the image's directory.
pub struct BaseUrlCache {
    store: Box<dyn MemoCache<ImageId, String>>,
}

impl BaseUrlCache {
    pub fn new() -> Self {
        Self::with_store(Box::new(ProcessCache::new()))
    }

    pub fn uncached() -> Self {
        Self::with_store(Box::new(NoCache::default()))
    }

    pub fn with_store(store: Box<dyn MemoCache<ImageId, String>>) -> Self {
        Self { store }
    }

    /// Base URL for `id`, always ending in `/`, upgraded to `https` when the
    /// request calls for it.
    pub fn get(
        &self,
        media: &dyn MediaRepository,
        metadata: &MetadataCache,
        context: &dyn RenderContext,
        id: ImageId,
    ) -> String {
        let base = self.store.get_or_compute(id, &|| {
            let dir = metadata
                .get(media, id)
                .map(|m| m.relative_dir().to_string())
                .unwrap_or_default();
            join_base_url(&media.upload_base_url(), &dir)
        });
        upgrade_scheme(&base, context)
    }

    pub fn stats(&self) -> CacheStats {
        self.store.stats()
    }
}

impl Default for BaseUrlCache {
    fn default() -> Self {
        Self::new()
    }
}

fn trailing_slash(url: &str) -> String {
    format!("{}/", url.trim_end_matches('/'))
}

/// `upload_base/` plus `dir/` when `dir` is non-empty.
pub fn join_base_url(upload_base: &str, dir: &str) -> String {
    let base = trailing_slash(upload_base);
    if dir.is_empty() {
        base
    } else {
        format!("{base}{}", trailing_slash(dir))
    }
}

/// Rewrite `url` to `https` when the request is secure and `url` points at
/// the request's own host. Anything else, including unparseable URLs, is
/// returned unchanged.
pub fn upgrade_scheme(url: &str, context: &dyn RenderContext) -> String {
    if !context.is_secure_request() {
        return url.to_string();
    }
    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };
    if parsed.scheme() == "https" {
        return url.to_string();
    }
    let authority = match (parsed.host_str(), parsed.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => return url.to_string(),
    };
    if !authority.eq_ignore_ascii_case(context.current_host()) {
        return url.to_string();
    }
    match parsed.set_scheme("https") {
        Ok(()) => parsed.into(),
        Err(()) => url.to_string(),
    }
}
