//! Cache-or-fetch resolution of image URLs

use crate::backend::{open_backend, StorageBackend};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::fetch::{Fetcher, HttpFetcher};
use crate::handles::HandleRegistry;
use crate::types::{CacheEntry, CacheStats, ImageSource, ObjectUrl};
use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Resolves remote image URLs into display handles, persisting bytes in a
/// storage backend so each URL is fetched over the network at most once.
///
/// Concurrent resolutions of the same URL share a single load. Loaded entries
/// are also kept in a byte-bounded memory tier in front of the backend.
pub struct ImageCache {
    backend: Arc<dyn StorageBackend>,
    fetcher: Arc<dyn Fetcher>,
    handles: Arc<HandleRegistry>,
    memory: Cache<String, Arc<CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
    fetches: AtomicU64,
    fallbacks: AtomicU64,
}

impl ImageCache {
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        fetcher: Arc<dyn Fetcher>,
        handles: Arc<HandleRegistry>,
        memory_budget_bytes: u64,
    ) -> Self {
        let memory = Cache::builder()
            .weigher(|_key: &String, entry: &Arc<CacheEntry>| -> u32 {
                entry.bytes.len().try_into().unwrap_or(u32::MAX)
            })
            .max_capacity(memory_budget_bytes)
            .build();

        Self {
            backend,
            fetcher,
            handles,
            memory,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            fetches: AtomicU64::new(0),
            fallbacks: AtomicU64::new(0),
        }
    }

    /// Build a cache with the configured backend and an HTTP fetcher
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        let backend = open_backend(config);
        let fetcher = Arc::new(HttpFetcher::with_timeout(config.http_timeout)?);
        let handles = Arc::new(HandleRegistry::new(config.max_live_handles));
        info!(
            backend = backend.name(),
            cache_dir = ?config.cache_dir,
            "Image cache configured"
        );
        Ok(Self::new(
            backend,
            fetcher,
            handles,
            config.memory_budget_bytes,
        ))
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    pub fn handles(&self) -> &Arc<HandleRegistry> {
        &self.handles
    }

    /// Resolve `url` into something renderable
    ///
    /// Never fails: if anything goes wrong the original URL comes back and
    /// the renderer loads it directly.
    pub async fn resolve(&self, url: &str) -> ImageSource {
        if url.is_empty() || url.starts_with("data:") {
            return ImageSource::Url(url.to_string());
        }
        if let Some(handle) = ObjectUrl::parse(url) {
            if self.handles.is_live(handle) {
                return ImageSource::Object(handle);
            }
            return ImageSource::Url(url.to_string());
        }

        let minted = match self.load(url).await {
            Ok(entry) => self.handles.mint(entry),
            Err(e) => Err(e),
        };

        match minted {
            Ok(handle) => ImageSource::Object(handle),
            Err(e) => {
                self.fallbacks.fetch_add(1, Ordering::Relaxed);
                warn!(url = %url, error = %e, "Falling back to remote URL");
                ImageSource::Url(url.to_string())
            }
        }
    }

    /// Release a handle previously returned by [`ImageCache::resolve`]
    ///
    /// Plain URLs are not owned by the caller and are left alone.
    pub fn release(&self, source: &ImageSource) -> bool {
        match source {
            ImageSource::Object(handle) => self.handles.revoke(*handle),
            ImageSource::Url(_) => false,
        }
    }

    /// Load the bytes for `key`, from memory, the backend, or the network
    pub async fn load(&self, key: &str) -> Result<Arc<CacheEntry>> {
        if let Some(entry) = self.memory.get(key).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(entry);
        }

        self.memory
            .try_get_with(key.to_string(), self.load_uncached(key))
            .await
            .map_err(CacheError::from)
    }

    async fn load_uncached(&self, key: &str) -> Result<Arc<CacheEntry>> {
        match self.lookup_backend(key).await {
            Ok(Some(entry)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, backend = self.backend.name(), "Cache hit");
                return Ok(Arc::new(entry));
            }
            Ok(None) => {}
            Err(e) => {
                warn!(key = %key, backend = self.backend.name(), error = %e, "Storage read failed, treating as miss");
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let entry = self.fetcher.fetch(key).await?;

        if let Err(e) = self.backend.put(key, &entry).await {
            warn!(key = %key, backend = self.backend.name(), error = %e, "Failed to cache image");
            // Continue even if caching fails
        }

        Ok(Arc::new(entry))
    }

    async fn lookup_backend(&self, key: &str) -> Result<Option<CacheEntry>> {
        if !self.backend.has(key).await? {
            return Ok(None);
        }
        self.backend.get(key).await
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            live_handles: self.handles.live_count(),
        }
    }
}
