//! Durable key to blob storage
//!
//! Two interchangeable stores sit behind [`StorageBackend`]: a small
//! text-encoded key-value document and a versioned object store holding
//! native binary records. The caller picks one with [`BackendKind`].

mod kv;
mod object_store;

pub use kv::{KeyValueBackend, DEFAULT_KV_QUOTA};
pub use object_store::{
    ObjectStoreBackend, DEFAULT_OBJECT_STORE_QUOTA, IMAGE_STORE, SCHEMA_VERSION,
};

use crate::config::CacheConfig;
use crate::error::Result;
use crate::types::{BackendStats, CacheEntry};
use async_trait::async_trait;
use std::str::FromStr;
use std::sync::Arc;

/// Durable storage for cache entries keyed by source URL
///
/// Implementations initialize lazily: the first call to any method opens
/// the underlying store.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Short identifier used in logs and stats
    fn name(&self) -> &'static str;

    async fn has(&self, key: &str) -> Result<bool>;

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Store an entry, replacing any existing one for the key
    async fn put(&self, key: &str, entry: &CacheEntry) -> Result<()>;

    async fn stats(&self) -> Result<BackendStats>;
}

/// Which storage backend to construct
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    KeyValue,
    ObjectStore,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "kv" | "key-value" | "local-storage" => Ok(BackendKind::KeyValue),
            "object" | "object-store" | "indexeddb" => Ok(BackendKind::ObjectStore),
            other => Err(format!("Unknown cache backend: {}", other)),
        }
    }
}

/// Construct the backend selected by `config.backend`
pub fn open_backend(config: &CacheConfig) -> Arc<dyn StorageBackend> {
    match config.backend {
        BackendKind::KeyValue => Arc::new(KeyValueBackend::new(
            config.cache_dir.clone(),
            &config.kv_namespace,
            config.kv_quota_bytes,
        )),
        BackendKind::ObjectStore => Arc::new(ObjectStoreBackend::new(
            config.cache_dir.join(&config.db_name),
            config.object_store_quota_bytes,
        )),
    }
}
