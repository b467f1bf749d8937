//! Cache configuration

use crate::backend::{BackendKind, DEFAULT_KV_QUOTA, DEFAULT_OBJECT_STORE_QUOTA};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the image cache and its storage backend
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub backend: BackendKind,
    pub cache_dir: PathBuf,
    /// Prefix for keys in the key-value store, also its file name
    pub kv_namespace: String,
    pub kv_quota_bytes: u64,
    /// Database directory name for the object store
    pub db_name: String,
    pub object_store_quota_bytes: u64,
    /// Byte budget of the in-memory tier in front of the backend
    pub memory_budget_bytes: u64,
    pub max_live_handles: usize,
    pub http_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::ObjectStore,
            cache_dir: PathBuf::from("./cache/sprites"),
            kv_namespace: "image-cache".to_string(),
            kv_quota_bytes: DEFAULT_KV_QUOTA,
            db_name: "ImageCacheDB".to_string(),
            object_store_quota_bytes: DEFAULT_OBJECT_STORE_QUOTA,
            memory_budget_bytes: 32 * 1024 * 1024,
            max_live_handles: 1024,
            http_timeout: Duration::from_secs(30),
        }
    }
}
