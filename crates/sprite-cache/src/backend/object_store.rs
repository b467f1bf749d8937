//! Versioned object store holding native binary records
//!
//! Layout under the database directory:
//!
//! ```text
//! schema.json            {"version": 1, "stores": ["images"]}
//! images/<sha256>.bin    raw bytes
//! images/<sha256>.json   key, content type, size, created_at
//! ```
//!
//! Metadata is mirrored in memory and rebuilt from the `.json` records the
//! first time the store is touched.

use super::StorageBackend;
use crate::error::{CacheError, Result};
use crate::types::{content_address, BackendStats, CacheEntry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::{Mutex, OnceCell, RwLock};
use tracing::{debug, info, warn};

pub const SCHEMA_VERSION: u32 = 1;

/// The only object store in the database
pub const IMAGE_STORE: &str = "images";

pub const DEFAULT_OBJECT_STORE_QUOTA: u64 = 256 * 1024 * 1024;

#[derive(Debug, Serialize, Deserialize)]
struct Schema {
    version: u32,
    stores: Vec<String>,
}

/// Metadata for one stored record
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RecordMeta {
    key: String,
    content_type: String,
    size: u64,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Index {
    records: HashMap<String, RecordMeta>,
    total_size: u64,
}

/// Object store backend rooted at one database directory
pub struct ObjectStoreBackend {
    db_dir: PathBuf,
    quota: u64,
    index: OnceCell<RwLock<Index>>,
    /// Serializes quota accounting and record writes
    write_lock: Mutex<()>,
}

impl ObjectStoreBackend {
    pub fn new(db_dir: PathBuf, quota: u64) -> Self {
        Self {
            db_dir,
            quota,
            index: OnceCell::new(),
            write_lock: Mutex::new(()),
        }
    }

    /// Derive the record file stem for a cache key
    pub fn record_id(key: &str) -> String {
        content_address(key)
    }

    fn store_dir(&self) -> PathBuf {
        self.db_dir.join(IMAGE_STORE)
    }

    fn blob_path(&self, id: &str) -> PathBuf {
        self.store_dir().join(format!("{}.bin", id))
    }

    fn meta_path(&self, id: &str) -> PathBuf {
        self.store_dir().join(format!("{}.json", id))
    }

    async fn index(&self) -> Result<&RwLock<Index>> {
        self.index
            .get_or_try_init(|| async { self.open().await.map(RwLock::new) })
            .await
    }

    async fn open(&self) -> Result<Index> {
        fs::create_dir_all(&self.db_dir).await?;

        let schema_path = self.db_dir.join("schema.json");
        match fs::read(&schema_path).await {
            Ok(raw) => {
                let schema: Schema = serde_json::from_slice(&raw)?;
                if schema.version != SCHEMA_VERSION {
                    warn!(
                        db = ?self.db_dir,
                        found = schema.version,
                        expected = SCHEMA_VERSION,
                        "No upgrade path for object store schema"
                    );
                    return Err(CacheError::SchemaVersion {
                        found: schema.version,
                        expected: SCHEMA_VERSION,
                    });
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let schema = Schema {
                    version: SCHEMA_VERSION,
                    stores: vec![IMAGE_STORE.to_string()],
                };
                write_atomic(&schema_path, &serde_json::to_vec(&schema)?).await?;
            }
            Err(e) => return Err(e.into()),
        }

        let store_dir = self.store_dir();
        fs::create_dir_all(&store_dir).await?;

        let mut index = Index::default();
        let mut dir = fs::read_dir(&store_dir).await?;
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_meta(&path).await {
                Ok(meta) => {
                    index.total_size += meta.size;
                    index.records.insert(meta.key.clone(), meta);
                }
                Err(e) => warn!(path = ?path, error = %e, "Skipping unreadable record"),
            }
        }

        info!(
            db = ?self.db_dir,
            entries = index.records.len(),
            total_size = index.total_size,
            "Object store opened"
        );
        Ok(index)
    }

    async fn forget(&self, index: &RwLock<Index>, key: &str) {
        let mut guard = index.write().await;
        if let Some(meta) = guard.records.remove(key) {
            guard.total_size = guard.total_size.saturating_sub(meta.size);
        }
    }
}

async fn read_meta(path: &Path) -> Result<RecordMeta> {
    let raw = fs::read(path).await?;
    Ok(serde_json::from_slice(&raw)?)
}

async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, data).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl StorageBackend for ObjectStoreBackend {
    fn name(&self) -> &'static str {
        "object-store"
    }

    async fn has(&self, key: &str) -> Result<bool> {
        let index = self.index().await?;
        let found = index.read().await.records.contains_key(key);
        Ok(found)
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let index = self.index().await?;
        let meta = index.read().await.records.get(key).cloned();
        let Some(meta) = meta else {
            return Ok(None);
        };

        let id = Self::record_id(key);
        match fs::read(self.blob_path(&id)).await {
            Ok(bytes) if bytes.len() as u64 == meta.size => {
                Ok(Some(CacheEntry::new(bytes, meta.content_type)))
            }
            Ok(bytes) => {
                warn!(key = %key, expected = meta.size, actual = bytes.len(), "Record size mismatch");
                Err(CacheError::CorruptEntry(key.to_string()))
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to read record, removing entry");
                self.forget(index, key).await;
                Ok(None)
            }
        }
    }

    async fn put(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        let index = self.index().await?;
        let _write = self.write_lock.lock().await;

        let size = entry.size();
        let (replaced, used) = {
            let guard = index.read().await;
            let replaced = guard.records.get(key).map(|m| m.size).unwrap_or(0);
            (replaced, guard.total_size)
        };
        let available = self.quota.saturating_sub(used - replaced);
        if size > available {
            warn!(key = %key, size, available, "Object store quota exceeded");
            return Err(CacheError::QuotaExceeded {
                needed: size,
                available,
            });
        }

        let id = Self::record_id(key);
        let meta = RecordMeta {
            key: key.to_string(),
            content_type: entry.content_type.clone(),
            size,
            created_at: Utc::now(),
        };
        write_atomic(&self.blob_path(&id), &entry.bytes).await?;
        write_atomic(&self.meta_path(&id), &serde_json::to_vec(&meta)?).await?;

        {
            let mut guard = index.write().await;
            guard.records.insert(key.to_string(), meta);
            guard.total_size = guard.total_size - replaced + size;
        }

        debug!(key = %key, id = %id, size, "Stored record");
        Ok(())
    }

    async fn stats(&self) -> Result<BackendStats> {
        let index = self.index().await?;
        let guard = index.read().await;
        Ok(BackendStats {
            backend: self.name().to_string(),
            entries: guard.records.len(),
            total_size: guard.total_size,
            quota: self.quota,
        })
    }
}
