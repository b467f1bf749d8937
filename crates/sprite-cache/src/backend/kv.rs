//! Namespaced key-value backend with text-encoded values
//!
//! Every entry is stored as a `data:<type>;base64,<payload>` string inside a
//! single JSON document. Simple, but values grow by about a third and the
//! whole store has to fit a small quota.

use super::StorageBackend;
use crate::error::{CacheError, Result};
use crate::types::{BackendStats, CacheEntry};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Default quota, in stored characters (keys plus encoded values)
pub const DEFAULT_KV_QUOTA: u64 = 5 * 1024 * 1024;

struct KvState {
    values: HashMap<String, String>,
    used: u64,
}

impl KvState {
    fn from_values(values: HashMap<String, String>) -> Self {
        let used = values.iter().map(|(k, v)| charge(k, v)).sum();
        Self { values, used }
    }
}

/// Key-value backend persisted as `<dir>/<namespace>.json`
pub struct KeyValueBackend {
    path: PathBuf,
    namespace: String,
    quota: u64,
    /// `None` until the document has been loaded
    state: Mutex<Option<KvState>>,
}

impl KeyValueBackend {
    pub fn new(dir: PathBuf, namespace: &str, quota: u64) -> Self {
        Self {
            path: dir.join(format!("{}.json", namespace)),
            namespace: namespace.to_string(),
            quota,
            state: Mutex::new(None),
        }
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }

    async fn load(&self) -> Result<KvState> {
        let values = match fs::read(&self.path).await {
            Ok(raw) => match serde_json::from_slice(&raw) {
                Ok(values) => values,
                Err(e) => {
                    warn!(path = ?self.path, error = %e, "Unreadable key-value store, starting empty");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        let state = KvState::from_values(values);
        info!(
            path = ?self.path,
            entries = state.values.len(),
            used = state.used,
            "Key-value store loaded"
        );
        Ok(state)
    }

    async fn persist(&self, values: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let raw = serde_json::to_vec(values)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn ensure_loaded<'a>(&self, slot: &'a mut Option<KvState>) -> Result<&'a mut KvState> {
        let state = match slot.take() {
            Some(state) => state,
            None => self.load().await?,
        };
        Ok(slot.insert(state))
    }

    /// Run `f` against the loaded state, loading it on first use
    async fn with_state<T>(&self, f: impl FnOnce(&mut KvState) -> T) -> Result<T> {
        let mut guard = self.state.lock().await;
        let state = self.ensure_loaded(&mut guard).await?;
        Ok(f(state))
    }
}

/// Quota charge for one stored pair
fn charge(key: &str, value: &str) -> u64 {
    (key.len() + value.len()) as u64
}

fn encode_data_url(entry: &CacheEntry) -> String {
    format!(
        "data:{};base64,{}",
        entry.content_type,
        STANDARD.encode(&entry.bytes)
    )
}

fn decode_data_url(value: &str) -> Option<CacheEntry> {
    let rest = value.strip_prefix("data:")?;
    let (content_type, payload) = rest.split_once(";base64,")?;
    let bytes = STANDARD.decode(payload).ok()?;
    Some(CacheEntry::new(bytes, content_type))
}

#[async_trait]
impl StorageBackend for KeyValueBackend {
    fn name(&self) -> &'static str {
        "key-value"
    }

    async fn has(&self, key: &str) -> Result<bool> {
        let storage_key = self.storage_key(key);
        self.with_state(|state| state.values.contains_key(&storage_key))
            .await
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let storage_key = self.storage_key(key);
        let value = self
            .with_state(|state| state.values.get(&storage_key).cloned())
            .await?;

        match value {
            Some(value) => decode_data_url(&value)
                .map(Some)
                .ok_or_else(|| CacheError::CorruptEntry(key.to_string())),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        let storage_key = self.storage_key(key);
        let value = encode_data_url(entry);
        let needed = charge(&storage_key, &value);

        let mut guard = self.state.lock().await;
        let state = self.ensure_loaded(&mut guard).await?;

        let replaced = state
            .values
            .get(&storage_key)
            .map(|old| charge(&storage_key, old))
            .unwrap_or(0);
        let available = self.quota.saturating_sub(state.used - replaced);
        if needed > available {
            warn!(key = %key, needed, available, "Key-value quota exceeded");
            return Err(CacheError::QuotaExceeded { needed, available });
        }

        let previous = state.values.insert(storage_key.clone(), value);
        if let Err(e) = self.persist(&state.values).await {
            // Leave the in-memory view matching what is on disk
            match previous {
                Some(old) => state.values.insert(storage_key, old),
                None => state.values.remove(&storage_key),
            };
            return Err(e);
        }
        state.used = state.used - replaced + needed;

        debug!(key = %key, size = entry.size(), stored = needed, "Stored entry");
        Ok(())
    }

    async fn stats(&self) -> Result<BackendStats> {
        let (entries, used) = self
            .with_state(|state| (state.values.len(), state.used))
            .await?;
        Ok(BackendStats {
            backend: self.name().to_string(),
            entries,
            total_size: used,
            quota: self.quota,
        })
    }
}
