//! Display handles over cached bytes
//!
//! A handle is a cheap `blob:` reference a renderer can use in place of the
//! remote URL. Each one pins its bytes in memory until revoked, and only a
//! bounded number may be live at once.

use crate::error::{CacheError, Result};
use crate::types::{CacheEntry, ObjectUrl};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

pub struct HandleRegistry {
    max_live: usize,
    next_id: AtomicU64,
    live: Mutex<HashMap<ObjectUrl, Arc<CacheEntry>>>,
}

impl HandleRegistry {
    pub fn new(max_live: usize) -> Self {
        Self {
            max_live,
            next_id: AtomicU64::new(1),
            live: Mutex::new(HashMap::new()),
        }
    }

    fn live(&self) -> MutexGuard<'_, HashMap<ObjectUrl, Arc<CacheEntry>>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mint a fresh handle for `entry`
    ///
    /// Every call yields a distinct handle, even for the same entry.
    pub fn mint(&self, entry: Arc<CacheEntry>) -> Result<ObjectUrl> {
        if entry.bytes.is_empty() {
            return Err(CacheError::CorruptEntry("empty image body".to_string()));
        }

        let mut live = self.live();
        if live.len() >= self.max_live {
            return Err(CacheError::HandlePoolExhausted(self.max_live));
        }

        let handle = ObjectUrl::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        live.insert(handle, entry);
        debug!(handle = %handle, live = live.len(), "Minted display handle");
        Ok(handle)
    }

    pub fn lookup(&self, handle: ObjectUrl) -> Option<Arc<CacheEntry>> {
        self.live().get(&handle).cloned()
    }

    pub fn is_live(&self, handle: ObjectUrl) -> bool {
        self.live().contains_key(&handle)
    }

    /// Release a handle; returns false if it was not live
    pub fn revoke(&self, handle: ObjectUrl) -> bool {
        let removed = self.live().remove(&handle).is_some();
        if removed {
            debug!(handle = %handle, "Revoked display handle");
        }
        removed
    }

    pub fn live_count(&self) -> usize {
        self.live().len()
    }
}
