use crate::error::{Result, ServerError};
use sprite_cache::{BackendKind, CacheConfig};
use std::env;
use std::path::PathBuf;

/// Application configuration parsed from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub pokeapi_url: String,
    pub cache: CacheConfig,
}

impl Config {
    /// Parse configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = var("PORT").and_then(|p| p.parse().ok()).unwrap_or(3005);

        let pokeapi_url =
            var("POKEAPI_URL").unwrap_or_else(|| "https://pokeapi.co/api/v2".to_string());

        let mut cache = CacheConfig::default();
        if let Some(kind) = var("CACHE_BACKEND") {
            cache.backend = kind.parse::<BackendKind>().map_err(ServerError::Config)?;
        }
        if let Some(dir) = var("CACHE_DIR") {
            cache.cache_dir = PathBuf::from(dir);
        }
        if let Some(quota) = var("KV_QUOTA_BYTES").and_then(|s| s.parse().ok()) {
            cache.kv_quota_bytes = quota;
        }
        if let Some(quota) = var("OBJECT_STORE_QUOTA_BYTES").and_then(|s| s.parse().ok()) {
            cache.object_store_quota_bytes = quota;
        }
        if let Some(budget) = var("MEMORY_BUDGET_BYTES").and_then(|s| s.parse().ok()) {
            cache.memory_budget_bytes = budget;
        }
        if let Some(max) = var("MAX_LIVE_HANDLES").and_then(|s| s.parse().ok()) {
            cache.max_live_handles = max;
        }

        Ok(Self {
            port,
            pokeapi_url,
            cache,
        })
    }
}
