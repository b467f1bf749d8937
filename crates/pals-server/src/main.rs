//! Pals - sprite browser for the PokeAPI catalog
//!
//! Serves catalog and entity pages backed by PokeAPI, resolving every
//! sprite through a persistent image cache so repeat visits never touch
//! the network.

mod config;
mod error;
mod loader;
mod server;
#[cfg(test)]
mod test_support;
mod types;

use crate::config::Config;
use crate::error::Result;
use crate::server::{start_server, ServerState, SharedState};
use pokeapi_client::PokeApiClient;
use sprite_cache::{ImageCache, Preloader, SniffDecoder};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env()
        .add_directive("pals_server=info".parse()?)
        .add_directive("sprite_cache=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting pals server...");

    let config = Config::from_env()?;
    info!("Port: {}", config.port);
    info!("PokeAPI: {}", config.pokeapi_url);
    info!("Cache backend: {:?}", config.cache.backend);
    info!("Cache dir: {:?}", config.cache.cache_dir);

    let cache = Arc::new(ImageCache::from_config(&config.cache)?);
    let preloader = Preloader::new(cache, Arc::new(SniffDecoder::new()));
    let repo = Arc::new(PokeApiClient::with_base_url(&config.pokeapi_url)?);

    let state: SharedState = Arc::new(ServerState::new(preloader, repo));

    // Start HTTP server (blocking)
    start_server(state, config.port).await?;

    Ok(())
}
