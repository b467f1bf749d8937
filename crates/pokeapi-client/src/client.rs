//! PokeAPI HTTP client

use crate::error::{PokeApiError, Result};
use crate::types::{EvolutionChain, ListResponse, NamedResource, Pokemon, Species};
use crate::EntityRepository;
use async_trait::async_trait;
use moka::future::Cache;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://pokeapi.co/api/v2";
/// Catalog size shown on the index page
pub const CATALOG_LIMIT: u32 = 151;
const CACHE_TTL_SECS: u64 = 30 * 24 * 60 * 60; // 30 days

/// Client for PokeAPI with an in-memory request cache
///
/// Responses are effectively static, so every lookup is cached for 30 days.
pub struct PokeApiClient {
    http: reqwest::Client,
    base_url: String,
    list_cache: Cache<u32, Arc<Vec<NamedResource>>>,
    pokemon_cache: Cache<String, Arc<Pokemon>>,
    species_cache: Cache<String, Arc<Species>>,
    chain_cache: Cache<String, Arc<EvolutionChain>>,
}

impl PokeApiClient {
    /// Create a new client with default settings
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a new client against a custom API root
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            list_cache: Self::build_cache(10),
            pokemon_cache: Self::build_cache(2_000),
            species_cache: Self::build_cache(2_000),
            chain_cache: Self::build_cache(1_000),
        })
    }

    fn build_cache<K, V>(capacity: u64) -> Cache<K, V>
    where
        K: std::hash::Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        Cache::builder()
            .max_capacity(capacity)
            .time_to_live(Duration::from_secs(CACHE_TTL_SECS))
            .build()
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!(url = %url, "PokeAPI request");
        let response = self.http.get(url).send().await?;

        if !response.status().is_success() {
            return Err(PokeApiError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl EntityRepository for PokeApiClient {
    async fn fetch_entity_list(&self) -> Result<Arc<Vec<NamedResource>>> {
        if let Some(cached) = self.list_cache.get(&CATALOG_LIMIT).await {
            return Ok(cached);
        }

        let url = format!("{}/pokemon?limit={}", self.base_url, CATALOG_LIMIT);
        let list: ListResponse = self.get_json(&url).await?;
        let results = Arc::new(list.results);

        self.list_cache.insert(CATALOG_LIMIT, results.clone()).await;
        Ok(results)
    }

    async fn fetch_entity(&self, name: &str) -> Result<Arc<Pokemon>> {
        if let Some(cached) = self.pokemon_cache.get(name).await {
            return Ok(cached);
        }

        let url = format!("{}/pokemon/{}", self.base_url, urlencoding::encode(name));
        let pokemon: Arc<Pokemon> = Arc::new(self.get_json(&url).await?);

        self.pokemon_cache
            .insert(name.to_string(), pokemon.clone())
            .await;
        Ok(pokemon)
    }

    async fn fetch_species(&self, id: &str) -> Result<Arc<Species>> {
        if let Some(cached) = self.species_cache.get(id).await {
            return Ok(cached);
        }

        let url = format!(
            "{}/pokemon-species/{}",
            self.base_url,
            urlencoding::encode(id)
        );
        let species: Arc<Species> = Arc::new(self.get_json(&url).await?);

        self.species_cache
            .insert(id.to_string(), species.clone())
            .await;
        Ok(species)
    }

    async fn fetch_evolution_chain(&self, url: &str) -> Result<Arc<EvolutionChain>> {
        if let Some(cached) = self.chain_cache.get(url).await {
            return Ok(cached);
        }

        let chain: Arc<EvolutionChain> = Arc::new(self.get_json(url).await?);

        self.chain_cache.insert(url.to_string(), chain.clone()).await;
        Ok(chain)
    }
}
