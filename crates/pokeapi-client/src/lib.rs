//! Rust client for [PokeAPI](https://pokeapi.co)
//!
//! Covers the lookups the sprite viewer needs:
//!
//! - `GET /pokemon?limit=151` - catalog list
//! - `GET /pokemon/{name}` - entity with sprite URLs
//! - `GET /pokemon-species/{id}` - species with its evolution chain link
//! - `GET /evolution-chain/{id}` - evolution tree (fetched by full URL)
//!
//! All lookups are cached in memory with moka.

mod client;
mod error;
mod types;

pub use client::{PokeApiClient, CATALOG_LIMIT};
pub use error::{PokeApiError, Result};
pub use types::{
    ApiResource, ChainLink, EvolutionChain, ListResponse, NamedResource, Pokemon, Species,
    Sprites,
};

use async_trait::async_trait;
use std::sync::Arc;

/// Source of catalog, entity, species, and evolution data
#[async_trait]
pub trait EntityRepository: Send + Sync {
    async fn fetch_entity_list(&self) -> Result<Arc<Vec<NamedResource>>>;

    async fn fetch_entity(&self, name: &str) -> Result<Arc<Pokemon>>;

    /// Look up a species by numeric id or name
    async fn fetch_species(&self, id: &str) -> Result<Arc<Species>>;

    async fn fetch_evolution_chain(&self, url: &str) -> Result<Arc<EvolutionChain>>;
}
