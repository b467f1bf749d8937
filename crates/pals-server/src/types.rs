//! Response bodies for the pals server

use pokeapi_client::NamedResource;
use serde::Serialize;
use sprite_cache::{BackendStats, CacheStats};

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub cache: CacheStats,
    /// Absent when the backend could not be opened
    pub backend: Option<BackendStats>,
}

/// Catalog list
#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub count: usize,
    pub results: Vec<NamedResource>,
}

/// One evolution with its resolved sprite sources
#[derive(Debug, Serialize)]
pub struct EvolutionView {
    pub id: u32,
    pub name: String,
    pub front: Option<String>,
    pub back: Option<String>,
}

/// Entity page
#[derive(Debug, Serialize)]
pub struct PageResponse {
    pub id: u32,
    pub name: String,
    pub species: String,
    /// Absent for species without an evolution chain
    pub chain_id: Option<u32>,
    pub evolutions: Vec<EvolutionView>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Path under which cached bytes for a content address are served
pub fn sprite_path(address: &str) -> String {
    format!("/sprites/{}", address)
}
