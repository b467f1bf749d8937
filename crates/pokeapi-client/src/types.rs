//! Data types for PokeAPI responses
//!
//! Only the fields the viewer reads are modelled; everything else in the
//! responses is ignored.

use serde::{Deserialize, Serialize};

/// A named link to another resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedResource {
    pub name: String,
    pub url: String,
}

/// An unnamed link to another resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResource {
    pub url: String,
}

/// Paged list from `/pokemon`
#[derive(Debug, Clone, Deserialize)]
pub struct ListResponse {
    pub count: u32,
    pub results: Vec<NamedResource>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sprites {
    pub front_default: Option<String>,
    pub back_default: Option<String>,
}

/// Entity from `/pokemon/{name}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pokemon {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub sprites: Sprites,
}

impl Pokemon {
    /// Front and back sprite URLs that are present
    pub fn sprite_urls(&self) -> impl Iterator<Item = &str> {
        [&self.sprites.front_default, &self.sprites.back_default]
            .into_iter()
            .filter_map(|url| url.as_deref())
            .filter(|url| !url.is_empty())
    }
}

/// Species from `/pokemon-species/{id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Species {
    pub id: u32,
    pub name: String,
    pub evolution_chain: Option<ApiResource>,
}

/// Evolution chain from `/evolution-chain/{id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvolutionChain {
    pub id: u32,
    pub chain: ChainLink,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainLink {
    pub species: NamedResource,
    #[serde(default)]
    pub evolves_to: Vec<ChainLink>,
}

impl ChainLink {
    /// Species names along the chain, following only the first branch at
    /// each step
    pub fn first_path_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        let mut current = Some(self);
        while let Some(link) = current {
            names.push(link.species.name.clone());
            current = link.evolves_to.first();
        }
        names
    }
}
