//! Fakes shared by the loader and server tests

use async_trait::async_trait;
use pokeapi_client::{
    ApiResource, ChainLink, EntityRepository, EvolutionChain, NamedResource, PokeApiError,
    Pokemon, Species, Sprites,
};
use sprite_cache::{
    CacheEntry, CacheError, Fetcher, HandleRegistry, ImageCache, ObjectStoreBackend, Preloader,
    SniffDecoder,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

pub const CHAIN_URL: &str = "https://pokeapi.co/api/v2/evolution-chain/10/";

pub fn sprite_url(id: u32, back: bool) -> String {
    if back {
        format!("https://sprites.example.com/pokemon/back/{}.png", id)
    } else {
        format!("https://sprites.example.com/pokemon/{}.png", id)
    }
}

fn pokemon(id: u32, name: &str) -> Pokemon {
    Pokemon {
        id,
        name: name.to_string(),
        sprites: Sprites {
            front_default: Some(sprite_url(id, false)),
            back_default: Some(sprite_url(id, true)),
        },
    }
}

fn link(name: &str, evolves_to: Vec<ChainLink>) -> ChainLink {
    ChainLink {
        species: NamedResource {
            name: name.to_string(),
            url: format!("https://pokeapi.co/api/v2/pokemon-species/{}/", name),
        },
        evolves_to,
    }
}

/// In-memory repository holding the pichu line
pub struct FakeRepository {
    list: Arc<Vec<NamedResource>>,
    pokemon: HashMap<String, Arc<Pokemon>>,
    species: HashMap<String, Arc<Species>>,
    chains: HashMap<String, Arc<EvolutionChain>>,
    offline: bool,
}

impl FakeRepository {
    pub fn pikachu_line() -> Self {
        let mons = [pokemon(172, "pichu"), pokemon(25, "pikachu"), pokemon(26, "raichu")];

        let list = mons
            .iter()
            .map(|p| NamedResource {
                name: p.name.clone(),
                url: format!("https://pokeapi.co/api/v2/pokemon/{}/", p.id),
            })
            .collect();

        let species = Arc::new(Species {
            id: 25,
            name: "pikachu".to_string(),
            evolution_chain: Some(ApiResource {
                url: CHAIN_URL.to_string(),
            }),
        });

        let chain = Arc::new(EvolutionChain {
            id: 10,
            chain: link(
                "pichu",
                vec![link("pikachu", vec![link("raichu", Vec::new())])],
            ),
        });

        Self {
            list: Arc::new(list),
            pokemon: mons
                .into_iter()
                .map(|p| (p.name.clone(), Arc::new(p)))
                .collect(),
            species: HashMap::from([("25".to_string(), species)]),
            chains: HashMap::from([(CHAIN_URL.to_string(), chain)]),
            offline: false,
        }
    }

    /// Repository whose every request fails
    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::pikachu_line()
        }
    }

    fn lookup<T: Clone>(&self, map: &HashMap<String, T>, key: &str) -> Result<T, PokeApiError> {
        if self.offline {
            return Err(PokeApiError::Status {
                url: key.to_string(),
                status: 503,
            });
        }
        map.get(key).cloned().ok_or_else(|| PokeApiError::Status {
            url: key.to_string(),
            status: 404,
        })
    }
}

#[async_trait]
impl EntityRepository for FakeRepository {
    async fn fetch_entity_list(&self) -> pokeapi_client::Result<Arc<Vec<NamedResource>>> {
        if self.offline {
            return Err(PokeApiError::Status {
                url: "/pokemon".to_string(),
                status: 503,
            });
        }
        Ok(self.list.clone())
    }

    async fn fetch_entity(&self, name: &str) -> pokeapi_client::Result<Arc<Pokemon>> {
        self.lookup(&self.pokemon, name)
    }

    async fn fetch_species(&self, id: &str) -> pokeapi_client::Result<Arc<Species>> {
        self.lookup(&self.species, id)
    }

    async fn fetch_evolution_chain(
        &self,
        url: &str,
    ) -> pokeapi_client::Result<Arc<EvolutionChain>> {
        self.lookup(&self.chains, url)
    }
}

/// Fetcher returning a small PNG for every URL and counting requests
#[derive(Default)]
pub struct CountingFetcher {
    calls: Mutex<HashMap<String, usize>>,
}

impl CountingFetcher {
    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

pub fn png_body(url: &str) -> Vec<u8> {
    let mut body = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    body.extend_from_slice(url.as_bytes());
    body
}

#[async_trait]
impl Fetcher for CountingFetcher {
    async fn fetch(&self, url: &str) -> sprite_cache::Result<CacheEntry> {
        *self.calls.lock().unwrap().entry(url.to_string()).or_default() += 1;
        if url.contains("missing") {
            return Err(CacheError::Status {
                url: url.to_string(),
                status: 404,
            });
        }
        Ok(CacheEntry::new(png_body(url), "image/png"))
    }
}

pub fn preloader(dir: &Path, fetcher: Arc<CountingFetcher>) -> Preloader {
    let cache = ImageCache::new(
        Arc::new(ObjectStoreBackend::new(dir.join("db"), 1 << 20)),
        fetcher,
        Arc::new(HandleRegistry::new(64)),
        1 << 20,
    );
    Preloader::new(Arc::new(cache), Arc::new(SniffDecoder::new()))
}
