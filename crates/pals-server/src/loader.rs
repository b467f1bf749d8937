//! Route loaders: fetch page data and start warming its sprites

use crate::error::Result;
use futures::future::try_join_all;
use pokeapi_client::{EntityRepository, EvolutionChain, NamedResource, Pokemon, Species};
use sprite_cache::Preloader;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Data behind an entity page
#[derive(Debug, Clone)]
pub struct EntityPage {
    pub entity: Arc<Pokemon>,
    pub species: Arc<Species>,
    pub evolution_chain: Option<Arc<EvolutionChain>>,
    /// Members of the chain's first path, in order
    pub evolutions: Vec<Arc<Pokemon>>,
}

impl EntityPage {
    /// Sprite URLs for the entity and every evolution
    pub fn sprite_urls(&self) -> Vec<String> {
        std::iter::once(&self.entity)
            .chain(self.evolutions.iter())
            .flat_map(|p| p.sprite_urls().map(str::to_string).collect::<Vec<_>>())
            .collect()
    }
}

pub async fn load_index(repo: &dyn EntityRepository) -> Result<Arc<Vec<NamedResource>>> {
    Ok(repo.fetch_entity_list().await?)
}

/// Load the entity page for species `id`
///
/// Sprites are warmed in the background; the returned handle may be
/// ignored. Only repository failures are reported.
pub async fn load_entity_page(
    repo: &dyn EntityRepository,
    preloader: &Preloader,
    id: &str,
) -> Result<(EntityPage, JoinHandle<()>)> {
    let species = repo.fetch_species(id).await?;
    let entity = repo.fetch_entity(&species.name).await?;

    let evolution_chain = match &species.evolution_chain {
        Some(link) => Some(repo.fetch_evolution_chain(&link.url).await?),
        None => None,
    };

    let names = evolution_chain
        .as_ref()
        .map(|chain| chain.chain.first_path_names())
        .unwrap_or_default();
    let evolutions = try_join_all(names.iter().map(|name| repo.fetch_entity(name))).await?;

    let page = EntityPage {
        entity,
        species,
        evolution_chain,
        evolutions,
    };

    let urls = page.sprite_urls();
    debug!(id = %id, sprites = urls.len(), "Warming entity page sprites");
    let warming = preloader.warm(urls);

    Ok((page, warming))
}
