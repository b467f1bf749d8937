//! HTTP server for the sprite browser
//!
//! Provides /health, the catalog at /, entity pages at /pals/{id}, and
//! /sprites/{address} serving cached sprite bytes by content address.

use crate::loader::{load_entity_page, load_index};
use crate::types::{
    sprite_path, ErrorResponse, EvolutionView, HealthResponse, IndexResponse, PageResponse,
};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Redirect, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use moka::future::Cache;
use pokeapi_client::{EntityRepository, Pokemon};
use sprite_cache::{content_address, ImageCache, Preloader};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

/// Upper bound on remembered sprite addresses
const SPRITE_INDEX_CAPACITY: u64 = 10_000;

/// Shared state for the HTTP server
pub struct ServerState {
    pub cache: Arc<ImageCache>,
    pub preloader: Preloader,
    pub repo: Arc<dyn EntityRepository>,
    /// Content address to source URL, for every sprite a page has linked
    pub sprites: Cache<String, String>,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(preloader: Preloader, repo: Arc<dyn EntityRepository>) -> Self {
        Self {
            cache: preloader.cache().clone(),
            preloader,
            repo,
            sprites: Cache::new(SPRITE_INDEX_CAPACITY),
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<ServerState>;

/// Create the HTTP router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/", get(index))
        .route("/pals/{id}", get(entity_page))
        .route("/sprites/{address}", get(get_sprite))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(state: SharedState, port: u16) -> std::io::Result<()> {
    let router = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let uptime_secs = (Utc::now() - state.started_at).num_seconds().max(0) as u64;
    let backend = match state.cache.backend().stats().await {
        Ok(stats) => Some(stats),
        Err(e) => {
            warn!(error = %e, "Failed to read backend stats");
            None
        }
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs,
        cache: state.cache.stats(),
        backend,
    })
}

/// Catalog list
async fn index(State(state): State<SharedState>) -> Response {
    match load_index(state.repo.as_ref()).await {
        Ok(list) => Json(IndexResponse {
            count: list.len(),
            results: list.as_ref().clone(),
        })
        .into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to load catalog");
            error_response(StatusCode::BAD_GATEWAY, "Catalog unavailable")
        }
    }
}

/// Entity page with every evolution's sprites linked through the cache
///
/// Cached sprites are linked by content address; anything that could not be
/// cached keeps its remote URL.
async fn entity_page(State(state): State<SharedState>, Path(id): Path<String>) -> Response {
    let page = match load_entity_page(state.repo.as_ref(), &state.preloader, &id).await {
        // Warming continues in the background
        Ok((page, _warming)) => page,
        Err(e) => {
            warn!(id = %id, error = %e, "Failed to load entity page");
            return error_response(StatusCode::BAD_GATEWAY, "Entity unavailable");
        }
    };

    let evolutions = join_all(
        page.evolutions
            .iter()
            .map(|pokemon| evolution_view(&state, pokemon)),
    )
    .await;

    debug!(id = %id, evolutions = evolutions.len(), "Rendered entity page");

    Json(PageResponse {
        id: page.entity.id,
        name: page.entity.name.clone(),
        species: page.species.name.clone(),
        chain_id: page.evolution_chain.as_ref().map(|chain| chain.id),
        evolutions,
    })
    .into_response()
}

async fn evolution_view(state: &ServerState, pokemon: &Pokemon) -> EvolutionView {
    let (front, back) = tokio::join!(
        sprite_href(state, pokemon.sprites.front_default.as_deref()),
        sprite_href(state, pokemon.sprites.back_default.as_deref()),
    );

    EvolutionView {
        id: pokemon.id,
        name: pokemon.name.clone(),
        front,
        back,
    }
}

async fn sprite_href(state: &ServerState, url: Option<&str>) -> Option<String> {
    let url = url.filter(|u| !u.is_empty())?;
    match state.cache.load(url).await {
        Ok(_) => {
            let address = content_address(url);
            state.sprites.insert(address.clone(), url.to_string()).await;
            Some(sprite_path(&address))
        }
        Err(e) => {
            warn!(url = %url, error = %e, "Linking sprite by remote URL");
            Some(url.to_string())
        }
    }
}

/// Cached bytes for a content address
///
/// Redirects to the remote URL when the bytes can no longer be loaded.
async fn get_sprite(State(state): State<SharedState>, Path(address): Path<String>) -> Response {
    let Some(url) = state.sprites.get(&address).await else {
        return error_response(StatusCode::NOT_FOUND, "Sprite not found");
    };

    match state.cache.load(&url).await {
        Ok(entry) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, entry.content_type.clone()),
                (
                    header::CACHE_CONTROL,
                    "public, max-age=31536000, immutable".to_string(),
                ),
            ],
            entry.bytes.clone(),
        )
            .into_response(),
        Err(e) => {
            warn!(url = %url, error = %e, "Failed to load cached sprite");
            Redirect::temporary(&url).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{png_body, preloader, sprite_url, CountingFetcher, FakeRepository};
    use crate::types::sprite_path;
    use axum::body::Body;
    use axum::http::Request;
    use tempfile::{tempdir, TempDir};
    use tower::ServiceExt;

    fn create_test_state(
        dir: &TempDir,
        repo: FakeRepository,
    ) -> (SharedState, Arc<CountingFetcher>) {
        let fetcher = Arc::new(CountingFetcher::default());
        let preloader = preloader(dir.path(), fetcher.clone());
        let state = Arc::new(ServerState::new(preloader, Arc::new(repo)));
        (state, fetcher)
    }

    async fn send(router: Router, method: &str, uri: &str) -> Response {
        router
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let dir = tempdir().unwrap();
        let (state, _) = create_test_state(&dir, FakeRepository::pikachu_line());

        let response = send(create_router(state), "GET", "/health").await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert!(json["uptime_secs"].as_u64().is_some());
        assert_eq!(json["cache"]["live_handles"], 0);
        assert_eq!(json["backend"]["entries"], 0);
    }

    #[tokio::test]
    async fn test_index_lists_catalog() {
        let dir = tempdir().unwrap();
        let (state, _) = create_test_state(&dir, FakeRepository::pikachu_line());

        let response = send(create_router(state), "GET", "/").await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["count"], 3);
        assert_eq!(json["results"][1]["name"], "pikachu");
    }

    #[tokio::test]
    async fn test_index_repository_failure_is_bad_gateway() {
        let dir = tempdir().unwrap();
        let (state, _) = create_test_state(&dir, FakeRepository::offline());

        let response = send(create_router(state), "GET", "/").await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_entity_page_links_sprites_by_content_address() {
        let dir = tempdir().unwrap();
        let (state, fetcher) = create_test_state(&dir, FakeRepository::pikachu_line());

        let response = send(create_router(state.clone()), "GET", "/pals/25").await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["name"], "pikachu");
        assert_eq!(json["species"], "pikachu");
        assert_eq!(json["chain_id"], 10);
        let evolutions = json["evolutions"].as_array().unwrap();
        assert_eq!(evolutions.len(), 3);
        for evolution in evolutions {
            assert!(evolution["front"].as_str().unwrap().starts_with("/sprites/"));
            assert!(evolution["back"].as_str().unwrap().starts_with("/sprites/"));
        }
        assert_eq!(
            evolutions[1]["front"],
            sprite_path(&content_address(&sprite_url(25, false)))
        );

        // Warming and page rendering share a single fetch per sprite
        assert_eq!(fetcher.calls(&sprite_url(25, false)), 1);
    }

    #[tokio::test]
    async fn test_entity_page_unknown_species_is_bad_gateway() {
        let dir = tempdir().unwrap();
        let (state, _) = create_test_state(&dir, FakeRepository::pikachu_line());

        let response = send(create_router(state), "GET", "/pals/9999").await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_page_views_beyond_handle_pool_stay_cached() {
        let dir = tempdir().unwrap();
        let (state, fetcher) = create_test_state(&dir, FakeRepository::pikachu_line());

        // Six sprites per view against a 64-handle pool
        for view in 0..12 {
            let response = send(create_router(state.clone()), "GET", "/pals/25").await;
            assert_eq!(response.status(), StatusCode::OK);

            let json = body_json(response).await;
            for evolution in json["evolutions"].as_array().unwrap() {
                let front = evolution["front"].as_str().unwrap();
                assert!(front.starts_with("/sprites/"), "view {} linked {}", view, front);
            }
            assert_eq!(state.cache.handles().live_count(), 0);
        }

        assert_eq!(fetcher.total_calls(), 6);
    }

    #[tokio::test]
    async fn test_sprite_serves_cached_bytes() {
        let dir = tempdir().unwrap();
        let (state, _) = create_test_state(&dir, FakeRepository::pikachu_line());
        let url = sprite_url(25, false);

        let json = body_json(send(create_router(state.clone()), "GET", "/pals/25").await).await;
        let href = json["evolutions"][1]["front"].as_str().unwrap().to_string();

        let response = send(create_router(state), "GET", &href).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(body.as_ref(), png_body(&url).as_slice());
    }

    #[tokio::test]
    async fn test_unknown_sprite_address_is_not_found() {
        let dir = tempdir().unwrap();
        let (state, _) = create_test_state(&dir, FakeRepository::pikachu_line());

        let address = content_address("https://sprites.example.com/never-linked.png");
        let response = send(create_router(state), "GET", &sprite_path(&address)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unloadable_sprite_redirects_to_remote() {
        let dir = tempdir().unwrap();
        let (state, _) = create_test_state(&dir, FakeRepository::pikachu_line());
        let url = "https://sprites.example.com/pokemon/missing.png";
        let address = content_address(url);
        state.sprites.insert(address.clone(), url.to_string()).await;

        let response = send(create_router(state), "GET", &sprite_path(&address)).await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(response.headers()[header::LOCATION], url);
    }

    #[tokio::test]
    async fn test_server_state_new() {
        let dir = tempdir().unwrap();
        let (state, _) = create_test_state(&dir, FakeRepository::pikachu_line());

        let diff = (Utc::now() - state.started_at).num_seconds();
        assert!((0..5).contains(&diff));
    }
}
