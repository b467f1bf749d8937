//! Content-addressable image cache
//!
//! Resolves remote image URLs into display handles, keeping the bytes in a
//! durable storage backend so each URL is downloaded once. Caching is an
//! optimization only: on any failure the original URL is handed back and
//! the renderer loads it directly.
//!
//! - [`StorageBackend`] with a text-encoded [`KeyValueBackend`] and a
//!   versioned [`ObjectStoreBackend`]
//! - [`ImageCache`] for cache-or-fetch resolution with single-flight loads
//! - [`Preloader`] to warm the cache ahead of render
//! - [`RotatingDisplay`] to alternate two resolved sprites

pub mod backend;
mod cache;
pub mod config;
pub mod display;
mod error;
mod fetch;
mod handles;
pub mod preload;
mod types;

pub use backend::{open_backend, BackendKind, KeyValueBackend, ObjectStoreBackend, StorageBackend};
pub use cache::ImageCache;
pub use config::CacheConfig;
pub use display::{Face, Frame, Layer, RotatingDisplay, SpriteInput};
pub use error::{CacheError, Result};
pub use fetch::{Fetcher, HttpFetcher};
pub use handles::HandleRegistry;
pub use preload::{DecodePipeline, ImageFormat, Preloader, SniffDecoder};
pub use types::{
    content_address, BackendStats, CacheEntry, CacheStats, ImageSource, ObjectUrl,
};
