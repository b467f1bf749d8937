//! Cache warming ahead of render

use crate::cache::ImageCache;
use crate::error::{CacheError, Result};
use crate::types::CacheEntry;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Gif,
    Jpeg,
    WebP,
}

impl ImageFormat {
    /// Identify an image by its leading magic bytes
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(Self::Png)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(Self::Gif)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(Self::WebP)
        } else {
            None
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Jpeg => "jpeg",
            Self::WebP => "webp",
        };
        f.write_str(name)
    }
}

/// Receives freshly resolved image bytes so they are ready before render
#[async_trait]
pub trait DecodePipeline: Send + Sync {
    async fn decode(&self, key: &str, entry: &CacheEntry) -> Result<ImageFormat>;
}

/// Decode pipeline that validates image headers and remembers what it saw
#[derive(Default)]
pub struct SniffDecoder {
    decoded: Mutex<HashMap<String, ImageFormat>>,
}

impl SniffDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decoded_format(&self, key: &str) -> Option<ImageFormat> {
        self.decoded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .copied()
    }

    pub fn is_decoded(&self, key: &str) -> bool {
        self.decoded_format(key).is_some()
    }
}

#[async_trait]
impl DecodePipeline for SniffDecoder {
    async fn decode(&self, key: &str, entry: &CacheEntry) -> Result<ImageFormat> {
        let format = ImageFormat::sniff(&entry.bytes).ok_or_else(|| {
            CacheError::CorruptEntry(format!("{}: unrecognised image data", key))
        })?;
        self.decoded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), format);
        Ok(format)
    }
}

/// Warms the image cache and decode pipeline for URLs about to be rendered
#[derive(Clone)]
pub struct Preloader {
    cache: Arc<ImageCache>,
    decoder: Arc<dyn DecodePipeline>,
}

impl Preloader {
    pub fn new(cache: Arc<ImageCache>, decoder: Arc<dyn DecodePipeline>) -> Self {
        Self { cache, decoder }
    }

    pub fn cache(&self) -> &Arc<ImageCache> {
        &self.cache
    }

    /// Start warming `urls` in the background
    ///
    /// Returns immediately. The handle may be dropped; awaiting it only
    /// tells when every URL has been processed. Failures are logged.
    pub fn warm<I, S>(&self, urls: I) -> JoinHandle<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let urls: BTreeSet<String> = urls
            .into_iter()
            .map(Into::into)
            .filter(|url| !url.is_empty())
            .collect();

        let cache = self.cache.clone();
        let decoder = self.decoder.clone();

        tokio::spawn(async move {
            let total = urls.len();
            let mut tasks = JoinSet::new();
            for url in urls {
                tasks.spawn(warm_one(cache.clone(), decoder.clone(), url));
            }

            let mut warmed = 0;
            while let Some(result) = tasks.join_next().await {
                match result {
                    Ok(true) => warmed += 1,
                    Ok(false) => {}
                    Err(e) => warn!(error = %e, "Preload task failed"),
                }
            }
            info!(warmed, total, "Preload finished");
        })
    }
}

/// Returns true when the URL ended up cached and decoded
async fn warm_one(cache: Arc<ImageCache>, decoder: Arc<dyn DecodePipeline>, url: String) -> bool {
    let entry = match cache.load(&url).await {
        Ok(entry) => entry,
        Err(e) => {
            debug!(url = %url, error = %e, "Not cached, renderer will load it directly");
            return false;
        }
    };

    match decoder.decode(&url, &entry).await {
        Ok(format) => {
            debug!(url = %url, format = %format, "Preloaded image");
            true
        }
        Err(e) => {
            warn!(url = %url, error = %e, "Failed to decode preloaded image");
            false
        }
    }
}
