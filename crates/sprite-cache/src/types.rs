//! Cache types

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Scheme prefix of display handles minted by a [`crate::HandleRegistry`]
pub const OBJECT_URL_PREFIX: &str = "blob:sprite-cache/";

/// Stable hex SHA-256 address of a cache key
///
/// Also names object store records on disk.
pub fn content_address(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Durable bytes stored for one cache key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl CacheEntry {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Ephemeral reference to bytes held by a handle registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectUrl(u64);

impl ObjectUrl {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }

    /// Parse a `blob:sprite-cache/<n>` string
    pub fn parse(s: &str) -> Option<Self> {
        s.strip_prefix(OBJECT_URL_PREFIX)?.parse().ok().map(Self)
    }
}

impl fmt::Display for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", OBJECT_URL_PREFIX, self.0)
    }
}

/// Something a renderer can use as an image source
///
/// A raw URL and a minted object handle are equally valid; the raw URL is
/// also what callers get back when caching fails.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImageSource {
    Url(String),
    Object(ObjectUrl),
}

impl ImageSource {
    pub fn is_object(&self) -> bool {
        matches!(self, ImageSource::Object(_))
    }

    pub fn object_url(&self) -> Option<ObjectUrl> {
        match self {
            ImageSource::Object(handle) => Some(*handle),
            ImageSource::Url(_) => None,
        }
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSource::Url(url) => f.write_str(url),
            ImageSource::Object(handle) => write!(f, "{}", handle),
        }
    }
}

impl From<ObjectUrl> for ImageSource {
    fn from(handle: ObjectUrl) -> Self {
        ImageSource::Object(handle)
    }
}

/// Statistics about cache resolution
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub fetches: u64,
    pub fallbacks: u64,
    pub live_handles: usize,
}

/// Statistics reported by a storage backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendStats {
    pub backend: String,
    pub entries: usize,
    pub total_size: u64,
    pub quota: u64,
}
