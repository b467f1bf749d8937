//! Error types for the sprite cache

use std::fmt;
use std::sync::Arc;

#[derive(Debug)]
pub enum CacheError {
    Http(Box<reqwest::Error>),
    /// Remote server answered with a non-success status
    Status { url: String, status: u16 },
    Io(Box<std::io::Error>),
    Json(serde_json::Error),
    QuotaExceeded { needed: u64, available: u64 },
    /// Store was created with a schema version this build cannot open
    SchemaVersion { found: u32, expected: u32 },
    CorruptEntry(String),
    HandlePoolExhausted(usize),
    /// Error produced by a load shared between concurrent callers
    Shared(Arc<CacheError>),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Http(err) => write!(f, "HTTP error: {}", err),
            CacheError::Status { url, status } => {
                write!(f, "{} returned status {}", url, status)
            }
            CacheError::Io(err) => write!(f, "IO error: {}", err),
            CacheError::Json(err) => write!(f, "JSON error: {}", err),
            CacheError::QuotaExceeded { needed, available } => write!(
                f,
                "Storage quota exceeded: need {} bytes, {} available",
                needed, available
            ),
            CacheError::SchemaVersion { found, expected } => write!(
                f,
                "Unsupported schema version {} (expected {})",
                found, expected
            ),
            CacheError::CorruptEntry(key) => write!(f, "Corrupt cache entry: {}", key),
            CacheError::HandlePoolExhausted(max) => {
                write!(f, "All {} display handles are in use", max)
            }
            CacheError::Shared(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::Http(err) => Some(err.as_ref()),
            CacheError::Io(err) => Some(err.as_ref()),
            CacheError::Json(err) => Some(err),
            CacheError::Shared(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for CacheError {
    fn from(err: reqwest::Error) -> Self {
        CacheError::Http(Box::new(err))
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Io(Box::new(err))
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Json(err)
    }
}

impl From<Arc<CacheError>> for CacheError {
    fn from(err: Arc<CacheError>) -> Self {
        CacheError::Shared(err)
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
