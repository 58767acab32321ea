//! Core types for the cache store boundary.

use crate::request::RequesterId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Key uniquely identifying a cached response.
///
/// The requester is part of the key so that differently-authenticated
/// fetches of the same URL cache separately.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// Target URL the response was fetched from.
    pub target: url::Url,
    /// Identity the fetch was performed as.
    pub requester: RequesterId,
}

impl CacheKey {
    /// Creates a new cache key.
    pub fn new(target: url::Url, requester: RequesterId) -> Self {
        Self { target, requester }
    }
}

/// Metadata stored alongside a cached body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// When the body was fetched.
    pub timestamp: DateTime<Utc>,
    /// Session correlator of the request that fetched it.
    pub session: uuid::Uuid,
    /// Effective MIME type reported by the remote host.
    pub mime_type: Option<String>,
}

/// Cache store errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// I/O error during cache operations.
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The cache directory has disappeared out from under the store.
    #[error("cache directory does not exist: {}", .0.display())]
    DirectoryMissing(PathBuf),

    /// The filesystem holding the cache is out of space.
    #[error("insufficient disk space for cache write")]
    DiskFull(#[source] std::io::Error),

    /// An entry referenced by a handle is no longer in the store.
    #[error("cache entry is no longer present")]
    EntryMissing,

    /// A metadata sidecar could not be encoded or decoded.
    #[error("cache metadata error: {0}")]
    Metadata(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(s: &str) -> url::Url {
        url::Url::parse(s).unwrap()
    }

    #[test]
    fn test_cache_key_equality() {
        let a = CacheKey::new(target("https://example.com/a"), RequesterId::anonymous());
        let b = CacheKey::new(target("https://example.com/a"), RequesterId::anonymous());
        let c = CacheKey::new(target("https://example.com/c"), RequesterId::anonymous());

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_cache_key_separates_requesters() {
        let url = target("https://example.com/feed");
        let anon = CacheKey::new(url.clone(), RequesterId::anonymous());
        let named = CacheKey::new(url, RequesterId::new("alice"));

        assert_ne!(anon, named);
    }

    #[test]
    fn test_cache_key_roundtrips_through_json() {
        let key = CacheKey::new(target("https://example.com/x?page=2"), RequesterId::new("bob"));
        let encoded = serde_json::to_string(&key).unwrap();
        let decoded: CacheKey = serde_json::from_str(&encoded).unwrap();
        assert_eq!(key, decoded);
    }

    #[test]
    fn test_metadata_roundtrips_through_json() {
        let metadata = EntryMetadata {
            timestamp: Utc::now(),
            session: uuid::Uuid::new_v4(),
            mime_type: Some("application/json".into()),
        };
        let encoded = serde_json::to_string(&metadata).unwrap();
        let decoded: EntryMetadata = serde_json::from_str(&encoded).unwrap();
        assert_eq!(metadata, decoded);
    }

    #[test]
    fn test_error_display() {
        let err = CacheError::DirectoryMissing(PathBuf::from("/tmp/nope"));
        assert!(format!("{}", err).contains("/tmp/nope"));

        let err = CacheError::EntryMissing;
        assert!(format!("{}", err).contains("no longer present"));
    }
}
