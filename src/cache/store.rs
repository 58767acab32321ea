//! Cache store trait and the readable-entry handle.

use super::types::{CacheError, CacheKey, EntryMetadata};
use bytes::Bytes;
use std::sync::Arc;

/// Storage abstraction for cached response bodies.
///
/// Implementations must be `Send + Sync`; the engine calls them from lane
/// workers concurrently. Lookup and open are keyed operations: an entry
/// handle carries its key, and `open` resolves it against current store
/// state, so a handle can outlive a later overwrite of the same key.
pub trait CacheStore: Send + Sync {
    /// Looks up the entry for a key.
    ///
    /// Returns `Ok(None)` on a miss. Errors indicate the store itself is
    /// unhealthy (unreadable directory, corrupt index).
    fn lookup(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError>;

    /// Writes a body and its metadata, replacing any previous entry for
    /// the key.
    fn write(
        &self,
        key: &CacheKey,
        body: Bytes,
        metadata: EntryMetadata,
    ) -> Result<CacheEntry, CacheError>;

    /// Opens an entry and returns its body.
    fn open(&self, entry: &CacheEntry) -> Result<Bytes, CacheError>;
}

/// A cached entry: its key plus stored metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Key the entry is stored under.
    pub key: CacheKey,
    /// Metadata recorded at write time.
    pub metadata: EntryMetadata,
}

/// Handle to the bytes delivered by a successful request.
///
/// For cacheable requests this opens the stored entry lazily through the
/// cache store; for write-payload requests (which never touch the cache)
/// it wraps the response body directly. Either way, callers read it the
/// same way.
#[derive(Clone)]
pub struct ReadableEntry {
    source: EntrySource,
}

#[derive(Clone)]
enum EntrySource {
    Store {
        store: Arc<dyn CacheStore>,
        entry: CacheEntry,
    },
    Buffer(Bytes),
}

impl ReadableEntry {
    /// Creates a handle backed by a store entry.
    pub fn from_store(store: Arc<dyn CacheStore>, entry: CacheEntry) -> Self {
        Self {
            source: EntrySource::Store { store, entry },
        }
    }

    /// Creates a handle wrapping an in-memory body.
    pub fn from_bytes(body: Bytes) -> Self {
        Self {
            source: EntrySource::Buffer(body),
        }
    }

    /// Reads the full body.
    pub fn read(&self) -> Result<Bytes, CacheError> {
        match &self.source {
            EntrySource::Store { store, entry } => store.open(entry),
            EntrySource::Buffer(body) => Ok(body.clone()),
        }
    }

    /// Returns the underlying store entry, if there is one.
    pub fn entry(&self) -> Option<&CacheEntry> {
        match &self.source {
            EntrySource::Store { entry, .. } => Some(entry),
            EntrySource::Buffer(_) => None,
        }
    }
}

impl std::fmt::Debug for ReadableEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.source {
            EntrySource::Store { entry, .. } => f
                .debug_struct("ReadableEntry")
                .field("entry", entry)
                .finish_non_exhaustive(),
            EntrySource::Buffer(body) => f
                .debug_struct("ReadableEntry")
                .field("buffered_len", &body.len())
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheStore;
    use crate::request::RequesterId;
    use chrono::Utc;

    fn key(s: &str) -> CacheKey {
        CacheKey::new(url::Url::parse(s).unwrap(), RequesterId::anonymous())
    }

    fn metadata() -> EntryMetadata {
        EntryMetadata {
            timestamp: Utc::now(),
            session: uuid::Uuid::new_v4(),
            mime_type: Some("text/plain".into()),
        }
    }

    #[test]
    fn test_buffered_entry_reads_back() {
        let handle = ReadableEntry::from_bytes(Bytes::from_static(b"payload"));
        assert_eq!(handle.read().unwrap(), Bytes::from_static(b"payload"));
        assert!(handle.entry().is_none());
    }

    #[test]
    fn test_store_entry_reads_through_store() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryCacheStore::new());
        let k = key("https://example.com/data");
        let entry = store
            .write(&k, Bytes::from_static(b"cached bytes"), metadata())
            .unwrap();

        let handle = ReadableEntry::from_store(Arc::clone(&store), entry);
        assert_eq!(handle.read().unwrap(), Bytes::from_static(b"cached bytes"));
        assert!(handle.entry().is_some());
    }

    #[test]
    fn test_store_entry_survives_overwrite() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryCacheStore::new());
        let k = key("https://example.com/data");
        let entry = store
            .write(&k, Bytes::from_static(b"first"), metadata())
            .unwrap();
        let handle = ReadableEntry::from_store(Arc::clone(&store), entry);

        store
            .write(&k, Bytes::from_static(b"second"), metadata())
            .unwrap();

        // The handle resolves by key, so it observes the newest body.
        assert_eq!(handle.read().unwrap(), Bytes::from_static(b"second"));
    }

    #[test]
    fn test_debug_formats() {
        let buffered = ReadableEntry::from_bytes(Bytes::from_static(b"abc"));
        assert!(format!("{:?}", buffered).contains("buffered_len"));
    }
}
