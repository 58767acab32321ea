//! In-memory cache store.

use super::store::{CacheEntry, CacheStore};
use super::types::{CacheError, CacheKey, EntryMetadata};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Mutex;

/// Cache store keeping everything in a process-local map.
///
/// Used by the test suites and by embedders that want request coordination
/// without persistence. Bodies are `Bytes`, so reads are cheap clones.
///
/// # Example
///
/// ```
/// use fetchlane::cache::{CacheStore, MemoryCacheStore};
///
/// let store = MemoryCacheStore::new();
/// assert_eq!(store.len(), 0);
/// ```
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<CacheKey, (Bytes, EntryMetadata)>>,
}

impl MemoryCacheStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if the key has a cached entry.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }

    /// Removes all entries.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

impl CacheStore for MemoryCacheStore {
    fn lookup(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        let entries = self.entries.lock().unwrap();
        Ok(entries.get(key).map(|(_, metadata)| CacheEntry {
            key: key.clone(),
            metadata: metadata.clone(),
        }))
    }

    fn write(
        &self,
        key: &CacheKey,
        body: Bytes,
        metadata: EntryMetadata,
    ) -> Result<CacheEntry, CacheError> {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(key.clone(), (body, metadata.clone()));
        Ok(CacheEntry {
            key: key.clone(),
            metadata,
        })
    }

    fn open(&self, entry: &CacheEntry) -> Result<Bytes, CacheError> {
        let entries = self.entries.lock().unwrap();
        entries
            .get(&entry.key)
            .map(|(body, _)| body.clone())
            .ok_or(CacheError::EntryMissing)
    }
}
