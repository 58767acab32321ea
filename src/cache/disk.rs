//! Disk-backed cache store.
//!
//! Bodies live in numbered `.body` files; each has a `.entry.json` sidecar
//! recording its key and metadata. The index is rebuilt by scanning the
//! sidecars on startup, so the store survives restarts without a separate
//! manifest. There is no eviction; wrap the store if you need one.

use super::store::{CacheEntry, CacheStore};
use super::types::{CacheError, CacheKey, EntryMetadata};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::{debug, warn};

/// POSIX "no space left on device".
const ENOSPC: i32 = 28;

/// Sidecar document stored next to each body file.
#[derive(Debug, Serialize, Deserialize)]
struct Sidecar {
    key: CacheKey,
    metadata: EntryMetadata,
}

#[derive(Debug, Clone)]
struct IndexEntry {
    id: u64,
    metadata: EntryMetadata,
}

/// Persistent cache store rooted at a directory.
pub struct DiskCacheStore {
    root: PathBuf,
    index: Mutex<HashMap<CacheKey, IndexEntry>>,
    next_id: AtomicU64,
}

impl DiskCacheStore {
    /// Opens (or creates) a store rooted at `root`.
    ///
    /// Scans existing sidecars to rebuild the index; unreadable sidecars
    /// are skipped with a warning rather than failing the whole store.
    pub fn new(root: PathBuf) -> Result<Self, CacheError> {
        if !root.exists() {
            fs::create_dir_all(&root)?;
        }

        let mut index = HashMap::new();
        let mut max_id = 0_u64;

        for dir_entry in fs::read_dir(&root)? {
            let path = dir_entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(stem) = name.strip_suffix(".entry.json") else {
                continue;
            };
            let Ok(id) = stem.parse::<u64>() else {
                continue;
            };

            match fs::read(&path).map_err(CacheError::from).and_then(|raw| {
                serde_json::from_slice::<Sidecar>(&raw).map_err(CacheError::from)
            }) {
                Ok(sidecar) => {
                    max_id = max_id.max(id);
                    index.insert(
                        sidecar.key,
                        IndexEntry {
                            id,
                            metadata: sidecar.metadata,
                        },
                    );
                }
                Err(error) => {
                    warn!(path = %path.display(), error = %error, "skipping unreadable cache sidecar");
                }
            }
        }

        debug!(root = %root.display(), entries = index.len(), "disk cache store opened");

        Ok(Self {
            root,
            index: Mutex::new(index),
            next_id: AtomicU64::new(max_id + 1),
        })
    }

    /// Returns the number of indexed entries.
    pub fn len(&self) -> usize {
        self.index.lock().unwrap().len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn body_path(&self, id: u64) -> PathBuf {
        self.root.join(format!("{}.body", id))
    }

    fn sidecar_path(&self, id: u64) -> PathBuf {
        self.root.join(format!("{}.entry.json", id))
    }

    fn ensure_root(&self) -> Result<(), CacheError> {
        if self.root.exists() {
            Ok(())
        } else {
            Err(CacheError::DirectoryMissing(self.root.clone()))
        }
    }

    fn classify_write_error(error: std::io::Error) -> CacheError {
        if error.raw_os_error() == Some(ENOSPC) {
            CacheError::DiskFull(error)
        } else {
            CacheError::Io(error)
        }
    }
}

impl CacheStore for DiskCacheStore {
    fn lookup(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        self.ensure_root()?;
        let index = self.index.lock().unwrap();
        Ok(index.get(key).map(|indexed| CacheEntry {
            key: key.clone(),
            metadata: indexed.metadata.clone(),
        }))
    }

    fn write(
        &self,
        key: &CacheKey,
        body: Bytes,
        metadata: EntryMetadata,
    ) -> Result<CacheEntry, CacheError> {
        self.ensure_root()?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let sidecar = Sidecar {
            key: key.clone(),
            metadata: metadata.clone(),
        };
        let encoded = serde_json::to_vec(&sidecar)?;

        fs::write(self.body_path(id), &body).map_err(Self::classify_write_error)?;
        fs::write(self.sidecar_path(id), encoded).map_err(Self::classify_write_error)?;

        let previous = {
            let mut index = self.index.lock().unwrap();
            index.insert(key.clone(), IndexEntry { id, metadata: metadata.clone() })
        };

        // Best-effort removal of the replaced entry's files.
        if let Some(old) = previous {
            let _ = fs::remove_file(self.body_path(old.id));
            let _ = fs::remove_file(self.sidecar_path(old.id));
        }

        Ok(CacheEntry {
            key: key.clone(),
            metadata,
        })
    }

    fn open(&self, entry: &CacheEntry) -> Result<Bytes, CacheError> {
        self.ensure_root()?;
        let id = {
            let index = self.index.lock().unwrap();
            match index.get(&entry.key) {
                Some(indexed) => indexed.id,
                None => return Err(CacheError::EntryMissing),
            }
        };

        match fs::read(self.body_path(id)) {
            Ok(raw) => Ok(Bytes::from(raw)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                // Body vanished behind our back; drop the stale index entry.
                self.index.lock().unwrap().remove(&entry.key);
                Err(CacheError::EntryMissing)
            }
            Err(error) => Err(error.into()),
        }
    }
}

impl std::fmt::Debug for DiskCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskCacheStore")
            .field("root", &self.root)
            .field("entries", &self.len())
            .finish()
    }
}

/// Default store location under the platform cache directory.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fetchlane")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequesterId;
    use chrono::Utc;

    fn key(s: &str) -> CacheKey {
        CacheKey::new(url::Url::parse(s).unwrap(), RequesterId::anonymous())
    }

    fn metadata() -> EntryMetadata {
        EntryMetadata {
            timestamp: Utc::now(),
            session: uuid::Uuid::new_v4(),
            mime_type: Some("application/octet-stream".into()),
        }
    }

    #[test]
    fn test_write_lookup_open_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskCacheStore::new(dir.path().to_path_buf()).unwrap();
        let k = key("https://example.com/tile/1");

        store
            .write(&k, Bytes::from_static(b"body bytes"), metadata())
            .unwrap();

        let entry = store.lookup(&k).unwrap().expect("entry should exist");
        assert_eq!(store.open(&entry).unwrap(), Bytes::from_static(b"body bytes"));
    }

    #[test]
    fn test_lookup_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskCacheStore::new(dir.path().to_path_buf()).unwrap();

        assert!(store.lookup(&key("https://example.com/missing")).unwrap().is_none());
    }

    #[test]
    fn test_index_rebuilt_on_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let k = key("https://example.com/persist");

        {
            let store = DiskCacheStore::new(dir.path().to_path_buf()).unwrap();
            store
                .write(&k, Bytes::from_static(b"persisted"), metadata())
                .unwrap();
        }

        let reopened = DiskCacheStore::new(dir.path().to_path_buf()).unwrap();
        assert_eq!(reopened.len(), 1);
        let entry = reopened.lookup(&k).unwrap().expect("entry should survive reopen");
        assert_eq!(reopened.open(&entry).unwrap(), Bytes::from_static(b"persisted"));
    }

    #[test]
    fn test_write_replaces_and_removes_old_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskCacheStore::new(dir.path().to_path_buf()).unwrap();
        let k = key("https://example.com/replace");

        store
            .write(&k, Bytes::from_static(b"one"), metadata())
            .unwrap();
        store
            .write(&k, Bytes::from_static(b"two"), metadata())
            .unwrap();

        assert_eq!(store.len(), 1);
        let entry = store.lookup(&k).unwrap().unwrap();
        assert_eq!(store.open(&entry).unwrap(), Bytes::from_static(b"two"));

        // Only one body/sidecar pair should remain on disk.
        let files = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(files, 2);
    }

    #[test]
    fn test_missing_directory_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskCacheStore::new(dir.path().join("cache")).unwrap();
        let k = key("https://example.com/x");

        fs::remove_dir_all(dir.path().join("cache")).unwrap();

        assert!(matches!(
            store.write(&k, Bytes::from_static(b"x"), metadata()),
            Err(CacheError::DirectoryMissing(_))
        ));
        assert!(matches!(
            store.lookup(&k),
            Err(CacheError::DirectoryMissing(_))
        ));
    }

    #[test]
    fn test_unreadable_sidecar_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("7.entry.json"), b"not json").unwrap();

        let store = DiskCacheStore::new(dir.path().to_path_buf()).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_open_after_body_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskCacheStore::new(dir.path().to_path_buf()).unwrap();
        let k = key("https://example.com/gone");

        let entry = store
            .write(&k, Bytes::from_static(b"x"), metadata())
            .unwrap();

        // Delete the body file out from under the index.
        let body = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .find(|p| p.extension().map(|e| e == "body").unwrap_or(false))
            .unwrap();
        fs::remove_file(body).unwrap();

        assert!(matches!(store.open(&entry), Err(CacheError::EntryMissing)));
        // Stale index entry dropped, so the next lookup misses.
        assert!(store.lookup(&k).unwrap().is_none());
    }
}
