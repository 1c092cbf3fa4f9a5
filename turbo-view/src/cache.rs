//! Key/value cache used to memoize rendered fragments.
//!
//! The engine only needs `get`, `put` with a TTL, and invalidation. Two stores are included:
//! [`MemoryCache`], which lives as long as the process, and [`FileCache`], which keeps one
//! JSON file per key on disk and survives restarts. Applications can plug in anything else
//! (e.g. Redis) by implementing [`Cache`].
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::fs::{create_dir_all, read_dir, read_to_string, remove_file, write};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use time::{Duration, OffsetDateTime};

#[derive(Error, Debug)]
pub enum Error {
    #[error("cache io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache entry is corrupted: {0}")]
    Json(#[from] serde_json::Error),
}

/// Fragment cache store.
pub trait Cache: Send + Sync {
    /// Get an unexpired value.
    fn get(&self, key: &str) -> Result<Option<String>, Error>;

    /// Store a value for `ttl`.
    fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), Error>;

    /// Remove a value.
    fn forget(&self, key: &str) -> Result<(), Error>;

    /// Remove all values.
    fn flush(&self) -> Result<(), Error>;
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct Entry {
    value: String,
    #[serde(with = "time::serde::timestamp")]
    expires: OffsetDateTime,
}

impl Entry {
    fn new(value: &str, ttl: Duration) -> Self {
        Self {
            value: value.to_string(),
            expires: OffsetDateTime::now_utc() + ttl,
        }
    }

    fn expired(&self) -> bool {
        self.expires <= OffsetDateTime::now_utc()
    }
}

/// In-process cache.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let mut entries = self.entries.lock();

        match entries.get(key) {
            Some(entry) if entry.expired() => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), Error> {
        let mut entries = self.entries.lock();

        // Expired entries that are never read again would stay forever.
        entries.retain(|_, entry| !entry.expired());
        entries.insert(key.to_string(), Entry::new(value, ttl));

        Ok(())
    }

    fn forget(&self, key: &str) -> Result<(), Error> {
        self.entries.lock().remove(key);
        Ok(())
    }

    fn flush(&self) -> Result<(), Error> {
        self.entries.lock().clear();
        Ok(())
    }
}

/// On-disk cache, one file per key.
#[derive(Debug, Clone)]
pub struct FileCache {
    path: PathBuf,
}

impl FileCache {
    /// Extension of cache entry files.
    pub const EXTENSION: &'static str = "cache";

    /// Create a cache storing entries in `path`. The directory is created on first write.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_owned(),
        }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.path
            .join(format!("{}.{}", sha1_hex(key), Self::EXTENSION))
    }
}

impl Cache for FileCache {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let path = self.entry_path(key);

        let json = match read_to_string(&path) {
            Ok(json) => json,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let entry: Entry = serde_json::from_str(&json)?;

        if entry.expired() {
            self.forget(key)?;
            Ok(None)
        } else {
            Ok(Some(entry.value))
        }
    }

    fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), Error> {
        create_dir_all(&self.path)?;
        let json = serde_json::to_string(&Entry::new(value, ttl))?;
        write(self.entry_path(key), json)?;

        Ok(())
    }

    fn forget(&self, key: &str) -> Result<(), Error> {
        match remove_file(self.entry_path(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn flush(&self) -> Result<(), Error> {
        let entries = match read_dir(&self.path) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err.into()),
        };

        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some(Self::EXTENSION) {
                remove_file(path)?;
            }
        }

        Ok(())
    }
}

/// Hex-encoded SHA-1 of some text, used to name files on disk.
pub(crate) fn sha1_hex(text: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(text.as_bytes());

    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect()
}
