//! The local key-value store.
//!
//! One file per key under the platform config directory. Values are opaque
//! strings; each owning component decides its own format. Writes are
//! atomic (temp file + rename) so a crash never leaves a half-written
//! value behind.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use directories::ProjectDirs;
use tracing::{debug, warn};

use crate::error::{PersistenceError, Result};

const APP_QUALIFIER: &str = "com";
const APP_ORG: &str = "cientify";
const APP_NAME: &str = "Cientify";

/// Client-local persistent key-value store.
///
/// Cheap to clone; all clones share the same state. Each key is read from
/// disk at most once per process lifetime and cached in memory thereafter.
/// When no storage directory is available the store keeps working in
/// memory only.
#[derive(Clone)]
pub struct LocalStore {
    inner: Arc<Mutex<StoreInner>>,
}

struct StoreInner {
    dir: Option<PathBuf>,
    cache: BTreeMap<String, String>,
    /// Keys whose backing file has already been consulted.
    probed: BTreeSet<String>,
}

impl LocalStore {
    /// Open the store in the platform-specific config directory.
    ///
    /// Falls back to a memory-only store when the directory cannot be
    /// determined.
    pub fn open() -> Self {
        match ProjectDirs::from(APP_QUALIFIER, APP_ORG, APP_NAME) {
            Some(dirs) => Self::open_at(dirs.config_dir().join("storage")),
            None => {
                warn!("Could not determine storage directory; running memory-only");
                Self::in_memory()
            }
        }
    }

    /// Open the store backed by an explicit directory.
    pub fn open_at(dir: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreInner {
                dir: Some(dir.into()),
                cache: BTreeMap::new(),
                probed: BTreeSet::new(),
            })),
        }
    }

    /// Open a store with no disk backing.
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreInner {
                dir: None,
                cache: BTreeMap::new(),
                probed: BTreeSet::new(),
            })),
        }
    }

    /// Read a value.
    ///
    /// The key's file is consulted once on first access (lazy rehydration
    /// after a restart); afterwards the in-memory cache is authoritative.
    pub fn get(&self, key: &str) -> Option<String> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(value) = inner.cache.get(key) {
            return Some(value.clone());
        }
        if inner.probed.contains(key) {
            return None;
        }
        inner.probed.insert(key.to_string());

        let path = inner.dir.as_ref()?.join(key);
        match fs::read_to_string(&path) {
            Ok(value) => {
                debug!(key, "Rehydrated storage key from disk");
                inner.cache.insert(key.to_string(), value.clone());
                Some(value)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(key, error = %e, "Failed to read storage key");
                None
            }
        }
    }

    /// Write a value.
    ///
    /// The in-memory cache is always updated; the disk write is reported
    /// via the result so the owning component can degrade gracefully.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let dir = {
            let mut inner = self.inner.lock().unwrap();
            inner.cache.insert(key.to_string(), value.to_string());
            inner.probed.insert(key.to_string());
            inner.dir.clone()
        };
        let Some(dir) = dir else {
            return Err(PersistenceError::NoStorageDir);
        };
        write_atomic(&dir, key, value)
    }

    /// Remove a value from memory and disk.
    pub fn remove(&self, key: &str) -> Result<()> {
        let dir = {
            let mut inner = self.inner.lock().unwrap();
            inner.cache.remove(key);
            inner.probed.insert(key.to_string());
            inner.dir.clone()
        };
        let Some(dir) = dir else {
            return Err(PersistenceError::NoStorageDir);
        };
        let path = dir.join(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PersistenceError::Io {
                operation: "remove",
                path,
                source: e,
            }),
        }
    }
}

/// Write a key's value via a temp file and rename.
fn write_atomic(dir: &PathBuf, key: &str, value: &str) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| PersistenceError::Io {
        operation: "create directory",
        path: dir.clone(),
        source: e,
    })?;

    let path = dir.join(key);
    let temp_path = dir.join(format!("{key}.tmp"));

    let mut file = File::create(&temp_path).map_err(|e| PersistenceError::Io {
        operation: "create",
        path: temp_path.clone(),
        source: e,
    })?;
    file.write_all(value.as_bytes())
        .map_err(|e| PersistenceError::Io {
            operation: "write",
            path: temp_path.clone(),
            source: e,
        })?;
    file.sync_all().map_err(|e| PersistenceError::Io {
        operation: "sync",
        path: temp_path.clone(),
        source: e,
    })?;

    fs::rename(&temp_path, &path).map_err(|e| PersistenceError::AtomicWriteFailed {
        temp_path,
        target_path: path,
        source: e,
    })
}
