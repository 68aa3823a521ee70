//! Byte-level storage backends.
//!
//! Everything the store persists (objects, HEAD, the staging index) is a
//! value under a slash-separated key relative to the store root:
//!
//! ```text
//! HEAD
//! index
//! objects/<2 hex>/<38 hex>    blobs
//! objects/<40 hex>            commits
//! ```
//!
//! [`FsBackend`] maps keys to files under a directory, [`MemoryBackend`] keeps
//! them in a map. The higher layers never touch `std::fs` directly.

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::storage::error::StorageResult;
use crate::storage::types::ObjectId;

/// mode for stored files before the process umask is applied
#[cfg(unix)]
const FILE_MODE: u32 = 0o666;

pub(crate) const HEAD_KEY: &str = "HEAD";
pub(crate) const INDEX_KEY: &str = "index";
pub(crate) const OBJECTS_DIR: &str = "objects";

/// key of a blob: sharded into a two-character prefix directory
pub(crate) fn blob_key(id: &ObjectId) -> String {
    let (prefix, rest) = id.shard();
    format!("{}/{}/{}", OBJECTS_DIR, prefix, rest)
}

/// key of a commit record: stored unsharded
pub(crate) fn commit_key(id: &ObjectId) -> String {
    format!("{}/{}", OBJECTS_DIR, id)
}

/// A place to keep bytes under string keys.
pub trait ObjectBackend: Send + Sync {
    /// create whatever structure the backend needs before first use
    fn prepare(&self) -> StorageResult<()>;

    /// read the value stored under `key`, `None` if there is none
    fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// store `bytes` under `key`, replacing any previous value
    fn write(&self, key: &str, bytes: &[u8]) -> StorageResult<()>;

    /// store `bytes` under `key` only if the key is free
    ///
    /// returns `false` (and writes nothing) when the key already exists
    fn create_new(&self, key: &str, bytes: &[u8]) -> StorageResult<bool>;

    /// check whether `key` holds a value
    fn exists(&self, key: &str) -> StorageResult<bool>;

    /// human-readable location of `key`, used in error messages
    fn locate(&self, key: &str) -> PathBuf;
}

/// Filesystem backend rooted at a directory.
///
/// Writes go to a temporary file next to the target and are renamed into
/// place, so a reader sees either the old value or the new one.
#[derive(Debug, Clone)]
pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, key: &str) -> PathBuf {
        key.split('/').fold(self.root.clone(), |path, part| path.join(part))
    }

    fn temp_file_for(&self, path: &Path) -> StorageResult<NamedTempFile> {
        let dir = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir)?;

        let mut builder = tempfile::Builder::new();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(fs::Permissions::from_mode(FILE_MODE));
        }
        Ok(builder.tempfile_in(dir)?)
    }
}

impl ObjectBackend for FsBackend {
    fn prepare(&self) -> StorageResult<()> {
        fs::create_dir_all(self.root.join(OBJECTS_DIR))?;
        Ok(())
    }

    fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        match fs::read(self.path_of(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, bytes: &[u8]) -> StorageResult<()> {
        let path = self.path_of(key);
        let mut tmp = self.temp_file_for(&path)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        debug!(key, len = bytes.len(), "wrote");
        Ok(())
    }

    fn create_new(&self, key: &str, bytes: &[u8]) -> StorageResult<bool> {
        let path = self.path_of(key);
        if path.try_exists()? {
            return Ok(false);
        }

        let mut tmp = self.temp_file_for(&path)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;

        // another writer may have won the race since the check above
        match tmp.persist_noclobber(&path) {
            Ok(_) => {
                debug!(key, len = bytes.len(), "created");
                Ok(true)
            }
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.error.into()),
        }
    }

    fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.path_of(key).try_exists()?)
    }

    fn locate(&self, key: &str) -> PathBuf {
        self.path_of(key)
    }
}

/// In-memory backend, mostly for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// all keys currently stored, in order
    pub fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }
}

impl ObjectBackend for MemoryBackend {
    fn prepare(&self) -> StorageResult<()> {
        Ok(())
    }

    fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn write(&self, key: &str, bytes: &[u8]) -> StorageResult<()> {
        self.entries.write().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn create_new(&self, key: &str, bytes: &[u8]) -> StorageResult<bool> {
        let mut entries = self.entries.write();
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), bytes.to_vec());
        Ok(true)
    }

    fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.entries.read().contains_key(key))
    }

    fn locate(&self, key: &str) -> PathBuf {
        PathBuf::from(format!("memory:{}", key))
    }
}
