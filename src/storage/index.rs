//! The staging index.
//!
//! An ordered list of `{path, hash}` entries that will make up the next
//! commit. It is persisted after every change so state survives between
//! process invocations.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::storage::backend::{ObjectBackend, INDEX_KEY};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::BlobId;

/// one staged file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StagingEntry {
    pub path: String,
    pub hash: BlobId,
}

impl StagingEntry {
    pub fn new(path: impl Into<String>, hash: BlobId) -> Self {
        Self {
            path: path.into(),
            hash,
        }
    }
}

/// How `stage` treats a path that is already in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StageMode {
    /// always append a new entry, duplicates included
    #[default]
    Append,
    /// replace the existing entry for the same path, keeping its position
    ReplacePath,
}

/// View of the persisted staging index.
pub struct StagingIndex<'a> {
    backend: &'a dyn ObjectBackend,
    mode: StageMode,
}

impl<'a> StagingIndex<'a> {
    pub fn new(backend: &'a dyn ObjectBackend, mode: StageMode) -> Self {
        Self { backend, mode }
    }

    /// create an empty index unless one already exists
    ///
    /// returns `true` if a new index was written
    pub(crate) fn initialize(&self) -> StorageResult<bool> {
        self.backend.create_new(INDEX_KEY, b"[]")
    }

    /// read every staged entry, in staging order
    pub fn read_all(&self) -> StorageResult<Vec<StagingEntry>> {
        let bytes = self
            .backend
            .read(INDEX_KEY)?
            .ok_or_else(|| StorageError::NotInitialized(self.backend.locate(INDEX_KEY)))?;

        let entries: Vec<StagingEntry> = serde_json::from_slice(&bytes)?;
        Ok(entries)
    }

    /// add an entry and persist the index
    pub fn stage(&self, path: impl Into<String>, hash: BlobId) -> StorageResult<()> {
        let entry = StagingEntry::new(path, hash);
        let mut entries = self.read_all()?;

        let existing = match self.mode {
            StageMode::Append => None,
            StageMode::ReplacePath => entries.iter().position(|e| e.path == entry.path),
        };

        match existing {
            Some(i) => entries[i] = entry,
            None => entries.push(entry),
        }

        self.write_all(&entries)?;
        debug!(staged = entries.len(), "index updated");
        Ok(())
    }

    /// empty the index
    pub fn clear(&self) -> StorageResult<()> {
        self.backend.write(INDEX_KEY, b"[]")
    }

    pub fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.read_all()?.is_empty())
    }

    fn write_all(&self, entries: &[StagingEntry]) -> StorageResult<()> {
        let bytes = serde_json::to_vec_pretty(entries)?;
        self.backend.write(INDEX_KEY, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::backend::MemoryBackend;
    use crate::storage::blob::Blob;

    fn blob_id(content: &str) -> BlobId {
        Blob::new(content).id().clone()
    }

    #[test]
    fn test_stage_round_trip() {
        let backend = MemoryBackend::new();
        let index = StagingIndex::new(&backend, StageMode::Append);
        assert!(index.initialize().unwrap());
        assert!(index.is_empty().unwrap());

        index.stage("a.txt", blob_id("a")).unwrap();
        index.stage("b.txt", blob_id("b")).unwrap();

        let entries = index.read_all().unwrap();
        assert_eq!(
            entries,
            vec![
                StagingEntry::new("a.txt", blob_id("a")),
                StagingEntry::new("b.txt", blob_id("b")),
            ]
        );

        index.clear().unwrap();
        assert!(index.read_all().unwrap().is_empty());
        assert_eq!(backend.read(INDEX_KEY).unwrap(), Some(b"[]".to_vec()));
    }

    #[test]
    fn test_append_keeps_duplicate_paths() {
        let backend = MemoryBackend::new();
        let index = StagingIndex::new(&backend, StageMode::Append);
        index.initialize().unwrap();

        index.stage("a.txt", blob_id("v1")).unwrap();
        index.stage("a.txt", blob_id("v2")).unwrap();

        let entries = index.read_all().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].hash, blob_id("v1"));
        assert_eq!(entries[1].hash, blob_id("v2"));
    }

    #[test]
    fn test_replace_path_keeps_position() {
        let backend = MemoryBackend::new();
        let index = StagingIndex::new(&backend, StageMode::ReplacePath);
        index.initialize().unwrap();

        index.stage("a.txt", blob_id("v1")).unwrap();
        index.stage("b.txt", blob_id("b")).unwrap();
        index.stage("a.txt", blob_id("v2")).unwrap();

        let entries = index.read_all().unwrap();
        assert_eq!(
            entries,
            vec![
                StagingEntry::new("a.txt", blob_id("v2")),
                StagingEntry::new("b.txt", blob_id("b")),
            ]
        );
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let backend = MemoryBackend::new();
        let index = StagingIndex::new(&backend, StageMode::Append);
        index.initialize().unwrap();
        index.stage("a.txt", blob_id("a")).unwrap();

        assert!(!index.initialize().unwrap());
        assert_eq!(index.read_all().unwrap().len(), 1);
    }

    #[test]
    fn test_missing_and_malformed_index() {
        let backend = MemoryBackend::new();
        let index = StagingIndex::new(&backend, StageMode::Append);
        assert!(matches!(index.read_all(), Err(StorageError::NotInitialized(_))));

        backend.write(INDEX_KEY, b"{\"path\": 1}").unwrap();
        assert!(matches!(index.read_all(), Err(StorageError::Serialization(_))));

        backend
            .write(INDEX_KEY, b"[{\"path\": \"a\", \"hash\": \"zz\"}]")
            .unwrap();
        assert!(matches!(index.read_all(), Err(StorageError::Serialization(_))));
    }
}
