//! Blob operations for file snapshots.
//!
//! A blob is the raw bytes of a staged file, stored under the digest of
//! those bytes. Identical content is stored once.

use tracing::debug;

use crate::storage::backend::{blob_key, ObjectBackend};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::hash::hash_bytes;
use crate::storage::types::BlobId;

/// immutable snapshot content together with its address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    id: BlobId,
    content: Vec<u8>,
}

impl Blob {
    /// wrap content, computing its digest
    pub fn new(content: impl Into<Vec<u8>>) -> Self {
        let content = content.into();
        let id = BlobId::new(hash_bytes(&content));
        Self { id, content }
    }

    pub fn id(&self) -> &BlobId {
        &self.id
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn into_content(self) -> Vec<u8> {
        self.content
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// content as text, for diffing
    pub fn as_text(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.content)
    }
}

/// write a blob to the store
///
/// returns the blob ID; writing content that is already present is a no-op
pub fn write_blob(backend: &dyn ObjectBackend, content: &[u8]) -> StorageResult<BlobId> {
    let blob = Blob::new(content);
    let created = backend.create_new(&blob_key(blob.id().object_id()), blob.content())?;
    debug!(blob = %blob.id(), len = blob.len(), created, "put blob");
    Ok(blob.id)
}

/// read a blob from the store, verifying its content against the address
pub fn read_blob(backend: &dyn ObjectBackend, id: &BlobId) -> StorageResult<Blob> {
    let key = blob_key(id.object_id());
    let content = backend
        .read(&key)?
        .ok_or_else(|| StorageError::BlobNotFound(id.clone()))?;

    let blob = Blob::new(content);
    if blob.id() != id {
        return Err(StorageError::corrupted(
            backend.locate(&key),
            format!("content hashes to {}", blob.id()),
        ));
    }

    Ok(blob)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::backend::{FsBackend, MemoryBackend};
    use tempfile::TempDir;

    #[test]
    fn test_blob_identity_is_content() {
        let a = Blob::new(b"same".to_vec());
        let b = Blob::new("same");
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), Blob::new("other").id());
    }

    #[test]
    fn test_write_twice_stores_once() {
        let dir = TempDir::new().unwrap();
        let backend = FsBackend::new(dir.path());
        backend.prepare().unwrap();

        let first = write_blob(&backend, b"x\ny\n").unwrap();
        let second = write_blob(&backend, b"x\ny\n").unwrap();
        assert_eq!(first, second);

        let (prefix, _) = first.object_id().shard();
        let shard_dir = dir.path().join("objects").join(prefix);
        assert_eq!(std::fs::read_dir(shard_dir).unwrap().count(), 1);
        assert_eq!(read_blob(&backend, &first).unwrap().content(), b"x\ny\n");
    }

    #[test]
    fn test_missing_blob() {
        let backend = MemoryBackend::new();
        let id = Blob::new("never written").id().clone();
        let result = read_blob(&backend, &id);
        assert!(matches!(result, Err(StorageError::BlobNotFound(ref missing)) if *missing == id));
    }

    #[test]
    fn test_tampered_blob_is_detected() {
        let backend = MemoryBackend::new();
        let id = write_blob(&backend, b"original").unwrap();
        backend.write(&blob_key(id.object_id()), b"tampered").unwrap();

        let result = read_blob(&backend, &id);
        assert!(matches!(result, Err(StorageError::CorruptedData { .. })));
    }
}
