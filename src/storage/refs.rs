//! HEAD pointer management.
//!
//! The store has exactly one ref: `HEAD`, a text value holding either the
//! digest of the most recent commit or nothing at all (no commits yet).

use tracing::debug;

use crate::storage::backend::{ObjectBackend, HEAD_KEY};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::CommitId;

/// Manages the HEAD pointer.
pub struct HeadRef;

impl HeadRef {
    /// Create an empty HEAD unless one already exists.
    ///
    /// Returns `true` if a new HEAD was written.
    pub(crate) fn initialize(backend: &dyn ObjectBackend) -> StorageResult<bool> {
        backend.create_new(HEAD_KEY, b"")
    }

    /// Read the current head commit, `None` if nothing was ever committed.
    pub fn read(backend: &dyn ObjectBackend) -> StorageResult<Option<CommitId>> {
        let bytes = backend
            .read(HEAD_KEY)?
            .ok_or_else(|| StorageError::NotInitialized(backend.locate(HEAD_KEY)))?;

        let text = std::str::from_utf8(&bytes)
            .map_err(|e| StorageError::corrupted(backend.locate(HEAD_KEY), e.to_string()))?;

        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }

        CommitId::from_hex(text)
            .map(Some)
            .map_err(|e| StorageError::corrupted(backend.locate(HEAD_KEY), e.to_string()))
    }

    /// Point HEAD at a commit.
    ///
    /// This is a force update - use `update_if_unchanged` when the caller
    /// read HEAD earlier and acts on that value.
    pub fn update(backend: &dyn ObjectBackend, target: &CommitId) -> StorageResult<()> {
        backend.write(HEAD_KEY, target.as_str().as_bytes())?;
        debug!(head = %target.short(), "HEAD updated");
        Ok(())
    }

    /// Point HEAD at a commit only if it still holds `expected`.
    ///
    /// Catches another process committing between our read and our write.
    /// This narrows the window but is not a lock.
    pub fn update_if_unchanged(
        backend: &dyn ObjectBackend,
        expected: Option<&CommitId>,
        target: &CommitId,
    ) -> StorageResult<()> {
        let current = Self::read(backend)?;

        if current.as_ref() != expected {
            return Err(StorageError::ConcurrentModification {
                expected: expected.cloned(),
                found: current,
            });
        }

        Self::update(backend, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::backend::MemoryBackend;

    fn commit_id(hex_char: char) -> CommitId {
        CommitId::from_hex(&hex_char.to_string().repeat(40)).unwrap()
    }

    #[test]
    fn test_empty_head() {
        let backend = MemoryBackend::new();
        assert!(matches!(HeadRef::read(&backend), Err(StorageError::NotInitialized(_))));

        assert!(HeadRef::initialize(&backend).unwrap());
        assert_eq!(HeadRef::read(&backend).unwrap(), None);
    }

    #[test]
    fn test_update_and_read() {
        let backend = MemoryBackend::new();
        HeadRef::initialize(&backend).unwrap();

        HeadRef::update(&backend, &commit_id('a')).unwrap();
        assert_eq!(HeadRef::read(&backend).unwrap(), Some(commit_id('a')));

        // re-initializing must not reset the pointer
        assert!(!HeadRef::initialize(&backend).unwrap());
        assert_eq!(HeadRef::read(&backend).unwrap(), Some(commit_id('a')));
    }

    #[test]
    fn test_trailing_newline_is_tolerated() {
        let backend = MemoryBackend::new();
        let hex = format!("{}\n", "b".repeat(40));
        backend.write(HEAD_KEY, hex.as_bytes()).unwrap();
        assert_eq!(HeadRef::read(&backend).unwrap(), Some(commit_id('b')));
    }

    #[test]
    fn test_garbage_head_is_corruption() {
        let backend = MemoryBackend::new();
        backend.write(HEAD_KEY, b"ref: refs/heads/main").unwrap();
        assert!(matches!(
            HeadRef::read(&backend),
            Err(StorageError::CorruptedData { .. })
        ));
    }

    #[test]
    fn test_update_if_unchanged() {
        let backend = MemoryBackend::new();
        HeadRef::initialize(&backend).unwrap();

        HeadRef::update_if_unchanged(&backend, None, &commit_id('a')).unwrap();
        HeadRef::update_if_unchanged(&backend, Some(&commit_id('a')), &commit_id('b')).unwrap();

        // stale expectation
        let result = HeadRef::update_if_unchanged(&backend, Some(&commit_id('a')), &commit_id('c'));
        assert!(matches!(result, Err(StorageError::ConcurrentModification { .. })));
        assert_eq!(HeadRef::read(&backend).unwrap(), Some(commit_id('b')));
    }
}
