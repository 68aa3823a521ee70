//!  Commit records and history traversal
//!
//!  A commit binds the staged file list to a message, a timestamp and the
//!  previous head. It is stored as compact JSON under the digest of that
//!  JSON, so its address is derived from everything it contains:
//!
//! ```text
//! {"timeStamp":"2024-01-31T12:00:00.000Z","message":"...","files":[{"path":"a.txt","hash":"..."}],"parent":null}
//! ```
//!
//! this module handles commit serialization, storage and history walking

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::storage::backend::{commit_key, ObjectBackend};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::hash::hash_bytes;
use crate::storage::index::StagingEntry;
use crate::storage::types::CommitId;

/// an immutable commit record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Commit {
    #[serde(rename = "timeStamp", with = "iso_millis")]
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub files: Vec<StagingEntry>,
    pub parent: Option<CommitId>,
}

impl Commit {
    /// check if this is the first commit in history
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// get a short summary of the commit (first line of message)
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or(&self.message)
    }

    /// the first entry recorded for `path`
    ///
    /// a commit may list the same path more than once; lookups always
    /// resolve to the earliest entry
    pub fn file(&self, path: &str) -> Option<&StagingEntry> {
        self.files.iter().find(|entry| entry.path == path)
    }

    /// timestamp in the stored ISO-8601 form
    pub fn timestamp_iso(&self) -> String {
        iso_millis::format(&self.timestamp)
    }
}

/// `timeStamp` is always written with millisecond precision and a `Z` suffix
mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(ts: &DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

/// builder for creating commits with a fluent interface
#[derive(Debug, Default)]
pub struct CommitBuilder {
    message: String,
    files: Vec<StagingEntry>,
    parent: Option<CommitId>,
    timestamp: Option<DateTime<Utc>>,
}

impl CommitBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// set the commit message
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// set the file list
    pub fn files(mut self, files: Vec<StagingEntry>) -> Self {
        self.files = files;
        self
    }

    /// set the parent commit (`None` for the first commit)
    pub fn parent(mut self, parent: Option<CommitId>) -> Self {
        self.parent = parent;
        self
    }

    /// override the timestamp (defaults to now)
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn build(self) -> Commit {
        // truncated so the stored form round-trips exactly
        let timestamp = self.timestamp.unwrap_or_else(Utc::now).trunc_subsecs(3);
        Commit {
            timestamp,
            message: self.message,
            files: self.files,
            parent: self.parent,
        }
    }
}

/// serialize a commit to the bytes its digest is computed from
pub fn serialize_commit(commit: &Commit) -> StorageResult<Vec<u8>> {
    Ok(serde_json::to_vec(commit)?)
}

/// write a commit record to the store and return its ID
pub fn write_commit(backend: &dyn ObjectBackend, commit: &Commit) -> StorageResult<CommitId> {
    let bytes = serialize_commit(commit)?;
    let id = CommitId::new(hash_bytes(&bytes));
    backend.create_new(&commit_key(id.object_id()), &bytes)?;
    debug!(commit = %id.short(), files = commit.files.len(), "put commit");
    Ok(id)
}

/// read a commit record, verifying its bytes against the address
pub fn read_commit(backend: &dyn ObjectBackend, id: &CommitId) -> StorageResult<Commit> {
    let key = commit_key(id.object_id());
    let bytes = backend
        .read(&key)?
        .ok_or_else(|| StorageError::CommitNotFound(id.clone()))?;

    let actual = hash_bytes(&bytes);
    if actual != *id.object_id() {
        return Err(StorageError::corrupted(
            backend.locate(&key),
            format!("record hashes to {}", actual),
        ));
    }

    Ok(serde_json::from_slice(&bytes)?)
}

/// check whether a commit record exists without reading it
pub fn commit_exists(backend: &dyn ObjectBackend, id: &CommitId) -> StorageResult<bool> {
    backend.exists(&commit_key(id.object_id()))
}

/// iterate over commit history, newest first
///
/// The walk is lazy: each step reads one commit and follows its parent,
/// holding only the next digest. Every record is checked against its
/// digest on read, so a parent chain cannot loop back on itself; a
/// tampered record yields `CorruptedData` and the walk stops.
pub struct History<'a> {
    backend: &'a dyn ObjectBackend,
    next: Option<CommitId>,
    remaining: Option<usize>,
    done: bool,
}

impl<'a> History<'a> {
    /// walk backward from `start` (`None` yields nothing)
    pub fn new(backend: &'a dyn ObjectBackend, start: Option<CommitId>) -> Self {
        Self {
            backend,
            next: start,
            remaining: None,
            done: false,
        }
    }

    /// stop after at most `depth` commits
    pub fn max_depth(mut self, depth: Option<usize>) -> Self {
        self.remaining = depth;
        self
    }
}

impl<'a> Iterator for History<'a> {
    type Item = StorageResult<(CommitId, Commit)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                self.done = true;
                return None;
            }
            *remaining -= 1;
        }

        let id = self.next.take()?;

        match read_commit(self.backend, &id) {
            Ok(commit) => {
                self.next = commit.parent.clone();
                Some(Ok((id, commit)))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::backend::MemoryBackend;
    use crate::storage::blob::write_blob;
    use chrono::TimeZone;

    fn entry(backend: &MemoryBackend, path: &str, content: &str) -> StagingEntry {
        StagingEntry::new(path, write_blob(backend, content.as_bytes()).unwrap())
    }

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 31, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_serialization_format() {
        let backend = MemoryBackend::new();
        let commit = CommitBuilder::new()
            .message("first")
            .files(vec![entry(&backend, "a.txt", "x\n")])
            .timestamp(fixed_time())
            .build();

        let json = String::from_utf8(serialize_commit(&commit).unwrap()).unwrap();
        assert!(json.starts_with("{\"timeStamp\":\"2024-01-31T12:00:00.000Z\",\"message\":\"first\",\"files\":[{\"path\":\"a.txt\",\"hash\":\""));
        assert!(json.ends_with("\"}],\"parent\":null}"));
    }

    #[test]
    fn test_write_and_read() {
        let backend = MemoryBackend::new();
        let commit = CommitBuilder::new()
            .message("first")
            .files(vec![entry(&backend, "a.txt", "x\n")])
            .build();

        let id = write_commit(&backend, &commit).unwrap();
        assert!(commit_exists(&backend, &id).unwrap());

        // repeated reads give the same record
        let first = read_commit(&backend, &id).unwrap();
        let second = read_commit(&backend, &id).unwrap();
        assert_eq!(first, commit);
        assert_eq!(first, second);
        assert!(first.is_root());
    }

    #[test]
    fn test_missing_commit() {
        let backend = MemoryBackend::new();
        let id = CommitId::from_hex(&"c".repeat(40)).unwrap();
        assert!(matches!(read_commit(&backend, &id), Err(StorageError::CommitNotFound(_))));
    }

    #[test]
    fn test_malformed_commit_record() {
        let backend = MemoryBackend::new();
        let bytes = br#"{"timeStamp":"yesterday","message":"m","files":[],"parent":null}"#;
        let id = CommitId::new(hash_bytes(bytes));
        backend.write(&commit_key(id.object_id()), bytes).unwrap();

        assert!(matches!(read_commit(&backend, &id), Err(StorageError::Serialization(_))));
    }

    #[test]
    fn test_first_match_lookup() {
        let backend = MemoryBackend::new();
        let commit = CommitBuilder::new()
            .message("dupes")
            .files(vec![
                entry(&backend, "a.txt", "one"),
                entry(&backend, "a.txt", "two"),
            ])
            .build();

        let found = commit.file("a.txt").unwrap();
        assert_eq!(found.hash, commit.files[0].hash);
        assert!(commit.file("missing.txt").is_none());
    }

    #[test]
    fn test_history_iteration() {
        let backend = MemoryBackend::new();
        let mut parent = None;
        let mut ids = Vec::new();

        for message in ["First", "Second", "Third"] {
            let commit = CommitBuilder::new()
                .message(message)
                .files(vec![entry(&backend, "a.txt", message)])
                .parent(parent.clone())
                .build();
            let id = write_commit(&backend, &commit).unwrap();
            ids.push(id.clone());
            parent = Some(id);
        }

        let commits: Vec<_> = History::new(&backend, parent.clone())
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(commits.len(), 3);
        assert_eq!(commits[0].0, ids[2]);
        assert_eq!(commits[1].0, ids[1]);
        assert_eq!(commits[2].0, ids[0]);
        assert_eq!(commits[0].1.summary(), "Third");
        assert!(commits[2].1.is_root());

        let limited: Vec<_> = History::new(&backend, parent)
            .max_depth(Some(2))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn test_history_from_empty_head() {
        let backend = MemoryBackend::new();
        assert_eq!(History::new(&backend, None).count(), 0);
    }

    #[test]
    fn test_history_stops_at_missing_parent() {
        let backend = MemoryBackend::new();
        let dangling = CommitId::from_hex(&"d".repeat(40)).unwrap();
        let commit = CommitBuilder::new()
            .message("orphaned")
            .parent(Some(dangling))
            .build();
        let id = write_commit(&backend, &commit).unwrap();

        let mut history = History::new(&backend, Some(id));
        assert!(history.next().unwrap().is_ok());
        assert!(matches!(history.next(), Some(Err(StorageError::CommitNotFound(_)))));
        assert!(history.next().is_none());
    }

    #[test]
    fn test_history_stops_on_tampered_record() {
        let backend = MemoryBackend::new();
        let root = CommitBuilder::new().message("root").build();
        let root_id = write_commit(&backend, &root).unwrap();
        let child = CommitBuilder::new()
            .message("child")
            .parent(Some(root_id.clone()))
            .build();
        let child_id = write_commit(&backend, &child).unwrap();

        // make the root record point back at its child
        let tampered = Commit {
            parent: Some(child_id.clone()),
            ..root
        };
        let bytes = serialize_commit(&tampered).unwrap();
        backend.write(&commit_key(root_id.object_id()), &bytes).unwrap();

        let results: Vec<_> = History::new(&backend, Some(child_id)).collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(StorageError::CorruptedData { .. })));
    }
}
