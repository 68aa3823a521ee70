//! Commit diff presentation.
//!
//! For every file a commit records, compare its content with the entry for
//! the same path in the parent commit. The line diff itself comes from
//! `similar`; this module only decides what to compare and packages the
//! result as tagged segments.

use similar::{ChangeTag, TextDiff};
use tracing::warn;

use crate::storage::backend::ObjectBackend;
use crate::storage::blob::read_blob;
use crate::storage::commit::{read_commit, Commit};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::index::StagingEntry;
use crate::storage::types::CommitId;

/// classification of a diff segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Unchanged,
    Added,
    Removed,
}

/// a run of consecutive lines with the same classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffSegment {
    pub kind: SegmentKind,
    pub value: String,
}

impl DiffSegment {
    pub fn new(kind: SegmentKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    pub fn is_added(&self) -> bool {
        self.kind == SegmentKind::Added
    }

    pub fn is_removed(&self) -> bool {
        self.kind == SegmentKind::Removed
    }

    /// number of lines in this segment
    pub fn line_count(&self) -> usize {
        self.value.split_inclusive('\n').count()
    }
}

/// line-level diff of two text bodies
///
/// Concatenating the non-added segments gives `before` back, and the
/// non-removed segments give `after`.
pub fn diff_lines(before: &str, after: &str) -> Vec<DiffSegment> {
    let diff = TextDiff::from_lines(before, after);
    let mut segments: Vec<DiffSegment> = Vec::new();

    for change in diff.iter_all_changes() {
        let kind = match change.tag() {
            ChangeTag::Equal => SegmentKind::Unchanged,
            ChangeTag::Delete => SegmentKind::Removed,
            ChangeTag::Insert => SegmentKind::Added,
        };

        match segments.last_mut() {
            Some(last) if last.kind == kind => last.value.push_str(change.value()),
            _ => segments.push(DiffSegment::new(kind, change.value())),
        }
    }

    segments
}

/// added/removed line counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffStats {
    pub added: usize,
    pub removed: usize,
}

impl DiffStats {
    pub fn from_segments(segments: &[DiffSegment]) -> Self {
        segments.iter().fold(Self::default(), |mut stats, segment| {
            if segment.is_added() {
                stats.added += segment.line_count();
            } else if segment.is_removed() {
                stats.removed += segment.line_count();
            }
            stats
        })
    }

    pub fn is_unchanged(&self) -> bool {
        self.added == 0 && self.removed == 0
    }
}

/// what could be said about one file of a commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    /// the parent has the same path; here is how it changed
    Changed(Vec<DiffSegment>),
    /// the parent does not have this path
    NewFile,
    /// the commit has no parent, nothing to compare against
    FirstCommit,
    /// this file's content (or its parent version) could not be read
    Unreadable(String),
}

/// one file of a commit diff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    pub entry: StagingEntry,
    /// current content, when it could be read as text
    pub content: Option<String>,
    pub status: FileStatus,
}

impl FileDiff {
    pub fn path(&self) -> &str {
        &self.entry.path
    }

    pub fn stats(&self) -> DiffStats {
        match &self.status {
            FileStatus::Changed(segments) => DiffStats::from_segments(segments),
            _ => DiffStats::default(),
        }
    }
}

/// a commit together with the per-file comparison against its parent
#[derive(Debug, Clone)]
pub struct CommitDiff {
    pub id: CommitId,
    pub commit: Commit,
    pub files: Vec<FileDiff>,
}

/// compare every file of a commit with its parent's version
///
/// A missing commit or parent commit is an error for the whole operation.
/// A file whose content can't be read is reported as `Unreadable` and the
/// remaining files are still compared.
pub fn diff_commit(backend: &dyn ObjectBackend, id: &CommitId) -> StorageResult<CommitDiff> {
    let commit = read_commit(backend, id)?;

    let parent = match &commit.parent {
        Some(parent_id) => Some(read_commit(backend, parent_id)?),
        None => None,
    };

    let files = commit
        .files
        .iter()
        .map(|entry| diff_file(backend, entry, parent.as_ref()))
        .collect();

    Ok(CommitDiff {
        id: id.clone(),
        commit,
        files,
    })
}

fn diff_file(backend: &dyn ObjectBackend, entry: &StagingEntry, parent: Option<&Commit>) -> FileDiff {
    let content = match read_text(backend, entry) {
        Ok(text) => text,
        Err(e) => {
            warn!(path = %entry.path, error = %e, "cannot read file content");
            return FileDiff {
                entry: entry.clone(),
                content: None,
                status: FileStatus::Unreadable(e.to_string()),
            };
        }
    };

    let status = match parent {
        None => FileStatus::FirstCommit,
        Some(parent) => match parent.file(&entry.path) {
            None => FileStatus::NewFile,
            Some(before) => match read_text(backend, before) {
                Ok(before) => FileStatus::Changed(diff_lines(&before, &content)),
                Err(e) => {
                    warn!(path = %entry.path, error = %e, "cannot read parent version");
                    FileStatus::Unreadable(e.to_string())
                }
            },
        },
    };

    FileDiff {
        entry: entry.clone(),
        content: Some(content),
        status,
    }
}

fn read_text(backend: &dyn ObjectBackend, entry: &StagingEntry) -> StorageResult<String> {
    let blob = read_blob(backend, &entry.hash)?;
    blob.as_text().map(str::to_owned).map_err(|e| {
        StorageError::corrupted(&entry.path, format!("not valid UTF-8 text: {}", e))
    })
}
