//!   The store handle.
//!
//!  This is the central component of the storage layer. It owns a backend
//!  and provides the high-level operations (stage, commit, history, show)
//!  that the CLI uses.
//!
//! All other storage modules are reached through this type.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::storage::backend::{FsBackend, MemoryBackend, ObjectBackend, HEAD_KEY, INDEX_KEY};
use crate::storage::blob::{self, Blob};
use crate::storage::commit::{self, Commit, CommitBuilder, History};
use crate::storage::config::StoreConfig;
use crate::storage::diff::{self, CommitDiff};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::index::{StagingEntry, StagingIndex};
use crate::storage::refs::HeadRef;
use crate::storage::types::{BlobId, CommitId};

/// Result of initializing a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// HEAD and index were created
    Created,
    /// both already existed and were left untouched
    AlreadyInitialized,
}

/// The main store handle.
///
/// Clone this to share it - it uses Arc internally. Mutating operations
/// are serialized within the process; other processes are not coordinated.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    backend: Box<dyn ObjectBackend>,
    config: StoreConfig,
    write_lock: Mutex<()>,
}

impl Store {
    /// Open an existing store.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        Self::open_with_config(StoreConfig::new(path.as_ref()).create_if_missing(false))
    }

    /// Initialize a store, or report that it already exists.
    pub fn init(path: impl AsRef<Path>) -> StorageResult<(Self, InitOutcome)> {
        let config = StoreConfig::new(path.as_ref());
        let backend = FsBackend::new(&config.root);
        Self::with_backend(Box::new(backend), config)
    }

    /// Open or initialize a store.
    pub fn open_or_init(path: impl AsRef<Path>) -> StorageResult<Self> {
        Self::open_with_config(StoreConfig::new(path.as_ref()))
    }

    /// Open a filesystem store with custom configuration.
    pub fn open_with_config(config: StoreConfig) -> StorageResult<Self> {
        let backend = FsBackend::new(&config.root);

        if config.create_if_missing {
            let (store, _) = Self::with_backend(Box::new(backend), config)?;
            return Ok(store);
        }

        if !backend.exists(HEAD_KEY)? || !backend.exists(INDEX_KEY)? {
            return Err(StorageError::NotInitialized(config.root.clone()));
        }

        Ok(Self::from_parts(Box::new(backend), config))
    }

    /// Create an initialized store that lives in memory.
    pub fn in_memory() -> StorageResult<Self> {
        let config = StoreConfig::new(":memory:");
        let (store, _) = Self::with_backend(Box::new(MemoryBackend::new()), config)?;
        Ok(store)
    }

    /// Initialize a store on any backend.
    ///
    /// Existing HEAD and index values are never overwritten.
    pub fn with_backend(
        backend: Box<dyn ObjectBackend>,
        config: StoreConfig,
    ) -> StorageResult<(Self, InitOutcome)> {
        backend.prepare()?;
        let head_created = HeadRef::initialize(backend.as_ref())?;
        let index_created = StagingIndex::new(backend.as_ref(), config.stage_mode).initialize()?;

        let outcome = if head_created || index_created {
            info!(root = %config.root.display(), "initialized store");
            InitOutcome::Created
        } else {
            debug!(root = %config.root.display(), "store already initialized");
            InitOutcome::AlreadyInitialized
        };

        Ok((Self::from_parts(backend, config), outcome))
    }

    fn from_parts(backend: Box<dyn ObjectBackend>, config: StoreConfig) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                backend,
                config,
                write_lock: Mutex::new(()),
            }),
        }
    }

    /// Get the store root.
    pub fn root(&self) -> &Path {
        &self.inner.config.root
    }

    fn backend(&self) -> &dyn ObjectBackend {
        self.inner.backend.as_ref()
    }

    fn index(&self) -> StagingIndex<'_> {
        StagingIndex::new(self.backend(), self.inner.config.stage_mode)
    }

    // ==================== Object Operations ====================

    /// Store content as a blob and return its ID.
    pub fn put_blob(&self, content: &[u8]) -> StorageResult<BlobId> {
        blob::write_blob(self.backend(), content)
    }

    /// Read a blob by ID.
    pub fn get_blob(&self, id: &BlobId) -> StorageResult<Blob> {
        blob::read_blob(self.backend(), id)
    }

    /// Store a commit record and return its ID.
    ///
    /// This only writes the object; HEAD and the index are not touched.
    pub fn put_commit(&self, record: &Commit) -> StorageResult<CommitId> {
        commit::write_commit(self.backend(), record)
    }

    /// Read a commit by ID.
    pub fn get_commit(&self, id: &CommitId) -> StorageResult<Commit> {
        commit::read_commit(self.backend(), id)
    }

    // ==================== Staging ====================

    /// Read a file from disk, store it as a blob and stage it under the
    /// path it was given as.
    pub fn add_file(&self, path: impl AsRef<Path>) -> StorageResult<BlobId> {
        let path = path.as_ref();
        let content = std::fs::read(path).map_err(|source| StorageError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        self.add_bytes(&path.to_string_lossy(), &content)
    }

    /// Store content as a blob and stage it under `path`.
    pub fn add_bytes(&self, path: &str, content: &[u8]) -> StorageResult<BlobId> {
        let _guard = self.inner.write_lock.lock();

        let id = self.put_blob(content)?;
        self.index().stage(path, id.clone())?;
        info!(path, blob = %id, "staged");
        Ok(id)
    }

    /// Stage an already stored blob.
    pub fn stage(&self, path: &str, id: BlobId) -> StorageResult<()> {
        let _guard = self.inner.write_lock.lock();
        self.index().stage(path, id)
    }

    /// Everything currently staged, in staging order.
    pub fn staged(&self) -> StorageResult<Vec<StagingEntry>> {
        self.index().read_all()
    }

    // ==================== Commit Graph ====================

    /// Get the current HEAD commit, `None` before the first commit.
    pub fn head(&self) -> StorageResult<Option<CommitId>> {
        HeadRef::read(self.backend())
    }

    /// Turn the staging index into a commit.
    ///
    /// Writes happen in order: commit object, HEAD, index. If HEAD can't be
    /// written the index is kept and HEAD still names the previous commit;
    /// the stored object is unreferenced and the next commit uses the old
    /// head as its parent.
    pub fn commit(&self, message: &str) -> StorageResult<CommitId> {
        let _guard = self.inner.write_lock.lock();
        let backend = self.backend();
        let index = self.index();

        let files = index.read_all()?;
        if files.is_empty() {
            return Err(StorageError::EmptyStaging);
        }

        let parent = HeadRef::read(backend)?;
        if let Some(parent_id) = &parent {
            if !commit::commit_exists(backend, parent_id)? {
                return Err(StorageError::corrupted(
                    backend.locate(HEAD_KEY),
                    format!("HEAD names missing commit {}", parent_id),
                ));
            }
        }

        let record = CommitBuilder::new()
            .message(message)
            .files(files)
            .parent(parent.clone())
            .build();

        let id = commit::write_commit(backend, &record)?;
        HeadRef::update_if_unchanged(backend, parent.as_ref(), &id)?;

        index.clear().map_err(|e| StorageError::IndexNotCleared {
            commit: id.clone(),
            reason: e.to_string(),
        })?;

        info!(commit = %id.short(), files = record.files.len(), "committed");
        Ok(id)
    }

    /// Walk history backward from the current HEAD.
    ///
    /// Each call re-reads HEAD, so a new walk sees commits made since the
    /// last one.
    pub fn history(&self) -> StorageResult<History<'_>> {
        let head = self.head()?;
        Ok(History::new(self.backend(), head).max_depth(self.inner.config.max_history_depth))
    }

    /// Compare every file of a commit with its parent's version.
    pub fn show(&self, id: &CommitId) -> StorageResult<CommitDiff> {
        diff::diff_commit(self.backend(), id)
    }

    /// Current HEAD and staged entries.
    pub fn status(&self) -> StorageResult<StoreStatus> {
        Ok(StoreStatus {
            root: self.root().to_path_buf(),
            head: self.head()?,
            staged: self.staged()?,
        })
    }
}

/// A snapshot of the store's mutable state.
#[derive(Debug, Clone)]
pub struct StoreStatus {
    pub root: PathBuf,
    pub head: Option<CommitId>,
    pub staged: Vec<StagingEntry>,
}

impl std::fmt::Display for StoreStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Store: {}", self.root.display())?;
        match &self.head {
            Some(head) => writeln!(f, "HEAD: {}", head)?,
            None => writeln!(f, "HEAD: (no commits yet)")?,
        }
        if self.staged.is_empty() {
            return writeln!(f, "Nothing staged");
        }
        writeln!(f, "Staged ({}):", self.staged.len())?;
        for entry in &self.staged {
            writeln!(f, "  {}  {}", entry.hash.object_id().short(), entry.path)?;
        }
        Ok(())
    }
}
