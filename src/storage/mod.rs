//! storage layer for snapstore
//!
//! this module provides the object store, the staging index, the commit
//! graph and commit diffs. The CLI uses the [`Store`] handle and never
//! touches the backend directly.
//!
//!  # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Store                              │
//! │      (High-level API: add, commit, history, show)           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!        ┌─────────────────────┼─────────────────────┐
//!        │                     │                     │
//!        ▼                     ▼                     ▼
//!  ┌─────────────┐       ┌─────────────┐       ┌─────────────┐
//!  │    index    │       │   commit    │       │    diff     │
//!  │  (staging)  │       │  (history)  │       │   (show)    │
//!  └─────────────┘       └─────────────┘       └─────────────┘
//!         │                     │                     │
//!         └──────────┬──────────┴──────────┬──────────┘
//!                    ▼                     ▼
//!             ┌─────────────┐       ┌─────────────┐
//!             │    blob     │       │    refs     │
//!             │  (content)  │       │   (HEAD)    │
//!             └─────────────┘       └─────────────┘
//!                    │                     │
//!                    └──────────┬──────────┘
//!                               ▼
//!                        ┌─────────────┐
//!                        │   backend   │
//!                        │ (fs/memory) │
//!                        └─────────────┘
//!  ```
//!
//! # Usage
//!
//! ```no_run
//! use snapstore::storage::Store;
//!
//! let store = Store::open_or_init(".snap")?;
//!
//! store.add_file("notes.txt")?;
//! let id = store.commit("first snapshot")?;
//!
//! for entry in store.history()? {
//!     let (id, commit) = entry?;
//!     println!("{} {}", id.short(), commit.summary());
//! }
//!
//! let diff = store.show(&id)?;
//! # Ok::<(), snapstore::storage::StorageError>(())
//! ```

mod backend;
mod blob;
mod commit;
mod config;
mod diff;
mod error;
mod hash;
mod index;
mod refs;
mod repository;
mod types;

// Re-export public API
pub use backend::{FsBackend, MemoryBackend, ObjectBackend};
pub use blob::Blob;
pub use commit::{Commit, CommitBuilder, History};
pub use config::{StoreConfig, DEFAULT_STORE_DIR};
pub use diff::{diff_lines, CommitDiff, DiffSegment, DiffStats, FileDiff, FileStatus, SegmentKind};
pub use error::{StorageError, StorageResult};
pub use hash::hash_bytes;
pub use index::{StageMode, StagingEntry};
pub use repository::{InitOutcome, Store, StoreStatus};
pub use types::{BlobId, CommitId, InvalidDigestError, ObjectId};
