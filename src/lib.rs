//! snapstore - a content-addressable snapshot store
//!
//! Files are staged as blobs addressed by the SHA-1 of their content,
//! bound into immutable commits that link to their parent, and compared
//! line by line across commit boundaries.
//!
//! # Example
//!
//! ```no_run
//! use snapstore::storage::Store;
//!
//! let store = Store::open_or_init(".snap").unwrap();
//! store.add_bytes("a.txt", b"x\ny\n").unwrap();
//! let first = store.commit("first").unwrap();
//! ```

pub mod storage;
