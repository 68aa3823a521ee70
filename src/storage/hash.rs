//! Content hashing.
//!
//! Every object in the store is addressed by the SHA-1 of its bytes. The
//! choice is about identity, not security.

use sha1::{Digest, Sha1};

use crate::storage::types::ObjectId;

/// hash arbitrary bytes to a stable 40-character hex digest
pub fn hash_bytes(content: &[u8]) -> ObjectId {
    let digest = Sha1::digest(content);
    ObjectId::from_digest(format!("{:x}", digest))
}
