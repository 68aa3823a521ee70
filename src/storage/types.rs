//! core type-safe wrappers around digests for the storage layer.

use std::fmt;
use std::fmt::Formatter;

use serde::{Deserialize, Serialize};

/// A validated object digest: 40 lowercase hex characters (SHA-1).
///
/// This is the address of every object in the store. Role-specific wrappers
/// ([`BlobId`], [`CommitId`]) are built on top so the two kinds of address
/// can't be mixed up.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId(String);

impl ObjectId {
    /// length of a hex digest in characters
    pub const HEX_LEN: usize = 40;

    /// length of the shard directory prefix
    pub const SHARD_LEN: usize = 2;

    /// parse and validate a hex digest
    pub fn from_hex(hex: &str) -> Result<Self, InvalidDigestError> {
        Self::validate(hex)?;
        Ok(Self(hex.to_string()))
    }

    /// wrap a digest produced by the hasher (already known to be valid)
    pub(crate) fn from_digest(hex: String) -> Self {
        debug_assert_eq!(hex.len(), Self::HEX_LEN);
        Self(hex)
    }

    fn validate(hex: &str) -> Result<(), InvalidDigestError> {
        if hex.is_empty() {
            return Err(InvalidDigestError::Empty);
        }

        if hex.len() != Self::HEX_LEN {
            return Err(InvalidDigestError::WrongLength(hex.len()));
        }

        for (i, c) in hex.chars().enumerate() {
            if !matches!(c, '0'..='9' | 'a'..='f') {
                return Err(InvalidDigestError::InvalidCharacter { char: c, position: i });
            }
        }

        Ok(())
    }

    /// get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// short form of the digest
    pub fn short(&self) -> &str {
        &self.0[..7]
    }

    /// split into (prefix directory, remaining file name)
    pub fn shard(&self) -> (&str, &str) {
        self.0.split_at(Self::SHARD_LEN)
    }
}

impl TryFrom<String> for ObjectId {
    type Error = InvalidDigestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::validate(&value)?;
        Ok(Self(value))
    }
}

impl From<ObjectId> for String {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ObjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Commit identifier.
///
/// This makes sure we don't accidentally pass a blob ID where a commit ID
/// is expected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitId(pub(crate) ObjectId);

impl CommitId {
    pub(crate) fn new(id: ObjectId) -> Self {
        Self(id)
    }

    /// the underlying object address
    pub fn object_id(&self) -> &ObjectId {
        &self.0
    }

    /// parse CommitId from a hex string
    pub fn from_hex(hex: &str) -> Result<Self, InvalidDigestError> {
        ObjectId::from_hex(hex).map(CommitId)
    }

    /// short form of the commit ID
    pub fn short(&self) -> &str {
        self.0.short()
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Blob identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobId(pub(crate) ObjectId);

impl BlobId {
    pub(crate) fn new(id: ObjectId) -> Self {
        Self(id)
    }

    pub fn object_id(&self) -> &ObjectId {
        &self.0
    }

    /// parse BlobId from a hex string
    pub fn from_hex(hex: &str) -> Result<Self, InvalidDigestError> {
        ObjectId::from_hex(hex).map(BlobId)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// error type for digests that fail validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidDigestError {
    Empty,
    WrongLength(usize),
    InvalidCharacter { char: char, position: usize },
}

impl fmt::Display for InvalidDigestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "digest cannot be empty"),
            Self::WrongLength(len) => write!(
                f,
                "digest must be {} hex characters, got {}",
                ObjectId::HEX_LEN,
                len
            ),
            Self::InvalidCharacter { char, position } => {
                write!(f, "invalid character '{}' at position {}", char, position)
            }
        }
    }
}

impl std::error::Error for InvalidDigestError {}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed";

    #[test]
    fn test_object_id_valid() {
        let id = ObjectId::from_hex(SAMPLE).unwrap();
        assert_eq!(id.as_str(), SAMPLE);
        assert_eq!(id.short(), "2aae6c3");
        assert_eq!(id.shard(), ("2a", "ae6c35c94fcfb415dbe95f408b9ce91ee846ed"));
    }

    #[test]
    fn test_object_id_invalid() {
        assert_eq!(ObjectId::from_hex(""), Err(InvalidDigestError::Empty));
        assert_eq!(ObjectId::from_hex("abc"), Err(InvalidDigestError::WrongLength(3)));
        assert!(matches!(
            ObjectId::from_hex(&SAMPLE.to_uppercase()),
            Err(InvalidDigestError::InvalidCharacter { position: 1, .. })
        ));
        assert!(ObjectId::from_hex("../../../../etc/passwd-000000000000000000").is_err());
    }

    #[test]
    fn test_serde_validates_digests() {
        let id: CommitId = serde_json::from_str(&format!("\"{}\"", SAMPLE)).unwrap();
        assert_eq!(id.as_str(), SAMPLE);
        assert_eq!(serde_json::to_string(&id).unwrap(), format!("\"{}\"", SAMPLE));

        let bad: Result<BlobId, _> = serde_json::from_str("\"not-a-digest\"");
        assert!(bad.is_err());
    }
}
