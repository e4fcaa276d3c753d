// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Operations: atomic, named, typed mutations over the storage-ID space.

use revlog_hash::{blob_hash, BlobHash};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::sync::Arc;

use crate::path::{PathId, PathPrefix};
use crate::storage_id::StorageId;
use crate::OpError;

/// An immutable byte buffer, shared by value.
pub type Bytes = Arc<[u8]>;

/// A single mutation over the storage-ID space.
///
/// Mutating (non-document) ops are deletions; writing (document-valid) ops
/// bind a storage ID to a buffer. Equality is structural over opcode and
/// payload — there is no identity beyond the data itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Op {
    /// Erase every binding in the snapshot.
    DeleteAll,
    /// Erase the blob binding at `hash`, if any.
    DeleteBlob(BlobHash),
    /// Erase the binding at `path`, if any.
    DeletePath(PathId),
    /// Erase every binding at or under `prefix`.
    DeletePathPrefix(PathPrefix),
    /// Erase every binding `path/<k>` for `k` in `[start, end)`.
    DeletePathRange(PathId, u64, u64),
    /// Bind `hash(buffer)` to `buffer`.
    WriteBlob(Bytes),
    /// Bind `path` to `buffer`, overwriting any prior binding.
    WritePath(PathId, Bytes),
}

impl Op {
    /// Construct `deleteAll`.
    pub fn delete_all() -> Self {
        Self::DeleteAll
    }

    /// Construct `deleteBlob(hash)`.
    pub fn delete_blob(hash: BlobHash) -> Self {
        Self::DeleteBlob(hash)
    }

    /// Construct `deletePath(path)`, validating the path grammar.
    ///
    /// # Errors
    ///
    /// Returns [`OpError::BadValue`] if `path` is not a valid path.
    pub fn delete_path(path: impl Into<String>) -> Result<Self, OpError> {
        Ok(Self::DeletePath(PathId::parse(path)?))
    }

    /// Construct `deletePathPrefix(prefix)`. `"/"` is accepted as the root
    /// prefix that matches every path.
    ///
    /// # Errors
    ///
    /// Returns [`OpError::BadValue`] if `prefix` is neither `"/"` nor a valid
    /// path.
    pub fn delete_path_prefix(prefix: impl Into<String>) -> Result<Self, OpError> {
        Ok(Self::DeletePathPrefix(PathPrefix::parse(prefix)?))
    }

    /// Construct `deletePathRange(path, start, end)`.
    ///
    /// # Errors
    ///
    /// Returns [`OpError::BadValue`] if `path` is invalid or `start >= end`.
    pub fn delete_path_range(
        path: impl Into<String>,
        start: u64,
        end: u64,
    ) -> Result<Self, OpError> {
        if start >= end {
            return Err(OpError::BadValue(format!(
                "range bounds must satisfy start < end, got [{start}, {end})"
            )));
        }
        Ok(Self::DeletePathRange(PathId::parse(path)?, start, end))
    }

    /// Construct `writeBlob(buffer)`. The storage ID is `hash(buffer)`.
    pub fn write_blob(buffer: impl Into<Bytes>) -> Self {
        Self::WriteBlob(buffer.into())
    }

    /// Construct `writePath(path, buffer)`, validating the path grammar.
    ///
    /// # Errors
    ///
    /// Returns [`OpError::BadValue`] if `path` is not a valid path.
    pub fn write_path(path: impl Into<String>, buffer: impl Into<Bytes>) -> Result<Self, OpError> {
        Ok(Self::WritePath(PathId::parse(path)?, buffer.into()))
    }

    /// `true` for the mutating (non-document) opcodes.
    pub fn is_mutating(&self) -> bool {
        !self.is_writing()
    }

    /// `true` for the writing (document-valid) opcodes.
    pub fn is_writing(&self) -> bool {
        matches!(self, Self::WriteBlob(_) | Self::WritePath(_, _))
    }

    /// The storage ID a writing op binds. `None` for mutating ops, which do
    /// not themselves bind a value (`DeleteBlob`/`DeletePath` name a target
    /// but do not bind it).
    pub fn storage_id(&self) -> Option<StorageId> {
        match self {
            Self::WriteBlob(b) => Some(StorageId::Blob(blob_hash(b))),
            Self::WritePath(p, _) => Some(StorageId::Path(p.clone())),
            _ => None,
        }
    }

    /// The buffer a writing op binds. `None` for mutating ops.
    pub fn bound_buffer(&self) -> Option<&Bytes> {
        match self {
            Self::WriteBlob(b) | Self::WritePath(_, b) => Some(b),
            _ => None,
        }
    }
}

/// Wire shadow of [`Op`]: identical shape, but buffer payloads are carried as
/// `serde_bytes` so CBOR encodes them as byte strings instead of integer
/// sequences.
#[derive(Serialize, Deserialize)]
enum OpWire<'a> {
    DeleteAll,
    DeleteBlob(BlobHash),
    DeletePath(PathId),
    DeletePathPrefix(PathPrefix),
    DeletePathRange(PathId, u64, u64),
    WriteBlob(#[serde(with = "serde_bytes")] &'a [u8]),
    WritePath(PathId, #[serde(with = "serde_bytes")] &'a [u8]),
}

/// Owned counterpart of [`OpWire`], used on the deserialize side.
#[derive(Deserialize)]
enum OpWireOwned {
    DeleteAll,
    DeleteBlob(BlobHash),
    DeletePath(PathId),
    DeletePathPrefix(PathPrefix),
    DeletePathRange(PathId, u64, u64),
    WriteBlob(#[serde(with = "serde_bytes")] Vec<u8>),
    WritePath(PathId, #[serde(with = "serde_bytes")] Vec<u8>),
}

impl Serialize for Op {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let wire = match self {
            Self::DeleteAll => OpWire::DeleteAll,
            Self::DeleteBlob(h) => OpWire::DeleteBlob(*h),
            Self::DeletePath(p) => OpWire::DeletePath(p.clone()),
            Self::DeletePathPrefix(p) => OpWire::DeletePathPrefix(p.clone()),
            Self::DeletePathRange(p, start, end) => OpWire::DeletePathRange(p.clone(), *start, *end),
            Self::WriteBlob(b) => OpWire::WriteBlob(b),
            Self::WritePath(p, b) => OpWire::WritePath(p.clone(), b),
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Op {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let wire = OpWireOwned::deserialize(deserializer)?;
        Ok(match wire {
            OpWireOwned::DeleteAll => Self::DeleteAll,
            OpWireOwned::DeleteBlob(h) => Self::DeleteBlob(h),
            OpWireOwned::DeletePath(p) => Self::DeletePath(p),
            OpWireOwned::DeletePathPrefix(p) => Self::DeletePathPrefix(p),
            OpWireOwned::DeletePathRange(p, start, end) => Self::DeletePathRange(p, start, end),
            OpWireOwned::WriteBlob(b) => Self::WriteBlob(Arc::from(b)),
            OpWireOwned::WritePath(p, b) => Self::WritePath(p, Arc::from(b)),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ── 1. factory validation ────────────────────────────────────────────

    #[test]
    fn write_path_rejects_bad_grammar() {
        assert!(Op::write_path("no-leading-slash", Arc::<[u8]>::from(*b"x")).is_err());
    }

    #[test]
    fn delete_path_range_rejects_inverted_bounds() {
        assert!(Op::delete_path_range("/x", 5, 5).is_err());
        assert!(Op::delete_path_range("/x", 5, 2).is_err());
    }

    #[test]
    fn delete_path_range_accepts_valid_bounds() {
        assert!(Op::delete_path_range("/x", 2, 16).is_ok());
    }

    // ── 2. classification ────────────────────────────────────────────────

    #[test]
    fn writing_ops_are_document_valid() {
        let w1 = Op::write_path("/a", Arc::<[u8]>::from(*b"1")).unwrap();
        let w2 = Op::write_blob(Arc::<[u8]>::from(*b"1"));
        assert!(w1.is_writing());
        assert!(w2.is_writing());
        assert!(!w1.is_mutating());
    }

    #[test]
    fn mutating_ops_are_not_document_valid() {
        assert!(Op::delete_all().is_mutating());
        assert!(Op::delete_path("/a").unwrap().is_mutating());
    }

    // ── 3. storage IDs ───────────────────────────────────────────────────

    #[test]
    fn write_path_id_is_the_path() {
        let op = Op::write_path("/a/b", Arc::<[u8]>::from(*b"v")).unwrap();
        assert_eq!(op.storage_id(), Some(StorageId::Path(PathId::parse("/a/b").unwrap())));
    }

    #[test]
    fn write_blob_id_is_content_hash() {
        let buf: Bytes = Arc::<[u8]>::from(*b"payload");
        let op = Op::write_blob(buf.clone());
        assert_eq!(op.storage_id(), Some(StorageId::Blob(blob_hash(&buf))));
    }

    #[test]
    fn delete_ops_have_no_storage_id() {
        assert_eq!(Op::delete_all().storage_id(), None);
        assert_eq!(Op::delete_path("/a").unwrap().storage_id(), None);
    }

    // ── 4. structural equality ───────────────────────────────────────────

    #[test]
    fn equal_opcode_and_payload_are_equal() {
        let a = Op::write_path("/a", Arc::<[u8]>::from(*b"1")).unwrap();
        let b = Op::write_path("/a", Arc::<[u8]>::from(*b"1")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_payload_is_not_equal() {
        let a = Op::write_path("/a", Arc::<[u8]>::from(*b"1")).unwrap();
        let b = Op::write_path("/a", Arc::<[u8]>::from(*b"2")).unwrap();
        assert_ne!(a, b);
    }
}
