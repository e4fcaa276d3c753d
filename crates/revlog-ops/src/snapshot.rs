// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Snapshots: the materialized state of a file at a revision.

use std::collections::BTreeMap;

use revlog_hash::blob_hash;

use crate::delta::Delta;
use crate::operation::{Bytes, Op};
use crate::storage_id::StorageId;
use crate::OpError;

/// The materialized state of a file at a specific revision: a finite mapping
/// from storage ID to bound buffer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    rev_num: u64,
    bindings: BTreeMap<StorageId, Bytes>,
}

impl Snapshot {
    /// The empty snapshot at revision 0.
    pub fn empty() -> Self {
        Self {
            rev_num: 0,
            bindings: BTreeMap::new(),
        }
    }

    /// Build the snapshot at `rev_num` from a document delta.
    ///
    /// # Errors
    ///
    /// Returns [`OpError::BadValue`] if `delta` is not a document delta.
    pub fn from_document(rev_num: u64, delta: &Delta) -> Result<Self, OpError> {
        if !delta.is_document() {
            return Err(OpError::BadValue(
                "snapshot can only be built from a document delta".into(),
            ));
        }
        let mut bindings = BTreeMap::new();
        for op in delta.ops() {
            let id = op
                .storage_id()
                .expect("document delta ops always carry a storage id");
            let buf = op
                .bound_buffer()
                .expect("document delta ops always bind a buffer")
                .clone();
            bindings.insert(id, buf);
        }
        Ok(Self { rev_num, bindings })
    }

    /// The revision this snapshot was taken at.
    pub fn rev_num(&self) -> u64 {
        self.rev_num
    }

    /// The number of bindings in the snapshot.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// `true` iff the snapshot has no bindings.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Look up the buffer bound at `id`, if any.
    pub fn get(&self, id: &StorageId) -> Option<&Bytes> {
        self.bindings.get(id)
    }

    /// Look up the buffer bound at a path, if any.
    pub fn get_path(&self, path: &crate::path::PathId) -> Option<&Bytes> {
        self.get(&StorageId::Path(path.clone()))
    }

    /// Re-tag this snapshot with a different revision number, keeping its
    /// bindings. Used when a composed document is installed as the cached
    /// tip for a specific revision.
    pub fn with_rev_num(mut self, rev_num: u64) -> Self {
        self.rev_num = rev_num;
        self
    }

    /// Iterate bindings in canonical (sorted by storage ID) order.
    pub fn iter(&self) -> impl Iterator<Item = (&StorageId, &Bytes)> {
        self.bindings.iter()
    }

    /// The canonical serialization of this snapshot: a document delta whose
    /// ops enumerate the bindings in storage-ID order.
    pub fn to_document_delta(&self) -> Delta {
        let mut ops = Vec::with_capacity(self.bindings.len());
        for (id, buf) in &self.bindings {
            let op = match id {
                StorageId::Path(p) => Op::WritePath(p.clone(), buf.clone()),
                StorageId::Blob(h) => {
                    debug_assert_eq!(blob_hash(buf), *h, "blob binding hash must match its key");
                    Op::WriteBlob(buf.clone())
                }
            };
            ops.push(op);
        }
        Delta::new(ops)
    }
}

/// A minimal-ish delta that transforms `old` into `new`: writing ops for
/// every binding that differs or is new, deletion ops for every binding
/// present in `old` but absent from `new`.
pub fn diff(old: &Snapshot, new: &Snapshot) -> Delta {
    let mut ops = Vec::new();
    for (id, new_buf) in new.iter() {
        match old.get(id) {
            Some(old_buf) if old_buf == new_buf => {}
            _ => ops.push(match id {
                StorageId::Path(p) => Op::WritePath(p.clone(), new_buf.clone()),
                StorageId::Blob(_) => Op::WriteBlob(new_buf.clone()),
            }),
        }
    }
    for (id, _) in old.iter() {
        if new.get(id).is_none() {
            ops.push(match id {
                StorageId::Path(p) => Op::DeletePath(p.clone()),
                StorageId::Blob(h) => Op::DeleteBlob(*h),
            });
        }
    }
    Delta::new(ops)
}
