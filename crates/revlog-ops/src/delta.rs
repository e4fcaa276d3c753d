// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Deltas: ordered sequences of operations, and their composition algebra.

use std::collections::HashMap;
use std::future::Future;

use crate::operation::Op;
use crate::storage_id::StorageId;
use crate::OpError;

/// An ordered sequence of operations — the transformation carried by a
/// revision.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Delta {
    ops: Vec<Op>,
}

impl Delta {
    /// The empty delta.
    pub fn empty() -> Self {
        Self { ops: Vec::new() }
    }

    /// Build a delta from an explicit op sequence. Does not validate
    /// document-ness; use [`Delta::is_document`] to check.
    pub fn new(ops: Vec<Op>) -> Self {
        Self { ops }
    }

    /// The ops in application order.
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// `true` iff this delta has zero operations.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// `true` iff every op is a writing op and no two ops bind the same
    /// storage ID. A document delta may be applied to the empty snapshot to
    /// produce a valid [`crate::Snapshot`].
    pub fn is_document(&self) -> bool {
        let mut seen = std::collections::HashSet::with_capacity(self.ops.len());
        for op in &self.ops {
            if !op.is_writing() {
                return false;
            }
            let Some(id) = op.storage_id() else {
                return false;
            };
            if !seen.insert(id) {
                return false;
            }
        }
        true
    }
}

/// `true` iff `reset` erases the binding at `id`.
fn reset_matches(reset: &Op, id: &StorageId) -> bool {
    match (reset, id) {
        (Op::DeleteAll, _) => true,
        (Op::DeleteBlob(h), StorageId::Blob(id_h)) => h == id_h,
        (Op::DeletePath(p), StorageId::Path(id_p)) => p == id_p,
        (Op::DeletePathPrefix(prefix), StorageId::Path(id_p)) => prefix.matches(id_p),
        (Op::DeletePathRange(p, start, end), StorageId::Path(id_p)) => id_p
            .range_index_under(p)
            .is_some_and(|k| k >= *start && k < *end),
        _ => false,
    }
}

/// Incremental fold state shared by [`compose`] and [`compose_all`].
///
/// Holds the ops surviving so far, in the order they would need to be
/// emitted: blanket resets always precede the writes they would otherwise
/// shadow, because a reset removes any conflicting write already in the
/// accumulator before it is itself recorded.
struct Accumulator {
    ops: Vec<Op>,
    write_index: HashMap<StorageId, usize>,
}

impl Accumulator {
    fn new() -> Self {
        Self {
            ops: Vec::new(),
            write_index: HashMap::new(),
        }
    }

    fn reindex(&mut self) {
        self.write_index.clear();
        for (i, op) in self.ops.iter().enumerate() {
            if let Some(id) = op.storage_id() {
                self.write_index.insert(id, i);
            }
        }
    }

    fn remove_matching_writes(&mut self, reset: &Op) {
        let before = self.ops.len();
        self.ops
            .retain(|op| !op.storage_id().is_some_and(|id| reset_matches(reset, &id)));
        if self.ops.len() != before {
            self.reindex();
        }
    }

    /// Apply one op to the fold. `want_document` selects whether resets are
    /// executed-and-dropped (`true`) or executed-and-retained (`false`).
    fn apply(&mut self, op: &Op, want_document: bool) -> Result<(), OpError> {
        if op.is_writing() {
            let id = op
                .storage_id()
                .expect("writing ops always carry a storage id");
            if let Some(&pos) = self.write_index.get(&id) {
                self.ops[pos] = op.clone();
            } else {
                self.ops.push(op.clone());
                self.write_index.insert(id, self.ops.len() - 1);
            }
        } else {
            self.remove_matching_writes(op);
            if !want_document {
                self.ops.push(op.clone());
            }
        }
        Ok(())
    }

    fn into_delta(self) -> Delta {
        Delta::new(self.ops)
    }
}

/// Compose `a` then `b` into a single delta equivalent to applying `a` then
/// `b` in sequence.
///
/// In document shape (`want_document = true`) `a` must already be a document;
/// `b`'s deletions are executed against the accumulator but never emitted,
/// and the result is itself a document. In non-document shape, surviving
/// blanket-reset ops are emitted ahead of any write they would otherwise
/// shadow, so the result remains composable.
///
/// # Errors
///
/// Returns [`OpError::BadUse`] if `want_document` is `true` and `a` is not a
/// document delta.
pub fn compose(a: &Delta, b: &Delta, want_document: bool) -> Result<Delta, OpError> {
    let mut acc = Accumulator::new();
    if want_document && !a.is_document() {
        return Err(OpError::BadUse(
            "document-shaped compose requires a document receiver".into(),
        ));
    }
    for op in &a.ops {
        acc.apply(op, want_document)?;
    }
    for op in &b.ops {
        acc.apply(op, want_document)?;
    }
    Ok(acc.into_delta())
}

/// Fold a sequence of deltas left-to-right, equivalent to
/// `deltas.into_iter().reduce(|a, b| compose(&a, &b, want_document))`, but
/// processing the flattened op stream in batches of at most `max_atomic`
/// operations. Between batches, awaits `yield_fn(start_idx, end_idx)` so a
/// caller can yield to the scheduler or observe progress.
///
/// # Errors
///
/// Returns [`OpError::BadUse`] if `want_document` is `true` and the first
/// delta is not already a document.
pub async fn compose_all<F, Fut>(
    deltas: &[Delta],
    want_document: bool,
    max_atomic: usize,
    mut yield_fn: F,
) -> Result<Delta, OpError>
where
    F: FnMut(usize, usize) -> Fut,
    Fut: Future<Output = ()>,
{
    if want_document {
        if let Some(first) = deltas.first() {
            if !first.is_document() {
                return Err(OpError::BadUse(
                    "document-shaped composeAll requires a document receiver".into(),
                ));
            }
        }
    }
    let max_atomic = max_atomic.max(1);
    let mut acc = Accumulator::new();
    let mut idx = 0usize;
    let mut since_yield = 0usize;
    for delta in deltas {
        for op in &delta.ops {
            acc.apply(op, want_document)?;
            idx += 1;
            since_yield += 1;
            if since_yield >= max_atomic {
                yield_fn(idx - since_yield, idx).await;
                since_yield = 0;
            }
        }
    }
    Ok(acc.into_delta())
}
