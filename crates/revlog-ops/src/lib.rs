// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Operation, delta and snapshot algebra for the revision storage engine.
//!
//! This crate is pure and synchronous except for [`compose_all`], whose
//! cooperative-yield hook is the only place concurrency leaks in: everything
//! else is plain data and plain functions over it.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::unreadable_literal,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::many_single_char_names,
    clippy::module_name_repetitions,
    clippy::use_self,
    clippy::multiple_crate_versions
)]

mod delta;
mod error;
mod operation;
mod path;
mod snapshot;
mod storage_id;

pub use delta::{compose, compose_all, Delta};
pub use error::OpError;
pub use operation::{Bytes, Op};
pub use path::{PathId, PathPrefix};
pub use snapshot::{diff, Snapshot};
pub use storage_id::StorageId;

#[cfg(test)]
mod algebra_laws {
    //! Property-based checks of the composition algebra's laws:
    //! `composeAll == reduce(compose)` under arbitrary batch sizes, and
    //! `diff(a, a).isEmpty()`.
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn arb_path() -> impl Strategy<Value = String> {
        "[a-z]{1,4}".prop_map(|s| format!("/{s}"))
    }

    fn arb_write_op() -> impl Strategy<Value = Op> {
        (arb_path(), "[a-z0-9]{0,8}")
            .prop_map(|(p, v)| Op::write_path(p, Arc::<[u8]>::from(v.into_bytes())).unwrap())
    }

    fn arb_document_delta(max_ops: usize) -> impl Strategy<Value = Delta> {
        prop::collection::vec(arb_write_op(), 0..=max_ops).prop_map(|ops| {
            // Dedup by storage id, keeping the last write, so the result is
            // guaranteed document-valid without rejecting shrunk cases.
            let mut dedup: std::collections::BTreeMap<StorageId, Op> = std::collections::BTreeMap::new();
            for op in ops {
                dedup.insert(op.storage_id().unwrap(), op);
            }
            Delta::new(dedup.into_values().collect())
        })
    }

    proptest! {
        #[test]
        fn compose_all_matches_pairwise_reduce(
            base in arb_document_delta(4),
            rest in prop::collection::vec(arb_document_delta(4), 0..4),
            batch in 1usize..=3,
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let mut deltas = vec![base.clone()];
                deltas.extend(rest.iter().cloned());

                let via_all = compose_all(&deltas, true, batch, |_s, _e| async {}).await.unwrap();

                let mut acc = base;
                for d in &rest {
                    acc = compose(&acc, d, true).unwrap();
                }

                let snap_all = Snapshot::from_document(0, &via_all).unwrap();
                let snap_reduce = Snapshot::from_document(0, &acc).unwrap();
                prop_assert_eq!(snap_all, snap_reduce);
                Ok(())
            })?;
        }

        #[test]
        fn diff_of_identical_snapshot_is_empty(d in arb_document_delta(6)) {
            let snap = Snapshot::from_document(0, &d).unwrap();
            prop_assert!(diff(&snap, &snap).is_empty());
        }

        #[test]
        fn document_round_trips_through_canonical_delta(d in arb_document_delta(6)) {
            let snap = Snapshot::from_document(3, &d).unwrap();
            let canon = snap.to_document_delta();
            let snap2 = Snapshot::from_document(3, &canon).unwrap();
            prop_assert_eq!(snap, snap2);
        }
    }
}
