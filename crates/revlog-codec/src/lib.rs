// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Revision records, their CBOR encoding, and the revision-number domain.
//!
//! A [`Revision`] is the unit the revision log appends and the persistence
//! layer stores. Encoding is total on valid revisions and round-trips by
//! structural equality; it is not required to be byte-canonical across
//! versions.
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

mod revnum;

pub use revnum::RevNumError;

use revlog_ops::Delta;
use serde::{Deserialize, Serialize};

/// One step in a file's history: the delta plus optional single-moment
/// provenance. Composed revisions (produced by the engine itself, never by a
/// caller) typically carry neither `timestamp` nor `author_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    /// Position in the file's revision sequence.
    pub rev_num: u64,
    /// The transformation this revision carries.
    pub delta: Delta,
    /// Wall-clock moment this revision was authored, if known.
    pub timestamp: Option<i64>,
    /// Identity of the author, if known.
    pub author_id: Option<String>,
}

impl Revision {
    /// The canonical revision 0 every file begins with: empty delta, no
    /// provenance.
    pub fn empty() -> Self {
        Self {
            rev_num: 0,
            delta: Delta::empty(),
            timestamp: None,
            author_id: None,
        }
    }

    /// Construct a revision from its parts.
    pub fn new(rev_num: u64, delta: Delta, timestamp: Option<i64>, author_id: Option<String>) -> Self {
        Self {
            rev_num,
            delta,
            timestamp,
            author_id,
        }
    }
}

/// Errors encoding or decoding a [`Revision`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// CBOR serialization failed.
    #[error("failed to encode revision: {0}")]
    Encode(String),
    /// CBOR deserialization failed, or the bytes do not describe a revision.
    #[error("failed to decode revision: {0}")]
    Decode(String),
}

/// Encode a revision to its CBOR byte representation.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if serialization fails.
pub fn encode(revision: &Revision) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    ciborium::into_writer(revision, &mut buf).map_err(|err| CodecError::Encode(err.to_string()))?;
    Ok(buf)
}

/// Decode a revision from its CBOR byte representation.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] if the bytes are not a valid encoding of a
/// [`Revision`].
pub fn decode(bytes: &[u8]) -> Result<Revision, CodecError> {
    ciborium::from_reader(bytes).map_err(|err| CodecError::Decode(err.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use revlog_ops::Op;
    use std::sync::Arc;

    // ── 1. codec round-trip ──────────────────────────────────────────────

    #[test]
    fn empty_revision_round_trips() {
        let rev = Revision::empty();
        let bytes = encode(&rev).unwrap();
        assert_eq!(decode(&bytes).unwrap(), rev);
    }

    #[test]
    fn revision_with_ops_and_provenance_round_trips() {
        let op = Op::write_path("/a/b", Arc::<[u8]>::from(*b"hi")).unwrap();
        let rev = Revision::new(
            7,
            Delta::new(vec![op]),
            Some(1_700_000_000),
            Some("author-1".to_string()),
        );
        let bytes = encode(&rev).unwrap();
        assert_eq!(decode(&bytes).unwrap(), rev);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode(&[0xff, 0x00, 0x01]).is_err());
    }

    // ── 2. byte-string encoding for write payloads ──────────────────────

    #[test]
    fn write_payload_encodes_as_byte_string_not_integer_array() {
        let big_payload = vec![7u8; 4096];
        let op = Op::write_blob(Arc::<[u8]>::from(big_payload.clone()));
        let rev = Revision::new(1, Delta::new(vec![op]), None, None);
        let bytes = encode(&rev).unwrap();
        // An integer-array encoding of 4096 bytes would run well past 2x the
        // payload size; a byte-string encoding stays within a small header.
        assert!(bytes.len() < big_payload.len() + 64);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod codec_laws {
    //! Property-based check of the codec's round-trip law:
    //! `decode(encode(r)) == r` for arbitrary revisions.
    use super::*;
    use proptest::prelude::*;
    use revlog_ops::Op;
    use std::sync::Arc;

    fn arb_path() -> impl Strategy<Value = String> {
        "[a-z]{1,6}".prop_map(|s| format!("/{s}"))
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (arb_path(), "[a-z0-9]{0,8}")
                .prop_map(|(p, v)| Op::write_path(p, Arc::<[u8]>::from(v.into_bytes())).unwrap()),
            "[a-z0-9]{0,8}".prop_map(|v| Op::write_blob(Arc::<[u8]>::from(v.into_bytes()))),
            arb_path().prop_map(|p| Op::delete_path(p).unwrap()),
        ]
    }

    fn arb_revision() -> impl Strategy<Value = Revision> {
        (
            any::<u64>(),
            prop::collection::vec(arb_op(), 0..6),
            prop::option::of(any::<i64>()),
            prop::option::of("[a-z]{1,8}"),
        )
            .prop_map(|(rev_num, ops, timestamp, author_id)| {
                Revision::new(rev_num, Delta::new(ops), timestamp, author_id)
            })
    }

    proptest! {
        #[test]
        fn decode_of_encode_is_identity(rev in arb_revision()) {
            let bytes = encode(&rev).unwrap();
            let decoded = decode(&bytes).unwrap();
            prop_assert_eq!(decoded, rev);
        }
    }
}
