// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Error surface for the operation and delta algebra.

/// Failures raised by operation construction, composition and snapshotting.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OpError {
    /// A malformed argument: an invalid path, hash, or range bound.
    #[error("bad value: {0}")]
    BadValue(String),
    /// An API contract violation, e.g. requesting a document-shaped compose
    /// against a receiver that is not itself a document.
    #[error("bad use: {0}")]
    BadUse(String),
}
