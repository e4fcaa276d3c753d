// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Errors exposed at the engine boundary.

use std::time::Duration;

/// Failures from the revision log and file store.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A public method other than `exists`/`create` was called on an absent
    /// file.
    #[error("file not found")]
    FileNotFound,
    /// The requested revision has been aged out (reserved for future GC).
    #[error("revision {0} is not available")]
    RevisionNotAvailable(u64),
    /// A malformed argument: path, hash, out-of-range revision number, etc.
    #[error("bad value: {0}")]
    BadValue(String),
    /// An API contract was violated by the caller.
    #[error("bad use: {0}")]
    BadUse(String),
    /// A waiting operation exceeded its clamped deadline.
    #[error("operation timed out after {0:?}")]
    TimedOut(Duration),
    /// The delta/snapshot algebra rejected an operation.
    #[error(transparent)]
    Op(#[from] revlog_ops::OpError),
    /// The persistence layer failed.
    #[error(transparent)]
    Fs(#[from] revlog_fs::FsError),
}
