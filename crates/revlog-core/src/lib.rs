// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The revision log and file store: the engine's mutable-state surface.
//!
//! A [`File`] is one document's ordered revision sequence, materialized
//! on demand into [`revlog_ops::Snapshot`]s and persisted write-behind
//! through [`revlog_fs::Persistence`]. [`FileStore`] owns a bounded,
//! TTL-evicting cache of [`File`] handles keyed by file ID.
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

mod change;
mod config;
mod error;
mod file;
mod store;

pub use config::Config;
pub use error::EngineError;
pub use file::File;
pub use store::{FileInfo, FileStore};

pub use revlog_codec::Revision;
pub use revlog_hash::BlobHash;
pub use revlog_ops::{Delta, Op, PathId, PathPrefix, Snapshot};
