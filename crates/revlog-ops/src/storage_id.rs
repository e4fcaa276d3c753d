// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The storage-ID space: paths and content hashes share one key domain.

use revlog_hash::BlobHash;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::path::PathId;

/// A key into a snapshot's binding map: either a path or a content hash.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StorageId {
    /// A path-addressed binding.
    Path(PathId),
    /// A content-addressed blob binding.
    Blob(BlobHash),
}

impl fmt::Display for StorageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(p) => write!(f, "{p}"),
            Self::Blob(h) => write!(f, "blob:{h}"),
        }
    }
}
