// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Path-shaped storage IDs: `(/[A-Za-z0-9_]+)+`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::OpError;

/// A validated path storage ID, e.g. `/foo/bar/0`.
///
/// Construction always goes through [`PathId::parse`], so every `PathId` in
/// the system satisfies the grammar by construction.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PathId(String);

impl PathId {
    /// Parse and validate a path string against `(/[A-Za-z0-9_]+)+`.
    ///
    /// # Errors
    ///
    /// Returns [`OpError::BadValue`] if `s` does not match the grammar.
    pub fn parse(s: impl Into<String>) -> Result<Self, OpError> {
        let s = s.into();
        if !is_valid_path(&s) {
            return Err(OpError::BadValue(format!("not a valid path: {s:?}")));
        }
        Ok(Self(s))
    }

    /// Borrow the path as a plain string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` iff `self` is `other` or a descendant of `other`
    /// (`self == other || self.starts_with(other + "/")`).
    pub fn is_at_or_under(&self, other: &PathId) -> bool {
        self.0 == other.0 || self.0.starts_with(&format!("{}/", other.0))
    }

    /// If `self` is an immediate child of `prefix` whose last component is the
    /// canonical decimal rendering of a non-negative integer, return that
    /// integer. Leading zeros other than the single digit `0` disqualify the
    /// component; components that are themselves further nested (contain an
    /// extra `/`) do not qualify.
    pub fn range_index_under(&self, prefix: &PathId) -> Option<u64> {
        let rest = self.0.strip_prefix(&format!("{}/", prefix.0))?;
        if rest.contains('/') {
            return None;
        }
        if rest.is_empty() || (rest.len() > 1 && rest.starts_with('0')) {
            return None;
        }
        rest.parse::<u64>().ok()
    }

    /// Build the storage ID `prefix/<k>` for a decimal range index `k`.
    pub fn child_index(prefix: &PathId, k: u64) -> Self {
        Self(format!("{}/{k}", prefix.0))
    }
}

impl fmt::Display for PathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The argument to `deletePathPrefix`: either the literal root (`"/"`, which
/// matches every path) or a validated [`PathId`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathPrefix {
    /// Matches every path in the snapshot.
    Root,
    /// Matches `p` and every path beginning with `p + "/"`.
    Under(PathId),
}

impl PathPrefix {
    /// Parse a prefix argument: `"/"` is the root, anything else must be a
    /// valid [`PathId`].
    ///
    /// # Errors
    ///
    /// Returns [`OpError::BadValue`] if `s` is neither `"/"` nor a valid path.
    pub fn parse(s: impl Into<String>) -> Result<Self, OpError> {
        let s = s.into();
        if s == "/" {
            return Ok(Self::Root);
        }
        Ok(Self::Under(PathId::parse(s)?))
    }

    /// `true` iff `id` is matched by this prefix.
    pub fn matches(&self, id: &PathId) -> bool {
        match self {
            Self::Root => true,
            Self::Under(p) => id.is_at_or_under(p),
        }
    }
}

impl fmt::Display for PathPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => f.write_str("/"),
            Self::Under(p) => write!(f, "{p}"),
        }
    }
}

fn is_valid_path(s: &str) -> bool {
    let Some(rest) = s.strip_prefix('/') else {
        return false;
    };
    if rest.is_empty() {
        return false;
    }
    rest.split('/').all(|component| {
        !component.is_empty()
            && component
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_')
    })
}
