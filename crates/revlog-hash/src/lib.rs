// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Content hashing for the revision storage engine.
//!
//! Blobs bound into a snapshot are keyed by their BLAKE3 fingerprint. Hash
//! identity is content-only: `BLAKE3(bytes)` with no domain prefix. Two writes
//! of identical bytes collapse to the same storage ID — that's the
//! idempotence invariant the delta algebra relies on, not an accident.
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
    clippy::use_self
)]

/// A 32-byte BLAKE3 content hash.
///
/// Thin newtype over `[u8; 32]`. The inner bytes are public for zero-cost
/// access; the `Display` impl renders lowercase hex for logging and error
/// messages.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, serde::Serialize, serde::Deserialize)]
pub struct BlobHash(pub [u8; 32]);

impl BlobHash {
    /// View the hash as a byte slice.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parse a hash from its lowercase-hex display form.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::BadHex`] if `s` is not exactly 64 hex digits.
    pub fn from_hex(s: &str) -> Result<Self, HashError> {
        let s = s.as_bytes();
        if s.len() != 64 {
            return Err(HashError::BadHex);
        }
        let mut out = [0u8; 32];
        for (i, chunk) in s.chunks_exact(2).enumerate() {
            let hi = hex_nibble(chunk[0]).ok_or(HashError::BadHex)?;
            let lo = hex_nibble(chunk[1]).ok_or(HashError::BadHex)?;
            out[i] = (hi << 4) | lo;
        }
        Ok(Self(out))
    }
}

fn hex_nibble(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

impl std::fmt::Display for BlobHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Compute the BLAKE3 content hash of `bytes`.
///
/// No domain prefix — the content IS the identity.
pub fn blob_hash(bytes: &[u8]) -> BlobHash {
    let hash = blake3::hash(bytes);
    BlobHash(*hash.as_bytes())
}

/// Errors parsing a hash from its external representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HashError {
    /// Input was not 64 valid lowercase/uppercase hex digits.
    #[error("not a 64-digit hex blob hash")]
    BadHex,
}
