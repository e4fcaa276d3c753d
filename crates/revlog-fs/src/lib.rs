// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Write-behind filesystem persistence for one revision log.
//!
//! One [`Persistence`] owns one directory: a blob per revision, named so the
//! revision number is recoverable from the filename alone. Writes land in an
//! in-memory pending map immediately and are coalesced onto disk after a
//! short settling delay, or immediately via [`Persistence::flush`].
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

use revlog_codec::Revision;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, instrument, warn};

/// Errors from the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    /// Underlying filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Recovery found corrupt or inconsistent on-disk state.
    #[error("corrupt data during recovery: {0}")]
    BadData(String),
    /// A pending revision failed to encode.
    #[error(transparent)]
    Codec(#[from] revlog_codec::CodecError),
}

struct State {
    pending: BTreeMap<u64, Vec<u8>>,
    flush_scheduled: bool,
}

/// Write-behind persistence for the revision sequence of a single file.
///
/// Guards its in-memory pending-write map behind an async mutex, matching the
/// per-resource `tokio::sync::Mutex` pattern the engine uses throughout; the
/// mutex is held only long enough to mutate the map or drain it for a flush,
/// never across I/O.
pub struct Persistence {
    root: PathBuf,
    flush_delay: Duration,
    fanout: usize,
    state: Mutex<State>,
}

impl Persistence {
    /// Create a persistence handle rooted at `root`. Does not touch the
    /// filesystem; call [`Persistence::recover`] to load existing state.
    pub fn new(root: PathBuf, flush_delay: Duration, fanout: usize) -> Self {
        Self {
            root,
            flush_delay,
            fanout,
            state: Mutex::new(State {
                pending: BTreeMap::new(),
                flush_scheduled: false,
            }),
        }
    }

    /// The directory this handle persists into.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Enumerate the container and decode every blob, indexed by recovered
    /// revision number. Returns `Ok(None)` if the container is missing or
    /// holds no blobs — both mean "absent file", not an error.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::BadData`] if a blob fails to decode, its recovered
    /// `rev_num` does not match its filename, or the recovered sequence has a
    /// hole. Returns [`FsError::Io`] on any other filesystem failure.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub async fn recover(&self) -> Result<Option<BTreeMap<u64, Revision>>, FsError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(FsError::Io(err)),
        };

        let mut found = BTreeMap::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(rev_num) = parse_blob_name(&name) else {
                debug!(name = ?name, "ignoring foreign entry during recovery");
                continue;
            };
            let bytes = tokio::fs::read(entry.path()).await?;
            let revision = revlog_codec::decode(&bytes)
                .map_err(|err| FsError::BadData(format!("blob {rev_num:08x}: {err}")))?;
            if revision.rev_num != rev_num {
                return Err(FsError::BadData(format!(
                    "blob named {rev_num:08x} contains rev_num {}",
                    revision.rev_num
                )));
            }
            found.insert(rev_num, revision);
        }

        let Some(&max_rev_num) = found.keys().next_back() else {
            return Ok(None);
        };
        if found.len() as u64 != max_rev_num + 1 {
            return Err(FsError::BadData(format!(
                "hole in revision sequence: {} blobs found, max rev_num {max_rev_num}",
                found.len()
            )));
        }
        Ok(Some(found))
    }

    /// Record `revision` as pending and schedule a flush after the settling
    /// delay if none is already scheduled.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::Codec`] if `revision` fails to encode.
    pub async fn mark_dirty(self: &Arc<Self>, revision: &Revision) -> Result<(), FsError> {
        let bytes = revlog_codec::encode(revision)?;
        let mut state = self.state.lock().await;
        state.pending.insert(revision.rev_num, bytes);
        if !state.flush_scheduled {
            state.flush_scheduled = true;
            let this = Arc::clone(self);
            tokio::spawn(async move {
                tokio::time::sleep(this.flush_delay).await;
                if let Err(err) = this.flush().await {
                    warn!(?err, "scheduled flush failed");
                }
            });
        }
        Ok(())
    }

    /// Force immediate flushing of every pending revision and await
    /// completion. The only strong-durability checkpoint this layer offers.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::Io`] if the container directory cannot be created
    /// or any blob fails to write.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub async fn flush(&self) -> Result<(), FsError> {
        let pending = {
            let mut state = self.state.lock().await;
            state.flush_scheduled = false;
            std::mem::take(&mut state.pending)
        };
        if pending.is_empty() {
            return Ok(());
        }

        tokio::fs::create_dir_all(&self.root).await?;
        let semaphore = Arc::new(Semaphore::new(self.fanout.max(1)));
        let mut tasks = Vec::with_capacity(pending.len());
        for (rev_num, bytes) in pending {
            let semaphore = Arc::clone(&semaphore);
            let root = self.root.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|err| FsError::Io(io::Error::other(err)))?;
                write_blob_atomic(&root, rev_num, &bytes).await
            }));
        }
        for task in tasks {
            task.await.map_err(|err| FsError::Io(io::Error::other(err)))??;
        }
        Ok(())
    }

    /// Discard every pending write and erase the container recursively. A
    /// missing container is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::Io`] if the directory exists but cannot be removed.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub async fn delete(&self) -> Result<(), FsError> {
        {
            let mut state = self.state.lock().await;
            state.pending.clear();
        }
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(FsError::Io(err)),
        }
    }
}

fn blob_name(rev_num: u64) -> String {
    format!("{:08x}.blob", rev_num & 0xFFFF_FFFF)
}

fn parse_blob_name(name: &std::ffi::OsStr) -> Option<u64> {
    let name = name.to_str()?;
    let stem = name.strip_suffix(".blob")?;
    if stem.len() != 8 || !stem.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u64::from_str_radix(stem, 16).ok()
}

async fn write_blob_atomic(root: &Path, rev_num: u64, bytes: &[u8]) -> Result<(), FsError> {
    let target = root.join(blob_name(rev_num));
    let tmp_path = root.join(format!(".{}.tmp", blob_name(rev_num)));
    tokio::fs::write(&tmp_path, bytes).await?;
    let sync_path = tmp_path.clone();
    tokio::task::spawn_blocking(move || std::fs::File::open(&sync_path).and_then(|f| f.sync_all()))
        .await
        .map_err(|err| FsError::Io(io::Error::other(err)))??;
    tokio::fs::rename(&tmp_path, &target).await?;
    Ok(())
}
