// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The revision log: an ordered, appendable sequence of revisions plus
//! derived state (snapshot cache, waiters).

use std::sync::Arc;

use revlog_codec::Revision;
use revlog_fs::Persistence;
use revlog_hash::BlobHash;
use revlog_ops::{compose_all, Delta, PathId, Snapshot};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::change::ChangeCondition;
use crate::config::Config;
use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Existence {
    Absent,
    Present,
    Deleting,
}

struct FileState {
    existence: Existence,
    revisions: Vec<Revision>,
    snapshot_cache: Option<(u64, Arc<Snapshot>)>,
}

fn current_rev_num_locked(state: &FileState) -> u64 {
    state.revisions.len() as u64 - 1
}

/// One file's ordered revision sequence, its cached tip snapshot, and the
/// change condition consumers wait on.
///
/// All mutable state is guarded by a single per-file async mutex, so every
/// append, delete, and snapshot composition observes a total order — the
/// snapshot cache lives inside the same lock rather than as a separately
/// synchronized handle, trading a longer critical section during forward
/// composition for a much simpler correctness argument.
pub struct File {
    id: String,
    config: Arc<Config>,
    persistence: Arc<Persistence>,
    state: Mutex<FileState>,
    change: ChangeCondition,
}

impl File {
    pub(crate) async fn load(
        id: String,
        persistence: Arc<Persistence>,
        config: Arc<Config>,
    ) -> Result<Self, EngineError> {
        let (existence, revisions) = match persistence.recover().await? {
            None => (Existence::Absent, Vec::new()),
            Some(map) => (Existence::Present, map.into_values().collect()),
        };
        Ok(Self {
            id,
            config,
            persistence,
            state: Mutex::new(FileState {
                existence,
                revisions,
                snapshot_cache: None,
            }),
            change: ChangeCondition::new(),
        })
    }

    /// The external identifier this handle was looked up by.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Non-mutating existence check. Never creates the file.
    pub async fn exists(&self) -> bool {
        matches!(self.state.lock().await.existence, Existence::Present)
    }

    /// Idempotent creation: installs revision 0 and persists if absent;
    /// no-op if already present.
    #[instrument(skip(self), fields(file_id = %self.id))]
    pub async fn create(&self) -> Result<(), EngineError> {
        let mut state = self.state.lock().await;
        if matches!(state.existence, Existence::Present) {
            return Ok(());
        }
        state.existence = Existence::Present;
        state.revisions = vec![Revision::empty()];
        state.snapshot_cache = Some((0, Arc::new(Snapshot::empty())));
        drop(state);
        self.persistence.mark_dirty(&Revision::empty()).await?;
        self.change.signal();
        Ok(())
    }

    /// Marks the file absent immediately and schedules a recursive erase of
    /// its persisted container. No-op if already absent.
    #[instrument(skip(self), fields(file_id = %self.id))]
    pub async fn delete(&self) -> Result<(), EngineError> {
        {
            let mut state = self.state.lock().await;
            if matches!(state.existence, Existence::Absent) {
                return Ok(());
            }
            state.existence = Existence::Deleting;
            state.revisions.clear();
            state.snapshot_cache = None;
        }
        self.change.signal();
        self.persistence.delete().await?;
        self.state.lock().await.existence = Existence::Absent;
        Ok(())
    }

    /// Force immediate flushing of every pending write to the physical
    /// medium and await completion. The only strong-durability checkpoint
    /// the engine offers; idempotent like the persistence layer it wraps.
    ///
    /// # Errors
    ///
    /// Propagates any [`EngineError::Fs`] the underlying flush encounters.
    pub async fn flush(&self) -> Result<(), EngineError> {
        self.persistence.flush().await.map_err(EngineError::Fs)
    }

    /// The file's current revision number.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::FileNotFound`] if absent, [`EngineError::TimedOut`]
    /// if `timeout_ms` elapses first.
    pub async fn current_rev_num(&self, timeout_ms: Option<i64>) -> Result<u64, EngineError> {
        let clamped = self.config.clamp_timeout_ms(timeout_ms)?;
        tokio::time::timeout(clamped, self.current_rev_num_inner())
            .await
            .map_err(|_| EngineError::TimedOut(clamped))?
    }

    async fn current_rev_num_inner(&self) -> Result<u64, EngineError> {
        let state = self.state.lock().await;
        if !matches!(state.existence, Existence::Present) {
            return Err(EngineError::FileNotFound);
        }
        Ok(current_rev_num_locked(&state))
    }

    /// Attempt to append `revision` at `currentRevNum + 1`.
    ///
    /// # Errors
    ///
    /// Returns `Ok(false)` (not an error) if the append lost the race
    /// against a concurrent appender. Returns [`EngineError::FileNotFound`]
    /// if absent, [`EngineError::BadValue`] if `revision.rev_num` is more
    /// than one past the current tip, or [`EngineError::TimedOut`].
    #[instrument(skip(self, revision), fields(file_id = %self.id, rev_num = revision.rev_num))]
    pub async fn append_change(
        &self,
        revision: Revision,
        timeout_ms: Option<i64>,
    ) -> Result<bool, EngineError> {
        let clamped = self.config.clamp_timeout_ms(timeout_ms)?;
        tokio::time::timeout(clamped, self.append_change_inner(revision))
            .await
            .map_err(|_| EngineError::TimedOut(clamped))?
    }

    async fn append_change_inner(&self, revision: Revision) -> Result<bool, EngineError> {
        let mut state = self.state.lock().await;
        if !matches!(state.existence, Existence::Present) {
            return Err(EngineError::FileNotFound);
        }
        let current = current_rev_num_locked(&state);
        if revision.rev_num > current + 1 {
            return Err(EngineError::BadValue(format!(
                "rev_num {} exceeds currentRevNum+1 ({})",
                revision.rev_num,
                current + 1
            )));
        }
        if revision.rev_num <= current {
            debug!(rev_num = revision.rev_num, current, "lost append race");
            return Ok(false);
        }
        state.revisions.push(revision.clone());
        drop(state);
        self.persistence.mark_dirty(&revision).await?;
        self.change.signal();
        Ok(true)
    }

    /// The revision recorded at `rev_num`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::FileNotFound`] if absent, [`EngineError::BadValue`]
    /// if `rev_num` exceeds the current tip.
    pub async fn get_change(&self, rev_num: u64, timeout_ms: Option<i64>) -> Result<Revision, EngineError> {
        let clamped = self.config.clamp_timeout_ms(timeout_ms)?;
        tokio::time::timeout(clamped, self.get_change_inner(rev_num))
            .await
            .map_err(|_| EngineError::TimedOut(clamped))?
    }

    async fn get_change_inner(&self, rev_num: u64) -> Result<Revision, EngineError> {
        let state = self.state.lock().await;
        if !matches!(state.existence, Existence::Present) {
            return Err(EngineError::FileNotFound);
        }
        let current = current_rev_num_locked(&state);
        if rev_num > current {
            return Err(EngineError::BadValue(format!(
                "rev_num {rev_num} exceeds current tip {current}"
            )));
        }
        state
            .revisions
            .get(rev_num as usize)
            .cloned()
            .ok_or(EngineError::RevisionNotAvailable(rev_num))
    }

    /// The snapshot at `rev_num`, or the current tip when `rev_num` is
    /// `None`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::FileNotFound`] if absent, [`EngineError::BadValue`]
    /// if `rev_num` exceeds the current tip.
    pub async fn get_snapshot(
        &self,
        rev_num: Option<u64>,
        timeout_ms: Option<i64>,
    ) -> Result<Arc<Snapshot>, EngineError> {
        let clamped = self.config.clamp_timeout_ms(timeout_ms)?;
        tokio::time::timeout(clamped, self.get_snapshot_inner(rev_num))
            .await
            .map_err(|_| EngineError::TimedOut(clamped))?
    }

    async fn get_snapshot_inner(&self, rev_num: Option<u64>) -> Result<Arc<Snapshot>, EngineError> {
        let mut state = self.state.lock().await;
        if !matches!(state.existence, Existence::Present) {
            return Err(EngineError::FileNotFound);
        }
        let current = current_rev_num_locked(&state);
        let target = rev_num.unwrap_or(current);
        if target > current {
            return Err(EngineError::BadValue(format!(
                "rev_num {target} exceeds current tip {current}"
            )));
        }

        if let Some((cached_rev, cached_snapshot)) = state.snapshot_cache.clone() {
            if cached_rev == target {
                return Ok(cached_snapshot);
            }
            if cached_rev < target {
                let mut forward = vec![cached_snapshot.to_document_delta()];
                forward.extend(
                    state.revisions[cached_rev as usize + 1..=target as usize]
                        .iter()
                        .map(|r| r.delta.clone()),
                );
                let composed = self.compose_forward(&forward).await?;
                let result = Arc::new(Snapshot::from_document(target, &composed)?);
                if target == current {
                    state.snapshot_cache = Some((target, Arc::clone(&result)));
                }
                return Ok(result);
            }
        }

        // No usable cache entry, or the cached tip is newer than `target`:
        // recompose from revision 0. The interface permits but does not
        // require an efficient path for snapshots older than the cached tip.
        let deltas: Vec<Delta> = state.revisions[..=target as usize]
            .iter()
            .map(|r| r.delta.clone())
            .collect();
        let composed = self.compose_forward(&deltas).await?;
        let result = Arc::new(Snapshot::from_document(target, &composed)?);
        if target == current {
            state.snapshot_cache = Some((target, Arc::clone(&result)));
        }
        Ok(result)
    }

    async fn compose_forward(&self, deltas: &[Delta]) -> Result<Delta, EngineError> {
        let batch_size = self.config.compose_batch_size;
        let composed = compose_all(deltas, true, batch_size, |_start, _end| async {
            tokio::task::yield_now().await;
        })
        .await?;
        Ok(composed)
    }

    /// Blocks until the snapshot binding at `path` is anything other than
    /// `hash` (a binding hash, or `None` for "absent"), including the
    /// binding going absent. Returns promptly if already satisfied.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TimedOut`] on expiry, [`EngineError::FileNotFound`]
    /// if the file is deleted while waiting.
    pub async fn when_path_is_not(
        &self,
        path: &PathId,
        hash: Option<BlobHash>,
        timeout_ms: Option<i64>,
    ) -> Result<(), EngineError> {
        let clamped = self.config.clamp_timeout_ms(timeout_ms)?;
        let deadline = tokio::time::Instant::now() + clamped;
        loop {
            let snapshot = self.get_snapshot_inner(None).await?;
            let current = snapshot.get_path(path).map(|buf| revlog_hash::blob_hash(buf));
            if current != hash {
                return Ok(());
            }
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Err(EngineError::TimedOut(clamped));
            }
            self.change.wait(remaining).await?;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use revlog_ops::Op;
    use std::time::Duration;

    fn new_file(dir: &std::path::Path) -> File {
        let persistence = Arc::new(Persistence::new(
            dir.join("f"),
            Duration::from_secs(5),
            4,
        ));
        File {
            id: "f".to_string(),
            config: Arc::new(Config::default()),
            persistence,
            state: Mutex::new(FileState {
                existence: Existence::Absent,
                revisions: Vec::new(),
                snapshot_cache: None,
            }),
            change: ChangeCondition::new(),
        }
    }

    fn rev(rev_num: u64, ops: Vec<Op>) -> Revision {
        Revision::new(rev_num, Delta::new(ops), None, None)
    }

    // ── 1. create / exists / delete lifecycle ────────────────────────────

    #[tokio::test]
    async fn absent_file_reports_not_exists() {
        let dir = tempfile::tempdir().unwrap();
        let f = new_file(dir.path());
        assert!(!f.exists().await);
    }

    #[tokio::test]
    async fn create_then_exists() {
        let dir = tempfile::tempdir().unwrap();
        let f = new_file(dir.path());
        f.create().await.unwrap();
        assert!(f.exists().await);
        assert_eq!(f.current_rev_num(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn create_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let f = new_file(dir.path());
        f.create().await.unwrap();
        f.append_change(rev(1, vec![]), None).await.unwrap();
        f.create().await.unwrap();
        assert_eq!(f.current_rev_num(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn delete_then_methods_fail_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let f = new_file(dir.path());
        f.create().await.unwrap();
        f.delete().await.unwrap();
        assert!(!f.exists().await);
        assert!(matches!(
            f.current_rev_num(None).await,
            Err(EngineError::FileNotFound)
        ));
    }

    #[tokio::test]
    async fn flush_is_the_durability_checkpoint_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let f = new_file(dir.path());
        f.create().await.unwrap();
        f.append_change(rev(1, vec![Op::write_path("/a", Arc::<[u8]>::from(*b"1")).unwrap()]), None)
            .await
            .unwrap();

        f.flush().await.unwrap();
        f.flush().await.unwrap();

        let recovered = f
            .persistence
            .recover()
            .await
            .unwrap()
            .expect("a flushed file must be recoverable from disk");
        assert_eq!(recovered.len(), 2);
    }

    // ── 2. append-race algorithm ─────────────────────────────────────────

    #[tokio::test]
    async fn append_at_tip_plus_one_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let f = new_file(dir.path());
        f.create().await.unwrap();
        assert!(f.append_change(rev(1, vec![]), None).await.unwrap());
        assert_eq!(f.current_rev_num(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn stale_append_loses_the_race() {
        let dir = tempfile::tempdir().unwrap();
        let f = new_file(dir.path());
        f.create().await.unwrap();
        assert!(f.append_change(rev(1, vec![]), None).await.unwrap());
        assert!(!f.append_change(rev(1, vec![]), None).await.unwrap());
        assert_eq!(f.current_rev_num(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn future_rev_num_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let f = new_file(dir.path());
        f.create().await.unwrap();
        let err = f.append_change(rev(5, vec![]), None).await.unwrap_err();
        assert!(matches!(err, EngineError::BadValue(_)));
    }

    // ── 3. snapshot composition ───────────────────────────────────────────

    #[tokio::test]
    async fn snapshot_reflects_appended_writes() {
        let dir = tempfile::tempdir().unwrap();
        let f = new_file(dir.path());
        f.create().await.unwrap();
        let op = Op::write_path("/a", Arc::<[u8]>::from(*b"1")).unwrap();
        f.append_change(rev(1, vec![op]), None).await.unwrap();

        let snap = f.get_snapshot(None, None).await.unwrap();
        assert_eq!(
            snap.get_path(&PathId::parse("/a").unwrap()).map(|b| &**b),
            Some(b"1".as_slice())
        );
    }

    #[tokio::test]
    async fn snapshot_at_older_rev_num_recomputes_correctly() {
        let dir = tempfile::tempdir().unwrap();
        let f = new_file(dir.path());
        f.create().await.unwrap();
        let op1 = Op::write_path("/a", Arc::<[u8]>::from(*b"1")).unwrap();
        let op2 = Op::write_path("/a", Arc::<[u8]>::from(*b"2")).unwrap();
        f.append_change(rev(1, vec![op1]), None).await.unwrap();
        f.append_change(rev(2, vec![op2]), None).await.unwrap();

        // advance the cache to the tip first
        f.get_snapshot(None, None).await.unwrap();

        let older = f.get_snapshot(Some(1), None).await.unwrap();
        assert_eq!(
            older.get_path(&PathId::parse("/a").unwrap()).map(|b| &**b),
            Some(b"1".as_slice())
        );
    }

    #[tokio::test]
    async fn get_change_rejects_future_rev_num() {
        let dir = tempfile::tempdir().unwrap();
        let f = new_file(dir.path());
        f.create().await.unwrap();
        assert!(matches!(
            f.get_change(7, None).await,
            Err(EngineError::BadValue(_))
        ));
    }

    // ── 4. when_path_is_not ───────────────────────────────────────────────

    #[tokio::test]
    async fn when_path_is_not_returns_immediately_if_already_satisfied() {
        let dir = tempfile::tempdir().unwrap();
        let f = new_file(dir.path());
        f.create().await.unwrap();
        let path = PathId::parse("/a").unwrap();
        f.when_path_is_not(&path, None, Some(10)).await.unwrap();
    }

    #[tokio::test]
    async fn when_path_is_not_wakes_on_matching_write() {
        let dir = tempfile::tempdir().unwrap();
        let f = Arc::new(new_file(dir.path()));
        f.create().await.unwrap();
        let path = PathId::parse("/a").unwrap();
        let buf: Arc<[u8]> = Arc::<[u8]>::from(*b"x");
        let hash = revlog_hash::blob_hash(&buf);

        f.append_change(rev(1, vec![Op::write_path("/a", buf).unwrap()]), None)
            .await
            .unwrap();

        let waiter = {
            let f = Arc::clone(&f);
            let path = path.clone();
            tokio::spawn(async move { f.when_path_is_not(&path, Some(hash), Some(500)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        f.append_change(
            rev(2, vec![Op::write_path("/a", Arc::<[u8]>::from(*b"y")).unwrap()]),
            None,
        )
        .await
        .unwrap();

        waiter.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn when_path_is_not_fails_not_found_on_delete() {
        let dir = tempfile::tempdir().unwrap();
        let f = Arc::new(new_file(dir.path()));
        f.create().await.unwrap();
        let buf: Arc<[u8]> = Arc::<[u8]>::from(*b"x");
        let hash = revlog_hash::blob_hash(&buf);
        f.append_change(rev(1, vec![Op::write_path("/a", buf).unwrap()]), None)
            .await
            .unwrap();

        let waiter = {
            let f = Arc::clone(&f);
            tokio::spawn(async move {
                let path = PathId::parse("/a").unwrap();
                f.when_path_is_not(&path, Some(hash), Some(500)).await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        f.delete().await.unwrap();

        assert!(matches!(
            waiter.await.unwrap(),
            Err(EngineError::FileNotFound)
        ));
    }
}
