// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! A bounded, TTL-aware cache of live [`File`] handles keyed by file ID.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::instrument;

use crate::config::Config;
use crate::error::EngineError;
use crate::file::File;
use revlog_fs::Persistence;

const MAX_FILE_ID_LEN: usize = 255;

/// `true` iff `id` is non-empty, at most 255 bytes, and contains only ASCII
/// alphanumerics, `_`, or `-`.
fn is_valid_file_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_FILE_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Syntactic and existence status of a file ID, without creating anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileInfo {
    /// `true` iff the ID satisfies the file-ID grammar.
    pub valid: bool,
    /// `true` iff a file with this ID currently exists. Always `false` when
    /// `valid` is `false`.
    pub exists: bool,
}

/// Owns every [`File`] for one storage root, loading and persisting each on
/// first use and evicting idle handles once the cache is full or an entry
/// has outlived its TTL.
///
/// Mirrors the shape of a connection-pool-style shared-state service: one
/// mutex guards admission to the cache, but each cached [`File`] then
/// serializes its own mutations independently.
pub struct FileStore {
    root: PathBuf,
    config: Arc<Config>,
    cache: Mutex<LruCache<String, (Arc<File>, Instant)>>,
}

impl FileStore {
    /// Create a store rooted at `root` with `config`'s tunables. Does not
    /// touch the filesystem until a file is first requested.
    pub fn new(root: impl Into<PathBuf>, config: Config) -> Self {
        let capacity = NonZeroUsize::new(config.file_cache_capacity.max(1))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            root: root.into(),
            config: Arc::new(config),
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// `true` iff `id` satisfies the file-ID grammar.
    pub fn is_file_id(id: &str) -> bool {
        is_valid_file_id(id)
    }

    /// Look up syntactic validity and current existence without creating or
    /// caching anything.
    pub async fn get_file_info(&self, id: &str) -> FileInfo {
        if !is_valid_file_id(id) {
            return FileInfo {
                valid: false,
                exists: false,
            };
        }
        let exists = match self.get_file(id).await {
            Ok(file) => file.exists().await,
            Err(_) => false,
        };
        FileInfo {
            valid: true,
            exists,
        }
    }

    /// Fetch the cached handle for `id`, loading it from persistence on a
    /// cache miss or expired entry.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::BadValue`] if `id` fails the file-ID grammar.
    /// Propagates any [`EngineError::Fs`] encountered during recovery.
    #[instrument(skip(self), fields(file_id = %id))]
    pub async fn get_file(&self, id: &str) -> Result<Arc<File>, EngineError> {
        if !is_valid_file_id(id) {
            return Err(EngineError::BadValue(format!("not a valid file id: {id:?}")));
        }

        let mut cache = self.cache.lock().await;
        let hit = cache
            .get(id)
            .map(|(file, inserted_at)| (Arc::clone(file), inserted_at.elapsed()));
        match hit {
            Some((file, age)) if age < self.config.file_cache_ttl => return Ok(file),
            Some(_) => {
                cache.pop(id);
            }
            None => {}
        }
        drop(cache);

        let persistence = Arc::new(Persistence::new(
            self.root.join(id),
            self.config.flush_delay,
            self.config.flush_fanout,
        ));
        let file = Arc::new(File::load(id.to_string(), persistence, Arc::clone(&self.config)).await?);

        let mut cache = self.cache.lock().await;
        cache.put(id.to_string(), (Arc::clone(&file), Instant::now()));
        Ok(file)
    }
}
