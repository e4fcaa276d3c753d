// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Engine tunables. No environment-variable or CLI parsing lives here — that
//! belongs to the embedding process.

use std::time::Duration;

use crate::error::EngineError;

/// Tunable parameters for one engine instance, shared across every [`File`]
/// and [`FileStore`] it owns.
///
/// [`File`]: crate::File
/// [`FileStore`]: crate::FileStore
#[derive(Debug, Clone)]
pub struct Config {
    /// How long a dirty container waits before a write-behind flush fires.
    pub flush_delay: Duration,
    /// Maximum concurrent blob writes during a flush.
    pub flush_fanout: usize,
    /// Maximum ops folded per batch before `composeAll` yields.
    pub compose_batch_size: usize,
    /// Maximum live `File` handles the store's cache retains.
    pub file_cache_capacity: usize,
    /// Age after which a cached `File` handle is treated as stale.
    pub file_cache_ttl: Duration,
    /// Floor every timeout is clamped to.
    pub min_timeout: Duration,
    /// Ceiling every timeout is clamped to; also the default when a caller
    /// passes `None`.
    pub max_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            flush_delay: Duration::from_secs(5),
            flush_fanout: 20,
            compose_batch_size: 1000,
            file_cache_capacity: 256,
            file_cache_ttl: Duration::from_secs(10 * 60),
            min_timeout: Duration::from_millis(1),
            max_timeout: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl Config {
    /// Clamp a caller-supplied millisecond timeout to `[min_timeout,
    /// max_timeout]`. `None` means "maximum".
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::BadValue`] if `timeout_ms` is negative.
    pub fn clamp_timeout_ms(&self, timeout_ms: Option<i64>) -> Result<Duration, EngineError> {
        let Some(ms) = timeout_ms else {
            return Ok(self.max_timeout);
        };
        if ms < 0 {
            return Err(EngineError::BadValue(format!(
                "timeout must be non-negative, got {ms}"
            )));
        }
        #[allow(clippy::cast_sign_loss)]
        let requested = Duration::from_millis(ms as u64);
        Ok(requested.clamp(self.min_timeout, self.max_timeout))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn none_clamps_to_max() {
        let cfg = Config::default();
        assert_eq!(cfg.clamp_timeout_ms(None).unwrap(), cfg.max_timeout);
    }

    #[test]
    fn below_min_clamps_up() {
        let cfg = Config::default();
        assert_eq!(cfg.clamp_timeout_ms(Some(0)).unwrap(), cfg.min_timeout);
    }

    #[test]
    fn above_max_clamps_down() {
        let cfg = Config::default();
        let huge = i64::try_from(cfg.max_timeout.as_millis() + 1).unwrap();
        assert_eq!(cfg.clamp_timeout_ms(Some(huge)).unwrap(), cfg.max_timeout);
    }

    #[test]
    fn negative_is_bad_value() {
        let cfg = Config::default();
        assert!(matches!(cfg.clamp_timeout_ms(Some(-1)), Err(EngineError::BadValue(_))));
    }

    #[test]
    fn in_range_passes_through() {
        let cfg = Config::default();
        let mid = Duration::from_secs(1);
        assert_eq!(
            cfg.clamp_timeout_ms(Some(i64::try_from(mid.as_millis()).unwrap())).unwrap(),
            mid
        );
    }
}
