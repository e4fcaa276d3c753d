// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Validation helpers over the revision-number domain: non-negative integers
//! bounded by `i64`, plus the `-1` "no revisions yet" sentinel used by an
//! absent file's `currentRevNum`.

/// A revision number failed one of the domain checks in this module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RevNumError {
    /// `n` was negative where the domain requires non-negative (or, for
    /// [`or_neg1`], less than `-1`).
    #[error("revision number {0} is negative")]
    Negative(i64),
    /// `n` exceeded the caller's upper bound.
    #[error("revision number {value} exceeds limit {limit}")]
    AboveLimit {
        /// The value that was checked.
        value: i64,
        /// The limit it exceeded.
        limit: i64,
    },
    /// `n` fell below the caller's lower bound.
    #[error("revision number {value} is below floor {floor}")]
    BelowFloor {
        /// The value that was checked.
        value: i64,
        /// The floor it fell below.
        floor: i64,
    },
}

/// Validate that `n` is a non-negative revision number.
///
/// # Errors
///
/// Returns [`RevNumError::Negative`] if `n < 0`.
pub fn check(n: i64) -> Result<u64, RevNumError> {
    u64::try_from(n).map_err(|_| RevNumError::Negative(n))
}

/// Validate that `n` is non-negative and `<= limit` (inclusive upper bound).
///
/// # Errors
///
/// Returns [`RevNumError::Negative`] or [`RevNumError::AboveLimit`].
pub fn max_inc(n: i64, limit: i64) -> Result<u64, RevNumError> {
    let value = check(n)?;
    if n > limit {
        return Err(RevNumError::AboveLimit { value: n, limit });
    }
    Ok(value)
}

/// Validate that `n` is non-negative and `< limit` (exclusive upper bound).
///
/// # Errors
///
/// Returns [`RevNumError::Negative`] or [`RevNumError::AboveLimit`].
pub fn max_exc(n: i64, limit: i64) -> Result<u64, RevNumError> {
    let value = check(n)?;
    if n >= limit {
        return Err(RevNumError::AboveLimit { value: n, limit });
    }
    Ok(value)
}

/// Validate that `n` is non-negative and `>= floor`.
///
/// # Errors
///
/// Returns [`RevNumError::Negative`] or [`RevNumError::BelowFloor`].
pub fn min(n: i64, floor: i64) -> Result<u64, RevNumError> {
    let value = check(n)?;
    if n < floor {
        return Err(RevNumError::BelowFloor { value: n, floor });
    }
    Ok(value)
}

/// Validate `n` against the "no revisions yet" domain: `-1`, or any
/// non-negative integer.
///
/// # Errors
///
/// Returns [`RevNumError::Negative`] if `n < -1`.
pub fn or_neg1(n: i64) -> Result<i64, RevNumError> {
    if n < -1 {
        return Err(RevNumError::Negative(n));
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── 1. check ─────────────────────────────────────────────────────────

    #[test]
    fn check_accepts_zero_and_positive() {
        assert_eq!(check(0), Ok(0));
        assert_eq!(check(42), Ok(42));
    }

    #[test]
    fn check_rejects_negative() {
        assert_eq!(check(-1), Err(RevNumError::Negative(-1)));
    }

    // ── 2. max_inc / max_exc ─────────────────────────────────────────────

    #[test]
    fn max_inc_allows_equal_to_limit() {
        assert_eq!(max_inc(5, 5), Ok(5));
    }

    #[test]
    fn max_inc_rejects_above_limit() {
        assert_eq!(max_inc(6, 5), Err(RevNumError::AboveLimit { value: 6, limit: 5 }));
    }

    #[test]
    fn max_exc_rejects_equal_to_limit() {
        assert_eq!(max_exc(5, 5), Err(RevNumError::AboveLimit { value: 5, limit: 5 }));
    }

    #[test]
    fn max_exc_allows_below_limit() {
        assert_eq!(max_exc(4, 5), Ok(4));
    }

    // ── 3. min ───────────────────────────────────────────────────────────

    #[test]
    fn min_rejects_below_floor() {
        assert_eq!(min(2, 3), Err(RevNumError::BelowFloor { value: 2, floor: 3 }));
    }

    #[test]
    fn min_allows_at_floor() {
        assert_eq!(min(3, 3), Ok(3));
    }

    // ── 4. or_neg1 sentinel domain ───────────────────────────────────────

    #[test]
    fn or_neg1_accepts_sentinel() {
        assert_eq!(or_neg1(-1), Ok(-1));
    }

    #[test]
    fn or_neg1_accepts_non_negative() {
        assert_eq!(or_neg1(0), Ok(0));
        assert_eq!(or_neg1(9), Ok(9));
    }

    #[test]
    fn or_neg1_rejects_below_sentinel() {
        assert_eq!(or_neg1(-2), Err(RevNumError::Negative(-2)));
    }
}
