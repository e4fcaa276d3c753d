// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! A condition primitive that lets consumers await any mutation to a file.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;

use crate::error::EngineError;

/// Edge-triggered change condition with a steady state of `true`.
///
/// Every successful append or delete calls [`ChangeCondition::signal`],
/// waking all current waiters. A waiter test-and-clears the flag before
/// blocking, so a signal that lands between a waiter's check and its
/// subscription is never missed.
pub(crate) struct ChangeCondition {
    notify: Notify,
    flag: AtomicBool,
}

impl ChangeCondition {
    pub(crate) fn new() -> Self {
        Self {
            notify: Notify::new(),
            flag: AtomicBool::new(true),
        }
    }

    /// Record a change and wake every current waiter.
    pub(crate) fn signal(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Block until the next [`ChangeCondition::signal`] or until `timeout`
    /// elapses, whichever comes first. Returns immediately if a signal
    /// already landed since the last `wait`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TimedOut`] if `timeout` elapses first.
    pub(crate) async fn wait(&self, timeout: Duration) -> Result<(), EngineError> {
        if self.flag.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.flag.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        tokio::time::timeout(timeout, notified)
            .await
            .map_err(|_| EngineError::TimedOut(timeout))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_returns_immediately_in_steady_state() {
        let cond = ChangeCondition::new();
        cond.wait(Duration::from_millis(50)).await.unwrap();
    }

    #[tokio::test]
    async fn wait_times_out_without_a_signal() {
        let cond = ChangeCondition::new();
        cond.wait(Duration::from_millis(20)).await.unwrap();
        let err = cond.wait(Duration::from_millis(20)).await.unwrap_err();
        assert!(matches!(err, EngineError::TimedOut(_)));
    }

    #[tokio::test]
    async fn signal_wakes_a_pending_waiter() {
        let cond = std::sync::Arc::new(ChangeCondition::new());
        cond.wait(Duration::from_millis(10)).await.unwrap();

        let waiter = {
            let cond = std::sync::Arc::clone(&cond);
            tokio::spawn(async move { cond.wait(Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        cond.signal();
        waiter.await.unwrap().unwrap();
    }
}
