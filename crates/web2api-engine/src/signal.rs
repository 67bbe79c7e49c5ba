//! Cooperative cancellation shared by every suspension point of a request.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// External predicate polled alongside the token.
pub type StopChecker = Arc<dyn Fn() -> bool + Send + Sync>;

/// Longest uninterrupted sleep; bounds cancellation latency.
const SLICE: Duration = Duration::from_millis(100);

/// Cancellation for one request.
///
/// Trips when the token is cancelled or the optional checker returns `true`.
/// Once tripped it stays tripped.
#[derive(Clone, Default)]
pub struct StopSignal {
    token: CancellationToken,
    checker: Option<StopChecker>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install an external stop predicate.
    pub fn set_stop_checker(&mut self, checker: StopChecker) {
        self.checker = Some(checker);
    }

    pub fn with_checker(mut self, checker: StopChecker) -> Self {
        self.set_stop_checker(checker);
        self
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        if self.token.is_cancelled() {
            return true;
        }
        match &self.checker {
            Some(checker) if checker() => {
                self.token.cancel();
                true
            }
            _ => false,
        }
    }

    /// Sleep for `duration` in slices of at most 100ms.
    ///
    /// Returns `false` as soon as the signal trips, `true` if the full
    /// duration elapsed.
    pub async fn sleep(&self, duration: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + duration;
        loop {
            if self.is_stopped() {
                return false;
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return true;
            }
            let slice = (deadline - now).min(SLICE);
            tokio::select! {
                _ = self.token.cancelled() => return false,
                _ = tokio::time::sleep(slice) => {}
            }
        }
    }
}

impl std::fmt::Debug for StopSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StopSignal")
            .field("cancelled", &self.token.is_cancelled())
            .field("has_checker", &self.checker.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_sleep_completes() {
        let stop = StopSignal::new();
        let start = tokio::time::Instant::now();
        assert!(stop.sleep(Duration::from_millis(350)).await);
        assert_eq!(start.elapsed(), Duration::from_millis(350));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_interrupted_by_cancel() {
        let stop = StopSignal::new();
        let cancel = stop.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(250)).await;
            cancel.cancel();
        });

        let start = tokio::time::Instant::now();
        assert!(!stop.sleep(Duration::from_secs(10)).await);
        assert!(start.elapsed() <= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_checker_observed_within_a_slice() {
        let flag = Arc::new(AtomicBool::new(false));
        let stop = StopSignal::new().with_checker({
            let flag = flag.clone();
            Arc::new(move || flag.load(Ordering::SeqCst))
        });

        let setter = flag.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(420)).await;
            setter.store(true, Ordering::SeqCst);
        });

        let start = tokio::time::Instant::now();
        assert!(!stop.sleep(Duration::from_secs(5)).await);
        assert!(start.elapsed() <= Duration::from_millis(500));
        // The checker trips the token for everyone else.
        assert!(stop.token().is_cancelled());
    }

    #[test]
    fn test_stays_stopped() {
        let stop = StopSignal::new();
        assert!(!stop.is_stopped());
        stop.clone().cancel();
        assert!(stop.is_stopped());
    }
}
