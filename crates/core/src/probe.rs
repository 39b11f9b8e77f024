//! Bounded readiness polling.
//!
//! Polling runs at a fixed cadence with no exponential backoff, so the worst
//! case wait is always `max_attempts × interval`.

use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// How many times to check and how long to wait between failed checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Upper bound on the time [`poll`] can take, excluding the checks themselves.
    pub fn ceiling(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

/// Outcome of a polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// A check passed on the given attempt (1-based).
    Ready { attempts: u32 },

    /// Every attempt failed.
    TimedOut { attempts: u32 },
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready { .. })
    }
}

/// Run `check` until it returns `true` or the attempt budget is spent.
///
/// Sleeps `policy.interval` after each failed attempt except the last one.
/// At least one check is always made.
pub async fn poll<F, Fut>(mut check: F, policy: RetryPolicy) -> Readiness
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        if check().await {
            return Readiness::Ready { attempts: attempt };
        }
        debug!(attempt, max_attempts, "check not passing yet");
        if attempt < max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }

    Readiness::TimedOut {
        attempts: max_attempts,
    }
}
