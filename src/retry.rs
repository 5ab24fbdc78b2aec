//! Caller-side bounded retry
//!
//! Sessions fail fast. While a receiver warms up, `fetch_current()` fails
//! with [`ReportUnavailable`](crate::error::GpsdError::ReportUnavailable)
//! for a while before the first report arrives; a [`RetryPolicy`] keeps
//! calling it a fixed number of times with a fixed delay in between.
//!
//! Only transient errors are retried. A session that lost its link returns
//! `NotConnected` on the next attempt, which ends the loop.
//!
//! ```no_run
//! use gpsd_fix::retry::RetryPolicy;
//! use gpsd_fix::session::{SessionConfig, blocking::Session};
//!
//! let mut session = Session::new(SessionConfig::default());
//! session.connect().unwrap();
//!
//! // 5 attempts, 250 ms apart
//! let fix = RetryPolicy::default().run(|_| session.fetch_current());
//! ```

use std::time::Duration;

use tracing::warn;

use crate::Result;

/// Attempts made by [`RetryPolicy::default`]
pub const DEFAULT_ATTEMPTS: u32 = 5;

/// Delay between attempts of [`RetryPolicy::default`]
pub const DEFAULT_DELAY: Duration = Duration::from_millis(250);

/// Fixed-count, fixed-delay retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            attempts: DEFAULT_ATTEMPTS,
            delay: DEFAULT_DELAY,
        }
    }
}

impl RetryPolicy {
    /// A policy making `attempts` tries, `delay` apart
    ///
    /// At least one attempt is always made.
    pub fn new(attempts: u32, delay: Duration) -> Self {
        RetryPolicy {
            attempts: attempts.max(1),
            delay,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Calls `op` until it succeeds, fails permanently, or attempts run out
    ///
    /// `op` receives the 1-based attempt number. The delay is only slept
    /// between attempts. On exhaustion the last error is returned; errors
    /// that are not [transient](crate::error::GpsdError::is_transient) end the loop at once.
    pub fn run<T, F>(&self, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Result<T>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.attempts => {
                    warn!(attempt, of = self.attempts, error = %err, "attempt failed");
                    if !self.delay.is_zero() {
                        std::thread::sleep(self.delay);
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Async counterpart of [`RetryPolicy::run`], sleeping on the tokio timer
    #[cfg(feature = "tokio")]
    pub async fn run_async<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.attempts => {
                    warn!(attempt, of = self.attempts, error = %err, "attempt failed");
                    if !self.delay.is_zero() {
                        tokio::time::sleep(self.delay).await;
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{GpsdError, SourceError};

    /// Fails with ReportUnavailable `failures` times, then yields the attempt number
    fn flaky(failures: u32) -> impl FnMut(u32) -> Result<u32> {
        let mut calls = 0;
        move |attempt| {
            calls += 1;
            assert_eq!(calls, attempt);
            if calls <= failures {
                Err(GpsdError::ReportUnavailable(SourceError::Inactive))
            } else {
                Ok(attempt)
            }
        }
    }

    #[test]
    fn test_retry_bound() {
        let five = RetryPolicy::new(5, Duration::ZERO);
        assert_eq!(five.run(flaky(4)).unwrap(), 5);

        let four = RetryPolicy::new(4, Duration::ZERO);
        assert!(matches!(
            four.run(flaky(4)),
            Err(GpsdError::ReportUnavailable(SourceError::Inactive))
        ));
    }

    #[test]
    fn test_permanent_errors_stop_early() {
        let mut calls = 0;
        let result: Result<()> = RetryPolicy::new(5, Duration::ZERO).run(|_| {
            calls += 1;
            Err(GpsdError::NotConnected)
        });
        assert!(matches!(result, Err(GpsdError::NotConnected)));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_at_least_one_attempt() {
        let policy = RetryPolicy::new(0, Duration::ZERO);
        assert_eq!(policy.attempts(), 1);
        assert_eq!(policy.run(flaky(0)).unwrap(), 1);
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts(), 5);
        assert_eq!(policy.delay(), Duration::from_millis(250));
    }

    #[cfg(feature = "tokio")]
    #[tokio::test]
    async fn test_retry_bound_async() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1));
        let mut op = flaky(4);
        let result = policy.run_async(|attempt| std::future::ready(op(attempt))).await;
        assert_eq!(result.unwrap(), 5);
    }
}
