use std::{cell::Cell, thread, time::Duration};

use backon::{BlockingRetryable, ConstantBuilder};
use lockbox_core::{StorageError, StorageResult};
use tracing::{debug, warn};

/// Bounded retry with a fixed pause, absorbing transient file lock contention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            delay: Duration::from_millis(100),
        }
    }
}

/// Outcome of one failed attempt.
pub(crate) enum Attempt {
    /// Transient; worth another try after the pause.
    Retry(String),
    /// Final; returned to the caller as is.
    Fatal(StorageError),
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// Run `op` until it succeeds, fails fatally, or the attempts run out.
    /// There is no cancellation: the loop always runs to one of those ends.
    pub(crate) fn run<T>(
        &self,
        operation: &'static str,
        mut op: impl FnMut() -> Result<T, Attempt>,
    ) -> StorageResult<T> {
        let attempts = self.attempts.max(1);
        let attempt = Cell::new(0u32);
        let backoff = ConstantBuilder::default()
            .with_delay(self.delay)
            .with_max_times((attempts - 1) as usize);

        let result = (|| {
            attempt.set(attempt.get() + 1);
            op()
        })
        .retry(backoff)
        .sleep(thread::sleep)
        .when(|err| matches!(err, Attempt::Retry(_)))
        .notify(|err, _| {
            if let Attempt::Retry(reason) = err {
                warn!(operation, attempt = attempt.get(), %reason, "attempt failed");
            }
        })
        .call();

        match result {
            Ok(value) => {
                if attempt.get() > 1 {
                    debug!(operation, attempt = attempt.get(), "succeeded after retry");
                }
                Ok(value)
            }
            Err(Attempt::Fatal(err)) => Err(err),
            Err(Attempt::Retry(last_error)) => {
                warn!(operation, attempts, %last_error, "giving up");
                Err(StorageError::RetryExhausted {
                    operation,
                    attempts,
                    last_error,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::from_millis(1))
    }

    #[test]
    fn defaults_to_ten_attempts_100ms_apart() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts, 10);
        assert_eq!(policy.delay, Duration::from_millis(100));
    }

    #[test]
    fn succeeds_after_transient_failures() {
        let mut calls = 0;
        let result = fast(10).run("save", || {
            calls += 1;
            if calls < 10 {
                Err(Attempt::Retry("locked".into()))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result, Ok(10));
    }

    #[test]
    fn reports_exhaustion_with_last_error() {
        let mut calls = 0;
        let result: StorageResult<()> = fast(3).run("delete", || {
            calls += 1;
            Err(Attempt::Retry(format!("locked #{calls}")))
        });
        assert_eq!(calls, 3);
        assert_eq!(
            result,
            Err(StorageError::RetryExhausted {
                operation: "delete",
                attempts: 3,
                last_error: "locked #3".into(),
            })
        );
    }

    #[test]
    fn fatal_errors_stop_immediately() {
        let mut calls = 0;
        let result: StorageResult<()> = fast(5).run("load", || {
            calls += 1;
            Err(Attempt::Fatal(StorageError::storage("boom")))
        });
        assert_eq!(calls, 1);
        assert_eq!(result, Err(StorageError::storage("boom")));
    }

    #[test]
    fn waits_between_attempts() {
        let started = std::time::Instant::now();
        let mut calls = 0;
        let policy = RetryPolicy::new(3, Duration::from_millis(20));
        let _ = policy.run("save", || -> Result<(), Attempt> {
            calls += 1;
            Err(Attempt::Retry("busy".into()))
        });
        assert_eq!(calls, 3);
        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let mut calls = 0;
        let _ = fast(0).run("save", || -> Result<(), Attempt> {
            calls += 1;
            Err(Attempt::Retry("x".into()))
        });
        assert_eq!(calls, 1);
    }
}
