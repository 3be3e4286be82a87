//! Bounded retry with session recovery between attempts.

use std::future::Future;

use tracing::warn;

use crate::error::ScrapeError;

#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Always at least 1.
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }
}

/// Run `attempt` up to `policy.max_attempts` times. After each failure that
/// still leaves attempts on the table, `recover` runs (a full session
/// recycle in practice) before the next try. The last error wins.
pub async fn run_with_recovery<T, A, AF, R, RF>(
    policy: RetryPolicy,
    label: &str,
    mut attempt: A,
    mut recover: R,
) -> Result<T, ScrapeError>
where
    A: FnMut(u32) -> AF,
    AF: Future<Output = Result<T, ScrapeError>>,
    R: FnMut() -> RF,
    RF: Future<Output = Result<(), ScrapeError>>,
{
    let mut last_err = ScrapeError::Browser(format!("{}: no attempts executed", label));
    for n in 1..=policy.max_attempts {
        match attempt(n).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!("{} attempt {}/{} failed: {}", label, n, policy.max_attempts, e);
                last_err = e;
            }
        }
        if n < policy.max_attempts {
            if let Err(e) = recover().await {
                warn!("{} recovery after attempt {} failed: {}", label, n, e);
                last_err = e;
            }
        }
    }
    Err(last_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test]
    async fn succeeds_without_recovery() {
        let recoveries = Cell::new(0u32);
        let out = run_with_recovery(
            RetryPolicy::new(3),
            "test",
            |_| async { Ok::<_, ScrapeError>(42) },
            || {
                recoveries.set(recoveries.get() + 1);
                async { Ok(()) }
            },
        )
        .await;
        assert_eq!(out.unwrap(), 42);
        assert_eq!(recoveries.get(), 0);
    }

    #[tokio::test]
    async fn recovers_then_succeeds() {
        let recoveries = Cell::new(0u32);
        let out = run_with_recovery(
            RetryPolicy::new(3),
            "test",
            |n| async move {
                if n < 3 {
                    Err(ScrapeError::NavigationTimeout("slow".into()))
                } else {
                    Ok("done")
                }
            },
            || {
                recoveries.set(recoveries.get() + 1);
                async { Ok(()) }
            },
        )
        .await;
        assert_eq!(out.unwrap(), "done");
        assert_eq!(recoveries.get(), 2);
    }

    #[tokio::test]
    async fn surfaces_last_error_after_exhaustion() {
        let attempts = Cell::new(0u32);
        let out: Result<(), _> = run_with_recovery(
            RetryPolicy::new(2),
            "test",
            |n| {
                attempts.set(attempts.get() + 1);
                async move { Err(ScrapeError::ElementNotFound(format!("attempt {}", n))) }
            },
            || async { Ok(()) },
        )
        .await;
        assert_eq!(attempts.get(), 2);
        match out {
            Err(ScrapeError::ElementNotFound(msg)) => assert_eq!(msg, "attempt 2"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn no_recovery_after_final_attempt() {
        let recoveries = Cell::new(0u32);
        let _ = run_with_recovery(
            RetryPolicy::new(1),
            "test",
            |_| async { Err::<(), _>(ScrapeError::Browser("boom".into())) },
            || {
                recoveries.set(recoveries.get() + 1);
                async { Ok(()) }
            },
        )
        .await;
        assert_eq!(recoveries.get(), 0);
    }
}
