use std::fmt::Display;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub jitter_max: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(20),
            max_backoff: Duration::from_millis(250),
            jitter_max: Some(Duration::from_millis(25)),
        }
    }
}

impl RetryConfig {
    /// Durable hint writes: a lost write only costs a regeneration later,
    /// so keep the budget small.
    pub fn durable_write() -> Self {
        Self {
            max_attempts: 2,
            base_backoff: Duration::from_millis(25),
            max_backoff: Duration::from_millis(100),
            jitter_max: Some(Duration::from_millis(25)),
        }
    }

    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            jitter_max: None,
        }
    }

    fn wait_for(&self, backoff: Duration) -> Duration {
        match self.jitter_max {
            Some(jitter_max) if !jitter_max.is_zero() => {
                let jitter_ms = jitter_max.as_millis() as u64;
                backoff + Duration::from_millis(rand::random::<u64>() % (jitter_ms + 1))
            }
            _ => backoff,
        }
    }
}

/// Runs `f` until it succeeds or the attempt budget is spent, doubling the
/// backoff after every failure. The last error is returned as is.
pub async fn retry_async_with_config<F, Fut, T, E>(
    config: RetryConfig,
    operation: &str,
    mut f: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 0usize;
    let mut backoff = config.base_backoff;

    loop {
        attempt += 1;
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) if attempt >= config.max_attempts.max(1) => return Err(e),
            Err(e) => {
                tracing::debug!(
                    "{} failed (attempt {}/{}): {}",
                    operation,
                    attempt,
                    config.max_attempts,
                    e
                );
                tokio::time::sleep(config.wait_for(backoff)).await;
                backoff = std::cmp::min(backoff * 2, config.max_backoff);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast(max_attempts: usize) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
            jitter_max: None,
        }
    }

    #[tokio::test]
    async fn retry_succeeds_after_transient_failures() {
        let counter = AtomicUsize::new(0);
        let res: Result<usize, &'static str> = retry_async_with_config(fast(3), "flaky", || async {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err("fail")
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(res, Ok(2));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_returns_last_error_after_budget() {
        let counter = AtomicUsize::new(0);
        let res: Result<(), String> = retry_async_with_config(fast(2), "broken", || async {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Err(format!("failure {}", n))
        })
        .await;

        assert_eq!(res, Err("failure 1".to_string()));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn no_retry_runs_once() {
        let counter = AtomicUsize::new(0);
        let res: Result<(), &'static str> =
            retry_async_with_config(RetryConfig::no_retry(), "once", || async {
                counter.fetch_add(1, Ordering::SeqCst);
                Err("nope")
            })
            .await;

        assert!(res.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
