//! Bounded retry with a fixed pause between attempts.

use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::config::ResolverConfig;

/// How often and how patiently a candidate command is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first one).
    pub max_attempts: u32,
    /// Pause before every attempt after the first.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: ResolverConfig::ATTEMPTS_PER_CANDIDATE,
            delay: ResolverConfig::RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// What happened during a retried operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryStats {
    pub attempts: u32,
    pub total_delay: Duration,
    pub last_error: Option<String>,
}

/// Run `operation` until it succeeds, fails with an error `should_retry`
/// rejects, or the policy's attempts are used up.
pub async fn retry_async<F, Fut, T, E>(
    policy: &RetryPolicy,
    mut operation: F,
    should_retry: impl Fn(&E) -> bool,
) -> (Result<T, E>, RetryStats)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut stats = RetryStats::default();
    let max_attempts = policy.max_attempts.max(1);

    loop {
        stats.attempts += 1;
        let error = match operation().await {
            Ok(value) => return (Ok(value), stats),
            Err(e) => e,
        };
        stats.last_error = Some(error.to_string());

        if !should_retry(&error) {
            debug!("Attempt {} failed, not retrying: {}", stats.attempts, error);
            return (Err(error), stats);
        }
        if stats.attempts >= max_attempts {
            debug!("All {} attempts failed. Last error: {}", max_attempts, error);
            return (Err(error), stats);
        }

        debug!(
            "Attempt {}/{} failed: {}. Retrying in {:?}",
            stats.attempts, max_attempts, error, policy.delay
        );
        stats.total_delay += policy.delay;
        tokio::time::sleep(policy.delay).await;
    }
}
