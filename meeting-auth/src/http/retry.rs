//! Backoff for provider calls that sit on a participant's click path.

use std::time::{Duration, SystemTime};

use reqwest_retry::{RetryDecision, RetryPolicy};

const FIRST_DELAY: Duration = Duration::from_millis(250);
const MAX_DELAY: Duration = Duration::from_secs(4);

/// Doubling backoff limited by attempt count and by a wall-clock budget.
///
/// `RetryTransientMiddleware` decides which failures are transient (connect errors,
/// 5xx, 429). This policy only schedules the next attempt, and gives up once the
/// next attempt would start after `budget` has elapsed since the first one.
#[derive(Debug, Clone)]
pub struct BoundedBackoff {
    max_retries: u32,
    budget: Duration,
}

impl BoundedBackoff {
    /// `max_retries` of zero disables retries.
    pub fn new(max_retries: u32, budget: Duration) -> Self {
        Self {
            max_retries,
            budget,
        }
    }

    fn delay(n_past_retries: u32) -> Duration {
        FIRST_DELAY
            .checked_mul(1u32 << n_past_retries.min(16))
            .map_or(MAX_DELAY, |delay| delay.min(MAX_DELAY))
    }
}

impl RetryPolicy for BoundedBackoff {
    fn should_retry(&self, request_start_time: SystemTime, n_past_retries: u32) -> RetryDecision {
        if n_past_retries >= self.max_retries {
            return RetryDecision::DoNotRetry;
        }

        let execute_after = SystemTime::now() + Self::delay(n_past_retries);
        let elapsed_at_retry = execute_after
            .duration_since(request_start_time)
            .unwrap_or_default();
        if elapsed_at_retry > self.budget {
            return RetryDecision::DoNotRetry;
        }

        RetryDecision::Retry { execute_after }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_up_to_the_cap() {
        assert_eq!(BoundedBackoff::delay(0), Duration::from_millis(250));
        assert_eq!(BoundedBackoff::delay(1), Duration::from_millis(500));
        assert_eq!(BoundedBackoff::delay(3), Duration::from_secs(2));
        assert_eq!(BoundedBackoff::delay(10), MAX_DELAY);
        assert_eq!(BoundedBackoff::delay(40), MAX_DELAY);
    }

    #[test]
    fn test_zero_retries_never_retries() {
        let policy = BoundedBackoff::new(0, Duration::from_secs(30));

        assert!(matches!(
            policy.should_retry(SystemTime::now(), 0),
            RetryDecision::DoNotRetry
        ));
    }

    #[test]
    fn test_retries_within_budget() {
        let policy = BoundedBackoff::new(3, Duration::from_secs(30));

        assert!(matches!(
            policy.should_retry(SystemTime::now(), 1),
            RetryDecision::Retry { .. }
        ));
        assert!(matches!(
            policy.should_retry(SystemTime::now(), 3),
            RetryDecision::DoNotRetry
        ));
    }

    #[test]
    fn test_exhausted_budget_stops_retrying() {
        let policy = BoundedBackoff::new(5, Duration::from_secs(10));
        let started = SystemTime::now() - Duration::from_secs(9);

        assert!(matches!(
            policy.should_retry(started, 2),
            RetryDecision::DoNotRetry
        ));
    }
}
