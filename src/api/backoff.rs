//! Retry backoff state for the TickTick HTTP client.
//!
//! A 429 or transient failure pushes the next attempt out exponentially; a
//! success resets the counter.

use std::time::{Duration, Instant};

/// Backoff state shared by every request made through one client.
#[derive(Debug)]
pub struct RateLimitState {
    /// When requests may resume (None = no active backoff).
    pub backoff_until: Option<Instant>,
    /// Number of consecutive retryable failures.
    pub consecutive_hits: u32,
    pub last_success: Option<Instant>,
    base_delay: Duration,
    max_delay: Duration,
}

impl RateLimitState {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            backoff_until: None,
            consecutive_hits: 0,
            last_success: None,
            base_delay,
            max_delay,
        }
    }

    /// Check if we are currently backing off.
    pub fn is_rate_limited(&self) -> bool {
        self.backoff_until
            .map(|until| Instant::now() < until)
            .unwrap_or(false)
    }

    /// Remaining backoff duration, if any.
    pub fn remaining_backoff(&self) -> Option<Duration> {
        self.backoff_until.and_then(|until| {
            let now = Instant::now();
            if now < until { Some(until - now) } else { None }
        })
    }

    /// Record a retryable failure and return how long to wait.
    ///
    /// The delay is the larger of the server's `Retry-After` and
    /// `base * 2^(hits-1)`, capped at the configured maximum.
    pub fn record_failure(&mut self, retry_after: Option<Duration>) -> Duration {
        self.consecutive_hits += 1;

        let exp = 2u32.saturating_pow(self.consecutive_hits.saturating_sub(1).min(16));
        let exp_backoff = self.base_delay.saturating_mul(exp);
        let delay = retry_after
            .unwrap_or_default()
            .max(exp_backoff)
            .min(self.max_delay);

        self.backoff_until = Some(Instant::now() + delay);

        tracing::warn!(
            retry_after_ms = delay.as_millis() as u64,
            consecutive_hits = self.consecutive_hits,
            "TickTick request failed, backing off"
        );
        delay
    }

    /// Record a successful call: clears the counter and any backoff.
    pub fn record_success(&mut self) {
        self.consecutive_hits = 0;
        self.backoff_until = None;
        self.last_success = Some(Instant::now());
    }
}

impl Default for RateLimitState {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_state_new() {
        let state = RateLimitState::default();
        assert!(!state.is_rate_limited());
        assert_eq!(state.consecutive_hits, 0);
        assert!(state.last_success.is_none());
        assert!(state.remaining_backoff().is_none());
    }

    #[test]
    fn test_exponential_backoff() {
        let mut state = RateLimitState::new(Duration::from_millis(100), Duration::from_secs(60));
        assert_eq!(state.record_failure(None), Duration::from_millis(100));
        assert_eq!(state.record_failure(None), Duration::from_millis(200));
        assert_eq!(state.record_failure(None), Duration::from_millis(400));
        assert_eq!(state.consecutive_hits, 3);
        assert!(state.is_rate_limited());
    }

    #[test]
    fn test_retry_after_wins_when_larger() {
        let mut state = RateLimitState::new(Duration::from_millis(100), Duration::from_secs(60));
        let delay = state.record_failure(Some(Duration::from_secs(5)));
        assert_eq!(delay, Duration::from_secs(5));
    }

    #[test]
    fn test_backoff_capped() {
        let mut state = RateLimitState::new(Duration::from_secs(1), Duration::from_secs(3));
        for _ in 0..10 {
            state.record_failure(None);
        }
        assert_eq!(state.record_failure(Some(Duration::from_secs(30))), Duration::from_secs(3));
    }

    #[test]
    fn test_record_success_resets() {
        let mut state = RateLimitState::default();
        state.record_failure(None);
        state.record_success();
        assert_eq!(state.consecutive_hits, 0);
        assert!(!state.is_rate_limited());
        assert!(state.last_success.is_some());
    }
}
