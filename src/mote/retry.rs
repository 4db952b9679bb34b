//! Reconnection backoff and stability tracking
//!
//! The retry counter counts disconnect-triggered reconnects since the last
//! reset. It resets when the session is (re)initialized and once a connection
//! has stayed up for the stability window, so a later disconnect starts the
//! backoff from the beginning.

use std::time::{Duration, Instant};

/// Exponent cap: from the third retry on, the delay stays at `base << 3`
const MAX_BACKOFF_SHIFT: u32 = 3;

/// Reconnection policy
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Maximum number of reconnect attempts (None = unlimited)
    pub max_attempts: Option<u32>,
    /// Base delay doubled per attempt until the cap
    pub base_delay: Duration,
    /// Uptime after which the attempt counter resets
    pub stability_window: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: None,
            base_delay: Duration::from_secs(2),
            stability_window: Duration::from_secs(5),
        }
    }
}

/// Backoff delay for the n-th retry (1-based): `base << min(n, 3)`
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1 << attempt.min(MAX_BACKOFF_SHIFT))
}

/// Mutable retry state owned by the state machine
#[derive(Debug, Clone, Default)]
pub struct RetryState {
    attempts: u32,
    stable_deadline: Option<Instant>,
}

impl RetryState {
    /// Retries performed since the last reset
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Forget all retry history
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.stable_deadline = None;
    }

    /// Record a fresh connection; stability is reached once it survives the
    /// policy window
    pub fn mark_connected(&mut self, now: Instant, policy: &ReconnectPolicy) {
        self.stable_deadline = Some(now + policy.stability_window);
    }

    /// Reset the counter if the connection has proven stable
    pub fn note_stable(&mut self, now: Instant) {
        if let Some(deadline) = self.stable_deadline {
            if now >= deadline {
                self.attempts = 0;
                self.stable_deadline = None;
            }
        }
    }

    /// Whether the policy allows no further retry
    pub fn exhausted(&self, policy: &ReconnectPolicy) -> bool {
        policy
            .max_attempts
            .is_some_and(|limit| self.attempts >= limit)
    }

    /// Count one more retry and return its backoff delay
    pub fn next_delay(&mut self, policy: &ReconnectPolicy) -> Duration {
        self.attempts = self.attempts.saturating_add(1);
        backoff_delay(policy.base_delay, self.attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Duration = Duration::from_secs(2);

    #[test]
    fn test_backoff_delay_sequence() {
        // attempts 1..=5 from base B: 2B, 4B, 8B, 8B, 8B
        assert_eq!(backoff_delay(BASE, 1), BASE * 2);
        assert_eq!(backoff_delay(BASE, 2), BASE * 4);
        assert_eq!(backoff_delay(BASE, 3), BASE * 8);
        assert_eq!(backoff_delay(BASE, 4), BASE * 8);
        assert_eq!(backoff_delay(BASE, 5), BASE * 8);
    }

    #[test]
    fn test_next_delay_counts_attempts() {
        let policy = ReconnectPolicy::default();
        let mut retry = RetryState::default();

        let delays: Vec<Duration> = (0..4).map(|_| retry.next_delay(&policy)).collect();
        assert_eq!(
            delays,
            vec![BASE * 2, BASE * 4, BASE * 8, BASE * 8],
            "delays must double then hold at the cap"
        );
        assert_eq!(retry.attempts(), 4);
    }

    #[test]
    fn test_stability_resets_counter() {
        let policy = ReconnectPolicy::default();
        let mut retry = RetryState::default();
        let start = Instant::now();

        retry.next_delay(&policy);
        retry.next_delay(&policy);
        assert_eq!(retry.attempts(), 2);

        retry.mark_connected(start, &policy);
        retry.note_stable(start + policy.stability_window);
        assert_eq!(retry.attempts(), 0);

        // next disconnect starts from the beginning again
        assert_eq!(retry.next_delay(&policy), BASE * 2);
    }

    #[test]
    fn test_stability_not_reached_keeps_counter() {
        let policy = ReconnectPolicy::default();
        let mut retry = RetryState::default();
        let start = Instant::now();

        retry.next_delay(&policy);
        retry.mark_connected(start, &policy);
        retry.note_stable(start + policy.stability_window / 2);

        assert_eq!(retry.attempts(), 1);
        assert_eq!(retry.next_delay(&policy), BASE * 4);
    }

    #[test]
    fn test_exhaustion() {
        let policy = ReconnectPolicy {
            max_attempts: Some(2),
            ..ReconnectPolicy::default()
        };
        let mut retry = RetryState::default();

        assert!(!retry.exhausted(&policy));
        retry.next_delay(&policy);
        assert!(!retry.exhausted(&policy));
        retry.next_delay(&policy);
        assert!(retry.exhausted(&policy));
    }

    #[test]
    fn test_unlimited_policy_never_exhausts() {
        let policy = ReconnectPolicy::default();
        let mut retry = RetryState::default();
        for _ in 0..100 {
            retry.next_delay(&policy);
        }
        assert!(!retry.exhausted(&policy));
    }
}
