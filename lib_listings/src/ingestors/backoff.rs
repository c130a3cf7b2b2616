//! Reconnect attempt counter on top of [`ReconnectPolicy`].

use std::time::Duration;

use crate::configs::ReconnectPolicy;

/// # Backoff
///
/// Counts consecutive failed or closed connections. A successful connect resets
/// it, so the next failure waits one step again.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: ReconnectPolicy,
    attempt: u32,
}

impl Backoff {
    /// Fresh counter at zero.
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    /// Attempts since the last successful connect.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Records a failure/close and returns how long to wait before reconnecting.
    pub fn next_delay(&mut self) -> Duration {
        self.attempt = self.attempt.saturating_add(1);
        self.policy.delay_for(self.attempt)
    }

    /// Called on a successful connect.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_linearly_until_cap() {
        let mut backoff = Backoff::new(ReconnectPolicy::default());
        for n in 1..=40u64 {
            let expected = Duration::from_millis((1_000 * n).min(30_000));
            assert_eq!(backoff.next_delay(), expected, "attempt {n}");
            assert_eq!(u64::from(backoff.attempt()), n);
        }
    }

    #[test]
    fn reset_restarts_from_first_step() {
        let mut backoff = Backoff::new(ReconnectPolicy::default());
        for _ in 0..17 {
            backoff.next_delay();
        }
        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_millis(1_000));
        assert_eq!(backoff.attempt(), 1);
    }
}
