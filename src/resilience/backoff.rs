//! Reconnect delays for socket ports.

use std::time::Duration;

use rand::Rng;

/// Doubling delay schedule between connect attempts.
///
/// The delay after failed attempt `n` is `base << (n - 1)`, never more than
/// `max`, with a random tenth of it added on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    pub fn from_millis(base_ms: u64, max_ms: u64) -> Self {
        Self::new(Duration::from_millis(base_ms), Duration::from_millis(max_ms))
    }

    /// Deterministic part of the delay after `attempt` failures.
    pub fn ceiling(&self, attempt: u32) -> Duration {
        let Some(shift) = attempt.checked_sub(1) else {
            return Duration::ZERO;
        };
        let scale = 1u32.checked_shl(shift).unwrap_or(u32::MAX);
        self.base.saturating_mul(scale).min(self.max)
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        let ceiling = self.ceiling(attempt);
        let spread = ceiling / 10;
        if spread.is_zero() {
            return ceiling;
        }
        ceiling + rand::thread_rng().gen_range(Duration::ZERO..spread)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ceiling_doubles_up_to_max() {
        let backoff = Backoff::from_millis(100, 1_000);
        let ceilings: Vec<_> = (0..6).map(|n| backoff.ceiling(n).as_millis()).collect();
        assert_eq!(ceilings, vec![0, 100, 200, 400, 800, 1_000]);
        assert_eq!(backoff.ceiling(200), Duration::from_millis(1_000));
    }

    #[test]
    fn test_delay_adds_at_most_a_tenth() {
        let backoff = Backoff::from_millis(100, 2_000);
        for attempt in 1..8 {
            let ceiling = backoff.ceiling(attempt);
            let delay = backoff.delay(attempt);
            assert!(delay >= ceiling && delay < ceiling + ceiling / 10 + Duration::from_millis(1));
        }
        assert_eq!(Backoff::from_millis(5, 5).delay(1), Duration::from_millis(5));
    }
}
