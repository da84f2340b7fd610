//! Pacing for repeated background passes.

use rand::Rng;
use std::time::Duration;

use crate::config::ReconcilerConfig;

/// Interval between passes, stretched exponentially while passes stall.
#[derive(Debug, Clone, Copy)]
pub struct PassPacer {
    interval: Duration,
    base: Duration,
    max: Duration,
    stalled: u32,
}

impl PassPacer {
    pub fn new(interval: Duration, base: Duration, max: Duration) -> Self {
        Self {
            interval,
            base,
            max: max.max(base),
            stalled: 0,
        }
    }

    /// Delay before the next pass.
    ///
    /// The fixed interval while healthy; otherwise `base * 2^(stalled - 1)`,
    /// capped at `max`, plus up to 10% jitter.
    pub fn next_delay(&self) -> Duration {
        if self.stalled == 0 {
            return self.interval;
        }

        let factor = 1u32.checked_shl(self.stalled - 1).unwrap_or(u32::MAX);
        let capped = self.base.saturating_mul(factor).min(self.max);

        let spread = capped.as_millis() as u64 / 10;
        let jitter = if spread > 0 {
            rand::thread_rng().gen_range(0..spread)
        } else {
            0
        };
        capped + Duration::from_millis(jitter)
    }

    /// Record the outcome of a pass.
    pub fn record(&mut self, stalled: bool) {
        self.stalled = if stalled { self.stalled.saturating_add(1) } else { 0 };
    }

    pub fn stalled_passes(&self) -> u32 {
        self.stalled
    }
}

impl From<&ReconcilerConfig> for PassPacer {
    fn from(config: &ReconcilerConfig) -> Self {
        Self::new(
            Duration::from_secs(config.interval_secs),
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pacer() -> PassPacer {
        PassPacer::new(
            Duration::from_secs(30),
            Duration::from_secs(1),
            Duration::from_secs(60),
        )
    }

    #[test]
    fn test_interval_while_healthy() {
        let mut p = pacer();
        assert_eq!(p.next_delay(), Duration::from_secs(30));
        p.record(true);
        p.record(false);
        assert_eq!(p.next_delay(), Duration::from_secs(30));
        assert_eq!(p.stalled_passes(), 0);
    }

    #[test]
    fn test_stalls_grow_then_cap() {
        let mut p = pacer();
        p.record(true);
        let first = p.next_delay();
        assert!(first >= Duration::from_secs(1) && first < Duration::from_millis(1100));

        p.record(true);
        p.record(true);
        assert!(p.next_delay() >= Duration::from_secs(4));

        for _ in 0..40 {
            p.record(true);
        }
        let capped = p.next_delay();
        assert!(capped >= Duration::from_secs(60) && capped < Duration::from_secs(66));
    }

    #[test]
    fn test_from_config() {
        let p = PassPacer::from(&ReconcilerConfig::default());
        assert_eq!(p.next_delay(), Duration::from_secs(30));
    }
}
