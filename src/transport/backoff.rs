//! Bounded reconnection with exponential backoff and jitter.

use std::time::Duration;

use crate::config::ReconnectSettings;

/// Reconnection policy for streaming transports.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl ReconnectPolicy {
    /// Single attempt, no backoff. Used outside production posture.
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
        }
    }

    pub fn from_settings(settings: &ReconnectSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            multiplier: settings.multiplier,
        }
    }

    /// Nominal delay before retry number `attempt` (1-based; attempt 1 is the
    /// retry after the first failure).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let nominal = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::from_secs_f64(nominal.min(self.max_delay.as_secs_f64()))
    }

    /// Delay with jitter applied: 75%-125% of the nominal delay.
    pub fn jittered_delay_for(&self, attempt: u32) -> Duration {
        let nominal = self.delay_for(attempt);
        let jitter_factor = 0.75 + (rand_factor() * 0.5);
        Duration::from_secs_f64(nominal.as_secs_f64() * jitter_factor)
    }

    /// Sum of nominal delays across the whole budget, for error reporting.
    pub fn total_budget(&self) -> Duration {
        (1..self.max_attempts).map(|attempt| self.delay_for(attempt)).sum()
    }
}

/// Simple pseudo-random factor [0, 1) without pulling in the rand crate.
fn rand_factor() -> f64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
        .hash(&mut hasher);
    std::thread::current().id().hash(&mut hasher);

    let hash = hasher.finish();
    (hash % 10000) as f64 / 10000.0
}
