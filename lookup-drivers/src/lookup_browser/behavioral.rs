use rand::rngs::OsRng;
use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Clone, Default)]
/// Produces human-like delays and retry jitter to reduce automation signals.
pub struct BehavioralEngine {}

impl BehavioralEngine {
    pub fn new() -> Self {
        Self {}
    }

    /// Sleep for a random duration between `min` and `max` milliseconds.
    pub async fn random_delay(&self, min: u64, max: u64) {
        sleep(self.jitter(min, max)).await;
    }

    /// Random duration in `[min, max]` milliseconds; bounds may come in either order.
    pub fn jitter(&self, min: u64, max: u64) -> Duration {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        let mut rng = OsRng;
        Duration::from_millis(rng.gen_range(lo..=hi))
    }

    /// Delay before retrying after the `attempt`-th failure (1-based):
    /// `random(min, max) * attempt` milliseconds.
    pub fn backoff_delay(&self, attempt: u32, min: u64, max: u64) -> Duration {
        self.jitter(min, max).saturating_mul(attempt.max(1))
    }
}
