// src/throttle.rs

use std::thread;
use std::time::Duration;
use tracing::info;

/// Wait-before-next-batch strategy. The production pipeline uses a fixed
/// delay; the seam exists so tests run without sleeping and so the policy
/// could later become adaptive without touching the stages.
pub trait Throttle {
    fn wait_before_next_batch(&self);
}

/// Fixed cooldown between batches, to stay under the gnomAD server's rate
/// limit.
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    pub fn from_secs(secs: u64) -> Self {
        Self {
            delay: Duration::from_secs(secs),
        }
    }
}

impl Throttle for FixedDelay {
    fn wait_before_next_batch(&self) {
        info!("Cooling down for {} seconds...", self.delay.as_secs());
        thread::sleep(self.delay);
    }
}

/// No-op throttle for tests.
pub struct NoDelay;

impl Throttle for NoDelay {
    fn wait_before_next_batch(&self) {}
}
