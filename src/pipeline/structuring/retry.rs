//! Bounded retry with explicit exponential delay growth.
//!
//! The sleep is behind a trait so tests can run the retry loop with a
//! recording fake instead of real delays.

use std::time::Duration;

/// Delays never grow beyond this, whatever the attempt count.
const MAX_DELAY: Duration = Duration::from_secs(30);

pub trait Sleep {
    fn sleep(&self, duration: Duration);
}

/// Real sleeper used outside tests.
pub struct ThreadSleep;

impl Sleep for ThreadSleep {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Recording fake for tests: collects requested delays, sleeps for none.
#[derive(Default)]
pub struct RecordingSleep {
    pub delays: std::sync::Mutex<Vec<Duration>>,
}

impl Sleep for RecordingSleep {
    fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the initial attempt; 3 means up to 4 calls total.
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Delay before retry number `attempt` (0-based): base * 2^attempt,
    /// capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.base_delay.saturating_mul(factor).min(MAX_DELAY)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}
