//! Bounded polling policies for eventually-consistent platform reads.

use std::time::Duration;

/// How the delay between polls grows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    Fixed,
    Exponential { factor: f64, max_delay: Duration },
}

/// Attempt count and delay schedule for one reconciliation loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    pub attempts: u32,
    pub delay: Duration,
    pub backoff: Backoff,
}

impl PollPolicy {
    pub const fn fixed(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts,
            delay,
            backoff: Backoff::Fixed,
        }
    }

    pub fn exponential(attempts: u32, delay: Duration, factor: f64, max_delay: Duration) -> Self {
        Self {
            attempts,
            delay,
            backoff: Backoff::Exponential { factor, max_delay },
        }
    }

    /// Conference lookup by friendly name: 20 tries, 500ms apart.
    pub const fn conference() -> Self {
        Self::fixed(20, Duration::from_millis(500))
    }

    /// Participant connection: 20 tries, 300ms apart.
    pub const fn participant() -> Self {
        Self::fixed(20, Duration::from_millis(300))
    }

    /// Call reaching in-progress: 10 tries, 500ms apart.
    pub const fn call() -> Self {
        Self::fixed(10, Duration::from_millis(500))
    }

    /// Delay to sleep after the zero-based `attempt` failed.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential { factor, max_delay } => {
                let scaled = self.delay.as_secs_f64() * factor.max(1.0).powi(attempt as i32);
                Duration::from_secs_f64(scaled.min(max_delay.as_secs_f64()))
            }
        }
    }

    /// Worst-case total sleep across all attempts.
    pub fn budget(&self) -> Duration {
        (0..self.attempts.saturating_sub(1))
            .map(|attempt| self.delay_for(attempt))
            .sum()
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::conference()
    }
}
