//! Retry timer shared by outstanding frames and control frames.

use std::time::{Duration, Instant};

/// Deadline plus the number of retries already spent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryTimer {
    deadline: Option<Instant>,
    retries: u8,
}

impl RetryTimer {
    /// Start (or restart) the timer.
    pub fn arm(&mut self, now: Instant, timeout: Duration) {
        self.deadline = Some(now + timeout);
    }

    /// Stop the timer, keeping the retry count.
    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    /// Stop the timer and clear the retry count.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Current deadline, if armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Check if the timer is running.
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Check if the deadline has passed.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Retries spent so far.
    pub fn retries(&self) -> u8 {
        self.retries
    }

    /// Count one more retry.
    pub fn bump(&mut self) {
        self.retries = self.retries.saturating_add(1);
    }
}
