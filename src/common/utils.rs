//! Common utilities and helper functions

use std::time::{Duration, Instant};

/// Timing utilities
pub struct Timer {
    start: Instant,
    description: String,
}

impl Timer {
    /// Start a new timer
    pub fn start(description: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            description: description.into(),
        }
    }

    /// Get elapsed time
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Stop timer and return elapsed time
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

/// Progress calculation utilities
pub struct ProgressUtils;

impl ProgressUtils {
    /// Percentage of `current` over `total`; zero when there is nothing to do
    pub fn calculate_percentage(current: u64, total: u64) -> f64 {
        if total == 0 {
            0.0
        } else {
            (current as f64 / total as f64) * 100.0
        }
    }
}
