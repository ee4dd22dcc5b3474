//! Run statistics and final reporting

use crate::common::ProgressUtils;
use crate::logging::Logger;
use crate::replication::task::TaskOutcome;
use std::time::{Duration, Instant};

const STEP: &str = "Final Statistics";

/// Counters for one run; only ever incremented
#[derive(Debug, Clone)]
pub struct RunStatistics {
    /// Tasks known to the run (configured images, or discovered tags so far)
    pub planned: usize,
    /// Tasks that reached a terminal outcome
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub start_time: Instant,
    /// Frozen by [`RunStatistics::finish`]
    pub elapsed: Option<Duration>,
}

impl Default for RunStatistics {
    fn default() -> Self {
        Self::new(0)
    }
}

impl RunStatistics {
    pub fn new(planned: usize) -> Self {
        Self {
            planned,
            total: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            start_time: Instant::now(),
            elapsed: None,
        }
    }

    pub fn add_planned(&mut self, count: usize) {
        self.planned += count;
    }

    pub fn record(&mut self, outcome: TaskOutcome) {
        self.total += 1;
        match outcome {
            TaskOutcome::Succeeded => self.succeeded += 1,
            TaskOutcome::Skipped => self.skipped += 1,
            TaskOutcome::Failed => self.failed += 1,
        }
    }

    /// Planned tasks never attempted (abort or interrupt)
    pub fn unprocessed(&self) -> usize {
        self.planned.saturating_sub(self.total)
    }

    /// Succeeded over planned, as a percentage
    pub fn success_rate(&self) -> f64 {
        ProgressUtils::calculate_percentage(self.succeeded as u64, self.planned as u64)
    }

    pub fn finish(&mut self) {
        if self.elapsed.is_none() {
            self.elapsed = Some(self.start_time.elapsed());
        }
    }

    pub fn duration(&self) -> Duration {
        self.elapsed.unwrap_or_else(|| self.start_time.elapsed())
    }

    /// Emit the `STATS_*` lines and a console summary
    pub fn report(&self, output: &Logger, title: &str) {
        let duration = self.duration();
        output.info(STEP, "STATS_HEADER", title);
        output.info(
            STEP,
            "STATS_DURATION",
            &format!(
                "Total duration: {:.2} seconds ({})",
                duration.as_secs_f64(),
                output.format_duration(duration)
            ),
        );
        output.info(STEP, "STATS_TOTAL", &format!("Planned: {}", self.planned));
        output.info(STEP, "STATS_PROCESSED", &format!("Processed: {}", self.total));
        output.info(STEP, "STATS_SUCCESS", &format!("Successful: {}", self.succeeded));
        output.info(
            STEP,
            "STATS_SKIPPED",
            &format!("Already existed (skipped): {}", self.skipped),
        );
        output.info(STEP, "STATS_FAILED", &format!("Failed: {}", self.failed));
        if self.unprocessed() > 0 {
            output.info(
                STEP,
                "STATS_UNPROCESSED",
                &format!("Not attempted: {}", self.unprocessed()),
            );
        }
        output.info(
            STEP,
            "STATS_RATE",
            &format!("Success rate: {:.1}%", self.success_rate()),
        );

        output.summary_kv(
            title,
            &[
                ("Duration", output.format_duration(duration)),
                ("Planned", self.planned.to_string()),
                ("Succeeded", self.succeeded.to_string()),
                ("Skipped", self.skipped.to_string()),
                ("Failed", self.failed.to_string()),
                ("Not attempted", self.unprocessed().to_string()),
                ("Success rate", format!("{:.1}%", self.success_rate())),
            ],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_and_rate() {
        let mut stats = RunStatistics::new(5);
        stats.record(TaskOutcome::Succeeded);
        stats.record(TaskOutcome::Failed);

        assert_eq!(stats.total, 2);
        assert_eq!(stats.unprocessed(), 3);
        assert_eq!(stats.success_rate(), 20.0);
    }

    #[test]
    fn test_empty_run_rate_is_zero() {
        assert_eq!(RunStatistics::new(0).success_rate(), 0.0);
    }

    #[test]
    fn test_finish_freezes_elapsed() {
        let mut stats = RunStatistics::new(1);
        stats.finish();
        let first = stats.duration();
        std::thread::sleep(Duration::from_millis(5));
        stats.finish();
        assert_eq!(stats.duration(), first);
    }

    #[test]
    fn test_report_codes() {
        let logger = Logger::capturing();
        let mut stats = RunStatistics::new(3);
        stats.record(TaskOutcome::Skipped);
        stats.finish();
        stats.report(&logger, "MIRROR OPERATION COMPLETE");

        for code in ["STATS_HEADER", "STATS_DURATION", "STATS_SUCCESS", "STATS_UNPROCESSED", "STATS_RATE"] {
            assert_eq!(logger.records_with_code(code).len(), 1, "{}", code);
        }
    }
}
