//! Bounded retry with a fixed delay and a per-attempt classifier
//!
//! An attempt closure reports [`AttemptOutcome::Success`], a retryable
//! failure, or a terminal failure. Terminal failures stop immediately;
//! retryable ones consume attempts until `max_attempts` is reached.

use crate::common::interrupt::InterruptFlag;
use crate::common::utils::Timer;
use crate::error::{ReplicationError, Result};
use crate::logging::Logger;
use std::fmt;
use std::future::Future;
use std::time::Duration;

/// Result of a single attempt as seen by the classifier
#[derive(Debug)]
pub enum AttemptOutcome<T> {
    Success(T),
    Retryable(ReplicationError),
    Terminal(ReplicationError),
}

impl<T> AttemptOutcome<T> {
    /// Classify a plain result by the error's own retryability
    pub fn from_result(result: Result<T>) -> Self {
        match result {
            Ok(value) => AttemptOutcome::Success(value),
            Err(err) if err.is_retryable() => AttemptOutcome::Retryable(err),
            Err(err) => AttemptOutcome::Terminal(err),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStatus {
    Success,
    RetryableFailure,
    TerminalFailure,
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptStatus::Success => write!(f, "success"),
            AttemptStatus::RetryableFailure => write!(f, "retryable-failure"),
            AttemptStatus::TerminalFailure => write!(f, "terminal-failure"),
        }
    }
}

/// Record of one attempt inside a retry loop
#[derive(Debug, Clone)]
pub struct TransferAttempt {
    pub operation: String,
    pub attempt: u32,
    pub status: AttemptStatus,
    pub duration: Duration,
}

/// Names used when logging a retry loop
#[derive(Debug, Clone, Copy)]
pub struct RetryLabel<'a> {
    /// Step column of the log line, e.g. "Docker Command"
    pub step: &'a str,
    /// Code prefix, e.g. "DOCKER" yields `DOCKER_RETRY`, `DOCKER_TIMEOUT`
    pub prefix: &'a str,
    /// Human-readable operation, e.g. the full command line
    pub operation: &'a str,
    /// Once raised, no further attempt starts
    pub interrupt: Option<&'a InterruptFlag>,
}

impl RetryLabel<'_> {
    fn interrupted(&self) -> bool {
        self.interrupt.is_some_and(InterruptFlag::is_raised)
    }
}

/// Final result of a retry loop together with every attempt made
#[derive(Debug)]
pub struct RetryRun<T> {
    pub result: Result<T>,
    pub attempts: Vec<TransferAttempt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Single attempt, no delay
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub async fn execute<T, F, Fut>(&self, logger: &Logger, label: RetryLabel<'_>, attempt: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = AttemptOutcome<T>>,
    {
        self.execute_with_history(logger, label, attempt).await.result
    }

    pub async fn execute_with_history<T, F, Fut>(
        &self,
        logger: &Logger,
        label: RetryLabel<'_>,
        mut attempt: F,
    ) -> RetryRun<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = AttemptOutcome<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempts = Vec::new();
        let mut last_error = None;

        for number in 1..=max_attempts {
            if label.interrupted() {
                let error = ReplicationError::Interrupted;
                logger.warning(
                    label.step,
                    &format!("{}_{}", label.prefix, error.code()),
                    &format!(
                        "Stop requested, not starting attempt {}/{}: {}",
                        number, max_attempts, label.operation
                    ),
                );
                return RetryRun {
                    result: Err(error),
                    attempts,
                };
            }

            logger.info(
                label.step,
                &format!("{}_RUNNING", label.prefix),
                &format!("Attempt {}/{}: {}", number, max_attempts, label.operation),
            );

            let timer = Timer::start(label.operation);
            let outcome = attempt(number).await;
            let duration = timer.stop();

            let (status, error) = match outcome {
                AttemptOutcome::Success(value) => {
                    attempts.push(TransferAttempt {
                        operation: label.operation.to_string(),
                        attempt: number,
                        status: AttemptStatus::Success,
                        duration,
                    });
                    logger.info(
                        label.step,
                        &format!("{}_SUCCESS", label.prefix),
                        &format!(
                            "Successful: {} ({:.2}s)",
                            label.operation,
                            duration.as_secs_f64()
                        ),
                    );
                    return RetryRun {
                        result: Ok(value),
                        attempts,
                    };
                }
                AttemptOutcome::Retryable(err) => (AttemptStatus::RetryableFailure, err),
                AttemptOutcome::Terminal(err) => (AttemptStatus::TerminalFailure, err),
            };

            attempts.push(TransferAttempt {
                operation: label.operation.to_string(),
                attempt: number,
                status,
                duration,
            });
            logger.error(
                label.step,
                &format!("{}_{}", label.prefix, error.code()),
                &format!(
                    "Attempt {} failed after {:.2}s: {} | {}",
                    number,
                    duration.as_secs_f64(),
                    label.operation,
                    error
                ),
            );

            if status == AttemptStatus::TerminalFailure {
                return RetryRun {
                    result: Err(error),
                    attempts,
                };
            }

            last_error = Some(error);
            if number < max_attempts && !label.interrupted() {
                logger.info(
                    label.step,
                    &format!("{}_RETRY", label.prefix),
                    &format!("Retrying in {}s", self.delay.as_secs_f64()),
                );
                if !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }
            }
        }

        logger.error(
            label.step,
            &format!("{}_RETRIES_EXHAUSTED", label.prefix),
            &format!("{} failed after {} attempts", label.operation, max_attempts),
        );

        RetryRun {
            result: Err(last_error.unwrap_or_else(|| {
                ReplicationError::Transient(format!("{} made no attempts", label.operation))
            })),
            attempts,
        }
    }
}
