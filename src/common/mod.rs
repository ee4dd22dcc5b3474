//! Common module - shared retry policy and utilities
//!
//! Both the transfer executor and the repository provisioner run their
//! attempts through [`RetryPolicy`].

pub mod interrupt;
pub mod retry;
pub mod utils;

pub use interrupt::InterruptFlag;
pub use retry::{AttemptOutcome, AttemptStatus, RetryLabel, RetryPolicy, RetryRun, TransferAttempt};
pub use utils::{ProgressUtils, Timer};
