//! Replication orchestration
//!
//! - [`MirrorOrchestrator`]: configured source image to N targets
//! - [`SyncOrchestrator`]: one discovered tag from source to destination
//! - [`RunController`]: iterates tasks, keeps [`RunStatistics`], picks the exit code

pub mod controller;
pub mod mirror;
pub mod stats;
pub mod sync;
pub mod task;

pub use controller::{
    EXIT_FAILURE, EXIT_INTERRUPTED, EXIT_SUCCESS, RunController, RunStatus, RunSummary,
};
pub use mirror::{MirrorOrchestrator, MirrorSettings};
pub use stats::RunStatistics;
pub use sync::SyncOrchestrator;
pub use task::{
    MirrorReport, MirrorStage, ReplicationTask, SyncOutcome, SyncStage, TargetOutcome, TaskOutcome,
};
