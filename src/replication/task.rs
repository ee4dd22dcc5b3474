//! Units of work and their outcomes

use crate::error::ReplicationError;
use crate::image::ImageReference;
use std::fmt;

/// One source image and the environments it should reach
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationTask {
    pub source: ImageReference,
    /// Target environment names, in configuration order
    pub targets: Vec<String>,
    pub description: String,
}

/// Aggregated result of one task, as counted in run statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Succeeded,
    Skipped,
    Failed,
}

/// Mirror steps a target can fail in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorStage {
    ResolvePath,
    PullSource,
    Tag,
    Provision,
    Push,
}

impl fmt::Display for MirrorStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MirrorStage::ResolvePath => "resolve path",
            MirrorStage::PullSource => "pull source",
            MirrorStage::Tag => "tag",
            MirrorStage::Provision => "provision repository",
            MirrorStage::Push => "push",
        };
        write!(f, "{}", name)
    }
}

/// Terminal state of one target inside a mirror task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOutcome {
    Replicated,
    /// Versioned tag pushed but the `latest` alias was not updated
    PartialSuccess { error: ReplicationError },
    Skipped,
    Failed {
        stage: MirrorStage,
        error: ReplicationError,
    },
}

impl TargetOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, TargetOutcome::Replicated | TargetOutcome::Skipped)
    }
}

/// Everything that happened to one mirror task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorReport {
    pub source: ImageReference,
    /// Source failed allow-list validation; nothing else was attempted
    pub rejected: Option<ReplicationError>,
    pub pull_error: Option<ReplicationError>,
    /// Per-target outcome, in task target order
    pub targets: Vec<(String, TargetOutcome)>,
}

impl MirrorReport {
    pub fn new(source: ImageReference) -> Self {
        Self {
            source,
            rejected: None,
            pull_error: None,
            targets: Vec::new(),
        }
    }

    pub fn target(&self, name: &str) -> Option<&TargetOutcome> {
        self.targets
            .iter()
            .find(|(target, _)| target == name)
            .map(|(_, outcome)| outcome)
    }

    /// Success iff the source was accepted and pulled (when a pull was
    /// needed) and every target replicated or skipped. A task whose targets
    /// were all skipped, or which had none, counts as skipped.
    pub fn outcome(&self) -> TaskOutcome {
        if self.rejected.is_some() || self.pull_error.is_some() {
            return TaskOutcome::Failed;
        }
        if !self.targets.iter().all(|(_, outcome)| outcome.is_ok()) {
            return TaskOutcome::Failed;
        }
        if self
            .targets
            .iter()
            .all(|(_, outcome)| *outcome == TargetOutcome::Skipped)
        {
            return TaskOutcome::Skipped;
        }
        TaskOutcome::Succeeded
    }
}

/// Sync steps a (repository, tag) pair can fail in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    Pull,
    Tag,
    Push,
    Verify,
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncStage::Pull => "pull",
            SyncStage::Tag => "tag",
            SyncStage::Push => "push",
            SyncStage::Verify => "verify",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Synced,
    Skipped,
    Failed {
        stage: SyncStage,
        error: ReplicationError,
    },
}

impl SyncOutcome {
    pub fn task_outcome(&self) -> TaskOutcome {
        match self {
            SyncOutcome::Synced => TaskOutcome::Succeeded,
            SyncOutcome::Skipped => TaskOutcome::Skipped,
            SyncOutcome::Failed { .. } => TaskOutcome::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(targets: Vec<TargetOutcome>) -> MirrorReport {
        let mut report = MirrorReport::new(ImageReference::parse("h/p/img:1").unwrap());
        report.targets = targets
            .into_iter()
            .enumerate()
            .map(|(i, outcome)| (format!("env{}", i), outcome))
            .collect();
        report
    }

    #[test]
    fn test_skip_and_replicate_is_success() {
        let report = report(vec![TargetOutcome::Skipped, TargetOutcome::Replicated]);
        assert_eq!(report.outcome(), TaskOutcome::Succeeded);
        assert_eq!(report.target("env0"), Some(&TargetOutcome::Skipped));
    }

    #[test]
    fn test_all_skipped_or_empty_is_skipped() {
        assert_eq!(report(vec![TargetOutcome::Skipped]).outcome(), TaskOutcome::Skipped);
        assert_eq!(report(vec![]).outcome(), TaskOutcome::Skipped);
    }

    #[test]
    fn test_partial_success_fails_the_task() {
        let report = report(vec![
            TargetOutcome::Replicated,
            TargetOutcome::PartialSuccess {
                error: ReplicationError::Transient("latest".into()),
            },
        ]);
        assert_eq!(report.outcome(), TaskOutcome::Failed);
    }

    #[test]
    fn test_rejected_or_pull_failure_fails_the_task() {
        let mut rejected = report(vec![]);
        rejected.rejected = Some(ReplicationError::Validation("x".into()));
        assert_eq!(rejected.outcome(), TaskOutcome::Failed);

        let mut pulled = report(vec![TargetOutcome::Skipped]);
        pulled.pull_error = Some(ReplicationError::Transient("x".into()));
        assert_eq!(pulled.outcome(), TaskOutcome::Failed);
    }
}
