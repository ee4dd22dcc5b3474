//! Run controller: drives a flow over its work list and decides the exit code
//!
//! Tasks run strictly one after another in catalog or discovery order. The
//! interrupt flag is checked before and after each task, so a stop request
//! raised while the last task is running still ends the run as interrupted.
//! With continue-on-error disabled the first failure ends the run.

use crate::common::{InterruptFlag, ProgressUtils};
use crate::config::TargetEnvironment;
use crate::image::SyncPair;
use crate::logging::Logger;
use crate::registry::DirectoryClient;
use crate::replication::mirror::MirrorOrchestrator;
use crate::replication::stats::RunStatistics;
use crate::replication::sync::SyncOrchestrator;
use crate::replication::task::{ReplicationTask, TaskOutcome};
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_INTERRUPTED: i32 = 130;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every planned task was attempted
    Completed,
    /// Stopped at the first failure (continue-on-error disabled)
    Aborted,
    /// Stopped by the operator; the task in flight was allowed to wind down
    Interrupted,
    /// Sync discovery found no repositories
    DiscoveryEmpty,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub stats: RunStatistics,
    pub status: RunStatus,
}

impl RunSummary {
    pub fn exit_code(&self) -> i32 {
        match self.status {
            RunStatus::Completed if self.stats.failed == 0 => EXIT_SUCCESS,
            RunStatus::Interrupted => EXIT_INTERRUPTED,
            _ => EXIT_FAILURE,
        }
    }
}

enum Flow {
    Continue,
    Stop(RunStatus),
}

pub struct RunController {
    output: Logger,
    continue_on_error: bool,
    interrupt: InterruptFlag,
}

impl RunController {
    pub fn new(output: Logger, continue_on_error: bool, interrupt: InterruptFlag) -> Self {
        Self {
            output,
            continue_on_error,
            interrupt,
        }
    }

    pub async fn run_mirror(
        &self,
        orchestrator: &MirrorOrchestrator,
        tasks: &[ReplicationTask],
    ) -> RunSummary {
        let mut stats = RunStatistics::new(tasks.len());
        self.output.info(
            "Mirror Start",
            "MIRROR_QUEUE",
            &format!("{} image(s) queued for mirroring", tasks.len()),
        );

        for (index, task) in tasks.iter().enumerate() {
            if let Some(status) = self.interrupted() {
                return self.finish(stats, status, "MIRROR OPERATION STOPPED");
            }

            let position = format!("[{}/{}]", index + 1, tasks.len());
            self.output.info(
                "Image Queue",
                "IMAGE_QUEUED",
                &format!("{} Processing: {}", position, task.description),
            );
            self.output.info(
                "Image Details",
                "IMAGE_DETAILS",
                &format!(
                    "Source: {} | Destinations: {}",
                    task.source,
                    task.targets.join(", ")
                ),
            );

            let flow = self
                .run_task(&mut stats, &position, async {
                    orchestrator.replicate(task).await.outcome()
                })
                .await;
            if let Flow::Stop(status) = flow {
                return self.finish(stats, status, &stop_title("MIRROR", status));
            }
        }

        if let Some(status) = self.interrupted() {
            return self.finish(stats, status, "MIRROR OPERATION STOPPED");
        }
        self.finish(stats, RunStatus::Completed, "MIRROR OPERATION COMPLETE")
    }

    pub async fn run_sync(
        &self,
        directory: &DirectoryClient,
        orchestrator: &SyncOrchestrator,
        source: &TargetEnvironment,
        destination: &TargetEnvironment,
    ) -> RunSummary {
        let mut stats = RunStatistics::new(0);

        self.output.info(
            "Repository Discovery",
            "DISCOVERY_START",
            &format!("Discovering all repositories in {} registry", source.name),
        );
        let repositories = directory.list_repositories(source).await;

        if !repositories.complete {
            self.output.warning(
                "Repository Discovery",
                "DISCOVERY_INCOMPLETE",
                &format!(
                    "Repository listing for {} is incomplete; continuing with {} repositories",
                    source.name,
                    repositories.len()
                ),
            );
        }
        if repositories.is_empty() {
            self.output.warning(
                "Repository Discovery",
                "DISCOVERY_EMPTY",
                &format!("No repositories found in {}", source.name),
            );
            return self.finish(stats, RunStatus::DiscoveryEmpty, "SYNC OPERATION COMPLETE");
        }
        self.output.info(
            "Repository Discovery",
            "DISCOVERY_COMPLETE",
            &format!("Found {} repositories to sync", repositories.len()),
        );

        let total_repos = repositories.len();
        for (repo_index, repository) in repositories.items.iter().enumerate() {
            if let Some(status) = self.interrupted() {
                return self.finish(stats, status, "SYNC OPERATION STOPPED");
            }

            self.output.info(
                "Repository Processing",
                "REPO_PROCESSING",
                &format!(
                    "[{}/{}] Processing repository: {}",
                    repo_index + 1,
                    total_repos,
                    repository
                ),
            );

            let tags = directory.list_tags(source, repository).await;
            if !tags.complete {
                self.output.warning(
                    "Repository Processing",
                    "DISCOVERY_INCOMPLETE",
                    &format!("Tag listing for {} is incomplete", repository),
                );
            }
            if tags.is_empty() {
                self.output.warning(
                    "Repository Processing",
                    "REPO_NO_TAGS",
                    &format!("No tags found for repository: {}", repository),
                );
            } else {
                self.output.info(
                    "Repository Processing",
                    "REPO_TAGS_FOUND",
                    &format!("Found {} tag(s) in {}", tags.len(), repository),
                );
                stats.add_planned(tags.len());
            }

            for (tag_index, tag) in tags.items.iter().enumerate() {
                if let Some(status) = self.interrupted() {
                    return self.finish(stats, status, "SYNC OPERATION STOPPED");
                }

                let position = format!(
                    "[{}/{}][{}/{}]",
                    repo_index + 1,
                    total_repos,
                    tag_index + 1,
                    tags.len()
                );
                let progress = ProgressUtils::calculate_percentage(
                    (tag_index + 1) as u64,
                    tags.len() as u64,
                );
                self.output.info(
                    "Image Processing",
                    "IMAGE_PROCESSING",
                    &format!(
                        "{} ({:.1}%) Syncing: {}:{}",
                        position, progress, repository, tag
                    ),
                );

                let flow = self
                    .run_task(&mut stats, &position, async {
                        match SyncPair::resolve(source, destination, repository, tag) {
                            Ok(pair) => orchestrator.replicate(&pair).await.task_outcome(),
                            Err(error) => {
                                self.output.error(
                                    "Image Processing",
                                    error.code(),
                                    &error.to_string(),
                                );
                                TaskOutcome::Failed
                            }
                        }
                    })
                    .await;
                if let Flow::Stop(status) = flow {
                    return self.finish(stats, status, &stop_title("SYNC", status));
                }
            }

            let progress =
                ProgressUtils::calculate_percentage((repo_index + 1) as u64, total_repos as u64);
            self.output.info(
                "Progress",
                "PROGRESS_UPDATE",
                &format!(
                    "Repository {}/{} complete ({:.1}%) | Images: {} success, {} skipped, {} failed",
                    repo_index + 1,
                    total_repos,
                    progress,
                    stats.succeeded,
                    stats.skipped,
                    stats.failed
                ),
            );
        }

        if let Some(status) = self.interrupted() {
            return self.finish(stats, status, "SYNC OPERATION STOPPED");
        }
        self.finish(stats, RunStatus::Completed, "SYNC OPERATION COMPLETE")
    }

    fn interrupted(&self) -> Option<RunStatus> {
        self.interrupt
            .is_raised()
            .then_some(RunStatus::Interrupted)
    }

    /// Run one task, converting a panic into a failure, and count its outcome
    async fn run_task<Fut>(&self, stats: &mut RunStatistics, position: &str, task: Fut) -> Flow
    where
        Fut: Future<Output = TaskOutcome>,
    {
        let outcome = match AssertUnwindSafe(task).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => {
                self.output.error(
                    "Image Exception",
                    "IMAGE_EXCEPTION",
                    &format!("{} Unexpected error: {}", position, panic_message(&*panic)),
                );
                TaskOutcome::Failed
            }
        };
        stats.record(outcome);

        match outcome {
            TaskOutcome::Succeeded => self.output.info(
                "Image Result",
                "IMAGE_SUCCESS",
                &format!("{} Image replicated successfully", position),
            ),
            TaskOutcome::Skipped => self.output.info(
                "Image Result",
                "IMAGE_SKIPPED",
                &format!("{} Image already present, nothing to do", position),
            ),
            TaskOutcome::Failed => self.output.warning(
                "Image Result",
                "IMAGE_FAILED",
                &format!("{} Image replication failed", position),
            ),
        }

        if let Some(status) = self.interrupted() {
            return Flow::Stop(status);
        }
        if outcome == TaskOutcome::Failed && !self.continue_on_error {
            return Flow::Stop(RunStatus::Aborted);
        }
        Flow::Continue
    }

    fn finish(&self, mut stats: RunStatistics, status: RunStatus, title: &str) -> RunSummary {
        stats.finish();
        stats.report(&self.output, title);

        match status {
            RunStatus::Completed if stats.failed == 0 => self.output.info(
                "Run Complete",
                "MISSION_SUCCESS",
                &format!("All {} task(s) completed without failures", stats.total),
            ),
            RunStatus::Completed => self.output.warning(
                "Run Complete",
                "MISSION_PARTIAL",
                &format!(
                    "Completed with errors: {}/{} successful",
                    stats.succeeded, stats.planned
                ),
            ),
            RunStatus::Aborted => self.output.error(
                "Run Complete",
                "MISSION_ABORTED",
                &format!(
                    "Run aborted due to error (continue_on_error=false) after {} of {} task(s)",
                    stats.total, stats.planned
                ),
            ),
            RunStatus::Interrupted => self.output.info(
                "User Interrupt",
                "USER_STOP",
                &format!(
                    "Received stop signal from user after {} of {} task(s) - shutting down gracefully",
                    stats.total, stats.planned
                ),
            ),
            RunStatus::DiscoveryEmpty => self.output.warning(
                "Run Complete",
                "DISCOVERY_EMPTY",
                "Nothing to replicate",
            ),
        }

        RunSummary { stats, status }
    }
}

fn stop_title(flow: &str, status: RunStatus) -> String {
    match status {
        RunStatus::Interrupted => format!("{} OPERATION STOPPED", flow),
        _ => format!("{} OPERATION ABORTED", flow),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "task panicked".to_string()
    }
}
