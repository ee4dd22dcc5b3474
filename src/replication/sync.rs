//! Bulk sync of one discovered (repository, tag) pair
//!
//! pull -> tag -> push -> verify, with every local image created along the
//! way removed again whether the pair succeeds or fails.

use crate::engine::TransferExecutor;
use crate::error::ReplicationError;
use crate::image::SyncPair;
use crate::logging::Logger;
use crate::replication::task::{SyncOutcome, SyncStage};

const STEP: &str = "Image Sync";

pub struct SyncOrchestrator {
    executor: TransferExecutor,
    output: Logger,
}

impl SyncOrchestrator {
    pub fn new(executor: TransferExecutor, output: Logger) -> Self {
        Self { executor, output }
    }

    pub async fn replicate(&self, pair: &SyncPair) -> SyncOutcome {
        let source = pair.source.to_string();
        let destination = pair.destination.to_string();

        if self.executor.image_exists(&destination).await {
            self.output.info(
                STEP,
                "SYNC_ALREADY_EXISTS",
                &format!("Image already exists in destination, skipping: {}", destination),
            );
            return SyncOutcome::Skipped;
        }

        self.output
            .info(STEP, "SYNC_PULLING", &format!("Pulling {}", source));
        if let Err(error) = self.executor.pull(&source).await {
            return self.fail(SyncStage::Pull, "SYNC_PULL_FAILED", error, &[]).await;
        }

        if self.executor.interrupted() {
            return self.stopped(SyncStage::Tag, &[source.as_str()]).await;
        }
        self.output.info(
            STEP,
            "SYNC_TAGGING",
            &format!("Tagging {} as {}", source, destination),
        );
        if let Err(error) = self.executor.tag(&source, &destination).await {
            return self
                .fail(SyncStage::Tag, "SYNC_TAG_FAILED", error, &[source.as_str()])
                .await;
        }

        if self.executor.interrupted() {
            return self
                .stopped(SyncStage::Push, &[source.as_str(), destination.as_str()])
                .await;
        }
        self.output
            .info(STEP, "SYNC_PUSHING", &format!("Pushing {}", destination));
        if let Err(error) = self.executor.push(&destination).await {
            return self
                .fail(SyncStage::Push, "SYNC_PUSH_FAILED", error, &[source.as_str(), destination.as_str()])
                .await;
        }

        if self.executor.interrupted() {
            return self
                .stopped(SyncStage::Verify, &[source.as_str(), destination.as_str()])
                .await;
        }
        self.output
            .info(STEP, "SYNC_VERIFYING", &format!("Verifying {}", destination));
        if !self.executor.image_exists(&destination).await {
            let error = ReplicationError::Verification(format!(
                "Push reported success but {} is not visible in the destination",
                destination
            ));
            return self
                .fail(SyncStage::Verify, "SYNC_VERIFY_FAILED", error, &[source.as_str(), destination.as_str()])
                .await;
        }

        self.remove_local(&[source.as_str(), destination.as_str()]).await;
        self.output.info(
            STEP,
            "SYNC_SUCCESS",
            &format!("Successfully synced {}", destination),
        );
        SyncOutcome::Synced
    }

    async fn fail(
        &self,
        stage: SyncStage,
        code: &str,
        error: ReplicationError,
        created: &[&str],
    ) -> SyncOutcome {
        self.output
            .error(STEP, code, &format!("Sync failed at {}: {}", stage, error));
        self.remove_local(created).await;
        SyncOutcome::Failed { stage, error }
    }

    /// A stop request ends the pair before `stage`; images already created are still removed
    async fn stopped(&self, stage: SyncStage, created: &[&str]) -> SyncOutcome {
        self.fail(stage, "SYNC_STOPPED", ReplicationError::Interrupted, created)
            .await
    }

    /// Best-effort `rmi -f`; failures are logged and never change the outcome
    async fn remove_local(&self, images: &[&str]) {
        if images.is_empty() {
            return;
        }
        self.output.debug(
            "Cleanup",
            "CLEANUP_START",
            &format!("Removing {} local image(s)", images.len()),
        );
        for image in images {
            if let Err(error) = self.executor.remove(image, true).await {
                self.output.warning(
                    "Cleanup",
                    "CLEANUP_FAILED",
                    &format!("Could not remove local image {}: {}", image, error),
                );
            }
        }
        self.output
            .debug("Cleanup", "CLEANUP_DONE", "Local image cleanup complete");
    }
}
