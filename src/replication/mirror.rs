//! Targeted mirror: one configured source image fanned out to N targets
//!
//! Every target is resolved and checked for an existing tag before anything
//! is pulled, so a task whose targets all exist costs only manifest probes.
//! The source is then pulled once and each remaining target goes through
//! tag, optional provisioning, push, and the `latest` alias update.

use crate::config::{AppConfig, TargetCatalog, TargetEnvironment};
use crate::engine::TransferExecutor;
use crate::error::ReplicationError;
use crate::image::{ImageReference, MirrorDestination};
use crate::logging::Logger;
use crate::registry::RepositoryProvisioner;
use crate::replication::task::{
    MirrorReport, MirrorStage, ReplicationTask, TargetOutcome, TaskOutcome,
};

#[derive(Debug, Clone)]
pub struct MirrorSettings {
    /// `host/namespace` prefixes a source image must match
    pub allowed_sources: Vec<String>,
    pub continue_on_error: bool,
    pub cleanup_local_images: bool,
}

impl MirrorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            allowed_sources: config.allowed_source_registries.clone(),
            continue_on_error: config.operation.continue_on_error,
            cleanup_local_images: config.operation.cleanup_local_images,
        }
    }
}

enum TargetPlan<'a> {
    Done(TargetOutcome),
    Pending {
        target: &'a TargetEnvironment,
        destination: MirrorDestination,
    },
}

pub struct MirrorOrchestrator {
    executor: TransferExecutor,
    /// `None` when repository auto-creation is disabled
    provisioner: Option<RepositoryProvisioner>,
    catalog: TargetCatalog,
    settings: MirrorSettings,
    output: Logger,
}

impl MirrorOrchestrator {
    pub fn new(
        executor: TransferExecutor,
        provisioner: Option<RepositoryProvisioner>,
        catalog: TargetCatalog,
        settings: MirrorSettings,
        output: Logger,
    ) -> Self {
        Self {
            executor,
            provisioner,
            catalog,
            settings,
            output,
        }
    }

    pub async fn replicate(&self, task: &ReplicationTask) -> MirrorReport {
        let source = &task.source;
        let source_ref = source.to_string();
        let mut report = MirrorReport::new(source.clone());

        self.output.info(
            "Image Mirroring",
            "MIRROR_START",
            &format!("Starting mirror for: {}", source_ref),
        );
        if !task.description.is_empty() {
            self.output
                .info("Image Description", "MIRROR_DESC", &task.description);
        }

        if !source.is_allowed(&self.settings.allowed_sources) {
            let error = ReplicationError::Validation(format!(
                "Source registry not authorized: {}",
                source.source_prefix()
            ));
            self.output
                .error("Source Validation", "SOURCE_UNAUTHORIZED", &error.to_string());
            report.rejected = Some(error);
            self.log_result(&report);
            return report;
        }
        self.output.info(
            "Source Validation",
            "SOURCE_AUTHORIZED",
            &format!("Source registry validated: {}", source.source_prefix()),
        );

        if task.targets.is_empty() {
            self.output.warning(
                "Image Mirroring",
                "NO_TARGETS",
                &format!("No targets specified for {}, nothing to do", source_ref),
            );
            self.log_result(&report);
            return report;
        }

        let mut plans = Vec::with_capacity(task.targets.len());
        for name in &task.targets {
            let plan = if self.executor.interrupted() {
                TargetPlan::Done(self.stopped(name, MirrorStage::ResolvePath))
            } else {
                self.plan_target(source, name).await
            };
            plans.push((name.clone(), plan));
        }

        let needs_pull = plans
            .iter()
            .any(|(_, plan)| matches!(plan, TargetPlan::Pending { .. }));
        let mut pulled = false;
        let mut abandon: Option<ReplicationError> = None;

        if needs_pull {
            match self.executor.pull(&source_ref).await {
                Ok(()) => pulled = true,
                Err(error) => {
                    self.output.error(
                        "Image Pull",
                        "PULL_FAILED",
                        &format!("Failed to pull image from source: {}: {}", source_ref, error),
                    );
                    if !self.settings.continue_on_error || error == ReplicationError::Interrupted {
                        abandon = Some(error.clone());
                    }
                    report.pull_error = Some(error);
                }
            }
        }

        let mut local_images = Vec::new();
        for (name, plan) in plans {
            let outcome = match (plan, &abandon) {
                (TargetPlan::Done(outcome), _) => outcome,
                (TargetPlan::Pending { .. }, Some(error)) => TargetOutcome::Failed {
                    stage: MirrorStage::PullSource,
                    error: error.clone(),
                },
                (TargetPlan::Pending { .. }, None) if self.executor.interrupted() => {
                    self.stopped(&name, MirrorStage::Tag)
                }
                (
                    TargetPlan::Pending {
                        target,
                        destination,
                    },
                    None,
                ) => {
                    self.push_to_target(source, target, &destination, &mut local_images)
                        .await
                }
            };
            report.targets.push((name, outcome));
        }

        if self.settings.cleanup_local_images && needs_pull {
            self.cleanup(pulled.then_some(&source_ref), &local_images)
                .await;
        }

        self.log_result(&report);
        report
    }

    /// Outcome for a target left untouched after a stop request
    fn stopped(&self, name: &str, stage: MirrorStage) -> TargetOutcome {
        self.output.warning(
            "Environment Processing",
            "ENV_STOPPED",
            &format!("Stop requested, not processing environment: {}", name),
        );
        TargetOutcome::Failed {
            stage,
            error: ReplicationError::Interrupted,
        }
    }

    async fn plan_target(&self, source: &ImageReference, name: &str) -> TargetPlan<'_> {
        let Some(target) = self.catalog.get(name) else {
            let error =
                ReplicationError::Validation(format!("Unknown target environment: {}", name));
            self.output
                .error("Environment Validation", "ENV_UNKNOWN", &error.to_string());
            return TargetPlan::Done(TargetOutcome::Failed {
                stage: MirrorStage::ResolvePath,
                error,
            });
        };

        self.output.info(
            "Environment Processing",
            "ENV_PROCESSING",
            &format!("Processing environment: {}", name),
        );

        let destination = match MirrorDestination::resolve(source, target) {
            Ok(destination) => destination,
            Err(error) => {
                self.output
                    .error("Environment Processing", error.code(), &error.to_string());
                return TargetPlan::Done(TargetOutcome::Failed {
                    stage: MirrorStage::ResolvePath,
                    error,
                });
            }
        };

        let versioned = destination.versioned.to_string();
        if self.executor.image_exists(&versioned).await {
            self.output.info(
                "Image Existence",
                "IMAGE_ALREADY_EXISTS",
                &format!(
                    "Image {} already exists in {}, skipping: {}",
                    source.tag, name, versioned
                ),
            );
            return TargetPlan::Done(TargetOutcome::Skipped);
        }

        TargetPlan::Pending {
            target,
            destination,
        }
    }

    async fn push_to_target(
        &self,
        source: &ImageReference,
        target: &TargetEnvironment,
        destination: &MirrorDestination,
        local_images: &mut Vec<String>,
    ) -> TargetOutcome {
        let source_ref = source.to_string();
        let versioned = destination.versioned.to_string();
        let latest = destination.latest.to_string();

        if let Err(error) = self.executor.tag(&source_ref, &versioned).await {
            self.output.error(
                "Image Tagging",
                "TAG_FAILED",
                &format!("Failed to tag image: {}: {}", versioned, error),
            );
            return TargetOutcome::Failed {
                stage: MirrorStage::Tag,
                error,
            };
        }
        local_images.push(versioned.clone());

        if let Some(provisioner) = &self.provisioner {
            if let Err(error) = provisioner.ensure(target, &destination.repository_path).await {
                self.output.warning(
                    "Repository Check",
                    "REPO_PREP_FAILED",
                    &format!(
                        "Failed to create repository for {}: {}: {}",
                        target.name, destination.repository_path, error
                    ),
                );
                if !self.settings.continue_on_error {
                    return TargetOutcome::Failed {
                        stage: MirrorStage::Provision,
                        error,
                    };
                }
            }
        }

        if let Err(error) = self.executor.push(&versioned).await {
            self.output.error(
                "Image Push",
                "PUSH_FAILED",
                &format!("Failed to push image to {}: {}: {}", target.name, versioned, error),
            );
            return TargetOutcome::Failed {
                stage: MirrorStage::Push,
                error,
            };
        }
        self.output.info(
            "Image Push",
            "PUSH_SUCCESS",
            &format!("Successfully pushed {} to {}", source.tag, target.name),
        );

        // The versioned tag is in place from here on; latest failures only degrade the target
        if let Err(error) = self.executor.tag(&source_ref, &latest).await {
            self.output.error(
                "Latest Tagging",
                "LATEST_TAG_FAILED",
                &format!("Failed to tag as latest: {}: {}", latest, error),
            );
            return TargetOutcome::PartialSuccess { error };
        }
        local_images.push(latest.clone());

        if let Err(error) = self.executor.push(&latest).await {
            self.output.error(
                "Latest Push",
                "LATEST_PUSH_FAILED",
                &format!("Failed to push latest tag to {}: {}: {}", target.name, latest, error),
            );
            return TargetOutcome::PartialSuccess { error };
        }

        self.output.info(
            "Latest Update",
            "LATEST_UPDATED",
            &format!("Latest tag updated in {} pointing to {}", target.name, source.tag),
        );
        self.output.info(
            "Environment Complete",
            "ENV_SUCCESS",
            &format!("Successfully mirrored to {}: {} and latest", target.name, source.tag),
        );
        TargetOutcome::Replicated
    }

    async fn cleanup(&self, source: Option<&String>, local_images: &[String]) {
        self.output
            .info("Cleanup", "CLEANUP_START", "Cleaning up local images");

        for image in source.into_iter().chain(local_images) {
            if let Err(error) = self.executor.remove(image, false).await {
                self.output.warning(
                    "Cleanup",
                    "CLEANUP_FAILED",
                    &format!("Could not remove local image {}: {}", image, error),
                );
            }
        }

        self.output
            .info("Cleanup", "CLEANUP_DONE", "Local image cleanup complete");
    }

    fn log_result(&self, report: &MirrorReport) {
        match report.outcome() {
            TaskOutcome::Succeeded => self.output.info(
                "Image Complete",
                "MIRROR_SUCCESS",
                &format!("Mirror completed successfully: {}", report.source),
            ),
            TaskOutcome::Skipped => self.output.info(
                "Image Complete",
                "MIRROR_SKIPPED",
                &format!("Nothing to mirror for {}", report.source),
            ),
            TaskOutcome::Failed => self.output.warning(
                "Image Complete",
                "MIRROR_PARTIAL",
                &format!(
                    "Mirror completed with errors: {} (check logs for details)",
                    report.source
                ),
            ),
        }
    }
}
