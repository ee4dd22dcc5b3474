//! Idempotent destination repository creation

use crate::common::{AttemptOutcome, InterruptFlag, RetryLabel, RetryPolicy};
use crate::config::TargetEnvironment;
use crate::error::Result;
use crate::error::handlers::HttpErrorHandler;
use crate::logging::Logger;
use crate::registry::client::{CreateRepositoryRequest, RegistryApi};
use chrono::Local;
use std::sync::Arc;

const STEP: &str = "Repository Creation";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    Created,
    AlreadyExists,
}

#[derive(Clone)]
pub struct RepositoryProvisioner {
    api: Arc<dyn RegistryApi>,
    policy: RetryPolicy,
    interrupt: InterruptFlag,
    output: Logger,
}

impl RepositoryProvisioner {
    pub fn new(api: Arc<dyn RegistryApi>, policy: RetryPolicy, output: Logger) -> Self {
        Self {
            api,
            policy,
            interrupt: InterruptFlag::new(),
            output,
        }
    }

    /// Stop retrying once `interrupt` is raised
    pub fn with_interrupt(mut self, interrupt: InterruptFlag) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Make sure `repository_path` exists in the target's organization.
    ///
    /// 201 and "already exists" are both success. Auth failures stop at once;
    /// anything else is retried under the shared policy.
    pub async fn ensure(
        &self,
        target: &TargetEnvironment,
        repository_path: &str,
    ) -> Result<ProvisionOutcome> {
        let request = CreateRepositoryRequest::private_image(
            target,
            repository_path,
            format!(
                "Auto-created by registry-replicator on {}",
                Local::now().format("%Y-%m-%d %H:%M:%S")
            ),
        );
        let operation = format!("create repository {} on {}", repository_path, target.name);
        let label = RetryLabel {
            step: STEP,
            prefix: "REPO",
            operation: &operation,
            interrupt: Some(&self.interrupt),
        };

        let api = &self.api;
        let request = &request;
        let outcome = self
            .policy
            .execute(&self.output, label, |_| async move {
                AttemptOutcome::from_result(match api.create_repository(target, request).await {
                    Ok(response) => HttpErrorHandler::classify_repository_creation(
                        response.status,
                        &response.body,
                        repository_path,
                    ),
                    Err(err) => Err(err),
                })
            })
            .await?;

        match outcome {
            ProvisionOutcome::Created => self.output.info(
                STEP,
                "REPO_CREATED",
                &format!("Repository created successfully: {}", repository_path),
            ),
            ProvisionOutcome::AlreadyExists => self.output.info(
                STEP,
                "REPO_EXISTS",
                &format!("Repository already exists: {}", repository_path),
            ),
        }
        Ok(outcome)
    }
}
