//! Transfer executor: single engine operations with timeout and bounded retry

use crate::common::{AttemptOutcome, InterruptFlag, RetryLabel, RetryPolicy};
use crate::engine::{ContainerEngine, EngineCommand, EngineOutput};
use crate::error::handlers::EngineErrorHandler;
use crate::error::Result;
use crate::logging::Logger;
use std::sync::Arc;
use std::time::Duration;

const STEP: &str = "Docker Command";
const PREFIX: &str = "DOCKER";

#[derive(Clone)]
pub struct TransferExecutor {
    engine: Arc<dyn ContainerEngine>,
    policy: RetryPolicy,
    timeout: Duration,
    interrupt: InterruptFlag,
    output: Logger,
}

impl TransferExecutor {
    pub fn new(
        engine: Arc<dyn ContainerEngine>,
        policy: RetryPolicy,
        timeout: Duration,
        output: Logger,
    ) -> Self {
        Self {
            engine,
            policy,
            timeout,
            interrupt: InterruptFlag::new(),
            output,
        }
    }

    /// Refuse new pull/tag/push/login attempts once `interrupt` is raised.
    /// Removals still run so callers can clean up after a stop.
    pub fn with_interrupt(mut self, interrupt: InterruptFlag) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn interrupted(&self) -> bool {
        self.interrupt.is_raised()
    }

    /// Run `command` under the retry policy.
    ///
    /// "Not found" exits end the loop after one attempt; timeouts and other
    /// failures are retried until the policy is exhausted.
    pub async fn execute(&self, command: &EngineCommand) -> Result<EngineOutput> {
        self.execute_with(self.policy, command, Some(&self.interrupt))
            .await
    }

    async fn execute_with(
        &self,
        policy: RetryPolicy,
        command: &EngineCommand,
        interrupt: Option<&InterruptFlag>,
    ) -> Result<EngineOutput> {
        let line = command.display(self.engine.program());
        let label = RetryLabel {
            step: STEP,
            prefix: PREFIX,
            operation: &line,
            interrupt,
        };

        let engine = &self.engine;
        let timeout = self.timeout;
        let line = line.as_str();

        policy
            .execute(&self.output, label, |_| async move {
                match engine.run(command, timeout).await {
                    Ok(output) => match EngineErrorHandler::classify(line, &output) {
                        None => AttemptOutcome::Success(output),
                        Some(err) => AttemptOutcome::from_result(Err(err)),
                    },
                    Err(err) => AttemptOutcome::from_result(Err(err)),
                }
            })
            .await
    }

    pub async fn pull(&self, image: &str) -> Result<()> {
        self.execute(&EngineCommand::pull(image)).await.map(|_| ())
    }

    pub async fn tag(&self, source: &str, destination: &str) -> Result<()> {
        self.execute(&EngineCommand::tag(source, destination))
            .await
            .map(|_| ())
    }

    pub async fn push(&self, image: &str) -> Result<()> {
        self.execute(&EngineCommand::push(image)).await.map(|_| ())
    }

    /// Remove a local image; a single attempt, callers treat failure as advisory
    pub async fn remove(&self, image: &str, force: bool) -> Result<()> {
        self.execute_with(RetryPolicy::once(), &EngineCommand::remove(image, force), None)
            .await
            .map(|_| ())
    }

    /// Probe the registry with `manifest inspect`; exit 0 is the only "exists" signal
    pub async fn image_exists(&self, image: &str) -> bool {
        let command = EngineCommand::manifest_inspect(image);
        let line = command.display(self.engine.program());
        self.output
            .debug(STEP, "MANIFEST_CHECK", &format!("Checking {}", line));

        match self.engine.run(&command, self.timeout).await {
            Ok(output) if output.is_success() => true,
            Ok(output) => {
                self.output.debug(
                    STEP,
                    "MANIFEST_ABSENT",
                    &format!("{} not present: {}", image, output.error_message()),
                );
                false
            }
            Err(err) => {
                self.output.warning(
                    STEP,
                    &format!("{}_{}", PREFIX, err.code()),
                    &format!("Existence check for {} failed, treating as absent: {}", image, err),
                );
                false
            }
        }
    }

    /// Single login attempt; the password goes to the engine on stdin
    pub async fn login(&self, host: &str, username: &str, password: &str) -> Result<()> {
        self.execute_with(
            RetryPolicy::once(),
            &EngineCommand::login(host, username, password),
            Some(&self.interrupt),
        )
        .await
        .map(|_| ())
    }
}
