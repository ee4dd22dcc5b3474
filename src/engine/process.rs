//! Container engine driven through its command-line client

use crate::engine::{ContainerEngine, EngineCommand, EngineOutput};
use crate::error::{ReplicationError, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Runs engine commands as child processes (`docker`, `podman`, ...)
#[derive(Debug, Clone)]
pub struct EngineCli {
    program: String,
}

impl EngineCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn docker() -> Self {
        Self::new("docker")
    }
}

#[async_trait]
impl ContainerEngine for EngineCli {
    fn program(&self) -> &str {
        &self.program
    }

    async fn run(&self, command: &EngineCommand, timeout: Duration) -> Result<EngineOutput> {
        let line = command.display(&self.program);

        let mut child = Command::new(&self.program)
            .args(&command.args)
            .stdin(if command.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ReplicationError::Transient(format!("Failed to start {}: {}", line, e)))?;

        if let (Some(input), Some(mut stdin)) = (&command.stdin, child.stdin.take()) {
            stdin.write_all(input.as_bytes()).await?;
            // Closing stdin lets --password-stdin see EOF
            drop(stdin);
        }

        // The child is killed when the timed-out future drops it
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                ReplicationError::Timeout(format!(
                    "{} timed out after {}s",
                    line,
                    timeout.as_secs()
                ))
            })??;

        Ok(EngineOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
