//! Container engine access
//!
//! The orchestrators never spawn processes themselves. They go through
//! [`TransferExecutor`], which drives a [`ContainerEngine`] implementation
//! (the docker CLI in production, scripted fakes in tests).

pub mod executor;
pub mod process;

pub use executor::TransferExecutor;
pub use process::EngineCli;

use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

/// Engine operation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Login,
    Pull,
    Tag,
    Push,
    ManifestInspect,
    Remove,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Login => "login",
            OperationKind::Pull => "pull",
            OperationKind::Tag => "tag",
            OperationKind::Push => "push",
            OperationKind::ManifestInspect => "manifest inspect",
            OperationKind::Remove => "rmi",
        };
        write!(f, "{}", name)
    }
}

/// One engine invocation: `<program> <args...>` with optional stdin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCommand {
    pub kind: OperationKind,
    pub args: Vec<String>,
    pub stdin: Option<String>,
}

impl EngineCommand {
    pub fn pull(image: &str) -> Self {
        Self::new(OperationKind::Pull, ["pull", image])
    }

    pub fn tag(source: &str, destination: &str) -> Self {
        Self::new(OperationKind::Tag, ["tag", source, destination])
    }

    pub fn push(image: &str) -> Self {
        Self::new(OperationKind::Push, ["push", image])
    }

    pub fn manifest_inspect(image: &str) -> Self {
        Self::new(OperationKind::ManifestInspect, ["manifest", "inspect", image])
    }

    pub fn remove(image: &str, force: bool) -> Self {
        if force {
            Self::new(OperationKind::Remove, ["rmi", "-f", image])
        } else {
            Self::new(OperationKind::Remove, ["rmi", image])
        }
    }

    /// Password travels on stdin and never appears in the argument list
    pub fn login(host: &str, username: &str, password: &str) -> Self {
        let mut command = Self::new(
            OperationKind::Login,
            ["login", "-u", username, "--password-stdin", host],
        );
        command.stdin = Some(password.to_string());
        command
    }

    fn new<const N: usize>(kind: OperationKind, args: [&str; N]) -> Self {
        Self {
            kind,
            args: args.iter().map(|arg| arg.to_string()).collect(),
            stdin: None,
        }
    }

    /// Image (or registry host for login), i.e. the last argument
    pub fn target(&self) -> &str {
        self.args.last().map(String::as_str).unwrap_or_default()
    }

    /// Printable command line; stdin is never included
    pub fn display(&self, program: &str) -> String {
        format!("{} {}", program, self.args.join(" "))
    }
}

/// Captured result of an engine process
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EngineOutput {
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl EngineOutput {
    pub fn success() -> Self {
        Self {
            exit_code: Some(0),
            ..Self::default()
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stderr if present, otherwise stdout
    pub fn error_message(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// A container engine able to run one command at a time.
///
/// `run` returns `Ok` whenever the process ran to completion, whatever its
/// exit code; `Err` means it could not be started or exceeded `timeout`.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    fn program(&self) -> &str;

    async fn run(&self, command: &EngineCommand, timeout: Duration) -> Result<EngineOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_lines() {
        assert_eq!(
            EngineCommand::tag("a/b/c:1", "d/e/f:1").display("docker"),
            "docker tag a/b/c:1 d/e/f:1"
        );
        assert_eq!(
            EngineCommand::manifest_inspect("d/e/f:1").args,
            vec!["manifest", "inspect", "d/e/f:1"]
        );
        assert_eq!(EngineCommand::remove("x:1", true).args, vec!["rmi", "-f", "x:1"]);
        assert_eq!(EngineCommand::remove("x:1", false).args, vec!["rmi", "x:1"]);
        assert_eq!(EngineCommand::push("x:1").target(), "x:1");
    }

    #[test]
    fn test_login_keeps_password_off_the_command_line() {
        let login = EngineCommand::login("quay.example.com", "robot", "s3cret");
        assert!(!login.display("docker").contains("s3cret"));
        assert_eq!(login.stdin.as_deref(), Some("s3cret"));
        assert_eq!(login.target(), "quay.example.com");
    }

    #[test]
    fn test_error_message_prefers_stderr() {
        let output = EngineOutput {
            exit_code: Some(1),
            stdout: "progress".into(),
            stderr: "denied".into(),
        };
        assert_eq!(output.error_message(), "denied");
        assert_eq!(EngineOutput::failure(1, "").error_message(), "");
        assert!(EngineOutput::success().is_success());
    }
}
