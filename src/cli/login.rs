//! Best-effort engine login before any task runs
//!
//! A failed or skipped login never stops the run. Tasks that later hit an
//! auth error fail on their own.

use crate::config::TargetEnvironment;
use crate::engine::TransferExecutor;
use crate::logging::Logger;

const STEP: &str = "Docker Login";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoginSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub skipped: usize,
}

pub struct PreAuthenticator<'a> {
    executor: &'a TransferExecutor,
    output: Logger,
}

impl<'a> PreAuthenticator<'a> {
    pub fn new(executor: &'a TransferExecutor, output: Logger) -> Self {
        Self { executor, output }
    }

    /// Log in to every registry host once, in order, skipping duplicates
    pub async fn login_all(
        &self,
        targets: &[&TargetEnvironment],
        lookup: &dyn Fn(&str) -> Option<String>,
    ) -> LoginSummary {
        let mut summary = LoginSummary::default();
        let mut seen: Vec<&str> = Vec::new();

        self.output.info(
            STEP,
            "LOGIN_START",
            &format!("Logging in to {} registr(y/ies)", targets.len()),
        );

        for target in targets {
            if seen.contains(&target.url.as_str()) {
                continue;
            }
            seen.push(&target.url);

            let credentials = match (&target.username_env, &target.password_env) {
                (Some(user_env), Some(pass_env)) => match (lookup(user_env), lookup(pass_env)) {
                    (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => {
                        Some((user, pass))
                    }
                    _ => {
                        self.output.warning(
                            STEP,
                            "LOGIN_NO_CREDENTIALS",
                            &format!(
                                "{} or {} not set, skipping login to {}",
                                user_env, pass_env, target.url
                            ),
                        );
                        None
                    }
                },
                _ => {
                    self.output.info(
                        STEP,
                        "LOGIN_NO_CREDENTIALS",
                        &format!(
                            "No login credentials configured for {}, relying on existing engine auth",
                            target.name
                        ),
                    );
                    None
                }
            };

            let Some((username, password)) = credentials else {
                summary.skipped += 1;
                continue;
            };

            summary.attempted += 1;
            match self.executor.login(&target.url, &username, &password).await {
                Ok(()) => {
                    summary.succeeded += 1;
                    self.output.info(
                        STEP,
                        "LOGIN_SUCCESS",
                        &format!("Logged in to {} as {}", target.url, username),
                    );
                }
                Err(error) => self.output.warning(
                    STEP,
                    "LOGIN_FAILED",
                    &format!("Login to {} failed, continuing: {}", target.url, error),
                ),
            }
        }

        self.output.info(
            STEP,
            "LOGIN_COMPLETE",
            &format!(
                "Login phase complete: {} succeeded, {} attempted, {} skipped",
                summary.succeeded, summary.attempted, summary.skipped
            ),
        );
        summary
    }
}
