//! Runner: turns configuration into wired components and drives one run

use crate::common::InterruptFlag;
use crate::config::{self, AppConfig, TargetCatalog, TargetEnvironment};
use crate::cli::login::PreAuthenticator;
use crate::engine::{ContainerEngine, EngineCli, TransferExecutor};
use crate::logging::{Level, Logger};
use crate::registry::{DirectoryClient, QuayClient, RegistryApi, RepositoryProvisioner};
use crate::replication::{
    EXIT_FAILURE, MirrorOrchestrator, MirrorSettings, RunController, SyncOrchestrator,
};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Mirror,
    Sync,
}

impl RunMode {
    fn name(&self) -> &'static str {
        match self {
            RunMode::Mirror => "image-mirror",
            RunMode::Sync => "registry-sync",
        }
    }
}

/// Collaborators a run needs; swapped for fakes in tests
pub struct Collaborators {
    /// `operation.engine` CLI when `None`
    pub engine: Option<Arc<dyn ContainerEngine>>,
    /// Quay client built from config when `None`
    pub api: Option<Arc<dyn RegistryApi>>,
    pub interrupt: InterruptFlag,
}

pub struct Runner {
    mode: RunMode,
    config_path: PathBuf,
    lookup: Box<dyn Fn(&str) -> Option<String> + Send + Sync>,
    /// Overrides the logger built from `[logging]`
    output: Option<Logger>,
}

impl Runner {
    /// Runner reading its config path and credentials from the process environment
    pub fn from_env(mode: RunMode) -> Self {
        Self {
            mode,
            config_path: config::config_path(&config::process_env),
            lookup: Box::new(config::process_env),
            output: None,
        }
    }

    pub fn new(
        mode: RunMode,
        config_path: PathBuf,
        lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            mode,
            config_path,
            lookup: Box::new(lookup),
            output: None,
        }
    }

    pub fn with_logger(mut self, output: Logger) -> Self {
        self.output = Some(output);
        self
    }

    /// Production run: docker CLI engine, Quay API client, Ctrl+C listener
    pub async fn run(&self) -> Result<i32> {
        let interrupt = InterruptFlag::new();
        let listener = interrupt.listen_for_ctrl_c();

        let code = self
            .run_with(Collaborators {
                engine: None,
                api: None,
                interrupt,
            })
            .await;

        listener.abort();
        code
    }

    /// Load, validate, wire and execute; returns the process exit code
    pub async fn run_with(&self, collaborators: Collaborators) -> Result<i32> {
        let lookup: &dyn Fn(&str) -> Option<String> = &*self.lookup;

        let mut config = match AppConfig::load(&self.config_path) {
            Ok(config) => config,
            Err(error) => {
                let output = self.output.clone().unwrap_or_else(|| Logger::new(Level::Info));
                output.error("Configuration Check", error.code(), &error.to_string());
                return Ok(EXIT_FAILURE);
            }
        };
        config.apply_env_overrides(lookup);

        let output = match &self.output {
            Some(output) => output.clone(),
            None => self.build_logger(&config)?,
        };

        output.section(self.mode.name());
        output.info(
            "Startup",
            "STARTUP",
            &format!(
                "{} {} starting with {}",
                self.mode.name(),
                env!("CARGO_PKG_VERSION"),
                self.config_path.display()
            ),
        );

        let catalog = config.catalog(lookup);
        let issues = match self.mode {
            RunMode::Mirror => config.validate_mirror(&catalog),
            RunMode::Sync => config.validate_sync(&catalog),
        };
        if self.mode == RunMode::Mirror {
            for warning in config.mirror_warnings() {
                output.warning("Configuration Check", "CONFIG_WARNING", &warning);
            }
        }
        if !issues.is_empty() {
            for issue in &issues {
                output.error("Configuration Check", "CONFIG_INVALID", issue);
            }
            output.error(
                "Configuration Check",
                "CONFIG_INVALID",
                &format!("{} configuration issue(s), nothing was run", issues.len()),
            );
            return Ok(EXIT_FAILURE);
        }
        output.info("Configuration Check", "CONFIG_VALID", "Configuration validated");

        let engine = collaborators.engine.unwrap_or_else(|| {
            let engine: Arc<dyn ContainerEngine> =
                Arc::new(EngineCli::new(config.operation.engine.clone()));
            engine
        });
        let executor = TransferExecutor::new(
            engine,
            config.operation.retry_policy(),
            config.operation.docker_timeout(),
            output.clone(),
        )
        .with_interrupt(collaborators.interrupt.clone());
        let controller = RunController::new(
            output.clone(),
            config.operation.continue_on_error,
            collaborators.interrupt.clone(),
        );

        let summary = match self.mode {
            RunMode::Mirror => {
                let tasks = config.mirror_tasks()?;
                let login_targets = mirror_login_targets(&config, &catalog);
                PreAuthenticator::new(&executor, output.clone())
                    .login_all(&login_targets, lookup)
                    .await;

                let provisioner = if config.operation.create_repos_if_not_exists {
                    let api = self.api(&config, &output, collaborators.api)?;
                    Some(RepositoryProvisioner::new(
                        api,
                        config.operation.retry_policy(),
                        output.clone(),
                    )
                    .with_interrupt(collaborators.interrupt))
                } else {
                    None
                };

                let orchestrator = MirrorOrchestrator::new(
                    executor,
                    provisioner,
                    catalog.clone(),
                    MirrorSettings::from_config(&config),
                    output.clone(),
                );
                controller.run_mirror(&orchestrator, &tasks).await
            }
            RunMode::Sync => {
                let source = required(&catalog, &config.sync.source)?;
                let destination = required(&catalog, &config.sync.destination)?;
                PreAuthenticator::new(&executor, output.clone())
                    .login_all(&[source, destination], lookup)
                    .await;

                let api = self.api(&config, &output, collaborators.api)?;
                let directory = DirectoryClient::new(api, output.clone());
                let orchestrator = SyncOrchestrator::new(executor, output.clone());
                controller
                    .run_sync(&directory, &orchestrator, source, destination)
                    .await
            }
        };

        Ok(summary.exit_code())
    }

    fn build_logger(&self, config: &AppConfig) -> Result<Logger> {
        // An unknown level is reported by validation; log at INFO until then
        let level = config.logging.level().unwrap_or(Level::Info);
        let file = match self.mode {
            RunMode::Mirror => &config.logging.file,
            RunMode::Sync => &config.sync.log_file,
        };
        let path = config.logging.path_for(file);

        Logger::new(level)
            .with_console(config.logging.console_output)
            .with_file(&path)
            .with_context(|| format!("Cannot open log file {}", path.display()))
    }

    fn api(
        &self,
        config: &AppConfig,
        output: &Logger,
        provided: Option<Arc<dyn RegistryApi>>,
    ) -> Result<Arc<dyn RegistryApi>> {
        if let Some(api) = provided {
            return Ok(api);
        }
        let client = QuayClient::builder(output.clone())
            .with_timeout(config.operation.api_timeout())
            .with_skip_tls(config.operation.skip_tls)
            .build()?;
        Ok(Arc::new(client))
    }
}

fn required<'a>(catalog: &'a TargetCatalog, name: &str) -> Result<&'a TargetEnvironment> {
    catalog
        .get(name)
        .with_context(|| format!("Registry '{}' is not configured", name))
}

/// Every configured target referenced by at least one image, in first-use order
fn mirror_login_targets<'a>(config: &AppConfig, catalog: &'a TargetCatalog) -> Vec<&'a TargetEnvironment> {
    let mut targets: Vec<&TargetEnvironment> = Vec::new();
    for name in config.images.iter().flat_map(|entry| entry.targets.iter()) {
        if let Some(target) = catalog.get(name) {
            if !targets.iter().any(|known| known.name == target.name) {
                targets.push(target);
            }
        }
    }
    targets
}
