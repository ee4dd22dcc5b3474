//! Configuration loading, credential resolution and validation
//!
//! Everything comes from one TOML file (path in `REPLICATOR_CONFIG`, default
//! `replicator.toml`) plus a handful of environment overrides. API tokens are
//! read from the environment variables the file names, at load time.

use crate::common::RetryPolicy;
use crate::error::{ReplicationError, Result};
use crate::image::ImageReference;
use crate::logging::Level;
use crate::replication::ReplicationTask;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_PATH_ENV: &str = "REPLICATOR_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "replicator.toml";

/// Reads a process environment variable
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Config file location, honouring `REPLICATOR_CONFIG`
pub fn config_path(lookup: &dyn Fn(&str) -> Option<String>) -> PathBuf {
    lookup(CONFIG_PATH_ENV)
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// A registry as written in the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySettings {
    /// Registry host, e.g. `quay-registry.example.com`
    pub url: String,
    pub namespace: String,
    /// Organization used in API calls; defaults to `namespace`
    #[serde(default)]
    pub organization: Option<String>,
    /// Name of the environment variable holding the API token
    #[serde(default)]
    pub api_token_env: Option<String>,
    /// Literal token, used only when `api_token_env` is absent or unset
    #[serde(default)]
    pub api_token: Option<String>,
    /// Management API base URL; defaults to `https://{url}`
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub username_env: Option<String>,
    #[serde(default)]
    pub password_env: Option<String>,
}

/// A registry with its credential resolved, immutable for the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetEnvironment {
    pub name: String,
    pub url: String,
    pub namespace: String,
    pub organization: String,
    pub api_token: String,
    pub api_url: Option<String>,
    pub username_env: Option<String>,
    pub password_env: Option<String>,
}

impl TargetEnvironment {
    pub fn api_base(&self) -> String {
        self.api_url
            .clone()
            .unwrap_or_else(|| format!("https://{}", self.url))
            .trim_end_matches('/')
            .to_string()
    }

    /// Empty or `YOUR_..._HERE` style values count as missing
    pub fn has_usable_token(&self) -> bool {
        let token = self.api_token.trim();
        !token.is_empty() && !(token.starts_with("YOUR_") && token.ends_with("_HERE"))
    }
}

/// Registries looked up by name
#[derive(Debug, Clone, Default)]
pub struct TargetCatalog {
    targets: BTreeMap<String, TargetEnvironment>,
}

impl TargetCatalog {
    pub fn new(targets: impl IntoIterator<Item = TargetEnvironment>) -> Self {
        Self {
            targets: targets
                .into_iter()
                .map(|target| (target.name.clone(), target))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&TargetEnvironment> {
        self.targets.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.targets.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TargetEnvironment> {
        self.targets.values()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// One `[[images]]` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageEntry {
    pub source: String,
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl ImageEntry {
    pub fn to_task(&self) -> Result<ReplicationTask> {
        Ok(ReplicationTask {
            source: ImageReference::parse(&self.source)?,
            targets: self.targets.clone(),
            description: self
                .description
                .clone()
                .unwrap_or_else(|| "No description provided".to_string()),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub file: String,
    pub log_dir: String,
    pub console_output: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            file: "image_mirror.log".to_string(),
            log_dir: "logs".to_string(),
            console_output: true,
        }
    }
}

impl LogConfig {
    pub fn level(&self) -> Result<Level> {
        self.level.parse().map_err(ReplicationError::Config)
    }

    pub fn path_for(&self, file: &str) -> PathBuf {
        Path::new(&self.log_dir).join(file)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationConfig {
    pub continue_on_error: bool,
    pub create_repos_if_not_exists: bool,
    pub cleanup_local_images: bool,
    /// Seconds
    pub docker_timeout: u64,
    /// Seconds
    pub api_timeout: u64,
    pub max_retries: u32,
    /// Seconds
    pub retry_delay: u64,
    /// Container engine binary
    pub engine: String,
    pub skip_tls: bool,
}

impl Default for OperationConfig {
    fn default() -> Self {
        Self {
            continue_on_error: true,
            create_repos_if_not_exists: true,
            cleanup_local_images: false,
            docker_timeout: 300,
            api_timeout: 30,
            max_retries: 3,
            retry_delay: 5,
            engine: "docker".to_string(),
            skip_tls: false,
        }
    }
}

impl OperationConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_secs(self.retry_delay))
    }

    pub fn docker_timeout(&self) -> Duration {
        Duration::from_secs(self.docker_timeout)
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout)
    }

    fn issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.max_retries == 0 {
            issues.push("operation.max_retries must be greater than 0".to_string());
        }
        if self.docker_timeout == 0 {
            issues.push("operation.docker_timeout must be greater than 0".to_string());
        }
        if self.api_timeout == 0 {
            issues.push("operation.api_timeout must be greater than 0".to_string());
        }
        if self.engine.trim().is_empty() {
            issues.push("operation.engine cannot be empty".to_string());
        }
        issues
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub source: String,
    pub destination: String,
    pub log_file: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            source: "prod".to_string(),
            destination: "dr".to_string(),
            log_file: "registry_sync.log".to_string(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub allowed_source_registries: Vec<String>,
    #[serde(default)]
    pub registries: BTreeMap<String, RegistrySettings>,
    #[serde(default)]
    pub images: Vec<ImageEntry>,
    #[serde(default)]
    pub logging: LogConfig,
    #[serde(default)]
    pub operation: OperationConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ReplicationError::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Override operation and logging knobs from the environment
    pub fn apply_env_overrides(&mut self, lookup: &dyn Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("REPLICATOR_CONTINUE_ON_ERROR") {
            self.operation.continue_on_error = parse_flag(&val);
        }
        if let Some(val) = lookup("REPLICATOR_CLEANUP_LOCAL_IMAGES") {
            self.operation.cleanup_local_images = parse_flag(&val);
        }
        if let Some(Ok(retries)) = lookup("REPLICATOR_MAX_RETRIES").map(|v| v.trim().parse()) {
            self.operation.max_retries = retries;
        }
        if let Some(Ok(delay)) = lookup("REPLICATOR_RETRY_DELAY").map(|v| v.trim().parse()) {
            self.operation.retry_delay = delay;
        }
        if let Some(level) = lookup("REPLICATOR_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    /// Resolve every registry's token and build the lookup catalog
    pub fn catalog(&self, lookup: &dyn Fn(&str) -> Option<String>) -> TargetCatalog {
        TargetCatalog::new(self.registries.iter().map(|(name, settings)| {
            let api_token = settings
                .api_token_env
                .as_deref()
                .and_then(lookup)
                .or_else(|| settings.api_token.clone())
                .unwrap_or_default();

            TargetEnvironment {
                name: name.clone(),
                url: settings.url.clone(),
                namespace: settings.namespace.clone(),
                organization: settings
                    .organization
                    .clone()
                    .unwrap_or_else(|| settings.namespace.clone()),
                api_token,
                api_url: settings.api_url.clone(),
                username_env: settings.username_env.clone(),
                password_env: settings.password_env.clone(),
            }
        }))
    }

    /// Issues that must stop a mirror run before any task starts
    pub fn validate_mirror(&self, catalog: &TargetCatalog) -> Vec<String> {
        let mut issues = self.operation.issues();
        issues.extend(self.logging_issues());

        for target in catalog.iter() {
            if !target.has_usable_token() {
                issues.push(format!(
                    "Missing or placeholder API token for {} environment",
                    target.name
                ));
            }
        }

        if self.images.is_empty() {
            issues.push("No images configured for mirroring".to_string());
        }

        for entry in &self.images {
            match ImageReference::parse(&entry.source) {
                Ok(image) if !image.is_allowed(&self.allowed_source_registries) => {
                    issues.push(format!(
                        "Image {} not from allowed source registry",
                        entry.source
                    ));
                }
                Ok(_) => {}
                Err(e) => issues.push(format!("Invalid image {}: {}", entry.source, e)),
            }

            for target in &entry.targets {
                if !catalog.contains(target) {
                    issues.push(format!(
                        "Unknown target environment '{}' for image {}",
                        target, entry.source
                    ));
                }
            }
        }

        issues
    }

    /// Non-fatal remarks about the mirror catalog
    pub fn mirror_warnings(&self) -> Vec<String> {
        self.images
            .iter()
            .filter(|entry| entry.targets.is_empty())
            .map(|entry| format!("No targets specified for image: {}", entry.source))
            .collect()
    }

    /// Issues that must stop a sync run before discovery starts
    pub fn validate_sync(&self, catalog: &TargetCatalog) -> Vec<String> {
        let mut issues = self.operation.issues();
        issues.extend(self.logging_issues());

        for (role, name) in [("source", &self.sync.source), ("destination", &self.sync.destination)] {
            match catalog.get(name) {
                Some(target) if !target.has_usable_token() => issues.push(format!(
                    "Missing or placeholder API token for {} environment",
                    name
                )),
                Some(_) => {}
                None => issues.push(format!(
                    "Sync {} registry '{}' is not configured",
                    role, name
                )),
            }
        }

        if self.sync.source == self.sync.destination {
            issues.push("Sync source and destination must differ".to_string());
        }

        issues
    }

    /// Tasks in configuration order
    pub fn mirror_tasks(&self) -> Result<Vec<ReplicationTask>> {
        self.images.iter().map(ImageEntry::to_task).collect()
    }

    fn logging_issues(&self) -> Vec<String> {
        match self.logging.level() {
            Ok(_) => Vec::new(),
            Err(e) => vec![e.to_string()],
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
