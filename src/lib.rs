//! Registry Replicator Library
//!
//! Replicates container images between registries in two ways:
//! a configuration-driven mirror of listed source images to target registries
//! (`image-mirror`), and a discovery-driven copy of every repository and tag
//! from one registry to another (`registry-sync`).

pub mod cli;
pub mod common;
pub mod config;
pub mod engine;
pub mod error;
pub mod image;
pub mod logging;
pub mod registry;
pub mod replication;

pub use config::{AppConfig, TargetCatalog, TargetEnvironment};
pub use error::{ReplicationError, Result};
pub use logging::Logger;
