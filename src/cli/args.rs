//! Command-line argument parsing
//!
//! Both entry points take no flags; everything comes from the config file and
//! the environment. Parsing still provides `--help` and `--version`.

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "image-mirror")]
#[command(about = "Mirror configured source images to their target registries")]
#[command(
    long_about = "Mirror each image listed in the config file to its target registries.\n\n\
    Existing tags are never overwritten; the `latest` alias is updated on every successful push.\n\
    Config file: $REPLICATOR_CONFIG (default: replicator.toml)."
)]
#[command(version, author)]
pub struct MirrorArgs {}

#[derive(Parser, Debug)]
#[command(name = "registry-sync")]
#[command(about = "Copy every repository and tag from the source registry to the destination")]
#[command(
    long_about = "Discover every repository and tag in the configured sync source registry and copy \
    each one that is missing from the destination registry.\n\n\
    Config file: $REPLICATOR_CONFIG (default: replicator.toml)."
)]
#[command(version, author)]
pub struct SyncArgs {}
