//! `image-mirror`: mirror configured source images to their target registries

use clap::Parser;
use registry_replicator::cli::{MirrorArgs, RunMode, Runner};
use registry_replicator::replication::EXIT_FAILURE;

#[tokio::main]
async fn main() {
    let _args = MirrorArgs::parse();

    let code = match Runner::from_env(RunMode::Mirror).run().await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("[FATAL_ERROR] image-mirror: {:#}", error);
            EXIT_FAILURE
        }
    };
    std::process::exit(code);
}
