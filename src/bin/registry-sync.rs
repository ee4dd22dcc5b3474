//! `registry-sync`: copy every repository and tag from the sync source to the destination

use clap::Parser;
use registry_replicator::cli::{RunMode, Runner, SyncArgs};
use registry_replicator::replication::EXIT_FAILURE;

#[tokio::main]
async fn main() {
    let _args = SyncArgs::parse();

    let code = match Runner::from_env(RunMode::Sync).run().await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("[FATAL_ERROR] registry-sync: {:#}", error);
            EXIT_FAILURE
        }
    };
    std::process::exit(code);
}
