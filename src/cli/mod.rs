//! Command line interface module
//!
//! Argument parsing for both binaries, the best-effort login phase, and the
//! runner that loads configuration, wires components and maps the run to an
//! exit code.

pub mod args;
pub mod login;
pub mod runner;

pub use args::{MirrorArgs, SyncArgs};
pub use login::{LoginSummary, PreAuthenticator};
pub use runner::{Collaborators, RunMode, Runner};
