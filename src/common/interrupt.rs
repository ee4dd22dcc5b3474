//! Cooperative stop flag set by Ctrl+C

use crate::replication::EXIT_INTERRUPTED;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared flag checked by the run controller around each task and by the
/// transfer executor before each engine attempt
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag {
    raised: Arc<AtomicBool>,
}

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    /// Raise the flag on the first Ctrl+C so the current image can wind down.
    /// A second Ctrl+C exits the process with code 130 straight away.
    pub fn listen_for_ctrl_c(&self) -> tokio::task::JoinHandle<()> {
        let flag = self.clone();
        tokio::spawn(async move {
            flag.watch(
                || async { tokio::signal::ctrl_c().await.is_ok() },
                || {
                    std::process::exit(EXIT_INTERRUPTED);
                },
            )
            .await;
        })
    }

    /// Raise on the first `signal`, then call `force` on the second.
    /// A `signal` that resolves to `false` (listener unavailable) ends the watch.
    pub async fn watch<S, Fut, F>(&self, mut signal: S, force: F)
    where
        S: FnMut() -> Fut,
        Fut: Future<Output = bool>,
        F: FnOnce(),
    {
        if !signal().await {
            return;
        }
        self.raise();

        if signal().await {
            force();
        }
    }
}
