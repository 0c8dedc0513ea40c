//! Termination signal handling.
//!
//! SIGINT and SIGTERM are treated the same. Handlers are installed up front
//! so a failure surfaces as a startup error instead of a missed signal.

use std::io;
use tracing::info;

/// Installed termination signal handlers.
pub struct TerminationSignals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl TerminationSignals {
    /// Install handlers for the termination signals.
    #[cfg(unix)]
    pub fn install() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    /// Install handlers for the termination signals.
    #[cfg(not(unix))]
    pub fn install() -> io::Result<Self> {
        Ok(Self {})
    }

    /// Wait for the first termination signal.
    #[cfg(unix)]
    pub async fn recv(mut self) {
        tokio::select! {
            _ = self.interrupt.recv() => info!(signal = "SIGINT", "received termination signal"),
            _ = self.terminate.recv() => info!(signal = "SIGTERM", "received termination signal"),
        }
    }

    /// Wait for the first termination signal.
    #[cfg(not(unix))]
    pub async fn recv(self) {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!(signal = "ctrl-c", "received termination signal"),
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for ctrl-c");
                std::future::pending::<()>().await
            }
        }
    }
}
