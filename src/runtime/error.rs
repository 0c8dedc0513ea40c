//! Errors that end a host run.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Fatal host error, returned from [`crate::receive_and_handle`].
///
/// Per-request failures never show up here; they are answered and logged.
#[derive(Debug, Error)]
pub enum HostError {
    /// The event protocol options cannot be used.
    #[error("invalid event protocol configuration: {0}")]
    EventProtocol(String),

    /// Termination signal handlers could not be installed.
    #[error("failed to install signal handlers: {0}")]
    Signal(#[source] io::Error),

    /// The listener could not bind its address.
    #[error("failed to listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// In-flight connections outlived the grace period and were aborted.
    #[error("server shutdown did not finish within {0:?}")]
    ShutdownTimeout(Duration),

    /// The listener task went away without reporting an outcome.
    #[error("listener task ended unexpectedly")]
    ListenerLost,
}
