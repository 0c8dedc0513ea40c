//! # lessgo - single-function host
//!
//! lessgo serves exactly one user function over HTTP, either as a plain
//! request handler or as a CloudEvents receiver, behind a fixed set of
//! health endpoints.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                        FunctionHost (lifecycle)                     │
//! │   signals ──► cancellation token ──► graceful shutdown (grace)      │
//! │  ┌─────────────────────────────────────────────────────────────┐   │
//! │  │                        Dispatcher                            │   │
//! │  │  /health/readiness   /health/liveness   /   (404 otherwise)  │   │
//! │  │                                          │                   │   │
//! │  │                 ┌────────────────────────┴─────────┐         │   │
//! │  │                 │ Recover(HTTP fn) │ EventReceiver │         │   │
//! │  │                 └──────────────────┴───────────────┘         │   │
//! │  └─────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use lessgo::prelude::*;
//!
//! async fn hello(request: Request) -> Result<Response, FunctionError> {
//!     let name = request
//!         .get_header("X-Name")
//!         .cloned()
//!         .unwrap_or_else(|| "World".to_string());
//!     Ok(Response::text(format!("Hello, {}!", name)))
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), HostError> {
//!     lessgo::receive_and_handle(Function::http(hello)).await
//! }
//! ```
//!
//! ## Function variants
//!
//! 1. **HTTP** ([`HttpFunction`]): request in, response out
//! 2. **Contextual HTTP** ([`ContextFunction`]): also gets a [`FunctionContext`]
//!    that is cancelled when the host starts shutting down
//! 3. **Event** ([`EventFunction`]): receives a decoded CloudEvent and may reply
//!    with another one
//!
//! A panic inside an HTTP function is caught, logged with its backtrace and
//! answered with a 500; the host keeps serving.
//!
//! ## Port
//!
//! An explicit [`HostConfig::port`] wins; otherwise the `port` environment
//! variable is used. A missing or unparsable value means port `0`.

pub mod event;
pub mod function;
pub mod http;
pub mod runtime;

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::event::{AttributesReader, Data, Event, EventBuilder, EventBuilderV10};
    pub use crate::function::{
        ContextFunction, EventFunction, Function, FunctionContext, FunctionError, HttpFunction,
    };
    pub use crate::http::{Method, Request, Response, StatusCode};
    pub use crate::runtime::{EventOptions, FunctionHost, HostConfig, HostError, LifecycleState};
    pub use async_trait::async_trait;
}

// Re-export for convenience
pub use event::Event;
pub use function::{
    ContextFunction, EventFunction, Function, FunctionContext, FunctionError, HttpFunction,
};
pub use http::{Request, Response};
pub use runtime::{FunctionHost, HostConfig, HostError};

/// Serve `function` with the default configuration until SIGINT or SIGTERM.
///
/// Passing `None` serves a default handler that answers `200 ok`. The result
/// is `Ok(())` after a clean shutdown; configuration, signal and bind
/// failures are returned.
pub async fn receive_and_handle(function: impl Into<Option<Function>>) -> Result<(), HostError> {
    FunctionHost::new(HostConfig::default())
        .run(function.into())
        .await
}
