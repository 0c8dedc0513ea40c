//! Function traits, execution context and error type.

use crate::event::Event;
use crate::http::{Request, Response, StatusCode};
use async_trait::async_trait;
use std::future::Future;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Execution context for context-aware and event functions.
///
/// Carries the host's serving token: it is cancelled once the host starts
/// shutting down, so long-running work can stop early.
#[derive(Debug, Clone, Default)]
pub struct FunctionContext {
    /// Request ID for tracing.
    pub request_id: String,
    token: CancellationToken,
}

impl FunctionContext {
    /// Create a new function context.
    pub fn new(token: CancellationToken, request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            token,
        }
    }

    /// Whether the host has begun shutting down.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the host begins shutting down.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// The underlying cancellation token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// A plain HTTP function: request in, response out.
#[async_trait]
pub trait HttpFunction: Send + Sync {
    /// Handle one request.
    async fn handle(&self, request: Request) -> Result<Response, FunctionError>;
}

/// An HTTP function that also observes the host's cancellation.
#[async_trait]
pub trait ContextFunction: Send + Sync {
    /// Handle one request with access to the serving context.
    async fn handle(
        &self,
        ctx: FunctionContext,
        request: Request,
    ) -> Result<Response, FunctionError>;
}

/// A CloudEvents function. Returning `Some(event)` replies with that event.
#[async_trait]
pub trait EventFunction: Send + Sync {
    /// Receive one decoded event.
    async fn receive(
        &self,
        ctx: FunctionContext,
        event: Event,
    ) -> Result<Option<Event>, FunctionError>;
}

#[async_trait]
impl<F, Fut> HttpFunction for F
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response, FunctionError>> + Send + 'static,
{
    async fn handle(&self, request: Request) -> Result<Response, FunctionError> {
        (self)(request).await
    }
}

#[async_trait]
impl<F, Fut> ContextFunction for F
where
    F: Fn(FunctionContext, Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response, FunctionError>> + Send + 'static,
{
    async fn handle(
        &self,
        ctx: FunctionContext,
        request: Request,
    ) -> Result<Response, FunctionError> {
        (self)(ctx, request).await
    }
}

#[async_trait]
impl<F, Fut> EventFunction for F
where
    F: Fn(FunctionContext, Event) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<Event>, FunctionError>> + Send + 'static,
{
    async fn receive(
        &self,
        ctx: FunctionContext,
        event: Event,
    ) -> Result<Option<Event>, FunctionError> {
        (self)(ctx, event).await
    }
}

/// Error returned by a hosted function.
///
/// Turned into a plain text response carrying `code` and `message`.
#[derive(Debug, Clone)]
pub struct FunctionError {
    /// Error message.
    pub message: String,
    /// Status code of the resulting response.
    pub code: StatusCode,
}

impl FunctionError {
    /// Create a new internal server error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Create a FunctionError with a specific code.
    pub fn with_code(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code,
        }
    }

    /// Create a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::with_code(StatusCode::NOT_FOUND, message)
    }

    /// Create a bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::with_code(StatusCode::BAD_REQUEST, message)
    }
}

impl std::fmt::Display for FunctionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code.as_u16(), self.message)
    }
}

impl std::error::Error for FunctionError {}

impl From<FunctionError> for Response {
    fn from(err: FunctionError) -> Self {
        Response::error(err.code, err.message)
    }
}

impl From<std::io::Error> for FunctionError {
    fn from(err: std::io::Error) -> Self {
        FunctionError::new(err.to_string())
    }
}

impl From<serde_json::Error> for FunctionError {
    fn from(err: serde_json::Error) -> Self {
        FunctionError::bad_request(err.to_string())
    }
}
