//! Event receiver: the `/` endpoint in event mode.

use crate::event::binding::{decode_request, encode_response};
use crate::function::{EventFunction, FunctionContext};
use crate::http::{Method, Request, Response, StatusCode};
use crate::runtime::{EventOptions, Handler, HostError, NOT_FOUND_BODY};
use async_trait::async_trait;
use cloudevents::AttributesReader;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Receives CloudEvents over HTTP and hands them to an [`EventFunction`].
pub struct EventReceiver {
    path: String,
    allowed_origin: String,
    allowed_rate: Option<u32>,
    function: Arc<dyn EventFunction>,
    token: CancellationToken,
}

impl EventReceiver {
    /// Build a receiver, rejecting unusable protocol options.
    pub fn new(
        options: &EventOptions,
        function: Arc<dyn EventFunction>,
        token: CancellationToken,
    ) -> Result<Self, HostError> {
        if !options.path.starts_with('/') {
            return Err(HostError::EventProtocol(format!(
                "path `{}` must start with `/`",
                options.path
            )));
        }
        if options.path.starts_with("/health/") {
            return Err(HostError::EventProtocol(format!(
                "path `{}` is reserved for health checks",
                options.path
            )));
        }
        if options.allowed_origin.trim().is_empty() {
            return Err(HostError::EventProtocol(
                "webhook allowed origin must not be empty".to_string(),
            ));
        }
        if options.allowed_rate == Some(0) {
            return Err(HostError::EventProtocol(
                "webhook allowed rate must be positive".to_string(),
            ));
        }

        Ok(Self {
            path: options.path.clone(),
            allowed_origin: options.allowed_origin.clone(),
            allowed_rate: options.allowed_rate,
            function,
            token,
        })
    }

    /// Path the receiver accepts events on.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// CloudEvents webhook validation handshake.
    fn validate_webhook(&self, request: &Request) -> Response {
        let response = Response::ok().header("Allow", "POST, OPTIONS");
        if request.get_header("webhook-request-origin").is_none() {
            return response;
        }
        let rate = self
            .allowed_rate
            .map_or_else(|| "*".to_string(), |rate| rate.to_string());
        response
            .header("WebHook-Allowed-Origin", self.allowed_origin.as_str())
            .header("WebHook-Allowed-Rate", rate)
    }

    async fn receive(&self, request: Request) -> Response {
        let event = match decode_request(&request) {
            Ok(event) => event,
            Err(err) => {
                warn!(request_id = %request.request_id, error = %err, "rejected malformed event");
                return Response::error(StatusCode::BAD_REQUEST, err.to_string());
            }
        };
        debug!(
            request_id = %request.request_id,
            event_id = %event.id(),
            event_type = %event.ty(),
            "received event"
        );

        let ctx = FunctionContext::new(self.token.clone(), request.request_id.clone());
        match self.function.receive(ctx, event).await {
            Ok(Some(reply)) => match encode_response(reply) {
                Ok(response) => response,
                Err(err) => {
                    error!(request_id = %request.request_id, error = %err, "failed to encode reply event");
                    Response::new(StatusCode::INTERNAL_SERVER_ERROR)
                }
            },
            Ok(None) => Response::ok(),
            Err(err) => {
                error!(request_id = %request.request_id, error = %err, "event function returned an error");
                err.into()
            }
        }
    }
}

#[async_trait]
impl Handler for EventReceiver {
    async fn call(&self, request: Request) -> Response {
        if request.path() != self.path {
            return Response::error(StatusCode::NOT_FOUND, NOT_FOUND_BODY);
        }

        match request.method {
            Method::Post => self.receive(request).await,
            Method::Options => self.validate_webhook(&request),
            _ => Response::error(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
                .header("Allow", "POST, OPTIONS"),
        }
    }
}
