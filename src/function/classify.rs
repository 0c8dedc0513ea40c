//! The hosted function and its resolution into a mountable handler.

use crate::function::handler::{ContextFunction, EventFunction, FunctionContext, HttpFunction};
use crate::function::recovery::Recover;
use crate::http::{Request, Response};
use crate::runtime::{Handler, OkHandler};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

/// The calling convention a hosted function follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerVariant {
    /// Plain request/response HTTP function.
    RawHttp,
    /// HTTP function that also receives the serving context.
    ContextualHttp,
    /// Not an HTTP function: served through the CloudEvents receiver.
    Unresolved,
}

/// The single function a host serves.
///
/// The caller picks the variant; the host never inspects the callback.
#[derive(Clone)]
pub enum Function {
    /// See [`HttpFunction`].
    Http(Arc<dyn HttpFunction>),
    /// See [`ContextFunction`].
    Contextual(Arc<dyn ContextFunction>),
    /// See [`EventFunction`].
    Event(Arc<dyn EventFunction>),
}

impl Function {
    /// Host a plain HTTP function.
    pub fn http(function: impl HttpFunction + 'static) -> Self {
        Function::Http(Arc::new(function))
    }

    /// Host an HTTP function that observes host cancellation.
    pub fn contextual(function: impl ContextFunction + 'static) -> Self {
        Function::Contextual(Arc::new(function))
    }

    /// Host a CloudEvents function.
    pub fn event(function: impl EventFunction + 'static) -> Self {
        Function::Event(Arc::new(function))
    }

    /// The calling convention of this function.
    pub fn variant(&self) -> HandlerVariant {
        match self {
            Function::Http(_) => HandlerVariant::RawHttp,
            Function::Contextual(_) => HandlerVariant::ContextualHttp,
            Function::Event(_) => HandlerVariant::Unresolved,
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Function").field(&self.variant()).finish()
    }
}

/// What gets mounted on `/` once the function is classified.
pub enum Classified {
    /// An HTTP handler, ready to mount.
    Http {
        variant: HandlerVariant,
        handler: Arc<dyn Handler>,
    },
    /// Event mode: the caller builds a receiver around this function.
    Event(Arc<dyn EventFunction>),
}

impl Classified {
    /// The variant that was resolved.
    pub fn variant(&self) -> HandlerVariant {
        match self {
            Classified::Http { variant, .. } => *variant,
            Classified::Event(_) => HandlerVariant::Unresolved,
        }
    }
}

/// Resolve the hosted function.
///
/// A missing function is replaced by [`OkHandler`]. HTTP variants are wrapped
/// in the recovery boundary; the contextual one closes over `token`.
pub fn classify(function: Option<Function>, token: &CancellationToken) -> Classified {
    let Some(function) = function else {
        warn!("no function supplied, serving the default handler");
        return Classified::Http {
            variant: HandlerVariant::RawHttp,
            handler: Arc::new(OkHandler),
        };
    };

    match function {
        Function::Http(function) => Classified::Http {
            variant: HandlerVariant::RawHttp,
            handler: Arc::new(Recover::new(HttpAdapter { function })),
        },
        Function::Contextual(function) => Classified::Http {
            variant: HandlerVariant::ContextualHttp,
            handler: Arc::new(Recover::new(ContextAdapter {
                function,
                token: token.clone(),
            })),
        },
        Function::Event(function) => Classified::Event(function),
    }
}

/// Wrap a plain HTTP function for mounting on an arbitrary route.
pub(crate) fn recovered_http(function: Arc<dyn HttpFunction>) -> Arc<dyn Handler> {
    Arc::new(Recover::new(HttpAdapter { function }))
}

struct HttpAdapter {
    function: Arc<dyn HttpFunction>,
}

#[async_trait]
impl Handler for HttpAdapter {
    async fn call(&self, request: Request) -> Response {
        let request_id = request.request_id.clone();
        match self.function.handle(request).await {
            Ok(response) => response,
            Err(err) => {
                error!(request_id = %request_id, error = %err, "function returned an error");
                err.into()
            }
        }
    }
}

struct ContextAdapter {
    function: Arc<dyn ContextFunction>,
    token: CancellationToken,
}

#[async_trait]
impl Handler for ContextAdapter {
    async fn call(&self, request: Request) -> Response {
        let ctx = FunctionContext::new(self.token.clone(), request.request_id.clone());
        let request_id = request.request_id.clone();
        match self.function.handle(ctx, request).await {
            Ok(response) => response,
            Err(err) => {
                error!(request_id = %request_id, error = %err, "function returned an error");
                err.into()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::function::FunctionError;
    use crate::http::{Method, StatusCode};

    async fn hello(_request: Request) -> Result<Response, FunctionError> {
        Ok(Response::text("hello"))
    }

    async fn cancelled(ctx: FunctionContext, _request: Request) -> Result<Response, FunctionError> {
        Ok(Response::text(ctx.is_cancelled().to_string()))
    }

    async fn sink(_ctx: FunctionContext, _event: Event) -> Result<Option<Event>, FunctionError> {
        Ok(None)
    }

    async fn failing(_request: Request) -> Result<Response, FunctionError> {
        Err(FunctionError::bad_request("bad input"))
    }

    #[test]
    fn test_classification_is_total_and_deterministic() {
        let token = CancellationToken::new();
        let cases = [
            (Some(Function::http(hello)), HandlerVariant::RawHttp),
            (Some(Function::contextual(cancelled)), HandlerVariant::ContextualHttp),
            (Some(Function::event(sink)), HandlerVariant::Unresolved),
            (None, HandlerVariant::RawHttp),
        ];

        for (function, expected) in cases {
            if let Some(function) = &function {
                assert_eq!(function.variant(), expected);
            }
            for _ in 0..2 {
                assert_eq!(classify(function.clone(), &token).variant(), expected);
            }
        }
    }

    #[tokio::test]
    async fn test_missing_function_serves_ok() {
        let Classified::Http { handler, .. } = classify(None, &CancellationToken::new()) else {
            panic!("expected an http handler");
        };
        let response = handler.call(Request::new(Method::Post, "/")).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.text_body(), Some("ok".to_string()));
    }

    #[tokio::test]
    async fn test_contextual_function_sees_host_token() {
        let token = CancellationToken::new();
        let Classified::Http { handler, .. } =
            classify(Some(Function::contextual(cancelled)), &token)
        else {
            panic!("expected an http handler");
        };

        let response = handler.call(Request::default()).await;
        assert_eq!(response.text_body(), Some("false".to_string()));

        token.cancel();
        let response = handler.call(Request::default()).await;
        assert_eq!(response.text_body(), Some("true".to_string()));
    }

    #[tokio::test]
    async fn test_function_error_becomes_response() {
        let Classified::Http { handler, .. } =
            classify(Some(Function::http(failing)), &CancellationToken::new())
        else {
            panic!("expected an http handler");
        };

        let response = handler.call(Request::default()).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.text_body(), Some("bad input".to_string()));
    }
}
