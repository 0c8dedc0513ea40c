//! HTTP server: accept loop, request conversion and graceful shutdown.

use crate::http::{Method, Request, Response, StatusCode};
use crate::runtime::dispatcher::Dispatcher;
use crate::runtime::lifecycle::LifecycleState;
use crate::runtime::{HostConfig, HostError};
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::server::graceful::GracefulShutdown;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinSet;
use tokio::time::error::Elapsed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Header carrying a caller-supplied request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Pause after a failed accept before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Smallest read buffer hyper accepts.
const MIN_BUF_SIZE: usize = 8192;

/// The function host's HTTP listener.
///
/// Cheap to clone; clones share the same listener state, so one task can run
/// [`HttpServer::listen_and_serve`] while another calls
/// [`HttpServer::shutdown`].
#[derive(Clone)]
pub struct HttpServer {
    inner: Arc<Inner>,
}

struct Inner {
    addr: String,
    shared: Arc<Shared>,
    closing: CancellationToken,
    graceful: Mutex<Option<GracefulShutdown>>,
    connections: Mutex<JoinSet<()>>,
    state: Arc<watch::Sender<LifecycleState>>,
}

/// What every connection's service needs.
struct Shared {
    dispatcher: Dispatcher,
    config: HostConfig,
}

impl HttpServer {
    /// Create a server for `dispatcher` on the resolved `port`.
    pub fn new(
        config: HostConfig,
        port: u16,
        dispatcher: Dispatcher,
        state: Arc<watch::Sender<LifecycleState>>,
    ) -> Self {
        let addr = config.bind_addr(port);
        Self {
            inner: Arc::new(Inner {
                addr,
                shared: Arc::new(Shared { dispatcher, config }),
                closing: CancellationToken::new(),
                graceful: Mutex::new(Some(GracefulShutdown::new())),
                connections: Mutex::new(JoinSet::new()),
                state,
            }),
        }
    }

    /// Address the server binds to.
    pub fn addr(&self) -> &str {
        &self.inner.addr
    }

    /// Bind and serve until [`HttpServer::shutdown`] is called.
    ///
    /// Returns `Ok(())` once the listener has been closed by a shutdown, or
    /// the bind error if the address cannot be used.
    pub async fn listen_and_serve(&self) -> Result<(), HostError> {
        let inner = &self.inner;
        if inner.closing.is_cancelled() {
            return Ok(());
        }

        let bind_error = |source| HostError::Bind {
            addr: inner.addr.clone(),
            source,
        };
        let listener = TcpListener::bind(&inner.addr).await.map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        inner.state.send_if_modified(|state| {
            if *state == LifecycleState::Starting {
                *state = LifecycleState::Listening { addr: local_addr };
                true
            } else {
                false
            }
        });
        info!(addr = %local_addr, "listening on http port");

        let config = &inner.shared.config;
        let mut builder = http1::Builder::new();
        builder
            .timer(TokioTimer::new())
            .header_read_timeout(config.read_timeout)
            .max_buf_size(config.max_header_bytes.max(MIN_BUF_SIZE));

        loop {
            let (stream, remote_addr) = tokio::select! {
                biased;
                _ = inner.closing.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        warn!(error = %err, "failed to accept connection");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                        continue;
                    }
                },
            };

            let shared = inner.shared.clone();
            let service = service_fn(move |req| {
                let shared = shared.clone();
                async move { shared.handle_request(req, remote_addr).await }
            });
            let conn = builder.serve_connection(TokioIo::new(stream), service);

            let watcher = match inner.graceful.lock().await.as_ref() {
                Some(graceful) => graceful.watcher(),
                None => break,
            };
            let conn = watcher.watch(conn);

            let mut connections = inner.connections.lock().await;
            while connections.try_join_next().is_some() {}
            connections.spawn(async move {
                if let Err(err) = conn.await {
                    debug!(remote = %remote_addr, error = %err, "connection closed with error");
                }
            });
        }

        info!(addr = %local_addr, "http listener closed");
        Ok(())
    }

    /// Stop accepting and drain in-flight connections.
    ///
    /// Connections still open when `grace` runs out are aborted and
    /// [`HostError::ShutdownTimeout`] is returned. Calling this more than
    /// once is harmless.
    pub async fn shutdown(&self, grace: Duration) -> Result<(), HostError> {
        self.inner.closing.cancel();

        let Some(graceful) = self.inner.graceful.lock().await.take() else {
            return Ok(());
        };

        info!(grace = ?grace, connections = graceful.count(), "draining connections");
        match tokio::time::timeout(grace, graceful.shutdown()).await {
            Ok(()) => {
                debug!("all connections drained");
                Ok(())
            }
            Err(_) => {
                let mut connections = self.inner.connections.lock().await;
                warn!(remaining = connections.len(), "grace period expired, aborting connections");
                connections.abort_all();
                Err(HostError::ShutdownTimeout(grace))
            }
        }
    }
}

impl Shared {
    /// Serve one hyper request.
    ///
    /// An `Err` means the write timeout expired; hyper then closes the
    /// connection without a response.
    async fn handle_request(
        &self,
        req: hyper::Request<Incoming>,
        remote_addr: SocketAddr,
    ) -> Result<hyper::Response<Full<Bytes>>, Elapsed> {
        let request_id = req
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .unwrap_or_else(generate_request_id);

        debug!(
            request_id = %request_id,
            method = %req.method(),
            path = req.uri().path(),
            remote = %remote_addr,
            "handling request"
        );

        let request = match convert_request(req, &self.config).await {
            Ok(request) => request.with_request_id(request_id.clone()),
            Err(err) => {
                warn!(request_id = %request_id, error = %err.message(), "failed to read request");
                return Ok(build_response(err.into_response()));
            }
        };

        let method = request.method.clone();
        let path = request.path().to_string();
        let response =
            match tokio::time::timeout(self.config.write_timeout, self.dispatcher.dispatch(request))
                .await
            {
                Ok(response) => response,
                Err(elapsed) => {
                    warn!(
                        request_id = %request_id,
                        method = %method,
                        path = %path,
                        "write timeout expired, closing connection"
                    );
                    return Err(elapsed);
                }
            };

        debug!(request_id = %request_id, status = response.status.as_u16(), "request finished");
        Ok(build_response(response))
    }
}

/// Reasons a request body could not be buffered.
#[derive(Debug)]
enum BodyError {
    TooLarge(usize),
    Timeout,
    Read(String),
}

impl BodyError {
    fn message(&self) -> String {
        match self {
            BodyError::TooLarge(limit) => format!("request body exceeds {} bytes", limit),
            BodyError::Timeout => "timed out reading request body".to_string(),
            BodyError::Read(err) => format!("failed to read request body: {}", err),
        }
    }

    fn into_response(self) -> Response {
        let status = match self {
            BodyError::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            BodyError::Timeout => StatusCode::REQUEST_TIMEOUT,
            BodyError::Read(_) => StatusCode::BAD_REQUEST,
        };
        Response::error(status, self.message())
    }
}

/// Convert a hyper request into a buffered [`Request`].
async fn convert_request(
    req: hyper::Request<Incoming>,
    config: &HostConfig,
) -> Result<Request, BodyError> {
    let (parts, body) = req.into_parts();
    let method = Method::from(&parts.method);
    let url = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let mut headers: HashMap<String, String> = HashMap::new();
    for (name, value) in &parts.headers {
        if let Ok(v) = value.to_str() {
            headers
                .entry(name.as_str().to_string())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(v);
                })
                .or_insert_with(|| v.to_string());
        }
    }

    let limited = Limited::new(body, config.max_body_bytes);
    let collected = tokio::time::timeout(config.read_timeout, limited.collect())
        .await
        .map_err(|_| BodyError::Timeout)?
        .map_err(|err| {
            if err.downcast_ref::<LengthLimitError>().is_some() {
                BodyError::TooLarge(config.max_body_bytes)
            } else {
                BodyError::Read(err.to_string())
            }
        })?;
    let body_bytes = collected.to_bytes();

    Ok(Request {
        method,
        url,
        headers,
        body: (!body_bytes.is_empty()).then_some(body_bytes),
        params: HashMap::new(),
        request_id: String::new(),
    })
}

/// Build a hyper response from a [`Response`].
fn build_response(response: Response) -> hyper::Response<Full<Bytes>> {
    let mut builder = hyper::Response::builder().status(response.status);
    for (name, value) in response.headers {
        builder = builder.header(name, value);
    }

    let body = response.body.unwrap_or_default();
    builder.body(Full::new(body)).unwrap_or_else(|err| {
        error!(error = %err, "invalid response from handler, falling back to 500");
        let mut fallback = hyper::Response::new(Full::new(Bytes::new()));
        *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        fallback
    })
}

/// Generate a request id from the current time.
fn generate_request_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();
    format!("{:x}", timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_response_copies_status_headers_and_body() {
        let response = Response::text("hello").header("X-Trace", "abc");
        let built = build_response(response);

        assert_eq!(built.status(), StatusCode::OK);
        assert_eq!(built.headers().get("x-trace").unwrap(), "abc");
    }

    #[test]
    fn test_build_response_invalid_header_falls_back_to_500() {
        let response = Response::ok().header("bad header", "x");
        let built = build_response(response);

        assert_eq!(built.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_body_error_statuses() {
        assert_eq!(
            BodyError::TooLarge(10).into_response().status,
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            BodyError::Timeout.into_response().status,
            StatusCode::REQUEST_TIMEOUT
        );
        assert_eq!(
            BodyError::Read("reset".into()).into_response().status,
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_generate_request_id_is_hex() {
        let id = generate_request_id();
        assert!(!id.is_empty());
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_shutdown_before_serving_returns_immediately() {
        let (state, _) = watch::channel(LifecycleState::Starting);
        let server = HttpServer::new(
            HostConfig::new().host("127.0.0.1"),
            0,
            Dispatcher::new(),
            Arc::new(state),
        );

        tokio_test::assert_ok!(server.shutdown(Duration::from_millis(10)).await);
        tokio_test::assert_ok!(server.listen_and_serve().await);
        assert_eq!(*server.inner.state.borrow(), LifecycleState::Starting);
    }
}
