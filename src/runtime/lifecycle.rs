//! Host lifecycle: mount the function, serve, and shut down on a trigger.

use crate::event::EventReceiver;
use crate::function::recovery::install_panic_hook;
use crate::function::{classify, recovered_http, Classified, Function, HttpFunction};
use crate::runtime::dispatcher::Dispatcher;
use crate::runtime::server::HttpServer;
use crate::runtime::signals::TerminationSignals;
use crate::runtime::{HostConfig, HostError};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Where a host is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Created, not yet bound.
    Starting,
    /// Accepting connections on `addr`.
    Listening { addr: SocketAddr },
    /// A termination trigger fired; connections are draining.
    ShuttingDown,
    /// The run is over.
    Stopped,
}

/// Hosts one function until told to stop.
///
/// ```rust,no_run
/// use lessgo::prelude::*;
///
/// #[tokio::main]
/// async fn main() -> Result<(), HostError> {
///     let host = FunctionHost::new(HostConfig::new().port(8080));
///     let hello = Function::http(|_req: Request| async move {
///         Ok::<_, FunctionError>(Response::text("hello"))
///     });
///     host.run(Some(hello)).await
/// }
/// ```
pub struct FunctionHost {
    config: HostConfig,
    dispatcher: Dispatcher,
    state: Arc<watch::Sender<LifecycleState>>,
}

impl FunctionHost {
    /// Create a host with the given configuration.
    pub fn new(config: HostConfig) -> Self {
        let (state, _) = watch::channel(LifecycleState::Starting);
        Self {
            config,
            dispatcher: Dispatcher::new(),
            state: Arc::new(state),
        }
    }

    /// The host configuration.
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Register an extra HTTP function on `path` before running.
    ///
    /// The function gets the same panic recovery as the hosted one. Routes
    /// registered here are matched before the hosted function's route.
    pub fn add_http_handler(
        &mut self,
        path: impl Into<String>,
        function: impl HttpFunction + 'static,
    ) -> &mut Self {
        self.dispatcher
            .register_path(path, recovered_http(Arc::new(function)));
        self
    }

    /// Watch the host's lifecycle state.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Serve `function` until SIGINT or SIGTERM.
    pub async fn run(self, function: Option<Function>) -> Result<(), HostError> {
        let signals = TerminationSignals::install().map_err(HostError::Signal)?;
        self.run_until(function, signals.recv()).await
    }

    /// Serve `function` until `shutdown` completes.
    pub async fn run_until<F>(self, function: Option<Function>, shutdown: F) -> Result<(), HostError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        install_panic_hook();

        let token = CancellationToken::new();
        let trigger = {
            let token = token.clone();
            tokio::spawn(async move {
                shutdown.await;
                token.cancel();
            })
        };

        let state = self.state.clone();
        let result = self.serve(function, token).await;
        trigger.abort();
        state.send_replace(LifecycleState::Stopped);
        info!("function host stopped");
        result
    }

    async fn serve(
        self,
        function: Option<Function>,
        token: CancellationToken,
    ) -> Result<(), HostError> {
        let FunctionHost {
            config,
            mut dispatcher,
            state,
        } = self;

        let port = config.resolve_port();
        match classify(function, &token) {
            Classified::Http { variant, handler } => {
                info!(variant = ?variant, "Initializing HTTP function");
                dispatcher.register_path("/", handler);
            }
            Classified::Event(function) => {
                let receiver = EventReceiver::new(&config.event, function, token.clone())?;
                info!(path = receiver.path(), "Initializing CloudEvent function");
                let path = receiver.path().to_string();
                dispatcher.register_path(path, Arc::new(receiver));
            }
        }

        let grace = config.shutdown_grace;
        let server = HttpServer::new(config, port, dispatcher, state.clone());

        let (tx, rx) = oneshot::channel();
        let listener = {
            let server = server.clone();
            let token = token.clone();
            tokio::spawn(async move {
                let result = server.listen_and_serve().await;
                token.cancel();
                let _ = tx.send(result);
            })
        };

        token.cancelled().await;
        state.send_replace(LifecycleState::ShuttingDown);
        info!(addr = server.addr(), "shutting down");

        if let Err(err) = server.shutdown(grace).await {
            error!(error = %err, "server shutdown did not complete cleanly");
        }

        let outcome = rx.await.unwrap_or(Err(HostError::ListenerLost));
        if let Err(err) = listener.await {
            error!(error = %err, "listener task failed");
        }
        outcome
    }
}
