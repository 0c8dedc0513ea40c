//! The function host runtime: configuration, routing, serving and lifecycle.

mod config;
mod dispatcher;
mod error;
mod lifecycle;
mod server;
mod signals;

pub use config::{resolve_port, EventOptions, HostConfig, PORT_ENV};
pub use dispatcher::{
    Dispatcher, Handler, NotFoundHandler, OkHandler, Route, RouteMethod, LIVENESS_PATH,
    NOT_FOUND_BODY, READINESS_PATH,
};
pub use error::HostError;
pub use lifecycle::{FunctionHost, LifecycleState};
pub use server::{HttpServer, REQUEST_ID_HEADER};
pub use signals::TerminationSignals;
