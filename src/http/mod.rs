//! HTTP types exchanged between the host and the hosted function.

mod request;
mod response;

pub use hyper::StatusCode;
pub use request::{Method, Request};
pub use response::Response;

