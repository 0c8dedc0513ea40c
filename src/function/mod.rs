//! The hosted function: calling conventions, classification and recovery.

mod classify;
pub mod handler;
pub mod recovery;

pub use classify::{classify, Classified, Function, HandlerVariant};
pub(crate) use classify::recovered_http;
pub use handler::{ContextFunction, EventFunction, FunctionContext, FunctionError, HttpFunction};
