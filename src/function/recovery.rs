//! Per-request panic containment.
//!
//! [`Recover`] polls the wrapped handler inside `catch_unwind`. A panic is
//! logged together with the backtrace of the panicking thread and answered
//! with an empty `500`; the connection and the server carry on.

use crate::http::{Request, Response, StatusCode};
use crate::runtime::Handler;
use async_trait::async_trait;
use futures_util::FutureExt;
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;
use tracing::error;

thread_local! {
    static LAST_PANIC_BACKTRACE: RefCell<Option<Backtrace>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

/// Chain a panic hook that records the backtrace of the panicking thread.
///
/// The hook runs on the thread that panicked before unwinding starts, so the
/// boundary, which catches on that same thread, can pick the trace up.
/// The previous hook still runs afterwards.
pub fn install_panic_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            LAST_PANIC_BACKTRACE.with(|slot| {
                *slot.borrow_mut() = Some(Backtrace::force_capture());
            });
            previous(info);
        }));
    });
}

/// Whether [`install_panic_hook`] has run in this process.
pub fn panic_hook_installed() -> bool {
    HOOK.is_completed()
}

fn take_backtrace() -> Option<Backtrace> {
    LAST_PANIC_BACKTRACE.with(|slot| slot.borrow_mut().take())
}

/// Render a panic payload the way the default hook does.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

/// Handler wrapper that turns a panic into a `500` response.
///
/// The logged backtrace comes from the hook set by [`install_panic_hook`],
/// which [`crate::runtime::FunctionHost`] installs when it starts running.
/// Without the hook the panic is still contained but logged without a trace.
pub struct Recover<H> {
    inner: H,
}

impl<H: Handler> Recover<H> {
    /// Wrap `inner` in a recovery boundary.
    pub fn new(inner: H) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<H: Handler> Handler for Recover<H> {
    async fn call(&self, request: Request) -> Response {
        let request_id = request.request_id.clone();
        let method = request.method.clone();
        let path = request.path().to_string();

        match AssertUnwindSafe(self.inner.call(request)).catch_unwind().await {
            Ok(response) => response,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                let backtrace = take_backtrace()
                    .map(|trace| trace.to_string())
                    .unwrap_or_else(|| "<backtrace unavailable>".to_string());
                error!(
                    request_id = %request_id,
                    method = %method,
                    path = %path,
                    "user function error: {}\n{}",
                    message,
                    backtrace
                );
                Response::new(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}
