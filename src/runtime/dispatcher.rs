//! Request dispatcher: maps request paths to handlers.
//!
//! The two health routes are registered up front and always take precedence.
//! Everything else is matched in registration order, and requests that match
//! nothing get the not-found handler.

use crate::http::{Method, Request, Response, StatusCode};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Readiness probe path.
pub const READINESS_PATH: &str = "/health/readiness";
/// Liveness probe path.
pub const LIVENESS_PATH: &str = "/health/liveness";
/// Body of the catch-all 404 response.
pub const NOT_FOUND_BODY: &str = "lessgo: 404 not found";

/// A route-level request handler.
///
/// Unlike the user-facing function traits this cannot fail: whatever happens
/// inside has to be turned into a response.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Produce the response for one request.
    async fn call(&self, request: Request) -> Response;
}

/// Always answers `200 ok`. Serves the health routes and stands in for a
/// missing user function.
#[derive(Debug, Clone, Copy, Default)]
pub struct OkHandler;

#[async_trait]
impl Handler for OkHandler {
    async fn call(&self, _request: Request) -> Response {
        Response::text("ok")
    }
}

/// Answers `404` with [`NOT_FOUND_BODY`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NotFoundHandler;

#[async_trait]
impl Handler for NotFoundHandler {
    async fn call(&self, _request: Request) -> Response {
        Response::error(StatusCode::NOT_FOUND, NOT_FOUND_BODY)
    }
}

/// HTTP method filter for a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    Any,
}

impl RouteMethod {
    /// Check if this filter accepts the given method.
    pub fn matches(&self, method: &Method) -> bool {
        match self {
            RouteMethod::Any => true,
            RouteMethod::Get => *method == Method::Get,
            RouteMethod::Post => *method == Method::Post,
            RouteMethod::Put => *method == Method::Put,
            RouteMethod::Delete => *method == Method::Delete,
            RouteMethod::Patch => *method == Method::Patch,
            RouteMethod::Head => *method == Method::Head,
            RouteMethod::Options => *method == Method::Options,
        }
    }
}

/// A path pattern bound to a handler.
///
/// Patterns are exact paths (`/api/users`), segment parameters
/// (`/api/users/:id`) or prefix wildcards (`/static/*`).
#[derive(Clone)]
pub struct Route {
    pattern: String,
    method: RouteMethod,
    handler: Arc<dyn Handler>,
}

impl Route {
    /// Create a new route.
    pub fn new(method: RouteMethod, pattern: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        Self {
            pattern: pattern.into(),
            method,
            handler,
        }
    }

    /// The route's path pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The route's method filter.
    pub fn method(&self) -> RouteMethod {
        self.method
    }

    /// Match the route against a request, returning the captured parameters.
    pub fn matches(&self, path: &str, method: &Method) -> Option<HashMap<String, String>> {
        if !self.method.matches(method) {
            return None;
        }

        if let Some(prefix) = self.pattern.strip_suffix("/*") {
            return path.starts_with(prefix).then(HashMap::new);
        }

        if !self.pattern.contains(':') {
            return (self.pattern == path).then(HashMap::new);
        }

        let route_segments: Vec<&str> = self.pattern.split('/').collect();
        let path_segments: Vec<&str> = path.split('/').collect();
        if route_segments.len() != path_segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (route, actual) in route_segments.iter().zip(path_segments.iter()) {
            match route.strip_prefix(':') {
                Some(name) if !actual.is_empty() => {
                    params.insert(name.to_string(), (*actual).to_string());
                }
                Some(_) => return None,
                None if route == actual => {}
                None => return None,
            }
        }
        Some(params)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("pattern", &self.pattern)
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

/// Path-based request dispatcher.
///
/// Registration needs `&mut self`; the server takes the dispatcher by value,
/// so the route table cannot change once serving has started.
pub struct Dispatcher {
    routes: Vec<Route>,
    not_found: Arc<dyn Handler>,
}

impl Dispatcher {
    /// Create a dispatcher holding only the health routes.
    pub fn new() -> Self {
        let ok: Arc<dyn Handler> = Arc::new(OkHandler);
        Self {
            routes: vec![
                Route::new(RouteMethod::Any, READINESS_PATH, ok.clone()),
                Route::new(RouteMethod::Any, LIVENESS_PATH, ok),
            ],
            not_found: Arc::new(NotFoundHandler),
        }
    }

    /// Register a handler for any method on `pattern`.
    pub fn register_path(&mut self, pattern: impl Into<String>, handler: Arc<dyn Handler>) {
        self.register_route(RouteMethod::Any, pattern, handler);
    }

    /// Register a handler for one method on `pattern`.
    pub fn register_route(
        &mut self,
        method: RouteMethod,
        pattern: impl Into<String>,
        handler: Arc<dyn Handler>,
    ) {
        let route = Route::new(method, pattern, handler);
        tracing::debug!(pattern = %route.pattern, method = ?route.method, "registered route");
        self.routes.push(route);
    }

    /// Replace the handler used when no route matches.
    pub fn set_not_found(&mut self, handler: Arc<dyn Handler>) {
        self.not_found = handler;
    }

    /// Registered routes, in match order.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Route a request to its handler.
    pub async fn dispatch(&self, mut request: Request) -> Response {
        let path = request.path().to_string();
        for route in &self.routes {
            if let Some(params) = route.matches(&path, &request.method) {
                request.params = params;
                return route.handler.call(request).await;
            }
        }
        self.not_found.call(request).await
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Handler for Echo {
        async fn call(&self, request: Request) -> Response {
            let id = request.param("id").unwrap_or("-").to_string();
            Response::text(format!("{} {}", request.method, id))
        }
    }

    #[test]
    fn test_route_exact_match() {
        let route = Route::new(RouteMethod::Get, "/api/users", Arc::new(Echo));

        assert!(route.matches("/api/users", &Method::Get).is_some());
        assert!(route.matches("/api/users", &Method::Post).is_none());
        assert!(route.matches("/api/users/1", &Method::Get).is_none());
    }

    #[test]
    fn test_root_route_is_exact() {
        let route = Route::new(RouteMethod::Any, "/", Arc::new(Echo));

        assert!(route.matches("/", &Method::Post).is_some());
        assert!(route.matches("/other", &Method::Get).is_none());
    }

    #[test]
    fn test_route_wildcard_match() {
        let route = Route::new(RouteMethod::Any, "/static/*", Arc::new(Echo));

        assert!(route.matches("/static/app.js", &Method::Get).is_some());
        assert!(route.matches("/static/css/site.css", &Method::Get).is_some());
        assert!(route.matches("/other", &Method::Get).is_none());
    }

    #[test]
    fn test_route_param_match() {
        let route = Route::new(RouteMethod::Get, "/api/users/:id", Arc::new(Echo));

        let params = route.matches("/api/users/123", &Method::Get).unwrap();
        assert_eq!(params.get("id"), Some(&"123".to_string()));
        assert!(route.matches("/api/users", &Method::Get).is_none());
        assert!(route.matches("/api/users/", &Method::Get).is_none());
        assert!(route.matches("/api/users/1/details", &Method::Get).is_none());
    }

    #[tokio::test]
    async fn test_health_routes_answer_any_method() {
        let dispatcher = Dispatcher::new();

        for method in [Method::Get, Method::Post, Method::Delete] {
            for path in [READINESS_PATH, LIVENESS_PATH] {
                let response = dispatcher.dispatch(Request::new(method.clone(), path)).await;
                assert_eq!(response.status, StatusCode::OK);
                assert_eq!(response.text_body(), Some("ok".to_string()));
            }
        }
    }

    #[tokio::test]
    async fn test_unmatched_path_is_not_found() {
        let dispatcher = Dispatcher::new();

        for method in [Method::Get, Method::Put, Method::Other("PURGE".to_string())] {
            let response = dispatcher.dispatch(Request::new(method, "/nope?x=1")).await;
            assert_eq!(response.status, StatusCode::NOT_FOUND);
            assert_eq!(response.text_body(), Some(NOT_FOUND_BODY.to_string()));
        }
    }

    #[tokio::test]
    async fn test_registered_route_receives_params() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register_route(RouteMethod::Post, "/items/:id", Arc::new(Echo));

        let response = dispatcher
            .dispatch(Request::new(Method::Post, "/items/42"))
            .await;
        assert_eq!(response.text_body(), Some("POST 42".to_string()));

        let response = dispatcher
            .dispatch(Request::new(Method::Get, "/items/42"))
            .await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health_routes_win_over_wildcards() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register_path("/*", Arc::new(NotFoundHandler));

        let response = dispatcher
            .dispatch(Request::new(Method::Get, READINESS_PATH))
            .await;
        assert_eq!(response.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_custom_not_found() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.set_not_found(Arc::new(OkHandler));

        let response = dispatcher.dispatch(Request::new(Method::Get, "/x")).await;
        assert_eq!(response.status, StatusCode::OK);
    }
}
