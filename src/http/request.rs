//! Buffered HTTP request handed to user functions.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// HTTP method enumeration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    Connect,
    Trace,
    /// Extension method, kept verbatim.
    Other(String),
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
            Method::Put => write!(f, "PUT"),
            Method::Delete => write!(f, "DELETE"),
            Method::Patch => write!(f, "PATCH"),
            Method::Head => write!(f, "HEAD"),
            Method::Options => write!(f, "OPTIONS"),
            Method::Connect => write!(f, "CONNECT"),
            Method::Trace => write!(f, "TRACE"),
            Method::Other(name) => write!(f, "{}", name),
        }
    }
}

impl From<&hyper::Method> for Method {
    fn from(method: &hyper::Method) -> Self {
        match *method {
            hyper::Method::GET => Method::Get,
            hyper::Method::POST => Method::Post,
            hyper::Method::PUT => Method::Put,
            hyper::Method::DELETE => Method::Delete,
            hyper::Method::PATCH => Method::Patch,
            hyper::Method::HEAD => Method::Head,
            hyper::Method::OPTIONS => Method::Options,
            hyper::Method::CONNECT => Method::Connect,
            hyper::Method::TRACE => Method::Trace,
            _ => Method::Other(method.as_str().to_string()),
        }
    }
}

/// HTTP request as seen by a hosted function.
///
/// Header names are stored lowercase; lookups through [`Request::get_header`]
/// are case-insensitive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// HTTP method.
    pub method: Method,
    /// Request target (path and optional query).
    pub url: String,
    /// HTTP headers.
    pub headers: HashMap<String, String>,
    /// Request body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Bytes>,
    /// Path parameters captured by the matched route.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub params: HashMap<String, String>,
    /// Identifier used to correlate log lines for this request.
    #[serde(default)]
    pub request_id: String,
}

impl Request {
    /// Create a new request.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            params: HashMap::new(),
            request_id: String::new(),
        }
    }

    /// Add a header to the request.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(key.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Set the request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set the request id.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// Get a header value.
    pub fn get_header(&self, key: &str) -> Option<&String> {
        self.headers.get(&key.to_ascii_lowercase())
    }

    /// Path component of the url, without the query string.
    pub fn path(&self) -> &str {
        self.url.split_once('?').map_or(&self.url, |(path, _)| path)
    }

    /// Query string, if any.
    pub fn query(&self) -> Option<&str> {
        self.url.split_once('?').map(|(_, query)| query)
    }

    /// Get a path parameter captured by a `:name` route segment.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Get the body as text if present.
    pub fn text(&self) -> Option<String> {
        self.body
            .as_ref()
            .map(|b| String::from_utf8_lossy(b).to_string())
    }

    /// Parse the body as JSON if present.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Option<Result<T, serde_json::Error>> {
        self.body
            .as_ref()
            .map(|b| serde_json::from_slice(b))
    }
}

impl Default for Request {
    fn default() -> Self {
        Self::new(Method::Get, "/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_and_query() {
        let request = Request::new(Method::Get, "/items/7?verbose=1");
        assert_eq!(request.path(), "/items/7");
        assert_eq!(request.query(), Some("verbose=1"));

        let request = Request::new(Method::Get, "/");
        assert_eq!(request.path(), "/");
        assert_eq!(request.query(), None);
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let request = Request::default().header("Content-Type", "application/json");
        assert_eq!(
            request.get_header("content-type"),
            Some(&"application/json".to_string())
        );
        assert_eq!(
            request.get_header("CONTENT-TYPE"),
            Some(&"application/json".to_string())
        );
    }

    #[test]
    fn test_method_from_hyper() {
        assert_eq!(Method::from(&hyper::Method::POST), Method::Post);
        assert_eq!(Method::from(&hyper::Method::TRACE), Method::Trace);
        let custom = hyper::Method::from_bytes(b"PURGE").unwrap();
        assert_eq!(Method::from(&custom), Method::Other("PURGE".to_string()));
        assert_eq!(Method::from(&custom).to_string(), "PURGE");
    }
}
