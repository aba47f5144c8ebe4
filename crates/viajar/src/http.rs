//! HTTP client abstraction.
//!
//! Viajar does no protocol work itself: steps talk to the application
//! under test through an injected [`HttpClient`]. The trait covers the
//! verb surface plus per-session header and cookie state; the bundled
//! [`StubHttpClient`] scripts canned responses for tests without any
//! network.

use crate::result::{ViajarError, ViajarResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        };
        write!(f, "{s}")
    }
}

/// One request as a step sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// HTTP method
    pub method: Method,
    /// Request path (no host)
    pub path: String,
    /// Request headers
    pub headers: BTreeMap<String, String>,
    /// JSON body, if any
    pub body: Option<Value>,
}

impl Request {
    /// Create a request with no headers or body.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    /// Set a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the JSON body.
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// One response as a step sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Status code
    pub status: u16,
    /// Response headers
    pub headers: BTreeMap<String, String>,
    /// JSON body
    pub body: Value,
}

impl Response {
    /// Create a response with a status and body.
    #[must_use]
    pub fn new(status: u16, body: Value) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body,
        }
    }

    /// Whether the status is 2xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Per-session header and cookie state applied to every request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Headers sent with every request
    pub headers: BTreeMap<String, String>,
    /// Cookies sent as a `Cookie` header
    pub cookies: BTreeMap<String, String>,
}

impl Session {
    /// Create an empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a default header (e.g. an auth token).
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into(), value.into());
    }

    /// Set a cookie.
    pub fn set_cookie(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.cookies.insert(name.into(), value.into());
    }

    /// Drop all session state.
    pub fn clear(&mut self) {
        self.headers.clear();
        self.cookies.clear();
    }

    /// Fold session state into a request.
    #[must_use]
    pub fn apply(&self, mut request: Request) -> Request {
        for (name, value) in &self.headers {
            request
                .headers
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
        if !self.cookies.is_empty() {
            let cookie = self
                .cookies
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; ");
            request.headers.entry("Cookie".to_string()).or_insert(cookie);
        }
        request
    }
}

/// The verb surface steps use to talk to the application under test.
pub trait HttpClient: Send + Sync {
    /// Execute a request.
    ///
    /// # Errors
    ///
    /// Returns `HttpError` when the transport fails; a non-2xx status
    /// is a successful execution, not an error.
    fn execute(&self, request: &Request) -> ViajarResult<Response>;

    /// GET a path.
    ///
    /// # Errors
    ///
    /// See [`HttpClient::execute`].
    fn get(&self, path: &str) -> ViajarResult<Response> {
        self.execute(&Request::new(Method::Get, path))
    }

    /// POST a JSON body.
    ///
    /// # Errors
    ///
    /// See [`HttpClient::execute`].
    fn post(&self, path: &str, body: Value) -> ViajarResult<Response> {
        self.execute(&Request::new(Method::Post, path).with_body(body))
    }

    /// PUT a JSON body.
    ///
    /// # Errors
    ///
    /// See [`HttpClient::execute`].
    fn put(&self, path: &str, body: Value) -> ViajarResult<Response> {
        self.execute(&Request::new(Method::Put, path).with_body(body))
    }

    /// PATCH a JSON body.
    ///
    /// # Errors
    ///
    /// See [`HttpClient::execute`].
    fn patch(&self, path: &str, body: Value) -> ViajarResult<Response> {
        self.execute(&Request::new(Method::Patch, path).with_body(body))
    }

    /// DELETE a path.
    ///
    /// # Errors
    ///
    /// See [`HttpClient::execute`].
    fn delete(&self, path: &str) -> ViajarResult<Response> {
        self.execute(&Request::new(Method::Delete, path))
    }
}

/// Scripted in-memory client for tests.
///
/// Responses are registered per `(method, path)`; unscripted requests
/// return an `HttpError`. Every executed request is recorded for
/// assertions.
#[derive(Debug, Default)]
pub struct StubHttpClient {
    responses: Mutex<BTreeMap<(Method, String), Response>>,
    log: Mutex<Vec<Request>>,
}

impl StubHttpClient {
    /// Create an empty stub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a response for a method and path.
    pub fn script(&self, method: Method, path: impl Into<String>, response: Response) {
        self.responses
            .lock()
            .expect("stub lock poisoned")
            .insert((method, path.into()), response);
    }

    /// Requests executed so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<Request> {
        self.log.lock().expect("stub lock poisoned").clone()
    }
}

impl HttpClient for StubHttpClient {
    fn execute(&self, request: &Request) -> ViajarResult<Response> {
        self.log
            .lock()
            .expect("stub lock poisoned")
            .push(request.clone());
        self.responses
            .lock()
            .expect("stub lock poisoned")
            .get(&(request.method, request.path.clone()))
            .cloned()
            .ok_or_else(|| ViajarError::HttpError {
                message: format!("no scripted response for {} {}", request.method, request.path),
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stub_returns_scripted_response() {
        let stub = StubHttpClient::new();
        stub.script(Method::Get, "/users/u1", Response::new(200, json!({"id": "u1"})));

        let response = stub.get("/users/u1").unwrap();
        assert!(response.is_success());
        assert_eq!(response.body, json!({"id": "u1"}));
    }

    #[test]
    fn test_stub_rejects_unscripted() {
        let stub = StubHttpClient::new();
        let err = stub.delete("/nope").unwrap_err();
        assert!(matches!(err, ViajarError::HttpError { .. }));
    }

    #[test]
    fn test_stub_records_requests() {
        let stub = StubHttpClient::new();
        stub.script(Method::Post, "/users", Response::new(201, json!({})));
        stub.post("/users", json!({"name": "Ada"})).unwrap();

        let log = stub.requests();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].method, Method::Post);
        assert_eq!(log[0].body, Some(json!({"name": "Ada"})));
    }

    #[test]
    fn test_session_applies_headers_and_cookies() {
        let mut session = Session::new();
        session.set_header("Authorization", "Bearer tok");
        session.set_cookie("sid", "abc");

        let request = session.apply(Request::new(Method::Get, "/me"));
        assert_eq!(request.headers.get("Authorization").unwrap(), "Bearer tok");
        assert_eq!(request.headers.get("Cookie").unwrap(), "sid=abc");
    }

    #[test]
    fn test_session_does_not_override_explicit_header() {
        let mut session = Session::new();
        session.set_header("Authorization", "Bearer session");

        let request = session.apply(
            Request::new(Method::Get, "/me").with_header("Authorization", "Bearer explicit"),
        );
        assert_eq!(request.headers.get("Authorization").unwrap(), "Bearer explicit");
    }
}
