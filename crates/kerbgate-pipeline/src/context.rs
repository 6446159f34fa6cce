//! Per-request context types.
//!
//! The [`RequestContext`] is the single mutable resource of one request. It
//! flows by `&mut` through every middleware and into the handler, carrying:
//!
//! - a [`RequestId`] for log correlation
//! - a string-keyed locals store for values shared between middleware and
//!   handlers of the same request
//! - the staged response parts (status and headers) that middleware may set
//!   before any response body exists

use crate::types::{Response, ResponseExt};
use http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// A unique identifier for each request, using UUID v7.
///
/// UUID v7 is time-ordered, which makes it ideal for request tracking
/// and log correlation.
///
/// # Example
///
/// ```
/// use kerbgate_pipeline::RequestId;
///
/// let id = RequestId::new();
/// println!("Request ID: {}", id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new unique request ID using UUID v7.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `RequestId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Context that flows through the middleware pipeline.
///
/// A fresh context is created for every request and dropped when the
/// request completes; nothing stored in it is visible to other requests.
///
/// # Example
///
/// ```
/// use kerbgate_pipeline::RequestContext;
///
/// let mut ctx = RequestContext::new();
/// ctx.set_local("app.tenant", String::from("acme"));
///
/// assert_eq!(ctx.local::<String>("app.tenant").map(String::as_str), Some("acme"));
/// ```
#[derive(Debug)]
pub struct RequestContext {
    /// Unique identifier for this request.
    request_id: RequestId,

    /// When the request started processing.
    started_at: Instant,

    /// Request-scoped values keyed by namespaced string keys.
    locals: HashMap<&'static str, Box<dyn Any + Send + Sync>>,

    /// Status staged by middleware for a response not yet built.
    status: Option<StatusCode>,

    /// Headers staged by middleware for the eventual response.
    response_headers: HeaderMap,
}

impl RequestContext {
    /// Creates a new context with a fresh request ID.
    #[must_use]
    pub fn new() -> Self {
        Self::with_request_id(RequestId::new())
    }

    /// Creates a context with a specific request ID.
    ///
    /// Useful when the request ID was provided by a client or upstream service.
    #[must_use]
    pub fn with_request_id(request_id: RequestId) -> Self {
        Self {
            request_id,
            started_at: Instant::now(),
            locals: HashMap::new(),
            status: None,
            response_headers: HeaderMap::new(),
        }
    }

    /// Returns the request ID.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Sets the request ID.
    pub fn set_request_id(&mut self, request_id: RequestId) {
        self.request_id = request_id;
    }

    /// Returns when the request started processing.
    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Returns the elapsed time since the request started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Stores a value under `key`, replacing any previous value.
    ///
    /// Keys should be namespaced by the component that owns them
    /// (e.g. `"myapp.session"`) so they cannot collide.
    pub fn set_local<T: Send + Sync + 'static>(&mut self, key: &'static str, value: T) {
        self.locals.insert(key, Box::new(value));
    }

    /// Returns the value stored under `key`.
    ///
    /// Returns `None` if nothing is stored or the stored value is not a `T`.
    #[must_use]
    pub fn local<T: Send + Sync + 'static>(&self, key: &str) -> Option<&T> {
        self.locals.get(key).and_then(|v| v.downcast_ref())
    }

    /// Returns the staged status, if any middleware set one.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Stages the status of the response this request will produce.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    /// Returns the staged response headers.
    #[must_use]
    pub fn response_headers(&self) -> &HeaderMap {
        &self.response_headers
    }

    /// Returns the staged response headers for modification.
    pub fn response_headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.response_headers
    }

    /// Builds a terminal response from the staged status and headers.
    ///
    /// The staged parts are consumed. A context with no staged status
    /// produces `200 OK`.
    pub fn finish_response(&mut self, message: &str) -> Response {
        let status = self.status.take().unwrap_or(StatusCode::OK);
        let headers = std::mem::take(&mut self.response_headers);
        Response::with_headers(status, headers, message)
    }

    /// Copies staged headers into a response produced downstream.
    ///
    /// Headers the response already carries take precedence and are never
    /// overwritten. The staged headers are consumed.
    pub fn merge_staged_headers(&mut self, response: &mut Response) {
        let staged = std::mem::take(&mut self.response_headers);
        let headers = response.headers_mut();
        // Subsequent values of a multi-valued header arrive with `None` names.
        let mut current = None;
        for (name, value) in staged {
            if let Some(name) = name {
                current = (!headers.contains_key(&name)).then_some(name);
            }
            if let Some(name) = &current {
                headers.append(name.clone(), value);
            }
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
