//! Common types used throughout the middleware pipeline.
//!
//! This module defines the HTTP request and response types used by middleware.

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};
use http_body_util::Full;

/// The HTTP request type used in the middleware pipeline.
///
/// This is a standard `http::Request` with a `Full<Bytes>` body.
pub type Request = http::Request<Full<Bytes>>;

/// The HTTP response type used in the middleware pipeline.
///
/// This is a standard `http::Response` with a `Full<Bytes>` body.
pub type Response = http::Response<Full<Bytes>>;

/// Extension trait for building terminal responses.
pub trait ResponseExt {
    /// Creates a plain-text response with the given status code and message.
    fn error(status: StatusCode, message: &str) -> Response;

    /// Creates a plain-text response from a status and a prepared header map.
    ///
    /// `Content-Type` is only added when the headers do not already carry one.
    fn with_headers(status: StatusCode, headers: HeaderMap, message: &str) -> Response;
}

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

impl ResponseExt for Response {
    fn error(status: StatusCode, message: &str) -> Response {
        Self::with_headers(status, HeaderMap::new(), message)
    }

    fn with_headers(status: StatusCode, headers: HeaderMap, message: &str) -> Response {
        let mut response = http::Response::new(Full::new(Bytes::from(message.to_string())));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
            .headers_mut()
            .entry(CONTENT_TYPE)
            .or_insert(HeaderValue::from_static(TEXT_PLAIN));
        response
    }
}
