//! Bridges between the host pipeline and the negotiation engine.
//!
//! The engine works on a plain [`NegotiationRequest`] and writes its answer
//! through the narrow [`NegotiationResponse`] capability. [`ResponseAdapter`]
//! implements that capability over the host [`RequestContext`], staging the
//! status and headers there rather than building a response of its own.

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, Uri, Version};
use http_body_util::BodyExt;
use kerbgate_pipeline::{Request, RequestContext};
use thiserror::Error;

/// Why a host request could not be converted.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConversionError {
    /// The body is larger than the configured bound.
    #[error("request body of {actual} bytes exceeds the {limit} byte limit")]
    BodyTooLarge {
        /// Configured bound.
        limit: usize,
        /// Actual body length.
        actual: usize,
    },

    /// The copied request parts were rejected by the `http` builder.
    #[error("cannot rebuild request: {0}")]
    Http(#[from] http::Error),
}

/// A self-contained copy of the host request, as seen by the engine.
#[derive(Debug)]
pub struct NegotiationRequest {
    inner: http::Request<Bytes>,
}

impl NegotiationRequest {
    /// Copies the method, URI, version, headers and body of a host request.
    ///
    /// The host request is left untouched so that it can continue down the
    /// pipeline.
    ///
    /// # Errors
    ///
    /// [`ConversionError::BodyTooLarge`] when the body exceeds
    /// `max_body_bytes`, [`ConversionError::Http`] when the parts cannot be
    /// reassembled.
    pub async fn from_host(request: &Request, max_body_bytes: usize) -> Result<Self, ConversionError> {
        let body = match request.body().clone().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(never) => match never {},
        };
        if body.len() > max_body_bytes {
            return Err(ConversionError::BodyTooLarge {
                limit: max_body_bytes,
                actual: body.len(),
            });
        }

        let mut builder = http::Request::builder()
            .method(request.method().clone())
            .uri(request.uri().clone())
            .version(request.version());
        if let Some(headers) = builder.headers_mut() {
            headers.clone_from(request.headers());
        }
        let inner = builder.body(body)?;
        Ok(Self { inner })
    }

    /// Wraps an already generic request.
    pub fn from_http(inner: http::Request<Bytes>) -> Self {
        Self { inner }
    }

    /// Returns the request method.
    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    /// Returns the request URI.
    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    /// Returns the HTTP version.
    pub fn version(&self) -> Version {
        self.inner.version()
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Returns the request body.
    pub fn body(&self) -> &Bytes {
        self.inner.body()
    }

    /// Returns the underlying `http` request.
    pub fn as_http(&self) -> &http::Request<Bytes> {
        &self.inner
    }

    /// Consumes the wrapper, returning the underlying `http` request.
    pub fn into_http(self) -> http::Request<Bytes> {
        self.inner
    }
}

/// What a negotiation engine may do to the response.
pub trait NegotiationResponse: Send {
    /// Returns the headers staged so far, for reading or modification.
    fn header(&mut self) -> &mut HeaderMap;

    /// Sets the response status.
    fn write_status(&mut self, status: StatusCode);
}

/// [`NegotiationResponse`] over the host request context.
pub struct ResponseAdapter<'a> {
    ctx: &'a mut RequestContext,
}

impl<'a> ResponseAdapter<'a> {
    /// Wraps a request context for the duration of one negotiation.
    pub fn new(ctx: &'a mut RequestContext) -> Self {
        Self { ctx }
    }
}

impl NegotiationResponse for ResponseAdapter<'_> {
    fn header(&mut self) -> &mut HeaderMap {
        self.ctx.response_headers_mut()
    }

    fn write_status(&mut self, status: StatusCode) {
        self.ctx.set_status(status);
    }
}
