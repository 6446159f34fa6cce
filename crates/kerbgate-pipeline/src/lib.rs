//! # Kerbgate Pipeline
//!
//! The request-processing host the kerbgate SPNEGO gate plugs into.
//!
//! A request flows through an ordered list of [`Middleware`] to a terminal
//! handler. Each middleware receives the request's [`RequestContext`] by
//! mutable reference and a [`Next`] continuation; it either runs `Next`
//! exactly once or short-circuits with its own response.
//!
//! ```text
//! Request → Middleware 1 → Middleware 2 → … → Handler
//!                                               ↓
//! Response ←────────────────────────────────────┘
//! ```
//!
//! ## Request Context
//!
//! [`RequestContext`] is created per request and carries:
//!
//! - a [`RequestId`] (UUID v7) for log correlation
//! - a string-keyed locals store, so a middleware can hand values to the
//!   handlers after it without sharing state between requests
//! - staged response parts (status and headers) set before a response exists
//!
//! ## Example
//!
//! ```
//! use kerbgate_pipeline::{Pipeline, RequestContext};
//!
//! let pipeline = Pipeline::builder().build();
//! assert_eq!(pipeline.stage_count(), 0);
//!
//! let ctx = RequestContext::new();
//! assert!(ctx.status().is_none());
//! ```

#![doc(html_root_url = "https://docs.rs/kerbgate-pipeline/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod context;
pub mod middleware;
pub mod pipeline;
pub mod types;

pub use context::{RequestContext, RequestId};
pub use middleware::{BoxFuture, FnMiddleware, Handler, Middleware, Next};
pub use pipeline::{BoxedMiddleware, Pipeline, PipelineBuilder};
pub use types::{Request, Response, ResponseExt};
