//! Core middleware trait and types.
//!
//! This module defines the [`Middleware`] trait that every interceptor in a
//! [`Pipeline`](crate::Pipeline) implements. Middleware runs before the
//! terminal handler and decides whether the request continues.
//!
//! # Example
//!
//! ```ignore
//! use kerbgate_pipeline::{BoxFuture, Middleware, Next, Request, RequestContext, Response};
//!
//! struct LoggingMiddleware;
//!
//! impl Middleware for LoggingMiddleware {
//!     fn name(&self) -> &'static str {
//!         "logging"
//!     }
//!
//!     fn process<'a>(
//!         &'a self,
//!         ctx: &'a mut RequestContext,
//!         request: Request,
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, Response> {
//!         Box::pin(async move {
//!             tracing::info!(request_id = %ctx.request_id(), "request");
//!             next.run(ctx, request).await
//!         })
//!     }
//! }
//! ```

use crate::context::RequestContext;
use crate::types::{Request, Response};
use std::future::Future;
use std::pin::Pin;

/// A boxed future that returns a response.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The terminal handler a pipeline hands the request to.
pub type Handler<'a> =
    Box<dyn FnOnce(&mut RequestContext, Request) -> BoxFuture<'static, Response> + Send + 'a>;

/// The core middleware trait.
///
/// Middleware receives the mutable request context, the incoming request,
/// and a [`Next`] continuation for the rest of the chain.
///
/// # Invariants
///
/// - `next.run()` is called at most once; [`Next`] is consumed by value
/// - Not calling it short-circuits the pipeline with this middleware's response
/// - Middleware SHOULD NOT suppress the response of downstream middleware
pub trait Middleware: Send + Sync + 'static {
    /// Returns the unique name of this middleware.
    ///
    /// This name is used for logging and debugging.
    fn name(&self) -> &'static str;

    /// Process the request through this middleware.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The mutable request context
    /// * `request` - The incoming HTTP request
    /// * `next` - Continuation invoking the rest of the chain
    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response>;
}

/// Continuation that invokes the rest of the middleware chain.
///
/// Consumed by [`Next::run`], so it can only be invoked once.
pub struct Next<'a> {
    inner: NextInner<'a>,
}

enum NextInner<'a> {
    /// More middleware to process
    Chain {
        middleware: &'a dyn Middleware,
        next: Box<Next<'a>>,
    },
    /// End of chain - invoke the handler
    Handler(Handler<'a>),
}

impl<'a> Next<'a> {
    /// Creates a `Next` that will invoke the given middleware.
    pub fn new(middleware: &'a dyn Middleware, next: Next<'a>) -> Self {
        Self {
            inner: NextInner::Chain {
                middleware,
                next: Box::new(next),
            },
        }
    }

    /// Creates a terminal `Next` that invokes the handler.
    pub fn handler<F>(f: F) -> Self
    where
        F: FnOnce(&mut RequestContext, Request) -> BoxFuture<'static, Response> + Send + 'a,
    {
        Self {
            inner: NextInner::Handler(Box::new(f)),
        }
    }

    /// Invokes the next middleware or handler in the chain.
    pub async fn run(self, ctx: &mut RequestContext, request: Request) -> Response {
        match self.inner {
            NextInner::Chain { middleware, next } => {
                middleware.process(ctx, request, *next).await
            }
            NextInner::Handler(handler) => handler(ctx, request).await,
        }
    }
}

/// A middleware that can be created from an async function.
///
/// # Example
///
/// ```ignore
/// let middleware = FnMiddleware::new("timing", |ctx, req, next| async move {
///     let start = Instant::now();
///     let response = next.run(ctx, req).await;
///     println!("Request took {:?}", start.elapsed());
///     response
/// });
/// ```
pub struct FnMiddleware<F> {
    name: &'static str,
    func: F,
}

impl<F> FnMiddleware<F> {
    /// Creates a new function-based middleware.
    pub const fn new(name: &'static str, func: F) -> Self {
        Self { name, func }
    }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut RequestContext, Request, Next<'a>) -> BoxFuture<'a, Response>
        + Send
        + Sync
        + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        (self.func)(ctx, request, next)
    }
}
