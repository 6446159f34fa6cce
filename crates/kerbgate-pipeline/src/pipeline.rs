//! Ordered middleware pipeline.
//!
//! A [`Pipeline`] holds middleware in insertion order and drives each
//! request through them to a terminal handler. The pipeline is immutable
//! after [`PipelineBuilder::build`] and can be shared across concurrently
//! processed requests.

use crate::context::RequestContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response};
use std::sync::Arc;

/// A type-erased middleware that can be stored in a vector.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// An ordered, immutable middleware pipeline.
///
/// # Example
///
/// ```ignore
/// use kerbgate_pipeline::{Pipeline, RequestContext};
///
/// let pipeline = Pipeline::builder()
///     .add_stage(spnego)
///     .build();
///
/// let response = pipeline.process(RequestContext::new(), request, handler).await;
/// ```
pub struct Pipeline {
    stages: Vec<BoxedMiddleware>,
}

impl Pipeline {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Processes a request through every stage, then the handler.
    pub async fn process<H>(&self, mut ctx: RequestContext, request: Request, handler: H) -> Response
    where
        H: FnOnce(&mut RequestContext, Request) -> BoxFuture<'static, Response> + Send + 'static,
    {
        self.process_with(&mut ctx, request, handler).await
    }

    /// Processes a request with a caller-owned context.
    ///
    /// The context stays available to the caller afterwards, which lets
    /// hosts (and tests) inspect what middleware stored during the request.
    pub async fn process_with<H>(
        &self,
        ctx: &mut RequestContext,
        request: Request,
        handler: H,
    ) -> Response
    where
        H: FnOnce(&mut RequestContext, Request) -> BoxFuture<'static, Response> + Send + 'static,
    {
        let next = self.build_chain(handler);
        tracing::trace!(request_id = %ctx.request_id(), stages = self.stages.len(), "processing request");
        next.run(ctx, request).await
    }

    /// Builds the middleware chain for a request, back to front.
    fn build_chain<'a, H>(&'a self, handler: H) -> Next<'a>
    where
        H: FnOnce(&mut RequestContext, Request) -> BoxFuture<'static, Response> + Send + 'a,
    {
        let mut next = Next::handler(handler);
        for middleware in self.stages.iter().rev() {
            next = Next::new(middleware.as_ref(), next);
        }
        next
    }

    /// Returns the names of all stages in order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|mw| mw.name()).collect()
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

/// Builder for constructing a [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<BoxedMiddleware>,
}

impl PipelineBuilder {
    /// Creates an empty pipeline builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a middleware stage; stages run in the order they are added.
    #[must_use]
    pub fn add_stage<M: Middleware>(mut self, middleware: M) -> Self {
        self.stages.push(Arc::new(middleware));
        self
    }

    /// Appends an already shared middleware stage.
    #[must_use]
    pub fn add_shared_stage(mut self, middleware: BoxedMiddleware) -> Self {
        self.stages.push(middleware);
        self
    }

    /// Builds the pipeline.
    #[must_use]
    pub fn build(self) -> Pipeline {
        Pipeline {
            stages: self.stages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{Request as HttpRequest, Response as HttpResponse, StatusCode};
    use http_body_util::Full;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A test middleware that records its invocation order.
    struct OrderTrackingMiddleware {
        name: &'static str,
        counter: Arc<AtomicUsize>,
        order: Arc<std::sync::Mutex<Vec<&'static str>>>,
    }

    impl Middleware for OrderTrackingMiddleware {
        fn name(&self) -> &'static str {
            self.name
        }

        fn process<'a>(
            &'a self,
            ctx: &'a mut RequestContext,
            request: Request,
            next: Next<'a>,
        ) -> BoxFuture<'a, Response> {
            let counter = self.counter.clone();
            let order = self.order.clone();
            let name = self.name;

            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                order.lock().unwrap().push(name);
                next.run(ctx, request).await
            })
        }
    }

    fn test_request() -> Request {
        HttpRequest::builder()
            .uri("/test")
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_pipeline_executes_in_order() {
        let counter = Arc::new(AtomicUsize::new(0));
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let stage = |name| OrderTrackingMiddleware {
            name,
            counter: counter.clone(),
            order: order.clone(),
        };

        let pipeline = Pipeline::builder()
            .add_stage(stage("first"))
            .add_stage(stage("second"))
            .add_stage(stage("third"))
            .build();

        assert_eq!(pipeline.stage_names(), vec!["first", "second", "third"]);

        let response = pipeline
            .process(RequestContext::new(), test_request(), |_ctx, _req| {
                Box::pin(async {
                    HttpResponse::builder()
                        .status(StatusCode::OK)
                        .body(Full::new(Bytes::from("OK")))
                        .unwrap()
                })
            })
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_empty_pipeline() {
        let pipeline = Pipeline::builder().build();
        assert_eq!(pipeline.stage_count(), 0);

        let mut ctx = RequestContext::new();
        let response = pipeline
            .process_with(&mut ctx, test_request(), |ctx, _req| {
                ctx.set_local("test.handler", true);
                Box::pin(async {
                    HttpResponse::builder()
                        .status(StatusCode::OK)
                        .body(Full::new(Bytes::from("handler")))
                        .unwrap()
                })
            })
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(ctx.local::<bool>("test.handler"), Some(&true));
    }
}
