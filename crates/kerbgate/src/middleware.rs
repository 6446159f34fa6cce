//! The SPNEGO authentication middleware.
//!
//! For every request the middleware:
//!
//! 1. asks the [`KeytabLookup`] for the current keytab
//! 2. copies the request into a [`NegotiationRequest`]
//! 3. runs the [`Negotiator`] against a [`ResponseAdapter`] over the context
//! 4. on success stores the identity and runs the rest of the pipeline once,
//!    merging any staged headers into the downstream response
//! 5. otherwise answers with the staged status and headers
//!
//! Lookup and conversion failures end the request with a 500.

use crate::adapter::{NegotiationRequest, ResponseAdapter};
use crate::config::SpnegoConfig;
use crate::error::{ConfigInvalid, SpnegoError};
use crate::identity::set_identity;
use crate::negotiate::{NegotiationOutcome, Negotiator};
use crate::resolver::KeytabLookup;
use http::StatusCode;
use kerbgate_pipeline::{BoxFuture, Middleware, Next, Request, RequestContext, Response, RequestId};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::instrument::WithSubscriber;
use tracing::Dispatch;

/// Middleware authenticating callers with SPNEGO/Kerberos.
///
/// # Example
///
/// ```ignore
/// use kerbgate::{FileKeytabLookup, SpnegoConfig, SpnegoMiddleware, SpnegoNegotiator};
/// use kerbgate_pipeline::Pipeline;
///
/// let config = SpnegoConfig::new(SpnegoNegotiator::new(validator))
///     .with_keytab_lookup(FileKeytabLookup::new(["/etc/krb5/http.keytab"])?);
///
/// let pipeline = Pipeline::builder()
///     .add_stage(SpnegoMiddleware::new(config)?)
///     .build();
/// ```
#[derive(Clone)]
pub struct SpnegoMiddleware {
    keytab_lookup: Arc<dyn KeytabLookup>,
    negotiator: Arc<dyn Negotiator>,
    logger: Option<Dispatch>,
    expose_error_details: bool,
    max_body_bytes: usize,
}

impl SpnegoMiddleware {
    /// Validates `config` and creates the middleware.
    ///
    /// # Errors
    ///
    /// `ConfigInvalid: keytabLookupRequired` when no keytab lookup is set.
    pub fn new(config: SpnegoConfig) -> Result<Self, SpnegoError> {
        let SpnegoConfig {
            keytab_lookup,
            logger,
            negotiator,
            expose_error_details,
            max_body_bytes,
        } = config;

        let Some(keytab_lookup) = keytab_lookup else {
            return Err(ConfigInvalid::KeytabLookupRequired.into());
        };

        Ok(Self {
            keytab_lookup,
            negotiator,
            logger,
            expose_error_details,
            max_body_bytes,
        })
    }

    /// Runs `fut` with the configured logger as the default dispatcher.
    async fn logged<F: Future>(&self, fut: F) -> F::Output {
        match &self.logger {
            Some(logger) => fut.with_subscriber(logger.clone()).await,
            None => fut.await,
        }
    }

    /// Authenticates the request, storing the identity on success.
    ///
    /// `Err` carries the terminal response.
    async fn authenticate(&self, ctx: &mut RequestContext, request: &Request) -> Result<(), Response> {
        let request_id = ctx.request_id();

        let keytab = self
            .keytab_lookup
            .lookup()
            .await
            .map_err(|cause| self.fail(request_id, SpnegoError::KeytabLookupFailed(cause)))?;

        let negotiation_request = NegotiationRequest::from_host(request, self.max_body_bytes)
            .await
            .map_err(|err| self.fail(request_id, err.into()))?;

        let outcome = {
            let mut response = ResponseAdapter::new(ctx);
            self.negotiator
                .negotiate(&keytab, &negotiation_request, &mut response)
                .await
        };

        match outcome {
            NegotiationOutcome::Authenticated(identity) => {
                tracing::info!(
                    request_id = %request_id,
                    principal = %identity.principal(),
                    "caller authenticated"
                );
                set_identity(ctx, identity);
                Ok(())
            }
            NegotiationOutcome::Rejected => {
                let status = ctx.status().unwrap_or(StatusCode::UNAUTHORIZED);
                ctx.set_status(status);
                tracing::debug!(
                    request_id = %request_id,
                    status = status.as_u16(),
                    "negotiation did not authenticate the caller"
                );
                Err(ctx.finish_response(status.canonical_reason().unwrap_or_default()))
            }
        }
    }

    fn fail(&self, request_id: RequestId, err: SpnegoError) -> Response {
        tracing::error!(
            request_id = %request_id,
            kind = err.kind(),
            error = %err,
            "SPNEGO authentication failed"
        );
        err.to_response(self.expose_error_details)
    }
}

impl Middleware for SpnegoMiddleware {
    fn name(&self) -> &'static str {
        "spnego"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            if let Err(response) = self.logged(self.authenticate(ctx, &request)).await {
                return response;
            }

            let mut response = next.run(ctx, request).await;
            ctx.merge_staged_headers(&mut response);
            response
        })
    }
}

impl fmt::Debug for SpnegoMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpnegoMiddleware")
            .field("logger", &self.logger.is_some())
            .field("expose_error_details", &self.expose_error_details)
            .field("max_body_bytes", &self.max_body_bytes)
            .finish_non_exhaustive()
    }
}

/// Creates a [`SpnegoMiddleware`] from `config`.
///
/// # Errors
///
/// See [`SpnegoMiddleware::new`].
pub fn new_spnego_middleware(config: SpnegoConfig) -> Result<SpnegoMiddleware, SpnegoError> {
    SpnegoMiddleware::new(config)
}
