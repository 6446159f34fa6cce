//! The negotiation engine seam and the HTTP side of SPNEGO.
//!
//! [`Negotiator`] is what the middleware drives: given the keytab, a copy of
//! the request and a [`NegotiationResponse`], it either authenticates the
//! caller or stages a terminal response. [`SpnegoNegotiator`] implements the
//! RFC 4559 header exchange and hands the decoded token to a
//! [`TicketValidator`], which owns all Kerberos cryptography.
//!
//! ```text
//! Client                         Server
//!   │  GET /                        │
//!   │ ────────────────────────────▶ │
//!   │  401 WWW-Authenticate: Negotiate
//!   │ ◀──────────────────────────── │
//!   │  Authorization: Negotiate <token>
//!   │ ────────────────────────────▶ │  TicketValidator::validate
//!   │  200 [WWW-Authenticate: Negotiate <mutual>]
//!   │ ◀──────────────────────────── │
//! ```

use crate::adapter::{NegotiationRequest, NegotiationResponse};
use crate::identity::KerberosIdentity;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use http::{HeaderMap, HeaderValue, StatusCode};
use kerbgate_keytab::Keytab;
use kerbgate_pipeline::BoxFuture;

/// Authentication scheme name used in both directions.
pub const NEGOTIATE: &str = "Negotiate";

/// SPNEGO `negTokenResp` with `negState = reject` and the Kerberos mech.
pub const SPNEGO_REJECT_TOKEN: &str = "oRQwEqADCgECoQsGCSqGSIb3EgECAg==";

/// Result of one negotiation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiationOutcome {
    /// The caller is authenticated; the request may proceed.
    Authenticated(KerberosIdentity),
    /// The request must end here with the staged status and headers.
    Rejected,
}

/// A negotiation engine.
///
/// Implementations must not retain the keytab, request or response beyond
/// the returned future.
pub trait Negotiator: Send + Sync + 'static {
    /// Runs one negotiation step for a request.
    fn negotiate<'a>(
        &'a self,
        keytab: &'a Keytab,
        request: &'a NegotiationRequest,
        response: &'a mut dyn NegotiationResponse,
    ) -> BoxFuture<'a, NegotiationOutcome>;
}

/// What a [`TicketValidator`] concluded about a client token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketDecision {
    /// The token is valid.
    Accepted {
        /// The authenticated caller.
        identity: KerberosIdentity,
        /// Mutual authentication token for the client, if any.
        response_token: Option<Vec<u8>>,
    },
    /// Another round trip is needed; the token goes back to the client.
    Continue(Vec<u8>),
    /// The token is invalid.
    Rejected(String),
}

/// Validates a SPNEGO/Kerberos token against a keytab.
///
/// This is where ticket decryption, authenticator checks, replay detection
/// and clock skew enforcement live.
pub trait TicketValidator: Send + Sync + 'static {
    /// Validates the decoded client token.
    fn validate(&self, keytab: &Keytab, token: &[u8], request: &NegotiationRequest) -> TicketDecision;
}

impl<F> TicketValidator for F
where
    F: Fn(&Keytab, &[u8], &NegotiationRequest) -> TicketDecision + Send + Sync + 'static,
{
    fn validate(&self, keytab: &Keytab, token: &[u8], request: &NegotiationRequest) -> TicketDecision {
        self(keytab, token, request)
    }
}

/// HTTP Negotiate (RFC 4559) on top of a [`TicketValidator`].
///
/// | Request | Response |
/// |---|---|
/// | no `Authorization`, or another scheme | 401, `WWW-Authenticate: Negotiate` |
/// | empty or non-base64 token | 401, `WWW-Authenticate: Negotiate` |
/// | token rejected | 401, `WWW-Authenticate: Negotiate <reject token>` |
/// | continuation needed | 401, `WWW-Authenticate: Negotiate <token>` |
/// | token accepted | authenticated, with an optional mutual token header |
#[derive(Debug, Clone)]
pub struct SpnegoNegotiator<V> {
    validator: V,
}

impl<V: TicketValidator> SpnegoNegotiator<V> {
    /// Creates a negotiator delegating to `validator`.
    pub const fn new(validator: V) -> Self {
        Self { validator }
    }

    /// Returns the validator.
    pub fn validator(&self) -> &V {
        &self.validator
    }

    fn step(
        &self,
        keytab: &Keytab,
        request: &NegotiationRequest,
        response: &mut dyn NegotiationResponse,
    ) -> NegotiationOutcome {
        let token = match client_token(request.headers()) {
            Ok(token) => token,
            Err(TokenError::Absent) => {
                tracing::debug!("no Negotiate authorization, sending challenge");
                reply(response, StatusCode::UNAUTHORIZED, None);
                return NegotiationOutcome::Rejected;
            }
            Err(TokenError::Malformed(reason)) => {
                tracing::debug!(reason, "malformed Negotiate authorization, sending challenge");
                reply(response, StatusCode::UNAUTHORIZED, None);
                return NegotiationOutcome::Rejected;
            }
        };

        match self.validator.validate(keytab, &token, request) {
            TicketDecision::Accepted {
                identity,
                response_token,
            } => {
                if let Some(mutual) = response_token {
                    set_challenge(response.header(), Some(&STANDARD.encode(mutual)));
                }
                NegotiationOutcome::Authenticated(identity)
            }
            TicketDecision::Continue(next) => {
                tracing::debug!("negotiation continues");
                reply(response, StatusCode::UNAUTHORIZED, Some(&STANDARD.encode(next)));
                NegotiationOutcome::Rejected
            }
            TicketDecision::Rejected(reason) => {
                tracing::info!(reason = %reason, "Negotiate token rejected");
                reply(response, StatusCode::UNAUTHORIZED, Some(SPNEGO_REJECT_TOKEN));
                NegotiationOutcome::Rejected
            }
        }
    }
}

impl<V: TicketValidator> Negotiator for SpnegoNegotiator<V> {
    fn negotiate<'a>(
        &'a self,
        keytab: &'a Keytab,
        request: &'a NegotiationRequest,
        response: &'a mut dyn NegotiationResponse,
    ) -> BoxFuture<'a, NegotiationOutcome> {
        Box::pin(async move { self.step(keytab, request, response) })
    }
}

#[derive(Debug, PartialEq, Eq)]
enum TokenError {
    Absent,
    Malformed(&'static str),
}

fn client_token(headers: &HeaderMap) -> Result<Vec<u8>, TokenError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .ok_or(TokenError::Absent)?;

    let (scheme, token) = value
        .split_once(|c: char| c.is_ascii_whitespace())
        .unwrap_or((value, ""));
    if !scheme.eq_ignore_ascii_case(NEGOTIATE) {
        return Err(TokenError::Absent);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(TokenError::Malformed("empty token"));
    }
    match STANDARD.decode(token) {
        Ok(bytes) if bytes.is_empty() => Err(TokenError::Malformed("empty token")),
        Ok(bytes) => Ok(bytes),
        Err(_) => Err(TokenError::Malformed("token is not valid base64")),
    }
}

fn reply(response: &mut dyn NegotiationResponse, status: StatusCode, token: Option<&str>) {
    set_challenge(response.header(), token);
    response.write_status(status);
}

fn set_challenge(headers: &mut HeaderMap, token: Option<&str>) {
    let value = token
        .and_then(|t| HeaderValue::try_from(format!("{NEGOTIATE} {t}")).ok())
        .unwrap_or_else(|| HeaderValue::from_static(NEGOTIATE));
    headers.insert(WWW_AUTHENTICATE, value);
}
