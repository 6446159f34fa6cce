//! Error types for the SPNEGO gate.
//!
//! Configuration errors surface when the middleware or a resolver is built.
//! Lookup and conversion errors end a single request with a
//! `500 Internal Server Error`; everything else a client can cause is a
//! negotiation outcome, not an error.

use crate::adapter::ConversionError;
use http::StatusCode;
use kerbgate_keytab::KeytabError;
use kerbgate_pipeline::{Response, ResponseExt};
use std::path::PathBuf;
use thiserror::Error;

/// Type-erased error returned by pluggable keytab sources.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for SPNEGO gate operations.
pub type SpnegoResult<T> = Result<T, SpnegoError>;

/// Why a configuration was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigInvalid {
    /// The middleware was built without a keytab lookup.
    #[error("keytabLookupRequired")]
    KeytabLookupRequired,

    /// A file-backed keytab lookup was given no paths.
    #[error("atLeastOneKeytabFileRequired")]
    AtLeastOneKeytabFileRequired,
}

/// Errors produced by the SPNEGO gate.
///
/// The `Display` form is `"<Kind>: <cause>"`, and the kind prefix is stable
/// so that it can be matched in logs and response bodies.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SpnegoError {
    /// The configuration is unusable.
    #[error("ConfigInvalid: {0}")]
    ConfigInvalid(ConfigInvalid),

    /// A keytab file could not be read or decoded.
    #[error("KeytabLoadFailed: {}: {source}", path.display())]
    KeytabLoadFailed {
        /// The offending file.
        path: PathBuf,
        /// Why it failed.
        #[source]
        source: KeytabError,
    },

    /// The keytab lookup failed while handling a request.
    #[error("KeytabLookupFailed: {0}")]
    KeytabLookupFailed(#[source] BoxError),

    /// The host request could not be converted for the negotiation engine.
    #[error("RequestConversionFailed: {0}")]
    RequestConversionFailed(#[source] ConversionError),
}

impl SpnegoError {
    /// Returns the stable kind name used as the message prefix.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConfigInvalid(_) => "ConfigInvalid",
            Self::KeytabLoadFailed { .. } => "KeytabLoadFailed",
            Self::KeytabLookupFailed(_) => "KeytabLookupFailed",
            Self::RequestConversionFailed(_) => "RequestConversionFailed",
        }
    }

    /// Returns the HTTP status this error maps to.
    ///
    /// Every variant is a server-side failure; client mistakes are handled
    /// by the negotiation engine.
    pub fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    /// Builds the terminal response for this error.
    ///
    /// With `expose_details` the body is the full `Display` form, otherwise
    /// only the kind.
    pub fn to_response(&self, expose_details: bool) -> Response {
        let body = if expose_details {
            self.to_string()
        } else {
            self.kind().to_string()
        };
        Response::error(self.status_code(), &body)
    }
}

impl From<ConfigInvalid> for SpnegoError {
    fn from(reason: ConfigInvalid) -> Self {
        Self::ConfigInvalid(reason)
    }
}

impl From<ConversionError> for SpnegoError {
    fn from(err: ConversionError) -> Self {
        Self::RequestConversionFailed(err)
    }
}
