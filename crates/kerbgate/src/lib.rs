//! # Kerbgate
//!
//! SPNEGO/Kerberos authentication middleware for the kerbgate pipeline.
//!
//! The gate sits in a [`kerbgate_pipeline::Pipeline`] in front of the
//! handlers it protects. Each request is authenticated with the HTTP
//! Negotiate scheme (RFC 4559); the caller's [`KerberosIdentity`] is then
//! available to every later stage through [`identity`].
//!
//! ## Components
//!
//! - [`KeytabLookup`] supplies keytab material on every request;
//!   [`FileKeytabLookup`] reads it from disk
//! - [`Negotiator`] is the negotiation engine; [`SpnegoNegotiator`] handles
//!   the HTTP exchange and delegates ticket checks to a [`TicketValidator`]
//! - [`NegotiationRequest`] and [`ResponseAdapter`] bridge the host context
//!   and the engine
//! - [`SpnegoError`] maps failures to responses
//!
//! ## Example
//!
//! ```
//! use kerbgate::{keytab_lookup_fn, SpnegoConfig, SpnegoMiddleware, SpnegoNegotiator, TicketDecision};
//! use kerbgate_keytab::Keytab;
//! use kerbgate_pipeline::Pipeline;
//!
//! let negotiator = SpnegoNegotiator::new(|_: &Keytab, _: &[u8], _: &kerbgate::NegotiationRequest| {
//!     TicketDecision::Rejected("validator not configured".to_string())
//! });
//! let config = SpnegoConfig::new(negotiator)
//!     .with_keytab_lookup(keytab_lookup_fn(|| Ok(Keytab::new())));
//!
//! let pipeline = Pipeline::builder()
//!     .add_stage(SpnegoMiddleware::new(config).unwrap())
//!     .build();
//! assert_eq!(pipeline.stage_names(), vec!["spnego"]);
//! ```

#![doc(html_root_url = "https://docs.rs/kerbgate/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod adapter;
pub mod config;
pub mod error;
pub mod identity;
pub mod middleware;
pub mod negotiate;
pub mod resolver;
pub mod settings;

pub use adapter::{ConversionError, NegotiationRequest, NegotiationResponse, ResponseAdapter};
pub use config::{SpnegoConfig, DEFAULT_MAX_BODY_BYTES};
pub use error::{BoxError, ConfigInvalid, SpnegoError, SpnegoResult};
pub use identity::{identity, KerberosIdentity};
pub use middleware::{new_spnego_middleware, SpnegoMiddleware};
pub use negotiate::{
    NegotiationOutcome, Negotiator, SpnegoNegotiator, TicketDecision, TicketValidator, NEGOTIATE,
    SPNEGO_REJECT_TOKEN,
};
pub use resolver::{keytab_lookup_fn, FileKeytabLookup, FnKeytabLookup, KeytabLookup};
pub use settings::{SettingsError, SpnegoSettings};
