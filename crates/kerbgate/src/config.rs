//! SPNEGO middleware configuration.

use crate::error::SpnegoError;
use crate::negotiate::Negotiator;
use crate::resolver::{FileKeytabLookup, KeytabLookup};
use crate::settings::SpnegoSettings;
use std::fmt;
use std::sync::Arc;
use tracing::Dispatch;

/// Default bound on the request body copied for the negotiation engine.
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Configuration for [`SpnegoMiddleware`](crate::SpnegoMiddleware).
///
/// # Example
///
/// ```
/// use kerbgate::{keytab_lookup_fn, SpnegoConfig, SpnegoNegotiator, TicketDecision};
/// use kerbgate_keytab::Keytab;
///
/// let negotiator = SpnegoNegotiator::new(|_: &Keytab, _: &[u8], _: &kerbgate::NegotiationRequest| {
///     TicketDecision::Rejected("no validator configured".into())
/// });
///
/// let config = SpnegoConfig::new(negotiator)
///     .with_keytab_lookup(keytab_lookup_fn(|| Ok(Keytab::new())))
///     .with_expose_error_details(false);
///
/// assert!(config.keytab_lookup.is_some());
/// assert!(config.logger.is_none());
/// ```
#[derive(Clone)]
pub struct SpnegoConfig {
    /// Source of keytab material. Required.
    pub keytab_lookup: Option<Arc<dyn KeytabLookup>>,

    /// Log destination. When `None`, events go to the default dispatcher.
    pub logger: Option<Dispatch>,

    /// The negotiation engine.
    pub negotiator: Arc<dyn Negotiator>,

    /// Whether 500 bodies carry the error cause or only its kind.
    pub expose_error_details: bool,

    /// Largest request body copied into the negotiation request.
    pub max_body_bytes: usize,
}

impl SpnegoConfig {
    /// Creates a configuration around a negotiation engine.
    ///
    /// The keytab lookup still has to be supplied.
    pub fn new(negotiator: impl Negotiator) -> Self {
        Self::with_shared_negotiator(Arc::new(negotiator))
    }

    /// Creates a configuration around an already shared engine.
    pub fn with_shared_negotiator(negotiator: Arc<dyn Negotiator>) -> Self {
        Self {
            keytab_lookup: None,
            logger: None,
            negotiator,
            expose_error_details: true,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Builds a file-backed configuration from deployment settings.
    ///
    /// # Errors
    ///
    /// Fails as [`FileKeytabLookup::new`] does.
    pub fn from_settings(settings: &SpnegoSettings, negotiator: impl Negotiator) -> Result<Self, SpnegoError> {
        let lookup = FileKeytabLookup::new(settings.keytab_files.iter().cloned())?;
        Ok(Self::new(negotiator)
            .with_keytab_lookup(lookup)
            .with_expose_error_details(settings.expose_error_details)
            .with_max_body_bytes(settings.max_body_bytes))
    }

    /// Sets the keytab lookup.
    pub fn with_keytab_lookup(mut self, lookup: impl KeytabLookup) -> Self {
        self.keytab_lookup = Some(Arc::new(lookup));
        self
    }

    /// Sets an already shared keytab lookup.
    pub fn with_shared_keytab_lookup(mut self, lookup: Arc<dyn KeytabLookup>) -> Self {
        self.keytab_lookup = Some(lookup);
        self
    }

    /// Sends the middleware's events to `logger`.
    pub fn with_logger(mut self, logger: impl Into<Dispatch>) -> Self {
        self.logger = Some(logger.into());
        self
    }

    /// Sets whether 500 bodies include the error cause.
    pub fn with_expose_error_details(mut self, expose: bool) -> Self {
        self.expose_error_details = expose;
        self
    }

    /// Sets the request body bound.
    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

impl fmt::Debug for SpnegoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpnegoConfig")
            .field("keytab_lookup", &self.keytab_lookup.is_some())
            .field("logger", &self.logger.is_some())
            .field("expose_error_details", &self.expose_error_details)
            .field("max_body_bytes", &self.max_body_bytes)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::negotiate::{SpnegoNegotiator, TicketDecision};
    use crate::resolver::keytab_lookup_fn;
    use crate::{ConfigInvalid, NegotiationRequest};
    use kerbgate_keytab::{Keytab, Principal};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn reject_all(_: &Keytab, _: &[u8], _: &NegotiationRequest) -> TicketDecision {
        TicketDecision::Rejected("test".to_string())
    }

    #[test]
    fn test_defaults() {
        let config = SpnegoConfig::new(SpnegoNegotiator::new(reject_all));
        assert!(config.keytab_lookup.is_none());
        assert!(config.logger.is_none());
        assert!(config.expose_error_details);
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
    }

    #[test]
    fn test_builder() {
        let config = SpnegoConfig::new(SpnegoNegotiator::new(reject_all))
            .with_keytab_lookup(keytab_lookup_fn(|| Ok(Keytab::new())))
            .with_logger(Dispatch::none())
            .with_max_body_bytes(16);
        assert!(config.keytab_lookup.is_some());
        assert!(config.logger.is_some());
        assert_eq!(config.max_body_bytes, 16);

        let debug = format!("{config:?}");
        assert!(debug.contains("max_body_bytes: 16"));
    }

    #[test]
    fn test_from_settings_requires_keytab_files() {
        let settings = SpnegoSettings::default();
        let err = SpnegoConfig::from_settings(&settings, SpnegoNegotiator::new(reject_all)).unwrap_err();
        assert!(matches!(
            err,
            SpnegoError::ConfigInvalid(ConfigInvalid::AtLeastOneKeytabFileRequired)
        ));
    }

    #[test]
    fn test_from_settings_builds_file_lookup() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("http.keytab");
        let mut keytab = Keytab::new();
        keytab.add_entry(kerbgate_keytab::KeytabEntry::new(
            Principal::parse("HTTP/sso.example.com@EXAMPLE.COM").unwrap(),
            0,
            1,
            kerbgate_keytab::EncryptionKey::new(17, vec![0u8; 16]),
        ));
        keytab.write_file(&path).unwrap();

        let settings = SpnegoSettings {
            keytab_files: vec![PathBuf::from(&path)],
            expose_error_details: false,
            max_body_bytes: 512,
        };
        let config = SpnegoConfig::from_settings(&settings, SpnegoNegotiator::new(reject_all)).unwrap();
        assert!(config.keytab_lookup.is_some());
        assert!(!config.expose_error_details);
        assert_eq!(config.max_body_bytes, 512);
    }
}
