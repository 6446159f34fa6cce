//! The authenticated Kerberos identity and its per-request storage.
//!
//! After a successful handshake the middleware stores a [`KerberosIdentity`]
//! in the request's [`RequestContext`] under a key reserved by this crate. Handlers
//! further down the pipeline read it with [`identity`]. The value lives
//! exactly as long as the context, so nothing leaks between requests.

use chrono::{DateTime, Utc};
use kerbgate_pipeline::RequestContext;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Locals key under which the identity is stored.
///
/// Only this module writes it, so applications cannot plant an identity.
pub(crate) const IDENTITY_KEY: &str = "kerbgate.spnego.identity";

/// A caller authenticated by Kerberos.
///
/// # Example
///
/// ```
/// use kerbgate::KerberosIdentity;
///
/// let identity = KerberosIdentity::new("alice", "EXAMPLE.COM")
///     .with_display_name("Alice Liddell")
///     .with_authz_attribute("S-1-5-21-1004336348-1177238915-682003330-513");
///
/// assert_eq!(identity.principal(), "alice@EXAMPLE.COM");
/// assert_eq!(identity.display_name(), "Alice Liddell");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KerberosIdentity {
    user_name: String,
    realm: String,
    display_name: String,
    auth_time: DateTime<Utc>,
    session_id: Uuid,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    authz_attributes: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    attributes: BTreeMap<String, String>,
}

impl KerberosIdentity {
    /// Creates an identity authenticated now, with a fresh session ID.
    ///
    /// The display name defaults to the user name.
    pub fn new(user_name: impl Into<String>, realm: impl Into<String>) -> Self {
        let user_name = user_name.into();
        Self {
            display_name: user_name.clone(),
            user_name,
            realm: realm.into(),
            auth_time: Utc::now(),
            session_id: Uuid::now_v7(),
            authz_attributes: Vec::new(),
            attributes: BTreeMap::new(),
        }
    }

    /// Sets the display name.
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// Sets the authentication time.
    pub fn with_auth_time(mut self, auth_time: DateTime<Utc>) -> Self {
        self.auth_time = auth_time;
        self
    }

    /// Sets the session ID.
    pub fn with_session_id(mut self, session_id: Uuid) -> Self {
        self.session_id = session_id;
        self
    }

    /// Adds an authorization attribute, such as a group SID from the PAC.
    pub fn with_authz_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.authz_attributes.push(attribute.into());
        self
    }

    /// Adds a free-form attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Returns the user name, without realm.
    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    /// Returns the realm.
    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// Returns the display name.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Returns when the caller authenticated.
    pub fn auth_time(&self) -> DateTime<Utc> {
        self.auth_time
    }

    /// Returns the session ID.
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Returns the authorization attributes.
    pub fn authz_attributes(&self) -> &[String] {
        &self.authz_attributes
    }

    /// Returns a free-form attribute.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Returns all free-form attributes.
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    /// Returns `user@REALM`, suitable for logging.
    pub fn principal(&self) -> String {
        format!("{}@{}", self.user_name, self.realm)
    }
}

/// Stores `identity` on the context, replacing any earlier one.
pub(crate) fn set_identity(ctx: &mut RequestContext, identity: KerberosIdentity) {
    ctx.set_local(IDENTITY_KEY, identity);
}

/// Returns the identity authenticated on this request, if any.
///
/// # Example
///
/// ```
/// use kerbgate_pipeline::RequestContext;
///
/// let ctx = RequestContext::new();
/// assert!(kerbgate::identity(&ctx).is_none());
/// ```
pub fn identity(ctx: &RequestContext) -> Option<&KerberosIdentity> {
    ctx.local::<KerberosIdentity>(IDENTITY_KEY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_absent_on_fresh_context() {
        let ctx = RequestContext::new();
        assert!(identity(&ctx).is_none());
    }

    #[test]
    fn test_identity_is_stable_across_reads() {
        let mut ctx = RequestContext::new();
        set_identity(&mut ctx, KerberosIdentity::new("alice", "EXAMPLE.COM"));

        let first = identity(&ctx).cloned().unwrap();
        let second = identity(&ctx).cloned().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.principal(), "alice@EXAMPLE.COM");
    }

    #[test]
    fn test_last_write_wins() {
        let mut ctx = RequestContext::new();
        set_identity(&mut ctx, KerberosIdentity::new("alice", "EXAMPLE.COM"));
        set_identity(&mut ctx, KerberosIdentity::new("bob", "EXAMPLE.COM"));
        assert_eq!(identity(&ctx).unwrap().user_name(), "bob");
    }

    #[test]
    fn test_foreign_value_under_key_is_ignored() {
        let mut ctx = RequestContext::new();
        ctx.set_local(IDENTITY_KEY, "not an identity");
        assert!(identity(&ctx).is_none());
    }

    #[test]
    fn test_serializes_without_empty_collections() {
        let identity = KerberosIdentity::new("alice", "EXAMPLE.COM");
        let json = serde_json::to_value(&identity).unwrap();
        assert_eq!(json["user_name"], "alice");
        assert_eq!(json["realm"], "EXAMPLE.COM");
        assert!(json.get("authz_attributes").is_none());

        let restored: KerberosIdentity = serde_json::from_value(json).unwrap();
        assert_eq!(restored, identity);
    }

    #[test]
    fn test_attributes() {
        let identity = KerberosIdentity::new("alice", "EXAMPLE.COM")
            .with_attribute("upn", "alice@example.com")
            .with_authz_attribute("S-1-5-32-544");
        assert_eq!(identity.attribute("upn"), Some("alice@example.com"));
        assert_eq!(identity.attribute("missing"), None);
        assert_eq!(identity.authz_attributes(), ["S-1-5-32-544"]);
    }
}
