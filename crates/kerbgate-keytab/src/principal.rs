//! Kerberos principal names.

use crate::error::{KeytabError, KeytabResult};
use std::fmt;

/// Principal name types (RFC 4120 §6.2).
pub mod name_type {
    /// Name type not known.
    pub const UNKNOWN: u32 = 0;
    /// Just the name of the principal, as in DCE or for users.
    pub const PRINCIPAL: u32 = 1;
    /// Service and other unique instance (krbtgt).
    pub const SRV_INST: u32 = 2;
    /// Service with host name as instance (telnet, rcommands, HTTP).
    pub const SRV_HST: u32 = 3;
}

/// A Kerberos principal: name components within a realm.
///
/// # Example
///
/// ```
/// use kerbgate_keytab::Principal;
///
/// let principal = Principal::parse("HTTP/sso.example.com@EXAMPLE.COM").unwrap();
/// assert_eq!(principal.components(), ["HTTP", "sso.example.com"]);
/// assert_eq!(principal.realm(), "EXAMPLE.COM");
/// assert_eq!(principal.to_string(), "HTTP/sso.example.com@EXAMPLE.COM");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Principal {
    name_type: u32,
    components: Vec<String>,
    realm: String,
}

impl Principal {
    /// Creates a principal from a `/`-separated name and a realm.
    ///
    /// The name type defaults to [`name_type::PRINCIPAL`].
    pub fn new(name: &str, realm: impl Into<String>) -> Self {
        Self {
            name_type: name_type::PRINCIPAL,
            components: name.split('/').map(str::to_string).collect(),
            realm: realm.into(),
        }
    }

    /// Creates a principal from raw components.
    pub fn from_components(components: Vec<String>, realm: impl Into<String>, name_type: u32) -> Self {
        Self {
            name_type,
            components,
            realm: realm.into(),
        }
    }

    /// Parses `name@REALM`.
    pub fn parse(principal: &str) -> KeytabResult<Self> {
        match principal.rsplit_once('@') {
            Some((name, realm)) if !name.is_empty() && !realm.is_empty() => {
                Ok(Self::new(name, realm))
            }
            _ => Err(KeytabError::InvalidPrincipal(principal.to_string())),
        }
    }

    /// Sets the name type.
    #[must_use]
    pub fn with_name_type(mut self, name_type: u32) -> Self {
        self.name_type = name_type;
        self
    }

    /// Returns the name type.
    pub fn name_type(&self) -> u32 {
        self.name_type
    }

    /// Returns the name components.
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Returns the realm.
    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// Returns the name without the realm, components joined by `/`.
    pub fn name(&self) -> String {
        self.components.join("/")
    }

    /// Compares name and realm, ignoring the name type.
    ///
    /// Name types differ between keytab writers for the same service.
    pub fn matches(&self, other: &Self) -> bool {
        self.realm == other.realm && self.components == other.components
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name(), self.realm)
    }
}
