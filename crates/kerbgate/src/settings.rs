//! Deployment settings for a file-backed SPNEGO gate.
//!
//! Settings are layered: built-in defaults, then a TOML file, then
//! environment variables of the form `KERBGATE__<FIELD>`:
//!
//! - `KERBGATE__KEYTAB_FILES=/etc/krb5/http.keytab,/etc/krb5/next.keytab`
//! - `KERBGATE__EXPOSE_ERROR_DETAILS=false`
//! - `KERBGATE__MAX_BODY_BYTES=65536`
//!
//! ```toml
//! keytab_files = ["/etc/krb5/http.keytab"]
//! expose_error_details = false
//! max_body_bytes = 65536
//! ```

use crate::config::DEFAULT_MAX_BODY_BYTES;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "KERBGATE";

/// Errors while loading settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file could not be read.
    #[error("failed to read settings file: {}", path.display())]
    Read {
        /// Path to the file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not valid TOML for these settings.
    #[error("failed to parse TOML settings: {0}")]
    Toml(#[from] toml::de::Error),

    /// An environment override has an unusable value.
    #[error("failed to parse environment variable {var}: {reason}")]
    Env {
        /// The variable name.
        var: String,
        /// What was expected.
        reason: &'static str,
    },
}

/// File and environment backed settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpnegoSettings {
    /// Keytab files, merged in order on every request.
    pub keytab_files: Vec<PathBuf>,

    /// Whether 500 bodies carry the error cause.
    pub expose_error_details: bool,

    /// Largest request body copied for negotiation.
    pub max_body_bytes: usize,
}

impl Default for SpnegoSettings {
    fn default() -> Self {
        Self {
            keytab_files: Vec::new(),
            expose_error_details: true,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl SpnegoSettings {
    /// Parses settings from a TOML string; missing fields keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(content)?)
    }

    /// Reads settings from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Loads settings from an optional file, then applies the process
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.with_env_overrides(std::env::vars())
    }

    /// Applies `KERBGATE__*` overrides from the given variables.
    ///
    /// Variables without the prefix are ignored; unknown fields under the
    /// prefix are ignored with a warning.
    pub fn with_env_overrides<I>(mut self, vars: I) -> Result<Self, SettingsError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(field) = key
                .strip_prefix(ENV_PREFIX)
                .and_then(|k| k.strip_prefix("__"))
            else {
                continue;
            };

            match field {
                "KEYTAB_FILES" => {
                    self.keytab_files = value
                        .split(',')
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(PathBuf::from)
                        .collect();
                }
                "EXPOSE_ERROR_DETAILS" => {
                    self.expose_error_details = parse_bool(&value).ok_or_else(|| SettingsError::Env {
                        var: key.clone(),
                        reason: "expected boolean",
                    })?;
                }
                "MAX_BODY_BYTES" => {
                    self.max_body_bytes = value.parse().map_err(|_| SettingsError::Env {
                        var: key.clone(),
                        reason: "expected integer",
                    })?;
                }
                _ => tracing::warn!(var = %key, "ignoring unknown kerbgate environment variable"),
            }
        }
        Ok(self)
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
