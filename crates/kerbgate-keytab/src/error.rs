//! Keytab error types.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for keytab operations.
pub type KeytabResult<T> = Result<T, KeytabError>;

/// Errors that can occur while reading or writing keytabs.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KeytabError {
    /// Reading or writing a keytab file failed.
    ///
    /// The path is kept as a field so callers can report it once.
    #[error("cannot access keytab file: {source}")]
    Io {
        /// Path to the keytab file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file does not start with a supported format marker.
    #[error("invalid keytab header {0:#04x} {1:#04x}, expected 0x05 0x01 or 0x05 0x02")]
    InvalidHeader(u8, u8),

    /// The data ended in the middle of a structure.
    #[error("keytab truncated while reading {0}")]
    Truncated(&'static str),

    /// A record could not be decoded.
    #[error("keytab entry {index} is invalid: {reason}")]
    InvalidEntry {
        /// Position of the entry among the decoded (non-hole) records.
        index: usize,
        /// Description of the defect.
        reason: String,
    },

    /// A principal string could not be parsed.
    #[error("invalid principal '{0}': expected name@REALM")]
    InvalidPrincipal(String),

    /// A field exceeds what the on-disk format can represent.
    #[error("{0} is too large to encode in a keytab")]
    TooLarge(&'static str),
}
