//! # Kerbgate Keytab
//!
//! In-memory model and file codec for MIT keytabs, the credential bundles
//! holding a service's long-term Kerberos keys.
//!
//! - [`Keytab`] - an ordered set of [`KeytabEntry`] values
//! - [`Principal`] - a service or user name within a realm
//! - [`EncryptionKey`] - key bytes tagged with an encryption type
//!
//! Only the container format is handled here: no key derivation and no
//! cryptography.
//!
//! ```no_run
//! use kerbgate_keytab::Keytab;
//!
//! let keytab = Keytab::from_file("/etc/krb5.keytab")?;
//! for principal in keytab.principals() {
//!     println!("{principal}");
//! }
//! # Ok::<(), kerbgate_keytab::KeytabError>(())
//! ```

#![doc(html_root_url = "https://docs.rs/kerbgate-keytab/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod keytab;
mod principal;

pub use error::{KeytabError, KeytabResult};
pub use keytab::{enctype, EncryptionKey, Keytab, KeytabEntry, FORMAT_MAGIC};
pub use principal::{name_type, Principal};
