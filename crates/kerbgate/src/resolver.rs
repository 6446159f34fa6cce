//! Keytab resolution.
//!
//! The middleware never holds key material itself. On every request it asks
//! a [`KeytabLookup`] for the keytab to validate against, so rotated keys
//! take effect without rebuilding the pipeline. Caching and timeouts, if
//! wanted, belong to the lookup implementation.

use crate::error::{BoxError, ConfigInvalid, SpnegoError};
use kerbgate_keytab::{Keytab, KeytabError};
use kerbgate_pipeline::BoxFuture;
use std::fmt;
use std::path::{Path, PathBuf};

/// A source of keytab material, consulted once per request.
///
/// # Example
///
/// ```
/// use kerbgate::{keytab_lookup_fn, KeytabLookup};
/// use kerbgate_keytab::Keytab;
///
/// let lookup = keytab_lookup_fn(|| Ok(Keytab::new()));
/// # let _ = &lookup as &dyn KeytabLookup;
/// ```
pub trait KeytabLookup: Send + Sync + 'static {
    /// Returns the keytab to use for the current request.
    fn lookup(&self) -> BoxFuture<'_, Result<Keytab, BoxError>>;
}

/// A [`KeytabLookup`] backed by a synchronous closure.
///
/// Suitable for keytabs held in memory, or fetched from a secret store
/// through a blocking client.
pub struct FnKeytabLookup<F> {
    func: F,
}

impl<F> FnKeytabLookup<F>
where
    F: Fn() -> Result<Keytab, BoxError> + Send + Sync + 'static,
{
    /// Wraps a closure.
    pub const fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> KeytabLookup for FnKeytabLookup<F>
where
    F: Fn() -> Result<Keytab, BoxError> + Send + Sync + 'static,
{
    fn lookup(&self) -> BoxFuture<'_, Result<Keytab, BoxError>> {
        let result = (self.func)();
        Box::pin(async move { result })
    }
}

impl<F> fmt::Debug for FnKeytabLookup<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnKeytabLookup").finish_non_exhaustive()
    }
}

/// Creates a [`FnKeytabLookup`] from a closure.
pub const fn keytab_lookup_fn<F>(func: F) -> FnKeytabLookup<F>
where
    F: Fn() -> Result<Keytab, BoxError> + Send + Sync + 'static,
{
    FnKeytabLookup::new(func)
}

/// A [`KeytabLookup`] reading one or more keytab files.
///
/// Every file is validated when the lookup is created. Each request then
/// re-reads all files and merges their entries in path order, so a keytab
/// replaced on disk is used from the next request on.
#[derive(Debug, Clone)]
pub struct FileKeytabLookup {
    paths: Vec<PathBuf>,
}

impl FileKeytabLookup {
    /// Creates a lookup over `paths`.
    ///
    /// # Errors
    ///
    /// - [`ConfigInvalid::AtLeastOneKeytabFileRequired`] when `paths` is empty
    /// - [`SpnegoError::KeytabLoadFailed`] naming the first file that cannot
    ///   be read or decoded
    pub fn new<I, P>(paths: I) -> Result<Self, SpnegoError>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let paths: Vec<PathBuf> = paths.into_iter().map(Into::into).collect();
        if paths.is_empty() {
            return Err(ConfigInvalid::AtLeastOneKeytabFileRequired.into());
        }

        for path in &paths {
            let keytab = Keytab::from_file(path).map_err(|source| load_failed(path, source))?;
            tracing::debug!(
                path = %path.display(),
                entries = keytab.len(),
                "keytab file validated"
            );
        }

        Ok(Self { paths })
    }

    /// Returns the configured keytab files.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    async fn load_all(&self) -> Result<Keytab, SpnegoError> {
        let mut merged = Keytab::new();
        for path in &self.paths {
            let data = tokio::fs::read(path).await.map_err(|source| {
                load_failed(
                    path,
                    KeytabError::Io {
                        path: path.clone(),
                        source,
                    },
                )
            })?;
            let keytab = Keytab::parse(&data).map_err(|source| load_failed(path, source))?;
            merged.merge(keytab);
        }
        Ok(merged)
    }
}

impl KeytabLookup for FileKeytabLookup {
    fn lookup(&self) -> BoxFuture<'_, Result<Keytab, BoxError>> {
        Box::pin(async move { self.load_all().await.map_err(BoxError::from) })
    }
}

fn load_failed(path: &Path, source: KeytabError) -> SpnegoError {
    SpnegoError::KeytabLoadFailed {
        path: path.to_path_buf(),
        source,
    }
}
