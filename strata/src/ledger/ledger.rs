use super::LedgerEntry;
use crate::errors::StrataResult;
use crate::version::Version;
use std::collections::BTreeSet;
use std::ops::Deref;
use std::sync::Arc;

/// Durable record of which migration steps have been applied.
///
/// The ledger is the only source of truth for "what has been applied". A
/// version is present at most once: presence means applied, absence means
/// never applied or reverted.
///
/// # Implementations
/// - `InMemoryLedger`: for tests and embedding
/// - `JsonFileLedger`: a JSON array of entries, replaced atomically on write
/// - `FjallLedger` (in `strata_fjall_adapter`): an LSM-tree partition
///
/// # Thread Safety
/// Implementers must be `Send + Sync`.
pub trait LedgerProvider: Send + Sync {
    /// Returns all entries in ascending version order.
    fn entries(&self) -> StrataResult<Vec<LedgerEntry>>;

    /// Durably records an applied step.
    ///
    /// # Returns
    /// * `Ok(())` once the entry is persisted
    /// * `Err(StrataError)` of kind `Conflict` if the version is already recorded
    fn record(&self, entry: LedgerEntry) -> StrataResult<()>;

    /// Durably removes the entry for `version`.
    ///
    /// # Returns
    /// * `Ok(true)` if an entry was removed
    /// * `Ok(false)` if the version was not recorded
    fn remove(&self, version: Version) -> StrataResult<bool>;
}

/// Shared handle to a [`LedgerProvider`].
#[derive(Clone)]
pub struct Ledger {
    inner: Arc<dyn LedgerProvider>,
}

impl Ledger {
    pub fn new<T: LedgerProvider + 'static>(inner: T) -> Self {
        Ledger {
            inner: Arc::new(inner),
        }
    }

    /// The highest recorded version, or [`Version::INITIAL`] for an empty ledger.
    pub fn last_applied(&self) -> StrataResult<Version> {
        Ok(self
            .inner
            .entries()?
            .iter()
            .map(|entry| entry.version)
            .max()
            .unwrap_or(Version::INITIAL))
    }

    pub fn applied_versions(&self) -> StrataResult<BTreeSet<Version>> {
        Ok(self
            .inner
            .entries()?
            .into_iter()
            .map(|entry| entry.version)
            .collect())
    }

    pub fn contains(&self, version: Version) -> StrataResult<bool> {
        Ok(self
            .inner
            .entries()?
            .iter()
            .any(|entry| entry.version == version))
    }
}

impl Deref for Ledger {
    type Target = Arc<dyn LedgerProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
