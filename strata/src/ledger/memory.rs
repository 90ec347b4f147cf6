use super::{LedgerEntry, LedgerProvider};
use crate::errors::{ErrorKind, StrataError, StrataResult};
use crate::version::Version;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// A ledger held in memory.
#[derive(Default)]
pub struct InMemoryLedger {
    entries: RwLock<BTreeMap<Version, LedgerEntry>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        InMemoryLedger::default()
    }
}

impl LedgerProvider for InMemoryLedger {
    fn entries(&self) -> StrataResult<Vec<LedgerEntry>> {
        Ok(self.entries.read().values().cloned().collect())
    }

    fn record(&self, entry: LedgerEntry) -> StrataResult<()> {
        let mut entries = self.entries.write();
        if entries.contains_key(&entry.version) {
            return Err(already_recorded(entry.version));
        }
        entries.insert(entry.version, entry);
        Ok(())
    }

    fn remove(&self, version: Version) -> StrataResult<bool> {
        Ok(self.entries.write().remove(&version).is_some())
    }
}

pub(crate) fn already_recorded(version: Version) -> StrataError {
    log::error!("Version {} is already recorded in the ledger", version);
    StrataError::new(
        &format!("Version {} is already recorded in the ledger", version),
        ErrorKind::Conflict,
    )
}
