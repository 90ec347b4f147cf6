use super::memory::already_recorded;
use super::{LedgerEntry, LedgerProvider};
use crate::common::{read_json, write_json_atomic};
use crate::errors::{ErrorKind, StrataError, StrataResult};
use crate::version::Version;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A ledger persisted as a JSON array of `{version, name, appliedAt}` records.
///
/// The file is rewritten in full on every change, through a temporary file and
/// an atomic rename.
pub struct JsonFileLedger {
    path: PathBuf,
    entries: RwLock<BTreeMap<Version, LedgerEntry>>,
}

impl JsonFileLedger {
    /// Opens the ledger at `path`; a missing file is an empty ledger.
    pub fn open(path: impl AsRef<Path>) -> StrataResult<Self> {
        let path = path.as_ref().to_path_buf();
        let records: Vec<LedgerEntry> = read_json(&path)?.unwrap_or_default();
        let mut entries = BTreeMap::new();
        for entry in records {
            let version = entry.version;
            if entries.insert(version, entry).is_some() {
                log::error!(
                    "Ledger {} records version {} more than once",
                    path.display(),
                    version.value()
                );
                return Err(StrataError::new(
                    &format!(
                        "Ledger {} records version {} more than once",
                        path.display(),
                        version.value()
                    ),
                    ErrorKind::EncodingError,
                ));
            }
        }
        log::debug!("Opened ledger {} with {} entries", path.display(), entries.len());
        Ok(JsonFileLedger {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<Version, LedgerEntry>) -> StrataResult<()> {
        let records: Vec<&LedgerEntry> = entries.values().collect();
        write_json_atomic(&self.path, &records)
    }
}

impl LedgerProvider for JsonFileLedger {
    fn entries(&self) -> StrataResult<Vec<LedgerEntry>> {
        Ok(self.entries.read().values().cloned().collect())
    }

    fn record(&self, entry: LedgerEntry) -> StrataResult<()> {
        let mut entries = self.entries.write();
        if entries.contains_key(&entry.version) {
            return Err(already_recorded(entry.version));
        }

        let mut next = entries.clone();
        next.insert(entry.version, entry);
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }

    fn remove(&self, version: Version) -> StrataResult<bool> {
        let mut entries = self.entries.write();
        if !entries.contains_key(&version) {
            return Ok(false);
        }

        let mut next = entries.clone();
        next.remove(&version);
        self.persist(&next)?;
        *entries = next;
        Ok(true)
    }
}
