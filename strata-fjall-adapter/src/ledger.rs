use crate::config::FjallLedgerConfig;
use crate::wrapper::to_strata_error;
use fjall::{CompressionType, Keyspace, PartitionHandle, PersistMode};
use parking_lot::Mutex;
use strata::errors::{ErrorKind, StrataError, StrataResult};
use strata::ledger::{LedgerEntry, LedgerProvider};
use strata::Version;

/// A migration ledger stored in a fjall partition.
///
/// Each entry is keyed by its version as a big-endian `u64`, so the partition's
/// natural key order is version order, and stored as JSON. Every write is
/// followed by a `SyncAll` persist before it is reported as done.
///
/// # Examples
///
/// ```rust,ignore
/// use strata::ledger::Ledger;
/// use strata_fjall_adapter::FjallLedger;
///
/// let ledger = Ledger::new(
///     FjallLedger::with_config()
///         .db_path("/var/lib/gallery/ledger")
///         .build()?,
/// );
/// ```
pub struct FjallLedger {
    keyspace: Keyspace,
    partition: PartitionHandle,
    config: FjallLedgerConfig,
    write_lock: Mutex<()>,
}

impl FjallLedger {
    pub fn with_config() -> FjallLedgerBuilder {
        FjallLedgerBuilder::new()
    }

    /// Opens (or creates) the keyspace and ledger partition described by `config`.
    pub fn open(config: FjallLedgerConfig) -> StrataResult<FjallLedger> {
        if config.db_path().is_empty() {
            log::error!("Fjall ledger needs a db path");
            return Err(StrataError::new(
                "Fjall ledger needs a db path",
                ErrorKind::Configuration,
            ));
        }

        let keyspace = Keyspace::open(config.keyspace_config()).map_err(|err| {
            log::error!("Failed to open ledger keyspace at {}: {}", config.db_path(), err);
            to_strata_error(err)
        })?;
        let partition = keyspace
            .open_partition(config.partition(), config.partition_config())
            .map_err(|err| {
                log::error!("Failed to open ledger partition {}: {}", config.partition(), err);
                to_strata_error(err)
            })?;

        log::debug!(
            "Opened fjall ledger at {} (partition {})",
            config.db_path(),
            config.partition()
        );
        Ok(FjallLedger {
            keyspace,
            partition,
            config,
            write_lock: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &FjallLedgerConfig {
        &self.config
    }

    fn persist(&self) -> StrataResult<()> {
        self.keyspace.persist(PersistMode::SyncAll).map_err(|err| {
            log::error!("Failed to persist ledger keyspace: {}", err);
            to_strata_error(err)
        })
    }

    fn contains(&self, key: &[u8]) -> StrataResult<bool> {
        self.partition.contains_key(key).map_err(|err| {
            log::error!("Failed to read ledger partition: {}", err);
            to_strata_error(err)
        })
    }
}

fn version_key(version: Version) -> [u8; 8] {
    version.value().to_be_bytes()
}

impl LedgerProvider for FjallLedger {
    fn entries(&self) -> StrataResult<Vec<LedgerEntry>> {
        let mut entries = Vec::new();
        for item in self.partition.iter() {
            let (_, value) = item.map_err(|err| {
                log::error!("Failed to iterate ledger partition: {}", err);
                to_strata_error(err)
            })?;
            let entry: LedgerEntry = serde_json::from_slice(&value).map_err(|err| {
                log::error!("Corrupted ledger entry: {}", err);
                StrataError::new_with_cause(
                    "Corrupted ledger entry",
                    ErrorKind::EncodingError,
                    err.into(),
                )
            })?;
            entries.push(entry);
        }
        Ok(entries)
    }

    fn record(&self, entry: LedgerEntry) -> StrataResult<()> {
        let _guard = self.write_lock.lock();
        let key = version_key(entry.version);
        if self.contains(&key)? {
            log::error!("Version {} is already recorded in the ledger", entry.version);
            return Err(StrataError::new(
                &format!("Version {} is already recorded in the ledger", entry.version),
                ErrorKind::Conflict,
            ));
        }

        let value = serde_json::to_vec(&entry)?;
        self.partition
            .insert(&key[..], value.as_slice())
            .map_err(|err| {
                log::error!("Failed to record version {}: {}", entry.version, err);
                to_strata_error(err)
            })?;
        self.persist()
    }

    fn remove(&self, version: Version) -> StrataResult<bool> {
        let _guard = self.write_lock.lock();
        let key = version_key(version);
        if !self.contains(&key)? {
            return Ok(false);
        }

        self.partition.remove(&key[..]).map_err(|err| {
            log::error!("Failed to remove version {}: {}", version, err);
            to_strata_error(err)
        })?;
        self.persist()?;
        Ok(true)
    }
}

/// Builder for [`FjallLedger`].
pub struct FjallLedgerBuilder {
    config: FjallLedgerConfig,
}

impl FjallLedgerBuilder {
    pub fn new() -> FjallLedgerBuilder {
        FjallLedgerBuilder {
            config: FjallLedgerConfig::new(),
        }
    }

    pub fn db_path(mut self, db_path: &str) -> Self {
        self.config.set_db_path(db_path);
        self
    }

    /// Partition name, so several ledgers can share one keyspace.
    pub fn partition(mut self, partition: &str) -> Self {
        self.config.set_partition(partition);
        self
    }

    pub fn cache_size(mut self, cache_size: u64) -> Self {
        self.config.set_cache_size(cache_size);
        self
    }

    pub fn fsync_frequency(mut self, fsync_frequency: u16) -> Self {
        self.config.set_fsync_frequency(fsync_frequency);
        self
    }

    pub fn bloom_filter_bits(mut self, bloom_filter_bits: Option<u8>) -> Self {
        self.config.set_bloom_filter_bits(bloom_filter_bits);
        self
    }

    pub fn compression_type(mut self, compression_type: CompressionType) -> Self {
        self.config.set_compression_type(compression_type);
        self
    }

    pub fn build(self) -> StrataResult<FjallLedger> {
        FjallLedger::open(self.config)
    }
}

impl Default for FjallLedgerBuilder {
    fn default() -> Self {
        FjallLedgerBuilder::new()
    }
}
