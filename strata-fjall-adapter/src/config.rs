use fjall::{CompressionType, Config, PartitionCreateOptions};

/// Default partition holding ledger entries.
pub const DEFAULT_PARTITION: &str = "strata_ledger";

/// Fjall settings for a [`FjallLedger`](crate::FjallLedger).
///
/// A ledger holds a handful of small entries, so the defaults favour a small
/// cache and leave durability to the explicit `SyncAll` persist after each
/// write.
#[derive(Debug, Clone)]
pub struct FjallLedgerConfig {
    db_path: String,
    partition: String,
    cache_size: u64,
    fsync_frequency: u16,
    bloom_filter_bits: Option<u8>,
    compression_type: CompressionType,
}

impl FjallLedgerConfig {
    pub fn new() -> FjallLedgerConfig {
        FjallLedgerConfig {
            db_path: String::new(),
            partition: DEFAULT_PARTITION.to_string(),
            cache_size: 8 * 1024 * 1024,
            fsync_frequency: 0,
            bloom_filter_bits: Some(10),
            compression_type: CompressionType::Lz4,
        }
    }

    pub(crate) fn keyspace_config(&self) -> Config {
        let mut config = Config::new(&self.db_path).cache_size(self.cache_size);
        if self.fsync_frequency > 0 {
            config = config.fsync_ms(Some(self.fsync_frequency));
        }
        config
    }

    pub(crate) fn partition_config(&self) -> PartitionCreateOptions {
        PartitionCreateOptions::default()
            .bloom_filter_bits(self.bloom_filter_bits)
            .compression(self.compression_type)
    }

    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    pub(crate) fn set_db_path(&mut self, db_path: &str) {
        self.db_path = db_path.to_string();
    }

    pub fn partition(&self) -> &str {
        &self.partition
    }

    pub(crate) fn set_partition(&mut self, partition: &str) {
        self.partition = partition.to_string();
    }

    pub fn cache_size(&self) -> u64 {
        self.cache_size
    }

    pub(crate) fn set_cache_size(&mut self, cache_size: u64) {
        self.cache_size = cache_size;
    }

    /// Background fsync interval in milliseconds; 0 disables it.
    pub fn fsync_frequency(&self) -> u16 {
        self.fsync_frequency
    }

    pub(crate) fn set_fsync_frequency(&mut self, fsync_frequency: u16) {
        self.fsync_frequency = fsync_frequency;
    }

    pub fn bloom_filter_bits(&self) -> Option<u8> {
        self.bloom_filter_bits
    }

    pub(crate) fn set_bloom_filter_bits(&mut self, bloom_filter_bits: Option<u8>) {
        self.bloom_filter_bits = bloom_filter_bits;
    }

    pub fn compression_type(&self) -> CompressionType {
        self.compression_type
    }

    pub(crate) fn set_compression_type(&mut self, compression_type: CompressionType) {
        self.compression_type = compression_type;
    }
}

impl Default for FjallLedgerConfig {
    fn default() -> Self {
        FjallLedgerConfig::new()
    }
}
