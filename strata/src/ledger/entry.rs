use crate::version::Version;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Record of one applied migration step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub version: Version,
    /// Step name at the time it was applied.
    #[serde(default)]
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// An entry stamped with the current time.
    pub fn now(version: Version, name: &str) -> Self {
        LedgerEntry {
            version,
            name: name.to_string(),
            applied_at: Utc::now(),
        }
    }
}
