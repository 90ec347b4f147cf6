use crate::errors::{ErrorKind, StrataError, StrataResult};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Identifier of a migration step and its application order.
///
/// Versions are timestamp derived (`1737763600`), totally ordered, and unique
/// within a catalog. [`Version::INITIAL`] stands for "nothing applied".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    pub const INITIAL: Version = Version(0);

    pub const fn new(value: u64) -> Self {
        Version(value)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }

    pub fn is_initial(&self) -> bool {
        *self == Version::INITIAL
    }
}

impl From<u64> for Version {
    fn from(value: u64) -> Self {
        Version(value)
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Version {
    type Err = StrataError;

    fn from_str(s: &str) -> StrataResult<Self> {
        let value = s.trim().parse::<u64>().map_err(|e| {
            StrataError::new_with_cause(
                &format!("Invalid migration version '{}'", s),
                ErrorKind::Configuration,
                e.into(),
            )
        })?;
        Ok(Version(value))
    }
}
