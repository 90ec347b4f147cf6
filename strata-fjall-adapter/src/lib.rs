//! A durable migration ledger for `strata` backed by the fjall LSM-tree store.
//!
//! ```rust,ignore
//! use strata::ledger::Ledger;
//! use strata_fjall_adapter::FjallLedger;
//!
//! let ledger = Ledger::new(FjallLedger::with_config().db_path("/path/to/ledger").build()?);
//! ```

mod config;
mod ledger;
mod wrapper;

pub use config::*;
pub use ledger::*;
