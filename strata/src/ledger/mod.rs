//! The migration ledger and its bundled providers.

mod entry;
mod json_file;
#[allow(clippy::module_inception)]
mod ledger;
mod memory;

pub use entry::*;
pub use json_file::*;
pub use ledger::*;
pub use memory::InMemoryLedger;
