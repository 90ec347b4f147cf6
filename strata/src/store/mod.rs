//! Schema stores: the interface the engine migrates through and the bundled providers.

mod json_file;
mod memory;
mod schema_store;
mod state;

pub use json_file::*;
pub use memory::*;
pub use schema_store::*;
pub use state::SchemaSnapshot;
