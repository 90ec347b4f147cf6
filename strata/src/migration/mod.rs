//! Migration steps, the catalog that orders them and the engine that runs them.

mod catalog;
mod collection_ref;
mod config;
mod engine;
mod operation;
mod report;
mod step;
mod working_set;

pub use catalog::*;
pub use collection_ref::*;
pub use config::*;
pub use engine::*;
pub use operation::*;
pub use report::*;
pub use step::*;
