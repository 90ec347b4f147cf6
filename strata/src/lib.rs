//! # Strata - Versioned Schema Migrations
//!
//! Strata evolves the schema of a collection-based backend (collections with
//! ordered, typed fields and access rules) through a catalog of versioned
//! migration steps. Every step has a forward and a backward transform; applied
//! steps are recorded in a durable ledger so runs can be resumed and reverted.
//!
//! ## Key Features
//!
//! - **Ordered runs**: steps apply in ascending version order and revert in
//!   descending order, stopping at the first failure
//! - **Durable ledger**: the ledger is the only record of what was applied;
//!   in-memory, JSON file and fjall-backed providers
//! - **Declarative steps**: add/remove fields at a position, patch rules,
//!   create, rename or drop collections, from Rust or from JSON step files
//! - **Guarded lookups**: a step can name a collection by several identifiers
//!   and skip silently when none resolves
//! - **Exact rule round trips**: `null`, `""` and expression rules stay distinct
//!
//! ## Quick Start
//!
//! ```rust
//! use strata::gallery;
//! use strata::ledger::{InMemoryLedger, Ledger};
//! use strata::migration::{MigrationEngine, Target};
//! use strata::store::{InMemorySchemaStore, SchemaStore};
//! use strata::Version;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SchemaStore::new(InMemorySchemaStore::with_collections(gallery::baseline_schema())?);
//! let engine = MigrationEngine::builder()
//!     .schema_store(store.clone())
//!     .ledger(Ledger::new(InMemoryLedger::new()))
//!     .catalog(gallery::catalog()?)
//!     .build()?;
//!
//! let report = engine.upgrade(Target::Latest)?.into_result()?;
//! assert_eq!(report.committed.len(), 15);
//!
//! engine.downgrade(Version::INITIAL)?.into_result()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`errors`] - Error types and result definitions
//! - [`schema`] - Collections, fields and access rules
//! - [`store`] - The schema store interface and bundled stores
//! - [`ledger`] - The migration ledger and bundled ledgers
//! - [`migration`] - Steps, operations, the catalog and the engine
//! - [`gallery`] - The photo gallery's baseline schema and migrations

mod common;
pub mod errors;
pub mod gallery;
pub mod ledger;
pub mod migration;
pub mod schema;
pub mod store;
mod version;

pub use version::Version;
