//! Collection schema model: rules, field specs and collection definitions.

mod collection;
mod field;
mod rule;

pub use collection::*;
pub use field::*;
pub use rule::*;
