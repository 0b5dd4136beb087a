//! Repository layer: table-scoped database operations.
//!
//! All public functions are re-exported here.

mod identifiers;
mod medication_view;
mod options;
mod prescription;
mod uuid_registry;

pub use identifiers::*;
pub use medication_view::*;
pub use options::*;
pub use prescription::*;
pub use uuid_registry::*;
