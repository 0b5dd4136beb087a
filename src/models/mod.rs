pub mod enums;
pub mod filters;
pub mod medication;
pub mod prescription;

pub use filters::*;
pub use medication::*;
pub use prescription::*;
