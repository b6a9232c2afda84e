//! Shared data model for map event definitions.

pub mod defs;
pub mod validate;

pub use defs::*;
pub use validate::{ValidationError, validate_maps};
