//! # Forum Domain
//!
//! The mail job entity and the value objects it is built from.

pub mod entities;
pub mod value_objects;

pub use entities::*;
pub use value_objects::*;
