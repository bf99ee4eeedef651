//! Core types shared by the Cadence crates: the error taxonomy, evaluated
//! animation values and the property-sink abstraction that evaluated values
//! are written through.

pub mod errors;
pub mod property;
pub mod value;

pub use errors::{CadenceError, Result};
pub use property::{PropertyBag, PropertyNode, PropertyPath, PropertySink};
pub use value::{AnimValue, ValueKind, WeightArray};
