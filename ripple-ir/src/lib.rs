//! Internal representation for the Ripple compiler.
//!
//! The IR is a FIRRTL-flavored hardware representation: a circuit of
//! modules, each with typed ports and a body of operations in program
//! order. Storage is arena-based; modules, operations, and values are
//! addressed by integer handles rather than pointers.

mod annotation;
mod builder;
mod circuit;
mod field_ref;
mod idx;
mod module;
mod printer;
mod structure;
mod types;

pub use annotation::Annotation;
pub use builder::Builder;
pub use circuit::{Circuit, ModuleId};
pub use field_ref::{FieldRef, ValueRef};
pub use idx::{IndexRef, IndexedMap};
pub use module::{Module, ValueData, ValueOrigin};
pub use printer::Printer;
pub use structure::{Direction, Op, OpId, OpKind, Port, ValueId};
pub use types::{BundleField, Type};

// Re-export types from the utility crate.
pub use ripple_utils::{GetName, Id};
