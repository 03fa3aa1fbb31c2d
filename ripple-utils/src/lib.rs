//! Shared utilities for the Ripple compiler.
mod errors;
mod id;
mod position;

pub use errors::{Error, MultiError, Note, RippleResult};
pub use id::{GSym, GetName, Id};
pub use position::{
    FileIdx, GPosIdx, GlobalPositionTable, PosIdx, WithPos,
};
