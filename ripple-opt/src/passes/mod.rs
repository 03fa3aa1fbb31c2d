//! Passes over the circuit.
mod infer_resets;

pub use infer_resets::{
    InferResets, ResetDomain, ResetKind, FULL_ASYNC_RESET_ANNOTATION,
    IGNORE_FULL_ASYNC_RESET_ANNOTATION,
};
