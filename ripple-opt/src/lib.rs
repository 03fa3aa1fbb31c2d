//! Passes over the Ripple IR.
//!
//! This crate contains the pass framework ([traversal]), circuit analyses
//! ([analysis]), the passes themselves ([passes]), and the [PassManager]
//! used to register and run them.

pub mod analysis;
mod pass_manager;
pub mod passes;
pub mod traversal;

pub use pass_manager::{PassManager, PassResult};
