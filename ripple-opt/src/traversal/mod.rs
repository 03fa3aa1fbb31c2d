//! Helpers for defining and running circuit passes.
mod diagnostics;
mod visitor;

pub use diagnostics::{DiagnosticContext, DiagnosticPass, DiagnosticResult};
pub use visitor::{ConstructVisitor, Named, Visitor};
