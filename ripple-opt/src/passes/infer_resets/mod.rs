//! Infer concrete reset types and insert full async resets.
//!
//! This pass replaces abstract `Reset` types in the IR with a concrete
//! `AsyncReset` or `UInt<1>` depending on how the reset is used, and adds
//! async resets to registers in modules belonging to a reset domain marked
//! with the corresponding `FullAsyncResetAnnotation`. On a high level, the
//! pass operates as follows:
//!
//! 1. Build a global view of the resets in the design by tracing reset
//!    signals through connects and instance ports into a [ResetMap]. This
//!    groups the values of the IR into networks that are somehow attached
//!    together and must therefore share a single reset type.
//!
//! 2. Infer the type of each network from the concrete types connected to
//!    it, declaring the network sync (`UInt<1>`) or async (`AsyncReset`).
//!    A network that is never driven with a concrete type is an error.
//!
//! 3. Update the types of ports, wires, and registers with the inferred
//!    types, and re-infer every operation whose result type follows from
//!    its operands. After this step no abstract `Reset` remains.
//!
//! 4. Collect the reset-domain annotations of every module. A module either
//!    names a port or wire/node as its async reset root, opts out of reset
//!    domains entirely, or inherits a domain from its instantiation sites.
//!
//! 5. Propagate domains down the instance hierarchy. A module must end up
//!    in exactly one domain; conflicting inherited domains are an error.
//!
//! 6. Plan, per module, whether the domain's reset can be reused directly,
//!    whether an existing port serves as the reset, or whether a new port
//!    has to be created (possibly under a uniquified name).
//!
//! 7. Apply the plan: insert ports, rewire instances and wire their resets
//!    up, and rewrite every register to an async-reset register with a
//!    synthesized zero reset value. Registers that already have an async
//!    reset are left untouched.

mod annos;
mod domains;
mod implement;
mod infer;
mod reset_map;
mod trace;
mod update;

pub use reset_map::{ResetKind, ResetMap};

use crate::traversal::{
    DiagnosticContext, DiagnosticPass, Named, Visitor,
};
use linked_hash_map::LinkedHashMap;
use ripple_ir::{Circuit, Id, ModuleId, OpId, ValueId, ValueRef};
use ripple_utils::RippleResult;
use std::collections::HashMap;

/// Annotation that marks a reset (port or wire/node) and its domain.
pub const FULL_ASYNC_RESET_ANNOTATION: &str =
    "sifive.enterprise.firrtl.FullAsyncResetAnnotation";

/// Annotation that marks a module as not belonging to any reset domain.
pub const IGNORE_FULL_ASYNC_RESET_ANNOTATION: &str =
    "sifive.enterprise.firrtl.IgnoreFullAsyncResetAnnotation";

/// A reset domain.
#[derive(Clone, Debug)]
pub struct ResetDomain {
    /// Whether this module is the root of the reset domain.
    pub is_top: bool,
    /// The reset signal for this domain. `None` indicates that this domain
    /// explicitly has no reset.
    pub reset: Option<ValueRef>,

    // Implementation details for this domain, filled in by the planner.
    /// Local value to reuse as the reset.
    pub existing_value: Option<ValueRef>,
    /// Port index of `existing_value`, when it is a port.
    pub existing_port: Option<usize>,
    /// Name of the reset port to create, when one is needed.
    pub new_port_name: Option<Id>,
}

impl ResetDomain {
    pub fn new(reset: Option<ValueRef>) -> Self {
        Self {
            is_top: false,
            reset,
            existing_value: None,
            existing_port: None,
            new_port_name: None,
        }
    }
}

/// Two domains are the same domain when they are rooted at the same place
/// and share the same reset signal; the planner fields are derived.
impl PartialEq for ResetDomain {
    fn eq(&self, other: &Self) -> bool {
        self.is_top == other.is_top && self.reset == other.reset
    }
}
impl Eq for ResetDomain {}

/// An absolute instance path: `(instantiating module, instance op)` pairs
/// from the top module downward.
pub type InstancePath = Vec<(ModuleId, OpId)>;

/// Infer concrete reset types and insert full async resets. See the
/// [module documentation](self) for an overview.
pub struct InferResets {
    /// All traced reset networks in the circuit.
    reset_map: ResetMap,
    /// The annotated reset for a module. `None` indicates that the module
    /// is explicitly annotated with "ignore". Otherwise the port/wire/node
    /// annotated as reset within the module is stored.
    annotated_resets: HashMap<ModuleId, Option<ValueId>>,
    /// The reset domain for a module. In case of conflicting domain
    /// membership, the entry for a module contains multiple elements.
    domains: LinkedHashMap<ModuleId, Vec<(ResetDomain, InstancePath)>>,
    /// Failures that do not abort the traversal, e.g. a register that
    /// already has a malformed async reset.
    diag: DiagnosticContext,
}

impl Named for InferResets {
    fn name() -> &'static str {
        "infer-resets"
    }

    fn description() -> &'static str {
        "infer reset types and implement full async reset domains"
    }
}

impl DiagnosticPass for InferResets {
    fn diagnostics(&self) -> &DiagnosticContext {
        &self.diag
    }
}

impl crate::traversal::ConstructVisitor for InferResets {
    fn from(_circuit: &Circuit) -> RippleResult<Self> {
        Ok(InferResets {
            reset_map: ResetMap::default(),
            annotated_resets: HashMap::new(),
            domains: LinkedHashMap::new(),
            diag: DiagnosticContext::default(),
        })
    }

    fn clear_data(&mut self) {
        // The diagnostics survive so callers can report them after the run.
        self.reset_map.clear();
        self.annotated_resets.clear();
        self.domains.clear();
    }
}

impl Visitor for InferResets {
    fn run(&mut self, circuit: &mut Circuit) -> RippleResult<()> {
        // Trace the uninferred reset networks throughout the design.
        log::debug!("===----- Tracing uninferred resets -----===");
        self.trace_resets(circuit);

        // Infer the type of the traced resets.
        log::debug!("===----- Infer reset types -----===");
        self.infer_resets(circuit)?;

        // Update the IR with the inferred reset types.
        log::debug!("===----- Update reset types -----===");
        self.update_resets(circuit);

        // Gather the reset annotations throughout the modules.
        log::debug!("===----- Gather async reset annotations -----===");
        self.collect_annos(circuit)?;

        // Build the reset domains in the design.
        log::debug!("===----- Build async reset domains -----===");
        self.build_domains(circuit)?;
        if self.diag.has_errors() {
            // Domain conflicts were reported; nothing sound to implement.
            return Ok(());
        }

        // Determine how each reset shall be implemented.
        log::debug!("===----- Determine implementation -----===");
        self.determine_impl(circuit);

        // Implement the async resets.
        log::debug!("===----- Implement async resets -----===");
        self.implement_async_resets(circuit);

        Ok(())
    }
}
