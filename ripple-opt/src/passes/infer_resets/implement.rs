//! Async reset implementation: insert the planned ports, route resets
//! into instances, and rewrite registers into async-reset registers.

use super::InferResets;
use ripple_ir::{
    Builder, Circuit, Direction, Module, ModuleId, OpId, OpKind, Port,
    Type, ValueId, ValueOrigin,
};
use ripple_utils::{Error, GPosIdx, RippleResult};
use std::collections::HashMap;

impl InferResets {
    /// Implement the async resets gathered in the pass' domain registry.
    pub(super) fn implement_async_resets(&mut self, circuit: &mut Circuit) {
        let modules: Vec<ModuleId> = self.domains.keys().copied().collect();
        for mid in modules {
            self.implement_module(circuit, mid);
        }
    }

    /// Implement the async resets for a specific module.
    ///
    /// This will add ports to the module as appropriate, update the
    /// register ops in the module, and update any instantiated submodules
    /// with their corresponding reset implementation details.
    fn implement_module(&mut self, circuit: &mut Circuit, mid: ModuleId) {
        let domain = self
            .domains
            .get(&mid)
            .and_then(|entries| entries.last())
            .expect("every visited module has a domain")
            .0
            .clone();
        log::debug!(
            "Implementing async reset for {}",
            circuit.module(mid).name
        );

        // Nothing to do if the module was marked explicitly with no reset
        // domain.
        let Some(reset) = domain.reset else {
            log::debug!(
                "- Skipping because module explicitly has no domain"
            );
            return;
        };

        // If needed, add a reset port to the module. The local reset is
        // then the new port, or the value the planner picked for reuse.
        let reset_loc =
            circuit.module(reset.module).value_loc(reset.value);
        let module = circuit.module_mut(mid);
        let actual_reset = match domain.new_port_name {
            Some(name) => {
                log::debug!("- Inserted port {name}");
                module.insert_port_at_front(
                    Port::new(name, Direction::Input, Type::AsyncReset)
                        .with_loc(reset_loc),
                )
            }
            None => {
                domain
                    .existing_value
                    .expect("planner filled in the local reset")
                    .value
            }
        };

        // Update the operations in the module.
        let mut delete_ops: Vec<OpId> = Vec::new();
        let mut connects: Vec<(ValueId, ValueId, GPosIdx)> = Vec::new();
        let body: Vec<OpId> = module.body().to_vec();
        for op_id in body {
            self.implement_op(
                circuit,
                mid,
                op_id,
                actual_reset,
                &mut delete_ops,
                &mut connects,
            );
        }

        // Remove the obsolete instances.
        let module = circuit.module_mut(mid);
        for op in delete_ops {
            module.erase_op(op);
        }

        // Add the necessary connects at the end of the module body.
        let mut builder = Builder::at_end(module);
        for (dst, src, loc) in connects {
            builder.add_connect(dst, src, loc);
        }
    }

    /// Modify an operation in a module to implement an async reset for
    /// that module.
    fn implement_op(
        &mut self,
        circuit: &mut Circuit,
        mid: ModuleId,
        op_id: OpId,
        actual_reset: ValueId,
        delete_ops: &mut Vec<OpId>,
        connects: &mut Vec<(ValueId, ValueId, GPosIdx)>,
    ) {
        let kind = circuit.module(mid).op(op_id).kind.clone();
        match kind {
            // Handle instances.
            OpKind::Instance { module: callee_name } => {
                // Look up the reset domain of the instantiated module. If
                // there is no reset domain associated with that module, or
                // the module is explicitly marked as being in no domain,
                // simply skip.
                let Some(callee_id) = circuit.find_module(callee_name)
                else {
                    return;
                };
                let (needs_port, existing_port) = {
                    let Some(entries) = self.domains.get(&callee_id) else {
                        return;
                    };
                    let callee_domain = &entries.last().unwrap().0;
                    if callee_domain.reset.is_none() {
                        return;
                    }
                    (
                        callee_domain.new_port_name.is_some(),
                        callee_domain.existing_port,
                    )
                };
                let inst_loc = circuit.module(mid).op(op_id).loc;

                let inst_reset: Option<ValueId> = if needs_port {
                    // Construct a replacement instance whose result list
                    // prepends the async-reset result, rewire the existing
                    // uses to the offset results, and schedule the old
                    // instance for deletion.
                    let module = circuit.module_mut(mid);
                    let old = module.op(op_id);
                    let name = old.name.unwrap_or_default();
                    let annos = old.annos.clone();
                    let old_results: Vec<ValueId> = old.results.to_vec();
                    let mut result_tys =
                        Vec::with_capacity(old_results.len() + 1);
                    result_tys
                        .push(module.value_type(actual_reset).clone());
                    result_tys.extend(
                        old_results
                            .iter()
                            .map(|r| module.value_type(*r).clone()),
                    );
                    let mut builder = Builder::before(module, op_id);
                    let new_op = builder.add_instance(
                        name,
                        callee_name,
                        result_tys,
                        inst_loc,
                    );
                    module.op_mut(new_op).annos = annos;
                    let new_results: Vec<ValueId> =
                        module.op(new_op).results.to_vec();
                    for (old_r, new_r) in
                        old_results.iter().zip(new_results.iter().skip(1))
                    {
                        module.replace_uses(*old_r, *new_r);
                    }
                    delete_ops.push(op_id);
                    log::debug!("  - Added new result as reset");
                    Some(new_results[0])
                } else {
                    existing_port
                        .map(|idx| circuit.module(mid).op(op_id).results[idx])
                };

                // If there's no reset port on the instance to connect,
                // we're done. This can happen if the instantiated module
                // has a reset domain, but that domain is e.g. rooted at an
                // internal wire.
                let Some(inst_reset) = inst_reset else {
                    return;
                };

                // Connect the instance's reset to the actual reset.
                connects.push((inst_reset, actual_reset, inst_loc));
            }

            // Handle reset-less registers.
            OpKind::Reg { clock } => {
                let module = circuit.module_mut(mid);
                let op = module.op(op_id);
                log::debug!(
                    "- Adding async reset to {}",
                    op.name.unwrap_or_default()
                );
                let name = op.name.expect("registers are named");
                let loc = op.loc;
                let annos = op.annos.clone();
                let old_result = op.result();
                let ty = module.value_type(old_result).clone();

                let mut builder = Builder::before(module, op_id);
                let zero = create_zero_value(&mut builder, &ty, loc);
                let new_result = builder.add_reg_reset(
                    name,
                    ty,
                    clock,
                    actual_reset,
                    zero,
                    loc,
                );
                let ValueOrigin::Result { op: new_op, .. } =
                    module.value(new_result).origin
                else {
                    unreachable!("register result is an op result")
                };
                module.op_mut(new_op).annos = annos;
                module.replace_uses(old_result, new_result);
                delete_ops.push(op_id);
            }

            // Handle registers with reset.
            OpKind::RegReset {
                reset, reset_value, ..
            } => {
                let module = circuit.module_mut(mid);

                // If the register already has an async reset, leave it
                // untouched; only check that it is structurally sound, and
                // keep going through the rest of the module even when it
                // is not.
                if matches!(module.value_type(reset), Type::AsyncReset) {
                    log::debug!("- Skipping (has async reset)");
                    if let Err(err) = verify_reg_reset(module, op_id) {
                        self.diag.err(err);
                    }
                    return;
                }
                log::debug!("- Updating sync reset");

                // The register has a sync reset. In order to add an async
                // reset, move the sync reset into a mux on every drive of
                // the register.
                let target = module.op(op_id).result();
                insert_reset_mux(module, target, reset, reset_value);

                // Replace the existing reset with the async reset.
                let ty = module.value_type(target).clone();
                let loc = module.op(op_id).loc;
                let mut builder = Builder::before(module, op_id);
                let zero = create_zero_value(&mut builder, &ty, loc);
                let OpKind::RegReset {
                    reset, reset_value, ..
                } = &mut module.op_mut(op_id).kind
                else {
                    unreachable!("op kind re-fetch")
                };
                *reset = actual_reset;
                *reset_value = zero;
            }
            _ => {}
        }
    }
}

/// Check that an async-reset register is structurally sound: the reset
/// signal carries a reset type and the reset value agrees with the
/// register's type.
fn verify_reg_reset(module: &Module, op_id: OpId) -> RippleResult<()> {
    let op = module.op(op_id);
    let OpKind::RegReset {
        reset, reset_value, ..
    } = &op.kind
    else {
        unreachable!("verify_reg_reset called on a non-register")
    };
    let name = op.name.unwrap_or_default();
    let reset_ty = module.value_type(*reset);
    if !reset_ty.is_reset() {
        return Err(Error::malformed_structure(format!(
            "register '{}' has reset signal of non-reset type {}",
            name, reset_ty
        ))
        .with_pos(&op.loc));
    }
    let reg_ty = module.value_type(op.result());
    let value_ty = module.value_type(*reset_value);
    if reg_ty != value_ty {
        return Err(Error::malformed_structure(format!(
            "register '{}' reset value type {} does not match register \
             type {}",
            name, value_ty, reg_ty
        ))
        .with_pos(&op.loc));
    }
    Ok(())
}

/// Insert a reset multiplexer into every connect and partial connect that
/// drives `target`, selecting `reset_value` while `reset` is asserted.
/// Looks through subfield, subindex, and subaccess ops, inserting
/// multiplexers into connects to these projections as well, with a
/// matching projection of the reset value. Returns whether `reset_value`
/// was used in any way; unused projections of the reset value are erased
/// again.
fn insert_reset_mux(
    module: &mut Module,
    target: ValueId,
    reset: ValueId,
    reset_value: ValueId,
) -> bool {
    let mut reset_value_used = false;

    for use_op in module.users(target) {
        let kind = module.op(use_op).kind.clone();
        let loc = module.op(use_op).loc;
        match kind {
            // Insert a mux on the value connected to the target:
            // connect(dst, src) -> connect(dst, mux(reset, resetValue, src))
            OpKind::Connect { dest, src }
            | OpKind::PartialConnect { dest, src } => {
                if dest != target {
                    continue;
                }
                log::debug!("  - Inserting mux into drive of the register");
                let mut builder = Builder::before(module, use_op);
                let mux = builder.add_mux(reset, reset_value, src, loc);
                match &mut module.op_mut(use_op).kind {
                    OpKind::Connect { src, .. }
                    | OpKind::PartialConnect { src, .. } => *src = mux,
                    _ => unreachable!("op kind re-fetch"),
                }
                reset_value_used = true;
            }
            // Look through subfields.
            OpKind::Subfield { input, field } => {
                if input != target {
                    continue;
                }
                let mut builder = Builder::before(module, use_op);
                let sub = builder.add_subfield(reset_value, field, loc);
                let inner = module.op(use_op).result();
                if insert_reset_mux(module, inner, reset, sub) {
                    reset_value_used = true;
                } else {
                    erase_value_def(module, sub);
                }
            }
            // Look through subindices.
            OpKind::Subindex { input, index } => {
                if input != target {
                    continue;
                }
                let mut builder = Builder::before(module, use_op);
                let sub = builder.add_subindex(reset_value, index, loc);
                let inner = module.op(use_op).result();
                if insert_reset_mux(module, inner, reset, sub) {
                    reset_value_used = true;
                } else {
                    erase_value_def(module, sub);
                }
            }
            // Look through subaccesses.
            OpKind::Subaccess { input, index } => {
                if input != target {
                    continue;
                }
                let mut builder = Builder::before(module, use_op);
                let sub = builder.add_subaccess(reset_value, index, loc);
                let inner = module.op(use_op).result();
                if insert_reset_mux(module, inner, reset, sub) {
                    reset_value_used = true;
                } else {
                    erase_value_def(module, sub);
                }
            }
            _ => {}
        }
    }
    reset_value_used
}

/// Erase the operation defining a value, for cleaning up speculatively
/// created projections that ended up unused.
fn erase_value_def(module: &mut Module, value: ValueId) {
    if let ValueOrigin::Result { op, .. } = module.value(value).origin {
        module.erase_op(op);
    }
}

/// Construct a zero value of the given type using the given builder.
fn create_zero_value(
    builder: &mut Builder,
    ty: &Type,
    loc: GPosIdx,
) -> ValueId {
    let mut cache = HashMap::new();
    create_zero_value_cached(builder, ty, loc, &mut cache)
}

/// Construct a zero value of the given type using the given builder,
/// caching synthesized zeros within one register rewrite. Aggregates
/// become fresh wires whose leaves are connect-driven from the recursively
/// synthesized leaf zeros; the abstract reset and analog types have no
/// zero and become invalid literals.
fn create_zero_value_cached(
    builder: &mut Builder,
    ty: &Type,
    loc: GPosIdx,
    cache: &mut HashMap<Type, ValueId>,
) -> ValueId {
    if let Some(value) = cache.get(ty) {
        return *value;
    }
    let value = match ty {
        Type::Clock => {
            let bit = create_zero_value_cached(
                builder,
                &Type::SYNC_RESET,
                loc,
                cache,
            );
            builder.add_as_clock(bit, loc)
        }
        Type::AsyncReset => {
            let bit = create_zero_value_cached(
                builder,
                &Type::SYNC_RESET,
                loc,
                cache,
            );
            builder.add_as_async_reset(bit, loc)
        }
        Type::UInt(width) | Type::SInt(width) => {
            // An integer of unknown width defaults to a single-bit zero.
            let const_ty = match (ty, width) {
                (Type::UInt(_), None) => Type::UInt(Some(1)),
                (Type::SInt(_), None) => Type::SInt(Some(1)),
                _ => ty.clone(),
            };
            builder.add_constant(0, const_ty, loc)
        }
        Type::Bundle(fields) => {
            let wire = builder.add_anon_wire(ty.clone(), loc);
            for index in 0..fields.len() {
                let zero = create_zero_value_cached(
                    builder,
                    &fields[index].ty,
                    loc,
                    cache,
                );
                let acc = builder.add_subfield(wire, index, loc);
                builder.add_connect(acc, zero, loc);
            }
            wire
        }
        Type::Vector(elem, len) => {
            let wire = builder.add_anon_wire(ty.clone(), loc);
            let zero = create_zero_value_cached(builder, elem, loc, cache);
            for index in 0..*len {
                let acc = builder.add_subindex(wire, index, loc);
                builder.add_connect(acc, zero, loc);
            }
            wire
        }
        Type::Reset | Type::Analog(_) => {
            builder.add_invalid(ty.clone(), loc)
        }
    };
    cache.insert(ty.clone(), value);
    value
}
