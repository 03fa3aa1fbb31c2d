//! Reset updating: push the inferred concrete types into the IR.

use super::reset_map::{NetIdx, ResetKind};
use super::InferResets;
use ripple_ir::{
    Circuit, IndexRef, Module, ModuleId, OpId, OpKind, Type, ValueId,
    ValueOrigin,
};
use std::collections::{HashMap, HashSet};

impl InferResets {
    pub(super) fn update_resets(&mut self, circuit: &mut Circuit) {
        // Use maps stay valid for the whole phase: only types change here,
        // never the structure of any module body.
        let use_maps: Vec<HashMap<ValueId, Vec<OpId>>> = circuit
            .module_ids()
            .map(|m| circuit.module(m).use_map())
            .collect();
        for net in self.reset_map.nets() {
            self.update_net(circuit, &use_maps, net);
        }
    }

    fn update_net(
        &mut self,
        circuit: &mut Circuit,
        use_maps: &[HashMap<ValueId, Vec<OpId>>],
        net_idx: NetIdx,
    ) {
        let net = self.reset_map.net(net_idx);
        debug_assert!(
            net.kind != ResetKind::Uninferred,
            "all reset nets should be inferred at this point"
        );
        log::debug!(
            "Updating reset network with {} nodes to {}",
            net.nodes.len(),
            net.kind
        );

        // Determine the final type the reset should have.
        let reset_ty = match net.kind {
            ResetKind::Async => Type::AsyncReset,
            _ => Type::SYNC_RESET,
        };

        // Update all those values in the network that cannot be inferred
        // from operands. If we change the type of a module port, remember
        // the module since we need to resync its signature.
        let fields: Vec<_> = net
            .nodes
            .iter()
            .map(|n| self.reset_map.node(*n).value)
            .collect();
        let mut worklist = Worklist::default();
        let mut module_worklist: HashSet<ModuleId> = HashSet::new();
        for field in fields {
            let mid = field.value.module;
            let module = circuit.module_mut(mid);
            let origin = module.value(field.value.value).origin;
            let settable = match origin {
                ValueOrigin::Port(_) => true,
                ValueOrigin::Result { op, .. } => matches!(
                    module.op(op).kind,
                    OpKind::Wire
                        | OpKind::Node { .. }
                        | OpKind::Reg { .. }
                        | OpKind::RegReset { .. }
                        | OpKind::Instance { .. }
                        | OpKind::Invalid
                ),
            };
            if !settable {
                continue;
            }
            if update_leaf(module, field.value.value, field.field_id, &reset_ty)
            {
                for user in users(use_maps, mid, field.value.value) {
                    worklist.insert((mid, user));
                }
                if matches!(origin, ValueOrigin::Port(_)) {
                    module_worklist.insert(mid);
                }
            }
        }

        // Re-infer the result types of every operation depending on a
        // changed value, rippling further changes to their users.
        while let Some((mid, op_id)) = worklist.pop() {
            let module = circuit.module_mut(mid);
            let Some(new_tys) = inferred_result_types(module, op_id) else {
                continue;
            };
            let results = module.op(op_id).results.clone();
            debug_assert_eq!(results.len(), new_tys.len());
            for (result, new_ty) in results.iter().zip(new_tys) {
                if module.value_type(*result) == &new_ty {
                    continue;
                }
                module.set_value_type(*result, new_ty);
                for user in users(use_maps, mid, *result) {
                    worklist.insert((mid, user));
                }
            }
        }

        // Resync module signatures with the updated port types.
        let mut changed: Vec<_> = module_worklist.into_iter().collect();
        changed.sort();
        for mid in changed {
            circuit.module_mut(mid).sync_signature();
            log::debug!(
                "- Updated signature of module '{}'",
                circuit.module(mid).name
            );
        }
    }
}

/// Update the type of a single field of a value. Returns whether the type
/// actually changed.
fn update_leaf(
    module: &mut Module,
    value: ValueId,
    field_id: u32,
    reset_ty: &Type,
) -> bool {
    let old = module.value_type(value);
    let new = old.with_leaf(field_id, reset_ty.clone());
    if *old == new {
        return false;
    }
    module.set_value_type(value, new);
    true
}

/// The result types of an operation as implied by its operands, for the
/// operations that support type inference.
fn inferred_result_types(module: &Module, op_id: OpId) -> Option<Vec<Type>> {
    let op = module.op(op_id);
    let ty = |v: &ValueId| module.value_type(*v).clone();
    match &op.kind {
        OpKind::Node { input } => Some(vec![ty(input)]),
        OpKind::Subfield { input, field } => {
            let Type::Bundle(fields) = module.value_type(*input) else {
                return None;
            };
            Some(vec![fields[*field].ty.clone()])
        }
        OpKind::Subindex { input, .. } | OpKind::Subaccess { input, .. } => {
            let Type::Vector(elem, _) = module.value_type(*input) else {
                return None;
            };
            Some(vec![(**elem).clone()])
        }
        OpKind::Mux { high, .. } => Some(vec![ty(high)]),
        OpKind::AsClock { .. } => Some(vec![Type::Clock]),
        OpKind::AsAsyncReset { .. } => Some(vec![Type::AsyncReset]),
        _ => None,
    }
}

fn users(
    use_maps: &[HashMap<ValueId, Vec<OpId>>],
    mid: ModuleId,
    value: ValueId,
) -> Vec<OpId> {
    use_maps[mid.index()]
        .get(&value)
        .cloned()
        .unwrap_or_default()
}

/// A LIFO worklist with set semantics: an entry already queued is not
/// queued twice, but may be re-queued after it has been popped.
#[derive(Default)]
struct Worklist {
    stack: Vec<(ModuleId, OpId)>,
    queued: HashSet<(ModuleId, OpId)>,
}

impl Worklist {
    fn insert(&mut self, entry: (ModuleId, OpId)) {
        if self.queued.insert(entry) {
            self.stack.push(entry);
        }
    }

    fn pop(&mut self) -> Option<(ModuleId, OpId)> {
        let entry = self.stack.pop()?;
        self.queued.remove(&entry);
        Some(entry)
    }
}
