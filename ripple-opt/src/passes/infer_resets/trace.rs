//! Reset tracing: walk every connect, partial connect, and instance in the
//! circuit and register an equivalence in the reset map for each ground
//! leaf involving the abstract reset type.

use super::InferResets;
use ripple_ir::{
    Circuit, Direction, FieldRef, ModuleId, OpId, OpKind, Type, ValueId,
    ValueOrigin, ValueRef,
};
use ripple_utils::GPosIdx;

impl InferResets {
    /// Iterate over the circuit and follow all signals with the abstract
    /// reset type, aggregating them into reset nets. After this function
    /// returns, the reset map is populated with the reset networks in the
    /// circuit, alongside information on drivers and their types that
    /// contribute to the reset.
    pub(super) fn trace_resets(&mut self, circuit: &Circuit) {
        for (mid, module) in circuit.modules() {
            if module.ext {
                continue;
            }
            for op_id in module.body() {
                let op = module.op(*op_id);
                match &op.kind {
                    OpKind::Connect { dest, src }
                    | OpKind::PartialConnect { dest, src } => self
                        .trace_connect(circuit, mid, *dest, *src, op.loc),
                    OpKind::Instance { .. } => {
                        self.trace_instance(circuit, mid, *op_id)
                    }
                    _ => {}
                }
            }
        }
    }

    /// Trace reset signals through an instance. This essentially associates
    /// the instance's port values with the target module's port values.
    fn trace_instance(
        &mut self,
        circuit: &Circuit,
        mid: ModuleId,
        op_id: OpId,
    ) {
        let module = circuit.module(mid);
        let op = module.op(op_id);
        let OpKind::Instance { module: callee_name } = &op.kind else {
            unreachable!("trace_instance called on a non-instance")
        };
        // Nothing to do if the instantiated module is external or missing.
        let Some(callee_id) = circuit.find_module(*callee_name) else {
            return;
        };
        let callee = circuit.module(callee_id);
        if callee.ext {
            return;
        }
        log::debug!("Visiting instance {}", op.name.unwrap_or_default());

        // Establish a connection between the instance ports and module
        // ports, directed the way the data flows: into the module for
        // input ports, out of it for output ports.
        for (index, result) in op.results.iter().enumerate() {
            let module_side = (callee_id, callee.port_value(index));
            let inst_side = (mid, *result);
            let (dst, src) = match callee.port(index).direction {
                Direction::Input => (module_side, inst_side),
                Direction::Output => (inst_side, module_side),
            };
            self.trace_values(circuit, dst, src, op.loc);
        }
    }

    /// Analyze a connect or partial connect of one (possibly aggregate)
    /// value to another.
    fn trace_connect(
        &mut self,
        circuit: &Circuit,
        mid: ModuleId,
        dest: ValueId,
        src: ValueId,
        loc: GPosIdx,
    ) {
        self.trace_values(circuit, (mid, dest), (mid, src), loc);
    }

    /// Record the drives between two (possibly aggregate, possibly
    /// projected) values. Each endpoint is first rebased onto the root of
    /// its projection chain, then the two types are walked structurally
    /// and each ground leaf involving the abstract reset is recorded.
    fn trace_values(
        &mut self,
        circuit: &Circuit,
        dst: (ModuleId, ValueId),
        src: (ModuleId, ValueId),
        loc: GPosIdx,
    ) {
        let (dst_root, dst_id, dst_ty) = resolve_root(circuit, dst.0, dst.1);
        let (src_root, src_id, src_ty) = resolve_root(circuit, src.0, src.1);
        self.trace_type(
            &dst_ty, dst_root, dst_id, &src_ty, src_root, src_id, loc,
        );
    }

    /// Walk a destination type structurally against the source type,
    /// recording a drive for each ground leaf where either side carries
    /// the abstract reset type. Bundle fields pair by name; destination
    /// fields absent on the source are skipped; a flipped field reverses
    /// the direction of the drive. Vector elements collapse onto the
    /// element's shared leaves, which deliberately over-approximates the
    /// equivalence classes: unrelated resets in one vector are forced to
    /// share a type, exactly as aggregate type inference will force their
    /// element types to agree.
    #[allow(clippy::too_many_arguments)]
    fn trace_type(
        &mut self,
        dst_ty: &Type,
        dst: ValueRef,
        dst_id: u32,
        src_ty: &Type,
        src: ValueRef,
        src_id: u32,
        loc: GPosIdx,
    ) {
        match dst_ty {
            Type::Bundle(dst_fields) => {
                let Type::Bundle(src_fields) = src_ty else {
                    return;
                };
                for (dst_idx, dst_field) in dst_fields.iter().enumerate() {
                    let Some(src_idx) = src_fields
                        .iter()
                        .position(|f| f.name == dst_field.name)
                    else {
                        continue;
                    };
                    let src_field = &src_fields[src_idx];
                    let dst_off = dst_id + dst_ty.field_offset(dst_idx);
                    let src_off = src_id + src_ty.field_offset(src_idx);
                    if dst_field.flip {
                        self.trace_type(
                            &src_field.ty,
                            src,
                            src_off,
                            &dst_field.ty,
                            dst,
                            dst_off,
                            loc,
                        );
                    } else {
                        self.trace_type(
                            &dst_field.ty,
                            dst,
                            dst_off,
                            &src_field.ty,
                            src,
                            src_off,
                            loc,
                        );
                    }
                }
            }
            Type::Vector(dst_elem, _) => {
                let Type::Vector(src_elem, _) = src_ty else {
                    return;
                };
                // All elements share the leaves of element 0.
                self.trace_type(
                    dst_elem, dst, dst_id, src_elem, src, src_id, loc,
                );
            }
            _ => {
                if matches!(dst_ty, Type::Reset)
                    || matches!(src_ty, Type::Reset)
                {
                    self.reset_map.add(
                        FieldRef::new(dst, dst_id),
                        dst_ty,
                        FieldRef::new(src, src_id),
                        src_ty,
                        loc,
                    );
                }
            }
        }
    }
}

/// Rebase a value onto the root of its projection chain. Returns the root
/// value, the accumulated leaf offset of the projected slice within the
/// root's type, and the (narrow) type of the original value. Subfields add
/// the field's leaf offset; subindex and subaccess add nothing since all
/// vector elements share the element's leaves.
fn resolve_root(
    circuit: &Circuit,
    mid: ModuleId,
    value: ValueId,
) -> (ValueRef, u32, Type) {
    let module = circuit.module(mid);
    let ty = module.value_type(value).clone();
    let mut value = value;
    let mut offset = 0;
    loop {
        let ValueOrigin::Result { op, .. } = module.value(value).origin
        else {
            break;
        };
        match &module.op(op).kind {
            OpKind::Subfield { input, field } => {
                offset += module.value_type(*input).field_offset(*field);
                value = *input;
            }
            OpKind::Subindex { input, .. }
            | OpKind::Subaccess { input, .. } => {
                value = *input;
            }
            _ => break,
        }
    }
    (ValueRef::new(mid, value), offset, ty)
}
