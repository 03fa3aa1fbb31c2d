//! Reset inference: decide, per network, whether the reset is sync or
//! async, based on the concrete types connected to the network.

use super::reset_map::{NetIdx, ResetKind};
use super::InferResets;
use ripple_ir::{Circuit, FieldRef, OpKind, Type, ValueOrigin};
use ripple_utils::{Error, GPosIdx, RippleResult};

impl InferResets {
    pub(super) fn infer_resets(
        &mut self,
        circuit: &Circuit,
    ) -> RippleResult<()> {
        for net in self.reset_map.nets() {
            self.infer_reset(circuit, net)?;
        }
        Ok(())
    }

    fn infer_reset(
        &mut self,
        circuit: &Circuit,
        net_idx: NetIdx,
    ) -> RippleResult<()> {
        let net = self.reset_map.net(net_idx);
        log::debug!(
            "Inferring reset network with {} nodes",
            net.nodes.len()
        );

        // Go through the nodes and tally the votes for each concrete kind.
        let mut async_drives = 0usize;
        let mut sync_drives = 0usize;
        let mut invalid_drives = 0usize;
        for node_idx in &net.nodes {
            let node = self.reset_map.node(*node_idx);

            // Ensure that we're actually dealing with a reset type. A node
            // is always involved in at least one drive, so there is always
            // a drive location to attribute the error to.
            if !node.ty.is_reset() {
                for drive in &net.drives {
                    if drive.dst == *node_idx {
                        return Err(Error::reset_typing(format!(
                            "reset network drives a non-reset type {}",
                            node.ty
                        ))
                        .with_pos(&drive.loc));
                    }
                    if drive.src == *node_idx {
                        return Err(Error::reset_typing(format!(
                            "reset network driven with non-reset type {}",
                            node.ty
                        ))
                        .with_pos(&drive.loc));
                    }
                }
                unreachable!(
                    "a node is always involved in at least one drive"
                );
            }

            // Track whether this node votes for async or sync.
            match &node.ty {
                Type::AsyncReset => async_drives += 1,
                Type::UInt(_) => sync_drives += 1,
                _ => {
                    if is_invalid(circuit, node.value) {
                        invalid_drives += 1;
                    }
                }
            }
        }
        log::debug!(
            "- Found {async_drives} async, {sync_drives} sync, \
             {invalid_drives} invalid drives"
        );

        // Handle the case where we have no votes for either kind.
        if async_drives == 0 && sync_drives == 0 && invalid_drives == 0 {
            let root = self.reset_map.guess_root(net_idx);
            return Err(Error::reset_typing(
                "reset network never driven with concrete type",
            )
            .with_pos(&value_loc(circuit, root)));
        }

        // Handle the case where we have votes for both kinds.
        if async_drives > 0 && sync_drives > 0 {
            let root = self.reset_map.guess_root(net_idx);
            let root_loc = value_loc(circuit, root);
            let majority_async = async_drives >= sync_drives;
            let mut err = Error::reset_typing(
                "reset network simultaneously connected to async and sync \
                 resets",
            )
            .with_pos(&root_loc)
            .with_note(
                root_loc,
                format!(
                    "Did you intend for the reset to be {}?",
                    if majority_async { "async" } else { "sync" }
                ),
            );
            let net = self.reset_map.net(net_idx);
            for drive in &net.drives {
                let dst_ty = &self.reset_map.node(drive.dst).ty;
                let src_ty = &self.reset_map.node(drive.src).ty;
                let is_async = |ty: &Type| matches!(ty, Type::AsyncReset);
                let is_sync = |ty: &Type| matches!(ty, Type::UInt(_));
                if (is_async(dst_ty) && !majority_async)
                    || (is_async(src_ty) && !majority_async)
                    || (is_sync(dst_ty) && majority_async)
                    || (is_sync(src_ty) && majority_async)
                {
                    err = err.with_note(
                        drive.loc,
                        format!(
                            "Offending {} drive here:",
                            if majority_async { "sync" } else { "async" }
                        ),
                    );
                }
            }
            return Err(err);
        }

        // At this point we know that the type of the reset is unambiguous.
        // If there are any votes for async, we make the reset async.
        // Otherwise we make it sync.
        let kind = if async_drives > 0 {
            ResetKind::Async
        } else {
            ResetKind::Sync
        };
        self.reset_map.net_mut(net_idx).kind = kind;
        log::debug!("- Inferred as {kind}");
        Ok(())
    }
}

/// Whether a field's root value is defined by an invalid-literal op.
fn is_invalid(circuit: &Circuit, field: FieldRef) -> bool {
    let module = circuit.module(field.value.module);
    match module.value(field.value.value).origin {
        ValueOrigin::Result { op, .. } => {
            matches!(module.op(op).kind, OpKind::Invalid)
        }
        ValueOrigin::Port(_) => false,
    }
}

/// The location of the declaration defining a field's root value.
fn value_loc(circuit: &Circuit, field: FieldRef) -> GPosIdx {
    circuit.module(field.value.module).value_loc(field.value.value)
}
