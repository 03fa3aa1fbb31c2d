//! Collection of the reset-domain annotations on each module. The
//! annotations are consumed: recognized classes are removed from the IR
//! whether or not they turn out to be legal.

use super::{
    InferResets, FULL_ASYNC_RESET_ANNOTATION,
    IGNORE_FULL_ASYNC_RESET_ANNOTATION,
};
use ripple_ir::{Circuit, ModuleId, OpKind, ValueId};
use ripple_utils::{Error, GPosIdx, RippleResult};

impl InferResets {
    pub(super) fn collect_annos(
        &mut self,
        circuit: &mut Circuit,
    ) -> RippleResult<()> {
        let modules: Vec<ModuleId> = circuit.module_ids().collect();
        for mid in modules {
            if circuit.module(mid).ext {
                continue;
            }
            self.collect_module_annos(circuit, mid)?;
        }
        Ok(())
    }

    fn collect_module_annos(
        &mut self,
        circuit: &mut Circuit,
        mid: ModuleId,
    ) -> RippleResult<()> {
        let module = circuit.module_mut(mid);
        let module_loc = module.loc;

        // Every recognized annotation and the location of its target, in
        // the order encountered. More than one entry is a conflict.
        // Identical (class, location) pairs collapse into one entry.
        let mut conflicting: Vec<(String, GPosIdx)> = Vec::new();
        let mut record = |list: &mut Vec<(String, GPosIdx)>,
                          class: &str,
                          loc: GPosIdx| {
            let entry = (class.to_string(), loc);
            if !list.contains(&entry) {
                list.push(entry);
            }
        };

        // Consume a possible "ignore" annotation on the module itself,
        // which explicitly assigns it no reset domain.
        let mut ignore = false;
        let mut failure: Option<Error> = None;
        module.annos.retain(|anno| {
            if anno.is_class(IGNORE_FULL_ASYNC_RESET_ANNOTATION) {
                ignore = true;
                record(&mut conflicting, &anno.class, module_loc);
                false
            } else if anno.is_class(FULL_ASYNC_RESET_ANNOTATION) {
                failure.get_or_insert(
                    Error::annotation(
                        "'FullAsyncResetAnnotation' cannot target module; \
                         must target port or wire/node instead",
                    )
                    .with_pos(&module_loc),
                );
                false
            } else {
                true
            }
        });
        if let Some(err) = failure.take() {
            return Err(err);
        }

        // Consume any reset annotations on module ports.
        let mut reset: Option<ValueId> = None;
        let removed = module.drain_port_annos(|anno| {
            anno.is_class(FULL_ASYNC_RESET_ANNOTATION)
                || anno.is_class(IGNORE_FULL_ASYNC_RESET_ANNOTATION)
        });
        for (index, anno) in removed {
            let loc = module.port(index).loc;
            if anno.is_class(FULL_ASYNC_RESET_ANNOTATION) {
                reset = Some(module.port_value(index));
                record(&mut conflicting, &anno.class, loc);
            } else {
                failure.get_or_insert(
                    Error::annotation(
                        "'IgnoreFullAsyncResetAnnotation' cannot target \
                         port; must target module instead",
                    )
                    .with_pos(&loc),
                );
            }
        }
        if let Some(err) = failure.take() {
            return Err(err);
        }

        // Consume any reset annotations on operations in the module body.
        for op_id in module.body().to_vec() {
            let op = module.op_mut(op_id);
            let loc = op.loc;
            let is_decl =
                matches!(op.kind, OpKind::Wire | OpKind::Node { .. });
            let mut matched: Vec<String> = Vec::new();
            op.annos.retain(|anno| {
                if anno.is_class(FULL_ASYNC_RESET_ANNOTATION)
                    || anno.is_class(IGNORE_FULL_ASYNC_RESET_ANNOTATION)
                {
                    matched.push(anno.class.clone());
                    false
                } else {
                    true
                }
            });
            for class in matched {
                if !is_decl {
                    // Reset annotations must target wire/node ops.
                    failure.get_or_insert(
                        Error::annotation(
                            "reset annotations must target module, port, \
                             or wire/node",
                        )
                        .with_pos(&loc),
                    );
                } else if class == FULL_ASYNC_RESET_ANNOTATION {
                    reset = Some(module.op(op_id).result());
                    record(&mut conflicting, &class, loc);
                } else {
                    failure.get_or_insert(
                        Error::annotation(
                            "'IgnoreFullAsyncResetAnnotation' cannot \
                             target wire/node; must target module instead",
                        )
                        .with_pos(&loc),
                    );
                }
            }
        }
        if let Some(err) = failure.take() {
            return Err(err);
        }

        // If we have found no annotations, there is nothing to do. We just
        // leave this module unannotated, which will cause it to inherit a
        // reset domain from its instantiation sites.
        if !ignore && reset.is_none() {
            log::debug!("No reset annotation for {}", module.name);
            return Ok(());
        }

        // If we have found multiple annotations, emit an error and abort.
        if conflicting.len() > 1 {
            let mut err = Error::annotation(format!(
                "multiple reset annotations on module '{}'",
                module.name
            ))
            .with_pos(&module_loc);
            for (class, loc) in conflicting {
                err = err.with_note(loc, format!("Conflicting {}:", class));
            }
            return Err(err);
        }

        // Store the annotated reset for this module. `None` records an
        // explicit opt-out of every reset domain.
        self.annotated_resets.insert(mid, reset);
        Ok(())
    }
}
