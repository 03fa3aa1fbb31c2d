//! Domain construction and planning: propagate reset domains down the
//! instance hierarchy, report conflicts, and decide per module how its
//! reset shall be implemented.

use super::{InferResets, InstancePath, ResetDomain};
use crate::analysis::InstanceGraph;
use itertools::Itertools;
use ripple_ir::{Circuit, ModuleId, ValueOrigin, ValueRef};
use ripple_utils::{Error, RippleResult};

impl InferResets {
    /// Gather the reset domains present in a circuit. This traverses the
    /// instance hierarchy of the design, making instances either live in a
    /// new reset domain if so annotated, or inherit their parent's domain.
    /// This can go wrong in some cases, mainly when a module is
    /// instantiated multiple times within different reset domains.
    pub(super) fn build_domains(
        &mut self,
        circuit: &Circuit,
    ) -> RippleResult<()> {
        let inst_graph = InstanceGraph::new(circuit)?;
        let Some(top) = circuit.top_module() else {
            log::debug!(
                "Skipping circuit because the main module is not \
                 implemented"
            );
            return Ok(());
        };
        let mut path = InstancePath::new();
        self.build_domains_rec(circuit, &inst_graph, top, &mut path, None);

        // Report any domain conflicts among the modules.
        for (mid, entries) in self.domains.iter() {
            if entries.len() <= 1 {
                continue;
            }
            let module = circuit.module(*mid);
            let mut err = Error::domain(format!(
                "module '{}' instantiated in different reset domains",
                module.name
            ))
            .with_pos(&module.loc);
            let mut printed_resets: Vec<ValueRef> = Vec::new();
            for (domain, inst_path) in entries {
                let loc = match inst_path.last() {
                    Some((parent, op)) => circuit.module(*parent).op(*op).loc,
                    None => module.loc,
                };

                // Describe the instance itself.
                let mut note = if inst_path.is_empty() {
                    "Root instance".to_string()
                } else {
                    format!(
                        "Instance '{}'",
                        inst_path
                            .iter()
                            .map(|(parent, op)| {
                                circuit
                                    .module(*parent)
                                    .op(*op)
                                    .name
                                    .unwrap_or_default()
                            })
                            .join("/")
                    )
                };

                // Describe the reset domain the instance is in.
                match domain.reset {
                    Some(reset) => {
                        let reset_module = circuit.module(reset.module);
                        let name = reset_module
                            .value_name(reset.value)
                            .unwrap_or_default();
                        note += &format!(
                            " is in reset domain rooted at '{}' of module \
                             '{}'",
                            name, reset_module.name
                        );
                        err = err.with_note(loc, note);

                        // Show where the domain reset is declared (once
                        // per reset).
                        if !printed_resets.contains(&reset) {
                            printed_resets.push(reset);
                            err = err.with_note(
                                reset_module.value_loc(reset.value),
                                format!(
                                    "Reset domain '{}' of module '{}' \
                                     declared here:",
                                    name, reset_module.name
                                ),
                            );
                        }
                    }
                    None => {
                        note += " is in no reset domain";
                        err = err.with_note(loc, note);
                    }
                }
            }
            self.diag.err(err);
        }
        Ok(())
    }

    fn build_domains_rec(
        &mut self,
        circuit: &Circuit,
        inst_graph: &InstanceGraph,
        module: ModuleId,
        path: &mut InstancePath,
        parent_reset: Option<ValueRef>,
    ) {
        log::debug!(
            "Visiting {} ({})",
            path.last()
                .map(|(parent, op)| circuit
                    .module(*parent)
                    .op(*op)
                    .name
                    .unwrap_or_default()
                    .to_string())
                .unwrap_or_else(|| "$root".to_string()),
            circuit.module(module).name
        );

        // Assemble the domain for this module.
        let mut domain = ResetDomain::new(parent_reset);
        if let Some(anno) = self.annotated_resets.get(&module) {
            domain.is_top = true;
            domain.reset = anno.map(|v| ValueRef::new(module, v));
        }

        // Associate the domain with this module. If the module already has
        // an associated domain, it must be identical. Otherwise we'll have
        // to report the conflicting domains to the user.
        let entries = self.domains.entry(module).or_insert_with(Vec::new);
        if entries.iter().all(|(d, _)| *d != domain) {
            entries.push((domain.clone(), path.clone()));
        }

        // Traverse the child instances.
        for (op, callee) in inst_graph.instances_of(module) {
            if circuit.module(callee).ext {
                continue;
            }
            path.push((module, op));
            self.build_domains_rec(
                circuit,
                inst_graph,
                callee,
                path,
                domain.reset,
            );
            path.pop();
        }
    }

    /// Determine how the reset for each module shall be implemented,
    /// filling in the planner fields of every module's surviving domain.
    pub(super) fn determine_impl(&mut self, circuit: &Circuit) {
        let modules: Vec<ModuleId> = self.domains.keys().copied().collect();
        for mid in modules {
            let domain = self
                .domains
                .get(&mid)
                .and_then(|entries| entries.last())
                .expect("every visited module has a domain")
                .0
                .clone();
            let planned = self.plan_module(circuit, mid, domain);
            self.domains.get_mut(&mid).unwrap().last_mut().unwrap().0 =
                planned;
        }
    }

    /// Determine how the reset for a module shall be implemented. This
    /// fills in the `existing_value`, `existing_port`, and `new_port_name`
    /// fields of the given reset domain.
    ///
    /// Generally it does the following:
    /// - If the domain has explicitly no reset ("ignore"), leaves
    ///   everything empty.
    /// - If the domain is the place where the reset is defined ("top"),
    ///   fills in the existing port/wire/node as reset.
    /// - If the module already has a port with the reset's name:
    ///   - If the type matches, reuses that port.
    ///   - Otherwise appends a `_N` suffix with increasing N to create a
    ///     yet-unused port name, and marks that as to be created.
    /// - Otherwise indicates that a port with the reset's name should be
    ///   created.
    fn plan_module(
        &self,
        circuit: &Circuit,
        mid: ModuleId,
        mut domain: ResetDomain,
    ) -> ResetDomain {
        // Nothing to do if the module needs no reset.
        let Some(reset) = domain.reset else {
            return domain;
        };
        log::debug!(
            "Planning reset for {}",
            circuit.module(mid).name
        );

        // If this is the root of a reset domain, we don't need to add any
        // ports and can just simply reuse the existing value.
        if domain.is_top {
            domain.existing_value = Some(reset);
            let reset_module = circuit.module(reset.module);
            if let ValueOrigin::Port(index) =
                reset_module.value(reset.value).origin
            {
                domain.existing_port = Some(index);
            }
            return domain;
        }

        // Otherwise, check if a port with this name and type already
        // exists and reuse that where possible.
        let reset_module = circuit.module(reset.module);
        let needed_name =
            reset_module.value_name(reset.value).unwrap_or_default();
        let needed_ty = reset_module.value_type(reset.value).clone();
        let module = circuit.module(mid);
        let existing = module
            .ports()
            .iter()
            .position(|port| port.name == needed_name);
        if let Some(index) = existing {
            if module.port(index).ty == needed_ty {
                log::debug!("- Reusing existing port {needed_name}");
                domain.existing_value =
                    Some(ValueRef::new(mid, module.port_value(index)));
                domain.existing_port = Some(index);
                return domain;
            }

            // We have found a port but the types don't match; pick a new
            // name for the reset port instead of failing, since we can
            // just insert a fresh reset signal as needed.
            let mut suffix = 0;
            let new_name = loop {
                let candidate = needed_name.with_suffix(suffix);
                if module.ports().iter().all(|p| p.name != candidate) {
                    break candidate;
                }
                suffix += 1;
            };
            log::debug!("- Creating uniquified port {new_name}");
            domain.new_port_name = Some(new_name);
            return domain;
        }

        // At this point we know that there is no such port, and we can
        // safely create one as needed.
        log::debug!("- Creating new port {needed_name}");
        domain.new_port_name = Some(needed_name);
        domain
    }
}
