//! Define the PassManager structure that is used to construct and run
//! passes.
use crate::traversal;
use ripple_ir as ir;
use ripple_utils::{Error, MultiError};
use std::collections::HashMap;
use std::time::Instant;

pub type PassResult<T> = std::result::Result<T, MultiError>;

/// Top-level type for all passes that transform an [ir::Circuit]
pub type PassClosure = Box<dyn Fn(&mut ir::Circuit) -> PassResult<()>>;

/// Structure that tracks all registered passes for the compiler.
#[derive(Default)]
pub struct PassManager {
    /// All registered passes
    passes: HashMap<String, PassClosure>,
    // Track the help information for passes
    help: HashMap<String, String>,
}

impl PassManager {
    /// Register a new pass and return an error if another pass with the
    /// same name has already been registered.
    pub fn register_pass<Pass>(&mut self) -> PassResult<()>
    where
        Pass: traversal::Visitor
            + traversal::ConstructVisitor
            + traversal::Named,
    {
        self.register_generic_pass::<Pass>(Box::new(|circuit| {
            Pass::do_pass_default(circuit)?;
            Ok(())
        }))
    }

    /// Registers a diagnostic pass as a normal pass. If there is an error,
    /// this will report every error gathered by the pass.
    pub fn register_diagnostic<Pass>(&mut self) -> PassResult<()>
    where
        Pass: traversal::Visitor
            + traversal::ConstructVisitor
            + traversal::Named
            + traversal::DiagnosticPass,
    {
        self.register_generic_pass::<Pass>(Box::new(|circuit| {
            let mut visitor = Pass::from(circuit)?;
            visitor.do_pass(circuit)?;

            if let Some(errors) = visitor.diagnostics().collected() {
                Err(errors)
            } else {
                // only show warnings, if there are no errors
                visitor.diagnostics().warning_iter().for_each(
                    |warning| log::warn!(target: Pass::name(), "{warning:?}"),
                );
                Ok(())
            }
        }))
    }

    fn register_generic_pass<Pass>(
        &mut self,
        pass_closure: PassClosure,
    ) -> PassResult<()>
    where
        Pass: traversal::Visitor
            + traversal::ConstructVisitor
            + traversal::Named,
    {
        let name = Pass::name().to_string();
        if self.passes.contains_key(&name) {
            return Err(Error::misc(format!(
                "Pass with name '{}' is already registered.",
                name
            ))
            .into());
        }
        self.passes.insert(name.clone(), pass_closure);
        let help = format!("- {}: {}", name, Pass::description());
        self.help.insert(name, help);
        Ok(())
    }

    /// Return the help string for the registered passes.
    pub fn complete_help(&self) -> String {
        let mut names: Vec<_> = self.help.keys().collect();
        names.sort();
        names
            .into_iter()
            .map(|pass| self.help[pass].as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Run the passes in `plan`, in order, against the circuit.
    pub fn execute_plan(
        &self,
        circuit: &mut ir::Circuit,
        plan: &[String],
    ) -> PassResult<()> {
        for name in plan {
            let pass = self.passes.get(name).ok_or_else(|| {
                Error::misc(format!("Unknown pass: {}", name))
            })?;
            let start = Instant::now();
            pass(circuit)?;
            log::info!("{name}: {}ms", start.elapsed().as_millis());
        }
        Ok(())
    }
}
