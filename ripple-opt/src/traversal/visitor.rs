//! Traits implemented by circuit passes. Passes are invoked on an
//! [`ir::Circuit`] and transform it in place.

use ripple_ir as ir;
use ripple_utils::RippleResult;

/// Trait that describes named things. Calling [`do_pass`](Visitor::do_pass)
/// and [`do_pass_default`](Visitor::do_pass_default) requires this to be
/// implemented.
///
/// This has to be a separate trait from [`Visitor`] because these methods
/// don't receive `self` which means that it is impossible to create dynamic
/// trait objects.
pub trait Named {
    /// The name of a pass. Is used for identifying passes.
    fn name() -> &'static str;
    /// A short description of the pass.
    fn description() -> &'static str;
}

/// Trait defining method that can be used to construct a Visitor from an
/// [ir::Circuit].
/// This is useful when a pass needs to construct information using the
/// circuit *before* visiting it.
///
/// For passes that don't need to use the circuit, this trait can
/// automatically be derived from [Default].
pub trait ConstructVisitor {
    /// Construct the visitor using information from the circuit.
    fn from(circuit: &ir::Circuit) -> RippleResult<Self>
    where
        Self: Sized;

    /// Clear the data stored in the visitor so it can be reused on another
    /// circuit. Called by [Visitor::do_pass] after the traversal.
    fn clear_data(&mut self);
}

/// Derive ConstructVisitor when [Default] is provided for a visitor.
impl<T: Default + Sized + Visitor> ConstructVisitor for T {
    fn from(_circuit: &ir::Circuit) -> RippleResult<Self> {
        Ok(T::default())
    }

    fn clear_data(&mut self) {
        *self = T::default();
    }
}

/// The interface for a circuit transformation.
pub trait Visitor {
    /// Precondition for this pass to run on the circuit. If this function
    /// returns None, the pass triggers. Otherwise it aborts and logs the
    /// string as the reason.
    fn precondition(_circuit: &ir::Circuit) -> Option<String>
    where
        Self: Sized,
    {
        None
    }

    /// Transform the circuit.
    fn run(&mut self, circuit: &mut ir::Circuit) -> RippleResult<()>;

    /// Run the visitor on a given circuit after checking the precondition,
    /// then call [ConstructVisitor::clear_data] to reset the analysis state.
    fn do_pass(&mut self, circuit: &mut ir::Circuit) -> RippleResult<()>
    where
        Self: Sized + ConstructVisitor + Named,
    {
        if let Some(msg) = Self::precondition(&*circuit) {
            log::info!("Skipping `{}': {msg}", Self::name());
            return Ok(());
        }
        self.run(circuit)?;
        self.clear_data();
        Ok(())
    }

    /// Build a [Default] implementation of this pass and call
    /// [Visitor::do_pass] using it.
    fn do_pass_default(circuit: &mut ir::Circuit) -> RippleResult<Self>
    where
        Self: ConstructVisitor + Sized + Named,
    {
        let mut visitor = Self::from(&*circuit)?;
        visitor.do_pass(circuit)?;
        Ok(visitor)
    }
}
