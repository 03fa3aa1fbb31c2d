//! Accumulated diagnostics for passes that keep going after a failure,
//! like the reset implementer, which records a malformed register but
//! still visits the rest of the module.

use ripple_utils::{Error, MultiError, RippleResult};

/// A pass that reports its failures through a [DiagnosticContext] instead
/// of aborting on the first one.
pub trait DiagnosticPass {
    /// Return the diagnostics gathered by this pass.
    fn diagnostics(&self) -> &DiagnosticContext;
}

/// An ordered accumulator for errors and warnings.
#[derive(Default, Debug)]
pub struct DiagnosticContext {
    errors: Vec<Error>,
    warnings: Vec<Error>,
}

impl DiagnosticContext {
    /// Report an error.
    pub fn err(&mut self, error: Error) {
        self.errors.push(error);
    }

    /// Report a warning.
    pub fn warning(&mut self, warning: Error) {
        self.warnings.push(warning)
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors_iter(&self) -> impl Iterator<Item = &Error> {
        self.errors.iter()
    }

    pub fn warning_iter(&self) -> impl Iterator<Item = &Error> {
        self.warnings.iter()
    }

    /// The reported errors bundled for the caller, or `None` when the run
    /// was clean.
    pub fn collected(&self) -> Option<MultiError> {
        if self.errors.is_empty() {
            None
        } else {
            Some(MultiError::from(self.errors.clone()))
        }
    }
}

/// Accumulate the error in a [`Result`] type into the [`DiagnosticContext`].
pub trait DiagnosticResult {
    fn accumulate_err(self, diag: &mut DiagnosticContext) -> Self;
}

impl<T> DiagnosticResult for RippleResult<T>
where
    T: Default,
{
    fn accumulate_err(self, diag: &mut DiagnosticContext) -> Self {
        match self {
            Ok(act) => Ok(act),
            Err(err) => {
                diag.err(err);
                Ok(T::default())
            }
        }
    }
}
