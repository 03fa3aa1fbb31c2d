//! Interned identifiers for circuit names.
//!
//! Names repeat throughout a circuit: every instance carries its callee's
//! port names, and routing a reset down the hierarchy copies one name
//! through every module on the path. Identifiers are therefore interned
//! process-wide; an [Id] is a copyable handle and equality is a pointer
//! comparison.

pub type GSym = symbol_table::GlobalSymbol;

/// An interned identifier: a module, port, wire, register, or instance
/// name.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(GSym);

impl Id {
    pub fn new<S: AsRef<str>>(name: S) -> Self {
        Id(GSym::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &'static str {
        self.0.as_str()
    }

    /// Derive `name_n` from `name`: the shape used to uniquify a reset
    /// port name against a module's existing ports.
    pub fn with_suffix(&self, n: usize) -> Id {
        Id::new(format!("{}_{}", self.as_str(), n))
    }
}

impl Default for Id {
    fn default() -> Self {
        Id::new("")
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Debug for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl From<&str> for Id {
    fn from(name: &str) -> Self {
        Id::new(name)
    }
}

impl From<String> for Id {
    fn from(name: String) -> Self {
        Id::new(name)
    }
}

// Comparisons against plain strings read the interned text instead of
// interning the other side, so probing candidate names does not grow the
// symbol table.
impl PartialEq<str> for Id {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}
impl PartialEq<&str> for Id {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}
impl PartialEq<String> for Id {
    fn eq(&self, other: &String) -> bool {
        self.as_str() == other
    }
}

/// A trait representing something in the IR that has a name.
pub trait GetName {
    /// Return a reference to the object's name
    fn name(&self) -> Id;
}
