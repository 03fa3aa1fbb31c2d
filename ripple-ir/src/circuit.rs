//! The top-level circuit: a collection of modules with a designated top.

use crate::{idx::IndexedMap, impl_index, Module};
use ripple_utils::Id;

/// Handle to a module inside a [Circuit].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct ModuleId(u32);
impl_index!(ModuleId);

pub struct Circuit {
    modules: IndexedMap<ModuleId, Module>,
    /// Name of the top module.
    pub top: Id,
}

impl Circuit {
    pub fn new<S: Into<Id>>(top: S) -> Self {
        Self {
            modules: IndexedMap::new(),
            top: top.into(),
        }
    }

    pub fn add_module(&mut self, module: Module) -> ModuleId {
        self.modules.push(module)
    }

    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id]
    }

    pub fn module_mut(&mut self, id: ModuleId) -> &mut Module {
        &mut self.modules[id]
    }

    pub fn modules(&self) -> impl Iterator<Item = (ModuleId, &Module)> + '_ {
        self.modules.iter()
    }

    pub fn module_ids(&self) -> impl Iterator<Item = ModuleId> + '_ {
        self.modules.keys()
    }

    pub fn find_module(&self, name: Id) -> Option<ModuleId> {
        self.modules
            .iter()
            .find(|(_, m)| m.name == name)
            .map(|(id, _)| id)
    }

    /// The top module, if it exists and is implemented.
    pub fn top_module(&self) -> Option<ModuleId> {
        self.find_module(self.top)
            .filter(|id| !self.modules[*id].ext)
    }
}
