//! Modules: ports, a value arena, and an ordered operation body.

use crate::{
    idx::IndexedMap, Annotation, Op, OpId, OpKind, Port, Type, ValueId,
};
use ripple_utils::{GPosIdx, GetName, Id};
use smallvec::SmallVec;
use std::collections::HashMap;

/// Where a value comes from.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ValueOrigin {
    /// The value of the `index`-th module port.
    Port(usize),
    /// The `index`-th result of an operation.
    Result { op: OpId, index: usize },
}

/// A value defined in a module, together with its current type.
#[derive(Clone, Debug)]
pub struct ValueData {
    pub origin: ValueOrigin,
    pub ty: Type,
}

/// A hardware module. An implemented module has a body of operations in
/// program order; an external module only has a signature.
#[derive(Clone, Debug)]
pub struct Module {
    pub name: Id,
    /// External modules have no body and are skipped by analyses.
    pub ext: bool,
    ports: Vec<Port>,
    port_values: Vec<ValueId>,
    values: IndexedMap<ValueId, ValueData>,
    ops: IndexedMap<OpId, Op>,
    body: Vec<OpId>,
    pub annos: Vec<Annotation>,
    pub loc: GPosIdx,
}

impl Module {
    pub fn new(name: Id) -> Self {
        Self {
            name,
            ext: false,
            ports: Vec::new(),
            port_values: Vec::new(),
            values: IndexedMap::new(),
            ops: IndexedMap::new(),
            body: Vec::new(),
            annos: Vec::new(),
            loc: GPosIdx::UNKNOWN,
        }
    }

    pub fn new_ext(name: Id) -> Self {
        Self {
            ext: true,
            ..Self::new(name)
        }
    }

    /* ============================= Ports ================================ */

    /// Append a port and return its value.
    pub fn add_port(&mut self, port: Port) -> ValueId {
        let index = self.ports.len();
        let value = self.values.push(ValueData {
            origin: ValueOrigin::Port(index),
            ty: port.ty.clone(),
        });
        self.ports.push(port);
        self.port_values.push(value);
        value
    }

    /// Insert a port at argument index 0, shifting every other port up by
    /// one, and return its value.
    pub fn insert_port_at_front(&mut self, port: Port) -> ValueId {
        let value = self.values.push(ValueData {
            origin: ValueOrigin::Port(0),
            ty: port.ty.clone(),
        });
        self.ports.insert(0, port);
        self.port_values.insert(0, value);
        // Re-anchor the origin index of every port value.
        for (index, v) in self.port_values.iter().enumerate() {
            self.values[*v].origin = ValueOrigin::Port(index);
        }
        value
    }

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub fn port(&self, index: usize) -> &Port {
        &self.ports[index]
    }

    pub fn port_value(&self, index: usize) -> ValueId {
        self.port_values[index]
    }

    pub fn port_values(&self) -> &[ValueId] {
        &self.port_values
    }

    /// Consume and return annotations from every port for which `f` returns
    /// true, pairing each removed annotation with its port index.
    pub fn drain_port_annos<F>(&mut self, mut f: F) -> Vec<(usize, Annotation)>
    where
        F: FnMut(&Annotation) -> bool,
    {
        let mut removed = Vec::new();
        for (index, port) in self.ports.iter_mut().enumerate() {
            port.annos.retain(|anno| {
                if f(anno) {
                    removed.push((index, anno.clone()));
                    false
                } else {
                    true
                }
            });
        }
        removed
    }

    /// Rebuild the signature from the current types of the port values.
    pub fn sync_signature(&mut self) {
        for (index, v) in self.port_values.iter().enumerate() {
            self.ports[index].ty = self.values[*v].ty.clone();
        }
    }

    /* ============================= Values =============================== */

    pub fn value(&self, v: ValueId) -> &ValueData {
        &self.values[v]
    }

    pub fn value_type(&self, v: ValueId) -> &Type {
        &self.values[v].ty
    }

    pub fn set_value_type(&mut self, v: ValueId, ty: Type) {
        self.values[v].ty = ty;
    }

    /// The declared name of a value: the port name for port values, the
    /// declaration name for results of named operations.
    pub fn value_name(&self, v: ValueId) -> Option<Id> {
        match self.values[v].origin {
            ValueOrigin::Port(index) => Some(self.ports[index].name),
            ValueOrigin::Result { op, .. } => self.ops[op].name,
        }
    }

    /// The source location of the declaration that defines a value.
    pub fn value_loc(&self, v: ValueId) -> GPosIdx {
        match self.values[v].origin {
            ValueOrigin::Port(index) => self.ports[index].loc,
            ValueOrigin::Result { op, .. } => self.ops[op].loc,
        }
    }

    /* ============================ Operations ============================ */

    /// Allocate an operation and its result values without placing it in
    /// the body. Callers insert it through [Module::body_insert].
    pub fn make_op(
        &mut self,
        kind: OpKind,
        name: Option<Id>,
        loc: GPosIdx,
        annos: Vec<Annotation>,
        result_tys: Vec<Type>,
    ) -> OpId {
        let op = self.ops.push(Op {
            kind,
            name,
            results: SmallVec::new(),
            loc,
            annos,
        });
        for (index, ty) in result_tys.into_iter().enumerate() {
            let value = self.values.push(ValueData {
                origin: ValueOrigin::Result { op, index },
                ty,
            });
            self.ops[op].results.push(value);
        }
        op
    }

    pub fn op(&self, op: OpId) -> &Op {
        &self.ops[op]
    }

    pub fn op_mut(&mut self, op: OpId) -> &mut Op {
        &mut self.ops[op]
    }

    /// The operations of this module in program order.
    pub fn body(&self) -> &[OpId] {
        &self.body
    }

    pub fn body_insert(&mut self, index: usize, op: OpId) {
        self.body.insert(index, op);
    }

    pub fn body_push(&mut self, op: OpId) {
        self.body.push(op);
    }

    /// The current body position of an operation.
    pub fn body_position(&self, op: OpId) -> Option<usize> {
        self.body.iter().position(|o| *o == op)
    }

    /// Remove an operation from the body. Its arena slot and result values
    /// stay allocated but become unreachable.
    pub fn erase_op(&mut self, op: OpId) {
        self.body.retain(|o| *o != op);
    }

    /* ============================== Uses ================================ */

    /// Rewire every use of `old` to `new`.
    pub fn replace_uses(&mut self, old: ValueId, new: ValueId) {
        for i in 0..self.body.len() {
            let op = self.body[i];
            for operand in self.ops[op].operands_mut() {
                if *operand == old {
                    *operand = new;
                }
            }
        }
    }

    /// The operations that read `v`, in body order.
    pub fn users(&self, v: ValueId) -> Vec<OpId> {
        self.body
            .iter()
            .copied()
            .filter(|op| self.ops[*op].operands().contains(&v))
            .collect()
    }

    /// Build a map from every value to the operations reading it.
    pub fn use_map(&self) -> HashMap<ValueId, Vec<OpId>> {
        let mut map: HashMap<ValueId, Vec<OpId>> = HashMap::new();
        for op in &self.body {
            for operand in self.ops[*op].operands() {
                map.entry(operand).or_default().push(*op);
            }
        }
        map
    }
}

impl GetName for Module {
    fn name(&self) -> Id {
        self.name
    }
}
