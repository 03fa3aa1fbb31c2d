//! IR builder. Maintains an insertion point inside a module body and
//! constructs operations with their result values.

use crate::{Module, OpId, OpKind, Type, ValueId};
use ripple_utils::{GPosIdx, Id};

pub struct Builder<'a> {
    module: &'a mut Module,
    /// Body index at which the next operation is inserted.
    point: usize,
}

impl<'a> Builder<'a> {
    /// Build at the end of the module body.
    pub fn at_end(module: &'a mut Module) -> Self {
        let point = module.body().len();
        Self { module, point }
    }

    /// Build immediately before an existing operation.
    pub fn before(module: &'a mut Module, op: OpId) -> Self {
        let point = module
            .body_position(op)
            .expect("insertion anchor is not in the body");
        Self { module, point }
    }

    pub fn set_insertion_before(&mut self, op: OpId) {
        self.point = self
            .module
            .body_position(op)
            .expect("insertion anchor is not in the body");
    }

    pub fn module(&mut self) -> &mut Module {
        self.module
    }

    fn insert(
        &mut self,
        kind: OpKind,
        name: Option<Id>,
        loc: GPosIdx,
        result_tys: Vec<Type>,
    ) -> OpId {
        let op = self.module.make_op(kind, name, loc, Vec::new(), result_tys);
        self.module.body_insert(self.point, op);
        self.point += 1;
        op
    }

    /* ========================== Declarations ============================ */

    pub fn add_wire(&mut self, name: Id, ty: Type, loc: GPosIdx) -> ValueId {
        let op = self.insert(OpKind::Wire, Some(name), loc, vec![ty]);
        self.module.op(op).result()
    }

    /// A wire without a declared name, for synthesized values.
    pub fn add_anon_wire(&mut self, ty: Type, loc: GPosIdx) -> ValueId {
        let op = self.insert(OpKind::Wire, None, loc, vec![ty]);
        self.module.op(op).result()
    }

    pub fn add_node(
        &mut self,
        name: Id,
        input: ValueId,
        loc: GPosIdx,
    ) -> ValueId {
        let ty = self.module.value_type(input).clone();
        let op = self.insert(OpKind::Node { input }, Some(name), loc, vec![ty]);
        self.module.op(op).result()
    }

    pub fn add_reg(
        &mut self,
        name: Id,
        ty: Type,
        clock: ValueId,
        loc: GPosIdx,
    ) -> ValueId {
        let op = self.insert(OpKind::Reg { clock }, Some(name), loc, vec![ty]);
        self.module.op(op).result()
    }

    pub fn add_reg_reset(
        &mut self,
        name: Id,
        ty: Type,
        clock: ValueId,
        reset: ValueId,
        reset_value: ValueId,
        loc: GPosIdx,
    ) -> ValueId {
        let op = self.insert(
            OpKind::RegReset {
                clock,
                reset,
                reset_value,
            },
            Some(name),
            loc,
            vec![ty],
        );
        self.module.op(op).result()
    }

    /// Instantiate a module. `port_tys` must be the instantiated module's
    /// port types in port order; the instance defines one result per port.
    pub fn add_instance(
        &mut self,
        name: Id,
        module: Id,
        port_tys: Vec<Type>,
        loc: GPosIdx,
    ) -> OpId {
        self.insert(OpKind::Instance { module }, Some(name), loc, port_tys)
    }

    /* ========================== Expressions ============================= */

    pub fn add_invalid(&mut self, ty: Type, loc: GPosIdx) -> ValueId {
        let op = self.insert(OpKind::Invalid, None, loc, vec![ty]);
        self.module.op(op).result()
    }

    pub fn add_constant(
        &mut self,
        value: u64,
        ty: Type,
        loc: GPosIdx,
    ) -> ValueId {
        let op = self.insert(OpKind::Constant { value }, None, loc, vec![ty]);
        self.module.op(op).result()
    }

    pub fn add_subfield(
        &mut self,
        input: ValueId,
        field: usize,
        loc: GPosIdx,
    ) -> ValueId {
        let Type::Bundle(fields) = self.module.value_type(input) else {
            panic!("subfield of non-bundle value")
        };
        let ty = fields[field].ty.clone();
        let op =
            self.insert(OpKind::Subfield { input, field }, None, loc, vec![ty]);
        self.module.op(op).result()
    }

    pub fn add_subindex(
        &mut self,
        input: ValueId,
        index: usize,
        loc: GPosIdx,
    ) -> ValueId {
        let Type::Vector(elem, _) = self.module.value_type(input) else {
            panic!("subindex of non-vector value")
        };
        let ty = (**elem).clone();
        let op =
            self.insert(OpKind::Subindex { input, index }, None, loc, vec![ty]);
        self.module.op(op).result()
    }

    pub fn add_subaccess(
        &mut self,
        input: ValueId,
        index: ValueId,
        loc: GPosIdx,
    ) -> ValueId {
        let Type::Vector(elem, _) = self.module.value_type(input) else {
            panic!("subaccess of non-vector value")
        };
        let ty = (**elem).clone();
        let op = self
            .insert(OpKind::Subaccess { input, index }, None, loc, vec![ty]);
        self.module.op(op).result()
    }

    pub fn add_mux(
        &mut self,
        sel: ValueId,
        high: ValueId,
        low: ValueId,
        loc: GPosIdx,
    ) -> ValueId {
        let ty = self.module.value_type(high).clone();
        let op =
            self.insert(OpKind::Mux { sel, high, low }, None, loc, vec![ty]);
        self.module.op(op).result()
    }

    pub fn add_as_clock(&mut self, input: ValueId, loc: GPosIdx) -> ValueId {
        let op = self.insert(
            OpKind::AsClock { input },
            None,
            loc,
            vec![Type::Clock],
        );
        self.module.op(op).result()
    }

    pub fn add_as_async_reset(
        &mut self,
        input: ValueId,
        loc: GPosIdx,
    ) -> ValueId {
        let op = self.insert(
            OpKind::AsAsyncReset { input },
            None,
            loc,
            vec![Type::AsyncReset],
        );
        self.module.op(op).result()
    }

    /* =========================== Statements ============================= */

    pub fn add_connect(
        &mut self,
        dest: ValueId,
        src: ValueId,
        loc: GPosIdx,
    ) -> OpId {
        self.insert(OpKind::Connect { dest, src }, None, loc, vec![])
    }

    pub fn add_partial_connect(
        &mut self,
        dest: ValueId,
        src: ValueId,
        loc: GPosIdx,
    ) -> OpId {
        self.insert(OpKind::PartialConnect { dest, src }, None, loc, vec![])
    }
}
