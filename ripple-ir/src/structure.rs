//! Operations, ports, and the values they define.

use crate::{impl_index, Annotation, Type};
use ripple_utils::{GPosIdx, Id, WithPos};
use smallvec::{smallvec, SmallVec};

/// Handle to a value inside a [`Module`](crate::Module): a port or an
/// operation result.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct ValueId(u32);
impl_index!(ValueId);

/// Handle to an operation inside a [`Module`](crate::Module).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct OpId(u32);
impl_index!(OpId);

/// Direction of a module port.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Direction {
    Input,
    Output,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Input => write!(f, "input"),
            Direction::Output => write!(f, "output"),
        }
    }
}

/// A module port. The type recorded here is the module's signature; it is
/// kept in sync with the type of the port's value.
#[derive(Clone, Debug)]
pub struct Port {
    pub name: Id,
    pub direction: Direction,
    pub ty: Type,
    pub loc: GPosIdx,
    pub annos: Vec<Annotation>,
}

impl Port {
    pub fn new(name: Id, direction: Direction, ty: Type) -> Self {
        Self {
            name,
            direction,
            ty,
            loc: GPosIdx::UNKNOWN,
            annos: Vec::new(),
        }
    }

    pub fn with_loc(mut self, loc: GPosIdx) -> Self {
        self.loc = loc;
        self
    }

    pub fn with_annos(mut self, annos: Vec<Annotation>) -> Self {
        self.annos = annos;
        self
    }
}

impl WithPos for Port {
    fn copy_span(&self) -> GPosIdx {
        self.loc
    }
}

/// An operation in a module body.
#[derive(Clone, Debug)]
pub struct Op {
    pub kind: OpKind,
    /// Declaration name, for wires, nodes, registers, and instances.
    pub name: Option<Id>,
    /// The values this operation defines. Instances define one value per
    /// port of the instantiated module; connects define none.
    pub results: SmallVec<[ValueId; 1]>,
    pub loc: GPosIdx,
    pub annos: Vec<Annotation>,
}

#[derive(Clone, Debug)]
pub enum OpKind {
    /// A named stateless connection point.
    Wire,
    /// A named alias for an already-computed value.
    Node { input: ValueId },
    /// A register without a reset.
    Reg { clock: ValueId },
    /// A register with a reset signal and reset value.
    RegReset {
        clock: ValueId,
        reset: ValueId,
        reset_value: ValueId,
    },
    /// An instantiation of another module; results are the instance-side
    /// views of the instantiated module's ports, in port order.
    Instance { module: Id },
    /// A value that is never driven.
    Invalid,
    /// An integer constant. The width comes from the result type.
    Constant { value: u64 },
    /// Projection of a bundle field, by field index.
    Subfield { input: ValueId, field: usize },
    /// Projection of a vector element, by constant index.
    Subindex { input: ValueId, index: usize },
    /// Projection of a vector element, by dynamic index.
    Subaccess { input: ValueId, index: ValueId },
    /// Two-way multiplexer.
    Mux {
        sel: ValueId,
        high: ValueId,
        low: ValueId,
    },
    /// Reinterpret a one-bit value as a clock.
    AsClock { input: ValueId },
    /// Reinterpret a one-bit value as an async reset.
    AsAsyncReset { input: ValueId },
    /// Drive `dest` from `src`, pairing aggregate leaves structurally.
    Connect { dest: ValueId, src: ValueId },
    /// Drive `dest` from `src`, pairing bundle fields by name and
    /// tolerating fields missing on either side.
    PartialConnect { dest: ValueId, src: ValueId },
}

impl Op {
    /// The single result of this operation. Panics for operations that do
    /// not define exactly one value.
    pub fn result(&self) -> ValueId {
        debug_assert_eq!(self.results.len(), 1);
        self.results[0]
    }

    /// The values this operation reads.
    pub fn operands(&self) -> SmallVec<[ValueId; 3]> {
        match &self.kind {
            OpKind::Wire
            | OpKind::Instance { .. }
            | OpKind::Invalid
            | OpKind::Constant { .. } => smallvec![],
            OpKind::Node { input }
            | OpKind::Reg { clock: input }
            | OpKind::Subfield { input, .. }
            | OpKind::Subindex { input, .. }
            | OpKind::AsClock { input }
            | OpKind::AsAsyncReset { input } => smallvec![*input],
            OpKind::Subaccess { input, index } => smallvec![*input, *index],
            OpKind::RegReset {
                clock,
                reset,
                reset_value,
            } => smallvec![*clock, *reset, *reset_value],
            OpKind::Mux { sel, high, low } => smallvec![*sel, *high, *low],
            OpKind::Connect { dest, src }
            | OpKind::PartialConnect { dest, src } => smallvec![*dest, *src],
        }
    }

    /// Mutable access to the values this operation reads, for rewiring.
    pub fn operands_mut(&mut self) -> SmallVec<[&mut ValueId; 3]> {
        match &mut self.kind {
            OpKind::Wire
            | OpKind::Instance { .. }
            | OpKind::Invalid
            | OpKind::Constant { .. } => smallvec![],
            OpKind::Node { input }
            | OpKind::Reg { clock: input }
            | OpKind::Subfield { input, .. }
            | OpKind::Subindex { input, .. }
            | OpKind::AsClock { input }
            | OpKind::AsAsyncReset { input } => smallvec![input],
            OpKind::Subaccess { input, index } => smallvec![input, index],
            OpKind::RegReset {
                clock,
                reset,
                reset_value,
            } => smallvec![clock, reset, reset_value],
            OpKind::Mux { sel, high, low } => smallvec![sel, high, low],
            OpKind::Connect { dest, src }
            | OpKind::PartialConnect { dest, src } => smallvec![dest, src],
        }
    }

    /// Whether this is a projection (subfield, subindex, or subaccess).
    pub fn is_projection(&self) -> bool {
        matches!(
            self.kind,
            OpKind::Subfield { .. }
                | OpKind::Subindex { .. }
                | OpKind::Subaccess { .. }
        )
    }
}

impl WithPos for Op {
    fn copy_span(&self) -> GPosIdx {
        self.loc
    }
}
