//! Deterministic text dump of a circuit. Used by debugging and by tests
//! that compare circuits structurally (e.g. idempotence of passes).

use crate::{
    Circuit, IndexRef, Module, Op, OpKind, ValueId, ValueOrigin,
};
use itertools::Itertools;
use std::fmt::Write;

pub struct Printer;

impl Printer {
    pub fn print(circuit: &Circuit) -> String {
        let mut out = String::new();
        writeln!(out, "circuit {} :", circuit.top).unwrap();
        for (_, module) in circuit.modules() {
            Self::write_module(module, &mut out);
        }
        out
    }

    fn write_module(module: &Module, out: &mut String) {
        let kind = if module.ext { "extmodule" } else { "module" };
        writeln!(
            out,
            "  {} {}{} :",
            kind,
            module.name,
            Self::annos(&module.annos)
        )
        .unwrap();
        for port in module.ports() {
            writeln!(
                out,
                "    {} {} : {}{}",
                port.direction,
                port.name,
                port.ty,
                Self::annos(&port.annos)
            )
            .unwrap();
        }
        for op in module.body() {
            Self::write_op(module, module.op(*op), out);
        }
    }

    fn write_op(module: &Module, op: &Op, out: &mut String) {
        let v = |value: &ValueId| Self::token(module, *value);
        let line = match &op.kind {
            OpKind::Wire => {
                format!(
                    "wire {} : {}",
                    v(&op.result()),
                    module.value_type(op.result())
                )
            }
            OpKind::Node { input } => {
                format!("node {} = {}", v(&op.result()), v(input))
            }
            OpKind::Reg { clock } => format!(
                "reg {} : {}, {}",
                v(&op.result()),
                module.value_type(op.result()),
                v(clock)
            ),
            OpKind::RegReset {
                clock,
                reset,
                reset_value,
            } => format!(
                "regreset {} : {}, {}, {}, {}",
                v(&op.result()),
                module.value_type(op.result()),
                v(clock),
                v(reset),
                v(reset_value)
            ),
            OpKind::Instance { module: callee } => format!(
                "inst {} of {} : ({})",
                op.name.unwrap_or_default(),
                callee,
                op.results
                    .iter()
                    .map(|r| module.value_type(*r).to_string())
                    .join(", ")
            ),
            OpKind::Invalid => format!(
                "{} = invalid : {}",
                v(&op.result()),
                module.value_type(op.result())
            ),
            OpKind::Constant { value } => format!(
                "{} = const {} : {}",
                v(&op.result()),
                value,
                module.value_type(op.result())
            ),
            OpKind::Subfield { input, field } => format!(
                "{} = subfield {}, {}",
                v(&op.result()),
                v(input),
                field
            ),
            OpKind::Subindex { input, index } => format!(
                "{} = subindex {}, {}",
                v(&op.result()),
                v(input),
                index
            ),
            OpKind::Subaccess { input, index } => format!(
                "{} = subaccess {}, {}",
                v(&op.result()),
                v(input),
                v(index)
            ),
            OpKind::Mux { sel, high, low } => format!(
                "{} = mux({}, {}, {})",
                v(&op.result()),
                v(sel),
                v(high),
                v(low)
            ),
            OpKind::AsClock { input } => {
                format!("{} = asClock({})", v(&op.result()), v(input))
            }
            OpKind::AsAsyncReset { input } => {
                format!("{} = asAsyncReset({})", v(&op.result()), v(input))
            }
            OpKind::Connect { dest, src } => {
                format!("connect {}, {}", v(dest), v(src))
            }
            OpKind::PartialConnect { dest, src } => {
                format!("partialconnect {}, {}", v(dest), v(src))
            }
        };
        writeln!(out, "    {}{}", line, Self::annos(&op.annos)).unwrap();
    }

    /// A printable token for a value: the declared name where one exists
    /// and is unambiguous, a `%N` placeholder otherwise.
    fn token(module: &Module, value: ValueId) -> String {
        match module.value(value).origin {
            ValueOrigin::Port(index) => module.port(index).name.to_string(),
            ValueOrigin::Result { op, .. } => {
                let op = module.op(op);
                match op.name {
                    Some(name) if op.results.len() == 1 => name.to_string(),
                    _ => format!("%{}", value.index()),
                }
            }
        }
    }

    fn annos(annos: &[crate::Annotation]) -> String {
        if annos.is_empty() {
            String::new()
        } else {
            format!(
                " {{{}}}",
                annos.iter().map(|a| a.class.as_str()).join(", ")
            )
        }
    }
}
