//! End-to-end tests for the infer-resets pass, driving it over circuits
//! built through the IR builder.

use ripple_ir::{
    Annotation, Builder, BundleField, Circuit, Direction, Module, Op, OpId,
    OpKind, Port, Printer, Type, ValueId, ValueOrigin,
};
use ripple_opt::passes::{
    InferResets, FULL_ASYNC_RESET_ANNOTATION,
    IGNORE_FULL_ASYNC_RESET_ANNOTATION,
};
use ripple_opt::traversal::{ConstructVisitor, DiagnosticPass, Visitor};
use ripple_utils::{GPosIdx, GlobalPositionTable, MultiError};

const L: GPosIdx = GPosIdx::UNKNOWN;

fn uint(width: u64) -> Type {
    Type::UInt(Some(width))
}

/// Run the pass the way the pass manager's diagnostic registration does:
/// a hard error aborts, otherwise the accumulated diagnostics decide.
fn run_pass(circuit: &mut Circuit) -> Result<(), MultiError> {
    let mut pass = <InferResets as ConstructVisitor>::from(circuit)
        .expect("pass construction is infallible");
    pass.run(circuit).map_err(MultiError::from)?;
    match pass.diagnostics().collected() {
        Some(errors) => Err(errors),
        None => Ok(()),
    }
}

fn expect_err(circuit: &mut Circuit, fragment: &str) -> MultiError {
    let err = run_pass(circuit)
        .expect_err("expected the pass to fail");
    assert!(
        err.errors()
            .iter()
            .any(|e| e.message().contains(fragment)),
        "no error mentions {fragment:?}: {err:?}"
    );
    err
}

/// The operation defining a value.
fn def_op(module: &Module, value: ValueId) -> OpId {
    match module.value(value).origin {
        ValueOrigin::Result { op, .. } => op,
        ValueOrigin::Port(_) => panic!("value is a port"),
    }
}

/// Find the unique operation with the given declaration name.
fn named_op<'a>(module: &'a Module, name: &str) -> &'a Op {
    module
        .body()
        .iter()
        .map(|op| module.op(*op))
        .find(|op| op.name.is_some_and(|n| n == name))
        .unwrap_or_else(|| panic!("no op named {name}"))
}

/// All connect ops of a module, in body order.
fn connects(module: &Module) -> Vec<(ValueId, ValueId)> {
    module
        .body()
        .iter()
        .filter_map(|op| match module.op(*op).kind {
            OpKind::Connect { dest, src } => Some((dest, src)),
            _ => None,
        })
        .collect()
}

/// An inner module with an abstract reset port that resets a register, and
/// a top module driving that port with `driver_ty`.
fn inference_circuit(driver_ty: Type) -> Circuit {
    let mut m = Module::new("M".into());
    let r = m.add_port(Port::new("r".into(), Direction::Input, Type::Reset));
    let clk =
        m.add_port(Port::new("clk".into(), Direction::Input, Type::Clock));
    {
        let mut b = Builder::at_end(&mut m);
        let zero = b.add_constant(0, uint(8), L);
        b.add_reg_reset("q".into(), uint(8), clk, r, zero, L);
    }

    let mut t = Module::new("T".into());
    let drv =
        t.add_port(Port::new("drv".into(), Direction::Input, driver_ty));
    let tclk =
        t.add_port(Port::new("clk".into(), Direction::Input, Type::Clock));
    {
        let mut b = Builder::at_end(&mut t);
        let inst = b.add_instance(
            "m".into(),
            "M".into(),
            vec![Type::Reset, Type::Clock],
            L,
        );
        let m_r = b.module().op(inst).results[0];
        let m_clk = b.module().op(inst).results[1];
        b.add_connect(m_r, drv, L);
        b.add_connect(m_clk, tclk, L);
    }

    let mut circuit = Circuit::new("T");
    circuit.add_module(m);
    circuit.add_module(t);
    circuit
}

#[test]
fn single_sync_inference() {
    let mut circuit = inference_circuit(uint(1));
    run_pass(&mut circuit).expect("pass should succeed");

    let m = circuit.find_module("M".into()).unwrap();
    let m = circuit.module(m);
    // The abstract reset resolved to the sync bit everywhere it appears.
    assert_eq!(m.port(0).ty, uint(1));
    assert_eq!(*m.value_type(m.port_value(0)), uint(1));
    let t = circuit.module(circuit.find_module("T".into()).unwrap());
    let inst = named_op(t, "m");
    assert_eq!(*t.value_type(inst.results[0]), uint(1));
    // The register is unchanged in kind, and its width is preserved.
    let q = named_op(m, "q");
    assert!(matches!(q.kind, OpKind::RegReset { .. }));
    assert_eq!(*m.value_type(q.results[0]), uint(8));
}

#[test]
fn single_async_inference() {
    let mut circuit = inference_circuit(Type::AsyncReset);
    run_pass(&mut circuit).expect("pass should succeed");

    let m = circuit.module(circuit.find_module("M".into()).unwrap());
    assert_eq!(m.port(0).ty, Type::AsyncReset);
    assert_eq!(*m.value_type(m.port_value(0)), Type::AsyncReset);
}

#[test]
fn mixed_drivers_conflict() {
    // Two drivers into the same abstract port, one sync and one async.
    let mut m = Module::new("M".into());
    m.add_port(Port::new("r".into(), Direction::Input, Type::Reset));

    let mut t = Module::new("T".into());
    let sync =
        t.add_port(Port::new("sync".into(), Direction::Input, uint(1)));
    let async_ = t.add_port(Port::new(
        "async".into(),
        Direction::Input,
        Type::AsyncReset,
    ));
    {
        let mut b = Builder::at_end(&mut t);
        let inst =
            b.add_instance("m".into(), "M".into(), vec![Type::Reset], L);
        let m_r = b.module().op(inst).results[0];
        b.add_connect(m_r, sync, L);
        b.add_connect(m_r, async_, L);
    }

    let mut circuit = Circuit::new("T");
    circuit.add_module(m);
    circuit.add_module(t);
    let err = expect_err(
        &mut circuit,
        "reset network simultaneously connected to async and sync resets",
    );
    // One note asking for the intended kind, one per dissenting drive.
    // The tie breaks toward async, so the sync drive dissents.
    let notes = err.errors()[0].notes();
    assert_eq!(notes.len(), 2);
    assert!(notes[0].message.contains("async"));
    assert!(notes[1].message.contains("Offending sync drive"));
}

#[test]
fn vector_elements_collapse_into_one_net() {
    // v[0] is driven sync and v[1] async from independent sources. The
    // elements share one leaf, so the net sees both kinds and fails.
    let mut m = Module::new("M".into());
    let sync =
        m.add_port(Port::new("sync".into(), Direction::Input, uint(1)));
    let async_ = m.add_port(Port::new(
        "async".into(),
        Direction::Input,
        Type::AsyncReset,
    ));
    {
        let mut b = Builder::at_end(&mut m);
        let v = b.add_wire(
            "v".into(),
            Type::Vector(Box::new(Type::Reset), 2),
            L,
        );
        let e0 = b.add_subindex(v, 0, L);
        let e1 = b.add_subindex(v, 1, L);
        b.add_connect(e0, sync, L);
        b.add_connect(e1, async_, L);
    }
    let mut circuit = Circuit::new("M");
    circuit.add_module(m);
    expect_err(
        &mut circuit,
        "reset network simultaneously connected to async and sync resets",
    );
}

#[test]
fn never_driven_network() {
    let mut m = Module::new("M".into());
    {
        let mut b = Builder::at_end(&mut m);
        let w1 = b.add_wire("w1".into(), Type::Reset, L);
        let w2 = b.add_wire("w2".into(), Type::Reset, L);
        b.add_connect(w1, w2, L);
    }
    let mut circuit = Circuit::new("M");
    circuit.add_module(m);
    expect_err(&mut circuit, "reset network never driven with concrete type");
}

#[test]
fn non_reset_type_in_network() {
    let mut m = Module::new("M".into());
    let s = m.add_port(Port::new("s".into(), Direction::Input, uint(8)));
    {
        let mut b = Builder::at_end(&mut m);
        let w = b.add_wire("w".into(), Type::Reset, L);
        b.add_connect(w, s, L);
    }
    let mut circuit = Circuit::new("M");
    circuit.add_module(m);
    expect_err(&mut circuit, "driven with non-reset type UInt<8>");
}

/// Scenario: `T` is annotated with a full async reset on its `rst` port
/// and instantiates `A`, which instantiates `B`, which holds a reset-less
/// register. Optionally `A` already has a conflicting `rst` port.
fn domain_circuit(colliding_port: bool) -> Circuit {
    let mut b_mod = Module::new("B".into());
    let clk = b_mod
        .add_port(Port::new("clk".into(), Direction::Input, Type::Clock));
    {
        let mut b = Builder::at_end(&mut b_mod);
        b.add_reg("q".into(), uint(8), clk, L);
    }

    let mut a_mod = Module::new("A".into());
    let clk = a_mod
        .add_port(Port::new("clk".into(), Direction::Input, Type::Clock));
    if colliding_port {
        a_mod.add_port(Port::new("rst".into(), Direction::Input, uint(1)));
    }
    {
        let mut b = Builder::at_end(&mut a_mod);
        let inst =
            b.add_instance("b".into(), "B".into(), vec![Type::Clock], L);
        let b_clk = b.module().op(inst).results[0];
        b.add_connect(b_clk, clk, L);
    }

    let mut t = Module::new("T".into());
    let clk =
        t.add_port(Port::new("clk".into(), Direction::Input, Type::Clock));
    t.add_port(
        Port::new("rst".into(), Direction::Input, Type::AsyncReset)
            .with_annos(vec![Annotation::new(FULL_ASYNC_RESET_ANNOTATION)]),
    );
    {
        let mut b = Builder::at_end(&mut t);
        let a_ports = if colliding_port {
            vec![Type::Clock, uint(1)]
        } else {
            vec![Type::Clock]
        };
        let inst = b.add_instance("a".into(), "A".into(), a_ports, L);
        let a_clk = b.module().op(inst).results[0];
        b.add_connect(a_clk, clk, L);
    }

    let mut circuit = Circuit::new("T");
    circuit.add_module(b_mod);
    circuit.add_module(a_mod);
    circuit.add_module(t);
    circuit
}

#[test]
fn domain_inheritance_inserts_ports_and_rewrites_registers() {
    let mut circuit = domain_circuit(false);
    run_pass(&mut circuit).expect("pass should succeed");

    let a = circuit.module(circuit.find_module("A".into()).unwrap());
    let b = circuit.module(circuit.find_module("B".into()).unwrap());
    let t = circuit.module(circuit.find_module("T".into()).unwrap());

    // Both A and B acquired an async input port `rst` at index 0.
    for module in [a, b] {
        assert_eq!(module.port(0).name, "rst");
        assert_eq!(module.port(0).ty, Type::AsyncReset);
        assert!(matches!(module.port(0).direction, Direction::Input));
    }
    // T already had the port; its argument list is untouched.
    let t_ports: Vec<_> =
        t.ports().iter().map(|p| p.name.to_string()).collect();
    assert_eq!(t_ports, vec!["clk", "rst"]);

    // The register became an async-reset register with a zero value.
    let q = named_op(b, "q");
    let OpKind::RegReset {
        reset, reset_value, ..
    } = &q.kind
    else {
        panic!("register was not rewritten")
    };
    assert_eq!(*reset, b.port_value(0));
    assert_eq!(*b.value_type(*reset_value), uint(8));
    assert!(matches!(
        b.op(def_op(b, *reset_value)).kind,
        OpKind::Constant { value: 0 }
    ));

    // The reset is routed down the hierarchy: T.rst -> A.rst -> B.rst.
    let t_connects = connects(t);
    let a_inst = named_op(t, "a");
    assert!(t_connects
        .contains(&(a_inst.results[0], t.port_value(1))));
    let a_connects = connects(a);
    let b_inst = named_op(a, "b");
    assert!(a_connects
        .contains(&(b_inst.results[0], a.port_value(0))));

    // The consumed annotations are gone from the IR.
    assert!(t.ports().iter().all(|p| p.annos.is_empty()));
}

#[test]
fn colliding_port_names_get_uniquified() {
    let mut circuit = domain_circuit(true);
    run_pass(&mut circuit).expect("pass should succeed");

    let a = circuit.module(circuit.find_module("A".into()).unwrap());
    // A's sync `rst` port is untouched; the inserted port is `rst_0`.
    assert_eq!(a.port(0).name, "rst_0");
    assert_eq!(a.port(0).ty, Type::AsyncReset);
    let old: Vec<_> = a
        .ports()
        .iter()
        .filter(|p| p.name == "rst")
        .collect();
    assert_eq!(old.len(), 1);
    assert_eq!(old[0].ty, uint(1));

    // All reset routing in A targets the new port.
    let b_inst = named_op(a, "b");
    assert!(connects(a)
        .contains(&(b_inst.results[0], a.port_value(0))));

    // B has no port named `rst` of its own, so the domain root's name is
    // still free there and gets used as is.
    let b = circuit.module(circuit.find_module("B".into()).unwrap());
    assert_eq!(b.port(0).name, "rst");
    assert_eq!(b.port(0).ty, Type::AsyncReset);
}

#[test]
fn pass_manager_reports_diagnostics() {
    let mut pm = ripple_opt::PassManager::default();
    pm.register_diagnostic::<InferResets>().unwrap();
    assert!(pm.complete_help().contains("infer-resets"));

    let mut circuit = domain_circuit(false);
    pm.execute_plan(&mut circuit, &["infer-resets".to_string()])
        .expect("well-formed circuit passes");

    let mut broken = Circuit::new("M");
    let mut m = Module::new("M".into());
    m.annos.push(Annotation::new(FULL_ASYNC_RESET_ANNOTATION));
    broken.add_module(m);
    let err = pm
        .execute_plan(&mut broken, &["infer-resets".to_string()])
        .expect_err("misplaced annotation fails");
    assert!(err.errors()[0]
        .message()
        .contains("cannot target module"));
}

#[test]
fn pass_is_idempotent() {
    let mut circuit = domain_circuit(false);
    run_pass(&mut circuit).expect("first run should succeed");
    let before = Printer::print(&circuit);
    run_pass(&mut circuit).expect("second run should succeed");
    let after = Printer::print(&circuit);
    assert_eq!(before, after);
}

#[test]
fn sync_reset_register_gets_muxed_drives() {
    // A register with a sync reset inside an async domain: the sync reset
    // moves into muxes on the register's drives, and the register itself
    // is rewired to the domain's async reset.
    let mut m = Module::new("M".into());
    let clk =
        m.add_port(Port::new("clk".into(), Direction::Input, Type::Clock));
    let sr = m.add_port(Port::new("sr".into(), Direction::Input, uint(1)));
    let d = m.add_port(Port::new("d".into(), Direction::Input, uint(8)));
    m.add_port(
        Port::new("arst".into(), Direction::Input, Type::AsyncReset)
            .with_annos(vec![Annotation::new(FULL_ASYNC_RESET_ANNOTATION)]),
    );
    let q;
    {
        let mut b = Builder::at_end(&mut m);
        let zero = b.add_constant(0, uint(8), L);
        q = b.add_reg_reset("q".into(), uint(8), clk, sr, zero, L);
        b.add_connect(q, d, L);
    }
    let mut circuit = Circuit::new("M");
    circuit.add_module(m);
    run_pass(&mut circuit).expect("pass should succeed");

    let m = circuit.module(circuit.find_module("M".into()).unwrap());
    let arst = m
        .ports()
        .iter()
        .position(|p| p.name == "arst")
        .map(|i| m.port_value(i))
        .unwrap();
    let reg = named_op(m, "q");
    let OpKind::RegReset {
        reset, reset_value, ..
    } = &reg.kind
    else {
        panic!("expected a reset register")
    };
    assert_eq!(*reset, arst);
    assert!(matches!(
        m.op(def_op(m, *reset_value)).kind,
        OpKind::Constant { value: 0 }
    ));

    // The old sync reset now guards the register's drive through a mux.
    let (_, src) = connects(m)
        .into_iter()
        .find(|(dest, _)| *dest == q)
        .expect("the register is still driven");
    let OpKind::Mux { sel, low, .. } = &m.op(def_op(m, src)).kind else {
        panic!("drive was not muxed")
    };
    assert_eq!(*sel, sr);
    assert_eq!(*low, d);
}

#[test]
fn aggregate_register_gets_structural_zero() {
    let bundle = Type::Bundle(vec![
        BundleField {
            name: "x".into(),
            flip: false,
            ty: uint(4),
        },
        BundleField {
            name: "y".into(),
            flip: false,
            ty: Type::Vector(Box::new(uint(2)), 2),
        },
    ]);
    let mut m = Module::new("M".into());
    let clk =
        m.add_port(Port::new("clk".into(), Direction::Input, Type::Clock));
    m.add_port(
        Port::new("arst".into(), Direction::Input, Type::AsyncReset)
            .with_annos(vec![Annotation::new(FULL_ASYNC_RESET_ANNOTATION)]),
    );
    {
        let mut b = Builder::at_end(&mut m);
        b.add_reg("q".into(), bundle.clone(), clk, L);
    }
    let mut circuit = Circuit::new("M");
    circuit.add_module(m);
    run_pass(&mut circuit).expect("pass should succeed");

    let m = circuit.module(circuit.find_module("M".into()).unwrap());
    let reg = named_op(m, "q");
    let OpKind::RegReset { reset_value, .. } = &reg.kind else {
        panic!("register was not rewritten")
    };
    // The zero is a fresh wire of the register's type, field by field
    // driven from synthesized leaf zeros.
    assert!(matches!(
        m.op(def_op(m, *reset_value)).kind,
        OpKind::Wire
    ));
    assert_eq!(*m.value_type(*reset_value), bundle);
    // One drive for the scalar field, one per vector element.
    let leaf_connects = connects(m)
        .into_iter()
        .filter(|(dest, _)| {
            matches!(
                m.op(def_op(m, *dest)).kind,
                OpKind::Subfield { .. } | OpKind::Subindex { .. }
            )
        })
        .count();
    assert_eq!(leaf_connects, 3);
}

#[test]
fn unknown_width_register_gets_single_bit_zero() {
    let mut m = Module::new("M".into());
    let clk =
        m.add_port(Port::new("clk".into(), Direction::Input, Type::Clock));
    m.add_port(
        Port::new("arst".into(), Direction::Input, Type::AsyncReset)
            .with_annos(vec![Annotation::new(FULL_ASYNC_RESET_ANNOTATION)]),
    );
    {
        let mut b = Builder::at_end(&mut m);
        b.add_reg("q".into(), Type::UInt(None), clk, L);
    }
    let mut circuit = Circuit::new("M");
    circuit.add_module(m);
    run_pass(&mut circuit).expect("pass should succeed");

    let m = circuit.module(circuit.find_module("M".into()).unwrap());
    let reg = named_op(m, "q");
    let OpKind::RegReset { reset_value, .. } = &reg.kind else {
        panic!("register was not rewritten")
    };
    // The register keeps its unknown width; its zero defaults to one bit.
    assert_eq!(*m.value_type(reg.results[0]), Type::UInt(None));
    assert_eq!(*m.value_type(*reset_value), uint(1));
}

#[test]
fn async_reset_register_is_left_alone() {
    let mut m = Module::new("M".into());
    let clk =
        m.add_port(Port::new("clk".into(), Direction::Input, Type::Clock));
    let pre = m.add_port(Port::new(
        "pre".into(),
        Direction::Input,
        Type::AsyncReset,
    ));
    m.add_port(
        Port::new("arst".into(), Direction::Input, Type::AsyncReset)
            .with_annos(vec![Annotation::new(FULL_ASYNC_RESET_ANNOTATION)]),
    );
    {
        let mut b = Builder::at_end(&mut m);
        let zero = b.add_constant(0, uint(8), L);
        b.add_reg_reset("q".into(), uint(8), clk, pre, zero, L);
    }
    let mut circuit = Circuit::new("M");
    circuit.add_module(m);
    run_pass(&mut circuit).expect("pass should succeed");

    let m = circuit.module(circuit.find_module("M".into()).unwrap());
    let reg = named_op(m, "q");
    let OpKind::RegReset { reset, .. } = &reg.kind else {
        panic!("expected a reset register")
    };
    // The pre-existing async reset signal survives untouched.
    assert_eq!(*reset, pre);
}

#[test]
fn malformed_async_register_fails_but_keeps_going() {
    // Two registers: the first already-async one has a reset value of the
    // wrong type, the second is reset-less. The verification failure is
    // reported, yet the second register still gets rewritten.
    let mut m = Module::new("M".into());
    let clk =
        m.add_port(Port::new("clk".into(), Direction::Input, Type::Clock));
    let pre = m.add_port(Port::new(
        "pre".into(),
        Direction::Input,
        Type::AsyncReset,
    ));
    m.add_port(
        Port::new("arst".into(), Direction::Input, Type::AsyncReset)
            .with_annos(vec![Annotation::new(FULL_ASYNC_RESET_ANNOTATION)]),
    );
    {
        let mut b = Builder::at_end(&mut m);
        let bad_zero = b.add_constant(0, uint(4), L);
        b.add_reg_reset("bad".into(), uint(8), clk, pre, bad_zero, L);
        b.add_reg("q".into(), uint(8), clk, L);
    }
    let mut circuit = Circuit::new("M");
    circuit.add_module(m);
    let err = run_pass(&mut circuit).expect_err("verification must fail");
    assert!(err.errors()[0].message().contains("reset value type"));

    let m = circuit.module(circuit.find_module("M".into()).unwrap());
    let q = named_op(m, "q");
    assert!(matches!(q.kind, OpKind::RegReset { .. }));
}

#[test]
fn annotation_on_module_is_rejected() {
    let mut m = Module::new("M".into());
    m.annos.push(Annotation::new(FULL_ASYNC_RESET_ANNOTATION));
    let mut circuit = Circuit::new("M");
    circuit.add_module(m);
    expect_err(
        &mut circuit,
        "'FullAsyncResetAnnotation' cannot target module",
    );
}

#[test]
fn ignore_annotation_on_port_is_rejected() {
    let mut m = Module::new("M".into());
    m.add_port(
        Port::new("rst".into(), Direction::Input, Type::AsyncReset)
            .with_annos(vec![Annotation::new(
                IGNORE_FULL_ASYNC_RESET_ANNOTATION,
            )]),
    );
    let mut circuit = Circuit::new("M");
    circuit.add_module(m);
    expect_err(
        &mut circuit,
        "'IgnoreFullAsyncResetAnnotation' cannot target port",
    );
}

#[test]
fn annotation_on_register_is_rejected() {
    let mut m = Module::new("M".into());
    let clk =
        m.add_port(Port::new("clk".into(), Direction::Input, Type::Clock));
    let q;
    {
        let mut b = Builder::at_end(&mut m);
        q = b.add_reg("q".into(), uint(1), clk, L);
    }
    let op = def_op(&m, q);
    m.op_mut(op)
        .annos
        .push(Annotation::new(FULL_ASYNC_RESET_ANNOTATION));
    let mut circuit = Circuit::new("M");
    circuit.add_module(m);
    expect_err(
        &mut circuit,
        "reset annotations must target module, port, or wire/node",
    );
}

#[test]
fn multiple_annotations_conflict() {
    // The two annotated ports carry distinct source locations; identical
    // (annotation, location) pairs would collapse into one entry.
    let file = GlobalPositionTable::add_file(
        "test.fir".to_string(),
        "input r1 : AsyncReset\ninput r2 : AsyncReset\n".to_string(),
    );
    let mut m = Module::new("M".into());
    m.add_port(
        Port::new("r1".into(), Direction::Input, Type::AsyncReset)
            .with_loc(GPosIdx::new(file, 0, 8))
            .with_annos(vec![Annotation::new(FULL_ASYNC_RESET_ANNOTATION)]),
    );
    m.add_port(
        Port::new("r2".into(), Direction::Input, Type::AsyncReset)
            .with_loc(GPosIdx::new(file, 22, 30))
            .with_annos(vec![Annotation::new(FULL_ASYNC_RESET_ANNOTATION)]),
    );
    let mut circuit = Circuit::new("M");
    circuit.add_module(m);
    let err =
        expect_err(&mut circuit, "multiple reset annotations on module 'M'");
    assert_eq!(err.errors()[0].notes().len(), 2);
}

#[test]
fn conflicting_inherited_domains() {
    // A is instantiated both under the annotated top and under a module
    // that explicitly opted out of reset domains.
    let mut a = Module::new("A".into());
    a.add_port(Port::new("clk".into(), Direction::Input, Type::Clock));

    let mut i = Module::new("I".into());
    i.annos
        .push(Annotation::new(IGNORE_FULL_ASYNC_RESET_ANNOTATION));
    let clk =
        i.add_port(Port::new("clk".into(), Direction::Input, Type::Clock));
    {
        let mut b = Builder::at_end(&mut i);
        let inst =
            b.add_instance("a2".into(), "A".into(), vec![Type::Clock], L);
        let a_clk = b.module().op(inst).results[0];
        b.add_connect(a_clk, clk, L);
    }

    let mut t = Module::new("T".into());
    let clk =
        t.add_port(Port::new("clk".into(), Direction::Input, Type::Clock));
    t.add_port(
        Port::new("rst".into(), Direction::Input, Type::AsyncReset)
            .with_annos(vec![Annotation::new(FULL_ASYNC_RESET_ANNOTATION)]),
    );
    {
        let mut b = Builder::at_end(&mut t);
        let a1 =
            b.add_instance("a1".into(), "A".into(), vec![Type::Clock], L);
        let a_clk = b.module().op(a1).results[0];
        b.add_connect(a_clk, clk, L);
        let i1 =
            b.add_instance("i1".into(), "I".into(), vec![Type::Clock], L);
        let i_clk = b.module().op(i1).results[0];
        b.add_connect(i_clk, clk, L);
    }

    let mut circuit = Circuit::new("T");
    circuit.add_module(a);
    circuit.add_module(i);
    circuit.add_module(t);
    let err = expect_err(
        &mut circuit,
        "module 'A' instantiated in different reset domains",
    );
    // One note per conflicting instantiation, plus the declaration site of
    // the named reset.
    assert!(err.errors()[0].notes().len() >= 2);
}

#[test]
fn extern_modules_are_skipped() {
    // An extern module's ports take part in no network and no domain.
    let mut e = Module::new_ext("E".into());
    e.add_port(Port::new("r".into(), Direction::Input, Type::Reset));

    let mut t = Module::new("T".into());
    let rst =
        t.add_port(Port::new("rst".into(), Direction::Input, uint(1)));
    t.add_port(
        Port::new("arst".into(), Direction::Input, Type::AsyncReset)
            .with_annos(vec![Annotation::new(FULL_ASYNC_RESET_ANNOTATION)]),
    );
    {
        let mut b = Builder::at_end(&mut t);
        let inst =
            b.add_instance("e".into(), "E".into(), vec![Type::Reset], L);
        let e_r = b.module().op(inst).results[0];
        b.add_connect(e_r, rst, L);
    }
    let mut circuit = Circuit::new("T");
    circuit.add_module(e);
    circuit.add_module(t);
    run_pass(&mut circuit).expect("pass should succeed");

    // The instance-side value was typed through the connect, while the
    // extern module's signature is left untouched.
    let t = circuit.module(circuit.find_module("T".into()).unwrap());
    let inst = named_op(t, "e");
    assert_eq!(*t.value_type(inst.results[0]), uint(1));
    let e = circuit.module(circuit.find_module("E".into()).unwrap());
    assert_eq!(e.port(0).ty, Type::Reset);
}

#[test]
fn bundle_connects_pair_fields_by_name_and_flip() {
    // w.r is driven from the source's r field; the flipped f field drives
    // in the opposite direction. Both leaves resolve concretely.
    let bundle_dst = Type::Bundle(vec![
        BundleField {
            name: "r".into(),
            flip: false,
            ty: Type::Reset,
        },
        BundleField {
            name: "f".into(),
            flip: true,
            ty: Type::Reset,
        },
    ]);
    let bundle_src = Type::Bundle(vec![
        BundleField {
            name: "r".into(),
            flip: false,
            ty: Type::AsyncReset,
        },
        BundleField {
            name: "f".into(),
            flip: true,
            ty: uint(1),
        },
    ]);
    let mut m = Module::new("M".into());
    let src =
        m.add_port(Port::new("src".into(), Direction::Input, bundle_src));
    {
        let mut b = Builder::at_end(&mut m);
        let w = b.add_wire("w".into(), bundle_dst, L);
        b.add_connect(w, src, L);
    }
    let mut circuit = Circuit::new("M");
    circuit.add_module(m);
    run_pass(&mut circuit).expect("pass should succeed");

    let m = circuit.module(circuit.find_module("M".into()).unwrap());
    let w = named_op(m, "w");
    let Type::Bundle(fields) = m.value_type(w.results[0]) else {
        panic!("wire lost its bundle type")
    };
    assert_eq!(fields[0].ty, Type::AsyncReset);
    assert_eq!(fields[1].ty, uint(1));
}

#[test]
fn projection_chains_are_rebased_to_their_root() {
    // Driving a doubly nested leaf through subfield ops types the root
    // declaration itself.
    let inner = Type::Bundle(vec![BundleField {
        name: "r".into(),
        flip: false,
        ty: Type::Reset,
    }]);
    let outer = Type::Bundle(vec![
        BundleField {
            name: "pad".into(),
            flip: false,
            ty: uint(2),
        },
        BundleField {
            name: "in".into(),
            flip: false,
            ty: inner,
        },
    ]);
    let mut m = Module::new("M".into());
    let drv = m.add_port(Port::new(
        "drv".into(),
        Direction::Input,
        Type::AsyncReset,
    ));
    {
        let mut b = Builder::at_end(&mut m);
        let w = b.add_wire("w".into(), outer, L);
        let mid = b.add_subfield(w, 1, L);
        let leaf = b.add_subfield(mid, 0, L);
        b.add_connect(leaf, drv, L);
    }
    let mut circuit = Circuit::new("M");
    circuit.add_module(m);
    run_pass(&mut circuit).expect("pass should succeed");

    let m = circuit.module(circuit.find_module("M".into()).unwrap());
    let w = named_op(m, "w");
    let Type::Bundle(fields) = m.value_type(w.results[0]) else {
        panic!("wire lost its bundle type")
    };
    let Type::Bundle(inner_fields) = &fields[1].ty else {
        panic!("inner bundle lost its type")
    };
    // The leaf, the intermediate projection, and the pad are all settled.
    assert_eq!(inner_fields[0].ty, Type::AsyncReset);
    assert_eq!(fields[0].ty, uint(2));
}
