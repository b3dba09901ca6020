//! End-to-end properties of IR construction and `resolve`, driven through the
//! public API the way a front end would use it.

use bumpalo::Bump;
use irpipe::core::{CompilationSession, CompileError, CompileOptions, TargetKind};
use irpipe::ir::{
    CompileUnit, Declaration, ExprId, ExprKind, IrGraph, JmpMode, LabelUses, Procedure, StmtKind,
    UseCount, VariableInfo,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Every node reachable from the body, in pre-order.
fn all_nodes(graph: &IrGraph<'_>, proc: &Procedure<'_>) -> Vec<ExprId> {
    let mut nodes = Vec::new();
    for stmt in &proc.body {
        if let Some(e) = stmt.expr {
            graph.iter_expr(e, &mut |x| nodes.push(x));
        }
    }
    nodes
}

#[test]
fn test_sharing_safety() {
    init_logging();
    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let mut unit = CompileUnit::new(&session);
    let mut proc = Procedure::new(Some("f"), "_f", 0);

    let value = unit.graph.rtcall("compute", vec![]);
    let uses = 4;
    for _ in 0..uses {
        let r = unit.graph.shared(value);
        let consumer = unit.graph.rtcall("consume", vec![r]);
        proc.emit_expr(consumer);
    }
    let idx = unit.add_procedure(proc);
    unit.resolve(idx, &session).unwrap();

    let proc = unit.procedure(idx).unwrap();
    let nodes = all_nodes(&unit.graph, proc);
    let defs: Vec<_> = nodes
        .iter()
        .filter(|&&e| unit.graph.kind(e) == ExprKind::SharedDef)
        .collect();
    let refs: Vec<_> = nodes
        .iter()
        .filter(|&&e| unit.graph.kind(e) == ExprKind::SharedRef)
        .collect();

    assert_eq!(defs.len(), 1);
    assert_eq!(refs.len(), uses - 1);
    for &&shared in defs.iter().chain(refs.iter()) {
        assert_eq!(unit.graph.args(shared), &[value]);
    }
    assert_eq!(unit.graph.node(value).uses, UseCount::Total(uses as u32));
}

#[test]
fn test_single_use_unwrap() {
    init_logging();
    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let mut unit = CompileUnit::new(&session);
    let mut proc = Procedure::new(Some("f"), "_f", 0);

    let value = unit.graph.rtcall("compute", vec![]);
    let r = unit.graph.shared(value);
    let consumer = unit.graph.rtcall("consume", vec![r]);
    proc.emit_expr(consumer);
    let idx = unit.add_procedure(proc);
    unit.resolve(idx, &session).unwrap();

    let proc = unit.procedure(idx).unwrap();
    assert!(all_nodes(&unit.graph, proc)
        .iter()
        .all(|&e| !unit.graph.kind(e).is_shared()));
    assert_eq!(unit.graph.render_expr(proc.body[0].expr.unwrap()), "consume(compute())");
}

#[test]
fn test_share_dropped_by_dead_code_is_unwrapped() {
    init_logging();
    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let mut unit = CompileUnit::new(&session);
    let mut proc = Procedure::new(Some("f"), "_f", 0);

    // The second reference is a discarded pure statement.
    let value = unit.graph.rtcall("compute", vec![]);
    let r1 = unit.graph.shared(value);
    let consumer = unit.graph.rtcall("consume", vec![r1]);
    proc.emit_expr(consumer);
    let r2 = unit.graph.shared(value);
    proc.emit_expr(r2);

    let idx = unit.add_procedure(proc);
    unit.resolve(idx, &session).unwrap();

    let proc = unit.procedure(idx).unwrap();
    assert_eq!(proc.body.len(), 1);
    assert_eq!(unit.graph.render_expr(proc.body[0].expr.unwrap()), "consume(compute())");
}

#[test]
fn test_dead_code_elimination_keeps_effects() {
    init_logging();
    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let mut unit = CompileUnit::new(&session);
    let mut proc = Procedure::new(Some("f"), "_f", 0);
    let x = proc.mk_local(&mut unit.graph, Declaration { name: "x", node_id: 1 }, VariableInfo::default());

    let lit = unit.graph.numlit(3);
    proc.emit_expr(lit);
    let ptr = unit.graph.ptrlit("_str0");
    proc.emit_expr(ptr);
    let load = unit.graph.load(x);
    proc.emit_expr(load);
    let call = unit.graph.rtcall("tick", vec![]);
    proc.emit_expr(call);
    let zero = unit.graph.numlit(0);
    let store = unit.graph.store_by_ref(x, zero);
    proc.emit_expr(store);

    let idx = unit.add_procedure(proc);
    unit.resolve(idx, &session).unwrap();

    let proc = unit.procedure(idx).unwrap();
    let kept: Vec<_> = proc.body.iter().filter_map(|s| s.expr).collect();
    assert_eq!(kept, vec![call, store]);
}

#[test]
fn test_label_resolution_completeness() {
    init_logging();
    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let mut unit = CompileUnit::new(&session);
    let mut proc = Procedure::new(Some("loop"), "_loop", 0);

    let head = proc.mk_label(&session, "head");
    let exit = proc.mk_label(&session, "exit");
    let head_name = head.label_name().unwrap();
    let exit_name = exit.label_name().unwrap();

    proc.emit_lbl(head);
    let cond = unit.graph.rtcall("more", vec![]);
    proc.emit_jmp_z(&unit.graph, exit_name, cond);
    let work = unit.graph.rtcall("work", vec![]);
    proc.emit_expr(work);
    proc.emit_jmp(&unit.graph, head_name, None, JmpMode::Always, None);
    proc.emit_lbl(exit);

    let idx = unit.add_procedure(proc);
    unit.resolve(idx, &session).unwrap();

    let proc = unit.procedure(idx).unwrap();
    for stmt in &proc.body {
        if let StmtKind::Jmp(j) = &stmt.kind {
            let target = j.target.expect("every jump is linked");
            assert_eq!(proc.body[target].label_name(), Some(j.label_name));
        }
    }
    for (i, stmt) in proc.body.iter().enumerate() {
        assert_eq!(stmt.stmt_no, i);
    }
    // Backward jump to the head, conditional jump to the exit: no fallthrough.
    assert_eq!(proc.body[0].as_label().unwrap().num_uses, LabelUses::Count(1));
    assert_eq!(proc.body[4].as_label().unwrap().num_uses, LabelUses::Count(1));
}

#[test]
fn test_missing_label_fails() {
    init_logging();
    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let mut unit = CompileUnit::new(&session);
    let mut proc = Procedure::new(Some("f"), "_f", 0);
    proc.emit_jmp(&unit.graph, ".gone", None, JmpMode::Always, None);
    let idx = unit.add_procedure(proc);

    let err = unit.resolve(idx, &session).unwrap_err();
    assert!(err.is_internal());
    assert_eq!(err, CompileError::MissingLabel { label: ".gone".to_string() });
}

#[test]
fn test_duplicate_label_fails() {
    init_logging();
    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let mut unit = CompileUnit::new(&session);
    let mut proc = Procedure::new(Some("f"), "_f", 0);
    proc.emit_lbl_direct(".a");
    proc.emit_lbl_direct(".a");
    let idx = unit.add_procedure(proc);

    let err = unit.resolve(idx, &session).unwrap_err();
    assert_eq!(err, CompileError::DuplicateLabel { label: ".a".to_string() });
}

#[test]
fn test_flattening_order_preservation() {
    init_logging();
    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let mut graph = IrGraph::for_session(&session);
    let mut proc = Procedure::new(Some("f"), "_f", 0);
    let x = proc.mk_local(&mut graph, Declaration { name: "x", node_id: 1 }, VariableInfo::default());

    let first = graph.load(x);
    let call = graph.rtcall("f", vec![]);
    let third = graph.load(x);
    let out = graph.flatten_args(&[first, call, third], session.options());

    assert_eq!(out.precomp.len(), 2);
    assert_eq!(graph.args(out.precomp[0]), &[first]);
    assert_eq!(graph.args(out.precomp[1]), &[call]);
    // The post-call read stays in place and is not merged with the first.
    assert_eq!(out.flattened[2], third);
    assert_ne!(graph.args(out.flattened[0]), &[third]);
}

#[test]
fn test_inlining_cost_scenario() {
    init_logging();
    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let mut unit = CompileUnit::new(&session);
    let mut proc = Procedure::new(Some("add1"), "_add1", 0);
    let a = proc.mk_arg(&mut unit.graph, Declaration { name: "a", node_id: 1 });

    let load = unit.graph.load(a);
    let one = unit.graph.numlit(1);
    let add = unit.graph.rtcall("add", vec![load, one]);
    proc.emit_jmp(&unit.graph, ".ret", Some(add), JmpMode::Always, None);
    proc.emit_lbl_direct(".ret");
    let idx = unit.add_procedure(proc);
    unit.resolve(idx, &session).unwrap();

    let proc = unit.procedure(idx).unwrap();
    assert_eq!(proc.inline_body, Some(add));
    assert_eq!(proc.body[1].as_label().unwrap().num_uses, LabelUses::JumpToNext);
    assert_eq!(session.stats().procedures_inlinable, 1);
}

#[test]
fn test_conditional_jump_disqualifies_inlining() {
    init_logging();
    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let mut unit = CompileUnit::new(&session);
    let mut proc = Procedure::new(Some("g"), "_g", 0);
    let a = proc.mk_arg(&mut unit.graph, Declaration { name: "a", node_id: 1 });

    let load = unit.graph.load(a);
    proc.emit_jmp(&unit.graph, ".ret", Some(load), JmpMode::IfNotZero, None);
    let zero = unit.graph.numlit(0);
    proc.emit_jmp(&unit.graph, ".ret", Some(zero), JmpMode::Always, None);
    proc.emit_lbl_direct(".ret");
    let idx = unit.add_procedure(proc);
    unit.resolve(idx, &session).unwrap();

    assert!(unit.procedure(idx).unwrap().inline_body.is_none());
}

#[test]
fn test_interpreted_target_inlines_larger_bodies() {
    init_logging();
    // add(a, add(b, 1)): 8 + 2 + (8 + 2 + 2) = 22
    fn build(session: &CompilationSession<'_>) -> bool {
        let mut unit = CompileUnit::new(session);
        let mut proc = Procedure::new(Some("h"), "_h", 0);
        let a = proc.mk_arg(&mut unit.graph, Declaration { name: "a", node_id: 1 });
        let b = proc.mk_arg(&mut unit.graph, Declaration { name: "b", node_id: 2 });
        let la = unit.graph.load(a);
        let lb = unit.graph.load(b);
        let one = unit.graph.numlit(1);
        let inner = unit.graph.rtcall("add", vec![lb, one]);
        let outer = unit.graph.rtcall("add", vec![la, inner]);
        proc.emit_jmp(&unit.graph, ".ret", Some(outer), JmpMode::Always, None);
        proc.emit_lbl_direct(".ret");
        let idx = unit.add_procedure(proc);
        unit.resolve(idx, session).unwrap();
        unit.procedure(idx).unwrap().inline_body.is_some()
    }

    let arena = Bump::new();
    // Native budget: 4*2 + 6 + 4 = 18.
    let native = CompilationSession::with_options(&arena, CompileOptions::native());
    assert!(!build(&native));
    // Interpreted budget: 4*2 + 6 + 12 = 26.
    let interpreted = CompilationSession::with_options(&arena, CompileOptions::interpreted());
    assert_eq!(interpreted.options().target, TargetKind::Interpreted);
    assert!(build(&interpreted));
}

#[test]
fn test_inline_expansion_at_call_site() {
    init_logging();
    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    let mut unit = CompileUnit::new(&session);

    let mut callee = Procedure::new(Some("twice"), "_twice", 0);
    let a = callee.mk_arg(&mut unit.graph, Declaration { name: "a", node_id: 1 });
    let l1 = unit.graph.load(a);
    let l2 = unit.graph.load(a);
    let body = unit.graph.rtcall("add", vec![l1, l2]);
    callee.emit_jmp(&unit.graph, ".ret", Some(body), JmpMode::Always, None);
    callee.emit_lbl_direct(".ret");
    let callee = unit.add_procedure(callee);
    unit.resolve(callee, &session).unwrap();

    let arg = unit.graph.rtcall("input", vec![]);
    let call = unit.call(callee, vec![arg]).unwrap();
    let expanded = unit.inline_call(call, &session).unwrap().expect("inlinable");

    // One hoisted definition read twice by the body.
    assert_eq!(
        unit.graph.render_expr(expanded),
        "(SHARED_DEF(#1: input()); add(SHARED_REF(#1), SHARED_REF(#1)))"
    );
    assert_eq!(unit.graph.node(arg).uses, UseCount::Total(3));
    assert_eq!(session.stats().calls_inlined, 1);
}

#[test]
fn test_debug_mode_disables_inlining() {
    init_logging();
    let arena = Bump::new();
    let session = CompilationSession::with_options(&arena, CompileOptions::native().with_debug(true));
    let mut unit = CompileUnit::new(&session);
    let mut proc = Procedure::new(Some("one"), "_one", 0);
    let one = unit.graph.numlit(1);
    proc.emit_jmp(&unit.graph, ".ret", Some(one), JmpMode::Always, None);
    proc.emit_lbl_direct(".ret");
    let idx = unit.add_procedure(proc);
    unit.resolve(idx, &session).unwrap();

    assert!(unit.procedure(idx).unwrap().inline_body.is_none());
}
