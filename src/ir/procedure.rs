//! Procedures: a statement body plus the cell tables it owns.
//!
//! The front end builds a procedure by appending statements in order. Once the
//! body is complete, [`Procedure::resolve`](super::pipeline) rewrites it in place
//! into its final, annotated form.

use super::cell::{Cell, CellId, CellRole, Declaration, VariableInfo};
use super::expr::{ExprId, ExprKind, ProcIdx};
use super::graph::IrGraph;
use super::stmt::{BreakpointInfo, JmpMode, Stmt};
use crate::core::error::{CompileError, CompileResult};
use crate::core::session::CompilationSession;
use hashbrown::HashMap;

/// Where a procedure was declared in source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation<'a> {
    pub file: &'a str,
    /// Zero based.
    pub line: u32,
}

#[derive(Debug)]
pub struct Procedure<'a> {
    pub name: Option<&'a str>,
    pub location: Option<SourceLocation<'a>>,
    /// Function label used by emitters.
    pub label: &'a str,
    pub seq_no: u32,
    /// The top-level program; it keeps its locals alive.
    pub is_root: bool,
    pub body: Vec<Stmt<'a>>,
    pub args: Vec<CellId>,
    pub locals: Vec<CellId>,
    pub captured: Vec<CellId>,
    /// Enclosing procedure of a closure.
    pub parent: Option<ProcIdx>,
    /// Set by `resolve` when the whole procedure reduces to a cheap expression.
    pub inline_body: Option<ExprId>,
    /// Pointer literal references per label name, counted by `resolve`.
    pub label_literal_uses: HashMap<&'a str, u32>,
    /// Breakpoints by id, collected by `resolve`.
    pub breakpoints: HashMap<u32, BreakpointInfo>,
    pub(crate) resolved: bool,
    lbl_no: u32,
}

impl<'a> Procedure<'a> {
    pub fn new(name: Option<&'a str>, label: &'a str, seq_no: u32) -> Self {
        Self {
            name,
            location: None,
            label,
            seq_no,
            is_root: false,
            body: Vec::new(),
            args: Vec::new(),
            locals: Vec::new(),
            captured: Vec::new(),
            parent: None,
            inline_body: None,
            label_literal_uses: HashMap::new(),
            breakpoints: HashMap::new(),
            resolved: false,
            lbl_no: 0,
        }
    }

    /// Drop the body and cell tables to start building again.
    pub fn reset(&mut self) {
        self.body.clear();
        self.lbl_no = 0;
        self.locals.clear();
        self.captured.clear();
        self.args.clear();
        self.inline_body = None;
        self.label_literal_uses.clear();
        self.breakpoints.clear();
        self.resolved = false;
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    pub fn num_args(&self) -> usize {
        self.args.len()
    }

    pub fn name(&self) -> &'a str {
        self.name.unwrap_or("inline")
    }

    /// Name plus source position, for diagnostics.
    pub fn full_name(&self) -> String {
        match self.location {
            Some(loc) => format!("{} {}:{}", self.name(), loc.file, loc.line + 1),
            None => self.name().to_string(),
        }
    }

    /// Label of the argument-adapting entry used for virtual calls.
    pub fn vt_label(&self) -> String {
        format!("{}_args", self.label)
    }

    // ---------------------------------------------------------------------
    // Cells
    // ---------------------------------------------------------------------

    pub fn mk_arg(&mut self, graph: &mut IrGraph<'a>, decl: Declaration<'a>) -> CellId {
        let cell = Cell::new(self.args.len() as u32, CellRole::Arg, Some(decl), VariableInfo::default());
        let id = graph.add_cell(cell);
        self.args.push(id);
        id
    }

    pub fn mk_local(
        &mut self,
        graph: &mut IrGraph<'a>,
        decl: Declaration<'a>,
        info: VariableInfo,
    ) -> CellId {
        let cell = Cell::new(self.locals.len() as u32, CellRole::Local, Some(decl), info);
        let id = graph.add_cell(cell);
        self.locals.push(id);
        id
    }

    /// A compiler temporary local.
    pub fn mk_local_unnamed(&mut self, graph: &mut IrGraph<'a>) -> CellId {
        let uid = graph.next_unnamed_uid();
        let id = graph.add_cell(Cell::temporary(self.locals.len() as u32, uid));
        self.locals.push(id);
        id
    }

    /// A variable of an enclosing procedure captured by this closure.
    pub fn mk_captured(&mut self, graph: &mut IrGraph<'a>, decl: Declaration<'a>) -> CellId {
        let info = VariableInfo {
            captured: true,
            written: false,
        };
        let cell = Cell::new(self.captured.len() as u32, CellRole::Captured, Some(decl), info);
        let id = graph.add_cell(cell);
        self.captured.push(id);
        id
    }

    /// Cell for a declaration: captured first, then locals, then arguments
    /// unless `no_args`.
    pub fn local_index(&self, graph: &IrGraph<'a>, node_id: u32, no_args: bool) -> Option<CellId> {
        let matches = |c: &&CellId| graph.cell(**c).decl.map(|d| d.node_id) == Some(node_id);
        self.captured
            .iter()
            .find(matches)
            .or_else(|| self.locals.iter().find(matches))
            .or_else(|| if no_args { None } else { self.args.iter().find(matches) })
            .copied()
    }

    /// Cells shown in user-facing debug info (temporaries excluded).
    pub fn debug_locals(&self, graph: &IrGraph<'a>) -> Vec<super::cell::CellInfo> {
        self.locals
            .iter()
            .filter_map(|c| graph.cell(*c).debug_info())
            .collect()
    }

    // ---------------------------------------------------------------------
    // Statements
    // ---------------------------------------------------------------------

    pub fn emit(&mut self, stmt: Stmt<'a>) {
        self.body.push(stmt);
    }

    pub fn emit_expr(&mut self, expr: ExprId) {
        self.emit(Stmt::expr_stmt(expr));
    }

    /// Fresh label named `.{name}_{n}_{seq}`; not yet part of the body.
    pub fn mk_label(&mut self, session: &CompilationSession<'a>, name: &str) -> Stmt<'a> {
        let full = format!(".{}_{}_{}", name, self.lbl_no, self.seq_no);
        self.lbl_no += 1;
        Stmt::label(session.intern_str(&full))
    }

    pub fn emit_lbl(&mut self, lbl: Stmt<'a>) {
        debug_assert!(lbl.is_label());
        self.emit(lbl);
    }

    pub fn emit_lbl_direct(&mut self, name: &'a str) {
        self.emit(Stmt::label(name));
    }

    pub fn stack_empty(&mut self) {
        self.emit(Stmt::stack_empty());
    }

    pub fn emit_breakpoint(&mut self, info: BreakpointInfo) {
        self.emit(Stmt::breakpoint(info));
    }

    /// Emit a jump. A number literal never needs its storage released, so it
    /// is not kept as `terminate`.
    pub fn emit_jmp(
        &mut self,
        graph: &IrGraph<'a>,
        label_name: &'a str,
        expr: Option<ExprId>,
        mode: JmpMode,
        terminate: Option<ExprId>,
    ) {
        let terminate =
            terminate.filter(|t| !matches!(graph.kind(*t), ExprKind::NumberLiteral(_)));
        let mut jmp = Stmt::jmp(label_name, expr, mode);
        if let super::stmt::StmtKind::Jmp(info) = &mut jmp.kind {
            info.terminate_expr = terminate;
        }
        self.emit(jmp);
    }

    /// Emit a jump to an existing label statement. Anything other than a
    /// label as target is an internal error.
    pub fn emit_jmp_to(
        &mut self,
        graph: &IrGraph<'a>,
        lbl: &Stmt<'a>,
        expr: Option<ExprId>,
        mode: JmpMode,
    ) -> CompileResult<()> {
        let name = lbl.as_label().map(|l| l.name).ok_or(CompileError::UnexpectedNode {
            kind: lbl.kind.name(),
            phase: "emit_jmp_to",
        })?;
        self.emit_jmp(graph, name, expr, mode, None);
        Ok(())
    }

    pub fn emit_jmp_z(&mut self, graph: &IrGraph<'a>, label_name: &'a str, expr: ExprId) {
        self.emit_jmp(graph, label_name, Some(expr), JmpMode::IfZero, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::options::TargetKind;
    use crate::ir::stmt::StmtKind;
    use bumpalo::Bump;

    #[test]
    fn test_labels_are_numbered_per_procedure() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let mut proc = Procedure::new(Some("loop"), "_loop", 4);

        let a = proc.mk_label(&session, "brk");
        let b = proc.mk_label(&session, "cont");
        assert_eq!(a.label_name(), Some(".brk_0_4"));
        assert_eq!(b.label_name(), Some(".cont_1_4"));

        proc.emit_lbl(a);
        assert_eq!(proc.body.len(), 1);
    }

    #[test]
    fn test_jmp_drops_literal_terminate() {
        let mut graph = IrGraph::new(TargetKind::Native);
        let mut proc = Procedure::new(Some("f"), "_f", 0);
        let lit = graph.numlit(0);
        let call = graph.rtcall("g", vec![]);

        proc.emit_jmp(&graph, ".a", None, JmpMode::Always, Some(lit));
        proc.emit_jmp(&graph, ".a", Some(call), JmpMode::IfNotZero, Some(call));

        match (&proc.body[0].kind, &proc.body[1].kind) {
            (StmtKind::Jmp(first), StmtKind::Jmp(second)) => {
                assert_eq!(first.terminate_expr, None);
                assert_eq!(second.terminate_expr, Some(call));
                assert_eq!(second.mode, JmpMode::IfNotZero);
            }
            other => panic!("unexpected statements: {:?}", other),
        }
    }

    #[test]
    fn test_local_index_lookup_order() {
        let mut graph = IrGraph::new(TargetKind::Native);
        let mut proc = Procedure::new(Some("f"), "_f", 0);
        let decl = Declaration { name: "x", node_id: 11 };

        let arg = proc.mk_arg(&mut graph, decl);
        assert_eq!(proc.local_index(&graph, 11, false), Some(arg));
        assert_eq!(proc.local_index(&graph, 11, true), None);

        let local = proc.mk_local(&mut graph, decl, VariableInfo::default());
        assert_eq!(proc.local_index(&graph, 11, false), Some(local));

        let cap = proc.mk_captured(&mut graph, decl);
        assert_eq!(proc.local_index(&graph, 11, false), Some(cap));
        assert_eq!(proc.local_index(&graph, 99, false), None);
    }

    #[test]
    fn test_temporaries_hidden_from_debug_locals() {
        let mut graph = IrGraph::new(TargetKind::Native);
        let mut proc = Procedure::new(None, "_inline", 0);
        proc.mk_local(&mut graph, Declaration { name: "sum", node_id: 1 }, VariableInfo::default());
        let tmp = proc.mk_local_unnamed(&mut graph);

        assert_eq!(proc.locals.len(), 2);
        assert!(graph.cell(tmp).is_temporary());
        let names: Vec<_> = proc.debug_locals(&graph).into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["sum".to_string()]);
        assert_eq!(proc.name(), "inline");
    }

    #[test]
    fn test_full_name_uses_one_based_line() {
        let mut proc = Procedure::new(Some("main"), "_main", 0);
        proc.location = Some(SourceLocation { file: "main.ts", line: 9 });
        assert_eq!(proc.full_name(), "main main.ts:10");
        assert_eq!(proc.vt_label(), "_main_args");
    }

    #[test]
    fn test_jmp_to_requires_label_target() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let mut graph = IrGraph::new(TargetKind::Native);
        let mut proc = Procedure::new(Some("f"), "_f", 0);
        let call = graph.rtcall("f", vec![]);

        let err = proc
            .emit_jmp_to(&graph, &Stmt::stack_empty(), Some(call), JmpMode::Always)
            .unwrap_err();
        assert_eq!(
            err,
            CompileError::UnexpectedNode { kind: "stack-empty", phase: "emit_jmp_to" }
        );

        let exit = proc.mk_label(&session, "exit");
        proc.emit_jmp(&graph, exit.label_name().unwrap(), None, JmpMode::Always, None);
        let jmp = proc.body[0].clone();
        assert!(proc.emit_jmp_to(&graph, &jmp, Some(call), JmpMode::Always).is_err());
        assert_eq!(proc.body.len(), 1);

        proc.emit_jmp_to(&graph, &exit, Some(call), JmpMode::IfZero).unwrap();
        assert_eq!(proc.body.len(), 2);
        assert_eq!(proc.body[1].label_name(), Some(".exit_0_0"));
    }
}
