//! A compilation unit: one expression graph shared by all procedures.

use super::cell::{CellId, Declaration};
use super::expr::{CallTarget, ExprId, ExprKind, ProcIdx};
use super::graph::IrGraph;
use super::procedure::Procedure;
use crate::core::error::{CompileError, CompileResult};
use crate::core::session::CompilationSession;
use log::debug;

#[derive(Debug)]
pub struct CompileUnit<'a> {
    pub graph: IrGraph<'a>,
    pub procs: Vec<Procedure<'a>>,
    pub globals: Vec<CellId>,
}

impl<'a> CompileUnit<'a> {
    pub fn new(session: &CompilationSession<'a>) -> Self {
        Self {
            graph: IrGraph::for_session(session),
            procs: Vec::new(),
            globals: Vec::new(),
        }
    }

    pub fn add_procedure(&mut self, proc: Procedure<'a>) -> ProcIdx {
        let idx = ProcIdx(self.procs.len() as u32);
        self.procs.push(proc);
        idx
    }

    pub fn procedure(&self, idx: ProcIdx) -> CompileResult<&Procedure<'a>> {
        self.procs
            .get(idx.index())
            .ok_or(CompileError::UnknownProcedure { index: idx.index() })
    }

    pub fn procedure_mut(&mut self, idx: ProcIdx) -> CompileResult<&mut Procedure<'a>> {
        self.procs
            .get_mut(idx.index())
            .ok_or(CompileError::UnknownProcedure { index: idx.index() })
    }

    pub fn find(&self, name: &str) -> Option<ProcIdx> {
        self.procs
            .iter()
            .position(|p| p.name == Some(name))
            .map(|i| ProcIdx(i as u32))
    }

    pub fn mk_global(&mut self, decl: Declaration<'a>) -> CellId {
        let cell = self.graph.mk_global(self.globals.len() as u32, decl);
        self.globals.push(cell);
        cell
    }

    /// Direct call to a procedure of this unit.
    pub fn call(&mut self, callee: ProcIdx, args: Vec<ExprId>) -> CompileResult<ExprId> {
        let name = self.procedure(callee)?.name();
        Ok(self.graph.proc_call(CallTarget::Direct { proc: callee, name }, args))
    }

    pub fn resolve(&mut self, idx: ProcIdx, session: &CompilationSession<'a>) -> CompileResult<()> {
        let proc = self
            .procs
            .get_mut(idx.index())
            .ok_or(CompileError::UnknownProcedure { index: idx.index() })?;
        proc.resolve(&mut self.graph, session)
    }

    /// Resolve every procedure in declaration order.
    pub fn resolve_all(&mut self, session: &CompilationSession<'a>) -> CompileResult<()> {
        for proc in self.procs.iter_mut() {
            proc.resolve(&mut self.graph, session)?;
        }
        Ok(())
    }

    /// Expansion of a direct call, when the callee has an inline body.
    pub fn inline_call(
        &mut self,
        call: ExprId,
        session: &CompilationSession<'a>,
    ) -> CompileResult<Option<ExprId>> {
        let callee = match self.graph.kind(call) {
            ExprKind::ProcCall(CallTarget::Direct { proc, .. }) => proc,
            _ => return Ok(None),
        };
        let proc = self
            .procs
            .get(callee.index())
            .ok_or(CompileError::UnknownProcedure { index: callee.index() })?;
        if proc.inline_body.is_none() {
            return Ok(None);
        }

        let args = self.graph.args(call).to_vec();
        let expanded = proc.inline_self(&mut self.graph, session.options(), &args)?;
        session.record_call_inlined(proc.name());
        Ok(Some(expanded))
    }

    /// Expand inlinable calls in the body of `idx` before it is resolved.
    ///
    /// Shared values are left in place; only their children are visited, so
    /// every reference keeps reading the same definition.
    pub fn inline_calls(
        &mut self,
        idx: ProcIdx,
        session: &CompilationSession<'a>,
    ) -> CompileResult<usize> {
        let exprs: Vec<(usize, ExprId)> = self
            .procedure(idx)?
            .body
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.expr.map(|e| (i, e)))
            .collect();

        let mut count = 0;
        for (i, e) in exprs {
            let rewritten = self.inline_in_expr(e, session, &mut count)?;
            if rewritten != e {
                self.procedure_mut(idx)?.body[i].expr = Some(rewritten);
            }
        }
        if count > 0 {
            debug!("Inlined {} calls in {}", count, self.procedure(idx)?.name());
        }
        Ok(count)
    }

    fn inline_in_expr(
        &mut self,
        e: ExprId,
        session: &CompilationSession<'a>,
        count: &mut usize,
    ) -> CompileResult<ExprId> {
        if self.graph.kind(e).is_shared() {
            if let Some(target) = self.graph.node(e).arg0() {
                self.inline_in_children(target, session, count)?;
            }
            return Ok(e);
        }

        self.inline_in_children(e, session, count)?;
        match self.inline_call(e, session)? {
            Some(expanded) => {
                *count += 1;
                Ok(expanded)
            }
            None => Ok(e),
        }
    }

    fn inline_in_children(
        &mut self,
        e: ExprId,
        session: &CompilationSession<'a>,
        count: &mut usize,
    ) -> CompileResult<()> {
        let args = self.graph.args(e).to_vec();
        for (i, arg) in args.into_iter().enumerate() {
            let rewritten = self.inline_in_expr(arg, session, count)?;
            if rewritten != arg {
                self.graph.node_mut(e).args[i] = rewritten;
            }
        }
        Ok(())
    }

    /// Debug rendering of every procedure.
    pub fn render(&self) -> String {
        self.procs.iter().map(|p| p.render(&self.graph)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::stmt::JmpMode;
    use bumpalo::Bump;

    fn build_inc<'a>(unit: &mut CompileUnit<'a>) -> ProcIdx {
        let mut proc = Procedure::new(Some("inc"), "_inc", 0);
        let a = proc.mk_arg(&mut unit.graph, Declaration { name: "a", node_id: 1 });
        let load = unit.graph.load(a);
        let one = unit.graph.numlit(1);
        let add = unit.graph.rtcall("numops::adds", vec![load, one]);
        proc.emit_jmp(&unit.graph, ".ret", Some(add), JmpMode::Always, None);
        proc.emit_lbl_direct(".ret");
        unit.add_procedure(proc)
    }

    #[test]
    fn test_inline_calls_before_resolve() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let mut unit = CompileUnit::new(&session);

        let inc = build_inc(&mut unit);
        unit.resolve(inc, &session).unwrap();
        assert!(unit.procedure(inc).unwrap().inline_body.is_some());

        let mut main = Procedure::new(Some("main"), "_main", 1);
        main.is_root = true;
        let main_idx = unit.add_procedure(main);

        let read = unit.graph.rtcall("read", vec![]);
        let call = unit.call(inc, vec![read]).unwrap();
        let print = unit.graph.rtcall("print", vec![call]);
        unit.procedure_mut(main_idx).unwrap().emit_expr(print);

        assert_eq!(unit.inline_calls(main_idx, &session).unwrap(), 1);
        unit.resolve(main_idx, &session).unwrap();

        // The hoisted argument is evaluated ahead of the expanded body.
        let main = unit.procedure(main_idx).unwrap();
        let rendered = unit.graph.render_expr(main.body[0].expr.unwrap());
        assert_eq!(
            rendered,
            "print((SHARED_DEF(#1: read()); numops::adds(SHARED_REF(#1), 1)))"
        );
        assert_eq!(session.stats().calls_inlined, 1);
    }

    #[test]
    fn test_call_to_unknown_procedure() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let mut unit = CompileUnit::new(&session);
        let err = unit.call(ProcIdx(3), vec![]).unwrap_err();
        assert_eq!(err, CompileError::UnknownProcedure { index: 3 });
    }

    #[test]
    fn test_find_and_globals() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        let mut unit = CompileUnit::new(&session);
        let idx = build_inc(&mut unit);
        assert_eq!(unit.find("inc"), Some(idx));
        assert_eq!(unit.find("dec"), None);

        let g0 = unit.mk_global(Declaration { name: "counter", node_id: 9 });
        let g1 = unit.mk_global(Declaration { name: "limit", node_id: 10 });
        assert_eq!(unit.graph.cell(g1).index, 1);
        assert!(unit.graph.cell(g0).is_global());
    }
}
