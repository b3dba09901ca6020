//! Call-site expansion of procedures with a recorded inline body.

use super::expr::{ExprId, ExprKind, UseCount};
use super::flatten::FlattenedArgs;
use super::graph::IrGraph;
use super::procedure::Procedure;
use crate::core::error::{CompileError, CompileResult};
use crate::core::options::CompileOptions;

impl<'a> IrGraph<'a> {
    /// Copy of an inline body with argument cells replaced by their bound
    /// replacement expressions.
    pub(crate) fn inline_subst(&mut self, e: ExprId) -> CompileResult<ExprId> {
        match self.kind(e) {
            ExprKind::NumberLiteral(_) | ExprKind::PointerLiteral(_) => Ok(self.duplicate(e)),
            ExprKind::CellRef(cell) => {
                let repl = self.cell(cell).repl;
                match repl {
                    Some(repl) => {
                        self.cell_mut(cell).repl_uses += 1;
                        Ok(repl)
                    }
                    None => Ok(self.duplicate(e)),
                }
            }
            ExprKind::RuntimeCall(_) | ExprKind::FieldAccess(_) => {
                let args = self.args(e).to_vec();
                let mut substituted = Vec::with_capacity(args.len());
                for arg in args {
                    substituted.push(self.inline_subst(arg)?);
                }
                let copy = self.duplicate(e);
                self.node_mut(copy).args = substituted;
                Ok(copy)
            }
            other => Err(CompileError::UnexpectedNode {
                kind: other.name(),
                phase: "inline substitution",
            }),
        }
    }
}

impl<'a> Procedure<'a> {
    /// Expand this procedure's inline body for a call with `call_args`.
    ///
    /// Arguments are flattened first. The replacements are bound only for the
    /// duration of the substitution; afterwards every hoisted argument's use
    /// count reflects how many times the body actually read it.
    pub fn inline_self(
        &self,
        graph: &mut IrGraph<'a>,
        options: &CompileOptions,
        call_args: &[ExprId],
    ) -> CompileResult<ExprId> {
        let body = self.inline_body.ok_or_else(|| CompileError::NotInlinable {
            proc: self.full_name(),
        })?;
        if call_args.len() != self.args.len() {
            return Err(CompileError::ArgCountMismatch {
                proc: self.full_name(),
                expected: self.args.len(),
                actual: call_args.len(),
            });
        }

        let FlattenedArgs { precomp, flattened } = graph.flatten_args(call_args, options);

        for (&cell, &repl) in self.args.iter().zip(&flattened) {
            let cell = graph.cell_mut(cell);
            cell.repl = Some(repl);
            cell.repl_uses = 0;
        }

        let expanded = graph.inline_subst(body);

        // Unbind even when substitution failed.
        for (&cell, &repl) in self.args.iter().zip(&flattened) {
            let uses = {
                let cell = graph.cell_mut(cell);
                cell.repl = None;
                cell.repl_uses
            };
            if !matches!(graph.kind(repl), ExprKind::SharedRef) {
                continue;
            }
            if let Some(target) = graph.node(repl).arg0() {
                let node = graph.node_mut(target);
                if let UseCount::Total(n) = node.uses {
                    // The flattened reference itself was counted once.
                    node.uses = UseCount::Total((n + uses).saturating_sub(1));
                }
            }
        }

        let expanded = expanded?;
        if precomp.is_empty() {
            return Ok(expanded);
        }
        let mut items = precomp;
        items.push(expanded);
        Ok(graph.sequence(items))
    }
}
