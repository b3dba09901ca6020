//! Argument flattening for calls.
//!
//! A backend that evaluates call arguments in a different order than the
//! source (or interleaves them with other work) must not let a later argument
//! observe state changed by an earlier one. Flattening hoists every argument
//! that could be disturbed into a shared precomputation, evaluated in source
//! order ahead of the call, and leaves a reference in its place.

use super::expr::{ExprId, ExprKind, UseCount};
use super::graph::IrGraph;
use crate::core::options::CompileOptions;

/// Result of [`IrGraph::flatten_args`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FlattenedArgs {
    /// Definitions to evaluate first, in source order.
    pub precomp: Vec<ExprId>,
    /// One replacement per original argument.
    pub flattened: Vec<ExprId>,
}

impl<'a> IrGraph<'a> {
    /// Which arguments must be evaluated ahead of the call.
    ///
    /// Scans right to left. Stateless arguments never need it; a plain cell
    /// read only needs it once some argument to its right may write cells.
    pub fn complex_args(&self, args: &[ExprId], options: &CompileOptions) -> Vec<bool> {
        let mut complex = vec![false; args.len()];
        if self.target().is_stack_machine() {
            return complex;
        }

        let mut state_changed =
            options.eager_ordering && args.iter().any(|&a| self.can_update_cells(a));

        for (i, &arg) in args.iter().enumerate().rev() {
            if self.is_stateless(arg) {
                continue;
            }
            if matches!(self.kind(arg), ExprKind::CellRef(_)) && !state_changed {
                continue;
            }
            complex[i] = true;
            if self.can_update_cells(arg) {
                state_changed = true;
            }
        }

        complex
    }

    /// Rewrite call arguments so their evaluation order cannot be observed.
    pub fn flatten_args(&mut self, args: &[ExprId], options: &CompileOptions) -> FlattenedArgs {
        let complex = self.complex_args(args, options);
        let mut out = FlattenedArgs {
            precomp: Vec::new(),
            flattened: Vec::with_capacity(args.len()),
        };

        for (&arg, is_complex) in args.iter().zip(complex) {
            if !is_complex {
                out.flattened.push(arg);
                continue;
            }

            if let ExprKind::SharedDef = self.kind(arg) {
                if let Some(target) = self.node(arg).arg0() {
                    let node = self.node_mut(target);
                    if let UseCount::Total(n) = node.uses {
                        node.uses = UseCount::Total(n + 1);
                    }
                    let reference = self.op(ExprKind::SharedRef, vec![target]);
                    out.precomp.push(arg);
                    out.flattened.push(reference);
                    continue;
                }
            }

            let reference = self.shared(arg);
            let target = self.args(reference)[0];
            let def = self.op(ExprKind::SharedDef, vec![target]);
            let node = self.node_mut(target);
            node.uses = UseCount::Total(2);
            node.curr_uses = 0;
            out.precomp.push(def);
            out.flattened.push(reference);
        }

        out
    }
}
