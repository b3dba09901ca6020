// This module implements Procedure::resolve, the single optimization entry point run once a
// procedure's body is complete. It is a fixed sequence of rewrites over the statement list and
// the expression graph: a discovery walk promotes the first reference of every shared value to
// its definition and counts occurrences; sequences lose pure non-final items and expression
// statements that compute nothing observable are dropped; labels are looked up and jumps linked
// to them; a second walk establishes real use counts and strips definitions with a single use;
// unconditional jumps straight into the next label are marked so the emitter can elide them; a
// final walk unwraps shares that ended up single-use while tracking whether the whole body is a
// single returned expression, which is then costed for inlining. Every inconsistency found on the
// way is an internal compiler error and aborts the procedure.

//! The `resolve` pipeline.

use super::cost::inline_cost;
use super::expr::{ExprId, ExprKind, UseCount};
use super::graph::IrGraph;
use super::procedure::Procedure;
use super::stmt::{JmpMode, LabelUses, StmtKind};
use crate::core::error::{CompileError, CompileResult};
use crate::core::session::CompilationSession;
use hashbrown::HashMap;
use log::{debug, trace, warn};

type Pass<'g, 'a> = fn(&mut Passes<'g, 'a>, ExprId) -> CompileResult<ExprId>;

/// Expression rewrites shared by the pipeline phases.
pub(crate) struct Passes<'g, 'a> {
    pub(crate) graph: &'g mut IrGraph<'a>,
    label_literal_uses: HashMap<&'a str, u32>,
    unwrapped: usize,
}

impl<'g, 'a> Passes<'g, 'a> {
    pub(crate) fn new(graph: &'g mut IrGraph<'a>) -> Self {
        Self {
            graph,
            label_literal_uses: HashMap::new(),
            unwrapped: 0,
        }
    }

    fn map_args(&mut self, e: ExprId, pass: Pass<'g, 'a>) -> CompileResult<()> {
        let args = self.graph.args(e).to_vec();
        for (i, arg) in args.into_iter().enumerate() {
            let rewritten = pass(self, arg)?;
            if rewritten != arg {
                self.graph.node_mut(e).args[i] = rewritten;
            }
        }
        Ok(())
    }

    fn shared_target(&self, e: ExprId) -> CompileResult<ExprId> {
        self.graph.node(e).arg0().ok_or_else(|| {
            CompileError::use_count(format!(
                "shared node {} has no target",
                self.graph.node_id(e)
            ))
        })
    }

    fn start_counting(&mut self, target: ExprId) {
        let node = self.graph.node_mut(target);
        node.uses = UseCount::Pending(1);
        node.curr_uses = 0;
        node.ir_curr_uses = 0;
    }

    /// Promote the first reference of each shared value to its definition and
    /// count how many places mention it.
    pub(crate) fn refdef(&mut self, e: ExprId) -> CompileResult<ExprId> {
        match self.graph.kind(e) {
            ExprKind::SharedDef => {
                // Produced by flattening before resolve: this is the definition site.
                let target = self.shared_target(e)?;
                if self.graph.node(target).uses.is_pending() {
                    return Err(CompileError::use_count(format!(
                        "value {} has two definitions",
                        self.graph.node_id(target)
                    )));
                }
                self.start_counting(target);
                let target = self.refdef(target)?;
                self.graph.node_mut(e).args[0] = target;
                Ok(e)
            }
            ExprKind::SharedRef => {
                let target = self.shared_target(e)?;
                if let UseCount::Pending(n) = self.graph.node(target).uses {
                    self.graph.node_mut(target).uses = UseCount::Pending(n + 1);
                    return Ok(e);
                }
                self.start_counting(target);
                let def = self.graph.duplicate(e);
                self.graph.node_mut(def).kind = ExprKind::SharedDef;
                let target = self.refdef(target)?;
                self.graph.node_mut(def).args[0] = target;
                Ok(def)
            }
            _ => {
                self.map_args(e, Self::refdef)?;
                Ok(e)
            }
        }
    }

    /// Drop pure non-final items of sequences.
    pub(crate) fn opt(&mut self, e: ExprId) -> CompileResult<ExprId> {
        if let ExprKind::SharedRef = self.graph.kind(e) {
            return Ok(e);
        }

        self.map_args(e, Self::opt)?;

        if let ExprKind::Sequence = self.graph.kind(e) {
            let items = self.graph.args(e).to_vec();
            let last = items.len().saturating_sub(1);
            let mut kept = Vec::with_capacity(items.len());
            for (i, item) in items.into_iter().enumerate() {
                if i != last && self.graph.is_pure(item) {
                    // Once counts are established they must follow the drop.
                    if let ExprKind::SharedRef = self.graph.kind(item) {
                        let target = self.shared_target(item)?;
                        if let UseCount::Total(n) = self.graph.node(target).uses {
                            if n > 0 {
                                self.graph.node_mut(target).uses = UseCount::Total(n - 1);
                            }
                        }
                    }
                    continue;
                }
                kept.push(item);
            }
            self.graph.node_mut(e).args = kept;
        }

        Ok(e)
    }

    /// Establish real use counts; definitions with a single occurrence vanish.
    pub(crate) fn cntuses(&mut self, e: ExprId) -> CompileResult<ExprId> {
        match self.graph.kind(e) {
            ExprKind::SharedDef => {
                let target = self.shared_target(e)?;
                let (uses, curr_uses) = {
                    let node = self.graph.node(target);
                    (node.uses, node.curr_uses)
                };
                let pending = match uses {
                    UseCount::Pending(n) => n,
                    other => {
                        return Err(CompileError::use_count(format!(
                            "definition of {} reached with {:?}",
                            self.graph.node_id(target),
                            other
                        )))
                    }
                };
                if curr_uses != 0 {
                    return Err(CompileError::use_count(format!(
                        "definition of {} already consumed",
                        self.graph.node_id(target)
                    )));
                }
                if pending == 1 {
                    self.unwrapped += 1;
                    return self.cntuses(target);
                }
                self.graph.node_mut(target).uses = UseCount::Total(1);
            }
            ExprKind::SharedRef => {
                let target = self.shared_target(e)?;
                return match self.graph.node(target).uses {
                    UseCount::Total(n) if n > 0 => {
                        self.graph.node_mut(target).uses = UseCount::Total(n + 1);
                        Ok(e)
                    }
                    other => Err(CompileError::use_count(format!(
                        "reference to {} before its definition ({:?})",
                        self.graph.node_id(target),
                        other
                    ))),
                };
            }
            ExprKind::PointerLiteral(label) => {
                *self.label_literal_uses.entry(label).or_insert(0) += 1;
                return Ok(e);
            }
            _ => {}
        }

        self.map_args(e, Self::cntuses)?;
        Ok(e)
    }

    /// Unwrap shares left with a single use and advance the emission counter
    /// of the others.
    pub(crate) fn sharedincr(&mut self, e: ExprId) -> CompileResult<ExprId> {
        let kind = self.graph.kind(e);
        match kind {
            ExprKind::SharedDef | ExprKind::SharedRef => {
                if let ExprKind::SharedDef = kind {
                    self.map_args(e, Self::sharedincr)?;
                }
                let target = self.shared_target(e)?;
                let total = match self.graph.node(target).uses {
                    UseCount::Total(n) if n > 0 => n,
                    other => {
                        return Err(CompileError::use_count(format!(
                            "{} of {} has {:?}",
                            kind.name(),
                            self.graph.node_id(target),
                            other
                        )))
                    }
                };
                if total == 1 {
                    if let ExprKind::SharedRef = kind {
                        return Err(CompileError::use_count(format!(
                            "reference to single-use value {}",
                            self.graph.node_id(target)
                        )));
                    }
                    self.unwrapped += 1;
                    return Ok(target);
                }
                self.graph.node_mut(target).ir_curr_uses += 1;
                Ok(e)
            }
            _ => {
                self.map_args(e, Self::sharedincr)?;
                Ok(e)
            }
        }
    }
}

impl<'a> Procedure<'a> {
    /// Rewrite the body into its final annotated form.
    ///
    /// Runs once per procedure after construction. On success the body,
    /// use counts, label uses and `inline_body` are authoritative for the
    /// emitter. Any error is an internal compiler error.
    pub fn resolve(
        &mut self,
        graph: &mut IrGraph<'a>,
        session: &CompilationSession<'a>,
    ) -> CompileResult<()> {
        if self.resolved {
            warn!("{} resolved more than once", self.full_name());
        }

        let options = session.options();
        let initial_len = self.body.len();
        let mut passes = Passes::new(graph);

        // Sharing discovery and dead expression statements.
        let body = std::mem::take(&mut self.body);
        let mut kept = Vec::with_capacity(body.len());
        for mut stmt in body {
            if let Some(e) = stmt.expr {
                let e = passes.refdef(e)?;
                let e = passes.opt(e)?;
                stmt.expr = Some(e);
                if let StmtKind::Expr = stmt.kind {
                    if passes.graph.is_pure(e) {
                        continue;
                    }
                }
            }
            kept.push(stmt);
        }
        self.body = kept;

        // Label lookup and statement numbers.
        let mut labels: HashMap<&'a str, usize> = HashMap::new();
        for (i, stmt) in self.body.iter_mut().enumerate() {
            stmt.stmt_no = i;
            if let StmtKind::Label(l) = &mut stmt.kind {
                l.num_uses = LabelUses::Count(0);
                l.lit_uses = 0;
                if labels.insert(l.name, i).is_some() {
                    return Err(CompileError::DuplicateLabel {
                        label: l.name.to_string(),
                    });
                }
            }
        }

        // Real use counts and jump resolution.
        for i in 0..self.body.len() {
            if let Some(e) = self.body[i].expr {
                let e = passes.cntuses(e)?;
                self.body[i].expr = Some(e);
            }

            let name = match &self.body[i].kind {
                StmtKind::Jmp(j) => j.label_name,
                _ => continue,
            };
            let target = *labels.get(name).ok_or_else(|| CompileError::MissingLabel {
                label: name.to_string(),
            })?;
            if let StmtKind::Jmp(j) = &mut self.body[i].kind {
                j.target = Some(target);
            }
            if let StmtKind::Label(l) = &mut self.body[target].kind {
                l.num_uses = match l.num_uses {
                    LabelUses::Count(n) => LabelUses::Count(n + 1),
                    LabelUses::JumpToNext => LabelUses::Count(2),
                };
            }
        }

        let literal_uses = std::mem::take(&mut passes.label_literal_uses);
        for stmt in self.body.iter_mut() {
            if let StmtKind::Label(l) = &mut stmt.kind {
                l.lit_uses = literal_uses.get(l.name).copied().unwrap_or(0);
            }
        }
        self.label_literal_uses = literal_uses;

        // Jumps that only fall into the next statement.
        let mut jump_to_next = 0;
        for i in 0..self.body.len().saturating_sub(1) {
            let falls_through = match &self.body[i].kind {
                StmtKind::Jmp(j) => j.mode == JmpMode::Always && j.target == Some(i + 1),
                _ => false,
            };
            if !falls_through {
                continue;
            }
            if let StmtKind::Label(l) = &mut self.body[i + 1].kind {
                if l.num_uses == LabelUses::Count(1) {
                    l.num_uses = LabelUses::JumpToNext;
                    jump_to_next += 1;
                }
            }
        }

        // Final unwrap, breakpoint table and inline shape.
        let mut eligible = !options.debug;
        let mut candidate: Option<ExprId> = None;
        self.breakpoints.clear();
        for i in 0..self.body.len() {
            if let Some(e) = self.body[i].expr {
                let e = passes.sharedincr(e)?;
                let e = passes.opt(e)?;
                self.body[i].expr = Some(e);
            }

            if let StmtKind::Breakpoint(bp) = &self.body[i].kind {
                self.breakpoints.insert(bp.id, *bp);
            }

            if !eligible {
                continue;
            }
            let stmt = &self.body[i];
            match &stmt.kind {
                StmtKind::StackEmpty => {}
                StmtKind::Label(l) if l.num_uses == LabelUses::JumpToNext => {}
                StmtKind::Jmp(j)
                    if j.mode == JmpMode::Always && stmt.expr.is_some() && candidate.is_none() =>
                {
                    candidate = stmt.expr;
                }
                _ => {
                    eligible = false;
                    candidate = None;
                }
            }
        }

        let unwrapped = passes.unwrapped;
        drop(passes);

        // Inline cost decision.
        self.inline_body = None;
        if let (true, Some(body)) = (eligible, candidate) {
            let policy = &options.inline_policy;
            let budget = policy.budget(self.args.len(), options.target);
            match inline_cost(graph, body, policy) {
                Some(cost) if cost <= budget => {
                    debug!("{} is inlinable (cost {} <= {})", self.name(), cost, budget);
                    self.inline_body = Some(body);
                    session.record_inlinable();
                }
                Some(cost) => trace!("{} too expensive to inline ({} > {})", self.name(), cost, budget),
                None => trace!("{} has a non-inlinable body", self.name()),
            }
        }

        self.resolved = true;
        session.record_procedure_resolved(
            self.name(),
            initial_len.saturating_sub(self.body.len()),
            self.body.len(),
        );
        session.record_shares_unwrapped(unwrapped);
        session.record_jump_to_next(jump_to_next);

        debug!(
            "Resolved {}: {} -> {} statements",
            self.full_name(),
            initial_len,
            self.body.len()
        );
        trace!("{}", self.render(graph));

        Ok(())
    }
}
