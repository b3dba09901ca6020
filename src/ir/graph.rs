//! The expression graph arena.
//!
//! `IrGraph` owns every expression node and storage cell of a compilation
//! unit, plus the node-id allocator used for debug rendering. Procedures only
//! hold handles into it.

use super::cell::{Cell, CellId};
use super::expr::{
    CallTarget, CallingConvention, ExprId, ExprKind, ExprNode, FieldAccessInfo, LitValue,
    MaskInfo, UseCount,
};
use crate::core::error::{CompileError, CompileResult};
use crate::core::node_id::{NodeId, NodeIdAllocator};
use crate::core::options::TargetKind;
use crate::core::session::CompilationSession;

/// Prefix on runtime call names that drops the reference mask.
pub const NO_MASK_PREFIX: &str = "@nomask@";

/// Arena of expression nodes and cells.
#[derive(Debug)]
pub struct IrGraph<'a> {
    exprs: Vec<ExprNode<'a>>,
    pub(crate) cells: Vec<Cell<'a>>,
    ids: NodeIdAllocator,
    target: TargetKind,
    unnamed_cells: u32,
}

impl<'a> IrGraph<'a> {
    pub fn new(target: TargetKind) -> Self {
        Self {
            exprs: Vec::new(),
            cells: Vec::new(),
            ids: NodeIdAllocator::new(),
            target,
            unnamed_cells: 0,
        }
    }

    /// Graph configured for the session's target.
    pub fn for_session(session: &CompilationSession<'a>) -> Self {
        Self::new(session.options().target)
    }

    pub fn target(&self) -> TargetKind {
        self.target
    }

    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    pub fn node(&self, e: ExprId) -> &ExprNode<'a> {
        &self.exprs[e.index()]
    }

    pub fn node_mut(&mut self, e: ExprId) -> &mut ExprNode<'a> {
        &mut self.exprs[e.index()]
    }

    pub fn kind(&self, e: ExprId) -> ExprKind<'a> {
        self.exprs[e.index()].kind
    }

    pub fn args(&self, e: ExprId) -> &[ExprId] {
        &self.exprs[e.index()].args
    }

    pub fn add(&mut self, node: ExprNode<'a>) -> ExprId {
        let id = ExprId(self.exprs.len() as u32);
        self.exprs.push(node);
        id
    }

    /// Identity of a node, assigned on first request.
    pub fn node_id(&self, e: ExprId) -> NodeId {
        self.exprs[e.index()].id.get_or_assign(&self.ids)
    }

    pub(crate) fn ids(&self) -> &NodeIdAllocator {
        &self.ids
    }

    pub(crate) fn next_unnamed_uid(&mut self) -> u32 {
        let uid = self.unnamed_cells;
        self.unnamed_cells += 1;
        uid
    }

    pub fn cell(&self, c: CellId) -> &Cell<'a> {
        &self.cells[c.index()]
    }

    pub fn cell_mut(&mut self, c: CellId) -> &mut Cell<'a> {
        &mut self.cells[c.index()]
    }

    pub fn try_cell(&self, c: CellId) -> CompileResult<&Cell<'a>> {
        self.cells
            .get(c.index())
            .ok_or(CompileError::UnknownCell { index: c.index() })
    }

    pub(crate) fn add_cell(&mut self, mut cell: Cell<'a>) -> CellId {
        let id = CellId(self.cells.len() as u32);
        cell.id = id;
        self.cells.push(cell);
        id
    }

    // ---------------------------------------------------------------------
    // Constructors
    // ---------------------------------------------------------------------

    pub fn op(&mut self, kind: ExprKind<'a>, args: Vec<ExprId>) -> ExprId {
        self.add(ExprNode::new(kind, args))
    }

    pub fn numlit(&mut self, value: i64) -> ExprId {
        self.op(ExprKind::NumberLiteral(LitValue::Int(value)), Vec::new())
    }

    pub fn boollit(&mut self, value: bool) -> ExprId {
        self.op(ExprKind::NumberLiteral(LitValue::Bool(value)), Vec::new())
    }

    pub fn ptrlit(&mut self, label: &'a str) -> ExprId {
        self.op(ExprKind::PointerLiteral(label), Vec::new())
    }

    /// Pointer literal that addresses string data.
    pub fn string_lit(&mut self, label: &'a str) -> ExprId {
        let e = self.ptrlit(label);
        self.node_mut(e).is_string_literal = true;
        e
    }

    pub fn rtcall(&mut self, name: &'a str, args: Vec<ExprId>) -> ExprId {
        self.op(ExprKind::RuntimeCall(name), args)
    }

    /// Runtime call whose arguments in `ref_mask` are pointers.
    pub fn rtcall_with_mask(&mut self, name: &'a str, args: Vec<ExprId>, ref_mask: u32) -> ExprId {
        let e = self.rtcall(name, args);
        if ref_mask != 0 {
            self.node_mut(e).mask = Some(MaskInfo {
                ref_mask,
                conversions: Vec::new(),
            });
        }
        e
    }

    /// Runtime call with an explicit mask and calling convention. A name
    /// starting with [`NO_MASK_PREFIX`] loses the prefix and the mask.
    pub fn rtcall_mask(
        &mut self,
        name: &'a str,
        ref_mask: u32,
        convention: CallingConvention,
        args: Vec<ExprId>,
    ) -> ExprId {
        let (name, ref_mask) = match name.strip_prefix(NO_MASK_PREFIX) {
            Some(stripped) => (stripped, 0),
            None => (name, ref_mask),
        };
        let e = self.rtcall_with_mask(name, args, ref_mask);
        self.node_mut(e).calling_convention = convention;
        e
    }

    pub fn proc_call(&mut self, target: CallTarget<'a>, args: Vec<ExprId>) -> ExprId {
        self.op(ExprKind::ProcCall(target), args)
    }

    pub fn field_access(&mut self, obj: ExprId, info: FieldAccessInfo<'a>) -> ExprId {
        self.op(ExprKind::FieldAccess(info), vec![obj])
    }

    pub fn store(&mut self, dst: ExprId, src: ExprId) -> ExprId {
        self.op(ExprKind::Store, vec![dst, src])
    }

    pub fn sequence(&mut self, items: Vec<ExprId>) -> ExprId {
        self.op(ExprKind::Sequence, items)
    }

    pub fn jmp_value(&mut self) -> ExprId {
        self.op(ExprKind::JmpValue, Vec::new())
    }

    pub fn nop(&mut self) -> ExprId {
        self.op(ExprKind::Nop, Vec::new())
    }

    pub fn instance_of(&mut self, e: ExprId, class_id: &'a str) -> ExprId {
        self.op(ExprKind::InstanceOf(class_id), vec![e])
    }

    /// The single entry point for sharing.
    ///
    /// References compose instead of nesting, and number literals are
    /// returned unchanged. Anything else gets a fresh `SharedRef`; the first
    /// one met by `resolve` becomes the definition.
    pub fn shared(&mut self, e: ExprId) -> ExprId {
        let target = match self.kind(e) {
            ExprKind::SharedRef => match self.node(e).arg0() {
                Some(inner) => inner,
                None => e,
            },
            ExprKind::NumberLiteral(_) => return e,
            _ => e,
        };
        self.op(ExprKind::SharedRef, vec![target])
    }

    /// Copy of a node with a fresh identity and the same children.
    pub fn duplicate(&mut self, e: ExprId) -> ExprId {
        let copy = self.node(e).duplicate();
        self.add(copy)
    }

    // ---------------------------------------------------------------------
    // Predicates
    // ---------------------------------------------------------------------

    pub fn is_literal(&self, e: ExprId) -> bool {
        self.node(e).is_literal()
    }

    pub fn is_stateless(&self, e: ExprId) -> bool {
        self.node(e).is_stateless()
    }

    pub fn is_pure(&self, e: ExprId) -> bool {
        self.node(e).is_pure()
    }

    /// Whether evaluating `e` may change the contents of a cell.
    pub fn can_update_cells(&self, e: ExprId) -> bool {
        let node = self.node(e);
        match node.kind {
            ExprKind::NumberLiteral(_)
            | ExprKind::PointerLiteral(_)
            | ExprKind::CellRef(_)
            | ExprKind::JmpValue
            | ExprKind::SharedRef
            | ExprKind::Nop => false,

            ExprKind::SharedDef | ExprKind::FieldAccess(_) | ExprKind::InstanceOf(_) => node
                .arg0()
                .map_or(false, |inner| self.can_update_cells(inner)),

            ExprKind::RuntimeCall(_)
            | ExprKind::ProcCall(_)
            | ExprKind::Sequence
            | ExprKind::Store => true,
        }
    }

    /// `curr/total #id` of the value behind `e` (its target, when shared).
    pub fn sharing_info(&self, e: ExprId) -> String {
        let node = self.node(e);
        let subject = if node.kind.is_shared() { node.arg0() } else { Some(e) };
        match subject {
            Some(s) => {
                let target = self.node(s);
                let total = match target.uses {
                    UseCount::Unvisited => String::new(),
                    UseCount::Pending(n) => format!("~{}", n),
                    UseCount::Total(n) => n.to_string(),
                };
                format!("{}/{} {}", target.curr_uses, total, self.node_id(s))
            }
            None => format!("/ {}", self.node_id(e)),
        }
    }

    /// Pre-order walk over `e` and all its descendants.
    pub fn iter_expr(&self, e: ExprId, f: &mut impl FnMut(ExprId)) {
        f(e);
        for &a in &self.node(e).args {
            self.iter_expr(a, f);
        }
    }
}
