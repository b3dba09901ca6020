//! Expression nodes.
//!
//! An expression is a node in the [`IrGraph`](super::IrGraph) arena, addressed
//! by an [`ExprId`]. Sharing works by identity of handles: the single
//! `SharedDef` of a value and every `SharedRef` to it hold the same child
//! `ExprId`, so the value is evaluated once no matter how often it is read.

use super::cell::CellId;
use crate::core::node_id::LazyId;
use std::fmt;

/// Handle to an expression node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(pub(crate) u32);

impl ExprId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle to a procedure within a [`CompileUnit`](super::CompileUnit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcIdx(pub u32);

impl ProcIdx {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Value of a number literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LitValue {
    Int(i64),
    Bool(bool),
}

impl fmt::Display for LitValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LitValue::Int(v) => write!(f, "{}", v),
            LitValue::Bool(v) => write!(f, "{}", v),
        }
    }
}

/// Field descriptor carried by a field access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldAccessInfo<'a> {
    pub name: &'a str,
    pub index: u32,
    /// A runtime class check guards the access.
    pub checked: bool,
}

/// Target of a procedure call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallTarget<'a> {
    Direct { proc: ProcIdx, name: &'a str },
    Virtual { index: u32 },
    Iface { index: u32 },
}

/// Calling convention of a call node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallingConvention {
    #[default]
    Plain,
    Async,
    Promise,
}

/// Argument conversion applied by a runtime call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvInfo {
    pub arg_idx: u32,
    pub method: String,
    pub returns_ref: bool,
}

/// Which arguments of a call are pointers, for a conservative collector.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MaskInfo {
    pub ref_mask: u32,
    pub conversions: Vec<ConvInfo>,
}

/// Kind of an expression, with the payload that belongs to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprKind<'a> {
    NumberLiteral(LitValue),
    PointerLiteral(&'a str),
    RuntimeCall(&'a str),
    ProcCall(CallTarget<'a>),
    SharedRef,
    SharedDef,
    FieldAccess(FieldAccessInfo<'a>),
    Store,
    CellRef(CellId),
    Sequence,
    JmpValue,
    Nop,
    InstanceOf(&'a str),
}

impl ExprKind<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            ExprKind::NumberLiteral(_) => "number literal",
            ExprKind::PointerLiteral(_) => "pointer literal",
            ExprKind::RuntimeCall(_) => "runtime call",
            ExprKind::ProcCall(_) => "procedure call",
            ExprKind::SharedRef => "shared reference",
            ExprKind::SharedDef => "shared definition",
            ExprKind::FieldAccess(_) => "field access",
            ExprKind::Store => "store",
            ExprKind::CellRef(_) => "cell reference",
            ExprKind::Sequence => "sequence",
            ExprKind::JmpValue => "jump value",
            ExprKind::Nop => "nop",
            ExprKind::InstanceOf(_) => "instanceof",
        }
    }

    pub fn is_shared(&self) -> bool {
        matches!(self, ExprKind::SharedRef | ExprKind::SharedDef)
    }
}

/// Use accounting of a shared value.
///
/// `resolve` walks a body twice. The first walk (`Pending`) only discovers how
/// many places mention the value; the second establishes the real count
/// (`Total`) once dead code is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UseCount {
    #[default]
    Unvisited,
    /// Occurrences seen by the discovery walk, definition included.
    Pending(u32),
    /// Established number of uses, definition included.
    Total(u32),
}

impl UseCount {
    pub fn total(self) -> Option<u32> {
        match self {
            UseCount::Total(n) => Some(n),
            _ => None,
        }
    }

    pub fn is_pending(self) -> bool {
        matches!(self, UseCount::Pending(_))
    }
}

/// An expression node.
#[derive(Debug, Clone)]
pub struct ExprNode<'a> {
    pub kind: ExprKind<'a>,
    pub args: Vec<ExprId>,
    pub calling_convention: CallingConvention,
    pub mask: Option<MaskInfo>,
    pub is_string_literal: bool,
    /// Only meaningful on the child of a shared node.
    pub uses: UseCount,
    pub curr_uses: u32,
    pub ir_curr_uses: u32,
    pub(crate) id: LazyId,
}

impl<'a> ExprNode<'a> {
    pub fn new(kind: ExprKind<'a>, args: Vec<ExprId>) -> Self {
        Self {
            kind,
            args,
            calling_convention: CallingConvention::Plain,
            mask: None,
            is_string_literal: false,
            uses: UseCount::Unvisited,
            curr_uses: 0,
            ir_curr_uses: 0,
            id: LazyId::new(),
        }
    }

    /// Copy of this node with a fresh identity. Use counts travel only when
    /// they are established.
    pub fn duplicate(&self) -> Self {
        let mut copy = ExprNode::new(self.kind, self.args.clone());
        if let UseCount::Total(_) = self.uses {
            copy.uses = self.uses;
            copy.curr_uses = self.curr_uses;
        }
        copy.calling_convention = self.calling_convention;
        copy.mask = self.mask.clone();
        copy.is_string_literal = self.is_string_literal;
        copy
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::NumberLiteral(_) | ExprKind::PointerLiteral(_)
        )
    }

    pub fn is_stateless(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::NumberLiteral(_) | ExprKind::PointerLiteral(_) | ExprKind::SharedRef
        )
    }

    pub fn is_pure(&self) -> bool {
        self.is_stateless() || matches!(self.kind, ExprKind::CellRef(_))
    }

    /// First child, if any.
    pub fn arg0(&self) -> Option<ExprId> {
        self.args.first().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicates_by_kind() {
        let lit = ExprNode::new(ExprKind::NumberLiteral(LitValue::Int(3)), vec![]);
        assert!(lit.is_literal() && lit.is_stateless() && lit.is_pure());

        let sref = ExprNode::new(ExprKind::SharedRef, vec![ExprId(0)]);
        assert!(!sref.is_literal());
        assert!(sref.is_stateless());

        let load = ExprNode::new(ExprKind::CellRef(CellId(0)), vec![]);
        assert!(!load.is_stateless());
        assert!(load.is_pure());

        let call = ExprNode::new(ExprKind::RuntimeCall("f"), vec![]);
        assert!(!call.is_pure());
    }

    #[test]
    fn test_duplicate_keeps_only_established_counts() {
        let mut node = ExprNode::new(ExprKind::RuntimeCall("f"), vec![ExprId(1)]);
        node.uses = UseCount::Pending(2);
        assert_eq!(node.duplicate().uses, UseCount::Unvisited);

        node.uses = UseCount::Total(3);
        node.curr_uses = 1;
        let copy = node.duplicate();
        assert_eq!(copy.uses, UseCount::Total(3));
        assert_eq!(copy.curr_uses, 1);
        assert_eq!(copy.args, vec![ExprId(1)]);
    }

    #[test]
    fn test_lit_display() {
        assert_eq!(LitValue::Int(-4).to_string(), "-4");
        assert_eq!(LitValue::Bool(true).to_string(), "true");
    }
}
