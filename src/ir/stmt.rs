//! Statements: the linear body of a procedure.
//!
//! A body is a flat list of expression statements, labels and jumps, plus two
//! markers for the emitter (operand stack empty, breakpoint). Jumps name their
//! label; `resolve` links each jump to the index of that label in the final
//! body and counts how many jumps reach every label.

use super::expr::ExprId;
use crate::core::node_id::LazyId;

/// How a jump decides whether to transfer control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JmpMode {
    Always,
    IfZero,
    IfNotZero,
    /// Taken when the deferred jump value equals the expression.
    IfJmpValEq,
}

/// Jump use count of a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelUses {
    /// Number of jumps targeting the label.
    Count(u32),
    /// Reached only by falling out of the unconditional jump right before
    /// it; the emitter can drop that jump.
    JumpToNext,
}

impl Default for LabelUses {
    fn default() -> Self {
        LabelUses::Count(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelInfo<'a> {
    pub name: &'a str,
    pub num_uses: LabelUses,
    /// Pointer literals referencing this label.
    pub lit_uses: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JmpInfo<'a> {
    pub label_name: &'a str,
    /// Index of the target label in the resolved body.
    pub target: Option<usize>,
    pub mode: JmpMode,
    /// Value whose live range ends at this jump.
    pub terminate_expr: Option<ExprId>,
}

/// Source position of a breakpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakpointInfo {
    pub id: u32,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StmtKind<'a> {
    Expr,
    Label(LabelInfo<'a>),
    Jmp(JmpInfo<'a>),
    StackEmpty,
    Breakpoint(BreakpointInfo),
}

impl StmtKind<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            StmtKind::Expr => "expr",
            StmtKind::Label(_) => "label",
            StmtKind::Jmp(_) => "jmp",
            StmtKind::StackEmpty => "stack-empty",
            StmtKind::Breakpoint(_) => "breakpoint",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Stmt<'a> {
    pub kind: StmtKind<'a>,
    pub expr: Option<ExprId>,
    /// Position in the body, assigned by `resolve`.
    pub stmt_no: usize,
    pub(crate) id: LazyId,
}

impl<'a> Stmt<'a> {
    pub fn new(kind: StmtKind<'a>, expr: Option<ExprId>) -> Self {
        Self {
            kind,
            expr,
            stmt_no: 0,
            id: LazyId::new(),
        }
    }

    pub fn expr_stmt(expr: ExprId) -> Self {
        Self::new(StmtKind::Expr, Some(expr))
    }

    pub fn label(name: &'a str) -> Self {
        Self::new(
            StmtKind::Label(LabelInfo {
                name,
                num_uses: LabelUses::default(),
                lit_uses: 0,
            }),
            None,
        )
    }

    pub fn jmp(label_name: &'a str, expr: Option<ExprId>, mode: JmpMode) -> Self {
        Self::new(
            StmtKind::Jmp(JmpInfo {
                label_name,
                target: None,
                mode,
                terminate_expr: None,
            }),
            expr,
        )
    }

    pub fn stack_empty() -> Self {
        Self::new(StmtKind::StackEmpty, None)
    }

    pub fn breakpoint(info: BreakpointInfo) -> Self {
        Self::new(StmtKind::Breakpoint(info), None)
    }

    /// Name of this label, or of the label this jump targets.
    pub fn label_name(&self) -> Option<&'a str> {
        match &self.kind {
            StmtKind::Label(l) => Some(l.name),
            StmtKind::Jmp(j) => Some(j.label_name),
            _ => None,
        }
    }

    pub fn as_label(&self) -> Option<&LabelInfo<'a>> {
        match &self.kind {
            StmtKind::Label(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_jmp(&self) -> Option<&JmpInfo<'a>> {
        match &self.kind {
            StmtKind::Jmp(j) => Some(j),
            _ => None,
        }
    }

    pub fn is_label(&self) -> bool {
        matches!(self.kind, StmtKind::Label(_))
    }

    pub fn is_jmp(&self) -> bool {
        matches!(self.kind, StmtKind::Jmp(_))
    }
}
