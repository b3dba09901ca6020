// Debug rendering of expressions, statements and procedures. The format is meant for humans
// reading compiler traces and for the CHECK lines of the textual test IR; it is not parsed
// back. Shared values render as SHARED_DEF(#id: value) at their definition and SHARED_REF(#id)
// elsewhere, where the id is the lazily assigned node id of the shared child, so a trace shows
// at a glance which references read which definition.

//! Debug rendering.

use super::expr::{CallTarget, ExprId, ExprKind};
use super::graph::IrGraph;
use super::procedure::Procedure;
use super::stmt::{JmpMode, LabelUses, Stmt, StmtKind};
use crate::core::node_id::NodeId;
use std::fmt;

/// Renders one expression tree.
pub struct ExprDisplay<'g, 'a> {
    graph: &'g IrGraph<'a>,
    expr: ExprId,
}

/// Renders one statement, newline included.
pub struct StmtDisplay<'g, 'a> {
    graph: &'g IrGraph<'a>,
    stmt: &'g Stmt<'a>,
}

impl<'a> IrGraph<'a> {
    pub fn display_expr(&self, expr: ExprId) -> ExprDisplay<'_, 'a> {
        ExprDisplay { graph: self, expr }
    }

    pub fn display_stmt<'g>(&'g self, stmt: &'g Stmt<'a>) -> StmtDisplay<'g, 'a> {
        StmtDisplay { graph: self, stmt }
    }

    pub fn render_expr(&self, expr: ExprId) -> String {
        self.display_expr(expr).to_string()
    }

    pub fn render_stmt(&self, stmt: &Stmt<'a>) -> String {
        self.display_stmt(stmt).to_string()
    }

    /// Identity of a statement, drawn from the same counter as expressions.
    pub fn stmt_id(&self, stmt: &Stmt<'a>) -> NodeId {
        stmt.id.get_or_assign(self.ids())
    }

    fn write_expr(&self, f: &mut fmt::Formatter<'_>, e: ExprId) -> fmt::Result {
        let node = self.node(e);
        match node.kind {
            ExprKind::NumberLiteral(v) => write!(f, "{}", v),
            ExprKind::PointerLiteral(label) => f.write_str(label),
            ExprKind::CellRef(cell) => write!(f, "{}", self.cell(cell)),
            ExprKind::JmpValue => f.write_str("JMPVALUE"),
            ExprKind::Nop => f.write_str("NOP"),
            ExprKind::SharedRef => match node.arg0() {
                Some(target) => write!(f, "SHARED_REF({})", self.node_id(target)),
                None => f.write_str("SHARED_REF(?)"),
            },
            ExprKind::SharedDef => match node.arg0() {
                Some(target) => {
                    write!(f, "SHARED_DEF({}: ", self.node_id(target))?;
                    self.write_expr(f, target)?;
                    f.write_str(")")
                }
                None => f.write_str("SHARED_DEF(?)"),
            },
            ExprKind::FieldAccess(info) => {
                self.write_arg0(f, e)?;
                write!(f, ".{}", info.name)
            }
            ExprKind::RuntimeCall(name) => {
                f.write_str(name)?;
                self.write_list(f, e, ", ")
            }
            ExprKind::ProcCall(target) => {
                match target {
                    CallTarget::Direct { name, .. } => f.write_str(name)?,
                    CallTarget::Iface { index } => write!(f, "IFACE@{}", index)?,
                    CallTarget::Virtual { index } => write!(f, "VTABLE@{}", index)?,
                }
                self.write_list(f, e, ", ")
            }
            ExprKind::Sequence => self.write_list(f, e, "; "),
            ExprKind::InstanceOf(class_id) => {
                f.write_str("(")?;
                self.write_arg0(f, e)?;
                write!(f, " instanceof {})", class_id)
            }
            ExprKind::Store => {
                let args = &node.args;
                f.write_str("{ ")?;
                match args.first() {
                    Some(&dst) => self.write_expr(f, dst)?,
                    None => f.write_str("?")?,
                }
                f.write_str(" := ")?;
                match args.get(1) {
                    Some(&src) => self.write_expr(f, src)?,
                    None => f.write_str("?")?,
                }
                f.write_str(" }")
            }
        }
    }

    fn write_arg0(&self, f: &mut fmt::Formatter<'_>, e: ExprId) -> fmt::Result {
        match self.node(e).arg0() {
            Some(a) => self.write_expr(f, a),
            None => f.write_str("?"),
        }
    }

    fn write_list(&self, f: &mut fmt::Formatter<'_>, e: ExprId, sep: &str) -> fmt::Result {
        f.write_str("(")?;
        for (i, &a) in self.args(e).iter().enumerate() {
            if i > 0 {
                f.write_str(sep)?;
            }
            self.write_expr(f, a)?;
        }
        f.write_str(")")
    }

    fn write_stmt(&self, f: &mut fmt::Formatter<'_>, stmt: &Stmt<'a>) -> fmt::Result {
        let inner = match stmt.expr {
            Some(e) => self.render_expr(e),
            None => "{null}".to_string(),
        };
        match &stmt.kind {
            StmtKind::Expr => writeln!(f, "    {}", inner),
            StmtKind::Jmp(j) => {
                let fin = format!("goto {}", j.label_name);
                match j.mode {
                    JmpMode::Always if stmt.expr.is_some() => {
                        writeln!(f, "    {{ JMPVALUE := {} }} {}", inner, fin)
                    }
                    JmpMode::Always => writeln!(f, "    {}", fin),
                    JmpMode::IfZero => writeln!(f, "    if (! {}) {}", inner, fin),
                    JmpMode::IfNotZero => writeln!(f, "    if ({}) {}", inner, fin),
                    JmpMode::IfJmpValEq => writeln!(f, "    if (r0 == {}) {}", inner, fin),
                }
            }
            StmtKind::StackEmpty => writeln!(f, "    ;"),
            StmtKind::Breakpoint(bp) => writeln!(f, "    // brk {}", bp.id),
            StmtKind::Label(l) if l.num_uses == LabelUses::JumpToNext => {
                writeln!(f, "{}: // fallthrough", l.name)
            }
            StmtKind::Label(l) => writeln!(f, "{}:", l.name),
        }
    }
}

impl fmt::Display for ExprDisplay<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.graph.write_expr(f, self.expr)
    }
}

impl fmt::Display for StmtDisplay<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.graph.write_stmt(f, self.stmt)
    }
}

impl<'a> Procedure<'a> {
    /// `PROC name` followed by one line per statement.
    pub fn render(&self, graph: &IrGraph<'a>) -> String {
        let mut out = format!("\nPROC {}\n", self.name());
        for stmt in &self.body {
            out.push_str(&graph.render_stmt(stmt));
        }
        out.push('\n');
        out
    }
}
