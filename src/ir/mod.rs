// This module holds the IR proper: the expression graph arena and its node kinds, storage
// cells, statements, procedures, and the passes that run over them. Construction happens
// through IrGraph constructors and Procedure emit methods; Procedure::resolve then rewrites
// a complete body in place, and emitters consume the result, optionally expanding calls
// through Procedure::inline_self. CompileUnit groups procedures that share one graph.

//! IR construction and the `resolve` pipeline.
//!
//! # Layout
//!
//! - [`expr`], [`graph`] - expression nodes and the arena owning them
//! - [`cell`] - variable storage and access lowering
//! - [`stmt`], [`procedure`] - linear procedure bodies
//! - [`pipeline`] - `Procedure::resolve`
//! - [`flatten`], [`inline`], [`cost`] - call argument ordering and inlining
//! - [`display`] - debug rendering
//! - [`unit`] - procedures sharing one graph

pub mod cell;
pub mod cost;
pub mod display;
pub mod expr;
pub mod flatten;
pub mod graph;
pub mod inline;
pub mod pipeline;
pub mod procedure;
pub mod stmt;
pub mod unit;

pub use cell::{BitSize, Cell, CellId, CellInfo, CellRole, Declaration, VariableInfo};
pub use cost::inline_cost;
pub use expr::{
    CallTarget, CallingConvention, ExprId, ExprKind, ExprNode, FieldAccessInfo, LitValue,
    MaskInfo, ProcIdx, UseCount,
};
pub use flatten::FlattenedArgs;
pub use graph::{IrGraph, NO_MASK_PREFIX};
pub use procedure::{Procedure, SourceLocation};
pub use stmt::{BreakpointInfo, JmpInfo, JmpMode, LabelInfo, LabelUses, Stmt, StmtKind};
pub use unit::CompileUnit;
