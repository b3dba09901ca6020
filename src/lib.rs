//! irpipe - IR construction and optimization core of a compiler backend.
//!
//! Front ends lower each procedure into a linear list of statements over a
//! shared expression graph. Once a body is complete, `Procedure::resolve`
//! runs a fixed pipeline over it: dead statements go away, shared values get
//! exactly one definition and accurate use counts, jumps are linked to their
//! labels, and cheap single-expression procedures record an inline body that
//! emitters can expand at call sites.
//!
//! # Primary Usage
//!
//! ```
//! use irpipe::core::CompilationSession;
//! use irpipe::ir::{CompileUnit, Declaration, JmpMode, Procedure};
//! use bumpalo::Bump;
//!
//! let arena = Bump::new();
//! let session = CompilationSession::new(&arena);
//! let mut unit = CompileUnit::new(&session);
//!
//! let mut proc = Procedure::new(Some("inc"), "_inc", 0);
//! let a = proc.mk_arg(&mut unit.graph, Declaration { name: "a", node_id: 1 });
//! let load = unit.graph.load(a);
//! let one = unit.graph.numlit(1);
//! let add = unit.graph.rtcall("numops::adds", vec![load, one]);
//! proc.emit_jmp(&unit.graph, ".ret", Some(add), JmpMode::Always, None);
//! proc.emit_lbl_direct(".ret");
//!
//! let idx = unit.add_procedure(proc);
//! unit.resolve(idx, &session)?;
//! assert!(unit.procedure(idx)?.inline_body.is_some());
//! # Ok::<(), irpipe::core::CompileError>(())
//! ```
//!
//! # Architecture
//!
//! - [`core`] - session, options, errors
//! - [`ir`] - graph, statements, procedures and the pipeline
//! - [`test_ir`] - textual IR and CHECK-directive test tooling

pub mod core;
pub mod ir;
pub mod test_ir;

pub use crate::core::{CompilationSession, CompileError, CompileOptions, CompileResult, SessionStats};
pub use crate::ir::{CompileUnit, IrGraph, Procedure};
