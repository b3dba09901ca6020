//! Textual test IR for writing pipeline tests.
//!
//! This module provides a small line-based format that builds procedures
//! through the same constructors a front end would use, so tests can state a
//! body compactly and CHECK the rendered result after `resolve`.
//!
//! # Format
//!
//! ```text
//! ; Comments start with semicolon
//! global counter:int32
//!
//! proc inc(a) {
//!     jmp .ret numops::adds(%a, 1)
//! .ret:
//! }
//!
//! proc main() local(x, box:boxed) {
//!     expr store(x, call inc(read()))
//!     expr use($v=next(), $v)
//!     jz .done %x
//!     stackempty
//!     brk 0 12
//! .done:
//! }
//! ```
//!
//! Statements are `expr E`, `.label:`, `jmp .L [E]`, `jz`/`jnz`/`jeq .L E`,
//! `stackempty` and `brk ID [LINE]`. Expressions:
//!
//! - `12`, `-3`, `true`, `false` - number literals
//! - `@label` - pointer literal
//! - `%x` - load of a cell, `&x` - raw cell reference
//! - `$v=E` - share `E` under the name `v`; a later `$v` shares it again
//! - `call f(..)`, `vcall 3(..)`, `icall 1(..)` - procedure calls
//! - `seq(..)`, `store(x, E)`, `field(E, name)`, `cfield(E, name)`,
//!   `instanceof(E, Class)`, `jmpvalue`, `nop`
//! - `name(..)` - runtime call; names may contain `::`
//!
//! Cell attributes are `int8`, `uint8`, `int16`, `uint16`, `int32`, `uint32`
//! (packed width) and `boxed` (captured and written, so accessed by reference).
//! A `root` keyword before `{` marks the top-level procedure.

pub mod check;
pub mod parser;

pub use check::{CheckDirective, RunDirective, TestRunner, TestSpec};
pub use parser::parse_ir;

use crate::core::error::CompileResult;
use crate::core::session::CompilationSession;
use crate::ir::unit::CompileUnit;
use log::debug;

/// Render every procedure of `unit`, followed by its inline body if any.
pub fn render_unit(unit: &CompileUnit<'_>) -> String {
    let mut out = String::new();
    for proc in &unit.procs {
        out.push_str(&proc.render(&unit.graph));
        if let Some(body) = proc.inline_body {
            out.push_str(&format!("INLINE {}\n", unit.graph.render_expr(body)));
        }
    }
    out
}

/// Parse `text`, then resolve each procedure in declaration order.
///
/// With `inline`, calls to already resolved procedures are expanded in a
/// body before that body is resolved.
pub fn resolve_text<'a>(
    session: &CompilationSession<'a>,
    text: &str,
    inline: bool,
) -> CompileResult<CompileUnit<'a>> {
    let mut unit = parse_ir(session, text)?;
    for i in 0..unit.procs.len() {
        let idx = crate::ir::expr::ProcIdx(i as u32);
        if inline {
            unit.inline_calls(idx, session)?;
        }
        unit.resolve(idx, session)?;
    }
    debug!("{}", session.stats());
    Ok(unit)
}
