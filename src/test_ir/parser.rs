//! Test IR parser implementation.

use crate::core::error::{CompileError, CompileResult};
use crate::core::session::CompilationSession;
use crate::ir::cell::{BitSize, CellId, Declaration, VariableInfo};
use crate::ir::expr::{CallTarget, ExprId, FieldAccessInfo};
use crate::ir::procedure::Procedure;
use crate::ir::stmt::{BreakpointInfo, JmpMode};
use crate::ir::unit::CompileUnit;
use hashbrown::HashMap;
use log::trace;

/// Parse a test IR module into a fresh unit built for `session`.
pub fn parse_ir<'a>(session: &CompilationSession<'a>, text: &str) -> CompileResult<CompileUnit<'a>> {
    let mut parser = Parser::new(session);
    for (i, line) in text.lines().enumerate() {
        parser.line_no = i + 1;
        parser.parse_line(line)?;
    }
    parser.finish()
}

/// Cursor over a single line.
struct Cursor<'l> {
    text: &'l str,
    pos: usize,
    line: usize,
}

impl<'l> Cursor<'l> {
    fn new(text: &'l str, line: usize) -> Self {
        Self { text, pos: 0, line }
    }

    fn rest(&self) -> &'l str {
        &self.text[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_whitespace();
        self.rest().chars().next()
    }

    fn at_end(&mut self) -> bool {
        self.peek().is_none()
    }

    fn try_read(&mut self, ch: char) -> bool {
        if self.peek() == Some(ch) {
            self.pos += ch.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, ch: char) -> CompileResult<()> {
        if self.try_read(ch) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", ch)))
        }
    }

    fn ident(&mut self) -> Option<&'l str> {
        self.skip_whitespace();
        let rest = self.rest();
        let mut end = 0;
        while let Some(c) = rest[end..].chars().next() {
            let first = end == 0;
            if c.is_alphabetic() || c == '_' || c == '.' || (!first && c.is_alphanumeric()) {
                end += c.len_utf8();
            } else if !first && rest[end..].starts_with("::") {
                end += 2;
            } else {
                break;
            }
        }
        if end == 0 {
            return None;
        }
        self.pos += end;
        Some(&rest[..end])
    }

    fn expect_ident(&mut self, what: &str) -> CompileResult<&'l str> {
        self.ident()
            .ok_or_else(|| self.error(format!("expected {}", what)))
    }

    fn number(&mut self) -> CompileResult<i64> {
        self.skip_whitespace();
        let rest = self.rest();
        let end = rest
            .char_indices()
            .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && c == '-')))
            .map_or(rest.len(), |(i, _)| i);
        let value = rest[..end]
            .parse::<i64>()
            .map_err(|_| self.error(format!("invalid number '{}'", &rest[..end])))?;
        self.pos += end;
        Ok(value)
    }

    fn error(&self, reason: impl Into<String>) -> CompileError {
        CompileError::Parse {
            line: self.line,
            reason: reason.into(),
        }
    }
}

struct Parser<'s, 'a> {
    session: &'s CompilationSession<'a>,
    unit: CompileUnit<'a>,
    line_no: usize,

    // Global maps
    globals: HashMap<String, CellId>,

    // Per-procedure maps
    current: Option<Procedure<'a>>,
    cells: HashMap<String, CellId>,
    shares: HashMap<String, ExprId>,

    next_decl_id: u32,
}

impl<'s, 'a> Parser<'s, 'a> {
    fn new(session: &'s CompilationSession<'a>) -> Self {
        Self {
            session,
            unit: CompileUnit::new(session),
            line_no: 0,
            globals: HashMap::new(),
            current: None,
            cells: HashMap::new(),
            shares: HashMap::new(),
            next_decl_id: 1,
        }
    }

    fn error(&self, reason: impl Into<String>) -> CompileError {
        CompileError::Parse {
            line: self.line_no,
            reason: reason.into(),
        }
    }

    fn finish(self) -> CompileResult<CompileUnit<'a>> {
        if let Some(proc) = &self.current {
            return Err(self.error(format!("unterminated procedure {}", proc.name())));
        }
        Ok(self.unit)
    }

    fn decl(&mut self, name: &str) -> Declaration<'a> {
        let node_id = self.next_decl_id;
        self.next_decl_id += 1;
        Declaration {
            name: self.session.intern_str(name),
            node_id,
        }
    }

    fn parse_line(&mut self, line: &str) -> CompileResult<()> {
        let trimmed = match line.find(';') {
            Some(i) => line[..i].trim(),
            None => line.trim(),
        };
        if trimmed.is_empty() {
            return Ok(());
        }
        trace!("test ir line {}: {}", self.line_no, trimmed);

        let mut c = Cursor::new(trimmed, self.line_no);
        if self.current.is_none() {
            return match c.ident() {
                Some("global") => self.parse_global(&mut c),
                Some("proc") => self.parse_proc_header(&mut c),
                _ => Err(self.error(format!("expected 'proc' or 'global', got '{}'", trimmed))),
            };
        }

        if trimmed == "}" {
            return self.finish_proc();
        }
        if let Some(label) = trimmed.strip_suffix(':') {
            if label.starts_with('.') {
                let name = self.session.intern_str(label);
                self.proc_mut()?.emit_lbl_direct(name);
                return Ok(());
            }
        }
        self.parse_statement(&mut c)
    }

    fn proc_mut(&mut self) -> CompileResult<&mut Procedure<'a>> {
        let line = self.line_no;
        self.current.as_mut().ok_or(CompileError::Parse {
            line,
            reason: "statement outside of a procedure".to_string(),
        })
    }

    fn parse_attr(&self, c: &mut Cursor<'_>) -> CompileResult<(Option<BitSize>, VariableInfo)> {
        if !c.try_read(':') {
            return Ok((None, VariableInfo::default()));
        }
        let attr = c.expect_ident("cell attribute")?;
        let size = match attr {
            "int8" => BitSize::Int8,
            "uint8" => BitSize::UInt8,
            "int16" => BitSize::Int16,
            "uint16" => BitSize::UInt16,
            "int32" => BitSize::Int32,
            "uint32" => BitSize::UInt32,
            "boxed" => {
                let info = VariableInfo {
                    captured: true,
                    written: true,
                };
                return Ok((None, info));
            }
            other => return Err(c.error(format!("unknown cell attribute '{}'", other))),
        };
        Ok((Some(size), VariableInfo::default()))
    }

    fn parse_global(&mut self, c: &mut Cursor<'_>) -> CompileResult<()> {
        let name = c.expect_ident("global name")?;
        let (size, _) = self.parse_attr(c)?;
        let decl = self.decl(name);
        let cell = self.unit.mk_global(decl);
        self.unit.graph.set_bit_size(cell, size);
        self.globals.insert(name.to_string(), cell);
        Ok(())
    }

    fn parse_proc_header(&mut self, c: &mut Cursor<'_>) -> CompileResult<()> {
        let name = c.expect_ident("procedure name")?;
        if self.unit.find(name).is_some() {
            return Err(c.error(format!("procedure {} defined twice", name)));
        }
        let name = self.session.intern_str(name);
        let label = self.session.intern_str(&format!("_{}", name));
        let mut proc = Procedure::new(Some(name), label, self.unit.procs.len() as u32);

        c.expect('(')?;
        if !c.try_read(')') {
            loop {
                let arg = c.expect_ident("argument name")?;
                let decl = self.decl(arg);
                let cell = proc.mk_arg(&mut self.unit.graph, decl);
                self.cells.insert(arg.to_string(), cell);
                if c.try_read(')') {
                    break;
                }
                c.expect(',')?;
            }
        }

        loop {
            if c.try_read('{') {
                break;
            }
            let section = c.expect_ident("'local', 'captured', 'root' or '{'")?;
            match section {
                "root" => proc.is_root = true,
                "local" | "captured" => {
                    c.expect('(')?;
                    if c.try_read(')') {
                        continue;
                    }
                    loop {
                        let var = c.expect_ident("variable name")?;
                        let (size, info) = self.parse_attr(c)?;
                        let decl = self.decl(var);
                        let cell = if section == "local" {
                            proc.mk_local(&mut self.unit.graph, decl, info)
                        } else {
                            proc.mk_captured(&mut self.unit.graph, decl)
                        };
                        self.unit.graph.set_bit_size(cell, size);
                        self.cells.insert(var.to_string(), cell);
                        if c.try_read(')') {
                            break;
                        }
                        c.expect(',')?;
                    }
                }
                other => return Err(c.error(format!("unexpected '{}' in procedure header", other))),
            }
        }
        if !c.at_end() {
            return Err(c.error("trailing input after '{'"));
        }

        self.current = Some(proc);
        Ok(())
    }

    fn finish_proc(&mut self) -> CompileResult<()> {
        if let Some(proc) = self.current.take() {
            self.unit.add_procedure(proc);
        }
        self.cells.clear();
        self.shares.clear();
        Ok(())
    }

    fn parse_statement(&mut self, c: &mut Cursor<'_>) -> CompileResult<()> {
        let keyword = c.expect_ident("statement")?;
        match keyword {
            "expr" => {
                let e = self.parse_expr(c)?;
                self.proc_mut()?.emit_expr(e);
            }
            "jmp" | "jz" | "jnz" | "jeq" => {
                let label = c.expect_ident("label")?;
                let label = self.session.intern_str(label);
                let (mode, needs_expr) = match keyword {
                    "jmp" => (JmpMode::Always, false),
                    "jz" => (JmpMode::IfZero, true),
                    "jnz" => (JmpMode::IfNotZero, true),
                    _ => (JmpMode::IfJmpValEq, true),
                };
                let expr = if c.at_end() {
                    if needs_expr {
                        return Err(c.error(format!("{} needs a condition", keyword)));
                    }
                    None
                } else {
                    Some(self.parse_expr(c)?)
                };
                let proc = self.current.as_mut().ok_or_else(|| c.error("jump outside of a procedure"))?;
                proc.emit_jmp(&self.unit.graph, label, expr, mode, None);
            }
            "stackempty" => self.proc_mut()?.stack_empty(),
            "brk" => {
                let id = c.number()?;
                let line = if c.at_end() { 0 } else { c.number()? };
                let info = BreakpointInfo {
                    id: u32::try_from(id).map_err(|_| c.error("negative breakpoint id"))?,
                    line: u32::try_from(line).map_err(|_| c.error("negative line"))?,
                    column: 0,
                };
                self.proc_mut()?.emit_breakpoint(info);
            }
            other => return Err(c.error(format!("unknown statement '{}'", other))),
        }
        if !c.at_end() {
            return Err(c.error(format!("trailing input '{}'", c.rest())));
        }
        Ok(())
    }

    fn lookup_cell(&self, c: &Cursor<'_>, name: &str) -> CompileResult<CellId> {
        self.cells
            .get(name)
            .or_else(|| self.globals.get(name))
            .copied()
            .ok_or_else(|| c.error(format!("unknown cell '{}'", name)))
    }

    fn parse_args(&mut self, c: &mut Cursor<'_>) -> CompileResult<Vec<ExprId>> {
        c.expect('(')?;
        let mut args = Vec::new();
        if c.try_read(')') {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr(c)?);
            if c.try_read(')') {
                return Ok(args);
            }
            c.expect(',')?;
        }
    }

    fn parse_expr(&mut self, c: &mut Cursor<'_>) -> CompileResult<ExprId> {
        match c.peek() {
            Some('%') => {
                c.expect('%')?;
                let name = c.expect_ident("cell name")?;
                let cell = self.lookup_cell(c, name)?;
                Ok(self.unit.graph.load(cell))
            }
            Some('&') => {
                c.expect('&')?;
                let name = c.expect_ident("cell name")?;
                let cell = self.lookup_cell(c, name)?;
                Ok(self.unit.graph.cell_ref(cell))
            }
            Some('@') => {
                c.expect('@')?;
                let label = c.expect_ident("label")?;
                let label = self.session.intern_str(label);
                Ok(self.unit.graph.ptrlit(label))
            }
            Some('$') => {
                c.expect('$')?;
                let name = c.expect_ident("share name")?;
                if c.try_read('=') {
                    let value = self.parse_expr(c)?;
                    let shared = self.unit.graph.shared(value);
                    self.shares.insert(name.to_string(), shared);
                    return Ok(shared);
                }
                let prev = *self
                    .shares
                    .get(name)
                    .ok_or_else(|| c.error(format!("unknown share '${}'", name)))?;
                Ok(self.unit.graph.shared(prev))
            }
            Some(ch) if ch == '-' || ch.is_ascii_digit() => {
                let value = c.number()?;
                Ok(self.unit.graph.numlit(value))
            }
            _ => {
                let word = c.expect_ident("expression")?;
                self.parse_word_expr(c, word)
            }
        }
    }

    fn parse_word_expr(&mut self, c: &mut Cursor<'_>, word: &str) -> CompileResult<ExprId> {
        match word {
            "true" => Ok(self.unit.graph.boollit(true)),
            "false" => Ok(self.unit.graph.boollit(false)),
            "jmpvalue" => Ok(self.unit.graph.jmp_value()),
            "nop" => Ok(self.unit.graph.nop()),
            "call" => {
                let name = c.expect_ident("procedure name")?;
                let callee = self
                    .unit
                    .find(name)
                    .ok_or_else(|| c.error(format!("unknown procedure '{}'", name)))?;
                let args = self.parse_args(c)?;
                self.unit.call(callee, args)
            }
            "vcall" | "icall" => {
                let index = c.number()?;
                let index = u32::try_from(index).map_err(|_| c.error("negative call index"))?;
                let args = self.parse_args(c)?;
                let target = if word == "vcall" {
                    CallTarget::Virtual { index }
                } else {
                    CallTarget::Iface { index }
                };
                Ok(self.unit.graph.proc_call(target, args))
            }
            "seq" => {
                let items = self.parse_args(c)?;
                Ok(self.unit.graph.sequence(items))
            }
            "store" => {
                c.expect('(')?;
                let name = c.expect_ident("cell name")?;
                let cell = self.lookup_cell(c, name)?;
                c.expect(',')?;
                let src = self.parse_expr(c)?;
                c.expect(')')?;
                Ok(self.unit.graph.store_by_ref(cell, src))
            }
            "field" | "cfield" => {
                c.expect('(')?;
                let obj = self.parse_expr(c)?;
                c.expect(',')?;
                let name = c.expect_ident("field name")?;
                c.expect(')')?;
                let info = FieldAccessInfo {
                    name: self.session.intern_str(name),
                    index: 0,
                    checked: word == "cfield",
                };
                Ok(self.unit.graph.field_access(obj, info))
            }
            "instanceof" => {
                c.expect('(')?;
                let obj = self.parse_expr(c)?;
                c.expect(',')?;
                let class = c.expect_ident("class name")?;
                c.expect(')')?;
                let class = self.session.intern_str(class);
                Ok(self.unit.graph.instance_of(obj, class))
            }
            name => {
                let name = self.session.intern_str(name);
                let args = self.parse_args(c)?;
                Ok(self.unit.graph.rtcall(name, args))
            }
        }
    }
}
