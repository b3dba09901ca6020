// This module models storage cells: the argument, local, captured and global slots that
// variables live in. A cell decides how it is read and written. Plain cells are accessed
// directly; cells with a fixed packed integer width go through runtime conversion calls on
// native targets; locals captured by a closure and written after capture are boxed and
// accessed through runtime calls, since the defining scope and the closure must observe the
// same storage. Cells without a source declaration are compiler temporaries and stay out of
// user-facing name and debug surfaces.

//! Storage cells and their load/store strategies.

use super::expr::{ExprId, ExprKind};
use super::graph::IrGraph;
use std::fmt;

/// Runtime helper converting a packed signed slot to a value.
pub const RT_FROM_INT: &str = "rt::fromInt";
/// Runtime helper converting a packed unsigned 32-bit slot to a value.
pub const RT_FROM_UINT: &str = "rt::fromUInt";
/// Runtime helper converting a value to a packed signed slot.
pub const RT_TO_INT: &str = "rt::toInt";
/// Runtime helper converting a value to a packed unsigned 32-bit slot.
pub const RT_TO_UINT: &str = "rt::toUInt";
/// Runtime helper reading a boxed local.
pub const RT_LOAD_BOXED: &str = "rt::ldlocRef";
/// Runtime helper writing a boxed local.
pub const RT_STORE_BOXED: &str = "rt::stlocRef";

/// Handle to a cell in an [`IrGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(pub(crate) u32);

impl CellId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Source declaration a cell was created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Declaration<'a> {
    pub name: &'a str,
    /// Front-end node id of the declaration, keeps unique names stable.
    pub node_id: u32,
}

/// What the front end learned about a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VariableInfo {
    /// Captured by a nested closure.
    pub captured: bool,
    /// Written after it was captured.
    pub written: bool,
}

/// Fixed width of a packed integer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitSize {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
}

/// Where a cell lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellRole {
    Arg,
    Local,
    Captured,
    Global,
}

/// Debug record for a named cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellInfo {
    pub name: String,
    pub debug_type: String,
    pub index: u32,
}

/// One storage slot.
#[derive(Debug, Clone)]
pub struct Cell<'a> {
    pub(crate) id: CellId,
    /// Index within the owning table (args, locals, captured or globals).
    pub index: u32,
    pub decl: Option<Declaration<'a>>,
    pub info: VariableInfo,
    pub role: CellRole,
    pub bit_size: Option<BitSize>,
    pub debug_type: &'a str,
    temp_uid: Option<u32>,
    /// Replacement while an inline body is being substituted.
    pub(crate) repl: Option<ExprId>,
    pub(crate) repl_uses: u32,
}

impl<'a> Cell<'a> {
    pub(crate) fn new(index: u32, role: CellRole, decl: Option<Declaration<'a>>, info: VariableInfo) -> Self {
        Self {
            id: CellId(0),
            index,
            decl,
            info,
            role,
            bit_size: None,
            debug_type: "?",
            temp_uid: None,
            repl: None,
            repl_uses: 0,
        }
    }

    pub(crate) fn temporary(index: u32, uid: u32) -> Self {
        let mut cell = Self::new(index, CellRole::Local, None, VariableInfo::default());
        cell.temp_uid = Some(uid);
        cell
    }

    pub fn id(&self) -> CellId {
        self.id
    }

    pub fn is_arg(&self) -> bool {
        self.role == CellRole::Arg
    }

    pub fn is_captured(&self) -> bool {
        self.role == CellRole::Captured
    }

    pub fn is_local(&self) -> bool {
        self.role == CellRole::Local
    }

    pub fn is_global(&self) -> bool {
        self.role == CellRole::Global
    }

    /// Compiler-introduced temporary.
    pub fn is_temporary(&self) -> bool {
        self.decl.is_none()
    }

    /// A local captured by a closure and written afterwards; it has to live
    /// in a heap box shared with the closure.
    pub fn is_by_ref_local(&self) -> bool {
        !self.is_temporary() && self.is_local() && self.info.captured && self.info.written
    }

    pub fn name(&self) -> String {
        match (self.decl, self.temp_uid) {
            (Some(decl), _) => decl.name.to_string(),
            (None, Some(uid)) => format!("unnamed{}", uid),
            (None, None) => "?".to_string(),
        }
    }

    /// Name usable as an identifier in generated code.
    pub fn unique_name(&self) -> String {
        if self.is_arg() {
            // Stable across overrides.
            return format!("arg{}", self.index);
        }
        match self.decl {
            Some(decl) => {
                let sanitized: String = decl
                    .name
                    .chars()
                    .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
                    .collect();
                format!("{}___{}", sanitized, decl.node_id)
            }
            None => format!("{}___U{}", self.name(), self.index),
        }
    }

    /// Debug record; temporaries have none.
    pub fn debug_info(&self) -> Option<CellInfo> {
        if self.is_temporary() {
            return None;
        }
        Some(CellInfo {
            name: self.name(),
            debug_type: self.debug_type.to_string(),
            index: self.index,
        })
    }
}

impl fmt::Display for Cell<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.decl {
            Some(decl) if !decl.name.is_empty() => decl.name,
            Some(_) => "?",
            None => "",
        };
        if self.is_arg() {
            write!(f, "[ARG {}]", name)
        } else {
            write!(f, "[{}]", name)
        }
    }
}

impl<'a> IrGraph<'a> {
    /// Create a global cell.
    pub fn mk_global(&mut self, index: u32, decl: Declaration<'a>) -> CellId {
        self.add_cell(Cell::new(index, CellRole::Global, Some(decl), VariableInfo::default()))
    }

    pub fn set_bit_size(&mut self, cell: CellId, size: Option<BitSize>) {
        self.cell_mut(cell).bit_size = size;
    }

    /// Raw reference to the slot.
    pub fn cell_ref(&mut self, cell: CellId) -> ExprId {
        self.op(ExprKind::CellRef(cell), Vec::new())
    }

    /// Read the cell's value.
    pub fn load(&mut self, cell: CellId) -> ExprId {
        let r = self.cell_ref(cell);
        let (bit_size, by_ref) = {
            let c = self.cell(cell);
            (c.bit_size, c.is_by_ref_local())
        };

        if self.target().is_native() {
            if let Some(size) = bit_size {
                let conv = if size == BitSize::UInt32 { RT_FROM_UINT } else { RT_FROM_INT };
                return self.rtcall(conv, vec![r]);
            }
        }

        if by_ref {
            return self.rtcall(RT_LOAD_BOXED, vec![r]);
        }

        r
    }

    /// Plain store into the slot.
    pub fn store_direct(&mut self, cell: CellId, src: ExprId) -> ExprId {
        let dst = self.cell_ref(cell);
        self.store(dst, src)
    }

    /// Store honouring boxing and packed widths.
    pub fn store_by_ref(&mut self, cell: CellId, src: ExprId) -> ExprId {
        let (bit_size, by_ref) = {
            let c = self.cell(cell);
            (c.bit_size, c.is_by_ref_local())
        };

        if by_ref {
            let dst = self.cell_ref(cell);
            return self.rtcall(RT_STORE_BOXED, vec![dst, src]);
        }

        if self.target().is_native() {
            if let Some(size) = bit_size {
                let conv = if size == BitSize::UInt32 { RT_TO_UINT } else { RT_TO_INT };
                let converted = self.rtcall_with_mask(conv, vec![src], 1);
                return self.store_direct(cell, converted);
            }
        }

        self.store_direct(cell, src)
    }
}
