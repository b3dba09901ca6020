// This module defines the error type for the IR pipeline using the thiserror crate.
// CompileError covers the two failure classes of the core: malformed graphs reaching the
// pipeline (unresolved jump labels, use-count bookkeeping violations, node kinds a pass
// cannot handle) and caller misuse (inlining with the wrong number of arguments, handles
// that do not name anything). None of these are user diagnostics; they signal a defect in
// whatever built the graph. Parse errors from the textual test IR share the type so the
// test tooling can propagate with `?`.

//! Error types for the IR pipeline.
//!
//! Using thiserror for more idiomatic error handling.

use thiserror::Error;

/// Main error type for IR construction and resolution.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("internal compiler error: missing label: {label}")]
    MissingLabel {
        label: String,
    },

    #[error("internal compiler error: label defined twice: {label}")]
    DuplicateLabel {
        label: String,
    },

    #[error("internal compiler error: use count violation: {reason}")]
    UseCount {
        reason: String,
    },

    #[error("internal compiler error: unexpected {kind} node during {phase}")]
    UnexpectedNode {
        kind: &'static str,
        phase: &'static str,
    },

    #[error("internal compiler error: {proc} expects {expected} arguments, got {actual}")]
    ArgCountMismatch {
        proc: String,
        expected: usize,
        actual: usize,
    },

    #[error("internal compiler error: {proc} has no inline body")]
    NotInlinable {
        proc: String,
    },

    #[error("internal compiler error: unknown procedure #{index}")]
    UnknownProcedure {
        index: usize,
    },

    #[error("internal compiler error: unknown cell #{index}")]
    UnknownCell {
        index: usize,
    },

    #[error("parse error at line {line}: {reason}")]
    Parse {
        line: usize,
        reason: String,
    },
}

impl CompileError {
    /// Whether this error is an internal compiler error rather than a test IR input error.
    pub fn is_internal(&self) -> bool {
        !matches!(self, CompileError::Parse { .. })
    }

    pub(crate) fn use_count(reason: impl Into<String>) -> Self {
        CompileError::UseCount {
            reason: reason.into(),
        }
    }
}

/// Result type alias for compile operations.
pub type CompileResult<T> = Result<T, CompileError>;
