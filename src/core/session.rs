// This module provides arena-based compilation session management using the bumpalo crate.
// CompilationSession owns the arena every IR name is interned into (labels, runtime call
// names, field names, declaration names), so IR payloads carry plain `&'arena str` slices
// that outlive the graphs built from them. The session also holds the compile options that
// steer cell access lowering, argument flattening and inlining, and it accumulates
// SessionStats over every procedure resolved with it: statements removed, shares unwrapped,
// labels turned into fallthroughs, procedures found inlinable and calls expanded.

//! Arena-based compilation session management.
//!
//! This module provides simplified lifetime management for IR construction
//! using arena allocation. All interned names are tied to the session
//! lifetime, eliminating complex ownership of strings inside graph nodes.

use super::options::CompileOptions;
use bumpalo::Bump;
use hashbrown::HashSet;
use std::cell::RefCell;
use std::fmt;

/// Arena-based compilation session.
pub struct CompilationSession<'arena> {
    /// Arena allocator for interned names.
    arena: &'arena Bump,

    /// Options shared by every procedure compiled in this session.
    options: CompileOptions,

    /// Session statistics for debugging and tuning.
    stats: RefCell<SessionStats>,

    /// Interned strings.
    interned_strings: RefCell<HashSet<&'arena str>>,
}

impl<'arena> CompilationSession<'arena> {
    /// Create a new session with default (native) options.
    pub fn new(arena: &'arena Bump) -> Self {
        Self::with_options(arena, CompileOptions::default())
    }

    pub fn with_options(arena: &'arena Bump, options: CompileOptions) -> Self {
        Self {
            arena,
            options,
            stats: RefCell::new(SessionStats::default()),
            interned_strings: RefCell::new(HashSet::new()),
        }
    }

    /// Get access to the arena allocator.
    pub fn arena(&self) -> &'arena Bump {
        self.arena
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Intern a string in the arena.
    pub fn intern_str(&self, s: &str) -> &'arena str {
        let mut strings = self.interned_strings.borrow_mut();
        if let Some(&interned) = strings.get(s) {
            return interned;
        }

        let interned: &'arena str = self.arena.alloc_str(s);
        strings.insert(interned);
        interned
    }

    /// Record a finished `resolve`.
    pub fn record_procedure_resolved(&self, name: &str, removed: usize, final_len: usize) {
        let mut stats = self.stats.borrow_mut();
        stats.procedures_resolved += 1;
        stats.statements_removed += removed;

        if stats.largest_body_len < final_len {
            stats.largest_body_len = final_len;
            stats.largest_body_name = name.to_string();
        }
    }

    pub fn record_shares_unwrapped(&self, count: usize) {
        self.stats.borrow_mut().shares_unwrapped += count;
    }

    pub fn record_jump_to_next(&self, count: usize) {
        self.stats.borrow_mut().jump_to_next_labels += count;
    }

    pub fn record_inlinable(&self) {
        self.stats.borrow_mut().procedures_inlinable += 1;
    }

    pub fn record_call_inlined(&self, callee: &str) {
        self.stats.borrow_mut().calls_inlined += 1;
        log::debug!("Inlined call to {}", callee);
    }

    /// Get compilation statistics.
    pub fn stats(&self) -> SessionStats {
        self.stats.borrow().clone()
    }
}

/// Compilation session statistics.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionStats {
    /// Number of procedures resolved.
    pub procedures_resolved: usize,

    /// Expression statements removed as dead.
    pub statements_removed: usize,

    /// Shares found to be single-use and unwrapped.
    pub shares_unwrapped: usize,

    /// Labels marked as only reached from the preceding jump.
    pub jump_to_next_labels: usize,

    /// Procedures that recorded an inline body.
    pub procedures_inlinable: usize,

    /// Call sites replaced by an inline body.
    pub calls_inlined: usize,

    /// Longest resolved body (statements).
    pub largest_body_len: usize,

    /// Name of the procedure with the longest body.
    pub largest_body_name: String,
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Resolve statistics:")?;
        writeln!(f, "  Procedures resolved: {}", self.procedures_resolved)?;
        writeln!(f, "  Statements removed: {}", self.statements_removed)?;
        writeln!(f, "  Shares unwrapped: {}", self.shares_unwrapped)?;
        writeln!(f, "  Jump-to-next labels: {}", self.jump_to_next_labels)?;
        writeln!(f, "  Inlinable procedures: {}", self.procedures_inlinable)?;
        writeln!(f, "  Calls inlined: {}", self.calls_inlined)?;

        if !self.largest_body_name.is_empty() {
            writeln!(
                f,
                "  Largest body: {} ({} statements)",
                self.largest_body_name, self.largest_body_len
            )?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::options::TargetKind;

    #[test]
    fn test_default_session_targets_native() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);

        assert_eq!(session.stats(), SessionStats::default());
        assert_eq!(session.options().target, TargetKind::Native);
        assert!(!session.options().debug);
    }

    #[test]
    fn test_label_names_share_storage() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);

        let built = format!(".{}_{}_{}", "loop", 3, 0);
        let first = session.intern_str(&built);
        let again = session.intern_str(".loop_3_0");
        let other = session.intern_str(".loop_3_1");

        assert!(std::ptr::eq(first, again));
        assert!(!std::ptr::eq(first, other));
        assert!(arena.allocated_bytes() > 0);
    }

    #[test]
    fn test_session_statistics() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);

        session.record_procedure_resolved("main", 3, 12);
        session.record_procedure_resolved("helper", 1, 4);
        session.record_shares_unwrapped(2);
        session.record_jump_to_next(1);
        session.record_inlinable();
        session.record_call_inlined("helper");

        let stats = session.stats();
        assert_eq!(stats.procedures_resolved, 2);
        assert_eq!(stats.statements_removed, 4);
        assert_eq!(stats.shares_unwrapped, 2);
        assert_eq!(stats.jump_to_next_labels, 1);
        assert_eq!(stats.procedures_inlinable, 1);
        assert_eq!(stats.calls_inlined, 1);
        assert_eq!(stats.largest_body_name, "main");

        let output = format!("{}", stats);
        assert!(output.contains("Procedures resolved: 2"));
        assert!(output.contains("main (12 statements)"));
    }
}
