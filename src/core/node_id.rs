//! Lazy node identity.
//!
//! Graph nodes only receive an identifier when something asks for one (debug
//! rendering, sharing keys). Identifiers come from a monotonically increasing
//! allocator owned by the compilation unit, so two units never interfere and
//! tests see deterministic numbering.

use std::cell::{Cell, OnceCell};
use std::fmt;

/// Identifier of a graph node, unique within one allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic id source. The first id handed out is `#1`.
#[derive(Debug, Default)]
pub struct NodeIdAllocator {
    last: Cell<u32>,
}

impl NodeIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next identifier.
    pub fn next_id(&self) -> NodeId {
        let id = self.last.get() + 1;
        self.last.set(id);
        NodeId(id)
    }

    /// Number of identifiers handed out so far.
    pub fn allocated(&self) -> u32 {
        self.last.get()
    }
}

/// Identifier slot embedded in a node; filled on first request.
#[derive(Debug, Default, Clone)]
pub struct LazyId(OnceCell<NodeId>);

impl LazyId {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_assign(&self, ids: &NodeIdAllocator) -> NodeId {
        *self.0.get_or_init(|| ids.next_id())
    }

    /// The identifier if one was already assigned.
    pub fn peek(&self) -> Option<NodeId> {
        self.0.get().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_assigned_lazily_in_request_order() {
        let ids = NodeIdAllocator::new();
        let a = LazyId::new();
        let b = LazyId::new();

        assert_eq!(a.peek(), None);
        let first = b.get_or_assign(&ids);
        let second = a.get_or_assign(&ids);
        assert_eq!(first.index(), 1);
        assert_eq!(second.index(), 2);

        // Asking again never reallocates.
        assert_eq!(b.get_or_assign(&ids), first);
        assert_eq!(ids.allocated(), 2);
        assert_eq!(first.to_string(), "#1");
    }
}
