// This module gathers the infrastructure every IR pass relies on but that is not IR itself:
// the compilation session (arena interning and statistics), compile options with the inline
// cost policy, the internal compiler error type, and lazily assigned node identities used by
// debug rendering.

//! Core infrastructure.
//!
//! # Key Components
//!
//! ## Session Management (`session`)
//! - Arena-based string interning using `bumpalo`
//! - Resolution statistics
//!
//! ## Options (`options`)
//! - Target kind, debug mode and argument ordering
//! - Inline cost weights
//!
//! ## Errors (`error`)
//! - Internal compiler errors raised by the pipeline

pub mod error;
pub mod node_id;
pub mod options;
pub mod session;

pub use error::{CompileError, CompileResult};
pub use node_id::{LazyId, NodeId, NodeIdAllocator};
pub use options::{CompileOptions, InlinePolicy, TargetKind};
pub use session::{CompilationSession, SessionStats};
