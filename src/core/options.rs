//! Compile options and the inlining cost policy.

/// Kind of backend the IR is being prepared for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetKind {
    /// Native code generation: packed integer cells are converted on access.
    #[default]
    Native,
    /// Interpreted or scripted backend.
    Interpreted,
    /// Stack machine backend: push order already gives left-to-right evaluation.
    StackMachine,
}

impl TargetKind {
    pub fn is_native(self) -> bool {
        matches!(self, TargetKind::Native)
    }

    pub fn is_stack_machine(self) -> bool {
        matches!(self, TargetKind::StackMachine)
    }
}

/// Weights used to decide whether a procedure body is cheap enough to expand
/// at call sites.
///
/// The numbers are tuned rather than derived. What must hold is the ordering:
/// literals are cheap, anything that calls, stores or shares is never
/// inlined, and native targets get a smaller bonus than interpreted ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InlinePolicy {
    pub number_literal: u32,
    pub pointer_literal: u32,
    pub runtime_call: u32,
    pub cell_ref: u32,
    pub field_access: u32,
    pub field_check: u32,
    pub call_per_arg: u32,
    pub call_fixed: u32,
    pub native_bonus: u32,
    pub interpreted_bonus: u32,
}

impl Default for InlinePolicy {
    fn default() -> Self {
        Self {
            number_literal: 2,
            pointer_literal: 6,
            runtime_call: 8,
            cell_ref: 2,
            field_access: 2,
            field_check: 4,
            call_per_arg: 4,
            call_fixed: 6,
            native_bonus: 4,
            interpreted_bonus: 12,
        }
    }
}

impl InlinePolicy {
    /// Cost of calling a procedure with `num_args` arguments.
    pub fn call_overhead(&self, num_args: usize) -> u32 {
        self.call_per_arg
            .saturating_mul(num_args as u32)
            .saturating_add(self.call_fixed)
    }

    pub fn bonus(&self, target: TargetKind) -> u32 {
        if target.is_native() {
            self.native_bonus
        } else {
            self.interpreted_bonus
        }
    }

    /// Largest body cost that still gets inlined.
    pub fn budget(&self, num_args: usize, target: TargetKind) -> u32 {
        self.call_overhead(num_args).saturating_add(self.bonus(target))
    }
}

/// Options for one compilation session.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    pub target: TargetKind,
    /// Debug builds never record inline bodies.
    pub debug: bool,
    /// Start argument flattening as if state had already changed whenever
    /// some argument can update cells.
    pub eager_ordering: bool,
    pub inline_policy: InlinePolicy,
}

impl CompileOptions {
    pub fn native() -> Self {
        Self::default()
    }

    pub fn interpreted() -> Self {
        Self {
            target: TargetKind::Interpreted,
            ..Self::default()
        }
    }

    pub fn stack_machine() -> Self {
        Self {
            target: TargetKind::StackMachine,
            ..Self::default()
        }
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_eager_ordering(mut self, eager: bool) -> Self {
        self.eager_ordering = eager;
        self
    }
}
