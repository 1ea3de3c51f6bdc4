//! Numeric policy for a kernel: recursion, nesting, and size caps.
//!
//! The defaults mirror the limits the shell has always shipped with; hosts
//! embedding the library can relax or tighten them via
//! [`Kernel::with_limits`](crate::Kernel::with_limits).

/// Maximum length of a registered operator symbol, in bytes.
pub const MAX_OPERATOR_LEN: usize = 16;

/// Maximum length of a variable, function, or handler name, in bytes.
pub const MAX_NAME_LEN: usize = 255;

/// Default cap on expression-parser recursion depth.
pub const DEFAULT_EXPR_DEPTH: u32 = 64;

/// Default cap on the scope stack depth.
pub const DEFAULT_SCOPE_DEPTH: usize = 64;

/// Default cap on block (`if`/`while`/function) nesting depth.
pub const DEFAULT_BLOCK_DEPTH: usize = 32;

/// Resource limits enforced by a [`Kernel`](crate::Kernel).
///
/// All limits are per-kernel; there is no global state. Exceeding a limit is
/// never fatal to the process: the offending operation fails with a
/// diagnostic and the shell keeps running.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Limits {
    /// Maximum recursion depth of the expression evaluator.
    pub max_expr_depth: u32,
    /// Maximum depth of the variable scope stack.
    pub max_scope_depth: usize,
    /// Maximum nesting depth of `if`/`while`/function blocks.
    pub max_block_depth: usize,
    /// Maximum number of captured body lines per user function.
    pub max_func_lines: usize,
    /// Maximum number of parameters per user function.
    pub max_func_params: usize,
    /// Cap on the output of a single variable expansion. Expansion output is
    /// silently truncated at this length.
    pub max_expand_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_expr_depth: DEFAULT_EXPR_DEPTH,
            max_scope_depth: DEFAULT_SCOPE_DEPTH,
            max_block_depth: DEFAULT_BLOCK_DEPTH,
            max_func_lines: 100,
            max_func_params: 10,
            max_expand_len: 4096,
        }
    }
}
