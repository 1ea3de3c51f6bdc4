//! Error taxonomy for the shell kernel.
//!
//! Nothing here is fatal: every error surfaces as a diagnostic line plus a
//! descriptive marker string that stands in for the failed expression's value
//! (scripts observe it through `LAST_OP_RESULT`). The marker forms are part of
//! the contract with script code and must stay stable.

use std::fmt;

/// Structural failure while parsing or evaluating an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprError {
    /// A token that cannot start an operand appeared where one was expected.
    UnexpectedTokenOperand { found: String, line: u32, col: u32 },
    /// A parenthesized sub-expression was not closed.
    MissingRParen { line: u32, col: u32 },
    /// A `?` was not followed by a matching `:` at the same level.
    MissingColon { line: u32, col: u32 },
    /// An operator whose role cannot be applied in infix/postfix position.
    UnhandledOperatorInLoop { symbol: String, line: u32, col: u32 },
    /// The evaluator exceeded its recursion depth cap.
    RecursionLimit { limit: u32 },
    /// Postfix `++`/`--` did not immediately follow a simple `$var`.
    PostfixLhsNotVariable { line: u32, col: u32 },
    /// Prefix `++`/`--` was not applied to a simple `$var`.
    PrefixOperandNotVariable { found: String, line: u32, col: u32 },
    /// A handler invocation failed; the underlying fault is preserved.
    Handler(HandlerError),
}

impl ExprError {
    /// The marker string left in place of the expression's value.
    #[must_use]
    pub fn marker(&self) -> String {
        match self {
            Self::UnexpectedTokenOperand { .. } => "EXPR_PARSE_ERROR_UNEXPECTED_TOKEN_OPERAND".to_owned(),
            Self::MissingRParen { .. } => "EXPR_PARSE_ERROR_MISSING_RPAREN".to_owned(),
            Self::MissingColon { .. } => "EXPR_PARSE_ERROR_MISSING_COLON".to_owned(),
            Self::UnhandledOperatorInLoop { .. } => "EXPR_PARSE_ERROR_UNHANDLED_OP_IN_LOOP".to_owned(),
            Self::RecursionLimit { .. } => "EXPR_PARSE_ERROR_RECURSION".to_owned(),
            Self::PostfixLhsNotVariable { .. } => "EXPR_PARSE_ERROR_POSTFIX_LHS".to_owned(),
            Self::PrefixOperandNotVariable { .. } => "EXPR_PARSE_ERROR_PREFIX_OPERAND".to_owned(),
            Self::Handler(err) => err.marker(),
        }
    }
}

impl fmt::Display for ExprError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedTokenOperand { found, line, col } => {
                write!(f, "unexpected token '{found}' where an operand was expected at line {line}, col {col}")
            }
            Self::MissingRParen { line, col } => {
                write!(f, "missing ')' for group opened at line {line}, col {col}")
            }
            Self::MissingColon { line, col } => {
                write!(f, "missing ':' for ternary '?' at line {line}, col {col}")
            }
            Self::UnhandledOperatorInLoop { symbol, line, col } => {
                write!(f, "operator '{symbol}' cannot be applied here (line {line}, col {col})")
            }
            Self::RecursionLimit { limit } => {
                write!(f, "expression recursion depth limit ({limit}) exceeded")
            }
            Self::PostfixLhsNotVariable { line, col } => {
                write!(f, "postfix '++'/'--' must follow a simple variable (line {line}, col {col})")
            }
            Self::PrefixOperandNotVariable { found, line, col } => {
                write!(f, "prefix '++'/'--' requires a simple variable operand, got '{found}' at line {line}, col {col}")
            }
            Self::Handler(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for ExprError {}

impl From<HandlerError> for ExprError {
    fn from(err: HandlerError) -> Self {
        Self::Handler(err)
    }
}

/// Failure while bridging an operator application to its script handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// No script function with the handler's name exists.
    NotFound { name: String },
    /// The handler's parameter count does not match the operand count plus
    /// the operator symbol and the result holder.
    ParamMismatch { name: String, expected: usize, got: usize },
    /// The transient handler scope could not be entered.
    Scope(StoreError),
}

impl HandlerError {
    /// The marker string left in place of the expression's value.
    #[must_use]
    pub fn marker(&self) -> String {
        match self {
            Self::NotFound { name } => format!("HANDLER_NOT_FOUND<{name}>"),
            Self::ParamMismatch { name, .. } => format!("HANDLER_PARAM_MISMATCH<{name}>"),
            Self::Scope(_) => "HANDLER_SCOPE_ERROR".to_owned(),
        }
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { name } => write!(f, "operator handler function '{name}' not found"),
            Self::ParamMismatch { name, expected, got } => {
                write!(f, "handler '{name}' parameter count mismatch: expected {expected}, got {got}")
            }
            Self::Scope(err) => write!(f, "handler scope error: {err}"),
        }
    }
}

impl std::error::Error for HandlerError {}

/// Failure registering an operator via `defoperator`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    EmptySymbol,
    SymbolTooLong { len: usize, max: usize },
    EmptyHandler,
    HandlerTooLong { len: usize, max: usize },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptySymbol => write!(f, "operator symbol cannot be empty"),
            Self::SymbolTooLong { len, max } => {
                write!(f, "operator symbol too long: {len} bytes (max {max})")
            }
            Self::EmptyHandler => write!(f, "handler name cannot be empty"),
            Self::HandlerTooLong { len, max } => {
                write!(f, "handler name too long: {len} bytes (max {max})")
            }
        }
    }
}

impl std::error::Error for RegistryError {}

/// Failure in the variable store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The trimmed variable name was empty or exceeded the name cap.
    InvalidName,
    /// Entering a scope would exceed the scope depth cap.
    ScopeDepthExceeded { limit: usize },
    /// `leave_scope` was asked to leave a scope that is not the current one.
    ScopeMismatch { expected: u32, found: u32 },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidName => write!(f, "invalid variable name"),
            Self::ScopeDepthExceeded { limit } => {
                write!(f, "maximum scope depth exceeded ({limit})")
            }
            Self::ScopeMismatch { expected, found } => {
                write!(f, "scope mismatch on leave: expected {expected}, current top is {found}")
            }
        }
    }
}

impl std::error::Error for StoreError {}

impl From<StoreError> for HandlerError {
    fn from(err: StoreError) -> Self {
        Self::Scope(err)
    }
}
