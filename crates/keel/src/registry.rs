//! Runtime operator table.
//!
//! Scripts teach the shell its operators: `defoperator` registers a symbol
//! together with its grammatical role, precedence, associativity, and the
//! script function that implements its semantics. The tokenizer consults the
//! table through [`OperatorRegistry::match_longest`], the expression parser
//! through [`OperatorRegistry::lookup`]. Definitions live until process exit;
//! the registry is never garbage-collected.

use ahash::AHashMap;

use crate::{
    error::RegistryError,
    resource::{MAX_NAME_LEN, MAX_OPERATOR_LEN},
};

/// Grammatical role of an operator, as declared by `defoperator TYPE …`.
///
/// The expression parser dispatches on this role; the kernel attaches no
/// semantics beyond grammar.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString, serde::Serialize, serde::Deserialize,
)]
pub enum OperatorRole {
    #[strum(serialize = "UNARY_PREFIX")]
    UnaryPrefix,
    #[strum(serialize = "UNARY_POSTFIX")]
    UnaryPostfix,
    #[strum(serialize = "BINARY_INFIX")]
    BinaryInfix,
    /// The opening symbol of a ternary form, e.g. `?`.
    #[strum(serialize = "TERNARY_PRIMARY")]
    TernaryPrimary,
    /// The separator symbol of a ternary form, e.g. `:`. Never applied on its
    /// own; it terminates the true-branch of the enclosing primary.
    #[strum(serialize = "TERNARY_SECONDARY")]
    TernarySecondary,
}

/// Operator associativity, as declared by `defoperator ASSOC L|R|N`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString, serde::Serialize, serde::Deserialize,
)]
pub enum Associativity {
    #[strum(serialize = "L")]
    Left,
    #[strum(serialize = "R")]
    Right,
    #[strum(serialize = "N")]
    None,
}

/// One registered operator.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct OperatorDef {
    /// The source symbol, at most [`MAX_OPERATOR_LEN`] bytes.
    pub symbol: String,
    pub role: OperatorRole,
    /// Binding strength. Defaults to 0 when `defoperator` omits `PRECEDENCE`.
    pub precedence: i32,
    /// Defaults to [`Associativity::Left`] when `defoperator` omits `ASSOC`.
    pub associativity: Associativity,
    /// Name of the script function implementing the operator's semantics.
    pub handler: String,
}

/// Outcome of a successful registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    Added,
    /// An existing definition for the same symbol was overwritten. Callers
    /// surface this as a diagnostic.
    Replaced,
}

/// The runtime table of operator definitions, keyed by symbol.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct OperatorRegistry {
    ops: AHashMap<String, OperatorDef>,
}

impl OperatorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or overwrites a definition. Symbols are unique; re-registration
    /// succeeds and reports [`RegisterOutcome::Replaced`].
    pub fn register(&mut self, def: OperatorDef) -> Result<RegisterOutcome, RegistryError> {
        if def.symbol.is_empty() {
            return Err(RegistryError::EmptySymbol);
        }
        if def.symbol.len() > MAX_OPERATOR_LEN {
            return Err(RegistryError::SymbolTooLong { len: def.symbol.len(), max: MAX_OPERATOR_LEN });
        }
        if def.handler.is_empty() {
            return Err(RegistryError::EmptyHandler);
        }
        if def.handler.len() > MAX_NAME_LEN {
            return Err(RegistryError::HandlerTooLong { len: def.handler.len(), max: MAX_NAME_LEN });
        }
        match self.ops.insert(def.symbol.clone(), def) {
            Some(_) => Ok(RegisterOutcome::Replaced),
            None => Ok(RegisterOutcome::Added),
        }
    }

    /// Exact-match lookup.
    #[must_use]
    pub fn lookup(&self, symbol: &str) -> Option<&OperatorDef> {
        self.ops.get(symbol)
    }

    /// Longest-match lookup against the start of `input`.
    ///
    /// Returns the registered symbol with the greatest length that is a
    /// prefix of `input`, together with its byte length. This is what keeps
    /// `==` from tokenizing as two `=` tokens.
    #[must_use]
    pub fn match_longest<'r>(&'r self, input: &str) -> Option<(&'r str, usize)> {
        let mut best: Option<(&str, usize)> = None;
        for symbol in self.ops.keys() {
            if input.starts_with(symbol.as_str()) {
                let len = symbol.len();
                if best.is_none_or(|(_, best_len)| len > best_len) {
                    best = Some((symbol.as_str(), len));
                }
            }
        }
        best
    }

    /// Number of registered operators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}
