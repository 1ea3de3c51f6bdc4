//! User-defined shell functions.
//!
//! A function is a name, a parameter list, and its captured body lines,
//! stored verbatim and re-dispatched on every call. Operator handlers are
//! ordinary entries in this table; the [`HandlerBridge`](crate::Kernel)
//! resolves them by name at each application.

use ahash::AHashMap;

/// One user-defined function.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct UserFunction {
    pub name: String,
    pub params: Vec<String>,
    /// Raw body lines, captured between the defining braces.
    pub body: Vec<String>,
}

/// Name → function table. Redefinition replaces the previous body.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct FunctionTable {
    funcs: AHashMap<String, UserFunction>,
}

impl FunctionTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a function, replacing any previous definition of the name.
    /// Returns true if a previous definition was replaced.
    pub fn define(&mut self, func: UserFunction) -> bool {
        self.funcs.insert(func.name.clone(), func).is_some()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&UserFunction> {
        self.funcs.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.funcs.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.funcs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty()
    }
}
