//! The kernel context.
//!
//! All mutable shell state — the variable store, the operator registry, the
//! function table, keyword aliases — is bundled into one [`Kernel`] value
//! threaded explicitly through every operation. There are no process-wide
//! singletons; tests instantiate a fresh kernel per case, and a kernel is
//! fully serializable for session snapshots.

use ahash::AHashMap;

use crate::{
    functions::FunctionTable,
    registry::OperatorRegistry,
    resource::Limits,
    store::VariableStore,
};

/// The shared state of one shell instance.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Kernel {
    pub store: VariableStore,
    pub registry: OperatorRegistry,
    pub functions: FunctionTable,
    /// Keyword aliases defined with `defkeyword`: alias → original.
    pub aliases: AHashMap<String, String>,
    pub limits: Limits,
}

impl Kernel {
    /// Creates a kernel with default [`Limits`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(Limits::default())
    }

    /// Creates a kernel with explicit limits.
    #[must_use]
    pub fn with_limits(limits: Limits) -> Self {
        Self {
            store: VariableStore::new(limits.max_scope_depth),
            registry: OperatorRegistry::new(),
            functions: FunctionTable::new(),
            aliases: AHashMap::new(),
            limits,
        }
    }

    /// Resolves a keyword alias to its original, or returns the name itself.
    #[must_use]
    pub fn resolve_alias<'k>(&'k self, name: &'k str) -> &'k str {
        self.aliases.get(name).map_or(name, String::as_str)
    }

    /// Generates a fresh result-holder variable name for one handler
    /// invocation. Randomized so nested invocations never collide.
    #[must_use]
    pub(crate) fn fresh_result_holder(&self, suffix: &str) -> String {
        format!("__expr_tmp_{:08x}{suffix}", rand::random::<u32>())
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}
