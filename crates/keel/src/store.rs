//! Scoped variable store.
//!
//! All shell values are owned strings. Bindings live in a stack of scope
//! frames: frame 0 is the global scope and survives until process exit;
//! non-global frames get monotonically increasing ids (never reused) and are
//! destroyed wholesale when their scope is left. Reads walk the stack from
//! innermost outward, so an inner binding shadows an outer one of the same
//! name for exactly as long as its scope is alive.
//!
//! Array elements and object properties are ordinary variables under mangled
//! names (`BASE_ARRAYIDX_INDEX`, `BASE_PROP1_PROP2`). The mangling is part of
//! the contract with script code and must not change.

use indexmap::IndexMap;

use crate::{
    error::StoreError,
    expand::{expand, unescape},
    resource::MAX_NAME_LEN,
};

/// Scope id of the global (outermost) scope.
pub const GLOBAL_SCOPE_ID: u32 = 0;

/// Separator joining an array base name and its expanded index.
pub const ARRAY_INDEX_SEP: &str = "_ARRAYIDX_";

/// A single binding.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Variable {
    pub value: String,
    /// True when the binding was created through the array-element API.
    pub is_array_element: bool,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct ScopeFrame {
    id: u32,
    /// Insertion-ordered so iteration (object stringification, state dumps)
    /// is deterministic.
    vars: IndexMap<String, Variable>,
}

/// The scoped key→string map backing all shell variables.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct VariableStore {
    frames: Vec<ScopeFrame>,
    next_scope_id: u32,
    max_depth: usize,
}

impl VariableStore {
    /// Creates a store holding only the global scope.
    #[must_use]
    pub fn new(max_depth: usize) -> Self {
        Self {
            frames: vec![ScopeFrame { id: GLOBAL_SCOPE_ID, vars: IndexMap::new() }],
            next_scope_id: 1,
            max_depth,
        }
    }

    /// Id of the innermost (current) scope.
    #[must_use]
    pub fn current_scope_id(&self) -> u32 {
        self.frames.last().map_or(GLOBAL_SCOPE_ID, |f| f.id)
    }

    /// Current scope stack depth, the global scope included.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Pushes a fresh scope and returns its id. Ids are assigned
    /// monotonically and never reused within a process lifetime.
    pub fn enter_scope(&mut self) -> Result<u32, StoreError> {
        if self.frames.len() >= self.max_depth {
            return Err(StoreError::ScopeDepthExceeded { limit: self.max_depth });
        }
        let id = self.next_scope_id;
        self.next_scope_id += 1;
        self.frames.push(ScopeFrame { id, vars: IndexMap::new() });
        Ok(id)
    }

    /// Pops the scope with the given id, destroying exactly its bindings.
    ///
    /// The id must match the current top of the stack; the global scope can
    /// never be left.
    pub fn leave_scope(&mut self, scope_id: u32) -> Result<(), StoreError> {
        let top = self.current_scope_id();
        if top != scope_id || scope_id == GLOBAL_SCOPE_ID {
            return Err(StoreError::ScopeMismatch { expected: scope_id, found: top });
        }
        self.frames.pop();
        Ok(())
    }

    fn clean_name(name: &str) -> Result<&str, StoreError> {
        let name = name.trim();
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(StoreError::InvalidName);
        }
        Ok(name)
    }

    /// Writes a binding into the **current** scope, replacing any existing
    /// binding of the same name in that scope. Names are trimmed of
    /// surrounding whitespace; empty names fail.
    pub fn set(&mut self, name: &str, value: &str, is_array_element: bool) -> Result<(), StoreError> {
        let name = Self::clean_name(name)?;
        let frame = self.frames.last_mut().expect("store always holds the global scope");
        frame.vars.insert(name.to_owned(), Variable { value: value.to_owned(), is_array_element });
        Ok(())
    }

    /// Assigns through shadowing: if any visible scope binds `name`, the
    /// innermost such binding is updated in place; otherwise a new binding is
    /// created in the current scope.
    ///
    /// This is what lets script handlers mutate their caller's variables by
    /// name (`setvar`, `++`/`--` handlers).
    pub fn set_in_place(&mut self, name: &str, value: &str) -> Result<(), StoreError> {
        let name = Self::clean_name(name)?;
        for frame in self.frames.iter_mut().rev() {
            if let Some(var) = frame.vars.get_mut(name) {
                var.value = value.to_owned();
                return Ok(());
            }
        }
        let frame = self.frames.last_mut().expect("store always holds the global scope");
        frame.vars.insert(name.to_owned(), Variable { value: value.to_owned(), is_array_element: false });
        Ok(())
    }

    /// Reads a binding, walking the scope stack from innermost outward.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        self.frames.iter().rev().find_map(|frame| frame.vars.get(name).map(|v| v.value.as_str()))
    }

    /// Normalizes a raw array index: quoted indexes are unescaped then
    /// expanded, `$`-prefixed indexes are expanded, anything else is used
    /// verbatim.
    #[must_use]
    pub fn normalize_index(&self, raw_index: &str, max_expand_len: usize) -> String {
        if raw_index.starts_with('"') && raw_index.len() >= 2 && raw_index.ends_with('"') {
            expand(&unescape(raw_index), self, max_expand_len)
        } else if raw_index.starts_with('$') {
            expand(raw_index, self, max_expand_len)
        } else {
            raw_index.to_owned()
        }
    }

    /// Writes `BASE_ARRAYIDX_INDEX` into the current scope, normalizing the
    /// raw index first.
    pub fn set_array_element(
        &mut self,
        base: &str,
        raw_index: &str,
        value: &str,
        max_expand_len: usize,
    ) -> Result<(), StoreError> {
        let index = self.normalize_index(raw_index, max_expand_len);
        let mangled = format!("{base}{ARRAY_INDEX_SEP}{index}");
        self.set(&mangled, value, true)
    }

    /// Reads `BASE_ARRAYIDX_INDEX` through the scope stack.
    #[must_use]
    pub fn get_array_element(&self, base: &str, raw_index: &str, max_expand_len: usize) -> Option<&str> {
        let index = self.normalize_index(raw_index, max_expand_len);
        let mangled = format!("{base}{ARRAY_INDEX_SEP}{index}");
        // Two-step to end the borrow of the mangled name before returning.
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.vars.get(mangled.as_str()).map(|v| v.value.as_str()))
    }

    /// Iterates the bindings of one scope frame in insertion order.
    pub(crate) fn iter_scope(&self, scope_id: u32) -> impl Iterator<Item = (&str, &Variable)> {
        self.frames
            .iter()
            .filter(move |frame| frame.id == scope_id)
            .flat_map(|frame| frame.vars.iter().map(|(k, v)| (k.as_str(), v)))
    }
}
