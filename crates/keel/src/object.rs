//! Structured data: the `object:` flatten/stringify pair.
//!
//! A value of the form `object:["key": "val", "nested": ["k": "v"]]` assigned
//! to `$base` is flattened into ordinary variables: `base_key = "val"`,
//! `base_nested_k = "v"`. The root gets `base_BSH_STRUCT_TYPE =
//! "BSH_OBJECT_ROOT"` and nested containers get `…_BSH_STRUCT_TYPE =
//! "BSH_OBJECT"`, so `echo $base` can stringify the flat layout back into
//! `object:[…]` form. The flat layout is what dotted expansion
//! (`$base.nested.k`) resolves against.

use indexmap::IndexMap;

use crate::{run::Machine, store::VariableStore};

pub(crate) const OBJECT_PREFIX: &str = "object:";
pub(crate) const JSON_PREFIX: &str = "json:";
pub(crate) const STRUCT_TYPE_SUFFIX: &str = "_BSH_STRUCT_TYPE";
pub(crate) const OBJECT_ROOT_MARKER: &str = "BSH_OBJECT_ROOT";
pub(crate) const OBJECT_MARKER: &str = "BSH_OBJECT";

struct ObjCursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> ObjCursor<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn consume_all(&mut self) {
        self.pos = self.text.len();
    }
}

/// Parses a quoted string at the cursor. Missing opening quote yields the
/// empty string with the cursor unmoved past whitespace.
fn parse_quoted(cur: &mut ObjCursor<'_>) -> String {
    cur.skip_ws();
    let mut out = String::new();
    if cur.peek() != Some('"') {
        return out;
    }
    cur.bump();
    while let Some(c) = cur.bump() {
        match c {
            '"' => break,
            '\\' => match cur.bump() {
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => break,
            },
            _ => out.push(c),
        }
    }
    out
}

impl Machine<'_> {
    /// Flattens an `object:`/`json:` payload (with the prefix already
    /// stripped) into variables under `base` in the current scope.
    pub(crate) fn flatten_object(&mut self, data: &str, base: &str) {
        let root_marker = format!("{base}{STRUCT_TYPE_SUFFIX}");
        let _ = self.kernel.store.set(&root_marker, OBJECT_ROOT_MARKER, false);

        let mut cur = ObjCursor::new(data);
        self.flatten_level(&mut cur, base);
        cur.skip_ws();
        if !cur.at_end() {
            self.io
                .diag(&format!("object parse warning: extra characters after structure, at: '{}'", cur.rest()));
        }
    }

    fn flatten_level(&mut self, cur: &mut ObjCursor<'_>, base: &str) {
        cur.skip_ws();
        if cur.peek() != Some('[') {
            self.io.diag(&format!("object parse error: expected '[' at: '{}'", cur.rest()));
            cur.consume_all();
            return;
        }
        cur.bump();

        let mut first = true;
        loop {
            cur.skip_ws();
            match cur.peek() {
                None => {
                    self.io.diag("object parse error: unterminated structure");
                    return;
                }
                Some(']') => {
                    cur.bump();
                    return;
                }
                _ => {}
            }
            if !first {
                if cur.peek() == Some(',') {
                    cur.bump();
                } else {
                    self.io
                        .diag(&format!("object parse error: expected ',' or ']' between elements, at: '{}'", cur.rest()));
                    cur.consume_all();
                    return;
                }
            }
            first = false;

            let key = parse_quoted(cur);
            if key.is_empty() {
                self.io.diag(&format!("object parse error: expected key string, at: '{}'", cur.rest()));
                cur.consume_all();
                return;
            }
            cur.skip_ws();
            if cur.peek() != Some(':') {
                self.io
                    .diag(&format!("object parse error: expected ':' after key '{key}', at: '{}'", cur.rest()));
                cur.consume_all();
                return;
            }
            cur.bump();
            cur.skip_ws();

            let child = format!("{base}_{key}");
            match cur.peek() {
                Some('[') => {
                    let marker = format!("{child}{STRUCT_TYPE_SUFFIX}");
                    let _ = self.kernel.store.set(&marker, OBJECT_MARKER, false);
                    self.flatten_level(cur, &child);
                }
                Some('"') => {
                    let value = parse_quoted(cur);
                    let _ = self.kernel.store.set(&child, &value, false);
                }
                _ => {
                    self.io
                        .diag(&format!("object parse error: expected value after key '{key}', at: '{}'", cur.rest()));
                    cur.consume_all();
                    return;
                }
            }
        }
    }
}

fn push_quoted(out: &mut String, value: &str) {
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            _ => out.push(c),
        }
    }
    out.push('"');
}

/// Stringifies the flat layout under `base` back into `object:[…]` form.
///
/// Direct children are collected from the current scope in insertion order;
/// a child whose struct-type marker names a container recurses. Keys that
/// themselves contain `_` cannot round-trip through the mangling and are
/// skipped, as they always have been.
pub(crate) fn stringify_object(store: &VariableStore, base: &str) -> Option<String> {
    let mut out = String::from(OBJECT_PREFIX);
    build_level(store, base, store.current_scope_id(), &mut out, 0)?;
    Some(out)
}

fn build_level(store: &VariableStore, base: &str, scope: u32, out: &mut String, depth: u32) -> Option<()> {
    if depth > 64 {
        return None;
    }
    let prefix = format!("{base}_");

    // key → (direct value, struct-type marker), in insertion order.
    let mut children: IndexMap<String, (Option<String>, Option<String>)> = IndexMap::new();
    for (name, var) in store.iter_scope(scope) {
        let Some(sub) = name.strip_prefix(prefix.as_str()) else {
            continue;
        };
        if let Some(key) = sub.strip_suffix(STRUCT_TYPE_SUFFIX) {
            if key.is_empty() || key.contains('_') {
                continue;
            }
            children.entry(key.to_owned()).or_default().1 = Some(var.value.clone());
        } else {
            if sub.is_empty() || sub.contains('_') {
                continue;
            }
            children.entry(sub.to_owned()).or_default().0 = Some(var.value.clone());
        }
    }

    out.push('[');
    let mut first = true;
    for (key, (value, type_info)) in &children {
        if !first {
            out.push_str(", ");
        }
        first = false;
        push_quoted(out, key);
        out.push_str(": ");

        if matches!(type_info.as_deref(), Some(OBJECT_MARKER | OBJECT_ROOT_MARKER)) {
            build_level(store, &format!("{base}_{key}"), scope, out, depth + 1)?;
        } else if let Some(value) = value {
            push_quoted(out, value);
        } else if let Some(value) = store.get(&format!("{base}_{key}")) {
            // The child may live in an outer scope.
            push_quoted(out, value);
        } else {
            out.push_str("\"\"");
        }
    }
    out.push(']');
    Some(())
}
