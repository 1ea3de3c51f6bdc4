//! Built-in commands.
//!
//! Built-ins are the only statements with hardcoded semantics; everything
//! else the shell does is script-defined. `defoperator` is the exclusive way
//! scripts extend the operator table. `setvar`/`getvar`/`calc` exist so that
//! operator handlers can be written in the shell language itself: handlers
//! receive variable *names* and need by-name access plus primitive
//! arithmetic to bootstrap their semantics.

use std::str::FromStr as _;

use crate::{
    blocks::{ExitRequest, PendingFunction, RunState},
    functions::UserFunction,
    object::{OBJECT_ROOT_MARKER, STRUCT_TYPE_SUFFIX, stringify_object},
    os,
    registry::{Associativity, OperatorDef, OperatorRole, RegisterOutcome},
    run::{LAST_COMMAND_STATUS, LineOutcome, Machine, token_value, variable_base_name},
    scan::tokenize,
    token::{Token, TokenKind},
};

/// Strips the tokens at and after the end-of-line marker.
fn substantive<'t, 's>(tokens: &'t [Token<'s>]) -> &'t [Token<'s>] {
    let end = tokens.iter().position(Token::is_eof).unwrap_or(tokens.len());
    &tokens[..end]
}

/// Drops the surrounding quotes of a string token's text, without
/// unescaping. Operator symbols and handler names are registered verbatim.
fn strip_quotes(text: &str) -> &str {
    text.strip_prefix('"').and_then(|t| t.strip_suffix('"')).unwrap_or(text)
}

impl Machine<'_> {
    /// Dispatches a built-in keyword. Returns `None` when `name` is not a
    /// built-in, so the caller can try user functions and external commands.
    pub(crate) fn dispatch_builtin(
        &mut self,
        name: &str,
        tokens: &[Token<'_>],
        line_no: u32,
        pc: Option<usize>,
    ) -> Option<LineOutcome> {
        match name {
            "echo" => self.builtin_echo(&tokens[1..]),
            "defoperator" => self.builtin_defoperator(tokens),
            "defkeyword" => self.builtin_defkeyword(tokens),
            "defunc" => self.builtin_defunc(tokens),
            "if" => self.handle_if(tokens, line_no),
            "while" => self.handle_while(tokens, line_no, pc),
            "import" => self.builtin_import(tokens),
            "eval" => self.builtin_eval(tokens),
            "exit" => self.builtin_exit(tokens),
            "update_cwd" => self.builtin_update_cwd(tokens),
            "setvar" => self.builtin_setvar(tokens, line_no),
            "getvar" => self.builtin_getvar(tokens, line_no),
            "calc" => self.builtin_calc(tokens, line_no),
            _ => return None,
        }
        Some(LineOutcome::Continue)
    }

    /// `echo arg…` — expanded arguments joined with single spaces. A variable
    /// carrying the object root marker is stringified back to `object:[…]`.
    fn builtin_echo(&mut self, args: &[Token<'_>]) {
        let args = substantive(args);
        let mut pieces: Vec<String> = Vec::with_capacity(args.len());
        for tok in args {
            if tok.kind == TokenKind::Variable
                && let Some(base) = variable_base_name(tok.text)
            {
                let marker = format!("{base}{STRUCT_TYPE_SUFFIX}");
                if self.kernel.store.get(&marker) == Some(OBJECT_ROOT_MARKER) {
                    match stringify_object(&self.kernel.store, base) {
                        Some(text) => pieces.push(text),
                        None => pieces.push(format!("[error stringifying object: {base}]")),
                    }
                    continue;
                }
            }
            pieces.push(token_value(tok, self.kernel));
        }
        self.io.out(&format!("{}\n", pieces.join(" ")));
    }

    /// `defoperator <symbol> TYPE <role> [PRECEDENCE <n>] [ASSOC <L|R|N>]
    /// HANDLER <name>` — the exclusive way scripts extend the operator table.
    /// Exactly this positional form; anything else is a syntax error.
    fn builtin_defoperator(&mut self, tokens: &[Token<'_>]) {
        const USAGE: &str = "syntax: defoperator <symbol> TYPE <type> [PRECEDENCE <n>] [ASSOC <L|R|N>] HANDLER <handler>";
        let toks = substantive(tokens);
        if toks.len() < 6 {
            self.io.diag(USAGE);
            self.io
                .diag("  TYPE: UNARY_PREFIX, UNARY_POSTFIX, BINARY_INFIX, TERNARY_PRIMARY, TERNARY_SECONDARY; ASSOC: L, R, N");
            return;
        }

        let symbol = match toks[1].kind {
            TokenKind::String => strip_quotes(toks[1].text).to_owned(),
            TokenKind::Word => toks[1].text.to_owned(),
            _ => {
                self.io.diag("defoperator: operator symbol must be a string or word");
                return;
            }
        };
        if symbol.is_empty() {
            self.io.diag("defoperator: operator symbol cannot be empty");
            return;
        }

        let mut idx = 2;
        if !toks[idx].is_word("TYPE") || idx + 1 >= toks.len() {
            self.io.diag("defoperator: missing 'TYPE' keyword or value");
            return;
        }
        idx += 1;
        let Ok(role) = OperatorRole::from_str(toks[idx].text) else {
            self.io.diag(&format!("defoperator: unknown operator TYPE '{}'", toks[idx].text));
            return;
        };
        idx += 1;

        let mut precedence = 0i32;
        if toks.get(idx).is_some_and(|t| t.is_word("PRECEDENCE")) {
            idx += 1;
            let number = toks.get(idx).filter(|t| t.kind == TokenKind::Number).and_then(|t| t.text.parse::<i32>().ok());
            let Some(number) = number else {
                self.io.diag("defoperator: PRECEDENCE requires an integer");
                return;
            };
            precedence = number;
            idx += 1;
        }

        let mut associativity = Associativity::Left;
        if toks.get(idx).is_some_and(|t| t.is_word("ASSOC")) {
            idx += 1;
            let parsed = toks
                .get(idx)
                .filter(|t| t.kind == TokenKind::Word)
                .and_then(|t| Associativity::from_str(t.text).ok());
            let Some(parsed) = parsed else {
                self.io.diag("defoperator: ASSOC requires L, R, or N");
                return;
            };
            associativity = parsed;
            idx += 1;
        }

        if !toks.get(idx).is_some_and(|t| t.is_word("HANDLER")) || idx + 1 >= toks.len() {
            self.io
                .diag(&format!("defoperator: missing 'HANDLER' keyword or value for operator '{symbol}'"));
            return;
        }
        idx += 1;
        let handler = match toks[idx].kind {
            TokenKind::String => strip_quotes(toks[idx].text).to_owned(),
            TokenKind::Word => toks[idx].text.to_owned(),
            _ => {
                self.io
                    .diag(&format!("defoperator: handler name must be a word or string for operator '{symbol}'"));
                return;
            }
        };
        if idx + 1 < toks.len() {
            self.io.diag(&format!("defoperator: unexpected tokens after handler name for operator '{symbol}'"));
            return;
        }

        let def = OperatorDef { symbol: symbol.clone(), role, precedence, associativity, handler };
        match self.kernel.registry.register(def) {
            Ok(RegisterOutcome::Replaced) => {
                self.io.diag(&format!("operator '{symbol}' already defined; replacing"));
            }
            Ok(RegisterOutcome::Added) => {}
            Err(err) => self.io.diag(&format!("defoperator: {err}")),
        }
    }

    /// `defkeyword <original> <alias>` — aliases a built-in keyword.
    fn builtin_defkeyword(&mut self, tokens: &[Token<'_>]) {
        let toks = substantive(tokens);
        let valid = toks.len() == 3
            && toks[1..3]
                .iter()
                .all(|t| matches!(t.kind, TokenKind::Word | TokenKind::String));
        if !valid {
            self.io.diag("syntax: defkeyword <original> <alias>");
            return;
        }
        let original = strip_quotes(toks[1].text).to_owned();
        let alias = strip_quotes(toks[2].text).to_owned();
        if let Some(previous) = self.kernel.aliases.insert(alias.clone(), original.clone()) {
            self.io
                .diag(&format!("alias '{alias}' already defined for '{previous}'; now aliasing '{original}'"));
        }
    }

    /// `defunc <name> [(param …)] [{]` — opens a function definition whose
    /// body is captured verbatim until the matching `}`.
    fn builtin_defunc(&mut self, tokens: &[Token<'_>]) {
        let toks = substantive(tokens);
        if toks.len() < 2 || toks[1].kind != TokenKind::Word {
            self.io.diag("syntax: defunc <funcname> [(param1 ...)] [{]");
            return;
        }
        if self.exec.pending.is_some() {
            self.io.diag("cannot nest function definitions");
            return;
        }
        let mut func = UserFunction { name: toks[1].text.to_owned(), params: Vec::new(), body: Vec::new() };

        let mut idx = 2;
        if toks.get(idx).map(|t| t.kind) == Some(TokenKind::LParen) {
            idx += 1;
            while let Some(tok) = toks.get(idx) {
                match tok.kind {
                    TokenKind::RParen => break,
                    TokenKind::Word => {
                        if func.params.len() >= self.kernel.limits.max_func_params {
                            self.io.diag(&format!(
                                "too many parameters for function '{}' (max {})",
                                func.name, self.kernel.limits.max_func_params
                            ));
                            return;
                        }
                        func.params.push(tok.text.to_owned());
                    }
                    _ => {
                        self.io.diag(&format!(
                            "syntax error in parameters of '{}': expected word, got '{}'",
                            func.name, tok.text
                        ));
                        return;
                    }
                }
                idx += 1;
            }
            if toks.get(idx).map(|t| t.kind) != Some(TokenKind::RParen) {
                self.io.diag(&format!("syntax error in parameters of '{}': missing ')'", func.name));
                return;
            }
            idx += 1;
        }

        let opened = match toks.get(idx).map(|t| t.kind) {
            Some(TokenKind::LBrace) if idx + 1 == toks.len() => true,
            None => false,
            _ => {
                self.io
                    .diag(&format!("syntax error in definition of '{}': '{{' expected, got '{}'", func.name, toks[idx].text));
                return;
            }
        };

        self.exec.pending = Some(PendingFunction {
            func,
            opened,
            depth: u32::from(opened),
            prev_state: self.exec.state,
            overflowed: false,
        });
        self.exec.state = RunState::DefineFuncBody;
    }

    /// Captures one raw line into the pending function definition. Brace
    /// depth is tracked through the tokenizer so braces inside strings and
    /// comments don't count; the `}` that balances the definition ends it.
    pub(crate) fn capture_function_line(&mut self, line: &str) {
        let opened = self.exec.pending.as_ref().is_some_and(|p| p.opened);
        if !opened {
            if line == "{" {
                if let Some(pending) = self.exec.pending.as_mut() {
                    pending.opened = true;
                    pending.depth = 1;
                }
            } else if let Some(pending) = self.exec.pending.take() {
                self.io
                    .diag(&format!("defunc: expected '{{' to open the body of '{}'", pending.func.name));
                self.exec.state = pending.prev_state;
            }
            return;
        }

        let (opens, closes) = {
            let tokens = tokenize(line, 0, &self.kernel.registry);
            let opens = tokens.iter().filter(|t| t.kind == TokenKind::LBrace).count();
            let closes = tokens.iter().filter(|t| t.kind == TokenKind::RBrace).count();
            (opens as i64, closes as i64)
        };

        let depth = self.exec.pending.as_ref().map_or(0, |p| i64::from(p.depth));
        let depth_after = depth + opens - closes;
        if depth_after <= 0 {
            if let Some(pending) = self.exec.pending.take() {
                self.exec.state = pending.prev_state;
                self.kernel.functions.define(pending.func);
            }
            return;
        }

        let line_cap = self.kernel.limits.max_func_lines;
        let Some(pending) = self.exec.pending.as_mut() else { return };
        pending.depth = depth_after as u32;
        if pending.func.body.len() >= line_cap {
            if !pending.overflowed {
                pending.overflowed = true;
                let name = pending.func.name.clone();
                self.io
                    .diag(&format!("function '{name}' exceeds the body line cap ({line_cap}); extra lines dropped"));
            }
            return;
        }
        pending.func.body.push(line.to_owned());
    }

    /// `import <module>` — resolves against `KEEL_MODULE_PATH` and runs the
    /// module in this kernel. Definitions persist; block state does not leak.
    fn builtin_import(&mut self, tokens: &[Token<'_>]) {
        let toks = substantive(tokens);
        if toks.len() < 2 {
            self.io.diag("syntax: import <module_name_or_path>");
            return;
        }
        let spec = token_value(&toks[1], self.kernel);
        if spec.is_empty() {
            self.io.diag("import: empty module path/name after expansion");
            return;
        }
        let module_path = self.kernel.store.get("KEEL_MODULE_PATH").unwrap_or_default().to_owned();
        let Some(path) = os::resolve_module(&spec, &module_path) else {
            self.io.diag(&format!("import: module '{spec}' not found"));
            return;
        };
        match std::fs::read_to_string(&path) {
            Ok(text) => {
                let lines: Vec<String> = text.lines().map(str::to_owned).collect();
                self.run_body(&lines);
            }
            Err(err) => {
                self.io.diag(&format!("import: cannot read '{}': {err}", path.display()));
            }
        }
    }

    /// `eval arg…` — concatenates the expanded arguments and processes the
    /// result as one line. The synthesized line is not replayable, so a
    /// `while` inside it cannot loop.
    fn builtin_eval(&mut self, tokens: &[Token<'_>]) {
        let toks = substantive(tokens);
        let parts: Vec<String> = toks[1..].iter().map(|t| token_value(t, self.kernel)).collect();
        let code = parts.join(" ");
        if code.trim().is_empty() {
            let _ = self.kernel.store.set(LAST_COMMAND_STATUS, "0", false);
            return;
        }
        let _ = self.process_line(&code, 0, None);
    }

    /// `exit [code]` — stops the current context (script, function, or the
    /// whole shell at the interactive prompt).
    fn builtin_exit(&mut self, tokens: &[Token<'_>]) {
        let toks = substantive(tokens);
        let code = toks
            .get(1)
            .map(|t| token_value(t, self.kernel))
            .and_then(|v| v.trim().parse::<i32>().ok())
            .unwrap_or(0);
        self.exec.exit = Some(ExitRequest { code });
        self.exec.state = RunState::ReturnRequested;
    }

    /// `update_cwd [dir]` — optionally changes directory, then refreshes the
    /// `CWD` variable from the process working directory.
    fn builtin_update_cwd(&mut self, tokens: &[Token<'_>]) {
        let toks = substantive(tokens);
        if let Some(tok) = toks.get(1) {
            let target = token_value(tok, self.kernel);
            if let Err(err) = std::env::set_current_dir(&target) {
                self.io.diag(&format!("update_cwd: cannot change to '{target}': {err}"));
            }
        }
        let cwd = std::env::current_dir().map(|p| p.display().to_string()).unwrap_or_default();
        let _ = self.kernel.store.set("CWD", &cwd, false);
    }

    /// `setvar <name> <value>` — assigns to the variable *named by* the first
    /// argument, updating the innermost existing binding in place (else
    /// creating one in the current scope). Handlers use this to publish
    /// results and to mutate their caller's variables.
    fn builtin_setvar(&mut self, tokens: &[Token<'_>], line_no: u32) {
        let toks = substantive(tokens);
        if toks.len() != 3 {
            self.io.diag(&format!("syntax: setvar <name> <value> (line {line_no})"));
            return;
        }
        let name = token_value(&toks[1], self.kernel);
        let value = token_value(&toks[2], self.kernel);
        if let Err(err) = self.kernel.store.set_in_place(&name, &value) {
            self.io.diag(&format!("setvar: {err}"));
        }
    }

    /// `getvar <name> <dest>` — reads the variable named by the first
    /// argument (empty if unset) into the variable named by the second.
    fn builtin_getvar(&mut self, tokens: &[Token<'_>], line_no: u32) {
        let toks = substantive(tokens);
        if toks.len() != 3 {
            self.io.diag(&format!("syntax: getvar <name> <dest> (line {line_no})"));
            return;
        }
        let name = token_value(&toks[1], self.kernel);
        let dest = token_value(&toks[2], self.kernel);
        let value = self.kernel.store.get(&name).unwrap_or_default().to_owned();
        if let Err(err) = self.kernel.store.set_in_place(&dest, &value) {
            self.io.diag(&format!("getvar: {err}"));
        }
    }

    /// `calc <lhs> <op> <rhs> <dest>` — primitive arithmetic and comparison
    /// for handler scripts. The expression evaluator itself owns no
    /// arithmetic; handlers delegate here.
    fn builtin_calc(&mut self, tokens: &[Token<'_>], line_no: u32) {
        let toks = substantive(tokens);
        if toks.len() != 5 {
            self.io.diag(&format!("syntax: calc <lhs> <op> <rhs> <dest> (line {line_no})"));
            return;
        }
        let lhs = token_value(&toks[1], self.kernel);
        let op = token_value(&toks[2], self.kernel);
        let rhs = token_value(&toks[3], self.kernel);
        let dest = token_value(&toks[4], self.kernel);
        let result = match calc_apply(&lhs, &op, &rhs) {
            Ok(value) => value,
            Err(marker) => {
                self.io.diag(&format!("calc: cannot apply '{lhs}' {op} '{rhs}'"));
                marker
            }
        };
        if let Err(err) = self.kernel.store.set_in_place(&dest, &result) {
            self.io.diag(&format!("calc: {err}"));
        }
    }
}

fn bool_value(flag: bool) -> String {
    if flag { "1".to_owned() } else { "0".to_owned() }
}

/// Applies one `calc` operation. Arithmetic is integer when both sides parse
/// as integers, floating-point when both parse as numbers, and an error
/// otherwise. Comparisons fall back to bytewise string ordering.
fn calc_apply(lhs: &str, op: &str, rhs: &str) -> Result<String, String> {
    let lhs = lhs.trim();
    let rhs = rhs.trim();

    if matches!(op, "==" | "!=" | "<" | "<=" | ">" | ">=") {
        let ordering = match (lhs.parse::<f64>(), rhs.parse::<f64>()) {
            (Ok(a), Ok(b)) => a.partial_cmp(&b),
            _ => Some(lhs.cmp(rhs)),
        };
        let Some(ordering) = ordering else {
            return Err("CALC_ERROR<incomparable>".to_owned());
        };
        let flag = match op {
            "==" => ordering.is_eq(),
            "!=" => ordering.is_ne(),
            "<" => ordering.is_lt(),
            "<=" => ordering.is_le(),
            ">" => ordering.is_gt(),
            ">=" => ordering.is_ge(),
            _ => unreachable!(),
        };
        return Ok(bool_value(flag));
    }

    if !matches!(op, "+" | "-" | "*" | "/" | "%") {
        return Err("CALC_ERROR<unknown_operation>".to_owned());
    }

    if let (Ok(a), Ok(b)) = (lhs.parse::<i64>(), rhs.parse::<i64>()) {
        let value = match op {
            "+" => a.wrapping_add(b),
            "-" => a.wrapping_sub(b),
            "*" => a.wrapping_mul(b),
            "/" | "%" if b == 0 => return Err("CALC_ERROR<division_by_zero>".to_owned()),
            "/" => a.wrapping_div(b),
            "%" => a.wrapping_rem(b),
            _ => unreachable!(),
        };
        return Ok(value.to_string());
    }

    if let (Ok(a), Ok(b)) = (lhs.parse::<f64>(), rhs.parse::<f64>()) {
        let value = match op {
            "+" => a + b,
            "-" => a - b,
            "*" => a * b,
            "/" | "%" if b == 0.0 => return Err("CALC_ERROR<division_by_zero>".to_owned()),
            "/" => a / b,
            "%" => a % b,
            _ => unreachable!(),
        };
        return Ok(value.to_string());
    }

    Err("CALC_ERROR<non_numeric>".to_owned())
}

#[cfg(test)]
mod tests {
    use super::calc_apply;

    #[test]
    fn integer_arithmetic() {
        assert_eq!(calc_apply("2", "+", "3"), Ok("5".to_owned()));
        assert_eq!(calc_apply("10", "-", "3"), Ok("7".to_owned()));
        assert_eq!(calc_apply("6", "*", "7"), Ok("42".to_owned()));
        assert_eq!(calc_apply("7", "/", "2"), Ok("3".to_owned()));
        assert_eq!(calc_apply("7", "%", "2"), Ok("1".to_owned()));
    }

    #[test]
    fn float_arithmetic() {
        assert_eq!(calc_apply("1.5", "+", "2"), Ok("3.5".to_owned()));
        assert_eq!(calc_apply("7", "/", "2.0"), Ok("3.5".to_owned()));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert_eq!(calc_apply("1", "/", "0"), Err("CALC_ERROR<division_by_zero>".to_owned()));
        assert_eq!(calc_apply("1", "%", "0"), Err("CALC_ERROR<division_by_zero>".to_owned()));
    }

    #[test]
    fn comparisons_are_numeric_when_both_sides_parse() {
        assert_eq!(calc_apply("10", "<", "9"), Ok("0".to_owned()));
        assert_eq!(calc_apply("9", "<", "10"), Ok("1".to_owned()));
        // Lexicographic fallback: "10" < "9" as strings.
        assert_eq!(calc_apply("10", "<", "9x"), Ok("1".to_owned()));
    }

    #[test]
    fn non_numeric_arithmetic_is_an_error() {
        assert_eq!(calc_apply("a", "+", "b"), Err("CALC_ERROR<non_numeric>".to_owned()));
    }
}
