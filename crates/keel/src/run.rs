//! The line dispatcher.
//!
//! `process_line` is the entry point the surrounding layers (REPL, script
//! runner, `eval`, function bodies) call once per source line: tokenize,
//! classify (assignment, built-in keyword, user function, external command,
//! standalone expression), and route. Expression parts go through the
//! evaluator; block structure goes through the state in [`ExecState`].

use std::path::Path;

use crate::{
    blocks::{BlockKind, ClosedBranch, ExecState, RunState},
    expand::{expand, unescape},
    functions::UserFunction,
    io::ShellIo,
    kernel::Kernel,
    object::{JSON_PREFIX, OBJECT_PREFIX},
    os,
    scan::tokenize,
    token::{Token, TokenKind},
};

/// Name of the variable receiving every standalone expression's value.
pub const LAST_OP_RESULT: &str = "LAST_OP_RESULT";

/// Name of the variable receiving every external command's exit status.
pub const LAST_COMMAND_STATUS: &str = "LAST_COMMAND_STATUS";

/// What the executor should do after one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LineOutcome {
    Continue,
    /// Re-process from this line index (a `while` loop repeating).
    Jump(usize),
}

/// One execution context: the kernel, the host's output channels, and the
/// block/control-flow state of the source currently being processed.
pub(crate) struct Machine<'a> {
    pub(crate) kernel: &'a mut Kernel,
    pub(crate) io: &'a mut dyn ShellIo,
    pub(crate) exec: &'a mut ExecState,
}

/// Expands one token into its string value: string literals are unescaped
/// first, everything else is expanded verbatim.
pub(crate) fn token_value(tok: &Token<'_>, kernel: &Kernel) -> String {
    let cap = kernel.limits.max_expand_len;
    if tok.kind == TokenKind::String {
        expand(&unescape(tok.text), &kernel.store, cap)
    } else {
        expand(tok.text, &kernel.store, cap)
    }
}

/// Truthiness of a condition value: `"1"` and `"true"` are true, `"0"`,
/// `"false"`, and the empty string are false, anything else is true.
pub(crate) fn truthy(value: &str) -> bool {
    value == "1"
        || value.eq_ignore_ascii_case("true")
        || (!value.is_empty() && value != "0" && !value.eq_ignore_ascii_case("false"))
}

/// Strips `$` (and `{…}`) from a variable token's text. Returns `None` when
/// nothing usable remains.
pub(crate) fn variable_base_name(text: &str) -> Option<&str> {
    let rest = text.strip_prefix('$')?;
    let name = if let Some(inner) = rest.strip_prefix('{') {
        inner.strip_suffix('}').unwrap_or(inner)
    } else {
        rest
    };
    if name.is_empty() { None } else { Some(name) }
}

/// Runs a buffered sequence of lines through `machine`, honoring `while`
/// jumps and `exit` requests. Line numbers are 1-based buffer indexes.
pub(crate) fn run_buffer(machine: &mut Machine<'_>, lines: &[String]) {
    let mut pc = 0;
    while pc < lines.len() {
        if machine.exec.state == RunState::ReturnRequested {
            break;
        }
        match machine.process_line(&lines[pc], (pc + 1) as u32, Some(pc)) {
            LineOutcome::Continue => pc += 1,
            LineOutcome::Jump(target) => pc = target,
        }
    }
    if let Some(pending) = machine.exec.pending.take() {
        machine
            .io
            .diag(&format!("unterminated function definition '{}' at end of input", pending.func.name));
    }
}

impl Machine<'_> {
    /// Re-borrows this machine with a different execution context, for
    /// running a nested source (function body, imported script).
    pub(crate) fn nested<'b>(&'b mut self, exec: &'b mut ExecState) -> Machine<'b> {
        Machine { kernel: &mut *self.kernel, io: &mut *self.io, exec }
    }

    /// Processes one line. `pc` is the line's index inside a replayable
    /// buffer, or `None` for non-replayable input (interactive, `eval`).
    pub(crate) fn process_line(&mut self, raw: &str, line_no: u32, pc: Option<usize>) -> LineOutcome {
        let line = raw.trim();
        if line.is_empty() {
            return LineOutcome::Continue;
        }

        // A pending `defunc` captures lines verbatim until its body closes.
        if self.exec.pending.is_some() && self.exec.state == RunState::DefineFuncBody {
            self.capture_function_line(line);
            return LineOutcome::Continue;
        }

        if self.exec.state == RunState::ReturnRequested {
            return LineOutcome::Continue;
        }

        let tokens = tokenize(line, line_no, &self.kernel.registry);
        for tok in &tokens {
            if tok.kind == TokenKind::Error {
                self.io.diag(&format!(
                    "tokenize error: unrecognized character '{}' at line {}, col {}",
                    tok.text, tok.line, tok.col
                ));
            }
        }
        if tokens[0].is_eof() {
            return LineOutcome::Continue;
        }

        // Block structure: `{`, `}`, and the combined `} else …` form.
        if tokens[0].kind == TokenKind::LBrace && tokens.len() == 2 {
            self.handle_open_brace();
            return LineOutcome::Continue;
        }
        if tokens[0].kind == TokenKind::RBrace {
            if tokens.len() == 2 {
                return self.handle_close_brace(pc);
            }
            if tokens.get(1).is_some_and(|t| t.kind == TokenKind::Word && self.kernel.resolve_alias(t.text) == "else") {
                let outcome = self.handle_close_brace(pc);
                self.handle_else(&tokens[2..], line_no);
                return outcome;
            }
            self.io.diag(&format!("syntax error: unexpected tokens after '}}' (line {line_no})"));
            return LineOutcome::Continue;
        }

        // While skipping, only the block structure of the line matters.
        if self.exec.state == RunState::BlockSkip {
            self.track_skipped_line(&tokens, line_no);
            return LineOutcome::Continue;
        }

        // A bare `else` pairs with the branch a previous `}` just closed.
        if tokens[0].kind == TokenKind::Word && self.kernel.resolve_alias(tokens[0].text) == "else" {
            self.handle_else(&tokens[1..], line_no);
            return LineOutcome::Continue;
        }
        self.exec.last_closed = None;

        // Assignment: `$var = expr…` or `$base[index] = expr…`.
        if tokens[0].kind == TokenKind::Variable {
            if tokens.get(1).map(|t| t.kind) == Some(TokenKind::Assign) {
                self.handle_assignment(&tokens, line_no);
                return LineOutcome::Continue;
            }
            if tokens.get(1).map(|t| t.kind) == Some(TokenKind::LBracket)
                && let Some(close) = tokens.iter().position(|t| t.kind == TokenKind::RBracket)
                && tokens.get(close + 1).map(|t| t.kind) == Some(TokenKind::Assign)
            {
                self.handle_array_assignment(&tokens, close, line_no);
                return LineOutcome::Continue;
            }
        }

        if tokens[0].kind == TokenKind::Word {
            let name = self.kernel.resolve_alias(tokens[0].text).to_owned();
            if let Some(outcome) = self.dispatch_builtin(&name, &tokens, line_no, pc) {
                return outcome;
            }
            if self.kernel.functions.contains(&name) {
                self.call_user_function(&name, &tokens[1..]);
                return LineOutcome::Continue;
            }
            if let Some(path) = os::find_in_path(tokens[0].text) {
                self.run_external(&path, &tokens[1..]);
                return LineOutcome::Continue;
            }
        }

        self.standalone_expression(&tokens, line_no);
        LineOutcome::Continue
    }

    // --- block structure ------------------------------------------------

    pub(crate) fn push_block(&mut self, kind: BlockKind, condition: bool, header_pc: Option<usize>, line_no: u32) {
        if self.exec.blocks.len() >= self.kernel.limits.max_block_depth {
            self.io
                .diag(&format!("maximum block nesting depth ({}) exceeded (line {line_no})", self.kernel.limits.max_block_depth));
            return;
        }
        self.exec.push_block(kind, condition, header_pc, line_no);
    }

    fn handle_open_brace(&mut self) {
        let Some(top) = self.exec.blocks.last() else {
            self.io.diag("'{' found without a preceding statement expecting it");
            return;
        };
        self.exec.state = if top.condition_true && self.exec.state != RunState::BlockSkip {
            RunState::BlockExecute
        } else {
            RunState::BlockSkip
        };
    }

    fn handle_close_brace(&mut self, pc: Option<usize>) -> LineOutcome {
        let Some(frame) = self.exec.blocks.pop() else {
            self.io.diag("'}' found without a matching open block");
            self.exec.state = RunState::Normal;
            return LineOutcome::Continue;
        };

        // A true `while` block repeats by jumping back to its header line,
        // which re-evaluates the condition and pushes a fresh frame.
        if frame.kind == BlockKind::While && frame.condition_true && self.exec.state.executing() {
            if let Some(header) = frame.header_pc {
                self.exec.state = frame.prev_state;
                return LineOutcome::Jump(header);
            }
            self.io.diag(&format!(
                "'while' loop at line {} cannot repeat: input source is not replayable",
                frame.line_no
            ));
        }

        let new_state = match self.exec.blocks.last() {
            None => RunState::Normal,
            Some(parent) if parent.condition_true => RunState::BlockExecute,
            Some(_) => RunState::BlockSkip,
        };
        self.exec.state = new_state;

        if matches!(frame.kind, BlockKind::If | BlockKind::Else) {
            self.exec.last_closed = Some(ClosedBranch {
                condition_true: frame.condition_true,
                outer_executing: new_state.executing(),
            });
        }
        LineOutcome::Continue
    }

    /// Handles `else …` (with the leading `else` already stripped), pairing
    /// it with the `if`/`else if` branch that just closed.
    fn handle_else(&mut self, rest: &[Token<'_>], line_no: u32) {
        let Some(closed) = self.exec.last_closed.take() else {
            self.io
                .diag(&format!("'else' without a preceding 'if' block (line {line_no})"));
            self.push_block(BlockKind::Else, false, None, line_no);
            self.exec.state = RunState::BlockSkip;
            return;
        };

        let mut end = rest.len();
        while end > 0 && matches!(rest[end - 1].kind, TokenKind::Eof | TokenKind::LBrace) {
            end -= 1;
        }
        let rest = &rest[..end];

        let mut condition = false;
        if !closed.condition_true && closed.outer_executing {
            if rest.first().is_some_and(|t| t.kind == TokenKind::Word && self.kernel.resolve_alias(t.text) == "if") {
                let (negate, cond_tokens) = if rest.get(1).is_some_and(|t| t.text == "!") {
                    (true, &rest[2..])
                } else {
                    (false, &rest[1..])
                };
                if cond_tokens.is_empty() {
                    self.io.diag(&format!("syntax error for 'else if': missing condition (line {line_no})"));
                } else {
                    condition = self.eval_condition(cond_tokens) != negate;
                }
            } else {
                condition = true;
            }
        }

        self.push_block(BlockKind::Else, condition, None, line_no);
        self.exec.state = if condition && closed.outer_executing {
            RunState::BlockExecute
        } else {
            RunState::BlockSkip
        };
    }

    pub(crate) fn handle_if(&mut self, tokens: &[Token<'_>], line_no: u32) {
        let mut end = tokens.len();
        while end > 1 && matches!(tokens[end - 1].kind, TokenKind::Eof | TokenKind::LBrace) {
            end -= 1;
        }
        let cond_tokens = &tokens[1..end];
        let condition = if cond_tokens.is_empty() {
            self.io.diag(&format!("syntax error for 'if': missing condition (line {line_no})"));
            false
        } else {
            self.eval_condition(cond_tokens)
        };
        self.push_block(BlockKind::If, condition, None, line_no);
        self.exec.state = if condition { RunState::BlockExecute } else { RunState::BlockSkip };
    }

    pub(crate) fn handle_while(&mut self, tokens: &[Token<'_>], line_no: u32, pc: Option<usize>) {
        let mut end = tokens.len();
        while end > 1 && matches!(tokens[end - 1].kind, TokenKind::Eof | TokenKind::LBrace) {
            end -= 1;
        }
        let (negate, start) = if tokens.get(1).is_some_and(|t| t.text == "!" && t.kind != TokenKind::String) {
            (true, 2)
        } else {
            (false, 1)
        };
        let condition = if start >= end {
            self.io.diag(&format!("syntax error for 'while': missing condition (line {line_no})"));
            false
        } else {
            self.eval_condition(&tokens[start..end]) != negate
        };
        self.push_block(BlockKind::While, condition, pc, line_no);
        self.exec.state = if condition { RunState::BlockExecute } else { RunState::BlockSkip };
    }

    /// Evaluates a condition expression down to a truthiness flag. Evaluation
    /// failures diagnose and count as false.
    fn eval_condition(&mut self, tokens: &[Token<'_>]) -> bool {
        match self.eval_tokens(tokens) {
            Ok(value) => truthy(&value),
            Err(_) => false,
        }
    }

    /// Tracks block structure on a line that is being skipped.
    fn track_skipped_line(&mut self, tokens: &[Token<'_>], line_no: u32) {
        if tokens[0].kind == TokenKind::Word {
            let name = self.kernel.resolve_alias(tokens[0].text).to_owned();
            match name.as_str() {
                "else" => {
                    self.handle_else(&tokens[1..], line_no);
                    return;
                }
                "if" => self.push_block(BlockKind::If, false, None, line_no),
                "while" => self.push_block(BlockKind::While, false, None, line_no),
                "defunc" => self.push_block(BlockKind::FuncDef, false, None, line_no),
                _ => {}
            }
        }
        self.exec.last_closed = None;
    }

    // --- assignment -----------------------------------------------------

    fn handle_assignment(&mut self, tokens: &[Token<'_>], line_no: u32) {
        let Some(base) = variable_base_name(tokens[0].text).map(str::to_owned) else {
            self.io.diag(&format!("malformed assignment target '{}' (line {line_no})", tokens[0].text));
            return;
        };
        let value = match self.eval_tokens(&tokens[2..]) {
            Ok(value) => value,
            Err(err) => {
                self.io
                    .diag(&format!("error evaluating right-hand side for assignment to '{base}'"));
                err.marker()
            }
        };

        // Structured data: flatten `object:[…]` / `json:[…]` payloads into
        // the store; the variable itself keeps the raw payload.
        let final_value = if let Some(data) = value.strip_prefix(OBJECT_PREFIX) {
            let data = data.to_owned();
            self.flatten_object(&data, &base);
            data
        } else if let Some(data) = value.strip_prefix(JSON_PREFIX) {
            let data = data.to_owned();
            self.flatten_object(&data, &base);
            data
        } else {
            value
        };

        if let Err(err) = self.kernel.store.set(&base, &final_value, false) {
            self.io.diag(&format!("cannot assign '{base}': {err}"));
        }
    }

    fn handle_array_assignment(&mut self, tokens: &[Token<'_>], close: usize, line_no: u32) {
        let Some(base) = variable_base_name(tokens[0].text).map(str::to_owned) else {
            self.io.diag(&format!("malformed assignment target '{}' (line {line_no})", tokens[0].text));
            return;
        };
        if close != 3 {
            self.io
                .diag(&format!("malformed array index in assignment to '{base}' (line {line_no})"));
            return;
        }
        let raw_index = tokens[2].text.to_owned();
        let value = match self.eval_tokens(&tokens[close + 2..]) {
            Ok(value) => value,
            Err(err) => {
                self.io
                    .diag(&format!("error evaluating right-hand side for assignment to '{base}[{raw_index}]'"));
                err.marker()
            }
        };
        let cap = self.kernel.limits.max_expand_len;
        if let Err(err) = self.kernel.store.set_array_element(&base, &raw_index, &value, cap) {
            self.io.diag(&format!("cannot assign '{base}[{raw_index}]': {err}"));
        }
    }

    // --- expression, functions, external commands -----------------------

    fn standalone_expression(&mut self, tokens: &[Token<'_>], _line_no: u32) {
        match self.eval_tokens(tokens) {
            Ok(value) => {
                if !value.is_empty() && !value.starts_with("HANDLER_NO_RESULT<") {
                    self.io.out(&format!("{value}\n"));
                }
                let _ = self.kernel.store.set(LAST_OP_RESULT, &value, false);
            }
            Err(err) => {
                let _ = self.kernel.store.set(LAST_OP_RESULT, &err.marker(), false);
            }
        }
    }

    fn call_user_function(&mut self, name: &str, arg_tokens: &[Token<'_>]) {
        let Some(func) = self.kernel.functions.get(name).cloned() else {
            return;
        };
        let args: Vec<String> = arg_tokens
            .iter()
            .filter(|t| !t.is_eof())
            .map(|t| token_value(t, self.kernel))
            .collect();
        self.run_function(&func, &args);
    }

    /// Calls a user function: fresh scope, parameters bound to expanded
    /// argument values (missing arguments bind empty), body dispatched line
    /// by line, scope left.
    pub(crate) fn run_function(&mut self, func: &UserFunction, args: &[String]) {
        let scope = match self.kernel.store.enter_scope() {
            Ok(scope) => scope,
            Err(err) => {
                self.io.diag(&format!("cannot call '{}': {err}", func.name));
                return;
            }
        };
        for (i, param) in func.params.iter().enumerate() {
            let value = args.get(i).map_or("", String::as_str);
            if let Err(err) = self.kernel.store.set(param, value, false) {
                self.io.diag(&format!("cannot bind parameter '{param}': {err}"));
            }
        }
        self.run_body(&func.body);
        let _ = self.kernel.store.leave_scope(scope);
    }

    /// Runs a function body (or other nested line buffer) in a fresh
    /// execution context sharing this machine's kernel and io.
    pub(crate) fn run_body(&mut self, lines: &[String]) {
        let mut nested = ExecState::new();
        let mut machine = self.nested(&mut nested);
        run_buffer(&mut machine, lines);
    }

    fn run_external(&mut self, path: &Path, arg_tokens: &[Token<'_>]) {
        let toks: Vec<&Token<'_>> = arg_tokens.iter().filter(|t| !t.is_eof()).collect();
        let mut args: Vec<String> = Vec::with_capacity(toks.len());
        let mut i = 0;
        while i < toks.len() {
            let tok = toks[i];
            // Re-combine the two-token reading of `-word` option arguments.
            let combines = matches!(tok.kind, TokenKind::Operator | TokenKind::Word)
                && tok.text == "-"
                && toks.get(i + 1).is_some_and(|next| {
                    next.kind == TokenKind::Word && !next.text.as_bytes().first().is_some_and(u8::is_ascii_digit)
                });
            if combines {
                args.push(format!("-{}", toks[i + 1].text));
                i += 2;
            } else {
                args.push(token_value(tok, self.kernel));
                i += 1;
            }
        }
        match os::run_command(path, &args) {
            Ok(status) => {
                let _ = self.kernel.store.set(LAST_COMMAND_STATUS, &status.to_string(), false);
            }
            Err(err) => {
                self.io.diag(&format!("failed to run '{}': {err}", path.display()));
                let _ = self.kernel.store.set(LAST_COMMAND_STATUS, "-1", false);
            }
        }
    }
}
