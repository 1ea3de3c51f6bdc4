//! The expression evaluator.
//!
//! Operator-precedence parsing via precedence climbing over a token slice.
//! The evaluator owns no operator semantics: every application is bridged to
//! the script handler registered for the operator's symbol, with the
//! already-evaluated operands as string arguments. Because handlers are shell
//! functions, an application may re-enter this evaluator; the recursion depth
//! cap is the only bound.
//!
//! Ternary `?:` is evaluated eagerly: both arms are computed before the
//! handler sees them. Handlers relying on side-effect order depend on this.

use crate::{
    error::ExprError,
    expand::{expand, unescape},
    registry::{Associativity, OperatorRole},
    run::Machine,
    token::{Token, TokenKind},
};

/// Extracts the bare name of a *simple* variable token: `$name` or
/// `${name}`, with no property or index access. This is the l-value form the
/// built-in `++`/`--` paths accept; anything else is rejected so the handler
/// always receives a mutable binding's name.
fn simple_variable_name(text: &str) -> Option<String> {
    let rest = text.strip_prefix('$')?;
    let name = if let Some(inner) = rest.strip_prefix('{') {
        inner.strip_suffix('}')?
    } else {
        rest
    };
    if name.is_empty() || name.contains('.') || name.contains('[') {
        return None;
    }
    Some(name.to_owned())
}

impl Machine<'_> {
    /// Evaluates an expression given as a token slice. An empty expression
    /// (or a lone end-of-line token) evaluates to the empty string.
    ///
    /// Trailing tokens after a complete expression are tolerated with a
    /// diagnostic; the parsed prefix's value is returned.
    pub(crate) fn eval_tokens(&mut self, tokens: &[Token<'_>]) -> Result<String, ExprError> {
        let end = tokens.iter().position(Token::is_eof).unwrap_or(tokens.len());
        let tokens = &tokens[..end];
        if tokens.is_empty() {
            return Ok(String::new());
        }
        let (result, consumed) = {
            let mut parser = ExprParser { machine: self, tokens, pos: 0, depth: 0 };
            let result = parser.parse_expression(0);
            (result, parser.pos)
        };
        let value = result?;
        if consumed < tokens.len() {
            let tok = &tokens[consumed];
            self.io.diag(&format!(
                "trailing tokens after expression, starting with '{}' at line {}, col {}",
                tok.text, tok.line, tok.col
            ));
        }
        Ok(value)
    }
}

struct ExprParser<'m, 'k, 't, 's> {
    machine: &'m mut Machine<'k>,
    tokens: &'t [Token<'s>],
    pos: usize,
    depth: u32,
}

impl<'s> ExprParser<'_, '_, '_, 's> {
    fn peek(&self) -> Option<Token<'s>> {
        self.tokens.get(self.pos).copied()
    }

    /// Emits the diagnostic for an error at its construction site.
    fn fail(&mut self, err: ExprError) -> ExprError {
        self.machine.io.diag(&format!("expression parser: {err}"));
        err
    }

    fn enter(&mut self) -> Result<(), ExprError> {
        let limit = self.machine.kernel.limits.max_expr_depth;
        if self.depth >= limit {
            return Err(self.fail(ExprError::RecursionLimit { limit }));
        }
        self.depth += 1;
        Ok(())
    }

    fn parse_expression(&mut self, min_prec: i32) -> Result<String, ExprError> {
        self.enter()?;
        let result = self.expression_inner(min_prec);
        self.depth -= 1;
        result
    }

    fn parse_operand(&mut self) -> Result<String, ExprError> {
        self.enter()?;
        let result = self.operand_inner();
        self.depth -= 1;
        result
    }

    /// Parses a primary: literal, variable, word, parenthesized
    /// sub-expression, or a unary prefix application.
    fn operand_inner(&mut self) -> Result<String, ExprError> {
        let cap = self.machine.kernel.limits.max_expand_len;
        let Some(tok) = self.peek() else {
            let (line, col) = self.tokens.last().map_or((0, 0), |t| (t.line, t.col));
            return Err(self.fail(ExprError::UnexpectedTokenOperand {
                found: "end of expression".to_owned(),
                line,
                col,
            }));
        };

        match tok.kind {
            TokenKind::Number | TokenKind::Variable | TokenKind::Word => {
                self.pos += 1;
                Ok(expand(tok.text, &self.machine.kernel.store, cap))
            }
            TokenKind::String => {
                self.pos += 1;
                Ok(expand(&unescape(tok.text), &self.machine.kernel.store, cap))
            }
            TokenKind::LParen => {
                self.pos += 1;
                let value = self.parse_expression(0)?;
                if self.peek().map(|t| t.kind) != Some(TokenKind::RParen) {
                    return Err(self.fail(ExprError::MissingRParen { line: tok.line, col: tok.col }));
                }
                self.pos += 1;
                Ok(value)
            }
            TokenKind::Operator => {
                let def = self.machine.kernel.registry.lookup(tok.text).cloned();
                let Some(def) = def.filter(|d| d.role == OperatorRole::UnaryPrefix) else {
                    return Err(self.fail(ExprError::UnexpectedTokenOperand {
                        found: tok.text.to_owned(),
                        line: tok.line,
                        col: tok.col,
                    }));
                };
                if def.symbol == "++" || def.symbol == "--" {
                    // The handler mutates the variable, so it receives the
                    // NAME, not the value. Only a simple `$var` qualifies.
                    self.pos += 1;
                    let operand = self.peek();
                    let name = operand.filter(|t| t.kind == TokenKind::Variable).and_then(|t| simple_variable_name(t.text));
                    let Some(name) = name else {
                        let found = operand.map_or_else(|| "end of expression".to_owned(), |t| t.text.to_owned());
                        return Err(self.fail(ExprError::PrefixOperandNotVariable {
                            found,
                            line: tok.line,
                            col: tok.col,
                        }));
                    };
                    self.pos += 1;
                    let holder = self.machine.kernel.fresh_result_holder("_pf");
                    let args = [name];
                    Ok(self.machine.invoke_handler(&def.handler, &def.symbol, &args, &holder)?)
                } else {
                    self.pos += 1;
                    let operand = self.parse_expression(def.precedence)?;
                    let holder = self.machine.kernel.fresh_result_holder("");
                    let args = [operand];
                    Ok(self.machine.invoke_handler(&def.handler, &def.symbol, &args, &holder)?)
                }
            }
            _ => Err(self.fail(ExprError::UnexpectedTokenOperand {
                found: tok.text.to_owned(),
                line: tok.line,
                col: tok.col,
            })),
        }
    }

    /// The precedence-climbing loop: a primary, then operators at or above
    /// `min_prec`, each dispatched to its script handler.
    fn expression_inner(&mut self, min_prec: i32) -> Result<String, ExprError> {
        let mut lhs = self.parse_operand()?;

        loop {
            let Some(tok) = self.peek() else { break };
            if tok.kind != TokenKind::Operator {
                // `)`, `;`, end of slice, or stray tokens all terminate this
                // level; the top level diagnoses leftovers.
                break;
            }
            let Some(def) = self.machine.kernel.registry.lookup(tok.text).cloned() else {
                break;
            };
            if def.precedence < min_prec {
                break;
            }
            // A ternary separator belongs to the enclosing `?`.
            if def.role == OperatorRole::TernarySecondary {
                break;
            }

            match def.role {
                OperatorRole::BinaryInfix => {
                    if def.associativity == Associativity::Left && def.precedence <= min_prec {
                        break;
                    }
                    self.pos += 1;
                    let next_min = if def.associativity == Associativity::Left {
                        def.precedence + 1
                    } else {
                        def.precedence
                    };
                    let rhs = self.parse_expression(next_min)?;
                    let holder = self.machine.kernel.fresh_result_holder("");
                    let args = [lhs, rhs];
                    lhs = self.machine.invoke_handler(&def.handler, &def.symbol, &args, &holder)?;
                }

                OperatorRole::UnaryPostfix => {
                    if def.symbol == "++" || def.symbol == "--" {
                        // The token *before* the operator must be a simple
                        // variable; the handler gets its name, mutates the
                        // binding, and publishes the prior value.
                        let prev = (self.pos > 0).then(|| self.tokens[self.pos - 1]);
                        let name = prev
                            .filter(|t| t.kind == TokenKind::Variable)
                            .and_then(|t| simple_variable_name(t.text));
                        let Some(name) = name else {
                            return Err(self.fail(ExprError::PostfixLhsNotVariable { line: tok.line, col: tok.col }));
                        };
                        self.pos += 1;
                        let holder = self.machine.kernel.fresh_result_holder("_pof");
                        let args = [name];
                        lhs = self.machine.invoke_handler(&def.handler, &def.symbol, &args, &holder)?;
                    } else {
                        self.pos += 1;
                        let holder = self.machine.kernel.fresh_result_holder("");
                        let args = [lhs];
                        lhs = self.machine.invoke_handler(&def.handler, &def.symbol, &args, &holder)?;
                    }
                }

                OperatorRole::TernaryPrimary if def.symbol == "?" => {
                    self.pos += 1;
                    let true_arm = self.parse_expression(0)?;
                    let has_colon = self.peek().is_some_and(|t| t.kind == TokenKind::Operator && t.text == ":");
                    if !has_colon {
                        return Err(self.fail(ExprError::MissingColon { line: tok.line, col: tok.col }));
                    }
                    self.pos += 1;
                    let false_arm = self.parse_expression(0)?;
                    let holder = self.machine.kernel.fresh_result_holder("");
                    let args = [lhs, true_arm, false_arm];
                    lhs = self.machine.invoke_handler(&def.handler, &def.symbol, &args, &holder)?;
                }

                _ => {
                    return Err(self.fail(ExprError::UnhandledOperatorInLoop {
                        symbol: tok.text.to_owned(),
                        line: tok.line,
                        col: tok.col,
                    }));
                }
            }
        }

        Ok(lhs)
    }
}
