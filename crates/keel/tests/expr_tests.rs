//! End-to-end expression evaluation through script-defined operators.
//!
//! Every operator used here is registered by a bootstrap script via
//! `defoperator`, with its semantics implemented by shell functions built on
//! the `calc`/`setvar`/`getvar` builtins — the kernel itself owns no
//! arithmetic. Results are observed through printed output and the
//! `LAST_OP_RESULT` variable the dispatcher maintains.

use keel::{CollectIo, ShellSession};
use pretty_assertions::assert_eq;

/// Registers `+ - * /` (shared handler), the eager ternary `? :`, and the
/// postfix `++` mutation operator.
const BOOTSTRAP: &str = r#"
defoperator "+" TYPE BINARY_INFIX PRECEDENCE 10 ASSOC L HANDLER arith
defoperator "-" TYPE BINARY_INFIX PRECEDENCE 10 ASSOC L HANDLER arith
defoperator "*" TYPE BINARY_INFIX PRECEDENCE 20 ASSOC L HANDLER arith
defoperator "/" TYPE BINARY_INFIX PRECEDENCE 20 ASSOC L HANDLER arith
defunc arith (op a b res) {
calc $a $op $b $res
}
defoperator "?" TYPE TERNARY_PRIMARY PRECEDENCE 5 ASSOC L HANDLER tern
defoperator ":" TYPE TERNARY_SECONDARY PRECEDENCE 5 ASSOC L HANDLER tern_sep
defunc tern (op c t f res) {
if $c {
setvar $res $t
}
else {
setvar $res $f
}
}
defoperator "++" TYPE UNARY_POSTFIX PRECEDENCE 30 ASSOC N HANDLER post_inc
defunc post_inc (op name res) {
getvar $name cur
setvar $res $cur
calc $cur "+" 1 next
setvar $name $next
}
"#;

fn session_with_operators() -> (ShellSession, CollectIo) {
    let mut session = ShellSession::new();
    let mut io = CollectIo::new();
    let lines: Vec<String> = BOOTSTRAP.lines().map(str::to_owned).collect();
    session.run_lines(&lines, &mut io);
    assert_eq!(io.diags, Vec::<String>::new(), "bootstrap script must load cleanly");
    (session, io)
}

fn last_result(session: &ShellSession) -> &str {
    session.get_var("LAST_OP_RESULT").expect("a standalone expression sets LAST_OP_RESULT")
}

// =============================================================================
// 1. Basic application and precedence
// =============================================================================

/// `2 + 3` flows through the script handler and back: tokenizer → parser →
/// bridge → `calc` → result holder.
#[test]
fn integer_addition() {
    let (mut session, mut io) = session_with_operators();
    session.execute("2 + 3", &mut io);
    assert_eq!(last_result(&session), "5");
    assert_eq!(io.out, "5\n");
}

/// Left associativity: `10 - 3 - 2` groups as `(10 - 3) - 2`.
#[test]
fn subtraction_is_left_associative() {
    let (mut session, mut io) = session_with_operators();
    session.execute("10 - 3 - 2", &mut io);
    assert_eq!(last_result(&session), "5");
}

/// `*` (precedence 20) binds tighter than `+` (precedence 10).
#[test]
fn mixed_precedence() {
    let (mut session, mut io) = session_with_operators();
    session.execute("2 + 3 * 4", &mut io);
    assert_eq!(last_result(&session), "14");
}

/// Parentheses override precedence.
#[test]
fn parenthesization() {
    let (mut session, mut io) = session_with_operators();
    session.execute("(2 + 3) * 4", &mut io);
    assert_eq!(last_result(&session), "20");
}

/// A right-associative operator groups to the right; the handler makes the
/// grouping observable in the result string.
#[test]
fn right_associative_grouping() {
    let (mut session, mut io) = session_with_operators();
    let script = r#"
defoperator "&" TYPE BINARY_INFIX PRECEDENCE 10 ASSOC R HANDLER wrap
defoperator "@" TYPE BINARY_INFIX PRECEDENCE 10 ASSOC L HANDLER wrap
defunc wrap (op a b res) {
setvar $res "($a,$b)"
}
"#;
    let lines: Vec<String> = script.lines().map(str::to_owned).collect();
    session.run_lines(&lines, &mut io);

    session.execute("a & b & c", &mut io);
    assert_eq!(last_result(&session), "(a,(b,c))");

    session.execute("a @ b @ c", &mut io);
    assert_eq!(last_result(&session), "((a,b),c)");
}

// =============================================================================
// 2. Variable expansion inside expressions
// =============================================================================

/// Dotted access resolves against the flat `user_name` layout.
#[test]
fn dotted_variable_expansion() {
    let (mut session, mut io) = session_with_operators();
    session.set_var("user_name", "ada").unwrap();
    session.set_var("user_age", "36").unwrap();

    let name = session.eval_expression("\"$user.name\"", &mut io).unwrap();
    assert_eq!(name, "ada");
    let age = session.eval_expression("\"$user.age\"", &mut io).unwrap();
    assert_eq!(age, "36");
}

/// Operands referencing variables are expanded before the handler sees them.
#[test]
fn variables_as_operands() {
    let (mut session, mut io) = session_with_operators();
    session.set_var("a", "20").unwrap();
    session.set_var("b", "22").unwrap();
    session.execute("$a + $b", &mut io);
    assert_eq!(last_result(&session), "42");
}

// =============================================================================
// 3. Ternary (eager, script-conditional)
// =============================================================================

#[test]
fn ternary_true_branch() {
    let (mut session, mut io) = session_with_operators();
    session.execute("1 ? \"yes\" : \"no\"", &mut io);
    assert_eq!(last_result(&session), "yes");
}

#[test]
fn ternary_false_branch() {
    let (mut session, mut io) = session_with_operators();
    session.execute("0 ? \"yes\" : \"no\"", &mut io);
    assert_eq!(last_result(&session), "no");
}

/// Both arms are evaluated eagerly, before the ternary handler runs: a
/// side-effecting operator in the untaken arm still fires.
#[test]
fn ternary_arms_evaluate_eagerly() {
    let (mut session, mut io) = session_with_operators();
    session.set_var("x", "7").unwrap();
    session.execute("1 ? \"taken\" : $x++", &mut io);
    assert_eq!(last_result(&session), "taken");
    assert_eq!(session.get_var("x"), Some("8"), "the untaken arm's ++ still ran");
}

// =============================================================================
// 4. Postfix and prefix mutation
// =============================================================================

/// `$x++` yields the prior value and increments the binding: the handler
/// receives the variable's *name* and mutates it through `setvar`.
#[test]
fn postfix_increment_mutates_and_yields_prior_value() {
    let (mut session, mut io) = session_with_operators();
    session.set_var("x", "4").unwrap();
    session.execute("$x++", &mut io);
    assert_eq!(last_result(&session), "4");
    assert_eq!(session.get_var("x"), Some("5"));
}

/// Prefix `++` (registered in its own session, the symbol table holds one
/// role per symbol) yields the incremented value.
#[test]
fn prefix_increment_yields_new_value() {
    let mut session = ShellSession::new();
    let mut io = CollectIo::new();
    let script = r#"
defoperator "++" TYPE UNARY_PREFIX PRECEDENCE 30 ASSOC N HANDLER pre_inc
defunc pre_inc (op name res) {
getvar $name cur
calc $cur "+" 1 next
setvar $name $next
setvar $res $next
}
"#;
    let lines: Vec<String> = script.lines().map(str::to_owned).collect();
    session.run_lines(&lines, &mut io);
    assert_eq!(io.diags, Vec::<String>::new());

    session.set_var("x", "4").unwrap();
    session.execute("++$x", &mut io);
    assert_eq!(session.get_var("LAST_OP_RESULT"), Some("5"));
    assert_eq!(session.get_var("x"), Some("5"));
}

/// A generic unary prefix operator evaluates its operand by value.
#[test]
fn generic_unary_prefix() {
    let (mut session, mut io) = session_with_operators();
    let script = r#"
defoperator "~" TYPE UNARY_PREFIX PRECEDENCE 25 ASSOC R HANDLER negate
defunc negate (op a res) {
calc 0 "-" $a $res
}
"#;
    let lines: Vec<String> = script.lines().map(str::to_owned).collect();
    session.run_lines(&lines, &mut io);

    session.execute("~5", &mut io);
    assert_eq!(last_result(&session), "-5");
    session.execute("~5 + 8", &mut io);
    assert_eq!(last_result(&session), "3");
}

// =============================================================================
// 5. The handler contract
// =============================================================================

/// A handler sees exactly: the operator symbol, each operand, and the result
/// holder name last — `args.len() + 2` parameters in total.
#[test]
fn handler_receives_symbol_operands_and_holder() {
    let (mut session, mut io) = session_with_operators();
    session.set_var("SEEN", "").unwrap();
    let script = r#"
defoperator "@@" TYPE BINARY_INFIX PRECEDENCE 5 ASSOC L HANDLER record
defunc record (op a b res) {
setvar SEEN "$op|$a|$b"
setvar $res "ok"
}
"#;
    let lines: Vec<String> = script.lines().map(str::to_owned).collect();
    session.run_lines(&lines, &mut io);

    session.execute("1 @@ 2", &mut io);
    assert_eq!(session.get_var("SEEN"), Some("@@|1|2"));
    assert_eq!(last_result(&session), "ok");
}

/// Arity mismatches are rejected before the handler body runs.
#[test]
fn handler_arity_mismatch() {
    let (mut session, mut io) = session_with_operators();
    let script = r#"
defoperator "@@" TYPE BINARY_INFIX PRECEDENCE 5 ASSOC L HANDLER short
defunc short (op res) {
setvar $res "never"
}
"#;
    let lines: Vec<String> = script.lines().map(str::to_owned).collect();
    session.run_lines(&lines, &mut io);

    io.diags.clear();
    session.execute("1 @@ 2", &mut io);
    assert_eq!(last_result(&session), "HANDLER_PARAM_MISMATCH<short>");
    assert!(!io.diags.is_empty());
}

/// A registered operator whose handler was never defined fails with a
/// marker naming the missing function.
#[test]
fn handler_not_found() {
    let (mut session, mut io) = session_with_operators();
    session.execute("defoperator \"%%\" TYPE BINARY_INFIX PRECEDENCE 5 ASSOC L HANDLER nope", &mut io);
    session.execute("5 %% 3", &mut io);
    assert_eq!(last_result(&session), "HANDLER_NOT_FOUND<nope>");
}

/// A handler that never writes its result holder yields the synthetic
/// no-result marker, as a warning rather than an error.
#[test]
fn handler_without_result_yields_marker() {
    let (mut session, mut io) = session_with_operators();
    let script = r#"
defoperator "@@" TYPE BINARY_INFIX PRECEDENCE 5 ASSOC L HANDLER silent
defunc silent (op a b res) {
$ignored = "side effect only"
}
"#;
    let lines: Vec<String> = script.lines().map(str::to_owned).collect();
    session.run_lines(&lines, &mut io);

    io.diags.clear();
    io.out.clear();
    session.execute("1 @@ 2", &mut io);
    let result = last_result(&session);
    assert!(result.starts_with("HANDLER_NO_RESULT<"), "got: {result}");
    assert_eq!(io.out, "", "no-result markers are not printed");
    assert!(!io.diags.is_empty(), "the missing result is diagnosed");
}

// =============================================================================
// 6. Structural errors
// =============================================================================

#[test]
fn missing_rparen() {
    let (mut session, mut io) = session_with_operators();
    session.execute("(2 + 3", &mut io);
    assert_eq!(last_result(&session), "EXPR_PARSE_ERROR_MISSING_RPAREN");
    assert!(!io.diags.is_empty());
}

#[test]
fn missing_colon_in_ternary() {
    let (mut session, mut io) = session_with_operators();
    session.execute("1 ? \"yes\"", &mut io);
    assert_eq!(last_result(&session), "EXPR_PARSE_ERROR_MISSING_COLON");
}

/// Postfix `++` after anything but a simple variable is rejected; the parser
/// tracks no l-values beyond "the previous token was `$var`".
#[test]
fn postfix_on_expression_is_rejected() {
    let (mut session, mut io) = session_with_operators();
    session.execute("(2 + 3)++", &mut io);
    assert_eq!(last_result(&session), "EXPR_PARSE_ERROR_POSTFIX_LHS");
}

#[test]
fn operand_position_operator_is_rejected() {
    let (mut session, mut io) = session_with_operators();
    session.execute("* 3", &mut io);
    assert_eq!(last_result(&session), "EXPR_PARSE_ERROR_UNEXPECTED_TOKEN_OPERAND");
}

/// Deep nesting trips the recursion cap instead of overflowing the stack.
#[test]
fn recursion_limit() {
    let (mut session, mut io) = session_with_operators();
    let expr = format!("{}1{}", "(".repeat(80), ")".repeat(80));
    session.execute(&expr, &mut io);
    assert_eq!(last_result(&session), "EXPR_PARSE_ERROR_RECURSION");
}

/// Trailing tokens after a complete expression succeed with a diagnostic.
#[test]
fn trailing_tokens_are_tolerated() {
    let (mut session, mut io) = session_with_operators();
    session.execute("7 9", &mut io);
    assert_eq!(last_result(&session), "7");
    assert!(io.diags.iter().any(|d| d.contains("trailing tokens")));
}

/// An empty expression evaluates to the empty string, successfully.
#[test]
fn empty_expression() {
    let (mut session, mut io) = session_with_operators();
    let value = session.eval_expression("", &mut io).unwrap();
    assert_eq!(value, "");
}
