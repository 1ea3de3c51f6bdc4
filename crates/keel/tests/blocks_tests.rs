//! Control flow and user functions: `if`/`else`/`while` blocks, skipping,
//! function scoping, and the replayable-source requirement for loops.

use keel::{CollectIo, ShellSession};
use pretty_assertions::assert_eq;

fn run(script: &str) -> (ShellSession, CollectIo) {
    let mut session = ShellSession::new();
    let mut io = CollectIo::new();
    let lines: Vec<String> = script.lines().map(str::to_owned).collect();
    session.run_lines(&lines, &mut io);
    (session, io)
}

// =============================================================================
// if / else
// =============================================================================

#[test]
fn if_executes_on_truthy_condition() {
    let (session, _) = run(r#"
$flag = 1
if $flag {
$x = "yes"
}
"#);
    assert_eq!(session.get_var("x"), Some("yes"));
}

#[test]
fn if_skips_on_falsy_condition() {
    let (session, _) = run(r#"
$x = "init"
if 0 {
$x = "changed"
}
"#);
    assert_eq!(session.get_var("x"), Some("init"));
}

/// `"true"`/`"false"` are truthy/falsy regardless of case; any other
/// non-empty, non-"0" value is truthy.
#[test]
fn truthiness_rules() {
    let (session, _) = run(r#"
if "TRUE" {
$a = "t"
}
if "False" {
$b = "t"
}
if "anything" {
$c = "t"
}
"#);
    assert_eq!(session.get_var("a"), Some("t"));
    assert_eq!(session.get_var("b"), None);
    assert_eq!(session.get_var("c"), Some("t"));
}

/// The `}` / `else {` two-line form pairs the else with the closed branch.
#[test]
fn else_on_its_own_line() {
    let (session, _) = run(r#"
if 0 {
$y = "then"
}
else {
$y = "else"
}
"#);
    assert_eq!(session.get_var("y"), Some("else"));
}

/// The combined `} else {` form behaves identically.
#[test]
fn combined_close_and_else() {
    let (session, _) = run(r#"
if 0 {
$y = "then"
} else {
$y = "else"
}
"#);
    assert_eq!(session.get_var("y"), Some("else"));
}

#[test]
fn else_is_skipped_after_a_taken_branch() {
    let (session, _) = run(r#"
if 1 {
$y = "then"
} else {
$y = "else"
}
"#);
    assert_eq!(session.get_var("y"), Some("then"));
}

#[test]
fn else_if_chain() {
    let (session, _) = run(r#"
$n = 2
if 0 {
$r = "a"
} else if $n {
$r = "b"
} else {
$r = "c"
}
"#);
    assert_eq!(session.get_var("r"), Some("b"));
}

/// Nested blocks inside a skipped branch stay skipped, and their braces stay
/// balanced.
#[test]
fn nested_blocks_in_skipped_branch() {
    let (session, _) = run(r#"
$x = "init"
if 0 {
if 1 {
$x = "inner"
}
$x = "outer"
}
$done = "1"
"#);
    assert_eq!(session.get_var("x"), Some("init"));
    assert_eq!(session.get_var("done"), Some("1"));
}

// =============================================================================
// while
// =============================================================================

/// A `while` loop over a replayable buffer repeats until its condition
/// fails; the condition is re-evaluated at each pass.
#[test]
fn while_loops_over_a_buffer() {
    let (session, _) = run(r#"
$i = 3
$sum = 0
while $i {
calc $sum "+" $i sum
calc $i "-" 1 i
}
"#);
    assert_eq!(session.get_var("sum"), Some("6"));
    assert_eq!(session.get_var("i"), Some("0"));
}

#[test]
fn while_with_negation() {
    let (session, _) = run(r#"
$done = 0
$n = 0
while ! $done {
calc $n "+" 1 n
$done = 1
}
"#);
    assert_eq!(session.get_var("n"), Some("1"));
}

#[test]
fn while_with_false_condition_never_runs() {
    let (session, _) = run(r#"
$n = 0
while 0 {
calc $n "+" 1 n
}
"#);
    assert_eq!(session.get_var("n"), Some("0"));
}

/// Interactive input cannot be replayed: the loop body runs once and the
/// failure to repeat is diagnosed.
#[test]
fn while_cannot_repeat_interactively() {
    let mut session = ShellSession::new();
    let mut io = CollectIo::new();
    session.execute("$i = 2", &mut io);
    session.execute("while $i {", &mut io);
    session.execute("calc $i \"-\" 1 i", &mut io);
    session.execute("}", &mut io);
    assert_eq!(session.get_var("i"), Some("1"), "the body ran exactly once");
    assert!(io.diags.iter().any(|d| d.contains("cannot repeat")));
}

// =============================================================================
// user functions
// =============================================================================

#[test]
fn function_call_binds_parameters() {
    let (session, io) = run(r#"
defunc greet (who) {
$greeting = "hello $who"
echo $greeting
}
greet world
"#);
    assert_eq!(io.out, "hello world\n");
    assert_eq!(session.get_var("greeting"), None, "function locals die with their scope");
}

#[test]
fn missing_arguments_bind_empty() {
    let (_, io) = run(r#"
defunc show (a b) {
echo "[$a][$b]"
}
show one
"#);
    assert_eq!(io.out, "[one][]\n");
}

/// The opening brace may come on the line after the header.
#[test]
fn function_body_brace_on_next_line() {
    let (_, io) = run(r#"
defunc f (x)
{
echo $x
}
f hi
"#);
    assert_eq!(io.out, "hi\n");
}

/// Braces inside the body are captured, not terminated on: nested `if`/`else`
/// work inside functions.
#[test]
fn function_bodies_may_contain_blocks() {
    let (_, io) = run(r#"
defunc pick (flag) {
if $flag {
echo "on"
} else {
echo "off"
}
}
pick 1
pick 0
"#);
    assert_eq!(io.out, "on\noff\n");
}

/// `while` works inside function bodies (the body is a replayable buffer).
#[test]
fn while_inside_a_function_body() {
    let (session, _) = run(r#"
$total = 0
defunc count (n) {
while $n {
calc $total "+" 1 total
calc $n "-" 1 n
}
}
count 4
"#);
    assert_eq!(session.get_var("total"), Some("4"));
}

/// Inner function scopes shadow outer bindings for reads and writes through
/// plain assignment, and the outer binding survives.
#[test]
fn function_scope_shadows_caller() {
    let (session, _) = run(r#"
$x = "outer"
defunc shadow () {
$x = "inner"
$seen = $x
}
shadow
"#);
    assert_eq!(session.get_var("x"), Some("outer"));
}

/// A skipped `defunc` defines nothing.
#[test]
fn defunc_in_a_skipped_branch_is_not_defined() {
    let (session, _) = run(r#"
if 0 {
defunc ghost () {
echo "boo"
}
}
$after = "1"
"#);
    assert_eq!(session.get_var("after"), Some("1"));
    assert!(!session.kernel().functions.contains("ghost"));
}

/// An unterminated definition at end of input is diagnosed.
#[test]
fn unterminated_function_is_diagnosed() {
    let (_, io) = run(r#"
defunc broken (a) {
echo $a
"#);
    assert!(io.diags.iter().any(|d| d.contains("unterminated function definition 'broken'")));
}

// =============================================================================
// dispatch details
// =============================================================================

/// Keyword aliases apply to control-flow keywords too.
#[test]
fn aliased_keywords_dispatch() {
    let (session, io) = run(r#"
defkeyword echo say
defkeyword if when
say hello
when 1 {
$ok = "1"
}
"#);
    assert_eq!(io.out, "hello\n");
    assert_eq!(session.get_var("ok"), Some("1"));
}

/// `eval` concatenates its expanded arguments and processes them as a line.
#[test]
fn eval_builtin_runs_synthesized_lines() {
    let (_, io) = run(r#"
$cmd = "echo"
eval $cmd hi there
"#);
    assert_eq!(io.out, "hi there\n");
}

/// `exit` stops the remainder of the buffer.
#[test]
fn exit_stops_the_script() {
    let (session, _) = run(r#"
$a = "1"
exit 3
$b = "2"
"#);
    assert_eq!(session.get_var("a"), Some("1"));
    assert_eq!(session.get_var("b"), None);
}

/// Array-element assignment goes through the `_ARRAYIDX_` mangling.
#[test]
fn array_assignment_lines() {
    let (session, _) = run(r#"
$arr[0] = "zero"
$i = 1
$arr[$i] = "one"
"#);
    assert_eq!(session.get_var("arr_ARRAYIDX_0"), Some("zero"));
    assert_eq!(session.get_var("arr_ARRAYIDX_1"), Some("one"));
}
