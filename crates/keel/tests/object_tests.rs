//! Structured data: `object:` flattening on assignment, dotted access over
//! the flat layout, and `echo` stringification.

use keel::{CollectIo, ShellSession};
use pretty_assertions::assert_eq;

fn run(script: &str) -> (ShellSession, CollectIo) {
    let mut session = ShellSession::new();
    let mut io = CollectIo::new();
    let lines: Vec<String> = script.lines().map(str::to_owned).collect();
    session.run_lines(&lines, &mut io);
    (session, io)
}

/// Assigning an `object:` payload flattens it into mangled variables and
/// marks the root.
#[test]
fn assignment_flattens_object_payloads() {
    let (session, io) = run(r#"
$cfg = "object:[\"name\": \"keel\", \"net\": [\"port\": \"8080\"]]"
"#);
    assert_eq!(io.diags, Vec::<String>::new());
    assert_eq!(session.get_var("cfg_BSH_STRUCT_TYPE"), Some("BSH_OBJECT_ROOT"));
    assert_eq!(session.get_var("cfg_name"), Some("keel"));
    assert_eq!(session.get_var("cfg_net_BSH_STRUCT_TYPE"), Some("BSH_OBJECT"));
    assert_eq!(session.get_var("cfg_net_port"), Some("8080"));
    // The root variable keeps the payload without its prefix.
    assert_eq!(session.get_var("cfg"), Some("[\"name\": \"keel\", \"net\": [\"port\": \"8080\"]]"));
}

/// `json:` payloads flatten the same way.
#[test]
fn json_prefix_flattens_too() {
    let (session, _) = run(r#"
$doc = "json:[\"k\": \"v\"]"
"#);
    assert_eq!(session.get_var("doc_BSH_STRUCT_TYPE"), Some("BSH_OBJECT_ROOT"));
    assert_eq!(session.get_var("doc_k"), Some("v"));
}

/// Dotted expansion reads straight through the flat layout.
#[test]
fn dotted_access_over_flattened_objects() {
    let (mut session, mut io) = run(r#"
$cfg = "object:[\"net\": [\"port\": \"8080\"]]"
"#);
    session.execute("echo \"$cfg.net.port\"", &mut io);
    assert_eq!(io.out, "8080\n");
}

/// `echo $var` on an object root stringifies the flat layout back into
/// `object:[…]` form, children in insertion order.
#[test]
fn echo_stringifies_object_roots() {
    let (mut session, mut io) = run(r#"
$cfg = "object:[\"name\": \"keel\", \"net\": [\"port\": \"8080\"]]"
"#);
    io.out.clear();
    session.execute("echo $cfg", &mut io);
    assert_eq!(io.out, "object:[\"name\": \"keel\", \"net\": [\"port\": \"8080\"]]\n");
}

/// A plain (non-object) variable echoes its value unchanged.
#[test]
fn echo_leaves_plain_variables_alone() {
    let (mut session, mut io) = run(r#"
$plain = "just text"
"#);
    io.out.clear();
    session.execute("echo $plain", &mut io);
    assert_eq!(io.out, "just text\n");
}

/// Malformed payloads diagnose and stop; the shell keeps running.
#[test]
fn malformed_object_is_diagnosed() {
    let (session, io) = run(r#"
$bad = "object:[\"key\" \"value\"]"
$after = "ok"
"#);
    assert!(io.diags.iter().any(|d| d.contains("object parse error")));
    assert_eq!(session.get_var("after"), Some("ok"));
}
