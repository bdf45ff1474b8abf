use osiris_compiler_diagnostics::DiagnosticCode;
use osiris_compiler_parser::ast::NodeKind;

use crate::common::{assert_parses_err, in_goal};

#[test]
fn missing_closing_paren_recovers_at_then() {
    let parsed = assert_parses_err(&in_goal("PROC Foo( THEN Bar();"));
    let closing: Vec<_> = parsed
        .diagnostics
        .iter()
        .filter(|d| d.message.contains("closing bracket"))
        .collect();
    assert_eq!(closing.len(), 1);
    assert_eq!(parsed.diagnostics.len(), 1);

    let ast = &parsed.ast;
    let rule = ast.rules()[0];
    let NodeKind::Rule { actions, .. } = ast.kind(rule) else {
        panic!("expected a rule");
    };
    let NodeKind::ActionBlock { actions } = ast.kind(*actions) else {
        panic!("expected an action block");
    };
    assert_eq!(actions.len(), 1);
    let NodeKind::SignatureAction { signature, .. } = ast.kind(actions[0]) else {
        panic!("expected a call action");
    };
    let (_, name, parameters) = ast.signature_parts(*signature).unwrap();
    assert_eq!(name, "Bar");
    assert!(parameters.is_empty());
}

#[test]
fn missing_semicolon_keeps_following_actions() {
    let parsed = assert_parses_err(&in_goal("PROC Foo() THEN DB_A(1) DB_B(2);"));
    assert_eq!(parsed.diagnostics.len(), 1);
    assert_eq!(parsed.diagnostics[0].code, DiagnosticCode::MissingToken);
    let names: Vec<_> = parsed.ast.callers().iter().map(|c| c.name).collect();
    assert_eq!(names, vec!["Foo", "DB_A", "DB_B"]);
}

#[test]
fn garbage_between_rules_is_skipped() {
    let parsed = assert_parses_err(&in_goal(
        "PROC A() THEN DB_NOOP(1);\n} @ )\nPROC B() THEN DB_NOOP(1);",
    ));
    assert_eq!(parsed.diagnostics.len(), 1);
    assert_eq!(parsed.ast.rules().len(), 2);
}

#[test]
fn missing_init_section_still_parses_rules() {
    let parsed = assert_parses_err("PROC A() THEN DB_NOOP(1);\nEXITSECTION\nENDEXITSECTION");
    let messages: Vec<_> = parsed.diagnostics.iter().map(|d| d.message.as_str()).collect();
    assert_eq!(messages, vec!["Expected 'INITSECTION'", "Expected 'KBSECTION'"]);
    assert_eq!(parsed.ast.rules().len(), 1);
}

#[test]
fn unclosed_rule_does_not_swallow_sections() {
    let parsed = assert_parses_err(
        "INITSECTION\nKBSECTION\nIF DB_A(_x\nEXITSECTION\nDB_Done(1);\nENDEXITSECTION\n",
    );
    let names: Vec<_> = parsed.ast.callers().iter().map(|c| c.name).collect();
    assert_eq!(names, vec!["DB_A", "DB_Done"]);
}
