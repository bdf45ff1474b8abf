use osiris_compiler_diagnostics::DiagnosticCode;

use crate::{assert_codes, assert_goal_ok, assert_has_code, in_goal, load_goal};

#[test]
fn test_user_goals_cannot_define_events() {
    let story = load_goal(in_goal("IF Something() THEN Bar(1);"));
    assert_codes(&story, "G", &[DiagnosticCode::UndeclaredEvent]);
}

#[test]
fn test_undeclared_event_suggests_declared_arity() {
    let story = load_goal(in_goal("IF Started(_x) THEN Bar(1);"));
    let diagnostic = assert_has_code(&story, "G", DiagnosticCode::UndeclaredEvent);
    assert_eq!(
        diagnostic.message,
        "Event 'Started/1' is not declared in the story header; did you mean 'Started/0'?"
    );
}

#[test]
fn test_header_events_start_rules() {
    let story = load_goal(in_goal("IF Started() THEN Bar(1);"));
    assert_goal_ok(&story, "G");
}

#[test]
fn test_if_head_must_be_event_or_database() {
    let story = load_goal(in_goal("IF Bar(_v) THEN DB_X(_v);\nIF DB_X(_w) THEN Bar(_w);"));
    assert_codes(&story, "G", &[DiagnosticCode::InvalidRuleHead]);
}

#[test]
fn test_proc_head_must_be_call() {
    let story = load_goal(in_goal("PROC GetLevel(_a, _b) THEN Bar(1);"));
    let diagnostic = assert_has_code(&story, "G", DiagnosticCode::InvalidRuleHead);
    assert!(diagnostic.message.contains("'GetLevel/2' is a query"));
}

#[test]
fn test_conditions_must_be_queries_or_databases() {
    let story = load_goal(in_goal(
        "PROC Helper() THEN Bar(1);\nPROC Main() AND Helper() THEN Bar(2);",
    ));
    assert_codes(&story, "G", &[DiagnosticCode::MisplacedCall]);
}

#[test]
fn test_actions_must_be_calls_or_databases() {
    let story = load_goal(in_goal("PROC Main() AND GetLevel(1, _l) THEN Started();"));
    let diagnostic = assert_has_code(&story, "G", DiagnosticCode::MisplacedCall);
    assert!(diagnostic.message.contains("cannot be used as an action"));
}

#[test]
fn test_only_databases_can_be_deleted() {
    let story = load_goal(in_goal("PROC Main() THEN NOT Bar(1);"));
    let diagnostic = assert_has_code(&story, "G", DiagnosticCode::MisplacedCall);
    assert!(diagnostic.message.starts_with("Only databases can be deleted with NOT"));

    let story = load_goal(in_goal(
        "PROC Seed() THEN DB_A(1);\nIF DB_A(_x) THEN NOT DB_A(_x);",
    ));
    assert_goal_ok(&story, "G");
}
