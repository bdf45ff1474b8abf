use osiris_compiler_diagnostics::{DiagnosticCode, DiagnosticSeverity};
use osiris_compiler_semantic::{AnalyzerEnvironment, SymbolKey};
use osiris_project::OrphanEntry;

use crate::{assert_codes, assert_goal_ok, in_goal, load_goal, load_story_with, with_code, HEADER};

#[test]
fn test_database_written_but_never_read() {
    let story = load_goal(in_goal("PROC Foo() THEN DB_Test(1);"));
    let diagnostics = story.diagnostics("G");
    assert_eq!(diagnostics.len(), 1, "{diagnostics:?}");

    let warning = &diagnostics[0];
    assert_eq!(warning.severity, DiagnosticSeverity::Warning);
    assert_eq!(warning.code, DiagnosticCode::DatabaseNeverRead);
    assert!(warning.message.contains("never used in a rule"));

    let source = story.goal("G").unwrap().source();
    assert_eq!(&source[warning.span.start..warning.span.end], "DB_Test(1)");
}

#[test]
fn test_database_read_but_never_written() {
    let story = load_goal(in_goal("IF DB_Flag(1) THEN Bar(1);"));
    assert_codes(&story, "G", &[DiagnosticCode::DatabaseNeverWritten]);
    assert!(story.symbol(&SymbolKey::new("DB_Flag", 1)).unwrap().is_dead());
}

#[test]
fn test_database_read_and_written() {
    let story = load_goal(in_goal(
        "PROC Seed() THEN DB_Flag(1);\nIF DB_Flag(_x) THEN Bar(_x);",
    ));
    assert_goal_ok(&story, "G");
}

#[test]
fn test_orphans_are_excused() {
    let environment = AnalyzerEnvironment::new(
        Vec::new(),
        &[OrphanEntry {
            name: "DB_Test".to_string(),
            arity: 1,
        }],
        &[],
    );
    let story = load_story_with(
        HEADER,
        &[("G", in_goal("PROC Foo() THEN DB_Test(1);"))],
        environment,
    );
    assert_goal_ok(&story, "G");
}

#[test]
fn test_unresolved_symbol_suggests_near_name() {
    let story = load_goal(in_goal("PROC Foo() THEN Baz(1);"));
    assert_codes(&story, "G", &[DiagnosticCode::UnresolvedSymbol]);
    let message = &story.diagnostics("G")[0].message;
    assert_eq!(message, "Unresolved symbol 'Baz/1'; did you mean 'Bar/1'?");
}

#[test]
fn test_unresolved_symbol_without_suggestion() {
    let story = load_goal(in_goal("PROC Foo() THEN CompletelyDifferent(1, 2, 3);"));
    let message = &story.diagnostics("G")[0].message;
    assert_eq!(message, "Unresolved symbol 'CompletelyDifferent/3'");
}

#[test]
fn test_conflicting_kinds_are_unresolved() {
    let story = load_goal(in_goal(
        "PROC Dual() THEN Bar(1);\nQRY Dual() AND DB_Q(1) THEN DB_Q(2);",
    ));
    let unresolved = with_code(&story, "G", DiagnosticCode::UnresolvedSymbol);
    assert_eq!(unresolved.len(), 2);
    assert!(unresolved[0]
        .message
        .contains("Symbol 'Dual/0' is used as more than one kind: call, query"));
}

#[test]
fn test_removing_goal_removes_its_symbols() {
    let mut story = load_goal(in_goal("PROC Foo() THEN Baz(1);"));
    assert!(story.remove_goal("G"));
    assert!(story.symbols_named("Baz").is_empty());
    assert!(story.symbols_named("Foo").is_empty());
    // System symbols stay
    assert_eq!(story.symbols_named("Bar").len(), 1);
}
