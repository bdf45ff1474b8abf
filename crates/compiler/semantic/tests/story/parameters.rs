use osiris_compiler_diagnostics::DiagnosticCode;
use osiris_compiler_semantic::AnalyzerEnvironment;
use osiris_project::EnumerationEntry;

use crate::{
    assert_codes, assert_goal_ok, assert_has_code, in_goal, load_goal, load_story_with, with_init,
    HEADER,
};

#[test]
fn test_constant_type_mismatch() {
    let story = load_goal(in_goal("PROC Main() THEN Bar(\"text\");"));
    assert_codes(&story, "G", &[DiagnosticCode::TypeMismatch]);
    assert_eq!(
        story.diagnostics("G")[0].message,
        "Parameter 1 of 'Bar' expects INTEGER, found STRING"
    );
}

#[test]
fn test_variable_type_mismatch() {
    let story = load_goal(in_goal(
        "PROC Seed() THEN DB_Name(\"Fane\");\nIF DB_Name(_n) THEN Bar(_n);",
    ));
    assert_codes(&story, "G", &[DiagnosticCode::TypeMismatch]);
}

#[test]
fn test_annotation_overrides_inferred_type() {
    let story = load_goal(in_goal(
        "PROC Seed() THEN DB_Count((INTEGER64)1);\nIF DB_Count(_c) THEN DB_Total(_c);\nIF DB_Total(_t) THEN Bar(_t);",
    ));
    assert_codes(&story, "G", &[DiagnosticCode::TypeMismatch]);
}

#[test]
fn test_unbound_variable_in_action() {
    let story = load_goal(in_goal("PROC Main() THEN Bar(_x);"));
    assert_codes(&story, "G", &[DiagnosticCode::UnboundVariable]);
    assert_eq!(
        story.diagnostics("G")[0].message,
        "Variable '_x' is not bound here"
    );
}

#[test]
fn test_negated_condition_does_not_bind() {
    let story = load_goal(in_goal(
        "PROC Seed() THEN DB_A(1);\nPROC Main() AND NOT DB_A(_x) THEN Bar(1);",
    ));
    assert_codes(&story, "G", &[DiagnosticCode::UnboundVariable]);
}

#[test]
fn test_in_parameters_need_bound_values() {
    let story = load_goal(in_goal("PROC Main() AND GetLevel(_a, _b) THEN Bar(_b);"));
    assert_codes(&story, "G", &[DiagnosticCode::InvalidFlow]);
    assert!(story.diagnostics("G")[0].message.contains("[in] parameter"));
}

#[test]
fn test_user_query_flow_annotations_are_checked() {
    let story = load_goal(in_goal(
        "PROC Seed() THEN DB_Names(1, \"one\");\n\
         QRY Lookup([in](INTEGER)_id, [out](STRING)_name) AND DB_Names(_id, _name) THEN DB_Seen(_id);\n\
         PROC Main() AND Lookup(_id, _name) THEN DB_Seen(2);",
    ));
    let diagnostic = assert_has_code(&story, "G", DiagnosticCode::InvalidFlow);
    assert!(diagnostic.message.contains("Parameter 1 of 'Lookup/2'"));
}

#[test]
fn test_out_parameters_reject_constants() {
    let story = load_goal(in_goal("PROC Main() AND GetLevel(1, 2) THEN Bar(1);"));
    assert_codes(&story, "G", &[DiagnosticCode::InvalidFlow]);
    assert!(story.diagnostics("G")[0].message.contains("[out] parameter"));
}

#[test]
fn test_query_output_types_flow_into_actions() {
    let story = load_goal(in_goal("PROC Main() AND GetLevel(3, _level) THEN Bar(_level);"));
    assert_goal_ok(&story, "G");
}

#[test]
fn test_placeholder_only_in_heads_and_conditions() {
    let story = load_goal(in_goal("PROC Main() THEN Bar(_);"));
    assert_codes(&story, "G", &[DiagnosticCode::InvalidPlaceholder]);

    let story = load_goal(in_goal(
        "PROC Seed() THEN DB_Pair(1, 2);\nPROC Main() AND DB_Pair(_, _v) THEN Bar(_v);",
    ));
    assert_goal_ok(&story, "G");
}

#[test]
fn test_comparison_operands_must_match() {
    let story = load_goal(in_goal(
        "PROC Seed() THEN DB_Score(1);\nIF DB_Score(_s) AND _s > \"high\" THEN Bar(_s);",
    ));
    let diagnostic = assert_has_code(&story, "G", DiagnosticCode::TypeMismatch);
    assert_eq!(diagnostic.message, "Cannot compare INTEGER with STRING");

    let story = load_goal(in_goal(
        "PROC Seed() THEN DB_Score(1);\nIF DB_Score(_s) AND _s > 3 THEN Bar(_s);",
    ));
    assert_goal_ok(&story, "G");
}

#[test]
fn test_unknown_type_annotation() {
    let story = load_goal(in_goal("PROC Main((NOTATYPE)_x) THEN Bar(1);"));
    assert_codes(&story, "G", &[DiagnosticCode::UnknownType]);
}

#[test]
fn test_enumeration_members() {
    let environment = AnalyzerEnvironment::new(
        Vec::new(),
        &[],
        &[EnumerationEntry {
            symbol: "SetMode".to_string(),
            arity: 1,
            parameter: 0,
            members: vec!["Idle".to_string(), "Combat".to_string()],
        }],
    );
    let story = load_story_with(
        HEADER,
        &[
            ("Bad", in_goal("PROC Main() THEN SetMode(\"Sleep\");")),
            ("Good", in_goal("PROC Other() THEN SetMode(\"Idle\");")),
        ],
        environment,
    );
    assert_codes(&story, "Bad", &[DiagnosticCode::InvalidEnumMember]);
    assert!(story.diagnostics("Bad")[0].message.contains("expected one of: Idle, Combat"));
    assert_goal_ok(&story, "Good");
}

#[test]
fn test_init_actions_take_constants_only() {
    let story = load_goal(with_init("Bar(_x);\nBar(_);\nBar(2);", ""));
    assert_codes(
        &story,
        "G",
        &[DiagnosticCode::UnboundVariable, DiagnosticCode::InvalidPlaceholder],
    );

    let story = load_goal(with_init("Bar(\"one\");", ""));
    assert_codes(&story, "G", &[DiagnosticCode::TypeMismatch]);
}
