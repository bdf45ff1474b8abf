use osiris_compiler_diagnostics::{DiagnosticCode, DiagnosticSeverity};
use osiris_compiler_semantic::AnalyzerEnvironment;
use osiris_project::InstanceName;

use crate::{assert_codes, assert_goal_ok, in_goal, load_goal, load_story_with, FANE_GUID, HEADER};

fn with_instances(kind: &str, goals: &[(&str, String)]) -> osiris_compiler_semantic::Story {
    let environment = AnalyzerEnvironment::new(
        vec![InstanceName {
            guid: FANE_GUID.to_uppercase(),
            name: "Fane".to_string(),
            kind: kind.to_string(),
        }],
        &[],
        &[],
    );
    load_story_with(HEADER, goals, environment)
}

#[test]
fn test_malformed_guid_string() {
    let story = load_goal(in_goal("PROC Main() THEN Kill(\"Fane\");"));
    assert_codes(&story, "G", &[DiagnosticCode::InvalidGuidString]);
    assert_eq!(story.diagnostics("G")[0].severity, DiagnosticSeverity::Error);
}

#[test]
fn test_well_formed_guid_strings() {
    let story = load_goal(in_goal(&format!(
        "PROC Main() THEN Kill(\"Fane_{FANE_GUID}\");\nPROC Other() THEN Kill(\"{FANE_GUID}\");"
    )));
    assert_goal_ok(&story, "G");
}

#[test]
fn test_guid_strings_only_checked_for_guid_parameters() {
    let story = load_goal(in_goal("PROC Main() THEN SetMode(\"Fane\");"));
    assert_goal_ok(&story, "G");
}

#[test]
fn test_known_instance() {
    let story = with_instances(
        "CHARACTERGUID",
        &[("G", in_goal(&format!("PROC Main() THEN Kill(\"Fane_{FANE_GUID}\");")))],
    );
    assert_goal_ok(&story, "G");
}

#[test]
fn test_unknown_instance() {
    let story = with_instances(
        "CHARACTERGUID",
        &[(
            "G",
            in_goal("PROC Main() THEN Kill(\"Lohse_11111111-2222-3333-4444-555555555555\");"),
        )],
    );
    assert_codes(&story, "G", &[DiagnosticCode::UnknownInstance]);
}

#[test]
fn test_instance_kind_and_name_mismatch() {
    let story = with_instances(
        "ITEMGUID",
        &[("G", in_goal(&format!("PROC Main() THEN Kill(\"Ifan_{FANE_GUID}\");")))],
    );
    assert_codes(
        &story,
        "G",
        &[
            DiagnosticCode::InstanceKindMismatch,
            DiagnosticCode::InstanceNameMismatch,
        ],
    );
    assert!(story
        .diagnostics("G")
        .iter()
        .all(|d| d.severity == DiagnosticSeverity::Warning));
}
