//! Common test utilities for story tests
//!
//! - goal source builders
//! - story loading from in-memory sources
//! - diagnostic rendering and assertions

use osiris_compiler_diagnostics::{build_diagnostic_message, Diagnostic, DiagnosticCode};
use osiris_compiler_semantic::{AnalyzerEnvironment, Story, StoryInputs};
use osiris_project::MemorySource;

/// Header shared by most tests.
pub const HEADER: &str = r#"alias_type { GUIDSTRING } CHARACTERGUID;
call Bar((INTEGER)_Value)
call SetMode((STRING)_Mode)
call Kill((CHARACTERGUID)_Character)
query GetLevel([in](INTEGER)_Input, [out](INTEGER)_Level)
event Started()
"#;

pub const FANE_GUID: &str = "0133f2ad-e121-4590-b5f0-a79413919805";

// ===== Goal Sources =====

/// Wraps knowledge base rules in a complete goal.
pub fn in_goal(kb: &str) -> String {
    with_init("", kb)
}

/// A goal with INIT actions and knowledge base rules.
pub fn with_init(init: &str, kb: &str) -> String {
    format!(
        "Version 1\nSubGoalCombiner SGC_AND\nINITSECTION\n{init}\nKBSECTION\n{kb}\nEXITSECTION\n\nENDEXITSECTION\n"
    )
}

/// A goal whose footer points at `parent`.
pub fn child_goal(parent: &str, kb: &str) -> String {
    format!("{}ParentTargetEdge \"{parent}\";\n", in_goal(kb))
}

// ===== Story Loading =====

pub fn load_story(goals: &[(&str, String)]) -> Story {
    load_story_with(HEADER, goals, AnalyzerEnvironment::default())
}

pub fn load_story_with(
    header: &str,
    goals: &[(&str, String)],
    environment: AnalyzerEnvironment,
) -> Story {
    let inputs = goals.iter().fold(
        StoryInputs::from_header_text(header).with_environment(environment),
        |inputs, (name, source)| inputs.with_goal(MemorySource::new(*name, source.clone())),
    );
    Story::load_all(inputs).expect("in-memory stories always load")
}

/// Story with a single goal named `G`.
pub fn load_goal(source: String) -> Story {
    load_story(&[("G", source)])
}

// ===== Diagnostics =====

/// Renders the diagnostics of a goal with ariadne, for failure messages.
pub fn render(story: &Story, goal: &str) -> String {
    let source = story.goal(goal).map(|g| g.source()).unwrap_or_default();
    story
        .diagnostics(goal)
        .iter()
        .map(|d| build_diagnostic_message(source, d, false))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Diagnostics of a goal with the given code.
pub fn with_code(story: &Story, goal: &str, code: DiagnosticCode) -> Vec<Diagnostic> {
    story
        .diagnostics(goal)
        .into_iter()
        .filter(|d| d.code == code)
        .collect()
}

/// Asserts that a goal has no diagnostics at all.
#[track_caller]
pub fn assert_goal_ok(story: &Story, goal: &str) {
    if !story.diagnostics(goal).is_empty() {
        panic!(
            "Expected no diagnostics for {goal}, but got:\n{}",
            render(story, goal)
        );
    }
}

/// Asserts the exact codes reported for a goal, in any order.
#[track_caller]
pub fn assert_codes(story: &Story, goal: &str, expected: &[DiagnosticCode]) {
    let mut found: Vec<String> = story
        .diagnostics(goal)
        .iter()
        .map(|d| format!("{:?}", d.code))
        .collect();
    let mut expected: Vec<String> = expected.iter().map(|code| format!("{code:?}")).collect();
    found.sort();
    expected.sort();
    if found != expected {
        panic!(
            "Expected codes {expected:?} for {goal}, got {found:?}:\n{}",
            render(story, goal)
        );
    }
}

/// Asserts that a goal reports `code` at least once.
#[track_caller]
pub fn assert_has_code(story: &Story, goal: &str, code: DiagnosticCode) -> Diagnostic {
    match with_code(story, goal, code).into_iter().next() {
        Some(diagnostic) => diagnostic,
        None => panic!(
            "Expected a {code:?} diagnostic for {goal}, got:\n{}",
            render(story, goal)
        ),
    }
}
