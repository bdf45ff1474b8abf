use osiris_compiler_diagnostics::build_diagnostic_message;
use osiris_compiler_parser::{parse_goal, ParsedGoal};

/// Wraps knowledge base rules in a complete goal.
pub fn in_goal(kb: &str) -> String {
    format!(
        "Version 1\nSubGoalCombiner SGC_AND\nINITSECTION\n\nKBSECTION\n{kb}\nEXITSECTION\n\nENDEXITSECTION\n"
    )
}

fn render(code: &str, parsed: &ParsedGoal) -> String {
    parsed
        .diagnostics
        .iter()
        .map(|d| build_diagnostic_message(code, d, false))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Asserts that the given code parses without any diagnostics.
#[track_caller]
pub fn assert_parses_ok(code: &str) -> ParsedGoal {
    let parsed = parse_goal(code);
    if !parsed.diagnostics.is_empty() {
        panic!(
            "Expected successful parse, but got diagnostics:\n{}",
            render(code, &parsed)
        );
    }
    parsed
}

/// Asserts that the given code produces at least one diagnostic.
#[track_caller]
pub fn assert_parses_err(code: &str) -> ParsedGoal {
    let parsed = parse_goal(code);
    if parsed.diagnostics.is_empty() {
        panic!("Expected parsing to fail, but it succeeded without diagnostics.");
    }
    parsed
}
