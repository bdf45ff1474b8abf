//! Integration tests for the `osiris` checker: project discovery, loading and
//! report rendering against projects written to temporary directories.

use std::fs;
use std::path::Path;

use osiris_compiler::{check_project, load_project, render_story, CheckOptions};
use tempfile::TempDir;

const HEADER: &str = "call Bar((INTEGER)_Value);\nevent Started();\n";

fn goal(kb: &str) -> String {
    format!("INITSECTION\nKBSECTION\n{kb}\nEXITSECTION\nENDEXITSECTION\n")
}

fn write_project(root: &Path, manifest_extra: &str, goals: &[(&str, String)]) {
    fs::create_dir_all(root.join("Goals")).unwrap();
    fs::write(
        root.join("osiris.toml"),
        format!("name = \"TestMod\"\nheader = \"story_header.div\"\n{manifest_extra}"),
    )
    .unwrap();
    fs::write(root.join("story_header.div"), HEADER).unwrap();
    for (name, text) in goals {
        fs::write(root.join("Goals").join(format!("{name}.txt")), text).unwrap();
    }
}

#[test]
fn test_clean_project_has_no_issues() {
    let temp_dir = TempDir::new().unwrap();
    write_project(
        temp_dir.path(),
        "",
        &[("Start", goal("IF Started() THEN Bar(1);"))],
    );

    let project = load_project(temp_dir.path()).unwrap();
    let story = check_project(&project).unwrap();
    let report = render_story(&story, CheckOptions::default());

    assert!(story.is_ready());
    assert!(!report.has_errors());
    assert!(report.messages.is_empty());
    assert_eq!(report.summary(), "No issues found");
}

#[test]
fn test_errors_are_rendered_with_their_goal() {
    let temp_dir = TempDir::new().unwrap();
    write_project(
        temp_dir.path(),
        "",
        &[
            ("Start", goal("IF Started() THEN Bar(\"x\");")),
            ("Other", goal("PROC Foo() THEN Baz(1);")),
        ],
    );

    let project = load_project(&temp_dir.path().join("Goals/Start.txt")).unwrap();
    let story = check_project(&project).unwrap();
    let report = render_story(&story, CheckOptions::default());

    assert!(report.has_errors());
    assert_eq!(report.errors, 2);
    assert_eq!(report.warnings, 0);
    assert_eq!(report.summary(), "2 errors, 0 warnings");
    assert!(report
        .messages
        .iter()
        .any(|m| m.contains("Start.txt") && m.contains("Parameter 1 of 'Bar' expects INTEGER, found STRING")));
    assert!(report
        .messages
        .iter()
        .any(|m| m.contains("Other.txt") && m.contains("Unresolved symbol 'Baz/1'")));
}

#[test]
fn test_dependency_goals_are_not_reported() {
    let temp_dir = TempDir::new().unwrap();
    let shared = temp_dir.path().join("Shared");
    fs::create_dir_all(&shared).unwrap();
    fs::write(shared.join("Library.txt"), goal("PROC Helper() THEN Missing();")).unwrap();
    let project_dir = temp_dir.path().join("Mod");
    write_project(
        &project_dir,
        "dependencies = [\"../Shared\"]\n",
        &[("Start", goal("IF Started() THEN Helper();"))],
    );

    let project = load_project(&project_dir).unwrap();
    let story = check_project(&project).unwrap();
    let report = render_story(&story, CheckOptions::default());

    assert!(story.goal("Library").is_some_and(|g| g.is_shared()));
    assert!(!story.diagnostics("Library").is_empty());
    assert!(report.messages.is_empty());
}

#[test]
fn test_missing_manifest_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let error = load_project(temp_dir.path()).unwrap_err();
    assert!(error.to_string().contains("osiris.toml"));
}

#[test]
fn test_missing_dependency_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    write_project(temp_dir.path(), "dependencies = [\"../Nowhere\"]\n", &[]);

    let project = load_project(temp_dir.path()).unwrap();
    let Err(error) = check_project(&project) else {
        panic!("a missing dependency must fail the load");
    };
    assert!(format!("{error:#}").contains("Nowhere"));
}
