use osiris_compiler_diagnostics::DiagnosticCode;
use osiris_compiler_semantic::{GoalTreeNode, SymbolKey};

use crate::{
    assert_codes, assert_goal_ok, child_goal, in_goal, load_story, load_story_with, HEADER,
};

fn names(nodes: &[GoalTreeNode]) -> Vec<&str> {
    nodes.iter().map(|node| node.name.as_str()).collect()
}

#[test]
fn test_unresolved_parent_goal() {
    let story = load_story(&[("Lost", child_goal("Nowhere", "PROC A() THEN Bar(1);"))]);
    assert_codes(&story, "Lost", &[DiagnosticCode::UnresolvedParentGoal]);
    assert_eq!(
        story.diagnostics("Lost")[0].message,
        "Parent goal 'Nowhere' does not exist"
    );
}

#[test]
fn test_goal_tree() {
    let story = load_story(&[
        ("Zeta", in_goal("")),
        ("Leaf", child_goal("Alpha", "")),
        ("Alpha", in_goal("")),
        ("Orphan", child_goal("Missing", "")),
    ]);
    let tree = story.goal_tree();
    assert_eq!(names(&tree), vec!["Alpha", "Orphan", "Zeta"]);
    assert_eq!(names(&tree[0].children), vec!["Leaf"]);
    assert!(tree.iter().all(|node| !node.is_shared));
}

#[test]
fn test_header_goals_join_the_tree() {
    let header = format!(
        "{HEADER}Goal(1) {{\n\tTitle(\"Start\");\n\tSubGoal(2);\n}}\nGoal(2) {{\n\tTitle(\"Chapter\");\n}}\n"
    );
    let story = load_story_with(
        &header,
        &[("Quest", child_goal("Chapter", "PROC A() THEN Bar(1);"))],
        Default::default(),
    );

    let tree = story.goal_tree();
    assert_eq!(names(&tree), vec!["Start"]);
    assert!(tree[0].is_shared);
    let chapter = &tree[0].children[0];
    assert_eq!(chapter.name, "Chapter");
    assert_eq!(names(&chapter.children), vec!["Quest"]);
    assert!(!chapter.children[0].is_shared);
    assert_goal_ok(&story, "Quest");
}

#[test]
fn test_removing_parent_reanalyzes_children() {
    let mut story = load_story(&[
        ("Parent", in_goal("")),
        ("Child", child_goal("Parent", "")),
    ]);
    assert_goal_ok(&story, "Child");

    assert!(story.remove_goal("Parent"));
    assert_codes(&story, "Child", &[DiagnosticCode::UnresolvedParentGoal]);
    assert_eq!(story.goal("Child").unwrap().weight(), 0);
}

#[test]
fn test_rename_symbol_edits_every_call_site() {
    let story = load_story(&[
        ("A", in_goal("PROC Foo((INTEGER)_a) THEN Bar(_a);")),
        ("B", in_goal("PROC Other() THEN Foo(1);\nPROC Third() THEN Foo(2); Bar(3);")),
    ]);
    let edits = story.rename_symbol(&SymbolKey::new("Foo", 1), "Renamed");
    assert_eq!(edits.len(), 3);

    for edit in &edits {
        assert_eq!(edit.text, "Renamed");
        let goal = story
            .goals()
            .find(|goal| goal.uri() == edit.uri)
            .unwrap();
        assert_eq!(&goal.source()[edit.span.start..edit.span.end], "Foo");
    }
    assert_eq!(edits[0].uri, "memory:///A");
    assert!(edits[1].span.start < edits[2].span.start);
}

#[test]
fn test_rename_goal_edits_parent_edges() {
    let story = load_story(&[
        ("Parent", in_goal("")),
        ("Child", child_goal("Parent", "")),
        ("Other", child_goal("Elsewhere", "")),
    ]);
    let edits = story.rename_goal("Parent", "Renamed");
    assert_eq!(edits.len(), 1);

    let child = story.goal("Child").unwrap();
    assert_eq!(edits[0].uri, child.uri());
    assert_eq!(&child.source()[edits[0].span.start..edits[0].span.end], "Parent");
}

#[test]
fn test_symbol_at_offset() {
    let story = load_story(&[("G", in_goal("PROC Main() THEN Bar(1);"))]);
    let source = story.goal("G").unwrap().source();
    let offset = source.find("Bar").unwrap() + 1;
    let symbol = story.symbol_at("G", offset).unwrap();
    assert_eq!(symbol.key(), &SymbolKey::new("Bar", 1));
    assert!(symbol.is_system());
}

#[test]
fn test_header_blob_errors_are_reported_once_against_the_header() {
    let header = format!("{HEADER}Goal(1) {{\n\tTitle(\"Broken\");\n\tKB {{\n\t\tPROC Foo( THEN Bar(1);\n\t}}\n}}\n");
    let story = load_story_with(&header, &[("Quest", in_goal("PROC A() THEN Bar(1);"))], Default::default());

    let reported = story.header_diagnostics();
    assert!(!reported.is_empty());
    assert_eq!(story.all_diagnostics(), reported.to_vec());
    assert_eq!(
        reported.len(),
        story.goal("Broken").unwrap().all_diagnostics().len()
    );

    let blob = header.find("PROC Foo(").unwrap();
    let blob_end = blob + "PROC Foo( THEN Bar(1);".len();
    for diagnostic in reported {
        assert_eq!(diagnostic.file_path, story.header_uri());
        assert!((blob..=blob_end).contains(&diagnostic.span.start));
    }
}
