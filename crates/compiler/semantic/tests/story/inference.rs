use std::time::{Duration, Instant};

use osiris_compiler_diagnostics::DiagnosticCode;
use osiris_compiler_parser::parse_goal;
use osiris_compiler_semantic::symbols::ParameterRef;
use osiris_compiler_semantic::{
    GoalWeights, Resolution, RuleScope, SymbolKey, Symbols, TypeRegistry, ValueType,
};

use crate::{assert_codes, child_goal, in_goal, load_goal, load_story, render};

fn param_type(story: &osiris_compiler_semantic::Story, name: &str, arity: usize, index: usize) -> ValueType {
    story.symbol(&SymbolKey::new(name, arity)).unwrap().parameters()[index]
        .ty
        .clone()
}

#[test]
fn test_arity_isolation() {
    let story = load_story(&[
        ("A", in_goal("PROC Foo((INTEGER)_a) THEN Bar(_a);")),
        ("B", in_goal("PROC Other() THEN Foo(1, 2);")),
    ]);

    let one = story.symbol(&SymbolKey::new("Foo", 1)).unwrap();
    let two = story.symbol(&SymbolKey::new("Foo", 2)).unwrap();
    assert_ne!(one.key(), two.key());
    assert_eq!(one.parameters()[0].ty, ValueType::Integer);
    assert_eq!(story.symbols_named("Foo").len(), 2);

    assert_codes(&story, "A", &[]);
    assert_codes(&story, "B", &[DiagnosticCode::UnresolvedSymbol]);
    let message = &story.diagnostics("B")[0].message;
    assert!(message.contains("'Foo/2'"), "{message}");
    assert!(message.contains("did you mean 'Foo/1'"), "{message}");
}

#[test]
fn test_mutual_wait_ends_dead_within_one_sweep() {
    let parsed = parse_goal(&in_goal(
        "IF DB_A(_x) THEN DB_B(_x);\nIF DB_B(_y) THEN DB_A(_y);",
    ));
    let mut symbols = Symbols::new();
    symbols.add_goal(&"Loop".into(), &parsed.ast, &TypeRegistry::new());

    let stats = symbols.update(&GoalWeights::default());
    assert_eq!(stats.dead, 2);
    assert!(stats.max_depth <= 2, "depth {}", stats.max_depth);
    for name in ["DB_A", "DB_B"] {
        let symbol = symbols.get(&SymbolKey::new(name, 1)).unwrap();
        assert!(symbol.is_dead());
        assert!(!symbol.needs_update());
    }
}

#[test]
fn test_header_type_flows_into_rule_variables() {
    let story = load_goal(in_goal("IF DB_Event(1) THEN Bar(_x);"));
    assert_eq!(param_type(&story, "Bar", 1, 0), ValueType::Integer);

    let goal = story.goal("G").unwrap();
    let rule = goal.ast().rules()[0];
    let scope = RuleScope::build(goal.ast(), rule, story.types());
    assert_eq!(scope.variable_type("_x", story.symbols()), ValueType::Integer);
}

#[test]
fn test_types_flow_across_goals() {
    let story = load_story(&[
        ("Reader", in_goal("IF DB_Name(_n) THEN DB_Copy(_n);")),
        ("Writer", in_goal("PROC Seed() THEN DB_Name(\"Fane\");")),
    ]);

    let copy = story.symbol(&SymbolKey::new("DB_Copy", 1)).unwrap();
    assert_eq!(copy.parameters()[0].ty, ValueType::String);
    assert_eq!(
        copy.parameters()[0].from,
        Some(ParameterRef {
            symbol: SymbolKey::new("DB_Name", 1),
            index: 0
        })
    );
    assert!(copy.resolved_definition().is_some());
}

#[test]
fn test_goal_weight_breaks_ties() {
    // Children load first but the root still wins
    let story = load_story(&[
        ("Child", child_goal("Root", "PROC B() THEN DB_Val(\"text\");")),
        ("Root", in_goal("PROC A() THEN DB_Val(1);")),
    ]);
    assert_eq!(param_type(&story, "DB_Val", 1, 0), ValueType::Integer);
    assert_eq!(story.goal("Root").unwrap().weight(), 0);
    assert_eq!(story.goal("Child").unwrap().weight(), 1);
}

#[test]
fn test_update_changes_inferred_types() {
    let mut story = load_story(&[
        ("Writer", in_goal("PROC Seed() THEN DB_Val(1);")),
        ("Reader", in_goal("IF DB_Val(_v) THEN Bar(_v);")),
    ]);
    assert_codes(&story, "Reader", &[]);

    story.update_goal_text("Writer", "memory:///Writer", in_goal("PROC Seed() THEN DB_Val(\"one\");"));
    assert_eq!(param_type(&story, "DB_Val", 1, 0), ValueType::String);

    // Other goals catch up when they are analyzed again
    assert_codes(&story, "Reader", &[]);
    story.analyze_goal("Reader");
    assert_codes(&story, "Reader", &[DiagnosticCode::TypeMismatch]);
}

#[test]
fn test_analysis_is_idempotent() {
    let mut story = load_story(&[
        ("A", in_goal("PROC Foo() THEN Missing(1);\nIF DB_Never(_x) THEN Bar(_x);")),
        ("B", in_goal("PROC Baz() THEN Bar(\"text\");\nPROC Baz() THEN DB_Unused(_y);")),
    ]);
    let first = story.all_diagnostics();
    let first_rendered = render(&story, "A") + &render(&story, "B");
    assert!(!first.is_empty());

    story.reanalyze();
    assert_eq!(story.all_diagnostics(), first);
    assert_eq!(render(&story, "A") + &render(&story, "B"), first_rendered);
}

#[test]
fn test_deep_pending_chain_loads_quickly() {
    const LEVELS: usize = 24;
    let mut kb = String::from("PROC Seed() THEN DB_L0(_unbound);\n");
    for level in 1..=LEVELS {
        let rule = format!("IF DB_L{}(_v) THEN DB_L{level}(_v);\n", level - 1);
        kb.push_str(&rule);
        kb.push_str(&rule);
    }

    let started = Instant::now();
    let story = load_story(&[("Chain", in_goal(&kb))]);
    let elapsed = started.elapsed();
    assert!(elapsed < Duration::from_secs(5), "loading took {elapsed:?}");

    assert!(story.symbols().iter().all(|symbol| !symbol.needs_update()));
    let top = story.symbol(&SymbolKey::new(format!("DB_L{LEVELS}"), 1)).unwrap();
    assert_eq!(top.resolution(), Resolution::Pending);
}
