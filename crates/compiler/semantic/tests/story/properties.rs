use proptest::prelude::*;

use crate::{in_goal, load_story};

/// A rule copying a variable from one database to another.
fn copy_rule() -> impl Strategy<Value = String> {
    (0..4usize, 0..4usize, 0..3usize)
        .prop_map(|(from, to, var)| format!("IF DB_{from}(_v{var}) THEN DB_{to}(_v{var});"))
}

/// A rule seeding a database with a constant.
fn seed_rule() -> impl Strategy<Value = String> {
    (0..4usize, prop_oneof![Just("1"), Just("\"text\""), Just("2.5")])
        .prop_map(|(to, value)| format!("PROC Seed() THEN DB_{to}({value});"))
}

fn rules() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(prop_oneof![3 => copy_rule(), 1 => seed_rule()], 1..12)
}

proptest! {
    #[test]
    fn resolution_terminates_on_any_rule_graph(rules in rules()) {
        let story = load_story(&[("G", in_goal(&rules.join("\n")))]);
        prop_assert!(story.is_ready());
        prop_assert!(story.symbols().iter().filter(|s| !s.is_system()).count() <= 5);
    }

    #[test]
    fn reanalysis_is_idempotent(rules in rules()) {
        let mut story = load_story(&[("G", in_goal(&rules.join("\n")))]);
        let first = story.all_diagnostics();
        story.reanalyze();
        prop_assert_eq!(story.all_diagnostics(), first);
    }
}
