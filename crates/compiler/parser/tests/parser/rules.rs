use osiris_compiler_parser::ast::{
    CallerRole, IdentifierKind, NodeKind, Operator, ParameterFlow, RuleKind,
};

use crate::common::{assert_parses_ok, in_goal};

#[test]
fn conditions_and_actions() {
    let parsed = assert_parses_ok(&in_goal(
        "IF DB_A((INTEGER)_x, [out]_y)\nAND (INTEGER)_x >= 3\nAND NOT DB_B(_x)\nTHEN\nNOT DB_A(_x, _y);\nGoalCompleted;",
    ));
    let ast = &parsed.ast;
    let rule = ast.rules()[0];
    let NodeKind::Rule {
        kind,
        conditions,
        actions,
        ..
    } = ast.kind(rule)
    else {
        panic!("expected a rule");
    };
    assert_eq!(*kind, RuleKind::If);

    let NodeKind::ConditionBlock { conditions } = ast.kind(*conditions) else {
        panic!("expected a condition block");
    };
    assert_eq!(conditions.len(), 2);
    assert!(matches!(
        ast.kind(conditions[0]),
        NodeKind::OperatorCondition {
            operator: Operator::GreaterEqual,
            ..
        }
    ));
    assert!(matches!(
        ast.kind(conditions[1]),
        NodeKind::SignatureCondition {
            is_inverted: true,
            ..
        }
    ));

    let NodeKind::ActionBlock { actions } = ast.kind(*actions) else {
        panic!("expected an action block");
    };
    assert_eq!(actions.len(), 2);
    assert!(matches!(ast.kind(actions[1]), NodeKind::GoalCompletedAction));

    let callers = ast.callers();
    let head = callers[0];
    assert_eq!(head.role, CallerRole::RuleHead(RuleKind::If));
    assert_eq!(ast.parameter_type(head.parameters[0]), Some("INTEGER"));
    assert_eq!(
        ast.parameter_flow(head.parameters[1]),
        Some(ParameterFlow::Out)
    );
}

#[test]
fn identifiers_are_classified_by_shape() {
    let parsed = assert_parses_ok(&in_goal("PROC Foo(_x, _, DB_Thing, Bar) THEN DB_NOOP(1);"));
    let ast = &parsed.ast;
    let head = ast.callers()[0];
    let kinds: Vec<_> = head
        .parameters
        .iter()
        .map(|&p| match ast.kind(ast.parameter_argument(p).unwrap()) {
            NodeKind::Identifier { kind, .. } => *kind,
            other => panic!("unexpected argument {other:?}"),
        })
        .collect();
    assert_eq!(
        kinds,
        vec![
            IdentifierKind::Variable,
            IdentifierKind::Empty,
            IdentifierKind::Database,
            IdentifierKind::Default,
        ]
    );
}

#[test]
fn literals() {
    let parsed = assert_parses_ok(&in_goal(
        "PROC Foo() THEN DB_Lit(-4, 2.5, \"text\", S_Ifan_1c3c9c74-34a1-4685-989e-410dc080be6f);",
    ));
    let ast = &parsed.ast;
    let action = ast.callers()[1];
    let values: Vec<_> = action
        .parameters
        .iter()
        .map(|&p| ast.kind(ast.parameter_argument(p).unwrap()).clone())
        .collect();
    assert_eq!(values[0], NodeKind::IntegerLiteral { value: -4 });
    assert_eq!(values[1], NodeKind::RealLiteral { value: 2.5 });
    assert_eq!(
        values[2],
        NodeKind::StringLiteral {
            value: "text".to_string()
        }
    );
    assert_eq!(
        values[3],
        NodeKind::GuidLiteral {
            value: "S_Ifan_1c3c9c74-34a1-4685-989e-410dc080be6f".into()
        }
    );
}

#[test]
fn regions_and_comments_attach_to_rules() {
    let parsed = assert_parses_ok(&in_goal(
        "//REGION Setup\n// Starts the thing\nPROC Start() THEN DB_NOOP(1);\n//END_REGION\nPROC Other() THEN DB_NOOP(1);",
    ));
    let ast = &parsed.ast;
    let NodeKind::Rule {
        region, comment, ..
    } = ast.kind(ast.rules()[0])
    else {
        panic!("expected a rule");
    };
    assert_eq!(region.as_deref(), Some("Setup"));
    assert_eq!(comment.as_deref(), Some("Starts the thing"));
    let NodeKind::Rule { region, .. } = ast.kind(ast.rules()[1]) else {
        panic!("expected a rule");
    };
    assert_eq!(*region, None);
}

#[test]
fn callers_cover_init_rules_and_exit() {
    let parsed = assert_parses_ok(
        "INITSECTION\nDB_Init(1);\nKBSECTION\nQRY Check() AND DB_Init(1) THEN DB_NOOP(1);\nEXITSECTION\nNOT DB_Init(1);\nENDEXITSECTION\n",
    );
    let roles: Vec<_> = parsed
        .ast
        .callers()
        .iter()
        .map(|caller| (caller.name, caller.role))
        .collect();
    assert_eq!(
        roles,
        vec![
            ("DB_Init", CallerRole::InitAction),
            ("Check", CallerRole::RuleHead(RuleKind::Query)),
            ("DB_Init", CallerRole::Condition),
            ("DB_NOOP", CallerRole::Action),
            ("DB_Init", CallerRole::ExitAction),
        ]
    );
}

#[test]
fn rule_nodes_follow_evaluation_order() {
    let parsed = assert_parses_ok(&in_goal(
        "IF DB_A(_a) AND _a != _b AND DB_B(_b) THEN DB_C(_a, _b);",
    ));
    let ast = &parsed.ast;
    let mut visited = Vec::new();
    ast.each_rule_node(ast.rules()[0], |node| {
        let name = ast.identifier_name(node.argument).unwrap().to_string();
        visited.push((name, node.caller.map(|c| c.name), node.index));
    });
    assert_eq!(
        visited,
        vec![
            ("_a".to_string(), Some("DB_A"), 0),
            ("_a".to_string(), None, 0),
            ("_b".to_string(), None, 1),
            ("_b".to_string(), Some("DB_B"), 0),
            ("_a".to_string(), Some("DB_C"), 0),
            ("_b".to_string(), Some("DB_C"), 1),
        ]
    );
}

#[test]
fn parent_edges_are_read_from_footer() {
    let parsed = assert_parses_ok(
        "INITSECTION\nKBSECTION\nEXITSECTION\nENDEXITSECTION\nParentTargetEdge \"Act1\";\nParentTargetEdge \"Act2\"",
    );
    let parents: Vec<_> = parsed.ast.parent_edges().map(|(name, _)| name).collect();
    assert_eq!(parents, vec!["Act1", "Act2"]);
}
