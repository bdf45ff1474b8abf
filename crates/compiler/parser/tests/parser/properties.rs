use osiris_compiler_parser::ast::NodeKind;
use osiris_compiler_parser::{parse_goal, parse_header, Lexer, TokenKind};
use proptest::prelude::*;

proptest! {
    #[test]
    fn token_spans_reproduce_non_trivia(source in "[A-Za-z0-9_(){};,.<>=! \\n\\t-]{0,80}") {
        let (tokens, _) = Lexer::tokenize(&source);
        let joined: String = tokens
            .iter()
            .filter(|token| token.kind != TokenKind::EndOfFile)
            .map(|token| &source[token.span.start..token.span.end])
            .collect();
        let strip = |text: &str| text.chars().filter(|c| !c.is_whitespace()).collect::<String>();
        prop_assert_eq!(strip(&joined), strip(&source));
    }

    #[test]
    fn goal_parser_is_total(source in "\\PC{0,200}") {
        let parsed = parse_goal(&source);
        let is_story_goal = matches!(parsed.ast.kind(parsed.ast.root()), NodeKind::StoryGoal { .. });
        prop_assert!(is_story_goal);
        for id in 0..parsed.ast.len() {
            let span = parsed.ast.span(id.into());
            prop_assert!(span.start <= span.end && span.end <= source.len());
        }
    }

    #[test]
    fn goal_parser_is_total_on_keyword_soup(
        words in proptest::collection::vec(
            prop::sample::select(vec![
                "IF", "PROC", "QRY", "THEN", "AND", "NOT", "(", ")", ";", ",", ".",
                "INITSECTION", "KBSECTION", "EXITSECTION", "ENDEXITSECTION",
                "DB_A", "_x", "_", "1", "\"s\"", "==", "[in]", "(INTEGER)", "GoalCompleted",
            ]),
            0..60,
        )
    ) {
        let source = words.join(" ");
        let parsed = parse_goal(&source);
        prop_assert!(parsed.ast.len() >= 3);
    }

    #[test]
    fn header_parser_is_total(source in "\\PC{0,200}") {
        let header = parse_header(&source);
        let is_div = matches!(header.ast.kind(header.ast.root()), NodeKind::Div { .. });
        prop_assert!(is_div);
    }
}
