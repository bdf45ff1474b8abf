//! # Osiris Parser
//!
//! Hand-written recursive descent over the [`Lexer`]. Two grammars share the
//! engine defined here: the goal grammar below and the header grammar in
//! [`crate::header`].
//!
//! ## Error recovery
//!
//! The parser keeps a stack of *bail-out* token sets. Skipping helpers
//! ([`Parser::consume_until`], [`Parser::consume_including`]) stop at their
//! own targets and at any token in the stack, so a broken construct never
//! swallows the enclosing structure. Each unexpected or missing token yields
//! exactly one diagnostic and the parser always produces a tree.
//!
//! ## Ranges
//!
//! Composite nodes are built through [`Parser::node`], which stamps the node
//! with the range from the first to the last token consumed while building it.
//! A node that consumed nothing gets an empty range at the current token.

use chumsky::span::SimpleSpan;
use index_vec::IndexVec;
use osiris_compiler_diagnostics::{Diagnostic, DiagnosticCode};
use smol_str::SmolStr;

use crate::ast::{
    Ast, GoalOption, IdentifierKind, Node, NodeId, NodeKind, NodeRange, Operator, OptionPlacement,
    OptionValue, ParameterFlow, RuleKind,
};
use crate::lexer::{Lexer, Token, TokenKind, TokenSet};
use crate::position::{LineIndex, PackedPosition};

const SECTIONS: TokenSet = TokenSet::new(&[
    TokenKind::InitSection,
    TokenKind::KbSection,
    TokenKind::ExitSection,
    TokenKind::EndExitSection,
]);

const RULE_START: TokenSet = TokenSet::new(&[TokenKind::If, TokenKind::Proc, TokenKind::Qry]);

const ACTION_START: TokenSet = TokenSet::new(&[
    TokenKind::Identifier,
    TokenKind::Not,
    TokenKind::GoalCompleted,
]);

const PARAMETER_START: TokenSet = TokenSet::new(&[
    TokenKind::Annotation,
    TokenKind::LParen,
    TokenKind::Identifier,
    TokenKind::Guid,
    TokenKind::Integer,
    TokenKind::Real,
    TokenKind::String,
]);

/// Result of parsing a goal.
#[derive(Debug, Clone)]
pub struct ParsedGoal {
    pub ast: Ast,
    /// Lexical and syntax diagnostics, in source order
    pub diagnostics: Vec<Diagnostic>,
    pub line_index: LineIndex,
}

/// Parses a goal: `[options] INITSECTION actions KBSECTION rules EXITSECTION
/// actions ENDEXITSECTION [options]`.
///
/// Never fails; malformed input produces a partial tree plus diagnostics.
pub fn parse_goal(source: &str) -> ParsedGoal {
    let mut parser = Parser::new(source);
    let root = parser.goal();
    let (ast, diagnostics, line_index) = parser.finish(root);
    ParsedGoal {
        ast,
        diagnostics,
        line_index,
    }
}

pub(crate) struct Parser<'src> {
    lexer: Lexer<'src>,
    nodes: IndexVec<NodeId, Node>,
    diagnostics: Vec<Diagnostic>,
    bail_out: Vec<TokenSet>,
    consumed: usize,
}

impl<'src> Parser<'src> {
    pub(crate) fn new(source: &'src str) -> Self {
        Self {
            lexer: Lexer::new(source),
            nodes: IndexVec::new(),
            diagnostics: Vec::new(),
            bail_out: Vec::new(),
            consumed: 0,
        }
    }

    pub(crate) fn finish(self, root: NodeId) -> (Ast, Vec<Diagnostic>, LineIndex) {
        let (line_index, mut diagnostics) = self.lexer.into_parts();
        diagnostics.extend(self.diagnostics);
        diagnostics.sort_by_key(|diagnostic| (diagnostic.span.start, diagnostic.span.end));
        (Ast::new(self.nodes, root), diagnostics, line_index)
    }

    pub(crate) fn source(&self) -> &'src str {
        self.lexer.source()
    }

    // ---- token access ----------------------------------------------------

    pub(crate) fn peek(&mut self) -> &Token {
        self.lexer.peek(0)
    }

    pub(crate) fn peek_kind(&mut self, k: usize) -> TokenKind {
        self.lexer.peek(k).kind
    }

    pub(crate) fn at(&mut self, kind: TokenKind) -> bool {
        self.peek_kind(0) == kind
    }

    pub(crate) fn at_any(&mut self, set: TokenSet) -> bool {
        set.contains(self.peek_kind(0))
    }

    pub(crate) fn at_end(&mut self) -> bool {
        self.at(TokenKind::EndOfFile)
    }

    /// Whether the next token belongs to an enclosing construct.
    pub(crate) fn at_bail_out(&mut self) -> bool {
        let kind = self.peek_kind(0);
        kind == TokenKind::EndOfFile || self.bail_out.iter().any(|set| set.contains(kind))
    }

    pub(crate) fn bump(&mut self) -> Token {
        self.consumed += 1;
        self.lexer.next()
    }

    pub(crate) fn eat(&mut self, kind: TokenKind) -> Option<Token> {
        if self.at(kind) {
            Some(self.bump())
        } else {
            None
        }
    }

    /// Consumes `kind` or reports it as missing without consuming anything.
    pub(crate) fn expect(&mut self, kind: TokenKind, what: &str) -> Option<Token> {
        if self.at(kind) {
            return Some(self.bump());
        }
        self.error_missing(what);
        None
    }

    /// Skips tokens until one in `targets` or in the bail-out stack is next.
    pub(crate) fn consume_until(&mut self, targets: TokenSet) {
        while !self.at_any(targets) && !self.at_bail_out() {
            self.bump();
        }
    }

    /// Like [`Self::consume_until`], then consumes the target if one was found.
    pub(crate) fn consume_including(&mut self, targets: TokenSet) -> Option<Token> {
        self.consume_until(targets);
        if self.at_any(targets) {
            Some(self.bump())
        } else {
            None
        }
    }

    pub(crate) fn with_bail_out<T>(&mut self, set: TokenSet, f: impl FnOnce(&mut Self) -> T) -> T {
        self.bail_out.push(set);
        let result = f(self);
        self.bail_out.pop();
        result
    }

    // ---- diagnostics -----------------------------------------------------

    pub(crate) fn error_unexpected(&mut self, expected: &str) {
        let token = self.peek();
        let found = match token.kind {
            TokenKind::EndOfFile | TokenKind::Invalid => token.kind.describe().to_string(),
            _ => format!("'{}'", token.value),
        };
        let span = token.span;
        let diagnostic = if token.kind == TokenKind::EndOfFile {
            Diagnostic::error(
                DiagnosticCode::UnexpectedEndOfFile,
                format!("Expected {expected}, found end of file"),
            )
            .with_location(span)
        } else {
            Diagnostic::unexpected_token(expected, &found, span)
        };
        self.diagnostics.push(diagnostic);
    }

    pub(crate) fn error_missing(&mut self, what: &str) {
        let span = self.peek().span;
        self.diagnostics.push(Diagnostic::missing_token(what, span));
    }

    /// End offset and position of the last consumed token.
    pub(crate) fn last_end(&self) -> (usize, PackedPosition) {
        let last = self.lexer.last();
        (last.span.end, last.end)
    }

    pub(crate) fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    // ---- node construction -----------------------------------------------

    /// Builds a node whose range covers every token consumed by `f`.
    pub(crate) fn node(&mut self, f: impl FnOnce(&mut Self) -> NodeKind) -> NodeId {
        let first = self.peek();
        let (first_span, first_start) = (first.span, first.start);
        let consumed_before = self.consumed;
        let kind = f(self);
        let range = if self.consumed > consumed_before {
            let last = self.lexer.last();
            NodeRange {
                span: SimpleSpan::from(first_span.start..last.span.end),
                start: first_start,
                end: last.end,
            }
        } else {
            let position = self.peek().start;
            NodeRange::empty(self.peek().span.start, position)
        };
        self.nodes.push(Node { kind, range })
    }

    pub(crate) fn leaf(&mut self, token: &Token, kind: NodeKind) -> NodeId {
        self.nodes.push(Node {
            kind,
            range: NodeRange {
                span: token.span,
                start: token.start,
                end: token.end,
            },
        })
    }

    /// Placeholder for a required node that is absent from the source.
    pub(crate) fn missing(&mut self) -> NodeId {
        self.node(|_| NodeKind::Identifier {
            name: SmolStr::default(),
            kind: IdentifierKind::Default,
        })
    }

    pub(crate) fn identifier(&mut self, token: &Token) -> NodeId {
        self.leaf(
            token,
            NodeKind::Identifier {
                name: token.value.clone(),
                kind: IdentifierKind::classify(&token.value),
            },
        )
    }

    pub(crate) fn node_kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id].kind
    }

    // ---- goal grammar ----------------------------------------------------

    fn goal(&mut self) -> NodeId {
        self.with_bail_out(SECTIONS, |p| {
            p.node(|p| {
                let mut options = p.goal_options(OptionPlacement::Header);

                p.expect(TokenKind::InitSection, "'INITSECTION'");
                let init = p.action_block(RULE_START);

                p.expect(TokenKind::KbSection, "'KBSECTION'");
                let rules = p.rules();

                p.expect(TokenKind::ExitSection, "'EXITSECTION'");
                let exit = p.action_block(RULE_START);

                p.expect(TokenKind::EndExitSection, "'ENDEXITSECTION'");
                options.extend(p.goal_options(OptionPlacement::Footer));

                if !p.at_end() {
                    p.error_unexpected("end of file");
                    while !p.at_end() {
                        p.bump();
                    }
                }

                NodeKind::StoryGoal {
                    options,
                    init,
                    rules,
                    exit,
                }
            })
        })
    }

    fn goal_options(&mut self, placement: OptionPlacement) -> Vec<GoalOption> {
        let mut options = Vec::new();
        loop {
            if self.at(TokenKind::Identifier) {
                options.push(self.goal_option(placement));
            } else if placement == OptionPlacement::Footer && !self.at_end() {
                // Anything after ENDEXITSECTION other than options is an error
                self.error_unexpected("goal option");
                self.bump();
                self.consume_until(TokenSet::new(&[TokenKind::Identifier]));
            } else {
                return options;
            }
        }
    }

    fn goal_option(&mut self, placement: OptionPlacement) -> GoalOption {
        let name_token = self.bump();
        let value_token = self.peek().clone();
        let value = match value_token.kind {
            TokenKind::Integer => {
                self.bump();
                value_token
                    .value
                    .parse()
                    .map_or(OptionValue::Missing, OptionValue::Integer)
            }
            TokenKind::Identifier => {
                self.bump();
                OptionValue::Identifier(value_token.value.clone())
            }
            TokenKind::String => {
                self.bump();
                OptionValue::String(value_token.value.to_string())
            }
            _ => {
                self.error_missing("option value");
                OptionValue::Missing
            }
        };
        self.eat(TokenKind::Semicolon);

        let last = self.lexer.last();
        let range = NodeRange {
            span: SimpleSpan::from(name_token.span.start..last.span.end.max(name_token.span.end)),
            start: name_token.start,
            end: if last.span.end >= name_token.span.end {
                last.end
            } else {
                name_token.end
            },
        };
        let option = GoalOption {
            name: name_token.value.clone(),
            value,
            placement,
            range,
        };
        self.validate_option(&option);
        option
    }

    fn validate_option(&mut self, option: &GoalOption) {
        if option.value == OptionValue::Missing {
            return;
        }
        let problem = match (option.name.as_str(), option.placement) {
            ("Version", OptionPlacement::Header) => (option.value != OptionValue::Integer(1))
                .then(|| "Version must be 1".to_string()),
            ("SubGoalCombiner", OptionPlacement::Header) => {
                (option.value != OptionValue::Identifier(SmolStr::new_static("SGC_AND")))
                    .then(|| "SubGoalCombiner must be SGC_AND".to_string())
            }
            ("ParentTargetEdge", OptionPlacement::Footer) => {
                (!matches!(option.value, OptionValue::String(_)))
                    .then(|| "ParentTargetEdge expects a goal name string".to_string())
            }
            ("Version" | "SubGoalCombiner", OptionPlacement::Footer) => Some(format!(
                "Option '{}' must appear before INITSECTION",
                option.name
            )),
            ("ParentTargetEdge", OptionPlacement::Header) => {
                Some("Option 'ParentTargetEdge' must appear after ENDEXITSECTION".to_string())
            }
            (name, _) => Some(format!("Unknown goal option '{name}'")),
        };
        if let Some(message) = problem {
            self.report(
                Diagnostic::error(DiagnosticCode::InvalidOption, message)
                    .with_location(option.range.span),
            );
        }
    }

    fn rules(&mut self) -> Vec<NodeId> {
        let mut rules = Vec::new();
        while !self.at_bail_out() {
            if self.at_any(RULE_START) {
                rules.push(self.rule());
            } else {
                self.error_unexpected("rule (IF, PROC or QRY)");
                self.bump();
                self.consume_until(RULE_START);
            }
        }
        rules
    }

    fn rule(&mut self) -> NodeId {
        self.node(|p| {
            let keyword = p.bump();
            let kind = match keyword.kind {
                TokenKind::If => RuleKind::If,
                TokenKind::Qry => RuleKind::Query,
                _ => RuleKind::Proc,
            };
            let head_bail_out = RULE_START.union(TokenSet::new(&[TokenKind::Then, TokenKind::And]));
            let signature = p.with_bail_out(head_bail_out, |p| p.signature());

            let conditions = p.with_bail_out(RULE_START.union(TokenSet::new(&[TokenKind::Then])), |p| {
                p.condition_block()
            });

            if p.expect(TokenKind::Then, "'THEN'").is_none() {
                // A call right away is most likely the first action
                let starts_action =
                    p.at(TokenKind::Identifier) && p.peek_kind(1) == TokenKind::LParen;
                if !starts_action {
                    p.consume_until(RULE_START.union(TokenSet::new(&[TokenKind::Then])));
                    p.eat(TokenKind::Then);
                }
            }
            let actions = p.action_block(RULE_START);
            let is_empty = matches!(
                p.node_kind(actions),
                NodeKind::ActionBlock { actions } if actions.is_empty()
            );
            if is_empty {
                let span = p.nodes[actions].range.span;
                p.report(
                    Diagnostic::warning(
                        DiagnosticCode::EmptyActionBlock,
                        "Rule has no actions; use DB_NOOP(1); as a no-op".to_string(),
                    )
                    .with_location(span),
                );
            }

            NodeKind::Rule {
                kind,
                signature,
                conditions,
                actions,
                region: keyword.region,
                comment: keyword.comment,
            }
        })
    }

    fn condition_block(&mut self) -> NodeId {
        self.node(|p| {
            let mut conditions = Vec::new();
            while p.eat(TokenKind::And).is_some() {
                conditions.push(p.with_bail_out(TokenSet::new(&[TokenKind::And]), |p| p.condition()));
            }
            NodeKind::ConditionBlock { conditions }
        })
    }

    fn condition(&mut self) -> NodeId {
        self.node(|p| {
            if p.eat(TokenKind::Not).is_some() {
                let signature = p.signature();
                return NodeKind::SignatureCondition {
                    signature,
                    is_inverted: true,
                };
            }
            if p.at(TokenKind::Identifier)
                && matches!(p.peek_kind(1), TokenKind::LParen | TokenKind::Dot)
            {
                let signature = p.signature();
                return NodeKind::SignatureCondition {
                    signature,
                    is_inverted: false,
                };
            }

            let left = p.parameter();
            let operator = match p.peek_kind(0) {
                TokenKind::Equal => Some(Operator::Equal),
                TokenKind::NotEqual => Some(Operator::NotEqual),
                TokenKind::Less => Some(Operator::Less),
                TokenKind::LessEqual => Some(Operator::LessEqual),
                TokenKind::Greater => Some(Operator::Greater),
                TokenKind::GreaterEqual => Some(Operator::GreaterEqual),
                _ => None,
            };
            let right = match operator {
                Some(_) => {
                    p.bump();
                    p.parameter()
                }
                None => {
                    if !p.diagnostics_at_current_token() {
                        p.error_unexpected("comparison operator");
                    }
                    p.consume_until(TokenSet::EMPTY);
                    p.missing()
                }
            };
            NodeKind::OperatorCondition {
                operator: operator.unwrap_or(Operator::Equal),
                left,
                right,
            }
        })
    }

    /// Whether a diagnostic has already been reported at the current token.
    fn diagnostics_at_current_token(&mut self) -> bool {
        let start = self.peek().span.start;
        self.diagnostics
            .last()
            .is_some_and(|diagnostic| diagnostic.span.start == start)
    }

    /// Actions up to the next section keyword, rule keyword or bail-out token.
    fn action_block(&mut self, stop: TokenSet) -> NodeId {
        self.node(|p| {
            let mut actions = Vec::new();
            while !p.at_any(stop) && !p.at_bail_out() {
                if p.at_any(ACTION_START) {
                    actions.push(p.action(stop));
                } else {
                    p.error_unexpected("action");
                    p.bump();
                    p.consume_until(ACTION_START.union(stop));
                }
            }
            NodeKind::ActionBlock { actions }
        })
    }

    fn action(&mut self, stop: TokenSet) -> NodeId {
        self.node(|p| {
            if p.eat(TokenKind::GoalCompleted).is_some() {
                p.expect(TokenKind::Semicolon, "';'");
                return NodeKind::GoalCompletedAction;
            }
            let is_inverted = p.eat(TokenKind::Not).is_some();
            let signature = p.with_bail_out(stop.union(TokenSet::new(&[TokenKind::Semicolon])), |p| {
                p.signature()
            });
            if p.expect(TokenKind::Semicolon, "';'").is_none() {
                // Resynchronise on the next `;` unless a new action starts right away
                if !p.at_any(ACTION_START) {
                    p.consume_until(stop.union(TokenSet::new(&[TokenKind::Semicolon])));
                    p.eat(TokenKind::Semicolon);
                }
            }
            NodeKind::SignatureAction {
                signature,
                is_inverted,
            }
        })
    }

    /// `Name(params)` or `This.Name(params)`; the dotted form prepends `This`
    /// as an implicit first parameter.
    pub(crate) fn signature(&mut self) -> NodeId {
        self.node(|p| {
            let Some(first) = p.expect(TokenKind::Identifier, "symbol name") else {
                let identifier = p.missing();
                return NodeKind::Signature {
                    identifier,
                    parameters: Vec::new(),
                };
            };

            let mut parameters = Vec::new();
            let identifier = if p.at(TokenKind::Dot) && p.peek_kind(1) == TokenKind::Identifier {
                p.bump();
                let this = p.identifier(&first);
                let this_range = p.nodes[this].range;
                let parameter = p.nodes.push(Node {
                    kind: NodeKind::Parameter {
                        flow: None,
                        type_annotation: None,
                        argument: this,
                    },
                    range: this_range,
                });
                parameters.push(parameter);
                let name = p.bump();
                p.identifier(&name)
            } else {
                p.identifier(&first)
            };

            if p.expect(TokenKind::LParen, "'('").is_none() {
                return NodeKind::Signature {
                    identifier,
                    parameters,
                };
            }
            p.parameter_list(&mut parameters);
            NodeKind::Signature {
                identifier,
                parameters,
            }
        })
    }

    fn parameter_list(&mut self, parameters: &mut Vec<NodeId>) {
        let close = TokenSet::new(&[TokenKind::RParen]);
        if self.eat(TokenKind::RParen).is_some() {
            return;
        }
        loop {
            if !self.at_any(PARAMETER_START) {
                self.error_missing("closing bracket ')'");
                self.consume_including(close);
                return;
            }
            parameters.push(self.with_bail_out(
                TokenSet::new(&[TokenKind::Comma, TokenKind::RParen]),
                |p| p.parameter(),
            ));
            if self.eat(TokenKind::Comma).is_some() {
                continue;
            }
            if self.eat(TokenKind::RParen).is_none() {
                self.error_missing("closing bracket ')'");
                self.consume_including(close);
            }
            return;
        }
    }

    /// `[annotation] [(TYPE)] value`
    pub(crate) fn parameter(&mut self) -> NodeId {
        self.node(|p| {
            let flow = p.eat(TokenKind::Annotation).and_then(|token| {
                match token.value.trim_matches(['[', ']']) {
                    "in" => Some(ParameterFlow::In),
                    "out" => Some(ParameterFlow::Out),
                    other => {
                        p.report(
                            Diagnostic::error(
                                DiagnosticCode::InvalidAnnotation,
                                format!("Unknown annotation '[{other}]', expected [in] or [out]"),
                            )
                            .with_location(token.span),
                        );
                        None
                    }
                }
            });

            let type_annotation = if p.at(TokenKind::LParen) {
                Some(p.type_annotation())
            } else {
                None
            };

            let argument = p.argument();
            NodeKind::Parameter {
                flow,
                type_annotation,
                argument,
            }
        })
    }

    fn type_annotation(&mut self) -> NodeId {
        self.node(|p| {
            p.bump();
            let name = match p.expect(TokenKind::Identifier, "type name") {
                Some(token) => token.value,
                None => SmolStr::default(),
            };
            if p.expect(TokenKind::RParen, "closing bracket ')'").is_none() {
                p.consume_including(TokenSet::new(&[TokenKind::RParen]));
            }
            NodeKind::TypeAnnotation { name }
        })
    }

    fn argument(&mut self) -> NodeId {
        let token = self.peek().clone();
        let kind = match token.kind {
            TokenKind::Identifier => {
                self.bump();
                return self.identifier(&token);
            }
            TokenKind::Guid => NodeKind::GuidLiteral {
                value: token.value.clone(),
            },
            TokenKind::Integer => match token.value.parse::<i64>() {
                Ok(value) => NodeKind::IntegerLiteral { value },
                Err(_) => {
                    self.report(
                        Diagnostic::error(
                            DiagnosticCode::UnexpectedToken,
                            format!("Integer literal '{}' is out of range", token.value),
                        )
                        .with_location(token.span),
                    );
                    NodeKind::IntegerLiteral { value: 0 }
                }
            },
            TokenKind::Real => NodeKind::RealLiteral {
                value: token.value.parse().unwrap_or_default(),
            },
            TokenKind::String => NodeKind::StringLiteral {
                value: token.value.to_string(),
            },
            _ => {
                self.error_unexpected("parameter value");
                return self.missing();
            }
        };
        self.bump();
        self.leaf(&token, kind)
    }
}
