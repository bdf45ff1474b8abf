//! # Story header grammar
//!
//! The shared header declares the system symbols, type aliases and the
//! header goals. Header goals are stored as raw INIT/KB/EXIT text blobs which
//! are turned back into goal source with [`HeaderGoal::synthesize`] and then
//! parsed with the goal grammar like any other goal. The [`HeaderSourceMap`]
//! returned alongside points offsets of that source back into the header.

use chumsky::span::SimpleSpan;
use osiris_compiler_diagnostics::Diagnostic;
use smol_str::SmolStr;

use crate::ast::{
    AliasBase, Ast, DefinitionKind, HeaderSection, NodeId, NodeKind, NodeRange, ParameterFlow,
    TypeAlias,
};
use crate::lexer::{TokenKind, TokenSet};
use crate::parser::Parser;
use crate::position::{unpack_position, LineIndex};

#[derive(Debug, Clone)]
pub struct ParsedHeader {
    pub ast: Ast,
    pub diagnostics: Vec<Diagnostic>,
    pub line_index: LineIndex,
}

/// A goal declared inside the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderGoal {
    pub id: i64,
    pub title: String,
    pub sub_goals: Vec<i64>,
    pub init: HeaderSection,
    pub kb: HeaderSection,
    pub exit: HeaderSection,
    /// The whole `Goal(..) { .. }` block in the header
    pub span: SimpleSpan<usize>,
}

impl HeaderGoal {
    /// Rebuilds goal source from the header blobs.
    pub fn synthesize(&self, parent: Option<&str>) -> (String, HeaderSourceMap) {
        let mut text = String::from("Version 1\nSubGoalCombiner SGC_AND\nINITSECTION\n");
        let mut map = HeaderSourceMap {
            lines: Vec::new(),
            fallback: self.span.start,
        };
        for (section, keyword) in [
            (&self.init, "KBSECTION"),
            (&self.kb, "EXITSECTION"),
            (&self.exit, "ENDEXITSECTION"),
        ] {
            if !section.text.is_empty() {
                let mut start = text.len();
                for (line, &origin) in section.text.split('\n').zip(&section.line_origins) {
                    map.lines.push(LineOrigin {
                        start,
                        origin,
                        len: line.len(),
                    });
                    start += line.len() + 1;
                }
                text.push_str(&section.text);
                text.push('\n');
            }
            text.push_str(keyword);
            text.push('\n');
        }
        if let Some(parent) = parent {
            text.push_str(&format!("ParentTargetEdge \"{parent}\";\n"));
        }
        (text, map)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LineOrigin {
    /// Offset in the synthesized source
    start: usize,
    /// Offset in the header
    origin: usize,
    len: usize,
}

/// Maps byte offsets of a synthesized header goal back into the header.
///
/// Offsets on a copied line map onto that line. Offsets in generated text
/// snap to the end of the closest copied line before them, or to the start of
/// the goal block when there is none.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSourceMap {
    lines: Vec<LineOrigin>,
    fallback: usize,
}

impl HeaderSourceMap {
    pub fn offset(&self, offset: usize) -> usize {
        let index = self.lines.partition_point(|line| line.start <= offset);
        match index.checked_sub(1).map(|index| self.lines[index]) {
            Some(line) => line.origin + (offset - line.start).min(line.len),
            None => self.fallback,
        }
    }

    pub fn span(&self, span: SimpleSpan<usize>) -> SimpleSpan<usize> {
        let start = self.offset(span.start);
        SimpleSpan::from(start..self.offset(span.end).max(start))
    }

    /// Moves a diagnostic of the synthesized goal onto the header.
    pub fn diagnostic(&self, diagnostic: &Diagnostic) -> Diagnostic {
        let mut mapped = diagnostic.clone();
        mapped.span = self.span(diagnostic.span);
        for (span, _) in &mut mapped.related_spans {
            *span = self.span(*span);
        }
        mapped
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredParameter {
    pub name: SmolStr,
    pub type_name: Option<SmolStr>,
    pub flow: Option<ParameterFlow>,
}

/// A `call`/`event`/`query`/`syscall`/`sysquery` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemDeclaration {
    pub name: SmolStr,
    pub kind: DefinitionKind,
    pub parameters: Vec<DeclaredParameter>,
    pub span: SimpleSpan<usize>,
}

impl SystemDeclaration {
    pub fn arity(&self) -> usize {
        self.parameters.len()
    }
}

/// Parses the shared story header.
pub fn parse_header(source: &str) -> ParsedHeader {
    let mut parser = Parser::new(source);
    let mut blobs = Vec::new();
    let root = parser.div(&mut blobs);
    let (ast, mut diagnostics, line_index) = parser.finish(root);
    // Blob contents are reported when the synthesized goal is parsed
    diagnostics.retain(|diagnostic| {
        !blobs
            .iter()
            .any(|blob: &std::ops::Range<usize>| blob.contains(&diagnostic.span.start))
    });
    ParsedHeader {
        ast,
        diagnostics,
        line_index,
    }
}

impl ParsedHeader {
    pub fn aliases(&self) -> &[TypeAlias] {
        match self.ast.kind(self.ast.root()) {
            NodeKind::Div { aliases, .. } => aliases,
            _ => &[],
        }
    }

    pub fn declarations(&self) -> Vec<SystemDeclaration> {
        let NodeKind::Div { definitions, .. } = self.ast.kind(self.ast.root()) else {
            return Vec::new();
        };
        definitions
            .iter()
            .filter_map(|&definition| {
                let NodeKind::Definition { kind, signature } = self.ast.kind(definition) else {
                    return None;
                };
                let (_, name, parameters) = self.ast.signature_parts(*signature)?;
                if name.is_empty() {
                    return None;
                }
                let parameters = parameters
                    .iter()
                    .map(|&parameter| DeclaredParameter {
                        name: self
                            .ast
                            .parameter_argument(parameter)
                            .and_then(|argument| self.ast.identifier_name(argument))
                            .map(SmolStr::new)
                            .unwrap_or_default(),
                        type_name: self.ast.parameter_type(parameter).map(SmolStr::new),
                        flow: self.ast.parameter_flow(parameter),
                    })
                    .collect();
                Some(SystemDeclaration {
                    name: SmolStr::new(name),
                    kind: *kind,
                    parameters,
                    span: self.ast.span(definition),
                })
            })
            .collect()
    }

    pub fn goals(&self) -> Vec<HeaderGoal> {
        let NodeKind::Div { goals, .. } = self.ast.kind(self.ast.root()) else {
            return Vec::new();
        };
        goals
            .iter()
            .filter_map(|&goal| match self.ast.kind(goal) {
                NodeKind::DivGoal {
                    id,
                    title,
                    sub_goals,
                    init,
                    kb,
                    exit,
                } => Some(HeaderGoal {
                    id: *id,
                    title: title.clone(),
                    sub_goals: sub_goals.clone(),
                    init: init.clone(),
                    kb: kb.clone(),
                    exit: exit.clone(),
                    span: self.ast.span(goal),
                }),
                _ => None,
            })
            .collect()
    }

    /// Every header goal as `(name, synthesized source, source map)`. The
    /// parent is the goal that lists it as a `SubGoal`.
    pub fn goal_sources(&self) -> Vec<(String, String, HeaderSourceMap)> {
        let goals = self.goals();
        goals
            .iter()
            .map(|goal| {
                let parent = goals
                    .iter()
                    .find(|candidate| candidate.sub_goals.contains(&goal.id))
                    .map(|parent| parent.title.as_str());
                let (source, map) = goal.synthesize(parent);
                (goal.title.clone(), source, map)
            })
            .collect()
    }
}

/// Strips the indentation level shared by every non-blank line of the blob at
/// `blob`, counted in leading tabs, and trims the blank lines around it.
fn dedent(source: &str, blob: std::ops::Range<usize>) -> HeaderSection {
    let raw = &source[blob.clone()];
    let leading = raw.len() - raw.trim_start_matches(['\r', '\n']).len();
    let text = raw.trim_matches(['\r', '\n']);
    let tabs = |line: &str| line.len() - line.trim_start_matches('\t').len();
    let level = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(tabs)
        .min()
        .unwrap_or(0);

    let mut lines = Vec::new();
    let mut line_origins = Vec::new();
    let mut offset = blob.start + leading;
    for line in text.split('\n') {
        let cut = tabs(line).min(level);
        line_origins.push(offset + cut);
        lines.push(&line.strip_suffix('\r').unwrap_or(line)[cut..]);
        offset += line.len() + 1;
    }
    HeaderSection {
        text: lines.join("\n").trim_end().to_string(),
        line_origins,
    }
}

impl Parser<'_> {
    pub(crate) fn div(&mut self, blobs: &mut Vec<std::ops::Range<usize>>) -> NodeId {
        self.node(|p| {
            let mut definitions = Vec::new();
            let mut goals = Vec::new();
            let mut aliases = Vec::new();
            while !p.at_end() {
                let keyword = p.peek().value.clone();
                match (p.peek_kind(0), keyword.as_str()) {
                    (TokenKind::Identifier, "alias_type") => {
                        if let Some(alias) = p.alias() {
                            aliases.push(alias);
                        }
                    }
                    (TokenKind::Identifier, "option" | "version") => p.header_option(),
                    (TokenKind::Identifier, "Goal") => goals.push(p.div_goal(blobs)),
                    (TokenKind::Identifier, word) if DefinitionKind::from_keyword(word).is_some() => {
                        definitions.push(p.definition());
                    }
                    _ => {
                        p.error_unexpected("header declaration");
                        p.bump();
                    }
                }
            }
            NodeKind::Div {
                definitions,
                goals,
                aliases,
            }
        })
    }

    /// `option x` / `version x`: the value is ignored, as is anything else on the line.
    fn header_option(&mut self) {
        let keyword = self.bump();
        let (line, _) = unpack_position(keyword.start);
        while !self.at_end() && unpack_position(self.peek().start).0 == line {
            self.bump();
        }
    }

    /// `alias_type { BASE } NAME`
    fn alias(&mut self) -> Option<TypeAlias> {
        let keyword = self.bump();
        self.expect(TokenKind::LBrace, "'{'")?;
        let base = match self.peek_kind(0) {
            TokenKind::Identifier => AliasBase::Named(self.bump().value),
            TokenKind::Integer => {
                let token = self.bump();
                AliasBase::Id(token.value.parse().unwrap_or_default())
            }
            _ => {
                self.error_unexpected("base type");
                self.consume_including(TokenSet::new(&[TokenKind::RBrace]));
                return None;
            }
        };
        self.expect(TokenKind::RBrace, "'}'")?;
        let name = self.expect(TokenKind::Identifier, "alias name")?;
        self.eat(TokenKind::Semicolon);
        let last = self.last_end();
        Some(TypeAlias {
            name: name.value,
            base,
            range: NodeRange {
                span: SimpleSpan::from(keyword.span.start..last.0),
                start: keyword.start,
                end: last.1,
            },
        })
    }

    fn definition(&mut self) -> NodeId {
        self.node(|p| {
            let keyword = p.bump();
            let kind = DefinitionKind::from_keyword(&keyword.value).unwrap_or(DefinitionKind::Call);
            let signature = p.signature();
            // Compiled headers append a numeric metadata tuple
            if p.at(TokenKind::LParen) {
                p.consume_including(TokenSet::new(&[TokenKind::RParen]));
            }
            p.eat(TokenKind::Semicolon);
            NodeKind::Definition { kind, signature }
        })
    }

    /// `Goal(id) { Title("x"); SubGoal(n); INIT{..} KB{..} EXIT{..} }`
    fn div_goal(&mut self, blobs: &mut Vec<std::ops::Range<usize>>) -> NodeId {
        let close = TokenSet::new(&[TokenKind::RBrace]);
        self.node(|p| {
            p.bump();
            let id = p.parenthesized_integer().unwrap_or_default();
            let mut title = String::new();
            let mut sub_goals = Vec::new();
            let mut sections: [HeaderSection; 3] = Default::default();

            if p.expect(TokenKind::LBrace, "'{'").is_some() {
                p.with_bail_out(close, |p| {
                    while !p.at_bail_out() {
                        let entry = p.peek().value.clone();
                        match entry.as_str() {
                            "Title" => {
                                p.bump();
                                if p.expect(TokenKind::LParen, "'('").is_some() {
                                    if let Some(value) = p.expect(TokenKind::String, "goal title") {
                                        title = value.value.to_string();
                                    }
                                    p.expect(TokenKind::RParen, "')'");
                                }
                                p.eat(TokenKind::Semicolon);
                            }
                            "SubGoal" => {
                                p.bump();
                                if let Some(sub_goal) = p.parenthesized_integer() {
                                    sub_goals.push(sub_goal);
                                }
                                p.eat(TokenKind::Semicolon);
                            }
                            "INIT" | "KB" | "EXIT" => {
                                let index = match entry.as_str() {
                                    "INIT" => 0,
                                    "KB" => 1,
                                    _ => 2,
                                };
                                p.bump();
                                if let Some(blob) = p.raw_blob() {
                                    sections[index] = dedent(p.source(), blob.clone());
                                    blobs.push(blob);
                                }
                            }
                            _ => {
                                p.error_unexpected("Title, SubGoal, INIT, KB or EXIT");
                                p.bump();
                            }
                        }
                    }
                });
                p.expect(TokenKind::RBrace, "'}'");
            }

            let [init, kb, exit] = sections;
            NodeKind::DivGoal {
                id,
                title,
                sub_goals,
                init,
                kb,
                exit,
            }
        })
    }

    fn parenthesized_integer(&mut self) -> Option<i64> {
        self.expect(TokenKind::LParen, "'('")?;
        let value = self
            .expect(TokenKind::Integer, "integer")
            .and_then(|token| token.value.parse().ok());
        if self.expect(TokenKind::RParen, "')'").is_none() {
            self.consume_including(TokenSet::new(&[TokenKind::RParen]));
        }
        value
    }

    /// `{ ... }` captured verbatim; returns the byte range between the braces.
    fn raw_blob(&mut self) -> Option<std::ops::Range<usize>> {
        let open = self.expect(TokenKind::LBrace, "'{'")?;
        while !self.at(TokenKind::RBrace) && !self.at_end() {
            self.bump();
        }
        let end = self.peek().span.start;
        self.expect(TokenKind::RBrace, "'}'");
        Some(open.span.end..end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_goal;

    const HEADER: &str = r#"option nodeletecomment
version 1.0.0.3
alias_type { GUIDSTRING } CHARACTERGUID;
alias_type { 1 } FLAG;
call Bar((INTEGER)_Value)
query CharacterGetLevel([in](CHARACTERGUID)_Character, [out](INTEGER)_Level) (1,0,42,1)
event CharacterDied((CHARACTERGUID)_Character)
Goal(1) {
	Title("Start");
	SubGoal(2);
	INIT {
		DB_Started(1);
	}
	KB {
		IF CharacterDied(_Char)
		THEN
			Bar(1);
	}
	EXIT { }
}
Goal(2) {
	Title("Child");
}
"#;

    #[test]
    fn test_parses_declarations_and_aliases() {
        let header = parse_header(HEADER);
        assert!(header.diagnostics.is_empty(), "{:?}", header.diagnostics);

        let aliases = header.aliases();
        assert_eq!(aliases.len(), 2);
        assert_eq!(aliases[0].base, AliasBase::Named("GUIDSTRING".into()));
        assert_eq!(aliases[1].base, AliasBase::Id(1));

        let declarations = header.declarations();
        let names: Vec<_> = declarations.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Bar", "CharacterGetLevel", "CharacterDied"]);
        assert_eq!(declarations[1].kind, DefinitionKind::Query);
        assert_eq!(declarations[1].parameters[1].flow, Some(ParameterFlow::Out));
        assert_eq!(
            declarations[1].parameters[0].type_name.as_deref(),
            Some("CHARACTERGUID")
        );
    }

    #[test]
    fn test_header_goals_round_trip_through_goal_grammar() {
        let header = parse_header(HEADER);
        let sources = header.goal_sources();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].0, "Start");
        assert!(sources[1].1.contains("ParentTargetEdge \"Start\";"));

        let start = parse_goal(&sources[0].1);
        let kb_line = sources[0].1.find("IF CharacterDied").unwrap();
        let header_line = HEADER.find("IF CharacterDied").unwrap();
        assert_eq!(sources[0].2.offset(kb_line), header_line);
        assert_eq!(sources[0].2.offset(kb_line + 3), header_line + 3);
        assert!(start.diagnostics.is_empty(), "{:?}", start.diagnostics);
        assert_eq!(start.ast.rules().len(), 1);
        assert!(sources[0].1.contains("\nIF CharacterDied(_Char)\nTHEN\n\tBar(1);\n"));
    }

    #[test]
    fn test_dedent_keeps_relative_indentation() {
        let source = "\n\t\tA\n\tB\n";
        let section = dedent(source, 0..source.len());
        assert_eq!(section.text, "\tA\nB");
        assert_eq!(section.line_origins, vec![2, 6]);
    }

    #[test]
    fn test_blob_errors_map_back_into_the_header() {
        let header = "call Bar((INTEGER)_Value);\nGoal(1) {\n\tTitle(\"Broken\");\n\tKB {\n\t\tPROC Foo( THEN Bar(1);\n\t}\n}\n";
        let parsed = parse_header(header);
        assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);

        let (_, source, map) = parsed.goal_sources().remove(0);
        let goal = parse_goal(&source);
        assert!(!goal.diagnostics.is_empty());
        let blob = header.find("PROC Foo(").unwrap();
        let blob_end = blob + "PROC Foo( THEN Bar(1);".len();
        for diagnostic in &goal.diagnostics {
            let span = map.diagnostic(diagnostic).span;
            assert!(
                (blob..=blob_end).contains(&span.start),
                "{span:?} outside {blob}..{blob_end}"
            );
        }
        assert_eq!(map.offset(0), header.find("Goal(1)").unwrap());
    }
}
