//! # Token stream
//!
//! Wraps the logos tokenizer with a small lookahead ring buffer, comment and
//! region capture, packed positions and lexical diagnostics.
//!
//! Comments never reach the parser. The most recent doc comment is attached to
//! the next real token, and `//REGION name` / `//END_REGION` toggle the region
//! carried by every token lexed while it is open.

use chumsky::span::SimpleSpan;
use logos::Logos;
use osiris_compiler_diagnostics::{Diagnostic, DiagnosticCode};
use smol_str::SmolStr;

use crate::position::{LineIndex, PackedPosition};
use crate::tokens::{RawToken, StringShape, WordShape};

const BUFFER_SIZE: usize = 5;

/// Deepest lookahead supported by [`Lexer::peek`].
pub const MAX_PEEK: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Identifier,
    Guid,
    Integer,
    Real,
    String,
    Annotation,
    // Keywords
    And,
    Not,
    Then,
    If,
    Proc,
    Qry,
    InitSection,
    KbSection,
    ExitSection,
    EndExitSection,
    GoalCompleted,
    // Operators
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    // Punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Semicolon,
    Dot,
    Invalid,
    #[default]
    EndOfFile,
}

impl TokenKind {
    /// Human readable name used in diagnostics.
    pub const fn describe(self) -> &'static str {
        match self {
            Self::Identifier => "identifier",
            Self::Guid => "GUID",
            Self::Integer => "integer",
            Self::Real => "real",
            Self::String => "string",
            Self::Annotation => "annotation",
            Self::And => "'AND'",
            Self::Not => "'NOT'",
            Self::Then => "'THEN'",
            Self::If => "'IF'",
            Self::Proc => "'PROC'",
            Self::Qry => "'QRY'",
            Self::InitSection => "'INITSECTION'",
            Self::KbSection => "'KBSECTION'",
            Self::ExitSection => "'EXITSECTION'",
            Self::EndExitSection => "'ENDEXITSECTION'",
            Self::GoalCompleted => "'GoalCompleted'",
            Self::Equal => "'=='",
            Self::NotEqual => "'!='",
            Self::Less => "'<'",
            Self::LessEqual => "'<='",
            Self::Greater => "'>'",
            Self::GreaterEqual => "'>='",
            Self::LParen => "'('",
            Self::RParen => "')'",
            Self::LBrace => "'{'",
            Self::RBrace => "'}'",
            Self::Comma => "','",
            Self::Semicolon => "';'",
            Self::Dot => "'.'",
            Self::Invalid => "invalid character",
            Self::EndOfFile => "end of file",
        }
    }

    pub const fn is_operator(self) -> bool {
        matches!(
            self,
            Self::Equal
                | Self::NotEqual
                | Self::Less
                | Self::LessEqual
                | Self::Greater
                | Self::GreaterEqual
        )
    }

    const fn bit(self) -> u64 {
        1 << (self as u8)
    }
}

/// A set of token kinds, used for recovery boundaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenSet(u64);

impl TokenSet {
    pub const EMPTY: Self = Self(0);

    pub const fn new(kinds: &[TokenKind]) -> Self {
        let mut bits = 0;
        let mut index = 0;
        while index < kinds.len() {
            bits |= kinds[index].bit();
            index += 1;
        }
        Self(bits)
    }

    pub const fn contains(self, kind: TokenKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text of the token; string literals exclude their quotes
    pub value: SmolStr,
    /// Doc comment immediately preceding this token
    pub comment: Option<String>,
    /// Region opened by `//REGION` that this token belongs to
    pub region: Option<SmolStr>,
    pub span: SimpleSpan<usize>,
    pub start: PackedPosition,
    pub end: PackedPosition,
}

impl Default for Token {
    fn default() -> Self {
        Self {
            kind: TokenKind::EndOfFile,
            value: SmolStr::default(),
            comment: None,
            region: None,
            span: SimpleSpan::from(0..0),
            start: 0,
            end: 0,
        }
    }
}

impl Token {
    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}

pub struct Lexer<'src> {
    source: &'src str,
    raw: logos::Lexer<'src, RawToken>,
    line_index: LineIndex,
    buffer: [Token; BUFFER_SIZE],
    head: usize,
    len: usize,
    last: Token,
    comment: Option<String>,
    region: Option<SmolStr>,
    diagnostics: Vec<Diagnostic>,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            raw: RawToken::lexer(source),
            line_index: LineIndex::new(source),
            buffer: Default::default(),
            head: 0,
            len: 0,
            last: Token::default(),
            comment: None,
            region: None,
            diagnostics: Vec::new(),
        }
    }

    /// Lexes `source` completely, including the trailing end-of-file token.
    pub fn tokenize(source: &'src str) -> (Vec<Token>, Vec<Diagnostic>) {
        let mut lexer = Self::new(source);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next();
            let done = token.is(TokenKind::EndOfFile);
            tokens.push(token);
            if done {
                break;
            }
        }
        (tokens, lexer.diagnostics)
    }

    pub const fn source(&self) -> &'src str {
        self.source
    }

    pub const fn line_index(&self) -> &LineIndex {
        &self.line_index
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_parts(self) -> (LineIndex, Vec<Diagnostic>) {
        (self.line_index, self.diagnostics)
    }

    /// Consumes and returns the next token. Past the end of the input this
    /// keeps returning end-of-file tokens.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Token {
        if self.len == 0 {
            self.fill();
        }
        let token = std::mem::take(&mut self.buffer[self.head]);
        self.head = (self.head + 1) % BUFFER_SIZE;
        self.len -= 1;
        self.last = token.clone();
        token
    }

    /// Returns the token `k` positions ahead without consuming anything.
    /// `k` is clamped to [`MAX_PEEK`].
    pub fn peek(&mut self, k: usize) -> &Token {
        let k = k.min(MAX_PEEK);
        while self.len <= k {
            self.fill();
        }
        &self.buffer[(self.head + k) % BUFFER_SIZE]
    }

    /// The most recently consumed token.
    pub const fn last(&self) -> &Token {
        &self.last
    }

    fn fill(&mut self) {
        let token = self.lex();
        let slot = (self.head + self.len) % BUFFER_SIZE;
        self.buffer[slot] = token;
        self.len += 1;
    }

    fn lex(&mut self) -> Token {
        loop {
            let Some(result) = self.raw.next() else {
                let end = self.source.len();
                return self.token(TokenKind::EndOfFile, end..end, SmolStr::default());
            };
            let mut range = self.raw.span();
            if !self.source.is_char_boundary(range.end) {
                let mut end = range.end;
                while !self.source.is_char_boundary(end) {
                    end += 1;
                }
                self.raw.bump(end - range.end);
                range.end = end;
            }
            let source = self.source;
            let slice = &source[range.clone()];

            let kind = match result {
                Err(()) => TokenKind::Invalid,
                Ok(RawToken::LineComment) => {
                    self.line_comment(slice);
                    continue;
                }
                Ok(RawToken::BlockComment(terminated)) => {
                    if !terminated {
                        self.report(
                            DiagnosticCode::UnterminatedComment,
                            "Unterminated block comment",
                            &range,
                        );
                    }
                    let body = slice.trim_start_matches("/*").trim_end_matches("*/");
                    self.comment = Some(body.trim().to_string());
                    continue;
                }
                Ok(RawToken::String(shape)) => {
                    let body = match shape {
                        StringShape::Terminated => &slice[1..slice.len() - 1],
                        StringShape::LineBreak => {
                            self.report(
                                DiagnosticCode::LineBreakInString,
                                "String literal contains a line break",
                                &range,
                            );
                            &slice[1..slice.len() - 1]
                        }
                        StringShape::Unterminated => {
                            self.report(
                                DiagnosticCode::UnterminatedString,
                                "Unterminated string literal",
                                &range,
                            );
                            &slice[1..]
                        }
                    };
                    return self.token(TokenKind::String, range, SmolStr::new(body));
                }
                Ok(RawToken::UnterminatedReal) => {
                    self.report(
                        DiagnosticCode::UnterminatedFloat,
                        "Expected digits after the decimal point",
                        &range,
                    );
                    TokenKind::Real
                }
                Ok(RawToken::Integer(WordShape::Guid) | RawToken::Word(WordShape::Guid)) => {
                    TokenKind::Guid
                }
                Ok(RawToken::Integer(WordShape::Identifier)) => TokenKind::Integer,
                Ok(RawToken::Word(WordShape::Identifier)) => TokenKind::Identifier,
                Ok(RawToken::Real) => TokenKind::Real,
                Ok(RawToken::Annotation) => TokenKind::Annotation,
                Ok(RawToken::And) => TokenKind::And,
                Ok(RawToken::Not) => TokenKind::Not,
                Ok(RawToken::Then) => TokenKind::Then,
                Ok(RawToken::If) => TokenKind::If,
                Ok(RawToken::Proc) => TokenKind::Proc,
                Ok(RawToken::Qry) => TokenKind::Qry,
                Ok(RawToken::InitSection) => TokenKind::InitSection,
                Ok(RawToken::KbSection) => TokenKind::KbSection,
                Ok(RawToken::ExitSection) => TokenKind::ExitSection,
                Ok(RawToken::EndExitSection) => TokenKind::EndExitSection,
                Ok(RawToken::GoalCompleted) => TokenKind::GoalCompleted,
                Ok(RawToken::EqEq) => TokenKind::Equal,
                Ok(RawToken::Neq) => TokenKind::NotEqual,
                Ok(RawToken::Less) => TokenKind::Less,
                Ok(RawToken::LessEqual) => TokenKind::LessEqual,
                Ok(RawToken::Greater) => TokenKind::Greater,
                Ok(RawToken::GreaterEqual) => TokenKind::GreaterEqual,
                Ok(RawToken::LParen) => TokenKind::LParen,
                Ok(RawToken::RParen) => TokenKind::RParen,
                Ok(RawToken::LBrace) => TokenKind::LBrace,
                Ok(RawToken::RBrace) => TokenKind::RBrace,
                Ok(RawToken::Comma) => TokenKind::Comma,
                Ok(RawToken::Semicolon) => TokenKind::Semicolon,
                Ok(RawToken::Dot) => TokenKind::Dot,
            };
            return self.token(kind, range, SmolStr::new(slice));
        }
    }

    fn line_comment(&mut self, slice: &str) {
        if let Some(name) = slice.strip_prefix("//REGION") {
            self.region = Some(SmolStr::new(name.trim()));
        } else if slice.starts_with("//END_REGION") {
            self.region = None;
        } else {
            let text = slice.trim_start_matches('/').trim();
            match &mut self.comment {
                Some(comment) => {
                    comment.push('\n');
                    comment.push_str(text);
                }
                None => self.comment = Some(text.to_string()),
            }
        }
    }

    fn token(&mut self, kind: TokenKind, range: std::ops::Range<usize>, value: SmolStr) -> Token {
        Token {
            kind,
            value,
            comment: self.comment.take(),
            region: self.region.clone(),
            start: self.line_index.position(self.source, range.start),
            end: self.line_index.position(self.source, range.end),
            span: SimpleSpan::from(range),
        }
    }

    fn report(&mut self, code: DiagnosticCode, message: &str, range: &std::ops::Range<usize>) {
        self.diagnostics.push(
            Diagnostic::error(code, message.to_string())
                .with_location(SimpleSpan::from(range.clone())),
        );
    }
}
