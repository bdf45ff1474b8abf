use logos::{Lexer, Logos};

use crate::guid::{guid_prefix_len, GUID_LEN};

/// Shape of a string literal as seen by the raw tokenizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StringShape {
    Terminated,
    /// Terminated, but a raw line break appears before the closing quote.
    LineBreak,
    /// No closing quote before the end of the line.
    Unterminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WordShape {
    Identifier,
    Guid,
}

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub(crate) enum RawToken {
    // Trivia, captured by the lexer but never handed to the parser
    #[regex(r"//[^\r\n]*")]
    LineComment,
    #[token("/*", block_comment)]
    BlockComment(bool),

    // Literals
    #[token("\"", string_literal)]
    String(StringShape),
    #[regex(r"-?[0-9]+", number_or_guid)]
    Integer(WordShape),
    #[regex(r"-?[0-9]+\.[0-9]+")]
    Real,
    #[regex(r"-?[0-9]+\.")]
    UnterminatedReal,
    #[regex(r"\[[A-Za-z]*\]")]
    Annotation,

    // Keywords
    #[token("AND")]
    And,
    #[token("NOT")]
    Not,
    #[token("THEN")]
    Then,
    #[token("IF")]
    If,
    #[token("PROC")]
    Proc,
    #[token("QRY")]
    Qry,
    #[token("INITSECTION")]
    InitSection,
    #[token("KBSECTION")]
    KbSection,
    #[token("EXITSECTION")]
    ExitSection,
    #[token("ENDEXITSECTION")]
    EndExitSection,
    #[token("GoalCompleted")]
    GoalCompleted,

    // Identifiers (must come after keywords)
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", identifier_or_guid)]
    Word(WordShape),

    // Operators
    #[token("==")]
    EqEq,
    #[token("!=")]
    Neq,
    #[token("<")]
    Less,
    #[token("<=")]
    LessEqual,
    #[token(">")]
    Greater,
    #[token(">=")]
    GreaterEqual,

    // Punctuation
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(".")]
    Dot,
}

fn block_comment(lex: &mut Lexer<RawToken>) -> bool {
    match lex.remainder().find("*/") {
        Some(end) => {
            lex.bump(end + 2);
            true
        }
        None => {
            lex.bump(lex.remainder().len());
            false
        }
    }
}

fn string_literal(lex: &mut Lexer<RawToken>) -> StringShape {
    let rest = lex.remainder();
    let mut escaped = false;
    let mut line_break = false;
    for (index, c) in rest.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '\r' | '\n' => line_break = true,
            '"' => {
                lex.bump(index + 1);
                return if line_break {
                    StringShape::LineBreak
                } else {
                    StringShape::Terminated
                };
            }
            _ => {}
        }
    }
    // Never swallow the rest of the file for a missing quote
    let line_end = rest.find(['\r', '\n']).unwrap_or(rest.len());
    lex.bump(line_end);
    StringShape::Unterminated
}

/// A GUID may start with digits, in which case the number pattern wins the
/// first few characters; extend the token over the whole GUID.
fn number_or_guid(lex: &mut Lexer<RawToken>) -> WordShape {
    let slice = lex.slice();
    if slice.starts_with('-') || slice.len() > 8 {
        return WordShape::Identifier;
    }
    match guid_prefix_len(&lex.source()[lex.span().start..]) {
        Some(len) => {
            lex.bump(len - slice.len());
            WordShape::Guid
        }
        None => WordShape::Identifier,
    }
}

/// `Name_1c3c9c74-...` and `1c3c9c74-...` where the first GUID group was
/// consumed by the identifier pattern.
fn identifier_or_guid(lex: &mut Lexer<RawToken>) -> WordShape {
    let word = lex.slice();
    if word.len() < 8 {
        return WordShape::Identifier;
    }
    let head = word.len() - 8;
    if head > 0 && !word[..head].ends_with('_') {
        return WordShape::Identifier;
    }
    match guid_prefix_len(&lex.source()[lex.span().start + head..]) {
        Some(len) => {
            debug_assert_eq!(len, GUID_LEN);
            lex.bump(len - 8);
            WordShape::Guid
        }
        None => WordShape::Identifier,
    }
}
