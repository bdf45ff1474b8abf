//! # Diagnostic System for Osiris Goals
//!
//! This module provides the diagnostic infrastructure shared by the lexer, the
//! parser and the semantic analyzers. Every problem found in a goal is reported
//! as a [`Diagnostic`] value; nothing in the front end aborts on bad input.

use ariadne::ReportKind;
use chumsky::span::SimpleSpan;
use std::fmt;

/// A diagnostic message attached to a byte range of a goal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub code: DiagnosticCode,
    pub message: String,
    /// Name (or uri) of the goal this diagnostic belongs to
    pub file_path: String,
    /// Source span where this diagnostic applies
    pub span: SimpleSpan<usize>,
    /// Optional related spans for additional context
    pub related_spans: Vec<(SimpleSpan<usize>, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Info,
    Hint,
}

impl From<ReportKind<'static>> for DiagnosticSeverity {
    fn from(kind: ReportKind<'static>) -> Self {
        match kind {
            ReportKind::Error => Self::Error,
            ReportKind::Warning => Self::Warning,
            ReportKind::Advice => Self::Info,
            ReportKind::Custom(_, _) => Self::Info,
        }
    }
}

impl From<DiagnosticSeverity> for ReportKind<'static> {
    fn from(severity: DiagnosticSeverity) -> Self {
        match severity {
            DiagnosticSeverity::Error => ReportKind::Error,
            DiagnosticSeverity::Warning => ReportKind::Warning,
            DiagnosticSeverity::Info => ReportKind::Advice,
            DiagnosticSeverity::Hint => ReportKind::Advice,
        }
    }
}

impl fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
            Self::Hint => write!(f, "hint"),
        }
    }
}

/// The stage of the pipeline that produced a diagnostic.
///
/// Goals keep one diagnostic list per phase so a later phase never clobbers
/// the results of an earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticPhase {
    Syntax,
    Analyzer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCode {
    // Lexical errors (1-99)
    UnterminatedFloat,
    UnterminatedString,
    LineBreakInString,
    UnterminatedComment,

    // Syntax errors (100-999)
    UnexpectedToken,
    MissingToken,
    UnexpectedEndOfFile,
    InvalidOption,
    EmptyActionBlock,
    InvalidAnnotation,

    // Resolution errors (1000-1999)
    UnresolvedSymbol,
    DatabaseNeverWritten,
    DatabaseNeverRead,
    UndeclaredEvent,

    // Call kind errors (2000-2999)
    MisplacedCall,
    InvalidRuleHead,

    // Parameter errors (3000-3999)
    TypeMismatch,
    UnknownType,
    UnboundVariable,
    InvalidFlow,
    InvalidEnumMember,
    InvalidPlaceholder,

    // GUID errors (4000-4999)
    InvalidGuidString,
    UnknownInstance,
    InstanceKindMismatch,
    InstanceNameMismatch,

    // Goal tree errors (5000-5999)
    UnresolvedParentGoal,
}

impl From<DiagnosticCode> for u32 {
    fn from(code: DiagnosticCode) -> Self {
        match code {
            DiagnosticCode::UnterminatedFloat => 1,
            DiagnosticCode::UnterminatedString => 2,
            DiagnosticCode::LineBreakInString => 3,
            DiagnosticCode::UnterminatedComment => 4,
            DiagnosticCode::UnexpectedToken => 101,
            DiagnosticCode::MissingToken => 102,
            DiagnosticCode::UnexpectedEndOfFile => 103,
            DiagnosticCode::InvalidOption => 104,
            DiagnosticCode::EmptyActionBlock => 105,
            DiagnosticCode::InvalidAnnotation => 106,
            DiagnosticCode::UnresolvedSymbol => 1001,
            DiagnosticCode::DatabaseNeverWritten => 1002,
            DiagnosticCode::DatabaseNeverRead => 1003,
            DiagnosticCode::UndeclaredEvent => 1004,
            DiagnosticCode::MisplacedCall => 2001,
            DiagnosticCode::InvalidRuleHead => 2002,
            DiagnosticCode::TypeMismatch => 3001,
            DiagnosticCode::UnknownType => 3002,
            DiagnosticCode::UnboundVariable => 3003,
            DiagnosticCode::InvalidFlow => 3004,
            DiagnosticCode::InvalidEnumMember => 3005,
            DiagnosticCode::InvalidPlaceholder => 3006,
            DiagnosticCode::InvalidGuidString => 4001,
            DiagnosticCode::UnknownInstance => 4002,
            DiagnosticCode::InstanceKindMismatch => 4003,
            DiagnosticCode::InstanceNameMismatch => 4004,
            DiagnosticCode::UnresolvedParentGoal => 5001,
        }
    }
}

impl Diagnostic {
    fn new(severity: DiagnosticSeverity, code: DiagnosticCode, message: String) -> Self {
        Self {
            severity,
            code,
            message,
            file_path: String::new(),
            span: SimpleSpan::from(0..0),
            related_spans: Vec::new(),
        }
    }

    /// Create an error diagnostic
    pub fn error(code: DiagnosticCode, message: String) -> Self {
        Self::new(DiagnosticSeverity::Error, code, message)
    }

    /// Create a warning diagnostic
    pub fn warning(code: DiagnosticCode, message: String) -> Self {
        Self::new(DiagnosticSeverity::Warning, code, message)
    }

    /// Create an info diagnostic
    pub fn info(code: DiagnosticCode, message: String) -> Self {
        Self::new(DiagnosticSeverity::Info, code, message)
    }

    /// Add location information to this diagnostic
    pub const fn with_location(mut self, span: SimpleSpan<usize>) -> Self {
        self.span = span;
        self
    }

    /// Attach the goal this diagnostic was produced for
    pub fn with_file(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = file_path.into();
        self
    }

    /// Add a related span with context message
    pub fn with_related_span(mut self, span: SimpleSpan<usize>, message: String) -> Self {
        self.related_spans.push((span, message));
        self
    }

    /// Convenience method for unexpected token errors
    pub fn unexpected_token(expected: &str, found: &str, span: SimpleSpan<usize>) -> Self {
        Self::error(
            DiagnosticCode::UnexpectedToken,
            format!("Expected {expected}, found {found}"),
        )
        .with_location(span)
    }

    /// Convenience method for a token the grammar requires but which is absent
    pub fn missing_token(expected: &str, span: SimpleSpan<usize>) -> Self {
        Self::error(DiagnosticCode::MissingToken, format!("Expected {expected}"))
            .with_location(span)
    }

    /// Convenience method for unresolved symbol errors
    pub fn unresolved_symbol(name: &str, arity: usize, span: SimpleSpan<usize>) -> Self {
        Self::error(
            DiagnosticCode::UnresolvedSymbol,
            format!("Unresolved symbol '{name}/{arity}'"),
        )
        .with_location(span)
    }

    /// Convenience method for parameter type mismatches
    pub fn type_mismatch(
        symbol: &str,
        index: usize,
        expected: &str,
        found: &str,
        span: SimpleSpan<usize>,
    ) -> Self {
        Self::error(
            DiagnosticCode::TypeMismatch,
            format!(
                "Parameter {} of '{symbol}' expects {expected}, found {found}",
                index + 1
            ),
        )
        .with_location(span)
    }

    /// Convenience method for variables used before anything binds them
    pub fn unbound_variable(name: &str, span: SimpleSpan<usize>) -> Self {
        Self::error(
            DiagnosticCode::UnboundVariable,
            format!("Variable '{name}' is not bound here"),
        )
        .with_location(span)
    }

    pub const fn is_error(&self) -> bool {
        matches!(self.severity, DiagnosticSeverity::Error)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)?;
        write!(f, " (at {}:{})", self.span.start, self.span.end)?;
        for (span, message) in &self.related_spans {
            write!(f, "\n  note: {} (at {}:{})", message, span.start, span.end)?;
        }
        Ok(())
    }
}

/// Collection of diagnostics from one phase of one goal
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DiagnosticCollection {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a diagnostic to the collection
    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Add multiple diagnostics
    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.extend(diagnostics);
    }

    pub fn all(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Get only error diagnostics
    pub fn errors(&self) -> Vec<&Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == DiagnosticSeverity::Error)
            .collect()
    }

    /// Get only warning diagnostics
    pub fn warnings(&self) -> Vec<&Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == DiagnosticSeverity::Warning)
            .collect()
    }

    /// Check if there are any errors
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == DiagnosticSeverity::Error)
    }

    /// Get the total number of diagnostics
    pub const fn len(&self) -> usize {
        self.diagnostics.len()
    }

    /// Check if the collection is empty
    pub const fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Sort diagnostics by position, then severity, then message.
    ///
    /// The order is total so repeated analysis of the same input yields the
    /// same list.
    pub fn sort(&mut self) {
        self.diagnostics.sort_by(|a, b| {
            a.span
                .start
                .cmp(&b.span.start)
                .then(a.span.end.cmp(&b.span.end))
                .then(a.severity.cmp(&b.severity))
                .then(u32::from(a.code).cmp(&u32::from(b.code)))
                .then(a.message.cmp(&b.message))
        });
    }

    /// Get summary statistics
    pub fn summary(&self) -> String {
        let errors = self.errors().len();
        let warnings = self.warnings().len();
        let total = self.diagnostics.len();

        if total == 0 {
            "No issues found".to_string()
        } else {
            format!("{errors} errors, {warnings} warnings")
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.diagnostics.iter()
    }
}

impl From<Vec<Diagnostic>> for DiagnosticCollection {
    fn from(diagnostics: Vec<Diagnostic>) -> Self {
        Self { diagnostics }
    }
}

impl IntoIterator for DiagnosticCollection {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.diagnostics.into_iter()
    }
}

impl<'a> IntoIterator for &'a DiagnosticCollection {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.diagnostics.iter()
    }
}
