//! # Call kinds
//!
//! Each position in a rule accepts only some kinds of symbols:
//!
//! | position      | accepted                          |
//! |---------------|-----------------------------------|
//! | `IF` head     | header events, databases          |
//! | `PROC` head   | calls                             |
//! | `QRY` head    | queries                           |
//! | condition     | queries, databases                |
//! | action        | calls, databases (`NOT` only DBs) |

use osiris_compiler_diagnostics::{Diagnostic, DiagnosticCode};
use osiris_compiler_parser::ast::{CallerRole, RuleKind};

use super::{Analyzer, AnalyzerContext};
use crate::symbols::SymbolKind;

pub struct CallerKindAnalyzer;

impl Analyzer for CallerKindAnalyzer {
    fn analyze(&self, context: &AnalyzerContext<'_>) -> Vec<Diagnostic> {
        let ast = context.goal.ast();
        let mut diagnostics = Vec::new();

        ast.each_caller(|caller| {
            let Some(symbol) = context.symbol(&caller) else {
                return;
            };
            let kind = symbol.kind();
            let key = symbol.key();
            let span = ast.span(caller.signature);
            let error = |code: DiagnosticCode, message: String| {
                Diagnostic::error(code, message).with_location(span)
            };

            let diagnostic = match (caller.role, kind) {
                (_, SymbolKind::Unknown) => None,
                (CallerRole::RuleHead(RuleKind::If), SymbolKind::Event) if !symbol.is_system() => {
                    let mut message = format!("Event '{key}' is not declared in the story header");
                    if let Some(suggestion) = context.symbols.suggest(key) {
                        message.push_str(&format!("; did you mean '{suggestion}'?"));
                    }
                    Some(error(DiagnosticCode::UndeclaredEvent, message))
                }
                (CallerRole::RuleHead(RuleKind::If), SymbolKind::Event | SymbolKind::Database) => {
                    None
                }
                (CallerRole::RuleHead(RuleKind::If), other) => Some(error(
                    DiagnosticCode::InvalidRuleHead,
                    format!("IF rules must start with an event or a database, '{key}' is a {other}"),
                )),
                (CallerRole::RuleHead(RuleKind::Proc), SymbolKind::Call) => None,
                (CallerRole::RuleHead(RuleKind::Proc), other) => Some(error(
                    DiagnosticCode::InvalidRuleHead,
                    format!("PROC rules can only define calls, '{key}' is a {other}"),
                )),
                (CallerRole::RuleHead(RuleKind::Query), SymbolKind::Query) => None,
                (CallerRole::RuleHead(RuleKind::Query), other) => Some(error(
                    DiagnosticCode::InvalidRuleHead,
                    format!("QRY rules can only define queries, '{key}' is a {other}"),
                )),
                (CallerRole::Condition, SymbolKind::Query | SymbolKind::Database) => None,
                (CallerRole::Condition, other) => Some(error(
                    DiagnosticCode::MisplacedCall,
                    format!("'{key}' is a {other} and cannot be used as a condition"),
                )),
                (_, SymbolKind::Database) => None,
                (_, SymbolKind::Call) if caller.is_inverted => Some(error(
                    DiagnosticCode::MisplacedCall,
                    format!("Only databases can be deleted with NOT, '{key}' is a call"),
                )),
                (_, SymbolKind::Call) => None,
                (_, other) => Some(error(
                    DiagnosticCode::MisplacedCall,
                    format!("'{key}' is a {other} and cannot be used as an action"),
                )),
            };
            diagnostics.extend(diagnostic);
        });

        diagnostics
    }

    fn name(&self) -> &'static str {
        "CallerKindAnalyzer"
    }
}
