//! # Unresolved symbols and unused databases
//!
//! - a call to a symbol nothing defines is unresolved, with a "did you mean"
//!   hint when a close match exists
//! - a symbol whose definitions claim different kinds is ambiguous
//! - a database nobody reads is reported at its writes, one nobody writes at
//!   its reads, unless the database is on the orphan allow list

use osiris_compiler_diagnostics::{Diagnostic, DiagnosticCode};
use osiris_compiler_parser::ast::{CallerRole, RuleKind};

use super::{Analyzer, AnalyzerContext};
use crate::symbols::{Symbol, SymbolKind};

pub struct UnresolvedSymbolAnalyzer;

impl UnresolvedSymbolAnalyzer {
    fn unresolved(context: &AnalyzerContext<'_>, symbol: &Symbol, diagnostic: Diagnostic) -> Diagnostic {
        let mut diagnostic = diagnostic;
        if symbol.has_kind_conflict() {
            let mut kinds: Vec<String> = symbol
                .definitions()
                .iter()
                .map(|d| d.kind.to_string())
                .collect();
            kinds.sort();
            kinds.dedup();
            diagnostic.message = format!(
                "Symbol '{}' is used as more than one kind: {}",
                symbol.key(),
                kinds.join(", ")
            );
        } else if let Some(suggestion) = context.symbols.suggest(symbol.key()) {
            diagnostic.message.push_str(&format!("; did you mean '{suggestion}'?"));
        }
        diagnostic
    }
}

impl Analyzer for UnresolvedSymbolAnalyzer {
    fn analyze(&self, context: &AnalyzerContext<'_>) -> Vec<Diagnostic> {
        let ast = context.goal.ast();
        let mut diagnostics = Vec::new();

        ast.each_caller(|caller| {
            let Some(symbol) = context.symbol(&caller) else {
                return;
            };
            let span = ast.span(caller.signature);

            if symbol.kind() == SymbolKind::Unknown {
                let diagnostic = Diagnostic::unresolved_symbol(symbol.name(), symbol.arity(), span);
                diagnostics.push(Self::unresolved(context, symbol, diagnostic));
                return;
            }
            if !symbol.is_database() || context.environment.orphans.contains(symbol.key()) {
                return;
            }

            let is_write = caller.role.is_action() && !caller.is_inverted;
            let is_read = matches!(
                caller.role,
                CallerRole::Condition | CallerRole::RuleHead(RuleKind::If)
            );
            if is_write && symbol.db_reads().is_empty() {
                diagnostics.push(
                    Diagnostic::warning(
                        DiagnosticCode::DatabaseNeverRead,
                        format!("Database '{}' is never used in a rule", symbol.key()),
                    )
                    .with_location(span),
                );
            } else if is_read && symbol.db_writes().is_empty() {
                diagnostics.push(
                    Diagnostic::warning(
                        DiagnosticCode::DatabaseNeverWritten,
                        format!(
                            "Database '{}' is never written, this rule can never match",
                            symbol.key()
                        ),
                    )
                    .with_location(span),
                );
            }
        });

        diagnostics
    }

    fn name(&self) -> &'static str {
        "UnresolvedSymbolAnalyzer"
    }
}
