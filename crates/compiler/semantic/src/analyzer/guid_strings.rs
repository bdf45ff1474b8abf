//! String constants passed to GUID parameters must look like `Name_GUID`.

use osiris_compiler_diagnostics::{Diagnostic, DiagnosticCode};
use osiris_compiler_parser::ast::NodeKind;
use osiris_compiler_parser::guid::is_guid_string;

use super::{Analyzer, AnalyzerContext};
use crate::symbols::SymbolKind;

pub struct GuidStringAnalyzer;

impl Analyzer for GuidStringAnalyzer {
    fn analyze(&self, context: &AnalyzerContext<'_>) -> Vec<Diagnostic> {
        let ast = context.goal.ast();
        let mut diagnostics = Vec::new();

        ast.each_caller(|caller| {
            let Some(symbol) = context.symbol(&caller) else {
                return;
            };
            if symbol.kind() == SymbolKind::Unknown {
                return;
            }
            for (parameter, &node) in symbol.parameters().iter().zip(caller.parameters) {
                if !context.types.is_guid(&parameter.ty) {
                    continue;
                }
                let Some(argument) = ast.parameter_argument(node) else {
                    continue;
                };
                if let NodeKind::StringLiteral { value } = ast.kind(argument) {
                    if !is_guid_string(value) {
                        diagnostics.push(
                            Diagnostic::error(
                                DiagnosticCode::InvalidGuidString,
                                format!(
                                    "\"{value}\" is not a valid GUID string, expected NAME_xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx"
                                ),
                            )
                            .with_location(ast.span(argument)),
                        );
                    }
                }
            }
        });

        diagnostics
    }

    fn name(&self) -> &'static str {
        "GuidStringAnalyzer"
    }
}
