//! `ParentTargetEdge` options must name a goal of the story.

use osiris_compiler_diagnostics::{Diagnostic, DiagnosticCode};

use super::{Analyzer, AnalyzerContext};

pub struct ParentGoalAnalyzer;

impl Analyzer for ParentGoalAnalyzer {
    fn analyze(&self, context: &AnalyzerContext<'_>) -> Vec<Diagnostic> {
        context
            .goal
            .ast()
            .parent_edges()
            .filter(|(parent, _)| !context.goals.contains_key(*parent))
            .map(|(parent, range)| {
                Diagnostic::error(
                    DiagnosticCode::UnresolvedParentGoal,
                    format!("Parent goal '{parent}' does not exist"),
                )
                .with_location(range.span)
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "ParentGoalAnalyzer"
    }
}
