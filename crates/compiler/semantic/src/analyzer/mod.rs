//! # Analyzer pipeline
//!
//! After symbols are resolved, each goal is checked by a fixed, ordered list
//! of passes. Every pass looks at one concern and only reports diagnostics;
//! none of them mutates the story.
//!
//! The set of passes is closed: [`Pass`] enumerates them and dispatches to
//! the [`Analyzer`] implementations. [`AnalyzerPipeline`] runs a list of
//! analyzers and collects what they report.

mod caller_kinds;
mod guid_strings;
mod parameters;
mod parent_goals;
mod unresolved;

pub use caller_kinds::CallerKindAnalyzer;
pub use guid_strings::GuidStringAnalyzer;
pub use parameters::ParameterAnalyzer;
pub use parent_goals::ParentGoalAnalyzer;
pub use unresolved::UnresolvedSymbolAnalyzer;

use indexmap::IndexMap;
use osiris_compiler_diagnostics::{Diagnostic, DiagnosticCollection};
use osiris_compiler_parser::Caller;
use osiris_project::{EnumerationEntry, InstanceName, OrphanEntry};
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;
use tracing::trace;

use crate::goal::Goal;
use crate::symbols::{Symbol, SymbolKey, Symbols};
use crate::types::TypeRegistry;

/// Project facts the analyzers check against, besides the symbols.
#[derive(Debug, Clone, Default)]
pub struct AnalyzerEnvironment {
    /// Level instances by lowercase GUID
    pub instances: FxHashMap<SmolStr, InstanceName>,
    /// Databases excused from unused-database warnings
    pub orphans: FxHashSet<SymbolKey>,
    /// Allowed string members per symbol parameter
    pub enumerations: FxHashMap<(SymbolKey, usize), Vec<String>>,
}

impl AnalyzerEnvironment {
    pub fn new(
        instances: Vec<InstanceName>,
        orphans: &[OrphanEntry],
        enumerations: &[EnumerationEntry],
    ) -> Self {
        Self {
            instances: instances
                .into_iter()
                .map(|instance| (SmolStr::new(instance.guid.to_ascii_lowercase()), instance))
                .collect(),
            orphans: orphans
                .iter()
                .map(|orphan| SymbolKey::new(orphan.name.as_str(), orphan.arity))
                .collect(),
            enumerations: enumerations
                .iter()
                .map(|entry| {
                    (
                        (SymbolKey::new(entry.symbol.as_str(), entry.arity), entry.parameter),
                        entry.members.clone(),
                    )
                })
                .collect(),
        }
    }

    pub fn instance(&self, guid: &str) -> Option<&InstanceName> {
        self.instances.get(guid.to_ascii_lowercase().as_str())
    }
}

/// Everything a pass may look at while checking one goal.
pub struct AnalyzerContext<'a> {
    pub goal: &'a Goal,
    pub goals: &'a IndexMap<SmolStr, Goal>,
    pub symbols: &'a Symbols,
    pub types: &'a TypeRegistry,
    pub environment: &'a AnalyzerEnvironment,
}

impl<'a> AnalyzerContext<'a> {
    /// Symbol a call site resolved to.
    pub fn symbol(&self, caller: &Caller<'_>) -> Option<&'a Symbol> {
        self.goal
            .symbol_at(caller.signature)
            .and_then(|key| self.symbols.get(key))
    }

    fn located(&self, diagnostic: Diagnostic) -> Diagnostic {
        diagnostic.with_file(self.goal.uri())
    }
}

/// A check over one goal.
pub trait Analyzer {
    fn analyze(&self, context: &AnalyzerContext<'_>) -> Vec<Diagnostic>;

    /// Get the name of this analyzer (for debugging/logging)
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// The built-in passes, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pass {
    UnresolvedSymbols,
    CallerKinds,
    Parameters,
    GuidStrings,
    ParentGoals,
}

impl Pass {
    pub const ALL: [Self; 5] = [
        Self::UnresolvedSymbols,
        Self::CallerKinds,
        Self::Parameters,
        Self::GuidStrings,
        Self::ParentGoals,
    ];
}

impl Analyzer for Pass {
    fn analyze(&self, context: &AnalyzerContext<'_>) -> Vec<Diagnostic> {
        match self {
            Self::UnresolvedSymbols => UnresolvedSymbolAnalyzer.analyze(context),
            Self::CallerKinds => CallerKindAnalyzer.analyze(context),
            Self::Parameters => ParameterAnalyzer.analyze(context),
            Self::GuidStrings => GuidStringAnalyzer.analyze(context),
            Self::ParentGoals => ParentGoalAnalyzer.analyze(context),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::UnresolvedSymbols => UnresolvedSymbolAnalyzer.name(),
            Self::CallerKinds => CallerKindAnalyzer.name(),
            Self::Parameters => ParameterAnalyzer.name(),
            Self::GuidStrings => GuidStringAnalyzer.name(),
            Self::ParentGoals => ParentGoalAnalyzer.name(),
        }
    }
}

/// Ordered list of analyzers run over each goal
#[derive(Default)]
pub struct AnalyzerPipeline {
    analyzers: Vec<Box<dyn Analyzer + Send + Sync>>,
}

impl AnalyzerPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an analyzer to the end of the pipeline
    pub fn add_analyzer<A: Analyzer + Send + Sync + 'static>(mut self, analyzer: A) -> Self {
        self.analyzers.push(Box::new(analyzer));
        self
    }

    /// Run every analyzer and collect their diagnostics, sorted by position
    pub fn run(&self, context: &AnalyzerContext<'_>) -> DiagnosticCollection {
        let mut collection = DiagnosticCollection::new();
        for analyzer in &self.analyzers {
            let diagnostics = analyzer.analyze(context);
            trace!(
                "{} reported {} diagnostics for {}",
                analyzer.name(),
                diagnostics.len(),
                context.goal.name()
            );
            collection.extend(diagnostics.into_iter().map(|d| context.located(d)));
        }
        collection.sort();
        collection
    }

    pub fn len(&self) -> usize {
        self.analyzers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.analyzers.is_empty()
    }
}

/// The pipeline with every built-in pass
pub fn create_default_pipeline() -> AnalyzerPipeline {
    Pass::ALL
        .into_iter()
        .fold(AnalyzerPipeline::new(), AnalyzerPipeline::add_analyzer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goal::GoalOrigin;
    use chumsky::span::SimpleSpan;
    use osiris_compiler_diagnostics::DiagnosticCode;

    /// Mock analyzer for testing
    struct MockAnalyzer {
        name: &'static str,
        diagnostics: Vec<Diagnostic>,
    }

    impl Analyzer for MockAnalyzer {
        fn analyze(&self, _context: &AnalyzerContext<'_>) -> Vec<Diagnostic> {
            self.diagnostics.clone()
        }

        fn name(&self) -> &'static str {
            self.name
        }
    }

    #[test]
    fn test_pipeline_collects_sorted_and_located() {
        let goal = Goal::parse(
            "G".into(),
            "memory:///G".into(),
            "INITSECTION\nKBSECTION\nEXITSECTION\nENDEXITSECTION\n".into(),
            GoalOrigin::Local,
        );
        let goals = IndexMap::new();
        let symbols = Symbols::new();
        let types = TypeRegistry::new();
        let environment = AnalyzerEnvironment::default();
        let context = AnalyzerContext {
            goal: &goal,
            goals: &goals,
            symbols: &symbols,
            types: &types,
            environment: &environment,
        };

        let pipeline = AnalyzerPipeline::new()
            .add_analyzer(MockAnalyzer {
                name: "late",
                diagnostics: vec![Diagnostic::unresolved_symbol("B", 0, SimpleSpan::from(9..10))],
            })
            .add_analyzer(MockAnalyzer {
                name: "early",
                diagnostics: vec![Diagnostic::warning(
                    DiagnosticCode::DatabaseNeverRead,
                    "unused".to_string(),
                )
                .with_location(SimpleSpan::from(1..2))],
            });
        assert_eq!(pipeline.len(), 2);

        let result = pipeline.run(&context);
        assert_eq!(result.len(), 2);
        assert_eq!(result.all()[0].span.start, 1);
        assert!(result.iter().all(|d| d.file_path == "memory:///G"));
    }

    #[test]
    fn test_default_pipeline_has_every_pass() {
        let pipeline = create_default_pipeline();
        assert_eq!(pipeline.len(), Pass::ALL.len());
        assert!(!pipeline.is_empty());
    }
}
