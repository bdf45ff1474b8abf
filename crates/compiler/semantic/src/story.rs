//! # Story
//!
//! The [`Story`] owns every goal of a project together with the symbol table,
//! the type aliases declared by the header and the analyzer pipeline.
//!
//! Loading happens in two stages. While the story is initializing, goals are
//! parsed and their call sites recorded but nothing is resolved or analyzed.
//! [`Story::finish_initialization`] then computes goal weights, runs one full
//! symbol sweep and analyzes every non-header goal. After that, each goal
//! update only re-analyzes the goal that changed.
//!
//! A story is not synchronized; [`crate::controller::StoryController`] runs
//! one on a task and feeds it requests one at a time.

use std::path::PathBuf;

use chumsky::span::SimpleSpan;
use indexmap::IndexMap;
use osiris_compiler_diagnostics::{Diagnostic, DiagnosticPhase};
use osiris_compiler_parser::parse_header;
use osiris_project::{FileSource, GoalSource, MemorySource, Project, ProjectError};
use rustc_hash::FxHashSet;
use smol_str::SmolStr;
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::analyzer::{create_default_pipeline, AnalyzerContext, AnalyzerEnvironment, AnalyzerPipeline};
use crate::goal::{apply_weights, compute_weights, goal_tree, Goal, GoalOrigin, GoalTreeNode, GoalWeights};
use crate::symbols::{Symbol, SymbolKey, Symbols};
use crate::types::TypeRegistry;

/// Goal name the header's system declarations are attributed to.
pub const HEADER_GOAL: &str = "<header>";

#[derive(Debug, Error)]
pub enum StoryError {
    #[error("story header {uri} could not be read: {source}")]
    MissingHeader {
        uri: String,
        #[source]
        source: std::io::Error,
    },

    #[error("dependency directory {} does not exist", path.display())]
    MissingDependency { path: PathBuf },

    #[error("failed to read goal {uri}: {source}")]
    Source {
        uri: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Project(#[from] ProjectError),
}

/// Everything a story is loaded from.
pub struct StoryInputs {
    pub header: Box<dyn GoalSource>,
    /// Dependency directories that must exist
    pub dependencies: Vec<PathBuf>,
    pub shared_goals: Vec<Box<dyn GoalSource>>,
    pub goals: Vec<Box<dyn GoalSource>>,
    pub environment: AnalyzerEnvironment,
}

impl StoryInputs {
    pub fn new(header: impl GoalSource + 'static) -> Self {
        Self {
            header: Box::new(header),
            dependencies: Vec::new(),
            shared_goals: Vec::new(),
            goals: Vec::new(),
            environment: AnalyzerEnvironment::default(),
        }
    }

    /// Header only, for stories built from in-memory text.
    pub fn from_header_text(text: impl Into<String>) -> Self {
        Self::new(MemorySource::new("story_header", text))
    }

    pub fn with_goal(mut self, goal: impl GoalSource + 'static) -> Self {
        self.goals.push(Box::new(goal));
        self
    }

    pub fn with_shared_goal(mut self, goal: impl GoalSource + 'static) -> Self {
        self.shared_goals.push(Box::new(goal));
        self
    }

    pub fn with_dependency(mut self, directory: impl Into<PathBuf>) -> Self {
        self.dependencies.push(directory.into());
        self
    }

    pub fn with_environment(mut self, environment: AnalyzerEnvironment) -> Self {
        self.environment = environment;
        self
    }

    /// Inputs of a discovered project: its header, dependency goals as shared
    /// goals, its own goals and the instance list.
    pub fn from_project(project: &Project) -> Result<Self, StoryError> {
        if let Some(path) = project.dependency_directories.iter().find(|d| !d.is_dir()) {
            return Err(StoryError::MissingDependency { path: path.clone() });
        }
        let boxed = |path: PathBuf| Box::new(FileSource::new(path)) as Box<dyn GoalSource>;
        let environment = AnalyzerEnvironment::new(
            project.load_instances()?,
            &project.orphans,
            &project.enumerations,
        );
        Ok(Self {
            header: Box::new(FileSource::new(project.header_path.clone())),
            dependencies: project.dependency_directories.clone(),
            shared_goals: project.dependency_goal_files()?.into_iter().map(boxed).collect(),
            goals: project.goal_files()?.into_iter().map(boxed).collect(),
            environment,
        })
    }
}

/// A goal source waiting to be loaded, with the origin it loads as.
pub type PendingLoad = (Box<dyn GoalSource>, GoalOrigin);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoryState {
    Empty,
    Initializing,
    Ready,
}

/// Notifications published to subscribers.
#[derive(Debug, Clone)]
pub enum StoryEvent {
    /// Initial load finished and every goal was analyzed
    Ready { goals: usize },
    /// Goals were added or removed, or parent edges changed
    GoalTreeChanged,
    /// Current diagnostics of one goal, every phase
    Diagnostics {
        goal: SmolStr,
        uri: String,
        diagnostics: Vec<Diagnostic>,
    },
    /// A project-level failure
    Error(String),
}

/// A text replacement in one goal source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub uri: String,
    pub span: SimpleSpan<usize>,
    pub text: String,
}

pub struct Story {
    state: StoryState,
    goals: IndexMap<SmolStr, Goal>,
    symbols: Symbols,
    types: TypeRegistry,
    pipeline: AnalyzerPipeline,
    environment: AnalyzerEnvironment,
    weights: GoalWeights,
    header_uri: String,
    header_diagnostics: Vec<Diagnostic>,
    subscribers: Vec<UnboundedSender<StoryEvent>>,
}

impl Default for Story {
    fn default() -> Self {
        Self::new()
    }
}

impl Story {
    pub fn new() -> Self {
        Self {
            state: StoryState::Empty,
            goals: IndexMap::new(),
            symbols: Symbols::new(),
            types: TypeRegistry::new(),
            pipeline: create_default_pipeline(),
            environment: AnalyzerEnvironment::default(),
            weights: GoalWeights::default(),
            header_uri: String::new(),
            header_diagnostics: Vec::new(),
            subscribers: Vec::new(),
        }
    }

    /// Loads a story synchronously: initialize, load every goal, finish.
    pub fn load_all(inputs: StoryInputs) -> Result<Self, StoryError> {
        let mut story = Self::new();
        for (source, origin) in story.initialize(inputs)? {
            story.load_goal(source.as_ref(), origin)?;
        }
        story.finish_initialization();
        Ok(story)
    }

    pub const fn state(&self) -> StoryState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == StoryState::Ready
    }

    pub fn subscribe(&mut self) -> UnboundedReceiver<StoryEvent> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers.push(sender);
        receiver
    }

    pub(crate) fn emit(&mut self, event: StoryEvent) {
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    /// Resets the story and installs the header. Returns the goal sources
    /// still to load, dependency goals first.
    pub fn initialize(&mut self, inputs: StoryInputs) -> Result<Vec<PendingLoad>, StoryError> {
        let StoryInputs {
            header,
            dependencies,
            shared_goals,
            goals,
            environment,
        } = inputs;

        if let Some(path) = dependencies.iter().find(|d| !d.is_dir()) {
            return Err(StoryError::MissingDependency { path: path.clone() });
        }
        let text = header.read().map_err(|source| StoryError::MissingHeader {
            uri: header.uri().to_string(),
            source,
        })?;

        self.goals.clear();
        self.symbols = Symbols::new();
        self.types.clear();
        self.weights.clear();
        self.environment = environment;
        self.header_uri = header.uri().to_string();

        let parsed = parse_header(&text);
        for alias in parsed.aliases() {
            if !self.types.register_alias(alias) {
                warn!("type alias {} has an unknown base, using GUIDSTRING", alias.name);
            }
        }
        let header_goal = SmolStr::new_static(HEADER_GOAL);
        let declarations = parsed.declarations();
        for declaration in &declarations {
            self.symbols.declare_system(&header_goal, declaration, &self.types);
        }
        self.header_diagnostics = parsed
            .diagnostics
            .iter()
            .cloned()
            .map(|diagnostic| diagnostic.with_file(self.header_uri.clone()))
            .collect();

        self.state = StoryState::Initializing;
        let header_goals = parsed.goal_sources();
        info!(
            "Initializing story from {}: {} system symbols, {} header goals",
            self.header_uri,
            declarations.len(),
            header_goals.len()
        );
        for (title, source, map) in header_goals {
            let uri = format!("{}#{title}", self.header_uri);
            self.update_goal(&title, &uri, source, GoalOrigin::Header);
            // Header goals are never reported themselves, their blob errors
            // belong to the header
            let Some(goal) = self.goals.get(title.as_str()) else {
                continue;
            };
            let mapped: Vec<Diagnostic> = goal
                .diagnostics(DiagnosticPhase::Syntax)
                .iter()
                .map(|diagnostic| map.diagnostic(diagnostic).with_file(self.header_uri.clone()))
                .collect();
            self.header_diagnostics.extend(mapped);
        }

        Ok(shared_goals
            .into_iter()
            .map(|source| (source, GoalOrigin::Shared))
            .chain(goals.into_iter().map(|source| (source, GoalOrigin::Local)))
            .collect())
    }

    /// Reads a goal source and (re)loads the goal.
    pub fn load_goal(&mut self, source: &dyn GoalSource, origin: GoalOrigin) -> Result<(), StoryError> {
        let text = source.read().map_err(|error| StoryError::Source {
            uri: source.uri().to_string(),
            source: error,
        })?;
        self.update_goal(source.name(), source.uri(), text, origin);
        Ok(())
    }

    /// Replaces the text of a goal, keeping its origin when it already exists.
    pub fn update_goal_text(&mut self, name: &str, uri: &str, text: String) {
        let origin = self.goals.get(name).map_or(GoalOrigin::Local, Goal::origin);
        self.update_goal(name, uri, text, origin);
    }

    /// Parses `text` as goal `name`, replacing any previous version.
    pub fn update_goal(&mut self, name: &str, uri: &str, text: String, origin: GoalOrigin) {
        let name = SmolStr::new(name);
        let previous_parents = self.goals.get(&name).map(|goal| goal.parents().to_vec());
        if previous_parents.is_some() {
            self.symbols.remove_goal(&name);
        }

        let mut goal = Goal::parse(name.clone(), uri.to_string(), text, origin);
        let callers = self.symbols.add_goal(&name, goal.ast(), &self.types);
        goal.set_callers(callers);
        let topology_changed = previous_parents.as_deref() != Some(goal.parents());
        debug!(
            "Loaded goal {name} from {uri} ({} syntax diagnostics)",
            goal.diagnostics(DiagnosticPhase::Syntax).len()
        );
        self.goals.insert(name.clone(), goal);
        self.symbols.prune();

        if self.is_ready() {
            self.refresh(topology_changed);
            self.analyze_goal(&name);
            self.publish_diagnostics(&name);
        }
    }

    /// Drops a goal and everything it contributed. Returns whether it existed.
    ///
    /// Once the story is ready, subscribers get an empty diagnostics event for
    /// the removed goal. Goals sharing a non-system symbol with it, or naming
    /// it as their parent, are analyzed again.
    pub fn remove_goal(&mut self, name: &str) -> bool {
        let Some(removed) = self.goals.shift_remove(name) else {
            return false;
        };
        self.symbols.remove_goal(name);
        let pruned = self.symbols.prune();
        debug!("Removed goal {name}, pruned {pruned} symbols");
        if !self.is_ready() {
            return true;
        }

        self.refresh(true);
        if !removed.is_header() {
            self.emit(StoryEvent::Diagnostics {
                goal: removed.name().clone(),
                uri: removed.uri().to_string(),
                diagnostics: Vec::new(),
            });
        }
        // System symbols do not change with goals
        let touched: FxHashSet<&SymbolKey> = removed
            .callers()
            .values()
            .filter(|key| !self.symbols.get(key).is_some_and(Symbol::is_system))
            .collect();
        let affected: Vec<SmolStr> = self
            .goals
            .values()
            .filter(|goal| !goal.is_header())
            .filter(|goal| {
                goal.parents().iter().any(|parent| parent == name)
                    || goal.callers().values().any(|key| touched.contains(key))
            })
            .map(|goal| goal.name().clone())
            .collect();
        debug!("Re-analyzing {} goals affected by removing {name}", affected.len());
        for goal in affected {
            self.analyze_goal(&goal);
            self.publish_diagnostics(&goal);
        }
        true
    }

    /// Recomputes weights when the tree changed, then sweeps pending symbols.
    fn refresh(&mut self, topology_changed: bool) {
        if topology_changed {
            let weights = compute_weights(&self.goals);
            if weights != self.weights {
                debug!("Goal weights changed, invalidating every symbol");
                self.weights = weights;
                self.symbols.invalidate_all();
            }
            self.emit(StoryEvent::GoalTreeChanged);
        }
        apply_weights(&mut self.goals, &self.weights);
        self.symbols.update(&self.weights);
    }

    /// Ends the initial load: weights, one full sweep, one full analysis.
    pub fn finish_initialization(&mut self) {
        if self.state != StoryState::Initializing {
            return;
        }
        self.weights = compute_weights(&self.goals);
        apply_weights(&mut self.goals, &self.weights);
        self.symbols.invalidate_all();
        let stats = self.symbols.update(&self.weights);
        self.analyze_all();
        self.state = StoryState::Ready;
        info!(
            "Story ready: {} goals, {} symbols ({} dead, {} pending)",
            self.goals.len(),
            self.symbols.len(),
            stats.dead,
            stats.pending
        );

        let goals = self.goals.len();
        self.emit(StoryEvent::Ready { goals });
        self.emit(StoryEvent::GoalTreeChanged);
        let names: Vec<SmolStr> = self.goals.keys().cloned().collect();
        for name in names {
            self.publish_diagnostics(&name);
        }
    }

    /// Forces a full re-resolution and re-analysis of every goal.
    pub fn reanalyze(&mut self) {
        self.symbols.invalidate_all();
        self.symbols.update(&self.weights);
        self.analyze_all();
    }

    fn analyze_all(&mut self) {
        let names: Vec<SmolStr> = self
            .goals
            .values()
            .filter(|goal| !goal.is_header())
            .map(|goal| goal.name().clone())
            .collect();
        for name in names {
            self.analyze_goal(&name);
        }
    }

    /// Runs the analyzer pipeline over one goal, replacing its analyzer
    /// diagnostics.
    pub fn analyze_goal(&mut self, name: &str) {
        let Some(goal) = self.goals.get(name) else {
            return;
        };
        let context = AnalyzerContext {
            goal,
            goals: &self.goals,
            symbols: &self.symbols,
            types: &self.types,
            environment: &self.environment,
        };
        let diagnostics: Vec<Diagnostic> = self.pipeline.run(&context).into_iter().collect();
        if let Some(goal) = self.goals.get_mut(name) {
            goal.set_diagnostics(DiagnosticPhase::Analyzer, diagnostics);
        }
    }

    fn publish_diagnostics(&mut self, name: &str) {
        let Some(goal) = self.goals.get(name) else {
            return;
        };
        if goal.is_header() {
            return;
        }
        let event = StoryEvent::Diagnostics {
            goal: goal.name().clone(),
            uri: goal.uri().to_string(),
            diagnostics: goal.all_diagnostics(),
        };
        self.emit(event);
    }

    pub fn goal(&self, name: &str) -> Option<&Goal> {
        self.goals.get(name)
    }

    pub fn goals(&self) -> impl Iterator<Item = &Goal> {
        self.goals.values()
    }

    pub const fn symbols(&self) -> &Symbols {
        &self.symbols
    }

    pub const fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub const fn environment(&self) -> &AnalyzerEnvironment {
        &self.environment
    }

    pub fn symbol(&self, key: &SymbolKey) -> Option<&Symbol> {
        self.symbols.get(key)
    }

    /// Every arity of a symbol name, for completion and hover.
    pub fn symbols_named(&self, name: &str) -> Vec<&Symbol> {
        let mut symbols: Vec<&Symbol> = self.symbols.by_name(name).collect();
        symbols.sort_by_key(|symbol| symbol.arity());
        symbols
    }

    /// Symbol called at byte `offset` of a goal, the innermost call wins.
    pub fn symbol_at(&self, goal: &str, offset: usize) -> Option<&Symbol> {
        let goal = self.goals.get(goal)?;
        let ast = goal.ast();
        goal.callers()
            .iter()
            .filter(|&(&signature, _)| {
                let span = ast.span(signature);
                span.start <= offset && offset < span.end
            })
            .min_by_key(|&(&signature, _)| {
                let span = ast.span(signature);
                span.end - span.start
            })
            .and_then(|(_, key)| self.symbols.get(key))
    }

    pub fn goal_tree(&self) -> Vec<GoalTreeNode> {
        goal_tree(&self.goals)
    }

    /// Uri of the header the story was initialized from, empty before that.
    pub fn header_uri(&self) -> &str {
        &self.header_uri
    }

    pub fn header_diagnostics(&self) -> &[Diagnostic] {
        &self.header_diagnostics
    }

    /// Diagnostics of one goal, every phase.
    pub fn diagnostics(&self, name: &str) -> Vec<Diagnostic> {
        self.goals
            .get(name)
            .map(Goal::all_diagnostics)
            .unwrap_or_default()
    }

    /// Diagnostics of the header and of every non-header goal, in load order.
    pub fn all_diagnostics(&self) -> Vec<Diagnostic> {
        self.header_diagnostics
            .iter()
            .cloned()
            .chain(
                self.goals
                    .values()
                    .filter(|goal| !goal.is_header())
                    .flat_map(Goal::all_diagnostics),
            )
            .collect()
    }

    /// Edits renaming every call site of `key` in goals that have a file of
    /// their own. Header goals are skipped.
    pub fn rename_symbol(&self, key: &SymbolKey, new_name: &str) -> Vec<TextEdit> {
        let mut edits: Vec<TextEdit> = self
            .goals
            .values()
            .filter(|goal| !goal.is_header())
            .flat_map(|goal| {
                let ast = goal.ast();
                goal.callers()
                    .iter()
                    .filter(|(_, called)| *called == key)
                    .filter_map(|(&signature, _)| ast.signature_parts(signature))
                    .map(|(identifier, _, _)| TextEdit {
                        uri: goal.uri().to_string(),
                        span: ast.span(identifier),
                        text: new_name.to_string(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        edits.sort_by(|a, b| (&a.uri, a.span.start).cmp(&(&b.uri, b.span.start)));
        edits
    }

    /// Edits pointing every `ParentTargetEdge "old"` at `new_name`.
    pub fn rename_goal(&self, old_name: &str, new_name: &str) -> Vec<TextEdit> {
        let mut edits = Vec::new();
        for goal in self.goals.values().filter(|goal| !goal.is_header()) {
            for (parent, range) in goal.ast().parent_edges() {
                if parent != old_name {
                    continue;
                }
                let Some(text) = goal.source().get(range.span.start..range.span.end) else {
                    continue;
                };
                let (Some(open), Some(close)) = (text.find('"'), text.rfind('"')) else {
                    continue;
                };
                if open >= close {
                    continue;
                }
                let start = range.span.start + open + 1;
                edits.push(TextEdit {
                    uri: goal.uri().to_string(),
                    span: SimpleSpan::from(start..range.span.start + close),
                    text: new_name.to_string(),
                });
            }
        }
        edits
    }
}
