//! # Osiris Semantic Analysis
//!
//! Builds a semantic model of a whole story on top of the parser's syntax
//! trees.
//!
//! ## Architecture
//!
//! 1. **Types**: built-in value types and the aliases declared by the header
//! 2. **Rule scopes**: variables bound inside a rule and the arguments that use them
//! 3. **Symbols**: every `(name, arity)` used anywhere, with its parameter
//!    types inferred from usage by a fixed-point resolution
//! 4. **Goals**: parsed goals, the goal tree and goal weights
//! 5. **Analyzers**: passes reporting semantic diagnostics per goal
//! 6. **Story**: owns all of the above and applies goal updates, driven by
//!    the [`controller::StoryController`] task
//!
//! ## Main entry point
//!
//! [`Story::load_all`] loads a story synchronously; [`StoryController`] runs
//! one behind a request queue.

pub mod analyzer;
pub mod controller;
pub mod goal;
pub mod scope;
pub mod story;
pub mod symbols;
pub mod types;

pub use analyzer::{create_default_pipeline, Analyzer, AnalyzerContext, AnalyzerEnvironment, AnalyzerPipeline, Pass};
pub use controller::{StoryController, StoryRequest};
pub use goal::{Goal, GoalOrigin, GoalTreeNode, GoalWeights};
pub use scope::{Argument, RuleScope, Variable};
pub use story::{PendingLoad, Story, StoryError, StoryEvent, StoryInputs, StoryState, TextEdit, HEADER_GOAL};
pub use symbols::{Resolution, Symbol, SymbolFlags, SymbolKey, SymbolKind, Symbols, UpdateStats};
pub use types::{TypeRegistry, ValueType};
