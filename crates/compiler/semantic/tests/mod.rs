//! # Story Tests
//!
//! End-to-end tests loading headers and goals into a [`Story`] and checking
//! the inferred symbols and the reported diagnostics.
//!
//! ## Test Organization
//!
//! - `story/inference` - symbol arity, type flow, dead symbols, determinism
//! - `story/unresolved` - unresolved symbols and unused databases
//! - `story/caller_kinds` - which symbol kinds each rule position accepts
//! - `story/parameters` - parameter types, variable binding and flow
//! - `story/guids` - GUID strings and level instances
//! - `story/goals` - parent edges, the goal tree and rename edits
//! - `story/properties` - property tests over generated rules
//!
//! [`Story`]: osiris_compiler_semantic::Story

pub mod common;
pub use common::*;

mod story;
