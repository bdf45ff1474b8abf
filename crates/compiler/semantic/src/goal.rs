//! # Goals and the goal tree
//!
//! A [`Goal`] owns the parsed form of one source unit together with its
//! per-phase diagnostics and the table mapping its call sites to symbols.
//! Parents are the raw names read from `ParentTargetEdge` options; children
//! are found by scanning every goal for a matching parent.
//!
//! Goal weights number the tree in pre-order: roots sorted by name, each
//! goal's children (sorted by name) before its next sibling. A goal whose
//! parents do not exist is a root. Goals that only sit on a cycle are
//! numbered after the tree in name order.

use indexmap::IndexMap;
use osiris_compiler_diagnostics::{Diagnostic, DiagnosticPhase};
use osiris_compiler_parser::{parse_goal, Ast, LineIndex, NodeId};
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;

use crate::symbols::{CallerTable, SymbolKey};

/// Weight of every goal, keyed by goal name.
pub type GoalWeights = FxHashMap<SmolStr, u32>;

/// Where a goal comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GoalOrigin {
    /// Synthesized from the story header
    Header,
    /// Loaded from a dependency
    Shared,
    /// Part of the project itself
    Local,
}

#[derive(Debug, Clone)]
pub struct Goal {
    name: SmolStr,
    uri: String,
    source: String,
    origin: GoalOrigin,
    parents: Vec<SmolStr>,
    weight: u32,
    ast: Ast,
    line_index: LineIndex,
    callers: CallerTable,
    syntax: Vec<Diagnostic>,
    analysis: Vec<Diagnostic>,
}

impl Goal {
    /// Parses `source` into a goal. Syntax diagnostics are kept on the goal.
    pub fn parse(name: SmolStr, uri: String, source: String, origin: GoalOrigin) -> Self {
        let parsed = parse_goal(&source);
        let parents = parsed
            .ast
            .parent_edges()
            .map(|(parent, _)| SmolStr::new(parent))
            .collect();
        let syntax = parsed
            .diagnostics
            .into_iter()
            .map(|diagnostic| diagnostic.with_file(uri.clone()))
            .collect();
        Self {
            name,
            uri,
            source,
            origin,
            parents,
            weight: u32::MAX,
            ast: parsed.ast,
            line_index: parsed.line_index,
            callers: CallerTable::default(),
            syntax,
            analysis: Vec::new(),
        }
    }

    pub const fn name(&self) -> &SmolStr {
        &self.name
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub const fn origin(&self) -> GoalOrigin {
        self.origin
    }

    pub fn is_header(&self) -> bool {
        self.origin == GoalOrigin::Header
    }

    /// Header and dependency goals are shared with other projects.
    pub fn is_shared(&self) -> bool {
        self.origin != GoalOrigin::Local
    }

    pub fn parents(&self) -> &[SmolStr] {
        &self.parents
    }

    pub const fn weight(&self) -> u32 {
        self.weight
    }

    pub const fn ast(&self) -> &Ast {
        &self.ast
    }

    pub const fn line_index(&self) -> &LineIndex {
        &self.line_index
    }

    pub const fn callers(&self) -> &CallerTable {
        &self.callers
    }

    pub(crate) fn set_callers(&mut self, callers: CallerTable) {
        self.callers = callers;
    }

    /// Symbol called by the signature node `signature`.
    pub fn symbol_at(&self, signature: NodeId) -> Option<&SymbolKey> {
        self.callers.get(&signature)
    }

    pub fn diagnostics(&self, phase: DiagnosticPhase) -> &[Diagnostic] {
        match phase {
            DiagnosticPhase::Syntax => &self.syntax,
            DiagnosticPhase::Analyzer => &self.analysis,
        }
    }

    /// Replaces the diagnostics of one phase, leaving the other untouched.
    pub fn set_diagnostics(&mut self, phase: DiagnosticPhase, diagnostics: Vec<Diagnostic>) {
        match phase {
            DiagnosticPhase::Syntax => self.syntax = diagnostics,
            DiagnosticPhase::Analyzer => self.analysis = diagnostics,
        }
    }

    /// Diagnostics of every phase, syntax first.
    pub fn all_diagnostics(&self) -> Vec<Diagnostic> {
        self.syntax.iter().chain(&self.analysis).cloned().collect()
    }
}

/// A goal with its children, for presentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoalTreeNode {
    pub name: SmolStr,
    pub children: Vec<GoalTreeNode>,
    pub is_shared: bool,
}

/// Children of every goal, sorted by name.
fn children_map(goals: &IndexMap<SmolStr, Goal>) -> FxHashMap<&str, Vec<&SmolStr>> {
    let mut children: FxHashMap<&str, Vec<&SmolStr>> = FxHashMap::default();
    for goal in goals.values() {
        for parent in &goal.parents {
            if parent != &goal.name && goals.contains_key(parent) {
                children.entry(parent.as_str()).or_default().push(&goal.name);
            }
        }
    }
    for list in children.values_mut() {
        list.sort();
        list.dedup();
    }
    children
}

/// Goals the tree starts from: parentless goals, then goals no root reaches.
fn tree_roots<'a>(
    goals: &'a IndexMap<SmolStr, Goal>,
    children: &FxHashMap<&str, Vec<&'a SmolStr>>,
) -> Vec<&'a SmolStr> {
    let mut roots: Vec<&SmolStr> = goals
        .values()
        .filter(|goal| !goal.parents.iter().any(|p| p != &goal.name && goals.contains_key(p)))
        .map(|goal| &goal.name)
        .collect();
    roots.sort();

    let mut reached: FxHashSet<&str> = FxHashSet::default();
    let mut stack: Vec<&str> = roots.iter().map(|name| name.as_str()).collect();
    while let Some(name) = stack.pop() {
        if reached.insert(name) {
            stack.extend(children.get(name).into_iter().flatten().map(|c| c.as_str()));
        }
    }
    let mut unreached: Vec<&SmolStr> = goals
        .keys()
        .filter(|name| !reached.contains(name.as_str()))
        .collect();
    unreached.sort();
    roots.extend(unreached);
    roots
}

/// Numbers the goal tree in pre-order.
pub fn compute_weights(goals: &IndexMap<SmolStr, Goal>) -> GoalWeights {
    let children = children_map(goals);
    let mut weights = GoalWeights::default();
    for root in tree_roots(goals, &children) {
        let mut stack = vec![root];
        while let Some(name) = stack.pop() {
            if weights.contains_key(name) {
                continue;
            }
            let weight = u32::try_from(weights.len()).unwrap_or(u32::MAX);
            weights.insert(name.clone(), weight);
            if let Some(list) = children.get(name.as_str()) {
                stack.extend(list.iter().rev().copied());
            }
        }
    }
    weights
}

/// Stores `weights` on the goals. Returns whether any weight changed.
pub fn apply_weights(goals: &mut IndexMap<SmolStr, Goal>, weights: &GoalWeights) -> bool {
    let mut changed = false;
    for goal in goals.values_mut() {
        let weight = weights.get(&goal.name).copied().unwrap_or(u32::MAX);
        changed |= goal.weight != weight;
        goal.weight = weight;
    }
    changed
}

/// The goal tree for presentation. A goal listed under several parents
/// appears under each of them; cycles are cut at the first repeat.
pub fn goal_tree(goals: &IndexMap<SmolStr, Goal>) -> Vec<GoalTreeNode> {
    fn build(
        name: &SmolStr,
        goals: &IndexMap<SmolStr, Goal>,
        children: &FxHashMap<&str, Vec<&SmolStr>>,
        path: &mut Vec<SmolStr>,
    ) -> GoalTreeNode {
        path.push(name.clone());
        let mut nodes = Vec::new();
        for &child in children.get(name.as_str()).into_iter().flatten() {
            if !path.contains(child) {
                nodes.push(build(child, goals, children, path));
            }
        }
        path.pop();
        GoalTreeNode {
            name: name.clone(),
            children: nodes,
            is_shared: goals.get(name).is_some_and(Goal::is_shared),
        }
    }

    let children = children_map(goals);
    let mut path = Vec::new();
    let mut seen: FxHashSet<&str> = FxHashSet::default();
    let mut tree = Vec::new();
    for root in tree_roots(goals, &children) {
        if seen.contains(root.as_str()) {
            continue;
        }
        let node = build(root, goals, &children, &mut path);
        mark_seen(&node, &mut seen, goals);
        tree.push(node);
    }
    tree
}

fn mark_seen<'a>(node: &GoalTreeNode, seen: &mut FxHashSet<&'a str>, goals: &'a IndexMap<SmolStr, Goal>) {
    if let Some((name, _)) = goals.get_key_value(&node.name) {
        seen.insert(name.as_str());
    }
    for child in &node.children {
        mark_seen(child, seen, goals);
    }
}
