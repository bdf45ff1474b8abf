//! # Symbol table
//!
//! Every distinct `(name, arity)` used anywhere in a story maps to one
//! [`Symbol`]. User goals never declare parameter types, so a symbol's shape is
//! assembled from *definitions*: the call sites and rule heads that carry
//! evidence about it. System symbols come from the story header and are fixed.
//!
//! ## Definitions
//!
//! A call site contributes a [`SymbolDefinition`] when its name is a database
//! (`DB_` prefix) or when it is the head of a PROC, QRY or IF rule of a
//! non-system symbol. Each parameter of a definition is one of:
//!
//! - an explicit type, from a literal or a `(TYPE)` annotation
//! - a reference to the symbol parameter that bound the variable earlier in
//!   the same rule
//! - unknown, which makes the definition partial
//!
//! Resolution (see [`Symbols::update`]) picks the canonical definition.

mod resolve;
mod suggest;

pub use resolve::{Resolution, UpdateStats};
pub use suggest::MAX_SUGGESTION_DISTANCE;

use std::fmt;

use bitflags::bitflags;
use chumsky::span::SimpleSpan;
use indexmap::IndexMap;
use osiris_compiler_parser::ast::{
    Caller, CallerRole, DefinitionKind, IdentifierKind, NodeKind, ParameterFlow, RuleKind,
};
use osiris_compiler_parser::{Ast, NodeId, PackedPosition, SystemDeclaration};
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;
use tracing::trace;

use crate::scope::{Argument, RuleScope, ScopedParameter};
use crate::types::{TypeRegistry, ValueType};

/// Identity of a symbol: the same name with another arity is another symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolKey {
    pub name: SmolStr,
    pub arity: usize,
}

impl SymbolKey {
    pub fn new(name: impl Into<SmolStr>, arity: usize) -> Self {
        Self {
            name: name.into(),
            arity,
        }
    }
}

impl fmt::Display for SymbolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.arity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SymbolKind {
    #[default]
    Unknown,
    Call,
    Database,
    Event,
    Query,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown symbol"),
            Self::Call => write!(f, "call"),
            Self::Database => write!(f, "database"),
            Self::Event => write!(f, "event"),
            Self::Query => write!(f, "query"),
        }
    }
}

impl From<DefinitionKind> for SymbolKind {
    fn from(kind: DefinitionKind) -> Self {
        match kind {
            DefinitionKind::Call | DefinitionKind::SysCall => Self::Call,
            DefinitionKind::Query | DefinitionKind::SysQuery => Self::Query,
            DefinitionKind::Event => Self::Event,
        }
    }
}

bitflags! {
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SymbolFlags: u8 {
        /// Declared in the story header, never inferred
        const SYSTEM = 1 << 0;
        /// Can never hold a value or never be resolved
        const DEAD = 1 << 1;
        /// Definitions changed since the last resolution
        const NEEDS_UPDATE = 1 << 2;
    }
}

/// Points at one parameter of a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParameterRef {
    pub symbol: SymbolKey,
    pub index: usize,
}

/// Resolved parameter of a symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolParameter {
    pub name: SmolStr,
    pub ty: ValueType,
    pub flow: Option<ParameterFlow>,
    /// Where the type was borrowed from, when it was inferred
    pub from: Option<ParameterRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterSource {
    Explicit(ValueType),
    Reference(ParameterRef),
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionParameter {
    pub name: SmolStr,
    pub source: ParameterSource,
    /// `[in]` / `[out]` annotation at this call site
    pub flow: Option<ParameterFlow>,
}

/// How a definition touches its symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefinitionAccess {
    /// Header declaration
    Declaration,
    Head(RuleKind),
    /// Database fact insertion in an action
    Write,
    /// Database fact deletion with `NOT` in an action
    Delete,
    /// Database lookup in a condition
    Read,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolDefinition {
    pub goal: SmolStr,
    pub span: SimpleSpan<usize>,
    pub start: PackedPosition,
    pub kind: SymbolKind,
    pub access: DefinitionAccess,
    pub parameters: Vec<DefinitionParameter>,
    pub comment: Option<String>,
    /// At least one parameter type is borrowed from another symbol
    pub is_inferred: bool,
    /// At least one parameter type is unknown
    pub is_partial: bool,
}

impl SymbolDefinition {
    fn new(
        goal: &SmolStr,
        span: SimpleSpan<usize>,
        start: PackedPosition,
        kind: SymbolKind,
        access: DefinitionAccess,
        parameters: Vec<DefinitionParameter>,
    ) -> Self {
        let is_inferred = parameters
            .iter()
            .any(|p| matches!(p.source, ParameterSource::Reference(_)));
        let is_partial = parameters
            .iter()
            .any(|p| matches!(p.source, ParameterSource::Unknown));
        Self {
            goal: goal.clone(),
            span,
            start,
            kind,
            access,
            parameters,
            comment: None,
            is_inferred,
            is_partial,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Symbol {
    key: SymbolKey,
    kind: SymbolKind,
    flags: SymbolFlags,
    parameters: Vec<SymbolParameter>,
    definitions: Vec<SymbolDefinition>,
    /// One entry per call site, naming the goal it is in
    usages: Vec<SmolStr>,
    db_reads: Vec<SmolStr>,
    db_writes: Vec<SmolStr>,
    resolved: Option<usize>,
}

impl Symbol {
    fn new(key: SymbolKey) -> Self {
        let parameters = (0..key.arity)
            .map(|index| SymbolParameter {
                name: SmolStr::new(format!("_Param{}", index + 1)),
                ty: ValueType::Unknown,
                flow: None,
                from: None,
            })
            .collect();
        Self {
            key,
            kind: SymbolKind::Unknown,
            flags: SymbolFlags::NEEDS_UPDATE,
            parameters,
            definitions: Vec::new(),
            usages: Vec::new(),
            db_reads: Vec::new(),
            db_writes: Vec::new(),
            resolved: None,
        }
    }

    pub const fn key(&self) -> &SymbolKey {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.key.name
    }

    pub const fn arity(&self) -> usize {
        self.key.arity
    }

    pub const fn kind(&self) -> SymbolKind {
        self.kind
    }

    pub const fn flags(&self) -> SymbolFlags {
        self.flags
    }

    pub fn is_system(&self) -> bool {
        self.flags.contains(SymbolFlags::SYSTEM)
    }

    pub fn is_dead(&self) -> bool {
        self.flags.contains(SymbolFlags::DEAD)
    }

    pub fn needs_update(&self) -> bool {
        self.flags.contains(SymbolFlags::NEEDS_UPDATE)
    }

    pub fn is_database(&self) -> bool {
        IdentifierKind::classify(&self.key.name) == IdentifierKind::Database
    }

    pub fn parameters(&self) -> &[SymbolParameter] {
        &self.parameters
    }

    pub fn definitions(&self) -> &[SymbolDefinition] {
        &self.definitions
    }

    pub fn usages(&self) -> &[SmolStr] {
        &self.usages
    }

    pub fn db_reads(&self) -> &[SmolStr] {
        &self.db_reads
    }

    pub fn db_writes(&self) -> &[SmolStr] {
        &self.db_writes
    }

    /// The canonical definition picked by the last resolution.
    pub fn resolved_definition(&self) -> Option<&SymbolDefinition> {
        self.resolved.and_then(|index| self.definitions.get(index))
    }

    /// Doc comment of the canonical definition, or of the first commented one.
    pub fn comment(&self) -> Option<&str> {
        self.resolved_definition()
            .and_then(|d| d.comment.as_deref())
            .or_else(|| self.definitions.iter().find_map(|d| d.comment.as_deref()))
    }

    /// Whether the definitions claim different kinds.
    pub fn has_kind_conflict(&self) -> bool {
        let mut kinds = self.definitions.iter().map(|d| d.kind);
        kinds
            .next()
            .is_some_and(|first| kinds.any(|kind| kind != first))
    }

    fn refresh_kind(&mut self) {
        if self.is_system() {
            return;
        }
        self.kind = if self.has_kind_conflict() {
            SymbolKind::Unknown
        } else {
            self.definitions
                .first()
                .map_or(SymbolKind::Unknown, |d| d.kind)
        };
    }

    fn invalidate(&mut self) {
        if self.is_system() {
            return;
        }
        self.flags.remove(SymbolFlags::DEAD);
        self.flags.insert(SymbolFlags::NEEDS_UPDATE);
        self.resolved = None;
    }

    fn depends_on(&self, keys: &FxHashSet<SymbolKey>) -> bool {
        self.definitions.iter().any(|definition| {
            definition.parameters.iter().any(|p| match &p.source {
                ParameterSource::Reference(r) => keys.contains(&r.symbol),
                _ => false,
            })
        })
    }
}

/// What a call site means for its symbol, `None` if it only uses it.
fn definition_shape(caller: &Caller<'_>) -> Option<(SymbolKind, DefinitionAccess)> {
    let is_database = IdentifierKind::classify(caller.name) == IdentifierKind::Database;
    match caller.role {
        CallerRole::RuleHead(rule) if is_database => {
            Some((SymbolKind::Database, DefinitionAccess::Head(rule)))
        }
        CallerRole::RuleHead(rule) => {
            let kind = match rule {
                RuleKind::If => SymbolKind::Event,
                RuleKind::Proc => SymbolKind::Call,
                RuleKind::Query => SymbolKind::Query,
            };
            Some((kind, DefinitionAccess::Head(rule)))
        }
        CallerRole::Condition if is_database => {
            Some((SymbolKind::Database, DefinitionAccess::Read))
        }
        CallerRole::Action | CallerRole::InitAction | CallerRole::ExitAction if is_database => {
            let access = if caller.is_inverted {
                DefinitionAccess::Delete
            } else {
                DefinitionAccess::Write
            };
            Some((SymbolKind::Database, access))
        }
        _ => None,
    }
}

/// Parameter evidence of a rule parameter.
fn scoped_source(
    ast: &Ast,
    scope: &RuleScope<'_>,
    parameter: &ScopedParameter<'_>,
) -> DefinitionParameter {
    let fallback_name = || SmolStr::new(format!("_Param{}", parameter.node.index + 1));
    let (name, source) = match &parameter.argument {
        Argument::Constant(ty) => (fallback_name(), ParameterSource::Explicit(ty.clone())),
        Argument::Reference(name) => {
            let source = scope.variable(name).map_or(ParameterSource::Unknown, |var| {
                match (&var.annotation, &var.from_symbol) {
                    (Some(ty), _) => ParameterSource::Explicit(ty.clone()),
                    (None, Some(symbol)) => ParameterSource::Reference(ParameterRef {
                        symbol: symbol.clone(),
                        index: var.from_index,
                    }),
                    (None, None) => ParameterSource::Unknown,
                }
            });
            (name.clone(), source)
        }
        Argument::Binding(name) => (name.clone(), ParameterSource::Unknown),
        Argument::Placeholder | Argument::Other => (fallback_name(), ParameterSource::Unknown),
    };
    let source = match &parameter.annotation {
        Some(ty) => ParameterSource::Explicit(ty.clone()),
        None => source,
    };
    DefinitionParameter {
        name,
        source,
        flow: ast.parameter_flow(parameter.node.parameter),
    }
}

/// Parameter evidence of an init or exit action, which has no variables.
fn constant_source(ast: &Ast, index: usize, parameter: NodeId, types: &TypeRegistry) -> DefinitionParameter {
    let name = SmolStr::new(format!("_Param{}", index + 1));
    if let Some(annotation) = ast.parameter_type(parameter) {
        let ty = types.resolve(annotation).unwrap_or(ValueType::Invalid);
        return DefinitionParameter {
            name,
            source: ParameterSource::Explicit(ty),
            flow: ast.parameter_flow(parameter),
        };
    }
    let source = ast
        .parameter_argument(parameter)
        .and_then(|argument| crate::scope::constant_type(ast.kind(argument)))
        .map_or(ParameterSource::Unknown, ParameterSource::Explicit);
    DefinitionParameter {
        name,
        source,
        flow: ast.parameter_flow(parameter),
    }
}

/// Maps the signature node of every call site of a goal to its symbol.
pub type CallerTable = FxHashMap<NodeId, SymbolKey>;

/// The symbols of one story.
#[derive(Debug, Clone, Default)]
pub struct Symbols {
    symbols: IndexMap<SymbolKey, Symbol>,
}

impl Symbols {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &SymbolKey) -> Option<&Symbol> {
        self.symbols.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }

    /// Every arity of a name.
    pub fn by_name<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a Symbol> + 'a {
        let name = SmolStr::new(name);
        self.symbols
            .values()
            .filter(move |symbol| symbol.name() == name.as_str())
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    fn entry(&mut self, key: &SymbolKey) -> &mut Symbol {
        self.symbols
            .entry(key.clone())
            .or_insert_with(|| Symbol::new(key.clone()))
    }

    /// Installs a header declaration as an immutable system symbol.
    pub fn declare_system(
        &mut self,
        goal: &SmolStr,
        declaration: &SystemDeclaration,
        types: &TypeRegistry,
    ) -> SymbolKey {
        let key = SymbolKey::new(declaration.name.clone(), declaration.arity());
        let kind = SymbolKind::from(declaration.kind);
        let parameters: Vec<SymbolParameter> = declaration
            .parameters
            .iter()
            .map(|parameter| SymbolParameter {
                name: parameter.name.clone(),
                ty: parameter.type_name.as_deref().map_or(ValueType::Unknown, |name| {
                    types.resolve(name).unwrap_or(ValueType::Invalid)
                }),
                flow: parameter.flow,
                from: None,
            })
            .collect();
        let definition = SymbolDefinition::new(
            goal,
            declaration.span,
            0,
            kind,
            DefinitionAccess::Declaration,
            parameters
                .iter()
                .map(|p| DefinitionParameter {
                    name: p.name.clone(),
                    source: ParameterSource::Explicit(p.ty.clone()),
                    flow: p.flow,
                })
                .collect(),
        );

        let symbol = self.entry(&key);
        symbol.kind = kind;
        symbol.flags = SymbolFlags::SYSTEM;
        symbol.parameters = parameters;
        symbol.definitions.retain(|d| d.access != DefinitionAccess::Declaration);
        symbol.definitions.insert(0, definition);
        symbol.resolved = Some(0);
        trace!("declared system symbol {key}");
        key
    }

    /// Records every call site of a goal and returns its caller table.
    pub fn add_goal(&mut self, goal: &SmolStr, ast: &Ast, types: &TypeRegistry) -> CallerTable {
        let mut callers = CallerTable::default();
        let mut changed = FxHashSet::default();

        // Parameter evidence of rule call sites, keyed by signature
        let mut evidence: FxHashMap<NodeId, Vec<DefinitionParameter>> = FxHashMap::default();
        for &rule in ast.rules() {
            let scope = RuleScope::build(ast, rule, types);
            for parameter in scope.parameters() {
                if let Some(caller) = parameter.node.caller {
                    evidence
                        .entry(caller.signature)
                        .or_default()
                        .push(scoped_source(ast, &scope, parameter));
                }
            }
        }

        ast.each_caller(|caller| {
            let key = SymbolKey::new(caller.name, caller.arity());
            callers.insert(caller.signature, key.clone());

            let comment = caller.rule.and_then(|rule| match ast.kind(rule) {
                NodeKind::Rule { comment, .. } if matches!(caller.role, CallerRole::RuleHead(_)) => {
                    comment.clone()
                }
                _ => None,
            });
            let symbol = self.entry(&key);
            symbol.usages.push(goal.clone());

            let Some((kind, access)) = definition_shape(&caller) else {
                return;
            };
            if kind == SymbolKind::Database {
                match access {
                    DefinitionAccess::Read | DefinitionAccess::Head(RuleKind::If) => {
                        symbol.db_reads.push(goal.clone())
                    }
                    DefinitionAccess::Write => symbol.db_writes.push(goal.clone()),
                    _ => {}
                }
            }
            if symbol.is_system() {
                return;
            }

            let parameters = match evidence.remove(&caller.signature) {
                Some(parameters) if caller.rule.is_some() => parameters,
                _ => caller
                    .parameters
                    .iter()
                    .enumerate()
                    .map(|(index, &parameter)| constant_source(ast, index, parameter, types))
                    .collect(),
            };
            let range = ast.range(caller.signature);
            let mut definition =
                SymbolDefinition::new(goal, range.span, range.start, kind, access, parameters);
            definition.comment = comment;
            symbol.definitions.push(definition);
            changed.insert(key);
        });

        for key in &changed {
            if let Some(symbol) = self.symbols.get_mut(key) {
                symbol.refresh_kind();
                symbol.invalidate();
            }
        }
        self.propagate(changed);
        callers
    }

    /// Strips everything a goal contributed.
    pub fn remove_goal(&mut self, goal: &str) {
        let mut changed = FxHashSet::default();
        for symbol in self.symbols.values_mut() {
            let before = symbol.definitions.len();
            symbol.definitions.retain(|d| d.goal != goal);
            symbol.usages.retain(|g| g != goal);
            symbol.db_reads.retain(|g| g != goal);
            symbol.db_writes.retain(|g| g != goal);
            if symbol.definitions.len() != before {
                symbol.refresh_kind();
                symbol.invalidate();
                changed.insert(symbol.key.clone());
            }
        }
        self.propagate(changed);
    }

    /// Flags every symbol whose definitions borrow types from a changed symbol.
    fn propagate(&mut self, changed: FxHashSet<SymbolKey>) {
        let mut seen = changed;
        let mut frontier: FxHashSet<SymbolKey> = seen.clone();
        while !frontier.is_empty() {
            let mut next = FxHashSet::default();
            for symbol in self.symbols.values_mut() {
                if !seen.contains(&symbol.key) && symbol.depends_on(&frontier) {
                    symbol.invalidate();
                    next.insert(symbol.key.clone());
                }
            }
            seen.extend(next.iter().cloned());
            frontier = next;
        }
    }

    /// Forces a full re-resolution, e.g. after goal weights changed.
    pub fn invalidate_all(&mut self) {
        for symbol in self.symbols.values_mut() {
            symbol.invalidate();
        }
    }

    /// Drops symbols nothing refers to anymore. Returns how many were removed.
    pub fn prune(&mut self) -> usize {
        let before = self.symbols.len();
        self.symbols.retain(|_, symbol| {
            symbol.is_system() || !symbol.definitions.is_empty() || !symbol.usages.is_empty()
        });
        before - self.symbols.len()
    }
}
