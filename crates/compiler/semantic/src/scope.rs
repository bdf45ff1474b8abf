//! # Rule scopes
//!
//! Variables live for a single rule. A [`RuleScope`] walks the rule's
//! parameters in evaluation order (head, conditions, actions) and records, for
//! every variable, the call parameter that first mentions it. Later mentions
//! borrow their type from that binder.
//!
//! Scopes are rebuilt each time a rule is walked and are never stored on
//! symbols.

use indexmap::IndexMap;
use osiris_compiler_parser::ast::{CallerRole, IdentifierKind, NodeId, NodeKind, RuleNode};
use osiris_compiler_parser::Ast;
use smol_str::SmolStr;

use crate::symbols::{SymbolKey, Symbols};
use crate::types::{TypeRegistry, ValueType};

/// A rule-local variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: SmolStr,
    /// Name without the leading underscore
    pub display_name: SmolStr,
    /// Type given with an explicit `(TYPE)` annotation
    pub annotation: Option<ValueType>,
    /// Symbol and parameter position of the first mention
    pub from_symbol: Option<SymbolKey>,
    pub from_index: usize,
    /// Role of the call that first mentions the variable, `None` for comparisons
    pub bound_by: Option<CallerRole>,
    pub is_inverted: bool,
    pub binder: NodeId,
}

impl Variable {
    /// Whether the first mention actually produces a value.
    ///
    /// Only rule heads and non-negated conditions bind; a first mention
    /// anywhere else reads a variable that holds nothing.
    pub fn is_bound(&self) -> bool {
        matches!(
            self.bound_by,
            Some(CallerRole::RuleHead(_) | CallerRole::Condition)
        ) && !self.is_inverted
    }
}

/// What an argument contributes at its call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    Constant(ValueType),
    /// First mention of a variable
    Binding(SmolStr),
    /// Mention of a variable bound earlier in the rule
    Reference(SmolStr),
    /// The `_` placeholder
    Placeholder,
    /// Anything else, e.g. a bare name or a missing argument
    Other,
}

/// A rule parameter together with its argument classification.
#[derive(Debug, Clone)]
pub struct ScopedParameter<'a> {
    pub node: RuleNode<'a>,
    pub argument: Argument,
    /// Resolved `(TYPE)` annotation; `Invalid` when the type name is unknown
    pub annotation: Option<ValueType>,
}

#[derive(Debug, Clone, Default)]
pub struct RuleScope<'a> {
    variables: IndexMap<SmolStr, Variable>,
    parameters: Vec<ScopedParameter<'a>>,
}

/// Type of a literal argument, `None` when the node is not a literal.
pub fn constant_type(kind: &NodeKind) -> Option<ValueType> {
    match kind {
        NodeKind::IntegerLiteral { .. } => Some(ValueType::Integer),
        NodeKind::RealLiteral { .. } => Some(ValueType::Real),
        NodeKind::StringLiteral { .. } => Some(ValueType::String),
        NodeKind::GuidLiteral { .. } => Some(ValueType::GuidString),
        _ => None,
    }
}

impl<'a> RuleScope<'a> {
    /// Walks `rule` and classifies every parameter.
    pub fn build(ast: &'a Ast, rule: NodeId, types: &TypeRegistry) -> Self {
        let mut scope = Self::default();
        ast.each_rule_node(rule, |node| {
            let annotation = ast
                .parameter_type(node.parameter)
                .map(|name| types.resolve(name).unwrap_or(ValueType::Invalid));
            let argument = match ast.kind(node.argument) {
                NodeKind::Identifier {
                    name,
                    kind: IdentifierKind::Variable,
                } => {
                    if scope.variables.contains_key(name) {
                        Argument::Reference(name.clone())
                    } else {
                        scope.bind(name, node, annotation.clone());
                        Argument::Binding(name.clone())
                    }
                }
                NodeKind::Identifier {
                    kind: IdentifierKind::Empty,
                    ..
                } => Argument::Placeholder,
                other => constant_type(other).map_or(Argument::Other, Argument::Constant),
            };
            scope.parameters.push(ScopedParameter {
                node,
                argument,
                annotation,
            });
        });
        scope
    }

    fn bind(&mut self, name: &SmolStr, node: RuleNode<'_>, annotation: Option<ValueType>) {
        let caller = node.caller;
        self.variables.insert(
            name.clone(),
            Variable {
                name: name.clone(),
                display_name: SmolStr::new(name.trim_start_matches('_')),
                annotation,
                from_symbol: caller.map(|c| SymbolKey::new(c.name, c.arity())),
                from_index: node.index,
                bound_by: caller.map(|c| c.role),
                is_inverted: caller.is_some_and(|c| c.is_inverted),
                binder: node.argument,
            },
        );
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.values()
    }

    /// Parameters of the rule in evaluation order.
    pub fn parameters(&self) -> &[ScopedParameter<'a>] {
        &self.parameters
    }

    /// Inferred type of a variable: its annotation if any, else the resolved
    /// type of the parameter that binds it.
    pub fn variable_type(&self, name: &str, symbols: &Symbols) -> ValueType {
        let Some(variable) = self.variables.get(name) else {
            return ValueType::Unknown;
        };
        if let Some(annotation) = &variable.annotation {
            return annotation.clone();
        }
        variable
            .from_symbol
            .as_ref()
            .and_then(|key| symbols.get(key))
            .and_then(|symbol| symbol.parameters().get(variable.from_index))
            .map(|parameter| parameter.ty.clone())
            .unwrap_or_default()
    }
}
