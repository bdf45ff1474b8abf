//! # Parameter checks
//!
//! Walks every call parameter of a goal and checks:
//!
//! - annotation type names exist
//! - arguments fit the resolved parameter type
//! - variables are bound before actions, comparisons and negations read them
//! - `[in]` parameters get bound values and `[out]` parameters no constants
//! - the `_` placeholder only appears in rule heads and conditions
//! - string members of enumerated parameters
//! - GUID constants against the level instances

use osiris_compiler_diagnostics::{Diagnostic, DiagnosticCode};
use osiris_compiler_parser::ast::{
    Caller, CallerRole, IdentifierKind, NodeKind, ParameterFlow, RuleNode,
};
use osiris_compiler_parser::guid::split_guid_string;
use osiris_compiler_parser::NodeId;

use super::{Analyzer, AnalyzerContext};
use crate::scope::{constant_type, Argument, RuleScope, ScopedParameter};
use crate::symbols::{Symbol, SymbolKind, SymbolParameter};
use crate::types::ValueType;

pub struct ParameterAnalyzer;

struct ParameterChecker<'c, 'a> {
    context: &'c AnalyzerContext<'a>,
    diagnostics: Vec<Diagnostic>,
}

impl<'c, 'a> ParameterChecker<'c, 'a> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    fn resolved_parameter(
        &self,
        caller: &Caller<'_>,
        index: usize,
    ) -> Option<(&'a Symbol, &'a SymbolParameter)> {
        let symbol = self.context.symbol(caller)?;
        if symbol.kind() == SymbolKind::Unknown {
            return None;
        }
        Some((symbol, symbol.parameters().get(index)?))
    }

    fn check_annotation(&mut self, parameter: NodeId) {
        let ast = self.context.goal.ast();
        if let Some(name) = ast.parameter_type(parameter) {
            if self.context.types.resolve(name).is_none() {
                self.report(
                    Diagnostic::error(DiagnosticCode::UnknownType, format!("Unknown type '{name}'"))
                        .with_location(ast.span(parameter)),
                );
            }
        }
    }

    fn check_type(&mut self, node: &RuleNode<'_>, found: &ValueType, is_string_constant: bool) {
        let Some(caller) = node.caller else {
            return;
        };
        let Some((symbol, parameter)) = self.resolved_parameter(&caller, node.index) else {
            return;
        };
        let types = self.context.types;
        let expected = &parameter.ty;
        // GUID strings are checked for shape by their own pass
        if is_string_constant && types.is_guid(expected) {
            return;
        }
        if !types.is_assignable(expected, found) {
            let ast = self.context.goal.ast();
            self.report(Diagnostic::type_mismatch(
                symbol.name(),
                node.index,
                &expected.to_string(),
                &found.to_string(),
                ast.span(node.parameter),
            ));
        }
    }

    /// Flow rules for a constant passed at `node`.
    fn check_constant(&mut self, node: &RuleNode<'_>) {
        let Some(caller) = node.caller else {
            return;
        };
        let Some((symbol, parameter)) = self.resolved_parameter(&caller, node.index) else {
            return;
        };
        if parameter.flow == Some(ParameterFlow::Out) {
            let span = self.context.goal.ast().span(node.parameter);
            self.report(
                Diagnostic::error(
                    DiagnosticCode::InvalidFlow,
                    format!(
                        "Parameter {} of '{}' is an [out] parameter and cannot take a constant",
                        node.index + 1,
                        symbol.key()
                    ),
                )
                .with_location(span),
            );
        }
        self.check_enumeration(node, symbol);
        self.check_instance(node, parameter);
    }

    fn check_enumeration(&mut self, node: &RuleNode<'_>, symbol: &Symbol) {
        let ast = self.context.goal.ast();
        let NodeKind::StringLiteral { value } = ast.kind(node.argument) else {
            return;
        };
        let Some(members) = self
            .context
            .environment
            .enumerations
            .get(&(symbol.key().clone(), node.index))
        else {
            return;
        };
        if !members.iter().any(|member| member == value) {
            self.report(
                Diagnostic::warning(
                    DiagnosticCode::InvalidEnumMember,
                    format!(
                        "'{value}' is not a valid value for parameter {} of '{}', expected one of: {}",
                        node.index + 1,
                        symbol.key(),
                        members.join(", ")
                    ),
                )
                .with_location(ast.span(node.argument)),
            );
        }
    }

    fn check_instance(&mut self, node: &RuleNode<'_>, parameter: &SymbolParameter) {
        let environment = self.context.environment;
        let types = self.context.types;
        if environment.instances.is_empty() || !types.is_guid(&parameter.ty) {
            return;
        }
        let ast = self.context.goal.ast();
        let text = match ast.kind(node.argument) {
            NodeKind::GuidLiteral { value } => value.as_str(),
            NodeKind::StringLiteral { value } => value.as_str(),
            _ => return,
        };
        let Some((name, guid)) = split_guid_string(text) else {
            return;
        };
        let span = ast.span(node.argument);
        let Some(instance) = environment.instance(guid) else {
            self.report(
                Diagnostic::warning(
                    DiagnosticCode::UnknownInstance,
                    format!("No level object has the GUID '{guid}'"),
                )
                .with_location(span),
            );
            return;
        };
        if let ValueType::Alias(alias) = &parameter.ty {
            if !instance.kind.eq_ignore_ascii_case(alias) {
                self.report(
                    Diagnostic::warning(
                        DiagnosticCode::InstanceKindMismatch,
                        format!(
                            "'{}' is a {}, parameter {} expects {alias}",
                            instance.name,
                            instance.kind,
                            node.index + 1
                        ),
                    )
                    .with_location(span),
                );
            }
        }
        if !name.is_empty() && name != instance.name {
            self.report(
                Diagnostic::warning(
                    DiagnosticCode::InstanceNameMismatch,
                    format!("GUID '{guid}' belongs to '{}', not '{name}'", instance.name),
                )
                .with_location(span),
            );
        }
    }

    fn check_rule(&mut self, rule: NodeId) {
        let context = self.context;
        let ast = context.goal.ast();
        let scope = RuleScope::build(ast, rule, context.types);
        let mut left_operand: Option<ValueType> = None;

        for parameter in scope.parameters() {
            self.check_annotation(parameter.node.parameter);
            let found = self.argument_type(&scope, parameter);
            self.check_flow(&scope, parameter);

            match parameter.node.caller {
                Some(_) => {
                    if let Some(found) = &found {
                        let is_string = parameter.argument == Argument::Constant(ValueType::String);
                        self.check_type(&parameter.node, found, is_string);
                    }
                    if matches!(parameter.argument, Argument::Constant(_)) {
                        self.check_constant(&parameter.node);
                    }
                }
                None if parameter.node.index == 0 => left_operand = found,
                None => {
                    let right = found.unwrap_or_default();
                    let left = left_operand.take().unwrap_or_default();
                    let types = context.types;
                    if !types.is_assignable(&left, &right) && !types.is_assignable(&right, &left) {
                        self.report(
                            Diagnostic::error(
                                DiagnosticCode::TypeMismatch,
                                format!("Cannot compare {left} with {right}"),
                            )
                            .with_location(ast.span(parameter.node.parameter)),
                        );
                    }
                }
            }
        }
    }

    /// Type of the value an argument carries, `None` when it carries none.
    fn argument_type(
        &self,
        scope: &RuleScope<'_>,
        parameter: &ScopedParameter<'_>,
    ) -> Option<ValueType> {
        if let Some(annotation) = &parameter.annotation {
            return Some(annotation.clone());
        }
        match &parameter.argument {
            Argument::Constant(ty) => Some(ty.clone()),
            Argument::Reference(name) => Some(scope.variable_type(name, self.context.symbols)),
            Argument::Binding(_) | Argument::Placeholder | Argument::Other => None,
        }
    }

    fn check_flow(&mut self, scope: &RuleScope<'_>, parameter: &ScopedParameter<'_>) {
        let ast = self.context.goal.ast();
        let node = &parameter.node;
        let role = node.caller.map(|caller| caller.role);
        let span = ast.span(node.argument);

        match &parameter.argument {
            Argument::Binding(name) => {
                let binds = scope.variable(name).is_some_and(|v| v.is_bound());
                if !binds {
                    self.report(Diagnostic::unbound_variable(name, span));
                    return;
                }
                let Some(caller) = node.caller else {
                    return;
                };
                if caller.role != CallerRole::Condition {
                    return;
                }
                if let Some((symbol, parameter)) = self.resolved_parameter(&caller, node.index) {
                    if parameter.flow == Some(ParameterFlow::In) {
                        self.report(
                            Diagnostic::error(
                                DiagnosticCode::InvalidFlow,
                                format!(
                                    "Parameter {} of '{}' is an [in] parameter and needs a bound value, '{name}' is not bound yet",
                                    node.index + 1,
                                    symbol.key()
                                ),
                            )
                            .with_location(span),
                        );
                    }
                }
            }
            Argument::Placeholder => {
                let allowed = matches!(role, Some(CallerRole::Condition | CallerRole::RuleHead(_)));
                if !allowed {
                    self.report(
                        Diagnostic::error(
                            DiagnosticCode::InvalidPlaceholder,
                            "The '_' placeholder can only be used in rule heads and conditions"
                                .to_string(),
                        )
                        .with_location(span),
                    );
                }
            }
            Argument::Constant(_) | Argument::Reference(_) | Argument::Other => {}
        }
    }

    /// INIT and EXIT actions run outside rules and only take constants.
    fn check_section_action(&mut self, caller: Caller<'_>) {
        let ast = self.context.goal.ast();
        for (index, &parameter) in caller.parameters.iter().enumerate() {
            let Some(argument) = ast.parameter_argument(parameter) else {
                continue;
            };
            self.check_annotation(parameter);
            let node = RuleNode {
                parameter,
                argument,
                caller: Some(caller),
                index,
            };
            match ast.kind(argument) {
                NodeKind::Identifier {
                    kind: IdentifierKind::Empty,
                    ..
                } => self.report(
                    Diagnostic::error(
                        DiagnosticCode::InvalidPlaceholder,
                        "The '_' placeholder can only be used in rule heads and conditions"
                            .to_string(),
                    )
                    .with_location(ast.span(argument)),
                ),
                NodeKind::Identifier {
                    name,
                    kind: IdentifierKind::Variable,
                } => {
                    self.report(Diagnostic::unbound_variable(name, ast.span(argument)))
                }
                other => {
                    if let Some(found) = constant_type(other) {
                        let found = ast
                            .parameter_type(parameter)
                            .and_then(|name| self.context.types.resolve(name))
                            .unwrap_or(found);
                        let is_string = matches!(other, NodeKind::StringLiteral { .. });
                        self.check_type(&node, &found, is_string);
                        self.check_constant(&node);
                    }
                }
            }
        }
    }
}

impl Analyzer for ParameterAnalyzer {
    fn analyze(&self, context: &AnalyzerContext<'_>) -> Vec<Diagnostic> {
        let ast = context.goal.ast();
        let mut checker = ParameterChecker {
            context,
            diagnostics: Vec::new(),
        };

        for &rule in ast.rules() {
            checker.check_rule(rule);
        }
        let mut section_actions = Vec::new();
        ast.each_caller(|caller| {
            if matches!(caller.role, CallerRole::InitAction | CallerRole::ExitAction) {
                section_actions.push(caller);
            }
        });
        for caller in section_actions {
            checker.check_section_action(caller);
        }

        checker.diagnostics
    }

    fn name(&self) -> &'static str {
        "ParameterAnalyzer"
    }
}
