//! # Syntax tree
//!
//! Nodes live in a per-goal arena ([`Ast`]) and refer to each other by
//! [`NodeId`]. Every node carries its byte span and packed start/end
//! positions; a composite node spans from its first to its last consumed token.
//!
//! Nothing in the tree points at semantic data. Resolved symbols are kept in
//! side tables keyed by node id.

use chumsky::span::SimpleSpan;
use index_vec::IndexVec;
use smallvec::SmallVec;
use smol_str::SmolStr;

use crate::position::PackedPosition;

index_vec::define_index_type! {
    /// Index of a node inside its goal's [`Ast`]
    pub struct NodeId = u32;

    MAX_INDEX = u32::MAX as usize;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRange {
    pub span: SimpleSpan<usize>,
    pub start: PackedPosition,
    pub end: PackedPosition,
}

impl NodeRange {
    /// An empty range located at `offset`.
    pub fn empty(offset: usize, position: PackedPosition) -> Self {
        Self {
            span: SimpleSpan::from(offset..offset),
            start: position,
            end: position,
        }
    }

    pub fn union(self, other: Self) -> Self {
        let (start, start_pos) = if other.span.start < self.span.start {
            (other.span.start, other.start)
        } else {
            (self.span.start, self.start)
        };
        let (end, end_pos) = if other.span.end > self.span.end {
            (other.span.end, other.end)
        } else {
            (self.span.end, self.end)
        };
        Self {
            span: SimpleSpan::from(start..end),
            start: start_pos,
            end: end_pos,
        }
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.span.start <= offset && offset <= self.span.end
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub range: NodeRange,
}

/// Lexical classification of identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentifierKind {
    /// `DB_` prefixed fact
    Database,
    /// The `_` placeholder
    Empty,
    /// Rule-local `_Name`
    Variable,
    Default,
}

impl IdentifierKind {
    pub fn classify(name: &str) -> Self {
        if name.starts_with("DB_") {
            Self::Database
        } else if name == "_" {
            Self::Empty
        } else if name.starts_with('_') {
            Self::Variable
        } else {
            Self::Default
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    If,
    Proc,
    Query,
}

impl RuleKind {
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::If => "IF",
            Self::Proc => "PROC",
            Self::Query => "QRY",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterFlow {
    In,
    Out,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

/// Declaration keyword of a header definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefinitionKind {
    Call,
    Event,
    Query,
    SysCall,
    SysQuery,
}

impl DefinitionKind {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "call" => Some(Self::Call),
            "event" => Some(Self::Event),
            "query" => Some(Self::Query),
            "syscall" => Some(Self::SysCall),
            "sysquery" => Some(Self::SysQuery),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionPlacement {
    Header,
    Footer,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Integer(i64),
    Identifier(SmolStr),
    String(String),
    Missing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GoalOption {
    pub name: SmolStr,
    pub value: OptionValue,
    pub placement: OptionPlacement,
    pub range: NodeRange,
}

/// Base of a header `alias_type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasBase {
    Named(SmolStr),
    Id(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeAlias {
    pub name: SmolStr,
    pub base: AliasBase,
    pub range: NodeRange,
}

/// Dedented contents of a header goal's INIT, KB or EXIT block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSection {
    pub text: String,
    /// Header offset of the first byte of each line of `text`
    pub line_origins: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    StoryGoal {
        options: Vec<GoalOption>,
        init: NodeId,
        rules: Vec<NodeId>,
        exit: NodeId,
    },
    Rule {
        kind: RuleKind,
        signature: NodeId,
        conditions: NodeId,
        actions: NodeId,
        region: Option<SmolStr>,
        comment: Option<String>,
    },
    Signature {
        identifier: NodeId,
        parameters: Vec<NodeId>,
    },
    Parameter {
        flow: Option<ParameterFlow>,
        type_annotation: Option<NodeId>,
        argument: NodeId,
    },
    ActionBlock {
        actions: Vec<NodeId>,
    },
    ConditionBlock {
        conditions: Vec<NodeId>,
    },
    SignatureAction {
        signature: NodeId,
        is_inverted: bool,
    },
    SignatureCondition {
        signature: NodeId,
        is_inverted: bool,
    },
    OperatorCondition {
        operator: Operator,
        left: NodeId,
        right: NodeId,
    },
    Identifier {
        name: SmolStr,
        kind: IdentifierKind,
    },
    IntegerLiteral {
        value: i64,
    },
    RealLiteral {
        value: f64,
    },
    StringLiteral {
        value: String,
    },
    GuidLiteral {
        value: SmolStr,
    },
    TypeAnnotation {
        name: SmolStr,
    },
    GoalCompletedAction,
    Div {
        definitions: Vec<NodeId>,
        goals: Vec<NodeId>,
        aliases: Vec<TypeAlias>,
    },
    DivGoal {
        id: i64,
        title: String,
        sub_goals: Vec<i64>,
        init: HeaderSection,
        kb: HeaderSection,
        exit: HeaderSection,
    },
    Definition {
        kind: DefinitionKind,
        signature: NodeId,
    },
}

/// Where a call site sits inside a goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallerRole {
    RuleHead(RuleKind),
    Condition,
    Action,
    InitAction,
    ExitAction,
}

impl CallerRole {
    pub const fn is_action(self) -> bool {
        matches!(self, Self::Action | Self::InitAction | Self::ExitAction)
    }
}

/// A signature that calls or defines a symbol.
#[derive(Debug, Clone, Copy)]
pub struct Caller<'a> {
    pub signature: NodeId,
    pub identifier: NodeId,
    pub name: &'a str,
    pub parameters: &'a [NodeId],
    pub role: CallerRole,
    pub is_inverted: bool,
    /// Enclosing rule, `None` for init and exit actions
    pub rule: Option<NodeId>,
}

impl Caller<'_> {
    pub fn arity(&self) -> usize {
        self.parameters.len()
    }
}

/// A parameter visited by [`Ast::each_rule_node`].
#[derive(Debug, Clone, Copy)]
pub struct RuleNode<'a> {
    pub parameter: NodeId,
    pub argument: NodeId,
    /// The call this parameter belongs to, `None` for comparison operands
    pub caller: Option<Caller<'a>>,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ast {
    nodes: IndexVec<NodeId, Node>,
    root: NodeId,
}

impl Ast {
    pub(crate) fn new(nodes: IndexVec<NodeId, Node>, root: NodeId) -> Self {
        Self { nodes, root }
    }

    pub const fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id].kind
    }

    pub fn range(&self, id: NodeId) -> NodeRange {
        self.nodes[id].range
    }

    pub fn span(&self, id: NodeId) -> SimpleSpan<usize> {
        self.nodes[id].range.span
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Direct children of `id` in source order.
    pub fn children(&self, id: NodeId) -> SmallVec<[NodeId; 8]> {
        let mut children = SmallVec::new();
        match self.kind(id) {
            NodeKind::StoryGoal {
                init, rules, exit, ..
            } => {
                children.push(*init);
                children.extend(rules.iter().copied());
                children.push(*exit);
            }
            NodeKind::Rule {
                signature,
                conditions,
                actions,
                ..
            } => children.extend([*signature, *conditions, *actions]),
            NodeKind::Signature {
                identifier,
                parameters,
            } => {
                // A dotted signature lists its implicit first parameter before the name
                let (before, after): (SmallVec<[NodeId; 8]>, SmallVec<[NodeId; 8]>) = parameters
                    .iter()
                    .copied()
                    .partition(|&p| self.span(p).start < self.span(*identifier).start);
                children.extend(before);
                children.push(*identifier);
                children.extend(after);
            }
            NodeKind::Parameter {
                type_annotation,
                argument,
                ..
            } => {
                children.extend(type_annotation.iter().copied());
                children.push(*argument);
            }
            NodeKind::ActionBlock { actions } => children.extend(actions.iter().copied()),
            NodeKind::ConditionBlock { conditions } => {
                children.extend(conditions.iter().copied())
            }
            NodeKind::SignatureAction { signature, .. }
            | NodeKind::SignatureCondition { signature, .. }
            | NodeKind::Definition { signature, .. } => children.push(*signature),
            NodeKind::OperatorCondition { left, right, .. } => {
                children.extend([*left, *right]);
            }
            NodeKind::Div {
                definitions, goals, ..
            } => {
                children.extend(definitions.iter().copied());
                children.extend(goals.iter().copied());
                children.sort_by_key(|&child| self.span(child).start);
            }
            NodeKind::Identifier { .. }
            | NodeKind::IntegerLiteral { .. }
            | NodeKind::RealLiteral { .. }
            | NodeKind::StringLiteral { .. }
            | NodeKind::GuidLiteral { .. }
            | NodeKind::TypeAnnotation { .. }
            | NodeKind::GoalCompletedAction
            | NodeKind::DivGoal { .. } => {}
        }
        children
    }

    /// Visits the direct children of `id`.
    pub fn each_node(&self, id: NodeId, mut f: impl FnMut(NodeId)) {
        for child in self.children(id) {
            f(child);
        }
    }

    /// Visits `id` and all of its descendants in pre-order.
    pub fn each_node_recursive(&self, id: NodeId, mut f: impl FnMut(NodeId)) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            f(current);
            stack.extend(self.children(current).into_iter().rev());
        }
    }

    /// Rules of the goal's knowledge base section.
    pub fn rules(&self) -> &[NodeId] {
        match self.kind(self.root) {
            NodeKind::StoryGoal { rules, .. } => rules,
            _ => &[],
        }
    }

    pub fn options(&self) -> &[GoalOption] {
        match self.kind(self.root) {
            NodeKind::StoryGoal { options, .. } => options,
            _ => &[],
        }
    }

    /// Parent goal names declared with `ParentTargetEdge`.
    pub fn parent_edges(&self) -> impl Iterator<Item = (&str, NodeRange)> + '_ {
        self.options().iter().filter_map(|option| match &option.value {
            OptionValue::String(parent) if option.name == "ParentTargetEdge" => {
                Some((parent.as_str(), option.range))
            }
            _ => None,
        })
    }

    pub fn identifier_name(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::Identifier { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Name node and parameter nodes of a signature.
    pub fn signature_parts(&self, id: NodeId) -> Option<(NodeId, &str, &[NodeId])> {
        match self.kind(id) {
            NodeKind::Signature {
                identifier,
                parameters,
            } => Some((
                *identifier,
                self.identifier_name(*identifier).unwrap_or_default(),
                parameters,
            )),
            _ => None,
        }
    }

    fn caller(
        &self,
        signature: NodeId,
        role: CallerRole,
        is_inverted: bool,
        rule: Option<NodeId>,
    ) -> Option<Caller<'_>> {
        let (identifier, name, parameters) = self.signature_parts(signature)?;
        if name.is_empty() {
            return None;
        }
        Some(Caller {
            signature,
            identifier,
            name,
            parameters,
            role,
            is_inverted,
            rule,
        })
    }

    fn block_callers<'a>(
        &'a self,
        block: NodeId,
        role: CallerRole,
        rule: Option<NodeId>,
        f: &mut impl FnMut(Caller<'a>),
    ) {
        let items: &[NodeId] = match self.kind(block) {
            NodeKind::ActionBlock { actions } => actions,
            NodeKind::ConditionBlock { conditions } => conditions,
            _ => return,
        };
        for &item in items {
            let (signature, is_inverted) = match self.kind(item) {
                NodeKind::SignatureAction {
                    signature,
                    is_inverted,
                }
                | NodeKind::SignatureCondition {
                    signature,
                    is_inverted,
                } => (*signature, *is_inverted),
                _ => continue,
            };
            if let Some(caller) = self.caller(signature, role, is_inverted, rule) {
                f(caller);
            }
        }
    }

    /// Visits the callers of a single rule: its head, then conditions, then actions.
    pub fn each_rule_caller<'a>(&'a self, rule: NodeId, mut f: impl FnMut(Caller<'a>)) {
        let NodeKind::Rule {
            kind,
            signature,
            conditions,
            actions,
            ..
        } = self.kind(rule)
        else {
            return;
        };
        if let Some(head) = self.caller(*signature, CallerRole::RuleHead(*kind), false, Some(rule))
        {
            f(head);
        }
        self.block_callers(*conditions, CallerRole::Condition, Some(rule), &mut f);
        self.block_callers(*actions, CallerRole::Action, Some(rule), &mut f);
    }

    /// Visits every call site of a goal in source order.
    pub fn each_caller<'a>(&'a self, mut f: impl FnMut(Caller<'a>)) {
        let NodeKind::StoryGoal {
            init, rules, exit, ..
        } = self.kind(self.root)
        else {
            return;
        };
        self.block_callers(*init, CallerRole::InitAction, None, &mut f);
        for &rule in rules {
            self.each_rule_caller(rule, &mut f);
        }
        self.block_callers(*exit, CallerRole::ExitAction, None, &mut f);
    }

    pub fn callers(&self) -> Vec<Caller<'_>> {
        let mut callers = Vec::new();
        self.each_caller(|caller| callers.push(caller));
        callers
    }

    /// Visits every parameter of a rule in evaluation order: head parameters,
    /// then conditions (call parameters and comparison operands), then actions.
    pub fn each_rule_node<'a>(&'a self, rule: NodeId, mut f: impl FnMut(RuleNode<'a>)) {
        let NodeKind::Rule {
            conditions,
            actions,
            ..
        } = self.kind(rule)
        else {
            return;
        };
        let visit_caller = |caller: Caller<'a>, f: &mut dyn FnMut(RuleNode<'a>)| {
            for (index, &parameter) in caller.parameters.iter().enumerate() {
                if let Some(argument) = self.parameter_argument(parameter) {
                    f(RuleNode {
                        parameter,
                        argument,
                        caller: Some(caller),
                        index,
                    });
                }
            }
        };

        let mut head = None;
        self.each_rule_caller(rule, |caller| {
            if matches!(caller.role, CallerRole::RuleHead(_)) {
                head = Some(caller);
            }
        });
        if let Some(head) = head {
            visit_caller(head, &mut f);
        }

        if let NodeKind::ConditionBlock { conditions } = self.kind(*conditions) {
            for &condition in conditions {
                match self.kind(condition) {
                    NodeKind::SignatureCondition {
                        signature,
                        is_inverted,
                    } => {
                        if let Some(caller) = self.caller(
                            *signature,
                            CallerRole::Condition,
                            *is_inverted,
                            Some(rule),
                        ) {
                            visit_caller(caller, &mut f);
                        }
                    }
                    NodeKind::OperatorCondition { left, right, .. } => {
                        for (index, &parameter) in [*left, *right].iter().enumerate() {
                            if let Some(argument) = self.parameter_argument(parameter) {
                                f(RuleNode {
                                    parameter,
                                    argument,
                                    caller: None,
                                    index,
                                });
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        let mut action_callers = Vec::new();
        self.block_callers(*actions, CallerRole::Action, Some(rule), &mut |caller| {
            action_callers.push(caller)
        });
        for caller in action_callers {
            visit_caller(caller, &mut f);
        }
    }

    pub fn parameter_argument(&self, parameter: NodeId) -> Option<NodeId> {
        match self.kind(parameter) {
            NodeKind::Parameter { argument, .. } => Some(*argument),
            _ => None,
        }
    }

    /// Explicit `(TYPE)` annotation of a parameter, if any.
    pub fn parameter_type(&self, parameter: NodeId) -> Option<&str> {
        match self.kind(parameter) {
            NodeKind::Parameter {
                type_annotation: Some(annotation),
                ..
            } => match self.kind(*annotation) {
                NodeKind::TypeAnnotation { name } => Some(name),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn parameter_flow(&self, parameter: NodeId) -> Option<ParameterFlow> {
        match self.kind(parameter) {
            NodeKind::Parameter { flow, .. } => *flow,
            _ => None,
        }
    }

    /// Deepest node whose range contains `offset`.
    pub fn node_at(&self, offset: usize) -> NodeId {
        let mut current = self.root;
        'descend: loop {
            for child in self.children(current) {
                if self.range(child).contains(offset) {
                    current = child;
                    continue 'descend;
                }
            }
            return current;
        }
    }
}
