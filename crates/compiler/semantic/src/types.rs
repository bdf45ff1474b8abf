//! # Value types
//!
//! Osiris has five built-in value types plus the type aliases declared in the
//! story header. Every alias in practice names a kind of game object and is
//! based on `GUIDSTRING`, but the header may base an alias on any built-in.
//!
//! ## Assignability
//!
//! - identical types are always compatible
//! - an `INTEGER` value fits an `INTEGER64` slot
//! - an untyped `GUIDSTRING` fits any GUID alias and the other way around
//! - `Unknown` and `Invalid` never produce mismatches, they were already
//!   reported (or will be) somewhere else

use std::fmt;

use osiris_compiler_parser::ast::{AliasBase, TypeAlias};
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ValueType {
    /// Not determined yet
    #[default]
    Unknown,
    /// Determined to be contradictory or unknown by name
    Invalid,
    Integer,
    Integer64,
    Real,
    String,
    GuidString,
    /// A header `alias_type`
    Alias(SmolStr),
}

impl ValueType {
    /// Built-in type by its header/annotation name.
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "INTEGER" => Some(Self::Integer),
            "INTEGER64" => Some(Self::Integer64),
            "REAL" => Some(Self::Real),
            "STRING" => Some(Self::String),
            "GUIDSTRING" => Some(Self::GuidString),
            _ => None,
        }
    }

    /// Built-in type by its numeric id in compiled story headers.
    pub const fn from_type_id(id: i64) -> Option<Self> {
        match id {
            1 => Some(Self::Integer),
            2 => Some(Self::Integer64),
            3 => Some(Self::Real),
            4 => Some(Self::String),
            5 => Some(Self::GuidString),
            _ => None,
        }
    }

    /// Whether the type carries information usable for checks.
    pub const fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown | Self::Invalid)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "?"),
            Self::Invalid => write!(f, "<invalid>"),
            Self::Integer => write!(f, "INTEGER"),
            Self::Integer64 => write!(f, "INTEGER64"),
            Self::Real => write!(f, "REAL"),
            Self::String => write!(f, "STRING"),
            Self::GuidString => write!(f, "GUIDSTRING"),
            Self::Alias(name) => write!(f, "{name}"),
        }
    }
}

/// Type names known to a story: the built-ins plus header aliases.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    aliases: FxHashMap<SmolStr, ValueType>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a header alias. Returns `false` when its base is not a
    /// built-in type, in which case the alias falls back to `GUIDSTRING`.
    pub fn register_alias(&mut self, alias: &TypeAlias) -> bool {
        let base = match &alias.base {
            AliasBase::Named(name) => ValueType::builtin(name),
            AliasBase::Id(id) => ValueType::from_type_id(*id),
        };
        let known = base.is_some();
        self.aliases
            .insert(alias.name.clone(), base.unwrap_or(ValueType::GuidString));
        known
    }

    pub fn clear(&mut self) {
        self.aliases.clear();
    }

    pub fn aliases(&self) -> impl Iterator<Item = &SmolStr> {
        self.aliases.keys()
    }

    /// Resolves a type name, `None` when the name is neither built-in nor an alias.
    pub fn resolve(&self, name: &str) -> Option<ValueType> {
        ValueType::builtin(name).or_else(|| {
            self.aliases
                .get_key_value(name)
                .map(|(alias, _)| ValueType::Alias(alias.clone()))
        })
    }

    /// Built-in type an alias stands for; built-ins map to themselves.
    pub fn base_of(&self, ty: &ValueType) -> ValueType {
        match ty {
            ValueType::Alias(name) => self
                .aliases
                .get(name)
                .cloned()
                .unwrap_or(ValueType::GuidString),
            other => other.clone(),
        }
    }

    /// Whether values of this type are GUIDs.
    pub fn is_guid(&self, ty: &ValueType) -> bool {
        self.base_of(ty) == ValueType::GuidString
    }

    /// Whether a `found` value may be passed where `expected` is required.
    pub fn is_assignable(&self, expected: &ValueType, found: &ValueType) -> bool {
        if !expected.is_known() || !found.is_known() || expected == found {
            return true;
        }
        match (expected, found) {
            (ValueType::Integer64, ValueType::Integer) => true,
            (ValueType::Alias(_), ValueType::GuidString) | (ValueType::GuidString, ValueType::Alias(_)) => {
                self.is_guid(expected) && self.is_guid(found)
            }
            (ValueType::Alias(_), ValueType::Alias(_)) => false,
            // Aliases over non-GUID built-ins behave like their base
            (ValueType::Alias(_), _) | (_, ValueType::Alias(_)) => {
                !self.is_guid(expected)
                    && !self.is_guid(found)
                    && self.is_assignable(&self.base_of(expected), &self.base_of(found))
            }
            _ => false,
        }
    }
}
