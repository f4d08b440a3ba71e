// standard.rs — The standard baseline and the default safety policy.
//
// `Configuration::standard()` starts from this table instead of from
// nothing. It contains:
//
// - the scalar types and the two generic containers,
// - every standard expression kind,
// - a small set of accessors on text and containers that are read-only,
//   side-effect free, cheap, and reveal nothing beyond size.
//
// The accessor set stays minimal. Anything that reads content (first
// element, lookups by key, substrings) must be allowed explicitly.

use crate::accessor::{Accessor, AccessorRoot};
use crate::configuration::{TypeConstructor, TypeKind};
use crate::expression::ExpressionKind;
use crate::value::{Value, ValueType};

pub const BOOL: &str = "core.Bool";
pub const INT: &str = "core.Int";
pub const DOUBLE: &str = "core.Double";
pub const STRING: &str = "core.String";
pub const CHARACTER: &str = "core.Character";
pub const ARRAY: &str = "core.Array";
pub const DICTIONARY: &str = "core.Dictionary";

/// Type argument of a variable node: the caller's `Input` type. It is
/// implicitly allowed on both sides and cannot be bound in a configuration.
pub const INPUT: &str = "input.0";

/// Prefix of the standard identifier of every expression kind.
pub const EXPRESSION_PREFIX: &str = "expr.";

/// Standard identifier of an expression kind, e.g. `expr.Conjunction`.
pub fn expression_identifier(kind: ExpressionKind) -> String {
    format!("{}{}", EXPRESSION_PREFIX, kind.name())
}

/// Every type binding in the standard baseline.
pub fn types() -> Vec<(String, TypeKind)> {
    let mut types = vec![
        (BOOL.to_string(), TypeKind::Full(ValueType::Bool)),
        (INT.to_string(), TypeKind::Full(ValueType::Int)),
        (DOUBLE.to_string(), TypeKind::Full(ValueType::Double)),
        (STRING.to_string(), TypeKind::Full(ValueType::String)),
        (CHARACTER.to_string(), TypeKind::Full(ValueType::Character)),
        (ARRAY.to_string(), TypeKind::Partial(TypeConstructor::Array)),
        (
            DICTIONARY.to_string(),
            TypeKind::Partial(TypeConstructor::Dictionary),
        ),
    ];
    for kind in ExpressionKind::ALL {
        types.push((
            expression_identifier(kind),
            TypeKind::Partial(TypeConstructor::Expression(kind)),
        ));
    }
    types
}

/// The default safe accessors and their identifiers.
pub fn default_accessors() -> Vec<(&'static str, Accessor)> {
    vec![
        ("String.isEmpty", string_accessor(IS_EMPTY)),
        ("String.count", string_accessor(COUNT)),
        ("Array.isEmpty", family_accessor(AccessorRoot::AnyArray, IS_EMPTY)),
        ("Array.count", family_accessor(AccessorRoot::AnyArray, COUNT)),
        (
            "Dictionary.isEmpty",
            family_accessor(AccessorRoot::AnyDictionary, IS_EMPTY),
        ),
        (
            "Dictionary.count",
            family_accessor(AccessorRoot::AnyDictionary, COUNT),
        ),
    ]
}

/// `isEmpty` on a string, array or dictionary root.
pub fn is_empty(root: &ValueType) -> Option<Accessor> {
    accessor_for(root, IS_EMPTY)
}

/// `count` on a string, array or dictionary root. Strings count characters.
pub fn count(root: &ValueType) -> Option<Accessor> {
    accessor_for(root, COUNT)
}

struct Member {
    name: &'static str,
    value: fn() -> ValueType,
    read: fn(&Value) -> Option<Value>,
}

const IS_EMPTY: Member = Member {
    name: "isEmpty",
    value: bool_type,
    read: read_is_empty,
};

const COUNT: Member = Member {
    name: "count",
    value: int_type,
    read: read_count,
};

fn bool_type() -> ValueType {
    ValueType::Bool
}

fn int_type() -> ValueType {
    ValueType::Int
}

fn accessor_for(root: &ValueType, member: Member) -> Option<Accessor> {
    match root {
        ValueType::String => Some(string_accessor(member)),
        ValueType::Array(_) => Some(family_accessor(AccessorRoot::AnyArray, member)),
        ValueType::Dictionary(_) => Some(family_accessor(AccessorRoot::AnyDictionary, member)),
        _ => None,
    }
}

fn string_accessor(member: Member) -> Accessor {
    family_accessor(AccessorRoot::Type(ValueType::String), member)
}

fn family_accessor(root: AccessorRoot, member: Member) -> Accessor {
    Accessor::computed(root, member.name, (member.value)(), member.read)
}

fn read_is_empty(value: &Value) -> Option<Value> {
    match value {
        Value::String(s) => Some(Value::Bool(s.is_empty())),
        Value::Array(items) => Some(Value::Bool(items.is_empty())),
        Value::Dictionary(entries) => Some(Value::Bool(entries.is_empty())),
        _ => None,
    }
}

fn read_count(value: &Value) -> Option<Value> {
    let count = match value {
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        Value::Dictionary(entries) => entries.len(),
        _ => return None,
    };
    i64::try_from(count).ok().map(Value::Int)
}
