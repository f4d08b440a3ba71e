// value.rs — Dynamic values and the types a predicate can observe.
//
// Predicates evaluate over `Value`s. Every value has a `ValueType`, and the
// set of value types is closed: scalars, UUIDs, homogeneous arrays,
// string-keyed dictionaries, and host records. Records are the only
// extension point. A host declares a `RecordType` once (usually as a
// `static`) together with the accessors it is willing to expose.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::accessor::Accessor;

/// A host composite type that predicates may read fields from.
///
/// `provided_accessors` is the record's self-declared accessor set: the
/// identifiers and accessors the record's author considers safe to expose.
/// [`Configuration::allow_accessors_provided_by`](crate::Configuration::allow_accessors_provided_by)
/// consumes it for bulk registration.
pub struct RecordType {
    /// Stable name, unique per host. Two record types are the same type
    /// exactly when their names match.
    pub name: &'static str,
    /// The record's self-declared `{identifier → accessor}` set.
    pub provided_accessors: fn() -> Vec<(&'static str, Accessor)>,
}

fn no_accessors() -> Vec<(&'static str, Accessor)> {
    Vec::new()
}

impl RecordType {
    /// A record type with a self-declared accessor set.
    pub const fn new(
        name: &'static str,
        provided_accessors: fn() -> Vec<(&'static str, Accessor)>,
    ) -> Self {
        Self {
            name,
            provided_accessors,
        }
    }

    /// A record type that declares no accessors of its own.
    pub const fn opaque(name: &'static str) -> Self {
        Self::new(name, no_accessors)
    }
}

impl PartialEq for RecordType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for RecordType {}

impl Hash for RecordType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Debug for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RecordType").field(&self.name).finish()
    }
}

/// The static type of a value or of an expression's output.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
    Bool,
    Int,
    Double,
    String,
    Character,
    Uuid,
    /// Homogeneous array.
    Array(Box<ValueType>),
    /// Dictionary keyed by strings.
    Dictionary(Box<ValueType>),
    Record(&'static RecordType),
}

impl ValueType {
    /// Shorthand for `ValueType::Array(Box::new(element))`.
    pub fn array(element: ValueType) -> Self {
        ValueType::Array(Box::new(element))
    }

    /// Shorthand for `ValueType::Dictionary(Box::new(value))`.
    pub fn dictionary(value: ValueType) -> Self {
        ValueType::Dictionary(Box::new(value))
    }

    /// Whether values of this type can appear as literals in an archive.
    ///
    /// Records cannot: their fields are only reachable through accessors.
    pub fn is_literal(&self) -> bool {
        match self {
            ValueType::Record(_) => false,
            ValueType::Array(element) | ValueType::Dictionary(element) => element.is_literal(),
            _ => true,
        }
    }

    /// Whether values of this type have a total order for comparisons.
    pub fn is_comparable(&self) -> bool {
        matches!(
            self,
            ValueType::Int | ValueType::Double | ValueType::String | ValueType::Character
        )
    }

    /// Whether `value` is a value of this type.
    pub fn conforms(&self, value: &Value) -> bool {
        match (self, value) {
            (ValueType::Bool, Value::Bool(_))
            | (ValueType::Int, Value::Int(_))
            | (ValueType::Double, Value::Double(_))
            | (ValueType::String, Value::String(_))
            | (ValueType::Character, Value::Character(_))
            | (ValueType::Uuid, Value::Uuid(_)) => true,
            (ValueType::Array(element), Value::Array(items)) => {
                items.iter().all(|item| element.conforms(item))
            }
            (ValueType::Dictionary(element), Value::Dictionary(entries)) => {
                entries.values().all(|item| element.conforms(item))
            }
            (ValueType::Record(ty), Value::Record(record)) => *ty == record.record_type(),
            _ => false,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Bool => write!(f, "Bool"),
            ValueType::Int => write!(f, "Int"),
            ValueType::Double => write!(f, "Double"),
            ValueType::String => write!(f, "String"),
            ValueType::Character => write!(f, "Character"),
            ValueType::Uuid => write!(f, "Uuid"),
            ValueType::Array(element) => write!(f, "Array<{}>", element),
            ValueType::Dictionary(element) => write!(f, "Dictionary<String, {}>", element),
            ValueType::Record(ty) => write!(f, "{}", ty.name),
        }
    }
}

/// An instance of a host record: its type plus named field values.
#[derive(Debug, Clone)]
pub struct Record {
    ty: &'static RecordType,
    fields: BTreeMap<&'static str, Value>,
}

impl Record {
    pub fn new(ty: &'static RecordType) -> Self {
        Self {
            ty,
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field assignment.
    pub fn with(mut self, name: &'static str, value: impl PredicateInput) -> Self {
        self.fields.insert(name, value.to_value());
        self
    }

    /// Builder-style assignment of an already converted value.
    pub fn with_value(mut self, name: &'static str, value: Value) -> Self {
        self.fields.insert(name, value);
        self
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn record_type(&self) -> &'static RecordType {
        self.ty
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty && self.fields == other.fields
    }
}

/// A dynamic value observed by a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Character(char),
    Uuid(Uuid),
    Array(Vec<Value>),
    Dictionary(BTreeMap<String, Value>),
    Record(Record),
}

impl Value {
    /// A short name for the value's runtime shape, for diagnostics.
    pub fn type_name(&self) -> String {
        match self {
            Value::Bool(_) => "Bool".to_string(),
            Value::Int(_) => "Int".to_string(),
            Value::Double(_) => "Double".to_string(),
            Value::String(_) => "String".to_string(),
            Value::Character(_) => "Character".to_string(),
            Value::Uuid(_) => "Uuid".to_string(),
            Value::Array(_) => "Array".to_string(),
            Value::Dictionary(_) => "Dictionary".to_string(),
            Value::Record(record) => record.record_type().name.to_string(),
        }
    }

    /// Ordering between two values of the same comparable type.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Double(a), Value::Double(b)) => a.partial_cmp(b),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Character(a), Value::Character(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Encode as a JSON literal. `None` for records and non-finite doubles.
    pub(crate) fn to_literal(&self) -> Option<JsonValue> {
        Some(match self {
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Int(i) => JsonValue::from(*i),
            Value::Double(d) => JsonValue::Number(serde_json::Number::from_f64(*d)?),
            Value::String(s) => JsonValue::String(s.clone()),
            Value::Character(c) => JsonValue::String(c.to_string()),
            Value::Uuid(u) => JsonValue::String(u.hyphenated().to_string()),
            Value::Array(items) => JsonValue::Array(
                items
                    .iter()
                    .map(Value::to_literal)
                    .collect::<Option<Vec<_>>>()?,
            ),
            Value::Dictionary(entries) => {
                let mut map = serde_json::Map::new();
                for (key, item) in entries {
                    map.insert(key.clone(), item.to_literal()?);
                }
                JsonValue::Object(map)
            }
            Value::Record(_) => return None,
        })
    }

    /// Decode a JSON literal as a value of type `ty`. `None` when the JSON
    /// does not have the shape `ty` requires.
    pub(crate) fn from_literal(json: &JsonValue, ty: &ValueType) -> Option<Value> {
        match ty {
            ValueType::Bool => json.as_bool().map(Value::Bool),
            ValueType::Int => json.as_i64().map(Value::Int),
            ValueType::Double => json.as_f64().map(Value::Double),
            ValueType::String => json.as_str().map(|s| Value::String(s.to_string())),
            ValueType::Character => {
                let mut chars = json.as_str()?.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(Value::Character(c)),
                    _ => None,
                }
            }
            ValueType::Uuid => json
                .as_str()
                .and_then(|s| Uuid::parse_str(s).ok())
                .map(Value::Uuid),
            ValueType::Array(element) => json
                .as_array()?
                .iter()
                .map(|item| Value::from_literal(item, element))
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            ValueType::Dictionary(element) => json
                .as_object()?
                .iter()
                .map(|(key, item)| Some((key.clone(), Value::from_literal(item, element)?)))
                .collect::<Option<BTreeMap<_, _>>>()
                .map(Value::Dictionary),
            ValueType::Record(_) => None,
        }
    }
}

/// Rust types a predicate can be built over and evaluated against.
///
/// Implemented for the scalar types, `Uuid`, `Vec<T>` and
/// `BTreeMap<String, T>`. Host records implement it by returning
/// `ValueType::Record` and a [`Record`].
pub trait PredicateInput {
    fn value_type() -> ValueType;
    fn to_value(&self) -> Value;
}

impl PredicateInput for bool {
    fn value_type() -> ValueType {
        ValueType::Bool
    }
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl PredicateInput for i64 {
    fn value_type() -> ValueType {
        ValueType::Int
    }
    fn to_value(&self) -> Value {
        Value::Int(*self)
    }
}

impl PredicateInput for i32 {
    fn value_type() -> ValueType {
        ValueType::Int
    }
    fn to_value(&self) -> Value {
        Value::Int(i64::from(*self))
    }
}

impl PredicateInput for f64 {
    fn value_type() -> ValueType {
        ValueType::Double
    }
    fn to_value(&self) -> Value {
        Value::Double(*self)
    }
}

impl PredicateInput for String {
    fn value_type() -> ValueType {
        ValueType::String
    }
    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }
}

impl PredicateInput for &str {
    fn value_type() -> ValueType {
        ValueType::String
    }
    fn to_value(&self) -> Value {
        Value::String((*self).to_string())
    }
}

impl PredicateInput for char {
    fn value_type() -> ValueType {
        ValueType::Character
    }
    fn to_value(&self) -> Value {
        Value::Character(*self)
    }
}

impl PredicateInput for Uuid {
    fn value_type() -> ValueType {
        ValueType::Uuid
    }
    fn to_value(&self) -> Value {
        Value::Uuid(*self)
    }
}

impl<T: PredicateInput> PredicateInput for Vec<T> {
    fn value_type() -> ValueType {
        ValueType::array(T::value_type())
    }
    fn to_value(&self) -> Value {
        Value::Array(self.iter().map(PredicateInput::to_value).collect())
    }
}

impl<T: PredicateInput> PredicateInput for BTreeMap<String, T> {
    fn value_type() -> ValueType {
        ValueType::dictionary(T::value_type())
    }
    fn to_value(&self) -> Value {
        Value::Dictionary(
            self.iter()
                .map(|(key, item)| (key.clone(), item.to_value()))
                .collect(),
        )
    }
}
