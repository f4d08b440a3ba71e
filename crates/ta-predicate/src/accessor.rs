// accessor.rs — Field accessor descriptors.
//
// An accessor is a named, type-safe read of one member of a value. It is
// the only way a predicate can look inside a value, so it is the unit the
// accessor allowlist grants. Accessors are granted per identifier, and the
// identifier is the only part of an accessor that ever crosses the wire.
// The read capability itself never does.
//
// Accessor equality is identity: two accessors are the same when they read
// the same member of the same root, regardless of how their value types are
// spelled or which function performs the read.

use std::fmt;

use crate::value::{RecordType, Value, ValueType};

/// The root an accessor reads from.
///
/// Built-in accessors such as `count` apply to every array or dictionary
/// regardless of element type, so their root is a family rather than a
/// single concrete type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AccessorRoot {
    Type(ValueType),
    AnyArray,
    AnyDictionary,
}

impl AccessorRoot {
    /// Whether this root admits values of `ty`.
    pub fn admits(&self, ty: &ValueType) -> bool {
        match self {
            AccessorRoot::Type(root) => root == ty,
            AccessorRoot::AnyArray => matches!(ty, ValueType::Array(_)),
            AccessorRoot::AnyDictionary => matches!(ty, ValueType::Dictionary(_)),
        }
    }
}

impl fmt::Display for AccessorRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessorRoot::Type(ty) => write!(f, "{}", ty),
            AccessorRoot::AnyArray => write!(f, "Array"),
            AccessorRoot::AnyDictionary => write!(f, "Dictionary"),
        }
    }
}

/// Identity of an accessor: which member of which root it reads.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccessorId {
    pub root: AccessorRoot,
    pub member: &'static str,
}

#[derive(Clone, Copy)]
enum Read {
    /// Named field of a record.
    Field,
    /// Derived value computed from the root.
    Computed(fn(&Value) -> Option<Value>),
}

/// A read of one member of a root value, producing a value of a fixed type.
#[derive(Clone)]
pub struct Accessor {
    id: AccessorId,
    value: ValueType,
    read: Read,
}

impl Accessor {
    /// Accessor for a stored field of a host record.
    pub fn field(root: &'static RecordType, member: &'static str, value: ValueType) -> Self {
        Self {
            id: AccessorId {
                root: AccessorRoot::Type(ValueType::Record(root)),
                member,
            },
            value,
            read: Read::Field,
        }
    }

    /// Accessor whose value is computed from the root by `read`.
    ///
    /// `read` must be pure and must return `None` only for values outside
    /// the accessor's root.
    pub fn computed(
        root: AccessorRoot,
        member: &'static str,
        value: ValueType,
        read: fn(&Value) -> Option<Value>,
    ) -> Self {
        Self {
            id: AccessorId { root, member },
            value,
            read: Read::Computed(read),
        }
    }

    pub fn id(&self) -> &AccessorId {
        &self.id
    }

    pub fn root(&self) -> &AccessorRoot {
        &self.id.root
    }

    pub fn member(&self) -> &'static str {
        self.id.member
    }

    pub fn value_type(&self) -> &ValueType {
        &self.value
    }

    /// Human-readable signature, e.g. `Object -> Int`.
    pub fn signature(&self) -> String {
        format!("{} -> {}", self.id.root, self.value)
    }

    /// Whether the accessor can be applied to a root of type `root` and
    /// produce a value of type `value`.
    pub fn matches(&self, root: &ValueType, value: &ValueType) -> bool {
        self.id.root.admits(root) && self.value == *value
    }

    /// Read the member from `root`. `None` when `root` is not a value this
    /// accessor applies to.
    pub fn read(&self, root: &Value) -> Option<Value> {
        match self.read {
            Read::Field => match root {
                Value::Record(record)
                    if self.id.root.admits(&ValueType::Record(record.record_type())) =>
                {
                    record.field(self.id.member).cloned()
                }
                _ => None,
            },
            Read::Computed(read) => read(root),
        }
    }
}

impl PartialEq for Accessor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Accessor {}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accessor")
            .field("root", &self.id.root)
            .field("member", &self.id.member)
            .field("value", &self.value)
            .finish()
    }
}

impl fmt::Display for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\\{}.{}", self.id.root, self.id.member)
    }
}
