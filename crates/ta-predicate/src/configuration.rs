// configuration.rs — Type and accessor allowlists for predicate coding.
//
// A Configuration is the complete policy for one encode or decode call:
//
// 1. Type registry: identifier → concrete type (Full) or generic
//    constructor (Partial). Only identifiers cross the wire.
// 2. Accessor registry: identifier → accessor.
// 3. Limits on untrusted input.
//
// Everything not registered is denied. There is no global configuration;
// callers build one (empty or from the standard baseline) before any decode
// and pass it by reference. Once built it is only read, so it can be shared
// across threads freely.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::accessor::{Accessor, AccessorId};
use crate::error::ConfigurationError;
use crate::expression::ExpressionKind;
use crate::standard;
use crate::value::{RecordType, ValueType};

/// A generic type: its arguments are resolved and checked before the
/// constructor itself is instantiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeConstructor {
    /// `Array<Element>`.
    Array,
    /// `Dictionary<String, Value>`.
    Dictionary,
    /// One of the standard expression kinds.
    Expression(ExpressionKind),
    /// An expression kind from outside the standard vocabulary. It can be
    /// allow-listed so archives naming it parse, but it is never
    /// reconstructed: decoding it fails as an unsupported expression.
    Extension(&'static str),
}

impl TypeConstructor {
    pub fn name(&self) -> &'static str {
        match self {
            TypeConstructor::Array => "Array",
            TypeConstructor::Dictionary => "Dictionary",
            TypeConstructor::Expression(kind) => kind.name(),
            TypeConstructor::Extension(name) => name,
        }
    }
}

/// What a type identifier is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    /// A concrete type with no generic arguments.
    Full(ValueType),
    /// A generic constructor whose arguments are checked independently.
    Partial(TypeConstructor),
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKind::Full(ty) => write!(f, "type {}", ty),
            TypeKind::Partial(constructor) => write!(f, "generic {}", constructor.name()),
        }
    }
}

/// Bounds applied to archives. Depth is enforced on both sides, size on
/// decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecLimits {
    /// Maximum nesting of structure descriptors (root is depth 1).
    pub max_depth: usize,
    /// Maximum size of an encoded archive in bytes.
    pub max_archive_bytes: usize,
}

impl CodecLimits {
    /// Deepest descriptor nesting serde_json can parse. Its parser stops at
    /// 128 nested containers and a descriptor at depth `d` with arguments
    /// opens its argument list at container depth `2d + 3`.
    pub const MAX_DEPTH: usize = 63;

    /// Reject limits the archive parser cannot honour.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_depth == 0 || self.max_depth > Self::MAX_DEPTH {
            return Err(ConfigurationError::LimitOutOfRange {
                limit: "max_depth",
                value: self.max_depth,
                max: Self::MAX_DEPTH,
            });
        }
        if self.max_archive_bytes == 0 {
            return Err(ConfigurationError::LimitOutOfRange {
                limit: "max_archive_bytes",
                value: self.max_archive_bytes,
                max: usize::MAX,
            });
        }
        Ok(())
    }
}

impl Default for CodecLimits {
    fn default() -> Self {
        Self {
            max_depth: Self::MAX_DEPTH,
            max_archive_bytes: 1024 * 1024,
        }
    }
}

/// The allowlist consulted by [`encode`](crate::encode) and
/// [`decode`](crate::decode).
#[derive(Debug, Clone, Default)]
pub struct Configuration {
    types: HashMap<String, TypeKind>,
    type_identifiers: HashMap<ValueType, String>,
    constructor_identifiers: HashMap<TypeConstructor, String>,
    accessors: HashMap<String, Accessor>,
    accessor_identifiers: HashMap<AccessorId, String>,
    limits: CodecLimits,
}

impl Configuration {
    /// An empty configuration: denies every type and accessor.
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard baseline: scalar types, containers, every expression
    /// kind, and the default safe accessors.
    pub fn standard() -> Self {
        let mut config = Self::new();
        for (identifier, kind) in standard::types() {
            config.bind_type(identifier.to_string(), kind);
        }
        for (identifier, accessor) in standard::default_accessors() {
            config.bind_accessor(identifier.to_string(), accessor);
        }
        config
    }

    /// Replace the limits. Fails if they are out of range.
    pub fn with_limits(mut self, limits: CodecLimits) -> Result<Self, ConfigurationError> {
        limits.validate()?;
        self.limits = limits;
        Ok(self)
    }

    pub fn limits(&self) -> CodecLimits {
        self.limits
    }

    /// Allow a concrete type under `identifier`.
    ///
    /// Fails if the identifier is already bound to something else. Binding
    /// the same type again is a no-op.
    pub fn allow_type(
        &mut self,
        ty: ValueType,
        identifier: impl Into<String>,
    ) -> Result<(), ConfigurationError> {
        self.register_type(identifier.into(), TypeKind::Full(ty))
    }

    /// Allow a generic constructor under `identifier`.
    pub fn allow_partial_type(
        &mut self,
        constructor: TypeConstructor,
        identifier: impl Into<String>,
    ) -> Result<(), ConfigurationError> {
        self.register_type(identifier.into(), TypeKind::Partial(constructor))
    }

    /// Allow one accessor under `identifier`.
    pub fn allow_accessor(
        &mut self,
        accessor: Accessor,
        identifier: impl Into<String>,
    ) -> Result<(), ConfigurationError> {
        let identifier = identifier.into();
        if let Some(existing) = self.accessors.get(&identifier) {
            if *existing == accessor {
                return Ok(());
            }
            return Err(ConfigurationError::DuplicateIdentifier {
                identifier,
                existing: existing.to_string(),
            });
        }
        self.bind_accessor(identifier, accessor);
        Ok(())
    }

    /// Allow every accessor `record` declares about itself.
    ///
    /// With `recursive`, also walks into each declared accessor whose value
    /// is itself a record and allows that record's declared set, and so on
    /// transitively. Records reached this way are allowed as types under
    /// their own name unless they already have an identifier. Each record
    /// is visited at most once, so cyclic field graphs terminate.
    ///
    /// All or nothing: if any binding conflicts, the configuration is left
    /// as it was.
    pub fn allow_accessors_provided_by(
        &mut self,
        record: &'static RecordType,
        recursive: bool,
    ) -> Result<(), ConfigurationError> {
        let mut staged = self.clone();
        staged.stage_accessors_provided_by(record, recursive)?;
        *self = staged;
        Ok(())
    }

    fn stage_accessors_provided_by(
        &mut self,
        record: &'static RecordType,
        recursive: bool,
    ) -> Result<(), ConfigurationError> {
        let mut visited: HashSet<&'static str> = HashSet::new();
        let mut pending = vec![record];

        while let Some(current) = pending.pop() {
            if !visited.insert(current.name) {
                continue;
            }
            tracing::debug!(
                "allowlist: registering accessors provided by '{}'",
                current.name
            );
            for (identifier, accessor) in (current.provided_accessors)() {
                if recursive {
                    if let ValueType::Record(nested) = accessor.value_type() {
                        let nested: &'static RecordType = *nested;
                        if !visited.contains(nested.name) {
                            let nested_type = ValueType::Record(nested);
                            if self.identifier_for_type(&nested_type).is_none() {
                                self.allow_type(nested_type, nested.name)?;
                            }
                            pending.push(nested);
                        }
                    }
                }
                self.allow_accessor(accessor, identifier)?;
            }
        }
        Ok(())
    }

    /// What `identifier` is bound to, if anything.
    pub fn type_entry(&self, identifier: &str) -> Option<&TypeKind> {
        self.types.get(identifier)
    }

    /// The accessor bound to `identifier`, if any.
    pub fn accessor(&self, identifier: &str) -> Option<&Accessor> {
        self.accessors.get(identifier)
    }

    /// Identifier of a concrete type; the first one registered wins.
    pub fn identifier_for_type(&self, ty: &ValueType) -> Option<&str> {
        self.type_identifiers.get(ty).map(String::as_str)
    }

    /// Identifier of a generic constructor; the first one registered wins.
    pub fn identifier_for_constructor(&self, constructor: TypeConstructor) -> Option<&str> {
        self.constructor_identifiers
            .get(&constructor)
            .map(String::as_str)
    }

    /// Identifier of an accessor (by identity); the first one registered wins.
    pub fn identifier_for_accessor(&self, accessor: &Accessor) -> Option<&str> {
        self.accessor_identifiers
            .get(accessor.id())
            .map(String::as_str)
    }

    /// All registered type identifiers, sorted.
    pub fn type_identifiers(&self) -> Vec<&str> {
        let mut identifiers: Vec<&str> = self.types.keys().map(String::as_str).collect();
        identifiers.sort_unstable();
        identifiers
    }

    /// All registered accessor identifiers, sorted.
    pub fn accessor_identifiers(&self) -> Vec<&str> {
        let mut identifiers: Vec<&str> = self.accessors.keys().map(String::as_str).collect();
        identifiers.sort_unstable();
        identifiers
    }

    fn register_type(
        &mut self,
        identifier: String,
        kind: TypeKind,
    ) -> Result<(), ConfigurationError> {
        if identifier == standard::INPUT {
            return Err(ConfigurationError::ReservedIdentifier { identifier });
        }
        if let Some(existing) = self.types.get(&identifier) {
            if *existing == kind {
                return Ok(());
            }
            return Err(ConfigurationError::DuplicateIdentifier {
                identifier,
                existing: existing.to_string(),
            });
        }
        self.bind_type(identifier, kind);
        Ok(())
    }

    fn bind_type(&mut self, identifier: String, kind: TypeKind) {
        tracing::debug!("allowlist: '{}' bound to {}", identifier, kind);
        match &kind {
            TypeKind::Full(ty) => {
                self.type_identifiers
                    .entry(ty.clone())
                    .or_insert_with(|| identifier.clone());
            }
            TypeKind::Partial(constructor) => {
                self.constructor_identifiers
                    .entry(*constructor)
                    .or_insert_with(|| identifier.clone());
            }
        }
        self.types.insert(identifier, kind);
    }

    fn bind_accessor(&mut self, identifier: String, accessor: Accessor) {
        tracing::debug!("allowlist: '{}' bound to {}", identifier, accessor);
        self.accessor_identifiers
            .entry(accessor.id().clone())
            .or_insert_with(|| identifier.clone());
        self.accessors.insert(identifier, accessor);
    }
}
