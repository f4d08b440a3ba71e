// structure.rs — Wire representation of predicate archives.
//
// An archive is a list of records plus a payload area:
//
//   {
//     "records": [
//       { "variable": { "key": 0 },
//         "expression": 0,
//         "structure": { "identifier": "expr.Equal", "args": [ ... ] } }
//     ],
//     "payload": [ { "lhs": { ... }, "rhs": { "value": 2 } } ]
//   }
//
// `structure` says which node kinds the tree is made of and with which
// generic arguments. `expression` indexes the payload holding the tree's own
// data (literals, operator tags, accessor identifiers). Only identifiers
// cross the wire: never type names, never accessor capabilities.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::expression::VariableKey;

/// "Which node kind, with which generic arguments."
///
/// Serialized as a bare string when there are no arguments, otherwise as
/// `{"identifier": ..., "args": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StructureDescriptor {
    Identifier(String),
    Generic {
        identifier: String,
        #[serde(default)]
        args: Vec<StructureDescriptor>,
    },
}

impl StructureDescriptor {
    /// Build a descriptor, collapsing to the bare form when `args` is empty.
    pub fn new(identifier: impl Into<String>, args: Vec<StructureDescriptor>) -> Self {
        let identifier = identifier.into();
        if args.is_empty() {
            StructureDescriptor::Identifier(identifier)
        } else {
            StructureDescriptor::Generic { identifier, args }
        }
    }

    pub fn identifier(&self) -> &str {
        match self {
            StructureDescriptor::Identifier(identifier) => identifier,
            StructureDescriptor::Generic { identifier, .. } => identifier,
        }
    }

    /// Generic arguments; empty for the bare form.
    pub fn args(&self) -> &[StructureDescriptor] {
        match self {
            StructureDescriptor::Identifier(_) => &[],
            StructureDescriptor::Generic { args, .. } => args,
        }
    }
}

impl fmt::Display for StructureDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())?;
        let args = self.args();
        if !args.is_empty() {
            write!(f, "<")?;
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", arg)?;
            }
            write!(f, ">")?;
        }
        Ok(())
    }
}

/// One predicate record: its variable binding, payload index and structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireNode {
    pub variable: VariableKey,
    pub expression: usize,
    pub structure: StructureDescriptor,
}

/// The complete encoded form of a predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredicateArchive {
    pub records: Vec<WireNode>,
    #[serde(default)]
    pub payload: Vec<JsonValue>,
}
