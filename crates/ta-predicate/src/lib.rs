//! # ta-predicate
//!
//! Allowlist-governed encoding and reconstruction of predicate expression
//! trees for Trusted Autonomy.
//!
//! A [`Predicate`] is a typed boolean expression over one input value. It can
//! be written to a JSON archive with [`encode`] and rebuilt from untrusted
//! bytes with [`decode`]. Both sides consult a [`Configuration`]: the set of
//! type identifiers and field accessors the caller is willing to see on the
//! wire.
//!
//! ## Key invariants
//!
//! - **Default deny**: an identifier that is not in the configuration is
//!   rejected. An empty configuration decodes nothing.
//! - **Identifiers only**: archives carry identifiers, never type names or
//!   read capabilities. Each side maps identifiers through its own
//!   configuration, so producer and consumer may disagree and the consumer
//!   always wins.
//! - **Checked before built**: every generic argument is resolved and checked
//!   against its expression's signature before any node is instantiated. A
//!   decoded predicate evaluates without a type error.
//! - **Bounded input**: archive size and structure depth are limited by
//!   [`CodecLimits`].

pub mod accessor;
pub mod configuration;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod expression;
pub mod manifest;
pub mod predicate;
pub mod standard;
pub mod structure;
pub mod value;

pub use accessor::{Accessor, AccessorId, AccessorRoot};
pub use configuration::{CodecLimits, Configuration, TypeConstructor, TypeKind};
pub use decoder::{decode, Decoder};
pub use encoder::{encode, Encoder};
pub use error::{CodingError, ConfigurationError, PredicateError};
pub use expression::{Bindings, ComparisonOperator, Expression, ExpressionKind, VariableKey};
pub use manifest::{Baseline, Catalog, ConfigurationManifest, ManifestEntry, ProvidedBy};
pub use predicate::Predicate;
pub use structure::{PredicateArchive, StructureDescriptor, WireNode};
pub use value::{PredicateInput, Record, RecordType, Value, ValueType};
