// error.rs — Error types for predicate construction, configuration and coding.
//
// Coding errors are the only thing a producer or consumer of untrusted
// archives ever sees. They name identifiers, type names and tree paths so a
// misconfigured allowlist can be diagnosed, but they never carry the read
// capability of an accessor.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while encoding or decoding a predicate archive.
#[derive(Debug, Error)]
pub enum CodingError {
    /// A type identifier (or, when encoding, a type with no identifier) is
    /// absent from the configuration's type registry.
    #[error("the '{identifier}' type is not in the provided allowlist (required by {path})")]
    TypeNotAllowed { identifier: String, path: String },

    /// A decoded accessor identifier is absent from the configuration's
    /// accessor registry.
    #[error("an accessor for the '{identifier}' identifier is not in the provided allowlist")]
    KeyPathNotAllowed { identifier: String },

    /// An accessor being encoded has no identifier in the configuration.
    /// `accessor` is its display form (`\Root.member`), not an identifier.
    #[error("the accessor '{accessor}' has no identifier in the provided allowlist")]
    AccessorNotAllowed { accessor: String },

    /// The accessor registered under an identifier does not have the
    /// signature the surrounding expression requires.
    #[error(
        "accessor '{accessor}' ({actual}) for identifier '{identifier}' did not match \
         the expression's requirement for {required}"
    )]
    KeyPathTypeMismatch {
        identifier: String,
        accessor: String,
        actual: String,
        required: String,
    },

    /// A generic type rejected the supplied argument types or arity.
    #[error("reconstruction of '{identifier}' with the arguments [{}] failed", arguments.join(", "))]
    ReconstructionFailed {
        identifier: String,
        arguments: Vec<String>,
    },

    /// The identifier resolved to something that is not a reconstructable
    /// expression, or the root expression does not produce a boolean.
    #[error("this expression is unsupported by this predicate ('{identifier}')")]
    UnsupportedExpression { identifier: String },

    /// The predicate's variable is typed differently from the decoding input.
    #[error("predicate input is declared as '{found}' but '{expected}' was requested")]
    InputTypeMismatch { expected: String, found: String },

    /// Structure descriptors nest deeper than the configured limit, on either
    /// side of the wire.
    #[error("structure nesting exceeds the limit of {limit} (at {path})")]
    DepthLimitExceeded { limit: usize, path: String },

    /// The archive is larger than the configured limit.
    #[error("archive of {size} bytes exceeds the limit of {limit} bytes")]
    ArchiveTooLarge { size: usize, limit: usize },

    /// A payload is missing a field or holds a value of the wrong shape.
    #[error("malformed predicate structure: {reason}")]
    MalformedStructure { reason: String },

    /// The archive is not valid JSON or does not match the record layout.
    #[error("malformed predicate archive: {0}")]
    MalformedArchive(#[from] serde_json::Error),
}

impl CodingError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        CodingError::MalformedStructure {
            reason: reason.into(),
        }
    }
}

/// Errors raised while building a [`Configuration`](crate::Configuration).
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// The identifier is already bound to a different type or accessor.
    #[error("identifier '{identifier}' is already bound to {existing}")]
    DuplicateIdentifier { identifier: String, existing: String },

    /// The identifier is reserved for the predicate input and cannot be
    /// bound to a type.
    #[error("identifier '{identifier}' is reserved for the predicate input")]
    ReservedIdentifier { identifier: String },

    /// A codec limit is outside the range the archive parser can honour.
    #[error("{limit} of {value} is outside the supported range 1..={max}")]
    LimitOutOfRange {
        limit: &'static str,
        value: usize,
        max: usize,
    },

    /// A manifest names something the host catalog does not offer.
    #[error("manifest references unknown {kind} '{name}'")]
    UnknownCatalogEntry { kind: &'static str, name: String },

    /// Failed to read a manifest file.
    #[error("failed to read manifest at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A manifest is not valid YAML or has the wrong layout.
    #[error("failed to parse manifest: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Errors raised while building or evaluating an expression in-process.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PredicateError {
    /// An operator was given operands its generic constraints reject.
    #[error("{expression} cannot be built from operands [{}]", operands.join(", "))]
    InvalidOperands {
        expression: &'static str,
        operands: Vec<String>,
    },

    /// A predicate root must produce a boolean.
    #[error("predicate expression produces '{output}', not Bool")]
    NotBoolean { output: String },

    /// Evaluation reached a variable with no binding.
    #[error("variable {key} is unbound")]
    UnboundVariable { key: u32 },

    /// An accessor could not read its member from the supplied value.
    #[error("accessor '{accessor}' could not read from a value of type '{found}'")]
    AccessorFailed { accessor: String, found: String },

    /// A bound value does not conform to the type its variable declares.
    #[error("expected a value of type '{expected}', found '{found}'")]
    TypeMismatch { expected: String, found: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconstruction_failure_lists_arguments() {
        let err = CodingError::ReconstructionFailed {
            identifier: "expr.Conjunction".to_string(),
            arguments: vec!["core.Int".to_string(), "core.Int".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "reconstruction of 'expr.Conjunction' with the arguments [core.Int, core.Int] failed"
        );
    }

    #[test]
    fn reconstruction_failure_with_no_arguments() {
        let err = CodingError::ReconstructionFailed {
            identifier: "expr.Conjunction".to_string(),
            arguments: vec![],
        };
        assert!(err.to_string().contains("with the arguments [] failed"));
    }

    #[test]
    fn type_not_allowed_names_path() {
        let err = CodingError::TypeNotAllowed {
            identifier: "uuid.Uuid".to_string(),
            path: "/expr.TypeCheck".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "the 'uuid.Uuid' type is not in the provided allowlist (required by /expr.TypeCheck)"
        );
    }

    #[test]
    fn accessor_errors_distinguish_identifier_from_display_form() {
        let decoded = CodingError::KeyPathNotAllowed {
            identifier: "Object.a".to_string(),
        };
        assert_eq!(
            decoded.to_string(),
            "an accessor for the 'Object.a' identifier is not in the provided allowlist"
        );
        let encoded = CodingError::AccessorNotAllowed {
            accessor: "\\Object.a".to_string(),
        };
        assert_eq!(
            encoded.to_string(),
            "the accessor '\\Object.a' has no identifier in the provided allowlist"
        );
    }
}
