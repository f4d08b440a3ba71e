// decoder.rs — Archive → predicate, under an allowlist.
//
// Decoding runs in two passes and never guesses:
//
// 1. Resolve the structure descriptor bottom-up. Every identifier must be
//    registered. A generic's arguments are resolved first and then checked
//    against its signature, so a parent always knows its operand types.
//    The result is a fully typed shape of the tree. The variable's type
//    argument `input.0` stands for the caller's `Input` type and needs no
//    registration.
// 2. Instantiate the shape top-down from the payload: literals, operator
//    tags, accessor identifiers and the variable key.
//
// Any failure in either pass rejects the whole archive.

use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::configuration::{Configuration, TypeConstructor, TypeKind};
use crate::encoder::render_path;
use crate::error::CodingError;
use crate::expression::{
    ComparisonOperator, Expression, ExpressionKind, Node, Operand, VariableKey,
};
use crate::predicate::Predicate;
use crate::standard;
use crate::structure::{PredicateArchive, StructureDescriptor};
use crate::value::{PredicateInput, Value, ValueType};

/// Decode archive bytes into a predicate over `Input`.
pub fn decode<Input: PredicateInput>(
    bytes: &[u8],
    configuration: &Configuration,
) -> Result<Predicate<Input>, CodingError> {
    let limit = configuration.limits().max_archive_bytes;
    if bytes.len() > limit {
        tracing::warn!(
            "predicate archive rejected: {} bytes exceeds limit of {}",
            bytes.len(),
            limit
        );
        return Err(CodingError::ArchiveTooLarge {
            size: bytes.len(),
            limit,
        });
    }
    let archive: PredicateArchive = serde_json::from_slice(bytes)?;
    Decoder::new(configuration).predicate(&archive)
}

/// Reconstructs predicates from [`PredicateArchive`]s against one
/// configuration.
pub struct Decoder<'c> {
    configuration: &'c Configuration,
}

/// A structure descriptor after resolution.
#[derive(Debug)]
enum Resolved {
    /// A data type argument.
    Type(ValueType),
    /// An expression node with checked operands.
    Expression(Shape),
    /// An allow-listed identifier this crate cannot reconstruct.
    Unsupported(String),
}

#[derive(Debug)]
struct Shape {
    kind: ExpressionKind,
    identifier: String,
    output: ValueType,
    args: Vec<Resolved>,
}

impl<'c> Decoder<'c> {
    pub fn new(configuration: &'c Configuration) -> Self {
        Self { configuration }
    }

    /// Reconstruct the predicate held by `archive`.
    pub fn predicate<Input: PredicateInput>(
        &self,
        archive: &PredicateArchive,
    ) -> Result<Predicate<Input>, CodingError> {
        self.reconstruct(archive).map_err(|err| {
            tracing::warn!("predicate archive rejected: {}", err);
            err
        })
    }

    fn reconstruct<Input: PredicateInput>(
        &self,
        archive: &PredicateArchive,
    ) -> Result<Predicate<Input>, CodingError> {
        let record = match archive.records.as_slice() {
            [record] => record,
            records => {
                return Err(CodingError::malformed(format!(
                    "expected exactly one predicate record, found {}",
                    records.len()
                )))
            }
        };

        let input = Input::value_type();
        let shape = match self.resolve(&record.structure, &input, false, &mut Vec::new())? {
            Resolved::Expression(shape) if shape.output == ValueType::Bool => shape,
            Resolved::Expression(shape) => {
                return Err(CodingError::UnsupportedExpression {
                    identifier: shape.identifier,
                })
            }
            Resolved::Unsupported(identifier) => {
                return Err(CodingError::UnsupportedExpression { identifier })
            }
            Resolved::Type(_) => {
                return Err(CodingError::UnsupportedExpression {
                    identifier: record.structure.identifier().to_string(),
                })
            }
        };
        tracing::debug!("predicate structure resolved: {}", record.structure);

        let payload = archive.payload.get(record.expression).ok_or_else(|| {
            CodingError::malformed(format!(
                "payload index {} is out of range ({} entries)",
                record.expression,
                archive.payload.len()
            ))
        })?;
        let instantiate = Instantiate {
            decoder: self,
            variable: record.variable,
            input,
        };
        let expression = instantiate.expression(&shape, payload)?;

        Predicate::from_parts(record.variable, expression)
            .map_err(|err| CodingError::malformed(err.to_string()))
    }

    /// `input_slot` is set for the type arguments of a variable node, where
    /// `input.0` names `input`.
    fn resolve(
        &self,
        descriptor: &StructureDescriptor,
        input: &ValueType,
        input_slot: bool,
        path: &mut Vec<String>,
    ) -> Result<Resolved, CodingError> {
        let limit = self.configuration.limits().max_depth;
        if path.len() >= limit {
            return Err(CodingError::DepthLimitExceeded {
                limit,
                path: render_path(path),
            });
        }

        let identifier = descriptor.identifier();
        if input_slot && identifier == standard::INPUT {
            if !descriptor.args().is_empty() {
                return Err(reconstruction_failed(descriptor));
            }
            return Ok(Resolved::Type(input.clone()));
        }
        let entry = self
            .configuration
            .type_entry(identifier)
            .ok_or_else(|| CodingError::TypeNotAllowed {
                identifier: identifier.to_string(),
                path: render_path(path),
            })?;

        match entry {
            TypeKind::Full(ty) if descriptor.args().is_empty() => Ok(Resolved::Type(ty.clone())),
            TypeKind::Full(_) => Err(reconstruction_failed(descriptor)),
            TypeKind::Partial(constructor) => {
                let slot =
                    *constructor == TypeConstructor::Expression(ExpressionKind::Variable);
                path.push(identifier.to_string());
                let args = descriptor
                    .args()
                    .iter()
                    .map(|arg| self.resolve(arg, input, slot, path))
                    .collect::<Result<Vec<_>, _>>();
                path.pop();
                instantiate_constructor(*constructor, descriptor, args?)
            }
        }
    }
}

fn instantiate_constructor(
    constructor: TypeConstructor,
    descriptor: &StructureDescriptor,
    args: Vec<Resolved>,
) -> Result<Resolved, CodingError> {
    let identifier = descriptor.identifier().to_string();
    match constructor {
        TypeConstructor::Array | TypeConstructor::Dictionary => match args.as_slice() {
            [Resolved::Type(element)] if constructor == TypeConstructor::Array => {
                Ok(Resolved::Type(ValueType::array(element.clone())))
            }
            [Resolved::Type(element)] => Ok(Resolved::Type(ValueType::dictionary(element.clone()))),
            _ => Err(reconstruction_failed(descriptor)),
        },
        TypeConstructor::Extension(_) => Ok(Resolved::Unsupported(identifier)),
        TypeConstructor::Expression(kind) => {
            if let Some(Resolved::Unsupported(nested)) = args
                .iter()
                .find(|arg| matches!(arg, Resolved::Unsupported(_)))
            {
                return Err(CodingError::UnsupportedExpression {
                    identifier: nested.clone(),
                });
            }
            let operands: Vec<Operand<'_>> = args
                .iter()
                .filter_map(|arg| match arg {
                    Resolved::Type(ty) => Some(Operand::Type(ty)),
                    Resolved::Expression(shape) => Some(Operand::Expression(&shape.output)),
                    Resolved::Unsupported(_) => None,
                })
                .collect();
            let output = kind.signature(&operands);
            drop(operands);
            let output = output.ok_or_else(|| reconstruction_failed(descriptor))?;
            Ok(Resolved::Expression(Shape {
                kind,
                identifier,
                output,
                args,
            }))
        }
    }
}

fn reconstruction_failed(descriptor: &StructureDescriptor) -> CodingError {
    CodingError::ReconstructionFailed {
        identifier: descriptor.identifier().to_string(),
        arguments: descriptor.args().iter().map(ToString::to_string).collect(),
    }
}

/// Top-down pass: turns a resolved shape plus its payload into nodes.
struct Instantiate<'d, 'c> {
    decoder: &'d Decoder<'c>,
    variable: VariableKey,
    input: ValueType,
}

impl Instantiate<'_, '_> {
    fn expression(&self, shape: &Shape, payload: &JsonValue) -> Result<Expression, CodingError> {
        let node = match shape.kind {
            ExpressionKind::Variable => {
                let key = field(shape, payload, "key")?
                    .as_u64()
                    .and_then(|key| u32::try_from(key).ok())
                    .map(VariableKey::new)
                    .ok_or_else(|| CodingError::malformed("variable key is not a u32"))?;
                if key != self.variable {
                    return Err(CodingError::malformed(format!(
                        "variable {} is not the predicate's input variable {}",
                        key.value(),
                        self.variable.value()
                    )));
                }
                if shape.output != self.input {
                    return Err(CodingError::InputTypeMismatch {
                        expected: self.input.to_string(),
                        found: shape.output.to_string(),
                    });
                }
                Node::Variable(key)
            }
            ExpressionKind::Value => {
                let literal = field(shape, payload, "value")?;
                let value = Value::from_literal(literal, &shape.output).ok_or_else(|| {
                    CodingError::malformed(format!(
                        "literal {} is not a value of type '{}'",
                        literal, shape.output
                    ))
                })?;
                Node::Value(value)
            }
            ExpressionKind::KeyPath => {
                let root = self.child(shape, 0, payload, "root")?;
                let value = type_arg(shape, 1)?;
                let identifier = field(shape, payload, "identifier")?
                    .as_str()
                    .ok_or_else(|| CodingError::malformed("key path identifier is not a string"))?;
                let accessor = self
                    .decoder
                    .configuration
                    .accessor(identifier)
                    .ok_or_else(|| CodingError::KeyPathNotAllowed {
                        identifier: identifier.to_string(),
                    })?;
                if !accessor.matches(root.output(), value) {
                    return Err(CodingError::KeyPathTypeMismatch {
                        identifier: identifier.to_string(),
                        accessor: accessor.to_string(),
                        actual: accessor.signature(),
                        required: format!("{} -> {}", root.output(), value),
                    });
                }
                Node::KeyPath {
                    root: Box::new(root),
                    accessor: accessor.clone(),
                }
            }
            ExpressionKind::Equal => {
                let (lhs, rhs) = self.binary(shape, payload)?;
                Node::Equal(lhs, rhs)
            }
            ExpressionKind::NotEqual => {
                let (lhs, rhs) = self.binary(shape, payload)?;
                Node::NotEqual(lhs, rhs)
            }
            ExpressionKind::Comparison => {
                let (lhs, rhs) = self.binary(shape, payload)?;
                let op = field(shape, payload, "op")?;
                let op = ComparisonOperator::deserialize(op).map_err(|err| {
                    CodingError::malformed(format!("comparison operator {}: {}", op, err))
                })?;
                Node::Comparison { lhs, rhs, op }
            }
            ExpressionKind::Conjunction => {
                let (lhs, rhs) = self.binary(shape, payload)?;
                Node::Conjunction(lhs, rhs)
            }
            ExpressionKind::Disjunction => {
                let (lhs, rhs) = self.binary(shape, payload)?;
                Node::Disjunction(lhs, rhs)
            }
            ExpressionKind::Negation => {
                Node::Negation(Box::new(self.child(shape, 0, payload, "wrapped")?))
            }
            ExpressionKind::TypeCheck => Node::TypeCheck {
                input: Box::new(self.child(shape, 0, payload, "input")?),
                ty: type_arg(shape, 1)?.clone(),
            },
            ExpressionKind::SequenceContains => Node::SequenceContains {
                sequence: Box::new(self.child(shape, 0, payload, "sequence")?),
                element: Box::new(self.child(shape, 1, payload, "element")?),
            },
        };
        Ok(Expression::from_node(node, shape.output.clone()))
    }

    fn binary(
        &self,
        shape: &Shape,
        payload: &JsonValue,
    ) -> Result<(Box<Expression>, Box<Expression>), CodingError> {
        let lhs = self.child(shape, 0, payload, "lhs")?;
        let rhs = self.child(shape, 1, payload, "rhs")?;
        Ok((Box::new(lhs), Box::new(rhs)))
    }

    /// Instantiate the sub-expression at generic argument `index` from the
    /// payload member `name`.
    fn child(
        &self,
        shape: &Shape,
        index: usize,
        payload: &JsonValue,
        name: &str,
    ) -> Result<Expression, CodingError> {
        match shape.args.get(index) {
            Some(Resolved::Expression(child)) => {
                self.expression(child, field(shape, payload, name)?)
            }
            _ => Err(CodingError::malformed(format!(
                "argument {} of '{}' is not an expression",
                index, shape.identifier
            ))),
        }
    }
}

fn type_arg(shape: &Shape, index: usize) -> Result<&ValueType, CodingError> {
    match shape.args.get(index) {
        Some(Resolved::Type(ty)) => Ok(ty),
        _ => Err(CodingError::malformed(format!(
            "argument {} of '{}' is not a type",
            index, shape.identifier
        ))),
    }
}

fn field<'p>(
    shape: &Shape,
    payload: &'p JsonValue,
    name: &str,
) -> Result<&'p JsonValue, CodingError> {
    payload.get(name).ok_or_else(|| {
        CodingError::malformed(format!(
            "payload of '{}' is missing '{}'",
            shape.identifier, name
        ))
    })
}
