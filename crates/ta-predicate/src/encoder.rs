// encoder.rs — Predicate → archive.
//
// Walks the expression tree top-down. Every node kind, every generic
// argument type and every accessor is looked up in the encoding
// configuration and written by identifier only. Anything missing from the
// allowlist fails the whole encode; nothing partial is ever produced.
//
// The variable's type is the one exception. It is always written as
// `input.0` and the decoder substitutes its caller's input type, so the
// input type never needs an identifier of its own. Descriptor nesting is
// held to the configured depth limit so every archive written here can be
// decoded under the same limits.

use serde_json::{json, Value as JsonValue};

use crate::configuration::{Configuration, TypeConstructor};
use crate::error::CodingError;
use crate::expression::{Expression, Node};
use crate::predicate::Predicate;
use crate::standard;
use crate::structure::{PredicateArchive, StructureDescriptor, WireNode};
use crate::value::ValueType;

/// Encode a predicate into archive bytes.
pub fn encode<Input>(
    predicate: &Predicate<Input>,
    configuration: &Configuration,
) -> Result<Vec<u8>, CodingError> {
    let archive = Encoder::new(configuration).archive(predicate)?;
    let bytes = serde_json::to_vec(&archive)?;
    tracing::debug!("predicate encoded: {} bytes", bytes.len());
    Ok(bytes)
}

/// Builds [`PredicateArchive`]s against one configuration.
pub struct Encoder<'c> {
    configuration: &'c Configuration,
}

impl<'c> Encoder<'c> {
    pub fn new(configuration: &'c Configuration) -> Self {
        Self { configuration }
    }

    /// Encode `predicate` as a single-record archive.
    pub fn archive<Input>(
        &self,
        predicate: &Predicate<Input>,
    ) -> Result<PredicateArchive, CodingError> {
        let mut path = Vec::new();
        let (structure, payload) = self.expression(predicate.expression(), &mut path)?;
        Ok(PredicateArchive {
            records: vec![WireNode {
                variable: predicate.variable(),
                expression: 0,
                structure,
            }],
            payload: vec![payload],
        })
    }

    fn expression(
        &self,
        expression: &Expression,
        path: &mut Vec<String>,
    ) -> Result<(StructureDescriptor, JsonValue), CodingError> {
        self.check_depth(path)?;
        let kind = expression.kind();
        let identifier = self
            .configuration
            .identifier_for_constructor(TypeConstructor::Expression(kind))
            .ok_or_else(|| not_allowed(standard::expression_identifier(kind), path))?;

        path.push(identifier.to_string());
        let encoded = self.node(expression, path);
        path.pop();

        let (args, payload) = encoded?;
        Ok((StructureDescriptor::new(identifier, args), payload))
    }

    /// Generic arguments and payload of one node.
    fn node(
        &self,
        expression: &Expression,
        path: &mut Vec<String>,
    ) -> Result<(Vec<StructureDescriptor>, JsonValue), CodingError> {
        match expression.node() {
            Node::Variable(key) => {
                self.check_depth(path)?;
                Ok((
                    vec![StructureDescriptor::new(standard::INPUT, vec![])],
                    json!({ "key": key.value() }),
                ))
            }
            Node::Value(value) => {
                let literal = value.to_literal().ok_or_else(|| {
                    CodingError::malformed(format!(
                        "a value of type '{}' has no literal encoding",
                        value.type_name()
                    ))
                })?;
                Ok((
                    vec![self.value_type(expression.output(), path)?],
                    json!({ "value": literal }),
                ))
            }
            Node::KeyPath { root, accessor } => {
                let (root_structure, root_payload) = self.expression(root, path)?;
                let value = self.value_type(accessor.value_type(), path)?;
                let identifier = self
                    .configuration
                    .identifier_for_accessor(accessor)
                    .ok_or_else(|| CodingError::AccessorNotAllowed {
                        accessor: accessor.to_string(),
                    })?;
                Ok((
                    vec![root_structure, value],
                    json!({ "root": root_payload, "identifier": identifier }),
                ))
            }
            Node::Equal(lhs, rhs)
            | Node::NotEqual(lhs, rhs)
            | Node::Conjunction(lhs, rhs)
            | Node::Disjunction(lhs, rhs) => {
                let (lhs_structure, lhs_payload) = self.expression(lhs, path)?;
                let (rhs_structure, rhs_payload) = self.expression(rhs, path)?;
                Ok((
                    vec![lhs_structure, rhs_structure],
                    json!({ "lhs": lhs_payload, "rhs": rhs_payload }),
                ))
            }
            Node::Comparison { lhs, rhs, op } => {
                let (lhs_structure, lhs_payload) = self.expression(lhs, path)?;
                let (rhs_structure, rhs_payload) = self.expression(rhs, path)?;
                Ok((
                    vec![lhs_structure, rhs_structure],
                    json!({ "lhs": lhs_payload, "rhs": rhs_payload, "op": op }),
                ))
            }
            Node::Negation(wrapped) => {
                let (structure, payload) = self.expression(wrapped, path)?;
                Ok((vec![structure], json!({ "wrapped": payload })))
            }
            Node::TypeCheck { input, ty } => {
                let (input_structure, input_payload) = self.expression(input, path)?;
                let checked = self.value_type(ty, path)?;
                Ok((
                    vec![input_structure, checked],
                    json!({ "input": input_payload }),
                ))
            }
            Node::SequenceContains { sequence, element } => {
                let (sequence_structure, sequence_payload) = self.expression(sequence, path)?;
                let (element_structure, element_payload) = self.expression(element, path)?;
                Ok((
                    vec![sequence_structure, element_structure],
                    json!({ "sequence": sequence_payload, "element": element_payload }),
                ))
            }
        }
    }

    /// Descriptor of a data type: its own identifier if it has one,
    /// otherwise its generic container with the element type as argument.
    fn value_type(
        &self,
        ty: &ValueType,
        path: &mut Vec<String>,
    ) -> Result<StructureDescriptor, CodingError> {
        self.check_depth(path)?;
        if let Some(identifier) = self.configuration.identifier_for_type(ty) {
            return Ok(StructureDescriptor::new(identifier, vec![]));
        }
        let (constructor, element) = match ty {
            ValueType::Array(element) => (TypeConstructor::Array, element),
            ValueType::Dictionary(element) => (TypeConstructor::Dictionary, element),
            _ => return Err(not_allowed(ty.to_string(), path)),
        };
        let identifier = self
            .configuration
            .identifier_for_constructor(constructor)
            .ok_or_else(|| not_allowed(ty.to_string(), path))?;

        path.push(identifier.to_string());
        let argument = self.value_type(element, path);
        path.pop();

        Ok(StructureDescriptor::new(identifier, vec![argument?]))
    }

    /// A descriptor is about to be written below `path`.
    fn check_depth(&self, path: &[String]) -> Result<(), CodingError> {
        let limit = self.configuration.limits().max_depth;
        if path.len() >= limit {
            return Err(CodingError::DepthLimitExceeded {
                limit,
                path: render_path(path),
            });
        }
        Ok(())
    }
}

fn not_allowed(identifier: String, path: &[String]) -> CodingError {
    CodingError::TypeNotAllowed {
        identifier,
        path: render_path(path),
    }
}

/// `/a/b` for the identifiers enclosing a node, `/` at the root.
pub(crate) fn render_path(path: &[String]) -> String {
    format!("/{}", path.join("/"))
}
