// expression.rs — The predicate expression vocabulary.
//
// The vocabulary is closed: every node is one of the `ExpressionKind`s
// below. Each kind has a generic signature (`ExpressionKind::signature`)
// that checks arity and operand constraints and yields the node's output
// type. The in-process builders and the decoder both go through it, so a
// tree that exists at all is well typed, and evaluation never meets an
// operand of the wrong type unless a variable is bound to one.

use std::cmp::Ordering;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};

use serde::{Deserialize, Serialize};

use crate::accessor::Accessor;
use crate::error::PredicateError;
use crate::value::{PredicateInput, Value, ValueType};

static NEXT_VARIABLE_KEY: AtomicU32 = AtomicU32::new(0);

/// Opaque key binding a variable node to its input value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariableKey {
    key: u32,
}

impl VariableKey {
    pub fn new(key: u32) -> Self {
        Self { key }
    }

    /// A key not handed out before in this process.
    pub fn fresh() -> Self {
        Self::new(NEXT_VARIABLE_KEY.fetch_add(1, AtomicOrdering::Relaxed))
    }

    pub fn value(self) -> u32 {
        self.key
    }
}

/// Operator carried by a comparison node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComparisonOperator {
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl ComparisonOperator {
    fn holds(self, ordering: Option<Ordering>) -> bool {
        match (self, ordering) {
            (_, None) => false,
            (ComparisonOperator::LessThan, Some(o)) => o == Ordering::Less,
            (ComparisonOperator::LessThanOrEqual, Some(o)) => o != Ordering::Greater,
            (ComparisonOperator::GreaterThan, Some(o)) => o == Ordering::Greater,
            (ComparisonOperator::GreaterThanOrEqual, Some(o)) => o != Ordering::Less,
        }
    }
}

/// The closed set of expression node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpressionKind {
    Variable,
    Value,
    KeyPath,
    Equal,
    NotEqual,
    Comparison,
    Conjunction,
    Disjunction,
    Negation,
    TypeCheck,
    SequenceContains,
}

impl ExpressionKind {
    pub const ALL: [ExpressionKind; 11] = [
        ExpressionKind::Variable,
        ExpressionKind::Value,
        ExpressionKind::KeyPath,
        ExpressionKind::Equal,
        ExpressionKind::NotEqual,
        ExpressionKind::Comparison,
        ExpressionKind::Conjunction,
        ExpressionKind::Disjunction,
        ExpressionKind::Negation,
        ExpressionKind::TypeCheck,
        ExpressionKind::SequenceContains,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ExpressionKind::Variable => "Variable",
            ExpressionKind::Value => "Value",
            ExpressionKind::KeyPath => "KeyPath",
            ExpressionKind::Equal => "Equal",
            ExpressionKind::NotEqual => "NotEqual",
            ExpressionKind::Comparison => "Comparison",
            ExpressionKind::Conjunction => "Conjunction",
            ExpressionKind::Disjunction => "Disjunction",
            ExpressionKind::Negation => "Negation",
            ExpressionKind::TypeCheck => "TypeCheck",
            ExpressionKind::SequenceContains => "SequenceContains",
        }
    }

    /// Check `operands` against this kind's generic constraints and return
    /// the output type, or `None` if arity or constraints are violated.
    ///
    /// Operand order is the order of the kind's generic arguments on the
    /// wire: `KeyPath<Root, Value>`, `TypeCheck<Input, Type>`, and so on.
    pub(crate) fn signature(self, operands: &[Operand<'_>]) -> Option<ValueType> {
        use Operand::{Expression as E, Type as T};

        match (self, operands) {
            (ExpressionKind::Variable, [T(ty)]) => Some((*ty).clone()),
            (ExpressionKind::Value, [T(ty)]) if ty.is_literal() => Some((*ty).clone()),
            (ExpressionKind::KeyPath, [E(_), T(value)]) => Some((*value).clone()),
            (ExpressionKind::Equal | ExpressionKind::NotEqual, [E(lhs), E(rhs)]) if lhs == rhs => {
                Some(ValueType::Bool)
            }
            (ExpressionKind::Comparison, [E(lhs), E(rhs)])
                if lhs == rhs && lhs.is_comparable() =>
            {
                Some(ValueType::Bool)
            }
            (
                ExpressionKind::Conjunction | ExpressionKind::Disjunction,
                [E(ValueType::Bool), E(ValueType::Bool)],
            ) => Some(ValueType::Bool),
            (ExpressionKind::Negation, [E(ValueType::Bool)]) => Some(ValueType::Bool),
            (ExpressionKind::TypeCheck, [E(_), T(_)]) => Some(ValueType::Bool),
            (ExpressionKind::SequenceContains, [E(ValueType::Array(element)), E(item)])
                if &**element == *item =>
            {
                Some(ValueType::Bool)
            }
            _ => None,
        }
    }
}

impl fmt::Display for ExpressionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A generic argument as seen by a signature: either a plain type or a
/// sub-expression with the given output type.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Operand<'a> {
    Type(&'a ValueType),
    Expression(&'a ValueType),
}

impl fmt::Display for Operand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Type(ty) => write!(f, "{}", ty),
            Operand::Expression(output) => write!(f, "expression of {}", output),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Node {
    Variable(VariableKey),
    Value(Value),
    KeyPath {
        root: Box<Expression>,
        accessor: Accessor,
    },
    Equal(Box<Expression>, Box<Expression>),
    NotEqual(Box<Expression>, Box<Expression>),
    Comparison {
        lhs: Box<Expression>,
        rhs: Box<Expression>,
        op: ComparisonOperator,
    },
    Conjunction(Box<Expression>, Box<Expression>),
    Disjunction(Box<Expression>, Box<Expression>),
    Negation(Box<Expression>),
    TypeCheck {
        input: Box<Expression>,
        ty: ValueType,
    },
    SequenceContains {
        sequence: Box<Expression>,
        element: Box<Expression>,
    },
}

/// A well-typed expression node with a static output type.
#[derive(Debug, Clone)]
pub struct Expression {
    node: Node,
    output: ValueType,
}

impl Expression {
    /// Wrap a node whose output type the caller has already checked.
    pub(crate) fn from_node(node: Node, output: ValueType) -> Self {
        Self { node, output }
    }

    pub(crate) fn node(&self) -> &Node {
        &self.node
    }

    pub(crate) fn variable(key: VariableKey, ty: ValueType) -> Self {
        Self::from_node(Node::Variable(key), ty)
    }

    /// A literal of a Rust value.
    pub fn value<T: PredicateInput>(value: T) -> Result<Self, PredicateError> {
        Self::typed_value(value.to_value(), T::value_type())
    }

    /// A literal with an explicit type, for values whose type cannot be
    /// inferred (e.g. empty arrays).
    pub fn typed_value(value: Value, ty: ValueType) -> Result<Self, PredicateError> {
        match ExpressionKind::Value.signature(&[Operand::Type(&ty)]) {
            Some(output) if ty.conforms(&value) => Ok(Self::from_node(Node::Value(value), output)),
            _ => Err(PredicateError::InvalidOperands {
                expression: ExpressionKind::Value.name(),
                operands: vec![ty.to_string(), value.type_name()],
            }),
        }
    }

    /// `root.<accessor>`.
    pub fn key_path(root: Expression, accessor: Accessor) -> Result<Self, PredicateError> {
        if !accessor.root().admits(&root.output) {
            return Err(PredicateError::InvalidOperands {
                expression: ExpressionKind::KeyPath.name(),
                operands: vec![root.output.to_string(), accessor.to_string()],
            });
        }
        let value = accessor.value_type().clone();
        let output = build(
            ExpressionKind::KeyPath,
            &[Operand::Expression(&root.output), Operand::Type(&value)],
        )?;
        Ok(Self::from_node(
            Node::KeyPath {
                root: Box::new(root),
                accessor,
            },
            output,
        ))
    }

    pub fn equal(lhs: Expression, rhs: Expression) -> Result<Self, PredicateError> {
        let output = binary(ExpressionKind::Equal, &lhs, &rhs)?;
        Ok(Self::from_node(
            Node::Equal(Box::new(lhs), Box::new(rhs)),
            output,
        ))
    }

    pub fn not_equal(lhs: Expression, rhs: Expression) -> Result<Self, PredicateError> {
        let output = binary(ExpressionKind::NotEqual, &lhs, &rhs)?;
        Ok(Self::from_node(
            Node::NotEqual(Box::new(lhs), Box::new(rhs)),
            output,
        ))
    }

    pub fn comparison(
        lhs: Expression,
        rhs: Expression,
        op: ComparisonOperator,
    ) -> Result<Self, PredicateError> {
        let output = binary(ExpressionKind::Comparison, &lhs, &rhs)?;
        Ok(Self::from_node(
            Node::Comparison {
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                op,
            },
            output,
        ))
    }

    pub fn conjunction(lhs: Expression, rhs: Expression) -> Result<Self, PredicateError> {
        let output = binary(ExpressionKind::Conjunction, &lhs, &rhs)?;
        Ok(Self::from_node(
            Node::Conjunction(Box::new(lhs), Box::new(rhs)),
            output,
        ))
    }

    pub fn disjunction(lhs: Expression, rhs: Expression) -> Result<Self, PredicateError> {
        let output = binary(ExpressionKind::Disjunction, &lhs, &rhs)?;
        Ok(Self::from_node(
            Node::Disjunction(Box::new(lhs), Box::new(rhs)),
            output,
        ))
    }

    pub fn negation(wrapped: Expression) -> Result<Self, PredicateError> {
        let output = build(
            ExpressionKind::Negation,
            &[Operand::Expression(&wrapped.output)],
        )?;
        Ok(Self::from_node(Node::Negation(Box::new(wrapped)), output))
    }

    /// `input is ty`.
    pub fn type_check(input: Expression, ty: ValueType) -> Result<Self, PredicateError> {
        let output = build(
            ExpressionKind::TypeCheck,
            &[Operand::Expression(&input.output), Operand::Type(&ty)],
        )?;
        Ok(Self::from_node(
            Node::TypeCheck {
                input: Box::new(input),
                ty,
            },
            output,
        ))
    }

    /// `sequence.contains(element)`.
    pub fn sequence_contains(
        sequence: Expression,
        element: Expression,
    ) -> Result<Self, PredicateError> {
        let output = binary(ExpressionKind::SequenceContains, &sequence, &element)?;
        Ok(Self::from_node(
            Node::SequenceContains {
                sequence: Box::new(sequence),
                element: Box::new(element),
            },
            output,
        ))
    }

    pub fn kind(&self) -> ExpressionKind {
        match &self.node {
            Node::Variable(_) => ExpressionKind::Variable,
            Node::Value(_) => ExpressionKind::Value,
            Node::KeyPath { .. } => ExpressionKind::KeyPath,
            Node::Equal(..) => ExpressionKind::Equal,
            Node::NotEqual(..) => ExpressionKind::NotEqual,
            Node::Comparison { .. } => ExpressionKind::Comparison,
            Node::Conjunction(..) => ExpressionKind::Conjunction,
            Node::Disjunction(..) => ExpressionKind::Disjunction,
            Node::Negation(_) => ExpressionKind::Negation,
            Node::TypeCheck { .. } => ExpressionKind::TypeCheck,
            Node::SequenceContains { .. } => ExpressionKind::SequenceContains,
        }
    }

    /// Static output type.
    pub fn output(&self) -> &ValueType {
        &self.output
    }

    /// Direct sub-expressions, in generic-argument order.
    pub fn children(&self) -> Vec<&Expression> {
        match &self.node {
            Node::Variable(_) | Node::Value(_) => vec![],
            Node::KeyPath { root, .. } => vec![&**root],
            Node::Equal(lhs, rhs)
            | Node::NotEqual(lhs, rhs)
            | Node::Conjunction(lhs, rhs)
            | Node::Disjunction(lhs, rhs)
            | Node::Comparison { lhs, rhs, .. } => vec![&**lhs, &**rhs],
            Node::Negation(wrapped) => vec![&**wrapped],
            Node::TypeCheck { input, .. } => vec![&**input],
            Node::SequenceContains { sequence, element } => vec![&**sequence, &**element],
        }
    }

    /// Evaluate against `bindings`.
    pub fn evaluate(&self, bindings: &Bindings) -> Result<Value, PredicateError> {
        match &self.node {
            Node::Variable(key) => {
                let value = bindings
                    .get(*key)
                    .ok_or(PredicateError::UnboundVariable { key: key.value() })?;
                if !self.output.conforms(value) {
                    return Err(PredicateError::TypeMismatch {
                        expected: self.output.to_string(),
                        found: value.type_name(),
                    });
                }
                Ok(value.clone())
            }
            Node::Value(value) => Ok(value.clone()),
            Node::KeyPath { root, accessor } => {
                let base = root.evaluate(bindings)?;
                accessor
                    .read(&base)
                    .ok_or_else(|| PredicateError::AccessorFailed {
                        accessor: accessor.to_string(),
                        found: base.type_name(),
                    })
            }
            Node::Equal(lhs, rhs) => Ok(Value::Bool(
                lhs.evaluate(bindings)? == rhs.evaluate(bindings)?,
            )),
            Node::NotEqual(lhs, rhs) => Ok(Value::Bool(
                lhs.evaluate(bindings)? != rhs.evaluate(bindings)?,
            )),
            Node::Comparison { lhs, rhs, op } => {
                let ordering = lhs.evaluate(bindings)?.compare(&rhs.evaluate(bindings)?);
                Ok(Value::Bool(op.holds(ordering)))
            }
            Node::Conjunction(lhs, rhs) => Ok(Value::Bool(
                lhs.evaluate_bool(bindings)? && rhs.evaluate_bool(bindings)?,
            )),
            Node::Disjunction(lhs, rhs) => Ok(Value::Bool(
                lhs.evaluate_bool(bindings)? || rhs.evaluate_bool(bindings)?,
            )),
            Node::Negation(wrapped) => Ok(Value::Bool(!wrapped.evaluate_bool(bindings)?)),
            Node::TypeCheck { input, ty } => Ok(Value::Bool(ty.conforms(&input.evaluate(bindings)?))),
            Node::SequenceContains { sequence, element } => {
                let needle = element.evaluate(bindings)?;
                match sequence.evaluate(bindings)? {
                    Value::Array(items) => Ok(Value::Bool(items.contains(&needle))),
                    other => Err(PredicateError::TypeMismatch {
                        expected: sequence.output.to_string(),
                        found: other.type_name(),
                    }),
                }
            }
        }
    }

    /// Evaluate an expression whose output type is `Bool`.
    pub fn evaluate_bool(&self, bindings: &Bindings) -> Result<bool, PredicateError> {
        match self.evaluate(bindings)? {
            Value::Bool(b) => Ok(b),
            other => Err(PredicateError::TypeMismatch {
                expected: ValueType::Bool.to_string(),
                found: other.type_name(),
            }),
        }
    }
}

fn build(kind: ExpressionKind, operands: &[Operand<'_>]) -> Result<ValueType, PredicateError> {
    kind.signature(operands)
        .ok_or_else(|| PredicateError::InvalidOperands {
            expression: kind.name(),
            operands: operands.iter().map(ToString::to_string).collect(),
        })
}

fn binary(
    kind: ExpressionKind,
    lhs: &Expression,
    rhs: &Expression,
) -> Result<ValueType, PredicateError> {
    build(
        kind,
        &[Operand::Expression(&lhs.output), Operand::Expression(&rhs.output)],
    )
}

/// Values bound to variable keys during evaluation.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    entries: Vec<(VariableKey, Value)>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, key: VariableKey, value: Value) -> Self {
        self.entries.retain(|(existing, _)| *existing != key);
        self.entries.push((key, value));
        self
    }

    pub fn get(&self, key: VariableKey) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(existing, _)| *existing == key)
            .map(|(_, value)| value)
    }
}
