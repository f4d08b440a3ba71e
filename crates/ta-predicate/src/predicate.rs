// predicate.rs — Boolean expressions over a typed input.

use std::fmt;
use std::marker::PhantomData;

use crate::error::PredicateError;
use crate::expression::{Bindings, Expression, Node, VariableKey};
use crate::value::{PredicateInput, ValueType};

/// A boolean-valued expression tree evaluated against one `Input`.
///
/// A predicate can only be obtained through [`Predicate::new`] or
/// [`decode`](crate::decode), and both check that every node is well typed,
/// that the root produces `Bool`, and that the only variable is the
/// predicate's own input. Evaluating it against a conforming input cannot
/// fail with a type error.
pub struct Predicate<Input> {
    variable: VariableKey,
    expression: Expression,
    _input: PhantomData<fn(&Input) -> bool>,
}

impl<Input: PredicateInput> Predicate<Input> {
    /// Build a predicate from a closure receiving the input variable.
    ///
    /// ```
    /// use ta_predicate::{ComparisonOperator, Expression, Predicate, standard};
    /// use ta_predicate::value::ValueType;
    ///
    /// // $0.count > 2
    /// let predicate = Predicate::<String>::new(|input| {
    ///     let count = standard::count(&ValueType::String).unwrap();
    ///     Expression::comparison(
    ///         Expression::key_path(input, count)?,
    ///         Expression::value(2)?,
    ///         ComparisonOperator::GreaterThan,
    ///     )
    /// })
    /// .unwrap();
    /// assert!(predicate.evaluate(&"Hello".to_string()).unwrap());
    /// ```
    pub fn new<F>(build: F) -> Result<Self, PredicateError>
    where
        F: FnOnce(Expression) -> Result<Expression, PredicateError>,
    {
        let variable = VariableKey::fresh();
        let input = Expression::variable(variable, Input::value_type());
        Self::from_parts(variable, build(input)?)
    }

    pub(crate) fn from_parts(
        variable: VariableKey,
        expression: Expression,
    ) -> Result<Self, PredicateError> {
        if *expression.output() != ValueType::Bool {
            return Err(PredicateError::NotBoolean {
                output: expression.output().to_string(),
            });
        }
        check_variables(&expression, variable)?;
        Ok(Self {
            variable,
            expression,
            _input: PhantomData,
        })
    }

    /// Evaluate against `input`.
    pub fn evaluate(&self, input: &Input) -> Result<bool, PredicateError> {
        let bindings = Bindings::new().bind(self.variable, input.to_value());
        self.expression.evaluate_bool(&bindings)
    }
}

impl<Input> Predicate<Input> {
    pub fn variable(&self) -> VariableKey {
        self.variable
    }

    pub fn expression(&self) -> &Expression {
        &self.expression
    }
}

/// Every variable node must refer to the predicate's own input.
fn check_variables(expression: &Expression, variable: VariableKey) -> Result<(), PredicateError> {
    if let Node::Variable(key) = expression.node() {
        if *key != variable {
            return Err(PredicateError::UnboundVariable { key: key.value() });
        }
    }
    for child in expression.children() {
        check_variables(child, variable)?;
    }
    Ok(())
}

impl<Input> Clone for Predicate<Input> {
    fn clone(&self) -> Self {
        Self {
            variable: self.variable,
            expression: self.expression.clone(),
            _input: PhantomData,
        }
    }
}

impl<Input> fmt::Debug for Predicate<Input> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate")
            .field("variable", &self.variable)
            .field("expression", &self.expression)
            .finish()
    }
}
