use std::collections::BTreeMap;
use std::fmt;

use p4_ir::{Expression, StateVariable};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::Result;

/// Assignment of concrete values to state variables. Values are always literals.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Model {
    values: BTreeMap<StateVariable, Expression>,
}

impl Model {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn get(&self, var: &StateVariable) -> Option<&Expression> {
        self.values.get(var)
    }

    pub fn contains(&self, var: &StateVariable) -> bool {
        self.values.contains_key(var)
    }

    /// Bind `var` to the literal `value`, returning the previous binding.
    pub fn insert(&mut self, var: StateVariable, value: Expression) -> Option<Expression> {
        debug_assert!(value.is_literal(), "model value {value} is not a literal");
        self.values.insert(var, value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StateVariable, &Expression)> {
        self.values.iter()
    }

    /// Evaluate `expr` in the context of this model. Every symbolic variable and concolic
    /// variable of `expr` is replaced by its binding and the result is folded into a literal.
    ///
    /// A BUG occurs if `expr` references a variable that is not bound by this model, or if it
    /// still contains reads of program storage or method calls.
    pub fn evaluate(&self, expr: &Expression) -> Result<Expression> {
        let substituted = expr.try_transform(&mut |node| match node {
            Expression::Symbolic(var) => self
                .get(var)
                .cloned()
                .map(Some)
                .ok_or_else(|| crate::bug!("variable {var} is not bound by the model")),
            Expression::Concolic(concolic) => self
                .get(&concolic.member)
                .cloned()
                .map(Some)
                .ok_or_else(|| {
                    crate::bug!(
                        "concolic variable {member} is not bound by the model",
                        member = concolic.member
                    )
                }),
            Expression::Var(var) => Err(crate::bug!(
                "cannot evaluate read of {var}, expected a symbolic value"
            )),
            Expression::MethodCall(call) => Err(crate::bug!(
                "cannot evaluate unresolved method call {call}"
            )),
            _ => Ok(None),
        })?;

        let value = substituted.fold();
        if value.is_literal() {
            Ok(value)
        } else {
            Err(crate::bug!(
                "expression {expr} did not evaluate to a literal: {value}"
            ))
        }
    }
}

impl FromIterator<(StateVariable, Expression)> for Model {
    fn from_iter<T: IntoIterator<Item = (StateVariable, Expression)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Model {
    type Item = (StateVariable, Expression);
    type IntoIter = std::collections::btree_map::IntoIter<StateVariable, Expression>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

impl Serialize for Model {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (var, value) in &self.values {
            map.serialize_entry(var.name(), &value.to_string())?;
        }
        map.end()
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (var, value) in &self.values {
            writeln!(f, "{var} = {value}")?;
        }

        Ok(())
    }
}
