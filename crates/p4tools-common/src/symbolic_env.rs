use im::OrdMap;
use p4_ir::{Expression, StateVariable};

use crate::error::Result;
use crate::model::Model;

/// A symbolic environment maps program state variables to their symbolic value. A symbolic value
/// is an expression over the initial program state.
///
/// The environment is persistent. Cloning is O(1) and a clone shares all bindings with the
/// original until either of them is updated.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SymbolicEnv {
    map: OrdMap<StateVariable, Expression>,
}

impl SymbolicEnv {
    pub fn new() -> Self {
        Default::default()
    }

    /// The symbolic value of `var`, if it is bound.
    pub fn get(&self, var: &StateVariable) -> Option<&Expression> {
        self.map.get(var)
    }

    pub fn exists(&self, var: &StateVariable) -> bool {
        self.map.contains_key(var)
    }

    /// Bind `var` to `value`. The value is constant folded before it is stored.
    pub fn set(&mut self, var: StateVariable, value: &Expression) {
        self.map.insert(var, value.fold());
    }

    /// Substitute the state variables read by `expr` with their value in this environment.
    /// Variables that are not bound by this environment are left untouched.
    pub fn subst(&self, expr: &Expression) -> Expression {
        expr.transform(&mut |node| match node {
            Expression::Var(var) => self.get(var).cloned(),
            _ => None,
        })
    }

    /// Complete `model` with a default value for every variable referenced by this environment
    /// that the model does not bind. The given model is left unchanged.
    pub fn complete(&self, model: &Model) -> Model {
        let mut completed = model.clone();
        for value in self.map.values() {
            for var in value.symbolic_variables() {
                if completed.contains(&var) {
                    continue;
                }

                if let Some(default) = Expression::default_value(var.ty()) {
                    completed.insert(var, default);
                }
            }
        }

        completed
    }

    /// Evaluate this environment in the context of `model`, producing a model that binds every
    /// variable of this environment to a literal.
    ///
    /// A BUG occurs if any symbolic value of this environment refers to a variable that is not
    /// bound by `model`.
    pub fn evaluate(&self, model: &Model) -> Result<Model> {
        self.map
            .iter()
            .map(|(var, value)| Ok((var.clone(), model.evaluate(value)?)))
            .collect()
    }

    /// Whether `node` is a symbolic value, i.e. an expression that may be stored in a symbolic
    /// environment. Symbolic values are built from literals, symbolic variables and concolic
    /// variables only.
    pub fn is_symbolic_value(node: &Expression) -> bool {
        match node {
            Expression::BoolLiteral(_)
            | Expression::Constant { .. }
            | Expression::Symbolic(_)
            | Expression::Concolic(_) => true,
            Expression::Unary { expr, .. }
            | Expression::Slice { expr, .. }
            | Expression::Cast { expr, .. } => Self::is_symbolic_value(expr),
            Expression::Binary { lhs, rhs, .. } | Expression::Concat { lhs, rhs, .. } => {
                Self::is_symbolic_value(lhs) && Self::is_symbolic_value(rhs)
            }
            Expression::Mux {
                cond,
                then,
                otherwise,
                ..
            } => {
                Self::is_symbolic_value(cond)
                    && Self::is_symbolic_value(then)
                    && Self::is_symbolic_value(otherwise)
            }
            Expression::Var(_) | Expression::MethodCall(_) => false,
        }
    }

    /// The persistent map backing this environment.
    pub fn internal_map(&self) -> &OrdMap<StateVariable, Expression> {
        &self.map
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StateVariable, &Expression)> {
        self.map.iter()
    }
}
