use std::fmt;
use std::sync::Arc;

use crate::call::MethodCallExpression;
use crate::expr::{Expression, StateVariable};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Statement {
    Assign {
        left: StateVariable,
        right: Expression,
    },

    MethodCall(Arc<MethodCallExpression>),

    If {
        cond: Expression,
        then: Arc<Statement>,
        otherwise: Option<Arc<Statement>>,
    },

    Block(Arc<[Statement]>),

    /// Declaration of a local variable. Without an initializer the variable holds an unknown,
    /// tainted value.
    Declare {
        var: StateVariable,
        init: Option<Expression>,
    },

    Return(Option<Expression>),

    Exit,

    Empty,
}

impl Statement {
    pub fn assign(left: StateVariable, right: Expression) -> Self {
        Statement::Assign { left, right }
    }

    pub fn call(call: MethodCallExpression) -> Self {
        Statement::MethodCall(Arc::new(call))
    }

    pub fn if_then(cond: Expression, then: Statement) -> Self {
        Statement::If {
            cond,
            then: Arc::new(then),
            otherwise: None,
        }
    }

    pub fn if_else(cond: Expression, then: Statement, otherwise: Statement) -> Self {
        Statement::If {
            cond,
            then: Arc::new(then),
            otherwise: Some(Arc::new(otherwise)),
        }
    }

    pub fn block(statements: impl IntoIterator<Item = Statement>) -> Self {
        Statement::Block(statements.into_iter().collect())
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Assign { left, right } => write!(f, "{left} = {right};"),
            Statement::MethodCall(call) => write!(f, "{call};"),
            Statement::If { cond, .. } => write!(f, "if ({cond}) ..."),
            Statement::Block(statements) => write!(f, "{{ {len} statement(s) }}", len = statements.len()),
            Statement::Declare { var, init: Some(init) } => {
                write!(f, "{ty} {var} = {init};", ty = var.ty())
            }
            Statement::Declare { var, init: None } => write!(f, "{ty} {var};", ty = var.ty()),
            Statement::Return(Some(value)) => write!(f, "return {value};"),
            Statement::Return(None) => write!(f, "return;"),
            Statement::Exit => write!(f, "exit;"),
            Statement::Empty => write!(f, ";"),
        }
    }
}
