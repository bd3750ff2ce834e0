use std::fmt;
use std::sync::Arc;

use im::Vector;
use p4_ir::{Expression, MethodCallExpression, StateVariable, Statement};

use crate::namespace_context::NamespaceContext;

/// A unit of pending computation at the head of a continuation body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Statement(Statement),

    /// Invoke a call whose arguments are free of nested calls. The call runs in its own frame and
    /// hands its result to that frame with [Command::Return].
    Call(Arc<MethodCallExpression>),

    /// Return to the enclosing frame, optionally with a value.
    Return(Option<Expression>),
}

impl From<Statement> for Command {
    fn from(statement: Statement) -> Self {
        Command::Statement(statement)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Statement(statement) => write!(f, "{statement}"),
            Command::Call(call) => write!(f, "call {call}"),
            Command::Return(Some(value)) => write!(f, "return {value}"),
            Command::Return(None) => write!(f, "return"),
        }
    }
}

/// A suspended continuation waiting for a call to return.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Commands to resume with once the call returns.
    pub body: Vector<Command>,

    /// Placeholder standing for the return value inside `body`. Calls evaluated for their side
    /// effects only have no parameter.
    pub parameter: Option<StateVariable>,

    /// Scopes to restore when the frame is resumed.
    pub namespaces: NamespaceContext,
}
