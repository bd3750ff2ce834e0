use std::fmt;

use p4_ir::{Argument, Expression, StateVariable};

/// Human readable record of a decision taken while exploring a path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TraceEvent {
    Generic(String),

    /// A labelled value observed during execution.
    Expression { label: String, value: Expression },

    /// The condition assumed by the branch that was taken.
    IfStatementCondition(Expression),

    ExternCall { name: String, args: Vec<Argument> },

    /// A concolic variable resolved against a model.
    Concolic {
        member: StateVariable,
        value: Expression,
    },
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceEvent::Generic(message) => write!(f, "{message}"),
            TraceEvent::Expression { label, value } => write!(f, "{label}: {value}"),
            TraceEvent::IfStatementCondition(cond) => write!(f, "[If Statement]: {cond}"),
            TraceEvent::ExternCall { name, args } => {
                write!(f, "[Extern Call]: {name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            TraceEvent::Concolic { member, value } => write!(f, "[Concolic]: {member} = {value}"),
        }
    }
}
