//! The state transition function of the symbolic executor.
//!
//! Each step inspects the head of the continuation body of a state and produces its successors.
//! Calls nested in expressions are suspended first: the call is replaced by a placeholder, the
//! enclosing statement is saved in a [crate::Frame] and the call runs on its own. Its result
//! replaces the placeholder when the frame resumes.

mod core_externs;
mod expr_stepper;
mod stmt_stepper;

use p4_ir::Expression;
use tracing::{trace, warn};

use crate::continuation::Command;
use crate::dispatch::ExternMethodImpls;
use crate::error::{bug, Result};
use crate::execution_state::ExecutionState;
use crate::targets::TestgenTarget;

pub use self::core_externs::core_extern_method_impls;

pub struct SmallStepEvaluator<'a> {
    target: &'a dyn TestgenTarget,

    /// Externs common to every target, consulted after the target's own table.
    core_externs: ExternMethodImpls,
}

impl<'a> SmallStepEvaluator<'a> {
    pub fn new(target: &'a dyn TestgenTarget) -> Result<Self> {
        Ok(Self {
            target,
            core_externs: core_extern_method_impls()?,
        })
    }

    pub fn target(&self) -> &'a dyn TestgenTarget {
        self.target
    }

    /// Advance `state` by one step. Every successor is one feasible continuation.
    ///
    /// An [crate::Error::Unimplemented] error only concerns the branch of `state`. Every other
    /// error is fatal.
    pub fn step(&self, state: &ExecutionState) -> Result<Vec<ExecutionState>> {
        let Some(command) = state.body().front() else {
            if state.stack().is_empty() {
                return Err(bug!("cannot step a terminal execution state"));
            }

            // Falling off the end of a body returns without a value
            return self.step_return(state, None);
        };

        trace!(%command, depth = state.stack().len(), "step");
        match command {
            Command::Statement(statement) => self.step_statement(state, statement),
            Command::Call(call) => self.step_call(state, call),
            Command::Return(value) => self.step_return(state, value.clone()),
        }
    }

    /// Like [Self::step] but a branch that reaches an unimplemented construct is abandoned with a
    /// warning instead of failing.
    pub fn step_or_abandon(&self, state: &ExecutionState) -> Result<Vec<ExecutionState>> {
        match self.step(state) {
            Err(err) if !err.is_fatal() => {
                warn!(%err, "abandoning execution branch");
                Ok(Vec::new())
            }
            result => result,
        }
    }

    /// Resume the innermost frame. A program level return ends execution.
    fn step_return(
        &self,
        state: &ExecutionState,
        value: Option<Expression>,
    ) -> Result<Vec<ExecutionState>> {
        let mut next = state.clone();
        let Some(frame) = next.pop_frame() else {
            next.clear_continuation();
            return Ok(vec![next]);
        };

        let mut body = frame.body;
        if let Some(parameter) = &frame.parameter {
            let value = value
                .ok_or_else(|| bug!("call returning to {parameter} did not produce a value"))?;

            match body.pop_front() {
                Some(Command::Statement(statement)) => {
                    let statement = expr_stepper::substitute_parameter(&statement, parameter, &value);
                    body.push_front(Command::Statement(statement));
                }
                other => {
                    return Err(bug!(
                        "continuation of {parameter} must start with a statement, found {other:?}"
                    ))
                }
            }
        }

        next.resume(body, frame.namespaces);
        Ok(vec![next])
    }
}
