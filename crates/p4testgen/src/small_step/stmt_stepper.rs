use std::iter;
use std::sync::Arc;

use p4_ir::{Expression, StateVariable, Statement};
use tracing::debug;

use super::expr_stepper::hoist_call;
use super::SmallStepEvaluator;
use crate::continuation::Command;
use crate::error::{bug, unimplemented_construct, Result};
use crate::execution_state::ExecutionState;
use crate::trace_events::TraceEvent;

impl SmallStepEvaluator<'_> {
    pub(super) fn step_statement(
        &self,
        state: &ExecutionState,
        statement: &Statement,
    ) -> Result<Vec<ExecutionState>> {
        if let Some(next) = hoist_call(state, statement) {
            return Ok(vec![next]);
        }

        let mut next = state.clone();
        next.pop_body();

        match statement {
            Statement::Assign { left, right } => assign(&mut next, state, left, right)?,
            Statement::Declare {
                var,
                init: Some(init),
            } => assign(&mut next, state, var, init)?,
            Statement::Declare { var, init: None } => next.taint(var),
            Statement::If {
                cond,
                then,
                otherwise,
            } => return step_if(state, next, cond, then, otherwise.as_ref()),
            Statement::Block(statements) => {
                next.push_body(statements.iter().cloned().map(Command::Statement));
            }
            Statement::MethodCall(call) => {
                let continuation = next.body().clone();
                next.enter_call(call.clone(), continuation, None);
            }
            Statement::Return(value) => {
                let value = value
                    .as_ref()
                    .map(|value| state.evaluate(value))
                    .transpose()?;
                return self.step_return(state, value);
            }
            Statement::Exit => {
                next.clear_continuation();
                next.add_trace_event(TraceEvent::Generic("exit".to_string()));
            }
            Statement::Empty => (),
        }

        Ok(vec![next])
    }
}

/// Store the value of `right` read in `source` to `left` in `target`. Headers and structs are
/// copied location by location, including validity bits.
pub(super) fn assign(
    target: &mut ExecutionState,
    source: &ExecutionState,
    left: &StateVariable,
    right: &Expression,
) -> Result<()> {
    if left.ty().is_base() {
        let value = source.evaluate(right)?;
        target.set(left.clone(), &value);
        return Ok(());
    }

    let Expression::Var(from) = right else {
        return Err(unimplemented_construct!(
            "assignment of {right} to {left} of type {ty}",
            ty = left.ty()
        ));
    };

    if from.ty() != left.ty() {
        return Err(bug!(
            "cannot assign {from} of type {from_ty} to {left} of type {left_ty}",
            from_ty = from.ty(),
            left_ty = left.ty()
        ));
    }

    for (to, from) in left.leaves().into_iter().zip(from.leaves()) {
        let value = source.get(&from)?.clone();
        target.set(to, &value);
    }

    Ok(())
}

fn step_if(
    state: &ExecutionState,
    mut next: ExecutionState,
    cond: &Expression,
    then: &Arc<Statement>,
    otherwise: Option<&Arc<Statement>>,
) -> Result<Vec<ExecutionState>> {
    let cond = state.evaluate(cond)?;

    if let Some(taken) = cond.as_bool() {
        let branch = if taken { Some(then) } else { otherwise };
        if let Some(branch) = branch {
            next.push_body(iter::once(Command::Statement((**branch).clone())));
        }
        return Ok(vec![next]);
    }

    let negated = cond.clone().not().fold();
    let tainted = state.has_taint(&cond);
    debug!(%cond, tainted, "forking on if statement");

    let mut then_state = next.clone();
    then_state.push_body(iter::once(Command::Statement((**then).clone())));
    then_state.add_trace_event(TraceEvent::IfStatementCondition(cond.clone()));

    let mut else_state = next;
    if let Some(otherwise) = otherwise {
        else_state.push_body(iter::once(Command::Statement((**otherwise).clone())));
    }
    else_state.add_trace_event(TraceEvent::IfStatementCondition(negated.clone()));

    // Either branch is reachable when the condition is unconstrained
    if !tainted {
        then_state.add_constraint(&cond);
        else_state.add_constraint(&negated);
    }

    Ok(vec![then_state, else_state])
}
