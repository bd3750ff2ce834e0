use std::collections::BTreeSet;

use p4_ir::{Expression, StateVariable};
use p4tools_common::{AbstractSolver, Constraint, Model, SatResult};
use serde::Serialize;
use tracing::debug;

use crate::concolic::{ConcolicMethodImpls, ConcolicResolver};
use crate::error::Result;
use crate::execution_state::ExecutionState;
use crate::trace_events::TraceEvent;

/// A solved terminal state: concrete inputs and the concrete value of every location.
#[derive(Clone, Debug, Serialize)]
pub struct FinalState {
    /// Completed model of the path condition, i.e. the test inputs.
    pub model: Model,

    /// The environment evaluated under `model`.
    pub env: Model,
    pub trace: Vec<String>,
}

impl FinalState {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self).map_err(p4tools_common::Error::from)?)
    }
}

#[derive(Clone, Debug)]
pub enum SolveOutcome {
    Solved(FinalState),
    Infeasible,

    /// The solver could not decide the path condition. This does not prove the path infeasible.
    Unknown,
}

/// Solve the path condition of `state` and resolve its concolic variables.
///
/// Concolic variables are resolved against the completed model. Their values are then asserted
/// alongside the path condition, which may turn a feasible path infeasible. The inputs the
/// concolic methods read are pinned to the values they were computed from.
pub fn solve(
    state: &ExecutionState,
    solver: &mut dyn AbstractSolver,
    concolic_impls: &ConcolicMethodImpls,
) -> Result<SolveOutcome> {
    let mut constraints: Vec<Constraint> = state.path_constraint().iter().cloned().collect();

    solver.comment("path condition");
    let model = match solver.check_sat(&constraints)? {
        SatResult::Sat => solver.get_model()?,
        SatResult::Unsat => return Ok(SolveOutcome::Infeasible),
        SatResult::Unknown => return Ok(SolveOutcome::Unknown),
    };

    let completed = state.env().complete(&model);
    let mut resolver = ConcolicResolver::new(&completed, state, concolic_impls);
    for (_, value) in state.env().iter() {
        resolver.resolve(value)?;
    }
    for constraint in state.path_constraint() {
        resolver.resolve(constraint)?;
    }
    let resolved = resolver.into_resolved();

    let mut trace: Vec<String> = state.trace().iter().map(ToString::to_string).collect();
    let completed = if resolved.is_empty() {
        completed
    } else {
        for input in concolic_inputs(state) {
            let value = completed.evaluate(&Expression::symbolic(input.clone()))?;
            constraints.push(Expression::symbolic(input).equ(value));
        }
        for (member, value) in &resolved {
            constraints.push(Expression::symbolic(member.clone()).equ(value.clone()));
            let event = TraceEvent::Concolic {
                member: member.clone(),
                value: value.clone(),
            };
            trace.push(event.to_string());
        }

        solver.comment("concolic assignments");
        match solver.check_sat(&constraints)? {
            SatResult::Sat => state.env().complete(&solver.get_model()?),
            SatResult::Unsat => {
                debug!("concolic values contradict the path condition");
                return Ok(SolveOutcome::Infeasible);
            }
            SatResult::Unknown => return Ok(SolveOutcome::Unknown),
        }
    };

    let env = state.env().evaluate(&completed)?;
    Ok(SolveOutcome::Solved(FinalState {
        model: completed,
        env,
        trace,
    }))
}

/// Symbolic variables read by the arguments of the concolic variables of `state`.
fn concolic_inputs(state: &ExecutionState) -> BTreeSet<StateVariable> {
    let mut inputs = BTreeSet::new();
    let mut collect = |expr: &Expression| {
        if let Expression::Concolic(var) = expr {
            for arg in &var.arguments {
                arg.expr.visit(&mut |node| {
                    if let Expression::Symbolic(input) = node {
                        inputs.insert(input.clone());
                    }
                });
            }
        }
    };

    for (_, value) in state.env().iter() {
        value.visit(&mut collect);
    }
    for constraint in state.path_constraint() {
        constraint.visit(&mut collect);
    }
    inputs
}
