use std::collections::VecDeque;
use std::io::Write;

use p4_ir::*;
use p4tools_common::{AbstractSolver, Constraint, Model, SatResult};

use super::{bits, constant};
use crate::final_state::{solve, SolveOutcome};
use crate::{core_concolic_method_impls, ExecutionState, NamespaceContext, Result};

/// Answers checks from a script and records the constraints it was given.
#[derive(Default)]
struct ScriptedSolver {
    script: VecDeque<(SatResult, Model)>,
    checks: Vec<Vec<Constraint>>,
    last: Option<(SatResult, Model)>,
    comments: Vec<String>,
}

impl ScriptedSolver {
    fn new(script: impl IntoIterator<Item = (SatResult, Model)>) -> Self {
        Self {
            script: script.into_iter().collect(),
            ..Default::default()
        }
    }
}

impl AbstractSolver for ScriptedSolver {
    fn comment(&mut self, comment: &str) {
        self.comments.push(comment.to_string());
    }

    fn seed(&mut self, _seed: u32) {}

    fn timeout(&mut self, _timeout_ms: u32) {}

    fn check_sat(&mut self, asserts: &[Constraint]) -> p4tools_common::Result<SatResult> {
        self.checks.push(asserts.to_vec());
        let next = self
            .script
            .pop_front()
            .ok_or_else(|| p4tools_common::bug!("unexpected check"))?;
        let result = next.0;
        self.last = Some(next);
        Ok(result)
    }

    fn get_model(&self) -> p4tools_common::Result<Model> {
        match &self.last {
            Some((SatResult::Sat, model)) => Ok(model.clone()),
            _ => Err(p4tools_common::bug!("no model available")),
        }
    }

    fn to_json(&self, writer: &mut dyn Write) -> p4tools_common::Result<()> {
        writeln!(writer, "{{}}")?;
        Ok(())
    }

    fn is_in_incremental_mode(&self) -> bool {
        false
    }
}

fn model(bindings: impl IntoIterator<Item = (StateVariable, Expression)>) -> Model {
    let mut model = Model::new();
    for (var, value) in bindings {
        model.insert(var, value);
    }
    model
}

#[test]
fn infeasible_and_unknown_paths() -> Result<()> {
    let impls = core_concolic_method_impls()?;
    let x = bits("x", 8);
    let mut state = ExecutionState::new(Statement::Empty, NamespaceContext::empty());
    state.declare_input(&x);
    state.add_constraint(&Expression::symbolic(x).equ(constant(8, 1)));

    let mut solver = ScriptedSolver::new([(SatResult::Unsat, Model::new())]);
    assert!(matches!(
        solve(&state, &mut solver, &impls)?,
        SolveOutcome::Infeasible
    ));

    let mut solver = ScriptedSolver::new([(SatResult::Unknown, Model::new())]);
    assert!(matches!(
        solve(&state, &mut solver, &impls)?,
        SolveOutcome::Unknown
    ));
    assert_eq!(solver.checks.len(), 1);
    Ok(())
}

#[test]
fn environment_is_evaluated_under_model() -> Result<()> {
    let impls = core_concolic_method_impls()?;
    let x = bits("x", 8);
    let y = bits("y", 8);
    let z = bits("z", 8);

    let mut state = ExecutionState::new(Statement::Empty, NamespaceContext::empty());
    state.declare_input(&x);
    state.declare_input(&z);
    state.set(y.clone(), &Expression::symbolic(x.clone()).add(constant(8, 1)));
    state.add_constraint(&Expression::symbolic(x.clone()).equ(constant(8, 4)));

    // The solver only reports variables of the path condition
    let mut solver = ScriptedSolver::new([(SatResult::Sat, model([(x.clone(), constant(8, 4))]))]);
    let SolveOutcome::Solved(end) = solve(&state, &mut solver, &impls)? else {
        panic!("expected a solved state");
    };

    assert_eq!(solver.checks.len(), 1);
    assert_eq!(end.env.get(&y), Some(&constant(8, 5)));
    assert_eq!(end.env.get(&x), Some(&constant(8, 4)));

    // Unconstrained inputs take their default value
    assert_eq!(end.env.get(&z), Some(&constant(8, 0)));
    assert!(end.model.contains(&z));

    let json = end.to_json()?;
    assert!(json.contains("\"trace\""));
    Ok(())
}

#[test]
fn concolic_values_are_asserted() -> Result<()> {
    let impls = core_concolic_method_impls()?;
    let data = bits("data", 32);
    let out = bits("out", 16);

    let mut state = ExecutionState::new(Statement::Empty, NamespaceContext::empty());
    state.declare_input(&data);
    let checksum = state.create_concolic(
        "*method.checksum16",
        Type::bits(16),
        [Argument::positional(Expression::symbolic(data.clone()))],
    );
    state.set(out.clone(), &checksum);
    let Expression::Concolic(concolic) = &checksum else {
        panic!("expected a concolic variable, found {checksum}");
    };
    let member = concolic.member.clone();

    let expected = constant(16, u128::from(!0x4573u16));
    let input = constant(32, 0x4500_0073);
    let mut solver = ScriptedSolver::new([
        (SatResult::Sat, model([(data.clone(), input.clone())])),
        (
            SatResult::Sat,
            model([(data.clone(), input), (member.clone(), expected.clone())]),
        ),
    ]);

    let SolveOutcome::Solved(end) = solve(&state, &mut solver, &impls)? else {
        panic!("expected a solved state");
    };

    assert_eq!(solver.checks.len(), 2);
    assert_eq!(
        solver.checks[1].last(),
        Some(&Expression::symbolic(member.clone()).equ(expected.clone()))
    );
    assert_eq!(end.env.get(&out), Some(&expected));
    assert!(end.trace.iter().any(|event| event.starts_with("[Concolic]")));
    Ok(())
}

#[test]
fn contradicting_concolic_values_are_infeasible() -> Result<()> {
    let impls = core_concolic_method_impls()?;
    let data = bits("data", 16);

    let mut state = ExecutionState::new(Statement::Empty, NamespaceContext::empty());
    state.declare_input(&data);
    let checksum = state.create_concolic(
        "*method.checksum16",
        Type::bits(16),
        [Argument::positional(Expression::symbolic(data.clone()))],
    );
    state.add_constraint(&checksum.equ(constant(16, 0x1234)));

    let mut solver = ScriptedSolver::new([
        (SatResult::Sat, model([(data, constant(16, 0xffff))])),
        (SatResult::Unsat, Model::new()),
    ]);

    assert!(matches!(
        solve(&state, &mut solver, &impls)?,
        SolveOutcome::Infeasible
    ));
    assert_eq!(solver.comments.len(), 2);
    Ok(())
}

#[test]
fn concolic_inputs_are_pinned() -> Result<()> {
    let impls = core_concolic_method_impls()?;
    let data = bits("data", 16);
    let out = bits("out", 16);

    let mut state = ExecutionState::new(Statement::Empty, NamespaceContext::empty());
    state.declare_input(&data);
    let checksum = state.create_concolic(
        "*method.checksum16",
        Type::bits(16),
        [Argument::positional(Expression::symbolic(data.clone()))],
    );
    state.set(out, &checksum);
    state.add_constraint(&checksum.equ(Expression::symbolic(data.clone())));

    // The checksum of 0 is 0xffff, so data cannot move to 0xffff without changing its checksum
    let mut solver = ScriptedSolver::new([
        (SatResult::Sat, model([(data.clone(), constant(16, 0))])),
        (SatResult::Unsat, Model::new()),
    ]);

    assert!(matches!(
        solve(&state, &mut solver, &impls)?,
        SolveOutcome::Infeasible
    ));
    assert_eq!(solver.checks.len(), 2);
    assert!(solver.checks[1].contains(&Expression::symbolic(data).equ(constant(16, 0))));
    Ok(())
}

#[cfg(feature = "z3")]
#[test]
fn solve_with_z3() -> Result<()> {
    use p4tools_common::Z3Solver;

    let impls = core_concolic_method_impls()?;
    let x = bits("x", 8);
    let y = bits("y", 8);
    let mut state = ExecutionState::new(Statement::Empty, NamespaceContext::empty());
    state.declare_input(&x);
    state.set(y.clone(), &Expression::symbolic(x.clone()).add(constant(8, 1)));
    state.add_constraint(&Expression::symbolic(x).equ(constant(8, 9)));

    let config = z3::Config::new();
    let ctx = z3::Context::new(&config);
    let mut solver = Z3Solver::new(&ctx, false);
    let SolveOutcome::Solved(end) = solve(&state, &mut solver, &impls)? else {
        panic!("expected a solved state");
    };

    assert_eq!(end.env.get(&y), Some(&constant(8, 10)));
    Ok(())
}

#[cfg(feature = "z3")]
#[test]
fn solved_concolic_values_match_inputs() -> Result<()> {
    use p4tools_common::Z3Solver;

    let impls = core_concolic_method_impls()?;
    let data = bits("data", 16);
    let out = bits("out", 16);

    let mut state = ExecutionState::new(Statement::Empty, NamespaceContext::empty());
    state.declare_input(&data);
    let checksum = state.create_concolic(
        "*method.checksum16",
        Type::bits(16),
        [Argument::positional(Expression::symbolic(data.clone()))],
    );
    state.set(out.clone(), &checksum);
    state.add_constraint(&checksum.equ(Expression::symbolic(data.clone())));

    let config = z3::Config::new();
    let ctx = z3::Context::new(&config);
    let mut solver = Z3Solver::new(&ctx, false);
    if let SolveOutcome::Solved(end) = solve(&state, &mut solver, &impls)? {
        let input = end
            .env
            .get(&data)
            .and_then(Expression::as_constant)
            .expect("data is solved");
        let output = end.env.get(&out).and_then(Expression::as_constant);
        assert_eq!(output, Some(u128::from(crate::checksum16(input, 16))));
    }
    Ok(())
}
