mod common;

use common::{Explorer, Filter};
use p4_ir::*;
use p4testgen::targets::{self, Arch};
use p4testgen::{Result, TestgenConfig, TraceEvent};

fn explore(config: &TestgenConfig) -> Result<(Filter, Vec<p4testgen::ExecutionState>)> {
    common::initialize_logger();
    let target = targets::create(config.arch)?;
    let explorer = Explorer::new(target.as_ref(), config)?;
    let filter = Filter::new()?;
    let ends = explorer.explore(filter.initial_state()?)?;
    Ok((filter, ends))
}

fn passes(state: &p4testgen::ExecutionState, filter: &Filter) -> Result<bool> {
    Ok(state.get(&filter.pass)?.as_bool() == Some(true))
}

fn extern_calls(state: &p4testgen::ExecutionState) -> Vec<&str> {
    state
        .trace()
        .iter()
        .filter_map(|event| match event {
            TraceEvent::ExternCall { name, .. } => Some(name.as_str()),
            _ => None,
        })
        .collect()
}

#[test]
fn every_path_is_explored() -> Result<()> {
    let (filter, ends) = explore(&TestgenConfig::default())?;
    assert_eq!(ends.len(), 5);

    let passing = ends
        .iter()
        .map(|end| passes(end, &filter))
        .collect::<Result<Vec<_>>>()?;
    assert_eq!(passing.iter().filter(|&&pass| pass).count(), 2);

    for end in &ends {
        assert!(end.is_terminal());
        assert!(!end.path_constraint().is_empty());
        assert_eq!(extern_calls(end)[0], "*method.verify_ipv4_checksum");
    }
    Ok(())
}

#[test]
fn tcp_path_counts_connection() -> Result<()> {
    let (filter, ends) = explore(&TestgenConfig::default())?;

    let counted: Vec<_> = ends
        .iter()
        .filter(|end| extern_calls(end).contains(&"CounterArray.increment"))
        .collect();
    assert_eq!(counted.len(), 1);
    assert!(passes(counted[0], &filter)?);

    // Checksum, protocol and connection conditions
    assert_eq!(counted[0].path_constraint().len(), 3);
    Ok(())
}

#[test]
fn marked_path_updates_header() -> Result<()> {
    let (filter, ends) = explore(&TestgenConfig::default())?;
    let diffserv = filter
        .hdrs
        .member("ipv4")
        .and_then(|ipv4| ipv4.member("diffserv"))
        .expect("diffserv field");

    let marked: Vec<_> = ends
        .iter()
        .filter(|end| {
            end.trace()
                .iter()
                .any(|event| event == &TraceEvent::Generic("[Action]: mark".to_string()))
        })
        .collect();
    assert_eq!(marked.len(), 1);

    let expected = Expression::symbolic(diffserv.clone()).add(common::constant(8, 1));
    assert_eq!(marked[0].get(&diffserv)?, &expected);
    assert!(passes(marked[0], &filter)?);
    assert_eq!(marked[0].namespaces(), &filter.namespaces);
    Ok(())
}

#[test]
fn exit_path_drops_packet() -> Result<()> {
    let (filter, ends) = explore(&TestgenConfig::default())?;
    let exited: Vec<_> = ends
        .iter()
        .filter(|end| end.trace().back() == Some(&TraceEvent::Generic("exit".to_string())))
        .collect();

    assert_eq!(exited.len(), 1);
    assert!(!passes(exited[0], &filter)?);
    Ok(())
}

#[test]
fn step_bound_drops_long_paths() -> Result<()> {
    let config = TestgenConfig::from_json(r#"{ "max_steps": 3 }"#)?;
    let (_, ends) = explore(&config)?;
    assert!(ends.is_empty());
    Ok(())
}

#[test]
fn target_is_selected_by_config() -> Result<()> {
    let config = TestgenConfig::from_json(r#"{ "arch": "ebpf" }"#)?;
    assert_eq!(config.arch, Arch::Ebpf);
    assert_eq!(targets::create(config.arch)?.arch(), Arch::Ebpf);
    Ok(())
}

#[cfg(feature = "z3")]
#[test]
fn every_path_is_solved() -> Result<()> {
    use p4testgen::final_state::{solve, SolveOutcome};
    use p4tools_common::{AbstractSolver, Z3Solver};

    let config = TestgenConfig::from_json(r#"{ "solver": { "seed": 1, "timeout_ms": 10000 } }"#)?;
    let (filter, ends) = explore(&config)?;
    let target = targets::create(config.arch)?;

    let z3_config = z3::Config::new();
    let ctx = z3::Context::new(&z3_config);
    for end in &ends {
        let mut solver = Z3Solver::new(&ctx, config.solver.incremental);
        config.solver.apply(&mut solver);

        let SolveOutcome::Solved(solved) =
            solve(end, &mut solver, target.concolic_method_impls())?
        else {
            panic!("every path of the filter is feasible");
        };

        for constraint in end.path_constraint() {
            assert_eq!(
                solved.model.evaluate(constraint)?,
                Expression::bool(true),
                "{constraint}"
            );
        }
        assert!(solved.env.get(&filter.pass).is_some());
        assert!(!solver.is_in_incremental_mode());
    }
    Ok(())
}
