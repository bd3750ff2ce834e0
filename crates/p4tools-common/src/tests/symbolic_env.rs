use std::sync::Arc;

use p4_ir::*;
use proptest::prelude::*;

use crate::*;

fn bits8(name: &str) -> StateVariable {
    StateVariable::new(name, Type::bits(8))
}

fn constant(value: u128) -> Expression {
    Expression::constant(Type::bits(8), value)
}

#[test]
fn set_folds_value() {
    let x = bits8("x");
    let mut env = SymbolicEnv::new();
    env.set(x.clone(), &constant(200).add(constant(100)));

    assert!(env.exists(&x));
    assert_eq!(env.get(&x), Some(&constant(44)));
}

#[test]
fn get_unbound_is_none() {
    let env = SymbolicEnv::new();
    assert!(env.get(&bits8("x")).is_none());
    assert!(!env.exists(&bits8("x")));
}

#[test]
fn subst_replaces_bound_reads() {
    let x = bits8("x");
    let y = bits8("y");
    let mut env = SymbolicEnv::new();
    env.set(x.clone(), &Expression::symbolic(bits8("x0")));

    let expr = Expression::var(x).add(Expression::var(y.clone()));
    let result = env.subst(&expr);
    assert_eq!(
        result,
        Expression::symbolic(bits8("x0")).add(Expression::var(y))
    );
}

#[test]
fn subst_without_bound_reads_is_identity() {
    let env = SymbolicEnv::new();
    let lhs = Expression::var(bits8("a")).add(constant(1));
    let expr = lhs.clone().equ(constant(2));

    let result = env.subst(&expr);
    assert_eq!(result, expr);

    // The untouched subtree is shared rather than rebuilt
    match (&expr, &result) {
        (Expression::Binary { lhs: before, .. }, Expression::Binary { lhs: after, .. }) => {
            assert!(Arc::ptr_eq(before, after));
        }
        _ => panic!("expected binary expressions"),
    }
}

#[test]
fn clone_shares_until_modified() {
    let x = bits8("x");
    let y = bits8("y");
    let mut env = SymbolicEnv::new();
    env.set(x.clone(), &constant(1));

    let mut fork = env.clone();
    assert_eq!(fork, env);

    fork.set(y.clone(), &constant(2));
    assert!(fork.exists(&y));
    assert!(!env.exists(&y));
    assert_eq!(env.get(&x), fork.get(&x));
}

#[test]
fn complete_adds_defaults() {
    let x = bits8("x");
    let flag = StateVariable::new("flag", Type::Bool);
    let mut env = SymbolicEnv::new();
    env.set(
        bits8("out"),
        &Expression::symbolic(x.clone()).add(constant(1)),
    );
    env.set(
        StateVariable::new("valid", Type::Bool),
        &Expression::symbolic(flag.clone()),
    );

    let completed = env.complete(&Model::new());
    assert_eq!(completed.get(&x), Some(&constant(0)));
    assert_eq!(completed.get(&flag), Some(&Expression::bool(false)));
}

#[test]
fn complete_preserves_existing_bindings() {
    let x = bits8("x");
    let mut env = SymbolicEnv::new();
    env.set(bits8("out"), &Expression::symbolic(x.clone()));

    let mut model = Model::new();
    model.insert(x.clone(), constant(7));

    let completed = env.complete(&model);
    assert_eq!(completed.get(&x), Some(&constant(7)));

    // Completing twice changes nothing
    assert_eq!(env.complete(&completed), completed);
}

#[test]
fn evaluate_env() -> Result<()> {
    let x = bits8("x");
    let out = bits8("out");
    let mut env = SymbolicEnv::new();
    env.set(out.clone(), &Expression::symbolic(x.clone()).add(constant(1)));

    let mut model = Model::new();
    model.insert(x, constant(9));

    let evaluated = env.evaluate(&model)?;
    assert_eq!(evaluated.get(&out), Some(&constant(10)));
    Ok(())
}

#[test]
fn evaluate_missing_binding_is_bug() {
    let mut env = SymbolicEnv::new();
    env.set(bits8("out"), &Expression::symbolic(bits8("x")));

    let result = env.evaluate(&Model::new());
    assert!(matches!(result, Err(Error::Bug(_))));
}

#[test]
fn symbolic_values() {
    let x = bits8("x");
    assert!(SymbolicEnv::is_symbolic_value(&constant(1)));
    assert!(SymbolicEnv::is_symbolic_value(
        &Expression::symbolic(x.clone()).add(constant(1))
    ));
    assert!(!SymbolicEnv::is_symbolic_value(&Expression::var(x.clone())));
    assert!(!SymbolicEnv::is_symbolic_value(
        &Expression::symbolic(x.clone()).add(Expression::var(x))
    ));
}

proptest! {
    #[test]
    fn stored_values_are_folded(a in any::<u8>(), b in any::<u8>()) {
        let x = bits8("x");
        let mut env = SymbolicEnv::new();
        env.set(x.clone(), &constant(u128::from(a)).add(constant(u128::from(b))));
        let expected = constant(u128::from(a.wrapping_add(b)));
        prop_assert_eq!(env.get(&x), Some(&expected));
    }
}
