use p4_ir::*;

use crate::*;

fn bits8(name: &str) -> StateVariable {
    StateVariable::new(name, Type::bits(8))
}

#[test]
fn evaluate_substitutes_and_folds() -> Result<()> {
    let x = bits8("x");
    let model: Model = [(x.clone(), Expression::constant(Type::bits(8), 250))]
        .into_iter()
        .collect();

    let expr = Expression::symbolic(x).add(Expression::constant(Type::bits(8), 10));
    assert_eq!(
        model.evaluate(&expr)?,
        Expression::constant(Type::bits(8), 4)
    );
    Ok(())
}

#[test]
fn evaluate_concolic_uses_member_binding() -> Result<()> {
    let member = StateVariable::new("*checksum16_0", Type::bits(16));
    let concolic = ConcolicVariable::new(
        "*method.checksum16",
        member.clone(),
        [Argument::positional(Expression::symbolic(bits8("x")))],
    );

    let mut model = Model::new();
    model.insert(member, Expression::constant(Type::bits(16), 0xbeef));

    // Arguments are not evaluated, only the member binding matters
    assert_eq!(
        model.evaluate(&Expression::concolic(concolic))?,
        Expression::constant(Type::bits(16), 0xbeef)
    );
    Ok(())
}

#[test]
fn evaluate_unbound_variable_is_bug() {
    let model = Model::new();
    let result = model.evaluate(&Expression::symbolic(bits8("x")));
    assert!(matches!(result, Err(Error::Bug(_))));
}

#[test]
fn evaluate_storage_read_is_bug() {
    let x = bits8("x");
    let mut model = Model::new();
    model.insert(x.clone(), Expression::constant(Type::bits(8), 1));

    let result = model.evaluate(&Expression::var(x));
    assert!(matches!(result, Err(Error::Bug(_))));
}

#[test]
fn serialize_as_name_value_map() -> Result<()> {
    let mut model = Model::new();
    model.insert(bits8("hdr.ttl"), Expression::constant(Type::bits(8), 64));
    model.insert(StateVariable::new("flag", Type::Bool), Expression::bool(true));

    let json = serde_json::to_value(&model)?;
    assert_eq!(json["hdr.ttl"], "8w64");
    assert_eq!(json["flag"], "true");
    Ok(())
}
