use p4_ir::{Expression, StateVariable};

use crate::continuation::Command;
use crate::dispatch::{ExternInfo, ExternMethodImpls};
use crate::error::{bug, unimplemented_construct, Result};
use crate::execution_state::ExecutionState;

/// Built-in methods available on every target.
pub fn core_extern_method_impls() -> Result<ExternMethodImpls> {
    let mut impls = ExternMethodImpls::new();

    impls.add("*header.isValid", &[], |info, state, result| {
        let header = header_receiver(info)?;
        let validity = state.get(&header.validity())?.clone();
        let mut next = state.clone();
        next.replace_top_body(Command::Return(Some(validity)));
        result.push(next);
        Ok(())
    })?;

    impls.add("*header.setValid", &[], |info, state, result| {
        set_validity(info, state, result, true)
    })?;

    impls.add("*header.setInvalid", &[], |info, state, result| {
        set_validity(info, state, result, false)
    })?;

    Ok(impls)
}

fn header_receiver<'a>(info: &ExternInfo<'a>) -> Result<&'a StateVariable> {
    match info.receiver {
        Some(Expression::Var(var)) if var.ty().is_header() => Ok(var),
        Some(receiver) => Err(unimplemented_construct!(
            "{name} invoked on {receiver} of type {ty}",
            name = info.name,
            ty = receiver.ty()
        )),
        None => Err(bug!("{name} invoked without a header", name = info.name)),
    }
}

fn set_validity(
    info: &ExternInfo<'_>,
    state: &ExecutionState,
    result: &mut Vec<ExecutionState>,
    valid: bool,
) -> Result<()> {
    let header = header_receiver(info)?;
    let mut next = state.clone();
    next.set(header.validity(), &Expression::bool(valid));
    next.pop_body();
    result.push(next);
    Ok(())
}
