mod final_state;

use std::sync::Arc;

use im::Vector;
use p4_ir::*;
use tracing_subscriber::EnvFilter;

use crate::{Command, ExecutionState, NamespaceContext, Result, SmallStepEvaluator};

pub(crate) fn initialize_logger() {
    // Multiple tests may race to install the subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub(crate) fn bits(name: &str, width: u32) -> StateVariable {
    StateVariable::new(name, Type::bits(width))
}

pub(crate) fn constant(width: u32, value: u128) -> Expression {
    Expression::constant(Type::bits(width), value)
}

pub(crate) fn ipv4_header() -> Type {
    let fields = [
        ("version", 4),
        ("ihl", 4),
        ("diffserv", 8),
        ("totalLen", 16),
        ("identification", 16),
        ("flags", 3),
        ("fragOffset", 13),
        ("ttl", 8),
        ("protocol", 8),
        ("hdrChecksum", 16),
        ("srcAddr", 32),
        ("dstAddr", 32),
    ];

    Type::header(StructType::new(
        "ipv4_t",
        fields
            .into_iter()
            .map(|(name, width)| Field::new(name, Type::bits(width))),
    ))
}

pub(crate) fn tcp_header() -> Type {
    Type::header(StructType::new(
        "tcp_t",
        [
            Field::new("srcPort", Type::bits(16)),
            Field::new("dstPort", Type::bits(16)),
            Field::new("syn", Type::bits(1)),
            Field::new("ack", Type::bits(1)),
        ],
    ))
}

pub(crate) fn headers_struct() -> Type {
    Type::structure(StructType::new(
        "headers_t",
        [
            Field::new("ipv4", ipv4_header()),
            Field::new("tcp", tcp_header()),
        ],
    ))
}

/// Bind the named fields of `var` to constants.
pub(crate) fn set_fields(state: &mut ExecutionState, var: &StateVariable, values: &[(&str, u128)]) {
    for (name, value) in values {
        let member = var.member(name).expect("field exists");
        let value = Expression::constant(member.ty().clone(), *value);
        state.set(member, &value);
    }
}

/// A valid IPv4 header with a correct checksum.
pub(crate) fn set_ipv4_fields(state: &mut ExecutionState, ipv4: &StateVariable, checksum: u128) {
    state.set(ipv4.validity(), &Expression::bool(true));
    set_fields(
        state,
        ipv4,
        &[
            ("version", 4),
            ("ihl", 5),
            ("diffserv", 0),
            ("totalLen", 0x73),
            ("identification", 0),
            ("flags", 0b010),
            ("fragOffset", 0),
            ("ttl", 0x40),
            ("protocol", 0x11),
            ("hdrChecksum", checksum),
            ("srcAddr", 0xc0a8_0001),
            ("dstAddr", 0xc0a8_00c7),
        ],
    );
}

/// A state whose next step invokes `call`.
pub(crate) fn call_state(call: MethodCallExpression) -> ExecutionState {
    let mut state = ExecutionState::new(Statement::Empty, NamespaceContext::empty());
    state.enter_call(Arc::new(call), Vector::new(), None);
    state
}

/// The value returned by the call at the head of `state`.
pub(crate) fn returned_value(state: &ExecutionState) -> Option<&Expression> {
    match state.body().front() {
        Some(Command::Return(value)) => value.as_ref(),
        _ => None,
    }
}

/// Explore every path of `state` depth first, returning the terminal states.
pub(crate) fn run(
    evaluator: &SmallStepEvaluator<'_>,
    state: ExecutionState,
) -> Result<Vec<ExecutionState>> {
    let mut pending = vec![state];
    let mut terminal = Vec::new();
    while let Some(state) = pending.pop() {
        if state.is_terminal() {
            terminal.push(state);
        } else {
            pending.extend(evaluator.step(&state)?);
        }
    }

    Ok(terminal)
}
