//! The eBPF kernel filter architecture.

use p4_ir::{BinaryOp, Expression, StateVariable, Type};
use tracing::warn;

use super::{Arch, TestgenTarget};
use crate::concolic::{core_concolic_method_impls, ConcolicMethodImpls};
use crate::continuation::Command;
use crate::dispatch::{ExternInfo, ExternMethodImpls};
use crate::error::{bug, unimplemented_construct, Result};
use crate::execution_state::ExecutionState;

pub struct EbpfTarget {
    externs: ExternMethodImpls,
    concolic: ConcolicMethodImpls,
}

impl EbpfTarget {
    pub fn new() -> Result<Self> {
        Ok(Self {
            externs: extern_method_impls()?,
            concolic: core_concolic_method_impls()?,
        })
    }
}

impl TestgenTarget for EbpfTarget {
    fn arch(&self) -> Arch {
        Arch::Ebpf
    }

    fn extern_method_impls(&self) -> &ExternMethodImpls {
        &self.externs
    }

    fn concolic_method_impls(&self) -> &ConcolicMethodImpls {
        &self.concolic
    }
}

pub fn extern_method_impls() -> Result<ExternMethodImpls> {
    let mut impls = ExternMethodImpls::new();

    // A CounterArray is an array of 32-bit counters indexed by a 32-bit value. The data plane can
    // only increment counters and never reads them back.
    impls.add("CounterArray.add", &["index", "value"], counter_update)?;
    impls.add("CounterArray.increment", &["index"], counter_update)?;

    impls.add(
        "*method.verify_ipv4_checksum",
        &["iphdr"],
        verify_ipv4_checksum,
    )?;
    impls.add("*method.tcp_conntrack", &["hdrs"], tcp_conntrack)?;

    Ok(impls)
}

// TODO: Model counter values once tests can assert on control plane state.
fn counter_update(
    info: &ExternInfo<'_>,
    state: &ExecutionState,
    result: &mut Vec<ExecutionState>,
) -> Result<()> {
    warn!(method = info.name, "counters are not modeled, the call has no effect");
    let mut next = state.clone();
    next.pop_body();
    result.push(next);
    Ok(())
}

/// The storage location passed as the single argument of `info`.
fn storage_argument<'a>(info: &ExternInfo<'a>, what: &str) -> Result<&'a StateVariable> {
    match info.args.first().map(|arg| &arg.expr) {
        Some(Expression::Var(var)) => Ok(var),
        Some(expr) => Err(unimplemented_construct!(
            "{what} input {expr} of type {ty} not supported",
            ty = expr.ty()
        )),
        None => Err(bug!("{name} invoked without arguments", name = info.name)),
    }
}

fn field(state: &ExecutionState, var: &StateVariable, name: &str) -> Result<Expression> {
    let member = var
        .member(name)
        .ok_or_else(|| bug!("{var} of type {ty} has no field {name}", ty = var.ty()))?;
    Ok(state.get(&member)?.clone())
}

/// Returns whether the checksum of an IPv4 header is correct. Invalid headers never verify.
fn verify_ipv4_checksum(
    info: &ExternInfo<'_>,
    state: &ExecutionState,
    result: &mut Vec<ExecutionState>,
) -> Result<()> {
    let iphdr = storage_argument(info, "IP header")?;
    if !iphdr.ty().is_header() {
        return Err(unimplemented_construct!(
            "IP header input {iphdr} has type {ty}, expected a header",
            ty = iphdr.ty()
        ));
    }

    let mut next = state.clone();
    let validity = state.get(&iphdr.validity())?;
    let valid = match validity.as_bool() {
        _ if state.has_taint(validity) => false,
        Some(valid) => valid,
        None => {
            return Err(bug!(
                "validity of {iphdr} is not a literal: {validity}"
            ))
        }
    };

    if !valid {
        next.replace_top_body(Command::Return(Some(Expression::bool(false))));
        result.push(next);
        return Ok(());
    }

    let read = |name: &str| field(state, iphdr, name);
    let bit16 = Type::bits(16);
    let word = |expr: Expression| expr.cast(Type::bits(32));

    // 16-bit words are summed in 32 bits, the carries are folded back in at the end
    let src_addr = read("srcAddr")?;
    let dst_addr = read("dstAddr")?;
    let words = [
        read("totalLen")?,
        read("identification")?,
        read("flags")?.concat(read("fragOffset")?),
        read("ttl")?.concat(read("protocol")?),
        read("hdrChecksum")?,
        src_addr.clone().slice(31, 16),
        src_addr.slice(15, 0),
        dst_addr.clone().slice(31, 16),
        dst_addr.slice(15, 0),
    ];

    let first = read("version")?
        .concat(read("ihl")?)
        .concat(read("diffserv")?);
    let sum = words
        .into_iter()
        .fold(word(first), |sum, next| sum.add(word(next)));

    let folded = Expression::binary_typed(
        BinaryOp::Add,
        bit16.clone(),
        sum.clone().slice(31, 16),
        sum.slice(15, 0),
    );
    let verified = folded.cmpl().equ(Expression::constant(bit16, 0));

    next.replace_top_body(Command::Return(Some(verified.fold())));
    result.push(next);
    Ok(())
}

/// Connection tracking reduced to a single packet: a TCP segment opens a connection if it has SYN
/// set and ACK clear. Tracking across packets is not supported.
fn tcp_conntrack(
    info: &ExternInfo<'_>,
    state: &ExecutionState,
    result: &mut Vec<ExecutionState>,
) -> Result<()> {
    let hdrs = storage_argument(info, "headers")?;
    if !matches!(hdrs.ty(), Type::Struct(_)) {
        return Err(unimplemented_construct!(
            "headers input {hdrs} has type {ty}, expected a struct",
            ty = hdrs.ty()
        ));
    }

    let tcp = hdrs
        .member("tcp")
        .ok_or_else(|| bug!("headers {hdrs} have no tcp header"))?;
    let syn = field(state, &tcp, "syn")?;
    let ack = field(state, &tcp, "ack")?;

    let syn_set = Expression::constant(syn.ty(), 1);
    let ack_clear = Expression::constant(ack.ty(), 0);
    let cond = syn.equ(syn_set).land(ack.equ(ack_clear));

    let mut next = state.clone();
    next.replace_top_body(Command::Return(Some(cond.fold())));
    result.push(next);
    Ok(())
}
