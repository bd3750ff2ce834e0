use std::sync::Arc;

use p4_ir::*;
use p4testgen::targets::TestgenTarget;
use p4testgen::{ExecutionState, NamespaceContext, Result, SmallStepEvaluator, TestgenConfig};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

pub fn initialize_logger() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Depth first exploration of every path of a program.
pub struct Explorer<'a> {
    evaluator: SmallStepEvaluator<'a>,
    max_steps: Option<usize>,
}

impl<'a> Explorer<'a> {
    pub fn new(target: &'a dyn TestgenTarget, config: &TestgenConfig) -> Result<Self> {
        Ok(Self {
            evaluator: SmallStepEvaluator::new(target)?,
            max_steps: config.max_steps,
        })
    }

    /// The terminal states reachable from `initial`. Paths longer than the step bound and paths
    /// reaching unimplemented constructs are dropped.
    pub fn explore(&self, initial: ExecutionState) -> Result<Vec<ExecutionState>> {
        let mut pending = vec![(initial, 0)];
        let mut terminal = Vec::new();

        while let Some((state, steps)) = pending.pop() {
            if state.is_terminal() {
                terminal.push(state);
                continue;
            }

            if self.max_steps.is_some_and(|max_steps| steps >= max_steps) {
                warn!(steps, "dropping path exceeding the step bound");
                continue;
            }

            let successors = self.evaluator.step_or_abandon(&state)?;
            debug!(steps, successors = successors.len(), "stepped");
            pending.extend(successors.into_iter().rev().map(|next| (next, steps + 1)));
        }

        Ok(terminal)
    }
}

pub fn header(name: &str, fields: &[(&str, u32)]) -> Type {
    Type::header(StructType::new(
        name,
        fields
            .iter()
            .map(|&(field, width)| Field::new(field, Type::bits(width))),
    ))
}

pub fn ipv4_header() -> Type {
    header(
        "ipv4_t",
        &[
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
        ],
    )
}

pub fn tcp_header() -> Type {
    header(
        "tcp_t",
        &[("srcPort", 16), ("dstPort", 16), ("syn", 1), ("ack", 1)],
    )
}

pub fn constant(width: u32, value: u128) -> Expression {
    Expression::constant(Type::bits(width), value)
}

pub fn read(var: &StateVariable, field: &str) -> Result<Expression> {
    var.member(field)
        .map(Expression::var)
        .ok_or_else(|| p4testgen::Error::Bug(format!("{var} has no field {field}")))
}

/// A connection filter over IPv4 and TCP.
///
/// ```text
/// pass = false;
/// if (verify_ipv4_checksum(hdrs.ipv4)) {
///     if (hdrs.ipv4.protocol == 6) {
///         if (tcp_conntrack(hdrs)) { counters.increment(0); pass = true; }
///     } else if (hdrs.ipv4.ttl == 0) {
///         exit;
///     } else {
///         mark(hdrs.ipv4.diffserv + 1);
///     }
/// }
/// ```
pub struct Filter {
    pub hdrs: StateVariable,
    pub pass: StateVariable,
    pub program: Statement,
    pub namespaces: NamespaceContext,
}

impl Filter {
    pub fn new() -> Result<Self> {
        let hdrs = StateVariable::new(
            "hdrs",
            Type::structure(StructType::new(
                "headers_t",
                [
                    Field::new("ipv4", ipv4_header()),
                    Field::new("tcp", tcp_header()),
                ],
            )),
        );
        let ipv4 = hdrs
            .member("ipv4")
            .ok_or_else(|| p4testgen::Error::Bug("headers without ipv4".to_string()))?;
        let pass = StateVariable::new("pass", Type::Bool);

        let checksum = MethodCallExpression::function(
            "verify_ipv4_checksum",
            [Argument::positional(Expression::var(ipv4.clone()))],
            Type::Bool,
        );
        let conntrack = MethodCallExpression::function(
            "tcp_conntrack",
            [Argument::named("hdrs", Expression::var(hdrs.clone()))],
            Type::Bool,
        );
        let increment = MethodCallExpression::method(
            Expression::var(StateVariable::new(
                "counters",
                Type::extern_type("CounterArray"),
            )),
            "increment",
            [Argument::positional(constant(32, 0))],
            Type::Void,
        );
        let mark = MethodCallExpression::function(
            "mark",
            [Argument::positional(read(&ipv4, "diffserv")?.add(constant(8, 1)))],
            Type::Void,
        );

        let tcp = Statement::if_then(
            Expression::method_call(conntrack),
            Statement::block([
                Statement::call(increment),
                Statement::assign(pass.clone(), Expression::bool(true)),
            ]),
        );
        let other = Statement::if_else(
            read(&ipv4, "ttl")?.equ(constant(8, 0)),
            Statement::Exit,
            Statement::call(mark),
        );
        let program = Statement::block([
            Statement::assign(pass.clone(), Expression::bool(false)),
            Statement::if_then(
                Expression::method_call(checksum),
                Statement::if_else(
                    read(&ipv4, "protocol")?.equ(constant(8, 6)),
                    tcp,
                    other,
                ),
            ),
        ]);

        // `mark` sets the traffic class of the packet
        let ds = Parameter::new("ds", Type::bits(8));
        let mark_body = Statement::block([
            Statement::assign(
                ipv4.member("diffserv")
                    .ok_or_else(|| p4testgen::Error::Bug("ipv4 without diffserv".to_string()))?,
                Expression::var(ds.state_variable()),
            ),
            Statement::assign(pass.clone(), Expression::bool(true)),
        ]);
        let control = Namespace::new("filter", NamespaceKind::Simple)
            .with_declaration(Declaration::variable(hdrs.clone()))
            .with_declaration(Declaration::variable(pass.clone()))
            .with_declaration(Declaration::action("mark", vec![ds], mark_body));
        let namespaces = NamespaceContext::empty().push(Arc::new(control));

        Ok(Self {
            hdrs,
            pass,
            program,
            namespaces,
        })
    }

    /// The initial state: symbolic packet headers that were parsed successfully.
    pub fn initial_state(&self) -> Result<ExecutionState> {
        let mut state = ExecutionState::new(self.program.clone(), self.namespaces.clone());
        state.declare_input(&self.hdrs);
        for header in ["ipv4", "tcp"] {
            let header = self
                .hdrs
                .member(header)
                .ok_or_else(|| p4testgen::Error::Bug(format!("headers without {header}")))?;
            state.set(header.validity(), &Expression::bool(true));
        }
        Ok(state)
    }
}
