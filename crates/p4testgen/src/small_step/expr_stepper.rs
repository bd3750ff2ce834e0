use std::iter;
use std::sync::Arc;

use p4_ir::{
    Action, Argument, DeclarationKind, Expression, MethodCallExpression, Path, StateVariable,
    Statement,
};

use super::stmt_stepper::assign;
use super::SmallStepEvaluator;
use crate::continuation::Command;
use crate::dispatch::ExternInfo;
use crate::error::{bug, Result};
use crate::execution_state::ExecutionState;
use crate::trace_events::TraceEvent;

/// Base name of the placeholders standing for the result of a suspended call.
const RETURN_VALUE: &str = "*retval";

impl SmallStepEvaluator<'_> {
    /// Invoke `call`. Actions are inlined, everything else is dispatched to the target's extern
    /// table and then to the core extern table.
    pub(super) fn step_call(
        &self,
        state: &ExecutionState,
        call: &Arc<MethodCallExpression>,
    ) -> Result<Vec<ExecutionState>> {
        if call.receiver.is_none() {
            let path = Path::new(call.method.clone());
            if let Some(decl) = state.namespaces().try_find_decl(&path)? {
                if let DeclarationKind::Action(action) = &decl.kind {
                    return inline_action(state, call, &decl.name, action);
                }
            }
        }

        let args = call
            .args
            .iter()
            .map(|arg| evaluate_argument(state, arg))
            .collect::<Result<Vec<_>>>()?;

        let name = call.qualified_name();
        let info = ExternInfo {
            call: &**call,
            receiver: call.receiver.as_ref(),
            name: &name,
            args: &args,
        };

        let mut traced = state.clone();
        traced.add_trace_event(TraceEvent::ExternCall {
            name: name.clone(),
            args: args.clone(),
        });

        let mut result = Vec::new();
        if self
            .target
            .extern_method_impls()
            .exec(&info, &traced, &mut result)?
            || self.core_externs.exec(&info, &traced, &mut result)?
        {
            return Ok(result);
        }

        Err(bug!("unknown or unimplemented extern method: {name}"))
    }
}

/// Base-typed arguments are evaluated. Header and struct arguments stay references to storage.
fn evaluate_argument(state: &ExecutionState, arg: &Argument) -> Result<Argument> {
    let expr = if arg.expr.ty().is_base() {
        state.evaluate(&arg.expr)?
    } else {
        arg.expr.clone()
    };

    Ok(Argument {
        name: arg.name.clone(),
        expr,
    })
}

/// Bind the arguments of `call` to the parameters of `action` and continue with its body in the
/// scope of the action.
fn inline_action(
    state: &ExecutionState,
    call: &MethodCallExpression,
    name: &str,
    action: &Action,
) -> Result<Vec<ExecutionState>> {
    if call.args.len() != action.params.len() {
        return Err(bug!(
            "action {name} expects {expected} arguments, found {found}",
            expected = action.params.len(),
            found = call.args.len()
        ));
    }

    let mut next = state.clone();
    next.pop_body();

    // Arguments are read in the caller's state so a parameter shadowing an argument is harmless
    for (param, arg) in action.params.iter().zip(&call.args) {
        if arg.name.as_ref().is_some_and(|arg_name| *arg_name != param.name) {
            return Err(bug!(
                "argument {arg} does not match parameter {param} of action {name}",
                param = param.name
            ));
        }

        assign(&mut next, state, &param.state_variable(), &arg.expr)?;
    }

    next.push_namespace(action.namespace(name));
    next.push_body(iter::once(Command::Statement(action.body.clone())));
    next.add_trace_event(TraceEvent::Generic(format!("[Action]: {name}")));
    Ok(vec![next])
}

/// Suspend the leftmost innermost call nested in `statement`. The call runs in its own frame and
/// `statement`, with the call replaced by a placeholder, resumes once it returns.
pub(super) fn hoist_call(state: &ExecutionState, statement: &Statement) -> Option<ExecutionState> {
    let name = state.namespaces().gen_name(RETURN_VALUE, '_');
    let (rewritten, call) = hoist_from_statement(statement, &name)?;
    let parameter = StateVariable::new(name, call.ty.clone());

    let mut next = state.clone();
    next.replace_top_body(Command::Statement(rewritten));
    let continuation = next.body().clone();
    next.enter_call(call, continuation, Some(parameter));
    Some(next)
}

type Hoisted<T> = Option<(T, Arc<MethodCallExpression>)>;

fn hoist_from_statement(statement: &Statement, name: &str) -> Hoisted<Statement> {
    match statement {
        Statement::Assign { left, right } => {
            hoist_from_expr(right, name).map(|(right, call)| {
                let left = left.clone();
                (Statement::Assign { left, right }, call)
            })
        }
        Statement::Declare {
            var,
            init: Some(init),
        } => hoist_from_expr(init, name).map(|(init, call)| {
            let var = var.clone();
            (
                Statement::Declare {
                    var,
                    init: Some(init),
                },
                call,
            )
        }),
        Statement::If {
            cond,
            then,
            otherwise,
        } => hoist_from_expr(cond, name).map(|(cond, call)| {
            let statement = Statement::If {
                cond,
                then: then.clone(),
                otherwise: otherwise.clone(),
            };
            (statement, call)
        }),
        Statement::Return(Some(value)) => hoist_from_expr(value, name)
            .map(|(value, call)| (Statement::Return(Some(value)), call)),
        Statement::MethodCall(call) => hoist_from_args(call, name)
            .map(|(rewritten, inner)| (Statement::MethodCall(Arc::new(rewritten)), inner)),
        Statement::Declare { init: None, .. }
        | Statement::Return(None)
        | Statement::Block(_)
        | Statement::Exit
        | Statement::Empty => None,
    }
}

fn hoist_from_expr(expr: &Expression, name: &str) -> Hoisted<Expression> {
    let mut hoisted = None;
    let rewritten = expr.transform(&mut |node| {
        if hoisted.is_some() {
            return None;
        }

        let Expression::MethodCall(call) = node else {
            return None;
        };

        // Calls in the arguments run first
        match hoist_from_args(call, name) {
            Some((rewritten, inner)) => {
                hoisted = Some(inner);
                Some(Expression::method_call(rewritten))
            }
            None => {
                hoisted = Some(call.clone());
                Some(Expression::var(StateVariable::new(name, call.ty.clone())))
            }
        }
    });

    hoisted.map(|call| (rewritten, call))
}

fn hoist_from_args(call: &MethodCallExpression, name: &str) -> Hoisted<MethodCallExpression> {
    call.args.iter().enumerate().find_map(|(i, arg)| {
        let (expr, inner) = hoist_from_expr(&arg.expr, name)?;
        let mut rewritten = call.clone();
        rewritten.args[i] = Argument {
            name: arg.name.clone(),
            expr,
        };
        Some((rewritten, inner))
    })
}

/// Replace the placeholder `parameter` in `statement` with the returned `value`.
pub(super) fn substitute_parameter(
    statement: &Statement,
    parameter: &StateVariable,
    value: &Expression,
) -> Statement {
    let subst = |expr: &Expression| substitute(expr, parameter, value);
    match statement {
        Statement::Assign { left, right } => Statement::Assign {
            left: left.clone(),
            right: subst(right),
        },
        Statement::Declare { var, init } => Statement::Declare {
            var: var.clone(),
            init: init.as_ref().map(subst),
        },
        Statement::If {
            cond,
            then,
            otherwise,
        } => Statement::If {
            cond: subst(cond),
            then: then.clone(),
            otherwise: otherwise.clone(),
        },
        Statement::Return(returned) => Statement::Return(returned.as_ref().map(subst)),
        Statement::MethodCall(call) => {
            Statement::MethodCall(Arc::new(substitute_args(call, parameter, value)))
        }
        Statement::Block(_) | Statement::Exit | Statement::Empty => statement.clone(),
    }
}

fn substitute(expr: &Expression, parameter: &StateVariable, value: &Expression) -> Expression {
    expr.transform(&mut |node| match node {
        Expression::Var(var) if var == parameter => Some(value.clone()),
        Expression::MethodCall(call) => Some(Expression::method_call(substitute_args(
            call, parameter, value,
        ))),
        _ => None,
    })
}

fn substitute_args(
    call: &MethodCallExpression,
    parameter: &StateVariable,
    value: &Expression,
) -> MethodCallExpression {
    let args = call
        .args
        .iter()
        .map(|arg| Argument {
            name: arg.name.clone(),
            expr: substitute(&arg.expr, parameter, value),
        })
        .collect();

    MethodCallExpression {
        args,
        ..call.clone()
    }
}
