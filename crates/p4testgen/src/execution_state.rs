use std::sync::Arc;

use im::{OrdSet, Vector};
use p4_ir::{
    Argument, ConcolicVariable, Declaration, Expression, MethodCallExpression, Namespace, Path,
    StateVariable, Statement, Type,
};
use p4tools_common::SymbolicEnv;

use crate::continuation::{Command, Frame};
use crate::error::{bug, Result};
use crate::namespace_context::NamespaceContext;
use crate::trace_events::TraceEvent;

/// One node of the exploration tree: the symbolic environment, the remaining computation and the
/// knowledge accumulated along the path leading to it.
///
/// Every component is persistent. Cloning a state is O(1) and forks share all structure that
/// neither side modifies afterwards.
#[derive(Clone, Debug)]
pub struct ExecutionState {
    env: SymbolicEnv,
    body: Vector<Command>,
    stack: Vector<Frame>,
    path_constraint: Vector<Expression>,
    trace: Vector<TraceEvent>,

    /// Labels of symbolic variables whose value is unconstrained rather than determined by the
    /// path condition.
    taint: OrdSet<StateVariable>,
    namespaces: NamespaceContext,
    symbol_counter: u64,
}

impl ExecutionState {
    /// A state that starts executing `program` in the given scopes.
    pub fn new(program: Statement, namespaces: NamespaceContext) -> Self {
        Self {
            env: SymbolicEnv::new(),
            body: Vector::unit(Command::Statement(program)),
            stack: Vector::new(),
            path_constraint: Vector::new(),
            trace: Vector::new(),
            taint: OrdSet::new(),
            namespaces,
            symbol_counter: 0,
        }
    }

    pub fn env(&self) -> &SymbolicEnv {
        &self.env
    }

    /// The symbolic value of `var`.
    ///
    /// A BUG occurs if `var` is not bound. Every location the program reads must be initialized
    /// before it is read.
    pub fn get(&self, var: &StateVariable) -> Result<&Expression> {
        self.env
            .get(var)
            .ok_or_else(|| bug!("state variable {var} is not bound in the symbolic environment"))
    }

    pub fn exists(&self, var: &StateVariable) -> bool {
        self.env.exists(var)
    }

    pub fn set(&mut self, var: StateVariable, value: &Expression) {
        self.env.set(var, value);
    }

    /// Bind every location of the program input `var` to a symbolic variable of the same name.
    pub fn declare_input(&mut self, var: &StateVariable) {
        for leaf in var.leaves() {
            let value = Expression::symbolic(leaf.clone());
            self.env.set(leaf, &value);
        }
    }

    /// Substitute every read of a base-typed location in `expr` with its symbolic value. Reads of
    /// headers and structs are references and remain untouched.
    pub fn subst_reads(&self, expr: &Expression) -> Result<Expression> {
        expr.try_transform(&mut |node| match node {
            Expression::Var(var) if var.ty().is_base() => self.get(var).cloned().map(Some),
            _ => Ok(None),
        })
    }

    /// [Self::subst_reads] followed by constant folding.
    pub fn evaluate(&self, expr: &Expression) -> Result<Expression> {
        Ok(self.subst_reads(expr)?.fold())
    }

    /// A fresh symbolic variable label derived from `base`.
    pub fn create_symbolic(&mut self, base: &str, ty: Type) -> StateVariable {
        let label = StateVariable::new(format!("{base}#{n}", n = self.symbol_counter), ty);
        self.symbol_counter += 1;
        label
    }

    /// A concolic variable computed by `method` from `args`, with a fresh member slot.
    pub fn create_concolic(
        &mut self,
        method: &str,
        ty: Type,
        args: impl IntoIterator<Item = Argument>,
    ) -> Expression {
        let member = self.create_symbolic(&format!("*{method}"), ty);
        Expression::concolic(ConcolicVariable::new(method, member, args))
    }

    /// Bind every location of `var` to a fresh unconstrained value.
    pub fn taint(&mut self, var: &StateVariable) {
        for leaf in var.leaves() {
            let label = self.create_symbolic(leaf.name(), leaf.ty().clone());
            self.taint.insert(label.clone());
            self.env.set(leaf, &Expression::symbolic(label));
        }
    }

    /// Whether the value of `expr` depends on an unconstrained value.
    pub fn has_taint(&self, expr: &Expression) -> bool {
        !self.taint.is_empty()
            && expr
                .symbolic_variables()
                .iter()
                .any(|var| self.taint.contains(var))
    }

    pub fn body(&self) -> &Vector<Command> {
        &self.body
    }

    pub fn stack(&self) -> &Vector<Frame> {
        &self.stack
    }

    pub fn pop_body(&mut self) -> Option<Command> {
        self.body.pop_front()
    }

    /// Replace the command at the head of the body.
    pub fn replace_top_body(&mut self, command: Command) {
        self.body.pop_front();
        self.body.push_front(command);
    }

    /// Prepend `commands` to the body, preserving their order.
    pub fn push_body(&mut self, commands: impl DoubleEndedIterator<Item = Command>) {
        for command in commands.rev() {
            self.body.push_front(command);
        }
    }

    /// Suspend the rest of the body in a frame and continue with `call`. When the call returns
    /// its value replaces `parameter` in the suspended body.
    pub fn enter_call(
        &mut self,
        call: Arc<MethodCallExpression>,
        continuation: Vector<Command>,
        parameter: Option<StateVariable>,
    ) {
        self.stack.push_front(Frame {
            body: continuation,
            parameter,
            namespaces: self.namespaces.clone(),
        });
        self.body = Vector::unit(Command::Call(call));
    }

    pub fn pop_frame(&mut self) -> Option<Frame> {
        self.stack.pop_front()
    }

    /// Continue with `body` in the given scopes.
    pub fn resume(&mut self, body: Vector<Command>, namespaces: NamespaceContext) {
        self.body = body;
        self.namespaces = namespaces;
    }

    /// Drop the remaining computation, making this state terminal.
    pub fn clear_continuation(&mut self) {
        self.body.clear();
        self.stack.clear();
    }

    /// Whether there is no computation left.
    pub fn is_terminal(&self) -> bool {
        self.body.is_empty() && self.stack.is_empty()
    }

    pub fn path_constraint(&self) -> &Vector<Expression> {
        &self.path_constraint
    }

    /// Add a constraint to the path condition. Constraints that fold to `true` are dropped.
    pub fn add_constraint(&mut self, constraint: &Expression) {
        let constraint = constraint.fold();
        if constraint.as_bool() != Some(true) {
            self.path_constraint.push_back(constraint);
        }
    }

    pub fn trace(&self) -> &Vector<TraceEvent> {
        &self.trace
    }

    pub fn add_trace_event(&mut self, event: TraceEvent) {
        self.trace.push_back(event);
    }

    pub fn namespaces(&self) -> &NamespaceContext {
        &self.namespaces
    }

    pub fn push_namespace(&mut self, namespace: Arc<Namespace>) {
        self.namespaces = self.namespaces.push(namespace);
    }

    pub fn pop_namespace(&mut self) -> Result<()> {
        self.namespaces = self.namespaces.pop()?;
        Ok(())
    }

    pub fn find_decl(&self, path: &Path) -> Result<&Declaration> {
        self.namespaces.find_decl(path)
    }
}
