use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::convert::Infallible;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::call::{Argument, MethodCallExpression};
use crate::types::Type;

/// Name of the implicit validity field of a header.
pub const VALIDITY_FIELD: &str = "$valid";

/// Opaque handle identifying a storage location of the program under test, e.g. a header field or
/// a local variable. Handles compare, order and hash by name only.
#[derive(Clone, Debug)]
pub struct StateVariable {
    name: Arc<str>,
    ty: Type,
}

impl StateVariable {
    pub fn new(name: impl Into<Arc<str>>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    /// The handle of field `field` of this header or struct. Returns `None` if the type of this
    /// variable has no such field.
    pub fn member(&self, field: &str) -> Option<StateVariable> {
        let ty = self.ty.field(field)?.clone();
        Some(Self::new(format!("{name}.{field}", name = self.name), ty))
    }

    /// The handle of the validity bit of this header.
    pub fn validity(&self) -> StateVariable {
        Self::new(
            format!("{name}.{VALIDITY_FIELD}", name = self.name),
            Type::Bool,
        )
    }

    /// All base-typed locations making up this variable, including the validity bits of headers.
    /// A base-typed variable is its own single leaf.
    pub fn leaves(&self) -> Vec<StateVariable> {
        if self.ty.is_base() {
            return vec![self.clone()];
        }

        let mut leaves = Vec::new();
        if self.ty.is_header() {
            leaves.push(self.validity());
        }

        for field in self.ty.fields() {
            if let Some(member) = self.member(&field.name) {
                leaves.extend(member.leaves());
            }
        }

        leaves
    }
}

impl PartialEq for StateVariable {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for StateVariable {}

impl PartialOrd for StateVariable {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StateVariable {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

impl Hash for StateVariable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Display for StateVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A value whose meaning is defined by an external, named implementation rather than by generic
/// symbolic rules. Once resolved, its value is bound to the `member` slot.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConcolicVariable {
    pub method: Arc<str>,
    pub member: StateVariable,
    pub arguments: Vec<Argument>,
}

impl ConcolicVariable {
    pub fn new(
        method: impl Into<Arc<str>>,
        member: StateVariable,
        arguments: impl IntoIterator<Item = Argument>,
    ) -> Self {
        Self {
            method: method.into(),
            member,
            arguments: arguments.into_iter().collect(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// Logical negation of a boolean
    LNot,

    /// Bitwise complement
    Cmpl,

    /// Two's complement negation
    Neg,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    BAnd,
    BOr,
    BXor,
    Shl,
    Shr,
    Equ,
    Neq,
    Lss,
    Leq,
    Grt,
    Geq,
    LAnd,
    LOr,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Equ
                | BinaryOp::Neq
                | BinaryOp::Lss
                | BinaryOp::Leq
                | BinaryOp::Grt
                | BinaryOp::Geq
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::LAnd | BinaryOp::LOr)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::BAnd => "&",
            BinaryOp::BOr => "|",
            BinaryOp::BXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Equ => "==",
            BinaryOp::Neq => "!=",
            BinaryOp::Lss => "<",
            BinaryOp::Leq => "<=",
            BinaryOp::Grt => ">",
            BinaryOp::Geq => ">=",
            BinaryOp::LAnd => "&&",
            BinaryOp::LOr => "||",
        }
    }
}

/// Immutable expression tree. Children are reference counted so that rewritten trees share every
/// subtree that did not change.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Expression {
    BoolLiteral(bool),

    /// A bit-vector literal. The value is always masked to the width of `ty`.
    Constant {
        ty: Type,
        value: u128,
    },

    /// A read of program storage.
    Var(StateVariable),

    /// An opaque unknown of the initial program state.
    Symbolic(StateVariable),

    /// A placeholder whose value is computed by an external implementation.
    Concolic(Arc<ConcolicVariable>),

    Unary {
        op: UnaryOp,
        ty: Type,
        expr: Arc<Expression>,
    },

    Binary {
        op: BinaryOp,
        ty: Type,
        lhs: Arc<Expression>,
        rhs: Arc<Expression>,
    },

    /// Bit concatenation. `lhs` holds the most significant bits.
    Concat {
        ty: Type,
        lhs: Arc<Expression>,
        rhs: Arc<Expression>,
    },

    /// Bits `high..=low` of `expr`.
    Slice {
        expr: Arc<Expression>,
        high: u32,
        low: u32,
    },

    Cast {
        ty: Type,
        expr: Arc<Expression>,
    },

    Mux {
        ty: Type,
        cond: Arc<Expression>,
        then: Arc<Expression>,
        otherwise: Arc<Expression>,
    },

    MethodCall(Arc<MethodCallExpression>),
}

#[derive(thiserror::Error, Debug)]
pub enum ConcretizationError {
    #[error("expression is not a literal: {0}")]
    NonLiteral(String),
}

/// Mask covering the low `width` bits.
pub fn mask(width: u32) -> u128 {
    if width >= u128::BITS {
        u128::MAX
    } else {
        (1u128 << width) - 1
    }
}

impl Expression {
    pub fn bool(value: bool) -> Self {
        Expression::BoolLiteral(value)
    }

    pub fn constant(ty: Type, value: u128) -> Self {
        let width = ty.width().unwrap_or(u128::BITS);
        Expression::Constant {
            ty,
            value: value & mask(width),
        }
    }

    pub fn var(var: StateVariable) -> Self {
        Expression::Var(var)
    }

    pub fn symbolic(var: StateVariable) -> Self {
        Expression::Symbolic(var)
    }

    pub fn concolic(var: ConcolicVariable) -> Self {
        Expression::Concolic(Arc::new(var))
    }

    pub fn method_call(call: MethodCallExpression) -> Self {
        Expression::MethodCall(Arc::new(call))
    }

    pub fn unary(op: UnaryOp, expr: Expression) -> Self {
        let ty = match op {
            UnaryOp::LNot => Type::Bool,
            UnaryOp::Cmpl | UnaryOp::Neg => expr.ty(),
        };

        Expression::Unary {
            op,
            ty,
            expr: Arc::new(expr),
        }
    }

    pub fn binary(op: BinaryOp, lhs: Expression, rhs: Expression) -> Self {
        let ty = if op.is_comparison() || op.is_logical() {
            Type::Bool
        } else {
            lhs.ty()
        };

        Expression::Binary {
            op,
            ty,
            lhs: Arc::new(lhs),
            rhs: Arc::new(rhs),
        }
    }

    /// Binary operation with an explicit result type, e.g. a 16-bit sum of two slices.
    pub fn binary_typed(op: BinaryOp, ty: Type, lhs: Expression, rhs: Expression) -> Self {
        Expression::Binary {
            op,
            ty,
            lhs: Arc::new(lhs),
            rhs: Arc::new(rhs),
        }
    }

    pub fn not(self) -> Self {
        Self::unary(UnaryOp::LNot, self)
    }

    pub fn cmpl(self) -> Self {
        Self::unary(UnaryOp::Cmpl, self)
    }

    pub fn add(self, rhs: Expression) -> Self {
        Self::binary(BinaryOp::Add, self, rhs)
    }

    pub fn equ(self, rhs: Expression) -> Self {
        Self::binary(BinaryOp::Equ, self, rhs)
    }

    pub fn land(self, rhs: Expression) -> Self {
        Self::binary(BinaryOp::LAnd, self, rhs)
    }

    pub fn lor(self, rhs: Expression) -> Self {
        Self::binary(BinaryOp::LOr, self, rhs)
    }

    pub fn concat(self, rhs: Expression) -> Self {
        let width = self.ty().width().unwrap_or(0) + rhs.ty().width().unwrap_or(0);
        Expression::Concat {
            ty: Type::Bits {
                width,
                signed: false,
            },
            lhs: Arc::new(self),
            rhs: Arc::new(rhs),
        }
    }

    pub fn slice(self, high: u32, low: u32) -> Self {
        debug_assert!(high >= low, "invalid slice [{high}:{low}]");
        Expression::Slice {
            expr: Arc::new(self),
            high,
            low,
        }
    }

    pub fn cast(self, ty: Type) -> Self {
        Expression::Cast {
            ty,
            expr: Arc::new(self),
        }
    }

    pub fn mux(cond: Expression, then: Expression, otherwise: Expression) -> Self {
        Expression::Mux {
            ty: then.ty(),
            cond: Arc::new(cond),
            then: Arc::new(then),
            otherwise: Arc::new(otherwise),
        }
    }

    /// Zero value of a base type: `false` or a zero constant.
    pub fn default_value(ty: &Type) -> Option<Self> {
        match ty {
            Type::Bool => Some(Expression::BoolLiteral(false)),
            Type::Bits { .. } => Some(Expression::constant(ty.clone(), 0)),
            _ => None,
        }
    }

    pub fn ty(&self) -> Type {
        match self {
            Expression::BoolLiteral(_) => Type::Bool,
            Expression::Constant { ty, .. }
            | Expression::Unary { ty, .. }
            | Expression::Binary { ty, .. }
            | Expression::Concat { ty, .. }
            | Expression::Cast { ty, .. }
            | Expression::Mux { ty, .. } => ty.clone(),
            Expression::Var(var) | Expression::Symbolic(var) => var.ty().clone(),
            Expression::Concolic(var) => var.member.ty().clone(),
            Expression::Slice { high, low, .. } => Type::Bits {
                width: high - low + 1,
                signed: false,
            },
            Expression::MethodCall(call) => call.ty.clone(),
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Expression::BoolLiteral(_) | Expression::Constant { .. }
        )
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Expression::BoolLiteral(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_constant(&self) -> Option<u128> {
        match self {
            Expression::Constant { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// The concrete value of a literal. Booleans concretize to `0` or `1`.
    pub fn concretize(&self) -> Result<u128, ConcretizationError> {
        match self {
            Expression::BoolLiteral(value) => Ok(u128::from(*value)),
            Expression::Constant { value, .. } => Ok(*value),
            _ => Err(ConcretizationError::NonLiteral(self.to_string())),
        }
    }

    /// Rewrite this tree in pre-order. Whenever `f` returns a replacement for a node the
    /// replacement is used as-is and its children are not visited. Subtrees that are not replaced
    /// are shared with the original tree.
    ///
    /// The arguments of method calls and concolic variables are not rewritten.
    pub fn transform<F>(&self, f: &mut F) -> Expression
    where
        F: FnMut(&Expression) -> Option<Expression>,
    {
        let result: Result<Expression, Infallible> = self.try_transform(&mut |expr| Ok(f(expr)));
        match result {
            Ok(expr) => expr,
            Err(never) => match never {},
        }
    }

    /// Fallible variant of [Self::transform]. The first error aborts the rewrite.
    pub fn try_transform<E, F>(&self, f: &mut F) -> Result<Expression, E>
    where
        F: FnMut(&Expression) -> Result<Option<Expression>, E>,
    {
        Ok(self.rewrite(f)?.unwrap_or_else(|| self.clone()))
    }

    /// Returns `None` if no node of this tree was replaced.
    fn rewrite<E, F>(&self, f: &mut F) -> Result<Option<Expression>, E>
    where
        F: FnMut(&Expression) -> Result<Option<Expression>, E>,
    {
        if let Some(replacement) = f(self)? {
            return Ok(Some(replacement));
        }

        let rewritten = match self {
            Expression::Unary { op, ty, expr } => {
                rewrite_child(expr, f)?.map(|expr| Expression::Unary {
                    op: *op,
                    ty: ty.clone(),
                    expr,
                })
            }
            Expression::Binary { op, ty, lhs, rhs } => {
                rewrite_pair(lhs, rhs, f)?.map(|(lhs, rhs)| Expression::Binary {
                    op: *op,
                    ty: ty.clone(),
                    lhs,
                    rhs,
                })
            }
            Expression::Concat { ty, lhs, rhs } => {
                rewrite_pair(lhs, rhs, f)?.map(|(lhs, rhs)| Expression::Concat {
                    ty: ty.clone(),
                    lhs,
                    rhs,
                })
            }
            Expression::Slice { expr, high, low } => {
                rewrite_child(expr, f)?.map(|expr| Expression::Slice {
                    expr,
                    high: *high,
                    low: *low,
                })
            }
            Expression::Cast { ty, expr } => {
                rewrite_child(expr, f)?.map(|expr| Expression::Cast {
                    ty: ty.clone(),
                    expr,
                })
            }
            Expression::Mux {
                ty,
                cond,
                then,
                otherwise,
            } => {
                let new_cond = rewrite_child(cond, f)?;
                let new_arms = rewrite_pair(then, otherwise, f)?;
                if new_cond.is_none() && new_arms.is_none() {
                    None
                } else {
                    let (then, otherwise) =
                        new_arms.unwrap_or_else(|| (then.clone(), otherwise.clone()));
                    Some(Expression::Mux {
                        ty: ty.clone(),
                        cond: new_cond.unwrap_or_else(|| cond.clone()),
                        then,
                        otherwise,
                    })
                }
            }
            Expression::BoolLiteral(_)
            | Expression::Constant { .. }
            | Expression::Var(_)
            | Expression::Symbolic(_)
            | Expression::Concolic(_)
            | Expression::MethodCall(_) => None,
        };

        Ok(rewritten)
    }

    /// Visit every node of this tree in pre-order, including the arguments of method calls and
    /// concolic variables.
    pub fn visit<F>(&self, f: &mut F)
    where
        F: FnMut(&Expression),
    {
        f(self);
        match self {
            Expression::Unary { expr, .. }
            | Expression::Slice { expr, .. }
            | Expression::Cast { expr, .. } => expr.visit(f),
            Expression::Binary { lhs, rhs, .. } | Expression::Concat { lhs, rhs, .. } => {
                lhs.visit(f);
                rhs.visit(f);
            }
            Expression::Mux {
                cond,
                then,
                otherwise,
                ..
            } => {
                cond.visit(f);
                then.visit(f);
                otherwise.visit(f);
            }
            Expression::Concolic(var) => {
                for arg in &var.arguments {
                    arg.expr.visit(f);
                }
            }
            Expression::MethodCall(call) => {
                if let Some(receiver) = &call.receiver {
                    receiver.visit(f);
                }
                for arg in &call.args {
                    arg.expr.visit(f);
                }
            }
            Expression::BoolLiteral(_)
            | Expression::Constant { .. }
            | Expression::Var(_)
            | Expression::Symbolic(_) => (),
        }
    }

    /// Labels of all symbolic variables and concolic member slots referenced by this tree.
    pub fn symbolic_variables(&self) -> BTreeSet<StateVariable> {
        let mut variables = BTreeSet::new();
        self.visit(&mut |expr| match expr {
            Expression::Symbolic(var) => {
                variables.insert(var.clone());
            }
            Expression::Concolic(concolic) => {
                variables.insert(concolic.member.clone());
            }
            _ => (),
        });

        variables
    }

    pub fn contains_method_call(&self) -> bool {
        let mut found = false;
        self.visit(&mut |expr| found |= matches!(expr, Expression::MethodCall(_)));
        found
    }
}

fn rewrite_child<E, F>(child: &Arc<Expression>, f: &mut F) -> Result<Option<Arc<Expression>>, E>
where
    F: FnMut(&Expression) -> Result<Option<Expression>, E>,
{
    Ok(child.rewrite(f)?.map(Arc::new))
}

type ChildPair = (Arc<Expression>, Arc<Expression>);

fn rewrite_pair<E, F>(
    lhs: &Arc<Expression>,
    rhs: &Arc<Expression>,
    f: &mut F,
) -> Result<Option<ChildPair>, E>
where
    F: FnMut(&Expression) -> Result<Option<Expression>, E>,
{
    let new_lhs = rewrite_child(lhs, f)?;
    let new_rhs = rewrite_child(rhs, f)?;
    if new_lhs.is_none() && new_rhs.is_none() {
        return Ok(None);
    }

    Ok(Some((
        new_lhs.unwrap_or_else(|| lhs.clone()),
        new_rhs.unwrap_or_else(|| rhs.clone()),
    )))
}

impl From<bool> for Expression {
    fn from(value: bool) -> Self {
        Expression::BoolLiteral(value)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::BoolLiteral(value) => write!(f, "{value}"),
            Expression::Constant { ty, value } => match ty {
                Type::Bits {
                    width,
                    signed: false,
                } => write!(f, "{width}w{value}"),
                Type::Bits {
                    width,
                    signed: true,
                } => write!(f, "{width}s{value}"),
                _ => write!(f, "{value}"),
            },
            Expression::Var(var) => write!(f, "{var}"),
            Expression::Symbolic(var) => write!(f, "|{var}|"),
            Expression::Concolic(var) => {
                write!(f, "*{method}(", method = var.method)?;
                write_arguments(f, &var.arguments)?;
                write!(f, ")")
            }
            Expression::Unary { op, expr, .. } => {
                let symbol = match op {
                    UnaryOp::LNot => "!",
                    UnaryOp::Cmpl => "~",
                    UnaryOp::Neg => "-",
                };
                write!(f, "{symbol}{expr}")
            }
            Expression::Binary { op, lhs, rhs, .. } => {
                write!(f, "({lhs} {op} {rhs})", op = op.symbol())
            }
            Expression::Concat { lhs, rhs, .. } => write!(f, "({lhs} ++ {rhs})"),
            Expression::Slice { expr, high, low } => write!(f, "{expr}[{high}:{low}]"),
            Expression::Cast { ty, expr } => write!(f, "(({ty}) {expr})"),
            Expression::Mux {
                cond,
                then,
                otherwise,
                ..
            } => write!(f, "({cond} ? {then} : {otherwise})"),
            Expression::MethodCall(call) => write!(f, "{call}"),
        }
    }
}

pub(crate) fn write_arguments(f: &mut fmt::Formatter<'_>, args: &[Argument]) -> fmt::Result {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{arg}")?;
    }

    Ok(())
}
