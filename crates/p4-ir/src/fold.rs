use std::sync::Arc;

use crate::expr::{mask, BinaryOp, Expression, UnaryOp};
use crate::types::Type;

impl Expression {
    /// Constant-fold this expression bottom-up. Operations over literals are evaluated using the
    /// width and signedness of their operand types. Expressions that cannot be folded are rebuilt
    /// with folded operands.
    pub fn fold(&self) -> Expression {
        match self {
            Expression::Unary { op, ty, expr } => fold_unary(*op, ty, expr.fold()),
            Expression::Binary { op, ty, lhs, rhs } => {
                fold_binary(*op, ty, lhs.fold(), rhs.fold())
            }
            Expression::Concat { ty, lhs, rhs } => fold_concat(ty, lhs.fold(), rhs.fold()),
            Expression::Slice { expr, high, low } => fold_slice(expr.fold(), *high, *low),
            Expression::Cast { ty, expr } => fold_cast(ty, expr.fold()),
            Expression::Mux {
                ty,
                cond,
                then,
                otherwise,
            } => fold_mux(ty, cond.fold(), then.fold(), otherwise.fold()),
            Expression::BoolLiteral(_)
            | Expression::Constant { .. }
            | Expression::Var(_)
            | Expression::Symbolic(_)
            | Expression::Concolic(_)
            | Expression::MethodCall(_) => self.clone(),
        }
    }
}

/// Interpret the low `width` bits of `value` as a two's complement integer.
fn sign_extend(value: u128, width: u32) -> i128 {
    if width >= u128::BITS {
        return value as i128;
    }

    let sign_bit = 1u128 << (width - 1);
    if value & sign_bit != 0 {
        (value | !mask(width)) as i128
    } else {
        value as i128
    }
}

fn fold_unary(op: UnaryOp, ty: &Type, expr: Expression) -> Expression {
    match (op, &expr) {
        (UnaryOp::LNot, Expression::BoolLiteral(value)) => Expression::BoolLiteral(!value),
        (UnaryOp::Cmpl, Expression::Constant { value, .. }) => Expression::constant(ty.clone(), !value),
        (UnaryOp::Neg, Expression::Constant { value, .. }) => {
            Expression::constant(ty.clone(), value.wrapping_neg())
        }

        // Double negation and double complement cancel out
        (
            UnaryOp::LNot,
            Expression::Unary {
                op: UnaryOp::LNot,
                expr: inner,
                ..
            },
        )
        | (
            UnaryOp::Cmpl,
            Expression::Unary {
                op: UnaryOp::Cmpl,
                expr: inner,
                ..
            },
        ) => inner.as_ref().clone(),
        _ => Expression::Unary {
            op,
            ty: ty.clone(),
            expr: Arc::new(expr),
        },
    }
}

fn fold_binary(op: BinaryOp, ty: &Type, lhs: Expression, rhs: Expression) -> Expression {
    match op {
        BinaryOp::LAnd => match (lhs.as_bool(), rhs.as_bool()) {
            (Some(false), _) | (_, Some(false)) => return Expression::BoolLiteral(false),
            (Some(true), _) => return rhs,
            (_, Some(true)) => return lhs,
            _ => (),
        },
        BinaryOp::LOr => match (lhs.as_bool(), rhs.as_bool()) {
            (Some(true), _) | (_, Some(true)) => return Expression::BoolLiteral(true),
            (Some(false), _) => return rhs,
            (_, Some(false)) => return lhs,
            _ => (),
        },
        _ => (),
    }

    match (&lhs, &rhs) {
        (Expression::Constant { ty: lhs_ty, value: x }, Expression::Constant { value: y, .. }) => {
            if let Some(folded) = fold_constants(op, ty, lhs_ty, *x, *y) {
                return folded;
            }
        }
        (Expression::BoolLiteral(x), Expression::BoolLiteral(y)) => match op {
            BinaryOp::Equ => return Expression::BoolLiteral(x == y),
            BinaryOp::Neq => return Expression::BoolLiteral(x != y),
            _ => (),
        },

        // Identities with zero
        (_, Expression::Constant { value: 0, .. })
            if matches!(
                op,
                BinaryOp::Add
                    | BinaryOp::Sub
                    | BinaryOp::BOr
                    | BinaryOp::BXor
                    | BinaryOp::Shl
                    | BinaryOp::Shr
            ) =>
        {
            return lhs;
        }
        (Expression::Constant { value: 0, .. }, _)
            if matches!(op, BinaryOp::Add | BinaryOp::BOr | BinaryOp::BXor) =>
        {
            return rhs;
        }
        _ => (),
    }

    Expression::Binary {
        op,
        ty: ty.clone(),
        lhs: Arc::new(lhs),
        rhs: Arc::new(rhs),
    }
}

fn fold_constants(op: BinaryOp, ty: &Type, operand_ty: &Type, x: u128, y: u128) -> Option<Expression> {
    let width = operand_ty.width()?;
    let signed = operand_ty.is_signed();
    let compare = |predicate: fn(i128, i128) -> bool, unsigned: fn(u128, u128) -> bool| {
        if signed {
            predicate(sign_extend(x, width), sign_extend(y, width))
        } else {
            unsigned(x, y)
        }
    };

    let result = match op {
        BinaryOp::Add => Expression::constant(ty.clone(), x.wrapping_add(y)),
        BinaryOp::Sub => Expression::constant(ty.clone(), x.wrapping_sub(y)),
        BinaryOp::Mul => Expression::constant(ty.clone(), x.wrapping_mul(y)),
        BinaryOp::BAnd => Expression::constant(ty.clone(), x & y),
        BinaryOp::BOr => Expression::constant(ty.clone(), x | y),
        BinaryOp::BXor => Expression::constant(ty.clone(), x ^ y),
        BinaryOp::Shl => {
            let value = if y >= u128::from(width) { 0 } else { x << y };
            Expression::constant(ty.clone(), value)
        }
        BinaryOp::Shr => {
            let shift = u32::try_from(y).unwrap_or(u32::MAX).min(u128::BITS - 1);
            let value = if signed {
                (sign_extend(x, width) >> shift) as u128
            } else if y >= u128::from(width) {
                0
            } else {
                x >> shift
            };
            Expression::constant(ty.clone(), value)
        }
        BinaryOp::Equ => Expression::BoolLiteral(x == y),
        BinaryOp::Neq => Expression::BoolLiteral(x != y),
        BinaryOp::Lss => Expression::BoolLiteral(compare(|a, b| a < b, |a, b| a < b)),
        BinaryOp::Leq => Expression::BoolLiteral(compare(|a, b| a <= b, |a, b| a <= b)),
        BinaryOp::Grt => Expression::BoolLiteral(compare(|a, b| a > b, |a, b| a > b)),
        BinaryOp::Geq => Expression::BoolLiteral(compare(|a, b| a >= b, |a, b| a >= b)),
        BinaryOp::LAnd | BinaryOp::LOr => return None,
    };

    Some(result)
}

fn fold_concat(ty: &Type, lhs: Expression, rhs: Expression) -> Expression {
    if let (Expression::Constant { value: x, .. }, Expression::Constant { ty: rhs_ty, value: y }) =
        (&lhs, &rhs)
    {
        if let Some(rhs_width) = rhs_ty.width() {
            let shifted = if rhs_width >= u128::BITS {
                0
            } else {
                x << rhs_width
            };
            return Expression::constant(ty.clone(), shifted | y);
        }
    }

    Expression::Concat {
        ty: ty.clone(),
        lhs: Arc::new(lhs),
        rhs: Arc::new(rhs),
    }
}

fn fold_slice(expr: Expression, high: u32, low: u32) -> Expression {
    let width = high - low + 1;
    if let Expression::Constant { value, .. } = &expr {
        let shifted = if low >= u128::BITS { 0 } else { value >> low };
        return Expression::constant(Type::bits(width), shifted & mask(width));
    }

    Expression::Slice {
        expr: Arc::new(expr),
        high,
        low,
    }
}

fn fold_cast(ty: &Type, expr: Expression) -> Expression {
    if &expr.ty() == ty {
        return expr;
    }

    match (ty, &expr) {
        (Type::Bool, Expression::Constant { value, .. }) => Expression::BoolLiteral(*value != 0),
        (Type::Bits { .. }, Expression::BoolLiteral(value)) => {
            Expression::constant(ty.clone(), u128::from(*value))
        }
        (Type::Bits { .. }, Expression::Constant { ty: source, value }) => {
            let value = match source.width() {
                Some(width) if source.is_signed() => sign_extend(*value, width) as u128,
                _ => *value,
            };
            Expression::constant(ty.clone(), value)
        }
        _ => Expression::Cast {
            ty: ty.clone(),
            expr: Arc::new(expr),
        },
    }
}

fn fold_mux(ty: &Type, cond: Expression, then: Expression, otherwise: Expression) -> Expression {
    match cond.as_bool() {
        Some(true) => then,
        Some(false) => otherwise,
        None if then == otherwise => then,
        None => Expression::Mux {
            ty: ty.clone(),
            cond: Arc::new(cond),
            then: Arc::new(then),
            otherwise: Arc::new(otherwise),
        },
    }
}
