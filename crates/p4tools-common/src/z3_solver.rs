use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

use p4_ir::{BinaryOp, Expression, StateVariable, Type, UnaryOp};
use serde_json::json;
use tracing::debug;
use z3::ast::{Ast, Bool, BV};
use z3::{Context, Params, Solver};

use crate::bug;
use crate::error::{Error, Result};
use crate::model::Model;
use crate::solver::{AbstractSolver, Constraint, SatResult};

#[derive(Clone, Debug)]
enum Term<'ctx> {
    Bool(Bool<'ctx>),
    BitVec(BV<'ctx>),
}

impl<'ctx> Term<'ctx> {
    fn into_bool(self) -> Result<Bool<'ctx>> {
        match self {
            Term::Bool(term) => Ok(term),
            Term::BitVec(term) => Err(Error::Solver(format!(
                "expected a boolean term, found bit-vector {term}"
            ))),
        }
    }

    /// Booleans are converted to single bit vectors.
    fn into_bv(self, ctx: &'ctx Context) -> BV<'ctx> {
        match self {
            Term::BitVec(term) => term,
            Term::Bool(term) => term.ite(&BV::from_u64(ctx, 1, 1), &BV::from_u64(ctx, 0, 1)),
        }
    }
}

/// [AbstractSolver] backed by Z3.
///
/// In incremental mode assertions persist across checks: when the new constraint set extends the
/// previously checked one only the new constraints are asserted. Otherwise the session is reset
/// and every constraint is asserted again.
pub struct Z3Solver<'ctx> {
    ctx: &'ctx Context,
    solver: Solver<'ctx>,
    incremental: bool,
    seed: Option<u32>,
    timeout_ms: Option<u32>,
    comments: Vec<String>,
    variables: BTreeMap<StateVariable, Term<'ctx>>,
    asserted: Vec<Constraint>,
    last_result: Option<SatResult>,
}

impl<'ctx> Z3Solver<'ctx> {
    pub fn new(ctx: &'ctx Context, incremental: bool) -> Self {
        Self {
            ctx,
            solver: Solver::new(ctx),
            incremental,
            seed: None,
            timeout_ms: None,
            comments: Vec::new(),
            variables: BTreeMap::new(),
            asserted: Vec::new(),
            last_result: None,
        }
    }

    fn apply_params(&self) {
        let mut params = Params::new(self.ctx);
        if let Some(seed) = self.seed {
            params.set_u32("random_seed", seed);
        }

        if let Some(timeout_ms) = self.timeout_ms {
            params.set_u32("timeout", timeout_ms);
        }

        self.solver.set_params(&params);
    }

    fn bv_constant(&self, width: u32, value: u128) -> BV<'ctx> {
        if width <= u64::BITS {
            // Value is masked to width
            BV::from_u64(self.ctx, value as u64, width)
        } else {
            let high = BV::from_u64(self.ctx, (value >> u64::BITS) as u64, width - u64::BITS);
            let low = BV::from_u64(self.ctx, value as u64, u64::BITS);
            high.concat(&low)
        }
    }

    fn declare(&mut self, var: &StateVariable) -> Result<Term<'ctx>> {
        if let Some(term) = self.variables.get(var) {
            return Ok(term.clone());
        }

        let term = match var.ty() {
            Type::Bool => Term::Bool(Bool::new_const(self.ctx, var.name())),
            Type::Bits { width, .. } => Term::BitVec(BV::new_const(self.ctx, var.name(), *width)),
            ty => {
                return Err(bug!(
                    "cannot declare solver variable {var} of non-base type {ty}"
                ))
            }
        };

        self.variables.insert(var.clone(), term.clone());
        Ok(term)
    }

    fn translate(&mut self, expr: &Expression) -> Result<Term<'ctx>> {
        let term = match expr {
            Expression::BoolLiteral(value) => Term::Bool(Bool::from_bool(self.ctx, *value)),
            Expression::Constant { ty, value } => {
                let width = ty
                    .width()
                    .ok_or_else(|| bug!("constant {expr} has non-base type {ty}"))?;
                Term::BitVec(self.bv_constant(width, *value))
            }
            Expression::Symbolic(var) => self.declare(var)?,
            Expression::Concolic(concolic) => self.declare(&concolic.member)?,
            Expression::Var(var) => {
                return Err(bug!("constraint reads state variable {var} directly"))
            }
            Expression::MethodCall(call) => {
                return Err(bug!("constraint contains unresolved method call {call}"))
            }
            Expression::Unary { op, expr, .. } => {
                let operand = self.translate(expr)?;
                match op {
                    UnaryOp::LNot => Term::Bool(operand.into_bool()?.not()),
                    UnaryOp::Cmpl => Term::BitVec(operand.into_bv(self.ctx).bvnot()),
                    UnaryOp::Neg => Term::BitVec(operand.into_bv(self.ctx).bvneg()),
                }
            }
            Expression::Binary { op, lhs, rhs, .. } => {
                let signed = lhs.ty().is_signed();
                let lhs = self.translate(lhs)?;
                let rhs = self.translate(rhs)?;
                self.translate_binary(*op, signed, lhs, rhs)?
            }
            Expression::Concat { lhs, rhs, .. } => {
                let lhs = self.translate(lhs)?.into_bv(self.ctx);
                let rhs = self.translate(rhs)?.into_bv(self.ctx);
                Term::BitVec(lhs.concat(&rhs))
            }
            Expression::Slice { expr, high, low } => {
                Term::BitVec(self.translate(expr)?.into_bv(self.ctx).extract(*high, *low))
            }
            Expression::Cast { ty, expr } => {
                let source_signed = expr.ty().is_signed();
                let operand = self.translate(expr)?;
                self.translate_cast(ty, source_signed, operand)?
            }
            Expression::Mux {
                cond,
                then,
                otherwise,
                ..
            } => {
                let cond = self.translate(cond)?.into_bool()?;
                match (self.translate(then)?, self.translate(otherwise)?) {
                    (Term::Bool(then), Term::Bool(otherwise)) => {
                        Term::Bool(cond.ite(&then, &otherwise))
                    }
                    (then, otherwise) => Term::BitVec(
                        cond.ite(&then.into_bv(self.ctx), &otherwise.into_bv(self.ctx)),
                    ),
                }
            }
        };

        Ok(term)
    }

    fn translate_binary(
        &self,
        op: BinaryOp,
        signed: bool,
        lhs: Term<'ctx>,
        rhs: Term<'ctx>,
    ) -> Result<Term<'ctx>> {
        let term = match op {
            BinaryOp::LAnd => Term::Bool(Bool::and(
                self.ctx,
                &[&lhs.into_bool()?, &rhs.into_bool()?],
            )),
            BinaryOp::LOr => Term::Bool(Bool::or(
                self.ctx,
                &[&lhs.into_bool()?, &rhs.into_bool()?],
            )),
            BinaryOp::Equ | BinaryOp::Neq => {
                let equal = match (lhs, rhs) {
                    (Term::Bool(lhs), Term::Bool(rhs)) => lhs._eq(&rhs),
                    (lhs, rhs) => lhs.into_bv(self.ctx)._eq(&rhs.into_bv(self.ctx)),
                };

                if op == BinaryOp::Equ {
                    Term::Bool(equal)
                } else {
                    Term::Bool(equal.not())
                }
            }
            _ => {
                let lhs = lhs.into_bv(self.ctx);
                let rhs = rhs.into_bv(self.ctx);
                match op {
                    BinaryOp::Add => Term::BitVec(lhs.bvadd(&rhs)),
                    BinaryOp::Sub => Term::BitVec(lhs.bvsub(&rhs)),
                    BinaryOp::Mul => Term::BitVec(lhs.bvmul(&rhs)),
                    BinaryOp::BAnd => Term::BitVec(lhs.bvand(&rhs)),
                    BinaryOp::BOr => Term::BitVec(lhs.bvor(&rhs)),
                    BinaryOp::BXor => Term::BitVec(lhs.bvxor(&rhs)),
                    BinaryOp::Shl => {
                        let rhs = resize(&rhs, lhs.get_size());
                        Term::BitVec(lhs.bvshl(&rhs))
                    }
                    BinaryOp::Shr if signed => {
                        let rhs = resize(&rhs, lhs.get_size());
                        Term::BitVec(lhs.bvashr(&rhs))
                    }
                    BinaryOp::Shr => {
                        let rhs = resize(&rhs, lhs.get_size());
                        Term::BitVec(lhs.bvlshr(&rhs))
                    }
                    BinaryOp::Lss if signed => Term::Bool(lhs.bvslt(&rhs)),
                    BinaryOp::Lss => Term::Bool(lhs.bvult(&rhs)),
                    BinaryOp::Leq if signed => Term::Bool(lhs.bvsle(&rhs)),
                    BinaryOp::Leq => Term::Bool(lhs.bvule(&rhs)),
                    BinaryOp::Grt if signed => Term::Bool(lhs.bvsgt(&rhs)),
                    BinaryOp::Grt => Term::Bool(lhs.bvugt(&rhs)),
                    BinaryOp::Geq if signed => Term::Bool(lhs.bvsge(&rhs)),
                    BinaryOp::Geq => Term::Bool(lhs.bvuge(&rhs)),
                    BinaryOp::LAnd | BinaryOp::LOr | BinaryOp::Equ | BinaryOp::Neq => {
                        return Err(bug!("operator {op:?} handled above"))
                    }
                }
            }
        };

        Ok(term)
    }

    fn translate_cast(&self, ty: &Type, source_signed: bool, operand: Term<'ctx>) -> Result<Term<'ctx>> {
        let term = match (ty, operand) {
            (Type::Bool, Term::Bool(operand)) => Term::Bool(operand),
            (Type::Bool, Term::BitVec(operand)) => {
                let zero = BV::from_u64(self.ctx, 0, operand.get_size());
                Term::Bool(operand._eq(&zero).not())
            }
            (Type::Bits { width, .. }, operand) => {
                let operand = operand.into_bv(self.ctx);
                let size = operand.get_size();
                let resized = if *width > size && source_signed {
                    operand.sign_ext(width - size)
                } else {
                    resize(&operand, *width)
                };
                Term::BitVec(resized)
            }
            (ty, _) => return Err(Error::Solver(format!("unsupported cast to {ty}"))),
        };

        Ok(term)
    }

    fn evaluate_variable(&self, model: &z3::Model<'ctx>, var: &StateVariable, term: &Term<'ctx>) -> Result<Expression> {
        let value = match term {
            Term::Bool(term) => model
                .eval(term, true)
                .and_then(|value| value.as_bool())
                .map(Expression::bool),
            Term::BitVec(term) => {
                let width = term.get_size();
                model.eval(term, true).and_then(|value| {
                    let value = if width <= u64::BITS {
                        u128::from(value.as_u64()?)
                    } else {
                        let high = value.extract(width - 1, u64::BITS).simplify().as_u64()?;
                        let low = value.extract(u64::BITS - 1, 0).simplify().as_u64()?;
                        (u128::from(high) << u64::BITS) | u128::from(low)
                    };
                    Some(Expression::constant(var.ty().clone(), value))
                })
            }
        };

        value.ok_or_else(|| Error::Solver(format!("model has no concrete value for {var}")))
    }
}

/// Zero extend or truncate `term` to `width` bits.
fn resize<'ctx>(term: &BV<'ctx>, width: u32) -> BV<'ctx> {
    let size = term.get_size();
    if width > size {
        term.zero_ext(width - size)
    } else if width < size {
        term.extract(width - 1, 0)
    } else {
        term.clone()
    }
}

impl<'ctx> AbstractSolver for Z3Solver<'ctx> {
    fn comment(&mut self, comment: &str) {
        debug!(comment, "solver comment");
        self.comments.push(comment.to_string());
    }

    fn seed(&mut self, seed: u32) {
        self.seed = Some(seed);
        self.apply_params();
    }

    fn timeout(&mut self, timeout_ms: u32) {
        self.timeout_ms = Some(timeout_ms);
        self.apply_params();
    }

    fn check_sat(&mut self, asserts: &[Constraint]) -> Result<SatResult> {
        self.last_result = None;

        if !(self.incremental && asserts.starts_with(&self.asserted)) {
            self.solver.reset();
            self.apply_params();
            self.asserted.clear();
        }

        for constraint in &asserts[self.asserted.len()..] {
            let term = self.translate(constraint)?.into_bool()?;
            self.solver.assert(&term);
            self.asserted.push(constraint.clone());
        }

        let result = match self.solver.check() {
            z3::SatResult::Sat => SatResult::Sat,
            z3::SatResult::Unsat => SatResult::Unsat,
            z3::SatResult::Unknown => SatResult::Unknown,
        };

        debug!(
            constraints = asserts.len(),
            %result,
            "checked satisfiability"
        );
        self.last_result = Some(result);
        Ok(result)
    }

    fn get_model(&self) -> Result<Model> {
        if self.last_result != Some(SatResult::Sat) {
            return Err(bug!(
                "no model available, last satisfiability check returned {result:?}",
                result = self.last_result
            ));
        }

        let model = self
            .solver
            .get_model()
            .ok_or_else(|| bug!("solver reported sat without producing a model"))?;

        let referenced = self
            .asserted
            .iter()
            .flat_map(Expression::symbolic_variables)
            .collect::<BTreeSet<_>>();

        let mut result = Model::new();
        for var in referenced {
            let term = self
                .variables
                .get(&var)
                .ok_or_else(|| bug!("variable {var} was never declared"))?;
            let value = self.evaluate_variable(&model, &var, term)?;
            result.insert(var, value);
        }

        Ok(result)
    }

    fn to_json(&self, writer: &mut dyn Write) -> Result<()> {
        let assertions = self
            .asserted
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();

        let state = json!({
            "incremental": self.incremental,
            "seed": self.seed,
            "timeout": self.timeout_ms,
            "comments": self.comments,
            "assertions": assertions,
            "lastResult": self.last_result,
            "smtlib": self.solver.to_string(),
        });

        serde_json::to_writer_pretty(writer, &state)?;
        Ok(())
    }

    fn is_in_incremental_mode(&self) -> bool {
        self.incremental
    }
}
