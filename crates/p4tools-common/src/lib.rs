//! Target independent building blocks of the symbolic execution core.
//!
//! ### Symbolic environment
//!
//! A [SymbolicEnv] maps program state variables to symbolic values. It is a persistent map so
//! that execution states forked at a branch share every binding that neither side modifies.
//!
//! ### Solver
//!
//! The [AbstractSolver] trait is the interface used to check path constraints and to obtain a
//! [Model] for a feasible path. A Z3 backed implementation is available with the `z3` feature.

mod error;
mod model;
mod solver;
mod symbolic_env;

#[cfg(feature = "z3")]
mod z3_solver;

pub use crate::error::{Error, Result};
pub use crate::model::Model;
pub use crate::solver::{AbstractSolver, Constraint, SatResult, SolverConfig};
pub use crate::symbolic_env::SymbolicEnv;

#[cfg(feature = "z3")]
pub use crate::z3_solver::Z3Solver;

#[cfg(test)]
mod tests;
