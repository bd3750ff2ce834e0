use std::fmt;
use std::io::Write;

use p4_ir::Expression;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::Model;

/// A boolean expression asserted to the solver.
pub type Constraint = Expression;

/// Outcome of a satisfiability check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SatResult {
    Sat,
    Unsat,

    /// The solver timed out or was otherwise unable to provide an answer. This is not a proof of
    /// infeasibility.
    Unknown,
}

impl SatResult {
    pub fn is_sat(self) -> bool {
        self == SatResult::Sat
    }
}

impl From<Option<bool>> for SatResult {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => SatResult::Sat,
            Some(false) => SatResult::Unsat,
            None => SatResult::Unknown,
        }
    }
}

impl fmt::Display for SatResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SatResult::Sat => write!(f, "sat"),
            SatResult::Unsat => write!(f, "unsat"),
            SatResult::Unknown => write!(f, "unknown"),
        }
    }
}

/// Higher-level interface of a stateful SMT solver session. A session is sequential: concurrent
/// exploration lanes each require their own instance.
pub trait AbstractSolver {
    /// Add a comment to any log produced by this session. Useful for understanding the sequence
    /// of calls made to the solver when debugging.
    fn comment(&mut self, comment: &str);

    /// Seed the pseudo-random number generator of the solver. The seed only affects which of
    /// several satisfying models is produced by [Self::get_model].
    fn seed(&mut self, seed: u32);

    /// Set the timeout of subsequent checks in milliseconds.
    fn timeout(&mut self, timeout_ms: u32);

    /// Determine whether the given assertions are consistent.
    fn check_sat(&mut self, asserts: &[Constraint]) -> Result<SatResult>;

    /// The model found by the last call to [Self::check_sat].
    ///
    /// A BUG occurs if the last call to [Self::check_sat] did not return [SatResult::Sat] or if
    /// there was no such call.
    fn get_model(&self) -> Result<Model>;

    /// Save the session state to `writer` as JSON. The session state is not altered.
    fn to_json(&self, writer: &mut dyn Write) -> Result<()>;

    /// Whether assertions persist across calls to [Self::check_sat].
    fn is_in_incremental_mode(&self) -> bool;
}

/// Session settings applied to a solver before exploration starts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub seed: Option<u32>,
    pub timeout_ms: Option<u32>,
    pub incremental: bool,
}

impl SolverConfig {
    pub fn apply<S: AbstractSolver + ?Sized>(&self, solver: &mut S) {
        if let Some(seed) = self.seed {
            solver.seed(seed);
        }

        if let Some(timeout_ms) = self.timeout_ms {
            solver.timeout(timeout_ms);
        }
    }
}
