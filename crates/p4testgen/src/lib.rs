//! Symbolic execution core of a test generator for packet processing programs.
//!
//! ### Execution
//!
//! An [ExecutionState] holds the symbolic environment of one program path together with its
//! continuation and path condition. The [SmallStepEvaluator] advances a state by one step,
//! producing one successor per feasible continuation. Branches fork the state; forks share all
//! persistent structure with their parent.
//!
//! Operations that cannot be modeled generically are dispatched to the [ExternMethodImpls] of the
//! selected [targets::TestgenTarget].
//!
//! ### Solving
//!
//! Once a state is terminal its path condition is handed to an [p4tools_common::AbstractSolver]
//! by [final_state::solve]. Concolic variables are resolved against the resulting model by the
//! [ConcolicResolver] using the target's [ConcolicMethodImpls].

mod concolic;
mod config;
mod continuation;
mod dispatch;
mod error;
mod execution_state;
mod namespace_context;
mod small_step;
mod trace_events;

pub mod final_state;
pub mod targets;

pub use crate::concolic::*;
pub use crate::config::TestgenConfig;
pub use crate::continuation::{Command, Frame};
pub use crate::dispatch::{ExternInfo, ExternMethodImpl, ExternMethodImpls, MethodImpls};
pub use crate::error::{Error, Result};
pub use crate::execution_state::ExecutionState;
pub use crate::namespace_context::NamespaceContext;
pub use crate::small_step::{core_extern_method_impls, SmallStepEvaluator};
pub use crate::trace_events::TraceEvent;

#[cfg(test)]
mod tests;
