//! Elaborated program representation consumed by the symbolic execution core. Programs arrive
//! here already parsed, type checked and normalized by the compiler front and mid end; this crate
//! only describes the resulting tree.
//!
//! ### Expressions
//!
//! An [Expression] is an immutable tree whose children are shared through [std::sync::Arc].
//! Rewriting a tree with [Expression::transform] allocates only the nodes on the path to a
//! replacement, every other subtree is shared with the original.
//!
//! Reads of program storage are [Expression::Var] nodes while unknowns of the initial program
//! state are [Expression::Symbolic] nodes. Both are identified by a [StateVariable].

mod call;
mod decl;
mod expr;
mod fold;
mod stmt;
mod types;

pub use crate::call::*;
pub use crate::decl::*;
pub use crate::expr::*;
pub use crate::stmt::*;
pub use crate::types::*;
