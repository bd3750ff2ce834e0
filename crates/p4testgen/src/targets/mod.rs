use std::fmt;

use serde::{Deserialize, Serialize};

use crate::concolic::ConcolicMethodImpls;
use crate::dispatch::ExternMethodImpls;
use crate::error::Result;

pub mod ebpf;

/// Supported target architectures.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    #[default]
    Ebpf,
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arch::Ebpf => write!(f, "ebpf"),
        }
    }
}

/// Architecture specific semantics consulted by the small-step evaluator and the concolic
/// resolver.
pub trait TestgenTarget: Send + Sync {
    fn arch(&self) -> Arch;

    /// Externs of this architecture. Consulted before the core externs.
    fn extern_method_impls(&self) -> &ExternMethodImpls;

    fn concolic_method_impls(&self) -> &ConcolicMethodImpls;
}

/// Construct the target for `arch` with its dispatch tables.
pub fn create(arch: Arch) -> Result<Box<dyn TestgenTarget>> {
    match arch {
        Arch::Ebpf => Ok(Box::new(ebpf::EbpfTarget::new()?)),
    }
}
