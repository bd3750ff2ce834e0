use p4tools_common::SolverConfig;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::targets::Arch;

/// Engine settings. Every field has a default so partial documents are accepted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestgenConfig {
    pub arch: Arch,
    pub solver: SolverConfig,

    /// Upper bound on the steps taken along a single path. Unbounded if absent.
    pub max_steps: Option<usize>,
}

impl TestgenConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json).map_err(p4tools_common::Error::from)?)
    }
}
