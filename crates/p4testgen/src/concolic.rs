use std::collections::BTreeMap;
use std::sync::Arc;

use p4_ir::{ConcolicVariable, Expression, StateVariable, Type};
use p4tools_common::Model;
use tracing::trace;

use crate::dispatch::MethodImpls;
use crate::error::{bug, Result};
use crate::execution_state::ExecutionState;

/// Values of the concolic variables resolved so far, keyed by member slot.
pub type ConcolicVariableMap = BTreeMap<StateVariable, Expression>;

/// Computes the value of a concolic variable under a completed model and inserts it into the map
/// under the variable's member slot.
pub type ConcolicMethodImpl = Arc<
    dyn Fn(&str, &ConcolicVariable, &ExecutionState, &Model, &mut ConcolicVariableMap) -> Result<()>
        + Send
        + Sync,
>;

/// Concolic dispatch table.
#[derive(Clone, Default)]
pub struct ConcolicMethodImpls {
    impls: MethodImpls<ConcolicMethodImpl>,
}

impl ConcolicMethodImpls {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn add<F>(&mut self, name: &str, params: &[&str], implementation: F) -> Result<()>
    where
        F: Fn(&str, &ConcolicVariable, &ExecutionState, &Model, &mut ConcolicVariableMap) -> Result<()>
            + Send
            + Sync
            + 'static,
    {
        self.impls.add(name, params, Arc::new(implementation))
    }

    /// Run the implementation of `name` matching the arguments of `var`. Returns `false` if no
    /// implementation matches.
    pub fn exec(
        &self,
        name: &str,
        var: &ConcolicVariable,
        state: &ExecutionState,
        completed_model: &Model,
        resolved: &mut ConcolicVariableMap,
    ) -> Result<bool> {
        match self.impls.find(name, &var.arguments)? {
            Some(implementation) => {
                implementation(name, var, state, completed_model, resolved)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn len(&self) -> usize {
        self.impls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.impls.is_empty()
    }
}

/// One resolution pass. Replaces concolic variables by the values their implementations compute
/// under a completed model. Each member slot is resolved at most once per pass.
pub struct ConcolicResolver<'a> {
    state: &'a ExecutionState,
    completed_model: &'a Model,
    impls: &'a ConcolicMethodImpls,
    resolved: ConcolicVariableMap,
}

impl<'a> ConcolicResolver<'a> {
    pub fn new(
        completed_model: &'a Model,
        state: &'a ExecutionState,
        impls: &'a ConcolicMethodImpls,
    ) -> Self {
        Self::with_resolved(completed_model, state, impls, ConcolicVariableMap::new())
    }

    /// Continue a pass with variables that are already resolved.
    pub fn with_resolved(
        completed_model: &'a Model,
        state: &'a ExecutionState,
        impls: &'a ConcolicMethodImpls,
        resolved: ConcolicVariableMap,
    ) -> Self {
        Self {
            state,
            completed_model,
            impls,
            resolved,
        }
    }

    /// Rewrite `expr`, replacing every concolic variable by its resolved value. The arguments of
    /// concolic variables are left to their implementations.
    ///
    /// A BUG occurs if no implementation matches a concolic variable or if the implementation does
    /// not resolve it.
    pub fn resolve(&mut self, expr: &Expression) -> Result<Expression> {
        let state = self.state;
        let completed_model = self.completed_model;
        let impls = self.impls;
        let resolved = &mut self.resolved;

        expr.try_transform(&mut |node| {
            let Expression::Concolic(var) = node else {
                return Ok(None);
            };

            if let Some(value) = resolved.get(&var.member) {
                return Ok(Some(value.clone()));
            }

            if !impls.exec(&var.method, var, state, completed_model, resolved)? {
                return Err(bug!(
                    "unknown or unimplemented concolic method: {method}",
                    method = var.method
                ));
            }

            let value = resolved.get(&var.member).cloned().ok_or_else(|| {
                bug!(
                    "concolic method {method} did not resolve {member}",
                    method = var.method,
                    member = var.member
                )
            })?;

            trace!(member = %var.member, %value, "resolved concolic variable");
            Ok(Some(value))
        })
    }

    pub fn resolved(&self) -> &ConcolicVariableMap {
        &self.resolved
    }

    pub fn into_resolved(self) -> ConcolicVariableMap {
        self.resolved
    }
}

/// Concolic methods available on every target.
pub fn core_concolic_method_impls() -> Result<ConcolicMethodImpls> {
    let mut impls = ConcolicMethodImpls::new();

    // Internet checksum of the bytes of `data`
    impls.add(
        "*method.checksum16",
        &["data"],
        |_name, var, _state, completed_model, resolved| {
            let data = var
                .arguments
                .first()
                .ok_or_else(|| bug!("checksum16 requires a data argument"))?;
            let value = completed_model.evaluate(&data.expr)?;
            let width = value
                .ty()
                .width()
                .ok_or_else(|| bug!("checksum16 data {value} has no width"))?;
            let bits = value
                .concretize()
                .map_err(|err| bug!("checksum16 data is not concrete: {err}"))?;

            resolved.insert(
                var.member.clone(),
                Expression::constant(Type::bits(16), u128::from(checksum16(bits, width))),
            );
            Ok(())
        },
    )?;

    Ok(impls)
}

/// Ones' complement of the ones' complement sum of the 16-bit words of a `width` bit value. A
/// trailing partial word is padded with zeros.
pub fn checksum16(value: u128, width: u32) -> u16 {
    let padded = width.div_ceil(16) * 16;
    let value = value << (padded - width);

    let mut sum = 0u32;
    for word in (0..padded / 16).rev() {
        sum += ((value >> (word * 16)) & 0xffff) as u32;
        sum = (sum & 0xffff) + (sum >> 16);
    }

    !(sum as u16)
}
