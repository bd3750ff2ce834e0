use std::collections::BTreeMap;
use std::sync::Arc;

use p4_ir::{Argument, Expression, MethodCallExpression};

use crate::error::{bug, Result};
use crate::execution_state::ExecutionState;

/// Registry of implementations keyed by qualified method name, then by arity. Each entry holds the
/// declared parameter names of one signature.
#[derive(Clone)]
pub struct MethodImpls<F> {
    impls: BTreeMap<String, BTreeMap<usize, Vec<Signature<F>>>>,
}

#[derive(Clone)]
struct Signature<F> {
    params: Vec<Arc<str>>,
    implementation: F,
}

impl<F> Default for MethodImpls<F> {
    fn default() -> Self {
        Self {
            impls: BTreeMap::new(),
        }
    }
}

impl<F> MethodImpls<F> {
    pub fn new() -> Self {
        Default::default()
    }

    /// Register `implementation` for `name` with the given parameter names.
    ///
    /// A BUG occurs if a signature with the same parameter names is already registered under
    /// `name`.
    pub fn add(&mut self, name: &str, params: &[&str], implementation: F) -> Result<()> {
        let signatures = self
            .impls
            .entry(name.to_string())
            .or_default()
            .entry(params.len())
            .or_default();

        if signatures
            .iter()
            .any(|signature| signature.params.iter().map(|param| &**param).eq(params.iter().copied()))
        {
            return Err(bug!(
                "multiple implementations of {name}({params})",
                params = params.join(", ")
            ));
        }

        signatures.push(Signature {
            params: params.iter().map(|&param| Arc::from(param)).collect(),
            implementation,
        });

        Ok(())
    }

    /// The implementation of `name` matching `args`, if any.
    ///
    /// A signature matches if it has as many parameters as there are arguments and every named
    /// argument carries the name of the parameter at its position. Unnamed arguments match any
    /// parameter. A BUG occurs if more than one signature matches.
    pub fn find(&self, name: &str, args: &[Argument]) -> Result<Option<&F>> {
        let Some(signatures) = self
            .impls
            .get(name)
            .and_then(|by_arity| by_arity.get(&args.len()))
        else {
            return Ok(None);
        };

        let mut matching = signatures
            .iter()
            .filter(|signature| matches(&signature.params, args));

        let found = matching.next();
        if found.is_some() && matching.next().is_some() {
            return Err(bug!("ambiguous call of {name} with {count} arguments", count = args.len()));
        }

        Ok(found.map(|signature| &signature.implementation))
    }

    pub fn len(&self) -> usize {
        self.impls
            .values()
            .flat_map(BTreeMap::values)
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn matches(params: &[Arc<str>], args: &[Argument]) -> bool {
    params.len() == args.len()
        && params.iter().zip(args).all(|(param, arg)| match &arg.name {
            Some(name) => name == param,
            None => true,
        })
}

/// What an extern implementation is told about the call it handles.
#[derive(Clone, Copy, Debug)]
pub struct ExternInfo<'a> {
    pub call: &'a MethodCallExpression,
    pub receiver: Option<&'a Expression>,

    /// The qualified method name used for dispatch.
    pub name: &'a str,

    /// Arguments of base type are already evaluated. Header and struct arguments are references
    /// to program storage.
    pub args: &'a [Argument],
}

/// Semantics of an extern method. Appends one successor per feasible continuation to the output.
/// The call is the head of the state's body: it is replaced by a [crate::Command::Return] to
/// produce a value, or popped when the call has no result.
pub type ExternMethodImpl = Arc<
    dyn Fn(&ExternInfo<'_>, &ExecutionState, &mut Vec<ExecutionState>) -> Result<()> + Send + Sync,
>;

/// Extern dispatch table of a target.
#[derive(Clone, Default)]
pub struct ExternMethodImpls {
    impls: MethodImpls<ExternMethodImpl>,
}

impl ExternMethodImpls {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn add<F>(&mut self, name: &str, params: &[&str], implementation: F) -> Result<()>
    where
        F: Fn(&ExternInfo<'_>, &ExecutionState, &mut Vec<ExecutionState>) -> Result<()>
            + Send
            + Sync
            + 'static,
    {
        self.impls.add(name, params, Arc::new(implementation))
    }

    /// Run the implementation matching `info`. Returns `false` if no implementation matches.
    pub fn exec(
        &self,
        info: &ExternInfo<'_>,
        state: &ExecutionState,
        result: &mut Vec<ExecutionState>,
    ) -> Result<bool> {
        match self.impls.find(info.name, info.args)? {
            Some(implementation) => {
                implementation(info, state, result)?;
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
