use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, OnceLock};

use p4_ir::{Declaration, Namespace, NamespaceKind, Path};

use crate::error::{bug, Result};

static NO_NAMES: BTreeSet<Arc<str>> = BTreeSet::new();

/// Immutable stack of lexical scopes. Pushing allocates a new node that links to the current one,
/// so contexts held by forked execution states share every enclosing scope.
#[derive(Clone, Default)]
pub struct NamespaceContext(Option<Arc<Node>>);

struct Node {
    namespace: Arc<Namespace>,
    outer: NamespaceContext,

    /// Every name declared in this scope and all enclosing scopes. Computed on first use.
    used_names: OnceLock<BTreeSet<Arc<str>>>,
}

impl NamespaceContext {
    /// The context with no scopes.
    pub fn empty() -> Self {
        Self(None)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    /// A new context with `namespace` as its innermost scope.
    pub fn push(&self, namespace: Arc<Namespace>) -> Self {
        Self(Some(Arc::new(Node {
            namespace,
            outer: self.clone(),
            used_names: OnceLock::new(),
        })))
    }

    /// The context enclosing the innermost scope.
    pub fn pop(&self) -> Result<Self> {
        match &self.0 {
            Some(node) => Ok(node.outer.clone()),
            None => Err(bug!("cannot pop the empty namespace context")),
        }
    }

    /// The innermost scope, if any.
    pub fn current(&self) -> Option<&Arc<Namespace>> {
        self.0.as_ref().map(|node| &node.namespace)
    }

    fn levels(&self) -> impl Iterator<Item = &Node> {
        let mut context = self;
        std::iter::from_fn(move || {
            let node = context.0.as_deref()?;
            context = &node.outer;
            Some(node)
        })
    }

    /// Resolve `path` to its declaration. Scopes are searched from the innermost outward, an
    /// absolute path is resolved in the outermost scope only.
    ///
    /// A BUG occurs if the declaration cannot be found or if the reference is ambiguous, since the
    /// front end has already resolved every reference.
    pub fn find_decl(&self, path: &Path) -> Result<&Declaration> {
        self.try_find_decl(path)?
            .ok_or_else(|| bug!("variable {path} not found in the available namespaces"))
    }

    /// Like [Self::find_decl] but a missing declaration is not an error. Ambiguity still is.
    pub fn try_find_decl(&self, path: &Path) -> Result<Option<&Declaration>> {
        if path.absolute {
            return match self.levels().last() {
                Some(node) => find_in_namespace(&node.namespace, &path.name),
                None => Ok(None),
            };
        }

        for node in self.levels() {
            if let Some(decl) = find_in_namespace(&node.namespace, &path.name)? {
                return Ok(Some(decl));
            }
        }

        Ok(None)
    }

    /// Every name declared in this context, including nested namespaces.
    pub fn used_names(&self) -> &BTreeSet<Arc<str>> {
        let Some(node) = &self.0 else {
            return &NO_NAMES;
        };

        node.used_names.get_or_init(|| {
            let mut names = node.outer.used_names().clone();
            collect_names(&node.namespace, &mut names);
            names
        })
    }

    /// A name that is not declared anywhere in this context. `base` itself is returned if it is
    /// unused, otherwise `base` followed by `sep` and the smallest free counter value.
    pub fn gen_name(&self, base: &str, sep: char) -> String {
        let used = self.used_names();
        if !used.contains(base) {
            return base.to_string();
        }

        let mut counter = 0u64;
        loop {
            let candidate = format!("{base}{sep}{counter}");
            if !used.contains(candidate.as_str()) {
                return candidate;
            }
            counter += 1;
        }
    }
}

/// Search `namespace` for `name`. Nested namespaces are searched first and the search never leaves
/// `namespace`.
fn find_in_namespace<'a>(namespace: &'a Namespace, name: &str) -> Result<Option<&'a Declaration>> {
    for nested in &namespace.nested {
        if let Some(decl) = find_in_namespace(nested, name)? {
            return Ok(Some(decl));
        }
    }

    let mut candidates = namespace
        .declarations
        .iter()
        .filter(|decl| decl.name.as_ref() == name);
    let first = candidates.next();
    if namespace.kind == NamespaceKind::General && first.is_some() && candidates.next().is_some() {
        return Err(bug!(
            "ambiguous reference to {name} in namespace {namespace}",
            namespace = namespace.name
        ));
    }

    Ok(first)
}

fn collect_names(namespace: &Namespace, names: &mut BTreeSet<Arc<str>>) {
    names.extend(namespace.declarations.iter().map(|decl| decl.name.clone()));
    for nested in &namespace.nested {
        collect_names(nested, names);
    }
}

/// Contexts are equal if they are the same node.
impl PartialEq for NamespaceContext {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (None, None) => true,
            (Some(lhs), Some(rhs)) => Arc::ptr_eq(lhs, rhs),
            _ => false,
        }
    }
}

impl Eq for NamespaceContext {}

impl fmt::Debug for NamespaceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.levels().map(|node| &node.namespace.name))
            .finish()
    }
}
