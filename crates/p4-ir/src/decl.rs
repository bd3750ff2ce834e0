use std::fmt;
use std::sync::Arc;

use crate::expr::{Expression, StateVariable};
use crate::stmt::Statement;
use crate::types::Type;

/// Reference to a declaration by name. Absolute paths (`.name`) are resolved in the outermost
/// namespace only.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Path {
    pub name: Arc<str>,
    pub absolute: bool,
}

impl Path {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            absolute: false,
        }
    }

    pub fn absolute(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            absolute: true,
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.absolute {
            write!(f, ".")?;
        }
        write!(f, "{}", self.name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Parameter {
    pub name: Arc<str>,
    pub ty: Type,
}

impl Parameter {
    pub fn new(name: impl Into<Arc<str>>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }

    /// Storage location holding the parameter inside the callee.
    pub fn state_variable(&self) -> StateVariable {
        StateVariable::new(self.name.clone(), self.ty.clone())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Action {
    pub params: Vec<Parameter>,
    pub body: Statement,
}

impl Action {
    /// The namespace introduced by invoking this action. It declares the action parameters.
    pub fn namespace(&self, name: &str) -> Arc<Namespace> {
        let declarations = self
            .params
            .iter()
            .map(|param| {
                Declaration::new(
                    param.name.clone(),
                    DeclarationKind::Variable(param.state_variable()),
                )
            })
            .collect();

        Arc::new(Namespace {
            name: name.into(),
            kind: NamespaceKind::Simple,
            declarations,
            nested: Vec::new(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeclarationKind {
    Variable(StateVariable),
    Constant(Expression),

    /// An instance of an extern object type.
    Instance(Type),
    ExternFunction {
        params: Vec<Parameter>,
        ret: Type,
    },
    Action(Arc<Action>),
    Namespace(Arc<Namespace>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Declaration {
    pub name: Arc<str>,
    pub kind: DeclarationKind,
}

impl Declaration {
    pub fn new(name: impl Into<Arc<str>>, kind: DeclarationKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn variable(var: StateVariable) -> Self {
        let name: Arc<str> = var.name().into();
        Self::new(name, DeclarationKind::Variable(var))
    }

    pub fn action(name: impl Into<Arc<str>>, params: Vec<Parameter>, body: Statement) -> Self {
        Self::new(name, DeclarationKind::Action(Arc::new(Action { params, body })))
    }

    pub fn extern_function(name: impl Into<Arc<str>>, params: Vec<Parameter>, ret: Type) -> Self {
        Self::new(name, DeclarationKind::ExternFunction { params, ret })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NamespaceKind {
    /// Every name is declared at most once.
    Simple,

    /// Names may be overloaded. A lookup that matches more than one declaration is ambiguous.
    General,
}

/// A lexical scope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Namespace {
    pub name: Arc<str>,
    pub kind: NamespaceKind,
    pub declarations: Vec<Declaration>,

    /// Namespaces whose declarations are visible from this namespace, e.g. the parameter list of
    /// a control. Lookups recurse into them but never step out of them.
    pub nested: Vec<Arc<Namespace>>,
}

impl Namespace {
    pub fn new(name: impl Into<Arc<str>>, kind: NamespaceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            declarations: Vec::new(),
            nested: Vec::new(),
        }
    }

    pub fn with_declaration(mut self, declaration: Declaration) -> Self {
        self.declarations.push(declaration);
        self
    }

    pub fn with_nested(mut self, namespace: Namespace) -> Self {
        self.nested.push(Arc::new(namespace));
        self
    }
}
