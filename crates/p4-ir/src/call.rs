use std::fmt;
use std::sync::Arc;

use crate::expr::{write_arguments, Expression};
use crate::types::Type;

/// Pseudo type name under which free extern functions are registered.
pub const FREE_FUNCTION_PREFIX: &str = "*method";

/// Pseudo type name under which the built-in header methods are registered.
pub const HEADER_METHOD_PREFIX: &str = "*header";

/// Argument of a method call. Named arguments must match the name of the parameter at the same
/// position, unnamed arguments match positionally.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Argument {
    pub name: Option<Arc<str>>,
    pub expr: Expression,
}

impl Argument {
    pub fn positional(expr: Expression) -> Self {
        Self { name: None, expr }
    }

    pub fn named(name: impl Into<Arc<str>>, expr: Expression) -> Self {
        Self {
            name: Some(name.into()),
            expr,
        }
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} = {expr}", expr = self.expr),
            None => write!(f, "{expr}", expr = self.expr),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodCallExpression {
    /// The object the method is invoked on. Free functions and actions have no receiver.
    pub receiver: Option<Expression>,
    pub method: Arc<str>,
    pub args: Vec<Argument>,

    /// Result type of the call, [Type::Void] for calls used as statements.
    pub ty: Type,
}

impl MethodCallExpression {
    /// A call of a free function or action.
    pub fn function(
        method: impl Into<Arc<str>>,
        args: impl IntoIterator<Item = Argument>,
        ty: Type,
    ) -> Self {
        Self {
            receiver: None,
            method: method.into(),
            args: args.into_iter().collect(),
            ty,
        }
    }

    /// A call of a method on an extern object or header.
    pub fn method(
        receiver: Expression,
        method: impl Into<Arc<str>>,
        args: impl IntoIterator<Item = Argument>,
        ty: Type,
    ) -> Self {
        Self {
            receiver: Some(receiver),
            method: method.into(),
            args: args.into_iter().collect(),
            ty,
        }
    }

    /// The name under which implementations of this call are registered: `<ExternType>.<method>`
    /// for extern objects, `*header.<method>` for header methods and `*method.<name>` for free
    /// functions.
    pub fn qualified_name(&self) -> String {
        let method = &self.method;
        match self.receiver.as_ref().map(Expression::ty) {
            Some(Type::Extern(extern_type)) => format!("{extern_type}.{method}"),
            Some(Type::Header(_)) => format!("{HEADER_METHOD_PREFIX}.{method}"),
            Some(_) | None => format!("{FREE_FUNCTION_PREFIX}.{method}"),
        }
    }
}

impl fmt::Display for MethodCallExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(receiver) = &self.receiver {
            write!(f, "{receiver}.")?;
        }
        write!(f, "{method}(", method = self.method)?;
        write_arguments(f, &self.args)?;
        write!(f, ")")
    }
}
