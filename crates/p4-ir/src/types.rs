use std::fmt;
use std::sync::Arc;

/// Type of an expression or storage location. Only the types the symbolic execution core needs to
/// distinguish are represented; the front end has already resolved typedefs, enums and generics.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Type {
    Bool,

    /// Fixed-width bit vector. Widths are limited to 128 bits.
    Bits {
        width: u32,
        signed: bool,
    },

    /// A header type. Headers carry an implicit validity bit in addition to their fields.
    Header(Arc<StructType>),

    /// A struct type, such as the collection of headers passed to a control.
    Struct(Arc<StructType>),

    /// An extern object type, e.g. `CounterArray`.
    Extern(Arc<str>),

    Void,
}

/// Name and ordered fields of a header or struct type.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StructType {
    pub name: Arc<str>,
    pub fields: Vec<Field>,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Field {
    pub name: Arc<str>,
    pub ty: Type,
}

impl Field {
    pub fn new(name: impl Into<Arc<str>>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

impl StructType {
    pub fn new(name: impl Into<Arc<str>>, fields: impl IntoIterator<Item = Field>) -> Self {
        Self {
            name: name.into(),
            fields: fields.into_iter().collect(),
        }
    }
}

/// Maximum supported width of a [Type::Bits].
pub const MAX_WIDTH: u32 = u128::BITS;

impl Type {
    /// Unsigned bit type `bit<width>`.
    pub fn bits(width: u32) -> Self {
        assert!(
            width > 0 && width <= MAX_WIDTH,
            "unsupported bit width {width}"
        );
        Type::Bits {
            width,
            signed: false,
        }
    }

    /// Signed bit type `int<width>`.
    pub fn int(width: u32) -> Self {
        assert!(
            width > 0 && width <= MAX_WIDTH,
            "unsupported bit width {width}"
        );
        Type::Bits {
            width,
            signed: true,
        }
    }

    pub fn header(ty: StructType) -> Self {
        Type::Header(Arc::new(ty))
    }

    pub fn structure(ty: StructType) -> Self {
        Type::Struct(Arc::new(ty))
    }

    pub fn extern_type(name: impl Into<Arc<str>>) -> Self {
        Type::Extern(name.into())
    }

    /// Width in bits of a base type. `Bool` is treated as a single bit.
    pub fn width(&self) -> Option<u32> {
        match self {
            Type::Bool => Some(1),
            Type::Bits { width, .. } => Some(*width),
            _ => None,
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, Type::Bits { signed: true, .. })
    }

    /// Base types are the ones whose values are held directly in the symbolic environment.
    pub fn is_base(&self) -> bool {
        matches!(self, Type::Bool | Type::Bits { .. })
    }

    pub fn is_header(&self) -> bool {
        matches!(self, Type::Header(_))
    }

    /// Fields of a header or struct type. Empty for every other type.
    pub fn fields(&self) -> &[Field] {
        match self {
            Type::Header(ty) | Type::Struct(ty) => &ty.fields,
            _ => &[],
        }
    }

    pub fn field(&self, name: &str) -> Option<&Type> {
        self.fields()
            .iter()
            .find(|field| field.name.as_ref() == name)
            .map(|field| &field.ty)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Bool => write!(f, "bool"),
            Type::Bits {
                width,
                signed: false,
            } => write!(f, "bit<{width}>"),
            Type::Bits {
                width,
                signed: true,
            } => write!(f, "int<{width}>"),
            Type::Header(ty) => write!(f, "header {name}", name = ty.name),
            Type::Struct(ty) => write!(f, "struct {name}", name = ty.name),
            Type::Extern(name) => write!(f, "extern {name}"),
            Type::Void => write!(f, "void"),
        }
    }
}
