//! TypeDescriptor - the static type of an expression.
//!
//! A [`TypeDescriptor`] describes a primitive, a boxed primitive, an array,
//! a declared (possibly generic) type, the null type, or a type variable
//! inside a generic member signature.
//!
//! # Example
//!
//! ```
//! use evalex_core::{PrimitiveKind, TypeDescriptor};
//!
//! let list = TypeDescriptor::list_of(TypeDescriptor::string());
//! assert_eq!(list.generic_argument(0), Some(&TypeDescriptor::string()));
//! assert_eq!(list.to_string(), "List<String>");
//!
//! let int = TypeDescriptor::int32();
//! assert_eq!(int.boxed(), TypeDescriptor::Boxed(PrimitiveKind::Int32));
//! ```

use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use crate::TypeHash;

/// Names of the builtin declared types every catalog is expected to know.
pub mod names {
    pub const OBJECT: &str = "Object";
    pub const STRING: &str = "String";
    pub const CHAR_SEQUENCE: &str = "CharSequence";
    pub const NUMBER: &str = "Number";
    pub const COMPARABLE: &str = "Comparable";
    pub const COLLECTION: &str = "Collection";
    pub const LIST: &str = "List";
    pub const MAP: &str = "Map";
}

/// The primitive value kinds of the expression language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveKind {
    Bool,
    Int32,
    Int64,
    Float32,
    Float64,
}

impl PrimitiveKind {
    /// All primitive kinds: `Bool`, then the numerics from narrowest to widest.
    pub const ALL: [PrimitiveKind; 5] = [
        PrimitiveKind::Bool,
        PrimitiveKind::Int32,
        PrimitiveKind::Int64,
        PrimitiveKind::Float32,
        PrimitiveKind::Float64,
    ];

    /// The keyword naming this primitive.
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "boolean",
            PrimitiveKind::Int32 => "int",
            PrimitiveKind::Int64 => "long",
            PrimitiveKind::Float32 => "float",
            PrimitiveKind::Float64 => "double",
        }
    }

    /// The name of the boxed counterpart.
    pub fn box_name(self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "Boolean",
            PrimitiveKind::Int32 => "Integer",
            PrimitiveKind::Int64 => "Long",
            PrimitiveKind::Float32 => "Float",
            PrimitiveKind::Float64 => "Double",
        }
    }

    /// Look up a primitive by keyword.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// Look up a primitive by the name of its box.
    pub fn from_box_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.box_name() == name)
    }

    pub fn is_numeric(self) -> bool {
        !matches!(self, PrimitiveKind::Bool)
    }

    pub fn is_integral(self) -> bool {
        matches!(self, PrimitiveKind::Int32 | PrimitiveKind::Int64)
    }

    /// Position in the widening lattice `int32 < int64 < float32 < float64`.
    ///
    /// `None` for `Bool`, which does not take part in numeric promotion.
    pub fn numeric_rank(self) -> Option<u8> {
        match self {
            PrimitiveKind::Bool => None,
            PrimitiveKind::Int32 => Some(0),
            PrimitiveKind::Int64 => Some(1),
            PrimitiveKind::Float32 => Some(2),
            PrimitiveKind::Float64 => Some(3),
        }
    }

    /// Whether a value of `self` widens to `target` without loss of range.
    ///
    /// Identity counts as widening.
    pub fn widens_to(self, target: PrimitiveKind) -> bool {
        match (self.numeric_rank(), target.numeric_rank()) {
            (Some(from), Some(to)) => from <= to,
            _ => self == target,
        }
    }
}

/// A declared (class or interface) type, with generic arguments if any.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeclaredType {
    /// Identity of the type in the catalog.
    pub hash: TypeHash,
    /// Fully qualified name.
    pub name: Arc<str>,
    /// Generic arguments, empty for raw or non-generic types.
    pub args: Arc<[TypeDescriptor]>,
}

/// The static type of an expression or member.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeDescriptor {
    /// No value (method without result).
    Void,
    /// The type of the `null` literal.
    Null,
    Primitive(PrimitiveKind),
    Boxed(PrimitiveKind),
    Array(Arc<TypeDescriptor>),
    Declared(DeclaredType),
    /// The n-th type parameter of the owning generic type.
    Variable(u8),
}

impl TypeDescriptor {
    #[inline]
    pub const fn boolean() -> Self {
        TypeDescriptor::Primitive(PrimitiveKind::Bool)
    }

    #[inline]
    pub const fn int32() -> Self {
        TypeDescriptor::Primitive(PrimitiveKind::Int32)
    }

    #[inline]
    pub const fn int64() -> Self {
        TypeDescriptor::Primitive(PrimitiveKind::Int64)
    }

    #[inline]
    pub const fn float32() -> Self {
        TypeDescriptor::Primitive(PrimitiveKind::Float32)
    }

    #[inline]
    pub const fn float64() -> Self {
        TypeDescriptor::Primitive(PrimitiveKind::Float64)
    }

    /// A non-generic declared type.
    pub fn declared(name: &str) -> Self {
        Self::generic(name, Vec::new())
    }

    /// A declared type with generic arguments.
    pub fn generic(name: &str, args: Vec<TypeDescriptor>) -> Self {
        TypeDescriptor::Declared(DeclaredType {
            hash: TypeHash::from_name(name),
            name: Arc::from(name),
            args: Arc::from(args),
        })
    }

    pub fn object() -> Self {
        Self::declared(names::OBJECT)
    }

    pub fn string() -> Self {
        Self::declared(names::STRING)
    }

    pub fn list_of(element: TypeDescriptor) -> Self {
        Self::generic(names::LIST, vec![element])
    }

    pub fn map_of(key: TypeDescriptor, value: TypeDescriptor) -> Self {
        Self::generic(names::MAP, vec![key, value])
    }

    pub fn comparable_of(target: TypeDescriptor) -> Self {
        Self::generic(names::COMPARABLE, vec![target])
    }

    pub fn array_of(component: TypeDescriptor) -> Self {
        TypeDescriptor::Array(Arc::new(component))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, TypeDescriptor::Void)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, TypeDescriptor::Null)
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, TypeDescriptor::Primitive(_))
    }

    pub fn is_boxed(&self) -> bool {
        matches!(self, TypeDescriptor::Boxed(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, TypeDescriptor::Array(_))
    }

    /// Anything that can hold `null`.
    pub fn is_reference(&self) -> bool {
        !matches!(self, TypeDescriptor::Void | TypeDescriptor::Primitive(_))
    }

    /// The primitive kind behind a primitive or boxed descriptor.
    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        match self {
            TypeDescriptor::Primitive(k) | TypeDescriptor::Boxed(k) => Some(*k),
            _ => None,
        }
    }

    /// The numeric kind of a (possibly boxed) numeric type.
    pub fn numeric_kind(&self) -> Option<PrimitiveKind> {
        self.primitive_kind().filter(|k| k.is_numeric())
    }

    pub fn is_numeric(&self) -> bool {
        self.numeric_kind().is_some()
    }

    /// Primitive or boxed boolean.
    pub fn is_boolean(&self) -> bool {
        self.primitive_kind() == Some(PrimitiveKind::Bool)
    }

    pub fn is_string(&self) -> bool {
        self.is_named(names::STRING)
    }

    /// Strings and other character sequences.
    pub fn is_string_like(&self) -> bool {
        self.is_named(names::STRING) || self.is_named(names::CHAR_SEQUENCE)
    }

    pub fn is_object(&self) -> bool {
        self.is_named(names::OBJECT)
    }

    /// Whether this is the declared type `name` (ignoring generic arguments).
    pub fn is_named(&self, name: &str) -> bool {
        matches!(self, TypeDescriptor::Declared(d) if &*d.name == name)
    }

    /// Boxed counterpart of a primitive; other descriptors are returned unchanged.
    pub fn boxed(&self) -> TypeDescriptor {
        match self {
            TypeDescriptor::Primitive(k) => TypeDescriptor::Boxed(*k),
            other => other.clone(),
        }
    }

    /// Primitive counterpart of a box; other descriptors are returned unchanged.
    pub fn unboxed(&self) -> TypeDescriptor {
        match self {
            TypeDescriptor::Boxed(k) => TypeDescriptor::Primitive(*k),
            other => other.clone(),
        }
    }

    /// Component type of an array.
    pub fn component_type(&self) -> Option<&TypeDescriptor> {
        match self {
            TypeDescriptor::Array(component) => Some(component),
            _ => None,
        }
    }

    /// Number of array dimensions (0 for non-arrays).
    pub fn dimensions(&self) -> usize {
        match self {
            TypeDescriptor::Array(component) => 1 + component.dimensions(),
            _ => 0,
        }
    }

    /// Generic arguments of a declared type.
    pub fn type_args(&self) -> &[TypeDescriptor] {
        match self {
            TypeDescriptor::Declared(d) => &d.args,
            _ => &[],
        }
    }

    /// The generic argument at `index`, if bound.
    pub fn generic_argument(&self, index: usize) -> Option<&TypeDescriptor> {
        self.type_args().get(index)
    }

    /// The catalog identity of this type.
    ///
    /// Boxes and primitives map to their names; arrays, null, void and type
    /// variables have no catalog entry.
    pub fn catalog_hash(&self) -> Option<TypeHash> {
        match self {
            TypeDescriptor::Declared(d) => Some(d.hash),
            TypeDescriptor::Boxed(k) => Some(TypeHash::from_name(k.box_name())),
            TypeDescriptor::Primitive(k) => Some(TypeHash::from_name(k.name())),
            _ => None,
        }
    }

    /// Replace type variables with the given arguments.
    ///
    /// Unbound variables become `Object`.
    pub fn substitute(&self, args: &[TypeDescriptor]) -> TypeDescriptor {
        match self {
            TypeDescriptor::Variable(i) => args
                .get(*i as usize)
                .cloned()
                .unwrap_or_else(TypeDescriptor::object),
            TypeDescriptor::Array(component) => {
                TypeDescriptor::Array(Arc::new(component.substitute(args)))
            }
            TypeDescriptor::Declared(d) if !d.args.is_empty() => {
                TypeDescriptor::Declared(DeclaredType {
                    hash: d.hash,
                    name: d.name.clone(),
                    args: d.args.iter().map(|a| a.substitute(args)).collect(),
                })
            }
            other => other.clone(),
        }
    }
}

impl Display for TypeDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Void => write!(f, "void"),
            TypeDescriptor::Null => write!(f, "null"),
            TypeDescriptor::Primitive(k) => write!(f, "{}", k.name()),
            TypeDescriptor::Boxed(k) => write!(f, "{}", k.box_name()),
            TypeDescriptor::Array(component) => write!(f, "{component}[]"),
            TypeDescriptor::Declared(d) => {
                write!(f, "{}", d.name)?;
                if !d.args.is_empty() {
                    write!(f, "<")?;
                    for (i, arg) in d.args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{arg}")?;
                    }
                    write!(f, ">")?;
                }
                Ok(())
            }
            TypeDescriptor::Variable(i) => write!(f, "T{i}"),
        }
    }
}
