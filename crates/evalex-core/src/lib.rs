//! Core types shared by the evalex compiler, registry and runtime.
//!
//! - [`TypeDescriptor`]: static types (primitive, boxed, array, declared, generic)
//! - [`TypeCatalog`]: the query interface over the host type universe
//! - [`CompilationError`] / [`RuntimeError`]: the error taxonomy
//! - [`Value`] / [`HostObject`]: runtime values

pub mod catalog;
pub mod descriptor;
pub mod error;
pub mod span;
pub mod type_hash;
pub mod value;

pub use catalog::{
    MethodDef, MethodTraits, NativeFn, PropertyDef, TypeCatalog, TypeDef, TypeKind, capitalize,
    native,
};
pub use descriptor::{DeclaredType, PrimitiveKind, TypeDescriptor, names};
pub use error::{CompilationError, RegistrationError, RuntimeError};
pub use span::Span;
pub use type_hash::TypeHash;
pub use value::{HostObject, Value, ValueMap};
