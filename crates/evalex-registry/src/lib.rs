//! Type registry for the evalex expression compiler.
//!
//! [`TypeRegistry`] is an in-memory [`TypeCatalog`](evalex_core::TypeCatalog)
//! that hosts populate with their own types. [`TypeRegistry::with_builtins`]
//! seeds it with the builtin universe: `Object`, `String`, `CharSequence`,
//! `Number`, the boxed primitives, `Comparable<T>`, `Collection<E>`,
//! `List<E>`, `Map<K, V>` and `Math`.

mod builtins;
mod registry;

pub use registry::TypeRegistry;
