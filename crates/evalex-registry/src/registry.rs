//! TypeRegistry - the in-memory type catalog.
//!
//! Types are stored by [`TypeHash`] with a name index for
//! [`TypeCatalog::lookup_type`]. Methods live on their declaring [`TypeDef`].
//!
//! # Example
//!
//! ```
//! use evalex_core::{MethodDef, TypeCatalog, TypeDef, TypeDescriptor, Value, native};
//! use evalex_registry::TypeRegistry;
//!
//! let mut registry = TypeRegistry::with_builtins();
//! registry.register_type(TypeDef::class("User")).unwrap();
//! registry
//!     .register_method(MethodDef::new(
//!         TypeDescriptor::declared("User"),
//!         "getAge",
//!         vec![],
//!         TypeDescriptor::int32(),
//!         native(|_, _| Ok(Value::Int(42))),
//!     ))
//!     .unwrap();
//!
//! let user = registry.lookup_type("User").unwrap();
//! assert_eq!(registry.properties(&user, "age").len(), 1);
//! ```

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::trace;

use evalex_core::{
    MethodDef, PrimitiveKind, RegistrationError, TypeCatalog, TypeDef, TypeDescriptor, TypeHash,
};

/// In-memory type catalog.
///
/// Populated single-threaded during host setup, then shared read-only
/// (typically behind an `Arc`) by every compilation and compiled expression.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: FxHashMap<TypeHash, TypeDef>,
    names: FxHashMap<String, TypeHash>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry seeded with the builtin types.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::builtins::install(&mut registry);
        registry
    }

    // ==========================================================================
    // Registration
    // ==========================================================================

    /// Register a declared type.
    ///
    /// Every supertype must already be registered.
    pub fn register_type(&mut self, def: TypeDef) -> Result<(), RegistrationError> {
        if self.types.contains_key(&def.hash) {
            return Err(RegistrationError::DuplicateType(def.name));
        }
        if let Some(missing) = def
            .supertypes
            .iter()
            .find(|s| s.catalog_hash().is_none_or(|h| !self.types.contains_key(&h)))
        {
            return Err(RegistrationError::TypeNotFound(missing.to_string()));
        }
        if let Some(method) = def.methods.iter().find(|m| m.owner.catalog_hash() != Some(def.hash)) {
            return Err(RegistrationError::InvalidDeclaration(format!(
                "method {} declared on {} but registered with {}",
                method.signature(),
                method.owner,
                def.name
            )));
        }
        trace!(name = %def.name, "registering type");
        self.insert(def);
        Ok(())
    }

    /// Register a method on its (already registered) owner type.
    pub fn register_method(&mut self, method: MethodDef) -> Result<(), RegistrationError> {
        let owner = method
            .owner
            .catalog_hash()
            .and_then(|hash| self.types.get_mut(&hash))
            .ok_or_else(|| RegistrationError::TypeNotFound(method.owner.to_string()))?;
        if owner
            .methods
            .iter()
            .any(|m| m.name == method.name && m.params == method.params)
        {
            return Err(RegistrationError::DuplicateMethod {
                owner: owner.name.clone(),
                signature: method.signature(),
            });
        }
        trace!(owner = %owner.name, method = %method.signature(), "registering method");
        owner.methods.push(Arc::new(method));
        Ok(())
    }

    /// Builtins are registered in dependency order and never collide.
    pub(crate) fn insert(&mut self, def: TypeDef) {
        self.names.insert(def.name.clone(), def.hash);
        self.types.insert(def.hash, def);
    }

    // ==========================================================================
    // Queries
    // ==========================================================================

    /// Get a type by its declared name.
    pub fn get(&self, name: &str) -> Option<&TypeDef> {
        self.names.get(name).and_then(|hash| self.types.get(hash))
    }

    /// Check if a type with this name is registered.
    pub fn contains_type(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// Number of registered types.
    pub fn type_count(&self) -> usize {
        self.types.len()
    }
}

impl TypeCatalog for TypeRegistry {
    fn type_def(&self, hash: TypeHash) -> Option<&TypeDef> {
        self.types.get(&hash)
    }

    /// Resolves primitive keywords, box names, declared names (as raw types)
    /// and any of those followed by `[]` suffixes.
    fn lookup_type(&self, name: &str) -> Option<TypeDescriptor> {
        let name = name.trim();
        if let Some(component) = name.strip_suffix("[]") {
            return self.lookup_type(component).map(TypeDescriptor::array_of);
        }
        if let Some(kind) = PrimitiveKind::from_name(name) {
            return Some(TypeDescriptor::Primitive(kind));
        }
        if let Some(kind) = PrimitiveKind::from_box_name(name) {
            return Some(TypeDescriptor::Boxed(kind));
        }
        self.contains_type(name)
            .then(|| TypeDescriptor::declared(name))
    }
}
