//! Compilation context.
//!
//! [`CompilationContext`] bundles what every node consults while resolving
//! and generating code: the [`TypeCatalog`] describing the host type
//! universe, the [`ContextFacade`] supplying context-bound names, and the
//! [`CompilerOptions`]. It is immutable for the duration of a compilation.

use std::sync::Arc;

use evalex_core::{
    CompilationError, MethodDef, PropertyDef, Span, TypeCatalog, TypeDescriptor,
};

use crate::CompilerOptions;
use crate::conversion::{Conversion, find_conversion};

/// A name visible in the evaluation context.
#[derive(Debug, Clone)]
pub enum TypedElement {
    /// A property read from the context bean of type `owner`.
    Property {
        owner: TypeDescriptor,
        property: PropertyDef,
    },
    /// A positional argument of the evaluation.
    Parameter {
        name: String,
        index: usize,
        ty: TypeDescriptor,
    },
    /// A method callable without a receiver expression.
    ///
    /// Instance methods are invoked on the context bean of their owner.
    Method(Arc<MethodDef>),
}

impl TypedElement {
    /// Human-readable description, used in ambiguity errors.
    pub fn description(&self) -> String {
        match self {
            TypedElement::Property { owner, property } => {
                format!("property {owner}.{}: {}", property.name, property.ty)
            }
            TypedElement::Parameter { name, index, ty } => {
                format!("parameter #{index} {name}: {ty}")
            }
            TypedElement::Method(method) => {
                format!("method {}.{}", method.owner, method.signature())
            }
        }
    }
}

/// The host's view of the names an expression may reference.
pub trait ContextFacade {
    /// Elements visible under `name`.
    fn lookup_named_elements(&self, name: &str) -> Vec<TypedElement>;

    /// Static type of `this`, if the context defines a receiver.
    fn lookup_this(&self) -> Option<TypeDescriptor>;

    /// Methods callable as bare `name(...)`.
    fn lookup_methods_by_name(&self, name: &str) -> Vec<Arc<MethodDef>>;
}

/// A [`ContextFacade`] over an explicit list of declarations.
///
/// # Example
///
/// ```
/// use evalex_compiler::{ContextFacade, DeclaredContext};
/// use evalex_core::TypeDescriptor;
///
/// let context = DeclaredContext::new()
///     .parameter("a", TypeDescriptor::int32())
///     .parameter("b", TypeDescriptor::int32());
/// assert_eq!(context.lookup_named_elements("b").len(), 1);
/// assert!(context.lookup_this().is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct DeclaredContext {
    elements: Vec<(String, TypedElement)>,
    this_type: Option<TypeDescriptor>,
}

impl DeclaredContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the next positional parameter.
    pub fn parameter(mut self, name: &str, ty: TypeDescriptor) -> Self {
        let index = self
            .elements
            .iter()
            .filter(|(_, e)| matches!(e, TypedElement::Parameter { .. }))
            .count();
        self.elements.push((
            name.to_string(),
            TypedElement::Parameter {
                name: name.to_string(),
                index,
                ty,
            },
        ));
        self
    }

    /// Expose a property of the context bean of type `owner`.
    pub fn property(mut self, owner: TypeDescriptor, property: PropertyDef) -> Self {
        self.elements.push((
            property.name.clone(),
            TypedElement::Property { owner, property },
        ));
        self
    }

    pub fn method(mut self, method: Arc<MethodDef>) -> Self {
        self.elements
            .push((method.name.clone(), TypedElement::Method(method)));
        self
    }

    pub fn with_this(mut self, ty: TypeDescriptor) -> Self {
        self.this_type = Some(ty);
        self
    }
}

impl ContextFacade for DeclaredContext {
    fn lookup_named_elements(&self, name: &str) -> Vec<TypedElement> {
        self.elements
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, e)| e.clone())
            .collect()
    }

    fn lookup_this(&self) -> Option<TypeDescriptor> {
        self.this_type.clone()
    }

    fn lookup_methods_by_name(&self, name: &str) -> Vec<Arc<MethodDef>> {
        self.elements
            .iter()
            .filter_map(|(n, e)| match e {
                TypedElement::Method(m) if n == name => Some(m.clone()),
                _ => None,
            })
            .collect()
    }
}

/// Everything a node needs to resolve and compile itself.
pub struct CompilationContext<'a> {
    catalog: Arc<dyn TypeCatalog>,
    facade: &'a dyn ContextFacade,
    options: CompilerOptions,
}

impl<'a> CompilationContext<'a> {
    pub fn new(catalog: Arc<dyn TypeCatalog>, facade: &'a dyn ContextFacade) -> Self {
        Self {
            catalog,
            facade,
            options: CompilerOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CompilerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn catalog(&self) -> &dyn TypeCatalog {
        self.catalog.as_ref()
    }

    /// Shared handle to the catalog, retained by the compiled artifact.
    pub fn catalog_handle(&self) -> &Arc<dyn TypeCatalog> {
        &self.catalog
    }

    pub fn facade(&self) -> &dyn ContextFacade {
        self.facade
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    // ==========================================================================
    // Type Queries
    // ==========================================================================

    /// Resolve a type reference, failing with [`CompilationError::UnknownType`].
    pub fn lookup_type(&self, name: &str, span: Span) -> Result<TypeDescriptor, CompilationError> {
        self.catalog
            .lookup_type(name)
            .ok_or_else(|| CompilationError::UnknownType {
                name: name.to_string(),
                span,
            })
    }

    pub fn find_conversion(
        &self,
        source: &TypeDescriptor,
        target: &TypeDescriptor,
    ) -> Option<Conversion> {
        find_conversion(source, target, self.catalog())
    }

    pub fn is_assignable(&self, source: &TypeDescriptor, target: &TypeDescriptor) -> bool {
        self.find_conversion(source, target).is_some()
    }
}

impl std::fmt::Debug for CompilationContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilationContext")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
