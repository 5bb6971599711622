//! The type catalog: the compiler's narrow view of the host type universe.
//!
//! The compiler never reflects over host types directly. Everything it needs
//! to know about declared types (supertypes, generic parameters, methods and
//! their native implementations) comes through [`TypeCatalog`].
//!
//! Implementors only supply [`TypeCatalog::type_def`] and
//! [`TypeCatalog::lookup_type`]; hierarchy walks, generic substitution and
//! property derivation are provided.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use rustc_hash::FxHashSet;

use crate::{RuntimeError, TypeDescriptor, TypeHash, Value};

/// Native implementation of a method.
///
/// Receives the receiver (`Value::Null` for static methods) and the
/// already-converted arguments. Varargs arrive as a single trailing
/// `Value::Array`.
pub type NativeFn = Arc<dyn Fn(&Value, &[Value]) -> Result<Value, RuntimeError> + Send + Sync>;

/// Wrap a closure as a [`NativeFn`].
pub fn native<F>(f: F) -> NativeFn
where
    F: Fn(&Value, &[Value]) -> Result<Value, RuntimeError> + Send + Sync + 'static,
{
    Arc::new(f)
}

bitflags! {
    /// Method modifiers relevant to call resolution.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MethodTraits: u8 {
        /// The last parameter is declared variadic.
        const VARARGS = 1 << 0;
        /// The method needs no receiver.
        const STATIC = 1 << 1;
    }
}

/// A declared method with its native implementation.
#[derive(Clone)]
pub struct MethodDef {
    /// Identity of the method (owner + name + parameter types).
    pub hash: TypeHash,
    /// Declaring type. Generic owners use [`TypeDescriptor::Variable`] arguments.
    pub owner: TypeDescriptor,
    pub name: String,
    pub params: Vec<TypeDescriptor>,
    pub return_type: TypeDescriptor,
    pub traits: MethodTraits,
    pub native: NativeFn,
}

impl MethodDef {
    pub fn new(
        owner: TypeDescriptor,
        name: impl Into<String>,
        params: Vec<TypeDescriptor>,
        return_type: TypeDescriptor,
        native: NativeFn,
    ) -> Self {
        let name = name.into();
        let owner_hash = owner.catalog_hash().unwrap_or(TypeHash::EMPTY);
        let param_hashes: Vec<_> = params
            .iter()
            .map(|p| TypeHash::from_name(&p.to_string()))
            .collect();
        Self {
            hash: TypeHash::from_method(owner_hash, &name, &param_hashes),
            owner,
            name,
            params,
            return_type,
            traits: MethodTraits::empty(),
            native,
        }
    }

    pub fn with_traits(mut self, traits: MethodTraits) -> Self {
        self.traits = traits;
        self
    }

    pub fn is_varargs(&self) -> bool {
        self.traits.contains(MethodTraits::VARARGS)
    }

    pub fn is_static(&self) -> bool {
        self.traits.contains(MethodTraits::STATIC)
    }

    /// Human-readable signature, e.g. `format(String, Object...)`.
    pub fn signature(&self) -> String {
        let mut out = format!("{}(", self.name);
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let last = i + 1 == self.params.len();
            match (last && self.is_varargs(), param.component_type()) {
                (true, Some(element)) => out.push_str(&format!("{element}...")),
                _ => out.push_str(&param.to_string()),
            }
        }
        out.push(')');
        out
    }

    /// Bind the owner's type variables to concrete arguments.
    pub fn instantiate(&self, args: &[TypeDescriptor]) -> MethodDef {
        MethodDef {
            hash: self.hash,
            owner: self.owner.substitute(args),
            name: self.name.clone(),
            params: self.params.iter().map(|p| p.substitute(args)).collect(),
            return_type: self.return_type.substitute(args),
            traits: self.traits,
            native: self.native.clone(),
        }
    }
}

impl fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDef")
            .field("owner", &self.owner.to_string())
            .field("signature", &self.signature())
            .field("return_type", &self.return_type.to_string())
            .field("traits", &self.traits)
            .finish()
    }
}

/// A readable property, backed by a zero-argument accessor method.
#[derive(Debug, Clone)]
pub struct PropertyDef {
    pub name: String,
    pub ty: TypeDescriptor,
    pub getter: Arc<MethodDef>,
}

/// Whether a declared type is a class or an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Class,
    Interface,
}

/// A declared type as registered in a catalog.
#[derive(Debug, Clone)]
pub struct TypeDef {
    pub hash: TypeHash,
    pub name: String,
    pub kind: TypeKind,
    /// Names of the generic parameters, in order.
    pub type_params: Vec<String>,
    /// Direct supertypes, possibly referring to this type's variables.
    pub supertypes: Vec<TypeDescriptor>,
    pub methods: Vec<Arc<MethodDef>>,
}

impl TypeDef {
    pub fn class(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Class)
    }

    pub fn interface(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Interface)
    }

    fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        let name = name.into();
        Self {
            hash: TypeHash::from_name(&name),
            name,
            kind,
            type_params: Vec::new(),
            supertypes: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn with_type_params(mut self, params: &[&str]) -> Self {
        self.type_params = params.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn extends(mut self, supertype: TypeDescriptor) -> Self {
        self.supertypes.push(supertype);
        self
    }

    /// The descriptor of this type with its own variables as arguments.
    pub fn self_type(&self) -> TypeDescriptor {
        let args = (0..self.type_params.len())
            .map(|i| TypeDescriptor::Variable(i as u8))
            .collect();
        TypeDescriptor::generic(&self.name, args)
    }
}

/// Query interface over the host type universe.
pub trait TypeCatalog: Send + Sync {
    /// The declaration registered under `hash`.
    fn type_def(&self, hash: TypeHash) -> Option<&TypeDef>;

    /// Resolve a type name (primitive keyword, box name or declared name).
    fn lookup_type(&self, name: &str) -> Option<TypeDescriptor>;

    /// Direct supertypes of `ty`, with generic arguments substituted.
    ///
    /// Every reference type other than `Object` has at least `Object`.
    fn supertypes(&self, ty: &TypeDescriptor) -> Vec<TypeDescriptor> {
        if ty.is_object() || !ty.is_reference() || ty.is_null() {
            return Vec::new();
        }
        let declared = ty
            .catalog_hash()
            .and_then(|hash| self.type_def(hash))
            .map(|def| {
                def.supertypes
                    .iter()
                    .map(|s| s.substitute(ty.type_args()))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        if declared.is_empty() {
            vec![TypeDescriptor::object()]
        } else {
            declared
        }
    }

    /// All supertypes of `ty` (including itself), nearest first.
    fn hierarchy(&self, ty: &TypeDescriptor) -> Vec<TypeDescriptor> {
        let mut seen = FxHashSet::default();
        let mut order = Vec::new();
        let mut queue = std::collections::VecDeque::from([ty.clone()]);
        while let Some(next) = queue.pop_front() {
            if !seen.insert(next.clone()) {
                continue;
            }
            queue.extend(self.supertypes(&next));
            order.push(next);
        }
        order
    }

    /// The parameterization of the type named by `hash` in `ty`'s hierarchy.
    ///
    /// For `String` and the hash of `Comparable` this is `Comparable<String>`.
    fn find_supertype(&self, ty: &TypeDescriptor, hash: TypeHash) -> Option<TypeDescriptor> {
        self.hierarchy(ty)
            .into_iter()
            .find(|t| t.catalog_hash() == Some(hash) && !t.is_primitive())
    }

    /// Reference subtyping: `sub` can be used where `sup` is expected.
    ///
    /// Generic arguments are invariant. Raw types on either side match any
    /// parameterization.
    fn is_subtype(&self, sub: &TypeDescriptor, sup: &TypeDescriptor) -> bool {
        if sub == sup {
            return true;
        }
        if !sub.is_reference() || !sup.is_reference() {
            return false;
        }
        if sup.is_object() || sub.is_null() {
            return true;
        }
        match (sub, sup) {
            (TypeDescriptor::Array(a), TypeDescriptor::Array(b)) => {
                a == b || (a.is_reference() && self.is_subtype(a, b))
            }
            (TypeDescriptor::Array(_), _) | (_, TypeDescriptor::Array(_)) => false,
            _ => {
                let Some(target) = sup.catalog_hash() else {
                    return false;
                };
                let raw_sub = sub.type_args().is_empty()
                    && sub
                        .catalog_hash()
                        .and_then(|h| self.type_def(h))
                        .is_some_and(|def| !def.type_params.is_empty());
                match self.find_supertype(sub, target) {
                    Some(found) => {
                        raw_sub
                            || sup.type_args().is_empty()
                            || found.type_args().is_empty()
                            || found.type_args() == sup.type_args()
                    }
                    None => false,
                }
            }
        }
    }

    /// Methods named `name` visible on `owner`, nearest declaration first.
    ///
    /// Methods redeclared with the same parameter list further up the
    /// hierarchy are hidden by the nearer declaration.
    fn methods(&self, owner: &TypeDescriptor, name: &str) -> Vec<Arc<MethodDef>> {
        let mut found: Vec<Arc<MethodDef>> = Vec::new();
        for ty in self.hierarchy(owner) {
            let Some(def) = ty.catalog_hash().and_then(|h| self.type_def(h)) else {
                continue;
            };
            for method in def.methods.iter().filter(|m| m.name == name) {
                let bound = Arc::new(method.instantiate(ty.type_args()));
                if !found.iter().any(|m| m.params == bound.params) {
                    found.push(bound);
                }
            }
        }
        found
    }

    /// Readable properties named `name` on `owner`.
    ///
    /// A property is read through a zero-argument instance method named
    /// `getName`, `isName` (boolean result only) or `name`.
    fn properties(&self, owner: &TypeDescriptor, name: &str) -> Vec<PropertyDef> {
        let capitalized = capitalize(name);
        let mut accessors = self.methods(owner, &format!("get{capitalized}"));
        accessors.extend(
            self.methods(owner, &format!("is{capitalized}"))
                .into_iter()
                .filter(|m| m.return_type.is_boolean()),
        );
        accessors.extend(self.methods(owner, name));
        accessors
            .into_iter()
            .filter(|m| m.params.is_empty() && !m.is_static() && !m.return_type.is_void())
            .map(|getter| PropertyDef {
                name: name.to_string(),
                ty: getter.return_type.clone(),
                getter,
            })
            .collect()
    }

    /// Whether a runtime value inhabits `ty`.
    ///
    /// `null` is an instance of nothing. Arrays are checked element-wise.
    fn is_instance(&self, value: &Value, ty: &TypeDescriptor) -> bool {
        match (value, ty) {
            (Value::Null, _) => false,
            (_, TypeDescriptor::Primitive(kind) | TypeDescriptor::Boxed(kind)) => {
                value.primitive_kind() == Some(*kind)
            }
            (_, ty) if ty.is_object() => true,
            (Value::Array(items), TypeDescriptor::Array(component)) => items
                .iter()
                .all(|item| item.is_null() || self.is_instance(item, component)),
            (_, TypeDescriptor::Array(_)) => false,
            _ => self.is_subtype(&value.runtime_type(), ty),
        }
    }
}

/// Upper-case the first character of a property name.
pub fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashMap;

    #[derive(Default)]
    struct MiniCatalog {
        types: FxHashMap<TypeHash, TypeDef>,
    }

    impl MiniCatalog {
        fn add(&mut self, def: TypeDef) {
            self.types.insert(def.hash, def);
        }
    }

    impl TypeCatalog for MiniCatalog {
        fn type_def(&self, hash: TypeHash) -> Option<&TypeDef> {
            self.types.get(&hash)
        }

        fn lookup_type(&self, name: &str) -> Option<TypeDescriptor> {
            self.types
                .get(&TypeHash::from_name(name))
                .map(|_| TypeDescriptor::declared(name))
        }
    }

    fn noop() -> NativeFn {
        native(|_, _| Ok(Value::Null))
    }

    fn sample() -> MiniCatalog {
        let mut catalog = MiniCatalog::default();
        catalog.add(TypeDef::class("Object"));
        let mut comparable = TypeDef::interface("Comparable").with_type_params(&["T"]);
        comparable.methods.push(Arc::new(MethodDef::new(
            comparable.self_type(),
            "compareTo",
            vec![TypeDescriptor::Variable(0)],
            TypeDescriptor::int32(),
            noop(),
        )));
        catalog.add(comparable);
        let mut animal = TypeDef::class("Animal");
        animal.methods.push(Arc::new(MethodDef::new(
            TypeDescriptor::declared("Animal"),
            "getName",
            vec![],
            TypeDescriptor::string(),
            noop(),
        )));
        catalog.add(animal);
        let mut dog = TypeDef::class("Dog")
            .extends(TypeDescriptor::declared("Animal"))
            .extends(TypeDescriptor::comparable_of(TypeDescriptor::declared(
                "Dog",
            )));
        dog.methods.push(Arc::new(MethodDef::new(
            TypeDescriptor::declared("Dog"),
            "isGood",
            vec![],
            TypeDescriptor::boolean(),
            noop(),
        )));
        catalog.add(dog);
        catalog
    }

    #[test]
    fn subtyping_walks_hierarchy() {
        let catalog = sample();
        let dog = TypeDescriptor::declared("Dog");
        assert!(catalog.is_subtype(&dog, &TypeDescriptor::declared("Animal")));
        assert!(catalog.is_subtype(&dog, &TypeDescriptor::object()));
        assert!(!catalog.is_subtype(&TypeDescriptor::declared("Animal"), &dog));
        assert!(catalog.is_subtype(&TypeDescriptor::Null, &dog));
    }

    #[test]
    fn generic_supertypes_are_substituted() {
        let catalog = sample();
        let dog = TypeDescriptor::declared("Dog");
        let found = catalog.find_supertype(&dog, TypeHash::from_name("Comparable"));
        assert_eq!(found, Some(TypeDescriptor::comparable_of(dog.clone())));
        assert!(catalog.is_subtype(&dog, &TypeDescriptor::comparable_of(dog.clone())));
        assert!(!catalog.is_subtype(
            &dog,
            &TypeDescriptor::comparable_of(TypeDescriptor::string())
        ));
    }

    #[test]
    fn inherited_generic_methods_are_instantiated() {
        let catalog = sample();
        let dog = TypeDescriptor::declared("Dog");
        let methods = catalog.methods(&dog, "compareTo");
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].params, vec![dog]);
    }

    #[test]
    fn properties_follow_accessor_conventions() {
        let catalog = sample();
        let dog = TypeDescriptor::declared("Dog");
        let name = catalog.properties(&dog, "name");
        assert_eq!(name.len(), 1);
        assert!(name[0].ty.is_string());
        assert_eq!(catalog.properties(&dog, "good").len(), 1);
        assert!(catalog.properties(&dog, "missing").is_empty());
    }

    #[test]
    fn array_subtyping_is_covariant_for_references() {
        let catalog = sample();
        let dogs = TypeDescriptor::array_of(TypeDescriptor::declared("Dog"));
        let animals = TypeDescriptor::array_of(TypeDescriptor::declared("Animal"));
        assert!(catalog.is_subtype(&dogs, &animals));
        assert!(catalog.is_subtype(&dogs, &TypeDescriptor::object()));
        let ints = TypeDescriptor::array_of(TypeDescriptor::int32());
        let longs = TypeDescriptor::array_of(TypeDescriptor::int64());
        assert!(!catalog.is_subtype(&ints, &longs));
    }

    #[test]
    fn instance_checks_use_runtime_types() {
        let catalog = sample();
        let int = TypeDescriptor::int32();
        assert!(catalog.is_instance(&Value::Int(1), &int));
        assert!(!catalog.is_instance(&Value::Long(1), &int));
        assert!(!catalog.is_instance(&Value::Null, &TypeDescriptor::object()));
        assert!(catalog.is_instance(&Value::string("a"), &TypeDescriptor::object()));

        let ints = TypeDescriptor::array_of(int);
        assert!(catalog.is_instance(&Value::array([Value::Int(1), Value::Null]), &ints));
        assert!(!catalog.is_instance(&Value::array([Value::Long(1)]), &ints));
        assert!(!catalog.is_instance(&Value::Int(1), &ints));
    }

    #[test]
    fn signature_formats_varargs() {
        let method = MethodDef::new(
            TypeDescriptor::declared("Fmt"),
            "format",
            vec![
                TypeDescriptor::string(),
                TypeDescriptor::array_of(TypeDescriptor::object()),
            ],
            TypeDescriptor::string(),
            noop(),
        )
        .with_traits(MethodTraits::VARARGS);
        assert_eq!(method.signature(), "format(String, Object...)");
    }

    #[test]
    fn capitalize_property_names() {
        assert_eq!(capitalize("age"), "Age");
        assert_eq!(capitalize(""), "");
    }
}
