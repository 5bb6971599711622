//! Overload resolution for method calls.
//!
//! Selects the single declared method that accepts the argument types of a
//! call site. There is no ranking between applicable methods: when more than
//! one method accepts the arguments the call is ambiguous, and the caller has
//! to disambiguate at the call site.
//!
//! ## Algorithm
//!
//! For each declared method:
//!
//! 1. A method without parameters matches only a call without arguments.
//! 2. Fewer arguments than `parameters - 1` never match.
//! 3. A method is a varargs candidate when it is declared variadic or its
//!    last parameter is a one-dimensional array.
//! 4. A varargs candidate matches either
//!    - as written, when the argument count equals the parameter count and
//!      every argument (including an array in the last position) is
//!      assignable, or
//!    - expanded, when the fixed parameters accept their arguments and every
//!      trailing argument (possibly none) is assignable to the array's
//!      element type.
//! 5. Any other method needs an exact argument count and assignable
//!    arguments.

use std::sync::Arc;

use evalex_core::{CompilationError, MethodDef, Span, TypeCatalog, TypeDescriptor};
use tracing::trace;

use crate::conversion::{Conversion, find_conversion};

/// The method selected for a call site, with how to pass each argument.
#[derive(Debug, Clone)]
pub struct CandidateMethod {
    pub method: Arc<MethodDef>,
    /// Static types of the arguments at the call site.
    pub argument_types: Vec<TypeDescriptor>,
    /// Whether trailing arguments are collected into an array.
    pub is_varargs: bool,
    /// Index of the first collected argument when `is_varargs` is set.
    pub varargs_start: Option<usize>,
    /// Conversion of each argument to its parameter (or element) type.
    pub conversions: Vec<Conversion>,
    /// Sum of the conversion costs.
    pub total_cost: u32,
}

impl CandidateMethod {
    /// Declared parameter types of the selected method.
    pub fn parameter_types(&self) -> &[TypeDescriptor] {
        &self.method.params
    }

    pub fn return_type(&self) -> &TypeDescriptor {
        &self.method.return_type
    }

    /// Element type of the synthesized varargs array.
    pub fn varargs_element(&self) -> Option<&TypeDescriptor> {
        if !self.is_varargs {
            return None;
        }
        self.method.params.last().and_then(|p| p.component_type())
    }

    /// Number of values the call instruction consumes (excluding a receiver).
    pub fn call_arity(&self) -> usize {
        self.method.params.len()
    }
}

/// Resolve a call of `name` with `arg_types` against the declared `candidates`.
///
/// # Returns
///
/// * `Ok(CandidateMethod)` - The unique applicable method
/// * `Err(CompilationError::NoMatchingMethod)` - No method applies
/// * `Err(CompilationError::AmbiguousMethod)` - More than one method applies
pub fn resolve_method(
    name: &str,
    candidates: &[Arc<MethodDef>],
    arg_types: &[TypeDescriptor],
    catalog: &dyn TypeCatalog,
    span: Span,
) -> Result<CandidateMethod, CompilationError> {
    let mut matches: Vec<CandidateMethod> = candidates
        .iter()
        .filter_map(|method| try_match_candidate(method, arg_types, catalog))
        .collect();

    match matches.len() {
        0 => Err(no_matching_method_error(name, candidates, arg_types, span)),
        1 => {
            let selected = matches.remove(0);
            trace!(
                method = %selected.method.signature(),
                varargs = selected.is_varargs,
                cost = selected.total_cost,
                "resolved call"
            );
            Ok(selected)
        }
        _ => Err(CompilationError::AmbiguousMethod {
            name: name.to_string(),
            args: format_args_list(arg_types),
            candidates: format_candidates(matches.iter().map(|m| m.method.as_ref())),
            span,
        }),
    }
}

/// Try to match arguments against a single declared method.
fn try_match_candidate(
    method: &Arc<MethodDef>,
    arg_types: &[TypeDescriptor],
    catalog: &dyn TypeCatalog,
) -> Option<CandidateMethod> {
    let params = &method.params;

    let Some(last) = params.last() else {
        return arg_types
            .is_empty()
            .then(|| candidate(method, arg_types, Vec::new(), None));
    };

    if arg_types.len() + 1 < params.len() {
        return None;
    }

    let varargs_candidate = method.is_varargs() || last.dimensions() == 1;
    if !varargs_candidate {
        if arg_types.len() != params.len() {
            return None;
        }
        let conversions = convert_all(arg_types, params, catalog)?;
        return Some(candidate(method, arg_types, conversions, None));
    }

    if arg_types.len() == params.len() {
        if let Some(conversions) = convert_all(arg_types, params, catalog) {
            return Some(candidate(method, arg_types, conversions, None));
        }
    }

    let fixed = params.len() - 1;
    let element = last.component_type()?;
    let mut conversions = convert_all(&arg_types[..fixed], &params[..fixed], catalog)?;
    for arg in &arg_types[fixed..] {
        conversions.push(find_conversion(arg, element, catalog)?);
    }
    Some(candidate(method, arg_types, conversions, Some(fixed)))
}

fn convert_all(
    args: &[TypeDescriptor],
    params: &[TypeDescriptor],
    catalog: &dyn TypeCatalog,
) -> Option<Vec<Conversion>> {
    args.iter()
        .zip(params)
        .map(|(arg, param)| find_conversion(arg, param, catalog))
        .collect()
}

fn candidate(
    method: &Arc<MethodDef>,
    arg_types: &[TypeDescriptor],
    conversions: Vec<Conversion>,
    varargs_start: Option<usize>,
) -> CandidateMethod {
    let total_cost = conversions
        .iter()
        .fold(0u32, |acc, c| acc.saturating_add(c.cost));
    CandidateMethod {
        method: method.clone(),
        argument_types: arg_types.to_vec(),
        is_varargs: varargs_start.is_some(),
        varargs_start,
        conversions,
        total_cost,
    }
}

/// Build error for no matching method.
fn no_matching_method_error(
    name: &str,
    candidates: &[Arc<MethodDef>],
    arg_types: &[TypeDescriptor],
    span: Span,
) -> CompilationError {
    CompilationError::NoMatchingMethod {
        name: name.to_string(),
        args: format_args_list(arg_types),
        candidates: format_candidates(candidates.iter().map(|m| m.as_ref())),
        span,
    }
}

pub(crate) fn format_args_list(arg_types: &[TypeDescriptor]) -> String {
    arg_types
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Sorted so the message does not depend on declaration order.
fn format_candidates<'a>(methods: impl Iterator<Item = &'a MethodDef>) -> String {
    let mut signatures: Vec<String> = methods
        .map(|m| format!("{}.{}", m.owner, m.signature()))
        .collect();
    if signatures.is_empty() {
        return "none".to_string();
    }
    signatures.sort();
    signatures.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use evalex_core::{MethodTraits, PrimitiveKind, Value, native};
    use evalex_registry::TypeRegistry;

    fn make_method(name: &str, params: Vec<TypeDescriptor>) -> Arc<MethodDef> {
        Arc::new(MethodDef::new(
            TypeDescriptor::declared("Util"),
            name,
            params,
            TypeDescriptor::string(),
            native(|_, _| Ok(Value::Null)),
        ))
    }

    fn make_varargs(name: &str, params: Vec<TypeDescriptor>) -> Arc<MethodDef> {
        let method = Arc::unwrap_or_clone(make_method(name, params));
        Arc::new(method.with_traits(MethodTraits::VARARGS))
    }

    fn resolve(
        candidates: &[Arc<MethodDef>],
        args: &[TypeDescriptor],
    ) -> Result<CandidateMethod, CompilationError> {
        let registry = TypeRegistry::with_builtins();
        resolve_method("f", candidates, args, &registry, Span::default())
    }

    fn string() -> TypeDescriptor {
        TypeDescriptor::string()
    }

    fn object() -> TypeDescriptor {
        TypeDescriptor::object()
    }

    #[test]
    fn zero_parameters_need_zero_arguments() {
        let methods = [make_method("f", vec![])];
        assert!(resolve(&methods, &[]).is_ok());
        assert!(matches!(
            resolve(&methods, &[string()]),
            Err(CompilationError::NoMatchingMethod { .. })
        ));
    }

    #[test]
    fn exact_and_widened_arguments() {
        let methods = [make_method("f", vec![TypeDescriptor::int64(), object()])];
        let m = resolve(&methods, &[TypeDescriptor::int32(), string()]).unwrap();
        assert!(!m.is_varargs);
        assert_eq!(m.conversions.len(), 2);
        assert!(m.total_cost > 0);

        assert!(resolve(&methods, &[TypeDescriptor::float64(), string()]).is_err());
    }

    #[test]
    fn prebuilt_array_matches_without_expansion() {
        let methods = [make_varargs(
            "f",
            vec![string(), TypeDescriptor::array_of(object())],
        )];
        let m = resolve(&methods, &[string(), TypeDescriptor::array_of(string())]).unwrap();
        assert!(!m.is_varargs);
        assert_eq!(m.varargs_start, None);
    }

    #[test]
    fn loose_trailing_arguments_are_expanded() {
        let methods = [make_varargs(
            "f",
            vec![string(), TypeDescriptor::array_of(object())],
        )];

        let none = resolve(&methods, &[string()]).unwrap();
        assert!(none.is_varargs);
        assert_eq!(none.varargs_start, Some(1));
        assert_eq!(none.varargs_element(), Some(&object()));

        let several = resolve(
            &methods,
            &[string(), TypeDescriptor::int32(), string(), TypeDescriptor::Null],
        )
        .unwrap();
        assert!(several.is_varargs);
        assert_eq!(several.conversions.len(), 4);
        assert_eq!(several.call_arity(), 2);
    }

    #[test]
    fn every_trailing_argument_is_checked() {
        let methods = [make_varargs(
            "f",
            vec![TypeDescriptor::array_of(string())],
        )];
        assert!(resolve(&methods, &[string(), string()]).is_ok());
        assert!(matches!(
            resolve(&methods, &[string(), TypeDescriptor::int32()]),
            Err(CompilationError::NoMatchingMethod { .. })
        ));
    }

    #[test]
    fn trailing_array_parameter_acts_as_varargs() {
        let methods = [make_method(
            "f",
            vec![TypeDescriptor::array_of(TypeDescriptor::int32())],
        )];
        let m = resolve(&methods, &[TypeDescriptor::int32(), TypeDescriptor::int32()]).unwrap();
        assert!(m.is_varargs);
    }

    #[test]
    fn too_few_arguments_never_match() {
        let methods = [make_varargs(
            "f",
            vec![string(), string(), TypeDescriptor::array_of(object())],
        )];
        assert!(resolve(&methods, &[string()]).is_err());
    }

    #[test]
    fn overlapping_candidates_are_ambiguous() {
        let methods = [
            make_method("f", vec![object(), string()]),
            make_method("f", vec![string(), object()]),
        ];
        let err = resolve(&methods, &[string(), string()]).unwrap_err();
        match err {
            CompilationError::AmbiguousMethod { candidates, args, .. } => {
                assert_eq!(args, "String, String");
                assert!(candidates.contains("f(Object, String)"));
                assert!(candidates.contains("f(String, Object)"));
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }

        // Distinguishable by the argument types at the call site.
        assert!(resolve(&methods, &[object(), string()]).is_ok());
    }

    #[test]
    fn declaration_order_does_not_matter() {
        let a = make_method("f", vec![TypeDescriptor::int64()]);
        let b = make_method("f", vec![TypeDescriptor::Boxed(PrimitiveKind::Int32)]);
        let c = make_method("f", vec![string()]);
        let args = [TypeDescriptor::int64()];

        let forward = resolve(&[a.clone(), b.clone(), c.clone()], &args).unwrap();
        let backward = resolve(&[c.clone(), b.clone(), a.clone()], &args).unwrap();
        assert_eq!(forward.method.hash, backward.method.hash);

        let args = [TypeDescriptor::int32()];
        let forward = resolve(&[a.clone(), b.clone(), c.clone()], &args).unwrap_err();
        let backward = resolve(&[c, b, a], &args).unwrap_err();
        assert_eq!(forward, backward);
    }

    #[test]
    fn no_match_lists_candidates() {
        let methods = [make_method("f", vec![TypeDescriptor::int32()])];
        let err = resolve(&methods, &[string()]).unwrap_err();
        let CompilationError::NoMatchingMethod { candidates, .. } = err else {
            panic!("expected no match");
        };
        assert_eq!(candidates, "Util.f(int)");
    }
}
