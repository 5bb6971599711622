//! Error types for compilation and evaluation.
//!
//! ## Error Hierarchy
//!
//! ```text
//! RegistrationError - raised while populating a type registry
//! CompilationError  - raised while resolving or generating code for an expression
//! RuntimeError      - raised while evaluating a compiled expression
//! ```
//!
//! Every compilation error aborts compilation of the whole expression. The
//! variants carry the offending name, operand types or candidate list so the
//! host can produce an actionable message.

use thiserror::Error;

use crate::Span;

// ============================================================================
// Registration Errors
// ============================================================================

/// Errors raised while registering host types and methods.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistrationError {
    /// A referenced type was not found.
    #[error("type not found: {0}")]
    TypeNotFound(String),

    /// A type with this name already exists.
    #[error("duplicate type: {0}")]
    DuplicateType(String),

    /// A method with the same signature already exists on the owner.
    #[error("duplicate method: {owner}.{signature}")]
    DuplicateMethod {
        /// The declaring type.
        owner: String,
        /// The duplicated signature.
        signature: String,
    },

    /// The declaration is invalid.
    #[error("invalid declaration: {0}")]
    InvalidDeclaration(String),
}

// ============================================================================
// Compilation Errors
// ============================================================================

/// Errors raised during type resolution or code generation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompilationError {
    /// A context-bound name matched no element.
    #[error("at {span}: unknown name '{name}'")]
    UnknownName {
        /// The name that wasn't found.
        name: String,
        /// Where the name was referenced.
        span: Span,
    },

    /// A context-bound name matched more than one element.
    #[error("at {span}: ambiguous name '{name}': could be {candidates}")]
    AmbiguousName {
        /// The ambiguous name.
        name: String,
        /// Description of the matching elements.
        candidates: String,
        /// Where the name was referenced.
        span: Span,
    },

    /// No declared method accepts the argument types at the call site.
    #[error("at {span}: no method '{name}' matches arguments ({args}); candidates: {candidates}")]
    NoMatchingMethod {
        /// The method name.
        name: String,
        /// The argument types, comma-separated.
        args: String,
        /// The declared candidates that were considered.
        candidates: String,
        /// Where the call occurred.
        span: Span,
    },

    /// More than one declared method accepts the argument types.
    #[error("at {span}: call to '{name}' with arguments ({args}) is ambiguous between {candidates}")]
    AmbiguousMethod {
        /// The method name.
        name: String,
        /// The argument types, comma-separated.
        args: String,
        /// The matching candidates.
        candidates: String,
        /// Where the call occurred.
        span: Span,
    },

    /// Operator, subscript or instanceof applied to incompatible types, or an
    /// invalid regular expression.
    #[error("at {span}: {message}")]
    TypeMismatch {
        /// Description of the mismatch.
        message: String,
        /// Where the mismatch occurred.
        span: Span,
    },

    /// `this` used where no receiver type is defined.
    #[error("at {span}: 'this' is not available in this context")]
    UnresolvedThis {
        /// Where `this` was referenced.
        span: Span,
    },

    /// A type reference could not be resolved against the type catalog.
    #[error("at {span}: unknown type '{name}'")]
    UnknownType {
        /// The type name that wasn't found.
        name: String,
        /// Where the type was referenced.
        span: Span,
    },

    /// An internal invariant was violated.
    #[error("internal compiler error: {message}")]
    Internal {
        /// Description of the broken invariant.
        message: String,
    },
}

impl CompilationError {
    /// Get the span where this error occurred.
    pub fn span(&self) -> Span {
        match self {
            CompilationError::UnknownName { span, .. } => *span,
            CompilationError::AmbiguousName { span, .. } => *span,
            CompilationError::NoMatchingMethod { span, .. } => *span,
            CompilationError::AmbiguousMethod { span, .. } => *span,
            CompilationError::TypeMismatch { span, .. } => *span,
            CompilationError::UnresolvedThis { span } => *span,
            CompilationError::UnknownType { span, .. } => *span,
            CompilationError::Internal { .. } => Span::default(),
        }
    }

    /// Shorthand for a [`CompilationError::TypeMismatch`].
    pub fn type_mismatch(message: impl Into<String>, span: Span) -> Self {
        CompilationError::TypeMismatch {
            message: message.into(),
            span,
        }
    }

    /// Shorthand for a [`CompilationError::Internal`].
    pub fn internal(message: impl Into<String>) -> Self {
        CompilationError::Internal {
            message: message.into(),
        }
    }
}

// ============================================================================
// Runtime Errors
// ============================================================================

/// Errors raised while evaluating a compiled expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    /// A method was invoked on, or a primitive was unboxed from, `null`.
    #[error("null value where {context} was required")]
    NullValue {
        /// What the null was used for.
        context: String,
    },

    /// A list or array index was out of range.
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: i64, len: usize },

    /// A value did not have the runtime type its static type promised.
    #[error("cannot cast value of type {found} to {expected}")]
    InvalidCast { expected: String, found: String },

    /// The evaluation context has no argument at the given index.
    #[error("no argument at index {index}")]
    MissingArgument { index: usize },

    /// The evaluation context could not supply a bean of the given type.
    #[error("no bean of type {type_name}")]
    NoSuchBean { type_name: String },

    /// The evaluation context has no `this` value.
    #[error("no 'this' value in the evaluation context")]
    MissingThis,

    /// Integer division or remainder by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// A native method implementation failed.
    #[error("call to '{method}' failed: {message}")]
    NativeCall { method: String, message: String },

    /// The bytecode is malformed (truncated operand, unknown opcode, stack underflow).
    #[error("invalid bytecode: {message}")]
    InvalidBytecode { message: String },
}

impl RuntimeError {
    /// Shorthand for a [`RuntimeError::NullValue`].
    pub fn null_value(context: impl Into<String>) -> Self {
        RuntimeError::NullValue {
            context: context.into(),
        }
    }

    /// Shorthand for a [`RuntimeError::InvalidBytecode`].
    pub fn invalid_bytecode(message: impl Into<String>) -> Self {
        RuntimeError::InvalidBytecode {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compilation_error_display() {
        let err = CompilationError::UnknownName {
            name: "foo".to_string(),
            span: Span::new(1, 5, 3),
        };
        assert_eq!(format!("{err}"), "at 1:5: unknown name 'foo'");
    }

    #[test]
    fn compilation_error_span() {
        let span = Span::new(2, 7, 1);
        assert_eq!(CompilationError::UnresolvedThis { span }.span(), span);
        assert_eq!(
            CompilationError::internal("broken").span(),
            Span::default()
        );
    }

    #[test]
    fn ambiguous_method_lists_candidates() {
        let err = CompilationError::AmbiguousMethod {
            name: "pick".to_string(),
            args: "String".to_string(),
            candidates: "pick(Object), pick(CharSequence)".to_string(),
            span: Span::new(1, 1, 4),
        };
        let message = err.to_string();
        assert!(message.contains("pick(Object)"));
        assert!(message.contains("pick(CharSequence)"));
    }

    #[test]
    fn runtime_error_display() {
        let err = RuntimeError::IndexOutOfBounds { index: 5, len: 3 };
        assert_eq!(err.to_string(), "index 5 out of bounds for length 3");
        assert_eq!(
            RuntimeError::null_value("method receiver").to_string(),
            "null value where method receiver was required"
        );
    }
}
