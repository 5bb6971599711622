//! Typed expressions compiled to bytecode and evaluated against a host context.
//!
//! The crate ties the workspace together:
//!
//! - [`evalex_compiler`] resolves an [`ExpressionNode`] tree against a
//!   [`TypeCatalog`](evalex_core::TypeCatalog) and a [`ContextFacade`] and
//!   emits a [`CompiledExpression`].
//! - [`Expression`] owns that artifact and evaluates it with the stack VM
//!   against any [`EvaluationContext`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use evalex::{CompilationContext, DeclaredContext, Expression, SimpleContext};
//! use evalex::ast::{ArithmeticOp, ExpressionNode};
//! use evalex_core::{TypeDescriptor, Value};
//! use evalex_registry::TypeRegistry;
//!
//! let facade = DeclaredContext::new()
//!     .parameter("a", TypeDescriptor::int32())
//!     .parameter("b", TypeDescriptor::int32());
//! let ctx = CompilationContext::new(Arc::new(TypeRegistry::with_builtins()), &facade);
//!
//! let sum = ExpressionNode::arithmetic(
//!     ArithmeticOp::Add,
//!     ExpressionNode::element("a"),
//!     ExpressionNode::element("b"),
//! );
//! let expression = Expression::compile(&sum, &ctx).unwrap();
//!
//! let context = SimpleContext::new().with_argument(3).with_argument(4);
//! assert_eq!(expression.evaluate(&context).unwrap(), Value::Int(7));
//! ```

mod context;
mod error;
mod vm;

pub use context::{EvaluationContext, SimpleContext};
pub use error::{Error, Result};
pub use evalex_compiler::ast;
pub use evalex_compiler::{
    CompilationContext, CompiledExpression, CompilerOptions, ContextFacade, DeclaredContext,
    TypedElement,
};

use evalex_core::{RuntimeError, TypeDescriptor, Value};
use tracing::debug;

/// A compiled expression, ready for repeated evaluation.
///
/// Cheap to clone and safe to share between threads.
#[derive(Debug, Clone)]
pub struct Expression {
    compiled: CompiledExpression,
}

impl Expression {
    /// Resolve and compile `root` against `ctx`.
    pub fn compile(root: &ast::ExpressionNode, ctx: &CompilationContext<'_>) -> Result<Self> {
        let compiled = evalex_compiler::compile(root, ctx)?;
        Ok(Self { compiled })
    }

    /// Evaluate against one host context.
    ///
    /// The context is only borrowed for the duration of the call.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn evaluate(&self, context: &dyn EvaluationContext) -> std::result::Result<Value, RuntimeError> {
        debug!(result = %self.compiled.result_type(), "evaluating expression");
        vm::Vm::new(&self.compiled, context).run()
    }

    /// Static type of the values [`Self::evaluate`] produces.
    pub fn result_type(&self) -> &TypeDescriptor {
        self.compiled.result_type()
    }

    pub fn compiled(&self) -> &CompiledExpression {
        &self.compiled
    }
}

impl From<CompiledExpression> for Expression {
    fn from(compiled: CompiledExpression) -> Self {
        Self { compiled }
    }
}
