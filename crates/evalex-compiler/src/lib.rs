//! Type resolution and bytecode generation for evalex expression trees.
//!
//! An [`ExpressionNode`] tree is compiled in two passes over a
//! [`CompilationContext`]:
//!
//! 1. **Resolution** assigns every node its static type, selects methods and
//!    conversions, and caches the outcome on the node
//!    ([`ExpressionNode::resolve_type`]).
//! 2. **Code generation** walks the resolved tree and emits stack bytecode
//!    ([`ExpressionNode::generate_code`]).
//!
//! [`compile`] runs both and packages the result as a [`CompiledExpression`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use evalex_compiler::ast::ExpressionNode;
//! use evalex_compiler::{CompilationContext, DeclaredContext, compile};
//! use evalex_core::TypeDescriptor;
//! use evalex_registry::TypeRegistry;
//!
//! let facade = DeclaredContext::new()
//!     .parameter("a", TypeDescriptor::int32())
//!     .parameter("b", TypeDescriptor::int64());
//! let ctx = CompilationContext::new(Arc::new(TypeRegistry::with_builtins()), &facade);
//!
//! let sum = ExpressionNode::arithmetic(
//!     evalex_compiler::ast::ArithmeticOp::Add,
//!     ExpressionNode::element("a"),
//!     ExpressionNode::element("b"),
//! );
//! let compiled = compile(&sum, &ctx).unwrap();
//! assert_eq!(compiled.result_type(), &TypeDescriptor::int64());
//! ```

pub mod artifact;
pub mod ast;
pub mod bytecode;
pub mod context;
pub mod conversion;
pub mod emit;
mod expr;
pub mod options;
pub mod overload;

pub use artifact::CompiledExpression;
pub use context::{CompilationContext, ContextFacade, DeclaredContext, TypedElement};
pub use options::CompilerOptions;

use evalex_core::CompilationError;
use tracing::{debug, trace};

use crate::ast::ExpressionNode;
use crate::bytecode::OpCode;
use crate::emit::BytecodeEmitter;

/// Resolve and compile `root` into an executable artifact.
///
/// Nodes already resolved against the same context keep their cached
/// outcome. Any error aborts the whole compilation.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn compile(
    root: &ExpressionNode,
    ctx: &CompilationContext<'_>,
) -> Result<CompiledExpression, CompilationError> {
    debug!(expression = %root, "compiling expression");

    let result_type = root.resolve_type(ctx)?;
    let mut emitter = BytecodeEmitter::new();
    emitter.set_line(root.span().line);
    root.generate_code(ctx, &mut emitter)?;
    emitter.emit(OpCode::Return);
    let code = emitter.finish();

    trace!(disassembly = %code.chunk.disassemble(), "emitted bytecode");
    debug!(
        result = %result_type,
        bytes = code.chunk.len(),
        constants = code.constants.len(),
        "compiled expression"
    );
    Ok(CompiledExpression::new(
        code,
        result_type,
        ctx.catalog_handle().clone(),
    ))
}
