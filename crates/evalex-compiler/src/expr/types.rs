//! Runtime type tests and regex matching.

use evalex_core::{CompilationError, Span, TypeDescriptor};
use regex::RegexBuilder;

use super::{Plan, Resolved, Result, resolve_value, unexpected_plan};
use crate::ast::ExpressionNode;
use crate::bytecode::OpCode;
use crate::context::CompilationContext;
use crate::emit::BytecodeEmitter;

pub(super) fn resolve_instance_of(
    operand: &ExpressionNode,
    type_name: &str,
    ctx: &CompilationContext<'_>,
    span: Span,
) -> Result<Resolved> {
    resolve_value(operand, ctx)?;
    let ty = ctx.lookup_type(type_name, span)?;
    if !ty.is_reference() || ty.is_null() {
        return Err(CompilationError::type_mismatch(
            format!("instanceof requires a reference type, found {ty}"),
            span,
        ));
    }
    Ok(Resolved::new(TypeDescriptor::boolean(), Plan::InstanceOf(ty)))
}

/// The operand is boxed (a no-op for the uniform value representation)
/// before the test; `null` is an instance of nothing.
pub(super) fn generate_instance_of(
    operand: &ExpressionNode,
    plan: &Plan,
    ctx: &CompilationContext<'_>,
    emitter: &mut BytecodeEmitter,
) -> Result<()> {
    let Plan::InstanceOf(ty) = plan else {
        return Err(unexpected_plan(plan));
    };
    operand.generate_code(ctx, emitter)?;
    emitter.emit_type_op(OpCode::InstanceOf, ty)
}

/// The pattern must match the whole operand.
pub(super) fn resolve_matches(
    operand: &ExpressionNode,
    pattern: &str,
    ctx: &CompilationContext<'_>,
    span: Span,
) -> Result<Resolved> {
    let ty = resolve_value(operand, ctx)?;
    if !ty.is_string_like() {
        return Err(CompilationError::type_mismatch(
            format!("matches requires a string operand, found {ty}"),
            span,
        ));
    }
    let regex = RegexBuilder::new(&format!("^(?:{pattern})$"))
        .size_limit(ctx.options().regex_size_limit)
        .build()
        .map_err(|err| {
            CompilationError::type_mismatch(
                format!("invalid regular expression '{pattern}': {err}"),
                span,
            )
        })?;
    Ok(Resolved::new(TypeDescriptor::boolean(), Plan::Matches(regex)))
}

pub(super) fn generate_matches(
    operand: &ExpressionNode,
    plan: &Plan,
    ctx: &CompilationContext<'_>,
    emitter: &mut BytecodeEmitter,
) -> Result<()> {
    let Plan::Matches(regex) = plan else {
        return Err(unexpected_plan(plan));
    };
    operand.generate_code(ctx, emitter)?;
    emitter.emit_matches(regex)
}
