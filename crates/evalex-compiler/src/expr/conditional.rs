//! Ternary and elvis operators.

use evalex_core::{CompilationError, Span, TypeDescriptor};

use super::{Plan, Resolved, Result, generate_as, resolve_value, resolved_type};
use crate::ast::ExpressionNode;
use crate::bytecode::OpCode;
use crate::context::CompilationContext;
use crate::emit::BytecodeEmitter;

/// The type both branches of a conditional convert to.
///
/// 1. Identical types
/// 2. Two numerics, at least one primitive: the wider primitive
/// 3. `null` and a reference: the reference; `null` and a primitive: its box
/// 4. One branch assignable to the other: the other
/// 5. Otherwise `Object`
fn common_type(
    a: &TypeDescriptor,
    b: &TypeDescriptor,
    ctx: &CompilationContext<'_>,
) -> TypeDescriptor {
    if a == b {
        return a.clone();
    }
    if let (Some(x), Some(y)) = (a.numeric_kind(), b.numeric_kind())
        && (a.is_primitive() || b.is_primitive())
    {
        return TypeDescriptor::Primitive(if x.widens_to(y) { y } else { x });
    }
    match (a, b) {
        (TypeDescriptor::Null, other) | (other, TypeDescriptor::Null) => other.boxed(),
        _ if ctx.is_assignable(b, a) => a.clone(),
        _ if ctx.is_assignable(a, b) => b.clone(),
        _ => TypeDescriptor::object(),
    }
}

pub(super) fn resolve_ternary(
    condition: &ExpressionNode,
    then_branch: &ExpressionNode,
    else_branch: &ExpressionNode,
    ctx: &CompilationContext<'_>,
    span: Span,
) -> Result<Resolved> {
    let condition_type = resolve_value(condition, ctx)?;
    if !condition_type.is_boolean() {
        return Err(CompilationError::type_mismatch(
            format!("condition must be boolean, found {condition_type}"),
            span,
        ));
    }
    let then_type = resolve_value(then_branch, ctx)?;
    let else_type = resolve_value(else_branch, ctx)?;
    Ok(Resolved::new(
        common_type(&then_type, &else_type, ctx),
        Plan::Direct,
    ))
}

/// Only the selected branch is evaluated.
pub(super) fn generate_ternary(
    condition: &ExpressionNode,
    then_branch: &ExpressionNode,
    else_branch: &ExpressionNode,
    result: &TypeDescriptor,
    ctx: &CompilationContext<'_>,
    emitter: &mut BytecodeEmitter,
) -> Result<()> {
    condition.generate_code(ctx, emitter)?;
    if resolved_type(condition)?.is_boxed() {
        emitter.emit(OpCode::Unbox);
    }

    let to_else = emitter.emit_jump(OpCode::JumpIfFalse);
    emitter.emit(OpCode::Pop);
    generate_as(then_branch, result, ctx, emitter)?;
    let to_end = emitter.emit_jump(OpCode::Jump);

    emitter.patch_jump(to_else)?;
    emitter.emit(OpCode::Pop);
    generate_as(else_branch, result, ctx, emitter)?;
    emitter.patch_jump(to_end)
}

pub(super) fn resolve_elvis(
    left: &ExpressionNode,
    right: &ExpressionNode,
    ctx: &CompilationContext<'_>,
    span: Span,
) -> Result<Resolved> {
    let left_type = resolve_value(left, ctx)?;
    if !left_type.is_reference() {
        return Err(CompilationError::type_mismatch(
            format!("left operand of '?:' must be a reference type, found {left_type}"),
            span,
        ));
    }
    let right_type = resolve_value(right, ctx)?;
    Ok(Resolved::new(
        common_type(&left_type, &right_type, ctx),
        Plan::Direct,
    ))
}

/// The right operand is evaluated only when the left one is null.
pub(super) fn generate_elvis(
    left: &ExpressionNode,
    right: &ExpressionNode,
    result: &TypeDescriptor,
    ctx: &CompilationContext<'_>,
    emitter: &mut BytecodeEmitter,
) -> Result<()> {
    left.generate_code(ctx, emitter)?;
    let present = emitter.emit_jump(OpCode::JumpIfNotNull);
    emitter.emit(OpCode::Pop);
    generate_as(right, result, ctx, emitter)?;
    let to_end = emitter.emit_jump(OpCode::Jump);

    emitter.patch_jump(present)?;
    let left_type = resolved_type(left)?;
    let conversion = ctx.find_conversion(left_type, result).ok_or_else(|| {
        CompilationError::internal(format!("no conversion from {left_type} to {result}"))
    })?;
    crate::conversion::emit_conversion(&conversion, emitter);
    emitter.patch_jump(to_end)
}
