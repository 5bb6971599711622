//! Logical operators and the `empty` test.
//!
//! `&&` and `||` short-circuit. A chain of the same operator, such as
//! `a && b && c`, is emitted as one flat sequence of conditional jumps to a
//! shared end label rather than as nested branches.

use evalex_core::{CompilationError, Span, TypeDescriptor};

use super::{Plan, Resolved, Result, resolve_value, resolved_type};
use crate::ast::{ExpressionNode, LogicalOp, NodeKind};
use crate::bytecode::OpCode;
use crate::context::CompilationContext;
use crate::emit::BytecodeEmitter;

fn expect_boolean(
    operand: &ExpressionNode,
    ctx: &CompilationContext<'_>,
    what: &str,
    span: Span,
) -> Result<()> {
    let ty = resolve_value(operand, ctx)?;
    if !ty.is_boolean() {
        return Err(CompilationError::type_mismatch(
            format!("operand of '{what}' must be boolean, found {ty}"),
            span,
        ));
    }
    Ok(())
}

/// Push a boolean operand as a primitive.
fn generate_condition(
    operand: &ExpressionNode,
    ctx: &CompilationContext<'_>,
    emitter: &mut BytecodeEmitter,
) -> Result<()> {
    operand.generate_code(ctx, emitter)?;
    if resolved_type(operand)?.is_boxed() {
        emitter.emit(OpCode::Unbox);
    }
    Ok(())
}

pub(super) fn resolve_logical(
    left: &ExpressionNode,
    right: &ExpressionNode,
    ctx: &CompilationContext<'_>,
    span: Span,
) -> Result<Resolved> {
    expect_boolean(left, ctx, "&&/||", span)?;
    expect_boolean(right, ctx, "&&/||", span)?;
    Ok(Resolved::new(TypeDescriptor::boolean(), Plan::Direct))
}

pub(super) fn generate_logical(
    node: &ExpressionNode,
    op: LogicalOp,
    ctx: &CompilationContext<'_>,
    emitter: &mut BytecodeEmitter,
) -> Result<()> {
    let mut operands = Vec::new();
    collect_chain(node, op, &mut operands);

    let exit = match op {
        LogicalOp::And => OpCode::JumpIfFalse,
        LogicalOp::Or => OpCode::JumpIfTrue,
    };
    let mut labels = Vec::with_capacity(operands.len());
    let (last, init) = operands
        .split_last()
        .ok_or_else(|| CompilationError::internal("empty logical chain"))?;
    for operand in init {
        generate_condition(operand, ctx, emitter)?;
        labels.push(emitter.emit_jump(exit));
        emitter.emit(OpCode::Pop);
    }
    generate_condition(last, ctx, emitter)?;
    for label in labels {
        emitter.patch_jump(label)?;
    }
    Ok(())
}

/// Operands of a chain of `op`, left to right.
fn collect_chain<'a>(node: &'a ExpressionNode, op: LogicalOp, out: &mut Vec<&'a ExpressionNode>) {
    match node.kind() {
        NodeKind::Logical {
            op: inner,
            left,
            right,
        } if *inner == op => {
            collect_chain(left, op, out);
            collect_chain(right, op, out);
        }
        _ => out.push(node),
    }
}

pub(super) fn resolve_not(
    operand: &ExpressionNode,
    ctx: &CompilationContext<'_>,
    span: Span,
) -> Result<Resolved> {
    expect_boolean(operand, ctx, "!", span)?;
    Ok(Resolved::new(TypeDescriptor::boolean(), Plan::Direct))
}

pub(super) fn generate_not(
    operand: &ExpressionNode,
    ctx: &CompilationContext<'_>,
    emitter: &mut BytecodeEmitter,
) -> Result<()> {
    generate_condition(operand, ctx, emitter)?;
    emitter.emit(OpCode::Not);
    Ok(())
}

pub(super) fn resolve_empty(
    operand: &ExpressionNode,
    ctx: &CompilationContext<'_>,
    _span: Span,
) -> Result<Resolved> {
    resolve_value(operand, ctx)?;
    Ok(Resolved::new(TypeDescriptor::boolean(), Plan::Direct))
}

pub(super) fn generate_empty(
    operand: &ExpressionNode,
    ctx: &CompilationContext<'_>,
    emitter: &mut BytecodeEmitter,
) -> Result<()> {
    operand.generate_code(ctx, emitter)?;
    emitter.emit(OpCode::IsEmpty);
    Ok(())
}
