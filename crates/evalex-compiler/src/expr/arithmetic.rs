//! Arithmetic operators and string concatenation.
//!
//! `+` concatenates when either operand is string-like. Chains of
//! concatenations are flattened into a single `Concat` over all operands,
//! so `a + b + c` builds one string instead of two intermediate ones.
//! Otherwise both operands are promoted to their common numeric kind; `^`
//! always computes in `long` (integral operands) or `double`.

use evalex_core::{CompilationError, PrimitiveKind, Span, TypeDescriptor};

use super::{Plan, Resolved, Result, resolve_value, unexpected_plan};
use crate::ast::{ArithmeticOp, ExpressionNode, NodeKind};
use crate::bytecode::OpCode;
use crate::context::CompilationContext;
use crate::conversion::{compute_numeric_operation_target_type, emit_numeric_coercion};
use crate::emit::BytecodeEmitter;

pub(super) fn resolve_arithmetic(
    op: ArithmeticOp,
    left: &ExpressionNode,
    right: &ExpressionNode,
    ctx: &CompilationContext<'_>,
    span: Span,
) -> Result<Resolved> {
    let left_type = resolve_value(left, ctx)?;
    let right_type = resolve_value(right, ctx)?;

    if op == ArithmeticOp::Add && (left_type.is_string_like() || right_type.is_string_like()) {
        return Ok(Resolved::new(TypeDescriptor::string(), Plan::Concat));
    }

    let kind = compute_numeric_operation_target_type(&left_type, &right_type, span).map_err(
        |_| {
            CompilationError::type_mismatch(
                format!("operator '{op}' cannot be applied to {left_type} and {right_type}"),
                span,
            )
        },
    )?;
    let kind = match op {
        ArithmeticOp::Pow if kind.is_integral() => PrimitiveKind::Int64,
        ArithmeticOp::Pow => PrimitiveKind::Float64,
        _ => kind,
    };
    Ok(Resolved::new(
        TypeDescriptor::Primitive(kind),
        Plan::Numeric(kind),
    ))
}

pub(super) fn generate_arithmetic(
    node: &ExpressionNode,
    op: ArithmeticOp,
    left: &ExpressionNode,
    right: &ExpressionNode,
    plan: &Plan,
    ctx: &CompilationContext<'_>,
    emitter: &mut BytecodeEmitter,
) -> Result<()> {
    match plan {
        Plan::Numeric(kind) => {
            for operand in [left, right] {
                operand.generate_code(ctx, emitter)?;
                emit_numeric_coercion(super::resolved_type(operand)?, *kind, emitter);
            }
            emitter.emit(arithmetic_op(op, *kind)?);
            Ok(())
        }
        Plan::Concat => {
            let mut operands = Vec::new();
            collect_concat_operands(node, &mut operands);
            for operand in &operands {
                operand.generate_code(ctx, emitter)?;
            }
            emitter.emit_concat(operands.len())
        }
        other => Err(unexpected_plan(other)),
    }
}

/// Flatten nested concatenations into their operands, left to right.
///
/// Only subtrees that themselves resolved to concatenation are flattened;
/// `1 + 2 + "x"` keeps `1 + 2` as a numeric operand.
fn collect_concat_operands<'a>(node: &'a ExpressionNode, out: &mut Vec<&'a ExpressionNode>) {
    let is_concat = node
        .resolution()
        .is_some_and(|r| matches!(r.plan, Plan::Concat));
    match node.kind() {
        NodeKind::Arithmetic {
            op: ArithmeticOp::Add,
            left,
            right,
        } if is_concat => {
            collect_concat_operands(left, out);
            collect_concat_operands(right, out);
        }
        _ => out.push(node),
    }
}

fn arithmetic_op(op: ArithmeticOp, kind: PrimitiveKind) -> Result<OpCode> {
    use ArithmeticOp::*;
    use PrimitiveKind::*;
    let code = match (op, kind) {
        (Add, Int32) => OpCode::AddI32,
        (Sub, Int32) => OpCode::SubI32,
        (Mul, Int32) => OpCode::MulI32,
        (Div, Int32) => OpCode::DivI32,
        (Mod, Int32) => OpCode::ModI32,
        (Add, Int64) => OpCode::AddI64,
        (Sub, Int64) => OpCode::SubI64,
        (Mul, Int64) => OpCode::MulI64,
        (Div, Int64) => OpCode::DivI64,
        (Mod, Int64) => OpCode::ModI64,
        (Pow, Int64) => OpCode::PowI64,
        (Add, Float32) => OpCode::AddF32,
        (Sub, Float32) => OpCode::SubF32,
        (Mul, Float32) => OpCode::MulF32,
        (Div, Float32) => OpCode::DivF32,
        (Mod, Float32) => OpCode::ModF32,
        (Add, Float64) => OpCode::AddF64,
        (Sub, Float64) => OpCode::SubF64,
        (Mul, Float64) => OpCode::MulF64,
        (Div, Float64) => OpCode::DivF64,
        (Mod, Float64) => OpCode::ModF64,
        (Pow, Float64) => OpCode::PowF64,
        (op, kind) => {
            return Err(CompilationError::internal(format!(
                "no opcode for '{op}' on {}",
                kind.name()
            )));
        }
    };
    Ok(code)
}

pub(super) fn resolve_negate(
    operand: &ExpressionNode,
    ctx: &CompilationContext<'_>,
    span: Span,
) -> Result<Resolved> {
    let ty = resolve_value(operand, ctx)?;
    let kind = ty.numeric_kind().ok_or_else(|| {
        CompilationError::type_mismatch(format!("unary '-' cannot be applied to {ty}"), span)
    })?;
    Ok(Resolved::new(
        TypeDescriptor::Primitive(kind),
        Plan::Numeric(kind),
    ))
}

pub(super) fn generate_negate(
    operand: &ExpressionNode,
    plan: &Plan,
    ctx: &CompilationContext<'_>,
    emitter: &mut BytecodeEmitter,
) -> Result<()> {
    let Plan::Numeric(kind) = plan else {
        return Err(unexpected_plan(plan));
    };
    operand.generate_code(ctx, emitter)?;
    emit_numeric_coercion(super::resolved_type(operand)?, *kind, emitter);
    emitter.emit(match kind {
        PrimitiveKind::Int32 => OpCode::NegI32,
        PrimitiveKind::Int64 => OpCode::NegI64,
        PrimitiveKind::Float32 => OpCode::NegF32,
        PrimitiveKind::Float64 => OpCode::NegF64,
        PrimitiveKind::Bool => return Err(unexpected_plan(plan)),
    });
    Ok(())
}
