//! Equality and ordering.
//!
//! `==` / `!=` never fail on null: both operands are compared structurally
//! as boxed values. No numeric promotion happens, so `1 == 1L` is false.
//!
//! `<`, `<=`, `>`, `>=` compare numerics after promotion. Any other pair of
//! operands is ordered through `compareTo` of the operand whose
//! `Comparable<T>` target accepts the other operand. When only the right
//! operand qualifies, it becomes the receiver and the relation is inverted.

use evalex_core::{CompilationError, PrimitiveKind, Span, TypeDescriptor, TypeHash, names};
use tracing::trace;

use super::{Plan, Resolved, Result, resolve_value, resolved_type, unexpected_plan};
use crate::ast::{ExpressionNode, RelationalOp};
use crate::bytecode::OpCode;
use crate::context::CompilationContext;
use crate::conversion::{
    compute_numeric_operation_target_type, emit_conversion, emit_numeric_coercion,
};
use crate::emit::BytecodeEmitter;
use crate::overload::resolve_method;

// ============================================================================
// Equality
// ============================================================================

pub(super) fn resolve_equality(
    left: &ExpressionNode,
    right: &ExpressionNode,
    ctx: &CompilationContext<'_>,
) -> Result<Resolved> {
    resolve_value(left, ctx)?;
    resolve_value(right, ctx)?;
    Ok(Resolved::new(TypeDescriptor::boolean(), Plan::Direct))
}

/// Operands are compared as boxed values, so no promotion is emitted.
pub(super) fn generate_equality(
    negated: bool,
    left: &ExpressionNode,
    right: &ExpressionNode,
    ctx: &CompilationContext<'_>,
    emitter: &mut BytecodeEmitter,
) -> Result<()> {
    left.generate_code(ctx, emitter)?;
    right.generate_code(ctx, emitter)?;
    emitter.emit(OpCode::EqValue);
    if negated {
        emitter.emit(OpCode::Not);
    }
    Ok(())
}

// ============================================================================
// Ordering
// ============================================================================

pub(super) fn resolve_relational(
    op: RelationalOp,
    left: &ExpressionNode,
    right: &ExpressionNode,
    ctx: &CompilationContext<'_>,
    span: Span,
) -> Result<Resolved> {
    let left_type = resolve_value(left, ctx)?;
    let right_type = resolve_value(right, ctx)?;

    if left_type.is_numeric() && right_type.is_numeric() {
        let kind = compute_numeric_operation_target_type(&left_type, &right_type, span)?;
        return Ok(Resolved::new(TypeDescriptor::boolean(), Plan::Numeric(kind)));
    }

    let left_target = comparison_target(&left_type, &right_type, ctx);
    let right_target = comparison_target(&right_type, &left_type, ctx);
    let receiver_is_left = match (left_target, right_target) {
        (Some(a), Some(b)) if a == b => true,
        (Some(a), Some(b)) => {
            return Err(CompilationError::type_mismatch(
                format!(
                    "ordering of {left_type} and {right_type} is ambiguous: \
                     both compare as Comparable<{a}> and Comparable<{b}>"
                ),
                span,
            ));
        }
        (Some(_), None) => true,
        (None, Some(_)) => false,
        (None, None) => {
            return Err(CompilationError::type_mismatch(
                format!("operator '{op}' cannot be applied to {left_type} and {right_type}"),
                span,
            ));
        }
    };

    let (receiver, argument) = if receiver_is_left {
        (&left_type, &right_type)
    } else {
        (&right_type, &left_type)
    };
    let methods = ctx.catalog().methods(&receiver.boxed(), "compareTo");
    let candidate = resolve_method(
        "compareTo",
        &methods,
        std::slice::from_ref(argument),
        ctx.catalog(),
        span,
    )?;
    if candidate.return_type().numeric_kind() != Some(PrimitiveKind::Int32) || candidate.is_varargs
    {
        return Err(CompilationError::type_mismatch(
            format!(
                "{receiver}.{} cannot be used for ordering",
                candidate.method.signature()
            ),
            span,
        ));
    }
    trace!(%receiver, %argument, receiver_is_left, "comparable ordering");

    Ok(Resolved::new(
        TypeDescriptor::boolean(),
        Plan::Comparable {
            candidate,
            receiver_is_left,
        },
    ))
}

/// The `T` of `Comparable<T>` implemented by `ty`, if `other` is assignable to it.
///
/// A raw `Comparable` compares against `Object`.
fn comparison_target(
    ty: &TypeDescriptor,
    other: &TypeDescriptor,
    ctx: &CompilationContext<'_>,
) -> Option<TypeDescriptor> {
    let comparable = ctx
        .catalog()
        .find_supertype(&ty.boxed(), TypeHash::from_name(names::COMPARABLE))?;
    let target = comparable
        .generic_argument(0)
        .cloned()
        .unwrap_or_else(TypeDescriptor::object);
    ctx.is_assignable(other, &target).then_some(target)
}

pub(super) fn generate_relational(
    op: RelationalOp,
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
                emit_numeric_coercion(resolved_type(operand)?, *kind, emitter);
            }
            emitter.emit(relational_op(op, *kind)?);
        }
        Plan::Comparable {
            candidate,
            receiver_is_left,
        } => {
            left.generate_code(ctx, emitter)?;
            right.generate_code(ctx, emitter)?;
            if !receiver_is_left {
                emitter.emit(OpCode::Swap);
            }
            let conversion = candidate
                .conversions
                .first()
                .ok_or_else(|| CompilationError::internal("compareTo without argument"))?;
            emit_conversion(conversion, emitter);
            emitter.emit_call_method(&candidate.method, 1)?;

            let relation = if *receiver_is_left { op } else { op.invert() };
            emitter.emit(OpCode::PushZero);
            emitter.emit(relational_op(relation, PrimitiveKind::Int32)?);
        }
        other => return Err(unexpected_plan(other)),
    }
    Ok(())
}

fn relational_op(op: RelationalOp, kind: PrimitiveKind) -> Result<OpCode> {
    use PrimitiveKind::*;
    use RelationalOp::*;
    let code = match (op, kind) {
        (Lt, Int32) => OpCode::LtI32,
        (Le, Int32) => OpCode::LeI32,
        (Gt, Int32) => OpCode::GtI32,
        (Ge, Int32) => OpCode::GeI32,
        (Lt, Int64) => OpCode::LtI64,
        (Le, Int64) => OpCode::LeI64,
        (Gt, Int64) => OpCode::GtI64,
        (Ge, Int64) => OpCode::GeI64,
        (Lt, Float32) => OpCode::LtF32,
        (Le, Float32) => OpCode::LeF32,
        (Gt, Float32) => OpCode::GtF32,
        (Ge, Float32) => OpCode::GeF32,
        (Lt, Float64) => OpCode::LtF64,
        (Le, Float64) => OpCode::LeF64,
        (Gt, Float64) => OpCode::GtF64,
        (Ge, Float64) => OpCode::GeF64,
        (op, Bool) => {
            return Err(CompilationError::internal(format!(
                "no opcode for '{op}' on boolean"
            )));
        }
    };
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::tests::{Fixture, compile_ops};

    fn relation(op: RelationalOp, left: &str, right: ExpressionNode) -> ExpressionNode {
        ExpressionNode::relational(op, ExpressionNode::element(left), right)
    }

    #[test]
    fn numeric_comparison_promotes() {
        let fx = Fixture::new();
        let node = relation(RelationalOp::Lt, "count", ExpressionNode::int(3));
        compile_ops(&fx, &node).assert_contains_opcodes(&[
            OpCode::Constant,
            OpCode::I32toI64,
            OpCode::LtI64,
        ]);
    }

    #[test]
    fn boxed_numerics_compare_numerically() {
        let fx = Fixture::new();
        let node = relation(RelationalOp::Ge, "boxed", ExpressionNode::double(1.5));
        compile_ops(&fx, &node).assert_contains_opcodes(&[
            OpCode::Unbox,
            OpCode::I32toF64,
            OpCode::GeF64,
        ]);
    }

    #[test]
    fn strings_compare_through_compare_to() {
        let fx = Fixture::new();
        let node = relation(RelationalOp::Lt, "name", ExpressionNode::string("m"));
        compile_ops(&fx, &node).assert_contains_opcodes(&[
            OpCode::CallMethod,
            OpCode::PushZero,
            OpCode::LtI32,
        ]);
    }

    #[test]
    fn right_receiver_swaps_and_inverts() {
        let fx = Fixture::new();
        let left_receiver = relation(RelationalOp::Gt, "version", ExpressionNode::string("1.2"));
        compile_ops(&fx, &left_receiver).assert_contains_opcodes(&[
            OpCode::CallMethod,
            OpCode::GtI32,
        ]);

        let right_receiver = ExpressionNode::relational(
            RelationalOp::Lt,
            ExpressionNode::string("1.2"),
            ExpressionNode::element("version"),
        );
        let chunk = compile_ops(&fx, &right_receiver);
        chunk.assert_contains_opcodes(&[OpCode::Swap, OpCode::CallMethod, OpCode::GtI32]);
        assert!(!chunk.opcodes().contains(&OpCode::LtI32));
    }

    #[test]
    fn incomparable_operands() {
        let fx = Fixture::new();
        let node = relation(RelationalOp::Lt, "user", ExpressionNode::int(1));
        assert!(matches!(
            node.resolve_type(&fx.ctx()),
            Err(CompilationError::TypeMismatch { .. })
        ));

        let node = relation(RelationalOp::Lt, "name", ExpressionNode::int(1));
        assert!(node.resolve_type(&fx.ctx()).is_err());
    }

    #[test]
    fn equality_compares_without_promotion() {
        let fx = Fixture::new();
        let primitives = ExpressionNode::equals(ExpressionNode::int(1), ExpressionNode::long(1));
        compile_ops(&fx, &primitives).assert_opcodes(&[
            OpCode::PushOne,
            OpCode::Constant,
            OpCode::EqValue,
            OpCode::Return,
        ]);

        let boxed = ExpressionNode::not_equals(
            ExpressionNode::element("boxed"),
            ExpressionNode::null(),
        );
        let chunk = compile_ops(&fx, &boxed);
        assert!(!chunk.opcodes().contains(&OpCode::Unbox));
        chunk.assert_contains_opcodes(&[OpCode::EqValue, OpCode::Not]);
    }
}
