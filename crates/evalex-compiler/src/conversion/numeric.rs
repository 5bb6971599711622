//! Numeric promotion.
//!
//! Binary numeric operators first unbox both operands, then widen the
//! narrower one to the wider kind of the lattice
//! `int < long < float < double`.

use evalex_core::{CompilationError, PrimitiveKind, Span, TypeDescriptor};

use crate::bytecode::OpCode;
use crate::emit::BytecodeEmitter;

/// The opcode widening `from` to `to`, or `None` when they are equal.
pub fn widening_op(from: PrimitiveKind, to: PrimitiveKind) -> Option<OpCode> {
    use PrimitiveKind::*;
    match (from, to) {
        (Int32, Int64) => Some(OpCode::I32toI64),
        (Int32, Float32) => Some(OpCode::I32toF32),
        (Int32, Float64) => Some(OpCode::I32toF64),
        (Int64, Float32) => Some(OpCode::I64toF32),
        (Int64, Float64) => Some(OpCode::I64toF64),
        (Float32, Float64) => Some(OpCode::F32toF64),
        _ => None,
    }
}

/// The kind both operands of a numeric operation are promoted to.
///
/// Both types must be (possibly boxed) numerics.
pub fn compute_numeric_operation_target_type(
    left: &TypeDescriptor,
    right: &TypeDescriptor,
    span: Span,
) -> Result<PrimitiveKind, CompilationError> {
    match (left.numeric_kind(), right.numeric_kind()) {
        (Some(a), Some(b)) => Ok(if a.widens_to(b) { b } else { a }),
        _ => Err(CompilationError::type_mismatch(
            format!("numeric operands required, found {left} and {right}"),
            span,
        )),
    }
}

/// Coerce a (possibly boxed) numeric on top of the stack to `target`.
pub fn emit_numeric_coercion(
    source: &TypeDescriptor,
    target: PrimitiveKind,
    emitter: &mut BytecodeEmitter,
) {
    if source.is_boxed() {
        emitter.emit(OpCode::Unbox);
    }
    if let Some(op) = source
        .numeric_kind()
        .and_then(|from| widening_op(from, target))
    {
        emitter.emit(op);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wider_operand_wins() {
        let span = Span::default();
        let int = TypeDescriptor::int32();
        let long = TypeDescriptor::int64();
        let double = TypeDescriptor::float64();
        assert_eq!(
            compute_numeric_operation_target_type(&int, &double, span),
            Ok(PrimitiveKind::Float64)
        );
        assert_eq!(
            compute_numeric_operation_target_type(&long, &int, span),
            Ok(PrimitiveKind::Int64)
        );
        assert_eq!(
            compute_numeric_operation_target_type(&int, &int, span),
            Ok(PrimitiveKind::Int32)
        );
    }

    #[test]
    fn boxed_operands_are_unboxed_first() {
        let boxed_long = TypeDescriptor::Boxed(PrimitiveKind::Int64);
        let float = TypeDescriptor::float32();
        assert_eq!(
            compute_numeric_operation_target_type(&boxed_long, &float, Span::default()),
            Ok(PrimitiveKind::Float32)
        );
    }

    #[test]
    fn non_numeric_operand_is_a_mismatch() {
        let err = compute_numeric_operation_target_type(
            &TypeDescriptor::boolean(),
            &TypeDescriptor::int32(),
            Span::new(1, 4, 1),
        )
        .unwrap_err();
        assert!(matches!(err, CompilationError::TypeMismatch { .. }));
        assert_eq!(err.span(), Span::new(1, 4, 1));
    }

    #[test]
    fn coercion_unboxes_then_widens() {
        let mut emitter = BytecodeEmitter::new();
        emit_numeric_coercion(
            &TypeDescriptor::Boxed(PrimitiveKind::Int32),
            PrimitiveKind::Float64,
            &mut emitter,
        );
        emit_numeric_coercion(&TypeDescriptor::int64(), PrimitiveKind::Int64, &mut emitter);
        emitter
            .chunk()
            .assert_opcodes(&[OpCode::Unbox, OpCode::I32toF64]);
    }
}
