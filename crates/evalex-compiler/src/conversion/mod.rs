//! Type conversion system.
//!
//! Determines whether a value of one static type can be used where another
//! is expected, and what (if any) code has to run to make it so. This drives
//! argument checking in overload resolution, operand coercion in operators
//! and the common type of conditional branches.
//!
//! ## Conversion Priority
//!
//! Conversions are checked in this order:
//! 1. Identity (exact match)
//! 2. Null to any reference type
//! 3. Primitive widening (`int < long < float < double`)
//! 4. Boxing (primitive to its box or a supertype of the box)
//! 5. Unboxing, optionally followed by widening
//! 6. Reference upcast (subtype to supertype)
//!
//! Narrowing is never implicit.

mod numeric;

pub use numeric::{
    compute_numeric_operation_target_type, emit_numeric_coercion, widening_op,
};

use evalex_core::{PrimitiveKind, TypeCatalog, TypeDescriptor};
use tracing::trace;

use crate::bytecode::OpCode;
use crate::emit::BytecodeEmitter;

/// A type conversion with its cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conversion {
    /// The kind of conversion being performed.
    pub kind: ConversionKind,
    /// The cost of this conversion (lower is better).
    pub cost: u32,
}

/// The kind of conversion being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionKind {
    /// No conversion needed (exact match).
    Identity,
    /// The null literal into a reference slot.
    NullToReference,
    /// Subtype to supertype.
    ReferenceUpcast,
    /// Primitive into its box (or a supertype of the box).
    Boxing(PrimitiveKind),
    /// Box into its primitive.
    Unboxing(PrimitiveKind),
    /// Narrower primitive into a wider one.
    Widening {
        from: PrimitiveKind,
        to: PrimitiveKind,
    },
    /// Box into a primitive wider than its own.
    UnboxAndWiden {
        from: PrimitiveKind,
        to: PrimitiveKind,
    },
}

impl Conversion {
    /// Cost for exact match (identity conversion).
    pub const COST_EXACT: u32 = 0;
    /// Cost for null into a reference slot.
    pub const COST_NULL_TO_REFERENCE: u32 = 1;
    /// Cost for a reference upcast.
    pub const COST_REFERENCE_UPCAST: u32 = 2;
    /// Cost for boxing or unboxing.
    pub const COST_BOXING: u32 = 3;
    /// Cost for primitive widening.
    pub const COST_PRIMITIVE_WIDENING: u32 = 4;
    /// Cost for unboxing followed by widening.
    pub const COST_UNBOX_AND_WIDEN: u32 = 5;

    pub(crate) fn identity() -> Self {
        Self::new(ConversionKind::Identity, Self::COST_EXACT)
    }

    fn new(kind: ConversionKind, cost: u32) -> Self {
        Self { kind, cost }
    }

    /// Check if this is an exact match (no conversion).
    pub fn is_exact(&self) -> bool {
        matches!(self.kind, ConversionKind::Identity)
    }

    /// Whether applying this conversion emits any instructions.
    pub fn needs_code(&self) -> bool {
        matches!(
            self.kind,
            ConversionKind::Unboxing(_)
                | ConversionKind::Widening { .. }
                | ConversionKind::UnboxAndWiden { .. }
        )
    }
}

/// Find the implicit conversion from `source` to `target`, if any.
pub fn find_conversion(
    source: &TypeDescriptor,
    target: &TypeDescriptor,
    catalog: &dyn TypeCatalog,
) -> Option<Conversion> {
    use TypeDescriptor as T;

    if source == target {
        return Some(Conversion::identity());
    }

    match (source, target) {
        (T::Void, _) | (_, T::Void) => None,
        (T::Null, target) => target.is_reference().then(|| {
            Conversion::new(
                ConversionKind::NullToReference,
                Conversion::COST_NULL_TO_REFERENCE,
            )
        }),
        (T::Primitive(from), T::Primitive(to)) => (from.is_numeric() && from.widens_to(*to))
            .then(|| {
                Conversion::new(
                    ConversionKind::Widening {
                        from: *from,
                        to: *to,
                    },
                    Conversion::COST_PRIMITIVE_WIDENING,
                )
            }),
        (T::Primitive(kind), target) => {
            let boxed = T::Boxed(*kind);
            (boxed == *target || catalog.is_subtype(&boxed, target))
                .then(|| Conversion::new(ConversionKind::Boxing(*kind), Conversion::COST_BOXING))
        }
        (T::Boxed(from), T::Primitive(to)) if from == to => Some(Conversion::new(
            ConversionKind::Unboxing(*from),
            Conversion::COST_BOXING,
        )),
        (T::Boxed(from), T::Primitive(to)) => (from.is_numeric() && from.widens_to(*to)).then(|| {
            Conversion::new(
                ConversionKind::UnboxAndWiden {
                    from: *from,
                    to: *to,
                },
                Conversion::COST_UNBOX_AND_WIDEN,
            )
        }),
        (_, T::Primitive(_)) => None,
        (source, target) => catalog.is_subtype(source, target).then(|| {
            Conversion::new(
                ConversionKind::ReferenceUpcast,
                Conversion::COST_REFERENCE_UPCAST,
            )
        }),
    }
}

/// Whether a value of `source` can be used where `target` is expected.
pub fn is_assignable(
    source: &TypeDescriptor,
    target: &TypeDescriptor,
    catalog: &dyn TypeCatalog,
) -> bool {
    find_conversion(source, target, catalog).is_some()
}

/// Emit the instructions realizing `conversion` on the top of stack.
///
/// Boxing and reference conversions are representation-preserving and emit
/// nothing.
pub fn emit_conversion(conversion: &Conversion, emitter: &mut BytecodeEmitter) {
    match conversion.kind {
        ConversionKind::Unboxing(_) => emitter.emit(OpCode::Unbox),
        ConversionKind::Widening { from, to } => {
            if let Some(op) = widening_op(from, to) {
                emitter.emit(op);
            }
        }
        ConversionKind::UnboxAndWiden { from, to } => {
            emitter.emit(OpCode::Unbox);
            if let Some(op) = widening_op(from, to) {
                emitter.emit(op);
            }
        }
        ConversionKind::Identity
        | ConversionKind::NullToReference
        | ConversionKind::ReferenceUpcast
        | ConversionKind::Boxing(_) => {}
    }
    if conversion.needs_code() {
        trace!(kind = ?conversion.kind, "emitted conversion");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evalex_registry::TypeRegistry;

    fn convert(source: &TypeDescriptor, target: &TypeDescriptor) -> Option<ConversionKind> {
        let registry = TypeRegistry::with_builtins();
        find_conversion(source, target, &registry).map(|c| c.kind)
    }

    #[test]
    fn identity_and_null() {
        let string = TypeDescriptor::string();
        assert_eq!(convert(&string, &string), Some(ConversionKind::Identity));
        assert_eq!(
            convert(&TypeDescriptor::Null, &string),
            Some(ConversionKind::NullToReference)
        );
        assert_eq!(convert(&TypeDescriptor::Null, &TypeDescriptor::int32()), None);
    }

    #[test]
    fn primitives_widen_but_never_narrow() {
        let int = TypeDescriptor::int32();
        let double = TypeDescriptor::float64();
        assert_eq!(
            convert(&int, &double),
            Some(ConversionKind::Widening {
                from: PrimitiveKind::Int32,
                to: PrimitiveKind::Float64,
            })
        );
        assert_eq!(convert(&double, &int), None);
        assert_eq!(convert(&TypeDescriptor::boolean(), &int), None);
    }

    #[test]
    fn boxing_targets_box_and_its_supertypes() {
        let int = TypeDescriptor::int32();
        assert_eq!(
            convert(&int, &TypeDescriptor::Boxed(PrimitiveKind::Int32)),
            Some(ConversionKind::Boxing(PrimitiveKind::Int32))
        );
        assert_eq!(
            convert(&int, &TypeDescriptor::declared("Number")),
            Some(ConversionKind::Boxing(PrimitiveKind::Int32))
        );
        assert_eq!(
            convert(&int, &TypeDescriptor::object()),
            Some(ConversionKind::Boxing(PrimitiveKind::Int32))
        );
        // int boxes to Integer, which is not a Long.
        assert_eq!(convert(&int, &TypeDescriptor::Boxed(PrimitiveKind::Int64)), None);
        assert_eq!(convert(&int, &TypeDescriptor::string()), None);
    }

    #[test]
    fn unboxing_with_optional_widening() {
        let boxed = TypeDescriptor::Boxed(PrimitiveKind::Int32);
        assert_eq!(
            convert(&boxed, &TypeDescriptor::int32()),
            Some(ConversionKind::Unboxing(PrimitiveKind::Int32))
        );
        assert_eq!(
            convert(&boxed, &TypeDescriptor::int64()),
            Some(ConversionKind::UnboxAndWiden {
                from: PrimitiveKind::Int32,
                to: PrimitiveKind::Int64,
            })
        );
        assert_eq!(convert(&TypeDescriptor::object(), &TypeDescriptor::int32()), None);
    }

    #[test]
    fn reference_upcasts_follow_the_catalog() {
        let string = TypeDescriptor::string();
        assert_eq!(
            convert(&string, &TypeDescriptor::declared("CharSequence")),
            Some(ConversionKind::ReferenceUpcast)
        );
        assert_eq!(
            convert(&string, &TypeDescriptor::object()),
            Some(ConversionKind::ReferenceUpcast)
        );
        assert_eq!(convert(&TypeDescriptor::object(), &string), None);
    }

    #[test]
    fn emitted_code_for_conversions() {
        let registry = TypeRegistry::with_builtins();
        let conversion = find_conversion(
            &TypeDescriptor::Boxed(PrimitiveKind::Int32),
            &TypeDescriptor::float64(),
            &registry,
        )
        .unwrap();
        let mut emitter = BytecodeEmitter::new();
        emit_conversion(&conversion, &mut emitter);
        emitter
            .chunk()
            .assert_opcodes(&[OpCode::Unbox, OpCode::I32toF64]);

        let upcast = find_conversion(
            &TypeDescriptor::string(),
            &TypeDescriptor::object(),
            &registry,
        )
        .unwrap();
        let mut emitter = BytecodeEmitter::new();
        emit_conversion(&upcast, &mut emitter);
        assert!(emitter.chunk().is_empty());
    }
}
