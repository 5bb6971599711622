//! Member access: subscripts, properties and method calls.

use evalex_core::{CompilationError, PrimitiveKind, Span, TypeDescriptor, TypeHash, names};
use tracing::trace;

use super::{
    Plan, Resolved, Result, SubscriptKind, generate_arguments, resolve_arguments, resolve_value,
    resolved_type, unexpected_plan,
};
use crate::ast::ExpressionNode;
use crate::bytecode::OpCode;
use crate::context::CompilationContext;
use crate::conversion::{Conversion, emit_conversion};
use crate::emit::BytecodeEmitter;
use crate::overload::resolve_method;

// ============================================================================
// Subscript
// ============================================================================

/// `target[index]` on arrays, lists and string-keyed maps.
pub(super) fn resolve_subscript(
    target: &ExpressionNode,
    index: &ExpressionNode,
    ctx: &CompilationContext<'_>,
    span: Span,
) -> Result<Resolved> {
    let target_type = resolve_value(target, ctx)?;
    let index_type = resolve_value(index, ctx)?;
    let catalog = ctx.catalog();

    let require_int_index = || {
        if index_type.numeric_kind() == Some(PrimitiveKind::Int32) {
            Ok(())
        } else {
            Err(CompilationError::type_mismatch(
                format!("index of {target_type} must be int, found {index_type}"),
                span,
            ))
        }
    };

    if let Some(component) = target_type.component_type() {
        require_int_index()?;
        return Ok(Resolved::new(
            component.clone(),
            Plan::Subscript(SubscriptKind::Array),
        ));
    }

    let list = TypeDescriptor::declared(names::LIST);
    if catalog.is_subtype(&target_type, &list) {
        require_int_index()?;
        let element = type_argument(ctx, &target_type, names::LIST, 0);
        return Ok(Resolved::new(element, Plan::Subscript(SubscriptKind::List)));
    }

    let map = TypeDescriptor::declared(names::MAP);
    if catalog.is_subtype(&target_type, &map) {
        if !index_type.is_string_like() {
            return Err(CompilationError::type_mismatch(
                format!("key of {target_type} must be a string, found {index_type}"),
                span,
            ));
        }
        let value = type_argument(ctx, &target_type, names::MAP, 1);
        return Ok(Resolved::new(value, Plan::Subscript(SubscriptKind::Map)));
    }

    Err(CompilationError::type_mismatch(
        format!("cannot index into {target_type}"),
        span,
    ))
}

/// The `position`-th argument of `generic` in `ty`'s hierarchy; `Object` when raw.
fn type_argument(
    ctx: &CompilationContext<'_>,
    ty: &TypeDescriptor,
    generic: &str,
    position: usize,
) -> TypeDescriptor {
    ctx.catalog()
        .find_supertype(ty, TypeHash::from_name(generic))
        .and_then(|found| found.generic_argument(position).cloned())
        .unwrap_or_else(TypeDescriptor::object)
}

pub(super) fn generate_subscript(
    target: &ExpressionNode,
    index: &ExpressionNode,
    resolved: &Resolved,
    ctx: &CompilationContext<'_>,
    emitter: &mut BytecodeEmitter,
) -> Result<()> {
    let Plan::Subscript(kind) = &resolved.plan else {
        return Err(unexpected_plan(&resolved.plan));
    };
    target.generate_code(ctx, emitter)?;
    index.generate_code(ctx, emitter)?;
    if *kind != SubscriptKind::Map && resolved_type(index)?.is_boxed() {
        emitter.emit(OpCode::Unbox);
    }
    match kind {
        SubscriptKind::Array | SubscriptKind::List => emitter.emit(OpCode::Index),
        SubscriptKind::Map => emitter.emit(OpCode::MapGet),
    }
    // Collection elements are untyped at runtime.
    if *kind != SubscriptKind::Array && !resolved.ty.is_object() {
        emitter.emit_type_op(OpCode::CheckCast, &resolved.ty)?;
    }
    Ok(())
}

// ============================================================================
// Property Access
// ============================================================================

pub(super) fn resolve_property(
    receiver: &ExpressionNode,
    name: &str,
    null_safe: bool,
    ctx: &CompilationContext<'_>,
    span: Span,
) -> Result<Resolved> {
    let receiver_type = resolve_value(receiver, ctx)?;
    if receiver_type.is_array() && name == "length" {
        return Ok(Resolved::new(TypeDescriptor::int32(), Plan::ArrayLength));
    }

    let mut found = ctx.catalog().properties(&receiver_type.boxed(), name);
    let property = match found.len() {
        0 => {
            return Err(CompilationError::UnknownName {
                name: format!("{receiver_type}.{name}"),
                span,
            });
        }
        1 => found.remove(0),
        _ => {
            let candidates = found
                .iter()
                .map(|p| format!("{}.{}", p.getter.owner, p.getter.signature()))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(CompilationError::AmbiguousName {
                name: format!("{receiver_type}.{name}"),
                candidates,
                span,
            });
        }
    };

    trace!(property = name, getter = %property.getter.signature(), "resolved property");
    let ty = if null_safe {
        property.ty.boxed()
    } else {
        property.ty.clone()
    };
    Ok(Resolved::new(ty, Plan::Property(property)))
}

pub(super) fn generate_property(
    receiver: &ExpressionNode,
    null_safe: bool,
    plan: &Plan,
    ctx: &CompilationContext<'_>,
    emitter: &mut BytecodeEmitter,
) -> Result<()> {
    receiver.generate_code(ctx, emitter)?;
    match plan {
        Plan::ArrayLength => {
            let skip = null_safe.then(|| emitter.emit_jump(OpCode::JumpIfNull));
            emitter.emit(OpCode::ArrayLength);
            if let Some(skip) = skip {
                emitter.patch_jump(skip)?;
            }
            Ok(())
        }
        Plan::Property(property) => {
            let skip = null_safe.then(|| emitter.emit_jump(OpCode::JumpIfNull));
            emitter.emit_call_method(&property.getter, 0)?;
            if let Some(skip) = skip {
                emitter.patch_jump(skip)?;
            }
            Ok(())
        }
        other => Err(unexpected_plan(other)),
    }
}

// ============================================================================
// Method Calls
// ============================================================================

pub(super) fn resolve_method_call(
    receiver: &ExpressionNode,
    name: &str,
    args: &[ExpressionNode],
    null_safe: bool,
    ctx: &CompilationContext<'_>,
    span: Span,
) -> Result<Resolved> {
    let receiver_type = resolve_value(receiver, ctx)?;
    let arg_types = resolve_arguments(args, ctx, span)?;
    let catalog = ctx.catalog();
    let methods = catalog.methods(&receiver_type.boxed(), name);
    let candidate = resolve_method(name, &methods, &arg_types, catalog, span)?;

    let return_type = candidate.return_type();
    let ty = if null_safe {
        return_type.boxed()
    } else {
        return_type.clone()
    };
    Ok(Resolved::new(ty, Plan::Call(candidate)))
}

/// A static method reached through an instance drops the receiver.
pub(super) fn generate_method_call(
    receiver: &ExpressionNode,
    args: &[ExpressionNode],
    null_safe: bool,
    plan: &Plan,
    ctx: &CompilationContext<'_>,
    emitter: &mut BytecodeEmitter,
) -> Result<()> {
    let Plan::Call(candidate) = plan else {
        return Err(unexpected_plan(plan));
    };
    receiver.generate_code(ctx, emitter)?;
    let skip = null_safe.then(|| emitter.emit_jump(OpCode::JumpIfNull));

    let method = &candidate.method;
    if method.is_static() {
        emitter.emit(OpCode::Pop);
    }
    generate_arguments(args, candidate, ctx, emitter)?;
    if method.is_static() {
        emitter.emit_call_static(method, candidate.call_arity())?;
    } else {
        emitter.emit_call_method(method, candidate.call_arity())?;
    }

    if let Some(skip) = skip {
        emitter.patch_jump(skip)?;
    }
    Ok(())
}

/// `Type.method(args)`: only static methods are candidates.
pub(super) fn resolve_static_call(
    type_name: &str,
    name: &str,
    args: &[ExpressionNode],
    ctx: &CompilationContext<'_>,
    span: Span,
) -> Result<Resolved> {
    let owner = ctx.lookup_type(type_name, span)?;
    let arg_types = resolve_arguments(args, ctx, span)?;
    let catalog = ctx.catalog();
    let methods: Vec<_> = catalog
        .methods(&owner.boxed(), name)
        .into_iter()
        .filter(|m| m.is_static())
        .collect();
    let candidate = resolve_method(
        &format!("{type_name}.{name}"),
        &methods,
        &arg_types,
        catalog,
        span,
    )?;
    Ok(Resolved::new(
        candidate.return_type().clone(),
        Plan::Call(candidate),
    ))
}

pub(super) fn generate_static_call(
    args: &[ExpressionNode],
    plan: &Plan,
    ctx: &CompilationContext<'_>,
    emitter: &mut BytecodeEmitter,
) -> Result<()> {
    let Plan::Call(candidate) = plan else {
        return Err(unexpected_plan(plan));
    };
    generate_arguments(args, candidate, ctx, emitter)?;
    emitter.emit_call_static(&candidate.method, candidate.call_arity())
}

// ============================================================================
// Varargs Arrays
// ============================================================================

/// The array a varargs call collects its trailing arguments into.
///
/// Borrows the call's argument nodes; each item is converted to the array's
/// element type before the array is built.
pub(crate) struct ArrayConstruction<'a> {
    pub items: &'a [ExpressionNode],
    pub conversions: &'a [Conversion],
}

impl ArrayConstruction<'_> {
    pub(crate) fn generate(
        &self,
        ctx: &CompilationContext<'_>,
        emitter: &mut BytecodeEmitter,
    ) -> Result<()> {
        if self.items.len() != self.conversions.len() {
            return Err(CompilationError::internal(format!(
                "{} varargs items with {} conversions",
                self.items.len(),
                self.conversions.len()
            )));
        }
        for (item, conversion) in self.items.iter().zip(self.conversions) {
            item.generate_code(ctx, emitter)?;
            emit_conversion(conversion, emitter);
        }
        emitter.emit_new_array(self.items.len())
    }
}
