//! Names bound by the evaluation context.
//!
//! Bare identifiers, receiver-less calls, `this`, bean references and
//! environment properties all resolve against the [`ContextFacade`] or the
//! type catalog; at runtime they read from the evaluation context.
//!
//! [`ContextFacade`]: crate::ContextFacade

use evalex_core::{CompilationError, MethodDef, Span, TypeDescriptor};

use super::{
    ElementPlan, Plan, Resolved, Result, generate_arguments, resolve_arguments, resolve_value,
    unexpected_plan,
};
use crate::ast::ExpressionNode;
use crate::bytecode::OpCode;
use crate::context::{CompilationContext, TypedElement};
use crate::emit::BytecodeEmitter;
use crate::overload::{CandidateMethod, resolve_method};

pub(super) fn resolve_element(
    name: &str,
    ctx: &CompilationContext<'_>,
    span: Span,
) -> Result<Resolved> {
    let mut elements = ctx.facade().lookup_named_elements(name);
    let element = match elements.len() {
        0 => {
            return Err(CompilationError::UnknownName {
                name: name.to_string(),
                span,
            });
        }
        1 => elements.remove(0),
        _ => {
            let candidates = elements
                .iter()
                .map(TypedElement::description)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(CompilationError::AmbiguousName {
                name: name.to_string(),
                candidates,
                span,
            });
        }
    };

    let resolved = match element {
        TypedElement::Parameter { index, ty, .. } => {
            Resolved::new(ty, Plan::Element(ElementPlan::Parameter { index }))
        }
        TypedElement::Property { owner, property } => Resolved::new(
            property.ty.clone(),
            Plan::Element(ElementPlan::Property { owner, property }),
        ),
        TypedElement::Method(method) => {
            let candidate = resolve_method(name, &[method], &[], ctx.catalog(), span)?;
            Resolved::new(
                candidate.return_type().clone(),
                Plan::Element(ElementPlan::Method(candidate)),
            )
        }
    };
    Ok(resolved)
}

pub(super) fn generate_element(
    resolved: &Resolved,
    ctx: &CompilationContext<'_>,
    emitter: &mut BytecodeEmitter,
) -> Result<()> {
    let Plan::Element(element) = &resolved.plan else {
        return Err(unexpected_plan(&resolved.plan));
    };
    match element {
        ElementPlan::Parameter { index } => {
            emitter.emit_get_argument(*index)?;
            emit_checked(&resolved.ty, emitter)
        }
        ElementPlan::Property { owner, property } => {
            emitter.emit_type_op(OpCode::GetBean, owner)?;
            emitter.emit_call_method(&property.getter, 0)
        }
        // A varargs method still receives its (empty) array.
        ElementPlan::Method(candidate) => emit_context_call(candidate, emitter, |emitter| {
            generate_arguments(&[], candidate, ctx, emitter)
        }),
    }
}

/// Receiver-less call of a context method.
pub(super) fn resolve_context_call(
    name: &str,
    args: &[ExpressionNode],
    ctx: &CompilationContext<'_>,
    span: Span,
) -> Result<Resolved> {
    let arg_types = resolve_arguments(args, ctx, span)?;
    let methods = ctx.facade().lookup_methods_by_name(name);
    let candidate = resolve_method(name, &methods, &arg_types, ctx.catalog(), span)?;
    Ok(Resolved::new(
        candidate.return_type().clone(),
        Plan::Call(candidate),
    ))
}

pub(super) fn generate_context_call(
    args: &[ExpressionNode],
    plan: &Plan,
    ctx: &CompilationContext<'_>,
    emitter: &mut BytecodeEmitter,
) -> Result<()> {
    let Plan::Call(candidate) = plan else {
        return Err(unexpected_plan(plan));
    };
    emit_context_call(candidate, emitter, |emitter| {
        generate_arguments(args, candidate, ctx, emitter)
    })
}

/// Instance methods run on the context bean of their declaring type.
fn emit_context_call(
    candidate: &CandidateMethod,
    emitter: &mut BytecodeEmitter,
    arguments: impl FnOnce(&mut BytecodeEmitter) -> Result<()>,
) -> Result<()> {
    let method: &MethodDef = &candidate.method;
    if method.is_static() {
        arguments(emitter)?;
        emitter.emit_call_static(&candidate.method, candidate.call_arity())
    } else {
        emitter.emit_type_op(OpCode::GetBean, &method.owner)?;
        arguments(emitter)?;
        emitter.emit_call_method(&candidate.method, candidate.call_arity())
    }
}

pub(super) fn resolve_this(ctx: &CompilationContext<'_>, span: Span) -> Result<Resolved> {
    let ty = ctx
        .facade()
        .lookup_this()
        .ok_or(CompilationError::UnresolvedThis { span })?;
    Ok(Resolved::new(ty.clone(), Plan::Checked(ty)))
}

pub(super) fn generate_this(plan: &Plan, emitter: &mut BytecodeEmitter) -> Result<()> {
    let Plan::Checked(ty) = plan else {
        return Err(unexpected_plan(plan));
    };
    emitter.emit(OpCode::GetThis);
    emit_checked(ty, emitter)
}

/// The context bean registered for a type.
pub(super) fn resolve_bean(
    type_name: &str,
    ctx: &CompilationContext<'_>,
    span: Span,
) -> Result<Resolved> {
    let ty = ctx.lookup_type(type_name, span)?;
    if ty.is_primitive() {
        return Err(CompilationError::type_mismatch(
            format!("no bean of primitive type {ty}"),
            span,
        ));
    }
    Ok(Resolved::new(ty.clone(), Plan::Checked(ty)))
}

pub(super) fn generate_bean(plan: &Plan, emitter: &mut BytecodeEmitter) -> Result<()> {
    let Plan::Checked(ty) = plan else {
        return Err(unexpected_plan(plan));
    };
    emitter.emit_type_op(OpCode::GetBean, ty)
}

/// An environment property; `null` when unset.
pub(super) fn resolve_environment(
    key: &ExpressionNode,
    ctx: &CompilationContext<'_>,
    span: Span,
) -> Result<Resolved> {
    let key_type = resolve_value(key, ctx)?;
    if !key_type.is_string_like() {
        return Err(CompilationError::type_mismatch(
            format!("environment key must be a string, found {key_type}"),
            span,
        ));
    }
    Ok(Resolved::new(TypeDescriptor::string(), Plan::Direct))
}

pub(super) fn generate_environment(
    key: &ExpressionNode,
    ctx: &CompilationContext<'_>,
    emitter: &mut BytecodeEmitter,
) -> Result<()> {
    key.generate_code(ctx, emitter)?;
    emitter.emit(OpCode::GetEnv);
    Ok(())
}

/// Context values are untyped; check them against their static type.
fn emit_checked(ty: &TypeDescriptor, emitter: &mut BytecodeEmitter) -> Result<()> {
    if ty.is_object() {
        return Ok(());
    }
    emitter.emit_type_op(OpCode::CheckCast, ty)
}
