//! Literal expressions.

use evalex_core::TypeDescriptor;

use super::{Plan, Resolved, Result};
use crate::ast::Literal;
use crate::emit::BytecodeEmitter;

pub(super) fn resolve_literal(literal: &Literal) -> Resolved {
    let ty = match literal {
        Literal::Bool(_) => TypeDescriptor::boolean(),
        Literal::Int(_) => TypeDescriptor::int32(),
        Literal::Long(_) => TypeDescriptor::int64(),
        Literal::Float(_) => TypeDescriptor::float32(),
        Literal::Double(_) => TypeDescriptor::float64(),
        Literal::String(_) => TypeDescriptor::string(),
        Literal::Null => TypeDescriptor::Null,
    };
    Resolved::new(ty, Plan::Direct)
}

pub(super) fn generate_literal(literal: &Literal, emitter: &mut BytecodeEmitter) -> Result<()> {
    match literal {
        Literal::Bool(v) => emitter.emit_bool(*v),
        Literal::Int(v) => emitter.emit_int(*v)?,
        Literal::Long(v) => emitter.emit_long(*v)?,
        Literal::Float(v) => emitter.emit_f32(*v)?,
        Literal::Double(v) => emitter.emit_f64(*v)?,
        Literal::String(s) => emitter.emit_string(s)?,
        Literal::Null => emitter.emit_null(),
    }
    Ok(())
}
