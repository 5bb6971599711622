//! Per-node type resolution and code generation.
//!
//! [`resolve`] computes a node's [`Resolved`] outcome: its static type and
//! the [`Plan`] that code generation follows. [`generate`] emits the node's
//! instructions from that plan without re-deriving anything. Both match
//! exhaustively on [`NodeKind`], so a new node variant cannot be left
//! unhandled by either pass.

mod access;
mod arithmetic;
mod bound;
mod conditional;
mod literals;
mod logical;
mod relational;
mod types;

use evalex_core::{CompilationError, PrimitiveKind, PropertyDef, Span, TypeDescriptor};
use regex::Regex;

use crate::ast::{ExpressionNode, NodeKind};
use crate::context::CompilationContext;
use crate::conversion::emit_conversion;
use crate::emit::BytecodeEmitter;
use crate::overload::CandidateMethod;

pub(crate) use access::ArrayConstruction;

type Result<T> = std::result::Result<T, CompilationError>;

/// The outcome of resolving a node.
#[derive(Debug)]
pub(crate) struct Resolved {
    pub ty: TypeDescriptor,
    pub plan: Plan,
}

impl Resolved {
    fn new(ty: TypeDescriptor, plan: Plan) -> Self {
        Self { ty, plan }
    }
}

/// What code generation emits for a resolved node.
#[derive(Debug)]
pub(crate) enum Plan {
    /// The node kind alone determines the code.
    Direct,
    /// Both operands promoted to the kind, then the operator.
    Numeric(PrimitiveKind),
    /// String concatenation of all flattened operands.
    Concat,
    /// Ordering through `compareTo` on one operand.
    Comparable {
        candidate: CandidateMethod,
        receiver_is_left: bool,
    },
    InstanceOf(TypeDescriptor),
    Matches(Regex),
    Subscript(SubscriptKind),
    ArrayLength,
    Property(PropertyDef),
    Call(CandidateMethod),
    Element(ElementPlan),
    /// Context bean, `this`, or an argument checked against the type.
    Checked(TypeDescriptor),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SubscriptKind {
    Array,
    List,
    Map,
}

#[derive(Debug)]
pub(crate) enum ElementPlan {
    Parameter { index: usize },
    Property { owner: TypeDescriptor, property: PropertyDef },
    Method(CandidateMethod),
}

/// Resolve a single node. Children are resolved (and cached) on the way.
pub(crate) fn resolve(node: &ExpressionNode, ctx: &CompilationContext<'_>) -> Result<Resolved> {
    let span = node.span();
    match node.kind() {
        NodeKind::Literal(literal) => Ok(literals::resolve_literal(literal)),
        NodeKind::Arithmetic { op, left, right } => {
            arithmetic::resolve_arithmetic(*op, left, right, ctx, span)
        }
        NodeKind::Negate(operand) => arithmetic::resolve_negate(operand, ctx, span),
        NodeKind::Logical { left, right, .. } => logical::resolve_logical(left, right, ctx, span),
        NodeKind::Not(operand) => logical::resolve_not(operand, ctx, span),
        NodeKind::Empty(operand) => logical::resolve_empty(operand, ctx, span),
        NodeKind::Equality { left, right, .. } => relational::resolve_equality(left, right, ctx),
        NodeKind::Relational { op, left, right } => {
            relational::resolve_relational(*op, left, right, ctx, span)
        }
        NodeKind::InstanceOf { operand, type_name } => {
            types::resolve_instance_of(operand, type_name, ctx, span)
        }
        NodeKind::Matches { operand, pattern } => {
            types::resolve_matches(operand, pattern, ctx, span)
        }
        NodeKind::Ternary {
            condition,
            then_branch,
            else_branch,
        } => conditional::resolve_ternary(condition, then_branch, else_branch, ctx, span),
        NodeKind::Elvis { left, right } => conditional::resolve_elvis(left, right, ctx, span),
        NodeKind::Subscript { target, index } => {
            access::resolve_subscript(target, index, ctx, span)
        }
        NodeKind::PropertyAccess {
            receiver,
            name,
            null_safe,
        } => access::resolve_property(receiver, name, *null_safe, ctx, span),
        NodeKind::MethodCall {
            receiver,
            name,
            args,
            null_safe,
        } => access::resolve_method_call(receiver, name, args, *null_safe, ctx, span),
        NodeKind::StaticMethodCall {
            type_name,
            name,
            args,
        } => access::resolve_static_call(type_name, name, args, ctx, span),
        NodeKind::ContextElement(name) => bound::resolve_element(name, ctx, span),
        NodeKind::ContextMethodCall { name, args } => {
            bound::resolve_context_call(name, args, ctx, span)
        }
        NodeKind::This => bound::resolve_this(ctx, span),
        NodeKind::BeanLookup { type_name } => bound::resolve_bean(type_name, ctx, span),
        NodeKind::Environment { key } => bound::resolve_environment(key, ctx, span),
    }
}

/// Emit the code of a resolved node.
pub(crate) fn generate(
    node: &ExpressionNode,
    resolved: &Resolved,
    ctx: &CompilationContext<'_>,
    emitter: &mut BytecodeEmitter,
) -> Result<()> {
    let plan = &resolved.plan;
    match node.kind() {
        NodeKind::Literal(literal) => literals::generate_literal(literal, emitter),
        NodeKind::Arithmetic { op, left, right } => {
            arithmetic::generate_arithmetic(node, *op, left, right, plan, ctx, emitter)
        }
        NodeKind::Negate(operand) => arithmetic::generate_negate(operand, plan, ctx, emitter),
        NodeKind::Logical { op, .. } => logical::generate_logical(node, *op, ctx, emitter),
        NodeKind::Not(operand) => logical::generate_not(operand, ctx, emitter),
        NodeKind::Empty(operand) => logical::generate_empty(operand, ctx, emitter),
        NodeKind::Equality {
            negated,
            left,
            right,
        } => relational::generate_equality(*negated, left, right, ctx, emitter),
        NodeKind::Relational { op, left, right } => {
            relational::generate_relational(*op, left, right, plan, ctx, emitter)
        }
        NodeKind::InstanceOf { operand, .. } => {
            types::generate_instance_of(operand, plan, ctx, emitter)
        }
        NodeKind::Matches { operand, .. } => types::generate_matches(operand, plan, ctx, emitter),
        NodeKind::Ternary {
            condition,
            then_branch,
            else_branch,
        } => conditional::generate_ternary(
            condition,
            then_branch,
            else_branch,
            &resolved.ty,
            ctx,
            emitter,
        ),
        NodeKind::Elvis { left, right } => {
            conditional::generate_elvis(left, right, &resolved.ty, ctx, emitter)
        }
        NodeKind::Subscript { target, index } => {
            access::generate_subscript(target, index, resolved, ctx, emitter)
        }
        NodeKind::PropertyAccess {
            receiver,
            null_safe,
            ..
        } => access::generate_property(receiver, *null_safe, plan, ctx, emitter),
        NodeKind::MethodCall {
            receiver,
            args,
            null_safe,
            ..
        } => access::generate_method_call(receiver, args, *null_safe, plan, ctx, emitter),
        NodeKind::StaticMethodCall { args, .. } => {
            access::generate_static_call(args, plan, ctx, emitter)
        }
        NodeKind::ContextElement(_) => bound::generate_element(resolved, ctx, emitter),
        NodeKind::ContextMethodCall { args, .. } => {
            bound::generate_context_call(args, plan, ctx, emitter)
        }
        NodeKind::This => bound::generate_this(plan, emitter),
        NodeKind::BeanLookup { .. } => bound::generate_bean(plan, emitter),
        NodeKind::Environment { key } => bound::generate_environment(key, ctx, emitter),
    }
}

// ============================================================================
// Shared helpers
// ============================================================================

/// A plan the node kind does not produce.
fn unexpected_plan(plan: &Plan) -> CompilationError {
    CompilationError::internal(format!("unexpected resolution plan {plan:?}"))
}

/// Resolve an operand that has to produce a value.
fn resolve_value(node: &ExpressionNode, ctx: &CompilationContext<'_>) -> Result<TypeDescriptor> {
    let ty = node.resolve_type(ctx)?;
    if ty.is_void() {
        return Err(CompilationError::type_mismatch(
            format!("'{node}' does not produce a value"),
            node.span(),
        ));
    }
    Ok(ty)
}

/// Generate `node` and convert its value to `target`.
fn generate_as(
    node: &ExpressionNode,
    target: &TypeDescriptor,
    ctx: &CompilationContext<'_>,
    emitter: &mut BytecodeEmitter,
) -> Result<()> {
    node.generate_code(ctx, emitter)?;
    let source = resolved_type(node)?;
    let conversion = ctx.find_conversion(source, target).ok_or_else(|| {
        CompilationError::internal(format!("no conversion from {source} to {target}"))
    })?;
    emit_conversion(&conversion, emitter);
    Ok(())
}

/// The cached type of an already resolved child.
fn resolved_type(node: &ExpressionNode) -> Result<&TypeDescriptor> {
    node.resolved_type()
        .ok_or_else(|| CompilationError::internal(format!("'{node}' was not resolved")))
}

/// Resolve call arguments, enforcing the per-call limit.
fn resolve_arguments(
    args: &[ExpressionNode],
    ctx: &CompilationContext<'_>,
    span: Span,
) -> Result<Vec<TypeDescriptor>> {
    let max = ctx.options().max_arguments;
    if args.len() > max {
        return Err(CompilationError::type_mismatch(
            format!("{} arguments exceed the limit of {max}", args.len()),
            span,
        ));
    }
    args.iter().map(|arg| resolve_value(arg, ctx)).collect()
}

/// Emit call arguments as the selected method expects them.
///
/// Trailing varargs arguments are collected into one array.
fn generate_arguments(
    args: &[ExpressionNode],
    candidate: &CandidateMethod,
    ctx: &CompilationContext<'_>,
    emitter: &mut BytecodeEmitter,
) -> Result<()> {
    let fixed = candidate.varargs_start.unwrap_or(args.len());
    for (arg, conversion) in args[..fixed].iter().zip(&candidate.conversions) {
        arg.generate_code(ctx, emitter)?;
        emit_conversion(conversion, emitter);
    }
    if candidate.is_varargs {
        ArrayConstruction {
            items: &args[fixed..],
            conversions: &candidate.conversions[fixed..],
        }
        .generate(ctx, emitter)?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use evalex_core::{
        MethodDef, MethodTraits, PropertyDef, TypeCatalog, TypeDef, Value, names, native,
    };
    use evalex_registry::TypeRegistry;

    use super::*;
    use crate::bytecode::BytecodeChunk;
    use crate::context::DeclaredContext;

    /// A catalog with a few host types and a context exposing them.
    pub(crate) struct Fixture {
        pub registry: Arc<TypeRegistry>,
        pub facade: DeclaredContext,
    }

    fn user() -> TypeDescriptor {
        TypeDescriptor::declared("User")
    }

    fn version() -> TypeDescriptor {
        TypeDescriptor::declared("Version")
    }

    fn noop() -> evalex_core::NativeFn {
        native(|_, _| Ok(Value::Null))
    }

    fn getter(owner: &TypeDescriptor, name: &str, ty: TypeDescriptor) -> Arc<MethodDef> {
        Arc::new(MethodDef::new(owner.clone(), name, vec![], ty, noop()))
    }

    impl Fixture {
        pub(crate) fn new() -> Self {
            let mut registry = TypeRegistry::with_builtins();

            let mut user_def = TypeDef::class("User");
            user_def.methods = vec![
                getter(&user(), "getAge", TypeDescriptor::int32()),
                getter(&user(), "getName", TypeDescriptor::string()),
                getter(&user(), "isActive", TypeDescriptor::boolean()),
                getter(&user(), "getNickname", TypeDescriptor::string()),
                getter(&user(), "nickname", TypeDescriptor::string()),
                Arc::new(MethodDef::new(
                    user(),
                    "greet",
                    vec![TypeDescriptor::string()],
                    TypeDescriptor::string(),
                    noop(),
                )),
            ];
            registry.register_type(user_def).unwrap();

            let mut version_def = TypeDef::class("Version")
                .extends(TypeDescriptor::comparable_of(TypeDescriptor::string()));
            version_def.methods = vec![Arc::new(MethodDef::new(
                version(),
                "compareTo",
                vec![TypeDescriptor::string()],
                TypeDescriptor::int32(),
                noop(),
            ))];
            registry.register_type(version_def).unwrap();

            let fmt = TypeDescriptor::declared("Fmt");
            let mut fmt_def = TypeDef::class("Fmt");
            fmt_def.methods = vec![Arc::new(
                MethodDef::new(
                    fmt.clone(),
                    "format",
                    vec![
                        TypeDescriptor::string(),
                        TypeDescriptor::array_of(TypeDescriptor::object()),
                    ],
                    TypeDescriptor::string(),
                    noop(),
                )
                .with_traits(MethodTraits::STATIC | MethodTraits::VARARGS),
            ), Arc::new(
                MethodDef::new(
                    fmt.clone(),
                    "tally",
                    vec![TypeDescriptor::array_of(TypeDescriptor::object())],
                    TypeDescriptor::int32(),
                    noop(),
                )
                .with_traits(MethodTraits::STATIC | MethodTraits::VARARGS),
            )];
            registry.register_type(fmt_def).unwrap();

            let format = registry.methods(&fmt, "format").remove(0);
            let tally = registry.methods(&fmt, "tally").remove(0);
            let user_name = PropertyDef {
                name: "userName".into(),
                ty: TypeDescriptor::string(),
                getter: getter(&user(), "getName", TypeDescriptor::string()),
            };
            let facade = DeclaredContext::new()
                .parameter("boxed", TypeDescriptor::Boxed(PrimitiveKind::Int32))
                .parameter("name", TypeDescriptor::string())
                .parameter("items", TypeDescriptor::list_of(TypeDescriptor::string()))
                .parameter(
                    "scores",
                    TypeDescriptor::map_of(
                        TypeDescriptor::string(),
                        TypeDescriptor::Boxed(PrimitiveKind::Int32),
                    ),
                )
                .parameter(
                    "matrix",
                    TypeDescriptor::array_of(TypeDescriptor::array_of(TypeDescriptor::int32())),
                )
                .parameter("flag", TypeDescriptor::boolean())
                .parameter("count", TypeDescriptor::int64())
                .parameter("user", user())
                .parameter("version", version())
                .parameter("anything", TypeDescriptor::object())
                .parameter("rawList", TypeDescriptor::declared(names::LIST))
                .parameter("dup", TypeDescriptor::int32())
                .parameter("dup", TypeDescriptor::string())
                .property(user(), user_name)
                .method(format)
                .method(tally)
                .with_this(user());

            Self {
                registry: Arc::new(registry),
                facade,
            }
        }

        /// The same fixture without a `this` type.
        pub(crate) fn without_this() -> Self {
            let mut fixture = Self::new();
            fixture.facade = DeclaredContext::new().parameter("a", TypeDescriptor::int32());
            fixture
        }

        pub(crate) fn ctx(&self) -> CompilationContext<'_> {
            let catalog: Arc<dyn TypeCatalog> = self.registry.clone();
            CompilationContext::new(catalog, &self.facade)
        }
    }

    /// Compile `node` and return its bytecode.
    #[track_caller]
    pub(crate) fn compile_ops(fixture: &Fixture, node: &ExpressionNode) -> BytecodeChunk {
        crate::compile(node, &fixture.ctx())
            .unwrap()
            .chunk()
            .clone()
    }

    #[test]
    fn resolution_is_idempotent() {
        let fx = Fixture::new();
        let ctx = fx.ctx();
        let node = ExpressionNode::method_call(
            ExpressionNode::element("user"),
            "greet",
            vec![ExpressionNode::element("name")],
        );
        let first = node.resolve_type(&ctx).unwrap();
        let second = node.resolve_type(&ctx).unwrap();
        assert_eq!(first, second);

        let before = compile_ops(&fx, &node);
        node.resolve_type(&ctx).unwrap();
        let after = compile_ops(&fx, &node);
        assert_eq!(before.code(), after.code());
    }

    #[test]
    fn failed_resolution_is_not_cached() {
        let fx = Fixture::new();
        let node = ExpressionNode::element("missing");
        assert!(node.resolve_type(&fx.ctx()).is_err());
        assert!(node.resolved_type().is_none());
    }

    #[test]
    fn void_operands_are_rejected() {
        let mut registry = TypeRegistry::with_builtins();
        let mut def = TypeDef::class("Sink");
        def.methods = vec![Arc::new(MethodDef::new(
            TypeDescriptor::declared("Sink"),
            "drain",
            vec![],
            TypeDescriptor::Void,
            noop(),
        ))];
        registry.register_type(def).unwrap();
        let facade = DeclaredContext::new().parameter("sink", TypeDescriptor::declared("Sink"));
        let ctx = CompilationContext::new(Arc::new(registry), &facade);
        let node = ExpressionNode::arithmetic(
            crate::ast::ArithmeticOp::Add,
            ExpressionNode::method_call(ExpressionNode::element("sink"), "drain", vec![]),
            ExpressionNode::int(1),
        );
        let err = node.resolve_type(&ctx).unwrap_err();
        assert!(matches!(err, CompilationError::TypeMismatch { .. }));
    }
}
