//! The expression tree.
//!
//! An [`ExpressionNode`] owns its children exclusively; the tree has no
//! sharing and no back-references. Every node goes through two passes:
//!
//! 1. [`ExpressionNode::resolve_type`] computes the static type, consulting
//!    the type catalog and the context facade. The outcome (type plus any
//!    decision code generation depends on, such as the selected overload)
//!    is stored in the node exactly once.
//! 2. [`ExpressionNode::generate_code`] emits stack-machine instructions in
//!    post-order, reusing the stored outcome.
//!
//! Nodes are built by a parser (not part of this crate) or directly through
//! the constructor functions.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use evalex_compiler::ast::{ArithmeticOp, ExpressionNode};
//! use evalex_compiler::{CompilationContext, DeclaredContext};
//! use evalex_core::TypeDescriptor;
//! use evalex_registry::TypeRegistry;
//!
//! let facade = DeclaredContext::new();
//! let ctx = CompilationContext::new(Arc::new(TypeRegistry::with_builtins()), &facade);
//!
//! let sum = ExpressionNode::arithmetic(
//!     ArithmeticOp::Add,
//!     ExpressionNode::int(1),
//!     ExpressionNode::double(2.0),
//! );
//! assert_eq!(sum.resolve_type(&ctx).unwrap(), TypeDescriptor::float64());
//! ```

mod ops;

pub use ops::{ArithmeticOp, LogicalOp, RelationalOp};

use std::fmt;
use std::sync::Arc;

use evalex_core::{CompilationError, Span, TypeDescriptor};
use once_cell::unsync::OnceCell;

use crate::context::CompilationContext;
use crate::emit::BytecodeEmitter;
use crate::expr::{self, Resolved};

/// A literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(Arc<str>),
    Null,
}

/// The closed set of node variants.
#[derive(Debug)]
pub enum NodeKind {
    Literal(Literal),
    Arithmetic {
        op: ArithmeticOp,
        left: Box<ExpressionNode>,
        right: Box<ExpressionNode>,
    },
    /// Unary minus.
    Negate(Box<ExpressionNode>),
    Logical {
        op: LogicalOp,
        left: Box<ExpressionNode>,
        right: Box<ExpressionNode>,
    },
    Not(Box<ExpressionNode>),
    /// `empty x`: null, or an empty string, array or collection.
    Empty(Box<ExpressionNode>),
    /// `==`, or `!=` when `negated`.
    Equality {
        negated: bool,
        left: Box<ExpressionNode>,
        right: Box<ExpressionNode>,
    },
    Relational {
        op: RelationalOp,
        left: Box<ExpressionNode>,
        right: Box<ExpressionNode>,
    },
    InstanceOf {
        operand: Box<ExpressionNode>,
        type_name: String,
    },
    Matches {
        operand: Box<ExpressionNode>,
        pattern: String,
    },
    Ternary {
        condition: Box<ExpressionNode>,
        then_branch: Box<ExpressionNode>,
        else_branch: Box<ExpressionNode>,
    },
    /// `left ?: right`
    Elvis {
        left: Box<ExpressionNode>,
        right: Box<ExpressionNode>,
    },
    Subscript {
        target: Box<ExpressionNode>,
        index: Box<ExpressionNode>,
    },
    PropertyAccess {
        receiver: Box<ExpressionNode>,
        name: String,
        null_safe: bool,
    },
    MethodCall {
        receiver: Box<ExpressionNode>,
        name: String,
        args: Vec<ExpressionNode>,
        null_safe: bool,
    },
    /// `T(Type).name(args)`
    StaticMethodCall {
        type_name: String,
        name: String,
        args: Vec<ExpressionNode>,
    },
    /// A bare name resolved through the context facade.
    ContextElement(String),
    /// A bare call resolved through the context facade.
    ContextMethodCall {
        name: String,
        args: Vec<ExpressionNode>,
    },
    This,
    /// The context bean of a type.
    BeanLookup { type_name: String },
    /// `env[key]`
    Environment { key: Box<ExpressionNode> },
}

/// A node of the expression tree.
#[derive(Debug)]
pub struct ExpressionNode {
    kind: NodeKind,
    span: Span,
    /// Set exactly once, by the first successful resolution.
    resolved: OnceCell<Resolved>,
}

impl ExpressionNode {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            span: Span::default(),
            resolved: OnceCell::new(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn span(&self) -> Span {
        self.span
    }

    /// The cached static type, if this node has been resolved.
    pub fn resolved_type(&self) -> Option<&TypeDescriptor> {
        self.resolved.get().map(|r| &r.ty)
    }

    pub(crate) fn resolution(&self) -> Option<&Resolved> {
        self.resolved.get()
    }

    // ==========================================================================
    // Passes
    // ==========================================================================

    /// Resolve the static type of this node (and its subtree).
    ///
    /// The first successful call stores the outcome; later calls return it
    /// without recomputation. A failed resolution stores nothing.
    pub fn resolve_type(&self, ctx: &CompilationContext<'_>) -> Result<TypeDescriptor, CompilationError> {
        self.resolve(ctx).map(|r| r.ty.clone())
    }

    pub(crate) fn resolve(&self, ctx: &CompilationContext<'_>) -> Result<&Resolved, CompilationError> {
        self.resolved.get_or_try_init(|| expr::resolve(self, ctx))
    }

    /// Emit the instructions computing this node's value.
    ///
    /// Reuses the outcome of [`Self::resolve_type`], resolving first if that
    /// has not happened yet.
    pub fn generate_code(
        &self,
        ctx: &CompilationContext<'_>,
        emitter: &mut BytecodeEmitter,
    ) -> Result<(), CompilationError> {
        let resolved = self.resolve(ctx)?;
        let outer_line = emitter.current_line();
        emitter.set_line(self.span.line);
        expr::generate(self, resolved, ctx, emitter)?;
        emitter.set_line(outer_line);
        Ok(())
    }

    // ==========================================================================
    // Literals
    // ==========================================================================

    pub fn literal(literal: Literal) -> Self {
        Self::new(NodeKind::Literal(literal))
    }

    pub fn boolean(value: bool) -> Self {
        Self::literal(Literal::Bool(value))
    }

    pub fn int(value: i32) -> Self {
        Self::literal(Literal::Int(value))
    }

    pub fn long(value: i64) -> Self {
        Self::literal(Literal::Long(value))
    }

    pub fn float(value: f32) -> Self {
        Self::literal(Literal::Float(value))
    }

    pub fn double(value: f64) -> Self {
        Self::literal(Literal::Double(value))
    }

    pub fn string(value: &str) -> Self {
        Self::literal(Literal::String(Arc::from(value)))
    }

    pub fn null() -> Self {
        Self::literal(Literal::Null)
    }

    // ==========================================================================
    // Operators
    // ==========================================================================

    pub fn arithmetic(op: ArithmeticOp, left: Self, right: Self) -> Self {
        Self::new(NodeKind::Arithmetic {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn negate(operand: Self) -> Self {
        Self::new(NodeKind::Negate(Box::new(operand)))
    }

    pub fn logical(op: LogicalOp, left: Self, right: Self) -> Self {
        Self::new(NodeKind::Logical {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn and(left: Self, right: Self) -> Self {
        Self::logical(LogicalOp::And, left, right)
    }

    pub fn or(left: Self, right: Self) -> Self {
        Self::logical(LogicalOp::Or, left, right)
    }

    pub fn not(operand: Self) -> Self {
        Self::new(NodeKind::Not(Box::new(operand)))
    }

    pub fn empty(operand: Self) -> Self {
        Self::new(NodeKind::Empty(Box::new(operand)))
    }

    pub fn equals(left: Self, right: Self) -> Self {
        Self::equality(false, left, right)
    }

    pub fn not_equals(left: Self, right: Self) -> Self {
        Self::equality(true, left, right)
    }

    fn equality(negated: bool, left: Self, right: Self) -> Self {
        Self::new(NodeKind::Equality {
            negated,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn relational(op: RelationalOp, left: Self, right: Self) -> Self {
        Self::new(NodeKind::Relational {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn instance_of(operand: Self, type_name: &str) -> Self {
        Self::new(NodeKind::InstanceOf {
            operand: Box::new(operand),
            type_name: type_name.to_string(),
        })
    }

    pub fn matches(operand: Self, pattern: &str) -> Self {
        Self::new(NodeKind::Matches {
            operand: Box::new(operand),
            pattern: pattern.to_string(),
        })
    }

    pub fn ternary(condition: Self, then_branch: Self, else_branch: Self) -> Self {
        Self::new(NodeKind::Ternary {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        })
    }

    pub fn elvis(left: Self, right: Self) -> Self {
        Self::new(NodeKind::Elvis {
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    // ==========================================================================
    // Access
    // ==========================================================================

    pub fn subscript(target: Self, index: Self) -> Self {
        Self::new(NodeKind::Subscript {
            target: Box::new(target),
            index: Box::new(index),
        })
    }

    pub fn property(receiver: Self, name: &str) -> Self {
        Self::property_access(receiver, name, false)
    }

    /// `receiver?.name`
    pub fn safe_property(receiver: Self, name: &str) -> Self {
        Self::property_access(receiver, name, true)
    }

    fn property_access(receiver: Self, name: &str, null_safe: bool) -> Self {
        Self::new(NodeKind::PropertyAccess {
            receiver: Box::new(receiver),
            name: name.to_string(),
            null_safe,
        })
    }

    pub fn method_call(receiver: Self, name: &str, args: Vec<Self>) -> Self {
        Self::call_on(receiver, name, args, false)
    }

    /// `receiver?.name(args)`
    pub fn safe_method_call(receiver: Self, name: &str, args: Vec<Self>) -> Self {
        Self::call_on(receiver, name, args, true)
    }

    fn call_on(receiver: Self, name: &str, args: Vec<Self>, null_safe: bool) -> Self {
        Self::new(NodeKind::MethodCall {
            receiver: Box::new(receiver),
            name: name.to_string(),
            args,
            null_safe,
        })
    }

    pub fn static_call(type_name: &str, name: &str, args: Vec<Self>) -> Self {
        Self::new(NodeKind::StaticMethodCall {
            type_name: type_name.to_string(),
            name: name.to_string(),
            args,
        })
    }

    // ==========================================================================
    // Context-Bound
    // ==========================================================================

    pub fn element(name: &str) -> Self {
        Self::new(NodeKind::ContextElement(name.to_string()))
    }

    pub fn call(name: &str, args: Vec<Self>) -> Self {
        Self::new(NodeKind::ContextMethodCall {
            name: name.to_string(),
            args,
        })
    }

    pub fn this() -> Self {
        Self::new(NodeKind::This)
    }

    pub fn bean(type_name: &str) -> Self {
        Self::new(NodeKind::BeanLookup {
            type_name: type_name.to_string(),
        })
    }

    pub fn environment(key: Self) -> Self {
        Self::new(NodeKind::Environment { key: Box::new(key) })
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[ExpressionNode]) -> fmt::Result {
    f.write_str("(")?;
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{arg}")?;
    }
    f.write_str(")")
}

/// Renders the node in expression syntax, fully parenthesized.
impl fmt::Display for ExpressionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NodeKind::Literal(literal) => match literal {
                Literal::Bool(v) => write!(f, "{v}"),
                Literal::Int(v) => write!(f, "{v}"),
                Literal::Long(v) => write!(f, "{v}L"),
                Literal::Float(v) => write!(f, "{v:?}f"),
                Literal::Double(v) => write!(f, "{v:?}"),
                Literal::String(s) => write!(f, "'{s}'"),
                Literal::Null => f.write_str("null"),
            },
            NodeKind::Arithmetic { op, left, right } => write!(f, "({left} {op} {right})"),
            NodeKind::Negate(operand) => write!(f, "-{operand}"),
            NodeKind::Logical { op, left, right } => write!(f, "({left} {op} {right})"),
            NodeKind::Not(operand) => write!(f, "!{operand}"),
            NodeKind::Empty(operand) => write!(f, "empty {operand}"),
            NodeKind::Equality {
                negated,
                left,
                right,
            } => {
                let op = if *negated { "!=" } else { "==" };
                write!(f, "({left} {op} {right})")
            }
            NodeKind::Relational { op, left, right } => write!(f, "({left} {op} {right})"),
            NodeKind::InstanceOf { operand, type_name } => {
                write!(f, "({operand} instanceof T({type_name}))")
            }
            NodeKind::Matches { operand, pattern } => write!(f, "({operand} matches '{pattern}')"),
            NodeKind::Ternary {
                condition,
                then_branch,
                else_branch,
            } => write!(f, "({condition} ? {then_branch} : {else_branch})"),
            NodeKind::Elvis { left, right } => write!(f, "({left} ?: {right})"),
            NodeKind::Subscript { target, index } => write!(f, "{target}[{index}]"),
            NodeKind::PropertyAccess {
                receiver,
                name,
                null_safe,
            } => {
                let dot = if *null_safe { "?." } else { "." };
                write!(f, "{receiver}{dot}{name}")
            }
            NodeKind::MethodCall {
                receiver,
                name,
                args,
                null_safe,
            } => {
                let dot = if *null_safe { "?." } else { "." };
                write!(f, "{receiver}{dot}{name}")?;
                write_args(f, args)
            }
            NodeKind::StaticMethodCall {
                type_name,
                name,
                args,
            } => {
                write!(f, "T({type_name}).{name}")?;
                write_args(f, args)
            }
            NodeKind::ContextElement(name) => f.write_str(name),
            NodeKind::ContextMethodCall { name, args } => {
                f.write_str(name)?;
                write_args(f, args)
            }
            NodeKind::This => f.write_str("this"),
            NodeKind::BeanLookup { type_name } => write!(f, "ctx[T({type_name})]"),
            NodeKind::Environment { key } => write!(f, "env[{key}]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_fully_parenthesized() {
        let node = ExpressionNode::relational(
            RelationalOp::Ge,
            ExpressionNode::property(ExpressionNode::element("user"), "age"),
            ExpressionNode::arithmetic(
                ArithmeticOp::Add,
                ExpressionNode::int(17),
                ExpressionNode::long(1),
            ),
        );
        assert_eq!(node.to_string(), "(user.age >= (17 + 1L))");

        let call = ExpressionNode::safe_method_call(
            ExpressionNode::this(),
            "format",
            vec![ExpressionNode::string("x"), ExpressionNode::null()],
        );
        assert_eq!(call.to_string(), "this?.format('x', null)");
    }

    #[test]
    fn new_nodes_are_unresolved() {
        let node = ExpressionNode::int(1).with_span(Span::new(2, 3, 1));
        assert!(node.resolved_type().is_none());
        assert_eq!(node.span(), Span::new(2, 3, 1));
    }
}
