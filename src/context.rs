//! The evaluation-time context.

use evalex_core::{TypeDescriptor, Value};
use rustc_hash::FxHashMap;

/// What a compiled expression reads while it is evaluated.
///
/// Positional arguments correspond to the parameters declared at compile
/// time, in declaration order.
pub trait EvaluationContext {
    /// The argument at `index`, or `None` when the host supplied fewer.
    fn argument(&self, index: usize) -> Option<Value>;

    /// The bean registered for `ty`.
    fn bean(&self, _ty: &TypeDescriptor) -> Option<Value> {
        None
    }

    /// An environment property; `None` evaluates to `null`.
    fn environment_property(&self, _key: &str) -> Option<String> {
        None
    }

    /// The receiver `this` refers to.
    fn this(&self) -> Option<Value> {
        None
    }
}

/// An [`EvaluationContext`] over values supplied up front.
///
/// # Example
///
/// ```
/// use evalex::{EvaluationContext, SimpleContext};
/// use evalex_core::Value;
///
/// let context = SimpleContext::new()
///     .with_argument(3)
///     .with_argument("Tim")
///     .with_environment("HOME", "/home/tim");
/// assert_eq!(context.argument(1), Some(Value::from("Tim")));
/// assert_eq!(context.environment_property("HOME").as_deref(), Some("/home/tim"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct SimpleContext {
    arguments: Vec<Value>,
    beans: FxHashMap<TypeDescriptor, Value>,
    environment: FxHashMap<String, String>,
    this: Option<Value>,
}

impl SimpleContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the next positional argument.
    pub fn with_argument(mut self, value: impl Into<Value>) -> Self {
        self.arguments.push(value.into());
        self
    }

    pub fn with_bean(mut self, ty: TypeDescriptor, value: impl Into<Value>) -> Self {
        self.beans.insert(ty, value.into());
        self
    }

    pub fn with_environment(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    pub fn with_this(mut self, value: impl Into<Value>) -> Self {
        self.this = Some(value.into());
        self
    }
}

impl EvaluationContext for SimpleContext {
    fn argument(&self, index: usize) -> Option<Value> {
        self.arguments.get(index).cloned()
    }

    fn bean(&self, ty: &TypeDescriptor) -> Option<Value> {
        self.beans.get(ty).cloned()
    }

    fn environment_property(&self, key: &str) -> Option<String> {
        self.environment.get(key).cloned()
    }

    fn this(&self) -> Option<Value> {
        self.this.clone()
    }
}
