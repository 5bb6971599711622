//! Runtime values produced and consumed by compiled expressions.
//!
//! [`Value`] is the single dynamically-typed representation used by the VM,
//! the evaluation context and native method implementations. Primitives and
//! their boxes share a representation; `null` is an explicit variant.
//!
//! Host types enter the value space through [`HostObject`].

use std::any::Any;
use std::cmp::Ordering;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::{PrimitiveKind, TypeDescriptor};

/// A host-provided object.
///
/// Implementations report their runtime type so `instanceof` and checked
/// casts can be answered against the type catalog.
pub trait HostObject: Debug + Send + Sync {
    /// The runtime (concrete) type of this object.
    fn type_descriptor(&self) -> TypeDescriptor;

    /// Access to the concrete Rust value, for native method implementations.
    fn as_any(&self) -> &dyn Any;

    /// Structural equality with another host object.
    ///
    /// Defaults to identity.
    fn equals(&self, other: &dyn HostObject) -> bool {
        std::ptr::addr_eq(self as *const Self, other as *const dyn HostObject)
    }

    /// Natural ordering against another host object, for `Comparable` types.
    fn compare(&self, _other: &dyn HostObject) -> Option<Ordering> {
        None
    }

    /// Text used when the object takes part in string concatenation.
    fn display(&self) -> String {
        format!("{self:?}")
    }
}

/// String-keyed map value.
pub type ValueMap = FxHashMap<Arc<str>, Value>;

/// A runtime value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(Arc<str>),
    Array(Arc<[Value]>),
    List(Arc<[Value]>),
    Map(Arc<ValueMap>),
    Object(Arc<dyn HostObject>),
}

impl Value {
    /// Wrap a host object.
    pub fn object<T: HostObject + 'static>(object: T) -> Self {
        Value::Object(Arc::new(object))
    }

    pub fn string(s: impl Into<Arc<str>>) -> Self {
        Value::String(s.into())
    }

    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(items.into_iter().collect())
    }

    pub fn array(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Array(items.into_iter().collect())
    }

    pub fn map<K: Into<Arc<str>>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Map(Arc::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Name of the runtime type, for error messages.
    pub fn type_name(&self) -> String {
        self.runtime_type().to_string()
    }

    /// The runtime type of this value.
    ///
    /// Primitives report their box; collections report their raw type.
    pub fn runtime_type(&self) -> TypeDescriptor {
        match self {
            Value::Null => TypeDescriptor::Null,
            Value::Bool(_) => TypeDescriptor::Boxed(PrimitiveKind::Bool),
            Value::Int(_) => TypeDescriptor::Boxed(PrimitiveKind::Int32),
            Value::Long(_) => TypeDescriptor::Boxed(PrimitiveKind::Int64),
            Value::Float(_) => TypeDescriptor::Boxed(PrimitiveKind::Float32),
            Value::Double(_) => TypeDescriptor::Boxed(PrimitiveKind::Float64),
            Value::String(_) => TypeDescriptor::string(),
            Value::Array(_) => TypeDescriptor::array_of(TypeDescriptor::object()),
            Value::List(_) => TypeDescriptor::declared(crate::names::LIST),
            Value::Map(_) => TypeDescriptor::declared(crate::names::MAP),
            Value::Object(obj) => obj.type_descriptor(),
        }
    }

    /// The primitive kind carried by this value, if any.
    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        match self {
            Value::Bool(_) => Some(PrimitiveKind::Bool),
            Value::Int(_) => Some(PrimitiveKind::Int32),
            Value::Long(_) => Some(PrimitiveKind::Int64),
            Value::Float(_) => Some(PrimitiveKind::Float32),
            Value::Double(_) => Some(PrimitiveKind::Float64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Elements of an array or list.
    pub fn as_slice(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) | Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Downcast a host object to its concrete type.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        match self {
            Value::Object(obj) => obj.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Null-safe structural equality.
    ///
    /// Values of different runtime types are never equal, so `1 == 1L` is
    /// false. Floating values compare by bit pattern, making `NaN` equal to
    /// itself.
    pub fn structural_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) | (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.structural_eq(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|w| v.structural_eq(w)))
            }
            (Value::Object(a), Value::Object(b)) => a.equals(b.as_ref()),
            _ => false,
        }
    }

    /// Natural ordering between two values of the same runtime type.
    ///
    /// Floating values use the total order, so `NaN` sorts above infinity.
    /// Returns `None` for mismatched or unordered types.
    pub fn natural_cmp(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Long(a), Value::Long(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => Some(a.total_cmp(b)),
            (Value::Double(a), Value::Double(b)) => Some(a.total_cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Object(a), Value::Object(b)) => a.compare(b.as_ref()),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.structural_eq(other)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(Arc::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(Arc::from(v))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Floating values always show a fractional part (`2.0`, not `2`).
///
/// `shortest` is the shortest round-trip text at the value's own precision.
fn write_float(f: &mut Formatter<'_>, v: f64, shortest: &dyn Display) -> fmt::Result {
    if v.is_nan() {
        write!(f, "NaN")
    } else if v.is_infinite() {
        write!(f, "{}", if v > 0.0 { "Infinity" } else { "-Infinity" })
    } else if v.fract() == 0.0 && v.abs() < 1e16 {
        write!(f, "{v:.1}")
    } else {
        write!(f, "{shortest}")
    }
}

fn write_sequence(f: &mut Formatter<'_>, items: &[Value]) -> fmt::Result {
    write!(f, "[")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    write!(f, "]")
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Long(v) => write!(f, "{v}"),
            Value::Float(v) => write_float(f, *v as f64, v),
            Value::Double(v) => write_float(f, *v, v),
            Value::String(s) => write!(f, "{s}"),
            Value::Array(items) | Value::List(items) => write_sequence(f, items),
            Value::Map(map) => {
                let mut entries: Vec<_> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                write!(f, "{{")?;
                for (i, (k, v)) in entries.into_iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}={v}")?;
                }
                write!(f, "}}")
            }
            Value::Object(obj) => write!(f, "{}", obj.display()),
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(v) => write!(f, "Bool({v})"),
            Value::Int(v) => write!(f, "Int({v})"),
            Value::Long(v) => write!(f, "Long({v})"),
            Value::Float(v) => write!(f, "Float({v})"),
            Value::Double(v) => write!(f, "Double({v})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Array(items) => f.debug_tuple("Array").field(items).finish(),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Map(map) => f.debug_tuple("Map").field(map).finish(),
            Value::Object(obj) => f.debug_tuple("Object").field(obj).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Point {
        x: i32,
    }

    impl HostObject for Point {
        fn type_descriptor(&self) -> TypeDescriptor {
            TypeDescriptor::declared("Point")
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn display_matches_host_conventions() {
        assert_eq!(Value::Int(7).to_string(), "7");
        assert_eq!(Value::Double(2.0).to_string(), "2.0");
        assert_eq!(Value::Float(1.5).to_string(), "1.5");
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(
            Value::list([Value::Int(1), Value::from("a")]).to_string(),
            "[1, a]"
        );
    }

    #[test]
    fn equality_is_type_strict_and_null_safe() {
        assert_eq!(Value::Int(1), Value::Int(1));
        assert_ne!(Value::Int(1), Value::Long(1));
        assert_eq!(Value::Null, Value::Null);
        assert_ne!(Value::Null, Value::Int(0));
        assert_eq!(Value::Double(f64::NAN), Value::Double(f64::NAN));
    }

    #[test]
    fn collections_compare_structurally() {
        let a = Value::map([("k", Value::Int(1))]);
        let b = Value::map([("k", Value::Int(1))]);
        assert_eq!(a, b);
        assert_ne!(Value::list([Value::Int(1)]), Value::array([Value::Int(1)]));
    }

    #[test]
    fn natural_ordering_within_a_type() {
        assert_eq!(
            Value::from("a").natural_cmp(&Value::from("b")),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::Long(3).natural_cmp(&Value::Long(3)),
            Some(Ordering::Equal)
        );
        assert_eq!(Value::Int(1).natural_cmp(&Value::Long(1)), None);
        assert_eq!(
            Value::object(Point { x: 1 }).natural_cmp(&Value::object(Point { x: 2 })),
            None
        );
    }

    #[test]
    fn host_objects_default_to_identity() {
        let shared = Value::object(Point { x: 1 });
        let copy = shared.clone();
        assert_eq!(shared, copy);
        assert_ne!(shared, Value::object(Point { x: 1 }));
        assert_eq!(shared.downcast_ref::<Point>().map(|p| p.x), Some(1));
    }

    #[test]
    fn runtime_types() {
        assert_eq!(
            Value::Long(3).runtime_type(),
            TypeDescriptor::Boxed(PrimitiveKind::Int64)
        );
        assert!(Value::from("x").runtime_type().is_string());
        assert_eq!(
            Value::object(Point { x: 0 }).type_name(),
            "Point".to_string()
        );
    }
}
