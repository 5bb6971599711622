//! Constant pool for compiled expressions.
//!
//! The constant pool stores values referenced by bytecode instructions:
//! numeric and string literals and the types named by `instanceof`,
//! checked casts and bean lookups.

use std::sync::Arc;

use evalex_core::{TypeDescriptor, Value};
use rustc_hash::FxHashMap;

/// Values stored in the constant pool.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(Arc<str>),
    /// A type operand (never pushed as a value).
    Type(TypeDescriptor),
}

impl Constant {
    /// The runtime value of a literal constant.
    ///
    /// Type operands have no value representation and yield `None`.
    pub fn to_value(&self) -> Option<Value> {
        match self {
            Constant::Int32(v) => Some(Value::Int(*v)),
            Constant::Int64(v) => Some(Value::Long(*v)),
            Constant::Float32(v) => Some(Value::Float(*v)),
            Constant::Float64(v) => Some(Value::Double(*v)),
            Constant::String(s) => Some(Value::String(s.clone())),
            Constant::Type(_) => None,
        }
    }

    /// The type operand, if this is one.
    pub fn as_type(&self) -> Option<&TypeDescriptor> {
        match self {
            Constant::Type(ty) => Some(ty),
            _ => None,
        }
    }
}

/// Constant pool with deduplication.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    constants: Vec<Constant>,
    /// Deduplication index: maps constant to its index.
    index: FxHashMap<ConstantKey, u32>,
}

/// Key for constant deduplication (hashable version of Constant).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConstantKey {
    Int32(i32),
    Int64(i64),
    Float32(u32), // Bit pattern for hashing
    Float64(u64), // Bit pattern for hashing
    String(Arc<str>),
    Type(TypeDescriptor),
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or get existing constant, returns index.
    pub fn add(&mut self, constant: Constant) -> u32 {
        let key = Self::to_key(&constant);

        if let Some(&idx) = self.index.get(&key) {
            return idx;
        }

        let idx = self.constants.len() as u32;
        self.constants.push(constant);
        self.index.insert(key, idx);
        idx
    }

    pub fn add_string(&mut self, value: impl Into<Arc<str>>) -> u32 {
        self.add(Constant::String(value.into()))
    }

    pub fn add_type(&mut self, ty: TypeDescriptor) -> u32 {
        self.add(Constant::Type(ty))
    }

    /// Get constant by index.
    pub fn get(&self, index: u32) -> Option<&Constant> {
        self.constants.get(index as usize)
    }

    pub fn constants(&self) -> &[Constant] {
        &self.constants
    }

    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }

    fn to_key(constant: &Constant) -> ConstantKey {
        match constant {
            Constant::Int32(v) => ConstantKey::Int32(*v),
            Constant::Int64(v) => ConstantKey::Int64(*v),
            Constant::Float32(v) => ConstantKey::Float32(v.to_bits()),
            Constant::Float64(v) => ConstantKey::Float64(v.to_bits()),
            Constant::String(s) => ConstantKey::String(s.clone()),
            Constant::Type(ty) => ConstantKey::Type(ty.clone()),
        }
    }
}
