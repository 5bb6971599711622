//! Stack machine evaluating compiled expressions.
//!
//! ## Execution Model
//!
//! The VM walks a single [`BytecodeChunk`](evalex_compiler::bytecode::BytecodeChunk)
//! from offset 0 with one operand stack. Every instruction pops its inputs
//! and pushes its result; `Return` pops the final value. Jumps are forward
//! only, so evaluation always terminates.
//!
//! Values read from the [`EvaluationContext`] are untyped. The compiler
//! guards them with `CheckCast`, which fails with
//! [`RuntimeError::InvalidCast`] when the host supplies a value that does
//! not match the declared type.

mod numeric;

use std::sync::Arc;

use evalex_compiler::CompiledExpression;
use evalex_compiler::bytecode::OpCode;
use evalex_core::{RuntimeError, TypeDescriptor, Value};
use tracing::trace;

use crate::EvaluationContext;

use numeric::{as_bool, as_f32, as_f64, as_i32, as_i64, as_str};

type Result<T> = std::result::Result<T, RuntimeError>;

/// One evaluation of a compiled expression.
pub struct Vm<'a> {
    compiled: &'a CompiledExpression,
    context: &'a dyn EvaluationContext,
    stack: Vec<Value>,
    ip: usize,
}

macro_rules! binary {
    ($vm:ident, $extract:ident, |$a:ident, $b:ident| $body:expr) => {{
        let right = $vm.pop()?;
        let left = $vm.pop()?;
        let $a = $extract(&left)?;
        let $b = $extract(&right)?;
        $vm.push($body);
    }};
}

macro_rules! unary {
    ($vm:ident, $extract:ident, |$a:ident| $body:expr) => {{
        let value = $vm.pop()?;
        let $a = $extract(&value)?;
        $vm.push($body);
    }};
}

impl<'a> Vm<'a> {
    pub fn new(compiled: &'a CompiledExpression, context: &'a dyn EvaluationContext) -> Self {
        Self {
            compiled,
            context,
            stack: Vec::with_capacity(16),
            ip: 0,
        }
    }

    /// Run to the `Return` instruction and produce its value.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn run(mut self) -> Result<Value> {
        loop {
            let op = self.read_op()?;
            trace!(offset = self.ip - 1, op = op.name(), depth = self.stack.len(), "execute");
            if op == OpCode::Return {
                return self.pop();
            }
            self.execute_instruction(op)?;
        }
    }

    fn execute_instruction(&mut self, op: OpCode) -> Result<()> {
        match op {
            // =================================================================
            // Constants and stack manipulation
            // =================================================================
            OpCode::Constant => {
                let index = self.read_byte()? as u32;
                let value = self.constant_value(index)?;
                self.push(value);
            }
            OpCode::ConstantWide => {
                let index = self.read_u16()? as u32;
                let value = self.constant_value(index)?;
                self.push(value);
            }
            OpCode::PushNull => self.push(Value::Null),
            OpCode::PushTrue => self.push(Value::Bool(true)),
            OpCode::PushFalse => self.push(Value::Bool(false)),
            OpCode::PushZero => self.push(Value::Int(0)),
            OpCode::PushOne => self.push(Value::Int(1)),
            OpCode::Pop => {
                self.pop()?;
            }
            OpCode::Dup => {
                let top = self.peek()?.clone();
                self.push(top);
            }
            OpCode::Swap => {
                let len = self.stack.len();
                if len < 2 {
                    return Err(RuntimeError::invalid_bytecode("stack underflow on swap"));
                }
                self.stack.swap(len - 1, len - 2);
            }

            // =================================================================
            // Context access
            // =================================================================
            OpCode::GetArgument => {
                let index = self.read_u16()? as usize;
                let value = self
                    .context
                    .argument(index)
                    .ok_or(RuntimeError::MissingArgument { index })?;
                self.push(value);
            }
            OpCode::GetThis => {
                let value = self.context.this().ok_or(RuntimeError::MissingThis)?;
                self.push(value);
            }
            OpCode::GetBean => {
                let ty = self.read_type()?;
                let value = self
                    .context
                    .bean(&ty)
                    .ok_or_else(|| RuntimeError::NoSuchBean {
                        type_name: ty.to_string(),
                    })?;
                self.push(value);
            }
            OpCode::GetEnv => {
                let key = self.pop()?;
                let key = as_str(&key, "environment key")?;
                let value = self
                    .context
                    .environment_property(key)
                    .map_or(Value::Null, Value::from);
                self.push(value);
            }

            // =================================================================
            // Arithmetic
            // =================================================================
            OpCode::AddI32 => binary!(self, as_i32, |a, b| Value::Int(a.wrapping_add(b))),
            OpCode::SubI32 => binary!(self, as_i32, |a, b| Value::Int(a.wrapping_sub(b))),
            OpCode::MulI32 => binary!(self, as_i32, |a, b| Value::Int(a.wrapping_mul(b))),
            OpCode::DivI32 => binary!(self, as_i32, |a, b| Value::Int(numeric::div_i32(a, b)?)),
            OpCode::ModI32 => binary!(self, as_i32, |a, b| Value::Int(numeric::rem_i32(a, b)?)),
            OpCode::NegI32 => unary!(self, as_i32, |a| Value::Int(a.wrapping_neg())),

            OpCode::AddI64 => binary!(self, as_i64, |a, b| Value::Long(a.wrapping_add(b))),
            OpCode::SubI64 => binary!(self, as_i64, |a, b| Value::Long(a.wrapping_sub(b))),
            OpCode::MulI64 => binary!(self, as_i64, |a, b| Value::Long(a.wrapping_mul(b))),
            OpCode::DivI64 => binary!(self, as_i64, |a, b| Value::Long(numeric::div_i64(a, b)?)),
            OpCode::ModI64 => binary!(self, as_i64, |a, b| Value::Long(numeric::rem_i64(a, b)?)),
            OpCode::NegI64 => unary!(self, as_i64, |a| Value::Long(a.wrapping_neg())),
            OpCode::PowI64 => binary!(self, as_i64, |a, b| Value::Long(numeric::pow_i64(a, b)?)),

            OpCode::AddF32 => binary!(self, as_f32, |a, b| Value::Float(a + b)),
            OpCode::SubF32 => binary!(self, as_f32, |a, b| Value::Float(a - b)),
            OpCode::MulF32 => binary!(self, as_f32, |a, b| Value::Float(a * b)),
            OpCode::DivF32 => binary!(self, as_f32, |a, b| Value::Float(a / b)),
            OpCode::ModF32 => binary!(self, as_f32, |a, b| Value::Float(a % b)),
            OpCode::NegF32 => unary!(self, as_f32, |a| Value::Float(-a)),

            OpCode::AddF64 => binary!(self, as_f64, |a, b| Value::Double(a + b)),
            OpCode::SubF64 => binary!(self, as_f64, |a, b| Value::Double(a - b)),
            OpCode::MulF64 => binary!(self, as_f64, |a, b| Value::Double(a * b)),
            OpCode::DivF64 => binary!(self, as_f64, |a, b| Value::Double(a / b)),
            OpCode::ModF64 => binary!(self, as_f64, |a, b| Value::Double(a % b)),
            OpCode::NegF64 => unary!(self, as_f64, |a| Value::Double(-a)),
            OpCode::PowF64 => binary!(self, as_f64, |a, b| Value::Double(a.powf(b))),

            OpCode::Concat => {
                let count = self.read_u16()? as usize;
                let parts = self.pop_n(count)?;
                let mut out = String::new();
                for part in &parts {
                    out.push_str(&part.to_string());
                }
                self.push(Value::from(out));
            }

            // =================================================================
            // Comparison and logic
            // =================================================================
            OpCode::EqValue => {
                let right = self.pop()?;
                let left = self.pop()?;
                self.push(Value::Bool(left.structural_eq(&right)));
            }
            OpCode::LtI32 => binary!(self, as_i32, |a, b| Value::Bool(a < b)),
            OpCode::LeI32 => binary!(self, as_i32, |a, b| Value::Bool(a <= b)),
            OpCode::GtI32 => binary!(self, as_i32, |a, b| Value::Bool(a > b)),
            OpCode::GeI32 => binary!(self, as_i32, |a, b| Value::Bool(a >= b)),
            OpCode::LtI64 => binary!(self, as_i64, |a, b| Value::Bool(a < b)),
            OpCode::LeI64 => binary!(self, as_i64, |a, b| Value::Bool(a <= b)),
            OpCode::GtI64 => binary!(self, as_i64, |a, b| Value::Bool(a > b)),
            OpCode::GeI64 => binary!(self, as_i64, |a, b| Value::Bool(a >= b)),
            OpCode::LtF32 => binary!(self, as_f32, |a, b| Value::Bool(a < b)),
            OpCode::LeF32 => binary!(self, as_f32, |a, b| Value::Bool(a <= b)),
            OpCode::GtF32 => binary!(self, as_f32, |a, b| Value::Bool(a > b)),
            OpCode::GeF32 => binary!(self, as_f32, |a, b| Value::Bool(a >= b)),
            OpCode::LtF64 => binary!(self, as_f64, |a, b| Value::Bool(a < b)),
            OpCode::LeF64 => binary!(self, as_f64, |a, b| Value::Bool(a <= b)),
            OpCode::GtF64 => binary!(self, as_f64, |a, b| Value::Bool(a > b)),
            OpCode::GeF64 => binary!(self, as_f64, |a, b| Value::Bool(a >= b)),
            OpCode::Not => unary!(self, as_bool, |a| Value::Bool(!a)),

            // =================================================================
            // Conversions and type checks
            // =================================================================
            OpCode::I32toI64 => unary!(self, as_i32, |a| Value::Long(a as i64)),
            OpCode::I32toF32 => unary!(self, as_i32, |a| Value::Float(a as f32)),
            OpCode::I32toF64 => unary!(self, as_i32, |a| Value::Double(a as f64)),
            OpCode::I64toF32 => unary!(self, as_i64, |a| Value::Float(a as f32)),
            OpCode::I64toF64 => unary!(self, as_i64, |a| Value::Double(a as f64)),
            OpCode::F32toF64 => unary!(self, as_f32, |a| Value::Double(a as f64)),
            OpCode::Unbox => {
                if self.peek()?.is_null() {
                    return Err(RuntimeError::null_value("primitive value"));
                }
            }
            OpCode::InstanceOf => {
                let ty = self.read_type()?;
                let value = self.pop()?;
                let result = self.compiled.catalog().is_instance(&value, &ty);
                self.push(Value::Bool(result));
            }
            OpCode::CheckCast => {
                let ty = self.read_type()?;
                let value = self.peek()?;
                if value.is_null() {
                    if ty.is_primitive() {
                        return Err(RuntimeError::null_value(format!("value of type {ty}")));
                    }
                } else if !self.compiled.catalog().is_instance(value, &ty) {
                    return Err(RuntimeError::InvalidCast {
                        expected: ty.to_string(),
                        found: value.type_name(),
                    });
                }
            }

            // =================================================================
            // Control flow
            // =================================================================
            OpCode::Jump => {
                let offset = self.read_u16()? as usize;
                self.ip += offset;
            }
            OpCode::JumpIfFalse => {
                let offset = self.read_u16()? as usize;
                if !as_bool(self.peek()?)? {
                    self.ip += offset;
                }
            }
            OpCode::JumpIfTrue => {
                let offset = self.read_u16()? as usize;
                if as_bool(self.peek()?)? {
                    self.ip += offset;
                }
            }
            OpCode::JumpIfNull => {
                let offset = self.read_u16()? as usize;
                if self.peek()?.is_null() {
                    self.ip += offset;
                }
            }
            OpCode::JumpIfNotNull => {
                let offset = self.read_u16()? as usize;
                if !self.peek()?.is_null() {
                    self.ip += offset;
                }
            }

            // =================================================================
            // Calls
            // =================================================================
            OpCode::CallMethod => {
                let (index, argc) = self.read_call()?;
                let args = self.pop_n(argc)?;
                let receiver = self.pop()?;
                let method = self.function(index)?;
                if receiver.is_null() {
                    return Err(RuntimeError::null_value(format!(
                        "receiver of {}",
                        method.signature()
                    )));
                }
                let result = (method.native)(&receiver, &args)?;
                self.push(result);
            }
            OpCode::CallStatic => {
                let (index, argc) = self.read_call()?;
                let args = self.pop_n(argc)?;
                let method = self.function(index)?;
                let result = (method.native)(&Value::Null, &args)?;
                self.push(result);
            }

            // =================================================================
            // Collections and strings
            // =================================================================
            OpCode::NewArray => {
                let count = self.read_u16()? as usize;
                let items = self.pop_n(count)?;
                self.push(Value::array(items));
            }
            OpCode::Index => {
                let index = self.pop()?;
                let index = as_i32(&index)?;
                let target = self.pop()?;
                let items = match &target {
                    Value::Array(items) | Value::List(items) => items,
                    Value::Null => return Err(RuntimeError::null_value("indexed collection")),
                    other => {
                        return Err(RuntimeError::InvalidCast {
                            expected: "List".to_string(),
                            found: other.type_name(),
                        });
                    }
                };
                let item = usize::try_from(index)
                    .ok()
                    .and_then(|i| items.get(i))
                    .ok_or(RuntimeError::IndexOutOfBounds {
                        index: index as i64,
                        len: items.len(),
                    })?;
                let item = item.clone();
                self.push(item);
            }
            OpCode::MapGet => {
                let key = self.pop()?;
                let map = self.pop()?;
                let entries = match &map {
                    Value::Map(entries) => entries,
                    Value::Null => return Err(RuntimeError::null_value("indexed map")),
                    other => {
                        return Err(RuntimeError::InvalidCast {
                            expected: "Map".to_string(),
                            found: other.type_name(),
                        });
                    }
                };
                let value = key
                    .as_str()
                    .and_then(|k| entries.get(k))
                    .cloned()
                    .unwrap_or_default();
                self.push(value);
            }
            OpCode::ArrayLength => {
                let array = self.pop()?;
                let len = match &array {
                    Value::Array(items) => items.len(),
                    Value::Null => return Err(RuntimeError::null_value("array")),
                    other => {
                        return Err(RuntimeError::InvalidCast {
                            expected: "array".to_string(),
                            found: other.type_name(),
                        });
                    }
                };
                self.push(Value::Int(len as i32));
            }
            OpCode::IsEmpty => {
                let value = self.pop()?;
                let empty = match &value {
                    Value::Null => true,
                    Value::String(s) => s.is_empty(),
                    Value::Array(items) | Value::List(items) => items.is_empty(),
                    Value::Map(entries) => entries.is_empty(),
                    _ => false,
                };
                self.push(Value::Bool(empty));
            }
            OpCode::Matches => {
                let index = self.read_u16()? as usize;
                let value = self.pop()?;
                let regex = self
                    .compiled
                    .regex(index)
                    .ok_or_else(|| RuntimeError::invalid_bytecode(format!("no regex {index}")))?;
                let matched = match &value {
                    Value::Null => false,
                    other => regex.is_match(as_str(other, "String")?),
                };
                self.push(Value::Bool(matched));
            }

            OpCode::Return => {
                return Err(RuntimeError::invalid_bytecode("return inside instruction"));
            }
        }
        Ok(())
    }

    // =========================================================================
    // Stack
    // =========================================================================

    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn pop(&mut self) -> Result<Value> {
        self.stack
            .pop()
            .ok_or_else(|| RuntimeError::invalid_bytecode("stack underflow"))
    }

    fn peek(&self) -> Result<&Value> {
        self.stack
            .last()
            .ok_or_else(|| RuntimeError::invalid_bytecode("stack underflow"))
    }

    /// Pop `count` values, returned in push order.
    fn pop_n(&mut self, count: usize) -> Result<Vec<Value>> {
        let start = self
            .stack
            .len()
            .checked_sub(count)
            .ok_or_else(|| RuntimeError::invalid_bytecode("stack underflow"))?;
        Ok(self.stack.split_off(start))
    }

    // =========================================================================
    // Operands
    // =========================================================================

    fn read_op(&mut self) -> Result<OpCode> {
        let op = self.compiled.chunk().read_op(self.ip).ok_or_else(|| {
            RuntimeError::invalid_bytecode(format!("no instruction at offset {}", self.ip))
        })?;
        self.ip += 1;
        Ok(op)
    }

    fn read_byte(&mut self) -> Result<u8> {
        let byte = self
            .compiled
            .chunk()
            .read_byte(self.ip)
            .ok_or_else(|| RuntimeError::invalid_bytecode("truncated operand"))?;
        self.ip += 1;
        Ok(byte)
    }

    fn read_u16(&mut self) -> Result<u16> {
        let value = self
            .compiled
            .chunk()
            .read_u16(self.ip)
            .ok_or_else(|| RuntimeError::invalid_bytecode("truncated operand"))?;
        self.ip += 2;
        Ok(value)
    }

    fn read_call(&mut self) -> Result<(usize, usize)> {
        let index = self.read_u16()? as usize;
        let argc = self.read_byte()? as usize;
        Ok((index, argc))
    }

    fn read_type(&mut self) -> Result<TypeDescriptor> {
        let index = self.read_u16()? as u32;
        self.compiled
            .constants()
            .get(index)
            .and_then(|c| c.as_type())
            .cloned()
            .ok_or_else(|| RuntimeError::invalid_bytecode(format!("constant {index} is not a type")))
    }

    fn constant_value(&self, index: u32) -> Result<Value> {
        self.compiled
            .constants()
            .get(index)
            .and_then(|c| c.to_value())
            .ok_or_else(|| RuntimeError::invalid_bytecode(format!("constant {index} is not a value")))
    }

    fn function(&self, index: usize) -> Result<Arc<evalex_core::MethodDef>> {
        self.compiled
            .function(index)
            .cloned()
            .ok_or_else(|| RuntimeError::invalid_bytecode(format!("no function {index}")))
    }
}
