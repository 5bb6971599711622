//! Bytecode emitter for compiled expressions.
//!
//! The [`BytecodeEmitter`] provides a high-level API for generating bytecode,
//! interning constants, call targets and regexes into the side tables of the
//! compiled artifact, and patching forward jumps.
//!
//! # Example
//!
//! ```
//! use evalex_compiler::bytecode::OpCode;
//! use evalex_compiler::emit::BytecodeEmitter;
//!
//! let mut emitter = BytecodeEmitter::new();
//! emitter.set_line(1);
//! emitter.emit_int(42).unwrap();
//! emitter.emit_int(10).unwrap();
//! emitter.emit(OpCode::AddI32);
//! emitter.emit(OpCode::Return);
//!
//! let code = emitter.finish();
//! code.chunk.assert_opcodes(&[OpCode::Constant, OpCode::Constant, OpCode::AddI32, OpCode::Return]);
//! ```

use std::sync::Arc;

use evalex_core::{CompilationError, MethodDef, TypeDescriptor, TypeHash};
use regex::Regex;
use rustc_hash::FxHashMap;

use crate::bytecode::{BytecodeChunk, Constant, ConstantPool, OpCode};

type Result<T> = std::result::Result<T, CompilationError>;

/// A forward jump awaiting its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a jump label must be patched"]
pub struct JumpLabel(usize);

/// The output of a finished emitter.
#[derive(Debug, Default)]
pub struct EmittedCode {
    pub chunk: BytecodeChunk,
    pub constants: ConstantPool,
    /// Call targets, indexed by `CallMethod` / `CallStatic` operands.
    pub functions: Vec<Arc<MethodDef>>,
    /// Patterns, indexed by `Matches` operands.
    pub regexes: Vec<Regex>,
}

/// Emits bytecode instructions for one expression.
#[derive(Debug)]
pub struct BytecodeEmitter {
    chunk: BytecodeChunk,
    constants: ConstantPool,
    functions: Vec<Arc<MethodDef>>,
    /// Deduplication index for call targets.
    function_index: FxHashMap<TypeHash, u16>,
    regexes: Vec<Regex>,
    /// Current source line for debug info
    current_line: u32,
}

impl Default for BytecodeEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl BytecodeEmitter {
    pub fn new() -> Self {
        Self {
            chunk: BytecodeChunk::new(),
            constants: ConstantPool::new(),
            functions: Vec::new(),
            function_index: FxHashMap::default(),
            regexes: Vec::new(),
            current_line: 1,
        }
    }

    /// Set current source line for debug info.
    ///
    /// All subsequent instructions will be associated with this line number.
    pub fn set_line(&mut self, line: u32) {
        self.current_line = line;
    }

    pub fn current_line(&self) -> u32 {
        self.current_line
    }

    /// The code emitted so far.
    pub fn chunk(&self) -> &BytecodeChunk {
        &self.chunk
    }

    // ==========================================================================
    // Basic Emission
    // ==========================================================================

    /// Emit a single opcode with no operands.
    pub fn emit(&mut self, op: OpCode) {
        self.chunk.write_op(op, self.current_line);
    }

    /// Emit opcode with 8-bit operand.
    pub fn emit_byte(&mut self, op: OpCode, byte: u8) {
        self.chunk.write_op(op, self.current_line);
        self.chunk.write_byte(byte, self.current_line);
    }

    /// Emit opcode with 16-bit operand.
    pub fn emit_u16(&mut self, op: OpCode, value: u16) {
        self.chunk.write_op(op, self.current_line);
        self.chunk.write_u16(value, self.current_line);
    }

    /// Emit a constant load instruction.
    ///
    /// Uses narrow (8-bit) or wide (16-bit) index based on pool size.
    pub fn emit_constant(&mut self, constant: Constant) -> Result<()> {
        let index = self.constants.add(constant);
        match u8::try_from(index) {
            Ok(narrow) => self.emit_byte(OpCode::Constant, narrow),
            Err(_) => self.emit_u16(OpCode::ConstantWide, operand(index, "constant")?),
        }
        Ok(())
    }

    // ==========================================================================
    // Constants
    // ==========================================================================

    /// Emit an int constant.
    ///
    /// Optimizes common cases: 0 uses `PushZero`, 1 uses `PushOne`.
    pub fn emit_int(&mut self, value: i32) -> Result<()> {
        match value {
            0 => self.emit(OpCode::PushZero),
            1 => self.emit(OpCode::PushOne),
            _ => self.emit_constant(Constant::Int32(value))?,
        }
        Ok(())
    }

    pub fn emit_long(&mut self, value: i64) -> Result<()> {
        self.emit_constant(Constant::Int64(value))
    }

    pub fn emit_f32(&mut self, value: f32) -> Result<()> {
        self.emit_constant(Constant::Float32(value))
    }

    pub fn emit_f64(&mut self, value: f64) -> Result<()> {
        self.emit_constant(Constant::Float64(value))
    }

    pub fn emit_string(&mut self, value: &Arc<str>) -> Result<()> {
        self.emit_constant(Constant::String(value.clone()))
    }

    pub fn emit_null(&mut self) {
        self.emit(OpCode::PushNull);
    }

    pub fn emit_bool(&mut self, value: bool) {
        self.emit(if value {
            OpCode::PushTrue
        } else {
            OpCode::PushFalse
        });
    }

    // ==========================================================================
    // Context Access
    // ==========================================================================

    /// Emit a fetch of the evaluation argument at `index`.
    pub fn emit_get_argument(&mut self, index: usize) -> Result<()> {
        self.emit_u16(OpCode::GetArgument, operand(index, "argument")?);
        Ok(())
    }

    /// Emit an instruction whose operand is a type constant
    /// (`InstanceOf`, `CheckCast`, `GetBean`).
    pub fn emit_type_op(&mut self, op: OpCode, ty: &TypeDescriptor) -> Result<()> {
        let index = self.constants.add_type(ty.clone());
        self.emit_u16(op, operand(index, "constant")?);
        Ok(())
    }

    // ==========================================================================
    // Calls
    // ==========================================================================

    /// Emit a call of `method` on the receiver below `arg_count` arguments.
    pub fn emit_call_method(&mut self, method: &Arc<MethodDef>, arg_count: usize) -> Result<()> {
        self.emit_call(OpCode::CallMethod, method, arg_count)
    }

    /// Emit a receiver-less call of `method`.
    pub fn emit_call_static(&mut self, method: &Arc<MethodDef>, arg_count: usize) -> Result<()> {
        self.emit_call(OpCode::CallStatic, method, arg_count)
    }

    fn emit_call(&mut self, op: OpCode, method: &Arc<MethodDef>, arg_count: usize) -> Result<()> {
        let index = self.function(method)?;
        let arg_count = u8::try_from(arg_count).map_err(|_| {
            CompilationError::internal(format!("{arg_count} arguments exceed the call operand"))
        })?;
        self.emit_u16(op, index);
        self.chunk.write_byte(arg_count, self.current_line);
        Ok(())
    }

    fn function(&mut self, method: &Arc<MethodDef>) -> Result<u16> {
        if let Some(&index) = self.function_index.get(&method.hash) {
            return Ok(index);
        }
        let index = operand(self.functions.len(), "function")?;
        self.functions.push(method.clone());
        self.function_index.insert(method.hash, index);
        Ok(index)
    }

    // ==========================================================================
    // Collections and Strings
    // ==========================================================================

    /// Emit concatenation of the top `count` values.
    pub fn emit_concat(&mut self, count: usize) -> Result<()> {
        self.emit_u16(OpCode::Concat, operand(count, "concat operand")?);
        Ok(())
    }

    /// Emit construction of an array from the top `count` values.
    pub fn emit_new_array(&mut self, count: usize) -> Result<()> {
        self.emit_u16(OpCode::NewArray, operand(count, "array element")?);
        Ok(())
    }

    /// Emit a full match of the top string against `regex`.
    pub fn emit_matches(&mut self, regex: &Regex) -> Result<()> {
        let index = match self.regexes.iter().position(|r| r.as_str() == regex.as_str()) {
            Some(existing) => existing,
            None => {
                self.regexes.push(regex.clone());
                self.regexes.len() - 1
            }
        };
        self.emit_u16(OpCode::Matches, operand(index, "regex")?);
        Ok(())
    }

    // ==========================================================================
    // Jumps
    // ==========================================================================

    /// Emit a forward jump (target unknown).
    ///
    /// Returns a label that must be patched later with [`Self::patch_jump`].
    pub fn emit_jump(&mut self, op: OpCode) -> JumpLabel {
        JumpLabel(self.chunk.emit_jump(op, self.current_line))
    }

    /// Patch a forward jump to the current position.
    pub fn patch_jump(&mut self, label: JumpLabel) -> Result<()> {
        self.chunk.patch_jump(label.0)
    }

    /// Get current bytecode offset.
    pub fn current_offset(&self) -> usize {
        self.chunk.current_offset()
    }

    // ==========================================================================
    // Finalization
    // ==========================================================================

    /// Finish emission and hand back the chunk and its side tables.
    pub fn finish(self) -> EmittedCode {
        EmittedCode {
            chunk: self.chunk,
            constants: self.constants,
            functions: self.functions,
            regexes: self.regexes,
        }
    }
}

fn operand(index: impl TryInto<u16> + Copy + std::fmt::Display, what: &str) -> Result<u16> {
    index
        .try_into()
        .map_err(|_| CompilationError::internal(format!("{what} index {index} exceeds u16::MAX")))
}
