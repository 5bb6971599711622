//! Bytecode operation codes.
//!
//! Each opcode is a single byte, with operands following inline
//! (big-endian). The VM is a stack machine: operations pop their operands
//! and push their result.

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Bytecode operation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum OpCode {
    // =========================================================================
    // Constants
    // =========================================================================
    /// Push constant from pool (8-bit index).
    /// Operand: u8 constant index
    Constant = 0,
    /// Push constant from pool (16-bit index).
    /// Operand: u16 constant index
    ConstantWide,
    /// Push null.
    PushNull,
    /// Push boolean true.
    PushTrue,
    /// Push boolean false.
    PushFalse,
    /// Push int 0.
    PushZero,
    /// Push int 1.
    PushOne,

    // =========================================================================
    // Stack Operations
    // =========================================================================
    /// Pop top of stack.
    Pop,
    /// Duplicate top of stack.
    Dup,
    /// Swap top two stack values.
    Swap,

    // =========================================================================
    // Evaluation Context
    // =========================================================================
    /// Push the argument at an index.
    /// Operand: u16 argument index
    GetArgument,
    /// Push the receiver.
    GetThis,
    /// Push the bean of a type.
    /// Operand: u16 constant index (type)
    GetBean,
    /// Pop a key, push the environment property (or null).
    GetEnv,

    // =========================================================================
    // Arithmetic (i32)
    // =========================================================================
    AddI32,
    SubI32,
    MulI32,
    DivI32,
    ModI32,
    NegI32,

    // =========================================================================
    // Arithmetic (i64)
    // =========================================================================
    AddI64,
    SubI64,
    MulI64,
    DivI64,
    ModI64,
    NegI64,
    /// Exponentiation of two i64 values.
    PowI64,

    // =========================================================================
    // Arithmetic (f32)
    // =========================================================================
    AddF32,
    SubF32,
    MulF32,
    DivF32,
    ModF32,
    NegF32,

    // =========================================================================
    // Arithmetic (f64)
    // =========================================================================
    AddF64,
    SubF64,
    MulF64,
    DivF64,
    ModF64,
    NegF64,
    /// Exponentiation of two f64 values.
    PowF64,

    // =========================================================================
    // Strings
    // =========================================================================
    /// Pop N values, push their concatenated text.
    /// Operand: u16 count
    Concat,

    // =========================================================================
    // Comparison
    // =========================================================================
    /// Null-safe structural equality of the top two values.
    EqValue,
    LtI32,
    LeI32,
    GtI32,
    GeI32,
    LtI64,
    LeI64,
    GtI64,
    GeI64,
    LtF32,
    LeF32,
    GtF32,
    GeF32,
    LtF64,
    LeF64,
    GtF64,
    GeF64,

    // =========================================================================
    // Logical
    // =========================================================================
    /// Logical NOT.
    Not,

    // =========================================================================
    // Conversions
    // =========================================================================
    I32toI64,
    I32toF32,
    I32toF64,
    I64toF32,
    I64toF64,
    F32toF64,
    /// Fail on null before a boxed value is used as a primitive.
    Unbox,

    // =========================================================================
    // Type Checks
    // =========================================================================
    /// Pop a value, push whether it is an instance of a type.
    /// Operand: u16 constant index (type)
    InstanceOf,
    /// Fail unless the top value is an instance of a type. Null passes
    /// reference types only.
    /// Operand: u16 constant index (type)
    CheckCast,

    // =========================================================================
    // Control Flow
    // =========================================================================
    /// Unconditional forward jump.
    /// Operand: u16 offset
    Jump,
    /// Jump if top is false (does not pop).
    /// Operand: u16 offset
    JumpIfFalse,
    /// Jump if top is true (does not pop).
    /// Operand: u16 offset
    JumpIfTrue,
    /// Jump if top is null (does not pop).
    /// Operand: u16 offset
    JumpIfNull,
    /// Jump if top is not null (does not pop).
    /// Operand: u16 offset
    JumpIfNotNull,

    // =========================================================================
    // Calls
    // =========================================================================
    /// Call a method on a receiver below its arguments.
    /// Operand: u16 function index, u8 argument count
    CallMethod,
    /// Call a static method.
    /// Operand: u16 function index, u8 argument count
    CallStatic,

    // =========================================================================
    // Collections
    // =========================================================================
    /// Pop N values, push an array of them.
    /// Operand: u16 count
    NewArray,
    /// Pop an int index and an array or list, push the element.
    Index,
    /// Pop a key and a map, push the value (or null).
    MapGet,
    /// Pop an array, push its length.
    ArrayLength,
    /// Pop a value, push whether it is null or an empty string or collection.
    IsEmpty,

    // =========================================================================
    // Regex
    // =========================================================================
    /// Pop a string, push whether it fully matches a pattern.
    /// Operand: u16 regex index
    Matches,

    /// Finish evaluation with the top of stack.
    Return,
}

impl OpCode {
    /// Convert from u8, returning None for invalid values.
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::try_from(value).ok()
    }

    /// Get the size of operands for this opcode in bytes.
    ///
    /// This does NOT include the opcode byte itself.
    pub fn operand_size(&self) -> usize {
        match self {
            OpCode::Constant => 1,
            OpCode::ConstantWide
            | OpCode::GetArgument
            | OpCode::GetBean
            | OpCode::Concat
            | OpCode::InstanceOf
            | OpCode::CheckCast
            | OpCode::Jump
            | OpCode::JumpIfFalse
            | OpCode::JumpIfTrue
            | OpCode::JumpIfNull
            | OpCode::JumpIfNotNull
            | OpCode::NewArray
            | OpCode::Matches => 2,
            OpCode::CallMethod | OpCode::CallStatic => 3,
            _ => 0,
        }
    }

    /// Get the name of this opcode for debugging.
    pub fn name(&self) -> &'static str {
        match self {
            OpCode::Constant => "CONSTANT",
            OpCode::ConstantWide => "CONSTANT_WIDE",
            OpCode::PushNull => "PUSH_NULL",
            OpCode::PushTrue => "PUSH_TRUE",
            OpCode::PushFalse => "PUSH_FALSE",
            OpCode::PushZero => "PUSH_ZERO",
            OpCode::PushOne => "PUSH_ONE",
            OpCode::Pop => "POP",
            OpCode::Dup => "DUP",
            OpCode::Swap => "SWAP",
            OpCode::GetArgument => "GET_ARGUMENT",
            OpCode::GetThis => "GET_THIS",
            OpCode::GetBean => "GET_BEAN",
            OpCode::GetEnv => "GET_ENV",
            OpCode::AddI32 => "ADD_I32",
            OpCode::SubI32 => "SUB_I32",
            OpCode::MulI32 => "MUL_I32",
            OpCode::DivI32 => "DIV_I32",
            OpCode::ModI32 => "MOD_I32",
            OpCode::NegI32 => "NEG_I32",
            OpCode::AddI64 => "ADD_I64",
            OpCode::SubI64 => "SUB_I64",
            OpCode::MulI64 => "MUL_I64",
            OpCode::DivI64 => "DIV_I64",
            OpCode::ModI64 => "MOD_I64",
            OpCode::NegI64 => "NEG_I64",
            OpCode::PowI64 => "POW_I64",
            OpCode::AddF32 => "ADD_F32",
            OpCode::SubF32 => "SUB_F32",
            OpCode::MulF32 => "MUL_F32",
            OpCode::DivF32 => "DIV_F32",
            OpCode::ModF32 => "MOD_F32",
            OpCode::NegF32 => "NEG_F32",
            OpCode::AddF64 => "ADD_F64",
            OpCode::SubF64 => "SUB_F64",
            OpCode::MulF64 => "MUL_F64",
            OpCode::DivF64 => "DIV_F64",
            OpCode::ModF64 => "MOD_F64",
            OpCode::NegF64 => "NEG_F64",
            OpCode::PowF64 => "POW_F64",
            OpCode::Concat => "CONCAT",
            OpCode::EqValue => "EQ_VALUE",
            OpCode::LtI32 => "LT_I32",
            OpCode::LeI32 => "LE_I32",
            OpCode::GtI32 => "GT_I32",
            OpCode::GeI32 => "GE_I32",
            OpCode::LtI64 => "LT_I64",
            OpCode::LeI64 => "LE_I64",
            OpCode::GtI64 => "GT_I64",
            OpCode::GeI64 => "GE_I64",
            OpCode::LtF32 => "LT_F32",
            OpCode::LeF32 => "LE_F32",
            OpCode::GtF32 => "GT_F32",
            OpCode::GeF32 => "GE_F32",
            OpCode::LtF64 => "LT_F64",
            OpCode::LeF64 => "LE_F64",
            OpCode::GtF64 => "GT_F64",
            OpCode::GeF64 => "GE_F64",
            OpCode::Not => "NOT",
            OpCode::I32toI64 => "I32_TO_I64",
            OpCode::I32toF32 => "I32_TO_F32",
            OpCode::I32toF64 => "I32_TO_F64",
            OpCode::I64toF32 => "I64_TO_F32",
            OpCode::I64toF64 => "I64_TO_F64",
            OpCode::F32toF64 => "F32_TO_F64",
            OpCode::Unbox => "UNBOX",
            OpCode::InstanceOf => "INSTANCE_OF",
            OpCode::CheckCast => "CHECK_CAST",
            OpCode::Jump => "JUMP",
            OpCode::JumpIfFalse => "JUMP_IF_FALSE",
            OpCode::JumpIfTrue => "JUMP_IF_TRUE",
            OpCode::JumpIfNull => "JUMP_IF_NULL",
            OpCode::JumpIfNotNull => "JUMP_IF_NOT_NULL",
            OpCode::CallMethod => "CALL_METHOD",
            OpCode::CallStatic => "CALL_STATIC",
            OpCode::NewArray => "NEW_ARRAY",
            OpCode::Index => "INDEX",
            OpCode::MapGet => "MAP_GET",
            OpCode::ArrayLength => "ARRAY_LENGTH",
            OpCode::IsEmpty => "IS_EMPTY",
            OpCode::Matches => "MATCHES",
            OpCode::Return => "RETURN",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_repr() {
        assert_eq!(OpCode::Constant as u8, 0);
        assert_eq!(u8::from(OpCode::ConstantWide), 1);
    }

    #[test]
    fn opcode_from_u8() {
        assert_eq!(OpCode::from_u8(0), Some(OpCode::Constant));
        assert_eq!(OpCode::from_u8(OpCode::Return as u8), Some(OpCode::Return));
        assert_eq!(OpCode::from_u8(OpCode::Return as u8 + 1), None);
        assert_eq!(OpCode::from_u8(255), None);
    }

    #[test]
    fn opcode_name() {
        assert_eq!(OpCode::AddI32.name(), "ADD_I32");
        assert_eq!(OpCode::JumpIfNotNull.name(), "JUMP_IF_NOT_NULL");
    }

    #[test]
    fn operand_sizes() {
        assert_eq!(OpCode::Pop.operand_size(), 0);
        assert_eq!(OpCode::EqValue.operand_size(), 0);
        assert_eq!(OpCode::Constant.operand_size(), 1);
        assert_eq!(OpCode::ConstantWide.operand_size(), 2);
        assert_eq!(OpCode::JumpIfFalse.operand_size(), 2);
        assert_eq!(OpCode::Concat.operand_size(), 2);
        assert_eq!(OpCode::CallMethod.operand_size(), 3);
        assert_eq!(OpCode::CallStatic.operand_size(), 3);
    }
}
