//! The AVM2 instruction catalogue.
//!
//! Every instruction is `[opcode: u8][operands...]`; the opcode byte fully
//! determines the variant, so decode/encode are mutual inverses per variant
//! with no cross-opcode ambiguity. Pool indices travel as U30, branch
//! offsets as s24 relative to the end of the branch instruction
//! (`LookupSwitch` offsets are relative to its own start).

use abcedit_abc::ConstantPool;
use abcedit_core::{ByteReader, ByteWriter, CoreError, CoreResult};
use tracing::trace;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::machine::{Machine, MachineError, Value};

/// Opcode bytes of the catalogue.
pub mod op {
    #![allow(missing_docs)]

    pub const NOP: u8 = 0x02;
    pub const THROW: u8 = 0x03;
    pub const GET_SUPER: u8 = 0x04;
    pub const SET_SUPER: u8 = 0x05;
    pub const KILL: u8 = 0x08;
    pub const LABEL: u8 = 0x09;
    pub const IF_NLT: u8 = 0x0C;
    pub const IF_NLE: u8 = 0x0D;
    pub const IF_NGT: u8 = 0x0E;
    pub const IF_NGE: u8 = 0x0F;
    pub const JUMP: u8 = 0x10;
    pub const IF_TRUE: u8 = 0x11;
    pub const IF_FALSE: u8 = 0x12;
    pub const IF_EQ: u8 = 0x13;
    pub const IF_NE: u8 = 0x14;
    pub const IF_LT: u8 = 0x15;
    pub const IF_LE: u8 = 0x16;
    pub const IF_GT: u8 = 0x17;
    pub const IF_GE: u8 = 0x18;
    pub const IF_STRICT_EQ: u8 = 0x19;
    pub const IF_STRICT_NE: u8 = 0x1A;
    pub const LOOKUP_SWITCH: u8 = 0x1B;
    pub const PUSH_WITH: u8 = 0x1C;
    pub const POP_SCOPE: u8 = 0x1D;
    pub const NEXT_NAME: u8 = 0x1E;
    pub const HAS_NEXT: u8 = 0x1F;
    pub const PUSH_NULL: u8 = 0x20;
    pub const PUSH_UNDEFINED: u8 = 0x21;
    pub const NEXT_VALUE: u8 = 0x23;
    pub const PUSH_BYTE: u8 = 0x24;
    pub const PUSH_SHORT: u8 = 0x25;
    pub const PUSH_TRUE: u8 = 0x26;
    pub const PUSH_FALSE: u8 = 0x27;
    pub const PUSH_NAN: u8 = 0x28;
    pub const POP: u8 = 0x29;
    pub const DUP: u8 = 0x2A;
    pub const SWAP: u8 = 0x2B;
    pub const PUSH_STRING: u8 = 0x2C;
    pub const PUSH_SCOPE: u8 = 0x30;
    pub const HAS_NEXT2: u8 = 0x32;
    pub const NEW_FUNCTION: u8 = 0x40;
    pub const CALL: u8 = 0x41;
    pub const CONSTRUCT: u8 = 0x42;
    pub const CALL_SUPER: u8 = 0x45;
    pub const CALL_PROPERTY: u8 = 0x46;
    pub const RETURN_VOID: u8 = 0x47;
    pub const RETURN_VALUE: u8 = 0x48;
    pub const CONSTRUCT_SUPER: u8 = 0x49;
    pub const CONSTRUCT_PROP: u8 = 0x4A;
    pub const CALL_PROP_LEX: u8 = 0x4C;
    pub const CALL_SUPER_VOID: u8 = 0x4E;
    pub const CALL_PROP_VOID: u8 = 0x4F;
    pub const APPLY_TYPE: u8 = 0x53;
    pub const NEW_OBJECT: u8 = 0x55;
    pub const NEW_ARRAY: u8 = 0x56;
    pub const NEW_ACTIVATION: u8 = 0x57;
    pub const NEW_CLASS: u8 = 0x58;
    pub const GET_DESCENDANTS: u8 = 0x59;
    pub const NEW_CATCH: u8 = 0x5A;
    pub const FIND_PROP_STRICT: u8 = 0x5D;
    pub const FIND_PROPERTY: u8 = 0x5E;
    pub const GET_LEX: u8 = 0x60;
    pub const SET_PROPERTY: u8 = 0x61;
    pub const GET_LOCAL: u8 = 0x62;
    pub const SET_LOCAL: u8 = 0x63;
    pub const GET_GLOBAL_SCOPE: u8 = 0x64;
    pub const GET_SCOPE_OBJECT: u8 = 0x65;
    pub const GET_PROPERTY: u8 = 0x66;
    pub const INIT_PROPERTY: u8 = 0x68;
    pub const DELETE_PROPERTY: u8 = 0x6A;
    pub const GET_SLOT: u8 = 0x6C;
    pub const SET_SLOT: u8 = 0x6D;
    pub const CONVERT_S: u8 = 0x70;
    pub const CONVERT_I: u8 = 0x73;
    pub const CONVERT_U: u8 = 0x74;
    pub const CONVERT_D: u8 = 0x75;
    pub const CONVERT_B: u8 = 0x76;
    pub const COERCE: u8 = 0x80;
    pub const COERCE_A: u8 = 0x82;
    pub const COERCE_S: u8 = 0x85;
    pub const AS_TYPE: u8 = 0x86;
    pub const AS_TYPE_LATE: u8 = 0x87;
    pub const NEGATE: u8 = 0x90;
    pub const INCREMENT: u8 = 0x91;
    pub const DECREMENT: u8 = 0x93;
    pub const TYPE_OF: u8 = 0x95;
    pub const NOT: u8 = 0x96;
    pub const BIT_NOT: u8 = 0x97;
    pub const ADD: u8 = 0xA0;
    pub const SUBTRACT: u8 = 0xA1;
    pub const MULTIPLY: u8 = 0xA2;
    pub const DIVIDE: u8 = 0xA3;
    pub const MODULO: u8 = 0xA4;
    pub const LSHIFT: u8 = 0xA5;
    pub const RSHIFT: u8 = 0xA6;
    pub const URSHIFT: u8 = 0xA7;
    pub const BIT_AND: u8 = 0xA8;
    pub const BIT_OR: u8 = 0xA9;
    pub const BIT_XOR: u8 = 0xAA;
    pub const EQUALS: u8 = 0xAB;
    pub const STRICT_EQUALS: u8 = 0xAC;
    pub const LESS_THAN: u8 = 0xAD;
    pub const LESS_EQUALS: u8 = 0xAE;
    pub const GREATER_THAN: u8 = 0xAF;
    pub const GREATER_EQUALS: u8 = 0xB0;
    pub const INSTANCE_OF: u8 = 0xB1;
    pub const IS_TYPE: u8 = 0xB2;
    pub const IS_TYPE_LATE: u8 = 0xB3;
    pub const INCREMENT_I: u8 = 0xC0;
    pub const DECREMENT_I: u8 = 0xC1;
    pub const NEGATE_I: u8 = 0xC4;
    pub const ADD_I: u8 = 0xC5;
    pub const SUBTRACT_I: u8 = 0xC6;
    pub const MULTIPLY_I: u8 = 0xC7;
    pub const GET_LOCAL_0: u8 = 0xD0;
    pub const GET_LOCAL_1: u8 = 0xD1;
    pub const GET_LOCAL_2: u8 = 0xD2;
    pub const GET_LOCAL_3: u8 = 0xD3;
    pub const SET_LOCAL_0: u8 = 0xD4;
    pub const SET_LOCAL_1: u8 = 0xD5;
    pub const SET_LOCAL_2: u8 = 0xD6;
    pub const SET_LOCAL_3: u8 = 0xD7;
    pub const DEBUG: u8 = 0xEF;
    pub const DEBUG_LINE: u8 = 0xF0;
    pub const DEBUG_FILE: u8 = 0xF1;
}

/// One decoded instruction.
///
/// Closed tagged union: each variant carries exactly its operand fields.
/// Multiname operands are pool indices, never resolved entries.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(missing_docs)]
pub enum Instruction {
    // Literals
    PushNull,
    PushUndefined,
    PushTrue,
    PushFalse,
    PushNan,
    PushByte { value: i8 },
    PushShort { value: i32 },
    PushString { string_index: u32 },

    // Stack manipulation
    Dup,
    Swap,
    Pop,

    // Locals
    GetLocal0,
    GetLocal1,
    GetLocal2,
    GetLocal3,
    SetLocal0,
    SetLocal1,
    SetLocal2,
    SetLocal3,
    GetLocal { register: u32 },
    SetLocal { register: u32 },
    Kill { register: u32 },

    // Scopes
    PushScope,
    PushWith,
    PopScope,
    GetGlobalScope,
    GetScopeObject { index: u8 },

    // Arithmetic
    Add,
    AddI,
    Subtract,
    SubtractI,
    Multiply,
    MultiplyI,
    Divide,
    Modulo,
    Negate,
    NegateI,
    Increment,
    IncrementI,
    Decrement,
    DecrementI,

    // Bitwise
    BitAnd,
    BitOr,
    BitXor,
    BitNot,
    LShift,
    RShift,
    URShift,

    // Comparison / logic
    Equals,
    StrictEquals,
    LessThan,
    LessEquals,
    GreaterThan,
    GreaterEquals,
    Not,

    // Types
    TypeOf,
    InstanceOf,
    IsType { multiname_index: u32 },
    IsTypeLate,
    AsType { multiname_index: u32 },
    AsTypeLate,
    Coerce { multiname_index: u32 },
    CoerceA,
    CoerceS,
    ConvertS,
    ConvertI,
    ConvertU,
    ConvertD,
    ConvertB,

    // Properties
    GetProperty { multiname_index: u32 },
    SetProperty { multiname_index: u32 },
    InitProperty { multiname_index: u32 },
    DeleteProperty { multiname_index: u32 },
    FindProperty { multiname_index: u32 },
    FindPropStrict { multiname_index: u32 },
    GetLex { multiname_index: u32 },
    GetDescendants { multiname_index: u32 },
    GetSuper { multiname_index: u32 },
    SetSuper { multiname_index: u32 },
    GetSlot { slot_index: u32 },
    SetSlot { slot_index: u32 },

    // Calls and construction
    Call { arg_count: u32 },
    CallProperty { multiname_index: u32, arg_count: u32 },
    CallPropLex { multiname_index: u32, arg_count: u32 },
    CallPropVoid { multiname_index: u32, arg_count: u32 },
    CallSuper { multiname_index: u32, arg_count: u32 },
    CallSuperVoid { multiname_index: u32, arg_count: u32 },
    Construct { arg_count: u32 },
    ConstructProp { multiname_index: u32, arg_count: u32 },
    ConstructSuper { arg_count: u32 },
    ApplyType { arg_count: u32 },
    NewArray { arg_count: u32 },
    NewObject { property_count: u32 },
    NewFunction { method_index: u32 },
    NewClass { class_index: u32 },
    NewCatch { exception_index: u32 },
    NewActivation,

    // Control flow
    Jump { offset: i32 },
    IfTrue { offset: i32 },
    IfFalse { offset: i32 },
    IfEq { offset: i32 },
    IfNe { offset: i32 },
    IfLt { offset: i32 },
    IfLe { offset: i32 },
    IfGt { offset: i32 },
    IfGe { offset: i32 },
    IfStrictEq { offset: i32 },
    IfStrictNe { offset: i32 },
    IfNlt { offset: i32 },
    IfNle { offset: i32 },
    IfNgt { offset: i32 },
    IfNge { offset: i32 },
    LookupSwitch { default_offset: i32, case_offsets: Vec<i32> },
    Label,

    // Iteration
    HasNext,
    HasNext2 { object_register: u32, index_register: u32 },
    NextName,
    NextValue,

    // Returns and exceptions
    ReturnVoid,
    ReturnValue,
    Throw,

    // Misc
    Nop,
    Debug { debug_type: u8, name_index: u32, register: u8, extra: u32 },
    DebugLine { line: u32 },
    DebugFile { string_index: u32 },
}

impl Instruction {
    /// The opcode byte identifying this variant.
    pub const fn opcode(&self) -> u8 {
        use Instruction as I;
        match self {
            I::PushNull => op::PUSH_NULL,
            I::PushUndefined => op::PUSH_UNDEFINED,
            I::PushTrue => op::PUSH_TRUE,
            I::PushFalse => op::PUSH_FALSE,
            I::PushNan => op::PUSH_NAN,
            I::PushByte { .. } => op::PUSH_BYTE,
            I::PushShort { .. } => op::PUSH_SHORT,
            I::PushString { .. } => op::PUSH_STRING,
            I::Dup => op::DUP,
            I::Swap => op::SWAP,
            I::Pop => op::POP,
            I::GetLocal0 => op::GET_LOCAL_0,
            I::GetLocal1 => op::GET_LOCAL_1,
            I::GetLocal2 => op::GET_LOCAL_2,
            I::GetLocal3 => op::GET_LOCAL_3,
            I::SetLocal0 => op::SET_LOCAL_0,
            I::SetLocal1 => op::SET_LOCAL_1,
            I::SetLocal2 => op::SET_LOCAL_2,
            I::SetLocal3 => op::SET_LOCAL_3,
            I::GetLocal { .. } => op::GET_LOCAL,
            I::SetLocal { .. } => op::SET_LOCAL,
            I::Kill { .. } => op::KILL,
            I::PushScope => op::PUSH_SCOPE,
            I::PushWith => op::PUSH_WITH,
            I::PopScope => op::POP_SCOPE,
            I::GetGlobalScope => op::GET_GLOBAL_SCOPE,
            I::GetScopeObject { .. } => op::GET_SCOPE_OBJECT,
            I::Add => op::ADD,
            I::AddI => op::ADD_I,
            I::Subtract => op::SUBTRACT,
            I::SubtractI => op::SUBTRACT_I,
            I::Multiply => op::MULTIPLY,
            I::MultiplyI => op::MULTIPLY_I,
            I::Divide => op::DIVIDE,
            I::Modulo => op::MODULO,
            I::Negate => op::NEGATE,
            I::NegateI => op::NEGATE_I,
            I::Increment => op::INCREMENT,
            I::IncrementI => op::INCREMENT_I,
            I::Decrement => op::DECREMENT,
            I::DecrementI => op::DECREMENT_I,
            I::BitAnd => op::BIT_AND,
            I::BitOr => op::BIT_OR,
            I::BitXor => op::BIT_XOR,
            I::BitNot => op::BIT_NOT,
            I::LShift => op::LSHIFT,
            I::RShift => op::RSHIFT,
            I::URShift => op::URSHIFT,
            I::Equals => op::EQUALS,
            I::StrictEquals => op::STRICT_EQUALS,
            I::LessThan => op::LESS_THAN,
            I::LessEquals => op::LESS_EQUALS,
            I::GreaterThan => op::GREATER_THAN,
            I::GreaterEquals => op::GREATER_EQUALS,
            I::Not => op::NOT,
            I::TypeOf => op::TYPE_OF,
            I::InstanceOf => op::INSTANCE_OF,
            I::IsType { .. } => op::IS_TYPE,
            I::IsTypeLate => op::IS_TYPE_LATE,
            I::AsType { .. } => op::AS_TYPE,
            I::AsTypeLate => op::AS_TYPE_LATE,
            I::Coerce { .. } => op::COERCE,
            I::CoerceA => op::COERCE_A,
            I::CoerceS => op::COERCE_S,
            I::ConvertS => op::CONVERT_S,
            I::ConvertI => op::CONVERT_I,
            I::ConvertU => op::CONVERT_U,
            I::ConvertD => op::CONVERT_D,
            I::ConvertB => op::CONVERT_B,
            I::GetProperty { .. } => op::GET_PROPERTY,
            I::SetProperty { .. } => op::SET_PROPERTY,
            I::InitProperty { .. } => op::INIT_PROPERTY,
            I::DeleteProperty { .. } => op::DELETE_PROPERTY,
            I::FindProperty { .. } => op::FIND_PROPERTY,
            I::FindPropStrict { .. } => op::FIND_PROP_STRICT,
            I::GetLex { .. } => op::GET_LEX,
            I::GetDescendants { .. } => op::GET_DESCENDANTS,
            I::GetSuper { .. } => op::GET_SUPER,
            I::SetSuper { .. } => op::SET_SUPER,
            I::GetSlot { .. } => op::GET_SLOT,
            I::SetSlot { .. } => op::SET_SLOT,
            I::Call { .. } => op::CALL,
            I::CallProperty { .. } => op::CALL_PROPERTY,
            I::CallPropLex { .. } => op::CALL_PROP_LEX,
            I::CallPropVoid { .. } => op::CALL_PROP_VOID,
            I::CallSuper { .. } => op::CALL_SUPER,
            I::CallSuperVoid { .. } => op::CALL_SUPER_VOID,
            I::Construct { .. } => op::CONSTRUCT,
            I::ConstructProp { .. } => op::CONSTRUCT_PROP,
            I::ConstructSuper { .. } => op::CONSTRUCT_SUPER,
            I::ApplyType { .. } => op::APPLY_TYPE,
            I::NewArray { .. } => op::NEW_ARRAY,
            I::NewObject { .. } => op::NEW_OBJECT,
            I::NewFunction { .. } => op::NEW_FUNCTION,
            I::NewClass { .. } => op::NEW_CLASS,
            I::NewCatch { .. } => op::NEW_CATCH,
            I::NewActivation => op::NEW_ACTIVATION,
            I::Jump { .. } => op::JUMP,
            I::IfTrue { .. } => op::IF_TRUE,
            I::IfFalse { .. } => op::IF_FALSE,
            I::IfEq { .. } => op::IF_EQ,
            I::IfNe { .. } => op::IF_NE,
            I::IfLt { .. } => op::IF_LT,
            I::IfLe { .. } => op::IF_LE,
            I::IfGt { .. } => op::IF_GT,
            I::IfGe { .. } => op::IF_GE,
            I::IfStrictEq { .. } => op::IF_STRICT_EQ,
            I::IfStrictNe { .. } => op::IF_STRICT_NE,
            I::IfNlt { .. } => op::IF_NLT,
            I::IfNle { .. } => op::IF_NLE,
            I::IfNgt { .. } => op::IF_NGT,
            I::IfNge { .. } => op::IF_NGE,
            I::LookupSwitch { .. } => op::LOOKUP_SWITCH,
            I::Label => op::LABEL,
            I::HasNext => op::HAS_NEXT,
            I::HasNext2 { .. } => op::HAS_NEXT2,
            I::NextName => op::NEXT_NAME,
            I::NextValue => op::NEXT_VALUE,
            I::ReturnVoid => op::RETURN_VOID,
            I::ReturnValue => op::RETURN_VALUE,
            I::Throw => op::THROW,
            I::Nop => op::NOP,
            I::Debug { .. } => op::DEBUG,
            I::DebugLine { .. } => op::DEBUG_LINE,
            I::DebugFile { .. } => op::DEBUG_FILE,
        }
    }

    /// Decode one instruction. An opcode outside the catalogue fails with
    /// [`CoreError::UnknownOpcode`].
    pub fn read_from(r: &mut ByteReader<'_>) -> CoreResult<Self> {
        use Instruction as I;
        let at = r.offset() as u64;
        let opcode = r.read_u8()?;
        let ins = match opcode {
            op::PUSH_NULL => I::PushNull,
            op::PUSH_UNDEFINED => I::PushUndefined,
            op::PUSH_TRUE => I::PushTrue,
            op::PUSH_FALSE => I::PushFalse,
            op::PUSH_NAN => I::PushNan,
            op::PUSH_BYTE => I::PushByte { value: r.read_u8()? as i8 },
            op::PUSH_SHORT => I::PushShort { value: r.read_u30()? as i32 },
            op::PUSH_STRING => I::PushString { string_index: r.read_u30()? },
            op::DUP => I::Dup,
            op::SWAP => I::Swap,
            op::POP => I::Pop,
            op::GET_LOCAL_0 => I::GetLocal0,
            op::GET_LOCAL_1 => I::GetLocal1,
            op::GET_LOCAL_2 => I::GetLocal2,
            op::GET_LOCAL_3 => I::GetLocal3,
            op::SET_LOCAL_0 => I::SetLocal0,
            op::SET_LOCAL_1 => I::SetLocal1,
            op::SET_LOCAL_2 => I::SetLocal2,
            op::SET_LOCAL_3 => I::SetLocal3,
            op::GET_LOCAL => I::GetLocal { register: r.read_u30()? },
            op::SET_LOCAL => I::SetLocal { register: r.read_u30()? },
            op::KILL => I::Kill { register: r.read_u30()? },
            op::PUSH_SCOPE => I::PushScope,
            op::PUSH_WITH => I::PushWith,
            op::POP_SCOPE => I::PopScope,
            op::GET_GLOBAL_SCOPE => I::GetGlobalScope,
            op::GET_SCOPE_OBJECT => I::GetScopeObject { index: r.read_u8()? },
            op::ADD => I::Add,
            op::ADD_I => I::AddI,
            op::SUBTRACT => I::Subtract,
            op::SUBTRACT_I => I::SubtractI,
            op::MULTIPLY => I::Multiply,
            op::MULTIPLY_I => I::MultiplyI,
            op::DIVIDE => I::Divide,
            op::MODULO => I::Modulo,
            op::NEGATE => I::Negate,
            op::NEGATE_I => I::NegateI,
            op::INCREMENT => I::Increment,
            op::INCREMENT_I => I::IncrementI,
            op::DECREMENT => I::Decrement,
            op::DECREMENT_I => I::DecrementI,
            op::BIT_AND => I::BitAnd,
            op::BIT_OR => I::BitOr,
            op::BIT_XOR => I::BitXor,
            op::BIT_NOT => I::BitNot,
            op::LSHIFT => I::LShift,
            op::RSHIFT => I::RShift,
            op::URSHIFT => I::URShift,
            op::EQUALS => I::Equals,
            op::STRICT_EQUALS => I::StrictEquals,
            op::LESS_THAN => I::LessThan,
            op::LESS_EQUALS => I::LessEquals,
            op::GREATER_THAN => I::GreaterThan,
            op::GREATER_EQUALS => I::GreaterEquals,
            op::NOT => I::Not,
            op::TYPE_OF => I::TypeOf,
            op::INSTANCE_OF => I::InstanceOf,
            op::IS_TYPE => I::IsType { multiname_index: r.read_u30()? },
            op::IS_TYPE_LATE => I::IsTypeLate,
            op::AS_TYPE => I::AsType { multiname_index: r.read_u30()? },
            op::AS_TYPE_LATE => I::AsTypeLate,
            op::COERCE => I::Coerce { multiname_index: r.read_u30()? },
            op::COERCE_A => I::CoerceA,
            op::COERCE_S => I::CoerceS,
            op::CONVERT_S => I::ConvertS,
            op::CONVERT_I => I::ConvertI,
            op::CONVERT_U => I::ConvertU,
            op::CONVERT_D => I::ConvertD,
            op::CONVERT_B => I::ConvertB,
            op::GET_PROPERTY => I::GetProperty { multiname_index: r.read_u30()? },
            op::SET_PROPERTY => I::SetProperty { multiname_index: r.read_u30()? },
            op::INIT_PROPERTY => I::InitProperty { multiname_index: r.read_u30()? },
            op::DELETE_PROPERTY => I::DeleteProperty { multiname_index: r.read_u30()? },
            op::FIND_PROPERTY => I::FindProperty { multiname_index: r.read_u30()? },
            op::FIND_PROP_STRICT => I::FindPropStrict { multiname_index: r.read_u30()? },
            op::GET_LEX => I::GetLex { multiname_index: r.read_u30()? },
            op::GET_DESCENDANTS => I::GetDescendants { multiname_index: r.read_u30()? },
            op::GET_SUPER => I::GetSuper { multiname_index: r.read_u30()? },
            op::SET_SUPER => I::SetSuper { multiname_index: r.read_u30()? },
            op::GET_SLOT => I::GetSlot { slot_index: r.read_u30()? },
            op::SET_SLOT => I::SetSlot { slot_index: r.read_u30()? },
            op::CALL => I::Call { arg_count: r.read_u30()? },
            op::CALL_PROPERTY => {
                I::CallProperty { multiname_index: r.read_u30()?, arg_count: r.read_u30()? }
            }
            op::CALL_PROP_LEX => {
                I::CallPropLex { multiname_index: r.read_u30()?, arg_count: r.read_u30()? }
            }
            op::CALL_PROP_VOID => {
                I::CallPropVoid { multiname_index: r.read_u30()?, arg_count: r.read_u30()? }
            }
            op::CALL_SUPER => {
                I::CallSuper { multiname_index: r.read_u30()?, arg_count: r.read_u30()? }
            }
            op::CALL_SUPER_VOID => {
                I::CallSuperVoid { multiname_index: r.read_u30()?, arg_count: r.read_u30()? }
            }
            op::CONSTRUCT => I::Construct { arg_count: r.read_u30()? },
            op::CONSTRUCT_PROP => {
                I::ConstructProp { multiname_index: r.read_u30()?, arg_count: r.read_u30()? }
            }
            op::CONSTRUCT_SUPER => I::ConstructSuper { arg_count: r.read_u30()? },
            op::APPLY_TYPE => I::ApplyType { arg_count: r.read_u30()? },
            op::NEW_ARRAY => I::NewArray { arg_count: r.read_u30()? },
            op::NEW_OBJECT => I::NewObject { property_count: r.read_u30()? },
            op::NEW_FUNCTION => I::NewFunction { method_index: r.read_u30()? },
            op::NEW_CLASS => I::NewClass { class_index: r.read_u30()? },
            op::NEW_CATCH => I::NewCatch { exception_index: r.read_u30()? },
            op::NEW_ACTIVATION => I::NewActivation,
            op::JUMP => I::Jump { offset: r.read_i24()? },
            op::IF_TRUE => I::IfTrue { offset: r.read_i24()? },
            op::IF_FALSE => I::IfFalse { offset: r.read_i24()? },
            op::IF_EQ => I::IfEq { offset: r.read_i24()? },
            op::IF_NE => I::IfNe { offset: r.read_i24()? },
            op::IF_LT => I::IfLt { offset: r.read_i24()? },
            op::IF_LE => I::IfLe { offset: r.read_i24()? },
            op::IF_GT => I::IfGt { offset: r.read_i24()? },
            op::IF_GE => I::IfGe { offset: r.read_i24()? },
            op::IF_STRICT_EQ => I::IfStrictEq { offset: r.read_i24()? },
            op::IF_STRICT_NE => I::IfStrictNe { offset: r.read_i24()? },
            op::IF_NLT => I::IfNlt { offset: r.read_i24()? },
            op::IF_NLE => I::IfNle { offset: r.read_i24()? },
            op::IF_NGT => I::IfNgt { offset: r.read_i24()? },
            op::IF_NGE => I::IfNge { offset: r.read_i24()? },
            op::LOOKUP_SWITCH => {
                let default_offset = r.read_i24()?;
                // The wire carries case_count - 1. Reservation capped by the
                // bytes left so a corrupt count errors instead of aborting.
                let count = r.read_u30()? as usize + 1;
                let mut case_offsets = Vec::with_capacity(count.min(r.remaining()));
                for _ in 0..count {
                    case_offsets.push(r.read_i24()?);
                }
                I::LookupSwitch { default_offset, case_offsets }
            }
            op::LABEL => I::Label,
            op::HAS_NEXT => I::HasNext,
            op::HAS_NEXT2 => {
                I::HasNext2 { object_register: r.read_u30()?, index_register: r.read_u30()? }
            }
            op::NEXT_NAME => I::NextName,
            op::NEXT_VALUE => I::NextValue,
            op::RETURN_VOID => I::ReturnVoid,
            op::RETURN_VALUE => I::ReturnValue,
            op::THROW => I::Throw,
            op::NOP => I::Nop,
            op::DEBUG => I::Debug {
                debug_type: r.read_u8()?,
                name_index: r.read_u30()?,
                register: r.read_u8()?,
                extra: r.read_u30()?,
            },
            op::DEBUG_LINE => I::DebugLine { line: r.read_u30()? },
            op::DEBUG_FILE => I::DebugFile { string_index: r.read_u30()? },
            _ => return Err(CoreError::UnknownOpcode { opcode, at }),
        };
        trace!(opcode, at, "decoded instruction");
        Ok(ins)
    }

    /// Encode, the exact inverse of [`Instruction::read_from`].
    pub fn write_to(&self, w: &mut ByteWriter) {
        use Instruction as I;
        w.write_u8(self.opcode());
        match self {
            I::PushByte { value } => w.write_u8(*value as u8),
            I::PushShort { value } => w.write_u30(*value as u32),
            I::PushString { string_index } | I::DebugFile { string_index } => {
                w.write_u30(*string_index);
            }
            I::GetLocal { register } | I::SetLocal { register } | I::Kill { register } => {
                w.write_u30(*register);
            }
            I::GetScopeObject { index } => w.write_u8(*index),
            I::IsType { multiname_index }
            | I::AsType { multiname_index }
            | I::Coerce { multiname_index }
            | I::GetProperty { multiname_index }
            | I::SetProperty { multiname_index }
            | I::InitProperty { multiname_index }
            | I::DeleteProperty { multiname_index }
            | I::FindProperty { multiname_index }
            | I::FindPropStrict { multiname_index }
            | I::GetLex { multiname_index }
            | I::GetDescendants { multiname_index }
            | I::GetSuper { multiname_index }
            | I::SetSuper { multiname_index } => w.write_u30(*multiname_index),
            I::GetSlot { slot_index } | I::SetSlot { slot_index } => w.write_u30(*slot_index),
            I::Call { arg_count }
            | I::Construct { arg_count }
            | I::ConstructSuper { arg_count }
            | I::ApplyType { arg_count }
            | I::NewArray { arg_count } => w.write_u30(*arg_count),
            I::CallProperty { multiname_index, arg_count }
            | I::CallPropLex { multiname_index, arg_count }
            | I::CallPropVoid { multiname_index, arg_count }
            | I::CallSuper { multiname_index, arg_count }
            | I::CallSuperVoid { multiname_index, arg_count }
            | I::ConstructProp { multiname_index, arg_count } => {
                w.write_u30(*multiname_index);
                w.write_u30(*arg_count);
            }
            I::NewObject { property_count } => w.write_u30(*property_count),
            I::NewFunction { method_index } => w.write_u30(*method_index),
            I::NewClass { class_index } => w.write_u30(*class_index),
            I::NewCatch { exception_index } => w.write_u30(*exception_index),
            I::Jump { offset }
            | I::IfTrue { offset }
            | I::IfFalse { offset }
            | I::IfEq { offset }
            | I::IfNe { offset }
            | I::IfLt { offset }
            | I::IfLe { offset }
            | I::IfGt { offset }
            | I::IfGe { offset }
            | I::IfStrictEq { offset }
            | I::IfStrictNe { offset }
            | I::IfNlt { offset }
            | I::IfNle { offset }
            | I::IfNgt { offset }
            | I::IfNge { offset } => w.write_i24(*offset),
            I::LookupSwitch { default_offset, case_offsets } => {
                w.write_i24(*default_offset);
                w.write_u30(case_offsets.len().saturating_sub(1) as u32);
                for &offset in case_offsets {
                    w.write_i24(offset);
                }
            }
            I::HasNext2 { object_register, index_register } => {
                w.write_u30(*object_register);
                w.write_u30(*index_register);
            }
            I::Debug { debug_type, name_index, register, extra } => {
                w.write_u8(*debug_type);
                w.write_u30(*name_index);
                w.write_u8(*register);
                w.write_u30(*extra);
            }
            I::DebugLine { line } => w.write_u30(*line),
            _ => {}
        }
    }

    /// Values consumed from the operand stack on execution.
    ///
    /// Operand-derived for call-style opcodes; a multiname operand adds one
    /// extra pop per runtime-supplied part (name, namespace). Arity queries
    /// are advisory: an unresolvable multiname index contributes zero
    /// extras, corrupt indices are reported at decode/resolve time instead.
    pub fn pop_count(&self, pool: &ConstantPool) -> u32 {
        use Instruction as I;
        match self {
            I::Add
            | I::AddI
            | I::Subtract
            | I::SubtractI
            | I::Multiply
            | I::MultiplyI
            | I::Divide
            | I::Modulo
            | I::BitAnd
            | I::BitOr
            | I::BitXor
            | I::LShift
            | I::RShift
            | I::URShift
            | I::Equals
            | I::StrictEquals
            | I::LessThan
            | I::LessEquals
            | I::GreaterThan
            | I::GreaterEquals
            | I::InstanceOf
            | I::IsTypeLate
            | I::AsTypeLate
            | I::Swap
            | I::SetSlot { .. }
            | I::IfEq { .. }
            | I::IfNe { .. }
            | I::IfLt { .. }
            | I::IfLe { .. }
            | I::IfGt { .. }
            | I::IfGe { .. }
            | I::IfStrictEq { .. }
            | I::IfStrictNe { .. }
            | I::IfNlt { .. }
            | I::IfNle { .. }
            | I::IfNgt { .. }
            | I::IfNge { .. }
            | I::HasNext
            | I::NextName
            | I::NextValue => 2,

            I::Negate
            | I::NegateI
            | I::Increment
            | I::IncrementI
            | I::Decrement
            | I::DecrementI
            | I::BitNot
            | I::Not
            | I::TypeOf
            | I::Dup
            | I::Pop
            | I::PushScope
            | I::PushWith
            | I::SetLocal0
            | I::SetLocal1
            | I::SetLocal2
            | I::SetLocal3
            | I::SetLocal { .. }
            | I::GetSlot { .. }
            | I::CoerceA
            | I::CoerceS
            | I::ConvertS
            | I::ConvertI
            | I::ConvertU
            | I::ConvertD
            | I::ConvertB
            | I::ReturnValue
            | I::Throw
            | I::IfTrue { .. }
            | I::IfFalse { .. }
            | I::LookupSwitch { .. }
            | I::NewClass { .. } => 1,

            I::IsType { multiname_index }
            | I::AsType { multiname_index }
            | I::Coerce { multiname_index }
            | I::GetProperty { multiname_index }
            | I::DeleteProperty { multiname_index }
            | I::GetDescendants { multiname_index }
            | I::GetSuper { multiname_index } => 1 + runtime_name_pops(pool, *multiname_index),

            I::SetProperty { multiname_index }
            | I::InitProperty { multiname_index }
            | I::SetSuper { multiname_index } => 2 + runtime_name_pops(pool, *multiname_index),

            I::FindProperty { multiname_index } | I::FindPropStrict { multiname_index } => {
                runtime_name_pops(pool, *multiname_index)
            }

            I::Call { arg_count } => 2 + arg_count,
            I::Construct { arg_count } | I::ConstructSuper { arg_count } => 1 + arg_count,
            I::ApplyType { arg_count } => 1 + arg_count,
            I::NewArray { arg_count } => *arg_count,
            I::NewObject { property_count } => 2 * property_count,

            I::CallProperty { multiname_index, arg_count }
            | I::CallPropLex { multiname_index, arg_count }
            | I::CallPropVoid { multiname_index, arg_count }
            | I::CallSuper { multiname_index, arg_count }
            | I::CallSuperVoid { multiname_index, arg_count }
            | I::ConstructProp { multiname_index, arg_count } => {
                1 + arg_count + runtime_name_pops(pool, *multiname_index)
            }

            _ => 0,
        }
    }

    /// Values produced on the operand stack on execution.
    pub const fn push_count(&self) -> u32 {
        use Instruction as I;
        match self {
            I::Dup => 2,
            I::Swap => 2,

            I::PushNull
            | I::PushUndefined
            | I::PushTrue
            | I::PushFalse
            | I::PushNan
            | I::PushByte { .. }
            | I::PushShort { .. }
            | I::PushString { .. }
            | I::GetLocal0
            | I::GetLocal1
            | I::GetLocal2
            | I::GetLocal3
            | I::GetLocal { .. }
            | I::GetGlobalScope
            | I::GetScopeObject { .. }
            | I::Add
            | I::AddI
            | I::Subtract
            | I::SubtractI
            | I::Multiply
            | I::MultiplyI
            | I::Divide
            | I::Modulo
            | I::Negate
            | I::NegateI
            | I::Increment
            | I::IncrementI
            | I::Decrement
            | I::DecrementI
            | I::BitAnd
            | I::BitOr
            | I::BitXor
            | I::BitNot
            | I::LShift
            | I::RShift
            | I::URShift
            | I::Equals
            | I::StrictEquals
            | I::LessThan
            | I::LessEquals
            | I::GreaterThan
            | I::GreaterEquals
            | I::Not
            | I::TypeOf
            | I::InstanceOf
            | I::IsType { .. }
            | I::IsTypeLate
            | I::AsType { .. }
            | I::AsTypeLate
            | I::Coerce { .. }
            | I::CoerceA
            | I::CoerceS
            | I::ConvertS
            | I::ConvertI
            | I::ConvertU
            | I::ConvertD
            | I::ConvertB
            | I::GetProperty { .. }
            | I::DeleteProperty { .. }
            | I::FindProperty { .. }
            | I::FindPropStrict { .. }
            | I::GetLex { .. }
            | I::GetDescendants { .. }
            | I::GetSuper { .. }
            | I::GetSlot { .. }
            | I::Call { .. }
            | I::CallProperty { .. }
            | I::CallPropLex { .. }
            | I::CallSuper { .. }
            | I::Construct { .. }
            | I::ConstructProp { .. }
            | I::ApplyType { .. }
            | I::NewArray { .. }
            | I::NewObject { .. }
            | I::NewFunction { .. }
            | I::NewClass { .. }
            | I::NewCatch { .. }
            | I::NewActivation
            | I::HasNext
            | I::HasNext2 { .. }
            | I::NextName
            | I::NextValue => 1,

            _ => 0,
        }
    }

    /// Execute this instruction against a machine.
    ///
    /// Supported for the literal, stack-manipulation, arithmetic, bitwise,
    /// comparison and conversion subset; everything else returns
    /// [`MachineError::Unsupported`]. Execution pops exactly
    /// [`Instruction::pop_count`] values and pushes exactly
    /// [`Instruction::push_count`].
    pub fn execute(&self, m: &mut Machine, pool: &ConstantPool) -> Result<(), MachineError> {
        use Instruction as I;
        match self {
            I::PushNull | I::PushUndefined => m.push(Value::Null),
            I::PushTrue => m.push(Value::Bool(true)),
            I::PushFalse => m.push(Value::Bool(false)),
            I::PushNan => m.push(Value::Number(f64::NAN)),
            I::PushByte { value } => m.push(Value::Number(f64::from(*value))),
            I::PushShort { value } => m.push(Value::Number(f64::from(*value))),
            I::PushString { string_index } => {
                let s = pool.string(*string_index)?;
                m.push(Value::Str(s.to_owned()));
            }

            I::Dup => {
                let v = m.pop()?;
                m.push(v.clone());
                m.push(v);
            }
            I::Swap => {
                let b = m.pop()?;
                let a = m.pop()?;
                m.push(b);
                m.push(a);
            }
            I::Pop => {
                m.pop()?;
            }

            I::Add => {
                let b = m.pop()?;
                let a = m.pop()?;
                // String concatenation wins when both sides are strings.
                if let (Value::Str(x), Value::Str(y)) = (&a, &b) {
                    m.push(Value::Str(format!("{x}{y}")));
                } else {
                    m.push(numeric_binary(&a, &b, |x, y| x + y));
                }
            }
            I::Subtract => binary(m, |x, y| x - y)?,
            I::Multiply => binary(m, |x, y| x * y)?,
            I::Divide => binary(m, |x, y| x / y)?,
            I::Modulo => binary(m, |x, y| x % y)?,
            I::AddI => binary_i32(m, i32::wrapping_add)?,
            I::SubtractI => binary_i32(m, i32::wrapping_sub)?,
            I::MultiplyI => binary_i32(m, i32::wrapping_mul)?,
            I::Negate => unary(m, |x| -x)?,
            I::NegateI => unary(m, |x| f64::from(to_int32(x).wrapping_neg()))?,
            I::Increment => unary(m, |x| x + 1.0)?,
            I::Decrement => unary(m, |x| x - 1.0)?,
            I::IncrementI => unary(m, |x| f64::from(to_int32(x).wrapping_add(1)))?,
            I::DecrementI => unary(m, |x| f64::from(to_int32(x).wrapping_sub(1)))?,

            I::BitAnd => binary_i32(m, |x, y| x & y)?,
            I::BitOr => binary_i32(m, |x, y| x | y)?,
            I::BitXor => binary_i32(m, |x, y| x ^ y)?,
            I::BitNot => unary(m, |x| f64::from(!to_int32(x)))?,
            I::LShift => binary_i32(m, |x, y| x << (y & 31))?,
            I::RShift => binary_i32(m, |x, y| x >> (y & 31))?,
            I::URShift => {
                binary(m, |x, y| f64::from((to_int32(x) as u32) >> (to_int32(y) & 31)))?;
            }

            I::Equals => {
                let b = m.pop()?;
                let a = m.pop()?;
                m.push(Value::Bool(loose_equals(&a, &b)));
            }
            I::StrictEquals => {
                let b = m.pop()?;
                let a = m.pop()?;
                m.push(Value::Bool(a == b));
            }
            I::LessThan => compare(m, |x, y| x < y)?,
            I::LessEquals => compare(m, |x, y| x <= y)?,
            I::GreaterThan => compare(m, |x, y| x > y)?,
            I::GreaterEquals => compare(m, |x, y| x >= y)?,
            I::Not => {
                let v = m.pop()?;
                m.push(Value::Bool(!v.truthy()));
            }
            I::TypeOf => {
                let v = m.pop()?;
                m.push(Value::Str(v.type_name().to_owned()));
            }

            I::CoerceA => {
                let v = m.pop()?;
                m.push(v);
            }
            I::ConvertB => {
                let v = m.pop()?;
                m.push(Value::Bool(v.truthy()));
            }
            I::ConvertD => unary(m, |x| x)?,
            I::ConvertI => unary(m, |x| f64::from(to_int32(x)))?,
            I::ConvertU => unary(m, |x| f64::from(to_int32(x) as u32))?,
            I::ConvertS | I::CoerceS => {
                let v = m.pop()?;
                let out = match v {
                    Value::Null => Value::Null,
                    Value::Str(s) => Value::Str(s),
                    Value::Bool(b) => Value::Str(b.to_string()),
                    Value::Number(n) => Value::Str(n.to_string()),
                    Value::Object(tag) => Value::Str(tag),
                };
                m.push(out);
            }

            I::Nop | I::Label => {}

            _ => return Err(MachineError::Unsupported { opcode: self.opcode() }),
        }
        Ok(())
    }
}

/// Decode a whole method-body code blob.
pub fn read_code(code: &[u8]) -> CoreResult<Vec<Instruction>> {
    let mut r = ByteReader::new(code);
    let mut out = Vec::new();
    while r.remaining() > 0 {
        out.push(Instruction::read_from(&mut r)?);
    }
    Ok(out)
}

/// Encode a sequence of instructions back to bytes.
pub fn write_code(code: &[Instruction]) -> Vec<u8> {
    let mut w = ByteWriter::new();
    for ins in code {
        ins.write_to(&mut w);
    }
    w.into_vec()
}

/// Extra stack values a multiname operand consumes at use site.
fn runtime_name_pops(pool: &ConstantPool, multiname_index: u32) -> u32 {
    pool.multiname(multiname_index).map_or(0, |mn| {
        let kind = mn.kind();
        u32::from(kind.is_name_needed()) + u32::from(kind.is_namespace_needed())
    })
}

/// ECMAScript-style ToInt32 over an already-converted number.
fn to_int32(x: f64) -> i32 {
    if x.is_finite() {
        (x.trunc().rem_euclid(4_294_967_296.0)) as u32 as i32
    } else {
        0
    }
}

fn numeric_binary(a: &Value, b: &Value, f: impl Fn(f64, f64) -> f64) -> Value {
    match (a.to_number(), b.to_number()) {
        (Some(x), Some(y)) => Value::Number(f(x, y)),
        _ => Value::Null,
    }
}

fn binary(m: &mut Machine, f: impl Fn(f64, f64) -> f64) -> Result<(), MachineError> {
    let b = m.pop()?;
    let a = m.pop()?;
    m.push(numeric_binary(&a, &b, f));
    Ok(())
}

fn binary_i32(m: &mut Machine, f: impl Fn(i32, i32) -> i32) -> Result<(), MachineError> {
    binary(m, |x, y| f64::from(f(to_int32(x), to_int32(y))))
}

fn unary(m: &mut Machine, f: impl Fn(f64) -> f64) -> Result<(), MachineError> {
    let v = m.pop()?;
    match v.to_number() {
        Some(x) => m.push(Value::Number(f(x))),
        None => m.push(Value::Null),
    }
    Ok(())
}

fn compare(m: &mut Machine, f: impl Fn(f64, f64) -> bool) -> Result<(), MachineError> {
    let b = m.pop()?;
    let a = m.pop()?;
    match (a.to_number(), b.to_number()) {
        (Some(x), Some(y)) => m.push(Value::Bool(f(x, y))),
        _ => m.push(Value::Null),
    }
    Ok(())
}

fn loose_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        _ => match (a.to_number(), b.to_number()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
    }
}

/* ─────────────────────────── Tests ─────────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;
    use abcedit_abc::{Multiname, Namespace, NamespaceKind};
    use pretty_assertions::assert_eq;

    fn assert_roundtrip(ins: &Instruction) {
        let bytes = write_code(std::slice::from_ref(ins));
        let back = read_code(&bytes).unwrap();
        assert_eq!(back.as_slice(), std::slice::from_ref(ins));
        assert_eq!(write_code(&back), bytes);
    }

    #[test]
    fn roundtrip_operand_shapes() {
        assert_roundtrip(&Instruction::Nop);
        assert_roundtrip(&Instruction::PushByte { value: -5 });
        assert_roundtrip(&Instruction::PushShort { value: -300 });
        assert_roundtrip(&Instruction::PushString { string_index: 1234 });
        assert_roundtrip(&Instruction::GetLocal { register: 9 });
        assert_roundtrip(&Instruction::GetScopeObject { index: 2 });
        assert_roundtrip(&Instruction::CallProperty { multiname_index: 7, arg_count: 3 });
        assert_roundtrip(&Instruction::Jump { offset: -42 });
        assert_roundtrip(&Instruction::IfStrictNe { offset: 0x7FFFFF });
        assert_roundtrip(&Instruction::HasNext2 { object_register: 1, index_register: 2 });
        assert_roundtrip(&Instruction::Debug { debug_type: 1, name_index: 3, register: 0, extra: 0 });
        assert_roundtrip(&Instruction::LookupSwitch {
            default_offset: -10,
            case_offsets: vec![0, 8, -16],
        });
    }

    #[test]
    fn sequence_roundtrip_is_byte_exact() {
        let code = vec![
            Instruction::GetLocal0,
            Instruction::PushScope,
            Instruction::PushByte { value: 5 },
            Instruction::Increment,
            Instruction::SetLocal { register: 4 },
            Instruction::ReturnVoid,
        ];
        let bytes = write_code(&code);
        let back = read_code(&bytes).unwrap();
        assert_eq!(back, code);
        assert_eq!(write_code(&back), bytes);
    }

    #[test]
    fn unknown_opcode_is_rejected_with_offset() {
        // 0x02 = nop, 0xFF is not in the catalogue.
        let err = read_code(&[0x02, 0xFF]).unwrap_err();
        assert_eq!(err, CoreError::UnknownOpcode { opcode: 0xFF, at: 1 });
    }

    #[test]
    fn huge_lookupswitch_count_errors_instead_of_allocating() {
        // Default offset, then a case count near 2^30 with no case bytes:
        // must report EOF, not reserve gigabytes up front.
        let mut bytes = vec![op::LOOKUP_SWITCH, 0, 0, 0];
        bytes.extend_from_slice(&abcedit_core::encode_u30((1 << 30) - 1));
        assert!(matches!(
            read_code(&bytes).unwrap_err(),
            CoreError::UnexpectedEof { .. }
        ));
    }

    #[test]
    fn truncated_operand_is_an_eof() {
        let err = read_code(&[op::PUSH_STRING]).unwrap_err();
        assert!(matches!(err, CoreError::UnexpectedEof { .. }));
    }

    /// Pool with an open (runtime name + namespace) multiname at index 1 and
    /// a plain qname at index 2.
    fn arity_fixture() -> ConstantPool {
        let mut pool = ConstantPool::new();
        pool.add_multiname(Multiname::RTQNameL { attribute: false });
        let name = pool.intern_string("length");
        let ns_name = pool.intern_string("");
        let ns = pool.add_namespace(Namespace { kind: NamespaceKind::Package, name_index: ns_name });
        pool.add_multiname(Multiname::QName {
            attribute: false,
            namespace_index: ns,
            name_index: name,
        });
        pool
    }

    #[test]
    fn call_pops_account_for_runtime_names() {
        let pool = arity_fixture();
        // Receiver + 2 args + runtime name + runtime namespace.
        let open = Instruction::CallProperty { multiname_index: 1, arg_count: 2 };
        assert_eq!(open.pop_count(&pool), 5);
        assert_eq!(open.push_count(), 1);
        // Receiver + 2 args, nothing late-bound.
        let plain = Instruction::CallProperty { multiname_index: 2, arg_count: 2 };
        assert_eq!(plain.pop_count(&pool), 3);
        // Void flavour pushes nothing.
        let void = Instruction::CallPropVoid { multiname_index: 2, arg_count: 2 };
        assert_eq!(void.push_count(), 0);
    }

    #[test]
    fn fixed_arities() {
        let pool = ConstantPool::new();
        assert_eq!(Instruction::Add.pop_count(&pool), 2);
        assert_eq!(Instruction::Add.push_count(), 1);
        assert_eq!(Instruction::Increment.pop_count(&pool), 1);
        assert_eq!(Instruction::Dup.pop_count(&pool), 1);
        assert_eq!(Instruction::Dup.push_count(), 2);
        assert_eq!(Instruction::NewObject { property_count: 3 }.pop_count(&pool), 6);
        assert_eq!(Instruction::ReturnVoid.pop_count(&pool), 0);
        assert_eq!(Instruction::ReturnVoid.push_count(), 0);
    }

    #[test]
    fn increment_propagates_null() {
        let pool = ConstantPool::new();
        let mut m = Machine::new();

        m.push(Value::Null);
        Instruction::Increment.execute(&mut m, &pool).unwrap();
        assert_eq!(m.values(), &[Value::Null]);

        let mut m = Machine::new();
        m.push(Value::Number(5.0));
        Instruction::Increment.execute(&mut m, &pool).unwrap();
        assert_eq!(m.values(), &[Value::Number(6.0)]);
    }

    #[test]
    fn execute_on_empty_stack_underflows() {
        let pool = ConstantPool::new();
        let mut m = Machine::new();
        assert_eq!(
            Instruction::Increment.execute(&mut m, &pool).unwrap_err(),
            MachineError::StackUnderflow
        );
    }

    #[test]
    fn arithmetic_null_propagation_is_binary_too() {
        let pool = ConstantPool::new();
        let mut m = Machine::new();
        m.push(Value::Number(2.0));
        m.push(Value::Null);
        Instruction::Add.execute(&mut m, &pool).unwrap();
        assert_eq!(m.values(), &[Value::Null]);
    }

    #[test]
    fn add_concatenates_strings() {
        let pool = ConstantPool::new();
        let mut m = Machine::new();
        m.push(Value::from("foo"));
        m.push(Value::from("bar"));
        Instruction::Add.execute(&mut m, &pool).unwrap();
        assert_eq!(m.values(), &[Value::Str("foobar".into())]);
    }

    #[test]
    fn string_operands_convert_to_number() {
        let pool = ConstantPool::new();
        let mut m = Machine::new();
        m.push(Value::from("4"));
        m.push(Value::Number(2.5));
        Instruction::Multiply.execute(&mut m, &pool).unwrap();
        assert_eq!(m.values(), &[Value::Number(10.0)]);
    }

    #[test]
    fn push_string_resolves_through_pool() {
        let mut pool = ConstantPool::new();
        let idx = pool.intern_string("hello");
        let mut m = Machine::new();
        Instruction::PushString { string_index: idx }.execute(&mut m, &pool).unwrap();
        assert_eq!(m.values(), &[Value::Str("hello".into())]);

        let bad = Instruction::PushString { string_index: 99 };
        assert!(matches!(bad.execute(&mut m, &pool), Err(MachineError::Pool(_))));
    }

    #[test]
    fn unsupported_opcodes_refuse_execution() {
        let pool = ConstantPool::new();
        let mut m = Machine::new();
        assert_eq!(
            Instruction::GetLex { multiname_index: 1 }.execute(&mut m, &pool).unwrap_err(),
            MachineError::Unsupported { opcode: op::GET_LEX }
        );
    }

    #[test]
    fn integer_ops_wrap_like_to_int32() {
        let pool = ConstantPool::new();
        let mut m = Machine::new();
        m.push(Value::Number(f64::from(i32::MAX)));
        Instruction::IncrementI.execute(&mut m, &pool).unwrap();
        assert_eq!(m.values(), &[Value::Number(f64::from(i32::MIN))]);

        let mut m = Machine::new();
        m.push(Value::Number(-1.0));
        m.push(Value::Number(0.0));
        Instruction::URShift.execute(&mut m, &pool).unwrap();
        assert_eq!(m.values(), &[Value::Number(4_294_967_295.0)]);
    }
}
