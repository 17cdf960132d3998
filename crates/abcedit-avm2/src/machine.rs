//! Abstract machine: a dynamically-typed operand stack.
//!
//! This is a tooling facility (constant folding, test oracles), not a full
//! interpreter. The stack is owned exclusively by whichever single logical
//! execution is using it and is passed by `&mut` into each instruction's
//! execution routine.

use core::fmt;

use abcedit_core::CoreError;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A dynamically-typed operand value.
#[derive(Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Value {
    /// Null / absence of a value.
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit float, the numeric tower of the format.
    Number(f64),
    /// Owned UTF-8 string.
    Str(String),
    /// Opaque object reference, carried around by tooling but never folded.
    Object(String),
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Object(tag) => write!(f, "Object({tag})"),
        }
    }
}

impl Value {
    /// Convert-to-number semantics for non-null operands.
    ///
    /// Returns `None` for `Null`: a null operand is never coerced to zero,
    /// it propagates through arithmetic. This deviates from strict
    /// ECMAScript `ToNumber(null) = 0` and must be preserved for
    /// behavioral compatibility.
    pub fn to_number(&self) -> Option<f64> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Number(n) => Some(*n),
            Value::Str(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    Some(0.0)
                } else {
                    Some(trimmed.parse().unwrap_or(f64::NAN))
                }
            }
            Value::Object(_) => Some(f64::NAN),
        }
    }

    /// ECMAScript-style truthiness.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Object(_) => true,
        }
    }

    /// Name reported by the `typeof` operator.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Object(_) => "object",
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self { Value::Bool(v) }
}
impl From<f64> for Value {
    fn from(v: f64) -> Self { Value::Number(v) }
}
impl From<&str> for Value {
    fn from(v: &str) -> Self { Value::Str(v.to_owned()) }
}

/// Errors raised while executing a single instruction.
#[derive(Debug, Error, PartialEq)]
pub enum MachineError {
    /// Pop on an empty operand stack. Fatal, execution halts.
    #[error("operand stack underflow")]
    StackUnderflow,
    /// The variant does not support execution (tooling subset only).
    #[error("opcode 0x{opcode:02X} does not support execution")]
    Unsupported {
        /// Opcode byte of the refusing instruction.
        opcode: u8,
    },
    /// A pool reference used by the instruction could not be resolved.
    #[error(transparent)]
    Pool(#[from] CoreError),
}

/// The operand stack of one logical execution.
#[derive(Debug, Clone, Default)]
pub struct Machine {
    values: Vec<Value>,
}

impl Machine {
    /// Create a machine with an empty operand stack.
    pub fn new() -> Self { Self { values: Vec::new() } }

    /// Push a value.
    pub fn push(&mut self, value: Value) { self.values.push(value); }

    /// Pop the top value, failing with [`MachineError::StackUnderflow`].
    pub fn pop(&mut self) -> Result<Value, MachineError> {
        self.values.pop().ok_or(MachineError::StackUnderflow)
    }

    /// Peek at the top value without consuming it.
    pub fn peek(&self) -> Option<&Value> { self.values.last() }

    /// Stack depth.
    pub fn len(&self) -> usize { self.values.len() }

    /// Whether the stack is empty.
    pub fn is_empty(&self) -> bool { self.values.is_empty() }

    /// Read-only view of the stack, bottom first.
    pub fn values(&self) -> &[Value] { &self.values }
}

/* ─────────────────────────── Tests ─────────────────────────── */
