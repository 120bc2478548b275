//! Runtime values as they appear in test directives.
//!
//! A [`Value`] is an argument to an `invoke` or the expected outcome of an
//! assertion. An expected trap is represented as a [`Value::Exception`]
//! carrying the [`ExceptionCause`] the runtime is expected to raise.

use crate::ast::TypeId;
use std::fmt;

/// A value of one of the AST's types. Integers hold their bits unsigned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// No value, as returned by a void function.
    None,
    I8(u8),
    I16(u16),
    I32(u32),
    I64(u64),
    F32(f32),
    F64(f64),
    Bool(bool),
    Exception(Exception),
}

impl Value {
    /// An integer value of type `ty`, truncated to its width.
    pub fn from_bits(ty: TypeId, bits: u64) -> Option<Value> {
        match ty {
            TypeId::I8 => Some(Value::I8(bits as u8)),
            TypeId::I16 => Some(Value::I16(bits as u16)),
            TypeId::I32 => Some(Value::I32(bits as u32)),
            TypeId::I64 => Some(Value::I64(bits)),
            _ => None,
        }
    }

    /// The type of the value. Exceptions have no type and report `None`.
    pub fn ty(&self) -> TypeId {
        match self {
            Value::I8(_) => TypeId::I8,
            Value::I16(_) => TypeId::I16,
            Value::I32(_) => TypeId::I32,
            Value::I64(_) => TypeId::I64,
            Value::F32(_) => TypeId::F32,
            Value::F64(_) => TypeId::F64,
            Value::Bool(_) => TypeId::Bool,
            Value::None => TypeId::Void,
            Value::Exception(_) => TypeId::None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "none"),
            Value::I8(v) => write!(f, "i8 {v}"),
            Value::I16(v) => write!(f, "i16 {v}"),
            Value::I32(v) => write!(f, "i32 {v}"),
            Value::I64(v) => write!(f, "i64 {v}"),
            Value::F32(v) => write!(f, "f32 {v}"),
            Value::F64(v) => write!(f, "f64 {v}"),
            Value::Bool(v) => write!(f, "bool {v}"),
            Value::Exception(e) => write!(f, "exception: {}", e.cause),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exception {
    pub cause: ExceptionCause,
}

/// Why execution trapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionCause {
    Unknown,
    AccessViolation,
    StackOverflow,
    IntegerDivideByZeroOrIntegerOverflow,
    InvalidFloatOperation,
}

impl ExceptionCause {
    /// Maps the reason string of an `assert_trap` to a cause. Unrecognised
    /// reasons map to `Unknown`.
    pub fn from_trap_message(message: &str) -> ExceptionCause {
        match message {
            "runtime: out of bounds memory access" => ExceptionCause::AccessViolation,
            "runtime: callstack exhausted" => ExceptionCause::StackOverflow,
            "runtime: integer overflow" | "runtime: integer divide by zero" => {
                ExceptionCause::IntegerDivideByZeroOrIntegerOverflow
            }
            "runtime: invalid conversion to integer" => ExceptionCause::InvalidFloatOperation,
            _ => ExceptionCause::Unknown,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            ExceptionCause::Unknown => "unknown",
            ExceptionCause::AccessViolation => "access violation",
            ExceptionCause::StackOverflow => "stack overflow",
            ExceptionCause::IntegerDivideByZeroOrIntegerOverflow => {
                "integer divide by zero or signed integer overflow"
            }
            ExceptionCause::InvalidFloatOperation => "invalid floating point operation",
        }
    }
}

impl fmt::Display for ExceptionCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}
