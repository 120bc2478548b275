//! Value types and type classes.
//!
//! Every expression in the AST produces a value of one [`TypeId`], and every
//! type belongs to exactly one [`TypeClassId`]. Expression nodes are grouped by
//! class (see [`crate::ast::expr`]), so most of the parser reasons about
//! classes and only consults the concrete type where widths matter.

use std::fmt;

/// A concrete value type.
///
/// `None` is a sentinel for "no type" and is what [`TypeId::from_u8`] yields
/// for out-of-range codes. It never appears on a well-formed expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeId {
    None,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Bool,
    Void,
}

/// A family of types sharing one set of operators.
///
/// `Any` only exists for dispatching on call results whose class is decided
/// by the callee; no type has `Any` as its primary class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeClassId {
    Invalid,
    Any,
    Int,
    Float,
    Bool,
    Void,
}

impl TypeId {
    /// All real types, in code order.
    pub const ALL: [TypeId; 8] = [
        TypeId::I8,
        TypeId::I16,
        TypeId::I32,
        TypeId::I64,
        TypeId::F32,
        TypeId::F64,
        TypeId::Bool,
        TypeId::Void,
    ];

    /// Integer types, narrowest first.
    pub const INTS: [TypeId; 4] = [TypeId::I8, TypeId::I16, TypeId::I32, TypeId::I64];

    /// Floating point types, narrowest first.
    pub const FLOATS: [TypeId; 2] = [TypeId::F32, TypeId::F64];

    /// Decode a dense type code. Out-of-range codes map to `TypeId::None`.
    pub fn from_u8(code: u8) -> TypeId {
        match code {
            1 => TypeId::I8,
            2 => TypeId::I16,
            3 => TypeId::I32,
            4 => TypeId::I64,
            5 => TypeId::F32,
            6 => TypeId::F64,
            7 => TypeId::Bool,
            8 => TypeId::Void,
            _ => TypeId::None,
        }
    }

    /// The dense code of this type; the inverse of [`TypeId::from_u8`].
    pub fn code(self) -> u8 {
        self as u8
    }

    /// The class this type belongs to.
    pub fn primary_class(self) -> TypeClassId {
        match self {
            TypeId::I8 | TypeId::I16 | TypeId::I32 | TypeId::I64 => TypeClassId::Int,
            TypeId::F32 | TypeId::F64 => TypeClassId::Float,
            TypeId::Bool => TypeClassId::Bool,
            TypeId::Void => TypeClassId::Void,
            TypeId::None => TypeClassId::Invalid,
        }
    }

    /// Whether this type is a member of `class`. `Any` contains every real type.
    pub fn is_class(self, class: TypeClassId) -> bool {
        match class {
            TypeClassId::Any => self != TypeId::None,
            TypeClassId::Invalid => false,
            class => self.primary_class() == class,
        }
    }

    /// The text-format spelling of this type.
    pub fn name(self) -> &'static str {
        match self {
            TypeId::None => "none",
            TypeId::I8 => "i8",
            TypeId::I16 => "i16",
            TypeId::I32 => "i32",
            TypeId::I64 => "i64",
            TypeId::F32 => "f32",
            TypeId::F64 => "f64",
            TypeId::Bool => "bool",
            TypeId::Void => "void",
        }
    }

    /// Width of a value of this type in bits. Bool occupies one bit, `Void` and
    /// `None` none.
    pub fn bit_width(self) -> u32 {
        match self {
            TypeId::I8 => 8,
            TypeId::I16 => 16,
            TypeId::I32 | TypeId::F32 => 32,
            TypeId::I64 | TypeId::F64 => 64,
            TypeId::Bool => 1,
            TypeId::Void | TypeId::None => 0,
        }
    }

    /// Width in whole bytes, rounding up.
    pub fn byte_width(self) -> u32 {
        (self.bit_width() + 7) / 8
    }

    /// Base-two log of the byte width; 0 for zero-width types.
    pub fn byte_width_log2(self) -> u32 {
        match self.byte_width() {
            0 | 1 => 0,
            width => 31 - width.leading_zeros(),
        }
    }

    /// Whether values of this type can be stored in memory and passed to calls.
    pub fn is_value_type(self) -> bool {
        !matches!(self, TypeId::Void | TypeId::None)
    }
}

impl Default for TypeId {
    fn default() -> Self {
        TypeId::None
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TypeClassId {
    pub fn name(self) -> &'static str {
        match self {
            TypeClassId::Invalid => "invalid",
            TypeClassId::Any => "any",
            TypeClassId::Int => "int",
            TypeClassId::Float => "float",
            TypeClassId::Bool => "bool",
            TypeClassId::Void => "void",
        }
    }
}

impl fmt::Display for TypeClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Convenience free functions mirroring the methods, for call sites that
/// read better in prefix form.
pub fn is_type_class(ty: TypeId, class: TypeClassId) -> bool {
    ty.is_class(class)
}

pub fn primary_type_class(ty: TypeId) -> TypeClassId {
    ty.primary_class()
}

pub fn type_name(ty: TypeId) -> &'static str {
    ty.name()
}

pub fn type_bit_width(ty: TypeId) -> u32 {
    ty.bit_width()
}

pub fn type_byte_width(ty: TypeId) -> u32 {
    ty.byte_width()
}

pub fn type_byte_width_log2(ty: TypeId) -> u32 {
    ty.byte_width_log2()
}
