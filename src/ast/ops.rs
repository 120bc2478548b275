//! Operators, grouped by the class of value they produce.
//!
//! Each enum carries its text-format spelling via `name()`; the symbol table
//! is generated from the `ALL` arrays here, so adding an operator is a one-line
//! change.

macro_rules! operators {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $($variant:ident => $spelling:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The spelling of this operator before the `.type` suffix.
            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $spelling),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

operators! {
    /// Integer operators with a single operand.
    pub enum IntUnaryOp {
        Neg => "neg",
        Abs => "abs",
        Not => "not",
        Clz => "clz",
        Ctz => "ctz",
        Popcnt => "popcnt",
    }
}

operators! {
    /// Integer operators with two operands of the result type.
    pub enum IntBinaryOp {
        Add => "add",
        Sub => "sub",
        Mul => "mul",
        DivS => "div_s",
        DivU => "div_u",
        RemS => "rem_s",
        RemU => "rem_u",
        And => "and",
        Or => "or",
        Xor => "xor",
        Shl => "shl",
        ShrS => "shr_s",
        ShrU => "shr_u",
    }
}

operators! {
    pub enum FloatUnaryOp {
        Neg => "neg",
        Abs => "abs",
        Ceil => "ceil",
        Floor => "floor",
        Trunc => "trunc",
        Nearest => "nearest",
        Sqrt => "sqrt",
    }
}

operators! {
    pub enum FloatBinaryOp {
        Add => "add",
        Sub => "sub",
        Mul => "mul",
        Div => "div",
        Rem => "rem",
        CopySign => "copysign",
        Min => "min",
        Max => "max",
    }
}

operators! {
    pub enum BoolUnaryOp {
        Not => "not",
    }
}

operators! {
    pub enum BoolBinaryOp {
        And => "and",
        Or => "or",
    }
}

operators! {
    /// Comparisons. The result is always `bool`; the operand type is carried
    /// separately on the node.
    pub enum CompareOp {
        Eq => "eq",
        Ne => "ne",
        LtS => "lt_s",
        LtU => "lt_u",
        LeS => "le_s",
        LeU => "le_u",
        GtS => "gt_s",
        GtU => "gt_u",
        GeS => "ge_s",
        GeU => "ge_u",
        Lt => "lt",
        Le => "le",
        Gt => "gt",
        Ge => "ge",
    }
}

operators! {
    /// Conversions producing an integer.
    pub enum IntCastOp {
        Wrap => "wrap",
        ExtendS => "extend_s",
        ExtendU => "extend_u",
        TruncS => "trunc_s",
        TruncU => "trunc_u",
        ReinterpretFloat => "reinterpret",
        ReinterpretBool => "reinterpret",
    }
}

operators! {
    /// Conversions producing a float.
    pub enum FloatCastOp {
        ConvertS => "convert_s",
        ConvertU => "convert_u",
        Demote => "demote",
        Promote => "promote",
        ReinterpretInt => "reinterpret",
    }
}

impl CompareOp {
    pub const INT: &'static [CompareOp] = &[
        CompareOp::Eq,
        CompareOp::Ne,
        CompareOp::LtS,
        CompareOp::LtU,
        CompareOp::LeS,
        CompareOp::LeU,
        CompareOp::GtS,
        CompareOp::GtU,
        CompareOp::GeS,
        CompareOp::GeU,
    ];

    pub const FLOAT: &'static [CompareOp] = &[
        CompareOp::Eq,
        CompareOp::Ne,
        CompareOp::Lt,
        CompareOp::Le,
        CompareOp::Gt,
        CompareOp::Ge,
    ];

    pub const BOOL: &'static [CompareOp] = &[CompareOp::Eq, CompareOp::Ne];
}

/// How a load narrower than its result type fills the upper bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadExtend {
    /// Memory type and result type have the same width.
    None,
    Signed,
    Unsigned,
}

/// Which function index space a direct call resolves against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Function,
    Import,
}

impl CallKind {
    pub fn name(self) -> &'static str {
        match self {
            CallKind::Function => "call",
            CallKind::Import => "call_import",
        }
    }
}
