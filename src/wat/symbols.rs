//! The fixed table of reserved words.
//!
//! Every keyword, type name and opcode spelling is interned once, on first
//! use, as a dense [`Symbol`] code whose [`SymbolKind`] says what it means. The
//! reader replaces matching atoms with their code, so the parser dispatches on
//! `SymbolKind` with a `match` and never compares strings.
//!
//! Opcode spellings are `<op>.<type>` (`add.i32`, `const.f64`), casts are
//! `<op>.<dest>/<source>` (`wrap.i32/i64`), and memory operators additionally
//! accept `/<memtype>` forms (`load_s.i32/i8`) and an `:<alignLog2>` suffix.

use crate::ast::ops::{
    BoolBinaryOp, BoolUnaryOp, CompareOp, FloatBinaryOp, FloatCastOp, FloatUnaryOp, IntBinaryOp, IntCastOp, IntUnaryOp,
    LoadExtend,
};
use crate::ast::types::TypeId;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;

/// Largest alignment exponent a memory operator may spell out.
pub const MAX_ALIGN_LOG2: u8 = 8;

/// Dense code of an entry in the symbol table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Module,
    Func,
    Param,
    Result,
    Local,
    Import,
    Memory,
    Segment,
    Table,
    Export,
    Invoke,
    AssertReturn,
    AssertReturnNan,
    AssertTrap,
    Block,
    If,
    Loop,
    Label,
    Break,
    Return,
    Call,
    CallImport,
    CallIndirect,
    GetLocal,
    SetLocal,
    Case,
    Fallthrough,
    Nop,
    MemorySize,
    PageSize,
    ResizeMemory,
}

impl Keyword {
    pub const ALL: [Keyword; 31] = [
        Keyword::Module,
        Keyword::Func,
        Keyword::Param,
        Keyword::Result,
        Keyword::Local,
        Keyword::Import,
        Keyword::Memory,
        Keyword::Segment,
        Keyword::Table,
        Keyword::Export,
        Keyword::Invoke,
        Keyword::AssertReturn,
        Keyword::AssertReturnNan,
        Keyword::AssertTrap,
        Keyword::Block,
        Keyword::If,
        Keyword::Loop,
        Keyword::Label,
        Keyword::Break,
        Keyword::Return,
        Keyword::Call,
        Keyword::CallImport,
        Keyword::CallIndirect,
        Keyword::GetLocal,
        Keyword::SetLocal,
        Keyword::Case,
        Keyword::Fallthrough,
        Keyword::Nop,
        Keyword::MemorySize,
        Keyword::PageSize,
        Keyword::ResizeMemory,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Keyword::Module => "module",
            Keyword::Func => "func",
            Keyword::Param => "param",
            Keyword::Result => "result",
            Keyword::Local => "local",
            Keyword::Import => "import",
            Keyword::Memory => "memory",
            Keyword::Segment => "segment",
            Keyword::Table => "table",
            Keyword::Export => "export",
            Keyword::Invoke => "invoke",
            Keyword::AssertReturn => "assert_return",
            Keyword::AssertReturnNan => "assert_return_nan",
            Keyword::AssertTrap => "assert_trap",
            Keyword::Block => "block",
            Keyword::If => "if",
            Keyword::Loop => "loop",
            Keyword::Label => "label",
            Keyword::Break => "break",
            Keyword::Return => "return",
            Keyword::Call => "call",
            Keyword::CallImport => "call_import",
            Keyword::CallIndirect => "call_indirect",
            Keyword::GetLocal => "get_local",
            Keyword::SetLocal => "set_local",
            Keyword::Case => "case",
            Keyword::Fallthrough => "fallthrough",
            Keyword::Nop => "nop",
            Keyword::MemorySize => "memory_size",
            Keyword::PageSize => "page_size",
            Keyword::ResizeMemory => "resize_memory",
        }
    }
}

/// A typed, non-parametric operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Const(TypeId),
    IntUnary(TypeId, IntUnaryOp),
    IntBinary(TypeId, IntBinaryOp),
    FloatUnary(TypeId, FloatUnaryOp),
    FloatBinary(TypeId, FloatBinaryOp),
    BoolUnary(BoolUnaryOp),
    BoolBinary(BoolBinaryOp),
    /// Compares two operands of the given type.
    Compare(TypeId, CompareOp),
    IntCast {
        op: IntCastOp,
        dest: TypeId,
        source: TypeId,
    },
    FloatCast {
        op: FloatCastOp,
        dest: TypeId,
        source: TypeId,
    },
    Load {
        ty: TypeId,
        memory_type: TypeId,
        extend: LoadExtend,
        align_log2: u8,
    },
    Store {
        ty: TypeId,
        memory_type: TypeId,
        align_log2: u8,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Keyword(Keyword),
    Type(TypeId),
    /// `switch.<int>`, keyed by the given type.
    Switch(TypeId),
    Op(Opcode),
}

impl Symbol {
    /// Looks up a reserved word.
    pub fn lookup(text: &str) -> Option<Symbol> {
        SYMBOLS.by_name.get(text).copied()
    }

    pub fn name(self) -> &'static str {
        SYMBOLS.entries[self.0 as usize].0.as_str()
    }

    pub fn kind(self) -> SymbolKind {
        SYMBOLS.entries[self.0 as usize].1
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Table construction
// ============================================================================

struct SymbolTable {
    entries: Vec<(String, SymbolKind)>,
    by_name: HashMap<String, Symbol>,
}

static SYMBOLS: Lazy<SymbolTable> = Lazy::new(SymbolTable::build);

impl SymbolTable {
    fn add(&mut self, name: String, kind: SymbolKind) {
        let symbol = Symbol(self.entries.len() as u16);
        let previous = self.by_name.insert(name.clone(), symbol);
        debug_assert!(previous.is_none(), "symbol {} defined twice", name);
        self.entries.push((name, kind));
    }

    fn op(&mut self, name: String, op: Opcode) {
        self.add(name, SymbolKind::Op(op));
    }

    fn build() -> SymbolTable {
        let mut table = SymbolTable {
            entries: Vec::new(),
            by_name: HashMap::new(),
        };

        for ty in TypeId::ALL {
            table.add(ty.name().to_string(), SymbolKind::Type(ty));
        }
        for keyword in Keyword::ALL {
            table.add(keyword.name().to_string(), SymbolKind::Keyword(keyword));
        }

        for ty in TypeId::INTS {
            table.add(format!("switch.{}", ty), SymbolKind::Switch(ty));
            table.op(format!("const.{}", ty), Opcode::Const(ty));
            for &op in IntUnaryOp::ALL {
                table.op(format!("{}.{}", op, ty), Opcode::IntUnary(ty, op));
            }
            for &op in IntBinaryOp::ALL {
                table.op(format!("{}.{}", op, ty), Opcode::IntBinary(ty, op));
            }
            for &op in CompareOp::INT {
                table.op(format!("{}.{}", op, ty), Opcode::Compare(ty, op));
            }
        }
        for ty in TypeId::FLOATS {
            table.op(format!("const.{}", ty), Opcode::Const(ty));
            for &op in FloatUnaryOp::ALL {
                table.op(format!("{}.{}", op, ty), Opcode::FloatUnary(ty, op));
            }
            for &op in FloatBinaryOp::ALL {
                table.op(format!("{}.{}", op, ty), Opcode::FloatBinary(ty, op));
            }
            for &op in CompareOp::FLOAT {
                table.op(format!("{}.{}", op, ty), Opcode::Compare(ty, op));
            }
        }
        for &op in BoolUnaryOp::ALL {
            table.op(format!("{}.bool", op), Opcode::BoolUnary(op));
        }
        for &op in BoolBinaryOp::ALL {
            table.op(format!("{}.bool", op), Opcode::BoolBinary(op));
        }
        for &op in CompareOp::BOOL {
            table.op(format!("{}.bool", op), Opcode::Compare(TypeId::Bool, op));
        }

        for (op, dest, source) in int_casts() {
            table.op(format!("{}.{}/{}", op, dest, source), Opcode::IntCast { op, dest, source });
        }
        for (op, dest, source) in float_casts() {
            table.op(format!("{}.{}/{}", op, dest, source), Opcode::FloatCast { op, dest, source });
        }

        for access in memory_accesses() {
            for (name, align_log2) in access.spellings() {
                let op = match access.extend {
                    Some(extend) => Opcode::Load {
                        ty: access.ty,
                        memory_type: access.memory_type,
                        extend,
                        align_log2,
                    },
                    None => Opcode::Store {
                        ty: access.ty,
                        memory_type: access.memory_type,
                        align_log2,
                    },
                };
                table.op(name, op);
            }
        }

        table
    }
}

fn int_casts() -> Vec<(IntCastOp, TypeId, TypeId)> {
    let mut casts = Vec::new();
    for (i, &narrow) in TypeId::INTS.iter().enumerate() {
        for &wide in &TypeId::INTS[i + 1..] {
            casts.push((IntCastOp::Wrap, narrow, wide));
            casts.push((IntCastOp::ExtendS, wide, narrow));
            casts.push((IntCastOp::ExtendU, wide, narrow));
        }
    }
    for dest in [TypeId::I32, TypeId::I64] {
        for source in TypeId::FLOATS {
            casts.push((IntCastOp::TruncS, dest, source));
            casts.push((IntCastOp::TruncU, dest, source));
        }
    }
    casts.push((IntCastOp::ReinterpretFloat, TypeId::I32, TypeId::F32));
    casts.push((IntCastOp::ReinterpretFloat, TypeId::I64, TypeId::F64));
    for dest in TypeId::INTS {
        casts.push((IntCastOp::ReinterpretBool, dest, TypeId::Bool));
    }
    casts
}

fn float_casts() -> Vec<(FloatCastOp, TypeId, TypeId)> {
    let mut casts = Vec::new();
    for dest in TypeId::FLOATS {
        for source in TypeId::INTS {
            casts.push((FloatCastOp::ConvertS, dest, source));
            casts.push((FloatCastOp::ConvertU, dest, source));
        }
    }
    casts.push((FloatCastOp::Demote, TypeId::F32, TypeId::F64));
    casts.push((FloatCastOp::Promote, TypeId::F64, TypeId::F32));
    casts.push((FloatCastOp::ReinterpretInt, TypeId::F32, TypeId::I32));
    casts.push((FloatCastOp::ReinterpretInt, TypeId::F64, TypeId::I64));
    casts
}

/// One memory operator before spelling variants are expanded.
struct MemoryAccessSpec {
    ty: TypeId,
    memory_type: TypeId,
    /// `None` for stores.
    extend: Option<LoadExtend>,
}

impl MemoryAccessSpec {
    /// The explicit-width spelling (`load8_s.i32`) and the `/memtype` spelling
    /// (`load_s.i32/i8`), each bare and with every alignment suffix.
    fn spellings(&self) -> Vec<(String, u8)> {
        let narrow = self.memory_type != self.ty;
        let bits = if narrow {
            self.memory_type.bit_width().to_string()
        } else {
            String::new()
        };
        let (op, suffix) = match self.extend {
            Some(LoadExtend::Signed) => ("load", "_s"),
            Some(LoadExtend::Unsigned) => ("load", "_u"),
            Some(LoadExtend::None) => ("load", ""),
            None => ("store", ""),
        };
        let bases = [
            format!("{}{}{}.{}", op, bits, suffix, self.ty),
            format!("{}{}.{}/{}", op, suffix, self.ty, self.memory_type),
        ];

        // Unsuffixed spellings align to the width of the value type, even for
        // narrow accesses.
        let natural = self.ty.byte_width_log2() as u8;
        let mut spellings = Vec::new();
        for base in bases {
            for align_log2 in 0..=MAX_ALIGN_LOG2 {
                spellings.push((format!("{}:{}", base, align_log2), align_log2));
            }
            spellings.push((base, natural));
        }
        spellings
    }
}

fn memory_accesses() -> Vec<MemoryAccessSpec> {
    let mut accesses = Vec::new();
    for ty in [TypeId::I32, TypeId::I64, TypeId::F32, TypeId::F64] {
        accesses.push(MemoryAccessSpec {
            ty,
            memory_type: ty,
            extend: Some(LoadExtend::None),
        });
        accesses.push(MemoryAccessSpec {
            ty,
            memory_type: ty,
            extend: None,
        });
    }
    for ty in [TypeId::I32, TypeId::I64] {
        let narrower = TypeId::INTS.iter().copied().filter(|m| m.bit_width() < ty.bit_width());
        for memory_type in narrower {
            for extend in [LoadExtend::Signed, LoadExtend::Unsigned] {
                accesses.push(MemoryAccessSpec {
                    ty,
                    memory_type,
                    extend: Some(extend),
                });
            }
            accesses.push(MemoryAccessSpec {
                ty,
                memory_type,
                extend: None,
            });
        }
    }
    accesses
}
