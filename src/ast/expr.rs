//! Typed expression trees.
//!
//! An expression is statically tagged with the class of value it produces.
//! [`Expr<N>`] holds the variants every class shares (locals, calls, control
//! flow, errors) and wraps the class-specific operators in `Expr::Node(N)`,
//! where `N` is one of [`IntNode`], [`FloatNode`], [`BoolNode`] or
//! [`VoidNode`]. A parent owns its children through `Box`; branch targets are
//! referenced by [`BranchTargetId`] into the owning function's arena.
//!
//! Where a child's class is only known at run time (call arguments, cast
//! sources, comparison operands) the child is an [`UntypedExpression`] or a
//! [`TypedExpression`].

use super::ops::{
    BoolBinaryOp, BoolUnaryOp, CallKind, CompareOp, FloatBinaryOp, FloatCastOp, FloatUnaryOp, IntBinaryOp,
    IntCastOp, IntUnaryOp, LoadExtend,
};
use super::types::{TypeClassId, TypeId};
use std::fmt;

// ============================================================================
// Branch targets
// ============================================================================

/// Handle to a [`BranchTarget`] in a function's branch-target arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BranchTargetId(pub u32);

/// A point control can transfer to, carrying a value of `ty` (or nothing when
/// `ty` is `Void`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchTarget {
    pub ty: TypeId,
}

// ============================================================================
// Shared expression shape
// ============================================================================

/// An expression producing a value of class `N::CLASS`.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr<N> {
    /// A class-specific operator.
    Node(N),

    GetLocal {
        local: u32,
    },
    /// Writes `value` to a local and yields it.
    SetLocal {
        local: u32,
        value: Box<Expr<N>>,
    },
    Call {
        kind: CallKind,
        function: u32,
        args: Vec<UntypedExpression>,
    },
    CallIndirect {
        table: u32,
        function: Box<IntExpr>,
        args: Vec<UntypedExpression>,
    },
    IfElse {
        condition: Box<BoolExpr>,
        then_branch: Box<Expr<N>>,
        else_branch: Box<Expr<N>>,
    },
    /// Repeats `body` until `break_target` is taken; `continue_target` restarts it.
    Loop {
        body: Box<VoidExpr>,
        break_target: BranchTargetId,
        continue_target: BranchTargetId,
    },
    Label {
        target: BranchTargetId,
        body: Box<Expr<N>>,
    },
    /// Dispatches on an integer key. Arms that do not branch to `end_target`
    /// fall through into the next arm; `default_arm` ends the switch.
    Switch {
        key: Box<TypedExpression>,
        arms: Vec<SwitchArm>,
        default_arm: Box<Expr<N>>,
        end_target: BranchTargetId,
    },
    Branch {
        target: BranchTargetId,
        value: Option<Box<UntypedExpression>>,
    },
    Return {
        value: Option<Box<UntypedExpression>>,
    },
    /// Evaluates `first` for its effects, then yields `result`.
    Sequence {
        first: Box<VoidExpr>,
        result: Box<Expr<N>>,
    },
    /// Stands in for a subtree that failed to parse or type check.
    Error {
        message: String,
    },
}

/// One `case` of a switch.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchArm {
    pub key: u64,
    pub body: VoidExpr,
}

pub type IntExpr = Expr<IntNode>;
pub type FloatExpr = Expr<FloatNode>;
pub type BoolExpr = Expr<BoolNode>;
pub type VoidExpr = Expr<VoidNode>;

impl<N: ClassNode> Expr<N> {
    pub fn error(message: impl Into<String>) -> Self {
        Expr::Error {
            message: message.into(),
        }
    }

    pub fn class(&self) -> TypeClassId {
        N::CLASS
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Expr::Error { .. })
    }

    /// Erases the static class.
    pub fn into_untyped(self) -> UntypedExpression {
        N::erase(self)
    }
}

// ============================================================================
// Class-specific nodes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntLiteral {
    I8(u8),
    I16(u16),
    I32(u32),
    I64(u64),
}

impl IntLiteral {
    /// Truncates `bits` to the width of `ty`. Returns `None` for non-integer types.
    pub fn new(ty: TypeId, bits: u64) -> Option<IntLiteral> {
        match ty {
            TypeId::I8 => Some(IntLiteral::I8(bits as u8)),
            TypeId::I16 => Some(IntLiteral::I16(bits as u16)),
            TypeId::I32 => Some(IntLiteral::I32(bits as u32)),
            TypeId::I64 => Some(IntLiteral::I64(bits)),
            _ => None,
        }
    }

    pub fn ty(self) -> TypeId {
        match self {
            IntLiteral::I8(_) => TypeId::I8,
            IntLiteral::I16(_) => TypeId::I16,
            IntLiteral::I32(_) => TypeId::I32,
            IntLiteral::I64(_) => TypeId::I64,
        }
    }

    /// The value zero-extended to 64 bits.
    pub fn bits(self) -> u64 {
        match self {
            IntLiteral::I8(v) => u64::from(v),
            IntLiteral::I16(v) => u64::from(v),
            IntLiteral::I32(v) => u64::from(v),
            IntLiteral::I64(v) => v,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FloatLiteral {
    F32(f32),
    F64(f64),
}

impl FloatLiteral {
    pub fn ty(self) -> TypeId {
        match self {
            FloatLiteral::F32(_) => TypeId::F32,
            FloatLiteral::F64(_) => TypeId::F64,
        }
    }
}

/// Address and layout of a load or store.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryAccess {
    /// The type of the bytes in memory; may be narrower than the value type.
    pub memory_type: TypeId,
    pub align_log2: u8,
    pub address: Box<IntExpr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IntNode {
    Literal(IntLiteral),
    Unary {
        op: IntUnaryOp,
        operand: Box<IntExpr>,
    },
    Binary {
        op: IntBinaryOp,
        left: Box<IntExpr>,
        right: Box<IntExpr>,
    },
    Cast {
        op: IntCastOp,
        source: Box<TypedExpression>,
    },
    Load {
        extend: LoadExtend,
        access: MemoryAccess,
    },
    /// Stores `value` and yields it.
    Store {
        access: MemoryAccess,
        value: Box<IntExpr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum FloatNode {
    Literal(FloatLiteral),
    Unary {
        op: FloatUnaryOp,
        operand: Box<FloatExpr>,
    },
    Binary {
        op: FloatBinaryOp,
        left: Box<FloatExpr>,
        right: Box<FloatExpr>,
    },
    Cast {
        op: FloatCastOp,
        source: Box<TypedExpression>,
    },
    Load {
        access: MemoryAccess,
    },
    Store {
        access: MemoryAccess,
        value: Box<FloatExpr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoolNode {
    Unary {
        op: BoolUnaryOp,
        operand: Box<BoolExpr>,
    },
    Binary {
        op: BoolBinaryOp,
        left: Box<BoolExpr>,
        right: Box<BoolExpr>,
    },
    /// Both operands have type `operand_type`.
    Comparison {
        op: CompareOp,
        operand_type: TypeId,
        left: Box<UntypedExpression>,
        right: Box<UntypedExpression>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum VoidNode {
    Nop,
    /// Evaluates a non-void expression and drops its value.
    DiscardResult(Box<TypedExpression>),
}

// ============================================================================
// Erasure
// ============================================================================

/// An expression of any class.
#[derive(Debug, Clone, PartialEq)]
pub enum UntypedExpression {
    Int(IntExpr),
    Float(FloatExpr),
    Bool(BoolExpr),
    Void(VoidExpr),
}

impl UntypedExpression {
    pub fn class(&self) -> TypeClassId {
        match self {
            UntypedExpression::Int(_) => TypeClassId::Int,
            UntypedExpression::Float(_) => TypeClassId::Float,
            UntypedExpression::Bool(_) => TypeClassId::Bool,
            UntypedExpression::Void(_) => TypeClassId::Void,
        }
    }

    pub fn is_error(&self) -> bool {
        match self {
            UntypedExpression::Int(e) => e.is_error(),
            UntypedExpression::Float(e) => e.is_error(),
            UntypedExpression::Bool(e) => e.is_error(),
            UntypedExpression::Void(e) => e.is_error(),
        }
    }

    /// Recovers the static class, or hands the expression back unchanged.
    pub fn into_class<N: ClassNode>(self) -> Result<Expr<N>, UntypedExpression> {
        N::from_untyped(self)
    }

    pub fn as_class<N: ClassNode>(&self) -> Option<&Expr<N>> {
        N::as_class(self)
    }
}

/// An expression together with its concrete type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedExpression {
    pub expression: UntypedExpression,
    pub ty: TypeId,
}

impl TypedExpression {
    pub fn new(expression: UntypedExpression, ty: TypeId) -> Self {
        debug_assert!(
            expression.class() == ty.primary_class(),
            "{} expression typed as {}",
            expression.class(),
            ty
        );
        Self { expression, ty }
    }
}

// ============================================================================
// Class dispatch
// ============================================================================

/// Implemented by the four class-specific node types; ties each to its class
/// and to its variant of [`UntypedExpression`].
pub trait ClassNode: Sized + fmt::Debug + Clone + PartialEq {
    const CLASS: TypeClassId;

    fn erase(expr: Expr<Self>) -> UntypedExpression;

    fn from_untyped(expr: UntypedExpression) -> Result<Expr<Self>, UntypedExpression>;

    fn as_class(expr: &UntypedExpression) -> Option<&Expr<Self>>;
}

macro_rules! class_node {
    ($node:ident, $class:ident) => {
        impl ClassNode for $node {
            const CLASS: TypeClassId = TypeClassId::$class;

            fn erase(expr: Expr<Self>) -> UntypedExpression {
                UntypedExpression::$class(expr)
            }

            fn from_untyped(expr: UntypedExpression) -> Result<Expr<Self>, UntypedExpression> {
                match expr {
                    UntypedExpression::$class(e) => Ok(e),
                    other => Err(other),
                }
            }

            fn as_class(expr: &UntypedExpression) -> Option<&Expr<Self>> {
                match expr {
                    UntypedExpression::$class(e) => Some(e),
                    _ => None,
                }
            }
        }
    };
}

class_node!(IntNode, Int);
class_node!(FloatNode, Float);
class_node!(BoolNode, Bool);
class_node!(VoidNode, Void);

/// An operation generic over the expression class, chosen at run time by
/// [`dispatch_by_type`].
pub trait ClassVisitor {
    type Output;

    fn visit<N: ClassNode>(self, ty: TypeId) -> Self::Output;
}

/// Runs `visitor` instantiated at the primary class of `ty`. Returns `None`
/// for `TypeId::None`.
pub fn dispatch_by_type<V: ClassVisitor>(ty: TypeId, visitor: V) -> Option<V::Output> {
    match ty.primary_class() {
        TypeClassId::Int => Some(visitor.visit::<IntNode>(ty)),
        TypeClassId::Float => Some(visitor.visit::<FloatNode>(ty)),
        TypeClassId::Bool => Some(visitor.visit::<BoolNode>(ty)),
        TypeClassId::Void => Some(visitor.visit::<VoidNode>(ty)),
        TypeClassId::Any | TypeClassId::Invalid => None,
    }
}
