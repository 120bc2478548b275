//! The typed AST produced by the text front end.
//!
//! [`types`] defines value types and classes, [`ops`] the operators of each
//! class, [`expr`] the class-tagged expression trees and [`module`] the
//! declarations that own them.

pub mod expr;
pub mod module;
pub mod ops;
pub mod types;

pub use expr::{
    dispatch_by_type, BoolExpr, BoolNode, BranchTarget, BranchTargetId, ClassNode, ClassVisitor, Expr, FloatExpr,
    FloatLiteral, FloatNode, IntExpr, IntLiteral, IntNode, MemoryAccess, SwitchArm, TypedExpression,
    UntypedExpression, VoidExpr, VoidNode,
};
pub use module::{DataSegment, Function, FunctionImport, FunctionTable, FunctionType, Module, Variable};
pub use types::{TypeClassId, TypeId};
