//! Implicit conversions between an expression's type and the type its context
//! expects.
//!
//! Only four are allowed: identity, an integer tested against zero where a
//! `bool` is expected, a `bool` reinterpreted where an integer is expected,
//! and any value discarded where nothing is expected. Everything else needs
//! an explicit cast operator.

use crate::ast::ops::{CompareOp, IntCastOp};
use crate::ast::{
    BoolExpr, BoolNode, ClassNode, Expr, IntExpr, IntLiteral, IntNode, TypeClassId, TypeId, TypedExpression,
    UntypedExpression, VoidExpr, VoidNode,
};

/// Converts `typed` to an expression of type `to`, or hands it back when no
/// implicit conversion exists.
pub fn coerce(typed: TypedExpression, to: TypeId) -> Result<UntypedExpression, TypedExpression> {
    let from = typed.ty;
    if from == to {
        return Ok(typed.expression);
    }

    match to.primary_class() {
        TypeClassId::Bool if from.is_class(TypeClassId::Int) => {
            let zero = IntLiteral::new(from, 0).map(|lit| IntExpr::Node(IntNode::Literal(lit)));
            match zero {
                Some(zero) => Ok(BoolExpr::Node(BoolNode::Comparison {
                    op: CompareOp::Ne,
                    operand_type: from,
                    left: Box::new(typed.expression),
                    right: Box::new(zero.into_untyped()),
                })
                .into_untyped()),
                None => Err(typed),
            }
        }
        TypeClassId::Int if from == TypeId::Bool => Ok(IntExpr::Node(IntNode::Cast {
            op: IntCastOp::ReinterpretBool,
            source: Box::new(typed),
        })
        .into_untyped()),
        TypeClassId::Void if from != TypeId::None => {
            Ok(VoidExpr::Node(VoidNode::DiscardResult(Box::new(typed))).into_untyped())
        }
        _ => Err(typed),
    }
}

/// [`coerce`] for a context whose class is known statically. `to` must be of
/// class `N::CLASS`.
pub fn coerce_to<N: ClassNode>(typed: TypedExpression, to: TypeId) -> Result<Expr<N>, TypedExpression> {
    debug_assert_eq!(to.primary_class(), N::CLASS);
    coerce(typed, to)?
        .into_class::<N>()
        .map_err(|expression| TypedExpression { expression, ty: to })
}

/// The diagnostic for a failed coercion.
pub fn mismatch_message(expected: TypeId, found: TypeId, context: &str) -> String {
    format!("type error: expecting a {} {} but found {}", expected, context, found)
}
