//! Function bodies.
//!
//! An expression is parsed against the type its context expects. Operators
//! whose result type is fixed by their spelling (`add.i32`, `load8_s.i64`,
//! `const.f32`) are parsed first and then coerced to that type; control flow,
//! calls and locals take the expected type as a parameter and build a node
//! of the matching class directly.
//!
//! Failures are recorded on the module and replaced by an `Error` node of the
//! expected class, so parsing always continues with the next sibling.

use super::coerce::{coerce_to, mismatch_message};
use super::error::{ErrorKind, ParseError};
use super::module::{parse_index, parse_name_or_index, ModuleContext};
use super::sexpr::{Node, NodeIt, NodeKind};
use super::symbols::{Keyword, Opcode, SymbolKind};
use crate::ast::module::INTRINSICS_MODULE;
use crate::ast::ops::CallKind;
use crate::ast::{
    dispatch_by_type, BoolNode, BranchTarget, BranchTargetId, ClassNode, ClassVisitor, Expr, FloatLiteral,
    FloatNode, FunctionType, IntExpr, IntLiteral, IntNode, MemoryAccess, SwitchArm, TypeClassId, TypeId,
    TypedExpression, UntypedExpression, VoidExpr, VoidNode,
};
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

/// State for parsing one function body.
pub(crate) struct FunctionParser<'c> {
    cx: &'c mut ModuleContext,
    return_type: TypeId,
    local_types: Vec<TypeId>,
    local_names: HashMap<String, u32>,
    /// Named targets in scope.
    labels: HashMap<String, BranchTargetId>,
    /// Enclosing `label`s, innermost last; `break N` counts from the end.
    scoped_targets: Vec<BranchTargetId>,
    targets: Vec<BranchTarget>,
    depth: usize,
}

impl<'c> FunctionParser<'c> {
    /// Prepares to parse the body of function `index`, declared by `node`.
    pub(crate) fn new(cx: &'c mut ModuleContext, index: u32, node: &Node) -> Self {
        let (return_type, locals) = match cx.module.functions.get(index as usize) {
            Some(function) => (function.ty.return_type, function.locals.clone()),
            None => (TypeId::Void, Vec::new()),
        };

        let mut local_names = HashMap::new();
        for (i, local) in locals.iter().enumerate() {
            let Some(name) = &local.name else { continue };
            if local_names.contains_key(name) {
                cx.errors.push(ParseError::at_node(
                    ErrorKind::DuplicateDeclaration,
                    format!("duplicate variable name ${}", name),
                    node,
                ));
            } else {
                local_names.insert(name.clone(), i as u32);
            }
        }

        Self {
            cx,
            return_type,
            local_types: locals.iter().map(|local| local.ty).collect(),
            local_names,
            labels: HashMap::new(),
            scoped_targets: Vec::new(),
            targets: Vec::new(),
            depth: 0,
        }
    }

    /// Parses the remaining siblings as the body and returns it together with
    /// the function's branch targets.
    pub(crate) fn parse_body(mut self, it: NodeIt<'_>) -> (UntypedExpression, Vec<BranchTarget>) {
        let return_type = self.return_type;
        let body = in_class_of(
            return_type,
            SequenceAs {
                parser: &mut self,
                it,
                context: "function body",
            },
        );
        (body, self.targets)
    }

    // ------------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------------

    fn record(&mut self, error: ParseError) {
        self.cx.errors.push(error);
    }

    fn fail<N: ClassNode>(&mut self, kind: ErrorKind, message: &str, it: &NodeIt<'_>) -> Expr<N> {
        self.record(ParseError::at(kind, message, it));
        Expr::error(message)
    }

    fn fail_at_node<N: ClassNode>(&mut self, kind: ErrorKind, message: &str, node: &Node) -> Expr<N> {
        self.record(ParseError::at_node(kind, message, node));
        Expr::error(message)
    }

    /// Records excess input if `it` has siblings left.
    fn expect_end(&mut self, it: &NodeIt<'_>, context: &str) {
        if !it.is_end() {
            let message = format!("unexpected input following {}", context);
            self.record(ParseError::at(ErrorKind::ExcessInput, message, it));
        }
    }

    fn coerce_at<N: ClassNode>(&mut self, typed: TypedExpression, ty: TypeId, context: &str, node: &Node) -> Expr<N> {
        match coerce_to::<N>(typed, ty) {
            Ok(expr) => expr,
            Err(typed) => {
                let message = mismatch_message(ty, typed.ty, context);
                // The operand's own failure has already been reported.
                if !typed.expression.is_error() {
                    self.record(ParseError::at_node(ErrorKind::TypeMismatch, message.clone(), node));
                }
                Expr::error(message)
            }
        }
    }

    // ------------------------------------------------------------------------
    // Entry points
    // ------------------------------------------------------------------------

    /// Parses the next sibling as an expression of type `ty`, consuming
    /// exactly one node.
    pub(crate) fn parse_typed<N: ClassNode>(&mut self, ty: TypeId, it: &mut NodeIt<'_>, context: &str) -> Expr<N> {
        let Some(node) = it.next() else {
            let message = format!("expected {} expression for {}", ty, context);
            return self.fail(ErrorKind::Malformed, &message, it);
        };

        if let NodeKind::Error(message) = &node.kind {
            self.record(ParseError::new(ErrorKind::Malformed, message.clone(), node.locus));
            return Expr::error(message.clone());
        }

        let max_depth = self.cx.limits.max_depth;
        if self.depth >= max_depth {
            let message = format!("expression nesting exceeds the limit of {} levels", max_depth);
            self.record(ParseError::too_complex(message.clone(), node.locus));
            return Expr::error(message);
        }

        self.depth += 1;
        let expr = match self.parse_non_parametric(node) {
            Some(typed) => self.coerce_at(typed, ty, context, node),
            None => match self.parse_parametric(ty, node) {
                Some(expr) => expr,
                None => {
                    let message = format!("expected {} expression for {}", ty, context);
                    self.fail_at_node(ErrorKind::Malformed, &message, node)
                }
            },
        };
        self.depth -= 1;
        expr
    }

    /// [`parse_typed`](Self::parse_typed) for a type only known at run time.
    pub(crate) fn parse_untyped(&mut self, ty: TypeId, it: &mut NodeIt<'_>, context: &str) -> UntypedExpression {
        in_class_of(
            ty,
            ParseAs {
                parser: self,
                it,
                context,
            },
        )
    }

    /// Parses all of `it` as a sequence yielding `ty`.
    fn parse_sequence<N: ClassNode>(&mut self, ty: TypeId, it: NodeIt<'_>, context: &str) -> Expr<N> {
        let count = it.remaining().len();
        self.parse_sequence_of(ty, it, context, count)
    }

    /// Parses the next `count` siblings as a sequence: all but the last are
    /// evaluated for effect, the last yields `ty`. An empty sequence is a
    /// `nop` where no value is expected.
    fn parse_sequence_of<N: ClassNode>(
        &mut self,
        ty: TypeId,
        mut it: NodeIt<'_>,
        context: &str,
        count: usize,
    ) -> Expr<N> {
        match count {
            0 if ty == TypeId::Void => nop(),
            0 => self.fail(ErrorKind::Malformed, "missing expression", &it),
            1 => self.parse_typed(ty, &mut it, context),
            _ => {
                let mut statements = Vec::with_capacity(count - 1);
                for _ in 1..count {
                    statements.push(self.parse_typed::<VoidNode>(TypeId::Void, &mut it, context));
                }
                let result = self.parse_typed(ty, &mut it, context);
                Expr::Sequence {
                    first: Box::new(balanced_sequence(statements)),
                    result: Box::new(result),
                }
            }
        }
    }

    fn parse_arguments(
        &mut self,
        parameters: &[TypeId],
        it: &mut NodeIt<'_>,
        context: &str,
    ) -> Vec<UntypedExpression> {
        parameters
            .iter()
            .map(|&ty| self.parse_untyped(ty, it, context))
            .collect()
    }

    // ------------------------------------------------------------------------
    // Operators with a fixed result type
    // ------------------------------------------------------------------------

    fn parse_non_parametric(&mut self, node: &Node) -> Option<TypedExpression> {
        let mut it = NodeIt::children_of(node)?;
        let head = it.next()?;
        let typed = match head.symbol_kind()? {
            SymbolKind::Op(op) => self.parse_op(op, head.symbol()?.name(), it),
            SymbolKind::Keyword(Keyword::Nop) => {
                self.expect_end(&it, "nop");
                typed(VoidNode::Nop, TypeId::Void)
            }
            SymbolKind::Keyword(Keyword::MemorySize) => {
                self.parse_intrinsic("memory_size", FunctionType::new(vec![], TypeId::I32), it)
            }
            SymbolKind::Keyword(Keyword::PageSize) => {
                self.parse_intrinsic("page_size", FunctionType::new(vec![], TypeId::I32), it)
            }
            SymbolKind::Keyword(Keyword::ResizeMemory) => self.parse_intrinsic(
                "resize_memory",
                FunctionType::new(vec![TypeId::I32], TypeId::Void),
                it,
            ),
            _ => return None,
        };
        Some(typed)
    }

    fn parse_op(&mut self, op: Opcode, name: &str, mut it: NodeIt<'_>) -> TypedExpression {
        let typed = match op {
            Opcode::Const(ty) => match self.parse_literal(ty, &mut it) {
                Some(typed) => typed,
                None => return error_of_type(ty, "invalid constant"),
            },

            Opcode::IntUnary(ty, op) => {
                let operand = self.parse_typed(ty, &mut it, "unary operand");
                typed(
                    IntNode::Unary {
                        op,
                        operand: Box::new(operand),
                    },
                    ty,
                )
            }
            Opcode::IntBinary(ty, op) => {
                let left = self.parse_typed(ty, &mut it, "binary left operand");
                let right = self.parse_typed(ty, &mut it, "binary right operand");
                typed(
                    IntNode::Binary {
                        op,
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                    ty,
                )
            }
            Opcode::FloatUnary(ty, op) => {
                let operand = self.parse_typed(ty, &mut it, "unary operand");
                typed(
                    FloatNode::Unary {
                        op,
                        operand: Box::new(operand),
                    },
                    ty,
                )
            }
            Opcode::FloatBinary(ty, op) => {
                let left = self.parse_typed(ty, &mut it, "binary left operand");
                let right = self.parse_typed(ty, &mut it, "binary right operand");
                typed(
                    FloatNode::Binary {
                        op,
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                    ty,
                )
            }
            Opcode::BoolUnary(op) => {
                let operand = self.parse_typed(TypeId::Bool, &mut it, "unary operand");
                typed(
                    BoolNode::Unary {
                        op,
                        operand: Box::new(operand),
                    },
                    TypeId::Bool,
                )
            }
            Opcode::BoolBinary(op) => {
                let left = self.parse_typed(TypeId::Bool, &mut it, "binary left operand");
                let right = self.parse_typed(TypeId::Bool, &mut it, "binary right operand");
                typed(
                    BoolNode::Binary {
                        op,
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                    TypeId::Bool,
                )
            }
            Opcode::Compare(operand_type, op) => {
                let left = self.parse_untyped(operand_type, &mut it, "comparison left operand");
                let right = self.parse_untyped(operand_type, &mut it, "comparison right operand");
                typed(
                    BoolNode::Comparison {
                        op,
                        operand_type,
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                    TypeId::Bool,
                )
            }

            Opcode::IntCast { op, dest, source } => {
                let operand = self.parse_untyped(source, &mut it, "cast source");
                typed(
                    IntNode::Cast {
                        op,
                        source: Box::new(TypedExpression::new(operand, source)),
                    },
                    dest,
                )
            }
            Opcode::FloatCast { op, dest, source } => {
                let operand = self.parse_untyped(source, &mut it, "cast source");
                typed(
                    FloatNode::Cast {
                        op,
                        source: Box::new(TypedExpression::new(operand, source)),
                    },
                    dest,
                )
            }

            Opcode::Load {
                ty,
                memory_type,
                extend,
                align_log2,
            } => {
                if memory_type.primary_class() != ty.primary_class() {
                    let message = "load: memory type must be same type class as result";
                    self.record(ParseError::at(ErrorKind::TypeMismatch, message, &it));
                    return error_of_type(ty, message);
                }
                let address = self.parse_typed(TypeId::I32, &mut it, "load address");
                let access = MemoryAccess {
                    memory_type,
                    align_log2,
                    address: Box::new(address),
                };
                if ty.is_class(TypeClassId::Int) {
                    typed(IntNode::Load { extend, access }, ty)
                } else {
                    typed(FloatNode::Load { access }, ty)
                }
            }
            Opcode::Store {
                ty,
                memory_type,
                align_log2,
            } => {
                if memory_type.primary_class() != ty.primary_class() {
                    let message = "store: memory type must be same type class as result";
                    self.record(ParseError::at(ErrorKind::TypeMismatch, message, &it));
                    return error_of_type(ty, message);
                }
                let address = self.parse_typed(TypeId::I32, &mut it, "store address");
                let access = MemoryAccess {
                    memory_type,
                    align_log2,
                    address: Box::new(address),
                };
                if ty.is_class(TypeClassId::Int) {
                    let value = self.parse_typed(ty, &mut it, "store value");
                    typed(
                        IntNode::Store {
                            access,
                            value: Box::new(value),
                        },
                        ty,
                    )
                } else {
                    let value = self.parse_typed(ty, &mut it, "store value");
                    typed(
                        FloatNode::Store {
                            access,
                            value: Box::new(value),
                        },
                        ty,
                    )
                }
            }
        };
        self.expect_end(&it, name);
        typed
    }

    /// The operand of `const.<ty>`. Integers are truncated to the width of
    /// `ty`; float constants may also be written as integers.
    fn parse_literal(&mut self, ty: TypeId, it: &mut NodeIt<'_>) -> Option<TypedExpression> {
        let kind = it.peek().map(|node| &node.kind);
        let typed = if ty.is_class(TypeClassId::Int) {
            let bits = match kind {
                Some(NodeKind::UnsignedInt(value)) => *value,
                Some(NodeKind::SignedInt(value)) => *value as u64,
                _ => {
                    self.record(ParseError::at(ErrorKind::Malformed, "const: expected integer", it));
                    return None;
                }
            };
            typed(IntNode::Literal(IntLiteral::new(ty, bits)?), ty)
        } else {
            let (wide, narrow) = match kind {
                Some(NodeKind::Float(lit)) => (lit.to_f64(), lit.to_f32()),
                Some(NodeKind::SignedInt(value)) => (*value as f64, *value as f32),
                Some(NodeKind::UnsignedInt(value)) => (*value as f64, *value as f32),
                _ => {
                    let message = "const: expected floating point number";
                    self.record(ParseError::at(ErrorKind::Malformed, message, it));
                    return None;
                }
            };
            let lit = match ty {
                TypeId::F32 => FloatLiteral::F32(narrow),
                _ => FloatLiteral::F64(wide),
            };
            typed(FloatNode::Literal(lit), ty)
        };
        it.next();
        Some(typed)
    }

    /// `memory_size`, `page_size` and `resize_memory` become calls to imports
    /// the embedder provides.
    fn parse_intrinsic(&mut self, name: &str, ty: FunctionType, mut it: NodeIt<'_>) -> TypedExpression {
        let import = self.cx.module.intern_import(INTRINSICS_MODULE, name, ty.clone());
        let args = self.parse_arguments(&ty.parameters, &mut it, "intrinsic parameter");
        self.expect_end(&it, name);
        let call = in_class_of(
            ty.return_type,
            CallAs {
                kind: CallKind::Import,
                function: import,
                args,
            },
        );
        TypedExpression::new(call, ty.return_type)
    }

    // ------------------------------------------------------------------------
    // Operators typed by their context
    // ------------------------------------------------------------------------

    fn parse_parametric<N: ClassNode>(&mut self, ty: TypeId, node: &Node) -> Option<Expr<N>> {
        let mut it = NodeIt::children_of(node)?;
        let head = it.next()?;
        let expr = match head.symbol_kind()? {
            SymbolKind::Switch(key_type) => self.parse_switch(ty, key_type, it),
            SymbolKind::Keyword(keyword) => match keyword {
                Keyword::Block => self.parse_sequence(ty, it, "block body"),
                Keyword::If => self.parse_if(ty, it),
                Keyword::Loop => self.parse_loop(ty, it),
                Keyword::Label => self.parse_label(ty, it),
                Keyword::Break => self.parse_break(it),
                Keyword::Return => self.parse_return(it),
                Keyword::Call => self.parse_call(ty, CallKind::Function, it, node),
                Keyword::CallImport => self.parse_call(ty, CallKind::Import, it, node),
                Keyword::CallIndirect => self.parse_call_indirect(ty, it, node),
                Keyword::GetLocal => self.parse_get_local(ty, it, node),
                Keyword::SetLocal => self.parse_set_local(ty, it, node),
                _ => return None,
            },
            _ => return None,
        };
        Some(expr)
    }

    fn parse_if<N: ClassNode>(&mut self, ty: TypeId, mut it: NodeIt<'_>) -> Expr<N> {
        let condition = self.parse_typed::<BoolNode>(TypeId::Bool, &mut it, "if condition");
        let then_branch = self.parse_typed(ty, &mut it, "if then");
        let else_branch = if !it.is_end() {
            self.parse_typed(ty, &mut it, "if else")
        } else if ty == TypeId::Void {
            nop()
        } else {
            self.fail(ErrorKind::Malformed, "if without else used as value", &it)
        };
        self.expect_end(&it, "if");
        Expr::IfElse {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        }
    }

    fn parse_loop<N: ClassNode>(&mut self, ty: TypeId, mut it: NodeIt<'_>) -> Expr<N> {
        let break_target = self.new_target(ty);
        let continue_target = self.new_target(TypeId::Void);

        let mut scope = LabelScope::new(self);
        let names = [
            (break_target, "loop: break label name shadows outer label"),
            (continue_target, "loop: continue label name shadows outer label"),
        ];
        for (target, shadow_message) in names {
            let Some(name) = it.peek().and_then(Node::name) else { break };
            if !scope.bind(name, target) {
                return scope.fail(ErrorKind::DuplicateDeclaration, shadow_message, &it);
            }
            it.next();
        }

        let body = scope.parse_sequence::<VoidNode>(TypeId::Void, it, "loop body");
        Expr::Loop {
            body: Box::new(body),
            break_target,
            continue_target,
        }
    }

    fn parse_label<N: ClassNode>(&mut self, ty: TypeId, mut it: NodeIt<'_>) -> Expr<N> {
        let target = self.new_target(ty);

        let mut scope = LabelScope::new(self);
        if let Some(name) = it.peek().and_then(Node::name) {
            if !scope.bind(name, target) {
                return scope.fail(ErrorKind::DuplicateDeclaration, "label: name shadows outer label", &it);
            }
            it.next();
        }
        scope.push(target);

        let body = scope.parse_sequence(ty, it, "label body");
        Expr::Label {
            target,
            body: Box::new(body),
        }
    }

    fn parse_switch<N: ClassNode>(&mut self, ty: TypeId, key_type: TypeId, mut it: NodeIt<'_>) -> Expr<N> {
        let end_target = self.new_target(ty);

        let mut scope = LabelScope::new(self);
        let end_name = it.peek().and_then(Node::name);
        if let Some(name) = end_name {
            if scope.is_bound(name) {
                let message = "switch: break label name shadows outer label";
                return scope.fail(ErrorKind::StructuralConstraintViolation, message, &it);
            }
            it.next();
        }

        // The key is outside the end label's scope.
        let key = scope.parse_untyped(key_type, &mut it, "switch key");
        if let Some(name) = end_name {
            scope.bind(name, end_target);
        }

        let mut arms = Vec::new();
        while let Some(mut case) = it.next_if_tree(Keyword::Case) {
            let key = match case.peek().map(|node| &node.kind) {
                Some(NodeKind::UnsignedInt(value)) => *value,
                Some(NodeKind::SignedInt(value)) => *value as u64,
                _ => return scope.fail(ErrorKind::Malformed, "switch: missing integer case key", &case),
            };
            case.next();

            let body = case.remaining();
            let (count, falls_through) = match body.iter().position(|node| node.is_keyword(Keyword::Fallthrough)) {
                Some(last) if last + 1 == body.len() => (last, true),
                Some(misplaced) => {
                    let message = "switch: expected fallthrough to be final symbol in S-expression";
                    return scope.fail_at_node(ErrorKind::Malformed, message, &body[misplaced]);
                }
                None => (body.len(), body.is_empty()),
            };

            let body = if falls_through {
                scope.parse_sequence_of::<VoidNode>(TypeId::Void, case, "switch case body", count)
            } else {
                let value = scope.parse_sequence_of::<N>(ty, case, "switch case body", count);
                if ty == TypeId::Void {
                    VoidExpr::Sequence {
                        first: Box::new(into_void(value)),
                        result: Box::new(VoidExpr::Branch {
                            target: end_target,
                            value: None,
                        }),
                    }
                } else {
                    VoidExpr::Branch {
                        target: end_target,
                        value: Some(Box::new(value.into_untyped())),
                    }
                }
            };
            arms.push(SwitchArm { key, body });
        }

        let default_arm = scope.parse_typed(ty, &mut it, "switch default value");
        scope.expect_end(&it, "switch");
        Expr::Switch {
            key: Box::new(TypedExpression::new(key, key_type)),
            arms,
            default_arm: Box::new(default_arm),
            end_target,
        }
    }

    fn parse_break<N: ClassNode>(&mut self, mut it: NodeIt<'_>) -> Expr<N> {
        let at = it;
        let innermost = self.scoped_targets.last().copied();
        let target = match it.peek() {
            // A depth that is negative or out of range means the innermost label.
            Some(node) if matches!(node.kind, NodeKind::UnsignedInt(_) | NodeKind::SignedInt(_)) => {
                it.next();
                match node.kind {
                    NodeKind::UnsignedInt(depth) => self.target_at_depth(depth).or(innermost),
                    _ => innermost,
                }
            }
            Some(node) if node.name().is_some() => {
                it.next();
                node.name().and_then(|name| self.labels.get(name).copied())
            }
            _ => innermost,
        };
        let Some(target) = target else {
            return self.fail(ErrorKind::UnresolvedSymbol, "break: expected label name or index", &at);
        };

        let target_type = self.target_type(target);
        let value = if target_type == TypeId::Void {
            None
        } else {
            Some(Box::new(self.parse_untyped(target_type, &mut it, "break value")))
        };
        self.expect_end(&it, "break");
        Expr::Branch { target, value }
    }

    fn parse_return<N: ClassNode>(&mut self, mut it: NodeIt<'_>) -> Expr<N> {
        let return_type = self.return_type;
        let value = if return_type == TypeId::Void {
            None
        } else {
            Some(Box::new(self.parse_untyped(return_type, &mut it, "return value")))
        };
        self.expect_end(&it, "return");
        Expr::Return { value }
    }

    fn parse_call<N: ClassNode>(&mut self, ty: TypeId, kind: CallKind, mut it: NodeIt<'_>, node: &Node) -> Expr<N> {
        let module = &self.cx.module;
        let resolved = match kind {
            CallKind::Function => parse_name_or_index(&mut it, &self.cx.function_names, module.functions.len())
                .and_then(|index| Some((index, module.functions.get(index as usize)?.ty.clone()))),
            CallKind::Import => parse_name_or_index(&mut it, &self.cx.import_names, module.function_imports.len())
                .and_then(|index| Some((index, module.function_imports.get(index as usize)?.ty.clone()))),
        };
        let Some((function, callee)) = resolved else {
            let message = match kind {
                CallKind::Function => "call: expected function name or index",
                CallKind::Import => "call_import: expected function import name or index",
            };
            return self.fail(ErrorKind::UnresolvedSymbol, message, &it);
        };

        let name = kind.name();
        let args = self.parse_arguments(&callee.parameters, &mut it, &format!("{} parameter", name));
        self.expect_end(&it, name);

        let call = in_class_of(callee.return_type, CallAs { kind, function, args });
        let context = format!("{} return value", name);
        self.coerce_at(TypedExpression::new(call, callee.return_type), ty, &context, node)
    }

    fn parse_call_indirect<N: ClassNode>(&mut self, ty: TypeId, mut it: NodeIt<'_>, node: &Node) -> Expr<N> {
        let tables = &self.cx.module.function_tables;
        let resolved = parse_index(&mut it, tables.len())
            .and_then(|index| Some((index, tables.get(index as usize)?.ty.clone())));
        let Some((table, table_type)) = resolved else {
            return self.fail(
                ErrorKind::UnresolvedSymbol,
                "call_indirect: expected function table index",
                &it,
            );
        };

        let function = self.parse_typed::<IntNode>(TypeId::I32, &mut it, "call_indirect function");
        let args = self.parse_arguments(&table_type.parameters, &mut it, "call_indirect parameter");
        self.expect_end(&it, "call_indirect");

        let call = in_class_of(
            table_type.return_type,
            CallIndirectAs {
                table,
                function: Box::new(function),
                args,
            },
        );
        self.coerce_at(
            TypedExpression::new(call, table_type.return_type),
            ty,
            "call_indirect return value",
            node,
        )
    }

    fn resolve_local(&self, it: &mut NodeIt<'_>) -> Option<(u32, TypeId)> {
        let local = parse_name_or_index(it, &self.local_names, self.local_types.len())?;
        Some((local, *self.local_types.get(local as usize)?))
    }

    fn parse_get_local<N: ClassNode>(&mut self, ty: TypeId, mut it: NodeIt<'_>, node: &Node) -> Expr<N> {
        let Some((local, local_type)) = self.resolve_local(&mut it) else {
            return self.fail(ErrorKind::UnresolvedSymbol, "get_local: expected local name or index", &it);
        };
        self.expect_end(&it, "get_local");
        let get = in_class_of(local_type, GetLocalAs { local });
        self.coerce_at(TypedExpression::new(get, local_type), ty, "variable", node)
    }

    fn parse_set_local<N: ClassNode>(&mut self, ty: TypeId, mut it: NodeIt<'_>, node: &Node) -> Expr<N> {
        let Some((local, local_type)) = self.resolve_local(&mut it) else {
            return self.fail(ErrorKind::UnresolvedSymbol, "set_local: expected local name or index", &it);
        };
        let set = in_class_of(
            local_type,
            SetLocalAs {
                parser: &mut *self,
                it: &mut it,
                local,
            },
        );
        self.expect_end(&it, "set_local");
        self.coerce_at(TypedExpression::new(set, local_type), ty, "variable", node)
    }

    // ------------------------------------------------------------------------
    // Branch targets
    // ------------------------------------------------------------------------

    fn new_target(&mut self, ty: TypeId) -> BranchTargetId {
        self.targets.push(BranchTarget { ty });
        BranchTargetId((self.targets.len() - 1) as u32)
    }

    fn target_type(&self, target: BranchTargetId) -> TypeId {
        self.targets
            .get(target.0 as usize)
            .map_or(TypeId::Void, |target| target.ty)
    }

    /// The `label` `depth` levels out from the innermost one.
    fn target_at_depth(&self, depth: u64) -> Option<BranchTargetId> {
        let depth = usize::try_from(depth).ok()?;
        self.scoped_targets.iter().rev().nth(depth).copied()
    }
}

/// Label bindings made through this guard are released when it drops, on
/// every path out of the construct that made them.
struct LabelScope<'s, 'c> {
    parser: &'s mut FunctionParser<'c>,
    names: Vec<String>,
    pushed: usize,
}

impl<'s, 'c> LabelScope<'s, 'c> {
    fn new(parser: &'s mut FunctionParser<'c>) -> Self {
        Self {
            parser,
            names: Vec::new(),
            pushed: 0,
        }
    }

    fn is_bound(&self, name: &str) -> bool {
        self.parser.labels.contains_key(name)
    }

    /// Binds `name` for the lifetime of the scope. Fails if it would shadow a
    /// label already in scope.
    fn bind(&mut self, name: &str, target: BranchTargetId) -> bool {
        if self.is_bound(name) {
            return false;
        }
        self.parser.labels.insert(name.to_string(), target);
        self.names.push(name.to_string());
        true
    }

    /// Makes `target` the innermost target for `break N`.
    fn push(&mut self, target: BranchTargetId) {
        self.parser.scoped_targets.push(target);
        self.pushed += 1;
    }
}

impl<'c> Deref for LabelScope<'_, 'c> {
    type Target = FunctionParser<'c>;

    fn deref(&self) -> &FunctionParser<'c> {
        self.parser
    }
}

impl<'c> DerefMut for LabelScope<'_, 'c> {
    fn deref_mut(&mut self) -> &mut FunctionParser<'c> {
        self.parser
    }
}

impl Drop for LabelScope<'_, '_> {
    fn drop(&mut self) {
        for name in self.names.drain(..) {
            self.parser.labels.remove(&name);
        }
        let len = self.parser.scoped_targets.len().saturating_sub(self.pushed);
        self.parser.scoped_targets.truncate(len);
    }
}

// ============================================================================
// Building nodes of a class chosen at run time
// ============================================================================

/// Runs `visitor` at the class of `ty`. Every type the parser hands in has a
/// class; `None` yields a void error node.
fn in_class_of<V: ClassVisitor<Output = UntypedExpression>>(ty: TypeId, visitor: V) -> UntypedExpression {
    dispatch_by_type(ty, visitor)
        .unwrap_or_else(|| VoidExpr::error(format!("no expression class for type {}", ty)).into_untyped())
}

fn typed<N: ClassNode>(node: N, ty: TypeId) -> TypedExpression {
    TypedExpression::new(Expr::Node(node).into_untyped(), ty)
}

fn error_of_type(ty: TypeId, message: &str) -> TypedExpression {
    TypedExpression::new(in_class_of(ty, ErrorAs { message }), ty)
}

fn nop<N: ClassNode>() -> Expr<N> {
    VoidExpr::Node(VoidNode::Nop)
        .into_untyped()
        .into_class()
        .unwrap_or_else(|_| Expr::error("nop used as a value"))
}

fn into_void<N: ClassNode>(expr: Expr<N>) -> VoidExpr {
    expr.into_untyped()
        .into_class()
        .unwrap_or_else(|_| VoidExpr::error("expected a void expression"))
}

/// Chains statements into `Sequence` nodes, nesting logarithmically so long
/// bodies don't produce deep trees.
fn balanced_sequence(mut statements: Vec<VoidExpr>) -> VoidExpr {
    if statements.len() <= 1 {
        return statements.pop().unwrap_or(VoidExpr::Node(VoidNode::Nop));
    }
    let rest = statements.split_off((statements.len() + 1) / 2);
    VoidExpr::Sequence {
        first: Box::new(balanced_sequence(statements)),
        result: Box::new(balanced_sequence(rest)),
    }
}

struct ParseAs<'p, 'c, 'n> {
    parser: &'p mut FunctionParser<'c>,
    it: &'p mut NodeIt<'n>,
    context: &'p str,
}

impl ClassVisitor for ParseAs<'_, '_, '_> {
    type Output = UntypedExpression;

    fn visit<N: ClassNode>(self, ty: TypeId) -> UntypedExpression {
        self.parser.parse_typed::<N>(ty, self.it, self.context).into_untyped()
    }
}

struct SequenceAs<'p, 'c, 'n> {
    parser: &'p mut FunctionParser<'c>,
    it: NodeIt<'n>,
    context: &'p str,
}

impl ClassVisitor for SequenceAs<'_, '_, '_> {
    type Output = UntypedExpression;

    fn visit<N: ClassNode>(self, ty: TypeId) -> UntypedExpression {
        self.parser.parse_sequence::<N>(ty, self.it, self.context).into_untyped()
    }
}

struct SetLocalAs<'p, 'c, 'n> {
    parser: &'p mut FunctionParser<'c>,
    it: &'p mut NodeIt<'n>,
    local: u32,
}

impl ClassVisitor for SetLocalAs<'_, '_, '_> {
    type Output = UntypedExpression;

    fn visit<N: ClassNode>(self, ty: TypeId) -> UntypedExpression {
        let value = self.parser.parse_typed::<N>(ty, self.it, "store value");
        Expr::<N>::SetLocal {
            local: self.local,
            value: Box::new(value),
        }
        .into_untyped()
    }
}

struct GetLocalAs {
    local: u32,
}

impl ClassVisitor for GetLocalAs {
    type Output = UntypedExpression;

    fn visit<N: ClassNode>(self, _ty: TypeId) -> UntypedExpression {
        Expr::<N>::GetLocal { local: self.local }.into_untyped()
    }
}

struct CallAs {
    kind: CallKind,
    function: u32,
    args: Vec<UntypedExpression>,
}

impl ClassVisitor for CallAs {
    type Output = UntypedExpression;

    fn visit<N: ClassNode>(self, _ty: TypeId) -> UntypedExpression {
        Expr::<N>::Call {
            kind: self.kind,
            function: self.function,
            args: self.args,
        }
        .into_untyped()
    }
}

struct CallIndirectAs {
    table: u32,
    function: Box<IntExpr>,
    args: Vec<UntypedExpression>,
}

impl ClassVisitor for CallIndirectAs {
    type Output = UntypedExpression;

    fn visit<N: ClassNode>(self, _ty: TypeId) -> UntypedExpression {
        Expr::<N>::CallIndirect {
            table: self.table,
            function: self.function,
            args: self.args,
        }
        .into_untyped()
    }
}

struct ErrorAs<'m> {
    message: &'m str,
}

impl ClassVisitor for ErrorAs<'_> {
    type Output = UntypedExpression;

    fn visit<N: ClassNode>(self, _ty: TypeId) -> UntypedExpression {
        Expr::<N>::error(self.message).into_untyped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ops::{CompareOp, IntBinaryOp, IntCastOp, LoadExtend};
    use crate::ast::{BoolExpr, FloatExpr, Function};
    use crate::config::ParseLimits;
    use crate::wat::module::{parse_module, parse_module_node};
    use crate::wat::sexpr::read_all;

    /// Parses a module and returns its first function, asserting no errors.
    fn function(source: &str) -> Function {
        match parse_module(source) {
            Ok(mut module) => module.functions.remove(0),
            Err(errors) => panic!("unexpected errors: {:#?}", errors),
        }
    }

    fn body<N: ClassNode>(function: &Function) -> &Expr<N> {
        function
            .body
            .as_ref()
            .and_then(|body| body.as_class::<N>())
            .expect("body of the wrong class")
    }

    fn parse_errors(source: &str) -> Vec<ParseError> {
        match parse_module(source) {
            Ok(_) => Vec::new(),
            Err(errors) => errors,
        }
    }

    fn i32_literal(value: u32) -> IntExpr {
        IntExpr::Node(IntNode::Literal(IntLiteral::I32(value)))
    }

    // ------------------------------------------------------------------------
    // Fixed-type operators
    // ------------------------------------------------------------------------

    #[test]
    fn binary_operator() {
        let f = function("(module (func (result i32) (add.i32 (const.i32 1) (const.i32 2))))");
        assert_eq!(
            body::<IntNode>(&f),
            &IntExpr::Node(IntNode::Binary {
                op: IntBinaryOp::Add,
                left: Box::new(i32_literal(1)),
                right: Box::new(i32_literal(2)),
            })
        );
    }

    #[test]
    fn constants_truncate_and_accept_integers_for_floats() {
        let f = function("(module (func (result i8) (const.i8 -1)))");
        assert_eq!(body::<IntNode>(&f), &IntExpr::Node(IntNode::Literal(IntLiteral::I8(0xff))));

        let f = function("(module (func (result f32) (const.f32 3)))");
        assert_eq!(body::<FloatNode>(&f), &FloatExpr::Node(FloatNode::Literal(FloatLiteral::F32(3.0))));
    }

    #[test]
    fn comparison_operands_use_operand_type() {
        let f = function("(module (func (result bool) (lt_u.i64 (const.i64 1) (const.i64 2))))");
        match body::<BoolNode>(&f) {
            BoolExpr::Node(BoolNode::Comparison {
                op, operand_type, left, ..
            }) => {
                assert_eq!(*op, CompareOp::LtU);
                assert_eq!(*operand_type, TypeId::I64);
                assert_eq!(left.class(), TypeClassId::Int);
            }
            other => panic!("expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn cast_records_source_type() {
        let f = function("(module (func (result i64) (extend_u.i64/i32 (const.i32 7))))");
        match body::<IntNode>(&f) {
            IntExpr::Node(IntNode::Cast { op, source }) => {
                assert_eq!(*op, IntCastOp::ExtendU);
                assert_eq!(source.ty, TypeId::I32);
            }
            other => panic!("expected cast, got {:?}", other),
        }
    }

    #[test]
    fn loads_take_alignment_from_spelling() {
        let f = function("(module (func (result i32) (load16_u.i32:0 (const.i32 8))))");
        match body::<IntNode>(&f) {
            IntExpr::Node(IntNode::Load { extend, access }) => {
                assert_eq!(*extend, LoadExtend::Unsigned);
                assert_eq!(access.memory_type, TypeId::I16);
                assert_eq!(access.align_log2, 0);
                assert_eq!(*access.address, i32_literal(8));
            }
            other => panic!("expected load, got {:?}", other),
        }

        let f = function("(module (func (result f64) (load.f64 (const.i32 0))))");
        match body::<FloatNode>(&f) {
            FloatExpr::Node(FloatNode::Load { access }) => assert_eq!(access.align_log2, 3),
            other => panic!("expected load, got {:?}", other),
        }
        let f = function("(module (func (result i32) (load8_s.i32 (const.i32 0))))");
        match body::<IntNode>(&f) {
            IntExpr::Node(IntNode::Load { access, .. }) => {
                assert_eq!(access.memory_type, TypeId::I8);
                assert_eq!(access.align_log2, 2);
            }
            other => panic!("expected load, got {:?}", other),
        }
    }

    #[test]
    fn unsuffixed_narrow_store_aligns_to_value_type() {
        let f = function("(module (func (result i64) (store16.i64 (const.i32 0) (const.i64 1))))");
        match body::<IntNode>(&f) {
            IntExpr::Node(IntNode::Store { access, .. }) => {
                assert_eq!(access.memory_type, TypeId::I16);
                assert_eq!(access.align_log2, 3);
            }
            other => panic!("expected store, got {:?}", other),
        }
    }

    #[test]
    fn store_yields_its_value() {
        let f = function("(module (func (result i64) (store32.i64 (const.i32 0) (const.i64 5))))");
        assert!(matches!(
            body::<IntNode>(&f),
            IntExpr::Node(IntNode::Store { access, .. }) if access.memory_type == TypeId::I32
        ));
    }

    #[test]
    fn intrinsics_become_imports_once() {
        let module = parse_module(
            "(module (func (result i32) (resize_memory (memory_size)) (add.i32 (memory_size) (page_size))))",
        )
        .unwrap();
        let names: Vec<_> = module.function_imports.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["resize_memory", "memory_size", "page_size"]);
        assert!(module.function_imports.iter().all(|i| i.module == INTRINSICS_MODULE));
        assert_eq!(module.function_imports[0].ty.to_string(), "(i32) -> void");
    }

    // ------------------------------------------------------------------------
    // Coercion at use sites
    // ------------------------------------------------------------------------

    #[test]
    fn int_condition_is_tested_against_zero() {
        let f = function("(module (func (param i32) (if (get_local 0) (nop))))");
        match body::<VoidNode>(&f) {
            VoidExpr::IfElse { condition, .. } => assert!(matches!(
                **condition,
                BoolExpr::Node(BoolNode::Comparison { op: CompareOp::Ne, .. })
            )),
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn statements_discard_their_values() {
        let f = function("(module (func (result i32) (const.i32 1) (const.i32 2)))");
        match body::<IntNode>(&f) {
            IntExpr::Sequence { first, result } => {
                assert!(matches!(**first, VoidExpr::Node(VoidNode::DiscardResult(_))));
                assert_eq!(**result, i32_literal(2));
            }
            other => panic!("expected sequence, got {:?}", other),
        }
    }

    #[test]
    fn type_mismatch_is_reported_with_context() {
        let errors = parse_errors("(module (func (result f32) (const.i32 1)))");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::TypeMismatch);
        assert!(errors[0].message.starts_with("type error: expecting a f32 function body but found i32"));
    }

    #[test]
    fn operand_errors_are_not_reported_twice() {
        let errors = parse_errors("(module (func (result f32) (get_local 9)))");
        assert_eq!(errors.len(), 1, "{:?}", errors);
        assert_eq!(errors[0].kind, ErrorKind::UnresolvedSymbol);

        // A well-formed operator with a bad operand still has the wrong type.
        let errors = parse_errors("(module (func (result f32) (add.i32 (const.i32 1))))");
        let kinds: Vec<_> = errors.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, [ErrorKind::Malformed, ErrorKind::TypeMismatch]);
    }

    // ------------------------------------------------------------------------
    // Control flow
    // ------------------------------------------------------------------------

    #[test]
    fn if_without_else_needs_void() {
        let f = function("(module (func (if (const.i32 1) (nop))))");
        assert!(matches!(
            body::<VoidNode>(&f),
            VoidExpr::IfElse { else_branch, .. } if **else_branch == VoidExpr::Node(VoidNode::Nop)
        ));

        let errors = parse_errors("(module (func (result i32) (if (const.i32 1) (const.i32 2))))");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("if without else used as value"));
    }

    #[test]
    fn break_depth_counts_enclosing_labels() {
        let f = function(
            "(module (func (result i32)
                (label $outer (label (label (break 2 (const.i32 9)))))))",
        );
        // Targets are allocated outermost first.
        let outer = BranchTargetId(0);
        let IntExpr::Label { body, target } = body::<IntNode>(&f) else { panic!("expected label") };
        assert_eq!(*target, outer);
        let IntExpr::Label { body, .. } = &**body else { panic!("expected label") };
        let IntExpr::Label { body, .. } = &**body else { panic!("expected label") };
        assert!(matches!(&**body, IntExpr::Branch { target, value: Some(_) } if *target == outer));
        assert_eq!(f.branch_target(outer).map(|t| t.ty), Some(TypeId::I32));
    }

    #[test]
    fn break_by_name_and_innermost_default() {
        let f = function("(module (func (loop $done $next (break $next) (break $done))))");
        let VoidExpr::Loop {
            body: loop_body,
            break_target,
            continue_target,
        } = body::<VoidNode>(&f)
        else {
            panic!("expected loop")
        };
        let VoidExpr::Sequence { first, result } = &**loop_body else { panic!("expected sequence") };
        assert!(matches!(&**first, VoidExpr::Branch { target, .. } if target == continue_target));
        assert!(matches!(&**result, VoidExpr::Branch { target, .. } if target == break_target));

        let f = function("(module (func (label (break))))");
        let VoidExpr::Label { target, body: label_body } = body::<VoidNode>(&f) else { panic!("expected label") };
        assert!(matches!(&**label_body, VoidExpr::Branch { target: t, value: None } if t == target));
    }

    #[test]
    fn invalid_break_depth_means_innermost_label() {
        for source in [
            "(module (func (label (break 1))))",
            "(module (func (label (break -1))))",
            "(module (func (label (label (break 7)))))",
        ] {
            let f = function(source);
            let innermost = BranchTargetId(f.branch_targets.len() as u32 - 1);
            let mut expr = body::<VoidNode>(&f);
            while let VoidExpr::Label { body: inner, .. } = expr {
                expr = &**inner;
            }
            assert_eq!(*expr, VoidExpr::Branch { target: innermost, value: None }, "{}", source);
        }

        let f = function("(module (func (result i32) (label (break -2 (const.i32 4)))))");
        let IntExpr::Label { target, body: label_body } = body::<IntNode>(&f) else { panic!("expected label") };
        assert!(matches!(&**label_body, IntExpr::Branch { target: t, value: Some(_) } if t == target));
    }

    #[test]
    fn unresolved_break_is_reported() {
        for source in [
            "(module (func (break)))",
            "(module (func (break 0)))",
            "(module (func (label (break $nowhere))))",
        ] {
            let errors = parse_errors(source);
            assert_eq!(errors.len(), 1, "{}: {:?}", source, errors);
            assert_eq!(errors[0].kind, ErrorKind::UnresolvedSymbol);
        }
    }

    #[test]
    fn labels_go_out_of_scope() {
        let errors = parse_errors("(module (func (block (label $l (nop)) (break $l))))");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("break: expected label name or index"));
    }

    #[test]
    fn shadowing_a_label_is_an_error() {
        let errors = parse_errors("(module (func (label $l (loop $l (nop)))))");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::DuplicateDeclaration);
        assert!(errors[0].message.contains("loop: break label name shadows outer label"));

        // The failed loop's bindings don't leak into the rest of the body.
        let errors = parse_errors("(module (func (label $a (loop $b $a (nop))) (label $b (nop))))");
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn switch_arms_fall_through_or_branch_to_end() {
        let f = function(
            "(module (func (param i32) (result i32)
                (switch.i32 $end (get_local 0)
                    (case 0)
                    (case 1 (nop) fallthrough)
                    (case 2 (const.i32 20))
                    (const.i32 99))))",
        );
        let IntExpr::Switch {
            key,
            arms,
            default_arm,
            end_target,
        } = body::<IntNode>(&f)
        else {
            panic!("expected switch")
        };
        assert_eq!(key.ty, TypeId::I32);
        assert_eq!(arms.iter().map(|arm| arm.key).collect::<Vec<_>>(), [0, 1, 2]);
        assert_eq!(arms[0].body, VoidExpr::Node(VoidNode::Nop));
        assert_eq!(arms[1].body, VoidExpr::Node(VoidNode::Nop));
        assert!(matches!(
            &arms[2].body,
            VoidExpr::Branch { target, value: Some(_) } if target == end_target
        ));
        assert_eq!(**default_arm, i32_literal(99));
    }

    #[test]
    fn empty_arm_matches_fallthrough_arm() {
        let source = |arm: &str| {
            format!(
                "(module (func (param i32) (switch.i32 (get_local 0) (case 5 {}) (nop))))",
                arm
            )
        };
        let empty = function(&source(""));
        let marked = function(&source("fallthrough"));
        assert_eq!(empty.body, marked.body);
    }

    #[test]
    fn misplaced_fallthrough_is_rejected() {
        let errors = parse_errors("(module (func (param i32) (switch.i32 (get_local 0) (case 0 fallthrough (nop)) (nop))))");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("fallthrough to be final"));
    }

    #[test]
    fn switch_label_shadowing_is_structural() {
        let errors = parse_errors("(module (func (param i32) (label $x (switch.i32 $x (get_local 0) (nop)))))");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::StructuralConstraintViolation);
    }

    #[test]
    fn return_value_uses_function_type() {
        let f = function("(module (func (result f64) (return (const.f64 1.5))))");
        assert!(matches!(body::<FloatNode>(&f), FloatExpr::Return { value: Some(v) } if v.class() == TypeClassId::Float));

        let errors = parse_errors("(module (func (return (const.i32 1))))");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::ExcessInput);
    }

    // ------------------------------------------------------------------------
    // Calls and locals
    // ------------------------------------------------------------------------

    #[test]
    fn call_by_name_coerces_return() {
        let module = parse_module(
            "(module (func $flag (param i32) (result bool) (ne.i32 (get_local 0) (const.i32 0)))
                     (func (result i32) (call $flag (const.i32 3))))",
        )
        .unwrap();
        match body::<IntNode>(&module.functions[1]) {
            IntExpr::Node(IntNode::Cast {
                op: IntCastOp::ReinterpretBool,
                source,
            }) => {
                assert_eq!(source.ty, TypeId::Bool);
                assert!(matches!(
                    source.expression.as_class::<BoolNode>(),
                    Some(BoolExpr::Call { kind: CallKind::Function, function: 0, args }) if args.len() == 1
                ));
            }
            other => panic!("expected reinterpreted call, got {:?}", other),
        }
    }

    #[test]
    fn call_import_and_indirect() {
        let module = parse_module(
            "(module
                (import $log \"env\" \"log\" (param f64))
                (func $a (param i32) (result i32) (get_local 0))
                (table $a)
                (func (call_import $log (const.f64 1)) (call_indirect 0 (const.i32 0) (const.i32 1))))",
        )
        .unwrap();
        let VoidExpr::Sequence { first, result } = body::<VoidNode>(&module.functions[1]) else {
            panic!("expected sequence")
        };
        assert!(matches!(&**first, VoidExpr::Call { kind: CallKind::Import, function: 0, .. }));
        let VoidExpr::Node(VoidNode::DiscardResult(call)) = &**result else { panic!("expected discard") };
        assert!(matches!(
            call.expression.as_class::<IntNode>(),
            Some(IntExpr::CallIndirect { table: 0, args, .. }) if args.len() == 1
        ));
    }

    #[test]
    fn unresolved_calls_are_reported() {
        let cases = [
            ("(module (func (call $missing)))", "call: expected function name or index"),
            ("(module (func (call_import 0)))", "call_import: expected function import name or index"),
            ("(module (func (call_indirect 0 (const.i32 0))))", "call_indirect: expected function table index"),
            ("(module (func (get_local 0)))", "get_local: expected local name or index"),
            ("(module (func (set_local $x (const.i32 0))))", "set_local: expected local name or index"),
        ];
        for (source, message) in cases {
            let errors = parse_errors(source);
            assert_eq!(errors.len(), 1, "{}", source);
            assert_eq!(errors[0].kind, ErrorKind::UnresolvedSymbol);
            assert!(errors[0].message.starts_with(message), "{}", errors[0].message);
        }
    }

    #[test]
    fn set_local_value_uses_variable_type() {
        let f = function("(module (func (local $x f32) (set_local $x (const.f32 2))))");
        let VoidExpr::Node(VoidNode::DiscardResult(set)) = body::<VoidNode>(&f) else {
            panic!("expected discarded set_local")
        };
        assert_eq!(set.ty, TypeId::F32);
        assert!(matches!(set.expression.as_class::<FloatNode>(), Some(FloatExpr::SetLocal { local: 0, .. })));

        let errors = parse_errors("(module (func (local $x f32) (set_local $x (const.i32 2))))");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("store value"));
    }

    #[test]
    fn duplicate_local_names_keep_first() {
        let errors = parse_errors("(module (func (param $x i32) (local $x f64) (get_local $x)))");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::DuplicateDeclaration);
    }

    // ------------------------------------------------------------------------
    // Limits and reader errors
    // ------------------------------------------------------------------------

    #[test]
    fn empty_bodies() {
        let f = function("(module (func))");
        assert_eq!(body::<VoidNode>(&f), &VoidExpr::Node(VoidNode::Nop));

        let errors = parse_errors("(module (func (result i32)))");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("missing expression"));
    }

    #[test]
    fn reader_errors_become_error_nodes() {
        let errors = parse_errors("(module (func (result i32) (add.i32 (const.i32 1) 0xg)))");
        assert!(!errors.is_empty());
        assert!(errors.iter().all(|e| e.kind == ErrorKind::Malformed));
    }

    #[test]
    fn unknown_forms_consume_one_node() {
        let errors = parse_errors("(module (func (result i32) (frobnicate 1) ))");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.starts_with("expected i32 expression for function body"));
    }

    #[test]
    fn nesting_limit_yields_error_node() {
        let limits = ParseLimits {
            max_depth: 4,
            ..ParseLimits::default()
        };
        let nodes = read_all("(module (func (block (block (block (block (block (nop))))))))").unwrap();
        let (module, errors) = parse_module_node(&nodes[0], &limits);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::InputTooComplex);
        assert!(module.functions[0].body.as_ref().is_some());
    }

    #[test]
    fn long_bodies_nest_shallowly() {
        let statements = vec![VoidExpr::Node(VoidNode::Nop); 1000];
        fn depth(expr: &VoidExpr) -> usize {
            match expr {
                VoidExpr::Sequence { first, result } => 1 + depth(first).max(depth(result)),
                _ => 0,
            }
        }
        assert_eq!(depth(&balanced_sequence(statements)), 10);
    }

    #[test]
    fn three_statements_chain_left_first() {
        let f = function("(module (func (nop) (nop) (nop)))");
        let VoidExpr::Sequence { first, .. } = body::<VoidNode>(&f) else { panic!("expected sequence") };
        assert!(matches!(&**first, VoidExpr::Sequence { .. }));
    }
}
