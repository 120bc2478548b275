//! The S-expression text format.
//!
//! Source text is read into a tree of [`Node`]s, then parsed into a typed
//! [`Module`](crate::ast::Module): declarations first, so bodies can refer to
//! functions declared after them, then function bodies and exports.
//!
//! # Example
//!
//! ```
//! use kast::ast::{IntExpr, IntNode, TypeId};
//! use kast::wat::parse_module;
//!
//! let module = parse_module("(module (func $answer (result i32) (const.i32 42)))").unwrap();
//! let answer = &module.functions[0];
//! assert_eq!(answer.ty.return_type, TypeId::I32);
//! assert!(matches!(
//!     answer.body.as_ref().and_then(|b| b.as_class::<IntNode>()),
//!     Some(IntExpr::Node(IntNode::Literal(_)))
//! ));
//! ```
//!
//! # Error Handling
//!
//! Parsing carries on past problems and reports all of them, each with a
//! location:
//!
//! ```
//! use kast::wat::{parse_module, ErrorKind};
//!
//! let errors = parse_module("(module (func (result f32) (const.i32 1)) (func (call $missing)))").unwrap_err();
//! let kinds: Vec<_> = errors.iter().map(|e| e.kind).collect();
//! assert_eq!(kinds, [ErrorKind::TypeMismatch, ErrorKind::UnresolvedSymbol]);
//! ```

pub mod coerce;
mod cursor;
mod error;
mod function;
mod lexer;
mod module;
pub mod sexpr;
pub mod symbols;
mod token;

pub use coerce::{coerce, coerce_to};
pub use error::{ErrorKind, LexError, ParseError};
pub use lexer::Lexer;
pub use module::{parse_module, parse_module_node, parse_module_with_limits};
pub use sexpr::{read_all, read_all_with_limits, Node, NodeIt, NodeKind};
pub use symbols::{Keyword, Opcode, Symbol, SymbolKind};
pub use token::{FloatLit, Locus, Token, TokenKind};
