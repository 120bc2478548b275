//! A front end for the WebAssembly S-expression text format.
//!
//! kast reads modules and test scripts written as S-expressions and produces
//! a typed, validated AST ready for code generation or interpretation. Names
//! and indices are resolved, branch targets are tracked through nested
//! scopes, and implicit numeric coercions are made explicit in the tree.
//!
//! # Modules
//!
//! - [`ast`] -- Types, operators, class-tagged expression trees and modules.
//! - [`wat`] -- The S-expression reader and the module parser.
//! - [`wast`] -- Test scripts: `invoke`, `assert_return`, `assert_return_nan`
//!   and `assert_trap` directives against the modules they define.
//! - [`config`] -- Limits on input size and nesting.
//!
//! # Example
//!
//! Parse a module and look up an export:
//!
//! ```
//! use kast::ast::TypeId;
//! use kast::wat;
//!
//! let module = wat::parse_module(r#"
//!     (module
//!         (func $max (param $a i32) (param $b i32) (result i32)
//!             (if (gt_s.i32 (get_local $a) (get_local $b)) (get_local $a) (get_local $b)))
//!         (export "max" $max))
//! "#).unwrap();
//!
//! let max = module.export("max").unwrap();
//! assert_eq!(max.ty.parameters, [TypeId::I32, TypeId::I32]);
//! assert_eq!(max.ty.return_type, TypeId::I32);
//! ```
//!
//! Errors are collected rather than stopping the parse; a module is only
//! returned when there are none.

pub mod ast;
pub mod config;
pub mod wast;
pub mod wat;
