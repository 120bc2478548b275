//! Test scripts: modules followed by directives that invoke their exports and
//! assert on the outcome.
//!
//! The directive forms are `invoke`, `assert_return`, `assert_return_nan` and
//! `assert_trap`. Arguments and expected values are written as
//! `(const.<type> literal)` and must match the invoked function's signature.
//! Other top-level forms are skipped.
//!
//! # Example
//!
//! ```
//! use kast::wast::{parse_file, TestDirective, Value};
//!
//! let file = parse_file(r#"
//!     (module
//!         (func $inc (param i32) (result i32) (add.i32 (get_local 0) (const.i32 1)))
//!         (export "inc" $inc))
//!     (assert_return (invoke "inc" (const.i32 41)) (const.i32 42))
//! "#);
//! assert!(file.is_valid());
//! assert!(matches!(
//!     &file.module_tests[0][0],
//!     TestDirective::Assert { value: Value::I32(42), .. }
//! ));
//! ```

pub mod command;
mod parser;
pub mod values;

pub use command::{File, Invoke, TestDirective};
pub use parser::{parse_file, parse_file_with_limits};
pub use values::{Exception, ExceptionCause, Value};
