//! Parsed test scripts.
//!
//! A script defines modules and then exercises their exports. Each directive
//! is filed under the module whose export it invokes.

use super::values::Value;
use crate::ast::Module;
use crate::wat::{Locus, ParseError};

/// A parsed script: its modules, the directives targeting each of them and
/// every error found.
#[derive(Debug, Default)]
pub struct File {
    pub modules: Vec<Module>,
    /// `module_tests[i]` holds the directives targeting `modules[i]`, in
    /// source order.
    pub module_tests: Vec<Vec<TestDirective>>,
    pub errors: Vec<ParseError>,
}

impl File {
    /// Whether the script parsed without errors. Partially parsed modules and
    /// directives are kept either way, but only a clean file should be run.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// All directives with the index of the module they target.
    pub fn directives(&self) -> impl Iterator<Item = (usize, &TestDirective)> {
        self.module_tests
            .iter()
            .enumerate()
            .flat_map(|(module, tests)| tests.iter().map(move |test| (module, test)))
    }
}

/// A call to an exported function.
#[derive(Debug, Clone, PartialEq)]
pub struct Invoke {
    /// Index into the target module's functions.
    pub function: u32,
    pub arguments: Vec<Value>,
    pub locus: Locus,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TestDirective {
    /// `(invoke "name" args...)`
    Invoke(Invoke),

    /// `(assert_return (invoke ...) value)`, or `(assert_trap (invoke ...)
    /// "reason")` with an expected [`Value::Exception`].
    Assert {
        invoke: Invoke,
        value: Value,
        locus: Locus,
    },

    /// `(assert_return_nan (invoke ...))`
    AssertNaN { invoke: Invoke, locus: Locus },
}

impl TestDirective {
    pub fn invoke(&self) -> &Invoke {
        match self {
            TestDirective::Invoke(invoke) => invoke,
            TestDirective::Assert { invoke, .. } | TestDirective::AssertNaN { invoke, .. } => invoke,
        }
    }
}
