//! Diagnostics for reading and parsing the text format.

use super::sexpr::{Node, NodeIt};
use super::token::Locus;
use std::fmt;
use thiserror::Error;

/// A malformed token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{locus}: {message}")]
pub struct LexError {
    pub message: String,
    pub locus: Locus,
}

impl LexError {
    pub fn new(message: impl Into<String>, locus: Locus) -> Self {
        Self {
            message: message.into(),
            locus,
        }
    }
}

/// What went wrong, independent of the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Input that doesn't have the expected shape.
    Malformed,
    /// A name or index that doesn't refer to anything.
    UnresolvedSymbol,
    TypeMismatch,
    DuplicateDeclaration,
    /// Well-formed input that breaks a structural rule (memory bounds, tables).
    StructuralConstraintViolation,
    /// Input left over after a form was fully parsed.
    ExcessInput,
    /// Input nested deeper or larger than the configured limits.
    InputTooComplex,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Malformed => "malformed input",
            ErrorKind::UnresolvedSymbol => "unresolved symbol",
            ErrorKind::TypeMismatch => "type mismatch",
            ErrorKind::DuplicateDeclaration => "duplicate declaration",
            ErrorKind::StructuralConstraintViolation => "constraint violation",
            ErrorKind::ExcessInput => "excess input",
            ErrorKind::InputTooComplex => "input too complex",
        };
        f.write_str(name)
    }
}

/// A located diagnostic. Parsing collects these rather than stopping at the
/// first one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{locus}: {message}")]
pub struct ParseError {
    pub kind: ErrorKind,
    pub message: String,
    pub locus: Locus,
}

impl ParseError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, locus: Locus) -> Self {
        Self {
            kind,
            message: message.into(),
            locus,
        }
    }

    pub fn malformed(message: impl Into<String>, locus: Locus) -> Self {
        Self::new(ErrorKind::Malformed, message, locus)
    }

    pub fn too_complex(message: impl Into<String>, locus: Locus) -> Self {
        Self::new(ErrorKind::InputTooComplex, message, locus)
    }

    /// An error at the cursor's next node, or where its siblings ran out.
    pub fn at(kind: ErrorKind, message: impl Into<String>, it: &NodeIt<'_>) -> Self {
        match it.peek() {
            Some(node) => Self::at_node(kind, message, node),
            None => Self::new(kind, message, it.locus()),
        }
    }

    pub fn at_node(kind: ErrorKind, message: impl Into<String>, node: &Node) -> Self {
        let message = format!("{} (S-expression node is {})", message.into(), node.describe());
        Self::new(kind, message, node.locus)
    }
}

impl From<LexError> for ParseError {
    fn from(e: LexError) -> Self {
        ParseError::malformed(e.message, e.locus)
    }
}
