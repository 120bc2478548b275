//! Parse trees.
//!
//! Reading happens in two phases. First the reader matches parentheses and
//! turns atoms into [`Node`]s, interning reserved words as [`Symbol`]s. Then
//! the module parser walks the trees with [`NodeIt`]. Keeping the phases
//! apart means a parser can look at a whole list before consuming any of it.
//!
//! Malformed atoms do not stop the reader: they become [`NodeKind::Error`]
//! nodes, and the parser reports them where they are used. Unbalanced
//! parentheses and inputs beyond [`ParseLimits`] do stop it.
//!
//! ```
//! use kast::wat::sexpr::{read_all, NodeKind};
//!
//! let nodes = read_all("(module (func $f))").unwrap();
//! assert_eq!(nodes.len(), 1);
//! assert!(matches!(nodes[0].kind, NodeKind::Tree(ref children) if children.len() == 2));
//! ```

use super::error::{LexError, ParseError};
use super::lexer::Lexer;
use super::symbols::{Keyword, Symbol, SymbolKind};
use super::token::{write_string, FloatLit, Locus, Token, TokenKind};
use crate::config::ParseLimits;
use std::fmt;

// ============================================================================
// Nodes
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Tree(Vec<Node>),
    Symbol(Symbol),
    /// An integer written with a minus sign.
    SignedInt(i64),
    UnsignedInt(u64),
    Float(FloatLit),
    String(Vec<u8>),
    /// A bare word that isn't reserved, or a `$name` (sigil included).
    UnindexedSymbol(String),
    /// A token the lexer rejected.
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub locus: Locus,
}

impl Node {
    pub fn new(kind: NodeKind, locus: Locus) -> Self {
        Self { kind, locus }
    }

    pub fn children(&self) -> Option<&[Node]> {
        match &self.kind {
            NodeKind::Tree(children) => Some(children),
            _ => None,
        }
    }

    pub fn symbol(&self) -> Option<Symbol> {
        match self.kind {
            NodeKind::Symbol(symbol) => Some(symbol),
            _ => None,
        }
    }

    pub fn symbol_kind(&self) -> Option<SymbolKind> {
        self.symbol().map(Symbol::kind)
    }

    pub fn keyword(&self) -> Option<Keyword> {
        match self.symbol_kind() {
            Some(SymbolKind::Keyword(keyword)) => Some(keyword),
            _ => None,
        }
    }

    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        self.keyword() == Some(keyword)
    }

    /// The keyword heading this tree, as in `(func ...)`.
    pub fn head_keyword(&self) -> Option<Keyword> {
        self.children()?.first()?.keyword()
    }

    /// The name of a `$name` atom, without the sigil.
    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::UnindexedSymbol(text) => text.strip_prefix('$').filter(|name| !name.is_empty()),
            _ => None,
        }
    }

    pub fn string(&self) -> Option<&[u8]> {
        match &self.kind {
            NodeKind::String(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// A short description for diagnostics: atoms in full, trees by their head.
    pub fn describe(&self) -> String {
        match &self.kind {
            NodeKind::Tree(children) => match children.first() {
                Some(head) if children.len() > 1 => format!("({} ...)", head.describe()),
                Some(head) => format!("({})", head.describe()),
                None => "()".to_string(),
            },
            NodeKind::Error(message) => format!("error: {}", message),
            _ => self.to_string(),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NodeKind::Tree(children) => {
                write!(f, "(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", child)?;
                }
                write!(f, ")")
            }
            NodeKind::Symbol(symbol) => write!(f, "{}", symbol),
            NodeKind::SignedInt(value) => write!(f, "{}", value),
            NodeKind::UnsignedInt(value) => write!(f, "{}", value),
            NodeKind::Float(lit) => write!(f, "{}", lit),
            NodeKind::String(bytes) => write_string(f, bytes),
            NodeKind::UnindexedSymbol(text) => write!(f, "{}", text),
            NodeKind::Error(message) => write!(f, "<error: {}>", message),
        }
    }
}

// ============================================================================
// Sibling iteration
// ============================================================================

/// A cursor over sibling nodes.
///
/// Past the last sibling, [`NodeIt::locus`] still reports a position: the end
/// of the last node consumed, or of the enclosing tree's head.
#[derive(Debug, Clone, Copy)]
pub struct NodeIt<'a> {
    nodes: &'a [Node],
    previous: Locus,
}

impl<'a> NodeIt<'a> {
    pub fn new(nodes: &'a [Node], start: Locus) -> Self {
        Self { nodes, previous: start }
    }

    /// Iterates the children of `node`; `None` if it isn't a tree.
    pub fn children_of(node: &'a Node) -> Option<Self> {
        node.children().map(|children| Self::new(children, node.locus))
    }

    pub fn peek(&self) -> Option<&'a Node> {
        self.nodes.first()
    }

    pub fn is_end(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn remaining(&self) -> &'a [Node] {
        self.nodes
    }

    /// Where the next node is, or where the siblings ran out.
    pub fn locus(&self) -> Locus {
        match self.nodes.first() {
            Some(node) => node.locus,
            None => self.previous.end_point(),
        }
    }

    /// The next node, if it is a tree headed by `keyword`; consumed on success.
    pub fn next_if_tree(&mut self, keyword: Keyword) -> Option<NodeIt<'a>> {
        let node = self.peek()?;
        if node.head_keyword() != Some(keyword) {
            return None;
        }
        self.next();
        let mut inner = NodeIt::children_of(node)?;
        inner.next();
        Some(inner)
    }

    /// Consumes the next node if it is `keyword`.
    pub fn next_if_keyword(&mut self, keyword: Keyword) -> bool {
        if self.peek().map_or(false, |node| node.is_keyword(keyword)) {
            self.next();
            true
        } else {
            false
        }
    }
}

impl<'a> Iterator for NodeIt<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<&'a Node> {
        let (first, rest) = self.nodes.split_first()?;
        self.nodes = rest;
        self.previous = first.locus;
        Some(first)
    }
}

// ============================================================================
// Reader
// ============================================================================

/// Reads every top-level node in `source` with the default limits.
pub fn read_all(source: &str) -> Result<Vec<Node>, ParseError> {
    read_all_with_limits(source, &ParseLimits::default())
}

pub fn read_all_with_limits(source: &str, limits: &ParseLimits) -> Result<Vec<Node>, ParseError> {
    let mut reader = Reader {
        lexer: Lexer::new(source),
        peeked: None,
        limits: *limits,
        node_count: 0,
    };

    let mut nodes = Vec::new();
    while let Some(token) = reader.next_token() {
        nodes.push(reader.read_node(token, 0)?);
    }
    Ok(nodes)
}

struct Reader<'a> {
    lexer: Lexer<'a>,
    peeked: Option<Result<Token, LexError>>,
    limits: ParseLimits,
    node_count: usize,
}

impl<'a> Reader<'a> {
    fn next_token(&mut self) -> Option<Result<Token, LexError>> {
        let token = match self.peeked.take() {
            Some(token) => Some(token),
            None => self.lexer.next(),
        };
        if matches!(token, Some(Err(_))) {
            self.lexer.recover();
        }
        token
    }

    fn peek_token(&mut self) -> Option<&Result<Token, LexError>> {
        if self.peeked.is_none() {
            self.peeked = self.lexer.next();
        }
        self.peeked.as_ref()
    }

    fn read_node(&mut self, token: Result<Token, LexError>, depth: usize) -> Result<Node, ParseError> {
        self.node_count += 1;
        let token = match token {
            Ok(token) => token,
            Err(e) => return Ok(Node::new(NodeKind::Error(e.message), e.locus)),
        };
        if self.node_count > self.limits.max_nodes {
            return Err(ParseError::too_complex(
                format!("input has more than {} nodes", self.limits.max_nodes),
                token.locus,
            ));
        }

        let kind = match token.kind {
            TokenKind::LeftParen => return self.read_tree(token.locus, depth),
            TokenKind::RightParen => return Err(ParseError::malformed("unexpected ')'", token.locus)),
            TokenKind::Keyword(text) => match Symbol::lookup(&text) {
                Some(symbol) => NodeKind::Symbol(symbol),
                None => NodeKind::UnindexedSymbol(text),
            },
            TokenKind::Name(text) => NodeKind::UnindexedSymbol(text),
            TokenKind::String(bytes) => NodeKind::String(bytes),
            TokenKind::Integer {
                negative: false,
                magnitude,
            } => NodeKind::UnsignedInt(magnitude),
            TokenKind::Integer {
                negative: true,
                magnitude,
            } => match 0i64.checked_sub_unsigned(magnitude) {
                Some(value) => NodeKind::SignedInt(value),
                None => NodeKind::Error(format!("integer literal -{} is out of range", magnitude)),
            },
            TokenKind::Float(lit) => NodeKind::Float(lit),
        };
        Ok(Node::new(kind, token.locus))
    }

    fn read_tree(&mut self, open: Locus, depth: usize) -> Result<Node, ParseError> {
        if depth >= self.limits.max_depth {
            return Err(ParseError::too_complex(
                format!("nesting exceeds the limit of {} levels", self.limits.max_depth),
                open,
            ));
        }

        let mut children = Vec::new();
        loop {
            match self.peek_token() {
                None => return Err(ParseError::malformed("unclosed parenthesis", open)),
                Some(Ok(Token {
                    kind: TokenKind::RightParen,
                    locus,
                })) => {
                    let locus = open.extend_to(locus);
                    self.peeked = None;
                    return Ok(Node::new(NodeKind::Tree(children), locus));
                }
                Some(_) => {
                    if let Some(token) = self.next_token() {
                        children.push(self.read_node(token, depth + 1)?);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wat::error::ErrorKind;

    fn read_one(source: &str) -> Node {
        let mut nodes = read_all(source).expect("read failed");
        assert_eq!(nodes.len(), 1);
        nodes.remove(0)
    }

    // ------------------------------------------------------------------------
    // Atoms
    // ------------------------------------------------------------------------

    #[test]
    fn reserved_words_become_symbols() {
        let node = read_one("add.i32");
        assert_eq!(node.symbol().map(Symbol::name), Some("add.i32"));

        let node = read_one("banana");
        assert_eq!(node.kind, NodeKind::UnindexedSymbol("banana".into()));
        assert_eq!(node.name(), None);
    }

    #[test]
    fn names_keep_sigil_but_name_strips_it() {
        let node = read_one("$counter");
        assert_eq!(node.kind, NodeKind::UnindexedSymbol("$counter".into()));
        assert_eq!(node.name(), Some("counter"));
    }

    #[test]
    fn integers_split_by_sign() {
        assert_eq!(read_one("42").kind, NodeKind::UnsignedInt(42));
        assert_eq!(read_one("-42").kind, NodeKind::SignedInt(-42));
        assert_eq!(read_one("-9223372036854775808").kind, NodeKind::SignedInt(i64::MIN));
        assert!(matches!(read_one("-9223372036854775809").kind, NodeKind::Error(_)));
    }

    #[test]
    fn bad_tokens_become_error_nodes() {
        let node = read_one("(a \"\\q\" b)");
        let children = node.children().unwrap();
        assert_eq!(children.len(), 3);
        assert!(matches!(children[1].kind, NodeKind::Error(ref m) if m.contains("invalid escape")));
        assert_eq!(children[2].kind, NodeKind::UnindexedSymbol("b".into()));
    }

    // ------------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------------

    #[test]
    fn trees_span_their_parentheses() {
        let node = read_one("  (module (func))");
        assert_eq!((node.locus.start, node.locus.end), (2, 17));
        assert_eq!(node.head_keyword(), Some(Keyword::Module));
        assert_eq!(node.to_string(), "(module (func))");
        assert_eq!(node.describe(), "(module ...)");
    }

    #[test]
    fn unbalanced_parentheses_fail() {
        let err = read_all("(module").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Malformed);
        assert!(err.message.contains("unclosed"));

        let err = read_all("(module))").unwrap_err();
        assert!(err.message.contains("unexpected ')'"));
    }

    #[test]
    fn nesting_beyond_limit_is_too_complex() {
        let limits = ParseLimits {
            max_depth: 8,
            ..ParseLimits::default()
        };
        let ok = format!("{}{}", "(".repeat(8), ")".repeat(8));
        assert!(read_all_with_limits(&ok, &limits).is_ok());

        let deep = format!("{}{}", "(".repeat(9), ")".repeat(9));
        let err = read_all_with_limits(&deep, &limits).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InputTooComplex);
    }

    #[test]
    fn very_deep_input_does_not_overflow_the_stack() {
        let deep = "(".repeat(100_000);
        let err = read_all(&deep).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InputTooComplex);
    }

    #[test]
    fn node_count_limit() {
        let limits = ParseLimits {
            max_nodes: 3,
            ..ParseLimits::default()
        };
        assert!(read_all_with_limits("(a b)", &limits).is_ok());
        let err = read_all_with_limits("(a b c)", &limits).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InputTooComplex);
    }

    // ------------------------------------------------------------------------
    // NodeIt
    // ------------------------------------------------------------------------

    #[test]
    fn node_it_reports_previous_locus_at_end() {
        let node = read_one("(param i32)");
        let mut it = NodeIt::children_of(&node).unwrap();
        assert!(it.next_if_keyword(Keyword::Param));
        let ty = it.next().unwrap();
        assert!(it.is_end());
        assert_eq!(it.locus().start, ty.locus.end);
        assert_eq!(it.locus().line, ty.locus.line);
    }

    #[test]
    fn next_if_tree_enters_matching_tree_only() {
        let node = read_one("(func (param i32) (result i32))");
        let mut it = NodeIt::children_of(&node).unwrap();
        it.next();
        assert!(it.next_if_tree(Keyword::Result).is_none());
        let mut params = it.next_if_tree(Keyword::Param).unwrap();
        assert_eq!(params.next().map(|n| n.to_string()), Some("i32".to_string()));
        assert_eq!(it.remaining().len(), 1);
    }
}
