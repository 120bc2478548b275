//! Lexical tokens and source loci.

use fhex::FromHex;
use std::fmt;

/// Columns a tab advances the displayed position by.
pub const TAB_WIDTH: u32 = 4;

/// A location in source text.
///
/// `start..end` are byte offsets for slicing. The displayed position is the
/// line plus a column computed from the tabs and other characters preceding
/// `start` on that line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Locus {
    pub start: usize,
    pub end: usize,
    pub line: u32,
    pub tabs: u32,
    pub characters: u32,
}

impl Locus {
    /// 1-indexed display column.
    pub fn column(&self) -> u32 {
        self.tabs * TAB_WIDTH + self.characters + 1
    }

    /// The locus spanning from the start of `self` to the end of `other`.
    #[must_use]
    pub fn extend_to(self, other: &Locus) -> Locus {
        Locus {
            end: other.end.max(self.end),
            ..self
        }
    }

    /// A zero-length locus at the end of `self`. The displayed position is
    /// unchanged; only the byte range moves.
    #[must_use]
    pub fn end_point(self) -> Locus {
        Locus {
            start: self.end,
            ..self
        }
    }
}

impl fmt::Display for Locus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line.max(1), self.column())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub locus: Locus,
}

impl Token {
    pub fn new(kind: TokenKind, locus: Locus) -> Self {
        Self { kind, locus }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    LeftParen,
    RightParen,
    /// A bare word such as `module` or `add.i32`.
    Keyword(String),
    /// A `$name`, stored with its sigil.
    Name(String),
    /// String contents with escapes resolved.
    String(Vec<u8>),
    /// An integer literal, stored as sign plus magnitude so both the full
    /// `u64` range and `i64::MIN` are representable.
    Integer { negative: bool, magnitude: u64 },
    Float(FloatLit),
}

/// A floating point literal, kept as source text so that `f32` and `f64`
/// conversions each round once.
#[derive(Debug, Clone, PartialEq)]
pub enum FloatLit {
    Decimal { negative: bool, digits: String },
    /// `digits` includes the `0x` prefix.
    Hex { negative: bool, digits: String },
    Infinity { negative: bool },
    /// `payload` holds the significand bits of `nan:0x...`.
    Nan { negative: bool, payload: Option<u64> },
}

impl FloatLit {
    fn is_negative(&self) -> bool {
        match self {
            FloatLit::Decimal { negative, .. }
            | FloatLit::Hex { negative, .. }
            | FloatLit::Infinity { negative }
            | FloatLit::Nan { negative, .. } => *negative,
        }
    }

    pub fn to_f64(&self) -> f64 {
        let magnitude = match self {
            FloatLit::Decimal { digits, .. } => digits.parse().unwrap_or(0.0),
            FloatLit::Hex { digits, .. } => f64::from_hex(digits).unwrap_or(0.0),
            FloatLit::Infinity { .. } => f64::INFINITY,
            FloatLit::Nan { payload, .. } => {
                let payload = payload.unwrap_or(1 << 51) & ((1 << 52) - 1);
                f64::from_bits(0x7ff0_0000_0000_0000 | payload.max(1))
            }
        };
        if self.is_negative() {
            -magnitude
        } else {
            magnitude
        }
    }

    pub fn to_f32(&self) -> f32 {
        let magnitude = match self {
            FloatLit::Decimal { digits, .. } => digits.parse().unwrap_or(0.0),
            FloatLit::Hex { digits, .. } => f32::from_hex(digits).unwrap_or(0.0),
            FloatLit::Infinity { .. } => f32::INFINITY,
            FloatLit::Nan { payload, .. } => {
                let payload = (payload.unwrap_or(1 << 22) & ((1 << 23) - 1)) as u32;
                f32::from_bits(0x7f80_0000 | payload.max(1))
            }
        };
        if self.is_negative() {
            -magnitude
        } else {
            magnitude
        }
    }
}

impl fmt::Display for FloatLit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_negative() {
            write!(f, "-")?;
        }
        match self {
            FloatLit::Decimal { digits, .. } | FloatLit::Hex { digits, .. } => write!(f, "{}", digits),
            FloatLit::Infinity { .. } => write!(f, "inf"),
            FloatLit::Nan { payload: None, .. } => write!(f, "nan"),
            FloatLit::Nan {
                payload: Some(payload), ..
            } => write!(f, "nan:0x{:x}", payload),
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::LeftParen => write!(f, "("),
            TokenKind::RightParen => write!(f, ")"),
            TokenKind::Keyword(s) | TokenKind::Name(s) => write!(f, "{}", s),
            TokenKind::String(bytes) => write_string(f, bytes),
            TokenKind::Integer { negative, magnitude } => {
                write!(f, "{}{}", if *negative { "-" } else { "" }, magnitude)
            }
            TokenKind::Float(lit) => write!(f, "{}", lit),
        }
    }
}

/// Writes `bytes` as a quoted string literal, escaping anything unprintable.
pub(crate) fn write_string(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    write!(f, "\"")?;
    for &b in bytes {
        match b {
            b'"' => write!(f, "\\\"")?,
            b'\\' => write!(f, "\\\\")?,
            b if b.is_ascii_graphic() || b == b' ' => write!(f, "{}", b as char)?,
            b => write!(f, "\\{:02x}", b)?,
        }
    }
    write!(f, "\"")
}
