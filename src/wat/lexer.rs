//! Lexer for the S-expression text format.
//!
//! Implemented as an iterator of `Result<Token, LexError>`. After an error the
//! lexer can be resumed: [`Lexer::recover`] skips to the next token boundary so
//! the reader can record the error in place and carry on.
//!
//! ```
//! use kast::wat::Lexer;
//!
//! let tokens = Lexer::tokenise("(func $f (param i32) (result i32))").unwrap();
//! assert_eq!(tokens.len(), 12);
//! ```

use super::cursor::{Cursor, Position};
use super::error::LexError;
use super::token::{FloatLit, Token, TokenKind};

// ============================================================================
// Lexer
// ============================================================================

pub struct Lexer<'a> {
    cursor: Cursor<'a>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            cursor: Cursor::new(source),
        }
    }

    /// Tokenise the whole source, stopping at the first error.
    pub fn tokenise(source: &str) -> Result<Vec<Token>, LexError> {
        Lexer::new(source).collect()
    }

    /// Skips the rest of a malformed token.
    pub fn recover(&mut self) {
        self.cursor.skip_while(|c| !is_boundary(c));
    }

    /// Position of the next unread character.
    pub fn position(&self) -> Position {
        self.cursor.position()
    }

    fn error(&self, message: impl Into<String>, start: Position) -> LexError {
        LexError::new(message, start.locus_to(&self.cursor.position()))
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Err(e) = self.skip_whitespace_and_comments() {
            return Some(Err(e));
        }
        if self.cursor.is_eof() {
            return None;
        }

        let start = self.cursor.position();
        Some(
            self.lex_token()
                .map(|kind| Token::new(kind, start.locus_to(&self.cursor.position()))),
        )
    }
}

// ============================================================================
// Token dispatch
// ============================================================================

impl<'a> Lexer<'a> {
    fn lex_token(&mut self) -> Result<TokenKind, LexError> {
        let start = self.cursor.position();
        let Some(first) = self.cursor.peek() else {
            return Err(self.error("unexpected end of input", start));
        };

        let kind = match first {
            '(' => {
                self.cursor.advance();
                return Ok(TokenKind::LeftParen);
            }
            ')' => {
                self.cursor.advance();
                return Ok(TokenKind::RightParen);
            }
            '"' => self.lex_string()?,
            '$' => self.lex_name()?,
            '+' | '-' => self.lex_signed_number_or_keyword()?,
            c if c.is_ascii_digit() => self.lex_number(false)?,
            c if is_idchar(c) => self.lex_keyword_or_special_float(),
            c => {
                self.cursor.advance();
                return Err(self.error(format!("unexpected character: {:?}", c), start));
            }
        };

        self.check_token_boundary(start)?;
        Ok(kind)
    }

    fn lex_keyword_or_special_float(&mut self) -> TokenKind {
        let text = self.cursor.take_while(is_idchar);
        match parse_special_float(text, false) {
            Some(float) => TokenKind::Float(float),
            None => TokenKind::Keyword(text.to_string()),
        }
    }

    /// A leading sign starts a number when followed by a digit, `.`, or the
    /// first letter of `inf`/`nan`; otherwise it starts a keyword.
    fn lex_signed_number_or_keyword(&mut self) -> Result<TokenKind, LexError> {
        let looks_numeric = matches!(
            self.cursor.peek_second(),
            Some(c) if c.is_ascii_digit() || c == '.' || c == 'i' || c == 'n'
        );
        if looks_numeric {
            let negative = self.cursor.advance() == Some('-');
            self.lex_number(negative)
        } else {
            Ok(self.lex_keyword_or_special_float())
        }
    }

    /// Whitespace, a parenthesis, a comment or the end of input must follow
    /// every atom.
    fn check_token_boundary(&self, start: Position) -> Result<(), LexError> {
        match self.cursor.peek() {
            None => Ok(()),
            Some(c) if is_boundary(c) => Ok(()),
            Some(c) => Err(self.error(format!("unexpected character {:?} in token", c), start)),
        }
    }
}

// ============================================================================
// Whitespace and comments
// ============================================================================

impl<'a> Lexer<'a> {
    fn skip_whitespace_and_comments(&mut self) -> Result<(), LexError> {
        loop {
            self.cursor.skip_while(|c| c.is_ascii_whitespace());
            match (self.cursor.peek(), self.cursor.peek_second()) {
                (Some(';'), Some(';')) => {
                    self.cursor.skip_while(|c| c != '\n');
                }
                (Some('('), Some(';')) => self.skip_block_comment()?,
                _ => return Ok(()),
            }
        }
    }

    /// Block comments nest.
    fn skip_block_comment(&mut self) -> Result<(), LexError> {
        let start = self.cursor.position();
        self.cursor.advance();
        self.cursor.advance();

        let mut depth = 1u32;
        while depth > 0 {
            match (self.cursor.peek(), self.cursor.peek_second()) {
                (None, _) => return Err(self.error("unterminated block comment", start)),
                (Some('('), Some(';')) => {
                    self.cursor.advance();
                    self.cursor.advance();
                    depth += 1;
                }
                (Some(';'), Some(')')) => {
                    self.cursor.advance();
                    self.cursor.advance();
                    depth -= 1;
                }
                _ => {
                    self.cursor.advance();
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Names and strings
// ============================================================================

impl<'a> Lexer<'a> {
    fn lex_name(&mut self) -> Result<TokenKind, LexError> {
        let start = self.cursor.position();
        self.cursor.advance();
        if self.cursor.take_while(is_idchar).is_empty() {
            return Err(self.error("expected name after '$'", start));
        }
        Ok(TokenKind::Name(self.cursor.slice_from(&start).to_string()))
    }

    fn lex_string(&mut self) -> Result<TokenKind, LexError> {
        let start = self.cursor.position();
        self.cursor.advance();

        let mut bytes = Vec::new();
        loop {
            match self.cursor.advance() {
                None => return Err(self.error("unterminated string literal", start)),
                Some('"') => return Ok(TokenKind::String(bytes)),
                Some('\\') => self.lex_escape(&mut bytes)?,
                Some(c) => {
                    let mut buf = [0u8; 4];
                    bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                }
            }
        }
    }

    fn lex_escape(&mut self, bytes: &mut Vec<u8>) -> Result<(), LexError> {
        let start = self.cursor.position();
        let Some(c) = self.cursor.advance() else {
            return Err(self.error("unterminated escape sequence", start));
        };

        match c {
            't' => bytes.push(b'\t'),
            'n' => bytes.push(b'\n'),
            'r' => bytes.push(b'\r'),
            '"' => bytes.push(b'"'),
            '\'' => bytes.push(b'\''),
            '\\' => bytes.push(b'\\'),
            'u' => self.lex_unicode_escape(bytes, start)?,
            high if high.is_ascii_hexdigit() => {
                let low = self.cursor.advance().and_then(|c| c.to_digit(16));
                match (high.to_digit(16), low) {
                    (Some(high), Some(low)) => bytes.push(((high << 4) | low) as u8),
                    _ => return Err(self.error("invalid hex escape", start)),
                }
            }
            c => return Err(self.error(format!("invalid escape sequence: \\{}", c), start)),
        }
        Ok(())
    }

    fn lex_unicode_escape(&mut self, bytes: &mut Vec<u8>, start: Position) -> Result<(), LexError> {
        if self.cursor.advance() != Some('{') {
            return Err(self.error("expected '{' after \\u", start));
        }
        let digits = self.cursor.take_while(|c| c.is_ascii_hexdigit());
        if self.cursor.advance() != Some('}') {
            return Err(self.error("expected '}' to close unicode escape", start));
        }

        let c = u32::from_str_radix(digits, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| self.error(format!("invalid unicode escape: \\u{{{}}}", digits), start))?;
        let mut buf = [0u8; 4];
        bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
        Ok(())
    }
}

// ============================================================================
// Numbers
// ============================================================================

impl<'a> Lexer<'a> {
    /// Lexes a number whose sign, if any, has been consumed.
    fn lex_number(&mut self, negative: bool) -> Result<TokenKind, LexError> {
        let start = self.cursor.position();

        if matches!(self.cursor.peek(), Some('i') | Some('n')) {
            let text = self
                .cursor
                .take_while(|c| c.is_ascii_alphanumeric() || c == ':' || c == '_');
            return parse_special_float(text, negative)
                .map(TokenKind::Float)
                .ok_or_else(|| self.error(format!("invalid number: {}", text), start));
        }

        let hex = self.cursor.peek() == Some('0') && matches!(self.cursor.peek_second(), Some('x') | Some('X'));
        if hex {
            self.cursor.advance();
            self.cursor.advance();
        }
        let digits_start = self.cursor.position();
        let is_digit = move |c: char| if hex { c.is_ascii_hexdigit() } else { c.is_ascii_digit() };
        let digits = self.cursor.take_while(|c| is_digit(c) || c == '_');

        let exponent_marker = if hex { ['p', 'P'] } else { ['e', 'E'] };
        if matches!(self.cursor.peek(), Some(c) if c == '.' || exponent_marker.contains(&c)) {
            return self.lex_float(negative, hex, digits_start);
        }

        if digits.is_empty() || !valid_underscores(digits, hex) {
            return Err(self.error("malformed integer literal", start));
        }

        let clean: String = digits.chars().filter(|&c| c != '_').collect();
        let parsed = if hex {
            u64::from_str_radix(&clean, 16)
        } else {
            clean.parse::<u64>()
        };
        Ok(match parsed {
            Ok(magnitude) => TokenKind::Integer { negative, magnitude },
            // Too wide for any integer type; only meaningful as a float.
            Err(_) if hex => TokenKind::Float(FloatLit::Hex {
                negative,
                digits: format!("0x{}", clean),
            }),
            Err(_) => TokenKind::Float(FloatLit::Decimal { negative, digits: clean }),
        })
    }

    /// Consumes the fraction and exponent of a float whose integer digits
    /// start at `digits_start`.
    fn lex_float(&mut self, negative: bool, hex: bool, digits_start: Position) -> Result<TokenKind, LexError> {
        let is_digit = move |c: char| if hex { c.is_ascii_hexdigit() } else { c.is_ascii_digit() };

        if self.cursor.peek() == Some('.') {
            self.cursor.advance();
            self.cursor.skip_while(|c| is_digit(c) || c == '_');
        }

        if matches!(self.cursor.peek(), Some(c) if (hex && (c == 'p' || c == 'P')) || (!hex && (c == 'e' || c == 'E')))
        {
            self.cursor.advance();
            if matches!(self.cursor.peek(), Some('+') | Some('-')) {
                self.cursor.advance();
            }
            let exponent = self.cursor.take_while(|c| c.is_ascii_digit() || c == '_');
            if !exponent.chars().any(|c| c.is_ascii_digit()) {
                return Err(self.error("missing exponent digits", digits_start));
            }
        }

        let text = self.cursor.slice_from(&digits_start);
        if !valid_underscores(text, hex) || !text.chars().any(|c| is_digit(c)) {
            return Err(self.error("malformed float literal", digits_start));
        }

        let clean: String = text.chars().filter(|&c| c != '_').collect();
        if hex {
            Ok(TokenKind::Float(FloatLit::Hex {
                negative,
                digits: format!("0x{}", clean),
            }))
        } else {
            clean
                .parse::<f64>()
                .map_err(|_| self.error("malformed float literal", digits_start))?;
            Ok(TokenKind::Float(FloatLit::Decimal { negative, digits: clean }))
        }
    }
}

// ============================================================================
// Character classes
// ============================================================================

/// Underscores may only separate two digits.
fn valid_underscores(text: &str, hex: bool) -> bool {
    let bytes = text.as_bytes();
    let mut in_exponent = false;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'_' => {
                let digit = |b: u8| {
                    if hex && !in_exponent {
                        b.is_ascii_hexdigit()
                    } else {
                        b.is_ascii_digit()
                    }
                };
                let before = i.checked_sub(1).map(|j| bytes[j]);
                let after = bytes.get(i + 1).copied();
                if !before.map_or(false, digit) || !after.map_or(false, digit) {
                    return false;
                }
            }
            b'p' | b'P' => in_exponent = true,
            b'e' | b'E' if !hex => in_exponent = true,
            _ => {}
        }
    }
    true
}

fn is_boundary(c: char) -> bool {
    c.is_ascii_whitespace() || c == '(' || c == ')' || c == ';'
}

/// Characters allowed in keywords and `$names`.
fn is_idchar(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '!' | '#'
                | '$'
                | '%'
                | '&'
                | '\''
                | '*'
                | '+'
                | '-'
                | '.'
                | '/'
                | ':'
                | '<'
                | '='
                | '>'
                | '?'
                | '@'
                | '\\'
                | '^'
                | '_'
                | '`'
                | '|'
                | '~'
        )
}

fn parse_special_float(text: &str, negative: bool) -> Option<FloatLit> {
    match text {
        "inf" => Some(FloatLit::Infinity { negative }),
        "nan" => Some(FloatLit::Nan {
            negative,
            payload: None,
        }),
        _ => {
            let payload = text.strip_prefix("nan:0x")?;
            if payload.is_empty() || !valid_underscores(payload, true) {
                return None;
            }
            let clean: String = payload.chars().filter(|&c| c != '_').collect();
            let payload = u64::from_str_radix(&clean, 16).ok()?;
            Some(FloatLit::Nan {
                negative,
                payload: Some(payload),
            })
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::tokenise(source)
            .expect("tokenise failed")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn keyword(text: &str) -> TokenKind {
        TokenKind::Keyword(text.into())
    }

    fn int(negative: bool, magnitude: u64) -> TokenKind {
        TokenKind::Integer { negative, magnitude }
    }

    fn expect_error(source: &str, substring: &str) {
        let err = Lexer::tokenise(source).expect_err("expected error");
        assert!(
            err.message.contains(substring),
            "expected error containing {:?}, got {:?}",
            substring,
            err.message
        );
    }

    // ------------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------------

    #[test]
    fn parens_and_keywords() {
        assert_eq!(
            kinds("(module (func))"),
            vec![
                TokenKind::LeftParen,
                keyword("module"),
                TokenKind::LeftParen,
                keyword("func"),
                TokenKind::RightParen,
                TokenKind::RightParen,
            ]
        );
        assert_eq!(kinds(""), vec![]);
    }

    #[test]
    fn opcode_spellings_are_single_keywords() {
        assert_eq!(
            kinds("add.i32 wrap.i32/i64 load8_s.i32:1"),
            vec![keyword("add.i32"), keyword("wrap.i32/i64"), keyword("load8_s.i32:1")]
        );
    }

    #[test]
    fn names_keep_their_sigil() {
        assert_eq!(kinds("$loop $a.b"), vec![TokenKind::Name("$loop".into()), TokenKind::Name("$a.b".into())]);
        expect_error("$ ", "expected name");
    }

    // ------------------------------------------------------------------------
    // Strings
    // ------------------------------------------------------------------------

    #[test]
    fn string_escapes() {
        assert_eq!(kinds(r#""a\tb\n""#), vec![TokenKind::String(b"a\tb\n".to_vec())]);
        assert_eq!(kinds(r#""\00\ff""#), vec![TokenKind::String(vec![0, 0xff])]);
        assert_eq!(kinds(r#""\u{e9}""#), vec![TokenKind::String("\u{e9}".as_bytes().to_vec())]);
        expect_error(r#""\q""#, "invalid escape");
        expect_error("\"open", "unterminated string");
    }

    // ------------------------------------------------------------------------
    // Numbers
    // ------------------------------------------------------------------------

    #[test]
    fn integers() {
        assert_eq!(
            kinds("0 42 -7 +3 0x1F 1_000"),
            vec![int(false, 0), int(false, 42), int(true, 7), int(false, 3), int(false, 31), int(false, 1000)]
        );
        assert_eq!(kinds("18446744073709551615"), vec![int(false, u64::MAX)]);
    }

    #[test]
    fn malformed_numbers() {
        expect_error("1__0", "malformed integer");
        expect_error("1x", "unexpected character");
        expect_error("1e", "missing exponent");
    }

    #[test]
    fn floats() {
        assert_eq!(
            kinds("1.5 -0x1p4 inf -nan nan:0xff"),
            vec![
                TokenKind::Float(FloatLit::Decimal {
                    negative: false,
                    digits: "1.5".into()
                }),
                TokenKind::Float(FloatLit::Hex {
                    negative: true,
                    digits: "0x1p4".into()
                }),
                TokenKind::Float(FloatLit::Infinity { negative: false }),
                TokenKind::Float(FloatLit::Nan {
                    negative: true,
                    payload: None
                }),
                TokenKind::Float(FloatLit::Nan {
                    negative: false,
                    payload: Some(0xff)
                }),
            ]
        );
    }

    #[test]
    fn oversized_integer_becomes_float() {
        assert!(matches!(kinds("99999999999999999999")[0], TokenKind::Float(FloatLit::Decimal { .. })));
    }

    // ------------------------------------------------------------------------
    // Comments and positions
    // ------------------------------------------------------------------------

    #[test]
    fn comments_are_skipped() {
        assert_eq!(kinds(";; line\n(; block (; nested ;) ;) nop"), vec![keyword("nop")]);
        expect_error("(; open", "unterminated block comment");
    }

    #[test]
    fn loci_track_lines_and_tabs() {
        let tokens = Lexer::tokenise("(module\n\t(func))").unwrap();
        let func = &tokens[3];
        assert_eq!(func.kind, keyword("func"));
        assert_eq!(func.locus.line, 2);
        assert_eq!(func.locus.to_string(), "2:6");
        assert_eq!(&"(module\n\t(func))"[func.locus.start..func.locus.end], "func");
    }

    #[test]
    fn recovery_resumes_after_bad_token() {
        let mut lexer = Lexer::new("1x2 nop");
        assert!(lexer.next().unwrap().is_err());
        lexer.recover();
        assert_eq!(lexer.next().unwrap().unwrap().kind, keyword("nop"));
        assert!(lexer.next().is_none());
    }
}
