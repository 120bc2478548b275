//! Character cursor over source text.
//!
//! Tracks the byte offset plus the line, the number of tabs and the number of
//! other characters seen since the start of the line; those three make up
//! the displayed position of a [`Locus`].

use super::token::Locus;

/// A saved cursor position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub offset: usize,
    /// 1-indexed.
    pub line: u32,
    pub tabs: u32,
    pub characters: u32,
}

impl Position {
    /// The locus covering `self..end`, reported at `self`.
    #[must_use]
    pub fn locus_to(self, end: &Position) -> Locus {
        Locus {
            start: self.offset,
            end: end.offset,
            line: self.line,
            tabs: self.tabs,
            characters: self.characters,
        }
    }

    /// A zero-length locus at this position.
    #[must_use]
    pub fn locus_here(self) -> Locus {
        self.locus_to(&self)
    }
}

pub struct Cursor<'a> {
    source: &'a str,
    remaining: &'a str,
    position: Position,
}

impl<'a> Cursor<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            remaining: source,
            position: Position {
                offset: 0,
                line: 1,
                tabs: 0,
                characters: 0,
            },
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn is_eof(&self) -> bool {
        self.remaining.is_empty()
    }

    pub fn peek(&self) -> Option<char> {
        self.remaining.chars().next()
    }

    pub fn peek_second(&self) -> Option<char> {
        let mut chars = self.remaining.chars();
        chars.next();
        chars.next()
    }

    /// Consumes one character, updating line and column bookkeeping.
    pub fn advance(&mut self) -> Option<char> {
        let c = self.remaining.chars().next()?;
        self.remaining = &self.remaining[c.len_utf8()..];
        self.position.offset += c.len_utf8();

        match c {
            '\n' => {
                self.position.line += 1;
                self.position.tabs = 0;
                self.position.characters = 0;
            }
            '\t' => self.position.tabs += 1,
            _ => self.position.characters += 1,
        }

        Some(c)
    }

    pub fn skip_while(&mut self, predicate: impl Fn(char) -> bool) -> usize {
        let mut count = 0;
        while let Some(c) = self.peek() {
            if !predicate(c) {
                break;
            }
            self.advance();
            count += 1;
        }
        count
    }

    /// Consumes characters while `predicate` holds and returns them as a slice.
    pub fn take_while(&mut self, predicate: impl Fn(char) -> bool) -> &'a str {
        let start = self.position;
        self.skip_while(predicate);
        self.slice_from(&start)
    }

    pub fn slice_from(&self, start: &Position) -> &'a str {
        &self.source[start.offset..self.position.offset]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_line_one() {
        let cursor = Cursor::new("abc");
        let pos = cursor.position();
        assert_eq!((pos.offset, pos.line, pos.tabs, pos.characters), (0, 1, 0, 0));
        assert!(!cursor.is_eof());
        assert!(Cursor::new("").is_eof());
    }

    #[test]
    fn tabs_and_characters_are_counted_separately() {
        let mut cursor = Cursor::new("\t\tab\ncd");
        cursor.skip_while(|c| c != 'b');
        let pos = cursor.position();
        assert_eq!((pos.line, pos.tabs, pos.characters), (1, 2, 1));
        assert_eq!(pos.locus_here().column(), 10);

        cursor.skip_while(|c| c != 'd');
        let pos = cursor.position();
        assert_eq!((pos.line, pos.tabs, pos.characters), (2, 0, 1));
    }

    #[test]
    fn multibyte_characters_advance_offset_by_bytes() {
        let mut cursor = Cursor::new("\u{1F600}x");
        cursor.advance();
        assert_eq!(cursor.position().offset, 4);
        assert_eq!(cursor.position().characters, 1);
        assert_eq!(cursor.peek(), Some('x'));
    }

    #[test]
    fn take_while_returns_consumed_text() {
        let mut cursor = Cursor::new("add.i32 rest");
        assert_eq!(cursor.take_while(|c| !c.is_whitespace()), "add.i32");
        assert_eq!(cursor.peek(), Some(' '));
        assert_eq!(cursor.peek_second(), Some('r'));
    }
}
