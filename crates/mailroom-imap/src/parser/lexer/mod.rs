//! Tokenizer for IMAP server lines.
//!
//! Breaks raw bytes into [`Token`]s. A line handed to the lexer must already
//! contain the payload of every `{n}` literal it announces; the framing layer
//! takes care of that.

#![allow(clippy::missing_errors_doc)]

mod token;

pub use token::Token;

use crate::{Error, Result};

/// Longest slice of input copied into a parse error.
const RAW_EXCERPT_LEN: usize = 256;

/// IMAP lexer state.
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input.
    #[must_use]
    pub const fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    /// Returns the current position in the input.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Returns the unconsumed input.
    #[must_use]
    pub fn remaining(&self) -> &'a [u8] {
        &self.input[self.pos..]
    }

    /// Returns true if at end of input.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Peeks at the current byte without consuming it.
    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    /// Peeks at the byte at offset from current position.
    #[must_use]
    pub fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    /// Advances by one byte and returns it.
    pub fn advance(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    /// Skips n bytes.
    pub fn skip(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.input.len());
    }

    /// Reads the next token.
    pub fn next_token(&mut self) -> Result<Token<'a>> {
        let Some(byte) = self.peek() else {
            return Ok(Token::Eof);
        };

        match byte {
            b'\r' => {
                if self.peek_at(1) == Some(b'\n') {
                    self.skip(2);
                    Ok(Token::Crlf)
                } else {
                    Err(self.error("Expected LF after CR"))
                }
            }
            // Bare LF from sloppy servers
            b'\n' => {
                self.advance();
                Ok(Token::Crlf)
            }
            b' ' => {
                self.advance();
                Ok(Token::Space)
            }
            b'(' => {
                self.advance();
                Ok(Token::LParen)
            }
            b')' => {
                self.advance();
                Ok(Token::RParen)
            }
            b'[' => {
                self.advance();
                Ok(Token::LBracket)
            }
            b']' => {
                self.advance();
                Ok(Token::RBracket)
            }
            b'*' => {
                self.advance();
                Ok(Token::Asterisk)
            }
            b'+' => {
                self.advance();
                Ok(Token::Plus)
            }
            b'"' => self.read_quoted_string(),
            b'{' => self.read_literal(),
            b'0'..=b'9' => self.read_number_or_atom(),
            _ if is_atom_char(byte) || byte >= 0x80 => self.read_atom(),
            _ => Err(self.error(&format!("Unexpected character: {byte:#04x}"))),
        }
    }

    fn read_quoted_string(&mut self) -> Result<Token<'a>> {
        self.advance();

        let mut result = Vec::new();

        loop {
            match self.advance() {
                Some(b'"') => break,
                Some(b'\\') => match self.advance() {
                    Some(c @ (b'"' | b'\\')) => result.push(c),
                    // Tolerate stray backslashes
                    Some(c) => {
                        result.push(b'\\');
                        result.push(c);
                    }
                    None => return Err(self.error("Unterminated quoted string")),
                },
                Some(b'\r' | b'\n') | None => {
                    return Err(self.error("Unterminated quoted string"));
                }
                Some(c) => result.push(c),
            }
        }

        Ok(Token::QuotedString(
            String::from_utf8_lossy(&result).into_owned(),
        ))
    }

    /// Reads `{n}` or `{n+}`, the line break, and the n payload bytes.
    fn read_literal(&mut self) -> Result<Token<'a>> {
        self.advance();

        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.advance();
        }
        let digits = &self.input[start..self.pos];

        if self.peek() == Some(b'+') {
            self.advance();
        }
        if digits.is_empty() || self.advance() != Some(b'}') {
            return Err(self.error("Malformed literal length"));
        }

        let size: usize = std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| self.error("Malformed literal length"))?;

        match (self.peek(), self.peek_at(1)) {
            (Some(b'\r'), Some(b'\n')) => self.skip(2),
            (Some(b'\n'), _) => self.skip(1),
            _ => return Err(self.error("Expected CRLF after literal length")),
        }

        let end = self
            .pos
            .checked_add(size)
            .filter(|&end| end <= self.input.len())
            .ok_or_else(|| self.error("Incomplete literal data"))?;

        let data = self.input[self.pos..end].to_vec();
        self.pos = end;

        Ok(Token::Literal(data))
    }

    /// Reads a number, or an atom if the run has non-digits or overflows u32.
    fn read_number_or_atom(&mut self) -> Result<Token<'a>> {
        let start = self.pos;
        let mut all_digits = true;

        while let Some(b) = self.peek() {
            if !is_atom_char(b) {
                break;
            }
            all_digits &= b.is_ascii_digit();
            self.advance();
        }

        let s = self.str_from(start)?;

        if all_digits && let Ok(n) = s.parse::<u32>() {
            return Ok(Token::Number(n));
        }
        Ok(Token::Atom(s))
    }

    fn read_atom(&mut self) -> Result<Token<'a>> {
        let start = self.pos;

        while self
            .peek()
            .is_some_and(|b| is_atom_char(b) || b >= 0x80)
        {
            self.advance();
        }

        let s = self.str_from(start)?;

        if s.eq_ignore_ascii_case("NIL") {
            Ok(Token::Nil)
        } else {
            Ok(Token::Atom(s))
        }
    }

    fn str_from(&self, start: usize) -> Result<&'a str> {
        std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| self.error("Invalid UTF-8 in atom"))
    }

    /// Creates a parse error at the current position.
    pub(crate) fn error(&self, message: &str) -> Error {
        Error::Parse {
            position: self.pos,
            message: message.to_string(),
            raw: raw_excerpt(self.input),
        }
    }

    /// Expects and consumes a specific token kind.
    #[allow(clippy::needless_pass_by_value)]
    pub fn expect(&mut self, expected: Token<'_>) -> Result<()> {
        let token = self.next_token()?;
        if std::mem::discriminant(&token) == std::mem::discriminant(&expected) {
            Ok(())
        } else {
            Err(self.error(&format!("Expected {expected:?}, got {token:?}")))
        }
    }

    /// Expects and consumes a space.
    pub fn expect_space(&mut self) -> Result<()> {
        self.expect(Token::Space)
    }

    /// Reads a number.
    pub fn read_number(&mut self) -> Result<u32> {
        match self.next_token()? {
            Token::Number(n) => Ok(n),
            token => Err(self.error(&format!("Expected number, got {token:?}"))),
        }
    }

    /// Reads an atom.
    pub fn read_atom_string(&mut self) -> Result<&'a str> {
        match self.next_token()? {
            Token::Atom(s) => Ok(s),
            token => Err(self.error(&format!("Expected atom, got {token:?}"))),
        }
    }

    /// Skips optional spaces.
    pub fn skip_spaces(&mut self) {
        while self.peek() == Some(b' ') {
            self.advance();
        }
    }

    /// Consumes the rest of the line as text, without the line ending.
    pub fn read_text_until_crlf(&mut self) -> String {
        let rest = self.remaining();
        let end = rest
            .iter()
            .position(|&b| b == b'\r' || b == b'\n')
            .unwrap_or(rest.len());
        let text = String::from_utf8_lossy(&rest[..end]).into_owned();
        self.skip(end);
        text
    }
}

/// Lossy, bounded copy of the input for error reports.
pub(crate) fn raw_excerpt(input: &[u8]) -> String {
    let end = input.len().min(RAW_EXCERPT_LEN);
    String::from_utf8_lossy(&input[..end])
        .trim_end_matches(['\r', '\n'])
        .to_string()
}

/// Returns true if the byte is a valid atom character.
///
/// `\` is included so flags such as `\Seen` lex as one atom.
#[must_use]
pub const fn is_atom_char(b: u8) -> bool {
    // atom-specials: ( ) { SP CTL % * " ]
    matches!(b,
        0x21 |
        0x23..=0x24 |
        0x26..=0x27 |
        0x2B..=0x5A |
        0x5C |
        0x5E..=0x7A |
        0x7C |
        0x7E
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_untagged_status_line() {
        let mut lexer = Lexer::new(b"* OK ready\r\n");

        assert_eq!(lexer.next_token().unwrap(), Token::Asterisk);
        assert_eq!(lexer.next_token().unwrap(), Token::Space);
        assert_eq!(lexer.next_token().unwrap(), Token::Atom("OK"));
        assert_eq!(lexer.next_token().unwrap(), Token::Space);
        assert_eq!(lexer.next_token().unwrap(), Token::Atom("ready"));
        assert_eq!(lexer.next_token().unwrap(), Token::Crlf);
        assert_eq!(lexer.next_token().unwrap(), Token::Eof);
    }

    #[test]
    fn test_numbers_and_overflow() {
        let mut lexer = Lexer::new(b"42 99999999999 7a");

        assert_eq!(lexer.next_token().unwrap(), Token::Number(42));
        lexer.skip_spaces();
        assert_eq!(lexer.next_token().unwrap(), Token::Atom("99999999999"));
        lexer.skip_spaces();
        assert_eq!(lexer.next_token().unwrap(), Token::Atom("7a"));
    }

    #[test]
    fn test_quoted_string_escapes() {
        let mut lexer = Lexer::new(br#""say \"hi\" \\ there""#);

        assert_eq!(
            lexer.next_token().unwrap(),
            Token::QuotedString(r#"say "hi" \ there"#.to_string())
        );
    }

    #[test]
    fn test_quoted_string_non_utf8_is_lossy() {
        let mut lexer = Lexer::new(b"\"caf\xe9\"");
        match lexer.next_token().unwrap() {
            Token::QuotedString(s) => assert!(s.starts_with("caf")),
            other => panic!("Expected quoted string, got {other:?}"),
        }
    }

    #[test]
    fn test_unterminated_quote() {
        let mut lexer = Lexer::new(b"\"never closed\r\n");
        let err = lexer.next_token().unwrap_err();
        match err {
            Error::Parse { message, raw, .. } => {
                assert!(message.contains("Unterminated"));
                assert_eq!(raw, "\"never closed");
            }
            other => panic!("Expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_nil_any_case() {
        let mut lexer = Lexer::new(b"NIL nil");

        assert_eq!(lexer.next_token().unwrap(), Token::Nil);
        assert_eq!(lexer.next_token().unwrap(), Token::Space);
        assert_eq!(lexer.next_token().unwrap(), Token::Nil);
    }

    #[test]
    fn test_flag_list() {
        let mut lexer = Lexer::new(b"(\\Seen $Forwarded)");

        assert_eq!(lexer.next_token().unwrap(), Token::LParen);
        assert_eq!(lexer.next_token().unwrap(), Token::Atom("\\Seen"));
        assert_eq!(lexer.next_token().unwrap(), Token::Space);
        assert_eq!(lexer.next_token().unwrap(), Token::Atom("$Forwarded"));
        assert_eq!(lexer.next_token().unwrap(), Token::RParen);
    }

    #[test]
    fn test_literal_with_embedded_newlines() {
        let mut lexer = Lexer::new(b"{6}\r\na\r\nb\r\n)");

        assert_eq!(
            lexer.next_token().unwrap(),
            Token::Literal(b"a\r\nb\r\n".to_vec())
        );
        assert_eq!(lexer.next_token().unwrap(), Token::RParen);
    }

    #[test]
    fn test_literal_plus_marker() {
        let mut lexer = Lexer::new(b"{3+}\r\nabc");
        assert_eq!(lexer.next_token().unwrap(), Token::Literal(b"abc".to_vec()));
    }

    #[test]
    fn test_malformed_literals() {
        assert!(Lexer::new(b"{x}\r\nabc").next_token().is_err());
        assert!(Lexer::new(b"{}\r\n").next_token().is_err());
        assert!(Lexer::new(b"{3}abc").next_token().is_err());
        assert!(Lexer::new(b"{10}\r\nshort").next_token().is_err());
    }

    #[test]
    fn test_text_until_crlf() {
        let mut lexer = Lexer::new(b"rest of line\r\nnext");
        assert_eq!(lexer.read_text_until_crlf(), "rest of line");
        assert_eq!(lexer.next_token().unwrap(), Token::Crlf);
    }

    #[test]
    fn test_is_atom_char() {
        assert!(is_atom_char(b'A'));
        assert!(is_atom_char(b'\\'));
        assert!(is_atom_char(b'<'));
        assert!(!is_atom_char(b'"'));
        assert!(!is_atom_char(b'%'));
        assert!(!is_atom_char(b'*'));
        assert!(!is_atom_char(b'['));
        assert!(!is_atom_char(b']'));
        assert!(!is_atom_char(b' '));
        assert!(!is_atom_char(b'('));
        assert!(!is_atom_char(b'{'));
    }
}
