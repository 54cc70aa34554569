//! Generic IMAP value tree.
//!
//! Most untagged data is a whitespace separated run of atoms, strings,
//! literals, NILs and nested parenthesized lists. [`parse_line`] turns such a
//! run into a tree of [`Value`]s that the typed response interpreters and the
//! BODYSTRUCTURE parser walk.
//!
//! Section specifiers are glued onto the atom they follow, so
//! `BODY[HEADER.FIELDS (TO)]<0>` is a single atom rather than a list.

use super::lexer::{Lexer, Token};
use crate::Result;

/// A node of a parsed IMAP value tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Bare atom, including numbers and glued section specifiers.
    Atom(String),
    /// Quoted string.
    Quoted(String),
    /// Literal payload.
    Literal(Vec<u8>),
    /// NIL.
    Nil,
    /// Parenthesized list.
    List(Vec<Value>),
}

impl Value {
    /// Borrows the text of an atom, quoted string or UTF-8 literal.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Atom(s) | Self::Quoted(s) => Some(s),
            Self::Literal(bytes) => std::str::from_utf8(bytes).ok(),
            Self::Nil | Self::List(_) => None,
        }
    }

    /// Returns the string form of a scalar, decoding literals lossily.
    ///
    /// NIL and lists yield `None`.
    #[must_use]
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Atom(s) | Self::Quoted(s) => Some(s.clone()),
            Self::Literal(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
            Self::Nil | Self::List(_) => None,
        }
    }

    /// Raw bytes of a string-like value.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Atom(s) | Self::Quoted(s) => Some(s.as_bytes()),
            Self::Literal(bytes) => Some(bytes),
            Self::Nil | Self::List(_) => None,
        }
    }

    /// Parses the value as an unsigned 32-bit number.
    #[must_use]
    pub fn as_u32(&self) -> Option<u32> {
        self.as_str()?.parse().ok()
    }

    /// Parses the value as an unsigned 64-bit number.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        self.as_str()?.parse().ok()
    }

    /// Returns the elements of a list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns true for NIL.
    #[must_use]
    pub const fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// Returns true for a parenthesized list.
    #[must_use]
    pub const fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    /// Case-insensitive comparison against an atom.
    #[must_use]
    pub fn is_atom(&self, name: &str) -> bool {
        matches!(self, Self::Atom(s) if s.eq_ignore_ascii_case(name))
    }
}

/// Parses every value on a line up to CRLF or end of input.
///
/// # Errors
///
/// Returns a parse error for an unterminated list or quoted string, a
/// malformed literal, or a stray closing delimiter.
pub fn parse_line(input: &[u8]) -> Result<Vec<Value>> {
    let mut lexer = Lexer::new(input);
    parse_values(&mut lexer)
}

/// Parses values from the lexer's position up to CRLF or end of input.
pub(crate) fn parse_values(lexer: &mut Lexer<'_>) -> Result<Vec<Value>> {
    parse_sequence(lexer, None)
}

/// Parses values up to and including the closing `]` of a response code.
pub(crate) fn parse_until_bracket(lexer: &mut Lexer<'_>) -> Result<Vec<Value>> {
    parse_sequence(lexer, Some(b']'))
}

fn parse_sequence(lexer: &mut Lexer<'_>, close: Option<u8>) -> Result<Vec<Value>> {
    let mut items = Vec::new();

    loop {
        lexer.skip_spaces();
        match lexer.peek() {
            None | Some(b'\r' | b'\n') => {
                if close.is_some() {
                    return Err(lexer.error("Unterminated list"));
                }
                return Ok(items);
            }
            Some(b) if Some(b) == close => {
                lexer.advance();
                return Ok(items);
            }
            Some(b @ (b')' | b']')) => {
                return Err(lexer.error(&format!("Unexpected '{}'", char::from(b))));
            }
            Some(_) => items.push(parse_value(lexer)?),
        }
    }
}

/// Parses one value at the lexer's position.
pub(crate) fn parse_value(lexer: &mut Lexer<'_>) -> Result<Value> {
    let before = lexer.remaining();
    let token = lexer.next_token()?;
    let consumed = before.len() - lexer.remaining().len();

    match token {
        Token::Atom(_) | Token::Number(_) | Token::Asterisk | Token::Plus => {
            let mut text = String::from_utf8_lossy(&before[..consumed]).into_owned();
            glue_tail(lexer, &mut text)?;
            Ok(Value::Atom(text))
        }
        Token::LBracket => {
            let mut text = String::from("[");
            read_section(lexer, &mut text)?;
            glue_tail(lexer, &mut text)?;
            Ok(Value::Atom(text))
        }
        Token::QuotedString(s) => Ok(Value::Quoted(s)),
        Token::Literal(bytes) => Ok(Value::Literal(bytes)),
        Token::Nil => Ok(Value::Nil),
        Token::LParen => Ok(Value::List(parse_sequence(lexer, Some(b')'))?)),
        other => Err(lexer.error(&format!("Unexpected token {other:?}"))),
    }
}

/// Extends an atom over section specifiers, partial ranges and wildcards.
fn glue_tail(lexer: &mut Lexer<'_>, text: &mut String) -> Result<()> {
    while let Some(b) = lexer.peek() {
        match b {
            b'[' => {
                lexer.advance();
                text.push('[');
                read_section(lexer, text)?;
            }
            b'*' | b'%' => {
                lexer.advance();
                text.push(char::from(b));
            }
            _ if super::lexer::is_atom_char(b) => {
                lexer.advance();
                text.push(char::from(b));
            }
            _ => break,
        }
    }
    Ok(())
}

/// Copies a bracketed section verbatim, through the matching `]`.
fn read_section(lexer: &mut Lexer<'_>, text: &mut String) -> Result<()> {
    let start = lexer.remaining();
    let mut depth = 1usize;
    let mut in_quote = false;
    let mut len = 0;

    while depth > 0 {
        let Some(b) = lexer.advance() else {
            return Err(lexer.error("Unterminated section"));
        };
        len += 1;
        match b {
            b'\r' | b'\n' => return Err(lexer.error("Unterminated section")),
            b'"' => in_quote = !in_quote,
            b'\\' if in_quote => {
                lexer.advance();
                len += 1;
            }
            b'[' if !in_quote => depth += 1,
            b']' if !in_quote => depth -= 1,
            _ => {}
        }
    }

    text.push_str(&String::from_utf8_lossy(&start[..len]));
    Ok(())
}
