//! Lexical tokens of an IMAP server line.

/// Token types produced by the lexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// Atom (unquoted run of atom characters).
    Atom(&'a str),
    /// Quoted string, with escapes resolved.
    QuotedString(String),
    /// Literal payload introduced by `{n}`.
    Literal(Vec<u8>),
    /// Number that fits in 32 bits.
    Number(u32),
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// Single space.
    Space,
    /// `*`
    Asterisk,
    /// `+`
    Plus,
    /// NIL (any case).
    Nil,
    /// CRLF line ending.
    Crlf,
    /// End of input.
    Eof,
}

impl Token<'_> {
    /// Returns true for tokens that close a line or the input.
    #[must_use]
    pub const fn is_line_end(&self) -> bool {
        matches!(self, Self::Crlf | Self::Eof)
    }
}
