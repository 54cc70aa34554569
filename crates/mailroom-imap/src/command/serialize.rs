//! Command serialization helpers.

use super::types::{FetchAttribute, StoreAction};

/// Accumulates command bytes, splitting at synchronising literals.
///
/// Every chunk except the last ends with `{n}\r\n`; the next chunk may only
/// be sent after the server's `+` continuation. With LITERAL+ the literals
/// are written as `{n+}` and everything stays in one chunk.
#[derive(Debug)]
pub struct Encoder {
    chunks: Vec<Vec<u8>>,
    current: Vec<u8>,
    literal_plus: bool,
}

impl Encoder {
    /// Creates an encoder.
    pub const fn new(literal_plus: bool) -> Self {
        Self {
            chunks: Vec::new(),
            current: Vec::new(),
            literal_plus,
        }
    }

    /// Appends raw protocol text.
    pub fn raw(&mut self, s: &str) -> &mut Self {
        self.current.extend_from_slice(s.as_bytes());
        self
    }

    /// Appends a single space.
    pub fn sp(&mut self) -> &mut Self {
        self.current.push(b' ');
        self
    }

    /// Writes an astring: atom, quoted string, or literal.
    pub fn astring(&mut self, s: &str) -> &mut Self {
        if needs_literal(s) {
            self.literal(s.as_bytes())
        } else if s.is_empty() || s.bytes().any(needs_quoting) {
            self.quoted(s)
        } else {
            self.raw(s)
        }
    }

    /// Writes a quoted string, or a literal if quoting can't carry it.
    pub fn string(&mut self, s: &str) -> &mut Self {
        if needs_literal(s) {
            self.literal(s.as_bytes())
        } else {
            self.quoted(s)
        }
    }

    fn quoted(&mut self, s: &str) -> &mut Self {
        self.current.push(b'"');
        for b in s.bytes() {
            if b == b'"' || b == b'\\' {
                self.current.push(b'\\');
            }
            self.current.push(b);
        }
        self.current.push(b'"');
        self
    }

    /// Writes a literal.
    pub fn literal(&mut self, data: &[u8]) -> &mut Self {
        if self.literal_plus {
            self.raw(&format!("{{{}+}}\r\n", data.len()));
        } else {
            self.raw(&format!("{{{}}}\r\n", data.len()));
            self.chunks.push(std::mem::take(&mut self.current));
        }
        self.current.extend_from_slice(data);
        self
    }

    /// Ends the current line and waits for a `+` before the next chunk.
    pub fn continuation(&mut self) -> &mut Self {
        self.current.extend_from_slice(b"\r\n");
        self.chunks.push(std::mem::take(&mut self.current));
        self
    }

    /// Terminates the command with CRLF and returns its chunks.
    pub fn finish(mut self) -> Vec<Vec<u8>> {
        self.current.extend_from_slice(b"\r\n");
        self.chunks.push(self.current);
        self.chunks
    }

    /// Writes a parenthesized, space-separated list of raw items.
    pub fn list<'a, I>(&mut self, items: I) -> &mut Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.current.push(b'(');
        for (i, item) in items.into_iter().enumerate() {
            if i > 0 {
                self.current.push(b' ');
            }
            self.raw(item);
        }
        self.current.push(b')');
        self
    }

    /// Writes FETCH attributes; a single attribute is not parenthesized.
    pub fn fetch_items(&mut self, attrs: &[FetchAttribute]) -> &mut Self {
        let rendered: Vec<String> = attrs.iter().map(fetch_attribute).collect();
        if let [single] = rendered.as_slice() {
            self.raw(single)
        } else {
            self.list(rendered.iter().map(String::as_str))
        }
    }

    /// Writes a STORE action.
    pub fn store_action(&mut self, action: &StoreAction, silent: bool) -> &mut Self {
        let (prefix, flags) = match action {
            StoreAction::SetFlags(f) => ("FLAGS", f),
            StoreAction::AddFlags(f) => ("+FLAGS", f),
            StoreAction::RemoveFlags(f) => ("-FLAGS", f),
        };
        self.raw(prefix);
        if silent {
            self.raw(".SILENT");
        }
        self.sp().list(flags.iter().map(|f| f.as_str()))
    }
}

/// Renders a single FETCH attribute.
pub fn fetch_attribute(attr: &FetchAttribute) -> String {
    match attr {
        FetchAttribute::Flags => "FLAGS".to_string(),
        FetchAttribute::InternalDate => "INTERNALDATE".to_string(),
        FetchAttribute::Rfc822Size => "RFC822.SIZE".to_string(),
        FetchAttribute::Envelope => "ENVELOPE".to_string(),
        FetchAttribute::BodyStructure => "BODYSTRUCTURE".to_string(),
        FetchAttribute::Uid => "UID".to_string(),
        FetchAttribute::Body {
            section,
            peek,
            partial,
        } => {
            let mut out = String::from(if *peek { "BODY.PEEK[" } else { "BODY[" });
            if let Some(s) = section {
                out.push_str(s);
            }
            out.push(']');
            if let Some((start, len)) = partial {
                out.push_str(&format!("<{start}.{len}>"));
            }
            out
        }
    }
}

/// Returns true if the byte needs quoting.
const fn needs_quoting(b: u8) -> bool {
    matches!(b, b' ' | b'"' | b'\\' | b'(' | b')' | b'{' | b'%' | b'*' | b']') || b < 0x20 || b == 0x7F
}

/// Strings with line breaks, NUL or 8-bit bytes can't be quoted.
fn needs_literal(s: &str) -> bool {
    s.bytes().any(|b| matches!(b, b'\r' | b'\n' | 0) || b >= 0x80)
}
