//! MIME encoding and decoding utilities.
//!
//! Supports Base64, Quoted-Printable, RFC 2047 encoded words and a small
//! set of single-byte charsets.

use crate::error::Result;
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decodes Base64 data.
///
/// Whitespace (including line breaks) is ignored and missing padding is
/// tolerated.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    let cleaned: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    match STANDARD.decode(&cleaned) {
        Ok(bytes) => Ok(bytes),
        Err(err) => STANDARD_NO_PAD
            .decode(cleaned.trim_end_matches('='))
            .map_err(|_| err.into()),
    }
}

/// Decodes Quoted-Printable data (RFC 2045).
///
/// Soft line breaks are removed. A malformed escape is copied through
/// unchanged rather than failing the whole body.
#[must_use]
pub fn decode_quoted_printable(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        let byte = data[i];
        if byte != b'=' {
            result.push(byte);
            i += 1;
            continue;
        }

        // Soft line break
        match (data.get(i + 1), data.get(i + 2)) {
            (Some(b'\r'), Some(b'\n')) => {
                i += 3;
                continue;
            }
            (Some(b'\n'), _) => {
                i += 2;
                continue;
            }
            (Some(&hi), Some(&lo)) => {
                if let (Some(hi), Some(lo)) = (hex_value(hi), hex_value(lo)) {
                    result.push((hi << 4) | lo);
                    i += 3;
                    continue;
                }
            }
            _ => {}
        }

        result.push(b'=');
        i += 1;
    }

    result
}

const fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Decodes RFC 2047 encoded words in a header value.
///
/// Format: `=?charset?encoding?encoded-text?=`
///
/// Any number of encoded words may appear anywhere in the value.
/// Whitespace separating two adjacent encoded words is dropped. Text that
/// does not form a valid encoded word is passed through unchanged, so this
/// never fails.
#[must_use]
pub fn decode_rfc2047(text: &str) -> String {
    if !text.contains("=?") {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut after_word = false;

    while let Some(start) = rest.find("=?") {
        let (before, candidate) = rest.split_at(start);
        if let Some((decoded, consumed)) = parse_encoded_word(candidate) {
            let joins_previous = after_word && before.chars().all(char::is_whitespace);
            if !joins_previous {
                out.push_str(before);
            }
            out.push_str(&decoded);
            rest = &candidate[consumed..];
            after_word = true;
        } else {
            out.push_str(before);
            out.push_str("=?");
            rest = &candidate[2..];
            after_word = false;
        }
    }

    out.push_str(rest);
    out
}

/// Parses one encoded word at the start of `s`.
///
/// Returns the decoded text and the number of bytes consumed.
fn parse_encoded_word(s: &str) -> Option<(String, usize)> {
    let body = s.strip_prefix("=?")?;

    let (charset, after_charset) = body.split_once('?')?;
    let (encoding, after_encoding) = after_charset.split_once('?')?;
    let end = after_encoding.find("?=")?;
    let payload = &after_encoding[..end];

    if charset.is_empty()
        || charset.contains(char::is_whitespace)
        || encoding.len() != 1
        || payload.contains(char::is_whitespace)
    {
        return None;
    }

    let bytes = match encoding {
        "B" | "b" => decode_base64(payload).ok()?,
        "Q" | "q" => decode_q(payload),
        _ => return None,
    };

    let consumed = "=?".len() + charset.len() + 1 + encoding.len() + 1 + end + "?=".len();

    // RFC 2231 language suffix: charset*lang
    let charset = charset.split_once('*').map_or(charset, |(cs, _)| cs);

    Some((decode_charset(&bytes, charset), consumed))
}

/// Decodes the `Q` encoding: `_` is a space and `=XX` is a hex byte.
fn decode_q(payload: &str) -> Vec<u8> {
    let spaced: Vec<u8> = payload
        .bytes()
        .map(|b| if b == b'_' { b' ' } else { b })
        .collect();
    decode_quoted_printable(&spaced)
}

/// Converts bytes in the named charset to a string.
///
/// UTF-8, US-ASCII, ISO-8859-1 and Windows-1252 are decoded exactly.
/// Unknown charsets fall back to lossy UTF-8.
#[must_use]
pub fn decode_charset(bytes: &[u8], charset: &str) -> String {
    match charset.trim().to_ascii_lowercase().as_str() {
        "iso-8859-1" | "iso8859-1" | "latin1" | "latin-1" | "l1" => {
            bytes.iter().map(|&b| char::from(b)).collect()
        }
        "windows-1252" | "cp1252" | "x-cp1252" => bytes.iter().map(|&b| cp1252_char(b)).collect(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Windows-1252 differs from Latin-1 only in 0x80..=0x9F.
const CP1252_HIGH: [char; 32] = [
    '\u{20AC}', '\u{0081}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{008D}', '\u{017D}', '\u{008F}',
    '\u{0090}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{009D}', '\u{017E}', '\u{0178}',
];

fn cp1252_char(b: u8) -> char {
    if (0x80..=0x9F).contains(&b) {
        CP1252_HIGH[usize::from(b - 0x80)]
    } else {
        char::from(b)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_encode_decode() {
        let data = b"Hello, World!";
        let encoded = encode_base64(data);
        assert_eq!(encoded, "SGVsbG8sIFdvcmxkIQ==");

        let decoded = decode_base64(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_base64_with_line_breaks_and_no_padding() {
        assert_eq!(decode_base64("SGVs\r\nbG8=").unwrap(), b"Hello");
        assert_eq!(decode_base64("amFzb24").unwrap(), b"jason");
        assert!(decode_base64("!!!").is_err());
    }

    #[test]
    fn test_quoted_printable_decode() {
        assert_eq!(decode_quoted_printable(b"Hello, World!"), b"Hello, World!");
        assert_eq!(
            decode_quoted_printable(b"H=C3=A9llo"),
            "Héllo".as_bytes().to_vec()
        );
    }

    #[test]
    fn test_quoted_printable_soft_line_break() {
        assert_eq!(decode_quoted_printable(b"Hello=\r\nWorld"), b"HelloWorld");
        assert_eq!(decode_quoted_printable(b"Hello=\nWorld"), b"HelloWorld");
    }

    #[test]
    fn test_quoted_printable_malformed_escape_passes_through() {
        assert_eq!(decode_quoted_printable(b"a=ZZb="), b"a=ZZb=");
    }

    #[test]
    fn test_rfc2047_plain_text_unchanged() {
        assert_eq!(decode_rfc2047("test"), "test");
        assert_eq!(decode_rfc2047(""), "");
    }

    #[test]
    fn test_rfc2047_base64() {
        assert_eq!(decode_rfc2047("=?UTF-8?B?amFzb24=?="), "jason");
        assert_eq!(decode_rfc2047("=?utf-8?B?SMOpbGxv?="), "Héllo");
    }

    #[test]
    fn test_rfc2047_quoted_printable() {
        assert_eq!(decode_rfc2047("=?utf-8?Q?H=C3=A9llo?="), "Héllo");
        assert_eq!(decode_rfc2047("=?us-ascii?q?two_words?="), "two words");
    }

    #[test]
    fn test_rfc2047_mixed_with_plain_text() {
        assert_eq!(
            decode_rfc2047("Re: =?utf-8?Q?caf=C3=A9?= tonight"),
            "Re: café tonight"
        );
    }

    #[test]
    fn test_rfc2047_adjacent_words_join() {
        assert_eq!(
            decode_rfc2047("=?utf-8?Q?foo?= \r\n =?utf-8?Q?bar?="),
            "foobar"
        );
        assert_eq!(decode_rfc2047("=?utf-8?Q?foo?= x =?utf-8?Q?bar?="), "foo x bar");
    }

    #[test]
    fn test_rfc2047_latin1_and_language_suffix() {
        assert_eq!(decode_rfc2047("=?ISO-8859-1?Q?Andr=E9?="), "André");
        assert_eq!(decode_rfc2047("=?iso-8859-1*fr?Q?Andr=E9?="), "André");
    }

    #[test]
    fn test_rfc2047_malformed_passes_through() {
        assert_eq!(decode_rfc2047("=?utf-8?X?abc?="), "=?utf-8?X?abc?=");
        assert_eq!(decode_rfc2047("=?broken"), "=?broken");
        assert_eq!(decode_rfc2047("a =? b"), "a =? b");
    }

    #[test]
    fn test_decode_charset_cp1252() {
        assert_eq!(decode_charset(&[0x93, b'h', b'i', 0x94], "windows-1252"), "\u{201C}hi\u{201D}");
        assert_eq!(decode_charset(&[0x80], "cp1252"), "€");
    }

    #[test]
    fn test_decode_charset_unknown_falls_back() {
        assert_eq!(decode_charset(b"plain", "x-unknown"), "plain");
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn text_without_markers_is_unchanged(s in "[^=]*") {
                prop_assert_eq!(decode_rfc2047(&s), s);
            }

            #[test]
            fn base64_words_round_trip(s in "\\PC{0,40}") {
                let word = format!("=?utf-8?B?{}?=", encode_base64(s.as_bytes()));
                prop_assert_eq!(decode_rfc2047(&word), s);
            }
        }
    }
}
