//! BODYSTRUCTURE parsing and part numbering.
//!
//! A parsed `BODYSTRUCTURE` value becomes a [`BodyPart`] tree whose nodes
//! carry their IMAP part numbers, computed once while parsing:
//!
//! - a single-part message is part `1`;
//! - the children of a multipart are numbered `1..=N` under their parent
//!   (`2.1`, `2.2`, ...), and top-level children are plain `1..=N`;
//! - a multipart that is the body of a message has no IMAP number of its
//!   own and is given `0` (or `<parent>.0` inside a `message/rfc822`);
//! - the single body of a `message/rfc822` part `N` is `N.1`.

use std::collections::BTreeMap;

use mailroom_mime::TransferEncoding;
use serde::{Deserialize, Serialize};

use super::response::{Envelope, parse_envelope};
use super::value::Value;
use crate::{Error, Result};

/// Content-Disposition extension data.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Disposition {
    /// `inline`, `attachment`, ... (lowercase).
    pub kind: String,
    /// Disposition parameters with lowercase names.
    pub params: BTreeMap<String, String>,
}

/// One node of a message's MIME tree.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BodyPart {
    /// Dotted IMAP part number.
    pub part_number: String,
    /// Top-level media type, lowercase.
    pub media_type: String,
    /// Media subtype, lowercase.
    pub subtype: String,
    /// Content-Type parameters with lowercase names.
    pub params: BTreeMap<String, String>,
    /// Content-ID.
    pub id: Option<String>,
    /// Content-Description.
    pub description: Option<String>,
    /// Content-Transfer-Encoding, lowercase; empty when NIL.
    pub encoding: String,
    /// Encoded size in octets.
    pub size: u64,
    /// Line count for `text/*` and `message/rfc822` parts.
    pub lines: Option<u64>,
    /// Envelope of an encapsulated `message/rfc822`.
    pub envelope: Option<Box<Envelope>>,
    /// Content-MD5 extension data.
    pub md5: Option<String>,
    /// Content-Disposition extension data.
    pub disposition: Option<Disposition>,
    /// Child parts, in order.
    pub parts: Vec<BodyPart>,
}

impl BodyPart {
    /// Builds the part tree from a parsed BODYSTRUCTURE list.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the value is not a list or a leaf lacks
    /// its media type.
    pub fn from_value(value: &Value) -> Result<Self> {
        if is_multipart_list(value) {
            parse_body(value, "0".to_string(), "")
        } else {
            parse_body(value, "1".to_string(), "")
        }
    }

    /// `type/subtype`.
    #[must_use]
    pub fn mime_type(&self) -> String {
        format!("{}/{}", self.media_type, self.subtype)
    }

    /// Returns true for `multipart/*` nodes.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.media_type == "multipart"
    }

    /// The `charset` parameter, if any.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.params.get("charset").map(String::as_str)
    }

    /// Attachment file name from the disposition or the `name` parameter.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.disposition
            .as_ref()
            .and_then(|d| d.params.get("filename"))
            .or_else(|| self.params.get("name"))
            .map(String::as_str)
    }

    /// Declared transfer encoding.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        TransferEncoding::parse(&self.encoding)
    }

    /// Depth-first, pre-order walk over this node and its descendants.
    pub fn iter(&self) -> impl Iterator<Item = &Self> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.parts.iter().rev());
            Some(node)
        })
    }

    /// Maps every part number to its `type/subtype`, in traversal order.
    #[must_use]
    pub fn flatten(&self) -> Vec<(String, String)> {
        self.iter()
            .map(|p| (p.part_number.clone(), p.mime_type()))
            .collect()
    }

    /// Every node matching the filter, in traversal order, with its subtree.
    #[must_use]
    pub fn search(&self, filter: &PartFilter) -> Vec<&Self> {
        self.iter().filter(|p| filter.matches(p)).collect()
    }

    /// First non-multipart node with the given type and subtype.
    #[must_use]
    pub fn find_first(&self, media_type: &str, subtype: &str) -> Option<&Self> {
        self.iter().find(|p| {
            !p.is_multipart()
                && p.media_type.eq_ignore_ascii_case(media_type)
                && p.subtype.eq_ignore_ascii_case(subtype)
        })
    }

    /// Looks up a node by part number.
    #[must_use]
    pub fn part(&self, number: &str) -> Option<&Self> {
        self.iter().find(|p| p.part_number == number)
    }
}

/// Attribute equalities a [`BodyPart`] must all satisfy.
///
/// Comparisons are case-insensitive. An empty filter matches every node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartFilter {
    media_type: Option<String>,
    subtype: Option<String>,
    encoding: Option<String>,
    part_number: Option<String>,
    id: Option<String>,
    params: Vec<(String, String)>,
}

impl PartFilter {
    /// Creates an empty filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires the top-level media type.
    #[must_use]
    pub fn media_type(mut self, value: impl Into<String>) -> Self {
        self.media_type = Some(value.into());
        self
    }

    /// Requires the subtype.
    #[must_use]
    pub fn subtype(mut self, value: impl Into<String>) -> Self {
        self.subtype = Some(value.into());
        self
    }

    /// Requires the transfer encoding.
    #[must_use]
    pub fn encoding(mut self, value: impl Into<String>) -> Self {
        self.encoding = Some(value.into());
        self
    }

    /// Requires the part number.
    #[must_use]
    pub fn part_number(mut self, value: impl Into<String>) -> Self {
        self.part_number = Some(value.into());
        self
    }

    /// Requires the Content-ID.
    #[must_use]
    pub fn id(mut self, value: impl Into<String>) -> Self {
        self.id = Some(value.into());
        self
    }

    /// Requires a Content-Type parameter value.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into().to_ascii_lowercase(), value.into()));
        self
    }

    /// Tests one node.
    #[must_use]
    pub fn matches(&self, part: &BodyPart) -> bool {
        fn eq(want: Option<&String>, have: &str) -> bool {
            want.is_none_or(|w| w.eq_ignore_ascii_case(have))
        }

        eq(self.media_type.as_ref(), &part.media_type)
            && eq(self.subtype.as_ref(), &part.subtype)
            && eq(self.encoding.as_ref(), &part.encoding)
            && self.part_number.as_ref().is_none_or(|n| *n == part.part_number)
            && eq(self.id.as_ref(), part.id.as_deref().unwrap_or_default())
            && self.params.iter().all(|(k, v)| {
                part.params
                    .get(k)
                    .is_some_and(|have| have.eq_ignore_ascii_case(v))
            })
    }
}

fn is_multipart_list(value: &Value) -> bool {
    value
        .as_list()
        .and_then(<[Value]>::first)
        .is_some_and(Value::is_list)
}

/// Parses one node. `child_prefix` is prepended to child indexes.
fn parse_body(value: &Value, number: String, child_prefix: &str) -> Result<BodyPart> {
    let items = value
        .as_list()
        .ok_or_else(|| Error::Protocol("BODYSTRUCTURE node is not a list".into()))?;

    if is_multipart_list(value) {
        parse_multipart(items, number, child_prefix)
    } else {
        parse_leaf(items, number)
    }
}

fn parse_multipart(items: &[Value], number: String, child_prefix: &str) -> Result<BodyPart> {
    let child_count = items.iter().take_while(|v| v.is_list()).count();

    let parts = items[..child_count]
        .iter()
        .enumerate()
        .map(|(i, child)| {
            let child_number = format!("{child_prefix}{}", i + 1);
            let grandchild_prefix = format!("{child_number}.");
            parse_body(child, child_number, &grandchild_prefix)
        })
        .collect::<Result<Vec<_>>>()?;

    let rest = &items[child_count..];
    let subtype = rest
        .first()
        .and_then(Value::to_text)
        .unwrap_or_else(|| "mixed".to_string())
        .to_ascii_lowercase();

    Ok(BodyPart {
        part_number: number,
        media_type: "multipart".to_string(),
        subtype,
        params: rest.get(1).map(parse_params).unwrap_or_default(),
        disposition: rest.get(2).and_then(parse_disposition),
        parts,
        ..BodyPart::default()
    })
}

fn parse_leaf(items: &[Value], number: String) -> Result<BodyPart> {
    let text_at = |i: usize| items.get(i).and_then(Value::to_text);

    let media_type = text_at(0)
        .ok_or_else(|| Error::Protocol("BODYSTRUCTURE part without media type".into()))?
        .to_ascii_lowercase();
    let subtype = text_at(1).unwrap_or_default().to_ascii_lowercase();

    let mut part = BodyPart {
        params: items.get(2).map(parse_params).unwrap_or_default(),
        id: text_at(3),
        description: text_at(4),
        encoding: text_at(5).unwrap_or_default().to_ascii_lowercase(),
        size: items.get(6).and_then(Value::as_u64).unwrap_or(0),
        part_number: number,
        media_type,
        subtype,
        ..BodyPart::default()
    };

    // Position of the first extension field (md5)
    let extension_at = if part.media_type == "message" && part.subtype == "rfc822" {
        part.envelope = items.get(7).and_then(parse_envelope).map(Box::new);
        if let Some(inner) = items.get(8).filter(|v| v.is_list()) {
            let (inner_number, inner_prefix) = if is_multipart_list(inner) {
                (format!("{}.0", part.part_number), format!("{}.", part.part_number))
            } else {
                (format!("{}.1", part.part_number), format!("{}.1.", part.part_number))
            };
            part.parts.push(parse_body(inner, inner_number, &inner_prefix)?);
        }
        part.lines = items.get(9).and_then(Value::as_u64);
        10
    } else if part.media_type == "text" {
        part.lines = items.get(7).and_then(Value::as_u64);
        8
    } else {
        7
    };

    part.md5 = text_at(extension_at);
    part.disposition = items.get(extension_at + 1).and_then(parse_disposition);

    Ok(part)
}

/// Parses `("name" "value" ...)`; NIL yields an empty map.
fn parse_params(value: &Value) -> BTreeMap<String, String> {
    value
        .as_list()
        .map(|items| {
            items
                .chunks_exact(2)
                .filter_map(|pair| {
                    Some((pair[0].to_text()?.to_ascii_lowercase(), pair[1].to_text()?))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_disposition(value: &Value) -> Option<Disposition> {
    let items = value.as_list()?;
    Some(Disposition {
        kind: items.first()?.to_text()?.to_ascii_lowercase(),
        params: items.get(1).map(parse_params).unwrap_or_default(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use crate::parser::value::parse_line;

    fn structure(text: &str) -> BodyPart {
        let values = parse_line(text.as_bytes()).unwrap();
        BodyPart::from_value(&values[0]).unwrap()
    }

    const PLAIN: &str =
        r#"("TEXT" "PLAIN" ("CHARSET" "us-ascii") NIL NIL "7BIT" 1152 23)"#;

    const ALTERNATIVE_WITH_ATTACHMENT: &str = concat!(
        r#"((("TEXT" "PLAIN" ("CHARSET" "utf-8") NIL NIL "QUOTED-PRINTABLE" 120 4)"#,
        r#"("TEXT" "HTML" ("CHARSET" "utf-8") NIL NIL "BASE64" 400 6) "ALTERNATIVE")"#,
        r#"("APPLICATION" "PDF" ("NAME" "a.pdf") "<id1>" NIL "BASE64" 2048 NIL"#,
        r#" ("ATTACHMENT" ("FILENAME" "report.pdf")) NIL)"#,
        r#" "MIXED" ("BOUNDARY" "xyz") NIL NIL)"#
    );

    #[test]
    fn test_single_part() {
        let part = structure(PLAIN);
        assert_eq!(part.part_number, "1");
        assert_eq!(part.mime_type(), "text/plain");
        assert_eq!(part.charset(), Some("us-ascii"));
        assert_eq!(part.encoding, "7bit");
        assert_eq!(part.size, 1152);
        assert_eq!(part.lines, Some(23));
        assert!(part.parts.is_empty());
        assert_eq!(
            part.flatten(),
            vec![("1".to_string(), "text/plain".to_string())]
        );
    }

    #[test]
    fn test_nested_multipart_numbering() {
        let root = structure(ALTERNATIVE_WITH_ATTACHMENT);
        assert_eq!(root.mime_type(), "multipart/mixed");
        assert_eq!(root.params.get("boundary").map(String::as_str), Some("xyz"));

        let flat = root.flatten();
        let numbers: Vec<&str> = flat.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(numbers, vec!["0", "1", "1.1", "1.2", "2"]);
        assert_eq!(flat[1].1, "multipart/alternative");
        assert_eq!(flat[3].1, "text/html");
        assert_eq!(flat[4].1, "application/pdf");
    }

    #[test]
    fn test_extension_data() {
        let root = structure(ALTERNATIVE_WITH_ATTACHMENT);
        let pdf = root.part("2").unwrap();
        assert_eq!(pdf.id.as_deref(), Some("<id1>"));
        assert_eq!(pdf.disposition.as_ref().unwrap().kind, "attachment");
        assert_eq!(pdf.filename(), Some("report.pdf"));
        assert_eq!(pdf.transfer_encoding(), TransferEncoding::Base64);
    }

    #[test]
    fn test_find_first_and_search() {
        let root = structure(ALTERNATIVE_WITH_ATTACHMENT);

        let html = root.find_first("TEXT", "html").unwrap();
        assert_eq!(html.part_number, "1.2");
        assert!(root.find_first("image", "png").is_none());

        let texts = root.search(&PartFilter::new().media_type("text"));
        let numbers: Vec<&str> = texts.iter().map(|p| p.part_number.as_str()).collect();
        assert_eq!(numbers, vec!["1.1", "1.2"]);

        let base64_pdf = PartFilter::new().encoding("base64").param("name", "A.PDF");
        assert_eq!(root.search(&base64_pdf).len(), 1);
    }

    #[test]
    fn test_search_matching_root_returns_whole_tree() {
        let part = structure(PLAIN);
        let hits = part.search(&PartFilter::new().media_type("text").subtype("plain"));
        assert_eq!(hits, vec![&part]);

        let root = structure(ALTERNATIVE_WITH_ATTACHMENT);
        let hits = root.search(&PartFilter::new());
        assert_eq!(hits[0], &root);
        assert_eq!(hits.len(), 5);
    }

    #[test]
    fn test_encapsulated_message() {
        let text = concat!(
            r#"(("TEXT" "PLAIN" NIL NIL NIL "7BIT" 10 1)"#,
            r#"("MESSAGE" "RFC822" NIL NIL NIL "7BIT" 900"#,
            r#" ("Mon, 7 Feb 1994 21:52:25 -0800" "inner" NIL NIL NIL NIL NIL NIL NIL "<m@x>")"#,
            r#" (("TEXT" "PLAIN" NIL NIL NIL "7BIT" 5 1)("IMAGE" "PNG" NIL NIL NIL "BASE64" 50) "MIXED")"#,
            r#" 30) "MIXED")"#
        );
        let root = structure(text);
        let numbers: Vec<String> = root.flatten().into_iter().map(|(n, _)| n).collect();
        assert_eq!(numbers, vec!["0", "1", "2", "2.0", "2.1", "2.2"]);

        let message = root.part("2").unwrap();
        assert_eq!(message.lines, Some(30));
        assert_eq!(
            message.envelope.as_ref().unwrap().subject.as_deref(),
            Some("inner")
        );
    }

    #[test]
    fn test_encapsulated_single_part() {
        let text = concat!(
            r#"("MESSAGE" "RFC822" NIL NIL NIL "7BIT" 100"#,
            r#" (NIL NIL NIL NIL NIL NIL NIL NIL NIL NIL)"#,
            r#" ("TEXT" "PLAIN" NIL NIL NIL "7BIT" 5 1) 3)"#
        );
        let root = structure(text);
        assert_eq!(root.part_number, "1");
        assert_eq!(root.parts[0].part_number, "1.1");
    }

    #[test]
    fn test_nil_fields_are_absent() {
        let part = structure(r#"("APPLICATION" "OCTET-STREAM" NIL NIL NIL NIL NIL)"#);
        assert!(part.params.is_empty());
        assert_eq!(part.encoding, "");
        assert_eq!(part.size, 0);
        assert_eq!(part.transfer_encoding(), TransferEncoding::SevenBit);
    }

    #[test]
    fn test_not_a_list() {
        assert!(BodyPart::from_value(&Value::Nil).is_err());
        assert!(BodyPart::from_value(&Value::List(vec![Value::Nil])).is_err());
    }
}
