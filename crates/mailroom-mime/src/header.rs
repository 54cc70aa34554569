//! Message header handling.

use crate::encoding::decode_rfc2047;
use std::fmt;

/// Ordered collection of message headers.
///
/// Header names keep the case they arrived with; lookups are
/// case-insensitive. Repeated headers keep their original order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a header value.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Sets a header value, replacing any existing values.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        self.entries.push((name, value.into()));
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Gets all values for a header, in arrival order.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Returns true if the header is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Removes all values for a header.
    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    /// Returns an iterator over all headers in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Number of header fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no headers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parses a header block.
    ///
    /// Accepts CRLF or bare LF line endings. Folded continuation lines are
    /// joined with a single space. Parsing stops at the first empty line;
    /// lines without a colon are skipped.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut headers = Self::new();
        let mut current: Option<(String, String)> = None;

        for line in text.lines() {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() {
                break;
            }

            if line.starts_with(' ') || line.starts_with('\t') {
                if let Some((_, value)) = current.as_mut() {
                    if !value.is_empty() {
                        value.push(' ');
                    }
                    value.push_str(line.trim());
                }
                continue;
            }

            if let Some((name, value)) = current.take() {
                headers.add(name, value);
            }

            if let Some((name, value)) = line.split_once(':') {
                let name = name.trim();
                if !name.is_empty() {
                    current = Some((name.to_string(), value.trim().to_string()));
                }
            }
        }

        if let Some((name, value)) = current {
            headers.add(name, value);
        }

        headers
    }

    /// Returns a copy with every value RFC 2047 decoded.
    #[must_use]
    pub fn decoded(&self) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .map(|(n, v)| (n.clone(), decode_rfc2047(v)))
                .collect(),
        }
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(n, v)| (n.into(), v.into())).collect(),
        }
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.entries {
            write!(f, "{name}: {value}\r\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_add_get() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain");
        assert_eq!(headers.get("Content-Type"), Some("text/plain"));
        assert_eq!(headers.get("content-type"), Some("text/plain"));
        assert!(headers.contains("CONTENT-TYPE"));
    }

    #[test]
    fn test_headers_set() {
        let mut headers = Headers::new();
        headers.add("Received", "a");
        headers.add("Received", "b");
        assert_eq!(headers.get_all("received"), vec!["a", "b"]);

        headers.set("Received", "c");
        assert_eq!(headers.get_all("Received"), vec!["c"]);
    }

    #[test]
    fn test_headers_remove() {
        let mut headers = Headers::new();
        headers.add("Subject", "Test");
        headers.remove("subject");
        assert!(headers.get("Subject").is_none());
        assert!(headers.is_empty());
    }

    #[test]
    fn test_headers_parse_preserves_order_and_case() {
        let text = concat!(
            "To: jason@shop.localdomain\r\n",
            "From: sender@example.com\r\n",
            "Subject: Test Message\r\n",
            "Content-Type: text/plain;\r\n",
            " charset=utf-8\r\n",
            "\r\n",
            "Body: not a header\r\n"
        );

        let headers = Headers::parse(text);
        assert_eq!(headers.len(), 4);
        let names: Vec<&str> = headers.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["To", "From", "Subject", "Content-Type"]);
        assert_eq!(headers.get("To"), Some("jason@shop.localdomain"));
        assert_eq!(
            headers.get("Content-Type"),
            Some("text/plain; charset=utf-8")
        );
        assert!(headers.get("Body").is_none());
    }

    #[test]
    fn test_headers_parse_bare_lf_and_garbage() {
        let headers = Headers::parse("X-A: 1\nnot a header\n\tcontinued\nX-B:2\n");
        assert_eq!(headers.get("X-A"), Some("1"));
        assert_eq!(headers.get("X-B"), Some("2"));
    }

    #[test]
    fn test_headers_decoded() {
        let headers = Headers::parse("Subject: =?UTF-8?B?amFzb24=?=\r\n\r\n");
        assert_eq!(headers.decoded().get("Subject"), Some("jason"));
        assert_eq!(headers.get("Subject"), Some("=?UTF-8?B?amFzb24=?="));
    }

    #[test]
    fn test_headers_display() {
        let headers: Headers = [("From", "a@example.com"), ("To", "b@example.com")]
            .into_iter()
            .collect();
        assert_eq!(
            headers.to_string(),
            "From: a@example.com\r\nTo: b@example.com\r\n"
        );
    }
}
