//! Mailbox types.

use serde::{Deserialize, Serialize};

use super::Flags;
use crate::{Error, Result};

/// Mailbox attributes from a LIST response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MailboxAttribute {
    /// Mailbox cannot be selected.
    NoSelect,
    /// Mailbox does not exist (RFC 5258).
    NonExistent,
    /// Mailbox cannot have children.
    NoInferiors,
    /// Mailbox has no children.
    HasNoChildren,
    /// Mailbox has children.
    HasChildren,
    /// Mailbox is marked for attention.
    Marked,
    /// Mailbox is not marked.
    Unmarked,
    /// SPECIAL-USE `\All`.
    All,
    /// SPECIAL-USE `\Archive`.
    Archive,
    /// SPECIAL-USE `\Drafts`.
    Drafts,
    /// SPECIAL-USE `\Flagged`.
    Flagged,
    /// SPECIAL-USE `\Junk`.
    Junk,
    /// SPECIAL-USE `\Sent`.
    Sent,
    /// SPECIAL-USE `\Trash`.
    Trash,
    /// Unknown attribute, as sent.
    Other(String),
}

impl MailboxAttribute {
    /// Parses a mailbox attribute string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "\\NOSELECT" => Self::NoSelect,
            "\\NONEXISTENT" => Self::NonExistent,
            "\\NOINFERIORS" => Self::NoInferiors,
            "\\HASNOCHILDREN" => Self::HasNoChildren,
            "\\HASCHILDREN" => Self::HasChildren,
            "\\MARKED" => Self::Marked,
            "\\UNMARKED" => Self::Unmarked,
            "\\ALL" => Self::All,
            "\\ARCHIVE" => Self::Archive,
            "\\DRAFTS" => Self::Drafts,
            "\\FLAGGED" => Self::Flagged,
            "\\JUNK" | "\\SPAM" => Self::Junk,
            "\\SENT" => Self::Sent,
            "\\TRASH" => Self::Trash,
            _ => Self::Other(s.to_string()),
        }
    }

    /// Wire form of the attribute.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::NoSelect => "\\Noselect",
            Self::NonExistent => "\\NonExistent",
            Self::NoInferiors => "\\Noinferiors",
            Self::HasNoChildren => "\\HasNoChildren",
            Self::HasChildren => "\\HasChildren",
            Self::Marked => "\\Marked",
            Self::Unmarked => "\\Unmarked",
            Self::All => "\\All",
            Self::Archive => "\\Archive",
            Self::Drafts => "\\Drafts",
            Self::Flagged => "\\Flagged",
            Self::Junk => "\\Junk",
            Self::Sent => "\\Sent",
            Self::Trash => "\\Trash",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for MailboxAttribute {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<MailboxAttribute> for String {
    fn from(attr: MailboxAttribute) -> Self {
        attr.as_str().to_string()
    }
}

/// One mailbox as reported by LIST.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MailboxDescriptor {
    /// Full hierarchical name.
    pub name: String,
    /// Hierarchy delimiter, if the server has one.
    pub delimiter: Option<char>,
    /// LIST attributes.
    pub attributes: Vec<MailboxAttribute>,
    /// Message count, when LIST-STATUS supplied it.
    pub messages: Option<u32>,
    /// Unseen count, when LIST-STATUS supplied it.
    pub unseen: Option<u32>,
    /// UIDVALIDITY, when LIST-STATUS supplied it.
    pub uid_validity: Option<u32>,
}

impl MailboxDescriptor {
    /// Returns true unless the mailbox is `\Noselect` or `\NonExistent`.
    #[must_use]
    pub fn is_selectable(&self) -> bool {
        !self
            .attributes
            .iter()
            .any(|a| matches!(a, MailboxAttribute::NoSelect | MailboxAttribute::NonExistent))
    }

    /// Returns true if the server says the mailbox has children.
    #[must_use]
    pub fn has_children(&self) -> bool {
        self.attributes.contains(&MailboxAttribute::HasChildren)
    }

    /// Name components split on the delimiter.
    #[must_use]
    pub fn components(&self) -> Vec<&str> {
        match self.delimiter {
            Some(d) => self.name.split(d).collect(),
            None => vec![self.name.as_str()],
        }
    }

    /// Last component of the name.
    #[must_use]
    pub fn basename(&self) -> &str {
        self.components().last().copied().unwrap_or_default()
    }
}

/// Counters from STATUS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MailboxStatus {
    /// Number of messages.
    pub messages: u32,
    /// Number of recent messages.
    pub recent: Option<u32>,
    /// Next UID to be assigned.
    pub uid_next: Option<u32>,
    /// UIDVALIDITY value.
    pub uid_validity: Option<u32>,
    /// Number of unseen messages.
    pub unseen: Option<u32>,
    /// Highest mod-sequence (CONDSTORE).
    pub highest_modseq: Option<u64>,
}

/// Result of SELECT.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SelectedMailbox {
    /// Mailbox name.
    pub name: String,
    /// True once the server answered OK.
    pub selected: bool,
    /// Number of messages.
    pub exists: u32,
    /// Number of recent messages.
    pub recent: u32,
    /// Sequence number of the first unseen message.
    pub first_unseen: Option<u32>,
    /// UIDVALIDITY value.
    pub uid_validity: Option<u32>,
    /// Next UID to be assigned.
    pub uid_next: Option<u32>,
    /// Highest mod-sequence (CONDSTORE).
    pub highest_modseq: Option<u64>,
    /// Flags defined for this mailbox.
    pub flags: Flags,
    /// Flags that can be stored permanently.
    pub permanent_flags: Flags,
    /// Whether the mailbox was opened read-only.
    pub read_only: bool,
}

/// Checks a mailbox path before it is sent in CREATE, DELETE or RENAME.
///
/// A single trailing delimiter is allowed; it asks the server for a
/// parent-only node.
///
/// # Errors
///
/// Returns `InvalidArgument` for empty names, control characters, LIST
/// wildcards, or empty hierarchy components.
pub fn validate_mailbox_name(name: &str, delimiter: Option<char>) -> Result<()> {
    let invalid = |why: &str| Err(Error::InvalidArgument(format!("mailbox {name:?}: {why}")));

    if name.is_empty() {
        return invalid("empty name");
    }
    if name.chars().any(char::is_control) {
        return invalid("control character");
    }
    if name.contains(['*', '%']) {
        return invalid("wildcard character");
    }
    if let Some(d) = delimiter {
        let trimmed = name.strip_suffix(d).unwrap_or(name);
        if trimmed.is_empty() || trimmed.split(d).any(str::is_empty) {
            return invalid("empty hierarchy component");
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_parse() {
        assert_eq!(
            MailboxAttribute::parse("\\NoSelect"),
            MailboxAttribute::NoSelect
        );
        assert_eq!(MailboxAttribute::parse("\\Spam"), MailboxAttribute::Junk);
        assert_eq!(
            MailboxAttribute::parse("\\X-Custom"),
            MailboxAttribute::Other("\\X-Custom".to_string())
        );
    }

    #[test]
    fn test_descriptor_helpers() {
        let mb = MailboxDescriptor {
            name: "Work/2024/Q1".to_string(),
            delimiter: Some('/'),
            attributes: vec![MailboxAttribute::NoSelect, MailboxAttribute::HasChildren],
            ..MailboxDescriptor::default()
        };
        assert!(!mb.is_selectable());
        assert!(mb.has_children());
        assert_eq!(mb.components(), vec!["Work", "2024", "Q1"]);
        assert_eq!(mb.basename(), "Q1");
    }

    #[test]
    fn test_validate_mailbox_name() {
        let slash = Some('/');
        assert!(validate_mailbox_name("INBOX", slash).is_ok());
        assert!(validate_mailbox_name("test123456789/", slash).is_ok());
        assert!(validate_mailbox_name("a/b/c", slash).is_ok());
        assert!(validate_mailbox_name("Café", None).is_ok());

        assert!(validate_mailbox_name("", slash).is_err());
        assert!(validate_mailbox_name("/", slash).is_err());
        assert!(validate_mailbox_name("a//b", slash).is_err());
        assert!(validate_mailbox_name("/a", slash).is_err());
        assert!(validate_mailbox_name("a*", slash).is_err());
        assert!(validate_mailbox_name("a\r\nb", slash).is_err());
    }
}
