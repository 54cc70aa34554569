//! Per-message result types and message actions.

use std::fmt;
use std::str::FromStr;

use mailroom_mime::encoding::decode_charset;
use serde::{Deserialize, Serialize};

use super::{Flag, Flags};
use crate::Error;

/// Envelope-level summary of one message.
///
/// Header-derived strings are RFC 2047 decoded.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MessageSummary {
    /// Message sequence number.
    pub seq: u32,
    /// UID, when the server reported it.
    pub uid: Option<u32>,
    /// Current flags.
    pub flags: Flags,
    /// RFC822.SIZE.
    pub size: Option<u32>,
    /// INTERNALDATE, as sent.
    pub internal_date: Option<String>,
    /// Date header.
    pub date: Option<String>,
    /// Subject.
    pub subject: String,
    /// From, formatted as `Name <addr>` and comma-joined.
    pub from: String,
    /// To, formatted like `from`.
    pub to: String,
    /// Cc, formatted like `from`.
    pub cc: String,
    /// Message-ID.
    pub message_id: Option<String>,
    /// In-Reply-To.
    pub in_reply_to: Option<String>,
}

/// A fetched and transfer-decoded body part.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MessageContent {
    /// Part number that was fetched.
    pub part_number: String,
    /// Media type, lowercase.
    pub media_type: String,
    /// Subtype, lowercase.
    pub subtype: String,
    /// Declared charset.
    pub charset: Option<String>,
    /// Decoded bytes.
    pub data: Vec<u8>,
}

impl MessageContent {
    /// Body as text, decoded from the declared charset.
    #[must_use]
    pub fn text(&self) -> String {
        decode_charset(&self.data, self.charset.as_deref().unwrap_or("utf-8"))
    }
}

/// A logical operation on a set of messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageAction {
    /// Add `\Flagged`.
    Flag,
    /// Remove `\Flagged`.
    Unflag,
    /// Add `\Deleted`.
    Delete,
    /// Remove `\Deleted`.
    Undelete,
    /// Add `\Seen`.
    Read,
    /// Remove `\Seen`.
    Unread,
    /// Add `\Answered`.
    Answered,
    /// Remove `\Answered`.
    Unanswered,
    /// Permanently remove messages marked `\Deleted`.
    Expunge,
    /// Copy to another mailbox.
    Copy(String),
    /// Move to another mailbox.
    Move(String),
}

impl MessageAction {
    /// STORE verb and flag for flag-changing actions.
    #[must_use]
    pub const fn store(&self) -> Option<(char, Flag)> {
        match self {
            Self::Flag => Some(('+', Flag::Flagged)),
            Self::Unflag => Some(('-', Flag::Flagged)),
            Self::Delete => Some(('+', Flag::Deleted)),
            Self::Undelete => Some(('-', Flag::Deleted)),
            Self::Read => Some(('+', Flag::Seen)),
            Self::Unread => Some(('-', Flag::Seen)),
            Self::Answered => Some(('+', Flag::Answered)),
            Self::Unanswered => Some(('-', Flag::Answered)),
            Self::Expunge | Self::Copy(_) | Self::Move(_) => None,
        }
    }
}

impl fmt::Display for MessageAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag => f.write_str("FLAG"),
            Self::Unflag => f.write_str("UNFLAG"),
            Self::Delete => f.write_str("DELETE"),
            Self::Undelete => f.write_str("UNDELETE"),
            Self::Read => f.write_str("READ"),
            Self::Unread => f.write_str("UNREAD"),
            Self::Answered => f.write_str("ANSWERED"),
            Self::Unanswered => f.write_str("UNANSWERED"),
            Self::Expunge => f.write_str("EXPUNGE"),
            Self::Copy(target) => write!(f, "COPY {target}"),
            Self::Move(target) => write!(f, "MOVE {target}"),
        }
    }
}

/// Parses `FLAG`, `READ`, ... and `COPY <mailbox>` / `MOVE <mailbox>`.
impl FromStr for MessageAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (verb, target) = match s.trim().split_once(' ') {
            Some((verb, target)) => (verb, Some(target.trim())),
            None => (s.trim(), None),
        };
        let action = match (verb.to_ascii_uppercase().as_str(), target) {
            ("FLAG", None) => Self::Flag,
            ("UNFLAG", None) => Self::Unflag,
            ("DELETE", None) => Self::Delete,
            ("UNDELETE", None) => Self::Undelete,
            ("READ", None) => Self::Read,
            ("UNREAD", None) => Self::Unread,
            ("ANSWERED", None) => Self::Answered,
            ("UNANSWERED", None) => Self::Unanswered,
            ("EXPUNGE", None) => Self::Expunge,
            ("COPY", Some(t)) if !t.is_empty() => Self::Copy(t.to_string()),
            ("MOVE", Some(t)) if !t.is_empty() => Self::Move(t.to_string()),
            _ => {
                return Err(Error::InvalidArgument(format!(
                    "unknown message action {s:?}"
                )));
            }
        };
        Ok(action)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_action_parse() {
        assert_eq!("flag".parse::<MessageAction>().unwrap(), MessageAction::Flag);
        assert_eq!(
            "MOVE Archive/2024".parse::<MessageAction>().unwrap(),
            MessageAction::Move("Archive/2024".to_string())
        );
        assert!("MOVE".parse::<MessageAction>().is_err());
        assert!("SHRED".parse::<MessageAction>().is_err());
        assert!("READ now".parse::<MessageAction>().is_err());
    }

    #[test]
    fn test_action_store_mapping() {
        assert_eq!(MessageAction::Unflag.store(), Some(('-', Flag::Flagged)));
        assert_eq!(MessageAction::Read.store(), Some(('+', Flag::Seen)));
        assert_eq!(MessageAction::Expunge.store(), None);
    }

    #[test]
    fn test_content_text_uses_charset() {
        let content = MessageContent {
            charset: Some("iso-8859-1".to_string()),
            data: b"caf\xe9".to_vec(),
            ..MessageContent::default()
        };
        assert_eq!(content.text(), "café");
    }
}
