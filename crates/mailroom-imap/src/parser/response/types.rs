//! Response data types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::parser::BodyPart;
use crate::parser::value::Value;
use crate::types::{
    ExtendedResult, Flags, MailboxDescriptor, MailboxStatus, Namespace, Quota, ResponseCode,
};

/// Message envelope.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Envelope {
    /// Date header.
    pub date: Option<String>,
    /// Subject header.
    pub subject: Option<String>,
    /// From addresses.
    pub from: Vec<Address>,
    /// Sender addresses.
    pub sender: Vec<Address>,
    /// Reply-To addresses.
    pub reply_to: Vec<Address>,
    /// To addresses.
    pub to: Vec<Address>,
    /// Cc addresses.
    pub cc: Vec<Address>,
    /// Bcc addresses.
    pub bcc: Vec<Address>,
    /// In-Reply-To header.
    pub in_reply_to: Option<String>,
    /// Message-ID header.
    pub message_id: Option<String>,
}

/// Email address from an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Address {
    /// Display name.
    pub name: Option<String>,
    /// Source route (obsolete).
    pub adl: Option<String>,
    /// Mailbox name (local part).
    pub mailbox: Option<String>,
    /// Host name (domain part).
    pub host: Option<String>,
}

impl Address {
    /// Returns the full email address.
    #[must_use]
    pub fn email(&self) -> Option<String> {
        match (&self.mailbox, &self.host) {
            (Some(m), Some(h)) => Some(format!("{m}@{h}")),
            (Some(m), None) => Some(m.clone()),
            _ => None,
        }
    }
}

/// The items of one FETCH response.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FetchData {
    /// Message sequence number.
    pub seq: u32,
    /// UID.
    pub uid: Option<u32>,
    /// FLAGS.
    pub flags: Option<Flags>,
    /// INTERNALDATE.
    pub internal_date: Option<String>,
    /// RFC822.SIZE.
    pub size: Option<u32>,
    /// ENVELOPE.
    pub envelope: Option<Envelope>,
    /// BODYSTRUCTURE (or BODY without a section).
    pub body_structure: Option<BodyPart>,
    /// Body sections keyed by section text (`""`, `HEADER`, `1.MIME`, ...).
    pub sections: BTreeMap<String, Option<Vec<u8>>>,
    /// MODSEQ (CONDSTORE).
    pub modseq: Option<u64>,
    /// Items this parser has no field for.
    pub other: Vec<(String, Value)>,
}

impl FetchData {
    /// Returns the id a UID-mode client works with: the UID if present.
    #[must_use]
    pub fn id(&self, use_uids: bool) -> u32 {
        if use_uids {
            self.uid.unwrap_or(self.seq)
        } else {
            self.seq
        }
    }

    /// Returns a body section's bytes.
    #[must_use]
    pub fn section(&self, section: &str) -> Option<&[u8]> {
        self.sections
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(section))
            .and_then(|(_, data)| data.as_deref())
    }
}

/// Untagged response data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UntaggedResponse {
    /// OK response with optional code.
    Ok {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// NO response.
    No {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// BAD response.
    Bad {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// PREAUTH greeting.
    PreAuth {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// BYE response.
    Bye {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// CAPABILITY tokens.
    Capability(Vec<String>),
    /// ENABLED extensions.
    Enabled(Vec<String>),
    /// LIST or LSUB entry.
    List(MailboxDescriptor),
    /// FLAGS defined in the mailbox.
    Flags(Flags),
    /// EXISTS (message count).
    Exists(u32),
    /// RECENT count.
    Recent(u32),
    /// EXPUNGE of a sequence number.
    Expunge(u32),
    /// FETCH data.
    Fetch(Box<FetchData>),
    /// SEARCH results.
    Search(Vec<u32>),
    /// SORT results.
    Sort(Vec<u32>),
    /// ESEARCH results.
    ESearch {
        /// Correlator tag.
        tag: Option<String>,
        /// True if the ids are UIDs.
        uid: bool,
        /// Returned data.
        result: ExtendedResult,
    },
    /// STATUS counters.
    Status {
        /// Mailbox name.
        mailbox: String,
        /// Counters.
        status: MailboxStatus,
    },
    /// NAMESPACE entries.
    Namespace(Vec<Namespace>),
    /// QUOTA usage.
    Quota(Quota),
    /// QUOTAROOT mapping.
    QuotaRoot {
        /// Mailbox asked about.
        mailbox: String,
        /// Root names.
        roots: Vec<String>,
    },
    /// ID parameters.
    Id(BTreeMap<String, Option<String>>),
    /// Anything this parser does not interpret.
    Other {
        /// Leading keyword.
        keyword: String,
        /// Rest of the line.
        text: String,
    },
}

impl UntaggedResponse {
    /// Keyword used to label the response in logs.
    #[must_use]
    pub fn keyword(&self) -> &str {
        match self {
            Self::Ok { .. } => "OK",
            Self::No { .. } => "NO",
            Self::Bad { .. } => "BAD",
            Self::PreAuth { .. } => "PREAUTH",
            Self::Bye { .. } => "BYE",
            Self::Capability(_) => "CAPABILITY",
            Self::Enabled(_) => "ENABLED",
            Self::List(_) => "LIST",
            Self::Flags(_) => "FLAGS",
            Self::Exists(_) => "EXISTS",
            Self::Recent(_) => "RECENT",
            Self::Expunge(_) => "EXPUNGE",
            Self::Fetch(_) => "FETCH",
            Self::Search(_) => "SEARCH",
            Self::Sort(_) => "SORT",
            Self::ESearch { .. } => "ESEARCH",
            Self::Status { .. } => "STATUS",
            Self::Namespace(_) => "NAMESPACE",
            Self::Quota(_) => "QUOTA",
            Self::QuotaRoot { .. } => "QUOTAROOT",
            Self::Id(_) => "ID",
            Self::Other { keyword, .. } => keyword,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_address_email() {
        let addr = Address {
            name: Some("Jason".to_string()),
            adl: None,
            mailbox: Some("jason".to_string()),
            host: Some("shop.localdomain".to_string()),
        };
        assert_eq!(addr.email().as_deref(), Some("jason@shop.localdomain"));

        let group = Address {
            mailbox: Some("undisclosed-recipients".to_string()),
            ..Address::default()
        };
        assert_eq!(group.email().as_deref(), Some("undisclosed-recipients"));
        assert_eq!(Address::default().email(), None);
    }

    #[test]
    fn test_fetch_data_id_and_section() {
        let mut data = FetchData {
            seq: 3,
            uid: Some(103),
            ..FetchData::default()
        };
        data.sections.insert("HEADER".to_string(), Some(b"To: a\r\n".to_vec()));
        assert_eq!(data.id(true), 103);
        assert_eq!(data.id(false), 3);
        assert_eq!(data.section("header"), Some(&b"To: a\r\n"[..]));
        assert_eq!(data.section("TEXT"), None);
    }
}
