//! Response codes.

use super::Flag;

/// Bracketed response code carried by a status response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCode {
    /// ALERT: Human-readable message that MUST be shown to user.
    Alert,
    /// CAPABILITY: full capability list.
    Capability(Vec<String>),
    /// PARSE: Error parsing message.
    Parse,
    /// PERMANENTFLAGS: Flags that can be changed permanently.
    PermanentFlags(Vec<Flag>),
    /// READ-ONLY: Mailbox selected as read-only.
    ReadOnly,
    /// READ-WRITE: Mailbox selected as read-write.
    ReadWrite,
    /// TRYCREATE: Mailbox doesn't exist, but can be created.
    TryCreate,
    /// UIDNEXT: Next UID to be assigned.
    UidNext(u32),
    /// UIDVALIDITY: Unique identifier validity value.
    UidValidity(u32),
    /// UNSEEN: First unseen message sequence number.
    Unseen(u32),
    /// HIGHESTMODSEQ: Highest mod-sequence value (CONDSTORE).
    HighestModSeq(u64),
    /// NOMODSEQ: Server doesn't support mod-sequences for this mailbox.
    NoModSeq,
    /// CLOSED: the previous mailbox was closed (QRESYNC).
    Closed,
    /// Any other code, with its raw arguments.
    Other {
        /// Code name, uppercased.
        name: String,
        /// Remaining text inside the brackets.
        data: Option<String>,
    },
}

impl ResponseCode {
    /// Returns the code name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Alert => "ALERT",
            Self::Capability(_) => "CAPABILITY",
            Self::Parse => "PARSE",
            Self::PermanentFlags(_) => "PERMANENTFLAGS",
            Self::ReadOnly => "READ-ONLY",
            Self::ReadWrite => "READ-WRITE",
            Self::TryCreate => "TRYCREATE",
            Self::UidNext(_) => "UIDNEXT",
            Self::UidValidity(_) => "UIDVALIDITY",
            Self::Unseen(_) => "UNSEEN",
            Self::HighestModSeq(_) => "HIGHESTMODSEQ",
            Self::NoModSeq => "NOMODSEQ",
            Self::Closed => "CLOSED",
            Self::Other { name, .. } => name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert_eq!(ResponseCode::ReadOnly.name(), "READ-ONLY");
        assert_eq!(ResponseCode::UidNext(4).name(), "UIDNEXT");
        let other = ResponseCode::Other {
            name: "OVERQUOTA".to_string(),
            data: None,
        };
        assert_eq!(other.name(), "OVERQUOTA");
    }
}
