//! Command-related type definitions.

use crate::types::Flag;

/// STATUS attributes to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusAttribute {
    /// Number of messages.
    Messages,
    /// Number of recent messages.
    Recent,
    /// Next UID.
    UidNext,
    /// UIDVALIDITY.
    UidValidity,
    /// Number of unseen messages.
    Unseen,
    /// Highest mod-sequence.
    HighestModSeq,
}

impl StatusAttribute {
    /// The counters asked for by default.
    pub const DEFAULT: [Self; 5] = [
        Self::Messages,
        Self::Recent,
        Self::UidNext,
        Self::UidValidity,
        Self::Unseen,
    ];

    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Messages => "MESSAGES",
            Self::Recent => "RECENT",
            Self::UidNext => "UIDNEXT",
            Self::UidValidity => "UIDVALIDITY",
            Self::Unseen => "UNSEEN",
            Self::HighestModSeq => "HIGHESTMODSEQ",
        }
    }
}

/// Individual FETCH attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchAttribute {
    /// Message flags.
    Flags,
    /// Internal date.
    InternalDate,
    /// RFC822 size.
    Rfc822Size,
    /// Envelope structure.
    Envelope,
    /// Body structure.
    BodyStructure,
    /// UID.
    Uid,
    /// Body section.
    Body {
        /// Section specifier, e.g. `HEADER`, `1.2`, `2.MIME`.
        section: Option<String>,
        /// Peek (don't set \Seen).
        peek: bool,
        /// Partial fetch range.
        partial: Option<(u32, u32)>,
    },
}

impl FetchAttribute {
    /// `BODY.PEEK[section]`.
    #[must_use]
    pub fn peek(section: impl Into<String>) -> Self {
        let section = section.into();
        Self::Body {
            section: (!section.is_empty()).then_some(section),
            peek: true,
            partial: None,
        }
    }
}

/// STORE action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreAction {
    /// Replace flags.
    SetFlags(Vec<Flag>),
    /// Add flags.
    AddFlags(Vec<Flag>),
    /// Remove flags.
    RemoveFlags(Vec<Flag>),
}

impl StoreAction {
    /// Builds the action from a `+`/`-` verb.
    #[must_use]
    pub fn from_verb(verb: char, flags: Vec<Flag>) -> Self {
        match verb {
            '+' => Self::AddFlags(flags),
            '-' => Self::RemoveFlags(flags),
            _ => Self::SetFlags(flags),
        }
    }
}
