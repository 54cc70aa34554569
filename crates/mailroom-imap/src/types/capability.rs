//! Server capabilities and response status.

use std::collections::BTreeSet;
use std::fmt;

/// Status keyword of a tagged or untagged condition response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// `OK`
    Ok,
    /// `NO`: the server refused the command.
    No,
    /// `BAD`: the server could not parse the command.
    Bad,
    /// `PREAUTH` greeting.
    PreAuth,
    /// `BYE`
    Bye,
}

impl Status {
    /// OK or PREAUTH.
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok | Self::PreAuth)
    }

    /// Parses a status keyword.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "OK" => Some(Self::Ok),
            "NO" => Some(Self::No),
            "BAD" => Some(Self::Bad),
            "PREAUTH" => Some(Self::PreAuth),
            "BYE" => Some(Self::Bye),
            _ => None,
        }
    }

    /// Keyword as sent on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::No => "NO",
            Self::Bad => "BAD",
            Self::PreAuth => "PREAUTH",
            Self::Bye => "BYE",
        }
    }
}

/// A capability token, with the ones the engine acts on named.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `IMAP4rev1`
    Imap4Rev1,
    /// `IMAP4rev2`
    Imap4Rev2,
    /// `STARTTLS`
    StartTls,
    /// `LOGINDISABLED`: plaintext LOGIN is refused.
    LoginDisabled,
    /// `AUTH=<mechanism>`
    Auth(String),
    /// ENABLE command (RFC 5161)
    Enable,
    /// ID extension (RFC 2971)
    Id,
    /// NAMESPACE command (RFC 2342)
    Namespace,
    /// QUOTA extension (RFC 2087)
    Quota,
    /// SORT extension (RFC 5256)
    Sort,
    /// ESEARCH extension (RFC 4731)
    ESearch,
    /// ESORT extension (RFC 5267)
    ESort,
    /// UNSELECT command (RFC 3691)
    Unselect,
    /// MOVE extension (RFC 6851)
    Move,
    /// LITERAL+ extension (RFC 7888)
    LiteralPlus,
    /// CONDSTORE (RFC 7162)
    CondStore,
    /// QRESYNC (RFC 7162)
    QResync,
    /// LIST-STATUS (RFC 5819)
    ListStatus,
    /// Gmail extensions
    GmailExt1,
    /// Anything else, as advertised.
    Other(String),
}

static KNOWN: [(Capability, &str); 18] = [
    (Capability::Imap4Rev1, "IMAP4REV1"),
    (Capability::Imap4Rev2, "IMAP4REV2"),
    (Capability::StartTls, "STARTTLS"),
    (Capability::LoginDisabled, "LOGINDISABLED"),
    (Capability::Enable, "ENABLE"),
    (Capability::Id, "ID"),
    (Capability::Namespace, "NAMESPACE"),
    (Capability::Quota, "QUOTA"),
    (Capability::Sort, "SORT"),
    (Capability::ESearch, "ESEARCH"),
    (Capability::ESort, "ESORT"),
    (Capability::Unselect, "UNSELECT"),
    (Capability::Move, "MOVE"),
    (Capability::LiteralPlus, "LITERAL+"),
    (Capability::CondStore, "CONDSTORE"),
    (Capability::QResync, "QRESYNC"),
    (Capability::ListStatus, "LIST-STATUS"),
    (Capability::GmailExt1, "X-GM-EXT-1"),
];

impl Capability {
    /// Parses one advertised token, ignoring case.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let upper = s.to_ascii_uppercase();
        if let Some((capability, _)) = KNOWN.iter().find(|(_, token)| *token == upper) {
            return capability.clone();
        }
        match upper.strip_prefix("AUTH=") {
            Some(mechanism) => Self::Auth(mechanism.to_string()),
            None => Self::Other(upper),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auth(mechanism) => write!(f, "AUTH={mechanism}"),
            Self::Other(token) => f.write_str(token),
            known => {
                let token = KNOWN
                    .iter()
                    .find(|(capability, _)| capability == known)
                    .map_or("", |(_, token)| *token);
                f.write_str(token)
            }
        }
    }
}

/// The capability tokens a server advertised, uppercased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    tokens: BTreeSet<String>,
}

impl CapabilitySet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the token was advertised (case-insensitive).
    #[must_use]
    pub fn contains(&self, token: &str) -> bool {
        self.tokens.contains(&token.to_ascii_uppercase())
    }

    /// Returns true if the capability was advertised.
    #[must_use]
    pub fn has(&self, capability: &Capability) -> bool {
        self.tokens.contains(&capability.to_string())
    }

    /// SASL mechanisms from `AUTH=` tokens.
    pub fn auth_mechanisms(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().filter_map(|t| t.strip_prefix("AUTH="))
    }

    /// Iterates the tokens in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }

    /// Number of tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns true if nothing has been captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            tokens: iter
                .into_iter()
                .map(|t| t.as_ref().to_ascii_uppercase())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CAPABILITY")?;
        for token in &self.tokens {
            write!(f, " {token}")?;
        }
        Ok(())
    }
}
