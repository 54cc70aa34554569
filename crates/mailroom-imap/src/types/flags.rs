//! Message flags.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A system flag or a keyword.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Flag {
    /// `\Seen`
    Seen,
    /// `\Answered`
    Answered,
    /// `\Flagged`
    Flagged,
    /// `\Deleted`
    Deleted,
    /// `\Draft`
    Draft,
    /// `\Recent`
    Recent,
    /// Anything else, kept exactly as the server sent it.
    Keyword(String),
}

static SYSTEM_FLAGS: [(Flag, &str); 6] = [
    (Flag::Seen, "\\Seen"),
    (Flag::Answered, "\\Answered"),
    (Flag::Flagged, "\\Flagged"),
    (Flag::Deleted, "\\Deleted"),
    (Flag::Draft, "\\Draft"),
    (Flag::Recent, "\\Recent"),
];

impl Flag {
    /// System flags match case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        SYSTEM_FLAGS
            .iter()
            .find(|(_, wire)| wire.eq_ignore_ascii_case(s))
            .map_or_else(|| Self::Keyword(s.to_string()), |(flag, _)| flag.clone())
    }

    /// Wire form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        if let Self::Keyword(keyword) = self {
            return keyword;
        }
        SYSTEM_FLAGS
            .iter()
            .find(|(flag, _)| flag == self)
            .map_or("", |(_, wire)| *wire)
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Flag {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<Flag> for String {
    fn from(flag: Flag) -> Self {
        flag.as_str().to_string()
    }
}

/// Flags in the order the server listed them, without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Flags(Vec<Flag>);

impl Flags {
    /// An empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends `flag` unless it is already present.
    pub fn insert(&mut self, flag: Flag) {
        if !self.0.contains(&flag) {
            self.0.push(flag);
        }
    }

    /// Returns true if `flag` is present.
    #[must_use]
    pub fn contains(&self, flag: &Flag) -> bool {
        self.0.contains(flag)
    }

    /// Flags in server order.
    pub fn iter(&self) -> impl Iterator<Item = &Flag> {
        self.0.iter()
    }

    /// Number of flags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no flags.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Flag> for Flags {
    fn from_iter<I: IntoIterator<Item = Flag>>(iter: I) -> Self {
        let mut flags = Self::new();
        for flag in iter {
            flags.insert(flag);
        }
        flags
    }
}

/// Space-joined wire form, e.g. `\Seen \Flagged`.
impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, flag) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(flag.as_str())?;
        }
        Ok(())
    }
}
