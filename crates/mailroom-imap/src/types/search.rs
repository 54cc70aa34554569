//! Search and sort request/result types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::sequence;
use crate::Error;

/// ESEARCH/ESORT return options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SearchReturn {
    /// Lowest matching id.
    Min,
    /// Highest matching id.
    Max,
    /// Number of matches.
    Count,
    /// Every match, as a sequence set.
    All,
}

impl SearchReturn {
    /// Wire keyword.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Min => "MIN",
            Self::Max => "MAX",
            Self::Count => "COUNT",
            Self::All => "ALL",
        }
    }
}

impl FromStr for SearchReturn {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MIN" => Ok(Self::Min),
            "MAX" => Ok(Self::Max),
            "COUNT" => Ok(Self::Count),
            "ALL" => Ok(Self::All),
            _ => Err(Error::InvalidArgument(format!("unknown search return option {s:?}"))),
        }
    }
}

/// A SEARCH request.
///
/// ```
/// use mailroom_imap::{SearchQuery, SearchReturn};
///
/// let query = SearchQuery::new("ALL")
///     .sequence("1:100")
///     .header("To", "jason")
///     .returning(&[SearchReturn::Min, SearchReturn::Count]);
/// assert_eq!(query.criteria(), "ALL");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    criteria: String,
    sequence: Option<String>,
    header: Option<(String, String)>,
    returning: Vec<SearchReturn>,
}

impl SearchQuery {
    /// Creates a query from raw criteria such as `UNSEEN` or `ALL`.
    #[must_use]
    pub fn new(criteria: impl Into<String>) -> Self {
        Self {
            criteria: criteria.into(),
            sequence: None,
            header: None,
            returning: Vec::new(),
        }
    }

    /// Restricts the search to a sequence set such as `1:100`.
    #[must_use]
    pub fn sequence(mut self, set: impl Into<String>) -> Self {
        self.sequence = Some(set.into());
        self
    }

    /// Restricts the search to the given ids.
    #[must_use]
    pub fn ids(self, ids: &[u32]) -> Self {
        self.sequence(sequence::compress(ids))
    }

    /// Adds a `HEADER field value` criterion.
    #[must_use]
    pub fn header(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.header = Some((field.into(), value.into()));
        self
    }

    /// Requests the extended (ESEARCH) result form.
    #[must_use]
    pub fn returning(mut self, options: &[SearchReturn]) -> Self {
        self.returning = options.to_vec();
        self
    }

    /// Raw criteria.
    #[must_use]
    pub fn criteria(&self) -> &str {
        &self.criteria
    }

    /// Sequence restriction.
    #[must_use]
    pub fn sequence_set(&self) -> Option<&str> {
        self.sequence.as_deref()
    }

    /// Header criterion.
    #[must_use]
    pub fn header_term(&self) -> Option<(&str, &str)> {
        self.header.as_ref().map(|(f, v)| (f.as_str(), v.as_str()))
    }

    /// Requested return options.
    #[must_use]
    pub fn return_options(&self) -> &[SearchReturn] {
        &self.returning
    }
}

/// Extended search/sort result.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExtendedResult {
    /// Lowest match.
    pub min: Option<u32>,
    /// Highest match.
    pub max: Option<u32>,
    /// Number of matches.
    pub count: Option<u32>,
    /// Every match in compact notation.
    pub all: Option<String>,
}

/// Result of a search or sort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchResult {
    /// Matching ids in server order.
    Simple(Vec<u32>),
    /// ESEARCH/ESORT summary.
    Extended(ExtendedResult),
}

impl SearchResult {
    /// Ids of a simple result, or the expanded `all` of an extended one.
    #[must_use]
    pub fn ids(&self) -> Vec<u32> {
        match self {
            Self::Simple(ids) => ids.clone(),
            Self::Extended(ext) => ext
                .all
                .as_deref()
                .and_then(|all| sequence::expand(all).ok())
                .unwrap_or_default(),
        }
    }

    /// Builds the extended shape from a known id list.
    #[must_use]
    pub fn summarize(ids: &[u32], options: &[SearchReturn]) -> Self {
        let count = u32::try_from(ids.len()).unwrap_or(u32::MAX);
        let mut ext = ExtendedResult::default();
        for option in options {
            match option {
                SearchReturn::Min => ext.min = ids.iter().copied().min(),
                SearchReturn::Max => ext.max = ids.iter().copied().max(),
                SearchReturn::Count => ext.count = Some(count),
                SearchReturn::All if !ids.is_empty() => ext.all = Some(sequence::compress(ids)),
                SearchReturn::All => {}
            }
        }
        Self::Extended(ext)
    }
}

/// Sort criteria understood by SORT and the client-side fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortKey {
    /// Internal date.
    Arrival,
    /// Date header.
    Date,
    /// RFC822 size.
    Size,
    /// First From address.
    From,
    /// First To address.
    To,
    /// First Cc address.
    Cc,
    /// Base subject.
    Subject,
}

impl SortKey {
    /// Wire keyword.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Arrival => "ARRIVAL",
            Self::Date => "DATE",
            Self::Size => "SIZE",
            Self::From => "FROM",
            Self::To => "TO",
            Self::Cc => "CC",
            Self::Subject => "SUBJECT",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ARRIVAL" => Ok(Self::Arrival),
            "DATE" => Ok(Self::Date),
            "SIZE" => Ok(Self::Size),
            "FROM" => Ok(Self::From),
            "TO" => Ok(Self::To),
            "CC" => Ok(Self::Cc),
            "SUBJECT" => Ok(Self::Subject),
            _ => Err(Error::InvalidArgument(format!("unknown sort key {s:?}"))),
        }
    }
}
