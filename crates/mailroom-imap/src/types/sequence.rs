//! Sequence sets: compact range notation for message numbers and UIDs.

use std::fmt;

use crate::{Error, Result};

/// Upper bound on how many ids [`expand`] will produce.
const MAX_EXPANDED_IDS: usize = 10_000_000;

/// An ordered, duplicate-free set of message ids kept as inclusive ranges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceSet {
    ranges: Vec<(u32, u32)>,
}

impl SequenceSet {
    /// Builds a set from ids in any order. Zeros are ignored.
    #[must_use]
    pub fn from_ids(ids: &[u32]) -> Self {
        let mut sorted: Vec<u32> = ids.iter().copied().filter(|&id| id > 0).collect();
        sorted.sort_unstable();
        sorted.dedup();

        let mut ranges: Vec<(u32, u32)> = Vec::new();
        for id in sorted {
            match ranges.last_mut() {
                Some((_, end)) if end.checked_add(1) == Some(id) => *end = id,
                _ => ranges.push((id, id)),
            }
        }
        Self { ranges }
    }

    /// Returns true if the set holds no ids.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Number of ids in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ranges
            .iter()
            .map(|&(start, end)| (end - start) as usize + 1)
            .sum()
    }

    /// Iterates the ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.ranges.iter().flat_map(|&(start, end)| start..=end)
    }
}

impl fmt::Display for SequenceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, &(start, end)) in self.ranges.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            if start == end {
                write!(f, "{start}")?;
            } else {
                write!(f, "{start}:{end}")?;
            }
        }
        Ok(())
    }
}

/// Sorts, de-duplicates and range-compresses ids.
///
/// `[1,2,3,4,5,10,11,15,20]` becomes `1:5,10:11,15,20`.
#[must_use]
pub fn compress(ids: &[u32]) -> String {
    SequenceSet::from_ids(ids).to_string()
}

/// Expands range notation into ids, left to right.
///
/// Order is preserved and duplicates are kept. A reversed range `b:a`
/// expands the same as `a:b`.
///
/// # Errors
///
/// Returns `InvalidArgument` for non-numeric tokens, `*`, zero, or a set
/// that would expand past ten million ids.
pub fn expand(text: &str) -> Result<Vec<u32>> {
    let mut ids = Vec::new();

    for token in text.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let (start, end) = match token.split_once(':') {
            Some((a, b)) => (parse_id(a, text)?, parse_id(b, text)?),
            None => {
                let id = parse_id(token, text)?;
                (id, id)
            }
        };
        let (low, high) = if start <= end { (start, end) } else { (end, start) };

        if ids.len() + (high - low) as usize >= MAX_EXPANDED_IDS {
            return Err(Error::InvalidArgument(format!(
                "sequence set {text:?} is too large to expand"
            )));
        }
        ids.extend(low..=high);
    }

    Ok(ids)
}

fn parse_id(token: &str, text: &str) -> Result<u32> {
    token
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|&id| id > 0)
        .ok_or_else(|| Error::InvalidArgument(format!("invalid sequence set {text:?}")))
}
