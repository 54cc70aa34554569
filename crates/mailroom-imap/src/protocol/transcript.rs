//! Bounded record of the commands sent and completions received.

use std::collections::VecDeque;
use std::fmt;

/// Entries kept before the oldest is dropped.
pub const TRANSCRIPT_CAPACITY: usize = 256;

/// Which side produced a transcript line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client to server.
    Sent,
    /// Server to client.
    Received,
}

/// One transcript line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    /// Who sent it.
    pub direction: Direction,
    /// The line, without CRLF. Credentials are redacted.
    pub line: String,
}

impl fmt::Display for TranscriptEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arrow = match self.direction {
            Direction::Sent => "C:",
            Direction::Received => "S:",
        };
        write!(f, "{arrow} {}", self.line)
    }
}

/// Ring buffer of [`TranscriptEntry`].
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: VecDeque<TranscriptEntry>,
}

impl Transcript {
    /// Appends a line, evicting the oldest past capacity.
    pub fn push(&mut self, direction: Direction, line: impl Into<String>) {
        if self.entries.len() == TRANSCRIPT_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(TranscriptEntry {
            direction,
            line: line.into(),
        });
    }

    /// Entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &TranscriptEntry> {
        self.entries.iter()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
