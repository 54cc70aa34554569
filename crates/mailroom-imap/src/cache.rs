//! Decoded-result cache.
//!
//! Results are keyed by the mailbox that was selected, the command and its
//! arguments. A secondary index by command name lets a whole family of
//! entries be dropped without scanning every key. The cache serializes to a
//! versioned JSON blob so a new client can start warm without touching the
//! network.

use std::collections::{BTreeMap, HashMap, HashSet};

use mailroom_mime::Headers;
use serde::{Deserialize, Serialize};

use crate::parser::BodyPart;
use crate::types::{
    MailboxDescriptor, MailboxStatus, MessageContent, MessageSummary, Namespace, SearchResult,
};
use crate::{Error, Result};

/// Blob format written by [`ResponseCache::dump`].
pub const CACHE_FORMAT_VERSION: u32 = 1;

/// Selector that empties the whole cache.
pub const BUST_ALL: &str = "ALL";

/// Identifies one cached result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    /// Mailbox selected when the result was produced.
    pub mailbox: Option<String>,
    /// Command name, uppercase.
    pub command: String,
    /// Arguments that shaped the result.
    pub args: String,
}

impl CacheKey {
    /// Creates a key; the command name is uppercased.
    #[must_use]
    pub fn new(mailbox: Option<&str>, command: &str, args: impl Into<String>) -> Self {
        Self {
            mailbox: mailbox.map(str::to_string),
            command: command.to_ascii_uppercase(),
            args: args.into(),
        }
    }

    /// `mailbox|COMMAND|args`, the form accepted by [`ResponseCache::bust`].
    #[must_use]
    pub fn signature(&self) -> String {
        format!(
            "{}|{}|{}",
            self.mailbox.as_deref().unwrap_or(""),
            self.command,
            self.args
        )
    }

    /// Parses a [`signature`](Self::signature); an empty mailbox means none.
    #[must_use]
    pub fn from_signature(signature: &str) -> Option<Self> {
        let mut fields = signature.splitn(3, '|');
        let mailbox = fields.next()?;
        let command = fields.next()?;
        let args = fields.next()?;
        Some(Self::new(
            (!mailbox.is_empty()).then_some(mailbox),
            command,
            args,
        ))
    }
}

/// A decoded result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CachedValue {
    /// LIST result keyed by mailbox name.
    Mailboxes(BTreeMap<String, MailboxDescriptor>),
    /// STATUS counters.
    Status(MailboxStatus),
    /// NAMESPACE entries.
    Namespaces(Vec<Namespace>),
    /// SEARCH or SORT result.
    Search(SearchResult),
    /// Message summaries keyed by id.
    Messages(BTreeMap<u32, MessageSummary>),
    /// BODYSTRUCTURE tree.
    Structure(BodyPart),
    /// Decoded header fields, in order.
    Headers(Headers),
    /// Decoded body part.
    Content(MessageContent),
}

#[derive(Serialize, Deserialize)]
struct Blob {
    version: u32,
    entries: Vec<BlobEntry>,
}

#[derive(Serialize, Deserialize)]
struct BlobEntry {
    key: CacheKey,
    value: CachedValue,
}

/// In-memory cache of decoded results.
#[derive(Debug, Clone, Default)]
pub struct ResponseCache {
    entries: HashMap<CacheKey, CachedValue>,
    by_command: HashMap<String, HashSet<CacheKey>>,
}

impl ResponseCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks a result up.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<&CachedValue> {
        self.entries.get(key)
    }

    /// Stores a result, replacing any previous one.
    pub fn insert(&mut self, key: CacheKey, value: CachedValue) {
        self.by_command
            .entry(key.command.clone())
            .or_default()
            .insert(key.clone());
        self.entries.insert(key, value);
    }

    /// Drops entries and returns how many went.
    ///
    /// The selector is [`BUST_ALL`], a command-name prefix such as `SEARCH`,
    /// or one key's [`signature`](CacheKey::signature).
    pub fn bust(&mut self, selector: &str) -> usize {
        if selector.eq_ignore_ascii_case(BUST_ALL) {
            let count = self.entries.len();
            self.clear();
            return count;
        }

        if let Some(key) = CacheKey::from_signature(selector) {
            return usize::from(self.remove(&key));
        }

        let prefix = selector.to_ascii_uppercase();
        let commands: Vec<String> = self
            .by_command
            .keys()
            .filter(|c| c.starts_with(&prefix))
            .cloned()
            .collect();

        let mut count = 0;
        for command in commands {
            if let Some(keys) = self.by_command.remove(&command) {
                for key in keys {
                    if self.entries.remove(&key).is_some() {
                        count += 1;
                    }
                }
            }
        }
        if count > 0 {
            tracing::debug!(selector, count, "cache entries dropped");
        }
        count
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops everything.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.by_command.clear();
    }

    /// Serializes every entry into an opaque blob.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cache`] if serialization fails.
    pub fn dump(&self) -> Result<String> {
        let mut entries: Vec<BlobEntry> = self
            .entries
            .iter()
            .map(|(key, value)| BlobEntry {
                key: key.clone(),
                value: value.clone(),
            })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));

        Ok(serde_json::to_string(&Blob {
            version: CACHE_FORMAT_VERSION,
            entries,
        })?)
    }

    /// Rebuilds a cache from a blob written by [`dump`](Self::dump).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cache`] for malformed blobs and
    /// [`Error::InvalidArgument`] for a blob of another format version.
    pub fn load(blob: &str) -> Result<Self> {
        let blob: Blob = serde_json::from_str(blob)?;
        if blob.version != CACHE_FORMAT_VERSION {
            return Err(Error::InvalidArgument(format!(
                "cache blob version {} (expected {CACHE_FORMAT_VERSION})",
                blob.version
            )));
        }

        let mut cache = Self::new();
        for entry in blob.entries {
            cache.insert(entry.key, entry.value);
        }
        Ok(cache)
    }

    fn remove(&mut self, key: &CacheKey) -> bool {
        if self.entries.remove(key).is_none() {
            return false;
        }
        if let Some(keys) = self.by_command.get_mut(&key.command) {
            keys.remove(key);
            if keys.is_empty() {
                self.by_command.remove(&key.command);
            }
        }
        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone)]
mod tests {
    use super::*;

    fn status(messages: u32) -> CachedValue {
        CachedValue::Status(MailboxStatus {
            messages,
            ..MailboxStatus::default()
        })
    }

    fn filled() -> ResponseCache {
        let mut cache = ResponseCache::new();
        cache.insert(CacheKey::new(None, "status", "INBOX"), status(3));
        cache.insert(CacheKey::new(None, "STATUS", "Sent"), status(9));
        cache.insert(
            CacheKey::new(Some("INBOX"), "SEARCH", "UNSEEN"),
            CachedValue::Search(SearchResult::Simple(vec![4, 2])),
        );
        cache.insert(
            CacheKey::new(Some("INBOX"), "SORT", "DATE"),
            CachedValue::Search(SearchResult::Simple(vec![1, 2])),
        );
        cache
    }

    #[test]
    fn test_get_and_replace() {
        let mut cache = filled();
        let key = CacheKey::new(None, "STATUS", "INBOX");
        assert_eq!(cache.get(&key), Some(&status(3)));

        cache.insert(key.clone(), status(5));
        assert_eq!(cache.get(&key), Some(&status(5)));
        assert_eq!(cache.len(), 4);
    }

    #[test]
    fn test_bust_by_command() {
        let mut cache = filled();
        assert_eq!(cache.bust("status"), 2);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.bust("STATUS"), 0);
    }

    #[test]
    fn test_bust_by_signature() {
        let mut cache = filled();
        let key = CacheKey::new(Some("INBOX"), "SEARCH", "UNSEEN");
        assert_eq!(key.signature(), "INBOX|SEARCH|UNSEEN");
        assert_eq!(cache.bust(&key.signature()), 1);
        assert!(cache.get(&key).is_none());
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_bust_signature_removes_only_that_key() {
        let mut cache = filled();
        cache.insert(
            CacheKey::new(Some("INBOX"), "FETCH", "1 (UID FLAGS)|x"),
            CachedValue::Search(SearchResult::Simple(vec![1])),
        );

        assert_eq!(cache.bust("|STATUS|INBOX"), 1);
        assert!(cache.get(&CacheKey::new(None, "STATUS", "INBOX")).is_none());
        assert_eq!(cache.bust("|STATUS|Drafts"), 0);
        assert_eq!(cache.bust("INBOX|FETCH|1 (UID FLAGS)|x"), 1);
        assert_eq!(cache.len(), 3);

        // the index forgot the removed key, the sibling is still reachable
        assert_eq!(cache.bust("STATUS"), 1);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_bust_all() {
        let mut cache = filled();
        assert_eq!(cache.bust("ALL"), 4);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_dump_and_load() {
        let cache = filled();
        let blob = cache.dump().unwrap();
        let restored = ResponseCache::load(&blob).unwrap();

        assert_eq!(restored.len(), cache.len());
        let key = CacheKey::new(Some("INBOX"), "SEARCH", "UNSEEN");
        assert_eq!(restored.get(&key), cache.get(&key));
        assert_eq!(restored.dump().unwrap(), blob);

        let mut restored = restored;
        assert_eq!(restored.bust("SORT"), 1);
    }

    #[test]
    fn test_load_rejects_garbage_and_other_versions() {
        assert!(matches!(
            ResponseCache::load("not json"),
            Err(Error::Cache(_))
        ));
        assert!(matches!(
            ResponseCache::load(r#"{"version": 99, "entries": []}"#),
            Err(Error::InvalidArgument(_))
        ));
    }
}
