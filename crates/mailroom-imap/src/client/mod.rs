//! High-level mailbox client.
//!
//! [`MailboxClient`] wraps a [`ProtocolEngine`] with the operations a mail
//! application needs: listing and selecting mailboxes, searching, sorting,
//! fetching summaries, structures, headers and bodies, and changing flags.
//! Decoded results are kept in a [`ResponseCache`] that can be dumped and
//! restored.
//!
//! Operations check their preconditions before any traffic is sent:
//!
//! 1. a closed connection fails with [`Error::NotConnected`];
//! 2. a missing extension fails with [`Error::Unsupported`];
//! 3. a message operation with no mailbox selected fails with
//!    [`Error::InvalidState`].
//!
//! # Example
//!
//! ```no_run
//! use mailroom_imap::{Config, MailboxClient, SearchQuery};
//!
//! # async fn example() -> mailroom_imap::Result<()> {
//! let config = Config::new("imap.example.com", "user@example.com", "password");
//! let mut client: MailboxClient = MailboxClient::new();
//! client.connect(&config).await?;
//!
//! client.select_mailbox("INBOX").await?;
//! let unseen = client.search(&SearchQuery::new("UNSEEN")).await?;
//! let summaries = client.get_message_list(&unseen.ids()).await?;
//! for (id, summary) in &summaries {
//!     println!("{id}: {}", summary.subject);
//! }
//!
//! client.disconnect().await;
//! # Ok(())
//! # }
//! ```

#![allow(clippy::missing_errors_doc)]

mod extensions;
mod mailbox;
mod message;
mod sort;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

pub use extensions::DEFAULT_ENABLE;
pub use mailbox::FolderLevels;

use crate::cache::{CacheKey, CachedValue, ResponseCache};
use crate::command::Command;
use crate::connection::{self, Config, ImapStream, Security};
use crate::handler::ResponseHandler;
use crate::parser::{BodyPart, PartFilter, UntaggedResponse};
use crate::protocol::{ConnectionState, ProtocolEngine, Transcript};
use crate::types::{CapabilitySet, sequence};
use crate::{Error, Result};

/// Default per-read/write timeout before a connection is configured.
const DEFAULT_IO_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60);

/// A single-connection IMAP client.
pub struct MailboxClient<S = ImapStream> {
    engine: ProtocolEngine<S>,
    cache: ResponseCache,
    use_uids: bool,
    use_cache: bool,
    delimiter: Option<Option<char>>,
}

impl<S> std::fmt::Debug for MailboxClient<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailboxClient")
            .field("engine", &self.engine)
            .field("cached", &self.cache.len())
            .field("use_uids", &self.use_uids)
            .field("use_cache", &self.use_cache)
            .finish_non_exhaustive()
    }
}

impl<S> Default for MailboxClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn default() -> Self {
        Self::new()
    }
}

impl MailboxClient<ImapStream> {
    /// Connects, upgrades with STARTTLS when configured, and logs in.
    ///
    /// On any failure the client is left disconnected.
    pub async fn connect(&mut self, config: &Config) -> Result<()> {
        self.ensure_disconnected()?;
        let stream = connection::connect(config).await?;
        self.open(stream, config).await?;

        if config.security == Security::StartTls
            && let Err(err) = self.engine.starttls(&config.host).await
        {
            self.engine.disconnect().await;
            return Err(err);
        }
        self.authenticate(config).await
    }
}

impl<S> MailboxClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a disconnected client using UIDs and the cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            engine: ProtocolEngine::new(DEFAULT_IO_TIMEOUT),
            cache: ResponseCache::new(),
            use_uids: true,
            use_cache: true,
            delimiter: None,
        }
    }

    /// Logs in over an already-open transport.
    ///
    /// The transport must be positioned before the server greeting.
    pub async fn connect_with(&mut self, stream: S, config: &Config) -> Result<()> {
        self.ensure_disconnected()?;
        self.open(stream, config).await?;
        self.authenticate(config).await
    }

    /// Current connection state.
    #[must_use]
    pub const fn get_state(&self) -> &ConnectionState {
        self.engine.state()
    }

    /// Capabilities captured at connect and login.
    #[must_use]
    pub const fn get_capability(&self) -> &CapabilitySet {
        self.engine.capabilities()
    }

    /// Returns true if the server advertised `token`.
    #[must_use]
    pub fn is_supported(&self, token: &str) -> bool {
        self.engine.has_capability(token)
    }

    /// Recent commands and completions, credentials redacted.
    #[must_use]
    pub const fn transcript(&self) -> &Transcript {
        self.engine.transcript()
    }

    /// Empties the transcript.
    pub fn clear_transcript(&mut self) {
        self.engine.clear_transcript();
    }

    /// Replaces the handler for unsolicited responses.
    pub fn set_handler(&mut self, handler: Box<dyn ResponseHandler>) {
        self.engine.set_handler(handler);
    }

    /// Sends NOOP and returns whatever the server reported meanwhile.
    ///
    /// EXISTS and EXPUNGE updates invalidate cached searches, sorts and
    /// counters. A FETCH update (usually new flags) invalidates every cached
    /// FETCH, since headers and message lists carry flags.
    pub async fn poll(&mut self) -> Result<Vec<UntaggedResponse>> {
        self.require_selected()?;
        let result = self.engine.execute(&Command::Noop).await?;

        let mut changed = false;
        let mut expunged = false;
        let mut fetched = false;
        for response in &result.responses {
            match response {
                UntaggedResponse::Exists(_) => changed = true,
                UntaggedResponse::Expunge(_) => expunged = true,
                UntaggedResponse::Fetch(_) => fetched = true,
                _ => {}
            }
        }
        if changed || expunged {
            self.bust_all(&["SEARCH", "SORT", "STATUS"]);
        }
        if fetched || (expunged && !self.use_uids) {
            self.cache.bust("FETCH");
        }
        Ok(result.responses)
    }

    /// Logs out and closes the connection; never fails.
    pub async fn disconnect(&mut self) {
        self.engine.disconnect().await;
        self.delimiter = None;
    }

    /// Serializes the cache.
    pub fn dump_cache(&self) -> Result<String> {
        self.cache.dump()
    }

    /// Replaces the cache with one restored from [`dump_cache`](Self::dump_cache).
    pub fn load_cache(&mut self, blob: &str) -> Result<()> {
        self.cache = ResponseCache::load(blob)?;
        Ok(())
    }

    /// Drops cache entries: `"ALL"`, a command-name prefix, or a key
    /// signature. Returns how many entries went.
    pub fn bust_cache(&mut self, selector: &str) -> usize {
        self.cache.bust(selector)
    }

    async fn open(&mut self, stream: S, config: &Config) -> Result<()> {
        self.use_uids = config.use_uids;
        self.use_cache = config.use_cache;
        self.delimiter = None;
        self.engine.set_io_timeout(config.io_timeout);
        self.engine.attach(stream).await
    }

    async fn authenticate(&mut self, config: &Config) -> Result<()> {
        if self.engine.capabilities().is_empty()
            && let Err(err) = self.engine.refresh_capabilities().await
        {
            self.engine.disconnect().await;
            return Err(err);
        }

        if self.engine.state().is_authenticated() {
            debug!("pre-authenticated, skipping login");
            return Ok(());
        }
        self.engine
            .login(&config.username, &config.password, config.auth)
            .await
    }

    fn ensure_disconnected(&self) -> Result<()> {
        if *self.engine.state() == ConnectionState::Disconnected {
            Ok(())
        } else {
            Err(Error::InvalidState("already connected".to_string()))
        }
    }

    fn require_connected(&self) -> Result<()> {
        match self.engine.state() {
            ConnectionState::Disconnected => Err(Error::NotConnected),
            ConnectionState::Connected => {
                Err(Error::InvalidState("not logged in".to_string()))
            }
            _ => Ok(()),
        }
    }

    fn require_capability(&self, token: &str) -> Result<()> {
        self.require_connected()?;
        if self.engine.has_capability(token) {
            Ok(())
        } else {
            Err(Error::Unsupported(token.to_string()))
        }
    }

    fn require_selected(&self) -> Result<String> {
        self.require_connected()?;
        self.engine
            .state()
            .selected_mailbox()
            .map(str::to_string)
            .ok_or_else(|| Error::InvalidState("no mailbox is selected".to_string()))
    }

    fn cached(&self, key: &CacheKey) -> Option<&CachedValue> {
        if self.use_cache {
            self.cache.get(key)
        } else {
            None
        }
    }

    fn remember(&mut self, key: CacheKey, value: CachedValue) {
        if self.use_cache {
            self.cache.insert(key, value);
        }
    }

    fn bust_all(&mut self, commands: &[&str]) {
        for command in commands {
            self.cache.bust(command);
        }
    }
}

/// The command line without its tag, used as a cache key argument.
fn command_args(command: &Command) -> String {
    let bytes = command.serialize("", false).concat();
    String::from_utf8_lossy(&bytes).trim().to_string()
}

/// Decodes RFC 2047 encoded words; plain text passes through unchanged.
///
/// ```
/// assert_eq!(mailroom_imap::decode_fld("=?UTF-8?B?amFzb24=?="), "jason");
/// assert_eq!(mailroom_imap::decode_fld("test"), "test");
/// ```
#[must_use]
pub fn decode_fld(text: &str) -> String {
    mailroom_mime::encoding::decode_rfc2047(text)
}

/// Compresses ids into sequence-set notation.
///
/// ```
/// let seq = mailroom_imap::convert_array_to_sequence(&[1, 2, 3, 4, 5, 10, 11, 15, 20]);
/// assert_eq!(seq, "1:5,10:11,15,20");
/// ```
#[must_use]
pub fn convert_array_to_sequence(ids: &[u32]) -> String {
    sequence::compress(ids)
}

/// Expands sequence-set notation, left to right, keeping duplicates.
///
/// ```
/// let ids = mailroom_imap::convert_sequence_to_array("1:10,70").unwrap();
/// assert_eq!(ids, [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 70]);
/// ```
pub fn convert_sequence_to_array(text: &str) -> Result<Vec<u32>> {
    sequence::expand(text)
}

/// Part number to `type/subtype`, in traversal order.
#[must_use]
pub fn flatten_bodystructure(tree: &BodyPart) -> Vec<(String, String)> {
    tree.flatten()
}

/// Every node matching all of the filter's attributes, each with its
/// subtree, in traversal order.
#[must_use]
pub fn search_bodystructure<'a>(tree: &'a BodyPart, filter: &PartFilter) -> Vec<&'a BodyPart> {
    tree.search(filter)
}
