//! Callbacks for mailbox events the server reports on its own.
//!
//! A server may announce new mail, expunges or flag changes in the middle of
//! any command. The engine still returns those lines with the command's
//! [`CommandResult`](crate::protocol::CommandResult), and also passes each
//! one to the installed [`ResponseHandler`] as it arrives.
//!
//! ```
//! use mailroom_imap::handler::ResponseHandler;
//!
//! #[derive(Default)]
//! struct NewMail {
//!     exists: u32,
//! }
//!
//! impl ResponseHandler for NewMail {
//!     fn on_exists(&mut self, count: u32) {
//!         self.exists = count;
//!     }
//! }
//!
//! let mut watcher = NewMail::default();
//! watcher.on_exists(12);
//! assert_eq!(watcher.exists, 12);
//! ```

use std::sync::{Arc, Mutex};

use tracing::{debug, info, trace, warn};

use crate::parser::FetchData;
use crate::types::Flags;

/// Receives untagged mailbox events. Every method defaults to doing nothing.
pub trait ResponseHandler: Send {
    /// `* n EXISTS`: the mailbox now holds `count` messages.
    fn on_exists(&mut self, count: u32) {
        let _ = count;
    }

    /// `* n EXPUNGE`. Later sequence numbers shift down by one.
    fn on_expunge(&mut self, seq: u32) {
        let _ = seq;
    }

    /// `* n FETCH`, whether or not a FETCH was running.
    fn on_fetch(&mut self, data: &FetchData) {
        let _ = data;
    }

    /// `* FLAGS`: the mailbox's defined flags.
    fn on_flags(&mut self, flags: &Flags) {
        let _ = flags;
    }

    /// `* n RECENT`.
    fn on_recent(&mut self, count: u32) {
        let _ = count;
    }

    /// `* BYE`. The connection is about to close.
    fn on_bye(&mut self, text: &str) {
        let _ = text;
    }

    /// An `[ALERT]` the user should see.
    fn on_alert(&mut self, text: &str) {
        let _ = text;
    }
}

/// Ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHandler;

impl ResponseHandler for NoopHandler {}

/// Writes each event to `tracing`. Installed by default.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl ResponseHandler for LoggingHandler {
    fn on_exists(&mut self, count: u32) {
        debug!(count, "mailbox size changed");
    }

    fn on_expunge(&mut self, seq: u32) {
        debug!(seq, "message expunged");
    }

    fn on_fetch(&mut self, data: &FetchData) {
        trace!(seq = data.seq, uid = ?data.uid, "message data");
    }

    fn on_flags(&mut self, flags: &Flags) {
        debug!(%flags, "mailbox flags");
    }

    fn on_recent(&mut self, count: u32) {
        debug!(count, "recent count");
    }

    fn on_bye(&mut self, text: &str) {
        info!(text, "server closing connection");
    }

    fn on_alert(&mut self, text: &str) {
        warn!(text, "server alert");
    }
}

/// One event recorded by [`CollectingHandler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsolicitedEvent {
    /// New message count.
    Exists(u32),
    /// Expunged sequence number.
    Expunge(u32),
    /// Message data.
    Fetch(Box<FetchData>),
    /// Mailbox flags.
    Flags(Flags),
    /// Recent count.
    Recent(u32),
    /// Goodbye text.
    Bye(String),
    /// Alert text.
    Alert(String),
}

/// Records events in a shared buffer.
///
/// Clones share the buffer: install one clone with
/// [`MailboxClient::set_handler`](crate::MailboxClient::set_handler) and
/// drain the other with [`take`](Self::take).
#[derive(Debug, Default, Clone)]
pub struct CollectingHandler {
    events: Arc<Mutex<Vec<UnsolicitedEvent>>>,
}

impl CollectingHandler {
    /// Creates an empty handler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drains the recorded events.
    #[must_use]
    pub fn take(&self) -> Vec<UnsolicitedEvent> {
        self.events
            .lock()
            .map(|mut events| std::mem::take(&mut *events))
            .unwrap_or_default()
    }

    fn record(&self, event: UnsolicitedEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl ResponseHandler for CollectingHandler {
    fn on_exists(&mut self, count: u32) {
        self.record(UnsolicitedEvent::Exists(count));
    }

    fn on_expunge(&mut self, seq: u32) {
        self.record(UnsolicitedEvent::Expunge(seq));
    }

    fn on_fetch(&mut self, data: &FetchData) {
        self.record(UnsolicitedEvent::Fetch(Box::new(data.clone())));
    }

    fn on_flags(&mut self, flags: &Flags) {
        self.record(UnsolicitedEvent::Flags(flags.clone()));
    }

    fn on_recent(&mut self, count: u32) {
        self.record(UnsolicitedEvent::Recent(count));
    }

    fn on_bye(&mut self, text: &str) {
        self.record(UnsolicitedEvent::Bye(text.to_string()));
    }

    fn on_alert(&mut self, text: &str) {
        self.record(UnsolicitedEvent::Alert(text.to_string()));
    }
}
