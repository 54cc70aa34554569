//! # mailroom-imap
//!
//! An IMAP4rev1 client engine for applications that browse and manage a
//! mailbox over a single connection.
//!
//! ## Features
//!
//! - **Explicit connection states**: `disconnected` → `connected` →
//!   `authenticated` → `selected`, checked before any traffic is sent
//! - **Literal-aware framing**: synchronising and LITERAL+ literals in both
//!   directions, with size caps
//! - **Streamed bodies**: a message part can be read one line at a time
//!   without buffering it
//! - **Extensions**: ENABLE, ESEARCH, ESORT, SORT, ID, NAMESPACE, QUOTA,
//!   LIST-STATUS, MOVE, UNSELECT and Gmail `X-GM-RAW`, each gated on the
//!   server's capabilities
//! - **Response cache**: decoded results keyed by mailbox, command and
//!   arguments, serializable for a warm start
//! - **TLS via rustls**: implicit TLS or STARTTLS without OpenSSL
//!
//! ## Quick Start
//!
//! ```no_run
//! use mailroom_imap::{Config, MailboxClient, SortKey};
//!
//! #[tokio::main]
//! async fn main() -> mailroom_imap::Result<()> {
//!     let config = Config::new("imap.example.com", "user@example.com", "password");
//!     let mut client: MailboxClient = MailboxClient::new();
//!     client.connect(&config).await?;
//!
//!     for (name, mailbox) in client.get_mailbox_list().await? {
//!         println!("{name} ({:?} messages)", mailbox.messages);
//!     }
//!
//!     // Newest five messages in INBOX
//!     let page = client
//!         .get_mailbox_page("INBOX", SortKey::Arrival, true, "ALL", 0, 5)
//!         .await?;
//!     for (id, summary) in client.get_message_list(&page).await? {
//!         println!("{id} {} {}", summary.from, summary.subject);
//!     }
//!
//!     client.disconnect().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`client`]: the high-level [`MailboxClient`]
//! - [`protocol`]: the [`ProtocolEngine`] that owns the connection state
//! - [`cache`]: the [`ResponseCache`]
//! - [`command`]: command builders and serialization
//! - [`connection`]: configuration, TLS streams and framing
//! - [`parser`]: sans-I/O response and BODYSTRUCTURE parsing
//! - [`types`]: flags, mailboxes, search results and sequence sets

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod cache;
pub mod client;
pub mod command;
pub mod connection;
mod error;
pub mod handler;
pub mod parser;
pub mod protocol;
pub mod types;

pub use cache::{CacheKey, CachedValue, ResponseCache};
pub use client::{
    DEFAULT_ENABLE, FolderLevels, MailboxClient, convert_array_to_sequence,
    convert_sequence_to_array, decode_fld, flatten_bodystructure, search_bodystructure,
};
pub use command::{Command, FetchAttribute, StoreAction, TagGenerator};
pub use connection::{AuthMechanism, Config, ConfigBuilder, ImapStream, Security};
pub use error::{Error, ErrorKind, Result};
pub use handler::{CollectingHandler, LoggingHandler, NoopHandler, ResponseHandler};
pub use parser::{BodyPart, PartFilter, Response, ResponseParser, UntaggedResponse};
pub use protocol::{CommandResult, ConnectionState, ProtocolEngine, Transcript};
pub use types::{
    Capability, CapabilitySet, Flag, Flags, MailboxAttribute, MailboxDescriptor, MailboxStatus,
    MessageAction, MessageContent, MessageSummary, SearchQuery, SearchResult, SearchReturn,
    SelectedMailbox, SequenceSet, SortKey, Status,
};

pub use mailroom_mime::Headers;
