//! Core IMAP types.

#![allow(clippy::missing_const_for_fn)]

mod capability;
mod extension;
mod flags;
mod mailbox;
mod message;
mod response_code;
mod search;
pub mod sequence;

pub use capability::{Capability, CapabilitySet, Status};
pub use extension::{Namespace, NamespaceClass, Quota, QuotaResource, QuotaRoot};
pub use flags::{Flag, Flags};
pub use mailbox::{
    MailboxAttribute, MailboxDescriptor, MailboxStatus, SelectedMailbox, validate_mailbox_name,
};
pub use message::{MessageAction, MessageContent, MessageSummary};
pub use response_code::ResponseCode;
pub use search::{ExtendedResult, SearchQuery, SearchResult, SearchReturn, SortKey};
pub use sequence::SequenceSet;
