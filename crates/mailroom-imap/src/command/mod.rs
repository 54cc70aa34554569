//! IMAP command builder.
//!
//! This module provides types and serialization for IMAP commands. A command
//! serializes into one or more chunks: every chunk but the last ends in a
//! synchronising literal (or an AUTHENTICATE line) and must wait for the
//! server's `+` continuation before the next chunk is written.

mod serialize;
mod tag_generator;
mod types;

use crate::types::{SearchReturn, SortKey};

pub use tag_generator::TagGenerator;
pub use types::{FetchAttribute, StatusAttribute, StoreAction};

use serialize::Encoder;

/// IMAP command.
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    // Any State Commands
    /// CAPABILITY command.
    Capability,
    /// NOOP command.
    Noop,
    /// LOGOUT command.
    Logout,

    // Not Authenticated State Commands
    /// STARTTLS command.
    StartTls,
    /// LOGIN command.
    Login {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
    /// AUTHENTICATE command; the response is sent after the first `+`.
    Authenticate {
        /// Authentication mechanism.
        mechanism: String,
        /// Base64 client response.
        response: String,
    },

    // Authenticated State Commands
    /// ID command (RFC 2971) - client/server identification.
    Id {
        /// Client identification parameters (field-value pairs).
        /// None = ID NIL (no identification).
        parameters: Option<Vec<(String, String)>>,
    },
    /// ENABLE command.
    Enable {
        /// Capabilities to enable.
        capabilities: Vec<String>,
    },
    /// SELECT command.
    Select {
        /// Mailbox to select.
        mailbox: String,
    },
    /// EXAMINE command (read-only SELECT).
    Examine {
        /// Mailbox to examine.
        mailbox: String,
    },
    /// CREATE command.
    Create {
        /// Mailbox to create.
        mailbox: String,
    },
    /// DELETE command.
    Delete {
        /// Mailbox to delete.
        mailbox: String,
    },
    /// RENAME command.
    Rename {
        /// Current mailbox name.
        from: String,
        /// New mailbox name.
        to: String,
    },
    /// LIST command.
    List {
        /// Reference name.
        reference: String,
        /// Mailbox pattern.
        pattern: String,
        /// Ask for counters with LIST-STATUS.
        return_status: bool,
    },
    /// NAMESPACE command.
    Namespace,
    /// GETQUOTA command.
    GetQuota {
        /// Quota root.
        root: String,
    },
    /// GETQUOTAROOT command.
    GetQuotaRoot {
        /// Mailbox name.
        mailbox: String,
    },
    /// STATUS command.
    Status {
        /// Mailbox name.
        mailbox: String,
        /// Status items to request.
        items: Vec<StatusAttribute>,
    },

    // Selected State Commands
    /// CLOSE command.
    Close,
    /// UNSELECT command.
    Unselect,
    /// EXPUNGE command.
    Expunge,
    /// UID EXPUNGE (RFC 4315): removes only the listed UIDs.
    UidExpunge {
        /// UID set.
        sequence: String,
    },
    /// SEARCH command.
    Search {
        /// Use UIDs.
        uid: bool,
        /// ESEARCH return options; empty for a plain SEARCH.
        returning: Vec<SearchReturn>,
        /// Search charset.
        charset: Option<String>,
        /// Sequence set restriction.
        sequence: Option<String>,
        /// Raw search criteria.
        criteria: String,
        /// `HEADER field value` criterion.
        header: Option<(String, String)>,
    },
    /// SORT command (RFC 5256), with ESORT return options.
    Sort {
        /// Use UIDs.
        uid: bool,
        /// ESORT return options; empty for a plain SORT.
        returning: Vec<SearchReturn>,
        /// Sort key.
        key: SortKey,
        /// Prefix the key with REVERSE.
        reverse: bool,
        /// Search charset.
        charset: String,
        /// Raw search criteria.
        criteria: String,
    },
    /// Gmail `X-GM-RAW` search.
    GmailSearch {
        /// Use UIDs.
        uid: bool,
        /// Gmail search syntax.
        query: String,
    },
    /// FETCH command.
    Fetch {
        /// Sequence set.
        sequence: String,
        /// Items to fetch.
        items: Vec<FetchAttribute>,
        /// Use UIDs.
        uid: bool,
    },
    /// STORE command.
    Store {
        /// Sequence set.
        sequence: String,
        /// Store action.
        action: StoreAction,
        /// Use UIDs.
        uid: bool,
        /// Silent mode (no FETCH response).
        silent: bool,
    },
    /// COPY command.
    Copy {
        /// Sequence set.
        sequence: String,
        /// Target mailbox.
        mailbox: String,
        /// Use UIDs.
        uid: bool,
    },
    /// MOVE command.
    Move {
        /// Sequence set.
        sequence: String,
        /// Target mailbox.
        mailbox: String,
        /// Use UIDs.
        uid: bool,
    },
}

impl Command {
    /// Command keyword, as used for logging and cache signatures.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Capability => "CAPABILITY",
            Self::Noop => "NOOP",
            Self::Logout => "LOGOUT",
            Self::StartTls => "STARTTLS",
            Self::Login { .. } => "LOGIN",
            Self::Authenticate { .. } => "AUTHENTICATE",
            Self::Id { .. } => "ID",
            Self::Enable { .. } => "ENABLE",
            Self::Select { .. } => "SELECT",
            Self::Examine { .. } => "EXAMINE",
            Self::Create { .. } => "CREATE",
            Self::Delete { .. } => "DELETE",
            Self::Rename { .. } => "RENAME",
            Self::List { .. } => "LIST",
            Self::Namespace => "NAMESPACE",
            Self::GetQuota { .. } => "GETQUOTA",
            Self::GetQuotaRoot { .. } => "GETQUOTAROOT",
            Self::Status { .. } => "STATUS",
            Self::Close => "CLOSE",
            Self::Unselect => "UNSELECT",
            Self::Expunge | Self::UidExpunge { .. } => "EXPUNGE",
            Self::Search { .. } | Self::GmailSearch { .. } => "SEARCH",
            Self::Sort { .. } => "SORT",
            Self::Fetch { .. } => "FETCH",
            Self::Store { .. } => "STORE",
            Self::Copy { .. } => "COPY",
            Self::Move { .. } => "MOVE",
        }
    }

    /// Returns true if the command carries credentials.
    #[must_use]
    pub const fn is_sensitive(&self) -> bool {
        matches!(self, Self::Login { .. } | Self::Authenticate { .. })
    }

    /// Serializes the command with the given tag.
    ///
    /// With `literal_plus` set, literals are sent non-synchronising and only
    /// AUTHENTICATE produces more than one chunk.
    #[must_use]
    #[allow(clippy::too_many_lines)]
    pub fn serialize(&self, tag: &str, literal_plus: bool) -> Vec<Vec<u8>> {
        let mut enc = Encoder::new(literal_plus);
        enc.raw(tag).sp();

        match self {
            Self::Capability
            | Self::Noop
            | Self::Logout
            | Self::StartTls
            | Self::Namespace
            | Self::Close
            | Self::Unselect
            | Self::Expunge => {
                enc.raw(self.name());
            }

            Self::Login { username, password } => {
                enc.raw("LOGIN ").astring(username).sp().astring(password);
            }

            Self::Authenticate {
                mechanism,
                response,
            } => {
                enc.raw("AUTHENTICATE ").raw(mechanism).continuation().raw(response);
            }

            Self::Id { parameters } => {
                enc.raw("ID ");
                if let Some(params) = parameters {
                    enc.raw("(");
                    for (i, (key, value)) in params.iter().enumerate() {
                        if i > 0 {
                            enc.sp();
                        }
                        enc.string(key).sp().string(value);
                    }
                    enc.raw(")");
                } else {
                    enc.raw("NIL");
                }
            }

            Self::Enable { capabilities } => {
                enc.raw("ENABLE");
                for cap in capabilities {
                    enc.sp().raw(cap);
                }
            }

            Self::Select { mailbox } => {
                enc.raw("SELECT ").astring(mailbox);
            }
            Self::Examine { mailbox } => {
                enc.raw("EXAMINE ").astring(mailbox);
            }
            Self::Create { mailbox } => {
                enc.raw("CREATE ").astring(mailbox);
            }
            Self::Delete { mailbox } => {
                enc.raw("DELETE ").astring(mailbox);
            }
            Self::Rename { from, to } => {
                enc.raw("RENAME ").astring(from).sp().astring(to);
            }

            Self::List {
                reference,
                pattern,
                return_status,
            } => {
                enc.raw("LIST ").astring(reference).sp().astring(pattern);
                if *return_status {
                    enc.raw(" RETURN (STATUS (MESSAGES UNSEEN UIDVALIDITY))");
                }
            }

            Self::GetQuota { root } => {
                enc.raw("GETQUOTA ").astring(root);
            }
            Self::GetQuotaRoot { mailbox } => {
                enc.raw("GETQUOTAROOT ").astring(mailbox);
            }

            Self::Status { mailbox, items } => {
                enc.raw("STATUS ")
                    .astring(mailbox)
                    .sp()
                    .list(items.iter().map(|i| i.as_str()));
            }

            Self::Search {
                uid,
                returning,
                charset,
                sequence,
                criteria,
                header,
            } => {
                uid_prefix(&mut enc, *uid).raw("SEARCH");
                if !returning.is_empty() {
                    enc.raw(" RETURN ").list(returning.iter().map(|r| r.as_str()));
                }
                if let Some(charset) = charset {
                    enc.raw(" CHARSET ").astring(charset);
                }
                if let Some(sequence) = sequence {
                    enc.sp().raw(sequence);
                }
                if !criteria.is_empty() {
                    enc.sp().raw(criteria);
                }
                if let Some((field, value)) = header {
                    enc.raw(" HEADER ").astring(field).sp().astring(value);
                }
            }

            Self::Sort {
                uid,
                returning,
                key,
                reverse,
                charset,
                criteria,
            } => {
                uid_prefix(&mut enc, *uid).raw("SORT");
                if !returning.is_empty() {
                    enc.raw(" RETURN ").list(returning.iter().map(|r| r.as_str()));
                }
                enc.raw(" (");
                if *reverse {
                    enc.raw("REVERSE ");
                }
                enc.raw(key.as_str()).raw(") ").astring(charset).sp().raw(criteria);
            }

            Self::GmailSearch { uid, query } => {
                uid_prefix(&mut enc, *uid).raw("SEARCH X-GM-RAW ").string(query);
            }

            Self::Fetch {
                sequence,
                items,
                uid,
            } => {
                uid_prefix(&mut enc, *uid)
                    .raw("FETCH ")
                    .raw(sequence)
                    .sp()
                    .fetch_items(items);
            }

            Self::UidExpunge { sequence } => {
                enc.raw("UID EXPUNGE ").raw(sequence);
            }

            Self::Store {
                sequence,
                action,
                uid,
                silent,
            } => {
                uid_prefix(&mut enc, *uid)
                    .raw("STORE ")
                    .raw(sequence)
                    .sp()
                    .store_action(action, *silent);
            }

            Self::Copy {
                sequence,
                mailbox,
                uid,
            } => {
                uid_prefix(&mut enc, *uid)
                    .raw("COPY ")
                    .raw(sequence)
                    .sp()
                    .astring(mailbox);
            }

            Self::Move {
                sequence,
                mailbox,
                uid,
            } => {
                uid_prefix(&mut enc, *uid)
                    .raw("MOVE ")
                    .raw(sequence)
                    .sp()
                    .astring(mailbox);
            }
        }

        enc.finish()
    }

    /// One-line rendering for logs and the transcript; credentials and
    /// literal payloads are not included.
    #[must_use]
    pub fn describe(&self, tag: &str) -> String {
        if self.is_sensitive() {
            return format!("{tag} {} <redacted>", self.name());
        }
        let chunks = self.serialize(tag, false);
        let mut line = String::from_utf8_lossy(&chunks[0]).trim_end().to_string();
        if chunks.len() > 1 {
            line.push_str(" ...");
        }
        line
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_sensitive() {
            return write!(f, "{} {{ .. }}", self.name());
        }
        f.write_str(&self.describe("*"))
    }
}

fn uid_prefix(enc: &mut Encoder, uid: bool) -> &mut Encoder {
    if uid {
        enc.raw("UID ");
    }
    enc
}
