//! Protocol state types.
//!
//! This module defines the connection states of the engine, following
//! RFC 3501 section 3, and the command phase that guards against
//! interleaving two exchanges on one connection.

/// Connection state.
///
/// - `Disconnected`: no transport
/// - `Connected`: greeting received, not yet logged in
/// - `Authenticated`: logged in, no mailbox open
/// - `Selected`: a mailbox is open
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No transport.
    #[default]
    Disconnected,

    /// Greeting received - waiting for credentials.
    ///
    /// In this state, only CAPABILITY, NOOP, LOGOUT, STARTTLS,
    /// AUTHENTICATE and LOGIN are valid.
    Connected,

    /// Authenticated - user has logged in.
    Authenticated,

    /// Selected - a mailbox is currently open.
    Selected(SelectedState),
}

impl ConnectionState {
    /// Lowercase state name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::Authenticated => "authenticated",
            Self::Selected(_) => "selected",
        }
    }

    /// Returns `true` if we're authenticated (authenticated or selected).
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated | Self::Selected(_))
    }

    /// Returns `true` if a mailbox is selected.
    #[must_use]
    pub const fn is_selected(&self) -> bool {
        matches!(self, Self::Selected(_))
    }

    /// Returns the selected mailbox name, if any.
    #[must_use]
    pub fn selected_mailbox(&self) -> Option<&str> {
        match self {
            Self::Selected(state) => Some(&state.mailbox),
            _ => None,
        }
    }

    /// Returns `true` if the selected mailbox is read-only.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        match self {
            Self::Selected(state) => state.read_only,
            _ => false,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State information when a mailbox is selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedState {
    /// Name of the selected mailbox.
    pub mailbox: String,
    /// Whether the mailbox is read-only (EXAMINE vs SELECT).
    pub read_only: bool,
}

/// What the connection is doing between commands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) enum Phase {
    /// Ready for a new command.
    #[default]
    Idle,
    /// A tagged command was sent and its completion not yet consumed.
    InFlight {
        /// Tag of the running command.
        tag: String,
    },
    /// A FETCH body literal is being handed out line by line.
    StreamingLiteral {
        /// Tag of the FETCH.
        tag: String,
        /// Literal bytes not yet read.
        remaining: usize,
    },
}
