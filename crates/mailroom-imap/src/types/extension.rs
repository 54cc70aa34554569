//! Data returned by NAMESPACE, QUOTA and ID.

use serde::{Deserialize, Serialize};

/// Which NAMESPACE section an entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NamespaceClass {
    /// The user's own mailboxes.
    Personal,
    /// Other users' mailboxes.
    OtherUsers,
    /// Shared mailboxes.
    Shared,
}

/// One NAMESPACE entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    /// Section the entry belongs to.
    pub class: NamespaceClass,
    /// Mailbox name prefix.
    pub prefix: String,
    /// Hierarchy delimiter.
    pub delimiter: Option<char>,
}

/// One resource line of a QUOTA response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaResource {
    /// Resource name such as `STORAGE` or `MESSAGE`.
    pub name: String,
    /// Current usage.
    pub usage: u64,
    /// Limit.
    pub limit: u64,
}

/// A QUOTA response.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Quota {
    /// Quota root name.
    pub root: String,
    /// Resource usage under this root.
    pub resources: Vec<QuotaResource>,
}

/// A QUOTAROOT response with the quotas that followed it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuotaRoot {
    /// Mailbox asked about.
    pub mailbox: String,
    /// Quota roots governing the mailbox.
    pub roots: Vec<String>,
    /// Quotas reported for those roots.
    pub quotas: Vec<Quota>,
}
