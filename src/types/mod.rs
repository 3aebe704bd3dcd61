use std::fmt;
use std::fmt::{Debug, Display, Formatter};

pub mod error;
pub mod token;

/// Opaque handle to a remote message.
///
/// The string is the provider's identifier and carries no local meaning;
/// uniqueness is enforced by the remote service, not deduplicated here.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for MessageId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for MessageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Opaque pagination token returned by a list call and submitted on the
/// next call to continue from where the previous page left off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One page of a message listing.
///
/// Transient: only the `next_cursor` survives an enumeration step. An absent
/// `next_cursor` terminates the enumeration.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub ids: Vec<MessageId>,
    pub next_cursor: Option<Cursor>,
}

/// Counts by outcome for one pipeline run, reported before exit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Identifiers yielded by the enumerator.
    pub listed: u64,
    /// Identifiers moved to trash by successful batches.
    pub trashed: u64,
    /// Identifiers a dry run would have trashed.
    pub would_trash: u64,
    /// Batches dispatched (live) or simulated (dry run).
    pub batches: u64,
    /// Batches whose mutation call failed after retries.
    pub failed_batches: u64,
    /// Identifiers belonging to failed batches.
    pub failed_items: u64,
    /// The run was stopped by the cancellation signal.
    pub cancelled: bool,
    pub dry_run: bool,
}

impl RunSummary {
    /// Whether every dispatched batch succeeded with no per-item failures
    /// (a completed dry run counts as full success).
    pub fn is_full_success(&self) -> bool {
        self.failed_batches == 0 && self.failed_items == 0
    }
}
