use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a [`Thread`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadStatus {
    Active,
    Archived,
}

/// A conversation scope with a fixed participant set.
///
/// `participants` is fixed at creation time unless the thread is archived
/// and reopened. Once `status` is [`ThreadStatus::Archived`], no new
/// events may be processed for this thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub external_id: Option<String>,
    pub name: Option<String>,
    pub participants: Vec<String>,
    pub status: ThreadStatus,
    pub summary: Option<String>,
    pub parent_thread_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Thread {
    /// `true` when the thread is the conceptual "other participant" for a
    /// two-party fallback check — does not itself implement the rule, just
    /// a small helper used by [`crate::router::Router`].
    pub fn is_two_party(&self) -> bool {
        self.participants.len() == 2
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, ThreadStatus::Active)
    }
}
