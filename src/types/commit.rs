use serde::{Deserialize, Serialize};

use crate::hash::Hash;

/// a commit object pointing to a tree
///
/// the cache stores the stage fingerprint in `subject` and the
/// caller's message in `body`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// root tree hash
    pub tree: Hash,
    /// parent commit, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Hash>,
    pub subject: String,
    pub body: String,
    /// unix timestamp (seconds since epoch)
    pub timestamp: i64,
}

impl Commit {
    /// create a commit stamped with the current time
    pub fn new(
        tree: Hash,
        parent: Option<Hash>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        Self::with_timestamp(tree, parent, subject, body, timestamp)
    }

    /// create a commit with explicit timestamp
    pub fn with_timestamp(
        tree: Hash,
        parent: Option<Hash>,
        subject: impl Into<String>,
        body: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            tree,
            parent,
            subject: subject.into(),
            body: body.into(),
            timestamp,
        }
    }

    /// is this an initial commit (no parent)
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}
