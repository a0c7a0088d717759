//! Vote records and user snapshots.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chat user as seen by the transport at interaction time.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatUser {
    /// Transport user identifier.
    pub user_id: String,
    /// Handle, if any.
    pub username: Option<String>,
    /// Display name, if any.
    pub name: Option<String>,
}

impl ChatUser {
    /// User known only by identifier.
    #[must_use]
    pub fn id_only(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: None,
            name: None,
        }
    }
}

/// The latest selection of one user in one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vote {
    /// Poll voted in.
    pub poll_id: String,
    /// Voter.
    pub user: ChatUser,
    /// Selected answer indices. Empty for users recorded without voting.
    pub option_ids: BTreeSet<usize>,
    /// Last change.
    pub updated_at: DateTime<Utc>,
}

/// Snapshot of a user's display fields used when rendering the queue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoterInfo {
    /// Transport user identifier.
    pub user_id: String,
    /// Handle; empty when unknown.
    pub username: String,
    /// Display name; empty when unknown.
    pub name: String,
}

impl From<&ChatUser> for VoterInfo {
    fn from(user: &ChatUser) -> Self {
        Self {
            user_id: user.user_id.clone(),
            username: user.username.clone().unwrap_or_default(),
            name: user.name.clone().unwrap_or_default(),
        }
    }
}

impl From<VoterInfo> for ChatUser {
    fn from(info: VoterInfo) -> Self {
        let non_empty = |s: String| if s.is_empty() { None } else { Some(s) };
        Self {
            user_id: info.user_id,
            username: non_empty(info.username),
            name: non_empty(info.name),
        }
    }
}
