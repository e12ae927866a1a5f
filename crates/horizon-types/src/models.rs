use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One reaction group on a message: an emoji and the users who applied it.
/// A group exists only while `users` is non-empty; emptied groups are removed
/// from the message rather than retained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub emoji: String,
    /// Unique usernames, in the order they first reacted.
    pub users: Vec<String>,
}

/// A stored chat message. `id` is client-supplied; `timestamp` is always
/// server-assigned, regardless of what the client sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    /// Author's self-declared username.
    pub username: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub edited: bool,
    /// Reaction groups in emoji insertion order.
    #[serde(default)]
    pub reactions: Vec<Reaction>,
}
