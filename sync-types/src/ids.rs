//! Identity types for galaxy-sync.
//!
//! All ids are opaque strings assigned outside this crate (the auth
//! provider for users, the sender for messages), except conversation ids
//! for two-party chats, which are derived from the participants.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::SyncError;

/// Separator between the two participant ids of a direct conversation.
const PAIR_SEPARATOR: char = '_';

/// A globally unique message identifier.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Create a new random MessageId (UUID v4).
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId({})", self.0)
    }
}

/// Identifier of a signed-in user, as issued by the auth provider.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.0)
    }
}

/// Identifier of a conversation.
///
/// For two-party chats use [`ConversationId::for_pair`], which is
/// symmetric in its arguments so both sides land on the same conversation.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    /// Derive the id of the direct conversation between two users.
    ///
    /// The lexicographically smaller id always comes first, so
    /// `for_pair(a, b) == for_pair(b, a)`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::SameParticipant`] when `a == b`, and
    /// [`SyncError::InvalidUserId`] when either id is empty or contains the
    /// separator (which would make two different pairs collide).
    pub fn for_pair(a: &UserId, b: &UserId) -> Result<Self, SyncError> {
        for user in [a, b] {
            if user.0.is_empty() || user.0.contains(PAIR_SEPARATOR) {
                return Err(SyncError::InvalidUserId(user.0.clone()));
            }
        }
        if a == b {
            return Err(SyncError::SameParticipant(a.0.clone()));
        }

        let (first, second) = if a < b { (a, b) } else { (b, a) };
        Ok(Self(format!("{}{}{}", first, PAIR_SEPARATOR, second)))
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConversationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ConversationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConversationId({})", self.0)
    }
}
