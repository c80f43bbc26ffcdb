//! Logical paths on the remote feed.
//!
//! ```text
//! conversations/{userId}/{conversationId}            conversation snapshot
//! messages-list/{conversationId}/messages/{messageId} message snapshot
//! messages-list/{conversationId}/metadata            metadata signal
//! users/{userId}                                     user profile
//! ```

use crate::{ConversationId, MessageId, UserId};

/// Root of the per-user conversation indexes.
pub const CONVERSATIONS: &str = "conversations";
/// Root of the per-conversation message streams.
pub const MESSAGES_LIST: &str = "messages-list";
/// Root of the user profiles.
pub const USERS: &str = "users";

/// A user's conversation index.
pub fn conversation_index(user: &UserId) -> String {
    format!("{}/{}", CONVERSATIONS, user)
}

/// One entry of a user's conversation index.
pub fn conversation_entry(user: &UserId, conversation: &ConversationId) -> String {
    format!("{}/{}/{}", CONVERSATIONS, user, conversation)
}

/// A conversation's message stream.
pub fn message_stream(conversation: &ConversationId) -> String {
    format!("{}/{}/messages", MESSAGES_LIST, conversation)
}

/// A single message in a conversation's stream.
pub fn message_entry(conversation: &ConversationId, message: &MessageId) -> String {
    format!("{}/{}/messages/{}", MESSAGES_LIST, conversation, message)
}

/// A conversation's metadata signal.
pub fn metadata(conversation: &ConversationId) -> String {
    format!("{}/{}/metadata", MESSAGES_LIST, conversation)
}

/// A user's profile.
pub fn user(user: &UserId) -> String {
    format!("{}/{}", USERS, user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_match_feed_layout() {
        let user_id = UserId::from("alice");
        let conversation = ConversationId::from("alice_bob");
        let message = MessageId::from("m1");

        assert_eq!(conversation_index(&user_id), "conversations/alice");
        assert_eq!(
            conversation_entry(&user_id, &conversation),
            "conversations/alice/alice_bob"
        );
        assert_eq!(message_stream(&conversation), "messages-list/alice_bob/messages");
        assert_eq!(
            message_entry(&conversation, &message),
            "messages-list/alice_bob/messages/m1"
        );
        assert_eq!(metadata(&conversation), "messages-list/alice_bob/metadata");
        assert_eq!(user(&user_id), "users/alice");
    }
}
