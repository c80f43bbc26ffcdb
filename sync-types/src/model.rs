//! The cached data model: messages, conversations and the transient
//! conversation metadata signal.
//!
//! Timestamps are Unix milliseconds. For anything that came back from the
//! remote feed they are server-assigned; for an optimistic local row they
//! are the client's clock until the remote copy replaces it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{ConversationId, MessageId, SyncError, UserId};

/// Delivery status of a message.
///
/// Legal moves are `Sending -> Sent | Failed` and `Sent -> Read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Written locally, not yet confirmed by the remote feed.
    Sending,
    /// Accepted by the remote feed.
    Sent,
    /// Seen by the recipient.
    Read,
    /// The remote write failed; awaiting a user-initiated resend.
    Failed,
}

impl MessageStatus {
    /// Wire and column representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Sending => "sending",
            MessageStatus::Sent => "sent",
            MessageStatus::Read => "read",
            MessageStatus::Failed => "failed",
        }
    }

    /// Whether a row in this status may be rewritten with `next`.
    ///
    /// Rewriting the same status is allowed: upserts are idempotent.
    pub fn can_transition_to(self, next: MessageStatus) -> bool {
        use MessageStatus::*;
        self == next || matches!((self, next), (Sending, Sent) | (Sending, Failed) | (Sent, Read))
    }

    /// Check a transition, returning an error for a backwards move.
    pub fn transition_to(self, next: MessageStatus) -> Result<MessageStatus, SyncError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(SyncError::IllegalTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageStatus {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sending" => Ok(MessageStatus::Sending),
            "sent" => Ok(MessageStatus::Sent),
            "read" => Ok(MessageStatus::Read),
            "failed" => Ok(MessageStatus::Failed),
            other => Err(SyncError::MalformedSnapshot {
                path: "status".into(),
                reason: format!("unknown message status {:?}", other),
            }),
        }
    }
}

/// Content type of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    /// Plain text.
    Text,
    /// Image attachment.
    Image,
    /// Voice note or audio clip.
    Audio,
    /// Video attachment.
    Video,
    /// Any other file.
    File,
    /// A type this client does not understand yet.
    #[serde(other)]
    Unsupported,
}

impl MessageKind {
    /// Wire and column representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "TEXT",
            MessageKind::Image => "IMAGE",
            MessageKind::Audio => "AUDIO",
            MessageKind::Video => "VIDEO",
            MessageKind::File => "FILE",
            MessageKind::Unsupported => "UNSUPPORTED",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "TEXT" => MessageKind::Text,
            "IMAGE" => MessageKind::Image,
            "AUDIO" => MessageKind::Audio,
            "VIDEO" => MessageKind::Video,
            "FILE" => MessageKind::File,
            _ => MessageKind::Unsupported,
        })
    }
}

/// A reference to the message being replied to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotedMessage {
    /// Id of the quoted message.
    pub id: MessageId,
    /// Body of the quoted message at the time of quoting.
    pub body: String,
    /// Author of the quoted message.
    pub sender_id: UserId,
    /// Content type of the quoted message.
    pub kind: MessageKind,
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Globally unique id.
    pub id: MessageId,
    /// Conversation this message belongs to.
    pub conversation_id: ConversationId,
    /// Author.
    pub sender_id: UserId,
    /// Message text (or caption).
    pub body: String,
    /// Creation time, Unix milliseconds.
    pub timestamp: i64,
    /// Delivery status.
    pub status: MessageStatus,
    /// Content type.
    pub kind: MessageKind,
    /// Optional emoji reaction.
    pub reaction: Option<String>,
    /// Optional reply reference.
    pub quoted: Option<QuotedMessage>,
}

impl Message {
    /// Create a new outgoing text message in the `Sending` state.
    pub fn outgoing_text(
        conversation_id: ConversationId,
        sender_id: UserId,
        body: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            id: MessageId::new(),
            conversation_id,
            sender_id,
            body: body.into(),
            timestamp,
            status: MessageStatus::Sending,
            kind: MessageKind::Text,
            reaction: None,
            quoted: None,
        }
    }

    /// Copy of this message with another status.
    pub fn with_status(mut self, status: MessageStatus) -> Self {
        self.status = status;
        self
    }

    /// Attach a reply reference.
    pub fn quoting(mut self, quoted: QuotedMessage) -> Self {
        self.quoted = Some(quoted);
        self
    }
}

/// Public profile of a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    /// User id.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Contact email (may be empty).
    pub email: String,
    /// Avatar URL (may be empty).
    pub photo_url: String,
}

/// Snapshot of the newest message in a conversation, for list rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastMessage {
    /// Body of the newest message.
    pub text: String,
    /// Its delivery status.
    pub status: MessageStatus,
    /// Its content type.
    pub kind: MessageKind,
    /// Its creation time (`last_message_creation_time` on the wire).
    pub timestamp: i64,
    /// Whether the recipient has seen it.
    pub is_read: bool,
}

/// A conversation summary as shown in the conversation list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    /// Conversation id.
    pub id: ConversationId,
    /// Everyone taking part, including the signed-in user.
    pub participants: Vec<UserProfile>,
    /// Messages not yet read by the index owner.
    pub unread_message_count: u32,
    /// Newest message snapshot.
    pub last_message: LastMessage,
    /// Creation time, Unix milliseconds.
    pub created_at: i64,
}

impl Conversation {
    /// Start a new conversation whose first message is `message`.
    pub fn started_by(message: &Message, participants: Vec<UserProfile>, created_at: i64) -> Self {
        Self {
            id: message.conversation_id.clone(),
            participants,
            unread_message_count: 0,
            last_message: LastMessage::of(message),
            created_at,
        }
    }

    /// Summary reflecting `message` as the newest message.
    pub fn with_last_message(&self, message: &Message) -> Self {
        Self {
            last_message: LastMessage::of(message),
            ..self.clone()
        }
    }

    /// Copy with the last message status replaced.
    pub fn with_last_status(mut self, status: MessageStatus) -> Self {
        self.last_message.status = status;
        self
    }

    /// The participant that is not `me`, for direct chats.
    pub fn peer_of(&self, me: &UserId) -> Option<&UserProfile> {
        self.participants.iter().find(|p| &p.id != me)
    }
}

impl LastMessage {
    /// Snapshot of a message, unread.
    pub fn of(message: &Message) -> Self {
        Self {
            text: message.body.clone(),
            status: message.status,
            kind: message.kind,
            timestamp: message.timestamp,
            is_read: false,
        }
    }
}

/// What the last metadata update was about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModificationType {
    /// Status or reaction of `message_id` changed.
    #[serde(rename = "MESSAGE_UPDATED")]
    MessageUpdated,
    /// `message_id` was deleted.
    #[serde(rename = "MESSAGE_DELETED")]
    MessageDeleted,
    /// A new message was added.
    #[serde(rename = "NEW_MESSAGE_ADDED")]
    NewMessageAdded,
    /// Typing heartbeat.
    #[serde(rename = "IDLE_MODIFICATION")]
    Idle,
}

/// Transient per-conversation signal. Never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationMetadata {
    /// When the signal was last written, Unix milliseconds.
    pub last_updated: i64,
    /// Who wrote it.
    pub updated_by: UserId,
    /// What changed.
    pub modification_type: ModificationType,
    /// The message the change refers to.
    pub message_id: MessageId,
    /// Typing flag of the first participant.
    pub first_participant_typing: bool,
    /// Typing flag of the second participant.
    pub second_participant_typing: bool,
}
