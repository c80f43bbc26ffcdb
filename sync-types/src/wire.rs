//! Wire vocabulary of the remote feed.
//!
//! The feed stores flat JSON documents with snake_case field names. Every
//! in-memory field has exactly one wire field and back:
//!
//! | Model | Wire |
//! |---|---|
//! | `Message::kind` | `type` |
//! | `Message::quoted.{id,body,sender_id,kind}` | `quoted_message_{id,body,sender_id,type}` |
//! | `Conversation::last_message.{text,status,kind,timestamp,is_read}` | `last_message`, `last_message_status`, `last_message_type`, `last_message_creation_time`, `is_last_message_read` |
//! | `ConversationMetadata::{first,second}_participant_typing` | `is_{first,second}_participant_typing` |
//!
//! Outgoing writes may carry [`ServerValue`] placeholders that the feed
//! resolves on commit, so ordering and counters never depend on the
//! sender's clock or a read-modify-write.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::{
    Conversation, ConversationMetadata, LastMessage, Message, MessageKind, MessageStatus,
    ModificationType, QuotedMessage, SyncError, UserProfile,
};

const SERVER_VALUE_KEY: &str = ".sv";

/// A value the feed computes at commit time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerValue {
    /// The feed's clock, Unix milliseconds.
    Timestamp,
    /// Atomic add to the currently stored number (missing counts as 0).
    Increment(i64),
}

impl ServerValue {
    /// JSON placeholder for this value.
    pub fn to_json(self) -> Value {
        match self {
            ServerValue::Timestamp => json!({ ".sv": "timestamp" }),
            ServerValue::Increment(by) => json!({ ".sv": { "increment": by } }),
        }
    }

    /// Recognize a placeholder produced by [`ServerValue::to_json`].
    pub fn parse(value: &Value) -> Option<Self> {
        let op = value.as_object()?.get(SERVER_VALUE_KEY)?;
        if op.as_str() == Some("timestamp") {
            return Some(ServerValue::Timestamp);
        }
        op.get("increment")?.as_i64().map(ServerValue::Increment)
    }
}

/// Replace every top-level placeholder in `write` with its committed value.
///
/// `existing` is the document currently stored at the same path.
pub fn resolve_server_values(write: Value, existing: Option<&Value>, now: i64) -> Value {
    let Value::Object(fields) = write else {
        return write;
    };

    let resolved: Map<String, Value> = fields
        .into_iter()
        .map(|(key, value)| {
            let value = match ServerValue::parse(&value) {
                Some(ServerValue::Timestamp) => json!(now),
                Some(ServerValue::Increment(by)) => {
                    let current = existing
                        .and_then(|doc| doc.get(&key))
                        .and_then(Value::as_i64)
                        .unwrap_or(0);
                    json!(current + by)
                }
                None => value,
            };
            (key, value)
        })
        .collect();

    Value::Object(resolved)
}

/// Types that can be decoded from a feed snapshot.
pub trait FromSnapshot: Sized {
    /// Decode the document stored at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::MalformedSnapshot`] if the document does not
    /// have the expected shape.
    fn from_snapshot(path: &str, value: &Value) -> Result<Self, SyncError>;
}

/// Types that can be encoded as a feed snapshot.
pub trait ToSnapshot {
    /// The document as the feed stores it.
    fn to_snapshot(&self) -> Result<Value, SyncError>;
}

fn malformed(path: &str, reason: impl ToString) -> SyncError {
    SyncError::MalformedSnapshot {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

fn parse<W: for<'de> Deserialize<'de>>(path: &str, value: &Value) -> Result<W, SyncError> {
    W::deserialize(value).map_err(|e| malformed(path, e))
}

fn require(path: &str, field: &str, value: String) -> Result<String, SyncError> {
    if value.is_empty() {
        Err(malformed(path, format!("empty `{}`", field)))
    } else {
        Ok(value)
    }
}

fn encode<W: Serialize>(wire: &W) -> Result<Value, SyncError> {
    serde_json::to_value(wire).map_err(|e| SyncError::Encode(e.to_string()))
}

/// User profile as stored under `users/{id}` and inside conversations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireUser {
    /// User id.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Contact email.
    #[serde(default)]
    pub email: String,
    /// Avatar URL.
    #[serde(default)]
    pub photo_url: String,
}

impl From<&UserProfile> for WireUser {
    fn from(user: &UserProfile) -> Self {
        Self {
            id: user.id.to_string(),
            name: user.name.clone(),
            email: user.email.clone(),
            photo_url: user.photo_url.clone(),
        }
    }
}

impl WireUser {
    fn into_profile(self, path: &str) -> Result<UserProfile, SyncError> {
        Ok(UserProfile {
            id: require(path, "id", self.id)?.into(),
            name: self.name,
            email: self.email,
            photo_url: self.photo_url,
        })
    }
}

/// Message document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    /// Message id.
    pub id: String,
    /// Body.
    pub body: String,
    /// Creation time.
    pub timestamp: i64,
    /// Delivery status.
    pub status: MessageStatus,
    /// Content type.
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Reaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reaction: Option<String>,
    /// Author.
    pub sender_id: String,
    /// Owning conversation.
    pub conversation_id: String,
    /// Quoted message id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quoted_message_id: Option<String>,
    /// Quoted message body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quoted_message_body: Option<String>,
    /// Quoted message author.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quoted_message_sender_id: Option<String>,
    /// Quoted message content type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quoted_message_type: Option<MessageKind>,
}

impl From<&Message> for WireMessage {
    fn from(m: &Message) -> Self {
        let quoted = m.quoted.as_ref();
        Self {
            id: m.id.to_string(),
            body: m.body.clone(),
            timestamp: m.timestamp,
            status: m.status,
            kind: m.kind,
            reaction: m.reaction.clone(),
            sender_id: m.sender_id.to_string(),
            conversation_id: m.conversation_id.to_string(),
            quoted_message_id: quoted.map(|q| q.id.to_string()),
            quoted_message_body: quoted.map(|q| q.body.clone()),
            quoted_message_sender_id: quoted.map(|q| q.sender_id.to_string()),
            quoted_message_type: quoted.map(|q| q.kind),
        }
    }
}

impl WireMessage {
    fn into_message(self, path: &str) -> Result<Message, SyncError> {
        // Older clients write empty strings instead of leaving the fields out.
        let quoted = match self.quoted_message_id.filter(|id| !id.is_empty()) {
            Some(id) => Some(QuotedMessage {
                id: id.into(),
                body: self.quoted_message_body.unwrap_or_default(),
                sender_id: self.quoted_message_sender_id.unwrap_or_default().into(),
                kind: self.quoted_message_type.unwrap_or(MessageKind::Text),
            }),
            None => None,
        };

        Ok(Message {
            id: require(path, "id", self.id)?.into(),
            conversation_id: require(path, "conversation_id", self.conversation_id)?.into(),
            sender_id: require(path, "sender_id", self.sender_id)?.into(),
            body: self.body,
            timestamp: self.timestamp,
            status: self.status,
            kind: self.kind,
            reaction: self.reaction.filter(|r| !r.is_empty()),
            quoted,
        })
    }
}

/// Conversation document, one copy per participant index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireConversation {
    /// Conversation id.
    pub id: String,
    /// Participants.
    #[serde(default)]
    pub participants: Vec<WireUser>,
    /// Unread counter of the index owner.
    #[serde(default)]
    pub unread_message_count: u32,
    /// Newest message body.
    #[serde(default)]
    pub last_message: String,
    /// Newest message status.
    pub last_message_status: MessageStatus,
    /// Whether the newest message was read.
    #[serde(default)]
    pub is_last_message_read: bool,
    /// Newest message content type.
    pub last_message_type: MessageKind,
    /// Newest message time.
    pub last_message_creation_time: i64,
    /// Creation time.
    #[serde(default)]
    pub created_at: i64,
}

impl From<&Conversation> for WireConversation {
    fn from(c: &Conversation) -> Self {
        Self {
            id: c.id.to_string(),
            participants: c.participants.iter().map(WireUser::from).collect(),
            unread_message_count: c.unread_message_count,
            last_message: c.last_message.text.clone(),
            last_message_status: c.last_message.status,
            is_last_message_read: c.last_message.is_read,
            last_message_type: c.last_message.kind,
            last_message_creation_time: c.last_message.timestamp,
            created_at: c.created_at,
        }
    }
}

impl WireConversation {
    fn into_conversation(self, path: &str) -> Result<Conversation, SyncError> {
        let participants = self
            .participants
            .into_iter()
            .map(|p| p.into_profile(path))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Conversation {
            id: require(path, "id", self.id)?.into(),
            participants,
            unread_message_count: self.unread_message_count,
            last_message: LastMessage {
                text: self.last_message,
                status: self.last_message_status,
                kind: self.last_message_type,
                timestamp: self.last_message_creation_time,
                is_read: self.is_last_message_read,
            },
            created_at: self.created_at,
        })
    }
}

/// Metadata signal document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMetadata {
    /// Last write time.
    pub last_updated: i64,
    /// Writer.
    #[serde(default)]
    pub updated_by: String,
    /// What changed.
    pub modification_type: ModificationType,
    /// Affected message.
    #[serde(default)]
    pub message_id: String,
    /// First participant typing flag.
    #[serde(default)]
    pub is_first_participant_typing: bool,
    /// Second participant typing flag.
    #[serde(default)]
    pub is_second_participant_typing: bool,
}

impl From<&ConversationMetadata> for WireMetadata {
    fn from(m: &ConversationMetadata) -> Self {
        Self {
            last_updated: m.last_updated,
            updated_by: m.updated_by.to_string(),
            modification_type: m.modification_type,
            message_id: m.message_id.to_string(),
            is_first_participant_typing: m.first_participant_typing,
            is_second_participant_typing: m.second_participant_typing,
        }
    }
}

impl FromSnapshot for Message {
    fn from_snapshot(path: &str, value: &Value) -> Result<Self, SyncError> {
        parse::<WireMessage>(path, value)?.into_message(path)
    }
}

impl FromSnapshot for Conversation {
    fn from_snapshot(path: &str, value: &Value) -> Result<Self, SyncError> {
        parse::<WireConversation>(path, value)?.into_conversation(path)
    }
}

impl FromSnapshot for UserProfile {
    fn from_snapshot(path: &str, value: &Value) -> Result<Self, SyncError> {
        parse::<WireUser>(path, value)?.into_profile(path)
    }
}

impl FromSnapshot for ConversationMetadata {
    fn from_snapshot(path: &str, value: &Value) -> Result<Self, SyncError> {
        let wire = parse::<WireMetadata>(path, value)?;
        Ok(ConversationMetadata {
            last_updated: wire.last_updated,
            updated_by: wire.updated_by.into(),
            modification_type: wire.modification_type,
            message_id: wire.message_id.into(),
            first_participant_typing: wire.is_first_participant_typing,
            second_participant_typing: wire.is_second_participant_typing,
        })
    }
}

impl ToSnapshot for Message {
    fn to_snapshot(&self) -> Result<Value, SyncError> {
        encode(&WireMessage::from(self))
    }
}

impl ToSnapshot for Conversation {
    fn to_snapshot(&self) -> Result<Value, SyncError> {
        encode(&WireConversation::from(self))
    }
}

impl ToSnapshot for UserProfile {
    fn to_snapshot(&self) -> Result<Value, SyncError> {
        encode(&WireUser::from(self))
    }
}

impl ToSnapshot for ConversationMetadata {
    fn to_snapshot(&self) -> Result<Value, SyncError> {
        encode(&WireMetadata::from(self))
    }
}

/// The write a sender issues for a new message.
///
/// The stored copy is `sent` and ordered by the feed's clock.
pub fn outgoing_message(message: &Message) -> Result<Value, SyncError> {
    let mut wire = WireMessage::from(message);
    wire.status = MessageStatus::Sent;
    let mut value = encode(&wire)?;
    value["timestamp"] = ServerValue::Timestamp.to_json();
    Ok(value)
}

/// The write a sender issues into each participant's conversation index.
pub fn outgoing_conversation(conversation: &Conversation) -> Result<Value, SyncError> {
    let mut wire = WireConversation::from(conversation);
    wire.last_message_status = MessageStatus::Read;
    let mut value = encode(&wire)?;
    value["unread_message_count"] = ServerValue::Increment(1).to_json();
    value["last_message_creation_time"] = ServerValue::Timestamp.to_json();
    Ok(value)
}
