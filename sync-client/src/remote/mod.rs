//! Remote feed abstraction for sync-client.
//!
//! The remote feed is the source of truth: a push-based document tree (see
//! [`galaxy_sync_types::paths`]) that answers one-shot fetches and keeps
//! subscriptions open, pushing tagged child events as documents change.
//!
//! # Design
//!
//! - Fetches are async and return decoded model values.
//! - Subscriptions are synchronous to open and close. Events arrive on an
//!   ordered channel with raw JSON payloads; subscribers decode them with
//!   [`FromSnapshot`](galaxy_sync_types::wire::FromSnapshot) at the boundary.
//! - Writes carry server placeholders the feed resolves on commit.
//!
//! # Example
//!
//! ```ignore
//! let feed = MemoryFeed::new();
//! let mut sub = feed.subscribe(FeedQuery::Metadata { conversation })?;
//! while let Some(event) = sub.events.recv().await {
//!     // decode event.payload
//! }
//! feed.unsubscribe(sub.id);
//! ```

mod memory;

pub use memory::MemoryFeed;

use crate::error::FeedResult;
use async_trait::async_trait;
use galaxy_sync_core::Boundary;
use galaxy_sync_types::{paths, Conversation, ConversationId, Message, MessageId, UserId, UserProfile};
use serde_json::Value;
use std::fmt;
use tokio::sync::mpsc;

/// Identifies an open subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// What a subscription listens to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedQuery {
    /// Child events for the newest `limit` messages of a conversation,
    /// ordered by timestamp.
    MessageTail {
        /// Conversation whose stream is followed.
        conversation: ConversationId,
        /// How many of the newest messages the window covers.
        limit: usize,
    },
    /// Value events for a conversation's metadata signal.
    Metadata {
        /// Conversation whose signal is followed.
        conversation: ConversationId,
    },
    /// Child events for a user's conversation index, ordered by last
    /// message time.
    ConversationIndex {
        /// Index owner.
        user: UserId,
    },
}

impl FeedQuery {
    /// Path the query is anchored at.
    pub fn path(&self) -> String {
        match self {
            FeedQuery::MessageTail { conversation, .. } => paths::message_stream(conversation),
            FeedQuery::Metadata { conversation } => paths::metadata(conversation),
            FeedQuery::ConversationIndex { user } => paths::conversation_index(user),
        }
    }

    /// Whether the query listens to the document at its path rather than
    /// to its children.
    pub fn is_value_query(&self) -> bool {
        matches!(self, FeedQuery::Metadata { .. })
    }
}

/// Kind of a pushed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A child entered the query window.
    Added,
    /// A child (or the watched value) changed.
    Changed,
    /// A child left the query window (or the watched value was deleted).
    Removed,
}

/// One pushed event.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEvent {
    /// What happened.
    pub kind: EventKind,
    /// Last path segment of the affected document.
    pub key: String,
    /// The document after the change (before it, for `Removed`).
    pub payload: Value,
}

/// An open subscription.
#[derive(Debug)]
pub struct Subscription {
    /// Handle for [`RemoteFeed::unsubscribe`].
    pub id: ListenerId,
    /// Path the subscription is anchored at.
    pub path: String,
    /// Events in the order the feed committed them.
    pub events: mpsc::UnboundedReceiver<FeedEvent>,
}

/// Remote feed contract.
///
/// Implementations handle the concrete transport (a hosted realtime
/// database, the in-memory feed for tests, etc).
#[async_trait]
pub trait RemoteFeed: Send + Sync {
    /// Up to `limit` messages of a conversation, newest first.
    ///
    /// With `end_at`, only messages at or before the boundary in
    /// `(timestamp, id)` order are considered; the boundary message itself
    /// is included if it exists.
    async fn fetch_messages(
        &self,
        conversation: &ConversationId,
        limit: usize,
        end_at: Option<&Boundary>,
    ) -> FeedResult<Vec<Message>>;

    /// A single message by id.
    async fn fetch_message(
        &self,
        conversation: &ConversationId,
        id: &MessageId,
    ) -> FeedResult<Option<Message>>;

    /// Write `message` into its stream and `conversation` into every
    /// participant's index.
    async fn send_message(&self, message: &Message, conversation: &Conversation) -> FeedResult<()>;

    /// All user profiles, ordered by name.
    async fn fetch_users(&self) -> FeedResult<Vec<UserProfile>>;

    /// Open a subscription. The current state is delivered first, as if it
    /// had just been written.
    fn subscribe(&self, query: FeedQuery) -> FeedResult<Subscription>;

    /// Close a subscription. Unknown ids are ignored.
    fn unsubscribe(&self, id: ListenerId);
}
