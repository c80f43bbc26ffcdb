//! Local store for sync-client.
//!
//! The persistent cache the UI renders from. Rows are keyed by id and every
//! write replaces the whole row, so independent writers (tail subscription,
//! metadata re-fetch, send pipeline) never need a lock: the last committed
//! write for an id wins. Every multi-row mutation is one transaction.
//!
//! Committed mutations are announced on a broadcast channel so pagers can
//! re-read their window.

mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::StoreResult;
use async_trait::async_trait;
use galaxy_sync_types::{Conversation, ConversationId, Message, MessageId};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

/// What a committed mutation touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    /// Messages of one conversation.
    Messages(ConversationId),
    /// The conversation list.
    Conversations,
    /// Everything (sign-out clear).
    All,
}

impl StoreChange {
    /// Whether a pager over `conversation`'s messages must reload.
    pub fn affects_messages(&self, conversation: &ConversationId) -> bool {
        match self {
            StoreChange::Messages(id) => id == conversation,
            StoreChange::Conversations => false,
            StoreChange::All => true,
        }
    }

    /// Whether a pager over the conversation list must reload.
    pub fn affects_conversations(&self) -> bool {
        matches!(self, StoreChange::Conversations | StoreChange::All)
    }
}

/// Write counters, monotonic since the store was opened.
#[derive(Debug, Default)]
pub struct StoreMetrics {
    /// Committed write transactions.
    pub transactions: AtomicU64,
    /// Message rows written (inserted or replaced).
    pub messages_written: AtomicU64,
    /// Conversation rows written (inserted or replaced).
    pub conversations_written: AtomicU64,
    /// Rows deleted from either table.
    pub rows_deleted: AtomicU64,
}

impl StoreMetrics {
    /// Committed write transactions so far.
    pub fn transactions(&self) -> u64 {
        self.transactions.load(Ordering::Relaxed)
    }

    pub(crate) fn record_commit(&self) {
        self.transactions.fetch_add(1, Ordering::Relaxed);
    }
}

/// Trait for local cache backends.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Insert or replace one message.
    async fn upsert_message(&self, message: &Message) -> StoreResult<()>;

    /// Insert or replace several messages in one transaction.
    async fn upsert_messages(&self, messages: &[Message]) -> StoreResult<()>;

    /// Delete a conversation's messages and insert `messages`, atomically.
    async fn replace_messages(
        &self,
        conversation: &ConversationId,
        messages: &[Message],
    ) -> StoreResult<()>;

    /// Delete one message. Returns whether a row existed.
    async fn delete_message(&self, id: &MessageId) -> StoreResult<bool>;

    /// Delete all messages of a conversation. Returns the number deleted.
    async fn delete_messages_for(&self, conversation: &ConversationId) -> StoreResult<u64>;

    /// Get a message by id.
    async fn get_message(&self, id: &MessageId) -> StoreResult<Option<Message>>;

    /// A page of a conversation's messages, newest first.
    ///
    /// Ordered by timestamp descending, ties broken by id descending.
    async fn messages_page(
        &self,
        conversation: &ConversationId,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<Message>>;

    /// Insert or replace one conversation.
    async fn upsert_conversation(&self, conversation: &Conversation) -> StoreResult<()>;

    /// Insert or replace several conversations in one transaction.
    async fn upsert_conversations(&self, conversations: &[Conversation]) -> StoreResult<()>;

    /// Delete one conversation. Returns whether a row existed.
    async fn delete_conversation(&self, id: &ConversationId) -> StoreResult<bool>;

    /// Get a conversation by id.
    async fn get_conversation(&self, id: &ConversationId) -> StoreResult<Option<Conversation>>;

    /// A page of conversations, most recent activity first.
    async fn conversations_page(&self, limit: usize, offset: usize)
        -> StoreResult<Vec<Conversation>>;

    /// Delete every message and conversation in one transaction.
    async fn clear_all(&self) -> StoreResult<()>;

    /// Subscribe to committed mutations.
    fn changes(&self) -> broadcast::Receiver<StoreChange>;

    /// Write counters.
    fn metrics(&self) -> &StoreMetrics;
}
