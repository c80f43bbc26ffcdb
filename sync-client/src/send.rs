//! Send pipeline: optimistic local write, then the remote write, then a
//! compensating failed-status write if the remote write did not land.

use crate::error::{FeedError, StoreResult};
use crate::remote::RemoteFeed;
use crate::store::LocalStore;
use galaxy_sync_types::{
    Conversation, ConversationId, Message, MessageId, MessageStatus, QuotedMessage, UserProfile,
};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// How a send ended.
#[derive(Debug, Clone)]
pub enum SendOutcome {
    /// The feed accepted the message.
    Sent,
    /// The feed write failed; the message is cached with status `failed`.
    Failed(FeedError),
}

impl SendOutcome {
    /// Whether the feed accepted the message.
    pub fn is_sent(&self) -> bool {
        matches!(self, SendOutcome::Sent)
    }
}

/// Result of [`SendPipeline::send_text`].
#[derive(Debug, Clone)]
pub struct SendReceipt {
    /// Id of the composed message.
    pub message_id: MessageId,
    /// How the send ended.
    pub outcome: SendOutcome,
}

/// Sends messages so the UI sees them before the network answers.
pub struct SendPipeline {
    store: Arc<dyn LocalStore>,
    feed: Arc<dyn RemoteFeed>,
}

impl SendPipeline {
    /// Create a pipeline over a store and a feed.
    pub fn new(store: Arc<dyn LocalStore>, feed: Arc<dyn RemoteFeed>) -> Self {
        Self { store, feed }
    }

    /// Send `message` with `conversation` as its pending summary.
    ///
    /// The message (status `sending`) and the summary are cached before the
    /// feed is contacted. If the feed write fails both are rewritten with
    /// status `failed`; nothing is deleted or retried.
    ///
    /// # Errors
    ///
    /// Only local store failures are returned. A feed failure is reported
    /// as [`SendOutcome::Failed`].
    pub async fn send(
        &self,
        message: Message,
        conversation: Conversation,
    ) -> StoreResult<SendOutcome> {
        let message = message.with_status(MessageStatus::Sending);
        let conversation = conversation.with_last_status(MessageStatus::Sending);

        self.store.upsert_message(&message).await?;
        self.store.upsert_conversation(&conversation).await?;
        tracing::debug!(message = %message.id, conversation = %conversation.id, "Cached pending message");

        match self.feed.send_message(&message, &conversation).await {
            Ok(()) => {
                tracing::debug!(message = %message.id, "Message sent");
                Ok(SendOutcome::Sent)
            }
            Err(e) => {
                tracing::error!(
                    transient = e.is_transient(),
                    "Failed to send message {}: {}",
                    message.id,
                    e
                );
                self.store
                    .upsert_message(&message.with_status(MessageStatus::Failed))
                    .await?;
                self.store
                    .upsert_conversation(&conversation.with_last_status(MessageStatus::Failed))
                    .await?;
                Ok(SendOutcome::Failed(e))
            }
        }
    }

    /// Compose a text message from `sender` to `peer` and send it.
    ///
    /// The summary is derived from the cached conversation when there is
    /// one; otherwise a new conversation with both participants is started.
    pub async fn send_text(
        &self,
        conversation_id: ConversationId,
        body: &str,
        sender: &UserProfile,
        peer: &UserProfile,
        quoted: Option<QuotedMessage>,
    ) -> StoreResult<SendReceipt> {
        let now = now_millis();
        let mut message =
            Message::outgoing_text(conversation_id.clone(), sender.id.clone(), body, now);
        message.quoted = quoted;

        let conversation = match self.store.get_conversation(&conversation_id).await? {
            Some(cached) => cached.with_last_message(&message),
            None => Conversation::started_by(&message, vec![sender.clone(), peer.clone()], now),
        };

        let message_id = message.id.clone();
        let outcome = self.send(message, conversation).await?;
        Ok(SendReceipt {
            message_id,
            outcome,
        })
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryFeed;
    use crate::store::SqliteStore;
    use galaxy_sync_types::{paths, MessageKind, UserId};

    fn profile(id: &str) -> UserProfile {
        UserProfile {
            id: UserId::from(id),
            name: id.to_uppercase(),
            email: format!("{id}@example.com"),
            photo_url: String::new(),
        }
    }

    async fn setup() -> (Arc<SqliteStore>, MemoryFeed, SendPipeline) {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let feed = MemoryFeed::new();
        let pipeline = SendPipeline::new(store.clone(), Arc::new(feed.clone()));
        (store, feed, pipeline)
    }

    #[tokio::test]
    async fn successful_send_reaches_feed_and_cache() {
        let (store, feed, pipeline) = setup().await;
        feed.set_server_time(5_000);

        let receipt = pipeline
            .send_text("a_b".into(), "hello", &profile("a"), &profile("b"), None)
            .await
            .unwrap();

        assert!(receipt.outcome.is_sent());
        let cached = store.get_message(&receipt.message_id).await.unwrap().unwrap();
        assert_eq!(cached.status, MessageStatus::Sending);
        assert_eq!(cached.kind, MessageKind::Text);

        let remote = feed
            .document(&paths::message_entry(&"a_b".into(), &receipt.message_id))
            .unwrap();
        assert_eq!(remote["status"], "sent");
        assert_eq!(remote["timestamp"], 5_000);
        for owner in ["a", "b"] {
            let summary = feed
                .document(&paths::conversation_entry(&owner.into(), &"a_b".into()))
                .unwrap();
            assert_eq!(summary["unread_message_count"], 1);
            assert_eq!(summary["last_message"], "hello");
        }
    }

    #[tokio::test]
    async fn failed_send_marks_message_and_summary_failed() {
        let (store, feed, pipeline) = setup().await;
        feed.fail_next_send(FeedError::Unavailable("offline".into()));

        let receipt = pipeline
            .send_text("a_b".into(), "hello", &profile("a"), &profile("b"), None)
            .await
            .unwrap();

        assert!(matches!(receipt.outcome, SendOutcome::Failed(_)));
        let cached = store.get_message(&receipt.message_id).await.unwrap().unwrap();
        assert_eq!(cached.status, MessageStatus::Failed);
        let summary = store.get_conversation(&"a_b".into()).await.unwrap().unwrap();
        assert_eq!(summary.last_message.status, MessageStatus::Failed);
        assert_eq!(summary.last_message.text, "hello");
        assert!(feed
            .document(&paths::message_entry(&"a_b".into(), &receipt.message_id))
            .is_none());
    }

    #[tokio::test]
    async fn pending_state_is_cached_before_the_feed_answers() {
        let (store, feed, pipeline) = setup().await;
        feed.fail_next_send(FeedError::Rejected("denied".into()));
        let before = store.metrics().transactions();

        pipeline
            .send_text("a_b".into(), "hi", &profile("a"), &profile("b"), None)
            .await
            .unwrap();

        // Two optimistic writes, two compensating writes.
        assert_eq!(store.metrics().transactions() - before, 4);
    }

    #[tokio::test]
    async fn new_conversation_has_both_participants() {
        let (store, _feed, pipeline) = setup().await;

        pipeline
            .send_text("a_b".into(), "first", &profile("a"), &profile("b"), None)
            .await
            .unwrap();

        let summary = store.get_conversation(&"a_b".into()).await.unwrap().unwrap();
        let ids: Vec<_> = summary.participants.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(summary.unread_message_count, 0);
    }

    #[tokio::test]
    async fn cached_conversation_keeps_its_participants() {
        let (store, _feed, pipeline) = setup().await;
        pipeline
            .send_text("a_b".into(), "first", &profile("a"), &profile("b"), None)
            .await
            .unwrap();
        let mut cached = store.get_conversation(&"a_b".into()).await.unwrap().unwrap();
        cached.participants[1].name = "Bobby".into();
        cached.created_at = 42;
        store.upsert_conversation(&cached).await.unwrap();

        pipeline
            .send_text("a_b".into(), "second", &profile("a"), &profile("b"), None)
            .await
            .unwrap();

        let summary = store.get_conversation(&"a_b".into()).await.unwrap().unwrap();
        assert_eq!(summary.last_message.text, "second");
        assert_eq!(summary.participants[1].name, "Bobby");
        assert_eq!(summary.created_at, 42);
    }

    #[tokio::test]
    async fn quoted_reply_is_carried() {
        let (store, _feed, pipeline) = setup().await;
        let quoted = QuotedMessage {
            id: "m0".into(),
            body: "original".into(),
            sender_id: "b".into(),
            kind: MessageKind::Text,
        };

        let receipt = pipeline
            .send_text("a_b".into(), "reply", &profile("a"), &profile("b"), Some(quoted.clone()))
            .await
            .unwrap();

        let cached = store.get_message(&receipt.message_id).await.unwrap().unwrap();
        assert_eq!(cached.quoted, Some(quoted));
    }
}
