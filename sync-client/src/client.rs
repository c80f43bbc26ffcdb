//! ChatSync - the main interface for galaxy-sync.
//!
//! This module provides [`ChatSync`], the API a chat UI talks to. It wires
//! the local store, the remote feed and the sync components together.
//!
//! # Architecture
//!
//! ```text
//!              ┌── Pager ── PageFillMediator ──┐
//! UI → ChatSync├── LiveSyncCoordinator ────────┼→ RemoteFeed
//!              └── SendPipeline ───────────────┘
//!                          ↓
//!                      LocalStore (rendered from)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use galaxy_sync_client::{ChatSync, MemoryFeed, SyncConfig};
//!
//! let sync = ChatSync::open(SyncConfig::default(), Arc::new(MemoryFeed::new())).await?;
//! sync.attach_conversations("alice".into()).await?;
//!
//! let pager = sync.messages_pager("alice_bob".into());
//! pager.refresh().await?;
//! let first_page = pager.snapshot().items;
//! ```

use std::sync::Arc;

use galaxy_sync_core::Transition;
use galaxy_sync_types::{
    Conversation, ConversationId, Message, QuotedMessage, UserId, UserProfile,
};

use crate::config::SyncConfig;
use crate::error::ClientError;
use crate::live::LiveSyncCoordinator;
use crate::mediator::PageFillMediator;
use crate::pager::{ConversationSource, MessageSource, Pager};
use crate::remote::RemoteFeed;
use crate::send::{SendOutcome, SendPipeline, SendReceipt};
use crate::store::{LocalStore, SqliteStore};

/// Offline-first chat sync client.
pub struct ChatSync {
    config: SyncConfig,
    store: Arc<dyn LocalStore>,
    feed: Arc<dyn RemoteFeed>,
    live: LiveSyncCoordinator,
    sender: SendPipeline,
}

impl ChatSync {
    /// Open the SQLite cache named in `config` and connect it to `feed`.
    pub async fn open(config: SyncConfig, feed: Arc<dyn RemoteFeed>) -> Result<Self, ClientError> {
        let store = SqliteStore::open(&config.storage.database).await?;
        tracing::info!("Opened local cache at {}", config.storage.database.display());
        Ok(Self::with_store(config, Arc::new(store), feed))
    }

    /// Build a client over an already opened store.
    pub fn with_store(
        config: SyncConfig,
        store: Arc<dyn LocalStore>,
        feed: Arc<dyn RemoteFeed>,
    ) -> Self {
        let live = LiveSyncCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&feed),
            config.live.tail_limit,
            config.batch_interval(),
        );
        let sender = SendPipeline::new(Arc::clone(&store), Arc::clone(&feed));
        Self {
            config,
            store,
            feed,
            live,
            sender,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The local cache.
    pub fn store(&self) -> &Arc<dyn LocalStore> {
        &self.store
    }

    /// The remote feed.
    pub fn feed(&self) -> &Arc<dyn RemoteFeed> {
        &self.feed
    }

    /// Id of the direct conversation between two users.
    pub fn conversation_id(a: &UserId, b: &UserId) -> Result<ConversationId, ClientError> {
        Ok(ConversationId::for_pair(a, b)?)
    }

    /// Pager over a conversation's messages, filled from the feed on demand.
    pub fn messages_pager(&self, conversation: ConversationId) -> Pager<MessageSource> {
        let paging = self.config.message_paging();
        let mediator = PageFillMediator::new(
            Arc::clone(&self.store),
            Arc::clone(&self.feed),
            conversation.clone(),
            paging.remote_page_size,
        );
        Pager::new(
            MessageSource::new(Arc::clone(&self.store), conversation),
            Some(Arc::new(mediator)),
            paging,
        )
    }

    /// Pager over the cached conversation list.
    ///
    /// The list is local only; keep it fresh with
    /// [`attach_conversations`](Self::attach_conversations).
    pub fn conversations_pager(&self) -> Pager<ConversationSource> {
        Pager::new(
            ConversationSource::new(Arc::clone(&self.store)),
            None,
            self.config.conversation_paging(),
        )
    }

    /// Send a prepared message with its pending conversation summary.
    pub async fn send(
        &self,
        message: Message,
        conversation: Conversation,
    ) -> Result<SendOutcome, ClientError> {
        Ok(self.sender.send(message, conversation).await?)
    }

    /// Send a text message from `sender` to `peer` in their direct
    /// conversation.
    pub async fn send_text(
        &self,
        sender: &UserProfile,
        peer: &UserProfile,
        body: &str,
        quoted: Option<QuotedMessage>,
    ) -> Result<SendReceipt, ClientError> {
        let conversation = ConversationId::for_pair(&sender.id, &peer.id)?;
        Ok(self
            .sender
            .send_text(conversation, body, sender, peer, quoted)
            .await?)
    }

    /// Follow a conversation room.
    pub async fn attach_room(
        &self,
        conversation: ConversationId,
    ) -> Result<Transition<ConversationId>, ClientError> {
        Ok(self.live.attach_room(conversation).await?)
    }

    /// Stop following the current room.
    pub async fn detach_room(&self) -> Transition<ConversationId> {
        self.live.detach_room().await
    }

    /// Follow `user`'s conversation list.
    pub async fn attach_conversations(
        &self,
        user: UserId,
    ) -> Result<Transition<UserId>, ClientError> {
        Ok(self.live.attach_conversations(user).await?)
    }

    /// Stop following the conversation list.
    pub async fn detach_conversations(&self) -> Transition<UserId> {
        self.live.detach_conversations().await
    }

    /// User directory, ordered by name, without `me`.
    pub async fn fetch_contacts(&self, me: &UserId) -> Result<Vec<UserProfile>, ClientError> {
        let mut users = self.feed.fetch_users().await?;
        users.retain(|user| &user.id != me);
        Ok(users)
    }

    /// Detach every scope and wipe the local cache.
    pub async fn sign_out(&self) -> Result<(), ClientError> {
        self.live.detach_all().await;
        self.store.clear_all().await?;
        tracing::info!("Signed out, local cache cleared");
        Ok(())
    }
}

impl std::fmt::Debug for ChatSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSync")
            .field("config", &self.config)
            .field("live", &self.live)
            .finish_non_exhaustive()
    }
}
