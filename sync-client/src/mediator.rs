//! Page-fill mediator: backfills the local store from the remote feed.
//!
//! Invoked by a message pager when its local window needs data the cache
//! does not have yet:
//!
//! | Load | Remote call | Local write | Outcome |
//! |---|---|---|---|
//! | Refresh | newest page | replace the conversation's rows | more / exhausted if empty |
//! | Append | page ending at the oldest loaded message | insert | more / exhausted if nothing new |
//! | Prepend | none | none | exhausted |
//!
//! Fetch failures come back as [`LoadError::Retryable`]; the caller decides
//! when to retry.

use crate::error::LoadError;
use crate::pager::RemoteFill;
use crate::remote::RemoteFeed;
use crate::store::LocalStore;
use async_trait::async_trait;
use galaxy_sync_core::cursor::{oldest_boundary, trim_boundary};
use galaxy_sync_core::{AppendCursor, LoadOutcome, LoadType};
use galaxy_sync_types::{ConversationId, Message};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Backfills one conversation's messages.
pub struct PageFillMediator {
    store: Arc<dyn LocalStore>,
    feed: Arc<dyn RemoteFeed>,
    conversation: ConversationId,
    remote_page_size: usize,
    cursor: Mutex<AppendCursor>,
}

impl std::fmt::Debug for PageFillMediator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageFillMediator")
            .field("conversation", &self.conversation)
            .field("remote_page_size", &self.remote_page_size)
            .finish_non_exhaustive()
    }
}

impl PageFillMediator {
    /// Create a mediator for `conversation`.
    pub fn new(
        store: Arc<dyn LocalStore>,
        feed: Arc<dyn RemoteFeed>,
        conversation: ConversationId,
        remote_page_size: usize,
    ) -> Self {
        Self {
            store,
            feed,
            conversation,
            remote_page_size: remote_page_size.max(1),
            cursor: Mutex::new(AppendCursor::new()),
        }
    }

    /// Conversation this mediator fills.
    pub fn conversation(&self) -> &ConversationId {
        &self.conversation
    }

    /// Run one page-fill.
    ///
    /// `loaded` is what the pager has materialized so far, newest first.
    pub async fn load(&self, load: LoadType, loaded: &[Message]) -> Result<LoadOutcome, LoadError> {
        match load {
            LoadType::Refresh => self.refresh().await,
            LoadType::Append => self.append(loaded).await,
            // Newer messages arrive through live sync.
            LoadType::Prepend => Ok(LoadOutcome::Exhausted),
        }
    }

    async fn refresh(&self) -> Result<LoadOutcome, LoadError> {
        let mut cursor = self.cursor.lock().await;
        cursor.reset();

        let fetched = self
            .feed
            .fetch_messages(&self.conversation, self.remote_page_size, None)
            .await?;

        if fetched.is_empty() {
            tracing::debug!(conversation = %self.conversation, "Refresh: remote is empty");
            return Ok(LoadOutcome::Exhausted);
        }

        self.store
            .replace_messages(&self.conversation, &fetched)
            .await?;
        tracing::debug!(
            conversation = %self.conversation,
            count = fetched.len(),
            "Refresh: replaced cached messages"
        );
        Ok(LoadOutcome::MoreMayExist)
    }

    async fn append(&self, loaded: &[Message]) -> Result<LoadOutcome, LoadError> {
        let Some(boundary) = oldest_boundary(loaded) else {
            return Ok(LoadOutcome::Exhausted);
        };

        // Held across the fetch so concurrent appends from one boundary
        // collapse into a single remote call.
        let mut cursor = self.cursor.lock().await;
        if !cursor.should_fetch(&boundary) {
            return Ok(LoadOutcome::Exhausted);
        }

        // The boundary row comes back too and is trimmed, so ask for one extra.
        let fetched = self
            .feed
            .fetch_messages(&self.conversation, self.remote_page_size + 1, Some(&boundary))
            .await?;
        let fresh = trim_boundary(fetched, &boundary);

        if fresh.is_empty() {
            tracing::debug!(
                conversation = %self.conversation,
                boundary = boundary.timestamp,
                "Append: nothing older"
            );
            cursor.mark_exhausted(boundary);
            return Ok(LoadOutcome::Exhausted);
        }

        self.store.upsert_messages(&fresh).await?;
        cursor.mark_progress();
        tracing::debug!(
            conversation = %self.conversation,
            count = fresh.len(),
            "Append: cached older messages"
        );
        Ok(LoadOutcome::MoreMayExist)
    }
}

#[async_trait]
impl RemoteFill<Message> for PageFillMediator {
    async fn fill(&self, load: LoadType, loaded: &[Message]) -> Result<LoadOutcome, LoadError> {
        self.load(load, loaded).await
    }
}
