//! Pagination controller.
//!
//! A [`Pager`] renders from the local store and asks a [`RemoteFill`] (the
//! page-fill mediator, for message lists) for more when the cache runs dry.
//! Callers observe a [`PageSnapshot`] through a watch channel and drive the
//! pager explicitly; it never schedules work on its own, except reloads
//! tied to store changes via [`Pager::spawn_invalidation`].
//!
//! The materialized window is always re-read from the top (`LIMIT n OFFSET
//! 0`), so rows inserted by live sync while paging never show up twice.

use crate::error::{LoadError, StoreResult};
use crate::store::{LocalStore, StoreChange};
use async_trait::async_trait;
use galaxy_sync_core::{LoadOutcome, LoadType, PagingConfig, RetryBackoff};
use galaxy_sync_types::{Conversation, ConversationId, Message};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;

/// Where a pager reads its rows from.
#[async_trait]
pub trait PageSource: Send + Sync + 'static {
    /// Row type.
    type Item: Clone + Send + Sync + 'static;

    /// Rows `offset..offset + limit` in display order.
    async fn load_page(&self, limit: usize, offset: usize) -> StoreResult<Vec<Self::Item>>;

    /// Committed store mutations.
    fn changes(&self) -> broadcast::Receiver<StoreChange>;

    /// Whether `change` can alter what this source returns.
    fn is_affected_by(&self, change: &StoreChange) -> bool;
}

/// Something that can write more rows into the local store on demand.
#[async_trait]
pub trait RemoteFill<T>: Send + Sync {
    /// Run one page-fill given the currently materialized rows.
    async fn fill(&self, load: LoadType, loaded: &[T]) -> Result<LoadOutcome, LoadError>;
}

/// Messages of one conversation, newest first.
#[derive(Clone)]
pub struct MessageSource {
    store: Arc<dyn LocalStore>,
    conversation: ConversationId,
}

impl MessageSource {
    /// Source over `conversation`'s cached messages.
    pub fn new(store: Arc<dyn LocalStore>, conversation: ConversationId) -> Self {
        Self {
            store,
            conversation,
        }
    }
}

#[async_trait]
impl PageSource for MessageSource {
    type Item = Message;

    async fn load_page(&self, limit: usize, offset: usize) -> StoreResult<Vec<Message>> {
        self.store
            .messages_page(&self.conversation, limit, offset)
            .await
    }

    fn changes(&self) -> broadcast::Receiver<StoreChange> {
        self.store.changes()
    }

    fn is_affected_by(&self, change: &StoreChange) -> bool {
        change.affects_messages(&self.conversation)
    }
}

/// The conversation list, most recent first.
#[derive(Clone)]
pub struct ConversationSource {
    store: Arc<dyn LocalStore>,
}

impl ConversationSource {
    /// Source over the cached conversation list.
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl PageSource for ConversationSource {
    type Item = Conversation;

    async fn load_page(&self, limit: usize, offset: usize) -> StoreResult<Vec<Conversation>> {
        self.store.conversations_page(limit, offset).await
    }

    fn changes(&self) -> broadcast::Receiver<StoreChange> {
        self.store.changes()
    }

    fn is_affected_by(&self, change: &StoreChange) -> bool {
        change.affects_conversations()
    }
}

/// Progress of the most recent load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    /// Nothing in flight.
    Idle,
    /// A load is running.
    Loading,
    /// The last load failed; [`Pager::retry`] resubmits it.
    Error {
        /// What went wrong.
        message: String,
        /// Suggested wait before retrying.
        retry_after: Duration,
    },
}

/// What observers see.
#[derive(Debug, Clone, PartialEq)]
pub struct PageSnapshot<T> {
    /// Materialized rows in display order.
    pub items: Vec<T>,
    /// Progress of the last load.
    pub load_state: LoadState,
    /// Whether no more rows exist beyond `items`.
    pub end_reached: bool,
}

impl<T> PageSnapshot<T> {
    fn empty() -> Self {
        Self {
            items: Vec::new(),
            load_state: LoadState::Idle,
            end_reached: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingLoad {
    Refresh,
    LoadMore,
}

struct PagerState<T> {
    items: Vec<T>,
    end_reached: bool,
    backoff: RetryBackoff,
    failed: Option<PendingLoad>,
}

struct PagerInner<S: PageSource> {
    source: S,
    fill: Option<Arc<dyn RemoteFill<S::Item>>>,
    config: PagingConfig,
    state: Mutex<PagerState<S::Item>>,
    snapshot: watch::Sender<PageSnapshot<S::Item>>,
}

/// Lazily loaded, restartable, ordered view over a [`PageSource`].
///
/// Cloning is cheap; clones share state. Loads are serialized.
pub struct Pager<S: PageSource> {
    inner: Arc<PagerInner<S>>,
}

impl<S: PageSource> Clone for Pager<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: PageSource> Pager<S> {
    /// Create a pager. With `fill`, a short local window triggers a remote
    /// page-fill before the end is reported.
    pub fn new(
        source: S,
        fill: Option<Arc<dyn RemoteFill<S::Item>>>,
        config: PagingConfig,
    ) -> Self {
        let (snapshot, _) = watch::channel(PageSnapshot::empty());
        Self {
            inner: Arc::new(PagerInner {
                source,
                fill,
                config,
                state: Mutex::new(PagerState {
                    items: Vec::new(),
                    end_reached: false,
                    backoff: RetryBackoff::new(),
                    failed: None,
                }),
                snapshot,
            }),
        }
    }

    /// Observe snapshots. The receiver starts at the current one.
    pub fn observe(&self) -> watch::Receiver<PageSnapshot<S::Item>> {
        self.inner.snapshot.subscribe()
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> PageSnapshot<S::Item> {
        self.inner.snapshot.borrow().clone()
    }

    /// Drop everything and load from the start.
    pub async fn refresh(&self) -> Result<(), LoadError> {
        let mut state = self.inner.state.lock().await;
        self.run(&mut state, PendingLoad::Refresh).await
    }

    /// Load the next page. No-op once the end is reached.
    pub async fn load_more(&self) -> Result<(), LoadError> {
        let mut state = self.inner.state.lock().await;
        self.run(&mut state, PendingLoad::LoadMore).await
    }

    /// Resubmit the load that failed last. No-op if nothing failed.
    pub async fn retry(&self) -> Result<(), LoadError> {
        let mut state = self.inner.state.lock().await;
        match state.failed {
            Some(pending) => self.run(&mut state, pending).await,
            None => Ok(()),
        }
    }

    /// Re-read the materialized window after a store change.
    pub async fn reload(&self) -> Result<(), LoadError> {
        let mut state = self.inner.state.lock().await;
        let len = state.items.len().max(self.inner.config.page_size);
        let items = self.inner.source.load_page(len, 0).await?;
        state.items = items;
        self.publish(&state, self.current_load_state());
        Ok(())
    }

    /// Reload whenever the store commits a change this pager shows.
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn_invalidation(&self) -> JoinHandle<()> {
        let pager = self.clone();
        let mut changes = self.inner.source.changes();

        tokio::spawn(async move {
            loop {
                let stale = match changes.recv().await {
                    Ok(change) => pager.inner.source.is_affected_by(&change),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Pager lagged behind store changes");
                        true
                    }
                    Err(RecvError::Closed) => break,
                };
                if stale {
                    if let Err(e) = pager.reload().await {
                        tracing::warn!("Pager reload failed: {}", e);
                    }
                }
            }
        })
    }

    fn current_load_state(&self) -> LoadState {
        self.inner.snapshot.borrow().load_state.clone()
    }

    fn publish(&self, state: &PagerState<S::Item>, load_state: LoadState) {
        self.inner.snapshot.send_replace(PageSnapshot {
            items: state.items.clone(),
            load_state,
            end_reached: state.end_reached,
        });
    }

    async fn run(
        &self,
        state: &mut PagerState<S::Item>,
        load: PendingLoad,
    ) -> Result<(), LoadError> {
        if load == PendingLoad::LoadMore && state.end_reached {
            return Ok(());
        }

        self.publish(state, LoadState::Loading);
        let result = match load {
            PendingLoad::Refresh => self.do_refresh(state).await,
            PendingLoad::LoadMore => self.do_load_more(state).await,
        };

        match result {
            Ok(()) => {
                state.backoff.reset();
                state.failed = None;
                self.publish(state, LoadState::Idle);
                Ok(())
            }
            Err(e) => {
                let retry_after = state.backoff.next_delay();
                state.failed = Some(load);
                tracing::warn!(
                    attempt = state.backoff.attempt(),
                    "Load failed, retry in {:?}: {}",
                    retry_after,
                    e
                );
                self.publish(
                    state,
                    LoadState::Error {
                        message: e.to_string(),
                        retry_after,
                    },
                );
                Err(e)
            }
        }
    }

    async fn do_refresh(&self, state: &mut PagerState<S::Item>) -> Result<(), LoadError> {
        state.items.clear();
        state.end_reached = false;

        // A failed fill still shows whatever is cached.
        let filled = match &self.inner.fill {
            Some(fill) => fill.fill(LoadType::Refresh, &[]).await.map(|_| ()),
            None => Ok(()),
        };

        let page_size = self.inner.config.page_size;
        state.items = self.inner.source.load_page(page_size, 0).await?;
        if self.inner.fill.is_none() && state.items.len() < page_size {
            state.end_reached = true;
        }
        filled
    }

    async fn do_load_more(&self, state: &mut PagerState<S::Item>) -> Result<(), LoadError> {
        let target = state.items.len() + self.inner.config.page_size;
        let mut window = self.inner.source.load_page(target, 0).await?;

        if window.len() < target {
            match &self.inner.fill {
                Some(fill) => match fill.fill(LoadType::Append, &window).await {
                    Ok(outcome) if outcome.end_reached() => state.end_reached = true,
                    Ok(_) => {
                        window = self.inner.source.load_page(target, 0).await?;
                    }
                    Err(e) => {
                        state.items = window;
                        return Err(e);
                    }
                },
                None => state.end_reached = true,
            }
        }

        state.items = window;
        Ok(())
    }
}
