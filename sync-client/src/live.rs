//! Live sync coordinator.
//!
//! Two independent scopes keep the local store in step with the remote
//! feed while the UI is looking at something:
//!
//! - the room scope follows one conversation: the newest messages of its
//!   stream (`Added` → upsert) and its metadata signal (deletes and
//!   in-place updates);
//! - the list scope follows a user's conversation index: `Changed` and
//!   `Removed` are applied at once, `Added` goes through a queue that is
//!   flushed once per tick as one transaction, so a burst of new
//!   conversations costs a handful of commits instead of one per row.
//!
//! Each scope owns its subscriptions and tasks. Attaching while attached
//! closes the old session before the new one opens, so one scope never has
//! two listeners on the same path.

use crate::drain::spawn_sampled_drain;
use crate::error::FeedResult;
use crate::remote::{EventKind, FeedEvent, FeedQuery, ListenerId, RemoteFeed, Subscription};
use crate::store::LocalStore;
use galaxy_sync_core::{ScopeState, Transition};
use galaxy_sync_types::wire::FromSnapshot;
use galaxy_sync_types::{
    Conversation, ConversationId, ConversationMetadata, Message, MessageId,
    ModificationType, UserId,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::{JoinHandle, JoinSet};

/// Subscriptions and tasks owned by an attached scope.
#[derive(Debug, Default)]
struct Session {
    listeners: Vec<ListenerId>,
    tasks: Vec<JoinHandle<()>>,
}

impl Session {
    fn close(self, feed: &dyn RemoteFeed) {
        for id in self.listeners {
            feed.unsubscribe(id);
        }
        for task in self.tasks {
            task.abort();
        }
    }
}

/// Keeps the local store in step with the feed for the attached scopes.
pub struct LiveSyncCoordinator {
    store: Arc<dyn LocalStore>,
    feed: Arc<dyn RemoteFeed>,
    tail_limit: usize,
    batch_interval: Duration,
    room: Mutex<ScopeState<ConversationId, Session>>,
    list: Mutex<ScopeState<UserId, Session>>,
}

impl fmt::Debug for LiveSyncCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveSyncCoordinator")
            .field("tail_limit", &self.tail_limit)
            .field("batch_interval", &self.batch_interval)
            .finish_non_exhaustive()
    }
}

impl LiveSyncCoordinator {
    /// Create a coordinator with both scopes detached.
    pub fn new(
        store: Arc<dyn LocalStore>,
        feed: Arc<dyn RemoteFeed>,
        tail_limit: usize,
        batch_interval: Duration,
    ) -> Self {
        Self {
            store,
            feed,
            tail_limit: tail_limit.max(1),
            batch_interval,
            room: Mutex::new(ScopeState::new()),
            list: Mutex::new(ScopeState::new()),
        }
    }

    /// Follow `conversation`, replacing whatever room was followed before.
    pub async fn attach_room(
        &self,
        conversation: ConversationId,
    ) -> FeedResult<Transition<ConversationId>> {
        self.attach(&self.room, conversation, "room", |c| self.open_room(c))
            .await
    }

    /// Stop following the current room. Idempotent.
    pub async fn detach_room(&self) -> Transition<ConversationId> {
        self.detach(&self.room, "room").await
    }

    /// Follow `user`'s conversation index.
    pub async fn attach_conversations(&self, user: UserId) -> FeedResult<Transition<UserId>> {
        self.attach(&self.list, user, "conversation list", |u| {
            self.open_list(u)
        })
        .await
    }

    /// Stop following the conversation index. Idempotent.
    pub async fn detach_conversations(&self) -> Transition<UserId> {
        self.detach(&self.list, "conversation list").await
    }

    /// Detach both scopes.
    pub async fn detach_all(&self) {
        self.detach_room().await;
        self.detach_conversations().await;
    }

    /// The conversation the room scope follows.
    pub async fn room(&self) -> Option<ConversationId> {
        self.room.lock().await.key().cloned()
    }

    /// The user whose index the list scope follows.
    pub async fn conversations_owner(&self) -> Option<UserId> {
        self.list.lock().await.key().cloned()
    }

    async fn attach<K, O>(
        &self,
        scope: &Mutex<ScopeState<K, Session>>,
        key: K,
        name: &'static str,
        open: O,
    ) -> FeedResult<Transition<K>>
    where
        K: Clone + fmt::Display,
        O: FnOnce(&K) -> FeedResult<Session>,
    {
        let mut scope = scope.lock().await;
        let mut failure = None;

        let transition = scope.attach(
            key,
            |key| {
                open(key).unwrap_or_else(|e| {
                    failure = Some(e);
                    Session::default()
                })
            },
            |previous, session| {
                tracing::info!("Closing {} scope for {}", name, previous);
                session.close(self.feed.as_ref());
            },
        );

        if let Some(e) = failure {
            scope.detach(|_, session| session.close(self.feed.as_ref()));
            tracing::warn!("Failed to attach {} scope: {}", name, e);
            return Err(e);
        }

        if let Some(key) = scope.key() {
            tracing::info!("Attached {} scope to {}", name, key);
        }
        Ok(transition)
    }

    async fn detach<K>(&self, scope: &Mutex<ScopeState<K, Session>>, name: &'static str) -> Transition<K>
    where
        K: Clone + fmt::Display,
    {
        scope.lock().await.detach(|previous, session| {
            tracing::info!("Detached {} scope from {}", name, previous);
            session.close(self.feed.as_ref());
        })
    }

    fn open_room(&self, conversation: &ConversationId) -> FeedResult<Session> {
        let tail = self.feed.subscribe(FeedQuery::MessageTail {
            conversation: conversation.clone(),
            limit: self.tail_limit,
        })?;
        let metadata = match self.feed.subscribe(FeedQuery::Metadata {
            conversation: conversation.clone(),
        }) {
            Ok(subscription) => subscription,
            Err(e) => {
                self.feed.unsubscribe(tail.id);
                return Err(e);
            }
        };

        let listeners = vec![tail.id, metadata.id];
        let tasks = vec![
            spawn_tail_pump(Arc::clone(&self.store), tail),
            spawn_metadata_pump(
                Arc::clone(&self.store),
                Arc::clone(&self.feed),
                conversation.clone(),
                metadata,
            ),
        ];
        Ok(Session { listeners, tasks })
    }

    fn open_list(&self, user: &UserId) -> FeedResult<Session> {
        let index = self.feed.subscribe(FeedQuery::ConversationIndex { user: user.clone() })?;
        let (queue, pending) = mpsc::unbounded_channel();

        let store = Arc::clone(&self.store);
        let drain = spawn_sampled_drain(pending, self.batch_interval, move |batch: Vec<IndexEntry>| {
            let store = Arc::clone(&store);
            async move {
                let batch = coalesce(batch);
                if batch.is_empty() {
                    return;
                }
                if let Err(e) = store.upsert_conversations(&batch).await {
                    tracing::warn!("Failed to flush {} conversations: {}", batch.len(), e);
                }
            }
        });

        Ok(Session {
            listeners: vec![index.id],
            tasks: vec![spawn_index_pump(Arc::clone(&self.store), index, queue), drain],
        })
    }
}

impl Drop for LiveSyncCoordinator {
    fn drop(&mut self) {
        let feed = Arc::clone(&self.feed);
        self.room
            .get_mut()
            .detach(|_, session| session.close(feed.as_ref()));
        self.list
            .get_mut()
            .detach(|_, session| session.close(feed.as_ref()));
    }
}

/// Decode the document at `path`, logging and dropping malformed ones.
fn decode<T: FromSnapshot>(path: &str, event: &FeedEvent) -> Option<T> {
    match T::from_snapshot(path, &event.payload) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Dropping malformed snapshot: {}", e);
            None
        }
    }
}

fn spawn_tail_pump(store: Arc<dyn LocalStore>, subscription: Subscription) -> JoinHandle<()> {
    let Subscription {
        id, path, mut events
    } = subscription;

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if event.kind != EventKind::Added {
                continue;
            }
            let entry = format!("{}/{}", path, event.key);
            let Some(message) = decode::<Message>(&entry, &event) else {
                continue;
            };
            tracing::debug!(%id, message = %message.id, "Tail message added");
            cache_message(store.as_ref(), &message).await;
        }
        tracing::debug!(%id, "Tail subscription closed");
    })
}

/// Upsert a pushed message unless it would move the cached row's status
/// backwards (a late copy of an older snapshot).
async fn cache_message(store: &dyn LocalStore, message: &Message) {
    match store.get_message(&message.id).await {
        Ok(Some(cached)) => {
            if let Err(e) = cached.status.transition_to(message.status) {
                tracing::debug!(message = %message.id, "Skipping stale copy: {}", e);
                return;
            }
        }
        Ok(None) => {}
        Err(e) => {
            tracing::warn!("Failed to read cached message {}: {}", message.id, e);
            return;
        }
    }
    if let Err(e) = store.upsert_message(message).await {
        tracing::warn!("Failed to cache message {}: {}", message.id, e);
    }
}

fn spawn_metadata_pump(
    store: Arc<dyn LocalStore>,
    feed: Arc<dyn RemoteFeed>,
    conversation: ConversationId,
    subscription: Subscription,
) -> JoinHandle<()> {
    let Subscription {
        id, path, mut events
    } = subscription;

    tokio::spawn(async move {
        // Aborting this task drops the set, which aborts the re-fetches.
        let mut refetches = JoinSet::new();

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else { break };
                    if event.kind == EventKind::Removed {
                        continue;
                    }
                    let Some(metadata) = decode::<ConversationMetadata>(&path, &event) else {
                        continue;
                    };
                    match metadata.modification_type {
                        ModificationType::MessageDeleted => {
                            delete_message(store.as_ref(), &metadata.message_id).await;
                        }
                        ModificationType::MessageUpdated => {
                            refetches.spawn(refetch_message(
                                Arc::clone(&store),
                                Arc::clone(&feed),
                                conversation.clone(),
                                metadata.message_id,
                            ));
                        }
                        ModificationType::NewMessageAdded | ModificationType::Idle => {}
                    }
                }
                Some(done) = refetches.join_next(), if !refetches.is_empty() => {
                    if let Err(e) = done {
                        tracing::warn!("Message re-fetch task failed: {}", e);
                    }
                }
            }
        }
        tracing::debug!(%id, "Metadata subscription closed");
    })
}

async fn delete_message(store: &dyn LocalStore, id: &MessageId) {
    match store.delete_message(id).await {
        Ok(true) => tracing::debug!(message = %id, "Deleted message"),
        Ok(false) => tracing::debug!(message = %id, "Deleted message was not cached"),
        Err(e) => tracing::warn!("Failed to delete message {}: {}", id, e),
    }
}

async fn refetch_message(
    store: Arc<dyn LocalStore>,
    feed: Arc<dyn RemoteFeed>,
    conversation: ConversationId,
    id: MessageId,
) {
    match feed.fetch_message(&conversation, &id).await {
        Ok(Some(message)) => cache_message(store.as_ref(), &message).await,
        Ok(None) => tracing::debug!(message = %id, "Updated message no longer exists"),
        Err(e) => tracing::warn!("Failed to re-fetch message {}: {}", id, e),
    }
}

/// What the index pump hands to the list drain.
#[derive(Debug)]
enum IndexEntry {
    /// A conversation to cache on the next tick.
    Added(Conversation),
    /// A newer write for this id already went to the store; queued copies
    /// ahead of this marker are stale.
    Superseded(ConversationId),
}

/// Reduce one drained batch to the conversations that still need writing,
/// last copy per id, in first-arrival order.
fn coalesce(batch: Vec<IndexEntry>) -> Vec<Conversation> {
    let mut pending: Vec<Conversation> = Vec::with_capacity(batch.len());
    for entry in batch {
        match entry {
            IndexEntry::Added(conversation) => {
                match pending.iter_mut().find(|c| c.id == conversation.id) {
                    Some(slot) => *slot = conversation,
                    None => pending.push(conversation),
                }
            }
            IndexEntry::Superseded(id) => pending.retain(|c| c.id != id),
        }
    }
    pending
}

fn spawn_index_pump(
    store: Arc<dyn LocalStore>,
    subscription: Subscription,
    queue: mpsc::UnboundedSender<IndexEntry>,
) -> JoinHandle<()> {
    let Subscription {
        id, path, mut events
    } = subscription;

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let entry = format!("{}/{}", path, event.key);
            match event.kind {
                EventKind::Added => {
                    let Some(conversation) = decode::<Conversation>(&entry, &event) else {
                        continue;
                    };
                    if queue.send(IndexEntry::Added(conversation)).is_err() {
                        break;
                    }
                }
                EventKind::Changed => {
                    let Some(conversation) = decode::<Conversation>(&entry, &event) else {
                        continue;
                    };
                    if let Err(e) = store.upsert_conversation(&conversation).await {
                        tracing::warn!("Failed to cache conversation {}: {}", conversation.id, e);
                    }
                    if queue.send(IndexEntry::Superseded(conversation.id)).is_err() {
                        break;
                    }
                }
                EventKind::Removed => {
                    let conversation = ConversationId::from(event.key);
                    if let Err(e) = store.delete_conversation(&conversation).await {
                        tracing::warn!("Failed to delete conversation {}: {}", conversation, e);
                    }
                    if queue.send(IndexEntry::Superseded(conversation)).is_err() {
                        break;
                    }
                }
            }
        }
        tracing::debug!(%id, "Conversation index subscription closed");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FeedError;
    use crate::remote::MemoryFeed;
    use crate::store::SqliteStore;
    use galaxy_sync_types::{paths, MessageStatus, UserProfile};
    use std::future::Future;
    use std::time::Instant;

    const TICK: Duration = Duration::from_millis(50);

    fn message(id: &str, body: &str, timestamp: i64) -> Message {
        let mut m = Message::outgoing_text("a_b".into(), UserId::from("b"), body, timestamp)
            .with_status(MessageStatus::Sent);
        m.id = MessageId::from(id);
        m
    }

    fn profile(id: &str) -> UserProfile {
        UserProfile {
            id: UserId::from(id),
            name: id.to_uppercase(),
            email: String::new(),
            photo_url: String::new(),
        }
    }

    fn conversation(id: &str, body: &str, timestamp: i64) -> Conversation {
        let mut m = message("seed", body, timestamp);
        m.conversation_id = id.into();
        Conversation::started_by(&m, vec![profile("a"), profile("b")], 0)
    }

    fn metadata(kind: ModificationType, message_id: &str) -> ConversationMetadata {
        ConversationMetadata {
            last_updated: 1,
            updated_by: UserId::from("b"),
            modification_type: kind,
            message_id: MessageId::from(message_id),
            first_participant_typing: false,
            second_participant_typing: false,
        }
    }

    async fn setup() -> (Arc<SqliteStore>, MemoryFeed, LiveSyncCoordinator) {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let feed = MemoryFeed::new();
        let live = LiveSyncCoordinator::new(store.clone(), Arc::new(feed.clone()), 3, TICK);
        (store, feed, live)
    }

    /// Poll `check` until it holds or two seconds pass.
    async fn eventually<F, Fut>(mut check: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if check().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not met within 2s");
    }

    #[tokio::test]
    async fn reattach_never_duplicates_listeners() {
        let (_store, feed, live) = setup().await;
        let stream = paths::message_stream(&"a_b".into());
        let signal = paths::metadata(&"a_b".into());

        live.attach_room("a_b".into()).await.unwrap();
        live.detach_room().await;
        live.attach_room("a_b".into()).await.unwrap();
        let t = live.attach_room("a_b".into()).await.unwrap();

        assert_eq!(
            t,
            Transition::Reattached {
                previous: "a_b".into()
            }
        );
        assert_eq!(feed.listener_count(&stream), 1);
        assert_eq!(feed.listener_count(&signal), 1);

        live.attach_room("a_c".into()).await.unwrap();
        assert_eq!(feed.listener_count(&stream), 0);
        assert_eq!(feed.total_listeners(), 2);
        assert_eq!(live.room().await, Some("a_c".into()));
    }

    #[tokio::test]
    async fn detach_is_idempotent_and_releases_everything() {
        let (_store, feed, live) = setup().await;
        live.attach_room("a_b".into()).await.unwrap();
        live.attach_conversations("a".into()).await.unwrap();
        assert_eq!(feed.total_listeners(), 3);

        live.detach_all().await;
        assert_eq!(live.detach_room().await, Transition::Unchanged);
        assert_eq!(live.detach_conversations().await, Transition::Unchanged);
        assert_eq!(feed.total_listeners(), 0);
    }

    #[tokio::test]
    async fn failed_subscribe_leaves_scope_detached() {
        let (_store, feed, live) = setup().await;
        feed.fail_next_subscribe(FeedError::Unavailable("offline".into()));

        assert!(live.attach_room("a_b".into()).await.is_err());
        assert_eq!(live.room().await, None);
        assert_eq!(feed.total_listeners(), 0);
    }

    #[tokio::test]
    async fn tail_additions_are_cached() {
        let (store, feed, live) = setup().await;
        feed.put_message(&message("m1", "old", 100));
        live.attach_room("a_b".into()).await.unwrap();

        feed.put_message(&message("m2", "new", 200));

        eventually(|| async { store.get_message(&"m2".into()).await.unwrap().is_some() }).await;
        assert!(store.get_message(&"m1".into()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn malformed_tail_payload_is_dropped() {
        let (store, feed, live) = setup().await;
        live.attach_room("a_b".into()).await.unwrap();

        feed.put(
            &paths::message_entry(&"a_b".into(), &"broken".into()),
            serde_json::json!({ "id": "broken", "timestamp": 500 }),
        );
        feed.put_message(&message("m3", "fine", 600));

        eventually(|| async { store.get_message(&"m3".into()).await.unwrap().is_some() }).await;
        assert!(store.get_message(&"broken".into()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn detached_room_stops_writing() {
        let (store, feed, live) = setup().await;
        live.attach_room("a_b".into()).await.unwrap();
        live.detach_room().await;

        feed.put_message(&message("m9", "late", 900));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(store.get_message(&"m9".into()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn metadata_delete_removes_cached_message() {
        let (store, feed, live) = setup().await;
        store.upsert_message(&message("m1", "bye", 100)).await.unwrap();
        live.attach_room("a_b".into()).await.unwrap();

        feed.put_metadata(&"a_b".into(), &metadata(ModificationType::MessageDeleted, "m1"));

        eventually(|| async { store.get_message(&"m1".into()).await.unwrap().is_none() }).await;
    }

    #[tokio::test]
    async fn metadata_update_refetches_message() {
        let (store, feed, live) = setup().await;
        let original = message("m1", "hi", 100);
        feed.put_message(&original);
        live.attach_room("a_b".into()).await.unwrap();
        eventually(|| async { store.get_message(&"m1".into()).await.unwrap().is_some() }).await;

        let mut reacted = original.clone().with_status(MessageStatus::Read);
        reacted.reaction = Some("👍".into());
        feed.put_message(&reacted);
        feed.put_metadata(&"a_b".into(), &metadata(ModificationType::MessageUpdated, "m1"));

        eventually(|| async {
            store.get_message(&"m1".into()).await.unwrap().map(|m| m.status)
                == Some(MessageStatus::Read)
        })
        .await;
        let cached = store.get_message(&"m1".into()).await.unwrap().unwrap();
        assert_eq!(cached.reaction.as_deref(), Some("👍"));
    }

    #[tokio::test]
    async fn stale_refetch_never_downgrades_status() {
        let (store, feed, live) = setup().await;
        let read = message("m1", "hi", 100).with_status(MessageStatus::Read);
        store.upsert_message(&read).await.unwrap();
        feed.put_message(&read.clone().with_status(MessageStatus::Sent));
        live.attach_room("a_b".into()).await.unwrap();

        feed.put_metadata(&"a_b".into(), &metadata(ModificationType::MessageUpdated, "m1"));
        tokio::time::sleep(Duration::from_millis(100)).await;

        let cached = store.get_message(&"m1".into()).await.unwrap().unwrap();
        assert_eq!(cached.status, MessageStatus::Read);
    }

    #[tokio::test]
    async fn typing_signal_writes_nothing() {
        let (store, feed, live) = setup().await;
        live.attach_room("a_b".into()).await.unwrap();
        let before = store.metrics().transactions();

        feed.put_metadata(&"a_b".into(), &metadata(ModificationType::Idle, ""));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(store.metrics().transactions(), before);
    }

    #[tokio::test]
    async fn burst_of_added_conversations_is_batched() {
        let (store, feed, live) = setup().await;
        live.attach_conversations("a".into()).await.unwrap();
        let before = store.metrics().transactions();
        let started = Instant::now();

        for i in 0..40 {
            feed.put_conversation(&"a".into(), &conversation(&format!("a_u{i:02}"), "hey", i));
        }

        eventually(|| async { store.conversations_page(100, 0).await.unwrap().len() == 40 }).await;
        let commits = store.metrics().transactions() - before;
        let ticks = (started.elapsed().as_millis() / TICK.as_millis()) as u64;
        assert!(commits >= 1);
        assert!(commits <= ticks + 2, "{commits} commits over {ticks} ticks");
    }

    #[tokio::test]
    async fn index_changes_apply_immediately() {
        let (store, feed, live) = setup().await;
        feed.put_conversation(&"a".into(), &conversation("a_b", "first", 100));
        live.attach_conversations("a".into()).await.unwrap();
        eventually(|| async { store.get_conversation(&"a_b".into()).await.unwrap().is_some() })
            .await;

        feed.put_conversation(&"a".into(), &conversation("a_b", "second", 200));
        eventually(|| async {
            store.get_conversation(&"a_b".into()).await.unwrap().map(|c| c.last_message.text)
                == Some("second".to_string())
        })
        .await;

        feed.remove(&paths::conversation_entry(&"a".into(), &"a_b".into()));
        eventually(|| async { store.get_conversation(&"a_b".into()).await.unwrap().is_none() })
            .await;
    }

    #[test]
    fn coalesce_keeps_last_copy_and_drops_superseded() {
        let batch = vec![
            IndexEntry::Added(conversation("a_b", "one", 1)),
            IndexEntry::Added(conversation("a_c", "hey", 2)),
            IndexEntry::Added(conversation("a_b", "two", 3)),
            IndexEntry::Added(conversation("a_d", "yo", 4)),
            IndexEntry::Superseded("a_d".into()),
        ];

        let flushed = coalesce(batch);

        let seen: Vec<_> = flushed
            .iter()
            .map(|c| (c.id.as_str(), c.last_message.text.as_str()))
            .collect();
        assert_eq!(seen, vec![("a_b", "two"), ("a_c", "hey")]);
    }

    #[test]
    fn coalesce_keeps_additions_after_supersede() {
        let batch = vec![
            IndexEntry::Superseded("a_b".into()),
            IndexEntry::Added(conversation("a_b", "again", 5)),
        ];
        assert_eq!(coalesce(batch).len(), 1);
    }

    #[tokio::test]
    async fn queued_addition_never_overwrites_a_later_change() {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let feed = MemoryFeed::new();
        let tick = Duration::from_millis(200);
        let live = LiveSyncCoordinator::new(store.clone(), Arc::new(feed.clone()), 3, tick);
        live.attach_conversations("a".into()).await.unwrap();

        // Added and Changed for one conversation inside the same tick
        feed.put_conversation(&"a".into(), &conversation("a_b", "first", 100));
        feed.put_conversation(&"a".into(), &conversation("a_b", "second", 200));
        feed.put_conversation(&"a".into(), &conversation("a_c", "gone", 300));
        feed.remove(&paths::conversation_entry(&"a".into(), &"a_c".into()));

        eventually(|| async {
            store.get_conversation(&"a_b".into()).await.unwrap().map(|c| c.last_message.text)
                == Some("second".to_string())
        })
        .await;
        tokio::time::sleep(tick * 3).await;

        let cached = store.get_conversation(&"a_b".into()).await.unwrap().unwrap();
        assert_eq!(cached.last_message.text, "second");
        assert!(store.get_conversation(&"a_c".into()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn pushed_message_updates_room_and_list() {
        let (store, feed, live) = setup().await;
        let hi = message("m1", "hi", 100);
        let started = conversation("a_b", "hi", 100);
        store.upsert_message(&hi).await.unwrap();
        store.upsert_conversation(&started).await.unwrap();
        live.attach_room("a_b".into()).await.unwrap();
        live.attach_conversations("a".into()).await.unwrap();

        feed.set_server_time(200);
        let yo = message("m2", "yo", 150);
        feed.send_message(&yo, &started.with_last_message(&yo))
            .await
            .unwrap();

        eventually(|| async {
            store.get_conversation(&"a_b".into()).await.unwrap().map(|c| c.last_message.text)
                == Some("yo".to_string())
        })
        .await;
        eventually(|| async { store.get_message(&"m2".into()).await.unwrap().is_some() }).await;
        let page = store.messages_page(&"a_b".into(), 20, 0).await.unwrap();
        assert_eq!(page[0].id.as_str(), "m2");
        assert_eq!(page[0].timestamp, 200);
        let summary = store.get_conversation(&"a_b".into()).await.unwrap().unwrap();
        assert_eq!(summary.last_message.timestamp, 200);
    }
}
