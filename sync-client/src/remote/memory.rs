//! In-memory remote feed.
//!
//! Holds the document tree in a map and pushes child events to open
//! subscriptions synchronously on every write, in commit order. Server
//! placeholders are resolved against a settable clock.
//!
//! Used by tests and by the CLI demo. Allows injecting failures and
//! counting fetches and listeners for verification.

use super::{EventKind, FeedEvent, FeedQuery, ListenerId, RemoteFeed, Subscription};
use crate::error::{FeedError, FeedResult};
use async_trait::async_trait;
use dashmap::DashMap;
use galaxy_sync_core::Boundary;
use galaxy_sync_types::wire::{self, FromSnapshot, ToSnapshot};
use galaxy_sync_types::{
    paths, Conversation, ConversationId, ConversationMetadata, Message, MessageId, UserId,
    UserProfile,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;

/// In-memory remote feed.
#[derive(Debug, Default, Clone)]
pub struct MemoryFeed {
    inner: Arc<Mutex<MemoryFeedInner>>,
    listeners: Arc<DashMap<ListenerId, Listener>>,
    next_listener: Arc<AtomicU64>,
    fetch_count: Arc<AtomicU64>,
}

#[derive(Debug, Default)]
struct MemoryFeedInner {
    documents: BTreeMap<String, Value>,
    server_time: Option<i64>,
    fail_next_fetch: Option<FeedError>,
    fail_next_send: Option<FeedError>,
    fail_next_subscribe: Option<FeedError>,
}

impl MemoryFeedInner {
    fn now(&self) -> i64 {
        self.server_time.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as i64)
                .unwrap_or(0)
        })
    }
}

#[derive(Debug)]
struct Listener {
    query: FeedQuery,
    path: String,
    tx: mpsc::UnboundedSender<FeedEvent>,
}

impl Listener {
    fn watches(&self, path: &str) -> bool {
        if self.query.is_value_query() {
            self.path == path
        } else {
            parent(path) == Some(self.path.as_str())
        }
    }
}

impl MemoryFeed {
    /// Create an empty feed.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryFeedInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pin the server clock used to resolve timestamp placeholders.
    pub fn set_server_time(&self, millis: i64) {
        self.state().server_time = Some(millis);
    }

    /// Cause the next fetch to fail with the given error.
    pub fn fail_next_fetch(&self, error: FeedError) {
        self.state().fail_next_fetch = Some(error);
    }

    /// Cause the next send to fail with the given error.
    pub fn fail_next_send(&self, error: FeedError) {
        self.state().fail_next_send = Some(error);
    }

    /// Cause the next subscribe to fail with the given error.
    pub fn fail_next_subscribe(&self, error: FeedError) {
        self.state().fail_next_subscribe = Some(error);
    }

    /// Number of fetch calls so far (failed ones included).
    pub fn fetch_count(&self) -> u64 {
        self.fetch_count.load(Ordering::Relaxed)
    }

    /// Number of open subscriptions anchored at `path`.
    pub fn listener_count(&self, path: &str) -> usize {
        self.listeners.iter().filter(|l| l.path == path).count()
    }

    /// Number of open subscriptions.
    pub fn total_listeners(&self) -> usize {
        self.listeners.len()
    }

    /// The document stored at `path`.
    pub fn document(&self, path: &str) -> Option<Value> {
        self.state().documents.get(path).cloned()
    }

    /// Write a raw document, resolving placeholders. Returns what was stored.
    pub fn put(&self, path: &str, value: Value) -> Value {
        self.commit(path, Some(value)).unwrap_or(Value::Null)
    }

    /// Delete a document.
    pub fn remove(&self, path: &str) {
        self.commit(path, None);
    }

    /// Store a message exactly as given (no server timestamp).
    pub fn put_message(&self, message: &Message) {
        self.put_encoded(
            &paths::message_entry(&message.conversation_id, &message.id),
            message,
        );
    }

    /// Store a conversation in `owner`'s index.
    pub fn put_conversation(&self, owner: &UserId, conversation: &Conversation) {
        self.put_encoded(&paths::conversation_entry(owner, &conversation.id), conversation);
    }

    /// Replace a conversation's metadata signal.
    pub fn put_metadata(&self, conversation: &ConversationId, metadata: &ConversationMetadata) {
        self.put_encoded(&paths::metadata(conversation), metadata);
    }

    /// Store a user profile.
    pub fn put_user(&self, user: &UserProfile) {
        self.put_encoded(&paths::user(&user.id), user);
    }

    fn put_encoded(&self, path: &str, document: &impl ToSnapshot) {
        match document.to_snapshot() {
            Ok(value) => {
                self.put(path, value);
            }
            Err(e) => tracing::warn!("Not storing {}: {}", path, e),
        }
    }

    /// Apply a write and push the resulting events to every watcher.
    fn commit(&self, path: &str, write: Option<Value>) -> Option<Value> {
        let mut inner = self.state();

        let watchers: Vec<(FeedQuery, mpsc::UnboundedSender<FeedEvent>)> = self
            .listeners
            .iter()
            .filter(|l| l.watches(path))
            .map(|l| (l.query.clone(), l.tx.clone()))
            .collect();
        let before: Vec<Vec<(String, Value)>> = watchers
            .iter()
            .map(|(query, _)| window(&inner.documents, query))
            .collect();

        let now = inner.now();
        let stored = match write {
            Some(value) => {
                let resolved =
                    wire::resolve_server_values(value, inner.documents.get(path), now);
                inner.documents.insert(path.to_string(), resolved.clone());
                Some(resolved)
            }
            None => {
                inner.documents.remove(path);
                None
            }
        };

        let key = last_segment(path);
        for ((query, tx), before) in watchers.iter().zip(before) {
            let after = window(&inner.documents, query);
            for event in diff(&before, &after, key, query.is_value_query()) {
                if tx.send(event).is_err() {
                    tracing::debug!(path, "Dropping event for closed subscription");
                }
            }
        }

        stored
    }

    fn check_fetch(&self) -> FeedResult<()> {
        self.fetch_count.fetch_add(1, Ordering::Relaxed);
        match self.state().fail_next_fetch.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RemoteFeed for MemoryFeed {
    async fn fetch_messages(
        &self,
        conversation: &ConversationId,
        limit: usize,
        end_at: Option<&Boundary>,
    ) -> FeedResult<Vec<Message>> {
        self.check_fetch()?;

        let stream = paths::message_stream(conversation);
        let mut messages: Vec<Message> = {
            let inner = self.state();
            children(&inner.documents, &stream)
                .into_iter()
                .filter_map(|(key, value)| decode(&format!("{}/{}", stream, key), &value))
                .collect()
        };

        if let Some(boundary) = end_at {
            messages.retain(|m| (m.timestamp, &m.id) <= (boundary.timestamp, &boundary.id));
        }
        messages.sort_by(|a, b| (b.timestamp, &b.id).cmp(&(a.timestamp, &a.id)));
        messages.truncate(limit);
        Ok(messages)
    }

    async fn fetch_message(
        &self,
        conversation: &ConversationId,
        id: &MessageId,
    ) -> FeedResult<Option<Message>> {
        self.check_fetch()?;

        let path = paths::message_entry(conversation, id);
        match self.document(&path) {
            Some(value) => Ok(Some(Message::from_snapshot(&path, &value)?)),
            None => Ok(None),
        }
    }

    async fn send_message(&self, message: &Message, conversation: &Conversation) -> FeedResult<()> {
        if let Some(error) = self.state().fail_next_send.take() {
            return Err(error);
        }

        let mut owners: Vec<&UserId> = conversation.participants.iter().map(|p| &p.id).collect();
        owners.push(&message.sender_id);
        owners.sort();
        owners.dedup();

        let summary = wire::outgoing_conversation(conversation)?;
        let stored = wire::outgoing_message(message)?;
        for owner in owners {
            self.commit(
                &paths::conversation_entry(owner, &conversation.id),
                Some(summary.clone()),
            );
        }
        self.commit(
            &paths::message_entry(&message.conversation_id, &message.id),
            Some(stored),
        );
        Ok(())
    }

    async fn fetch_users(&self) -> FeedResult<Vec<UserProfile>> {
        self.check_fetch()?;

        let mut users: Vec<UserProfile> = {
            let inner = self.state();
            children(&inner.documents, paths::USERS)
                .into_iter()
                .filter_map(|(key, value)| decode(&format!("{}/{}", paths::USERS, key), &value))
                .collect()
        };
        users.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(users)
    }

    fn subscribe(&self, query: FeedQuery) -> FeedResult<Subscription> {
        let mut inner = self.state();
        if let Some(error) = inner.fail_next_subscribe.take() {
            return Err(error);
        }

        let (tx, events) = mpsc::unbounded_channel();
        let kind = if query.is_value_query() {
            EventKind::Changed
        } else {
            EventKind::Added
        };
        for (key, payload) in window(&inner.documents, &query) {
            // The receiver is still in hand, so this cannot fail.
            let _ = tx.send(FeedEvent { kind, key, payload });
        }

        // Registered under the lock so no write slips between the initial
        // state and the first live event.
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed) + 1);
        let path = query.path();
        self.listeners.insert(
            id,
            Listener {
                query,
                path: path.clone(),
                tx,
            },
        );
        drop(inner);

        tracing::debug!(%id, %path, "Subscribed");
        Ok(Subscription { id, path, events })
    }

    fn unsubscribe(&self, id: ListenerId) {
        if let Some((_, listener)) = self.listeners.remove(&id) {
            tracing::debug!(%id, path = %listener.path, "Unsubscribed");
        }
    }
}

fn decode<T: FromSnapshot>(path: &str, value: &Value) -> Option<T> {
    match T::from_snapshot(path, value) {
        Ok(item) => Some(item),
        Err(e) => {
            tracing::warn!("Skipping malformed document: {}", e);
            None
        }
    }
}

fn parent(path: &str) -> Option<&str> {
    path.rsplit_once('/').map(|(parent, _)| parent)
}

fn last_segment(path: &str) -> &str {
    path.rsplit_once('/').map(|(_, key)| key).unwrap_or(path)
}

/// Direct children of `parent`, as `(key, document)`.
fn children(documents: &BTreeMap<String, Value>, parent: &str) -> Vec<(String, Value)> {
    let prefix = format!("{}/", parent);
    documents
        .range(prefix.clone()..)
        .take_while(|(path, _)| path.starts_with(&prefix))
        .filter_map(|(path, value)| {
            let key = &path[prefix.len()..];
            (!key.contains('/')).then(|| (key.to_string(), value.clone()))
        })
        .collect()
}

/// Children ordered by `field` ascending (ties by key), newest `limit` kept.
fn ordered_by(
    mut children: Vec<(String, Value)>,
    field: &str,
    limit: Option<usize>,
) -> Vec<(String, Value)> {
    children.sort_by(|(ka, a), (kb, b)| {
        let a = a.get(field).and_then(Value::as_i64).unwrap_or(0);
        let b = b.get(field).and_then(Value::as_i64).unwrap_or(0);
        (a, ka).cmp(&(b, kb))
    });
    if let Some(limit) = limit {
        let skip = children.len().saturating_sub(limit);
        children = children.split_off(skip);
    }
    children
}

/// What a query currently sees.
fn window(documents: &BTreeMap<String, Value>, query: &FeedQuery) -> Vec<(String, Value)> {
    let path = query.path();
    match query {
        FeedQuery::Metadata { .. } => documents
            .get(&path)
            .map(|value| vec![(last_segment(&path).to_string(), value.clone())])
            .unwrap_or_default(),
        FeedQuery::MessageTail { limit, .. } => {
            ordered_by(children(documents, &path), "timestamp", Some(*limit))
        }
        FeedQuery::ConversationIndex { .. } => {
            ordered_by(children(documents, &path), "last_message_creation_time", None)
        }
    }
}

/// Events turning the `before` window into `after`, given a write to `key`.
fn diff(
    before: &[(String, Value)],
    after: &[(String, Value)],
    key: &str,
    value_query: bool,
) -> Vec<FeedEvent> {
    let mut events = Vec::new();

    for (k, old) in before {
        if !after.iter().any(|(a, _)| a == k) {
            events.push(FeedEvent {
                kind: EventKind::Removed,
                key: k.clone(),
                payload: old.clone(),
            });
        }
    }

    for (k, new) in after {
        let existed = before.iter().any(|(b, _)| b == k);
        let kind = match (existed, value_query) {
            (false, false) => EventKind::Added,
            (false, true) => EventKind::Changed,
            (true, _) if k == key => EventKind::Changed,
            (true, _) => continue,
        };
        events.push(FeedEvent {
            kind,
            key: k.clone(),
            payload: new.clone(),
        });
    }

    events
}
