//! SQLite backend for the local store.

use super::{LocalStore, StoreChange, StoreMetrics};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use galaxy_sync_types::wire::WireUser;
use galaxy_sync_types::{
    Conversation, ConversationId, LastMessage, Message, MessageId, MessageKind, MessageStatus,
    QuotedMessage, UserProfile,
};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
    SqliteSynchronous,
};
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Buffered change notifications per subscriber before it starts lagging.
const CHANGE_CHANNEL_CAPACITY: usize = 256;

const MESSAGE_COLUMNS: &str = "id, conversation_id, sender_id, body, timestamp, status, kind, \
     reaction, quoted_id, quoted_body, quoted_sender_id, quoted_kind";

const CONVERSATION_COLUMNS: &str = "id, participants, unread_message_count, last_message, \
     last_message_status, last_message_kind, last_message_time, is_last_message_read, created_at";

/// SQLite-based local store.
///
/// Uses WAL mode so page reads do not block live-sync writes.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    changes: broadcast::Sender<StoreChange>,
    metrics: Arc<StoreMetrics>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open the store at `path`, creating the database file if needed.
    pub async fn open(path: &Path) -> StoreResult<Self> {
        if path.as_os_str().is_empty() || path.is_dir() {
            return Err(StoreError::InvalidPath {
                path: path.to_path_buf(),
            });
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    /// Create an in-memory store (for testing and the demo).
    ///
    /// A single connection that never expires holds the database.
    pub async fn in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(":memory:")?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> StoreResult<Self> {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        let store = Self {
            pool,
            changes,
            metrics: Arc::new(StoreMetrics::default()),
        };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL,
                sender_id TEXT NOT NULL,
                body TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                status TEXT NOT NULL,
                kind TEXT NOT NULL,
                reaction TEXT,
                quoted_id TEXT,
                quoted_body TEXT,
                quoted_sender_id TEXT,
                quoted_kind TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                participants TEXT NOT NULL,
                unread_message_count INTEGER NOT NULL DEFAULT 0,
                last_message TEXT NOT NULL,
                last_message_status TEXT NOT NULL,
                last_message_kind TEXT NOT NULL,
                last_message_time INTEGER NOT NULL,
                is_last_message_read INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_conversation_time \
             ON messages(conversation_id, timestamp DESC, id DESC)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_conversations_time \
             ON conversations(last_message_time DESC, id DESC)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn committed(&self, change: StoreChange) {
        self.metrics.record_commit();
        // No subscribers is fine.
        let _ = self.changes.send(change);
    }

    async fn write_message(conn: &mut SqliteConnection, m: &Message) -> Result<(), sqlx::Error> {
        let quoted = m.quoted.as_ref();
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO messages
                (id, conversation_id, sender_id, body, timestamp, status, kind,
                 reaction, quoted_id, quoted_body, quoted_sender_id, quoted_kind)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(m.id.as_str())
        .bind(m.conversation_id.as_str())
        .bind(m.sender_id.as_str())
        .bind(&m.body)
        .bind(m.timestamp)
        .bind(m.status.as_str())
        .bind(m.kind.as_str())
        .bind(m.reaction.as_deref())
        .bind(quoted.map(|q| q.id.as_str()))
        .bind(quoted.map(|q| q.body.as_str()))
        .bind(quoted.map(|q| q.sender_id.as_str()))
        .bind(quoted.map(|q| q.kind.as_str()))
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    async fn write_conversation(
        conn: &mut SqliteConnection,
        c: &Conversation,
    ) -> StoreResult<()> {
        let participants: Vec<WireUser> = c.participants.iter().map(WireUser::from).collect();
        let participants =
            serde_json::to_string(&participants).map_err(|e| StoreError::Corrupt {
                table: "conversations",
                id: c.id.to_string(),
                reason: e.to_string(),
            })?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO conversations
                (id, participants, unread_message_count, last_message, last_message_status,
                 last_message_kind, last_message_time, is_last_message_read, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(c.id.as_str())
        .bind(participants)
        .bind(i64::from(c.unread_message_count))
        .bind(&c.last_message.text)
        .bind(c.last_message.status.as_str())
        .bind(c.last_message.kind.as_str())
        .bind(c.last_message.timestamp)
        .bind(c.last_message.is_read)
        .bind(c.created_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl LocalStore for SqliteStore {
    async fn upsert_message(&self, message: &Message) -> StoreResult<()> {
        self.upsert_messages(std::slice::from_ref(message)).await
    }

    async fn upsert_messages(&self, messages: &[Message]) -> StoreResult<()> {
        if messages.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for message in messages {
            Self::write_message(&mut *tx, message).await?;
        }
        tx.commit().await?;

        self.metrics
            .messages_written
            .fetch_add(messages.len() as u64, Ordering::Relaxed);

        // A batch may span conversations (tail events never do, but callers can).
        let mut touched: Vec<&ConversationId> = messages.iter().map(|m| &m.conversation_id).collect();
        touched.sort();
        touched.dedup();
        self.metrics.record_commit();
        for conversation in touched {
            let _ = self.changes.send(StoreChange::Messages(conversation.clone()));
        }
        Ok(())
    }

    async fn replace_messages(
        &self,
        conversation: &ConversationId,
        messages: &[Message],
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM messages WHERE conversation_id = ?1")
            .bind(conversation.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected();

        for message in messages {
            Self::write_message(&mut *tx, message).await?;
        }
        tx.commit().await?;

        self.metrics.rows_deleted.fetch_add(deleted, Ordering::Relaxed);
        self.metrics
            .messages_written
            .fetch_add(messages.len() as u64, Ordering::Relaxed);
        self.committed(StoreChange::Messages(conversation.clone()));
        Ok(())
    }

    async fn delete_message(&self, id: &MessageId) -> StoreResult<bool> {
        let conversation: Option<String> =
            sqlx::query_scalar("DELETE FROM messages WHERE id = ?1 RETURNING conversation_id")
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await?;

        match conversation {
            Some(conversation) => {
                self.metrics.rows_deleted.fetch_add(1, Ordering::Relaxed);
                self.committed(StoreChange::Messages(conversation.into()));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_messages_for(&self, conversation: &ConversationId) -> StoreResult<u64> {
        let deleted = sqlx::query("DELETE FROM messages WHERE conversation_id = ?1")
            .bind(conversation.as_str())
            .execute(&self.pool)
            .await?
            .rows_affected();

        self.metrics.rows_deleted.fetch_add(deleted, Ordering::Relaxed);
        self.committed(StoreChange::Messages(conversation.clone()));
        Ok(deleted)
    }

    async fn get_message(&self, id: &MessageId) -> StoreResult<Option<Message>> {
        let row = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Message::try_from).transpose()
    }

    async fn messages_page(
        &self,
        conversation: &ConversationId,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<Message>> {
        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE conversation_id = ?1 \
             ORDER BY timestamp DESC, id DESC \
             LIMIT ?2 OFFSET ?3"
        ))
        .bind(conversation.as_str())
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Message::try_from).collect()
    }

    async fn upsert_conversation(&self, conversation: &Conversation) -> StoreResult<()> {
        self.upsert_conversations(std::slice::from_ref(conversation))
            .await
    }

    async fn upsert_conversations(&self, conversations: &[Conversation]) -> StoreResult<()> {
        if conversations.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for conversation in conversations {
            Self::write_conversation(&mut *tx, conversation).await?;
        }
        tx.commit().await?;

        self.metrics
            .conversations_written
            .fetch_add(conversations.len() as u64, Ordering::Relaxed);
        self.committed(StoreChange::Conversations);
        Ok(())
    }

    async fn delete_conversation(&self, id: &ConversationId) -> StoreResult<bool> {
        let deleted = sqlx::query("DELETE FROM conversations WHERE id = ?1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?
            .rows_affected();

        if deleted == 0 {
            return Ok(false);
        }
        self.metrics.rows_deleted.fetch_add(deleted, Ordering::Relaxed);
        self.committed(StoreChange::Conversations);
        Ok(true)
    }

    async fn get_conversation(&self, id: &ConversationId) -> StoreResult<Option<Conversation>> {
        let row = sqlx::query_as::<_, ConversationRow>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Conversation::try_from).transpose()
    }

    async fn conversations_page(
        &self,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<Conversation>> {
        let rows = sqlx::query_as::<_, ConversationRow>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations \
             ORDER BY last_message_time DESC, id DESC \
             LIMIT ?1 OFFSET ?2"
        ))
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Conversation::try_from).collect()
    }

    async fn clear_all(&self) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        let messages = sqlx::query("DELETE FROM messages")
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let conversations = sqlx::query("DELETE FROM conversations")
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;

        tracing::debug!(messages, conversations, "Cleared local store");
        self.metrics
            .rows_deleted
            .fetch_add(messages + conversations, Ordering::Relaxed);
        self.committed(StoreChange::All);
        Ok(())
    }

    fn changes(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    fn metrics(&self) -> &StoreMetrics {
        &self.metrics
    }
}

/// Internal row type for message queries.
#[derive(sqlx::FromRow)]
struct MessageRow {
    id: String,
    conversation_id: String,
    sender_id: String,
    body: String,
    timestamp: i64,
    status: String,
    kind: String,
    reaction: Option<String>,
    quoted_id: Option<String>,
    quoted_body: Option<String>,
    quoted_sender_id: Option<String>,
    quoted_kind: Option<String>,
}

/// Internal row type for conversation queries.
#[derive(sqlx::FromRow)]
struct ConversationRow {
    id: String,
    participants: String,
    unread_message_count: i64,
    last_message: String,
    last_message_status: String,
    last_message_kind: String,
    last_message_time: i64,
    is_last_message_read: bool,
    created_at: i64,
}

fn parse_kind(kind: &str) -> MessageKind {
    kind.parse().unwrap_or(MessageKind::Unsupported)
}

fn parse_status(table: &'static str, id: &str, status: &str) -> StoreResult<MessageStatus> {
    status.parse().map_err(|e: galaxy_sync_types::SyncError| StoreError::Corrupt {
        table,
        id: id.to_string(),
        reason: e.to_string(),
    })
}

impl TryFrom<MessageRow> for Message {
    type Error = StoreError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        let status = parse_status("messages", &row.id, &row.status)?;
        let quoted = row.quoted_id.map(|id| QuotedMessage {
            id: id.into(),
            body: row.quoted_body.unwrap_or_default(),
            sender_id: row.quoted_sender_id.unwrap_or_default().into(),
            kind: row
                .quoted_kind
                .as_deref()
                .map(parse_kind)
                .unwrap_or(MessageKind::Text),
        });

        Ok(Message {
            id: row.id.into(),
            conversation_id: row.conversation_id.into(),
            sender_id: row.sender_id.into(),
            body: row.body,
            timestamp: row.timestamp,
            status,
            kind: parse_kind(&row.kind),
            reaction: row.reaction,
            quoted,
        })
    }
}

impl TryFrom<ConversationRow> for Conversation {
    type Error = StoreError;

    fn try_from(row: ConversationRow) -> Result<Self, Self::Error> {
        let status = parse_status("conversations", &row.id, &row.last_message_status)?;
        let participants: Vec<WireUser> =
            serde_json::from_str(&row.participants).map_err(|e| StoreError::Corrupt {
                table: "conversations",
                id: row.id.clone(),
                reason: format!("participants: {}", e),
            })?;

        Ok(Conversation {
            id: row.id.into(),
            participants: participants
                .into_iter()
                .map(|p| UserProfile {
                    id: p.id.into(),
                    name: p.name,
                    email: p.email,
                    photo_url: p.photo_url,
                })
                .collect(),
            unread_message_count: u32::try_from(row.unread_message_count).unwrap_or(0),
            last_message: LastMessage {
                text: row.last_message,
                status,
                kind: parse_kind(&row.last_message_kind),
                timestamp: row.last_message_time,
                is_read: row.is_last_message_read,
            },
            created_at: row.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use galaxy_sync_types::UserId;

    fn message(conversation: &str, id: &str, body: &str, timestamp: i64) -> Message {
        let mut m = Message::outgoing_text(conversation.into(), UserId::from("a"), body, timestamp);
        m.id = MessageId::from(id);
        m
    }

    fn profile(id: &str) -> UserProfile {
        UserProfile {
            id: UserId::from(id),
            name: id.to_uppercase(),
            email: format!("{}@example.com", id),
            photo_url: String::new(),
        }
    }

    fn conversation(id: &str, last_text: &str, last_time: i64) -> Conversation {
        let m = message(id, "seed", last_text, last_time);
        Conversation::started_by(&m, vec![profile("a"), profile("b")], 1)
    }

    async fn message_count(store: &SqliteStore, conversation: &str) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE conversation_id = ?1")
            .bind(conversation)
            .fetch_one(&store.pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn double_upsert_keeps_one_row_with_latest_values() {
        let store = SqliteStore::in_memory().await.unwrap();

        store.upsert_message(&message("a_b", "m1", "draft", 100)).await.unwrap();
        let sent = message("a_b", "m1", "final", 150).with_status(MessageStatus::Sent);
        store.upsert_message(&sent).await.unwrap();

        assert_eq!(message_count(&store, "a_b").await, 1);
        let stored = store.get_message(&MessageId::from("m1")).await.unwrap().unwrap();
        assert_eq!(stored, sent);
    }

    #[tokio::test]
    async fn messages_page_is_newest_first_with_id_tiebreak() {
        let store = SqliteStore::in_memory().await.unwrap();
        store
            .upsert_messages(&[
                message("a_b", "m1", "one", 100),
                message("a_b", "m3", "three", 300),
                message("a_b", "m2a", "two a", 200),
                message("a_b", "m2b", "two b", 200),
                message("a_c", "x1", "elsewhere", 999),
            ])
            .await
            .unwrap();

        let page = store.messages_page(&"a_b".into(), 10, 0).await.unwrap();
        let ids: Vec<_> = page.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m3", "m2b", "m2a", "m1"]);

        let second = store.messages_page(&"a_b".into(), 2, 2).await.unwrap();
        let ids: Vec<_> = second.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m2a", "m1"]);
    }

    #[tokio::test]
    async fn replace_messages_swaps_the_conversation_window() {
        let store = SqliteStore::in_memory().await.unwrap();
        store
            .upsert_messages(&[
                message("a_b", "old1", "stale", 1),
                message("a_b", "old2", "stale", 2),
                message("a_c", "keep", "other chat", 3),
            ])
            .await
            .unwrap();

        let fresh: Vec<Message> = (1..=50)
            .map(|i| message("a_b", &format!("m{i}"), "fresh", i * 10))
            .collect();
        store.replace_messages(&"a_b".into(), &fresh).await.unwrap();

        assert_eq!(message_count(&store, "a_b").await, 50);
        assert!(store.get_message(&"old1".into()).await.unwrap().is_none());
        assert!(store.get_message(&"keep".into()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn batch_upsert_is_one_transaction() {
        let store = SqliteStore::in_memory().await.unwrap();
        let before = store.metrics().transactions();

        let batch: Vec<Conversation> = (0..10)
            .map(|i| conversation(&format!("a_u{i}"), "hi", i))
            .collect();
        store.upsert_conversations(&batch).await.unwrap();

        assert_eq!(store.metrics().transactions() - before, 1);
        assert_eq!(
            store.metrics().conversations_written.load(Ordering::Relaxed),
            10
        );
    }

    #[tokio::test]
    async fn empty_batch_writes_nothing() {
        let store = SqliteStore::in_memory().await.unwrap();
        let before = store.metrics().transactions();

        store.upsert_conversations(&[]).await.unwrap();
        store.upsert_messages(&[]).await.unwrap();

        assert_eq!(store.metrics().transactions(), before);
    }

    #[tokio::test]
    async fn delete_message_reports_existence() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.upsert_message(&message("a_b", "m1", "hi", 1)).await.unwrap();

        assert!(store.delete_message(&"m1".into()).await.unwrap());
        assert!(!store.delete_message(&"m1".into()).await.unwrap());
        assert!(store.get_message(&"m1".into()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_messages_for_only_touches_one_conversation() {
        let store = SqliteStore::in_memory().await.unwrap();
        store
            .upsert_messages(&[
                message("a_b", "m1", "hi", 1),
                message("a_b", "m2", "hi", 2),
                message("a_c", "m3", "hi", 3),
            ])
            .await
            .unwrap();

        assert_eq!(store.delete_messages_for(&"a_b".into()).await.unwrap(), 2);
        assert_eq!(message_count(&store, "a_c").await, 1);
    }

    #[tokio::test]
    async fn conversations_round_trip_with_participants() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut c = conversation("a_b", "hello", 100);
        c.unread_message_count = 4;
        c.last_message.is_read = true;

        store.upsert_conversation(&c).await.unwrap();

        let stored = store.get_conversation(&"a_b".into()).await.unwrap().unwrap();
        assert_eq!(stored, c);
        assert_eq!(stored.participants[1].email, "b@example.com");
    }

    #[tokio::test]
    async fn conversations_page_is_most_recent_first() {
        let store = SqliteStore::in_memory().await.unwrap();
        store
            .upsert_conversations(&[
                conversation("a_b", "old", 100),
                conversation("a_c", "new", 300),
                conversation("a_d", "mid", 200),
            ])
            .await
            .unwrap();

        let page = store.conversations_page(30, 0).await.unwrap();
        let ids: Vec<_> = page.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a_c", "a_d", "a_b"]);
    }

    #[tokio::test]
    async fn delete_conversation_removes_row() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.upsert_conversation(&conversation("a_b", "hi", 1)).await.unwrap();

        assert!(store.delete_conversation(&"a_b".into()).await.unwrap());
        assert!(!store.delete_conversation(&"a_b".into()).await.unwrap());
        assert!(store.get_conversation(&"a_b".into()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clear_all_empties_both_tables() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.upsert_message(&message("a_b", "m1", "hi", 1)).await.unwrap();
        store.upsert_conversation(&conversation("a_b", "hi", 1)).await.unwrap();

        store.clear_all().await.unwrap();

        assert!(store.messages_page(&"a_b".into(), 20, 0).await.unwrap().is_empty());
        assert!(store.conversations_page(30, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn commits_are_announced() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut changes = store.changes();

        store.upsert_message(&message("a_b", "m1", "hi", 1)).await.unwrap();
        store.upsert_conversation(&conversation("a_b", "hi", 1)).await.unwrap();
        store.clear_all().await.unwrap();

        assert_eq!(changes.recv().await.unwrap(), StoreChange::Messages("a_b".into()));
        assert_eq!(changes.recv().await.unwrap(), StoreChange::Conversations);
        assert_eq!(changes.recv().await.unwrap(), StoreChange::All);
    }

    #[tokio::test]
    async fn corrupt_status_is_reported() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.upsert_message(&message("a_b", "m1", "hi", 1)).await.unwrap();
        sqlx::query("UPDATE messages SET status = 'delivered' WHERE id = 'm1'")
            .execute(&store.pool)
            .await
            .unwrap();

        let err = store.get_message(&"m1".into()).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { table: "messages", .. }));
    }

    #[tokio::test]
    async fn on_disk_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");

        {
            let store = SqliteStore::open(&path).await.unwrap();
            store.upsert_message(&message("a_b", "m1", "persisted", 1)).await.unwrap();
            store.pool.close().await;
        }

        let store = SqliteStore::open(&path).await.unwrap();
        let stored = store.get_message(&"m1".into()).await.unwrap().unwrap();
        assert_eq!(stored.body, "persisted");
    }

    #[tokio::test]
    async fn directory_path_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = SqliteStore::open(dir.path()).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidPath { .. }));
    }
}
