//! Drive the whole sync core against an in-memory feed.
//!
//! Seeds a feed with a few users and a conversation history, then pages,
//! follows live updates and sends (once successfully, once with an injected
//! failure), printing what the cache ends up holding.

use anyhow::{Context, Result};
use galaxy_sync_client::{
    ChatSync, FeedError, LocalStore, MemoryFeed, RemoteFeed, SqliteStore, SyncConfig,
};
use galaxy_sync_types::{
    Conversation, ConversationId, ConversationMetadata, Message, MessageStatus,
    ModificationType, UserId, UserProfile,
};
use std::path::Path;
use std::sync::Arc;

use super::{print_conversation, print_message};
use crate::config;

const HISTORY: i64 = 45;
const BASE_TIME: i64 = 1_700_000_000_000;
const MINUTE: i64 = 60_000;

fn profile(id: &str, name: &str) -> UserProfile {
    UserProfile {
        id: UserId::from(id),
        name: name.to_string(),
        email: format!("{}@galaxy.chat", id),
        photo_url: String::new(),
    }
}

/// Run the demo command.
pub async fn run(data_dir: &Path, persist: bool) -> Result<()> {
    let (config, store): (SyncConfig, Arc<dyn LocalStore>) = if persist {
        let config = config::load(data_dir)?;
        let store = SqliteStore::open(&config.storage.database).await?;
        (config, Arc::new(store))
    } else {
        let mut config = SyncConfig::default();
        config.user_id = Some("alice".into());
        (config, Arc::new(SqliteStore::in_memory().await?))
    };
    let me = profile(config::signed_in_user(&config)?, "Me");
    let bob = profile("bob", "Bob");
    let carol = profile("carol", "Carol");
    let settle = config.batch_interval() * 3;

    let feed = MemoryFeed::new();
    for user in [&me, &bob, &carol] {
        feed.put_user(user);
    }

    let with_bob = ConversationId::for_pair(&me.id, &bob.id)?;
    let mut last = None;
    for i in 1..=HISTORY {
        let sender = if i % 2 == 0 { &me.id } else { &bob.id };
        let message = Message::outgoing_text(
            with_bob.clone(),
            sender.clone(),
            format!("message #{}", i),
            BASE_TIME + i * MINUTE,
        )
        .with_status(MessageStatus::Read);
        feed.put_message(&message);
        last = Some(message);
    }
    let last = last.context("empty history")?;
    let summary =
        Conversation::started_by(&last, vec![me.clone(), bob.clone()], BASE_TIME);
    feed.put_conversation(&me.id, &summary);
    feed.put_conversation(&bob.id, &summary);

    let sync = ChatSync::with_store(config, store, Arc::new(feed.clone()));
    println!("=== galaxy-sync demo (user: {}) ===", me.id);
    println!();

    // Contacts
    let contacts = sync.fetch_contacts(&me.id).await?;
    println!("Contacts:");
    for contact in &contacts {
        println!("  {:<8} {}", contact.id, contact.name);
    }
    println!();

    // Live scopes
    sync.attach_conversations(me.id.clone()).await?;
    sync.attach_room(with_bob.clone()).await?;

    // Paging with remote fill
    let pager = sync.messages_pager(with_bob.clone());
    pager.refresh().await?;
    println!("Page 1: {} messages", pager.snapshot().items.len());
    while !pager.snapshot().end_reached {
        pager.load_more().await?;
    }
    println!(
        "Paged to the end: {} messages cached for {}",
        pager.snapshot().items.len(),
        with_bob
    );
    println!();

    // Carol starts a conversation; bob deletes one of his messages
    feed.set_server_time(BASE_TIME + 100 * MINUTE);
    let with_carol = ConversationId::for_pair(&me.id, &carol.id)?;
    let hello = Message::outgoing_text(with_carol, carol.id.clone(), "hey, long time!", 0);
    let opening = Conversation::started_by(&hello, vec![carol.clone(), me.clone()], 0);
    feed.send_message(&hello, &opening).await?;

    let first = pager.snapshot().items.last().cloned().context("no messages")?;
    feed.put_metadata(
        &with_bob,
        &ConversationMetadata {
            last_updated: BASE_TIME + 101 * MINUTE,
            updated_by: bob.id.clone(),
            modification_type: ModificationType::MessageDeleted,
            message_id: first.id.clone(),
            first_participant_typing: false,
            second_participant_typing: false,
        },
    );

    // Sends
    feed.set_server_time(BASE_TIME + 102 * MINUTE);
    let sent = sync.send_text(&me, &bob, "see you tomorrow", None).await?;
    println!("Send #1: {:?}", sent.outcome);
    feed.fail_next_send(FeedError::Unavailable("demo network outage".into()));
    let failed = sync.send_text(&me, &bob, "this one will fail", None).await?;
    println!("Send #2: {:?}", failed.outcome);
    println!();

    tokio::time::sleep(settle).await;

    let conversations = sync.conversations_pager();
    conversations.refresh().await?;
    println!("Conversations:");
    for conversation in &conversations.snapshot().items {
        print_conversation(conversation, &me.id);
    }
    println!();

    pager.reload().await?;
    println!("Latest in {}:", with_bob);
    for message in pager.snapshot().items.iter().take(5) {
        print_message(message);
    }
    println!(
        "Deleted by bob: {} ({})",
        first.body,
        if sync.store().get_message(&first.id).await?.is_none() {
            "gone from cache"
        } else {
            "still cached"
        }
    );

    sync.detach_room().await;
    sync.detach_conversations().await;
    Ok(())
}
