//! CLI command implementations.

pub mod conversation_id;
pub mod conversations;
pub mod demo;
pub mod init;
pub mod messages;
pub mod sign_out;

use anyhow::Result;
use galaxy_sync_client::{ChatSync, MemoryFeed, PageSource, Pager};
use galaxy_sync_types::{Conversation, Message, UserId};
use std::path::Path;
use std::sync::Arc;

use crate::config;

/// Open the configured cache.
///
/// The CLI works offline: the feed behind it is an empty in-memory one, so
/// pagers show exactly what the cache holds.
pub async fn open_cache(data_dir: &Path) -> Result<ChatSync> {
    let config = config::load(data_dir)?;
    Ok(ChatSync::open(config, Arc::new(MemoryFeed::new())).await?)
}

/// Page through `pager` until `limit` rows are materialized or the end is
/// reached. Returns the rows and whether more exist.
pub async fn collect<S: PageSource>(pager: &Pager<S>, limit: usize) -> Result<(Vec<S::Item>, bool)> {
    pager.refresh().await?;
    loop {
        let snapshot = pager.snapshot();
        if snapshot.items.len() >= limit || snapshot.end_reached {
            let more = !snapshot.end_reached || snapshot.items.len() > limit;
            let mut items = snapshot.items;
            items.truncate(limit);
            return Ok((items, more));
        }

        pager.load_more().await?;
        if pager.snapshot().items.len() == snapshot.items.len() && !pager.snapshot().end_reached {
            return Ok((snapshot.items, false));
        }
    }
}

/// One line per message.
pub fn print_message(message: &Message) {
    let quoted = match &message.quoted {
        Some(q) => format!(" (re {}: {:?})", q.sender_id, q.body),
        None => String::new(),
    };
    println!(
        "  [{}] {:<10} {}{}  <{}>",
        message.timestamp, message.sender_id, message.body, quoted, message.status
    );
}

/// One line per conversation, as seen by `me`.
pub fn print_conversation(conversation: &Conversation, me: &UserId) {
    let last = &conversation.last_message;
    let peer = conversation
        .peer_of(me)
        .map(|p| p.name.as_str())
        .unwrap_or("?");
    println!(
        "  {:<24} with {:<10} unread={:<3} [{}] {:?} <{}>",
        conversation.id.as_str(),
        peer,
        conversation.unread_message_count,
        last.timestamp,
        last.text,
        last.status
    );
}
