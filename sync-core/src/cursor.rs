//! Append cursor for backward pagination.
//!
//! Loading older messages continues from the oldest item that is already
//! materialized (the *boundary*). The remote query ends at the boundary
//! inclusively, ordered by `(timestamp, id)`, so messages sharing the
//! boundary timestamp are never skipped; the boundary item itself comes back
//! in the result and is trimmed before counting what is new.
//!
//! The cursor also remembers the last boundary that turned out to be
//! exhausted, so asking again from the same place costs no remote call.

use galaxy_sync_types::{Message, MessageId};

/// Position of the oldest materialized message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Boundary {
    /// Message timestamp, Unix milliseconds.
    pub timestamp: i64,
    /// Message id, breaking timestamp ties.
    pub id: MessageId,
}

impl Boundary {
    /// Boundary at `message`.
    pub fn of(message: &Message) -> Self {
        Self {
            timestamp: message.timestamp,
            id: message.id.clone(),
        }
    }
}

/// The oldest message in `items`, by `(timestamp, id)`.
pub fn oldest_boundary(items: &[Message]) -> Option<Boundary> {
    items.iter().map(Boundary::of).min()
}

/// Drop the boundary item from a fetched page.
pub fn trim_boundary(fetched: Vec<Message>, boundary: &Boundary) -> Vec<Message> {
    fetched
        .into_iter()
        .filter(|m| m.id != boundary.id)
        .collect()
}

/// Remembers where backward pagination ran out.
#[derive(Debug, Clone, Default)]
pub struct AppendCursor {
    exhausted_at: Option<Boundary>,
}

impl AppendCursor {
    /// Create a cursor with nothing exhausted yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an append from `boundary` needs a remote call.
    pub fn should_fetch(&self, boundary: &Boundary) -> bool {
        self.exhausted_at.as_ref() != Some(boundary)
    }

    /// Record that nothing older than `boundary` exists.
    pub fn mark_exhausted(&mut self, boundary: Boundary) {
        self.exhausted_at = Some(boundary);
    }

    /// Record that an append from some boundary produced new items.
    pub fn mark_progress(&mut self) {
        self.exhausted_at = None;
    }

    /// Forget everything, as after a refresh.
    pub fn reset(&mut self) {
        self.exhausted_at = None;
    }

    /// The boundary that was last found exhausted.
    pub fn exhausted_at(&self) -> Option<&Boundary> {
        self.exhausted_at.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use galaxy_sync_types::{ConversationId, UserId};

    fn message(id: &str, timestamp: i64) -> Message {
        let mut m = Message::outgoing_text(ConversationId::from("a_b"), UserId::from("a"), id, timestamp);
        m.id = MessageId::from(id);
        m
    }

    #[test]
    fn oldest_boundary_picks_smallest_timestamp() {
        let items = vec![message("m3", 300), message("m1", 100), message("m2", 200)];
        let boundary = oldest_boundary(&items).unwrap();
        assert_eq!(boundary.timestamp, 100);
        assert_eq!(boundary.id, MessageId::from("m1"));
    }

    #[test]
    fn oldest_boundary_breaks_ties_by_id() {
        let items = vec![message("b", 100), message("a", 100)];
        assert_eq!(oldest_boundary(&items).unwrap().id, MessageId::from("a"));
    }

    #[test]
    fn no_items_no_boundary() {
        assert!(oldest_boundary(&[]).is_none());
    }

    #[test]
    fn trim_drops_only_the_boundary_item() {
        let boundary = Boundary::of(&message("m5", 500));
        let fetched = vec![message("m4", 400), message("m5b", 500), message("m5", 500)];

        let trimmed = trim_boundary(fetched, &boundary);

        let ids: Vec<_> = trimmed.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m4", "m5b"]);
    }

    #[test]
    fn exhausted_boundary_is_not_fetched_again() {
        let mut cursor = AppendCursor::new();
        let boundary = Boundary::of(&message("m1", 100));
        assert!(cursor.should_fetch(&boundary));

        cursor.mark_exhausted(boundary.clone());
        assert!(!cursor.should_fetch(&boundary));
        assert!(!cursor.should_fetch(&boundary));
    }

    #[test]
    fn different_boundary_is_fetched() {
        let mut cursor = AppendCursor::new();
        cursor.mark_exhausted(Boundary::of(&message("m1", 100)));
        assert!(cursor.should_fetch(&Boundary::of(&message("m0", 50))));
    }

    #[test]
    fn reset_forgets_exhaustion() {
        let mut cursor = AppendCursor::new();
        let boundary = Boundary::of(&message("m1", 100));
        cursor.mark_exhausted(boundary.clone());

        cursor.reset();

        assert!(cursor.should_fetch(&boundary));
        assert!(cursor.exhausted_at().is_none());
    }
}
