//! Sample buffer for tick-based batching.
//!
//! Items arriving between two ticks accumulate here. On each tick the
//! owner swaps the whole buffer out and flushes it as one batch, so a burst
//! of N items costs one write per tick instead of one write per item.
//!
//! The buffer keeps arrival order and does not deduplicate: the flush is an
//! upsert keyed by id, so a later copy of the same item wins.

/// Accumulates items between ticks.
#[derive(Debug, Clone)]
pub struct SampleBuffer<T> {
    items: Vec<T>,
}

impl<T> SampleBuffer<T> {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Queue one item.
    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    /// Queue several items, in order.
    pub fn extend(&mut self, items: impl IntoIterator<Item = T>) {
        self.items.extend(items);
    }

    /// Take everything queued so far, leaving the buffer empty.
    ///
    /// Returns `None` for an empty buffer so that empty ticks write nothing.
    pub fn swap_out(&mut self) -> Option<Vec<T>> {
        if self.items.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.items))
        }
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Default for SampleBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}
