//! Load requests and their outcomes.

/// Which way a page-fill goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadType {
    /// Replace the cached window with the newest page.
    Refresh,
    /// Load messages older than the oldest materialized one.
    Append,
    /// Load messages newer than the newest one. Live sync covers this.
    Prepend,
}

/// Result of a successful page-fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadOutcome {
    /// New rows were written; more may exist beyond them.
    MoreMayExist,
    /// Nothing further in this direction.
    Exhausted,
}

impl LoadOutcome {
    /// Whether pagination in this direction has ended.
    pub fn end_reached(self) -> bool {
        matches!(self, LoadOutcome::Exhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_exhausted_ends_pagination() {
        assert!(LoadOutcome::Exhausted.end_reached());
        assert!(!LoadOutcome::MoreMayExist.end_reached());
    }
}
