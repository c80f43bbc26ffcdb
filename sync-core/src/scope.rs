//! Subscription scope state machine for galaxy-sync.
//!
//! A scope is either detached or attached to exactly one key (a
//! conversation id, a user id) and, while attached, owns the session
//! holding its live subscriptions and tasks:
//!
//! ```text
//! Detached --attach(k)--> Attached{k}
//! Attached{k} --attach(k')--> (close k) --> Attached{k'}
//! Attached{k} --detach--> (close k) --> Detached
//! Detached --detach--> Detached
//! ```
//!
//! Opening and closing are passed in as closures, so the machine stays
//! free of I/O while still guaranteeing that the previous session is closed
//! before the next one is opened.

/// Two-state scope owning its session while attached.
#[derive(Debug)]
pub enum ScopeState<K, S> {
    /// No live subscriptions.
    Detached,
    /// Live subscriptions for `key`, owned by `session`.
    Attached {
        /// What the scope is attached to.
        key: K,
        /// Subscription handles and tasks.
        session: S,
    },
}

/// What an `attach` or `detach` call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition<K> {
    /// Detached → Attached.
    Attached,
    /// Attached → Attached; the session for the previous key was closed first.
    Reattached {
        /// Key of the closed session.
        previous: K,
    },
    /// Attached → Detached.
    Detached {
        /// Key of the closed session.
        previous: K,
    },
    /// Detach on a detached scope.
    Unchanged,
}

impl<K, S> ScopeState<K, S> {
    /// Create a new scope in the Detached state.
    pub fn new() -> Self {
        Self::Detached
    }

    /// Attach to `key`.
    ///
    /// If already attached (to any key), the current session is passed to
    /// `close` before `open` is called, so two sessions never coexist.
    pub fn attach<O, C>(&mut self, key: K, open: O, close: C) -> Transition<K>
    where
        O: FnOnce(&K) -> S,
        C: FnOnce(K, S),
        K: Clone,
    {
        let previous = match std::mem::replace(self, Self::Detached) {
            Self::Attached { key, session } => {
                close(key.clone(), session);
                Some(key)
            }
            Self::Detached => None,
        };

        let session = open(&key);
        *self = Self::Attached { key, session };

        match previous {
            Some(previous) => Transition::Reattached { previous },
            None => Transition::Attached,
        }
    }

    /// Detach, passing the current session to `close`. Idempotent.
    pub fn detach<C>(&mut self, close: C) -> Transition<K>
    where
        C: FnOnce(K, S),
        K: Clone,
    {
        match std::mem::replace(self, Self::Detached) {
            Self::Attached { key, session } => {
                close(key.clone(), session);
                Transition::Detached { previous: key }
            }
            Self::Detached => Transition::Unchanged,
        }
    }

    /// The key the scope is attached to.
    pub fn key(&self) -> Option<&K> {
        match self {
            Self::Attached { key, .. } => Some(key),
            Self::Detached => None,
        }
    }
}

impl<K, S> Default for ScopeState<K, S> {
    fn default() -> Self {
        Self::new()
    }
}
