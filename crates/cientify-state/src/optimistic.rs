//! The optimistic toggle state machine.
//!
//! Post likes, comment likes and follow/unfollow all share this machine:
//! the cached entity takes the user's intended value immediately, the
//! request goes out, and the eventual response either confirms (possibly
//! overwriting with the server's authoritative value) or rolls the entity
//! back to what it was before that request started.
//!
//! A second toggle while one is still pending is not blocked or queued;
//! the cache reflects the latest intent and responses are applied as
//! overwrites in arrival order. A late failure can therefore visibly snap
//! a value back even after a newer toggle succeeded. That window is an
//! accepted behavior of the protocol, not something callers should try to
//! paper over.

use tracing::trace;

/// Receipt for one in-flight toggle request.
///
/// Carries the committed value from before the request's optimistic
/// apply; rolling back restores exactly that value.
#[derive(Debug)]
#[must_use = "a pending toggle must be confirmed or rolled back"]
pub struct ToggleTicket<T> {
    committed: T,
}

/// A value under optimistic mutation.
#[derive(Debug, Clone)]
pub struct OptimisticToggle<T> {
    value: T,
    inflight: u32,
}

impl<T: Clone> OptimisticToggle<T> {
    pub fn new(committed: T) -> Self {
        Self {
            value: committed,
            inflight: 0,
        }
    }

    /// The current (possibly optimistic) value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Whether any request is still awaiting its response.
    pub fn is_pending(&self) -> bool {
        self.inflight > 0
    }

    /// Apply an optimistic value and open a pending request.
    ///
    /// Synchronous; the caller issues the network request afterwards.
    pub fn begin(&mut self, optimistic: T) -> ToggleTicket<T> {
        let ticket = ToggleTicket {
            committed: self.value.clone(),
        };
        self.value = optimistic;
        self.inflight += 1;
        trace!(inflight = self.inflight, "optimistic value applied");
        ticket
    }

    /// Resolve a request successfully.
    ///
    /// When the server returned an authoritative value it overwrites the
    /// optimistic one; concurrent actions from other clients may have
    /// changed aggregates between apply and response, and the server is
    /// the arbiter of those.
    pub fn commit(&mut self, ticket: ToggleTicket<T>, authoritative: Option<T>) {
        let ToggleTicket { committed: _ } = ticket;
        self.inflight = self.inflight.saturating_sub(1);
        if let Some(value) = authoritative {
            self.value = value;
        }
    }

    /// Resolve a request as failed, restoring the value from before that
    /// request's optimistic apply.
    pub fn rollback(&mut self, ticket: ToggleTicket<T>) {
        self.inflight = self.inflight.saturating_sub(1);
        self.value = ticket.committed;
    }
}
