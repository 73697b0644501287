//! Observable state backed by a [`watch`] channel.
//!
//! Used for both the transport link state and the connection lifecycle state,
//! so any number of consumers (UI overlays, diagnostics) can react to
//! transitions without polling.

use tokio::sync::watch;

/// A value whose changes are broadcast to subscribers.
pub struct StateWatch<S> {
    tx: watch::Sender<S>,
    rx: watch::Receiver<S>,
}

impl<S: Copy> StateWatch<S> {
    /// Create a new watch holding `initial`.
    pub fn new(initial: S) -> Self {
        let (tx, rx) = watch::channel(initial);
        Self { tx, rx }
    }

    /// Set the current state, notifying all subscribers.
    pub fn set(&self, state: S) {
        // `self.rx` keeps the channel open, so this never fails.
        let _ = self.tx.send(state);
    }

    /// Return a new subscriber receiver.
    pub fn subscribe(&self) -> watch::Receiver<S> {
        self.rx.clone()
    }

    /// Return the current state without blocking.
    pub fn current(&self) -> S {
        *self.rx.borrow()
    }
}
