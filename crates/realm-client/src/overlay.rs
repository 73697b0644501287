//! Connecting overlay driven by lifecycle notifications.
//!
//! There is no renderer here; the overlay is a visibility flag the frame loop
//! reads, plus a log line per notification.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use realm_net::{ConnectError, ConnectionObserver};

/// Shows while a connection attempt is in flight.
#[derive(Clone, Default)]
pub struct LogOverlay {
    visible: Arc<AtomicBool>,
}

impl LogOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the "connecting" overlay is currently shown.
    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::Relaxed)
    }
}

impl ConnectionObserver for LogOverlay {
    fn connecting_started(&self) {
        self.visible.store(true, Ordering::Relaxed);
        tracing::info!("connecting...");
    }

    fn connecting_succeeded(&self) {
        self.visible.store(false, Ordering::Relaxed);
        tracing::info!("connected");
    }

    fn connecting_failed(&self, error: &ConnectError) {
        self.visible.store(false, Ordering::Relaxed);
        tracing::error!(%error, "could not connect");
    }
}
