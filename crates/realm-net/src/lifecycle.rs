//! Connection lifecycle for the client.
//!
//! [`ConnectionManager`] owns at most one [`Connection`] and drives it through
//!
//! ```text
//! Idle -> Resolving -> Connecting -> Handshaking -> Active -> Disconnecting -> Idle
//!            |              |
//!            +----> Idle <--+   (attempt failed, no retry)
//! ```
//!
//! Resolution and the transport connect run as a spawned task so the frame
//! loop keeps ticking. The loop calls [`ConnectionManager::poll`] once per
//! frame; when the attempt has finished, `poll` performs the handshake (or
//! records the failure) on the caller's context.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use crate::discovery::{Endpoint, Resolve, ResolveError};
use crate::handshake;
use crate::messages::Message;
use crate::state::StateWatch;
use crate::transport::{Link, Transport, TransportError};

/// Where the manager is in the connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No connection and no attempt in flight.
    Idle,
    /// Waiting on the discovery service.
    Resolving,
    /// Waiting on the transport connect.
    Connecting,
    /// Transport is up, ENTER is being sent.
    Handshaking,
    /// Session established.
    Active,
    /// LEAVE is being sent and the link released.
    Disconnecting,
}

/// Why a connection attempt produced no connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// Discovery failed.
    #[error("endpoint resolution failed: {0}")]
    Resolve(#[from] ResolveError),

    /// The transport could not connect.
    #[error("transport connect failed: {0}")]
    Transport(#[from] TransportError),

    /// The attempt task ended without reporting (runtime shutting down).
    #[error("connection attempt aborted")]
    Aborted,
}

/// Immediate answer to [`ConnectionManager::connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectRequest {
    /// A new attempt is in flight.
    Started,
    /// A connection already exists; nothing changed.
    AlreadyConnected,
    /// Another attempt is still in flight; this request was rejected.
    AttemptPending,
}

/// Result of a finished attempt, reported by [`ConnectionManager::poll`].
#[derive(Debug)]
pub enum ConnectOutcome {
    /// The connection is active and ENTER has been sent.
    Connected,
    /// The attempt failed; the manager is idle again.
    Failed(ConnectError),
}

/// UI hooks for the connecting overlay. The manager renders nothing itself.
pub trait ConnectionObserver: Send {
    /// An attempt started; show the connecting overlay.
    fn connecting_started(&self);

    /// The connection is active; dismiss the overlay.
    fn connecting_succeeded(&self);

    /// The attempt failed.
    fn connecting_failed(&self, _error: &ConnectError) {}
}

/// Observer that ignores every notification.
pub struct NoopObserver;

impl ConnectionObserver for NoopObserver {
    fn connecting_started(&self) {}
    fn connecting_succeeded(&self) {}
}

/// An established session with the game server.
pub struct Connection {
    identity: String,
    endpoint: Endpoint,
    link: Box<dyn Link>,
}

impl Connection {
    /// Identity token supplied to [`ConnectionManager::connect`].
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Server this connection talks to.
    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    /// Client identifier announced in ENTER.
    pub fn client_id(&self) -> String {
        handshake::client_id(&self.identity)
    }

    /// Whether the transport is still up.
    pub fn is_open(&self) -> bool {
        self.link.is_open()
    }

    /// Send a message directly on the link.
    pub fn send(&self, message: &Message) -> Result<(), TransportError> {
        self.link.send(message)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("identity", &self.identity)
            .field("endpoint", &self.endpoint)
            .field("open", &self.link.is_open())
            .finish()
    }
}

type AttemptResult = Result<(Endpoint, Box<dyn Link>), ConnectError>;

struct PendingAttempt {
    identity: String,
    result_rx: oneshot::Receiver<AttemptResult>,
    task: JoinHandle<()>,
}

/// Owns the client's single connection.
///
/// Construct one per client at startup and hand it to whoever needs it.
/// All methods take `&mut self` or `&self` on the frame-loop context; only
/// the attempt task runs elsewhere.
pub struct ConnectionManager {
    discovery_url: String,
    resolver: Arc<dyn Resolve>,
    transport: Arc<dyn Transport>,
    observer: Box<dyn ConnectionObserver>,
    state: Arc<StateWatch<LifecycleState>>,
    connection: Option<Connection>,
    pending: Option<PendingAttempt>,
}

impl ConnectionManager {
    /// Create an idle manager.
    pub fn new(
        discovery_url: impl Into<String>,
        resolver: Arc<dyn Resolve>,
        transport: Arc<dyn Transport>,
        observer: Box<dyn ConnectionObserver>,
    ) -> Self {
        Self {
            discovery_url: discovery_url.into(),
            resolver,
            transport,
            observer,
            state: Arc::new(StateWatch::new(LifecycleState::Idle)),
            connection: None,
            pending: None,
        }
    }

    /// Start connecting as `identity`.
    ///
    /// Does nothing if a connection exists, and rejects the call while another
    /// attempt is in flight. Must be called from within a Tokio runtime.
    pub fn connect(&mut self, identity: &str) -> ConnectRequest {
        if self.connection.is_some() {
            tracing::debug!(identity, "connect ignored, already connected");
            return ConnectRequest::AlreadyConnected;
        }
        if self.pending.is_some() {
            tracing::warn!(identity, "connect rejected, an attempt is already pending");
            return ConnectRequest::AttemptPending;
        }

        tracing::info!(identity, url = %self.discovery_url, "connecting");
        self.observer.connecting_started();
        self.state.set(LifecycleState::Resolving);

        let (result_tx, result_rx) = oneshot::channel();
        let url = self.discovery_url.clone();
        let resolver = Arc::clone(&self.resolver);
        let transport = Arc::clone(&self.transport);
        let state = Arc::clone(&self.state);
        let task = tokio::spawn(async move {
            let result = run_attempt(&url, resolver.as_ref(), transport.as_ref(), &state).await;
            // Receiver gone means the manager was dropped; the link closes with it.
            let _ = result_tx.send(result);
        });

        self.pending = Some(PendingAttempt {
            identity: identity.to_string(),
            result_rx,
            task,
        });
        ConnectRequest::Started
    }

    /// Apply the pending attempt's result if it has finished. Never blocks.
    pub fn poll(&mut self) -> Option<ConnectOutcome> {
        let pending = self.pending.as_mut()?;
        let result = match pending.result_rx.try_recv() {
            Ok(result) => result,
            Err(oneshot::error::TryRecvError::Empty) => return None,
            Err(oneshot::error::TryRecvError::Closed) => Err(ConnectError::Aborted),
        };
        Some(self.finish_attempt(result))
    }

    /// Wait for the pending attempt and apply its result.
    ///
    /// Returns `None` if no attempt is in flight.
    pub async fn settle(&mut self) -> Option<ConnectOutcome> {
        let pending = self.pending.as_mut()?;
        let result = (&mut pending.result_rx)
            .await
            .unwrap_or_else(|_| Err(ConnectError::Aborted));
        Some(self.finish_attempt(result))
    }

    /// Send LEAVE and release the connection.
    ///
    /// Returns `false` if there was no connection. LEAVE delivery is best
    /// effort; a new [`connect`](Self::connect) is accepted as soon as this
    /// returns.
    pub fn disconnect(&mut self) -> bool {
        let Some(connection) = self.connection.take() else {
            tracing::debug!("disconnect ignored, not connected");
            return false;
        };

        self.state.set(LifecycleState::Disconnecting);
        let Connection {
            identity,
            endpoint,
            link,
        } = connection;

        if let Err(e) = link.send(&handshake::leave()) {
            tracing::warn!(error = %e, identity, "failed to send LEAVE");
        }
        link.close();

        tracing::info!(identity, %endpoint, "disconnected");
        self.state.set(LifecycleState::Idle);
        true
    }

    /// The active connection, if any. The borrow ends before the next
    /// [`disconnect`](Self::disconnect).
    pub fn current_connection(&self) -> Option<&Connection> {
        self.connection.as_ref()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.state.current()
    }

    /// Observe lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Whether an attempt is in flight.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn finish_attempt(&mut self, result: AttemptResult) -> ConnectOutcome {
        let identity = self
            .pending
            .take()
            .map(|pending| pending.identity)
            .unwrap_or_default();

        match result {
            Ok((endpoint, link)) => {
                self.state.set(LifecycleState::Handshaking);
                let connection = Connection {
                    identity,
                    endpoint,
                    link,
                };

                // Success is the transport being up; ENTER is not acknowledged.
                if let Err(e) = connection.send(&handshake::enter(&connection.identity)) {
                    tracing::warn!(error = %e, identity = %connection.identity, "failed to send ENTER");
                }
                tracing::info!(
                    identity = %connection.identity,
                    %endpoint,
                    client_id = %connection.client_id(),
                    "connection active"
                );

                self.connection = Some(connection);
                self.state.set(LifecycleState::Active);
                self.observer.connecting_succeeded();
                ConnectOutcome::Connected
            }
            Err(error) => {
                tracing::warn!(error = %error, identity, "connection attempt failed");
                self.state.set(LifecycleState::Idle);
                self.observer.connecting_failed(&error);
                ConnectOutcome::Failed(error)
            }
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.task.abort();
        }
    }
}

async fn run_attempt(
    url: &str,
    resolver: &dyn Resolve,
    transport: &dyn Transport,
    state: &StateWatch<LifecycleState>,
) -> AttemptResult {
    let endpoint = resolver.resolve(url).await?;
    state.set(LifecycleState::Connecting);
    let link = transport.connect(endpoint).await?;
    Ok((endpoint, link))
}
