//! Transport to the game server.
//!
//! [`Transport`] opens a [`Link`] to a resolved [`Endpoint`]. The TCP
//! implementation splits the stream and runs two background tasks: a reader
//! that decodes frames and pushes them into the shared [`PacketQueue`], and a
//! writer fed by an unbounded channel so [`Link::send`] never blocks the
//! frame loop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use crate::discovery::Endpoint;
use crate::framing::{FrameConfig, FrameError, read_message, write_frame};
use crate::messages::{Message, serialize_message};
use crate::queue::PacketQueue;
use crate::state::StateWatch;

/// Link lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Stream established, frames flow both ways.
    Connected,
    /// Close requested, queued writes are being flushed.
    Closing,
    /// Stream shut down or lost.
    Disconnected,
}

/// Errors raised while connecting or sending.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Socket-level failure (refused, reset, unreachable).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connect attempt did not finish in time.
    #[error("connect timed out after {0:?}")]
    Timeout(Duration),

    /// The link is no longer accepting messages.
    #[error("link closed")]
    Closed,

    /// The message could not be framed.
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// An established connection's send side.
pub trait Link: Send + Sync {
    /// Queue `message` for delivery. Does not wait for the write.
    fn send(&self, message: &Message) -> Result<(), TransportError>;

    /// Whether the underlying stream is still up.
    fn is_open(&self) -> bool;

    /// Release the link. Messages already sent are flushed on a best-effort
    /// basis; this call does not wait for them.
    fn close(self: Box<Self>);
}

/// Opens links to game servers.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect to `endpoint`. The transport owns the connect timeout.
    async fn connect(&self, endpoint: Endpoint) -> Result<Box<dyn Link>, TransportError>;
}

/// Configuration for [`TcpTransport`].
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Upper bound on the TCP connect. Default: 5 s.
    pub connect_timeout: Duration,
    /// How long a closing link keeps flushing queued writes. Default: 500 ms.
    pub flush_grace: Duration,
    /// Frame size limits.
    pub frame: FrameConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            flush_grace: Duration::from_millis(500),
            frame: FrameConfig::default(),
        }
    }
}

/// TCP [`Transport`] delivering inbound messages into a shared queue.
pub struct TcpTransport {
    config: TransportConfig,
    inbound: Arc<PacketQueue>,
}

impl TcpTransport {
    /// Create a transport whose links push inbound messages into `inbound`.
    pub fn new(config: TransportConfig, inbound: Arc<PacketQueue>) -> Self {
        Self { config, inbound }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&self, endpoint: Endpoint) -> Result<Box<dyn Link>, TransportError> {
        let timeout = self.config.connect_timeout;
        let stream = tokio::time::timeout(timeout, TcpStream::connect(endpoint.socket_addr()))
            .await
            .map_err(|_| TransportError::Timeout(timeout))??;
        stream.set_nodelay(true)?;

        tracing::debug!(%endpoint, "transport connected");
        Ok(Box::new(TcpLink::spawn(
            stream,
            Arc::clone(&self.inbound),
            self.config.clone(),
        )))
    }
}

/// Handle to a connected TCP stream.
///
/// Dropping the handle has the same effect as [`Link::close`].
pub struct TcpLink {
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    state: Arc<StateWatch<LinkState>>,
    shutdown_tx: watch::Sender<bool>,
    frame: FrameConfig,
}

impl TcpLink {
    fn spawn(stream: TcpStream, inbound: Arc<PacketQueue>, config: TransportConfig) -> Self {
        let state = Arc::new(StateWatch::new(LinkState::Connected));
        let (reader, writer) = stream.into_split();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(read_loop(
            reader,
            inbound,
            Arc::clone(&state),
            config.frame.clone(),
            shutdown_rx.clone(),
        ));
        tokio::spawn(write_loop(
            writer,
            outbound_rx,
            Arc::clone(&state),
            config.clone(),
            shutdown_rx,
        ));

        Self {
            outbound,
            state,
            shutdown_tx,
            frame: config.frame,
        }
    }
}

impl Link for TcpLink {
    fn send(&self, message: &Message) -> Result<(), TransportError> {
        if self.state.current() != LinkState::Connected {
            return Err(TransportError::Closed);
        }
        let payload = serialize_message(message).map_err(FrameError::from)?;
        self.frame.check_len(payload.len())?;
        self.outbound
            .send(payload)
            .map_err(|_| TransportError::Closed)
    }

    fn is_open(&self) -> bool {
        self.state.current() == LinkState::Connected
    }

    fn close(self: Box<Self>) {
        if self.state.current() == LinkState::Connected {
            self.state.set(LinkState::Closing);
        }
        let _ = self.shutdown_tx.send(true);
        // Dropping `self` drops the outbound sender, ending the writer's queue.
    }
}

/// Decode frames until the stream ends or shutdown is signalled.
async fn read_loop(
    mut reader: OwnedReadHalf,
    inbound: Arc<PacketQueue>,
    state: Arc<StateWatch<LinkState>>,
    frame: FrameConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            result = read_message(&mut reader, &frame) => match result {
                Ok(message) => inbound.push(message),
                Err(FrameError::Decode(e)) => {
                    tracing::warn!(error = %e, "skipping undecodable frame");
                }
                Err(FrameError::ConnectionClosed) => {
                    tracing::info!("server closed the connection");
                    state.set(LinkState::Disconnected);
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "read failed, dropping link");
                    state.set(LinkState::Disconnected);
                    break;
                }
            },
            _ = shutdown_signalled(&mut shutdown_rx) => break,
        }
    }
}

/// Write queued payloads in order.
///
/// Once shutdown is signalled, everything still to be written (including a
/// frame already in progress) shares one `flush_grace` deadline. Whatever has
/// not gone out by then is dropped and the write side is closed.
async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    state: Arc<StateWatch<LinkState>>,
    config: TransportConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut deadline: Option<Instant> = None;

    loop {
        let next = match deadline {
            Some(_) => outbound.try_recv().ok(),
            None => tokio::select! {
                next = outbound.recv() => next,
                _ = shutdown_signalled(&mut shutdown_rx) => {
                    deadline = Some(Instant::now() + config.flush_grace);
                    continue;
                }
            },
        };
        let Some(payload) = next else { break };

        let write = write_frame(&mut writer, &payload, &config.frame);
        tokio::pin!(write);
        let result = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, &mut write).await,
            None => tokio::select! {
                result = &mut write => Ok(result),
                _ = shutdown_signalled(&mut shutdown_rx) => {
                    let flush_until = Instant::now() + config.flush_grace;
                    deadline = Some(flush_until);
                    tokio::time::timeout_at(flush_until, &mut write).await
                }
            },
        };

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) if deadline.is_some() => {
                tracing::debug!(error = %e, "flush on close failed");
                break;
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "write failed, dropping link");
                state.set(LinkState::Disconnected);
                return;
            }
            Err(_) => {
                tracing::warn!(grace = ?config.flush_grace, "flush on close timed out");
                break;
            }
        }
    }

    let _ = writer.shutdown().await;
    state.set(LinkState::Disconnected);
}

/// Resolves once close is requested or the link handle is gone.
async fn shutdown_signalled(shutdown_rx: &mut watch::Receiver<bool>) {
    // An error means the sender was dropped, which counts as shutdown.
    let _ = shutdown_rx.wait_for(|stop| *stop).await;
}
