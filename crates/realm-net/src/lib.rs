//! Client networking: discovery, framing, the inbound packet queue and the
//! connection lifecycle.

pub mod discovery;
pub mod framing;
pub mod handshake;
pub mod lifecycle;
pub mod messages;
pub mod queue;
pub mod state;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use discovery::{DEFAULT_PORT_NAME, Endpoint, HttpResolver, Resolve, ResolveError};
pub use framing::{FrameConfig, FrameError, read_frame, write_frame};
pub use lifecycle::{
    ConnectError, ConnectOutcome, ConnectRequest, Connection, ConnectionManager,
    ConnectionObserver, LifecycleState, NoopObserver,
};
pub use messages::{Enter, GamePacket, Leave, Message, MsgId};
pub use queue::PacketQueue;
pub use state::StateWatch;
pub use transport::{Link, LinkState, TcpTransport, Transport, TransportConfig, TransportError};
