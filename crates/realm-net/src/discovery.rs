//! Endpoint discovery: ask an HTTP discovery service where the game server is.
//!
//! The service answers a single `GET` with a JSON document describing the
//! server address and a set of named ports:
//!
//! ```json
//! {"status": {"address": "10.0.0.5",
//!             "ports": [{"name": "debug", "port": 1000},
//!                       {"name": "default", "port": 2000}]}}
//! ```
//!
//! The port named [`DEFAULT_PORT_NAME`] is the game port. Anything missing or
//! malformed is a [`ResolveError`]; there is no fallback endpoint and no retry.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

/// Logical name of the game port in the discovery document.
pub const DEFAULT_PORT_NAME: &str = "default";

/// A resolved game server address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Server IP address.
    pub ip: IpAddr,
    /// Game port, never 0.
    pub port: u16,
}

impl Endpoint {
    /// Socket address suitable for a TCP connect.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.socket_addr().fmt(f)
    }
}

/// Why a discovery request produced no endpoint.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The HTTP request itself failed (unreachable, timeout, bad body).
    #[error("discovery request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("discovery service returned status {0}")]
    Status(u16),

    /// The body is not the expected JSON shape.
    #[error("malformed discovery response: {0}")]
    Json(#[from] serde_json::Error),

    /// No `status` object in the document.
    #[error("discovery response has no status")]
    MissingStatus,

    /// No `status.address` field.
    #[error("discovery response has no address")]
    MissingAddress,

    /// No `status.ports` list.
    #[error("discovery response has no port list")]
    MissingPorts,

    /// No port entry named [`DEFAULT_PORT_NAME`].
    #[error("no port named \"default\" in discovery response")]
    NoDefaultPort,

    /// The default port is not a number in `1..=65535`.
    #[error("invalid port value: {0}")]
    InvalidPort(String),

    /// The address is not an IP address.
    #[error("invalid server address: {0}")]
    InvalidAddress(String),
}

#[derive(Deserialize)]
struct DiscoveryResponse {
    status: Option<ServerStatus>,
}

#[derive(Deserialize)]
struct ServerStatus {
    address: Option<String>,
    ports: Option<Vec<PortEntry>>,
}

#[derive(Deserialize)]
struct PortEntry {
    name: Option<Value>,
    port: Option<Value>,
}

/// Extract the default game endpoint from a discovery document.
pub fn parse_discovery(body: &str) -> Result<Endpoint, ResolveError> {
    let response: DiscoveryResponse = serde_json::from_str(body)?;
    let status = response.status.ok_or(ResolveError::MissingStatus)?;
    let address = status.address.ok_or(ResolveError::MissingAddress)?;
    let ports = status.ports.ok_or(ResolveError::MissingPorts)?;

    let entry = ports
        .iter()
        .find(|entry| {
            // Names that are not strings can never match.
            entry.name.as_ref().and_then(Value::as_str) == Some(DEFAULT_PORT_NAME)
        })
        .ok_or(ResolveError::NoDefaultPort)?;
    let port = parse_port(entry.port.as_ref())?;

    let ip = address
        .trim()
        .parse::<IpAddr>()
        .map_err(|_| ResolveError::InvalidAddress(address.clone()))?;

    Ok(Endpoint { ip, port })
}

/// Ports arrive as JSON integers, occasionally as numeric strings.
fn parse_port(value: Option<&Value>) -> Result<u16, ResolveError> {
    let raw = match value {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    };

    raw.and_then(|p| u16::try_from(p).ok())
        .filter(|p| *p != 0)
        .ok_or_else(|| {
            ResolveError::InvalidPort(
                value.map_or_else(|| "missing".to_string(), Value::to_string),
            )
        })
}

/// Something that can turn a discovery URL into an [`Endpoint`].
#[async_trait]
pub trait Resolve: Send + Sync {
    /// Perform one resolution. Implementations must not retry.
    async fn resolve(&self, discovery_url: &str) -> Result<Endpoint, ResolveError>;
}

/// [`Resolve`] over HTTP with a shared `reqwest` client.
///
/// The request timeout is the only timeout applied to discovery.
pub struct HttpResolver {
    client: reqwest::Client,
}

impl HttpResolver {
    /// Build a resolver whose requests give up after `request_timeout`.
    pub fn new(request_timeout: Duration) -> Result<Self, ResolveError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Resolve for HttpResolver {
    async fn resolve(&self, discovery_url: &str) -> Result<Endpoint, ResolveError> {
        tracing::debug!(url = discovery_url, "querying discovery service");

        let response = self.client.get(discovery_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        let endpoint = parse_discovery(&body)?;
        tracing::debug!(%endpoint, "discovery resolved");
        Ok(endpoint)
    }
}
