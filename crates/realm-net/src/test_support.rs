//! Stub discovery service and game server shared by the crate's tests.

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use crate::framing::{FrameConfig, read_message, write_message};
use crate::messages::Message;

/// Serve `body` with `status` to every request on an ephemeral port.
///
/// Returns the URL to query. The server thread lives until the test process
/// exits.
pub(crate) fn discovery_stub(status: i32, body: String) -> String {
    let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
    let port = server.server_addr().to_ip().unwrap().port();
    std::thread::spawn(move || {
        for request in server.incoming_requests() {
            let response = tiny_http::Response::from_string(body.clone())
                .with_status_code(status)
                .with_header(
                    tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                        .unwrap(),
                );
            let _ = request.respond(response);
        }
    });
    format!("http://127.0.0.1:{port}/")
}

/// Discovery document pointing at `addr` under the default port name.
pub(crate) fn discovery_body(addr: SocketAddr) -> String {
    format!(
        r#"{{"status": {{"address": "{}", "ports": [{{"name": "debug", "port": 1}}, {{"name": "default", "port": {}}}]}}}}"#,
        addr.ip(),
        addr.port()
    )
}

/// One accepted connection on the stub game server.
pub(crate) struct StubPeer {
    /// Every message the client sent, in order. Closed when the client hangs up.
    pub received: mpsc::UnboundedReceiver<Message>,
    /// Messages to push to the client.
    pub outgoing: mpsc::UnboundedSender<Message>,
}

/// Accept a single connection, forward inbound messages to the test and write
/// whatever the test sends back.
pub(crate) async fn game_server_stub() -> (SocketAddr, tokio::sync::oneshot::Receiver<StubPeer>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (peer_tx, peer_rx) = tokio::sync::oneshot::channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (received_tx, received) = mpsc::unbounded_channel();
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let _ = peer_tx.send(StubPeer { received, outgoing });
        serve(stream, received_tx, outgoing_rx).await;
    });

    (addr, peer_rx)
}

async fn serve(
    stream: TcpStream,
    received_tx: mpsc::UnboundedSender<Message>,
    mut outgoing_rx: mpsc::UnboundedReceiver<Message>,
) {
    let config = FrameConfig::default();
    let (mut reader, mut writer) = stream.into_split();

    tokio::spawn(async move {
        while let Some(msg) = outgoing_rx.recv().await {
            if write_message(&mut writer, &msg, &config).await.is_err() {
                break;
            }
        }
    });

    let config = FrameConfig::default();
    while let Ok(msg) = read_message(&mut reader, &config).await {
        if received_tx.send(msg).is_err() {
            break;
        }
    }
}
