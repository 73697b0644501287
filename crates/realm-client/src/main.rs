//! Realm client: connects to the game server found through the discovery
//! service and runs a fixed-rate frame loop.
//!
//! Run with `cargo run -p realm-client -- --identity abc123`.
//! Pass `--frames 300` to exit on its own after five seconds at 60 Hz.

mod overlay;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use realm_config::{CliArgs, Config, default_config_dir};
use realm_net::{
    ConnectOutcome, ConnectionManager, FrameConfig, HttpResolver, PacketQueue, TcpTransport,
    TransportConfig,
};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::overlay::LogOverlay;

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    let config_dir = args.config.clone().unwrap_or_else(default_config_dir);

    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    realm_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    let resolver = match HttpResolver::new(config.network.http_timeout()) {
        Ok(resolver) => resolver,
        Err(e) => {
            error!(error = %e, "failed to build discovery client");
            return ExitCode::FAILURE;
        }
    };

    let queue = Arc::new(PacketQueue::new());
    let transport = TcpTransport::new(
        TransportConfig {
            connect_timeout: config.network.connect_timeout(),
            flush_grace: config.network.leave_flush(),
            frame: FrameConfig {
                max_payload_size: config.network.max_frame_bytes,
            },
        },
        Arc::clone(&queue),
    );

    let overlay = LogOverlay::new();
    let mut manager = ConnectionManager::new(
        config.network.discovery_url.clone(),
        Arc::new(resolver),
        Arc::new(transport),
        Box::new(overlay.clone()),
    );

    if config.client.auto_connect {
        manager.connect(&config.client.identity);
    }

    run_frames(
        &mut manager,
        &queue,
        &overlay,
        config.client.frame_interval(),
        args.frames,
    )
    .await;

    if manager.disconnect() {
        // Give the writer task time to put LEAVE on the wire before the
        // runtime shuts down.
        tokio::time::sleep(config.network.leave_flush()).await;
    }
    info!("client stopped");
    ExitCode::SUCCESS
}

/// Tick until Ctrl-C or until `frame_limit` frames have run.
async fn run_frames(
    manager: &mut ConnectionManager,
    queue: &PacketQueue,
    overlay: &LogOverlay,
    frame_interval: Duration,
    frame_limit: Option<u64>,
) {
    let mut interval = tokio::time::interval(frame_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut frame: u64 = 0;
    loop {
        tokio::select! {
            _ = interval.tick() => {}
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    warn!(error = %e, "failed to listen for Ctrl-C");
                }
                info!(frame, "interrupted");
                return;
            }
        }

        update(manager, queue, overlay, frame);

        frame += 1;
        if frame_limit.is_some_and(|limit| frame >= limit) {
            info!(frame, "frame limit reached");
            return;
        }
    }
}

/// One frame: apply a finished connection attempt, then consume inbound packets.
fn update(manager: &mut ConnectionManager, queue: &PacketQueue, overlay: &LogOverlay, frame: u64) {
    if let Some(ConnectOutcome::Connected) = manager.poll()
        && let Some(connection) = manager.current_connection()
    {
        info!(client_id = %connection.client_id(), endpoint = %connection.endpoint(), "session started");
    }

    if manager
        .current_connection()
        .is_some_and(|connection| !connection.is_open())
    {
        warn!("server closed the connection");
        manager.disconnect();
    }

    let messages = queue.drain_all();
    if !messages.is_empty() || overlay.is_visible() {
        debug!(frame, inbound = messages.len(), connecting = overlay.is_visible(), "frame");
    }
    for message in &messages {
        debug!(id = ?message.id(), "inbound message");
    }
}
