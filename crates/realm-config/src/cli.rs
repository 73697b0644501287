//! Command-line arguments for the realm client.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Realm client command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "realm-client", about = "Realm game client")]
pub struct CliArgs {
    /// Discovery service URL.
    #[arg(long)]
    pub discovery_url: Option<String>,

    /// Identity token to connect as.
    #[arg(long)]
    pub identity: Option<String>,

    /// Frame loop rate in Hz.
    #[arg(long)]
    pub frame_rate: Option<u32>,

    /// Exit after this many frames instead of waiting for Ctrl-C.
    #[arg(long)]
    pub frames: Option<u64>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref url) = args.discovery_url {
            self.network.discovery_url = url.clone();
        }
        if let Some(ref identity) = args.identity {
            self.client.identity = identity.clone();
        }
        if let Some(rate) = args.frame_rate {
            self.client.frame_rate = rate;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
