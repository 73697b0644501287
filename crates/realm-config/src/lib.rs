//! Configuration for the realm client.
//!
//! Settings persist to disk as `config.ron` and can be overridden from the
//! command line. Every section is `#[serde(default)]`, so old or partial files
//! keep loading as fields are added.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{CONFIG_FILE_NAME, ClientConfig, Config, DebugConfig, NetworkConfig, default_config_dir};
pub use error::ConfigError;
