//! Structured logging for the realm client.
//!
//! Console output with uptime timestamps and module paths, plus a JSON log file
//! in debug builds. `RUST_LOG` wins over the configured level.

use std::fs::File;
use std::path::Path;

use realm_config::Config;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when neither `RUST_LOG` nor the config names one.
pub const DEFAULT_FILTER: &str = "info,reqwest=warn,hyper=warn";

/// File written inside the log directory in debug builds.
pub const LOG_FILE_NAME: &str = "realm.log";

/// Initialize the global tracing subscriber.
///
/// * `log_dir` - directory for the JSON log file (debug builds only)
/// * `debug_build` - enables the file layer
/// * `config` - supplies `debug.log_level`
///
/// ```no_run
/// use realm_config::Config;
/// use realm_log::init_logging;
///
/// let config = Config::default();
/// init_logging(Some(std::path::Path::new("./logs")), true, Some(&config));
/// ```
pub fn init_logging(log_dir: Option<&Path>, debug_build: bool, config: Option<&Config>) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config_env_filter(config));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(true) // tokio worker names
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if debug_build
        && let Some(log_dir) = log_dir
        && let Some(log_file) = open_log_file(log_dir)
    {
        let file_layer = fmt::layer()
            .with_writer(std::sync::Mutex::new(log_file))
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::uptime())
            .json();

        subscriber.with(file_layer).init();
        return;
    }

    subscriber.init();
}

/// `EnvFilter` built from [`DEFAULT_FILTER`].
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_FILTER)
}

/// Filter from `debug.log_level`, or [`default_env_filter`] when it is unset.
pub fn config_env_filter(config: Option<&Config>) -> EnvFilter {
    match config.map(|config| config.debug.log_level.trim()) {
        Some(level) if !level.is_empty() => EnvFilter::new(level),
        _ => default_env_filter(),
    }
}

/// Create the log directory and truncate [`LOG_FILE_NAME`] inside it.
fn open_log_file(log_dir: &Path) -> Option<File> {
    std::fs::create_dir_all(log_dir).ok()?;
    File::create(log_dir.join(LOG_FILE_NAME)).ok()
}
