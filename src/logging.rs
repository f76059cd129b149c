//! Logging initialization for the atomfile binary.

use std::sync::OnceLock;

static INIT: OnceLock<()> = OnceLock::new();

/// Environment variable selecting the log level.
pub const LOG_ENV: &str = "ATOMFILE_LOG";

fn parse_level(value: Option<&str>) -> tracing::Level {
    match value.unwrap_or("warn").to_ascii_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::WARN,
    }
}

/// Install a stderr subscriber at the level named by `ATOMFILE_LOG`.
///
/// Safe to call more than once; only the first call does anything. Stdout
/// stays free for command output.
pub fn init() {
    if INIT.get().is_some() {
        return;
    }
    let level = parse_level(std::env::var(LOG_ENV).ok().as_deref());
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
    let _ = INIT.set(());
}
