//! Structured logging via `tracing`.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber, writing to stderr so stdout stays free for
/// the rendered explorer.
///
/// `RUST_LOG` takes precedence over `level`. An invalid `level` falls back
/// to `info`. Calling this twice is harmless.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new(crate::config::DEFAULT_LOG_LEVEL));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
