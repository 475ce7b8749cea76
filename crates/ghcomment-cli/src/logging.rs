//! Diagnostic logging for the binary.
//!
//! The library crates only emit `tracing` events under the span they are
//! handed; this is the one place a subscriber is installed.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the stderr subscriber.
///
/// `--log-level` wins over `RUST_LOG`; the default is `warn`.
pub fn init(level: Option<&str>) {
    let _ = tracing_subscriber::registry()
        .with(filter(level))
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}

fn filter(level: Option<&str>) -> EnvFilter {
    match level.filter(|l| !l.trim().is_empty()) {
        Some(level) => EnvFilter::try_new(level).unwrap_or_else(|e| {
            eprintln!("ghcomment: invalid log level `{level}`: {e}");
            EnvFilter::new("warn")
        }),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    }
}
