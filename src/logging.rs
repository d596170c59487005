//! Logging setup for the `little-owl` binary.
//!
//! Logs go to stderr so stdout stays clean for table and CSV output.

use tracing_subscriber::EnvFilter;

/// Initializes stderr logging. `RUST_LOG` overrides the default `warn` level.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}
