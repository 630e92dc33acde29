//! Tracing subscriber setup for the binaries.

use tracing_subscriber::EnvFilter;

/// Installs a formatted subscriber on stderr, leaving stdout for CSV output.
///
/// `RUST_LOG` takes precedence over `default_filter`. Calling this more than once is a no-op.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
