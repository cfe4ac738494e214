//! Logging bootstrap shared by the server and CLI entry points.

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. `RUST_LOG` controls the filter and
/// defaults to `info`. Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init();
}
