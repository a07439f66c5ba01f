//! Process-wide tracing setup shared by both binaries.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install a stderr fmt subscriber. `RUST_LOG` wins over `level` when set.
/// Calling twice is harmless (the second init is ignored).
pub fn init(level: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .try_init();
}
