//! kcc-notify: host adapter server with the dashboard notifier plugin registered.
//!
//! Config: `~/.kcc/config.toml`, `$KCC_CONFIG`, or `--config`.

use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use kcc_notify::config;
use kcc_notify::logging;
use kcc_notify::notifier;
use kcc_notify::server::{self, HostAdapter};

#[derive(Parser, Debug)]
#[command(name = "kcc-notify")]
#[command(about = "Forward chat and exec-failure events to the KCC dashboard", version)]
struct Args {
    /// Config file (default: $KCC_CONFIG or ~/.kcc/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides [server] bind
    #[arg(short, long)]
    bind: Option<String>,

    /// Log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    logging::init(&args.log_level);

    let path = args.config.unwrap_or_else(config::default_config_path);
    let cfg = match config::load(&path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    };
    info!(config = %path.display(), version = env!("CARGO_PKG_VERSION"), "kcc-notify starting");

    let mut host = HostAdapter::new();
    notifier::register(&cfg.notifier(), &mut host);
    info!(hooks = host.hook_count(), "plugins registered");

    let bind = args.bind.unwrap_or_else(|| cfg.bind_addr().to_string());
    if let Err(e) = server::serve(host.into_router(), &bind).await {
        eprintln!("error: {}: {}", bind, e);
        std::process::exit(1);
    }
}
