//! kcc-watchdog: webhook/polling mode switcher.
//!
//! `once` for cron, `run` for a long-lived timer loop, `status` to print the persisted state.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;

use kcc_notify::config;
use kcc_notify::logging;
use kcc_notify::watchdog::{self, Watchdog, state};

#[derive(Parser, Debug)]
#[command(name = "kcc-watchdog")]
#[command(about = "Switch the chat channel between webhook and polling delivery", version)]
struct Args {
    /// Config file (default: $KCC_CONFIG or ~/.kcc/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level when RUST_LOG is unset
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a single health check and exit
    Once,
    /// Check on a timer until interrupted
    Run {
        /// Seconds between checks, overrides [watchdog] interval-secs
        #[arg(short, long)]
        interval: Option<u64>,
    },
    /// Print the persisted state as JSON
    Status,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    logging::init(&args.log_level);

    let path = args.config.unwrap_or_else(config::default_config_path);
    let cfg = match config::load(&path) {
        Ok(c) => c.watchdog(),
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    };

    match args.command {
        Command::Once => {
            let wd = Watchdog::new(cfg);
            match wd.run_once().await {
                Ok(report) => match serde_json::to_string(&report) {
                    Ok(json) => println!("{json}"),
                    Err(e) => eprintln!("error: {}", e),
                },
                Err(e) => {
                    eprintln!("error: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Command::Run { interval } => {
            let interval = interval.unwrap_or_else(|| cfg.interval_secs());
            if interval == 0 {
                eprintln!("error: interval must be >= 1");
                std::process::exit(1);
            }
            let wd = Watchdog::new(cfg);
            info!(interval_secs = interval, state = %wd.state_file().display(), "watchdog loop started");
            let handle = watchdog::spawn_watchdog(wd, interval);
            let _ = tokio::signal::ctrl_c().await;
            handle.abort();
            info!("watchdog stopped");
        }
        Command::Status => {
            let file = cfg.state_file();
            match state::read(&file).await {
                Ok(st) => {
                    let st = st.unwrap_or_default();
                    match serde_json::to_string_pretty(&st) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("error: {}", e);
                            std::process::exit(1);
                        }
                    }
                }
                Err(e) => {
                    eprintln!("error: {}: {}", file.display(), e);
                    std::process::exit(1);
                }
            }
        }
    }
}
