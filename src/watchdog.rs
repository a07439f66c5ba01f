//! Mode watchdog: probe proxy/tunnel/gateway, run the webhook/polling hysteresis, and on a
//! switch rewrite the channel config and restart the gateway.
//!
//! One invocation = one health snapshot. `run_once` is what a cron entry calls;
//! `spawn_watchdog` is the long-running equivalent and serializes invocations on one task.

pub mod channel_config;
pub mod gateway;
pub mod machine;
pub mod probe;
pub mod state;

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::WatchdogConfig;
use channel_config::WebhookSettings;
use machine::HealthSnapshot;
use probe::Prober;
use state::{Mode, StateError, StateLock, WatchdogState};

/// What one invocation saw and did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckReport {
    pub snapshot: HealthSnapshot,
    pub previous_mode: Mode,
    pub state: WatchdogState,
    /// New mode when this invocation switched.
    pub switched: Option<Mode>,
    /// Channel config rewritten successfully (only meaningful on a switch).
    pub config_updated: bool,
    /// Gateway accepted the restart call (only meaningful on a switch).
    pub restarted: bool,
}

pub struct Watchdog {
    cfg: WatchdogConfig,
    state_file: PathBuf,
    prober: Prober,
}

impl Watchdog {
    pub fn new(cfg: WatchdogConfig) -> Self {
        Self {
            state_file: cfg.state_file(),
            prober: Prober::from_config(&cfg),
            cfg,
        }
    }

    pub fn state_file(&self) -> &std::path::Path {
        &self.state_file
    }

    /// Probe, advance the state machine, apply a switch, persist. Errors only when another
    /// invocation holds the state lock; everything else is logged and degrades to "no switch".
    pub async fn run_once(&self) -> Result<CheckReport, StateError> {
        let _lock = StateLock::acquire(&self.state_file).await?;
        let snapshot = self.prober.snapshot(&self.cfg).await;
        Ok(self.apply(snapshot).await)
    }

    /// State-machine half of `run_once`, for a snapshot taken elsewhere.
    pub async fn apply(&self, snapshot: HealthSnapshot) -> CheckReport {
        let mut st = state::load(&self.state_file).await;
        let previous_mode = st.mode;
        let switched = machine::advance(&mut st, &snapshot, self.cfg.threshold(), Utc::now());

        let (config_updated, restarted) = match switched {
            Some(mode) => self.switch_to(mode).await,
            None => (false, false),
        };

        if let Err(e) = state::save(&self.state_file, &st).await {
            warn!(path = %self.state_file.display(), error = %e, "failed to persist watchdog state");
        }

        let report = CheckReport {
            snapshot,
            previous_mode,
            state: st,
            switched,
            config_updated,
            restarted,
        };
        log_report(&report);
        report
    }

    /// Best-effort: a failed config edit or restart is logged and the switch still stands.
    async fn switch_to(&self, mode: Mode) -> (bool, bool) {
        let file = self.cfg.channel_config_file();
        let channel_path = self.cfg.channel_path();
        let edited = match mode {
            Mode::Polling => channel_config::disable_webhook(&file, channel_path).await,
            Mode::Webhook => {
                let settings = WebhookSettings {
                    url: self.cfg.webhook_url.clone().unwrap_or_default(),
                    secret: self.cfg.webhook_secret.clone(),
                    path: self.cfg.webhook_path.clone(),
                };
                channel_config::enable_webhook(&file, channel_path, &settings).await
            }
        };
        let config_updated = match edited {
            Ok(()) => true,
            Err(e) => {
                warn!(%mode, file = %file.display(), error = %e, "channel config not updated");
                false
            }
        };
        let restarted = gateway::restart(
            self.prober.client(),
            self.cfg.restart_url(),
            self.cfg.gateway_token(),
        )
        .await;
        (config_updated, restarted)
    }
}

fn log_report(r: &CheckReport) {
    let s = &r.snapshot;
    match r.switched {
        Some(mode) => info!(
            from = %r.previous_mode,
            to = %mode,
            proxy = s.proxy,
            tunnel = s.tunnel,
            gateway = s.gateway,
            config_updated = r.config_updated,
            restarted = r.restarted,
            "delivery mode switched"
        ),
        None => info!(
            mode = %r.state.mode,
            failure_count = r.state.failure_count,
            proxy = s.proxy,
            tunnel = s.tunnel,
            gateway = s.gateway,
            aux = ?s.aux,
            "health check"
        ),
    }
}

/// Run `run_once` every `interval_secs` on one task; the first check fires immediately.
///
/// # Panics
/// Panics if `interval_secs == 0` (config validation rejects it).
pub fn spawn_watchdog(watchdog: Watchdog, interval_secs: u64) -> tokio::task::JoinHandle<()> {
    assert!(interval_secs >= 1, "watchdog interval_secs must be >= 1");
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if let Err(e) = watchdog.run_once().await {
                warn!(error = %e, "watchdog check skipped");
            }
        }
    })
}
