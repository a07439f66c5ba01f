//! Webhook/polling hysteresis. Pure: no I/O, the caller supplies the snapshot and clock.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::state::{Mode, WatchdogState};

/// Result of one round of health probes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    pub proxy: bool,
    pub tunnel: bool,
    pub gateway: bool,
    /// `None` when no auxiliary service is configured. Never affects transitions.
    pub aux: Option<bool>,
}

impl HealthSnapshot {
    /// Webhook delivery path (reverse proxy + public tunnel) is reachable.
    pub fn webhook_path_up(&self) -> bool {
        self.proxy && self.tunnel
    }

    /// Everything webhook mode depends on is up.
    pub fn webhook_ready(&self) -> bool {
        self.webhook_path_up() && self.gateway
    }
}

/// Advance `state` by one check. Returns the new mode when this check crossed the threshold.
///
/// In webhook mode `failure_count` counts consecutive checks with the webhook path down; in
/// polling mode it counts consecutive checks with everything up. Any check pointing the other
/// way resets it, and so does a switch.
pub fn advance(
    state: &mut WatchdogState,
    snapshot: &HealthSnapshot,
    threshold: u32,
    now: DateTime<Utc>,
) -> Option<Mode> {
    state.last_check = Some(now);
    let (adverse, target) = match state.mode {
        Mode::Webhook => (!snapshot.webhook_path_up(), Mode::Polling),
        Mode::Polling => (snapshot.webhook_ready(), Mode::Webhook),
    };
    if !adverse {
        state.failure_count = 0;
        return None;
    }
    state.failure_count = state.failure_count.saturating_add(1);
    if state.failure_count < threshold.max(1) {
        return None;
    }
    state.mode = target;
    state.failure_count = 0;
    state.last_switch = Some(now);
    Some(target)
}
