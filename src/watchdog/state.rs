//! Persisted watchdog state: `{mode, failureCount, lastCheck, lastSwitch}` as JSON.
//!
//! Writes go to `<file>.tmp` then rename, so a reader never sees a partial record. A lock file
//! next to the state keeps two invocations from interleaving read-modify-write cycles.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::warn;

/// Lock files older than this are assumed abandoned by a crashed run.
const STALE_LOCK: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Webhook,
    Polling,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Mode::Webhook => "webhook",
            Mode::Polling => "polling",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchdogState {
    pub mode: Mode,
    #[serde(default)]
    pub failure_count: u32,
    #[serde(default)]
    pub last_check: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_switch: Option<DateTime<Utc>>,
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("state io: {0}")]
    Io(String),
    #[error("state parse: {0}")]
    Parse(String),
    #[error("watchdog already running (lock {0})")]
    Locked(String),
}

/// Read the state file. `Ok(None)` when it does not exist.
pub async fn read(path: &Path) -> Result<Option<WatchdogState>, StateError> {
    match fs::read_to_string(path).await {
        Ok(s) => serde_json::from_str(&s)
            .map(Some)
            .map_err(|e| StateError::Parse(e.to_string())),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StateError::Io(e.to_string())),
    }
}

/// Read the state file, falling back to `{mode: webhook, failureCount: 0}` when it is
/// missing or unreadable.
pub async fn load(path: &Path) -> WatchdogState {
    match read(path).await {
        Ok(Some(state)) => state,
        Ok(None) => WatchdogState::default(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "watchdog state unreadable, starting fresh");
            WatchdogState::default()
        }
    }
}

/// Atomic save: write `<file>.tmp`, then rename into place. Creates the parent dir.
pub async fn save(path: &Path, state: &WatchdogState) -> Result<(), StateError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StateError::Io(e.to_string()))?;
    }
    let json =
        serde_json::to_string_pretty(state).map_err(|e| StateError::Parse(e.to_string()))?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, &json)
        .await
        .map_err(|e| StateError::Io(e.to_string()))?;
    fs::rename(&tmp, path)
        .await
        .map_err(|e| StateError::Io(e.to_string()))
}

/// Exclusive lock on the state file, released on drop.
#[derive(Debug)]
pub struct StateLock {
    path: PathBuf,
}

impl StateLock {
    pub fn lock_path(state_path: &Path) -> PathBuf {
        state_path.with_extension("lock")
    }

    pub async fn acquire(state_path: &Path) -> Result<Self, StateError> {
        let path = Self::lock_path(state_path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StateError::Io(e.to_string()))?;
        }
        if is_stale(&path).await {
            warn!(lock = %path.display(), "removing stale watchdog lock");
            let _ = fs::remove_file(&path).await;
        }
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(_) => Ok(Self { path }),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(StateError::Locked(path.display().to_string()))
            }
            Err(e) => Err(StateError::Io(e.to_string())),
        }
    }
}

// Sync on purpose: Drop cannot await, and this is a single unlink.
impl Drop for StateLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

async fn is_stale(lock: &Path) -> bool {
    fs::metadata(lock)
        .await
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| SystemTime::now().duration_since(t).ok())
        .is_some_and(|age| age > STALE_LOCK)
}
