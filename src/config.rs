//! Config load, env overrides, validation.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:3100/api/workflow";
pub const DEFAULT_MESSAGES_ENDPOINT: &str = "http://127.0.0.1:3100/api/messages";
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;
pub const DEFAULT_AGENT: &str = "main";
pub const DEFAULT_PRIORITY_LABEL: &str = "Boss";
pub const DEFAULT_BIND: &str = "127.0.0.1:18790";
pub const DEFAULT_THRESHOLD: u32 = 2;
pub const DEFAULT_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 3;
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 8;
pub const DEFAULT_CHANNEL_PATH: &str = "channels.telegram";

/// Root config: notifier, host adapter server, watchdog.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub notifier: Option<NotifierConfig>,
    pub server: Option<ServerConfig>,
    pub watchdog: Option<WatchdogConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NotifierConfig {
    /// Workflow endpoint (`start_flow` / `agent_complete`).
    pub endpoint: Option<String>,
    /// Messages feed endpoint (`received` / `sent` / `exec_error`).
    pub messages_endpoint: Option<String>,
    pub enabled: Option<bool>,
    pub timeout_ms: Option<u64>,
    /// Sender ids whose traffic is forwarded. Compared as strings.
    pub priority_senders: Option<Vec<String>>,
    /// Agent label attached to workflow payloads.
    pub agent: Option<String>,
    /// Display label for priority senders in dashboard payloads.
    pub priority_label: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServerConfig {
    pub bind: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WatchdogConfig {
    pub state_file: Option<String>,
    pub threshold: Option<u32>,
    pub interval_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub probe_timeout_secs: Option<u64>,
    pub proxy_url: Option<String>,
    pub tunnel_url: Option<String>,
    pub gateway_url: Option<String>,
    /// Optional; probed and logged but never gates a transition.
    pub aux_url: Option<String>,
    pub channel_config_file: Option<String>,
    /// Dotted path of the channel object inside the channel config file.
    pub channel_path: Option<String>,
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<String>,
    pub webhook_path: Option<String>,
    pub restart_url: Option<String>,
    pub gateway_token: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io: {0}")]
    Io(String),
    #[error("config parse: {0}")]
    Parse(String),
    #[error("config: {0}")]
    Validation(String),
}

impl Config {
    /// Notifier section, or all-defaults when absent.
    pub fn notifier(&self) -> NotifierConfig {
        self.notifier.clone().unwrap_or_default()
    }

    pub fn watchdog(&self) -> WatchdogConfig {
        self.watchdog.clone().unwrap_or_default()
    }

    pub fn bind_addr(&self) -> &str {
        self.server
            .as_ref()
            .and_then(|s| s.bind.as_deref())
            .unwrap_or(DEFAULT_BIND)
    }
}

impl NotifierConfig {
    pub fn endpoint(&self) -> &str {
        non_empty(&self.endpoint).unwrap_or(DEFAULT_ENDPOINT)
    }

    pub fn messages_endpoint(&self) -> &str {
        non_empty(&self.messages_endpoint).unwrap_or(DEFAULT_MESSAGES_ENDPOINT)
    }

    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS)
    }

    pub fn agent(&self) -> &str {
        non_empty(&self.agent).unwrap_or(DEFAULT_AGENT)
    }

    pub fn priority_label(&self) -> &str {
        non_empty(&self.priority_label).unwrap_or(DEFAULT_PRIORITY_LABEL)
    }

    pub fn priority_senders(&self) -> &[String] {
        self.priority_senders.as_deref().unwrap_or(&[])
    }
}

impl WatchdogConfig {
    /// State file path; defaults to `~/.kcc/watchdog-state.json`.
    pub fn state_file(&self) -> PathBuf {
        match non_empty(&self.state_file) {
            Some(p) => expand_home(p),
            None => kcc_dir().join("watchdog-state.json"),
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold.unwrap_or(DEFAULT_THRESHOLD)
    }

    pub fn interval_secs(&self) -> u64 {
        self.interval_secs.unwrap_or(DEFAULT_INTERVAL_SECS)
    }

    pub fn connect_timeout_secs(&self) -> u64 {
        self.connect_timeout_secs
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS)
    }

    pub fn probe_timeout_secs(&self) -> u64 {
        self.probe_timeout_secs.unwrap_or(DEFAULT_PROBE_TIMEOUT_SECS)
    }

    pub fn proxy_url(&self) -> &str {
        non_empty(&self.proxy_url).unwrap_or("http://127.0.0.1:80/health")
    }

    pub fn tunnel_url(&self) -> &str {
        non_empty(&self.tunnel_url).unwrap_or("http://127.0.0.1:20241/ready")
    }

    pub fn gateway_url(&self) -> &str {
        non_empty(&self.gateway_url).unwrap_or("http://127.0.0.1:18789/health")
    }

    pub fn aux_url(&self) -> Option<&str> {
        non_empty(&self.aux_url)
    }

    pub fn channel_config_file(&self) -> PathBuf {
        match non_empty(&self.channel_config_file) {
            Some(p) => expand_home(p),
            None => home_dir().join(".openclaw").join("openclaw.json"),
        }
    }

    pub fn channel_path(&self) -> &str {
        non_empty(&self.channel_path).unwrap_or(DEFAULT_CHANNEL_PATH)
    }

    pub fn restart_url(&self) -> &str {
        non_empty(&self.restart_url).unwrap_or("http://127.0.0.1:18789/api/restart")
    }

    pub fn gateway_token(&self) -> Option<&str> {
        non_empty(&self.gateway_token)
    }
}

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn kcc_dir() -> PathBuf {
    home_dir().join(".kcc")
}

fn expand_home(p: &str) -> PathBuf {
    match p.strip_prefix("~/") {
        Some(rest) => home_dir().join(rest),
        None => PathBuf::from(p),
    }
}

/// Default config path: `$KCC_CONFIG` or `~/.kcc/config.toml`.
pub fn default_config_path() -> PathBuf {
    match std::env::var("KCC_CONFIG") {
        Ok(p) if !p.trim().is_empty() => expand_home(p.trim()),
        _ => kcc_dir().join("config.toml"),
    }
}

/// Load config from `path` (missing file = defaults), apply env overrides, validate.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let mut cfg = match std::fs::read_to_string(path) {
        Ok(s) => toml::from_str::<Config>(&s).map_err(|e| ConfigError::Parse(e.to_string()))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
        Err(e) => return Err(ConfigError::Io(format!("{}: {}", path.display(), e))),
    };
    apply_env_overrides(&mut cfg);
    validate(&cfg)?;
    Ok(cfg)
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn apply_env_overrides(cfg: &mut Config) {
    let notifier = cfg.notifier.get_or_insert_with(Default::default);
    if let Some(v) = env_non_empty("KCC_ENDPOINT") {
        notifier.endpoint = Some(v);
    }
    if let Some(v) = env_non_empty("KCC_MESSAGES_ENDPOINT") {
        notifier.messages_endpoint = Some(v);
    }
    let watchdog = cfg.watchdog.get_or_insert_with(Default::default);
    if let Some(v) = env_non_empty("KCC_GATEWAY_TOKEN") {
        watchdog.gateway_token = Some(v);
    }
    if let Some(v) = env_non_empty("KCC_WEBHOOK_SECRET") {
        watchdog.webhook_secret = Some(v);
    }
}

fn is_http_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

fn validate(cfg: &Config) -> Result<(), ConfigError> {
    let n = cfg.notifier();
    if n.timeout_ms() == 0 {
        return Err(ConfigError::Validation(
            "notifier.timeout-ms must be > 0".into(),
        ));
    }
    for (key, url) in [
        ("notifier.endpoint", n.endpoint()),
        ("notifier.messages-endpoint", n.messages_endpoint()),
    ] {
        if !is_http_url(url) {
            return Err(ConfigError::Validation(format!(
                "{key} must be an http(s) URL, got {url:?}"
            )));
        }
    }
    let w = cfg.watchdog();
    if w.threshold() == 0 {
        return Err(ConfigError::Validation(
            "watchdog.threshold must be >= 1".into(),
        ));
    }
    if w.interval_secs() == 0 {
        return Err(ConfigError::Validation(
            "watchdog.interval-secs must be >= 1".into(),
        ));
    }
    Ok(())
}
