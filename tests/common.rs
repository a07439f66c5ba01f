#![allow(dead_code)]

use std::path::{Path, PathBuf};

use serde_json::Value;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use kcc_notify::config::{NotifierConfig, WatchdogConfig};

pub const WORKFLOW_PATH: &str = "/api/workflow";
pub const MESSAGES_PATH: &str = "/api/messages";
pub const PRIORITY_SENDER: &str = "167090545";

/// Dashboard stand-in serving both the workflow and messages-feed endpoints.
pub struct MockDashboard {
    pub server: MockServer,
}

impl MockDashboard {
    pub async fn new() -> Self {
        let server = MockServer::start().await;
        Self { server }
    }

    pub fn workflow_url(&self) -> String {
        format!("{}{}", self.server.uri(), WORKFLOW_PATH)
    }

    pub fn messages_url(&self) -> String {
        format!("{}{}", self.server.uri(), MESSAGES_PATH)
    }

    /// Answer `status` on the workflow endpoint, expecting exactly `times` calls.
    pub async fn expect_workflow(&self, status: u16, times: u64) {
        Mock::given(method("POST"))
            .and(path(WORKFLOW_PATH))
            .respond_with(ResponseTemplate::new(status))
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// Answer `status` on the messages endpoint, expecting exactly `times` calls.
    pub async fn expect_feed(&self, status: u16, times: u64) {
        Mock::given(method("POST"))
            .and(path(MESSAGES_PATH))
            .respond_with(ResponseTemplate::new(status))
            .expect(times)
            .mount(&self.server)
            .await;
    }

    pub async fn requests(&self) -> Vec<Request> {
        self.server.received_requests().await.unwrap_or_default()
    }

    /// JSON bodies of every request that hit `endpoint`, in arrival order.
    pub async fn bodies(&self, endpoint: &str) -> Vec<Value> {
        self.requests()
            .await
            .into_iter()
            .filter(|r| r.url.path() == endpoint)
            .map(|r| serde_json::from_slice(&r.body).unwrap())
            .collect()
    }
}

pub fn notifier_config(dash: &MockDashboard) -> NotifierConfig {
    NotifierConfig {
        endpoint: Some(dash.workflow_url()),
        messages_endpoint: Some(dash.messages_url()),
        enabled: Some(true),
        timeout_ms: Some(2000),
        priority_senders: Some(vec![PRIORITY_SENDER.to_string()]),
        agent: Some("main".to_string()),
        priority_label: Some("Boss".to_string()),
    }
}

/// Temp dir holding the watchdog state file and the channel config file.
pub struct WatchdogFiles {
    _tmp: TempDir,
    pub root: PathBuf,
}

impl WatchdogFiles {
    pub fn new() -> Self {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let root = tmp.path().to_path_buf();
        Self { _tmp: tmp, root }
    }

    pub fn state_file(&self) -> PathBuf {
        self.root.join("watchdog-state.json")
    }

    pub fn channel_config(&self) -> PathBuf {
        self.root.join("openclaw.json")
    }

    pub fn write_channel_config(&self, doc: &Value) {
        std::fs::write(self.channel_config(), serde_json::to_string_pretty(doc).unwrap()).unwrap();
    }

    pub fn read_channel_config(&self) -> Value {
        read_json(&self.channel_config())
    }
}

pub fn read_json(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

/// Proxy, tunnel, gateway and restart endpoints on one mock server, by path.
pub struct MockServices {
    pub server: MockServer,
}

impl MockServices {
    pub async fn new() -> Self {
        let server = MockServer::start().await;
        Self { server }
    }

    pub fn url(&self, p: &str) -> String {
        format!("{}{}", self.server.uri(), p)
    }

    pub async fn health(&self, p: &str, status: u16) {
        Mock::given(method("GET"))
            .and(path(p))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    pub async fn all_up(&self) {
        for p in ["/proxy", "/tunnel", "/gateway"] {
            self.health(p, 200).await;
        }
    }

    pub async fn expect_restart(&self, times: u64) {
        Mock::given(method("POST"))
            .and(path("/restart"))
            .respond_with(ResponseTemplate::new(200))
            .expect(times)
            .mount(&self.server)
            .await;
    }

    pub fn watchdog_config(&self, files: &WatchdogFiles) -> WatchdogConfig {
        WatchdogConfig {
            state_file: Some(files.state_file().to_string_lossy().to_string()),
            threshold: Some(2),
            interval_secs: Some(60),
            connect_timeout_secs: Some(1),
            probe_timeout_secs: Some(2),
            proxy_url: Some(self.url("/proxy")),
            tunnel_url: Some(self.url("/tunnel")),
            gateway_url: Some(self.url("/gateway")),
            aux_url: None,
            channel_config_file: Some(files.channel_config().to_string_lossy().to_string()),
            channel_path: Some("channels.telegram".to_string()),
            webhook_url: Some("https://bot.example.com/telegram-webhook".to_string()),
            webhook_secret: Some("hook-secret".to_string()),
            webhook_path: Some("/telegram-webhook".to_string()),
            restart_url: Some(self.url("/restart")),
            gateway_token: Some("gw-token".to_string()),
        }
    }
}
