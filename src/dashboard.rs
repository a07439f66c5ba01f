//! Dashboard client: best-effort JSON POSTs to the workflow and messages-feed endpoints.
//!
//! Every send resolves to a plain `bool`. Network errors, timeouts and non-2xx answers are
//! logged here and never reach the caller as errors.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::NotifierConfig;

/// Max characters of message content forwarded to the dashboard.
pub const CONTENT_LIMIT: usize = 200;
/// Max characters of a shell command in an `exec_error` message.
pub const COMMAND_LIMIT: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowAction {
    StartFlow,
    AgentComplete,
}

/// Body for the workflow endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowPayload {
    pub action: WorkflowAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedType {
    Received,
    Sent,
    ExecError,
}

/// Body for the messages-feed endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedMessage {
    pub message: String,
    pub from: String,
    #[serde(rename = "type")]
    pub kind: FeedType,
}

/// Truncate to at most `max` characters (not bytes).
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Format a reqwest error and its source chain for logging.
fn format_error_chain(e: &impl std::error::Error) -> String {
    let mut s = e.to_string();
    let mut src = e.source();
    while let Some(inner) = src {
        s.push_str(" | ");
        s.push_str(&inner.to_string());
        src = inner.source();
    }
    s
}

/// HTTP client for both dashboard endpoints. Cheap to clone.
#[derive(Clone)]
pub struct DashboardClient {
    client: reqwest::Client,
    workflow_url: String,
    messages_url: String,
}

impl DashboardClient {
    pub fn new(workflow_url: &str, messages_url: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "dashboard client builder failed, using defaults");
                reqwest::Client::new()
            });
        Self {
            client,
            workflow_url: workflow_url.to_string(),
            messages_url: messages_url.to_string(),
        }
    }

    pub fn from_config(cfg: &NotifierConfig) -> Self {
        Self::new(
            cfg.endpoint(),
            cfg.messages_endpoint(),
            Duration::from_millis(cfg.timeout_ms()),
        )
    }

    pub async fn send_workflow(&self, payload: &WorkflowPayload) -> bool {
        self.post(&self.workflow_url, payload, "workflow").await
    }

    pub async fn send_feed(&self, message: &FeedMessage) -> bool {
        self.post(&self.messages_url, message, "messages").await
    }

    async fn post<T: Serialize>(&self, url: &str, body: &T, target: &str) -> bool {
        match self.client.post(url).json(body).send().await {
            Ok(res) if res.status().is_success() => {
                debug!(target_endpoint = target, status = %res.status(), "dashboard delivered");
                true
            }
            Ok(res) => {
                let status = res.status();
                let text = res.text().await.unwrap_or_default();
                warn!(
                    target_endpoint = target,
                    %status,
                    body = %truncate_chars(text.trim(), CONTENT_LIMIT),
                    "dashboard rejected notification"
                );
                false
            }
            Err(e) => {
                warn!(
                    target_endpoint = target,
                    error = %format_error_chain(&e),
                    "dashboard unreachable"
                );
                false
            }
        }
    }
}
