//! Notifier plugin: forwards priority-sender traffic and concerning exec failures to the
//! dashboard, plus the `POST /kcc-notify` manual trigger.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, info};

use crate::classify;
use crate::config::NotifierConfig;
use crate::dashboard::{
    COMMAND_LIMIT, CONTENT_LIMIT, DashboardClient, FeedMessage, FeedType, WorkflowAction,
    WorkflowPayload, truncate_chars,
};
use crate::events::{HookEvent, HookName, InboundEvent, OutboundEvent, ToolCallResult};
use crate::host::{
    BoxFuture, Dispatch, HookHandler, PluginApi, RouteHandler, RouteMethod, RouteRequest,
    RouteResponse,
};

pub const MANUAL_NOTIFY_PATH: &str = "/kcc-notify";
const MANUAL_FROM: &str = "manual";

/// Event handlers sharing one config and one dashboard client.
pub struct Notifier {
    agent: String,
    priority_label: String,
    priority_senders: Vec<String>,
    dashboard: DashboardClient,
}

impl Notifier {
    pub fn new(cfg: &NotifierConfig) -> Self {
        Self::with_client(cfg, DashboardClient::from_config(cfg))
    }

    pub fn with_client(cfg: &NotifierConfig, dashboard: DashboardClient) -> Self {
        Self {
            agent: cfg.agent().to_string(),
            priority_label: cfg.priority_label().to_string(),
            priority_senders: cfg
                .priority_senders()
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            dashboard,
        }
    }

    pub fn is_priority(&self, id: &str) -> bool {
        let id = id.trim();
        !id.is_empty() && self.priority_senders.iter().any(|p| p == id)
    }

    pub async fn handle(&self, event: HookEvent) -> Dispatch {
        match event {
            HookEvent::MessageReceived(ev) => self.on_message_received(&ev).await,
            HookEvent::MessageSent(ev) => self.on_message_sent(&ev).await,
            HookEvent::AfterToolCall(ev) => self.on_after_tool_call(&ev).await,
        }
    }

    pub async fn on_message_received(&self, ev: &InboundEvent) -> Dispatch {
        if !self.is_priority(&ev.sender_id) {
            return Dispatch::Skipped;
        }
        let content = truncate_chars(&ev.content, CONTENT_LIMIT);
        let fed = self
            .dashboard
            .send_feed(&FeedMessage {
                message: content.clone(),
                from: self.priority_label.clone(),
                kind: FeedType::Received,
            })
            .await;
        let started = self
            .dashboard
            .send_workflow(&WorkflowPayload {
                action: WorkflowAction::StartFlow,
                content: Some(content),
                from: Some(self.priority_label.clone()),
                agent: Some(self.agent.clone()),
                message_id: ev.message_id,
                result: None,
            })
            .await;
        info!(sender = %ev.sender_id, message_id = ?ev.message_id, fed, started, "forwarded inbound message");
        Dispatch::Forwarded {
            delivered: fed && started,
        }
    }

    pub async fn on_message_sent(&self, ev: &OutboundEvent) -> Dispatch {
        if let Some((rule, classify::Verdict::Harmless)) = classify::classify_exec_message(&ev.content)
        {
            debug!(rule, "suppressed harmless exec report in outgoing message");
            return Dispatch::Suppressed { rule };
        }
        if !self.is_priority(&ev.recipient_id) {
            return Dispatch::Skipped;
        }
        let content = truncate_chars(&ev.content, CONTENT_LIMIT);
        let fed = self
            .dashboard
            .send_feed(&FeedMessage {
                message: content.clone(),
                from: self.agent.clone(),
                kind: FeedType::Sent,
            })
            .await;
        // Closes whatever flow the matching inbound message started.
        let completed = self
            .dashboard
            .send_workflow(&WorkflowPayload {
                action: WorkflowAction::AgentComplete,
                content: None,
                from: None,
                agent: Some(self.agent.clone()),
                message_id: None,
                result: Some(content),
            })
            .await;
        info!(recipient = %ev.recipient_id, fed, completed, "forwarded outgoing message");
        Dispatch::Forwarded {
            delivered: fed && completed,
        }
    }

    pub async fn on_after_tool_call(&self, ev: &ToolCallResult) -> Dispatch {
        if ev.tool_name != "exec" {
            return Dispatch::Skipped;
        }
        let exit_code = ev.effective_exit_code();
        if exit_code == 0 && !ev.is_error_status() {
            return Dispatch::Skipped;
        }
        let failure = classify::ExecFailure {
            command: &ev.command,
            exit_code,
            stderr: &ev.stderr,
        };
        if let Some(rule) = classify::matching_failure_rule(&failure) {
            debug!(rule, exit_code, "suppressed harmless exec failure");
            return Dispatch::Suppressed { rule };
        }
        let delivered = self
            .dashboard
            .send_feed(&FeedMessage {
                message: exec_error_message(&ev.command, exit_code, &ev.stderr),
                from: self.agent.clone(),
                kind: FeedType::ExecError,
            })
            .await;
        info!(exit_code, delivered, "forwarded exec failure");
        Dispatch::Forwarded { delivered }
    }

    /// `POST /kcc-notify` body `{content, from?, messageId?}`.
    pub async fn on_manual_notify(&self, body: Option<&Value>) -> RouteResponse {
        let content = body
            .and_then(|b| b.get("content"))
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty());
        let Some(content) = content else {
            return RouteResponse::new(
                400,
                json!({"success": false, "error": "content is required"}),
            );
        };
        let from = body
            .and_then(|b| b.get("from"))
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(MANUAL_FROM);
        let message_id = body.and_then(|b| b.get("messageId")).and_then(Value::as_i64);

        let ok = self
            .dashboard
            .send_workflow(&WorkflowPayload {
                action: WorkflowAction::StartFlow,
                content: Some(truncate_chars(content, CONTENT_LIMIT)),
                from: Some(from.to_string()),
                agent: Some(self.agent.clone()),
                message_id,
                result: None,
            })
            .await;
        info!(from, delivered = ok, "manual notify");
        RouteResponse::new(if ok { 200 } else { 502 }, json!({"success": ok}))
    }
}

/// Feed text for a concerning exec failure: exit code, truncated command, first stderr line.
pub fn exec_error_message(command: &str, exit_code: i64, stderr: &str) -> String {
    let mut msg = format!(
        "exec failed (exit {}): {}",
        exit_code,
        truncate_chars(command.trim(), COMMAND_LIMIT)
    );
    if let Some(line) = stderr.lines().map(str::trim).find(|l| !l.is_empty()) {
        msg.push('\n');
        msg.push_str(&truncate_chars(line, COMMAND_LIMIT));
    }
    msg
}

struct NotifierHook(Arc<Notifier>);

impl HookHandler for NotifierHook {
    fn handle(&self, event: HookEvent) -> BoxFuture<'_, Dispatch> {
        Box::pin(self.0.handle(event))
    }
}

struct ManualNotifyRoute(Arc<Notifier>);

impl RouteHandler for ManualNotifyRoute {
    fn handle(&self, req: RouteRequest) -> BoxFuture<'_, RouteResponse> {
        Box::pin(async move { self.0.on_manual_notify(req.body.as_ref()).await })
    }
}

/// Plugin entry point. Registers nothing when the notifier is disabled.
pub fn register(cfg: &NotifierConfig, api: &mut dyn PluginApi) -> Option<Arc<Notifier>> {
    if !cfg.enabled() {
        info!("notifier disabled; no hooks registered");
        return None;
    }
    let notifier = Arc::new(Notifier::new(cfg));
    for hook in HookName::ALL {
        api.register_hook(hook, Arc::new(NotifierHook(Arc::clone(&notifier))));
    }
    api.register_route(
        RouteMethod::Post,
        MANUAL_NOTIFY_PATH,
        Arc::new(ManualNotifyRoute(Arc::clone(&notifier))),
    );
    info!(
        endpoint = cfg.endpoint(),
        messages_endpoint = cfg.messages_endpoint(),
        priority_senders = notifier.priority_senders.len(),
        "notifier registered"
    );
    Some(notifier)
}
