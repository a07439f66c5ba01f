//! Host hook events decoded at the plugin boundary.
//!
//! The host hands over loosely-shaped JSON. Each hook kind gets its own struct; missing string
//! fields default to empty and numeric ids accept numbers or numeric strings. A tool call
//! without a tool name is rejected.

use serde_json::Value;
use thiserror::Error;

/// Hook names the host dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookName {
    MessageReceived,
    MessageSent,
    AfterToolCall,
}

impl HookName {
    pub const ALL: [HookName; 3] = [
        HookName::MessageReceived,
        HookName::MessageSent,
        HookName::AfterToolCall,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HookName::MessageReceived => "message_received",
            HookName::MessageSent => "message_sent",
            HookName::AfterToolCall => "after_tool_call",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|h| h.as_str() == s)
    }
}

impl std::fmt::Display for HookName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("event is not a JSON object")]
    NotAnObject,
    #[error("event missing required field '{0}'")]
    Missing(&'static str),
}

/// A message that arrived from a channel user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InboundEvent {
    pub kind: String,
    pub sender_id: String,
    pub content: String,
    pub message_id: Option<i64>,
    pub timestamp: String,
}

/// A message the agent sent back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutboundEvent {
    pub content: String,
    pub recipient_id: String,
}

/// Outcome of one tool invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolCallResult {
    pub tool_name: String,
    /// Numeric exit code when the host reported one.
    pub exit_code: Option<i64>,
    pub status: String,
    pub stderr: String,
    pub command: String,
}

impl ToolCallResult {
    pub fn is_error_status(&self) -> bool {
        self.status.eq_ignore_ascii_case("error")
    }

    /// Reported exit code, else 1 for `status: "error"`, else 0.
    pub fn effective_exit_code(&self) -> i64 {
        self.exit_code
            .unwrap_or(if self.is_error_status() { 1 } else { 0 })
    }
}

/// One decoded host event.
#[derive(Debug, Clone, PartialEq)]
pub enum HookEvent {
    MessageReceived(InboundEvent),
    MessageSent(OutboundEvent),
    AfterToolCall(ToolCallResult),
}

impl HookEvent {
    pub fn hook(&self) -> HookName {
        match self {
            HookEvent::MessageReceived(_) => HookName::MessageReceived,
            HookEvent::MessageSent(_) => HookName::MessageSent,
            HookEvent::AfterToolCall(_) => HookName::AfterToolCall,
        }
    }

    /// Decode raw host JSON for `hook`.
    pub fn decode(hook: HookName, raw: &Value) -> Result<Self, EventError> {
        if !raw.is_object() {
            return Err(EventError::NotAnObject);
        }
        match hook {
            HookName::MessageReceived => Ok(HookEvent::MessageReceived(decode_inbound(raw))),
            HookName::MessageSent => Ok(HookEvent::MessageSent(decode_outbound(raw))),
            HookName::AfterToolCall => decode_tool_call(raw).map(HookEvent::AfterToolCall),
        }
    }
}

fn string_field(raw: &Value, keys: &[&str]) -> String {
    lookup(raw, keys).and_then(value_as_string).unwrap_or_default()
}

fn decode_inbound(raw: &Value) -> InboundEvent {
    InboundEvent {
        kind: string_field(raw, &["type"]),
        sender_id: string_field(raw, &["senderId", "sender_id", "from"]),
        content: string_field(raw, &["content", "text"]),
        message_id: lookup(raw, &["messageId", "message_id"]).and_then(value_as_i64),
        timestamp: string_field(raw, &["timestamp"]),
    }
}

fn decode_outbound(raw: &Value) -> OutboundEvent {
    OutboundEvent {
        content: string_field(raw, &["content", "text"]),
        recipient_id: string_field(raw, &["recipientId", "recipient_id", "to"]),
    }
}

fn decode_tool_call(raw: &Value) -> Result<ToolCallResult, EventError> {
    let find = |keys: &[&str]| lookup(raw, keys);

    let tool_name = find(&["toolName", "tool_name", "tool"])
        .and_then(value_as_string)
        .filter(|s| !s.is_empty())
        .ok_or(EventError::Missing("toolName"))?;
    let exit_code = find(&["exitCode", "exit_code"]).and_then(value_as_i64);
    let status = find(&["status"]).and_then(value_as_string).unwrap_or_default();
    let stderr = find(&["stderr"]).and_then(value_as_string).unwrap_or_default();
    let command = find(&["command", "cmd"])
        .and_then(value_as_string)
        .unwrap_or_default();

    Ok(ToolCallResult {
        tool_name,
        exit_code,
        status,
        stderr,
        command,
    })
}

/// First non-null value for any of `keys`, searched at the top level, then under `params`,
/// then under `result`.
fn lookup<'v>(raw: &'v Value, keys: &[&str]) -> Option<&'v Value> {
    [Some(raw), raw.get("params"), raw.get("result")]
        .into_iter()
        .flatten()
        .find_map(|scope| keys.iter().find_map(|k| scope.get(*k)))
        .filter(|v| !v.is_null())
}

fn value_as_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn value_as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hook_names_round_trip() {
        for h in HookName::ALL {
            assert_eq!(HookName::parse(h.as_str()), Some(h));
        }
        assert_eq!(HookName::parse("before_tool_call"), None);
    }

    #[test]
    fn inbound_accepts_numeric_sender_and_string_id() {
        let ev = HookEvent::decode(
            HookName::MessageReceived,
            &json!({"senderId": 167090545, "content": "hi", "messageId": "42"}),
        )
        .unwrap();
        let HookEvent::MessageReceived(ev) = ev else {
            panic!("wrong variant");
        };
        assert_eq!(ev.sender_id, "167090545");
        assert_eq!(ev.message_id, Some(42));
        assert_eq!(ev.content, "hi");
    }

    #[test]
    fn inbound_defaults_missing_and_null_fields() {
        let ev = HookEvent::decode(
            HookName::MessageReceived,
            &json!({"from": "7", "content": null, "messageId": "abc"}),
        )
        .unwrap();
        let HookEvent::MessageReceived(ev) = ev else {
            panic!("wrong variant");
        };
        assert_eq!(ev.sender_id, "7");
        assert_eq!(ev.content, "");
        assert_eq!(ev.message_id, None);
    }

    #[test]
    fn outbound_accepts_to_alias() {
        let ev = HookEvent::decode(HookName::MessageSent, &json!({"to": "9", "content": "done"}))
            .unwrap();
        assert_eq!(
            ev,
            HookEvent::MessageSent(OutboundEvent {
                content: "done".into(),
                recipient_id: "9".into(),
            })
        );
    }

    #[test]
    fn non_object_is_rejected() {
        assert!(matches!(
            HookEvent::decode(HookName::MessageSent, &json!("text")),
            Err(EventError::NotAnObject)
        ));
    }

    #[test]
    fn tool_call_reads_nested_params_and_result() {
        let ev = HookEvent::decode(
            HookName::AfterToolCall,
            &json!({
                "toolName": "exec",
                "params": {"command": "grep x y"},
                "result": {"exitCode": 1, "stderr": "", "status": "error"}
            }),
        )
        .unwrap();
        let HookEvent::AfterToolCall(tc) = ev else {
            panic!("wrong variant");
        };
        assert_eq!(tc.command, "grep x y");
        assert_eq!(tc.exit_code, Some(1));
        assert!(tc.is_error_status());
    }

    #[test]
    fn tool_call_without_name_is_rejected() {
        let err = HookEvent::decode(HookName::AfterToolCall, &json!({"command": "ls"})).unwrap_err();
        assert!(matches!(err, EventError::Missing("toolName")));
    }

    #[test]
    fn effective_exit_code_defaults() {
        let mut tc = ToolCallResult {
            tool_name: "exec".into(),
            ..Default::default()
        };
        assert_eq!(tc.effective_exit_code(), 0);
        tc.status = "error".into();
        assert_eq!(tc.effective_exit_code(), 1);
        tc.exit_code = Some(3);
        assert_eq!(tc.effective_exit_code(), 3);
    }
}
