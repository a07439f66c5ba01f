//! In-place edits of the channel configuration file (JSON): set or null the webhook fields of
//! one channel object, keep every other field as it was.

use std::path::Path;

use serde_json::{Map, Value};
use thiserror::Error;
use tokio::fs;

pub const WEBHOOK_URL_KEY: &str = "webhookUrl";
pub const WEBHOOK_SECRET_KEY: &str = "webhookSecret";
pub const WEBHOOK_PATH_KEY: &str = "webhookPath";

#[derive(Debug, Error)]
pub enum ChannelConfigError {
    #[error("channel config io: {0}")]
    Io(String),
    #[error("channel config parse: {0}")]
    Parse(String),
    #[error("channel config: '{0}' is not an object")]
    NotAnObject(String),
    #[error("channel config: webhook url not configured")]
    MissingWebhookUrl,
}

/// Webhook fields written when switching back to webhook mode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WebhookSettings {
    pub url: String,
    pub secret: Option<String>,
    pub path: Option<String>,
}

/// Populate the webhook fields of the channel at `channel_path` (dotted, e.g. `channels.telegram`).
pub async fn enable_webhook(
    file: &Path,
    channel_path: &str,
    settings: &WebhookSettings,
) -> Result<(), ChannelConfigError> {
    if settings.url.trim().is_empty() {
        return Err(ChannelConfigError::MissingWebhookUrl);
    }
    edit(file, channel_path, |channel| {
        channel.insert(WEBHOOK_URL_KEY.into(), Value::String(settings.url.clone()));
        channel.insert(WEBHOOK_SECRET_KEY.into(), opt_string(&settings.secret));
        channel.insert(WEBHOOK_PATH_KEY.into(), opt_string(&settings.path));
    })
    .await
}

/// Null the webhook fields so the channel falls back to long polling.
pub async fn disable_webhook(file: &Path, channel_path: &str) -> Result<(), ChannelConfigError> {
    edit(file, channel_path, |channel| {
        for key in [WEBHOOK_URL_KEY, WEBHOOK_SECRET_KEY, WEBHOOK_PATH_KEY] {
            channel.insert(key.into(), Value::Null);
        }
    })
    .await
}

fn opt_string(v: &Option<String>) -> Value {
    v.as_ref()
        .filter(|s| !s.is_empty())
        .map(|s| Value::String(s.clone()))
        .unwrap_or(Value::Null)
}

async fn edit(
    file: &Path,
    channel_path: &str,
    apply: impl FnOnce(&mut Map<String, Value>),
) -> Result<(), ChannelConfigError> {
    let raw = fs::read_to_string(file)
        .await
        .map_err(|e| ChannelConfigError::Io(format!("{}: {}", file.display(), e)))?;
    let mut doc: Value =
        serde_json::from_str(&raw).map_err(|e| ChannelConfigError::Parse(e.to_string()))?;
    apply(channel_object(&mut doc, channel_path)?);

    let json =
        serde_json::to_string_pretty(&doc).map_err(|e| ChannelConfigError::Parse(e.to_string()))?;
    let tmp = file.with_extension("tmp");
    fs::write(&tmp, json)
        .await
        .map_err(|e| ChannelConfigError::Io(e.to_string()))?;
    fs::rename(&tmp, file)
        .await
        .map_err(|e| ChannelConfigError::Io(e.to_string()))
}

/// Walk `path`, creating missing intermediate objects.
fn channel_object<'a>(
    doc: &'a mut Value,
    path: &str,
) -> Result<&'a mut Map<String, Value>, ChannelConfigError> {
    let mut cur = doc;
    for key in path.split('.').filter(|k| !k.is_empty()) {
        let obj = cur
            .as_object_mut()
            .ok_or_else(|| ChannelConfigError::NotAnObject(path.to_string()))?;
        cur = obj
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    cur.as_object_mut()
        .ok_or_else(|| ChannelConfigError::NotAnObject(path.to_string()))
}
