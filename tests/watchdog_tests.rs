//! Watchdog end to end: mock health endpoints, temp state and channel config files.

use serde_json::json;

use kcc_notify::watchdog::Watchdog;
use kcc_notify::watchdog::state::{self, Mode, StateError, StateLock, WatchdogState};

mod common;
use common::{MockServices, WatchdogFiles, read_json};

fn webhook_channel_config() -> serde_json::Value {
    json!({
        "gateway": {"port": 18789},
        "channels": {"telegram": {
            "botToken": "123:abc",
            "webhookUrl": "https://bot.example.com/telegram-webhook",
            "webhookSecret": "hook-secret",
            "webhookPath": "/telegram-webhook"
        }}
    })
}

#[tokio::test]
async fn single_failure_only_counts() {
    let files = WatchdogFiles::new();
    files.write_channel_config(&webhook_channel_config());
    let svc = MockServices::new().await;
    svc.health("/proxy", 503).await;
    svc.health("/tunnel", 200).await;
    svc.health("/gateway", 200).await;
    svc.expect_restart(0).await;

    let wd = Watchdog::new(svc.watchdog_config(&files));
    let report = wd.run_once().await.unwrap();

    assert_eq!(report.switched, None);
    assert!(!report.snapshot.proxy);
    assert_eq!(report.state.mode, Mode::Webhook);
    assert_eq!(report.state.failure_count, 1);

    let saved = state::read(&files.state_file()).await.unwrap().unwrap();
    assert_eq!(saved.failure_count, 1);
    assert!(saved.last_check.is_some());
    assert_eq!(files.read_channel_config(), webhook_channel_config());
}

#[tokio::test]
async fn two_failures_switch_to_polling() {
    let files = WatchdogFiles::new();
    files.write_channel_config(&webhook_channel_config());
    let svc = MockServices::new().await;
    svc.health("/proxy", 503).await;
    svc.health("/tunnel", 200).await;
    svc.health("/gateway", 200).await;
    svc.expect_restart(1).await;

    let wd = Watchdog::new(svc.watchdog_config(&files));
    wd.run_once().await.unwrap();
    let report = wd.run_once().await.unwrap();

    assert_eq!(report.previous_mode, Mode::Webhook);
    assert_eq!(report.switched, Some(Mode::Polling));
    assert!(report.config_updated);
    assert!(report.restarted);

    let saved = state::read(&files.state_file()).await.unwrap().unwrap();
    assert_eq!(saved.mode, Mode::Polling);
    assert_eq!(saved.failure_count, 0);
    assert!(saved.last_switch.is_some());

    let tg = files.read_channel_config()["channels"]["telegram"].clone();
    assert!(tg["webhookUrl"].is_null());
    assert!(tg["webhookSecret"].is_null());
    assert!(tg["webhookPath"].is_null());
    assert_eq!(tg["botToken"], "123:abc");

    let restart = svc
        .server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .find(|r| r.url.path() == "/restart")
        .unwrap();
    let auth = restart.headers.get("authorization").unwrap();
    assert_eq!(auth.to_str().unwrap(), "Bearer gw-token");
}

#[tokio::test]
async fn polling_recovers_to_webhook_after_two_healthy_checks() {
    let files = WatchdogFiles::new();
    files.write_channel_config(&json!({"channels": {"telegram": {
        "botToken": "123:abc",
        "webhookUrl": null,
        "webhookSecret": null,
        "webhookPath": null
    }}}));
    state::save(
        &files.state_file(),
        &WatchdogState {
            mode: Mode::Polling,
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let svc = MockServices::new().await;
    svc.all_up().await;
    svc.expect_restart(1).await;

    let wd = Watchdog::new(svc.watchdog_config(&files));
    let first = wd.run_once().await.unwrap();
    assert_eq!(first.switched, None);
    assert_eq!(first.state.failure_count, 1);

    let second = wd.run_once().await.unwrap();
    assert_eq!(second.switched, Some(Mode::Webhook));

    let tg = files.read_channel_config()["channels"]["telegram"].clone();
    assert_eq!(tg["webhookUrl"], "https://bot.example.com/telegram-webhook");
    assert_eq!(tg["webhookSecret"], "hook-secret");
    assert_eq!(tg["webhookPath"], "/telegram-webhook");
}

#[tokio::test]
async fn polling_with_gateway_down_never_counts() {
    let files = WatchdogFiles::new();
    files.write_channel_config(&json!({}));
    state::save(
        &files.state_file(),
        &WatchdogState {
            mode: Mode::Polling,
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let svc = MockServices::new().await;
    svc.health("/proxy", 200).await;
    svc.health("/tunnel", 200).await;
    svc.health("/gateway", 500).await;
    svc.expect_restart(0).await;

    let wd = Watchdog::new(svc.watchdog_config(&files));
    for _ in 0..3 {
        let report = wd.run_once().await.unwrap();
        assert_eq!(report.switched, None);
        assert_eq!(report.state.failure_count, 0);
        assert_eq!(report.state.mode, Mode::Polling);
    }
}

#[tokio::test]
async fn switch_is_recorded_even_when_config_edit_fails() {
    let files = WatchdogFiles::new();
    // No channel config file written.
    let svc = MockServices::new().await;
    svc.health("/proxy", 200).await;
    svc.health("/tunnel", 404).await;
    svc.health("/gateway", 200).await;
    svc.expect_restart(1).await;

    let mut cfg = svc.watchdog_config(&files);
    cfg.threshold = Some(1);
    let wd = Watchdog::new(cfg);
    let report = wd.run_once().await.unwrap();

    assert_eq!(report.switched, Some(Mode::Polling));
    assert!(!report.config_updated);
    let saved = state::read(&files.state_file()).await.unwrap().unwrap();
    assert_eq!(saved.mode, Mode::Polling);
}

#[tokio::test]
async fn held_lock_skips_the_check() {
    let files = WatchdogFiles::new();
    let svc = MockServices::new().await;
    svc.all_up().await;

    let _held = StateLock::acquire(&files.state_file()).await.unwrap();
    let wd = Watchdog::new(svc.watchdog_config(&files));
    let err = wd.run_once().await.unwrap_err();
    assert!(matches!(err, StateError::Locked(_)));
    assert!(!files.state_file().exists());
}

#[tokio::test]
async fn state_file_is_camel_case_json() {
    let files = WatchdogFiles::new();
    let svc = MockServices::new().await;
    svc.all_up().await;

    let wd = Watchdog::new(svc.watchdog_config(&files));
    wd.run_once().await.unwrap();

    let raw = read_json(&files.state_file());
    assert_eq!(raw["mode"], "webhook");
    assert_eq!(raw["failureCount"], 0);
    assert!(raw["lastCheck"].is_string());
    assert!(!StateLock::lock_path(&files.state_file()).exists());
}
