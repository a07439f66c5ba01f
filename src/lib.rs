//! kcc-notify library: host-plugin notifier (chat events to the dashboard), its HTTP host
//! adapter, and the webhook/polling mode watchdog.

pub mod classify;
pub mod config;
pub mod dashboard;
pub mod events;
pub mod host;
pub mod logging;
pub mod notifier;
pub mod server;
pub mod watchdog;
