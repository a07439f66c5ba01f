//! Host plugin boundary: the shapes a plugin registers against.
//!
//! The host owns hook dispatch and HTTP routing. A plugin only sees [`PluginApi`] and hands
//! it hook and route handlers; `server` provides the concrete axum-backed host.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::events::{HookEvent, HookName};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a hook handler did with one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Event not relevant (non-priority sender, non-exec tool, success exit).
    Skipped,
    /// Event matched a harmless-noise rule.
    Suppressed { rule: &'static str },
    /// Notifications were sent; `delivered` is false if any POST failed.
    Forwarded { delivered: bool },
}

/// Callback for one named hook.
pub trait HookHandler: Send + Sync {
    fn handle(&self, event: HookEvent) -> BoxFuture<'_, Dispatch>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteMethod {
    Get,
    Post,
}

/// Request handed to a route handler. `body` is `None` when the body is empty or not JSON.
#[derive(Debug, Clone, Default)]
pub struct RouteRequest {
    pub body: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteResponse {
    pub status: u16,
    pub body: Value,
}

impl RouteResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }
}

pub trait RouteHandler: Send + Sync {
    fn handle(&self, req: RouteRequest) -> BoxFuture<'_, RouteResponse>;
}

/// Registration surface exposed by the host.
pub trait PluginApi {
    fn register_hook(&mut self, hook: HookName, handler: Arc<dyn HookHandler>);
    fn register_route(&mut self, method: RouteMethod, path: &str, handler: Arc<dyn RouteHandler>);
}
