//! Standalone host adapter: an axum server that plays the host side of [`PluginApi`].
//!
//! Hook events arrive as `POST /hooks/{name}` JSON and are dispatched on spawned tasks, so the
//! caller gets `202` immediately and never waits on dashboard delivery. Plugin routes are
//! mounted under their registered paths.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{MethodFilter, get, on, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::events::{HookEvent, HookName};
use crate::host::{HookHandler, PluginApi, RouteHandler, RouteMethod, RouteRequest};

type HookMap = HashMap<HookName, Vec<Arc<dyn HookHandler>>>;

/// Collects plugin registrations, then turns them into a router.
#[derive(Default)]
pub struct HostAdapter {
    hooks: HookMap,
    routes: Vec<(RouteMethod, String, Arc<dyn RouteHandler>)>,
}

impl PluginApi for HostAdapter {
    fn register_hook(&mut self, hook: HookName, handler: Arc<dyn HookHandler>) {
        debug!(%hook, "hook registered");
        self.hooks.entry(hook).or_default().push(handler);
    }

    fn register_route(&mut self, method: RouteMethod, path: &str, handler: Arc<dyn RouteHandler>) {
        debug!(?method, path, "route registered");
        self.routes.push((method, path.to_string(), handler));
    }
}

impl HostAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.values().map(Vec::len).sum()
    }

    pub fn into_router(self) -> Router {
        let hooks = Arc::new(self.hooks);
        let mut router = Router::new()
            .route("/health", get(|| async { Json(json!({"status": "ok"})) }))
            .route("/hooks/{name}", post(dispatch_hook).with_state(hooks));

        for (method, path, handler) in self.routes {
            let filter = match method {
                RouteMethod::Get => MethodFilter::GET,
                RouteMethod::Post => MethodFilter::POST,
            };
            router = router.route(
                &path,
                on(filter, move |body: Bytes| {
                    let handler = Arc::clone(&handler);
                    async move { run_route(handler.as_ref(), body).await }
                }),
            );
        }
        router
    }
}

/// Empty or non-JSON bodies become `None`; the route handler decides what that means.
async fn run_route(handler: &dyn RouteHandler, body: Bytes) -> (StatusCode, Json<Value>) {
    let body = if body.is_empty() {
        None
    } else {
        serde_json::from_slice::<Value>(&body).ok()
    };
    let res = handler.handle(RouteRequest { body }).await;
    let status = StatusCode::from_u16(res.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(res.body))
}

async fn dispatch_hook(
    Path(name): Path<String>,
    State(hooks): State<Arc<HookMap>>,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let Some(hook) = HookName::parse(&name) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"accepted": false, "error": format!("unknown hook '{name}'")})),
        );
    };
    let raw: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            warn!(%hook, error = %e, "hook body is not JSON");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"accepted": false, "error": "body must be JSON"})),
            );
        }
    };
    let event = match HookEvent::decode(hook, &raw) {
        Ok(ev) => ev,
        Err(e) => {
            // Malformed events are dropped, never surfaced to the host as failures.
            warn!(%hook, error = %e, "ignoring malformed hook event");
            return (StatusCode::ACCEPTED, Json(json!({"accepted": false})));
        }
    };

    for handler in hooks.get(&hook).into_iter().flatten() {
        let handler = Arc::clone(handler);
        let event = event.clone();
        tokio::spawn(async move {
            let outcome = handler.handle(event).await;
            debug!(%hook, ?outcome, "hook handled");
        });
    }
    (StatusCode::ACCEPTED, Json(json!({"accepted": true})))
}

/// Bind `addr` and serve until ctrl-c.
pub async fn serve(router: Router, addr: &str) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "host adapter listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await
}
