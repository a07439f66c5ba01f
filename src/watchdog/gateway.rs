//! Gateway restart via its local control endpoint.

use tracing::{info, warn};

/// POST the restart endpoint, bearer-authenticated when a token is set. Never retries.
pub async fn restart(client: &reqwest::Client, url: &str, token: Option<&str>) -> bool {
    let mut req = client.post(url).json(&serde_json::json!({"reason": "kcc-watchdog mode switch"}));
    if let Some(token) = token {
        req = req.bearer_auth(token);
    }
    match req.send().await {
        Ok(res) if res.status().is_success() => {
            info!(url, "gateway restart requested");
            true
        }
        Ok(res) => {
            warn!(url, status = %res.status(), "gateway restart rejected");
            false
        }
        Err(e) => {
            warn!(url, error = %e, "gateway restart failed");
            false
        }
    }
}
