//! Health probes: bounded-timeout GETs; anything but a 2xx answer counts as down.

use std::time::Duration;

use tracing::{debug, warn};

use super::machine::HealthSnapshot;
use crate::config::WatchdogConfig;

#[derive(Clone)]
pub struct Prober {
    client: reqwest::Client,
}

impl Prober {
    pub fn new(connect_timeout: Duration, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "probe client builder failed, using defaults without timeouts");
                reqwest::Client::new()
            });
        Self { client }
    }

    pub fn from_config(cfg: &WatchdogConfig) -> Self {
        Self::new(
            Duration::from_secs(cfg.connect_timeout_secs()),
            Duration::from_secs(cfg.probe_timeout_secs()),
        )
    }

    /// Shared client, also used for the gateway restart call.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub async fn is_up(&self, url: &str) -> bool {
        match self.client.get(url).send().await {
            Ok(res) => {
                let up = res.status().is_success();
                debug!(url, status = %res.status(), up, "probe");
                up
            }
            Err(e) => {
                debug!(url, error = %e, "probe failed");
                false
            }
        }
    }

    /// Probe all configured services concurrently.
    pub async fn snapshot(&self, cfg: &WatchdogConfig) -> HealthSnapshot {
        let aux = async {
            match cfg.aux_url() {
                Some(url) => Some(self.is_up(url).await),
                None => None,
            }
        };
        let (proxy, tunnel, gateway, aux) = tokio::join!(
            self.is_up(cfg.proxy_url()),
            self.is_up(cfg.tunnel_url()),
            self.is_up(cfg.gateway_url()),
            aux
        );
        HealthSnapshot {
            proxy,
            tunnel,
            gateway,
            aux,
        }
    }
}
