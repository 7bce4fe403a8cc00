//! Internet reachability pre-check for the monitoring host.
//!
//! If the host itself has lost its uplink, every device would look
//! offline; checks are skipped instead.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use tracing::debug;

/// Answers whether the monitoring host can reach the internet.
pub trait UplinkCheck: Send + Sync {
    fn is_online(&self) -> impl Future<Output = bool> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpUplink {
    client: Client,
    url: String,
}

impl HttpUplink {
    pub fn new(url: &str, verify_tls: bool, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(!verify_tls)
            .build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    /// Any HTTP response counts as connected; only transport failures don't.
    async fn check(&self) -> bool {
        match self.client.get(&self.url).send().await {
            Ok(resp) => {
                debug!(url = %self.url, status = %resp.status(), "connectivity check passed");
                true
            }
            Err(e) => {
                debug!(url = %self.url, error = %e, "connectivity check failed");
                false
            }
        }
    }
}

impl UplinkCheck for HttpUplink {
    async fn is_online(&self) -> bool {
        self.check().await
    }
}
