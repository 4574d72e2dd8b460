//! Liveness check for the remote backend.

use std::time::Duration;

use reqwest::{Client, Url};
use tracing::debug;

use crate::remote::RemoteStore;

/// Probe timeout used when none is given.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Issues `HEAD {base}/graphs` and reports whether the backend answered 2xx.
#[derive(Clone)]
pub struct AvailabilityProbe {
    client: Client,
    url: Url,
    timeout: Duration,
}

impl AvailabilityProbe {
    pub fn new(remote: &RemoteStore, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            url: remote.collection_url(),
            timeout,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Never fails: any error or non-success status reads as unavailable.
    pub async fn check(&self) -> bool {
        match self
            .client
            .head(self.url.clone())
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(response) => {
                let ok = response.status().is_success();
                debug!("Probe {} -> {}", self.url, response.status());
                ok
            }
            Err(e) => {
                debug!("Probe {} failed: {}", self.url, e);
                false
            }
        }
    }
}
