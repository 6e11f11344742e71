use anyhow::Result;
use std::time::{Duration, Instant};
use tracing::warn;
use url::Url;

use super::types::ProbeOutcome;

/// Checker trait for probing a single endpoint.
///
/// A check never fails: every way a probe can end is a [`ProbeOutcome`].
#[async_trait::async_trait]
pub trait Checker: Send + Sync {
    async fn check(&self, uri: &str) -> ProbeOutcome;
}

/// HTTP/HTTPS checker issuing one GET per probe
pub struct HttpChecker {
    client: reqwest::Client,
}

impl HttpChecker {
    /// Build a checker. Without a timeout the transport defaults apply.
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self { client: builder.build()? })
    }
}

#[async_trait::async_trait]
impl Checker for HttpChecker {
    async fn check(&self, uri: &str) -> ProbeOutcome {
        let url = match Url::parse(uri) {
            Ok(url) => url,
            Err(e) => {
                warn!(uri, error = %e, "Probe skipped, URI is not a valid URL");
                return ProbeOutcome::invalid_uri(uri);
            }
        };

        let start = Instant::now();

        match self.client.get(url).send().await {
            Ok(response) => {
                let latency = start.elapsed();
                let status_code = response.status().as_u16();
                // Body is never read; dropping the response releases the connection.
                drop(response);
                ProbeOutcome::success(uri, status_code, latency)
            }
            Err(e) if e.is_builder() => {
                warn!(uri, error = %e, "Probe rejected, URI cannot be requested");
                ProbeOutcome::invalid_uri(uri)
            }
            Err(e) => {
                warn!(uri, error = %e, "Probe failed");
                ProbeOutcome::network_error(uri)
            }
        }
    }
}
