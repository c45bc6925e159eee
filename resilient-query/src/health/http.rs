//! HTTP reachability probe.

use super::HealthProbe;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Probes a URL and reports healthy if any HTTP response comes back.
///
/// Status codes are not inspected: a 401 or 403 still proves the service is
/// reachable.
#[derive(Debug, Clone)]
pub struct HttpHealthProbe {
    client: reqwest::Client,
    url: String,
    request_timeout: Duration,
}

impl HttpHealthProbe {
    /// Creates a probe for `url` with a fresh client.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            request_timeout: Duration::from_secs(2),
        }
    }

    /// Reuses an existing client.
    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Sets the timeout of a single probe request.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn check(&self) -> bool {
        match self
            .client
            .get(&self.url)
            .timeout(self.request_timeout)
            .send()
            .await
        {
            Ok(response) => {
                debug!(url = %self.url, status = %response.status(), "Health probe reached service");
                true
            }
            Err(e) => {
                debug!(url = %self.url, error = %e, "Health probe request failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_url_is_unhealthy() {
        let probe = HttpHealthProbe::new("http://127.0.0.1:9/health")
            .with_request_timeout(Duration::from_millis(200));
        assert!(!probe.check().await);
    }
}
