//! reqwest-backed network client.

use async_trait::async_trait;
use outrider_core::{
    InterceptedRequest, NetworkClient, NetworkError, OutriderError, OutriderResult, Response,
};
use reqwest::Client;
use std::error::Error as _;
use std::time::Duration;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// [`NetworkClient`] over a shared `reqwest` connection pool.
///
/// Dropping a pending `fetch` future drops the underlying request, which is
/// how prefetch cancellation frees the connection.
#[derive(Debug, Clone)]
pub struct ReqwestNetworkClient {
    client: Client,
    timeout: Duration,
}

impl ReqwestNetworkClient {
    /// Create a client with the given per-request timeout.
    pub fn new(timeout: Duration) -> OutriderResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OutriderError::internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn classify(&self, request: &InterceptedRequest, err: reqwest::Error) -> NetworkError {
        let url = request.url.to_string();
        if err.is_timeout() {
            return NetworkError::Timeout {
                url,
                after_ms: self.timeout.as_millis() as u64,
            };
        }
        if err.is_connect() && is_dns_failure(&err) {
            return NetworkError::Dns {
                host: request.url.host_str().unwrap_or_default().to_string(),
            };
        }
        NetworkError::Transport {
            url,
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl NetworkClient for ReqwestNetworkClient {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<Response, NetworkError> {
        let sent = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone())
            .send()
            .await
            .map_err(|e| self.classify(request, e))?;

        let status = sent.status();
        let headers = sent.headers().clone();
        let body = sent.bytes().await.map_err(|e| self.classify(request, e))?;

        tracing::trace!(url = %request.url, status = %status, bytes = body.len(), "Fetched");
        Ok(Response {
            status,
            headers,
            body,
        })
    }
}

/// Resolver failures surface as connect errors whose source chain mentions dns.
fn is_dns_failure(err: &reqwest::Error) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        if cause.to_string().to_ascii_lowercase().contains("dns") {
            return true;
        }
        source = cause.source();
    }
    false
}
