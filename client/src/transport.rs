use std::time::Duration;

use latency_probe_common::config::ClientConfig;
use latency_probe_common::event::{IngestRequest, IngestResponse, StatusResponse};
use tracing::debug;

/// Failure to complete one request/response exchange with the endpoint.
///
/// Always recoverable: the sample is skipped and the loop carries on.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("endpoint returned HTTP status {0}")]
    Status(u16),
    #[error("failed to decode response: {0}")]
    Decode(String),
    #[error("echoed caption {echoed:?} does not match sent caption {sent:?}")]
    EchoMismatch { sent: String, echoed: String },
    #[error("request failed: {0}")]
    Other(String),
}

impl TransportError {
    /// Short label for the on-screen error indicator.
    pub fn category(&self) -> &'static str {
        match self {
            TransportError::Timeout => "Timeout",
            TransportError::Connect(_) => "ConnectionError",
            TransportError::Status(_) => "HTTPError",
            TransportError::Decode(_) => "DecodeError",
            TransportError::EchoMismatch { .. } => "EchoMismatch",
            TransportError::Other(_) => "RequestError",
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else if let Some(status) = e.status() {
            TransportError::Status(status.as_u16())
        } else if e.is_decode() {
            TransportError::Decode(e.to_string())
        } else {
            TransportError::Other(e.to_string())
        }
    }
}

/// Request/response channel to the echo endpoint.
pub trait EchoTransport {
    /// Send one event. Resolves only after the full response body is read.
    async fn ingest(&self, request: &IngestRequest) -> Result<IngestResponse, TransportError>;

    async fn status(&self) -> Result<StatusResponse, TransportError>;
}

/// `EchoTransport` over HTTP/JSON with per-request timeouts and no retries.
pub struct HttpEchoClient {
    client: reqwest::Client,
    ingest_url: String,
    status_url: String,
    ingest_timeout: Duration,
    status_timeout: Duration,
}

impl HttpEchoClient {
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;
        let base = config.endpoint_url.trim_end_matches('/');
        Ok(Self {
            client,
            ingest_url: format!("{base}/ingest"),
            status_url: format!("{base}/status"),
            ingest_timeout: config.ingest_timeout(),
            status_timeout: config.status_timeout(),
        })
    }
}

impl EchoTransport for HttpEchoClient {
    async fn ingest(&self, request: &IngestRequest) -> Result<IngestResponse, TransportError> {
        let resp = self
            .client
            .post(&self.ingest_url)
            .timeout(self.ingest_timeout)
            .json(request)
            .send()
            .await?
            .error_for_status()?;
        let body = resp.json::<IngestResponse>().await?;
        debug!(
            server_recv_ts = body.server_recv_ts,
            server_send_ts = body.server_send_ts,
            "ingest acknowledged"
        );
        Ok(body)
    }

    async fn status(&self) -> Result<StatusResponse, TransportError> {
        let resp = self
            .client
            .get(&self.status_url)
            .timeout(self.status_timeout)
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json::<StatusResponse>().await?)
    }
}
