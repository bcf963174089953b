//! HTTP transport for a remote result consumer.
//!
//! `GET /health` establishes the link, `GET /ping` probes it and
//! `POST /messages` delivers one envelope as JSON. `410 Gone` means the
//! consumer has retired this agent and is treated as permanent.

use async_trait::async_trait;
use formscout_core::Envelope;
use reqwest::StatusCode;
use tracing::{debug, info};

use crate::error::TransportError;
use crate::transport::Transport;

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// `base_url` should be like `http://localhost:4000` (no trailing slash).
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn check(resp: reqwest::Response) -> Result<(), TransportError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(classify_status(status, body))
    }
}

fn classify_status(status: StatusCode, body: String) -> TransportError {
    let detail = format!("server returned {}: {body}", status.as_u16());
    if status == StatusCode::GONE {
        TransportError::Invalidated(detail)
    } else {
        TransportError::Unavailable(detail)
    }
}

fn classify_request(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Unavailable(err.to_string())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let url = format!("{}/health", self.base_url);
        info!(url = %url, "connecting to consumer");
        let resp = self.client.get(&url).send().await.map_err(classify_request)?;
        Self::check(resp).await
    }

    async fn send(&self, envelope: &Envelope) -> Result<(), TransportError> {
        let url = format!("{}/messages", self.base_url);
        let body = serde_json::to_vec(envelope)
            .map_err(|e| TransportError::Unavailable(format!("encode envelope: {e}")))?;
        debug!(
            url = %url,
            sequence = envelope.sequence,
            action = envelope.message.action(),
            bytes = body.len(),
            "posting envelope"
        );
        let resp = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(classify_request)?;
        Self::check(resp).await
    }

    async fn ping(&self) -> Result<(), TransportError> {
        let url = format!("{}/ping", self.base_url);
        let resp = self.client.get(&url).send().await.map_err(classify_request)?;
        Self::check(resp).await
    }
}
