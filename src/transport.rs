//! Delivery of an outgoing message to the webhook.
//!
//! [`ReplyTransport`] is the seam between the dispatcher and the network so
//! the dispatch cycle can be driven by a scripted transport in tests.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::WidgetConfig;
use crate::protocol::{self, OutgoingPayload};

/// Why a dispatch produced no usable reply.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Connection refused, DNS failure, timeout.
    #[error("request failed: {0}")]
    Network(String),
    #[error("webhook returned HTTP {0}")]
    Status(u16),
    /// Body was not JSON, or was JSON with no usable value.
    #[error("malformed reply body: {0}")]
    Body(String),
}

/// Sends one payload and returns the decoded JSON reply body.
#[async_trait]
pub trait ReplyTransport: Send + Sync {
    async fn deliver(&self, payload: &OutgoingPayload) -> Result<Value, DispatchError>;
}

/// POSTs JSON to the configured endpoint with reqwest.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpTransport {
    pub fn new(endpoint: Url, timeout: Option<Duration>) -> Result<Self, DispatchError> {
        let mut builder = reqwest::Client::builder().user_agent(protocol::user_agent());
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| DispatchError::Network(e.to_string()))?;
        Ok(Self { client, endpoint })
    }

    pub fn from_config(config: &WidgetConfig) -> Result<Self, DispatchError> {
        Self::new(config.endpoint.clone(), config.request_timeout)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl ReplyTransport for HttpTransport {
    async fn deliver(&self, payload: &OutgoingPayload) -> Result<Value, DispatchError> {
        // `.json()` sets `Content-Type: application/json`.
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(payload)
            .send()
            .await
            .map_err(|e| DispatchError::Network(e.to_string()))?;

        let status = response.status();
        debug!(target: "dispatch", %status, "webhook responded");
        if !status.is_success() {
            return Err(DispatchError::Status(status.as_u16()));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| DispatchError::Body(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_describe_themselves() {
        assert_eq!(DispatchError::Status(502).to_string(), "webhook returned HTTP 502");
        assert!(DispatchError::Body("eof".into()).to_string().contains("eof"));
    }

    #[test]
    fn builds_from_config() {
        let mut config = WidgetConfig::for_endpoint("https://x/webhook").unwrap();
        config.request_timeout = Some(Duration::from_secs(5));
        let transport = HttpTransport::from_config(&config).unwrap();
        assert_eq!(transport.endpoint().as_str(), "https://x/webhook");
    }
}
