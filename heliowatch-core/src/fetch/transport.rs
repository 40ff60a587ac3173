use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::ACCEPT;

use crate::error::{FeedError, Result};

/// Headers attached to every upstream request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHeaders {
    /// `Accept` value for the expected payload.
    pub accept: String,
    /// `User-Agent` identifying this client.
    pub user_agent: String,
}

/// Raw upstream response: status plus the unparsed body.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Full response body.
    pub body: Bytes,
}

/// Outbound HTTP port. Production code uses [`ReqwestTransport`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Issue one GET. Any status is a successful transport round trip.
    async fn get(
        &self,
        url: &str,
        headers: &RequestHeaders,
    ) -> Result<TransportResponse>;
}

/// [`HttpTransport`] over a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Client with `timeout` applied to each whole request.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| FeedError::ClientSetup(err.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        headers: &RequestHeaders,
    ) -> Result<TransportResponse> {
        let transport_err = |err: reqwest::Error| FeedError::Transport {
            url: url.to_string(),
            message: err.to_string(),
        };

        let response = self
            .client
            .get(url)
            .header(ACCEPT, headers.accept.as_str())
            .header(reqwest::header::USER_AGENT, headers.user_agent.as_str())
            .send()
            .await
            .map_err(transport_err)?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(transport_err)?;

        Ok(TransportResponse { status, body })
    }
}
