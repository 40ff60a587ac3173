//! Outbound requests with a short response cache in front.

/// TTL response cache.
pub mod cache;
/// HTTP port and its reqwest adapter.
pub mod transport;

pub use cache::*;
pub use transport::*;

use std::{any::type_name_of_val, fmt, sync::Arc};

use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::{FeedError, Result};

/// Default client identifier sent upstream.
pub const DEFAULT_USER_AGENT: &str =
    concat!("heliowatch/", env!("CARGO_PKG_VERSION"));

/// Expected payload of a [`Resource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceKind {
    /// A JSON document.
    Json,
    /// An image, requested with the given `Accept` type.
    Image {
        /// MIME type sent as `Accept`.
        accept: String,
    },
}

/// One upstream endpoint together with what it is expected to return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Absolute URL, also the cache key.
    pub url: String,
    /// What the endpoint returns.
    pub kind: ResourceKind,
}

impl Resource {
    /// JSON endpoint.
    pub fn json(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: ResourceKind::Json,
        }
    }

    /// Image endpoint.
    pub fn image(url: impl Into<String>, accept: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: ResourceKind::Image {
                accept: accept.into(),
            },
        }
    }

    fn accept(&self) -> &str {
        match &self.kind {
            ResourceKind::Json => "application/json",
            ResourceKind::Image { accept } => accept,
        }
    }
}

/// Shared fetch client. Cloning shares the transport and the cache.
#[derive(Clone)]
pub struct FetchClient {
    transport: Arc<dyn HttpTransport>,
    cache: Arc<ResponseCache>,
    user_agent: Arc<str>,
}

impl fmt::Debug for FetchClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchClient")
            .field("transport", &type_name_of_val(self.transport.as_ref()))
            .field("cache", &self.cache)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl FetchClient {
    /// Client sending `user_agent` on every request.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        cache: ResponseCache,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            cache: Arc::new(cache),
            user_agent: Arc::from(user_agent.into()),
        }
    }

    /// The shared response cache.
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Fetch `resource`, serving from the cache while the entry is fresh.
    ///
    /// Only successful, decodable responses are cached. Concurrent misses
    /// on the same URL are not coalesced; each URL is polled by a single
    /// task whose ticks never overlap, so that does not happen in practice.
    pub async fn fetch(&self, resource: &Resource) -> Result<Payload> {
        if let Some(cached) = self.cache.get(&resource.url) {
            debug!(url = %resource.url, "response cache hit");
            return Ok(cached);
        }
        debug!(url = %resource.url, "response cache miss");

        let headers = RequestHeaders {
            accept: resource.accept().to_string(),
            user_agent: self.user_agent.to_string(),
        };
        let response = self.transport.get(&resource.url, &headers).await?;

        if response.status != 200 {
            warn!(
                url = %resource.url,
                status = response.status,
                "upstream request failed"
            );
            return Err(FeedError::FetchFailed {
                url: resource.url.clone(),
                status: response.status,
            });
        }

        let payload = match resource.kind {
            ResourceKind::Json => {
                let value = serde_json::from_slice(&response.body).map_err(
                    |source| FeedError::Decode {
                        url: resource.url.clone(),
                        source,
                    },
                )?;
                Payload::Json(Arc::new(value))
            }
            ResourceKind::Image { .. } => Payload::Binary(response.body),
        };

        self.cache.insert(resource.url.clone(), payload.clone());
        Ok(payload)
    }

    /// Fetch a JSON endpoint.
    pub async fn get_json(&self, url: &str) -> Result<Arc<serde_json::Value>> {
        match self.fetch(&Resource::json(url)).await? {
            Payload::Json(value) => Ok(value),
            Payload::Binary(_) => Err(FeedError::UnexpectedPayload {
                url: url.to_string(),
                expected: "json",
            }),
        }
    }

    /// Fetch an image endpoint with the given `Accept` type.
    pub async fn get_image(&self, url: &str, accept: &str) -> Result<Bytes> {
        match self.fetch(&Resource::image(url, accept)).await? {
            Payload::Binary(bytes) => Ok(bytes),
            Payload::Json(_) => Err(FeedError::UnexpectedPayload {
                url: url.to_string(),
                expected: "binary image",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ok(body: &'static [u8]) -> Result<TransportResponse> {
        Ok(TransportResponse {
            status: 200,
            body: Bytes::from_static(body),
        })
    }

    fn client(mock: MockHttpTransport) -> FetchClient {
        FetchClient::new(
            Arc::new(mock),
            ResponseCache::new(Duration::from_secs(60), 5),
            "heliowatch-test",
        )
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_fetch_within_ttl_hits_network_once() {
        let mut mock = MockHttpTransport::new();
        mock.expect_get()
            .times(1)
            .returning(|_, _| ok(br#"{"WindSpeed": 412}"#));
        let client = client(mock);

        let first = client.get_json("http://x/wind.json").await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        let second = client.get_json("http://x/wind.json").await.unwrap();

        assert_eq!(first, second);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_after_ttl_goes_upstream_again() {
        let mut mock = MockHttpTransport::new();
        mock.expect_get()
            .times(2)
            .returning(|_, _| ok(b"\x89PNG-bytes"));
        let client = client(mock);

        client.get_image("http://x/latest.png", "image/png").await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;
        client.get_image("http://x/latest.png", "image/png").await.unwrap();
    }

    #[tokio::test]
    async fn sends_accept_and_user_agent_per_resource_kind() {
        let mut mock = MockHttpTransport::new();
        mock.expect_get()
            .withf(|url, headers| {
                url.ends_with("/flux.json")
                    && headers.accept == "application/json"
                    && headers.user_agent == "heliowatch-test"
            })
            .times(1)
            .returning(|_, _| ok(br#"{"Flux": 150}"#));
        mock.expect_get()
            .withf(|url, headers| {
                url.ends_with("/c3.jpg")
                    && headers.accept == "image/jpeg"
                    && headers.user_agent == "heliowatch-test"
            })
            .times(1)
            .returning(|_, _| ok(b"jpeg"));
        let client = client(mock);

        client.get_json("http://x/flux.json").await.unwrap();
        client.get_image("http://x/c3.jpg", "image/jpeg").await.unwrap();
    }

    #[tokio::test]
    async fn non_200_fails_and_is_not_cached() {
        let mut mock = MockHttpTransport::new();
        mock.expect_get().times(2).returning(|_, _| {
            Ok(TransportResponse {
                status: 503,
                body: Bytes::new(),
            })
        });
        let client = client(mock);

        for _ in 0..2 {
            let err = client.get_json("http://x/mag.json").await.unwrap_err();
            match err {
                FeedError::FetchFailed { url, status } => {
                    assert_eq!(url, "http://x/mag.json");
                    assert_eq!(status, 503);
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
        assert!(client.cache().is_empty());
    }

    #[tokio::test]
    async fn malformed_json_is_a_decode_error() {
        let mut mock = MockHttpTransport::new();
        mock.expect_get().times(1).returning(|_, _| ok(b"<html>"));
        let client = client(mock);

        let err = client.get_json("http://x/bad.json").await.unwrap_err();
        assert!(matches!(err, FeedError::Decode { .. }));
        assert!(client.cache().is_empty());
    }
}
