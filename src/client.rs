//! HTTP client for the mihomo management API
//!
//! One shared `reqwest::Client` (safe for concurrent in-flight calls) with a
//! bounded per-call timeout. Every operation takes a cancellation token;
//! cancelling mid-flight aborts the underlying HTTP call instead of letting
//! it run to its timeout.

use crate::types::{ConnectionsResponse, DelayInfo, ProxiesResponse, Traffic};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Per-call timeout for management API requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Target URL the daemon is asked to fetch when measuring proxy delay.
const PROBE_URL: &str = "https://www.gstatic.com/generate_204";

/// Server-side timeout for a delay probe, in milliseconds.
const PROBE_TIMEOUT_MS: u64 = 5000;

/// Errors from the management API client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The configured base URL is unusable; fatal at startup.
    #[error("invalid mihomo api url '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// The daemon answered with a non-200 status.
    #[error("api request to {endpoint} failed with status {status}")]
    Status { endpoint: String, status: StatusCode },

    /// The response body was not the expected JSON.
    #[error("failed to decode response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        source: serde_json::Error,
    },

    /// Connection, TLS or timeout failure below the HTTP layer.
    #[error("api request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        source: reqwest::Error,
    },

    /// The operation was aborted by the shutdown token.
    #[error("operation cancelled")]
    Cancelled,
}

/// Client for the daemon's local management API.
#[derive(Debug)]
pub struct MihomoClient {
    base_url: Url,
    api_token: Option<String>,
    http: reqwest::Client,
}

impl MihomoClient {
    /// Build a client for the given base URL and optional bearer token.
    ///
    /// Fails with [`ClientError::InvalidBaseUrl`] when the URL does not
    /// parse as an absolute HTTP(S) URL.
    pub fn new(base_url: &str, api_token: Option<String>) -> Result<Self, ClientError> {
        let invalid = |reason: String| ClientError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason,
        };

        let parsed = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme '{}'", parsed.scheme())));
        }

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            base_url: parsed,
            api_token,
            http,
        })
    }

    /// Fetch the current connection list and transfer totals.
    pub async fn connections(
        &self,
        shutdown: &CancellationToken,
    ) -> Result<ConnectionsResponse, ClientError> {
        self.cancellable(shutdown, self.get_json("connections")).await
    }

    /// Fetch the current transfer rates from the `/traffic` stream.
    ///
    /// The endpoint emits JSON objects indefinitely; exactly the first one is
    /// decoded and the response is dropped immediately afterwards, closing
    /// the connection without consuming the rest of the stream. The response
    /// is dropped on decode failure too, so a bad payload cannot leak the
    /// connection either.
    pub async fn traffic(&self, shutdown: &CancellationToken) -> Result<Traffic, ClientError> {
        self.cancellable(shutdown, self.traffic_inner()).await
    }

    /// Fetch all configured proxies and proxy groups.
    pub async fn proxies(
        &self,
        shutdown: &CancellationToken,
    ) -> Result<ProxiesResponse, ClientError> {
        self.cancellable(shutdown, self.get_json("proxies")).await
    }

    /// Measure a proxy's latency, in milliseconds, against the fixed probe
    /// target. The daemon performs the round-trip with a 5 s timeout.
    pub async fn proxy_delay(
        &self,
        name: &str,
        shutdown: &CancellationToken,
    ) -> Result<i64, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .expect("base url validated as hierarchical at construction")
            .pop_if_empty()
            .extend(["proxies", name, "delay"]);
        url.query_pairs_mut()
            .append_pair("url", PROBE_URL)
            .append_pair("timeout", &PROBE_TIMEOUT_MS.to_string());

        let endpoint = format!("/proxies/{name}/delay");
        let info: DelayInfo = self
            .cancellable(shutdown, self.get_json_at(url, endpoint))
            .await?;
        Ok(info.delay)
    }

    /// Race an operation against the shutdown token.
    ///
    /// Dropping the operation future drops its in-flight request, which
    /// aborts the HTTP call.
    async fn cancellable<T>(
        &self,
        shutdown: &CancellationToken,
        op: impl Future<Output = Result<T, ClientError>>,
    ) -> Result<T, ClientError> {
        tokio::select! {
            () = shutdown.cancelled() => Err(ClientError::Cancelled),
            result = op => result,
        }
    }

    fn endpoint_url(&self, segment: &str) -> Url {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .expect("base url validated as hierarchical at construction")
            .pop_if_empty()
            .push(segment);
        url
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, segment: &str) -> Result<T, ClientError> {
        let url = self.endpoint_url(segment);
        self.get_json_at(url, format!("/{segment}")).await
    }

    /// One authenticated GET, decoded from a fully-buffered body.
    async fn get_json_at<T: DeserializeOwned>(
        &self,
        url: Url,
        endpoint: String,
    ) -> Result<T, ClientError> {
        let response = self
            .authorized(self.http.get(url))
            .send()
            .await
            .map_err(|source| ClientError::Transport {
                endpoint: endpoint.clone(),
                source,
            })?;

        if response.status() != StatusCode::OK {
            return Err(ClientError::Status {
                endpoint,
                status: response.status(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| ClientError::Transport {
                endpoint: endpoint.clone(),
                source,
            })?;

        serde_json::from_slice(&body).map_err(|source| ClientError::Decode { endpoint, source })
    }

    /// Read exactly one JSON object from the `/traffic` stream.
    async fn traffic_inner(&self) -> Result<Traffic, ClientError> {
        const ENDPOINT: &str = "/traffic";
        let transport = |source| ClientError::Transport {
            endpoint: ENDPOINT.to_string(),
            source,
        };

        let mut response = self
            .authorized(self.http.get(self.endpoint_url("traffic")))
            .send()
            .await
            .map_err(transport)?;

        if response.status() != StatusCode::OK {
            return Err(ClientError::Status {
                endpoint: ENDPOINT.to_string(),
                status: response.status(),
            });
        }

        // Accumulate chunks only until the first complete object parses,
        // then return, dropping the response and with it the stream.
        let mut buf = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(transport)? {
            buf.extend_from_slice(&chunk);
            let mut objects = serde_json::Deserializer::from_slice(&buf).into_iter::<Traffic>();
            match objects.next() {
                Some(Ok(traffic)) => return Ok(traffic),
                Some(Err(e)) if e.is_eof() => continue,
                Some(Err(source)) => {
                    return Err(ClientError::Decode {
                        endpoint: ENDPOINT.to_string(),
                        source,
                    });
                }
                None => continue,
            }
        }

        // Stream ended before a full object arrived.
        serde_json::from_slice(&buf).map_err(|source| ClientError::Decode {
            endpoint: ENDPOINT.to_string(),
            source,
        })
    }
}
