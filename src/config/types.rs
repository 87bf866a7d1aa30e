//! Configuration type definitions

use std::net::SocketAddr;
use std::time::Duration;

/// Validated runtime configuration for the exporter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Address the metrics endpoint listens on
    pub listen_address: SocketAddr,
    /// Base URL of the mihomo management API
    pub api_url: String,
    /// Bearer token for the management API, if the daemon requires one
    pub api_token: Option<String>,
    /// Period of the fast loop (traffic + connections)
    pub scrape_interval: Duration,
    /// Period of the slow loop (per-proxy latency probes)
    pub latency_interval: Duration,
    /// Prefix prepended to every exported metric name (may be empty)
    pub metric_prefix: String,
    /// How long shutdown waits for the refresh loops to stop
    pub shutdown_grace: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_address: super::defaults::listen_address(),
            api_url: super::defaults::API_URL.to_string(),
            api_token: None,
            scrape_interval: super::defaults::SCRAPE_INTERVAL,
            latency_interval: super::defaults::LATENCY_INTERVAL,
            metric_prefix: super::defaults::METRIC_PREFIX.to_string(),
            shutdown_grace: super::defaults::SHUTDOWN_GRACE,
        }
    }
}
