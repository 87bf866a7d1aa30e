//! Default values for configuration fields

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Default mihomo management API base URL.
pub const API_URL: &str = "http://127.0.0.1:9090";

/// Default metric name prefix.
pub const METRIC_PREFIX: &str = "mihomo";

/// Default fast-loop period (traffic + connections).
pub const SCRAPE_INTERVAL: Duration = Duration::from_secs(1);

/// Default slow-loop period (latency probes).
pub const LATENCY_INTERVAL: Duration = Duration::from_secs(60);

/// Default shutdown grace period.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Default listen port, in the prometheus exporter range.
pub const LISTEN_PORT: u16 = 9188;

/// Default listen address (all interfaces).
#[inline]
#[must_use]
pub fn listen_address() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), LISTEN_PORT)
}
