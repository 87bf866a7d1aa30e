//! Wire types for the mihomo management API
//!
//! These structs mirror the JSON payloads returned by the daemon's local
//! management endpoints. Field names follow mihomo's JSON exactly; string
//! fields that may be absent decode as empty strings.

use serde::Deserialize;
use std::collections::HashMap;

/// Sentinel latency recorded when a delay probe fails or times out.
pub const PROBE_FAILED: i64 = -1;

/// Current transfer rates, from the `/traffic` streaming endpoint.
///
/// One object is emitted per second; the client reads exactly the first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Traffic {
    /// Upload speed in bytes per second
    pub up: i64,
    /// Download speed in bytes per second
    pub down: i64,
}

/// Metadata attached to a single tracked connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionMetadata {
    pub network: String,
    #[serde(rename = "type")]
    pub conn_type: String,
    #[serde(rename = "sourceIP")]
    pub source_ip: String,
    #[serde(rename = "destinationIP")]
    pub destination_ip: String,
    #[serde(rename = "sourcePort")]
    pub source_port: String,
    #[serde(rename = "destinationPort")]
    pub destination_port: String,
    /// Destination domain name; empty when the connection was made by IP
    pub host: String,
    #[serde(rename = "dnsMode")]
    pub dns_mode: String,
    #[serde(rename = "processPath")]
    pub process_path: String,
}

/// A single active connection as reported by `/connections`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Connection {
    pub id: String,
    pub metadata: ConnectionMetadata,
    /// Cumulative uploaded bytes for this connection
    pub upload: i64,
    /// Cumulative downloaded bytes for this connection
    pub download: i64,
    pub start: String,
    /// Outbound proxy chain; the last element is the egress node
    #[serde(deserialize_with = "null_as_default")]
    pub chains: Vec<String>,
    pub rule: String,
    #[serde(rename = "rulePayload")]
    pub rule_payload: String,
}

/// Full `/connections` response: process-wide totals plus the live list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionsResponse {
    #[serde(rename = "downloadTotal")]
    pub download_total: i64,
    #[serde(rename = "uploadTotal")]
    pub upload_total: i64,
    /// `null` when the daemon has no live connections
    #[serde(deserialize_with = "null_as_default")]
    pub connections: Vec<Connection>,
}

/// Proxy node type, from the `type` field of `/proxies` entries.
///
/// Anything that is not a routing construct decodes as [`ProxyKind::Other`]
/// (Shadowsocks, Vmess, Trojan, ...), which keeps the enum stable as mihomo
/// grows new protocol types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ProxyKind {
    Direct,
    Reject,
    Selector,
    #[serde(rename = "URLTest")]
    UrlTest,
    Fallback,
    LoadBalance,
    #[serde(other)]
    Other,
}

impl ProxyKind {
    /// Whether this proxy is a concrete endpoint worth latency-probing.
    ///
    /// Selectors, URL-test groups, fallback/load-balance groups and the
    /// built-in DIRECT/REJECT policies are routing constructs, not
    /// measurable endpoints.
    #[must_use]
    pub const fn is_probe_target(&self) -> bool {
        !matches!(
            self,
            Self::Selector
                | Self::UrlTest
                | Self::Fallback
                | Self::LoadBalance
                | Self::Direct
                | Self::Reject
        )
    }
}

/// A single proxy entry from `/proxies`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ProxyKind,
    /// Currently selected member, present on selector-like groups
    #[serde(default)]
    pub now: Option<String>,
    /// Member list, present on selector-like groups
    #[serde(default)]
    pub all: Option<Vec<String>>,
}

/// Full `/proxies` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProxiesResponse {
    #[serde(default)]
    pub proxies: HashMap<String, ProxyInfo>,
}

/// Response of the per-proxy delay test endpoint.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DelayInfo {
    pub delay: i64,
}

/// Most recent probe result per proxy name; [`PROBE_FAILED`] marks failures.
pub type LatencyMap = HashMap<String, i64>;

/// Decode JSON `null` as the type's default value.
///
/// The daemon emits `"connections": null` (rather than `[]`) when the list
/// is empty, and `#[serde(default)]` alone only covers missing fields.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
