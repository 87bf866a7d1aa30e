//! Per-flow aggregation of the raw connection list
//!
//! The daemon reports one record per live connection; exporting a series per
//! connection would churn label sets on every scrape. Instead connections
//! are reduced to one series per `(source_host, destination, outbound_node)`
//! flow. This is a pure function over a connection snapshot, re-run on every
//! scrape rather than cached between refreshes.

use crate::types::Connection;
use std::collections::HashMap;
use tracing::warn;

/// Label value used when a connection has no outbound chain.
pub const DIRECT_NODE: &str = "DIRECT";

/// Aggregation key: one exported series pair per distinct key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlowKey {
    /// Source IP of the originating client
    pub source_host: String,
    /// Destination domain, or destination IP when no domain is known
    pub destination: String,
    /// Last node of the outbound chain, or [`DIRECT_NODE`]
    pub outbound_node: String,
}

/// Byte totals accumulated for one flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowTraffic {
    pub upload: i64,
    pub download: i64,
}

/// Reduce raw connection records to per-flow traffic totals.
///
/// Label resolution per record:
/// - `outbound_node`: last element of the chain, [`DIRECT_NODE`] if empty
/// - `destination`: `metadata.host`, falling back to the destination IP
/// - `source_host`: `metadata.source_ip` as-is
///
/// Records that still carry an empty label after resolution are skipped with
/// a warning; a malformed record must never suppress the rest of the output.
/// Deterministic for a fixed input: the same snapshot always yields the same
/// totals.
#[must_use]
pub fn aggregate(connections: &[Connection]) -> HashMap<FlowKey, FlowTraffic> {
    let mut flows: HashMap<FlowKey, FlowTraffic> = HashMap::new();

    for conn in connections {
        let outbound_node = conn
            .chains
            .last()
            .map_or(DIRECT_NODE, String::as_str);

        let destination = if conn.metadata.host.is_empty() {
            conn.metadata.destination_ip.as_str()
        } else {
            conn.metadata.host.as_str()
        };

        let source_host = conn.metadata.source_ip.as_str();

        if source_host.is_empty() || destination.is_empty() || outbound_node.is_empty() {
            warn!(
                id = %conn.id,
                source = source_host,
                destination,
                node = outbound_node,
                "skipping connection with empty labels"
            );
            continue;
        }

        let entry = flows
            .entry(FlowKey {
                source_host: source_host.to_string(),
                destination: destination.to_string(),
                outbound_node: outbound_node.to_string(),
            })
            .or_default();
        entry.upload += conn.upload;
        entry.download += conn.download;
    }

    flows
}
