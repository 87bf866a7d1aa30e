//! Prometheus text rendering of the cached snapshots
//!
//! A fresh registry is built on every scrape from whatever snapshots exist:
//! labeled series come and go with the flows and proxies behind them, and a
//! family whose snapshot has not been fetched yet is simply absent from the
//! output. Aggregation runs here, at read time, over the current connection
//! snapshot.

use crate::aggregate;
use crate::cache::Snapshots;
use prometheus::{Encoder, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};

/// Render the current snapshots as Prometheus text exposition format.
///
/// `prefix` is prepended to every family name; an empty prefix leaves names
/// bare.
pub fn render(prefix: &str, snapshots: &Snapshots) -> Result<String, prometheus::Error> {
    let registry = if prefix.is_empty() {
        Registry::new()
    } else {
        Registry::new_custom(Some(prefix.to_string()), None)?
    };

    if let Some(traffic) = &snapshots.traffic {
        let up = IntGauge::with_opts(Opts::new(
            "traffic_upload_speed_bytes",
            "Current upload speed in bytes per second.",
        ))?;
        let down = IntGauge::with_opts(Opts::new(
            "traffic_download_speed_bytes",
            "Current download speed in bytes per second.",
        ))?;
        up.set(traffic.up);
        down.set(traffic.down);
        registry.register(Box::new(up))?;
        registry.register(Box::new(down))?;
    }

    if let Some(connections) = &snapshots.connections {
        let active = IntGauge::with_opts(Opts::new(
            "connections_active_total",
            "Total number of active connections.",
        ))?;
        active.set(connections.connections.len() as i64);
        registry.register(Box::new(active))?;

        let labels = ["source_host", "destination", "outbound_node"];
        let upload = IntGaugeVec::new(
            Opts::new(
                "connection_upload_bytes",
                "Uploaded bytes, aggregated per source, destination and outbound node.",
            ),
            &labels,
        )?;
        let download = IntGaugeVec::new(
            Opts::new(
                "connection_download_bytes",
                "Downloaded bytes, aggregated per source, destination and outbound node.",
            ),
            &labels,
        )?;

        for (key, traffic) in aggregate::aggregate(&connections.connections) {
            let values = [
                key.source_host.as_str(),
                key.destination.as_str(),
                key.outbound_node.as_str(),
            ];
            upload.with_label_values(&values).set(traffic.upload);
            download.with_label_values(&values).set(traffic.download);
        }
        registry.register(Box::new(upload))?;
        registry.register(Box::new(download))?;
    }

    if let Some(latencies) = &snapshots.latencies {
        let latency = IntGaugeVec::new(
            Opts::new("proxy_latency_ms", "Latency of a proxy in milliseconds."),
            &["proxy_name"],
        )?;
        let available = IntGaugeVec::new(
            Opts::new(
                "proxy_available",
                "Availability of a proxy (1 for available, 0 for unavailable).",
            ),
            &["proxy_name"],
        )?;

        for (name, delay) in latencies.iter() {
            latency.with_label_values(&[name]).set(*delay);
            // Zero or the failure sentinel both mean unreachable.
            available
                .with_label_values(&[name])
                .set(i64::from(*delay > 0));
        }
        registry.register(Box::new(latency))?;
        registry.register(Box::new(available))?;
    }

    let mut buf = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buf)?;
    String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        Connection, ConnectionMetadata, ConnectionsResponse, LatencyMap, Traffic, PROBE_FAILED,
    };
    use std::sync::Arc;

    fn line(output: &str, needle: &str) -> bool {
        output.lines().any(|l| l == needle)
    }

    #[test]
    fn absent_snapshots_render_nothing() {
        let output = render("mihomo", &Snapshots::default()).unwrap();
        assert!(output.is_empty());
    }

    #[test]
    fn traffic_gauges_carry_the_prefix() {
        let snapshots = Snapshots {
            traffic: Some(Arc::new(Traffic { up: 128, down: 4096 })),
            ..Default::default()
        };
        let output = render("mihomo", &snapshots).unwrap();
        assert!(line(&output, "mihomo_traffic_upload_speed_bytes 128"));
        assert!(line(&output, "mihomo_traffic_download_speed_bytes 4096"));
    }

    #[test]
    fn empty_prefix_leaves_names_bare() {
        let snapshots = Snapshots {
            traffic: Some(Arc::new(Traffic { up: 1, down: 2 })),
            ..Default::default()
        };
        let output = render("", &snapshots).unwrap();
        assert!(line(&output, "traffic_upload_speed_bytes 1"));
    }

    #[test]
    fn connection_snapshot_yields_count_and_flow_series() {
        let snapshots = Snapshots {
            connections: Some(Arc::new(ConnectionsResponse {
                connections: vec![
                    Connection {
                        metadata: ConnectionMetadata {
                            source_ip: "10.0.0.1".to_string(),
                            host: "a.com".to_string(),
                            ..Default::default()
                        },
                        upload: 100,
                        download: 200,
                        chains: vec!["P1".to_string()],
                        ..Default::default()
                    },
                    Connection {
                        metadata: ConnectionMetadata {
                            source_ip: "10.0.0.1".to_string(),
                            host: "a.com".to_string(),
                            ..Default::default()
                        },
                        upload: 50,
                        download: 10,
                        chains: vec!["P1".to_string()],
                        ..Default::default()
                    },
                ],
                ..Default::default()
            })),
            ..Default::default()
        };
        let output = render("mihomo", &snapshots).unwrap();
        assert!(line(&output, "mihomo_connections_active_total 2"));
        assert!(line(
            &output,
            "mihomo_connection_upload_bytes{destination=\"a.com\",outbound_node=\"P1\",source_host=\"10.0.0.1\"} 150"
        ));
        assert!(line(
            &output,
            "mihomo_connection_download_bytes{destination=\"a.com\",outbound_node=\"P1\",source_host=\"10.0.0.1\"} 210"
        ));
    }

    #[test]
    fn latency_snapshot_yields_availability() {
        let snapshots = Snapshots {
            latencies: Some(Arc::new(LatencyMap::from([
                ("HK-01".to_string(), 42),
                ("US-01".to_string(), PROBE_FAILED),
            ]))),
            ..Default::default()
        };
        let output = render("mihomo", &snapshots).unwrap();
        assert!(line(&output, "mihomo_proxy_latency_ms{proxy_name=\"HK-01\"} 42"));
        assert!(line(&output, "mihomo_proxy_available{proxy_name=\"HK-01\"} 1"));
        assert!(line(&output, "mihomo_proxy_latency_ms{proxy_name=\"US-01\"} -1"));
        assert!(line(&output, "mihomo_proxy_available{proxy_name=\"US-01\"} 0"));
    }
}
