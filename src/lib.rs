//! Prometheus exporter for the mihomo proxy daemon
//!
//! Polls the daemon's local management API on two independent cadences — a
//! fast loop for traffic rates and the connection list, a slow loop for
//! per-proxy latency probes — caches the most recent snapshots behind a
//! reader/writer lock, and serves them as pull-based Prometheus metrics.
//! Connection records are aggregated at scrape time into one series pair
//! per `(source_host, destination, outbound_node)` flow.

pub mod aggregate;
pub mod cache;
pub mod client;
pub mod config;
pub mod exposition;
pub mod logging;
pub mod poller;
pub mod server;
pub mod types;

pub use cache::{SnapshotCache, Snapshots};
pub use client::{ClientError, MihomoClient};
pub use config::Config;
pub use poller::Poller;
pub use server::AppState;
